//! Request field trees
//!
//! A [`FieldTree`] describes which fields of an entity were requested and, for
//! relation fields, which fields of the related entities. A field mapped to an
//! empty subtree is a requested leaf.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::{ResolveError, ResolveResult};

/// Nested selection of requested fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTree {
    fields: BTreeMap<String, FieldTree>,
}

impl FieldTree {
    /// An empty tree, also used as a requested leaf
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON selection: `true` requests a leaf, an object requests a
    /// sub-selection, `false` and `null` leave the field unrequested
    pub fn from_json(value: &Value) -> ResolveResult<Self> {
        let object = value.as_object().ok_or_else(|| {
            ResolveError::configuration(format!("field tree must be a JSON object, got {}", value))
        })?;

        let mut tree = FieldTree::new();
        for (name, selection) in object {
            match selection {
                Value::Bool(true) => {
                    tree.fields.insert(name.clone(), FieldTree::new());
                }
                Value::Bool(false) | Value::Null => {}
                Value::Object(_) => {
                    tree.fields.insert(name.clone(), FieldTree::from_json(selection)?);
                }
                other => {
                    return Err(ResolveError::configuration(format!(
                        "invalid selection for field '{}': {}",
                        name, other
                    )))
                }
            }
        }
        Ok(tree)
    }

    /// Request a leaf field
    pub fn with_field(mut self, name: impl Into<String>) -> Self {
        self.fields.entry(name.into()).or_default();
        self
    }

    /// Request a field with a sub-selection, merging into any existing one
    pub fn with(mut self, name: impl Into<String>, subtree: FieldTree) -> Self {
        self.fields.entry(name.into()).or_default().merge(&subtree);
        self
    }

    /// Union `other` into this tree. Returns whether anything was added.
    pub fn merge(&mut self, other: &FieldTree) -> bool {
        let mut changed = false;
        for (name, subtree) in &other.fields {
            match self.fields.get_mut(name) {
                Some(existing) => changed |= existing.merge(subtree),
                None => {
                    self.fields.insert(name.clone(), subtree.clone());
                    changed = true;
                }
            }
        }
        changed
    }

    /// Make sure `name` is requested at this level
    pub fn ensure_field(&mut self, name: &str) {
        if !self.fields.contains_key(name) {
            self.fields.insert(name.to_string(), FieldTree::new());
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldTree> {
        self.fields.get(name)
    }

    pub fn is_requested(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Requested fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldTree)> {
        self.fields.iter().map(|(name, subtree)| (name.as_str(), subtree))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as a JSON selection (`true` for leaves)
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, subtree)| {
                    let selection = if subtree.is_empty() {
                        Value::Bool(true)
                    } else {
                        subtree.to_json()
                    };
                    (name.clone(), selection)
                })
                .collect(),
        )
    }
}

impl Serialize for FieldTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, subtree) in &self.fields {
            if subtree.is_empty() {
                map.serialize_entry(name, &true)?;
            } else {
                map.serialize_entry(name, subtree)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_skips_unrequested_fields() {
        let tree = FieldTree::from_json(&json!({
            "name": true,
            "email": false,
            "avatar": null,
            "owner": { "name": true }
        }))
        .unwrap();

        assert!(tree.is_requested("name"));
        assert!(!tree.is_requested("email"));
        assert!(!tree.is_requested("avatar"));
        assert!(tree.get("owner").unwrap().is_requested("name"));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(FieldTree::from_json(&json!(["name"])).is_err());
        assert!(FieldTree::from_json(&json!({ "name": 1 })).is_err());
    }

    #[test]
    fn test_malformed_selection_is_not_an_upstream_failure() {
        let err = FieldTree::from_json(&json!("name")).unwrap_err();
        assert!(matches!(err, ResolveError::Configuration { .. }));
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_merge_unions_nested_selections() {
        let mut left = FieldTree::new().with("owner", FieldTree::new().with_field("name"));
        let right = FieldTree::new()
            .with("owner", FieldTree::new().with_field("email"))
            .with_field("title");

        assert!(left.merge(&right));
        let owner = left.get("owner").unwrap();
        assert!(owner.is_requested("name"));
        assert!(owner.is_requested("email"));
        assert!(left.is_requested("title"));

        // Merging the same selection again adds nothing
        assert!(!left.merge(&right));
    }

    #[test]
    fn test_ensure_field_keeps_existing_subtree() {
        let mut tree = FieldTree::new().with("id", FieldTree::new().with_field("x"));
        tree.ensure_field("id");
        assert!(tree.get("id").unwrap().is_requested("x"));

        let mut empty = FieldTree::new();
        empty.ensure_field("id");
        assert!(empty.is_requested("id"));
    }

    #[test]
    fn test_to_json_round_trip() {
        let value = json!({ "owner": { "id": true, "name": true }, "title": true });
        let tree = FieldTree::from_json(&value).unwrap();
        assert_eq!(tree.to_json(), value);
        assert_eq!(serde_json::to_value(&tree).unwrap(), value);
    }
}
