//! Call signatures - Order-independent hashes of loader and initializer calls

use std::fmt;

use serde_json::Value;

use super::filter::FilterArgs;
use crate::entity::EntityId;
use crate::fields::FieldTree;
use crate::schema::TypeKey;

/// Operation a signature was computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Loader,
    Initializer,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Loader => "loader",
            CallKind::Initializer => "initializer",
        }
    }
}

/// Deterministic hash of (type, operation, arguments).
///
/// Arguments are canonicalized before hashing: object keys are sorted and
/// array elements are sorted and deduplicated, so neither key order nor value
/// order changes the signature.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CallSignature([u8; 32]);

impl CallSignature {
    /// Signature of a loader call
    pub fn loader(type_key: &TypeKey, args: &FilterArgs, fields: &FieldTree) -> Self {
        let payload = serde_json::json!({
            "args": args.to_json(),
            "fields": fields.to_json(),
        });
        Self::compute(type_key, CallKind::Loader, &payload)
    }

    /// Signature of an initializer call over the given instances
    pub fn initializer(type_key: &TypeKey, ids: &[EntityId], fields: &FieldTree) -> Self {
        let payload = serde_json::json!({
            "ids": ids.iter().map(EntityId::as_str).collect::<Vec<_>>(),
            "fields": fields.to_json(),
        });
        Self::compute(type_key, CallKind::Initializer, &payload)
    }

    pub fn compute(type_key: &TypeKey, kind: CallKind, payload: &Value) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(type_key.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(kind.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(canonical_form(payload).as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallSignature({})", &self.to_hex()[..16])
    }
}

/// Canonical text form of a JSON value
pub(crate) fn canonical_form(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(_) => {
            // Numbers share the identifier normalization, so 7 and 7.0 agree
            EntityId::from_value(value)
                .map(|id| id.to_string())
                .unwrap_or_else(|| value.to_string())
        }
        Value::String(text) => Value::String(text.clone()).to_string(),
        Value::Array(items) => {
            let mut parts: Vec<String> = items.iter().map(canonical_form).collect();
            parts.sort();
            parts.dedup();
            format!("[{}]", parts.join(","))
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let parts: Vec<String> = entries
                .into_iter()
                .map(|(key, value)| format!("{}:{}", Value::String(key.clone()), canonical_form(value)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, Value)]) -> FilterArgs {
        let mut args = FilterArgs::new();
        for (key, value) in pairs {
            args.push(*key, value.clone());
        }
        args
    }

    #[test]
    fn test_signature_ignores_value_and_key_order() {
        let user = TypeKey::new("User");
        let fields = FieldTree::new().with_field("id").with_field("name");

        let a = CallSignature::loader(&user, &args(&[("id", json!(1)), ("id", json!(2)), ("tenant", json!("x"))]), &fields);
        let b = CallSignature::loader(&user, &args(&[("tenant", json!("x")), ("id", json!(2)), ("id", json!(1))]), &fields);
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_depends_on_type_kind_and_fields() {
        let fields = FieldTree::new().with_field("id");
        let filter = args(&[("id", json!(1))]);

        let user = CallSignature::loader(&TypeKey::new("User"), &filter, &fields);
        let company = CallSignature::loader(&TypeKey::new("Company"), &filter, &fields);
        let wider = CallSignature::loader(&TypeKey::new("User"), &filter, &fields.clone().with_field("name"));
        let init = CallSignature::initializer(&TypeKey::new("User"), &[EntityId::from(1)], &fields);

        assert_ne!(user, company);
        assert_ne!(user, wider);
        assert_ne!(user, init);
    }

    #[test]
    fn test_canonical_form() {
        assert_eq!(canonical_form(&json!({ "b": [3, 1, 1.0], "a": "x" })), r#"{"a":"x","b":[1,3]}"#);
        assert_ne!(canonical_form(&json!(1)), canonical_form(&json!("1")));
    }

    #[test]
    fn test_hex_display() {
        let signature = CallSignature::compute(&TypeKey::new("User"), CallKind::Loader, &Value::Null);
        let rendered = signature.to_string();
        assert_eq!(rendered.len(), 64);
        assert!(rendered.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
