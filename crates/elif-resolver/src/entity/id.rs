//! Entity identifiers and loose value matching
//!
//! Identifiers arrive from loaders in whatever representation their backend
//! uses, so `7`, `7.0` and `"7"` must all name the same entity. Every
//! identifier is normalized to a canonical text form before it is compared:
//!
//! - strings keep their text unchanged
//! - integral numbers render as the integer (`7.0` becomes `7`)
//! - other numbers use their JSON rendering
//! - booleans render as `true` / `false`
//! - `null`, arrays and objects have no identifier

use std::collections::HashSet;
use std::fmt;

use serde_json::{Number, Value};

/// Canonical identifier of an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    /// Normalize a scalar JSON value into an identifier
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self(text.clone())),
            Value::Number(number) => Some(Self(canonical_number(number))),
            Value::Bool(flag) => Some(Self(flag.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<i64> for EntityId {
    fn from(number: i64) -> Self {
        Self(number.to_string())
    }
}

fn canonical_number(number: &Number) -> String {
    if let Some(int) = number.as_i64() {
        return int.to_string();
    }
    if let Some(uint) = number.as_u64() {
        return uint.to_string();
    }
    match number.as_f64() {
        // Below 2^53 every integral float is exactly representable as i64
        Some(float) if float.is_finite() && float.fract() == 0.0 && float.abs() < 9_007_199_254_740_992.0 => {
            (float as i64).to_string()
        }
        _ => number.to_string(),
    }
}

/// Identifiers held by a value: one for a scalar, one per scalar element for
/// an array, none otherwise
pub fn ids_of(value: &Value) -> Vec<EntityId> {
    match value {
        Value::Array(items) => items.iter().filter_map(EntityId::from_value).collect(),
        other => EntityId::from_value(other).into_iter().collect(),
    }
}

/// Loose match between a source value and a candidate value.
///
/// Scalars compare after normalization; when either side is a collection the
/// match is set membership, so `[1, 2]` matches `2` and `"2"`.
pub fn loosely_matches(source: &Value, candidate: &Value) -> bool {
    let wanted: HashSet<EntityId> = ids_of(source).into_iter().collect();
    if wanted.is_empty() {
        return false;
    }
    ids_of(candidate).iter().any(|id| wanted.contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_and_string_ids_normalize_together() {
        assert_eq!(EntityId::from_value(&json!(7)), EntityId::from_value(&json!("7")));
        assert_eq!(EntityId::from_value(&json!(7.0)), Some(EntityId::from(7)));
        assert_eq!(EntityId::from_value(&json!(7.5)).unwrap().as_str(), "7.5");
        assert_eq!(EntityId::from_value(&json!(u64::MAX)).unwrap().as_str(), u64::MAX.to_string());
    }

    #[test]
    fn test_non_scalars_have_no_id() {
        assert!(EntityId::from_value(&Value::Null).is_none());
        assert!(EntityId::from_value(&json!([1])).is_none());
        assert!(EntityId::from_value(&json!({ "id": 1 })).is_none());
    }

    #[test]
    fn test_ids_of_flattens_arrays() {
        let ids = ids_of(&json!([1, "2", null, [3]]));
        assert_eq!(ids, vec![EntityId::from(1), EntityId::from("2")]);
        assert!(ids_of(&Value::Null).is_empty());
    }

    #[test]
    fn test_loose_matching() {
        assert!(loosely_matches(&json!(7), &json!("7")));
        assert!(loosely_matches(&json!(1), &json!([3, 1])));
        assert!(loosely_matches(&json!([1, 2]), &json!(2)));
        assert!(!loosely_matches(&json!(1), &json!([2, 3])));
        assert!(!loosely_matches(&Value::Null, &Value::Null));
        assert!(!loosely_matches(&json!(true), &json!(1)));
    }
}
