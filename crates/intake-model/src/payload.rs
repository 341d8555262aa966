//! Free-form section payload
//!
//! The payload is a JSON object (string/number/bool/null/list/map), opaque to
//! the workflow except for merging and structural comparison.
//!
//! Comparison runs over a normalized form: `null`, empty strings and
//! whitespace-only strings all collapse into "absent", and an absent object
//! member is the same as a missing one. Integral floats compare equal to
//! integers. List positions are preserved (an absent element becomes `null`).

use serde_json::{Map, Number, Value};

/// Section payload: top-level key to value
pub type Payload = Map<String, Value>;

/// Overlay `overlay` onto `base`, one top-level key at a time
///
/// Section content under a key replaces the previous content wholesale.
pub fn merge_shallow(base: &mut Payload, overlay: Payload) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

/// Recursively merge `overlay` into `base`
///
/// Objects merge member by member; every other value in `overlay` replaces
/// the one in `base`.
pub fn merge_deep(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_deep(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

/// Deep-merge an overlay payload into a base payload
pub fn merge_deep_payload(base: &mut Payload, overlay: &Payload) {
    for (key, value) in overlay {
        match base.get_mut(key) {
            Some(existing) => merge_deep(existing, value),
            None => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Normalize a value; `None` is the absent marker
#[must_use]
pub fn normalize(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(Value::String(s.clone())),
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::Number(n) => Some(Value::Number(normalize_number(n))),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .map(|item| normalize(item).unwrap_or(Value::Null))
                .collect(),
        )),
        Value::Object(map) => Some(Value::Object(normalize_map(map))),
    }
}

/// Normalize every member of an object, dropping absent ones
#[must_use]
pub fn normalize_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter_map(|(key, value)| normalize(value).map(|v| (key.clone(), v)))
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn normalize_number(n: &Number) -> Number {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                return Number::from(f as i64);
            }
        }
    }
    n.clone()
}

/// Structural equality over normalized values
#[must_use]
pub fn structurally_equal(left: &Value, right: &Value) -> bool {
    normalize(left) == normalize(right)
}

/// Structural equality of two payloads
#[must_use]
pub fn payloads_equal(left: &Payload, right: &Payload) -> bool {
    normalize_map(left) == normalize_map(right)
}
