//! Unique-key derivation.
//!
//! Keys are plain concatenations of values taken from the raw document, so
//! the same record in the same document always yields the same key. Absent
//! values become empty segments instead of failing.

use serde_json::Value;

/// Renders a raw JSON value as a key or text segment. Strings are used
/// verbatim, absent and `null` values are empty, anything else is its
/// compact JSON text.
pub fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// `state_city_addressurl`. Empty segments are kept, so a record with no
/// city and no url still yields `"CA__"`.
pub fn map_key(state: &str, city_name: &str, address_url: &str) -> String {
    format!("{}_{}_{}", state, city_name, address_url)
}

/// `marketname_facilitykey`.
pub fn hawk_key(market_name: &str, facility_key: &str) -> String {
    format!("{}_{}", market_name, facility_key)
}

/// The record's own top-level key, unchanged.
pub fn centers_key(facility_id: &str) -> String {
    facility_id.to_string()
}
