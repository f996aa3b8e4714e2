//! Accessors for the dynamic JSON Dataverse returns.
//!
//! Records are plain string-keyed maps. Instance annotations ride along as
//! sibling keys, e.g. `statuscode@OData.Community.Display.V1.FormattedValue`.

use serde_json::{Map, Value};

pub type Record = Map<String, Value>;

pub const FORMATTED_VALUE: &str = "OData.Community.Display.V1.FormattedValue";
pub const COUNT: &str = "@odata.count";

/// Key under which the formatted value of `field` is returned.
pub fn formatted_value_key(field: &str) -> String {
    format!("{}@{}", field, FORMATTED_VALUE)
}

/// Human-readable label for `field`, when Dataverse sent one.
pub fn formatted_value<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.get(&formatted_value_key(field))
}

/// The `value` array of a collection response. Missing or malformed
/// payloads yield an empty slice.
pub fn records(payload: &Value) -> &[Value] {
    payload
        .get("value")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// `@odata.count` when the request asked for `$count=true`.
pub fn total_count(payload: &Value) -> Option<u64> {
    payload.get(COUNT).and_then(Value::as_u64)
}

/// Error text from an OData error body (`{"error": {"message": ...}}`),
/// falling back to the raw body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
