use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

/// A single snapshot of instantaneous power and cumulative energy as
/// reported by a Shelly device.
///
/// A reading is only ever constructed from a response that actually
/// contains the expected meter sub-object; fields missing *inside* that
/// sub-object fall back to 0, because real devices omit them depending
/// on model and firmware.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    /// Instantaneous power draw in watts.
    pub power: f64,
    /// Device-reported unix time in seconds, 0 if the device did not
    /// report one. Never substituted with wall-clock time.
    pub timestamp: i64,
    /// Cumulative energy counter in watt-hours. Devices may report a
    /// fractional value; it is truncated to match the output contract.
    pub total: i64,
}

/// Reads a float field from a JSON object, defaulting to 0.0 when the
/// field is missing or not a number.
pub(crate) fn field_as_f64(node: &Value, field: &str) -> f64 {
    node.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Reads an integer field from a JSON object, defaulting to 0. Floats
/// are truncated toward zero, as some firmwares report fractional
/// energy totals.
pub(crate) fn field_as_i64(node: &Value, field: &str) -> i64 {
    node.get(field)
        .and_then(Value::as_f64)
        .map(|v| v as i64)
        .unwrap_or(0)
}
