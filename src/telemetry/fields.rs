//! Defaulting rules for values reported by the device.
//!
//! The firmware is loose about types: numbers sometimes arrive as strings and
//! fields may be missing entirely. These functions are the only place that
//! policy lives.

use serde_json::Value;

/// Coerce a device value to a finite number.
///
/// | input                   | result      |
/// |-------------------------|-------------|
/// | number                  | itself      |
/// | numeric string          | parsed      |
/// | `true` / `false`        | 1.0 / 0.0   |
/// | anything else, NaN, inf | 0.0         |
pub fn numeric_or_zero(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// JavaScript-style truthiness, which is how the device's flags are meant to be read
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A truthy value that also coerces to a non-zero number; used for prices
pub fn truthy_number(value: &Value) -> Option<f64> {
    if !truthy(value) {
        return None;
    }
    let n = numeric_or_zero(value);
    (n != 0.0).then_some(n)
}
