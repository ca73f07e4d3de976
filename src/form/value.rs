use serde_json::Value;

/// Loose truthiness used by the value-ingestion and extraction walks.
///
/// `null`, `false`, `0`, `NaN` and `""` are falsy; arrays and objects are
/// always truthy, even when empty.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number
            .as_f64()
            .is_some_and(|number| number != 0.0 && !number.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String coercion for scalar payload parts and error messages.
pub(super) fn coerce_to_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::String(text) => text.clone(),
        Value::Number(number) => {
            if number.is_i64() || number.is_u64() {
                return number.to_string();
            }
            match number.as_f64() {
                Some(float) if float == 0.0 => "0".to_string(),
                Some(float) if float.abs() >= 1e21 || float.abs() < 1e-6 => exponent_text(float),
                Some(float) if float.fract() == 0.0 => format!("{float:.0}"),
                Some(float) => float.to_string(),
                None => number.to_string(),
            }
        }
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Exponent notation with an explicit sign on positive exponents (`1e+21`).
fn exponent_text(float: f64) -> String {
    let text = format!("{float:e}");
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => text,
    }
}
