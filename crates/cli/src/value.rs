//! String → Value parsing rules.
//!
//! User input is parsed into `Value` using auto-detect logic:
//! 1. JSON structures (`{`, `[`) → compact JSON text, the form Json fields use
//! 2. A JSON string literal (`"..."`) → its unquoted content
//! 3. `null` → Value::Null, which removes the key
//! 4. `true` / `false` → Value::Bool
//! 5. Integer pattern → Value::Int
//! 6. Float pattern → Value::Float
//! 7. Everything else → Value::String

use neostore_core::Value;

/// Auto-detect value type from a user-supplied string.
pub fn parse_value(s: &str) -> Value {
    if s.starts_with('{') || s.starts_with('[') || s.starts_with('"') {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(s) {
            return match json {
                serde_json::Value::String(text) => Value::String(text),
                other => Value::String(other.to_string()),
            };
        }
        // If JSON parse fails, fall through to string
    }

    if s == "null" {
        return Value::Null;
    }

    if s == "true" {
        return Value::Bool(true);
    }
    if s == "false" {
        return Value::Bool(false);
    }

    if is_integer(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::Int(i);
        }
    }

    if is_float(s) {
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
    }

    Value::String(s.to_string())
}

/// Split a `KEY=VALUE` argument and parse the value.
pub fn parse_assignment(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Empty key in '{}'", s));
    }
    Ok((key.to_string(), parse_value(value)))
}

fn is_integer(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_float(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    if s.is_empty() {
        return false;
    }
    // Must contain a dot or exponent
    if !s.contains('.') && !s.contains('e') && !s.contains('E') {
        return false;
    }
    s.bytes().all(|b| {
        b.is_ascii_digit() || b == b'.' || b == b'e' || b == b'E' || b == b'+' || b == b'-'
    })
}
