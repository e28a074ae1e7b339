//! Culture-invariant text conversion for basic values.
//!
//! Supported format strings:
//!
//! | Format | Applies to | Effect |
//! |--------|-----------|--------|
//! | `F<n>` | numbers | fixed point with `n` decimals |
//! | `E<n>` | numbers | scientific notation with `n` decimals |
//! | `X` / `x` | integers | upper / lower case hexadecimal |
//! | `D<n>` | integers | decimal padded with zeros to `n` digits |
//!
//! Unknown formats fall back to the default rendering.

use crate::{BasicType, ModelError, Result, Value};

/// Render a basic value as text.
///
/// Returns `None` when the value is not a basic value.
pub fn format_scalar(value: &Value, format: Option<&str>) -> Option<String> {
    let text = match value {
        Value::Bool(v) => v.to_string(),
        Value::Char(v) => v.to_string(),
        Value::String(v) => v.clone(),
        Value::Int8(v) => format_integer(*v as i128, format),
        Value::Int16(v) => format_integer(*v as i128, format),
        Value::Int32(v) => format_integer(*v as i128, format),
        Value::Int64(v) => format_integer(*v as i128, format),
        Value::UInt8(v) => format_integer(*v as i128, format),
        Value::UInt16(v) => format_integer(*v as i128, format),
        Value::UInt32(v) => format_integer(*v as i128, format),
        Value::UInt64(v) => format_integer(*v as i128, format),
        Value::Float(v) => format_float(*v as f64, format).unwrap_or_else(|| v.to_string()),
        Value::Double(v) => format_float(*v, format).unwrap_or_else(|| v.to_string()),
        _ => return None,
    };
    Some(text)
}

/// Parse a format string into its kind letter and optional precision.
fn split_format(format: &str) -> Option<(char, Option<usize>)> {
    let mut chars = format.chars();
    let kind = chars.next()?;
    let rest = chars.as_str();
    if rest.is_empty() {
        return Some((kind, None));
    }
    rest.parse().ok().map(|n| (kind, Some(n)))
}

fn format_integer(v: i128, format: Option<&str>) -> String {
    match format.and_then(split_format) {
        Some(('X', width)) => pad(format!("{:X}", v), width),
        Some(('x', width)) => pad(format!("{:x}", v), width),
        Some(('D' | 'd', width)) => {
            let digits = pad(v.unsigned_abs().to_string(), width);
            if v < 0 {
                format!("-{}", digits)
            } else {
                digits
            }
        }
        Some(_) => format_float(v as f64, format).unwrap_or_else(|| v.to_string()),
        None => v.to_string(),
    }
}

fn format_float(v: f64, format: Option<&str>) -> Option<String> {
    match format.and_then(split_format)? {
        ('F' | 'f', precision) => Some(format!("{:.*}", precision.unwrap_or(2), v)),
        ('E', precision) => Some(format!("{:.*E}", precision.unwrap_or(6), v)),
        ('e', precision) => Some(format!("{:.*e}", precision.unwrap_or(6), v)),
        _ => None,
    }
}

fn pad(digits: String, width: Option<usize>) -> String {
    match width {
        Some(width) if digits.len() < width => format!("{}{}", "0".repeat(width - digits.len()), digits),
        _ => digits,
    }
}

/// Parse text as a basic value.
///
/// Numbers and booleans tolerate surrounding whitespace; strings are taken
/// verbatim. A hexadecimal format string makes integers parse as hex.
pub fn parse_scalar(text: &str, ty: BasicType, format: Option<&str>) -> Result<Value> {
    let fail = || ModelError::Parse {
        text: text.to_string(),
        type_name: ty.type_name().to_string(),
    };
    let trimmed = text.trim();
    let hex = matches!(format.and_then(split_format), Some(('X' | 'x', _)));

    macro_rules! integer {
        ($t:ty, $variant:ident) => {{
            let parsed = if hex {
                <$t>::from_str_radix(trimmed, 16)
            } else {
                trimmed.parse::<$t>()
            };
            parsed.map(Value::$variant).map_err(|_| fail())
        }};
    }

    match ty {
        BasicType::String => Ok(Value::String(text.to_string())),
        BasicType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(fail()),
        },
        BasicType::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(fail()),
            }
        }
        BasicType::SByte => integer!(i8, Int8),
        BasicType::Int16 => integer!(i16, Int16),
        BasicType::Int32 => integer!(i32, Int32),
        BasicType::Int64 => integer!(i64, Int64),
        BasicType::Byte => integer!(u8, UInt8),
        BasicType::UInt16 => integer!(u16, UInt16),
        BasicType::UInt32 => integer!(u32, UInt32),
        BasicType::UInt64 => integer!(u64, UInt64),
        BasicType::Single => trimmed.parse().map(Value::Float).map_err(|_| fail()),
        BasicType::Double => trimmed.parse().map(Value::Double).map_err(|_| fail()),
    }
}

/// Convert a value to `ty` when it is a basic value of a compatible kind.
///
/// Used to coerce declared defaults (written as, say, an `i32` literal) to
/// the member's actual numeric type.
pub fn coerce_scalar(value: &Value, ty: BasicType) -> Option<Value> {
    if value.type_name().as_deref() == Some(ty.type_name()) {
        return Some(value.clone());
    }
    let text = format_scalar(value, None)?;
    parse_scalar(&text, ty, None).ok()
}
