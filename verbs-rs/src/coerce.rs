//! Raw token to [`Value`] coercion.
//!
//! | Type | Rule |
//! |---|---|
//! | string | as-is |
//! | bool | `true` / `false`, case-insensitive (switches never reach here) |
//! | numeric, char | native `str::parse` for the kind |
//! | datetime | RFC 3339, then `YYYY-MM-DD[ T]HH:MM:SS`, then `YYYY-MM-DD` (UTC) |
//! | enum | case-insensitive variant name |
//! | nullable(T) | as T |
//! | array(T) | `[...]` parsed as JSON, otherwise split on commas |
//! | custom | attached parser |
//! | anything else | JSON |

use chrono::{DateTime, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};

use crate::schema::{NumericKind, ParamType};
use crate::value::{widen_f32, Value};

/// Coerce one raw token into a value of type `ty`.
pub fn coerce(ty: &ParamType, raw: &str) -> Result<Value, String> {
    match ty {
        ParamType::String => Ok(Value::String(raw.to_string())),
        ParamType::Bool => parse_bool(raw).map(Value::Bool),
        ParamType::Numeric(kind) => parse_numeric(*kind, raw),
        ParamType::Char => parse_char(raw).map(Value::Char),
        ParamType::DateTime => parse_datetime(raw).map(Value::DateTime),
        ParamType::Enum(info) => info
            .lookup(raw)
            .map(|v| Value::Enum(v.to_string()))
            .ok_or_else(|| {
                format!(
                    "'{}' is not a valid {} (expected one of: {}).",
                    raw,
                    info.name,
                    info.variants.join(", ")
                )
            }),
        ParamType::Nullable(inner) => coerce(inner, raw),
        ParamType::Array(elem) => coerce_collection(elem, raw).map(Value::Array),
        ParamType::Custom(parser) => parser.parse(raw),
        ParamType::Json(_) => serde_json::from_str(raw)
            .map(Value::Json)
            .map_err(|e| e.to_string()),
        ParamType::Context | ParamType::Service(_) | ParamType::Cancellation => {
            Err("parameter is injected and cannot be read from the command line".to_string())
        }
    }
}

/// Collection rule: `[1,2,3]` and `1,2,3` produce the same elements.
pub fn coerce_collection(elem: &ParamType, raw: &str) -> Result<Vec<Value>, String> {
    let trimmed = raw.trim();

    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let items: Vec<serde_json::Value> =
            serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
        return items
            .into_iter()
            .map(|item| match (elem, item) {
                (ParamType::Json(_), item) => Ok(Value::Json(item)),
                (_, serde_json::Value::String(s)) => coerce(elem, &s),
                (_, other) => coerce(elem, &other.to_string()),
            })
            .collect();
    }

    if raw.is_empty() {
        return Ok(Vec::new());
    }

    raw.split(',')
        .map(|piece| match elem {
            ParamType::String => coerce(elem, piece),
            _ => coerce(elem, piece.trim()),
        })
        .collect()
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    if raw.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(format!("'{}' is not a valid boolean.", raw))
    }
}

fn parse_char(raw: &str) -> Result<char, String> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("'{}' is not a single character.", raw)),
    }
}

fn parse_numeric(kind: NumericKind, raw: &str) -> Result<Value, String> {
    fn int<T>(raw: &str) -> Result<Value, String>
    where
        T: std::str::FromStr<Err = std::num::ParseIntError> + Into<i64>,
    {
        raw.parse::<T>()
            .map(|n| Value::Int(n.into()))
            .map_err(|e| e.to_string())
    }

    fn uint<T>(raw: &str) -> Result<Value, String>
    where
        T: std::str::FromStr<Err = std::num::ParseIntError> + Into<u64>,
    {
        raw.parse::<T>()
            .map(|n| Value::UInt(n.into()))
            .map_err(|e| e.to_string())
    }

    match kind {
        NumericKind::I8 => int::<i8>(raw),
        NumericKind::I16 => int::<i16>(raw),
        NumericKind::I32 => int::<i32>(raw),
        NumericKind::I64 => int::<i64>(raw),
        NumericKind::U8 => uint::<u8>(raw),
        NumericKind::U16 => uint::<u16>(raw),
        NumericKind::U32 => uint::<u32>(raw),
        NumericKind::U64 => uint::<u64>(raw),
        NumericKind::F32 => raw
            .parse::<f32>()
            .map(|n| Value::Float(widen_f32(n)))
            .map_err(|e| e.to_string()),
        NumericKind::F64 => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| e.to_string()),
    }
}

fn parse_datetime(raw: &str) -> Result<DateTime<chrono::FixedOffset>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }

    let utc = Utc.fix();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| utc.from_utc_datetime(&naive))
        .ok_or_else(|| format!("'{}' is not a valid date/time.", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ArgValue;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn test_numeric_parse_and_range() {
        let i32_ty = i32::param_type();
        assert_eq!(coerce(&i32_ty, "-5").unwrap(), Value::Int(-5));
        assert!(coerce(&i32_ty, "abc").is_err());
        assert!(coerce(&u8::param_type(), "256").is_err());
        assert_eq!(coerce(&f64::param_type(), "1.5").unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_f32_keeps_its_decimal_spelling() {
        let value = coerce(&f32::param_type(), "1.1").unwrap();
        assert_eq!(value, Value::Float(1.1));
        assert_eq!(value.to_string(), "1.1");
        assert_eq!(Value::from(0.3f32).to_string(), "0.3");
        assert_eq!(f32::from_value(&value), Some(1.1f32));
    }

    #[test]
    fn test_collection_rule_json_and_comma_agree() {
        let elem = i32::param_type();
        assert_eq!(coerce_collection(&elem, "1,2,3").unwrap(), ints(&[1, 2, 3]));
        assert_eq!(coerce_collection(&elem, "[1,2,3]").unwrap(), ints(&[1, 2, 3]));
        assert_eq!(coerce_collection(&elem, "1, 2").unwrap(), ints(&[1, 2]));
    }

    #[test]
    fn test_collection_rule_for_strings() {
        let elem = ParamType::String;
        assert_eq!(
            coerce_collection(&elem, "a,b").unwrap(),
            vec![Value::from("a"), Value::from("b")]
        );
        assert_eq!(
            coerce_collection(&elem, r#"["a,b","c"]"#).unwrap(),
            vec![Value::from("a,b"), Value::from("c")]
        );
    }

    #[test]
    fn test_enum_is_case_insensitive() {
        let ty = ParamType::enumeration("Color", ["Red", "Green"]);
        assert_eq!(coerce(&ty, "red").unwrap(), Value::Enum("Red".into()));
        let err = coerce(&ty, "blue").unwrap_err();
        assert!(err.contains("Red, Green"));
    }

    #[test]
    fn test_datetime_formats() {
        let ty = ParamType::DateTime;
        assert!(coerce(&ty, "2024-11-24T12:34:56+09:00").is_ok());
        assert!(coerce(&ty, "2024-11-24 12:34:56").is_ok());
        let date = coerce(&ty, "2024-11-24").unwrap();
        assert_eq!(date.to_string(), "2024-11-24T00:00:00+00:00");
        assert!(coerce(&ty, "yesterday").is_err());
    }

    #[test]
    fn test_nullable_custom_and_json() {
        assert_eq!(
            coerce(&Option::<i32>::param_type(), "7").unwrap(),
            Value::Int(7)
        );

        let size = ParamType::custom("size", |raw| {
            let (w, h) = raw.split_once('x').ok_or("expected WxH")?;
            let w: i64 = w.parse().map_err(|_| "bad width")?;
            let h: i64 = h.parse().map_err(|_| "bad height")?;
            Ok(Value::Array(vec![Value::Int(w), Value::Int(h)]))
        });
        assert_eq!(coerce(&size, "3x4").unwrap(), Value::from(vec![3i64, 4]));
        assert!(coerce(&size, "3").is_err());

        let json = ParamType::json("Point");
        assert_eq!(
            coerce(&json, r#"{"x":1}"#).unwrap(),
            Value::Json(serde_json::json!({"x": 1}))
        );
        assert!(coerce(&json, "{oops").is_err());
    }

    #[test]
    fn test_char_and_bool() {
        assert_eq!(coerce(&ParamType::Char, "x").unwrap(), Value::Char('x'));
        assert!(coerce(&ParamType::Char, "xy").is_err());
        assert_eq!(
            coerce(&Option::<bool>::param_type(), "TRUE").unwrap(),
            Value::Bool(true)
        );
    }
}
