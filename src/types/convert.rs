//! Built-in value converters, one per logical column type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use thiserror::Error;

use super::decimal::{round_decimal, truncate_decimal, DecimalError};
use crate::value::Value;

/// Fractional digits kept for NUMERIC values.
pub const NUMERIC_SCALE: u32 = 9;
/// Fractional digits kept for BIGNUMERIC values.
pub const BIGNUMERIC_SCALE: u32 = 38;

/// Errors that can occur while converting a source value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConvertError {
    #[error("no value to convert")]
    Null,

    #[error("cannot convert {got} to {target}")]
    Unsupported {
        target: &'static str,
        got: &'static str,
    },

    #[error("invalid {target} text '{text}'")]
    Parse { target: &'static str, text: String },

    #[error("{target} value out of range")]
    OutOfRange { target: &'static str },

    #[error(transparent)]
    Decimal(#[from] DecimalError),

    #[error("{0}")]
    Custom(String),
}

fn unsupported(target: &'static str, value: &Value) -> ConvertError {
    match value {
        Value::Null => ConvertError::Null,
        other => ConvertError::Unsupported {
            target,
            got: other.type_name(),
        },
    }
}

/// 1970-01-01
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

pub fn to_string(value: &Value) -> Result<Value, ConvertError> {
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        // Keeps the fractional part of whole numbers: 3.0 gives "3.0"
        Value::Float(f) => format!("{:?}", f),
        Value::Decimal(d) => d.clone(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
        Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        Value::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Value::Bytes(b) => String::from_utf8(b.clone()).map_err(|_| ConvertError::Unsupported {
            target: "string",
            got: "non-UTF-8 bytes",
        })?,
        other => return Err(unsupported("string", other)),
    };
    Ok(Value::String(s))
}

pub fn to_bool(value: &Value) -> Result<Value, ConvertError> {
    let b = match value {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => {
                return Err(ConvertError::Parse {
                    target: "bool",
                    text: s.clone(),
                })
            }
        },
        other => return Err(unsupported("bool", other)),
    };
    Ok(Value::Bool(b))
}

pub fn to_int64(value: &Value) -> Result<Value, ConvertError> {
    const TARGET: &str = "int64";
    let i = match value {
        Value::Int(i) => *i,
        Value::Bool(b) => *b as i64,
        Value::Float(f) => {
            // Truncates toward zero like an integer cast
            if !f.is_finite() || *f < i64::MIN as f64 || *f >= i64::MAX as f64 {
                return Err(ConvertError::OutOfRange { target: TARGET });
            }
            *f as i64
        }
        Value::String(s) => s.trim().parse().map_err(|_| ConvertError::Parse {
            target: TARGET,
            text: s.clone(),
        })?,
        Value::Decimal(d) => truncate_decimal(d)?
            .parse()
            .map_err(|_| ConvertError::OutOfRange { target: TARGET })?,
        other => return Err(unsupported(TARGET, other)),
    };
    Ok(Value::Int(i))
}

pub fn to_float64(value: &Value) -> Result<Value, ConvertError> {
    let f = match value {
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        Value::Bool(b) => *b as u8 as f64,
        Value::String(s) | Value::Decimal(s) => {
            s.trim().parse().map_err(|_| ConvertError::Parse {
                target: "float64",
                text: s.clone(),
            })?
        }
        other => return Err(unsupported("float64", other)),
    };
    Ok(Value::Float(f))
}

fn parse_time(s: &str) -> Result<NaiveTime, ConvertError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f").map_err(|_| ConvertError::Parse {
        target: "time",
        text: s.to_string(),
    })
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, ConvertError> {
    let t = s.trim();
    NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| parse_date(t).map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|_| ConvertError::Parse {
            target: "datetime",
            text: s.to_string(),
        })
}

fn parse_date(s: &str) -> Result<NaiveDate, ConvertError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| ConvertError::Parse {
        target: "date",
        text: s.to_string(),
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ConvertError> {
    match DateTime::parse_from_rfc3339(s.trim()) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        // Zone-less text is taken as UTC
        Err(_) => parse_datetime(s)
            .map(|dt| dt.and_utc())
            .map_err(|_| ConvertError::Parse {
                target: "timestamp",
                text: s.to_string(),
            }),
    }
}

/// Time of day as `HH:MM:SS.ffffff`.
pub fn to_time(value: &Value) -> Result<Value, ConvertError> {
    let t = match value {
        Value::Time(t) => *t,
        Value::DateTime(dt) => dt.time(),
        Value::Timestamp(ts) => ts.naive_utc().time(),
        Value::String(s) => parse_time(s)?,
        other => return Err(unsupported("time", other)),
    };
    Ok(Value::String(t.format("%H:%M:%S%.6f").to_string()))
}

/// Civil date-time as `YYYY-MM-DD HH:MM:SS.mmm` (truncated to milliseconds).
pub fn to_datetime(value: &Value) -> Result<Value, ConvertError> {
    let dt = match value {
        Value::DateTime(dt) => *dt,
        Value::Timestamp(ts) => ts.naive_utc(),
        Value::Date(d) => d.and_time(NaiveTime::MIN),
        Value::String(s) => parse_datetime(s)?,
        other => return Err(unsupported("datetime", other)),
    };
    Ok(Value::String(dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()))
}

/// Days since 1970-01-01; negative before the epoch.
pub fn to_date(value: &Value) -> Result<Value, ConvertError> {
    let d = match value {
        Value::Date(d) => *d,
        Value::DateTime(dt) => dt.date(),
        Value::Timestamp(ts) => ts.date_naive(),
        Value::String(s) => parse_date(s)?,
        Value::Int(days) => return Ok(Value::Int(*days)),
        other => return Err(unsupported("date", other)),
    };
    Ok(Value::Int(d.signed_duration_since(epoch()).num_days()))
}

/// Microseconds since the Unix epoch. Zone-less inputs are taken as UTC.
pub fn to_timestamp(value: &Value) -> Result<Value, ConvertError> {
    let ts = match value {
        Value::Timestamp(ts) => *ts,
        Value::DateTime(dt) => dt.and_utc(),
        Value::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
        Value::String(s) => parse_timestamp(s)?,
        Value::Int(micros) => return Ok(Value::Int(*micros)),
        other => return Err(unsupported("timestamp", other)),
    };
    Ok(Value::Int(ts.timestamp_micros()))
}

/// JSON text. Strings are assumed to hold JSON already; structured values
/// are serialized.
pub fn to_json(value: &Value) -> Result<Value, ConvertError> {
    match value {
        Value::Null => Err(ConvertError::Null),
        Value::String(s) => Ok(Value::String(s.clone())),
        other => serde_json::to_string(&serde_json::Value::from(other))
            .map(Value::String)
            .map_err(|e| ConvertError::Custom(e.to_string())),
    }
}

fn decimal_text(target: &'static str, value: &Value) -> Result<String, ConvertError> {
    match value {
        Value::Decimal(d) | Value::String(d) => Ok(d.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) if f.is_finite() => Ok(f.to_string()),
        Value::Float(_) => Err(ConvertError::OutOfRange { target }),
        other => Err(unsupported(target, other)),
    }
}

/// Decimal text rounded to 9 fractional digits.
pub fn to_numeric(value: &Value) -> Result<Value, ConvertError> {
    let text = decimal_text("numeric", value)?;
    Ok(Value::String(round_decimal(&text, NUMERIC_SCALE)?))
}

/// Decimal text rounded to 38 fractional digits.
pub fn to_bignumeric(value: &Value) -> Result<Value, ConvertError> {
    let text = decimal_text("bignumeric", value)?;
    Ok(Value::String(round_decimal(&text, BIGNUMERIC_SCALE)?))
}

/// Returns the value unchanged. Used for tags without a converter.
pub fn passthrough(value: &Value) -> Result<Value, ConvertError> {
    Ok(value.clone())
}
