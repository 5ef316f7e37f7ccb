//! Column types and typed values
//!
//! Every stored column value carries a one-byte type tag. TEXT tags encode
//! the string length as an offset past `TEXT_TAG_BASE`, so a tag alone tells
//! the decoder both the type and the payload width.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::Result;
use crate::ArgonError;

/// Tag of a TEXT value of length zero; length `n` is stored as `0x0C + n`
pub const TEXT_TAG_BASE: u8 = 0x0C;

/// Longest TEXT value whose tag still fits in one byte
pub const TEXT_MAX_LEN: usize = (u8::MAX - TEXT_TAG_BASE) as usize;

/// YEAR values are stored as a signed offset from this year
pub const YEAR_BASE: i16 = 2000;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";
const DATETIME_FORMAT_SPACED: &str = "%Y-%m-%d %H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";
const MILLIS_PER_DAY: i32 = 86_400_000;

// =============================================================================
// Data Type
// =============================================================================

/// Declared column type (and the NULL tag)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Null = 0x00,
    TinyInt = 0x01,
    SmallInt = 0x02,
    Int = 0x03,
    BigInt = 0x04,
    Float = 0x05,
    Double = 0x06,
    Year = 0x08,
    Time = 0x09,
    DateTime = 0x0A,
    Date = 0x0B,
    Text = 0x0C,
}

impl DataType {
    /// Decode a stored type tag into the type and its payload width
    pub fn from_tag(tag: u8) -> Result<(DataType, usize)> {
        let data_type = match tag {
            0x00 => DataType::Null,
            0x01 => DataType::TinyInt,
            0x02 => DataType::SmallInt,
            0x03 => DataType::Int,
            0x04 => DataType::BigInt,
            0x05 => DataType::Float,
            0x06 => DataType::Double,
            0x08 => DataType::Year,
            0x09 => DataType::Time,
            0x0A => DataType::DateTime,
            0x0B => DataType::Date,
            t if t >= TEXT_TAG_BASE => return Ok((DataType::Text, (t - TEXT_TAG_BASE) as usize)),
            other => {
                return Err(ArgonError::Codec(format!("Unknown type tag: {:#04x}", other)));
            }
        };
        // every non-text type has a fixed width
        Ok((data_type, data_type.fixed_size().unwrap_or(0)))
    }

    /// Payload width of fixed-width types; `None` for TEXT
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            DataType::Null => Some(0),
            DataType::TinyInt | DataType::Year => Some(1),
            DataType::SmallInt => Some(2),
            DataType::Int | DataType::Time | DataType::Float => Some(4),
            DataType::BigInt | DataType::Date | DataType::DateTime | DataType::Double => Some(8),
            DataType::Text => None,
        }
    }

    /// SQL name of the type, as stored in the catalog
    pub fn name(self) -> &'static str {
        match self {
            DataType::Null => "NULL",
            DataType::TinyInt => "TINYINT",
            DataType::SmallInt => "SMALLINT",
            DataType::Int => "INT",
            DataType::BigInt => "BIGINT",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Year => "YEAR",
            DataType::Time => "TIME",
            DataType::DateTime => "DATETIME",
            DataType::Date => "DATE",
            DataType::Text => "TEXT",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = ArgonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NULL" => Ok(DataType::Null),
            "TINYINT" => Ok(DataType::TinyInt),
            "SMALLINT" => Ok(DataType::SmallInt),
            "INT" | "INTEGER" => Ok(DataType::Int),
            "BIGINT" | "LONG" => Ok(DataType::BigInt),
            "FLOAT" | "REAL" => Ok(DataType::Float),
            "DOUBLE" => Ok(DataType::Double),
            "YEAR" => Ok(DataType::Year),
            "TIME" => Ok(DataType::Time),
            "DATETIME" => Ok(DataType::DateTime),
            "DATE" => Ok(DataType::Date),
            "TEXT" => Ok(DataType::Text),
            other => Err(ArgonError::ValueParse(format!("Unknown data type: {}", other))),
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// One typed, nullable column value
///
/// - `Year` holds the calendar year (stored on disk as `year - 2000`)
/// - `Time` holds milliseconds since midnight
/// - `Date` / `DateTime` hold milliseconds since the Unix epoch (UTC)
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Year(i16),
    Time(i32),
    DateTime(i64),
    Date(i64),
    Text(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::TinyInt(_) => DataType::TinyInt,
            Value::SmallInt(_) => DataType::SmallInt,
            Value::Int(_) => DataType::Int,
            Value::BigInt(_) => DataType::BigInt,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::Year(_) => DataType::Year,
            Value::Time(_) => DataType::Time,
            Value::DateTime(_) => DataType::DateTime,
            Value::Date(_) => DataType::Date,
            Value::Text(_) => DataType::Text,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Stored type tag (TEXT tags carry the length)
    pub fn tag(&self) -> u8 {
        match self {
            Value::Text(s) => TEXT_TAG_BASE + s.len().min(TEXT_MAX_LEN) as u8,
            other => other.data_type() as u8,
        }
    }

    /// Number of payload bytes this value occupies on disk
    pub fn payload_len(&self) -> usize {
        match self {
            Value::Text(s) => s.len(),
            other => other.data_type().fixed_size().unwrap_or(0),
        }
    }

    /// Parse a literal into a value of the given column type
    ///
    /// `null` (any case, unquoted) yields `Value::Null` for every type.
    pub fn parse(text: &str, data_type: DataType) -> Result<Value> {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("null") {
            return Ok(Value::Null);
        }
        // TEXT strips its own quotes below, so a quoted 'null' stays text
        let trimmed = match data_type {
            DataType::Text => trimmed,
            _ => strip_quotes(trimmed),
        };

        let invalid = || {
            ArgonError::ValueParse(format!("'{}' is not a valid {}", trimmed, data_type))
        };

        let value = match data_type {
            DataType::Null => return Err(invalid()),
            DataType::TinyInt => Value::TinyInt(trimmed.parse().map_err(|_| invalid())?),
            DataType::SmallInt => Value::SmallInt(trimmed.parse().map_err(|_| invalid())?),
            DataType::Int => Value::Int(trimmed.parse().map_err(|_| invalid())?),
            DataType::BigInt => Value::BigInt(trimmed.parse().map_err(|_| invalid())?),
            DataType::Float => Value::Float(trimmed.parse().map_err(|_| invalid())?),
            DataType::Double => Value::Double(trimmed.parse().map_err(|_| invalid())?),
            DataType::Year => {
                let year: i32 = trimmed.parse().map_err(|_| invalid())?;
                let offset = year - YEAR_BASE as i32;
                if offset < i8::MIN as i32 || offset > i8::MAX as i32 {
                    return Err(ArgonError::ValueParse(format!(
                        "YEAR {} is outside {}..={}",
                        year,
                        YEAR_BASE + i8::MIN as i16,
                        YEAR_BASE + i8::MAX as i16
                    )));
                }
                Value::Year(year as i16)
            }
            DataType::Time => {
                let time = NaiveTime::parse_from_str(trimmed, TIME_FORMAT).map_err(|_| invalid())?;
                Value::Time((time.num_seconds_from_midnight() * 1000) as i32)
            }
            DataType::Date => {
                let date = NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| invalid())?;
                let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
                Value::Date(midnight.and_utc().timestamp_millis())
            }
            DataType::DateTime => {
                let datetime = NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
                    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT_SPACED))
                    .map_err(|_| invalid())?;
                Value::DateTime(datetime.and_utc().timestamp_millis())
            }
            DataType::Text => Value::text(strip_quotes(trimmed))?,
        };
        Ok(value)
    }

    /// Build a TEXT value, rejecting strings too long for a type tag
    pub fn text(s: impl Into<String>) -> Result<Value> {
        let s = s.into();
        if s.len() > TEXT_MAX_LEN {
            return Err(ArgonError::TextTooLong {
                len: s.len(),
                max: TEXT_MAX_LEN,
            });
        }
        Ok(Value::Text(s))
    }
}

/// Strip one pair of matching single or double quotes
fn strip_quotes(text: &str) -> &str {
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Year(v) => write!(f, "{}", v),
            Value::Time(ms) => {
                let ms = ms.rem_euclid(MILLIS_PER_DAY) as u32;
                match NaiveTime::from_num_seconds_from_midnight_opt(ms / 1000, (ms % 1000) * 1_000_000) {
                    Some(time) => write!(f, "{}", time.format(TIME_FORMAT)),
                    None => write!(f, "{}ms", ms),
                }
            }
            Value::Date(ms) => match DateTime::from_timestamp_millis(*ms) {
                Some(dt) => write!(f, "{}", dt.format(DATE_FORMAT)),
                None => write!(f, "{}ms", ms),
            },
            Value::DateTime(ms) => match DateTime::from_timestamp_millis(*ms) {
                Some(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
                None => write!(f, "{}ms", ms),
            },
            Value::Text(s) => f.write_str(s),
        }
    }
}
