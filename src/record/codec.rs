//! Record Codec
//!
//! Pure value <-> bytes conversion, no I/O.
//!
//! ## Record Layout (table leaf cell)
//! ```text
//! ┌────────────┬───────────┬───────────┬────────────────┬──────────────────┐
//! │ Length (2) │ RowId (4) │ NCols (1) │ Tags (1/col)   │ Payloads         │
//! └────────────┴───────────┴───────────┴────────────────┴──────────────────┘
//! Length = 1 + NCols + sum(payload widths)   (the body after RowId)
//! ```
//! NULL columns contribute only their tag byte. TEXT widths come from the tag.

use bytes::{Buf, BufMut};

use crate::error::Result;
use crate::ArgonError;

use super::types::{DataType, Value, TEXT_MAX_LEN, YEAR_BASE};
use super::RowId;

/// Bytes preceding the record body: length (2) + row id (4)
pub const RECORD_HEADER_SIZE: usize = 6;

// =============================================================================
// Record
// =============================================================================

/// One stored row: its row id plus one value per column
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub row_id: RowId,
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(row_id: RowId, values: Vec<Value>) -> Self {
        Self { row_id, values }
    }

    /// Length of the body: column count, tags and payloads
    pub fn body_len(&self) -> usize {
        body_len(&self.values)
    }

    /// Size of the encoded leaf cell
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.body_len()
    }

    /// Encode as a table leaf cell
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body_len = self.body_len();
        if body_len > u16::MAX as usize || self.values.len() > u8::MAX as usize {
            return Err(ArgonError::Codec(format!(
                "Record {} too large to encode ({} columns, {} bytes)",
                self.row_id,
                self.values.len(),
                body_len
            )));
        }

        let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + body_len);
        buf.put_u16(body_len as u16);
        buf.put_u32(self.row_id);
        encode_body(&self.values, &mut buf)?;
        Ok(buf)
    }

    /// Decode a table leaf cell
    pub fn decode(cell: &[u8]) -> Result<Self> {
        let mut buf = cell;
        ensure(&buf, RECORD_HEADER_SIZE, "record header")?;
        let body_len = buf.get_u16() as usize;
        let row_id = buf.get_u32();
        ensure(&buf, body_len, "record body")?;
        let values = decode_body(&mut &buf[..body_len])?;
        Ok(Self { row_id, values })
    }
}

// =============================================================================
// Body Encoding
// =============================================================================

/// Length of `[ncols][tags][payloads]` for the given values
pub fn body_len(values: &[Value]) -> usize {
    1 + values.len() + values.iter().map(Value::payload_len).sum::<usize>()
}

/// Write `[ncols][tags][payloads]`
pub fn encode_body(values: &[Value], buf: &mut impl BufMut) -> Result<()> {
    buf.put_u8(values.len() as u8);
    for value in values {
        check_text(value)?;
        buf.put_u8(value.tag());
    }
    for value in values {
        encode_value(value, buf)?;
    }
    Ok(())
}

/// Read `[ncols][tags][payloads]`
pub fn decode_body(buf: &mut impl Buf) -> Result<Vec<Value>> {
    ensure(&*buf, 1, "column count")?;
    let count = buf.get_u8() as usize;
    ensure(&*buf, count, "type tags")?;
    let tags: Vec<u8> = (0..count).map(|_| buf.get_u8()).collect();
    tags.into_iter().map(|tag| decode_value(tag, buf)).collect()
}

// =============================================================================
// Value Encoding
// =============================================================================

/// Write the payload bytes of one value (nothing for NULL)
pub fn encode_value(value: &Value, buf: &mut impl BufMut) -> Result<()> {
    match value {
        Value::Null => {}
        Value::TinyInt(v) => buf.put_i8(*v),
        Value::SmallInt(v) => buf.put_i16(*v),
        Value::Int(v) => buf.put_i32(*v),
        Value::BigInt(v) => buf.put_i64(*v),
        Value::Float(v) => buf.put_f32(*v),
        Value::Double(v) => buf.put_f64(*v),
        Value::Year(year) => {
            let offset = *year as i32 - YEAR_BASE as i32;
            if offset < i8::MIN as i32 || offset > i8::MAX as i32 {
                return Err(ArgonError::Codec(format!("YEAR {} cannot be stored", year)));
            }
            buf.put_i8(offset as i8)
        }
        Value::Time(v) => buf.put_i32(*v),
        Value::DateTime(v) | Value::Date(v) => buf.put_i64(*v),
        Value::Text(s) => {
            check_text(value)?;
            buf.put_slice(s.as_bytes())
        }
    }
    Ok(())
}

/// Read the payload of one value given its stored tag
pub fn decode_value(tag: u8, buf: &mut impl Buf) -> Result<Value> {
    let (data_type, width) = DataType::from_tag(tag)?;
    ensure(&*buf, width, data_type.name())?;

    let value = match data_type {
        DataType::Null => Value::Null,
        DataType::TinyInt => Value::TinyInt(buf.get_i8()),
        DataType::SmallInt => Value::SmallInt(buf.get_i16()),
        DataType::Int => Value::Int(buf.get_i32()),
        DataType::BigInt => Value::BigInt(buf.get_i64()),
        DataType::Float => Value::Float(buf.get_f32()),
        DataType::Double => Value::Double(buf.get_f64()),
        DataType::Year => Value::Year(YEAR_BASE + buf.get_i8() as i16),
        DataType::Time => Value::Time(buf.get_i32()),
        DataType::DateTime => Value::DateTime(buf.get_i64()),
        DataType::Date => Value::Date(buf.get_i64()),
        DataType::Text => {
            let mut raw = vec![0u8; width];
            buf.copy_to_slice(&mut raw);
            let text = String::from_utf8(raw)
                .map_err(|e| ArgonError::Codec(format!("TEXT value is not UTF-8: {}", e)))?;
            Value::Text(text)
        }
    };
    Ok(value)
}

// =============================================================================
// Private Helpers
// =============================================================================

fn ensure(buf: &impl Buf, needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(ArgonError::Codec(format!(
            "Truncated {}: need {} bytes, have {}",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

fn check_text(value: &Value) -> Result<()> {
    match value {
        Value::Text(s) if s.len() > TEXT_MAX_LEN => Err(ArgonError::TextTooLong {
            len: s.len(),
            max: TEXT_MAX_LEN,
        }),
        _ => Ok(()),
    }
}
