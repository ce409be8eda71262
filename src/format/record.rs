//! Record framing and payload codecs.
//!
//! Each record consists of:
//! - Type (1 byte): TableDef or DataBlock
//! - Length (4 bytes): Length of the payload
//! - Payload (variable): JSON-encoded table definition or data block
//!
//! Payloads keep their field names, so a reader skips fields it does not
//! know and defaults optional fields an older writer did not write.

use crate::block::{DataBlock, Row, Value};
use crate::error::{Error, Result};
use crate::schema::{TableDef, TableId};
use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Size of the frame header (type + length)
pub const FRAME_HEADER_SIZE: usize = 5;

/// Record types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Definition of a new table
    TableDef = 1,
    /// Batch of rows for a defined table
    DataBlock = 2,
}

impl RecordType {
    /// Convert from u8, `None` for tags this version does not know.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(RecordType::TableDef),
            2 => Some(RecordType::DataBlock),
            _ => None,
        }
    }
}

/// A complete record located in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Raw type tag.
    pub tag: u8,
    /// Payload bytes.
    pub payload: &'a [u8],
}

impl Frame<'_> {
    /// Total encoded size of the frame.
    pub fn encoded_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }
}

/// Frame a payload.
///
/// Format: [type: u8][length: u32][payload: bytes]
pub fn encode_frame(record_type: RecordType, payload: &[u8]) -> Result<Vec<u8>> {
    let length = u32::try_from(payload.len()).map_err(|_| {
        Error::invalid_argument(format!("record payload too large: {} bytes", payload.len()))
    })?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_u8(record_type as u8);
    buf.put_u32_le(length);
    buf.put_slice(payload);
    Ok(buf.to_vec())
}

/// Locate the next complete frame at the start of `data`.
///
/// Returns `None` if `data` ends before the frame does. A declared length
/// above `max_record_size` is treated as corruption.
pub fn decode_frame(mut data: &[u8], max_record_size: usize) -> Result<Option<Frame<'_>>> {
    if data.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let tag = data.get_u8();
    let length = data.get_u32_le() as usize;

    if length > max_record_size {
        return Err(Error::corruption(format!(
            "Record length {} exceeds limit {}",
            length, max_record_size
        )));
    }
    if data.len() < length {
        return Ok(None);
    }

    Ok(Some(Frame { tag, payload: &data[..length] }))
}

/// Encode a table definition as a complete framed record.
pub fn encode_table_def(table: &TableDef) -> Result<Vec<u8>> {
    encode_payload(RecordType::TableDef, table)
}

/// Encode a data block as a complete framed record.
pub fn encode_data_block(block: &DataBlock) -> Result<Vec<u8>> {
    encode_payload(RecordType::DataBlock, block)
}

/// Encode a data block as one or more framed records, none with a payload
/// above `max_payload` bytes.
///
/// A block that is too large is halved until every part fits. Each part is
/// rebased on its own first row, and the parts are returned in row order.
/// Fails if a single row does not fit on its own.
pub fn encode_data_blocks(block: &DataBlock, max_payload: usize) -> Result<Vec<Vec<u8>>> {
    let payload = serde_json::to_vec(block)?;
    if payload.len() <= max_payload {
        return Ok(vec![encode_frame(RecordType::DataBlock, &payload)?]);
    }

    let mut records = Vec::new();
    let mut parts = vec![block.clone()];
    while let Some(part) = parts.pop() {
        let payload = serde_json::to_vec(&part)?;
        if payload.len() <= max_payload {
            records.push(encode_frame(RecordType::DataBlock, &payload)?);
            continue;
        }

        let mid = part.len() / 2;
        match part.split_at(mid) {
            Some((head, tail)) => {
                parts.push(tail);
                parts.push(head);
            }
            None => {
                return Err(Error::invalid_argument(format!(
                    "a single row of table {} encodes to {} bytes, above the {} byte record limit",
                    block.table_id,
                    payload.len(),
                    max_payload
                )));
            }
        }
    }
    Ok(records)
}

/// Upper bound on the payload of a one-row block for a table with
/// `column_count` columns.
pub fn max_single_row_payload(column_count: usize) -> Result<usize> {
    // Widest encodings: i64::MIN for integers, a 17-digit subnormal for floats
    let block = DataBlock {
        table_id: TableId(u32::MAX),
        base_timestamp: i64::MIN,
        rows: vec![Row {
            offset_millis: i64::MIN,
            values: vec![Value::Float(-f64::MIN_POSITIVE); column_count],
        }],
    };
    Ok(serde_json::to_vec(&block)?.len())
}

/// Decode a table definition payload. The returned id is unassigned.
pub fn decode_table_def(payload: &[u8]) -> Result<TableDef> {
    decode_payload(payload, "table definition")
}

/// Decode a data block payload.
pub fn decode_data_block(payload: &[u8]) -> Result<DataBlock> {
    decode_payload(payload, "data block")
}

fn encode_payload<T: Serialize>(record_type: RecordType, value: &T) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(value)?;
    encode_frame(record_type, &payload)
}

fn decode_payload<T: DeserializeOwned>(payload: &[u8], what: &str) -> Result<T> {
    serde_json::from_slice(payload)
        .map_err(|e| Error::corruption(format!("Undecodable {}: {}", what, e)))
}
