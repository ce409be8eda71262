//! Data blocks: one flushed batch of rows for one table.
//!
//! Rows are stored as millisecond offsets from the block's base timestamp,
//! which is the timestamp of the first row in the block. Offsets are signed,
//! so a block may hold rows whose timestamps go backwards; they are kept in
//! write order.

use crate::schema::TableId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single numeric sample.
///
/// Encoded as `{"Int": n}` or `{"Float": x}`. Floats that JSON cannot carry
/// (NaN and the infinities) are written as their IEEE-754 bit pattern in a
/// `"0x..."` string, so every float reads back bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "ValueRepr", try_from = "ValueRepr")]
pub enum Value {
    /// Integer sample, stored exactly.
    Int(i64),
    /// Floating point sample, stored bit for bit.
    Float(f64),
}

impl Value {
    /// The value as `f64`. Integers beyond 2^53 lose precision.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    /// The value as `i64` if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::Float(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Serialize, Deserialize)]
enum ValueRepr {
    Int(i64),
    Float(FloatRepr),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FloatRepr {
    Number(f64),
    Bits(String),
}

impl From<Value> for ValueRepr {
    fn from(value: Value) -> Self {
        match value {
            Value::Int(v) => ValueRepr::Int(v),
            Value::Float(v) if v.is_finite() => ValueRepr::Float(FloatRepr::Number(v)),
            Value::Float(v) => ValueRepr::Float(FloatRepr::Bits(format!("{:#018x}", v.to_bits()))),
        }
    }
}

impl TryFrom<ValueRepr> for Value {
    type Error = String;

    fn try_from(repr: ValueRepr) -> Result<Self, Self::Error> {
        match repr {
            ValueRepr::Int(v) => Ok(Value::Int(v)),
            ValueRepr::Float(FloatRepr::Number(v)) => Ok(Value::Float(v)),
            ValueRepr::Float(FloatRepr::Bits(bits)) => bits
                .strip_prefix("0x")
                .and_then(|hex| u64::from_str_radix(hex, 16).ok())
                .map(|bits| Value::Float(f64::from_bits(bits)))
                .ok_or_else(|| format!("invalid float bit pattern {:?}", bits)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

/// A row as stored in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Milliseconds relative to the block's base timestamp.
    pub offset_millis: i64,
    /// One value per column, in column order.
    pub values: Vec<Value>,
}

/// A row with its absolute timestamp reconstructed.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRow {
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// One value per column, in column order.
    pub values: Vec<Value>,
}

/// One batch of rows for a single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBlock {
    /// Table the rows belong to.
    pub table_id: TableId,
    /// Epoch milliseconds of the first row.
    pub base_timestamp: i64,
    /// Rows in write order.
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl DataBlock {
    /// Number of rows in the block.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the block holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Absolute timestamp of the given row.
    pub fn timestamp_of(&self, row: &Row) -> i64 {
        self.base_timestamp.wrapping_add(row.offset_millis)
    }

    /// Iterate rows with absolute timestamps.
    pub fn timed_rows(&self) -> impl Iterator<Item = (i64, &[Value])> + '_ {
        self.rows.iter().map(move |row| (self.timestamp_of(row), row.values.as_slice()))
    }

    /// Split the rows at `at` into two blocks, the second rebased on its
    /// own first row. Returns `None` unless both halves are non-empty.
    pub fn split_at(mut self, at: usize) -> Option<(DataBlock, DataBlock)> {
        if at == 0 || at >= self.rows.len() {
            return None;
        }
        let mut tail = self.rows.split_off(at);
        let tail_base = self.timestamp_of(&tail[0]);
        for row in &mut tail {
            row.offset_millis = self.timestamp_of(row).wrapping_sub(tail_base);
        }
        let tail = DataBlock { table_id: self.table_id, base_timestamp: tail_base, rows: tail };
        Some((self, tail))
    }

    /// Consume the block, yielding owned rows with absolute timestamps.
    pub fn into_timed_rows(self) -> impl Iterator<Item = TimedRow> {
        let base = self.base_timestamp;
        self.rows.into_iter().map(move |row| TimedRow {
            timestamp: base.wrapping_add(row.offset_millis),
            values: row.values,
        })
    }
}

/// Accumulates pending rows for one table until they are flushed.
#[derive(Debug)]
pub struct BlockBuilder {
    table_id: TableId,
    base_timestamp: Option<i64>,
    rows: Vec<Row>,
}

impl BlockBuilder {
    /// Create an empty builder for a table.
    pub fn new(table_id: TableId) -> Self {
        Self { table_id, base_timestamp: None, rows: Vec::new() }
    }

    /// Append a row. The first row fixes the block's base timestamp.
    pub fn add(&mut self, timestamp: i64, values: Vec<Value>) {
        let base = *self.base_timestamp.get_or_insert(timestamp);
        self.rows.push(Row { offset_millis: timestamp.wrapping_sub(base), values });
    }

    /// Number of pending rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are pending.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Take the pending rows as a block, leaving the builder empty.
    ///
    /// Returns `None` if nothing is pending.
    pub fn take(&mut self) -> Option<DataBlock> {
        let base_timestamp = self.base_timestamp.take()?;
        Some(DataBlock {
            table_id: self.table_id,
            base_timestamp,
            rows: std::mem::take(&mut self.rows),
        })
    }

    /// Put back rows taken by [`take`](Self::take) that could not be
    /// written, ahead of any row added since.
    pub fn restore(&mut self, block: DataBlock) {
        let mut rows = block.rows;
        if let Some(base) = self.base_timestamp.replace(block.base_timestamp) {
            rows.extend(self.rows.drain(..).map(|row| Row {
                offset_millis: base
                    .wrapping_add(row.offset_millis)
                    .wrapping_sub(block.base_timestamp),
                values: row.values,
            }));
        }
        self.rows = rows;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_offsets() {
        let mut builder = BlockBuilder::new(TableId(1));
        builder.add(1_000, vec![Value::Int(0)]);
        builder.add(1_005, vec![Value::Int(1)]);
        builder.add(1_010, vec![Value::Int(3)]);

        let block = builder.take().unwrap();
        assert_eq!(block.table_id, TableId(1));
        assert_eq!(block.base_timestamp, 1_000);
        let offsets: Vec<_> = block.rows.iter().map(|r| r.offset_millis).collect();
        assert_eq!(offsets, vec![0, 5, 10]);

        let timestamps: Vec<_> = block.timed_rows().map(|(ts, _)| ts).collect();
        assert_eq!(timestamps, vec![1_000, 1_005, 1_010]);
    }

    #[test]
    fn test_builder_take_resets() {
        let mut builder = BlockBuilder::new(TableId(0));
        assert!(builder.take().is_none());

        builder.add(50, vec![Value::Float(1.5)]);
        assert_eq!(builder.len(), 1);
        assert!(builder.take().is_some());
        assert!(builder.is_empty());

        builder.add(10, vec![Value::Float(2.5)]);
        let block = builder.take().unwrap();
        assert_eq!(block.base_timestamp, 10);
        assert_eq!(block.rows[0].offset_millis, 0);
    }

    #[test]
    fn test_out_of_order_rows_keep_write_order() {
        let mut builder = BlockBuilder::new(TableId(0));
        builder.add(100, vec![Value::Int(1)]);
        builder.add(90, vec![Value::Int(2)]);

        let rows: Vec<_> = builder.take().unwrap().into_timed_rows().collect();
        assert_eq!(rows[0].timestamp, 100);
        assert_eq!(rows[1].timestamp, 90);
        assert_eq!(rows[1].values, vec![Value::Int(2)]);
    }

    #[test]
    fn test_split_rebases_tail() {
        let mut builder = BlockBuilder::new(TableId(2));
        for ts in [100, 90, 130, 125] {
            builder.add(ts, vec![Value::Int(ts)]);
        }
        let block = builder.take().unwrap();
        let before: Vec<_> = block.clone().into_timed_rows().collect();

        let (head, tail) = block.split_at(2).unwrap();
        assert_eq!(head.base_timestamp, 100);
        assert_eq!(tail.base_timestamp, 130);
        assert_eq!(tail.table_id, TableId(2));
        assert_eq!(tail.rows[0].offset_millis, 0);
        assert_eq!(tail.rows[1].offset_millis, -5);

        let after: Vec<_> = head.into_timed_rows().chain(tail.into_timed_rows()).collect();
        assert_eq!(after, before);
    }

    #[test]
    fn test_split_needs_two_halves() {
        let mut builder = BlockBuilder::new(TableId(0));
        builder.add(1, vec![Value::Int(1)]);
        let block = builder.take().unwrap();
        assert!(block.clone().split_at(0).is_none());
        assert!(block.split_at(1).is_none());
    }

    #[test]
    fn test_restore_keeps_order() {
        let mut builder = BlockBuilder::new(TableId(0));
        builder.add(10, vec![Value::Int(1)]);
        builder.add(20, vec![Value::Int(2)]);
        let taken = builder.take().unwrap();

        builder.add(5, vec![Value::Int(3)]);
        builder.restore(taken);

        let rows: Vec<_> = builder.take().unwrap().into_timed_rows().collect();
        let timestamps: Vec<_> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20, 5]);
        assert_eq!(rows[2].values, vec![Value::Int(3)]);
    }

    #[test]
    fn test_value_encoding_is_self_describing() {
        let values = vec![Value::Int(-7), Value::Float(0.25)];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[{"Int":-7},{"Float":0.25}]"#);
    }

    #[test]
    fn test_non_finite_floats_keep_their_bits() {
        let quiet_nan = f64::from_bits(0x7ff8_0000_0000_0001);
        let values = vec![
            Value::Float(f64::INFINITY),
            Value::Float(f64::NEG_INFINITY),
            Value::Float(quiet_nan),
            Value::Float(-0.0),
            Value::Float(f64::MIN_POSITIVE),
            Value::Float(0.1 + 0.2),
        ];
        let json = serde_json::to_vec(&values).unwrap();
        let decoded: Vec<Value> = serde_json::from_slice(&json).unwrap();

        for (written, read) in values.iter().zip(&decoded) {
            match (written, read) {
                (Value::Float(a), Value::Float(b)) => assert_eq!(a.to_bits(), b.to_bits()),
                other => panic!("unexpected pair {:?}", other),
            }
        }
    }

    #[test]
    fn test_bad_float_bits_rejected() {
        let result: Result<Value, _> = serde_json::from_str(r#"{"Float":"nan"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(3i32), Value::Int(3));
        assert_eq!(Value::from(2.5f64), Value::Float(2.5));
        assert_eq!(Value::Int(4).as_f64(), 4.0);
        assert_eq!(Value::Float(4.0).as_i64(), None);
        assert_eq!(Value::Int(-7).to_string(), "-7");
    }
}
