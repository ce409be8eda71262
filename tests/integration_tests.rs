// Integration tests for tslog
// These tests write complete log files and read them back through the public API

use std::path::Path;
use tslog::{
    get_table_defs, get_time_series_data, ColumnDef, Error, LogReader, LogWriter, Record, TableId,
    Value, WriterOptions,
};
use tempfile::TempDir;

fn columns(names: &[&str]) -> Vec<ColumnDef> {
    names.iter().map(|n| ColumnDef::named(*n)).collect()
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}

/// Writes the two-table file used by several tests and returns (t0, t1)
fn write_scenario_a(path: &Path) -> (i64, i64) {
    let t0 = 1_700_000_000_000;
    let t1 = t0 + 1_000;

    let writer = LogWriter::create(path, b"scenario-a", WriterOptions::default()).unwrap();
    let gr1 = writer.define_table("gr1", "first group", 5, columns(&["a", "b"])).unwrap();
    writer.write_row(gr1, t0, ints(&[0, 1])).unwrap();
    writer.write_row(gr1, t0 + 5, ints(&[1, 2])).unwrap();
    writer.write_row(gr1, t0 + 10, ints(&[3, 4])).unwrap();
    writer.flush().unwrap();

    let gr2 = writer.define_table("gr2", "second group", 5, columns(&["a", "b"])).unwrap();
    writer.write_row(gr2, t1, ints(&[7, 8])).unwrap();
    writer.flush().unwrap();
    writer.close().unwrap();

    (t0, t1)
}

/// Two tables, three rows, queried back after reopening
#[test]
fn test_scenario_a() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scenario_a.tslog");
    let (t0, t1) = write_scenario_a(&path);

    let tables = get_table_defs(&path, |_| true).unwrap();
    let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["gr1", "gr2"]);
    assert_eq!(tables[0].sample_interval_millis, 5);
    assert_eq!(tables[1].description, "second group");

    let records: Vec<_> = get_time_series_data(&path, "gr1", t0 - 1, t0 + 100)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 3);

    let rows: Vec<(i64, Vec<Value>)> =
        records.iter().map(|r| (r.timestamp, r.values.clone())).collect();
    assert_eq!(
        rows,
        vec![(t0, ints(&[0, 1])), (t0 + 5, ints(&[1, 2])), (t0 + 10, ints(&[3, 4]))]
    );
    assert!(records.iter().all(|r| r.table_name() == "gr1"));

    let gr2: Vec<_> = get_time_series_data(&path, "gr2", t1, t1 + 1)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(gr2.len(), 1);
    assert_eq!(gr2[0].get("a"), Some(Value::Int(7)));
    assert_eq!(gr2[0].get("b"), Some(Value::Int(8)));
}

/// Mixed integer and float values come back exactly as written
#[test]
fn test_round_trip_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.tslog");

    let rows = vec![
        (10, vec![Value::Int(i64::MAX), Value::Float(0.1)]),
        (20, vec![Value::Int(i64::MIN), Value::Float(-1e300)]),
        (15, vec![Value::Int(0), Value::Float(f64::INFINITY)]),
    ];

    {
        let writer = LogWriter::create(&path, b"", WriterOptions::default()).unwrap();
        let id = writer.define_table("mixed", "", 5, columns(&["count", "ratio"])).unwrap();
        for (ts, values) in &rows {
            writer.write_row(id, *ts, values.clone()).unwrap();
        }
        writer.close().unwrap();
    }

    let read: Vec<(i64, Vec<Value>)> = get_time_series_data(&path, "mixed", i64::MIN, i64::MAX)
        .unwrap()
        .map(|r| r.unwrap())
        .map(|r| (r.timestamp, r.values))
        .collect();

    // Out-of-order timestamps keep their write order
    assert_eq!(read, rows);
}

/// Replaying a file never meets a block before its table definition
#[test]
fn test_schema_before_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("order.tslog");

    {
        let writer = LogWriter::create(&path, b"", WriterOptions::default()).unwrap();
        for i in 0..5 {
            let id = writer.define_table(&format!("t{}", i), "", 1, columns(&["v"])).unwrap();
            for ts in 0..20 {
                writer.write_row(id, ts, ints(&[ts * i])).unwrap();
            }
            if i % 2 == 0 {
                writer.flush().unwrap();
            }
        }
        writer.close().unwrap();
    }

    let mut reader = LogReader::open(&path).unwrap();
    let mut defined = Vec::new();
    let mut blocks = 0;
    while let Some(record) = reader.read().unwrap() {
        match record {
            Record::TableDef(table) => defined.push(table.id),
            Record::DataBlock(block) => {
                assert!(defined.contains(&block.table_id));
                blocks += 1;
            }
        }
    }
    assert_eq!(defined.len(), 5);
    assert!(blocks >= 5);
}

/// Defining the same table twice fails and does not add a definition
#[test]
fn test_duplicate_definition_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dup.tslog");

    {
        let writer = LogWriter::create(&path, b"", WriterOptions::default()).unwrap();
        writer.define_table("gr1", "", 5, columns(&["a", "b"])).unwrap();
        let result = writer.define_table("gr1", "", 5, columns(&["a", "b"]));
        assert!(matches!(result, Err(Error::DuplicateTable(name)) if name == "gr1"));

        // The writer stays usable
        writer.define_table("gr2", "", 5, columns(&["a"])).unwrap();
        writer.close().unwrap();
    }

    assert_eq!(get_table_defs(&path, |_| true).unwrap().len(), 2);
}

/// A row with the wrong number of values is rejected and never written
#[test]
fn test_arity_mismatch_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("arity.tslog");

    {
        let writer = LogWriter::create(&path, b"", WriterOptions::default()).unwrap();
        let id = writer.define_table("gr1", "", 5, columns(&["a", "b"])).unwrap();

        let result = writer.write_row(id, 1, ints(&[1, 2, 3]));
        assert!(matches!(result, Err(Error::SchemaMismatch { expected: 2, actual: 3, .. })));

        writer.write_row(id, 2, ints(&[4, 5])).unwrap();
        writer.close().unwrap();
    }

    let timestamps: Vec<i64> = get_time_series_data(&path, "gr1", 0, 100)
        .unwrap()
        .map(|r| r.unwrap().timestamp)
        .collect();
    assert_eq!(timestamps, vec![2]);
}

/// Rows for an id this writer never returned are rejected
#[test]
fn test_unknown_table_rejected() {
    let dir = TempDir::new().unwrap();
    let writer =
        LogWriter::create(dir.path().join("unknown.tslog"), b"", WriterOptions::default()).unwrap();

    let result = writer.write_row(TableId(0), 1, ints(&[1]));
    assert!(matches!(result, Err(Error::UnknownTable(TableId(0)))));
}

/// Flushing twice without new rows appends nothing
#[test]
fn test_idempotent_flush() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flush.tslog");

    let writer = LogWriter::create(&path, b"", WriterOptions::default()).unwrap();
    let id = writer.define_table("gr1", "", 5, columns(&["a"])).unwrap();
    writer.write_row(id, 1, ints(&[1])).unwrap();
    writer.flush().unwrap();

    let size = std::fs::metadata(&path).unwrap().len();
    writer.flush().unwrap();
    writer.flush().unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), size);
}

/// A reopened file keeps its tables and accepts more rows
#[test]
fn test_reopen_and_append() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reopen.tslog");
    let (t0, _) = write_scenario_a(&path);

    {
        let writer = LogWriter::open(&path, WriterOptions::default()).unwrap();
        let gr1 = writer.table_id("gr1").unwrap();
        writer.write_row(gr1, t0 + 15, ints(&[5, 6])).unwrap();
        let gr3 = writer.define_table("gr3", "", 5, columns(&["x"])).unwrap();
        assert_eq!(gr3, TableId(2));
        writer.close().unwrap();
    }

    let reader = {
        let mut reader = LogReader::open(&path).unwrap();
        while reader.read().unwrap().is_some() {}
        reader
    };
    assert_eq!(reader.header_blob(), Some(&b"scenario-a"[..]));
    assert_eq!(reader.tables().count(), 3);

    let count = get_time_series_data(&path, "gr1", t0, t0 + 100).unwrap().count();
    assert_eq!(count, 4);
}

/// The header blob is stored once and readable before any record
#[test]
fn test_header_blob() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("header.tslog");
    let writer = LogWriter::create(&path, b"agent=v2;host=db1", WriterOptions::default()).unwrap();

    let mut reader = LogReader::open(&path).unwrap();
    assert!(reader.read().unwrap().is_none());
    assert_eq!(reader.header_blob(), Some(&b"agent=v2;host=db1"[..]));

    writer.close().unwrap();
}

/// Files that are not logs are rejected instead of being read as empty
#[test]
fn test_foreign_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("foreign.bin");
    std::fs::write(&path, b"PK\x03\x04 definitely a zip").unwrap();

    let mut reader = LogReader::open(&path).unwrap();
    assert!(matches!(reader.read(), Err(Error::Corruption(_))));
    assert!(get_table_defs(&path, |_| true).is_err());
}
