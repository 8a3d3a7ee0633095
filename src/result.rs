//! Query results
//!
//! The connector hands back [`FluxTable`]s with typed cells. The shaper turns
//! them into plain [`Record`] mappings: a structural flatten that keeps input
//! order and does no conversion of its own.

use chrono::{DateTime, FixedOffset};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Index;

/// A single typed cell of a result table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    String(String),
    Double(f64),
    Long(i64),
    UnsignedLong(u64),
    Bool(bool),
    Time(DateTime<FixedOffset>),
    /// Flux duration text, e.g. `1h30m`
    Duration(String),
    Base64Binary(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Duration(s) | Self::Base64Binary(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the cell, converting integers to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Long(v) => Some(*v as f64),
            Self::UnsignedLong(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            Self::UnsignedLong(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::Time(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::String(s) | Self::Duration(s) | Self::Base64Binary(s) => f.write_str(s),
            Self::Double(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
            Self::UnsignedLong(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Time(t) => f.write_str(&t.to_rfc3339()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(t: DateTime<FixedOffset>) -> Self {
        Self::Time(t)
    }
}

/// Column data types announced by the `#datatype` annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Double,
    Boolean,
    Long,
    UnsignedLong,
    Duration,
    Base64Binary,
    TimeRfc3339,
    TimeRfc3339Nano,
}

impl DataType {
    /// Parse from annotation text, unknown types fall back to `String`
    pub fn from_annotation(s: &str) -> Self {
        match s {
            "double" => Self::Double,
            "boolean" => Self::Boolean,
            "long" => Self::Long,
            "unsignedLong" => Self::UnsignedLong,
            "duration" => Self::Duration,
            "base64Binary" => Self::Base64Binary,
            "dateTime:RFC3339" => Self::TimeRfc3339,
            "dateTime:RFC3339Nano" => Self::TimeRfc3339Nano,
            _ => Self::String,
        }
    }
}

/// Column metadata of a result table
#[derive(Debug, Clone, PartialEq)]
pub struct FluxColumn {
    pub name: String,
    pub data_type: DataType,
    /// Part of the table's group key
    pub group: bool,
    pub default_value: Option<String>,
}

/// One row of a result table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FluxRecord {
    /// Index of the table this row belongs to
    pub table: usize,
    pub values: Record,
}

impl FluxRecord {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn time(&self) -> Option<&DateTime<FixedOffset>> {
        self.get("_time").and_then(Value::as_time)
    }

    pub fn value(&self) -> Option<&Value> {
        self.get("_value")
    }

    pub fn field(&self) -> Option<&str> {
        self.get("_field").and_then(Value::as_str)
    }

    pub fn measurement(&self) -> Option<&str> {
        self.get("_measurement").and_then(Value::as_str)
    }
}

/// A result table: shared column metadata plus its rows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FluxTable {
    pub columns: Vec<FluxColumn>,
    pub records: Vec<FluxRecord>,
}

impl FluxTable {
    /// Names of the columns that form the group key
    pub fn group_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.group)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A flattened result row: column name to typed value, in table column order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    cells: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, keeping its position if it is already present
    pub fn insert(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        let column = column.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.cells.push((column, value));
                None
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, column: &str) -> &Value {
        match self.get(column) {
            Some(value) => value,
            None => panic!("no column `{}` in record", column),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Flatten tables into one record per row, in input order
pub fn shape_records(tables: impl IntoIterator<Item = FluxTable>) -> Vec<Record> {
    tables
        .into_iter()
        .flat_map(|table| table.records.into_iter().map(|r| r.values))
        .collect()
}

/// Keep the table dimension: one list of records per table
pub fn shape_tables(tables: impl IntoIterator<Item = FluxTable>) -> Vec<Vec<Record>> {
    tables
        .into_iter()
        .map(|table| table.records.into_iter().map(|r| r.values).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn record(table: usize, cells: &[(&str, Value)]) -> FluxRecord {
        FluxRecord {
            table,
            values: cells
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        assert!(shape_records(Vec::new()).is_empty());
        assert!(shape_tables(Vec::new()).is_empty());

        let empty_table = FluxTable::default();
        assert!(shape_records(vec![empty_table]).is_empty());
    }

    #[test]
    fn test_single_record() {
        let t = time("2021-07-07T12:00:00Z");
        let table = FluxTable {
            columns: Vec::new(),
            records: vec![record(0, &[("_time", t.into()), ("value", 5_i64.into())])],
        };

        let shaped = shape_records(vec![table]);
        assert_eq!(shaped.len(), 1);

        let mut expected = Record::new();
        expected.insert("_time".to_string(), Value::Time(t));
        expected.insert("value".to_string(), Value::Long(5));
        assert_eq!(shaped[0], expected);
    }

    #[test]
    fn test_order_is_preserved_across_tables() {
        let tables = vec![
            FluxTable {
                columns: Vec::new(),
                records: vec![
                    record(0, &[("n", 1_i64.into())]),
                    record(0, &[("n", 2_i64.into())]),
                ],
            },
            FluxTable {
                columns: Vec::new(),
                records: vec![record(1, &[("n", 3_i64.into())])],
            },
        ];

        let flat: Vec<i64> = shape_records(tables.clone())
            .iter()
            .filter_map(|r| r["n"].as_i64())
            .collect();
        assert_eq!(flat, vec![1, 2, 3]);

        let nested = shape_tables(tables);
        assert_eq!(nested.len(), 2);
        assert_eq!(nested[0].len(), 2);
        assert_eq!(nested[1][0]["n"], Value::Long(3));
    }

    #[test]
    fn test_record_accessors() {
        let rec = record(
            0,
            &[
                ("_time", time("2021-07-07T12:00:00Z").into()),
                ("_value", 0.5.into()),
                ("_field", "usage".into()),
                ("_measurement", "cpu".into()),
            ],
        );

        assert_eq!(rec.field(), Some("usage"));
        assert_eq!(rec.measurement(), Some("cpu"));
        assert_eq!(rec.value().and_then(Value::as_f64), Some(0.5));
        assert!(rec.time().is_some());
    }

    #[test]
    fn test_value_json() {
        let mut rec = Record::new();
        rec.insert("c".to_string(), Value::from("x"));
        rec.insert("a".to_string(), Value::Long(1));
        rec.insert("b".to_string(), Value::Null);

        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"c":"x","a":1,"b":null}"#);
    }

    #[test]
    fn test_record_keeps_column_order() {
        let mut rec: Record = [
            ("result", Value::from("_result")),
            ("table", Value::Long(0)),
            ("_time", time("2021-07-07T12:00:00Z").into()),
            ("_value", Value::Double(0.5)),
        ]
        .into_iter()
        .collect();

        assert_eq!(rec.keys().collect::<Vec<_>>(), vec!["result", "table", "_time", "_value"]);

        assert_eq!(rec.insert("table", Value::Long(1)), Some(Value::Long(0)));
        assert_eq!(rec.len(), 4);
        assert_eq!(rec["table"], Value::Long(1));
        assert_eq!(rec.keys().nth(1), Some("table"));
        assert!(!rec.contains("host"));
    }

    #[test]
    fn test_group_key() {
        let table = FluxTable {
            columns: vec![
                FluxColumn {
                    name: "host".to_string(),
                    data_type: DataType::String,
                    group: true,
                    default_value: None,
                },
                FluxColumn {
                    name: "_value".to_string(),
                    data_type: DataType::Double,
                    group: false,
                    default_value: None,
                },
            ],
            records: Vec::new(),
        };
        assert_eq!(table.group_key(), vec!["host"]);
        assert_eq!(DataType::from_annotation("dateTime:RFC3339"), DataType::TimeRfc3339);
        assert_eq!(DataType::from_annotation("mystery"), DataType::String);
    }
}
