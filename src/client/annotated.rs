//! Annotated CSV decoding
//!
//! Flux query responses come back as annotated CSV:
//!
//! ```text
//! #datatype,string,long,dateTime:RFC3339,double,string
//! #group,false,false,false,false,true
//! #default,_result,,,,
//! ,result,table,_time,_value,host
//! ,,0,2021-07-07T12:00:00Z,0.5,a
//! ,,1,2021-07-07T12:00:00Z,0.7,b
//! ```
//!
//! Annotation rows describe the columns of the header that follows them, in
//! any order. The first annotation row after a header starts a new block, and
//! inside a block the `table` column tells which table a row belongs to.

use super::connector::ConnectorError;
use crate::result::{DataType, FluxColumn, FluxRecord, FluxTable, Value};
use chrono::DateTime;

#[derive(Default)]
struct Block {
    datatypes: Vec<String>,
    groups: Vec<String>,
    defaults: Vec<String>,
    header: Option<Vec<String>>,
}

impl Block {
    fn columns(&self) -> Vec<(usize, FluxColumn)> {
        let header = match &self.header {
            Some(h) => h,
            None => return Vec::new(),
        };

        header
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(i, name)| {
                let data_type = self
                    .datatypes
                    .get(i)
                    .map(|d| DataType::from_annotation(d))
                    .unwrap_or(DataType::String);
                let group = self.groups.get(i).map(|g| g == "true").unwrap_or(false);
                let default_value = self.defaults.get(i).filter(|d| !d.is_empty()).cloned();

                (
                    i,
                    FluxColumn {
                        name: name.clone(),
                        data_type,
                        group,
                        default_value,
                    },
                )
            })
            .collect()
    }

    fn is_error_block(&self) -> bool {
        match &self.header {
            Some(h) => {
                let names: Vec<&str> = h.iter().map(String::as_str).filter(|n| !n.is_empty()).collect();
                names == ["error", "reference"]
            }
            None => false,
        }
    }
}

/// Decode an annotated CSV body into result tables
pub fn decode(body: &str) -> Result<Vec<FluxTable>, ConnectorError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut tables: Vec<FluxTable> = Vec::new();
    let mut block = Block::default();
    let mut block_index = 0_usize;
    let mut columns: Vec<(usize, FluxColumn)> = Vec::new();
    // (block, value of the `table` column) of the table being filled
    let mut current: Option<(usize, String)> = None;

    for row in reader.records() {
        let row = row?;
        let cells: Vec<String> = row.iter().map(str::to_string).collect();
        let first = cells.first().map(String::as_str).unwrap_or("");

        if first.starts_with('#') {
            // any annotation after a header opens the next block
            if block.header.is_some() {
                block_index += 1;
                block = Block::default();
                columns.clear();
            }
            match first {
                "#datatype" => block.datatypes = cells.clone(),
                "#group" => block.groups = cells.clone(),
                "#default" => block.defaults = cells.clone(),
                _ => {}
            }
            continue;
        }

        if block.header.is_none() {
            block.header = Some(cells);
            columns = block.columns();
            continue;
        }

        if block.is_error_block() {
            let message = columns
                .iter()
                .find(|(_, c)| c.name == "error")
                .and_then(|(i, _)| cells.get(*i))
                .cloned()
                .unwrap_or_default();
            return Err(ConnectorError::Engine(message));
        }

        let table_id = columns
            .iter()
            .find(|(_, c)| c.name == "table")
            .and_then(|(i, _)| cells.get(*i))
            .cloned()
            .unwrap_or_default();
        let key = (block_index, table_id);

        if current.as_ref() != Some(&key) {
            tables.push(FluxTable {
                columns: columns.iter().map(|(_, c)| c.clone()).collect(),
                records: Vec::new(),
            });
            current = Some(key);
        }

        let table_index = tables.len() - 1;
        let mut record = FluxRecord {
            table: table_index,
            ..FluxRecord::default()
        };

        for (i, column) in &columns {
            let raw = cells.get(*i).map(String::as_str).unwrap_or("");
            let value = parse_cell(raw, column)?;
            record.values.insert(column.name.clone(), value);
        }

        if let Some(table) = tables.last_mut() {
            table.records.push(record);
        }
    }

    Ok(tables)
}

fn parse_cell(raw: &str, column: &FluxColumn) -> Result<Value, ConnectorError> {
    let raw = if raw.is_empty() {
        match &column.default_value {
            Some(d) => d.as_str(),
            None => return Ok(Value::Null),
        }
    } else {
        raw
    };

    let bad = |e: &dyn std::fmt::Display| {
        ConnectorError::Decode(format!("column `{}`: `{}`: {}", column.name, raw, e))
    };

    Ok(match column.data_type {
        DataType::String => Value::String(raw.to_string()),
        DataType::Double => Value::Double(parse_double(raw).map_err(|e| bad(&e))?),
        DataType::Boolean => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(bad(&"expected true or false")),
        },
        DataType::Long => Value::Long(raw.parse().map_err(|e| bad(&e))?),
        DataType::UnsignedLong => Value::UnsignedLong(raw.parse().map_err(|e| bad(&e))?),
        DataType::Duration => Value::Duration(raw.to_string()),
        DataType::Base64Binary => Value::Base64Binary(raw.to_string()),
        DataType::TimeRfc3339 | DataType::TimeRfc3339Nano => {
            Value::Time(DateTime::parse_from_rfc3339(raw).map_err(|e| bad(&e))?)
        }
    })
}

fn parse_double(raw: &str) -> Result<f64, std::num::ParseFloatError> {
    match raw {
        "+Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        _ => raw.parse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TABLES: &str = "\
#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,double,string,string,string
#group,false,false,true,true,false,false,true,true,true
#default,_result,,,,,,,,
,result,table,_start,_stop,_time,_value,_field,_measurement,host
,,0,2021-07-07T00:00:00Z,2021-07-08T00:00:00Z,2021-07-07T12:00:00Z,0.5,usage,cpu,a
,,0,2021-07-07T00:00:00Z,2021-07-08T00:00:00Z,2021-07-07T12:01:00Z,0.75,usage,cpu,a
,,1,2021-07-07T00:00:00Z,2021-07-08T00:00:00Z,2021-07-07T12:00:00Z,0.25,usage,cpu,b

";

    #[test]
    fn test_two_tables() {
        let tables = decode(TWO_TABLES).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].len(), 2);
        assert_eq!(tables[1].len(), 1);

        let rec = &tables[0].records[1];
        assert_eq!(rec.table, 0);
        assert_eq!(rec.get("result"), Some(&Value::String("_result".to_string())));
        assert_eq!(rec.get("table"), Some(&Value::Long(0)));
        assert_eq!(rec.value(), Some(&Value::Double(0.75)));
        assert_eq!(rec.field(), Some("usage"));
        assert_eq!(
            rec.time().map(|t| t.to_rfc3339()),
            Some("2021-07-07T12:01:00+00:00".to_string())
        );

        assert_eq!(tables[1].records[0].get("host"), Some(&Value::from("b")));
        assert_eq!(
            tables[0].group_key(),
            vec!["_start", "_stop", "_field", "_measurement", "host"]
        );
    }

    #[test]
    fn test_empty_body() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("\r\n\r\n").unwrap().is_empty());
    }

    #[test]
    fn test_multiple_blocks() {
        let body = "\
#datatype,string,long,long
#group,false,false,false
#default,_result,,
,result,table,n
,,0,1

#datatype,string,long,boolean,unsignedLong
#group,false,false,false,false
#default,other,,,
,result,table,ok,count
,,0,true,7
,,0,,8
";
        let tables = decode(body).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].records[0].get("n"), Some(&Value::Long(1)));

        let second = &tables[1];
        assert_eq!(second.records.len(), 2);
        assert_eq!(second.records[0].get("ok"), Some(&Value::Bool(true)));
        assert_eq!(second.records[0].get("count"), Some(&Value::UnsignedLong(7)));
        assert_eq!(second.records[1].get("ok"), Some(&Value::Null));
        assert_eq!(second.records[1].get("result"), Some(&Value::from("other")));
    }

    #[test]
    fn test_records_keep_header_order() {
        let tables = decode(TWO_TABLES).unwrap();
        let columns: Vec<&str> = tables[0].records[0].values.keys().collect();
        assert_eq!(
            columns,
            vec!["result", "table", "_start", "_stop", "_time", "_value", "_field", "_measurement", "host"]
        );
    }

    #[test]
    fn test_annotation_order_does_not_matter() {
        let body = "\
#group,false,false,true,false
#default,_result,,,
#datatype,string,long,string,double
,result,table,host,_value
,,0,a,0.5

#default,second,,
#datatype,string,long,long
#group,false,false,true
,result,table,n
,,0,
";
        let tables = decode(body).unwrap();
        assert_eq!(tables.len(), 2);

        let first = &tables[0];
        assert_eq!(first.group_key(), vec!["host"]);
        assert_eq!(first.records[0].get("result"), Some(&Value::from("_result")));
        assert_eq!(first.records[0].value(), Some(&Value::Double(0.5)));

        let second = &tables[1];
        assert_eq!(second.group_key(), vec!["n"]);
        assert_eq!(second.records[0].get("result"), Some(&Value::from("second")));
        assert_eq!(second.records[0].get("n"), Some(&Value::Null));
    }

    #[test]
    fn test_engine_error_block() {
        let body = "\
#datatype,string,string
#group,true,true
#default,,
,error,reference
,\"failed to execute query: bucket not found\",
";
        match decode(body) {
            Err(ConnectorError::Engine(msg)) => {
                assert_eq!(msg, "failed to execute query: bucket not found")
            }
            other => panic!("expected engine error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_cell_is_a_decode_error() {
        let body = "\
#datatype,string,long,double
#group,false,false,false
#default,_result,,
,result,table,_value
,,0,not-a-number
";
        assert!(matches!(decode(body), Err(ConnectorError::Decode(_))));
    }

    #[test]
    fn test_header_without_annotations() {
        let body = ",result,table,_value\n,_result,0,1.5\n";
        let tables = decode(body).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0].records[0].get("_value"),
            Some(&Value::String("1.5".to_string()))
        );
    }
}
