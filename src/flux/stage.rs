//! Pipeline stages
//!
//! One [`Stage`] is one Flux function call in a `|>` pipeline. Rendering is a
//! pure function of the stage's parameters; parameter validation happens in the
//! constructors so a stage that exists can always be rendered.

use super::literal::{escape_string, FluxDuration};
use super::predicate::Predicate;
use crate::error::{FluxError, FluxResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed between rendered stages
pub const PIPE: &str = "\n|> ";

/// Default `rowKey` of `pivot()`
pub const DEFAULT_PIVOT_ROW_KEY: &str = "_time";
/// Default `columnKey` of `pivot()`
pub const DEFAULT_PIVOT_COLUMN_KEY: &str = "_field";
/// Default `valueColumn` of `pivot()`
pub const DEFAULT_PIVOT_VALUE_COLUMN: &str = "_value";

/// One bound of a `range()` call
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    /// Passed through verbatim, e.g. `-1d` or `2021-01-01T00:00:00Z`
    Raw(String),
    /// Absolute timestamp, rendered as RFC3339
    Absolute(DateTime<Utc>),
    /// Unix timestamp in seconds
    Unix(i64),
    /// `now()`
    Now,
}

impl RangeBound {
    fn validate(&self) -> FluxResult<()> {
        match self {
            Self::Raw(s) if s.trim().is_empty() => {
                Err(FluxError::invalid_stage("range bound must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(s) => f.write_str(s.trim()),
            Self::Absolute(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Unix(secs) => write!(f, "{}", secs),
            Self::Now => f.write_str("now()"),
        }
    }
}

impl From<&str> for RangeBound {
    fn from(s: &str) -> Self {
        Self::Raw(s.to_string())
    }
}

impl From<String> for RangeBound {
    fn from(s: String) -> Self {
        Self::Raw(s)
    }
}

impl From<DateTime<Utc>> for RangeBound {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Absolute(t)
    }
}

impl From<i64> for RangeBound {
    fn from(secs: i64) -> Self {
        Self::Unix(secs)
    }
}

impl From<FluxDuration> for RangeBound {
    fn from(d: FluxDuration) -> Self {
        Self::Raw(d.into())
    }
}

/// `mode` parameter of `group()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    By,
    Except,
}

impl fmt::Display for GroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::By => f.write_str("by"),
            Self::Except => f.write_str("except"),
        }
    }
}

/// Aggregate functions usable alone or inside `aggregateWindow()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    Mean,
    Median,
    Sum,
    Min,
    Max,
    Count,
    First,
    Last,
    Stddev,
    Spread,
}

impl AggregateFn {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mean" | "avg" | "average" => Some(Self::Mean),
            "median" => Some(Self::Median),
            "sum" => Some(Self::Sum),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "count" => Some(Self::Count),
            "first" => Some(Self::First),
            "last" => Some(Self::Last),
            "stddev" => Some(Self::Stddev),
            "spread" => Some(Self::Spread),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
            Self::First => "first",
            Self::Last => "last",
            Self::Stddev => "stddev",
            Self::Spread => "spread",
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window of an `aggregateWindow()` call
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateWindow {
    pub every: FluxDuration,
    pub create_empty: bool,
}

/// A single step of a Flux pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    From {
        bucket: String,
    },
    Range {
        start: RangeBound,
        stop: Option<RangeBound>,
    },
    Filter {
        predicate: Predicate,
    },
    Pivot {
        row_key: Vec<String>,
        column_key: Vec<String>,
        value_column: String,
    },
    Group {
        columns: Option<Vec<String>>,
        mode: Option<GroupMode>,
    },
    Sort {
        columns: Vec<String>,
        desc: bool,
    },
    Aggregate {
        func: AggregateFn,
        window: Option<AggregateWindow>,
    },
    Limit {
        n: usize,
        offset: usize,
    },
    First,
    Last,
    Keep {
        columns: Vec<String>,
    },
    Drop {
        columns: Vec<String>,
    },
    Yield {
        name: String,
    },
}

impl Stage {
    pub fn from_bucket(bucket: impl Into<String>) -> FluxResult<Self> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            return Err(FluxError::invalid_stage("bucket name must not be empty"));
        }
        Ok(Self::From { bucket })
    }

    pub fn range(start: impl Into<RangeBound>, stop: Option<RangeBound>) -> FluxResult<Self> {
        let start = start.into();
        start.validate()?;
        if let Some(stop) = &stop {
            stop.validate()?;
        }
        Ok(Self::Range { start, stop })
    }

    pub fn filter(predicate: Predicate) -> Self {
        Self::Filter { predicate }
    }

    pub fn pivot(
        row_key: Vec<String>,
        column_key: Vec<String>,
        value_column: impl Into<String>,
    ) -> FluxResult<Self> {
        let value_column = value_column.into();
        non_empty_columns("pivot rowKey", &row_key)?;
        non_empty_columns("pivot columnKey", &column_key)?;
        if value_column.trim().is_empty() {
            return Err(FluxError::invalid_stage("pivot valueColumn must not be empty"));
        }
        Ok(Self::Pivot {
            row_key,
            column_key,
            value_column,
        })
    }

    /// `pivot()` with the standard `_time` / `_field` / `_value` keys
    pub fn default_pivot() -> Self {
        Self::Pivot {
            row_key: vec![DEFAULT_PIVOT_ROW_KEY.to_string()],
            column_key: vec![DEFAULT_PIVOT_COLUMN_KEY.to_string()],
            value_column: DEFAULT_PIVOT_VALUE_COLUMN.to_string(),
        }
    }

    pub fn sort(columns: Vec<String>, desc: bool) -> FluxResult<Self> {
        non_empty_columns("sort columns", &columns)?;
        Ok(Self::Sort { columns, desc })
    }

    pub fn keep(columns: Vec<String>) -> FluxResult<Self> {
        non_empty_columns("keep columns", &columns)?;
        Ok(Self::Keep { columns })
    }

    pub fn drop_columns(columns: Vec<String>) -> FluxResult<Self> {
        non_empty_columns("drop columns", &columns)?;
        Ok(Self::Drop { columns })
    }

    pub fn yield_as(name: impl Into<String>) -> FluxResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FluxError::invalid_stage("yield name must not be empty"));
        }
        Ok(Self::Yield { name })
    }

    /// Name of the Flux function this stage calls
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::From { .. } => "from",
            Self::Range { .. } => "range",
            Self::Filter { .. } => "filter",
            Self::Pivot { .. } => "pivot",
            Self::Group { .. } => "group",
            Self::Sort { .. } => "sort",
            Self::Aggregate { window: Some(_), .. } => "aggregateWindow",
            Self::Aggregate { func, .. } => func.as_str(),
            Self::Limit { .. } => "limit",
            Self::First => "first",
            Self::Last => "last",
            Self::Keep { .. } => "keep",
            Self::Drop { .. } => "drop",
            Self::Yield { .. } => "yield",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::From { bucket } => write!(f, "from(bucket: \"{}\")", escape_string(bucket)),
            Self::Range { start, stop } => {
                write!(f, "range(start: {}", start)?;
                if let Some(stop) = stop {
                    write!(f, ", stop: {}", stop)?;
                }
                f.write_str(")")
            }
            Self::Filter { predicate } => write!(f, "filter(fn: (r) => {})", predicate),
            Self::Pivot {
                row_key,
                column_key,
                value_column,
            } => write!(
                f,
                "pivot(rowKey: {}, columnKey: {}, valueColumn: \"{}\")",
                string_array(row_key),
                string_array(column_key),
                escape_string(value_column)
            ),
            Self::Group { columns, mode } => {
                f.write_str("group(")?;
                if let Some(columns) = columns {
                    write!(f, "columns: {}", string_array(columns))?;
                    if mode.is_some() {
                        f.write_str(", ")?;
                    }
                }
                if let Some(mode) = mode {
                    write!(f, "mode: \"{}\"", mode)?;
                }
                f.write_str(")")
            }
            Self::Sort { columns, desc } => {
                write!(f, "sort(columns: {}, desc: {})", string_array(columns), desc)
            }
            Self::Aggregate { func, window: None } => write!(f, "{}()", func),
            Self::Aggregate {
                func,
                window: Some(window),
            } => write!(
                f,
                "aggregateWindow(every: {}, fn: {}, createEmpty: {})",
                window.every, func, window.create_empty
            ),
            Self::Limit { n, offset } => write!(f, "limit(n: {}, offset: {})", n, offset),
            Self::First => f.write_str("first()"),
            Self::Last => f.write_str("last()"),
            Self::Keep { columns } => write!(f, "keep(columns: {})", string_array(columns)),
            Self::Drop { columns } => write!(f, "drop(columns: {})", string_array(columns)),
            Self::Yield { name } => write!(f, "yield(name: \"{}\")", escape_string(name)),
        }
    }
}

fn non_empty_columns(what: &str, columns: &[String]) -> FluxResult<()> {
    if columns.is_empty() {
        return Err(FluxError::invalid_stage(format!("{} must not be empty", what)));
    }
    if columns.iter().any(|c| c.trim().is_empty()) {
        return Err(FluxError::invalid_stage(format!(
            "{} must not contain empty names",
            what
        )));
    }
    Ok(())
}

fn string_array(items: &[String]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|s| format!("\"{}\"", escape_string(s)))
        .collect();
    format!("[{}]", quoted.join(","))
}
