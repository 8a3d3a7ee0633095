//! Query builder
//!
//! A [`Query`] is a bucket plus an ordered list of stages. Every chaining call
//! consumes the builder and hands it back with one more stage appended, so a
//! chain reads in pipeline order and no two owners can grow the same query.
//!
//! The chaining methods live on the [`Pipeline`] trait so that a standalone
//! [`Query`] and a query bound to a client share one implementation.

use super::literal::FluxDuration;
use super::predicate::Predicate;
use super::stage::{AggregateFn, AggregateWindow, GroupMode, RangeBound, Stage, PIPE};
use crate::error::FluxResult;
use std::fmt;

fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// Append-style construction of a Flux pipeline
pub trait Pipeline: Sized {
    /// Stages in pipeline order, starting with `from()`
    fn stages(&self) -> &[Stage];

    /// Append a stage to the end of the pipeline
    fn push_stage(&mut self, stage: Stage);

    /// Append an already constructed stage
    fn then(mut self, stage: Stage) -> Self {
        self.push_stage(stage);
        self
    }

    /// `range(start: ...)`, open ended
    fn range(self, start: impl Into<RangeBound>) -> FluxResult<Self> {
        Ok(self.then(Stage::range(start, None)?))
    }

    /// `range(start: ..., stop: ...)`
    fn range_between(
        self,
        start: impl Into<RangeBound>,
        stop: impl Into<RangeBound>,
    ) -> FluxResult<Self> {
        Ok(self.then(Stage::range(start, Some(stop.into()))?))
    }

    /// `filter(fn: (r) => ...)`
    fn filter(self, predicate: Predicate) -> Self {
        self.then(Stage::filter(predicate))
    }

    /// `pivot()` on `_time` / `_field` / `_value`
    fn pivot(self) -> Self {
        self.then(Stage::default_pivot())
    }

    /// `pivot()` with explicit keys
    fn pivot_by(self, row_key: &[&str], column_key: &[&str], value_column: &str) -> FluxResult<Self> {
        Ok(self.then(Stage::pivot(
            owned(row_key),
            owned(column_key),
            value_column,
        )?))
    }

    /// `group()`, merging every table into one
    fn ungroup(self) -> Self {
        self.then(Stage::Group {
            columns: None,
            mode: None,
        })
    }

    /// `group(columns: [...])`
    fn group_by(self, columns: &[&str]) -> Self {
        self.then(Stage::Group {
            columns: Some(owned(columns)),
            mode: None,
        })
    }

    /// `group(columns: [...], mode: ...)`
    fn group_with(self, columns: Option<&[&str]>, mode: Option<GroupMode>) -> Self {
        self.then(Stage::Group {
            columns: columns.map(owned),
            mode,
        })
    }

    fn sort(self, columns: &[&str], desc: bool) -> FluxResult<Self> {
        Ok(self.then(Stage::sort(owned(columns), desc)?))
    }

    /// Plain aggregate call such as `mean()`
    fn aggregate(self, func: AggregateFn) -> Self {
        self.then(Stage::Aggregate { func, window: None })
    }

    /// `aggregateWindow(every: ..., fn: ..., createEmpty: ...)`
    fn aggregate_window(self, every: &str, func: AggregateFn, create_empty: bool) -> FluxResult<Self> {
        let every = FluxDuration::parse(every)?;
        Ok(self.then(Stage::Aggregate {
            func,
            window: Some(AggregateWindow {
                every,
                create_empty,
            }),
        }))
    }

    fn limit(self, n: usize) -> Self {
        self.limit_offset(n, 0)
    }

    fn limit_offset(self, n: usize, offset: usize) -> Self {
        self.then(Stage::Limit { n, offset })
    }

    fn first(self) -> Self {
        self.then(Stage::First)
    }

    fn last(self) -> Self {
        self.then(Stage::Last)
    }

    fn keep(self, columns: &[&str]) -> FluxResult<Self> {
        Ok(self.then(Stage::keep(owned(columns))?))
    }

    fn drop_columns(self, columns: &[&str]) -> FluxResult<Self> {
        Ok(self.then(Stage::drop_columns(owned(columns))?))
    }

    fn yield_as(self, name: &str) -> FluxResult<Self> {
        Ok(self.then(Stage::yield_as(name)?))
    }

    /// Render the whole pipeline as Flux text
    fn render(&self) -> String {
        self.stages()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(PIPE)
    }
}

/// A Flux query that is being prepared and has not been sent
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    bucket: String,
    stages: Vec<Stage>,
}

impl Query {
    /// Start a query reading from `bucket`
    pub fn from_bucket(bucket: impl Into<String>) -> FluxResult<Self> {
        let bucket = bucket.into();
        let from = Stage::from_bucket(bucket.clone())?;
        Ok(Self {
            bucket,
            stages: vec![from],
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Number of stages, including `from()`
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Pipeline for Query {
    fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn push_stage(&mut self, stage: Stage) {
        self.stages.push(stage);
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FluxError;
    use crate::flux::row;

    #[test]
    fn test_query_starts_with_from() {
        let query = Query::from_bucket("telemetry").unwrap();
        assert_eq!(query.bucket(), "telemetry");
        assert_eq!(query.len(), 1);
        assert_eq!(query.render(), r#"from(bucket: "telemetry")"#);
    }

    #[test]
    fn test_empty_bucket_is_rejected() {
        assert!(matches!(
            Query::from_bucket(""),
            Err(FluxError::InvalidStage(_))
        ));
    }

    #[test]
    fn test_stages_render_in_append_order() {
        let pred = row("_measurement").eq("cpu").unwrap();
        let query = Query::from_bucket("b")
            .unwrap()
            .range("-1h")
            .unwrap()
            .filter(pred)
            .pivot();

        assert_eq!(
            query.render(),
            "from(bucket: \"b\")\n\
             |> range(start: -1h)\n\
             |> filter(fn: (r) => r._measurement == \"cpu\")\n\
             |> pivot(rowKey: [\"_time\"], columnKey: [\"_field\"], valueColumn: \"_value\")"
        );
    }

    #[test]
    fn test_no_reordering_or_deduplication() {
        let query = Query::from_bucket("b")
            .unwrap()
            .limit(5)
            .last()
            .limit(5)
            .range("-1h")
            .unwrap();

        let names: Vec<&str> = query.stages().iter().map(|s| s.function_name()).collect();
        assert_eq!(names, vec!["from", "limit", "last", "limit", "range"]);
    }

    #[test]
    fn test_full_chain() {
        let pred = row("_measurement").eq("cpu").unwrap()
            & (row("host").eq("a").unwrap() | row("host").eq("b").unwrap());

        let query = Query::from_bucket("metrics")
            .unwrap()
            .range_between("-7d", RangeBound::Now)
            .unwrap()
            .filter(pred)
            .aggregate_window("1h", AggregateFn::Mean, false)
            .unwrap()
            .group_by(&["host"])
            .sort(&["_time"], true)
            .unwrap()
            .limit_offset(100, 10)
            .keep(&["_time", "_value", "host"])
            .unwrap()
            .yield_as("hourly")
            .unwrap();

        let expected = [
            r#"from(bucket: "metrics")"#,
            "range(start: -7d, stop: now())",
            r#"filter(fn: (r) => r._measurement == "cpu" and (r.host == "a" or r.host == "b"))"#,
            "aggregateWindow(every: 1h, fn: mean, createEmpty: false)",
            r#"group(columns: ["host"])"#,
            r#"sort(columns: ["_time"], desc: true)"#,
            "limit(n: 100, offset: 10)",
            r#"keep(columns: ["_time","_value","host"])"#,
            r#"yield(name: "hourly")"#,
        ]
        .join(PIPE);

        assert_eq!(query.to_string(), expected);
    }

    #[test]
    fn test_validation_fails_at_append_time() {
        let query = Query::from_bucket("b").unwrap();
        assert!(query.clone().range("").is_err());
        assert!(query.clone().aggregate_window("hourly", AggregateFn::Sum, true).is_err());
        assert!(query.clone().pivot_by(&[], &["_field"], "_value").is_err());
        assert!(query.clone().drop_columns(&[]).is_err());
        assert!(query.yield_as("").is_err());
    }

    #[test]
    fn test_chaining_does_not_alias() {
        let base = Query::from_bucket("b").unwrap().range("-1h").unwrap();
        let with_last = base.clone().last();
        let with_first = base.clone().first();

        assert_eq!(base.len(), 2);
        assert_eq!(with_last.len(), 3);
        assert!(with_first.render().ends_with("first()"));
        assert!(with_last.render().ends_with("last()"));
    }
}
