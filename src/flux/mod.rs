//! Flux query construction
//!
//! Builds Flux pipelines out of typed pieces:
//!
//! - **Literals**: values that can appear in a comparison, resolved up front
//! - **Predicates**: `and`/`or` trees of column comparisons
//! - **Stages**: one Flux function call each (`range`, `filter`, `pivot`, ...)
//! - **Query**: a bucket plus its stages, rendered with `|>` between them
//!
//! # Example
//!
//! ```rust
//! use fluxkit::flux::{row, Pipeline, Query};
//!
//! # fn main() -> fluxkit::FluxResult<()> {
//! let query = Query::from_bucket("telemetry")?
//!     .range("-1h")?
//!     .filter(row("_measurement").eq("cpu")? & row("_value").gt(0.5)?)
//!     .pivot();
//!
//! println!("{}", query);
//! # Ok(())
//! # }
//! ```

mod builder;
mod literal;
mod predicate;
mod stage;

pub use builder::{Pipeline, Query};
pub use literal::{escape_string, FluxDuration, Literal, ToLiteral};
pub use predicate::{row, CompareOp, LogicalOp, Predicate, Row};
pub use stage::{
    AggregateFn, AggregateWindow, GroupMode, RangeBound, Stage, DEFAULT_PIVOT_COLUMN_KEY,
    DEFAULT_PIVOT_ROW_KEY, DEFAULT_PIVOT_VALUE_COLUMN, PIPE,
};
