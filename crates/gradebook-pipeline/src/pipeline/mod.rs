//! Staged aggregation pipeline over nested rows
//!
//! This module provides a small, closed query evaluator:
//! - A tagged [`Value`] model (integers, floats, text, dates, lists, nested rows)
//! - [`Row`] field access with dotted paths that reach into lists of rows
//! - Conjunctive match predicates ([`RowQuery`], built with [`QueryBuilder`])
//! - Six stage kinds: match, unwind, group, project, sort, limit
//! - Build-time validation of every field reference ([`FieldSet`])
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────────────────────────────┐
//! │  Vec<Row>    │──▶│ Match ▶ Unwind ▶ Group ▶ Project ▶ Sort ▶ Limit │──▶ Vec<Row>
//! │  (snapshot)  │   │        (any order, validated at build time)   │
//! └──────────────┘   └───────────────────────────────────────────────┘
//! ```
//!
//! # Null policy
//!
//! A field that is structurally absent from a row is read as `Null`.
//! `Null` never satisfies a comparison (`eq`, `gt`, `lt`, `between`, text
//! operators) and is excluded from numeric accumulators. Only `exists`
//! tells absent and present-`Null` apart.
//!
//! A float NaN likewise never satisfies a comparison. Sort still orders it,
//! after every other number, so sorting stays total.
//!
//! # Example
//!
//! ```rust
//! use gradebook_pipeline::pipeline::{
//!     Accumulator, AggregationPipeline, FieldSet, GroupSpec, QueryBuilder, Row, SortDirection,
//!     Value,
//! };
//!
//! let fields = FieldSet::from_paths(["id", "marks.score"]);
//! let pipeline = AggregationPipeline::builder()
//!     .unwind("marks")
//!     .filter(QueryBuilder::new().gt("marks.score", 80).build())
//!     .group(GroupSpec::by("id").with("count", Accumulator::Count))
//!     .sort(&[("count", SortDirection::Descending)])
//!     .limit(10)
//!     .build(&fields)
//!     .unwrap();
//!
//! let row = Row::new().with("id", 1).with(
//!     "marks",
//!     vec![Value::Row(Row::new().with("score", 90))],
//! );
//! let out = pipeline.execute(vec![row]).unwrap();
//! assert_eq!(out[0].get("count"), Value::Integer(1));
//! ```

pub mod aggregation;
pub mod projection;
pub mod query;
pub mod row;
pub mod schema;
pub mod value;

pub use aggregation::{
    Accumulator, AggregationPipeline, GroupSpec, PipelineBuilder, PipelineStage, SortDirection,
};
pub use projection::{ProjectSpec, ProjectValue};
pub use query::{FieldCondition, QueryBuilder, QueryOperator, RowQuery};
pub use row::Row;
pub use schema::FieldSet;
pub use value::Value;

/// Pipeline errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// A stage references something the input shape cannot provide
    #[error("Invalid {stage} stage at position {index}: {reason}")]
    InvalidStage {
        /// Stage position in the pipeline
        index: usize,
        /// Stage name
        stage: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Integer arithmetic left the representable range
    #[error("Numeric overflow: {0}")]
    Overflow(String),
}
