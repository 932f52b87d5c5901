//! Aggregation pipeline: the closed stage set and its executor

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::projection::{ProjectSpec, ProjectValue};
use super::query::RowQuery;
use super::row::Row;
use super::schema::FieldSet;
use super::value::Value;
use super::PipelineError;

/// Pipeline stage types
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    /// Keep rows matching the query
    Match(RowQuery),
    /// Flatten a top-level list field into one row per element
    Unwind(String),
    /// Partition by key and reduce each partition to one row
    Group(GroupSpec),
    /// Reshape rows
    Project(ProjectSpec),
    /// Stable multi-key sort
    Sort(Vec<(String, SortDirection)>),
    /// Keep the first n rows
    Limit(usize),
}

impl PipelineStage {
    /// Stage name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::Match(_) => "match",
            Self::Unwind(_) => "unwind",
            Self::Group(_) => "group",
            Self::Project(_) => "project",
            Self::Sort(_) => "sort",
            Self::Limit(_) => "limit",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending
    Ascending,
    /// Descending
    Descending,
}

/// Accumulator operators
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Number of rows in the partition
    Count,
    /// Sum of numeric values
    Sum(String),
    /// Arithmetic mean of numeric values
    Avg(String),
    /// Smallest numeric value
    Min(String),
    /// Largest numeric value
    Max(String),
    /// Value from the first row of the partition
    First(String),
}

impl Accumulator {
    fn source(&self) -> Option<&str> {
        match self {
            Self::Count => None,
            Self::Sum(p) | Self::Avg(p) | Self::Min(p) | Self::Max(p) | Self::First(p) => Some(p),
        }
    }

    fn start(&self) -> AccumulatorState {
        match self {
            Self::Count => AccumulatorState::Count(0),
            Self::Sum(_) => AccumulatorState::Sum(NumericSum::default()),
            Self::Avg(_) => AccumulatorState::Avg { sum: 0.0, count: 0 },
            Self::Min(_) => AccumulatorState::Min(None),
            Self::Max(_) => AccumulatorState::Max(None),
            Self::First(_) => AccumulatorState::First(None),
        }
    }
}

/// Group specification
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    /// Path of the partition key
    pub key: String,
    /// Output name and accumulator, in output order
    pub accumulators: Vec<(String, Accumulator)>,
}

impl GroupSpec {
    /// Group by the value at `key`
    pub fn by(key: &str) -> Self {
        Self {
            key: key.to_string(),
            accumulators: Vec::new(),
        }
    }

    /// Add a named accumulator
    pub fn with(mut self, name: &str, accumulator: Accumulator) -> Self {
        self.accumulators.push((name.to_string(), accumulator));
        self
    }

    /// Name of the key field in output rows (last segment of the key path)
    pub fn key_name(&self) -> &str {
        self.key.rsplit('.').next().unwrap_or(&self.key)
    }
}

/// Running sum that stays integral until a float shows up
#[derive(Debug, Default)]
pub(crate) struct NumericSum {
    int: i64,
    float: Option<f64>,
}

impl NumericSum {
    pub(crate) fn add(&mut self, value: &Value, field: &str) -> Result<(), PipelineError> {
        match value {
            Value::Integer(i) => match self.float {
                Some(f) => self.float = Some(f + *i as f64),
                None => {
                    self.int = self.int.checked_add(*i).ok_or_else(|| {
                        PipelineError::Overflow(format!("sum of '{}' exceeds i64", field))
                    })?;
                }
            },
            Value::Float(x) => self.float = Some(self.float.unwrap_or(self.int as f64) + x),
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Value {
        match self.float {
            Some(f) => Value::Float(f),
            None => Value::Integer(self.int),
        }
    }
}

enum AccumulatorState {
    Count(i64),
    Sum(NumericSum),
    Avg { sum: f64, count: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
    First(Option<Value>),
}

impl AccumulatorState {
    fn update(&mut self, acc: &Accumulator, row: &Row) -> Result<(), PipelineError> {
        let value = acc.source().map(|path| row.get(path));
        match (self, value) {
            (Self::Count(n), _) => *n += 1,
            (Self::Sum(sum), Some(v)) => sum.add(&v, acc.source().unwrap_or_default())?,
            (Self::Avg { sum, count }, Some(v)) => {
                if let Some(n) = v.as_f64() {
                    *sum += n;
                    *count += 1;
                }
            }
            (Self::Min(current), Some(v)) => {
                if v.as_f64().is_some()
                    && current.as_ref().map_or(true, |c| v.compare(c).is_some_and(|o| o.is_lt()))
                {
                    *current = Some(v);
                }
            }
            (Self::Max(current), Some(v)) => {
                if v.as_f64().is_some()
                    && current.as_ref().map_or(true, |c| v.compare(c).is_some_and(|o| o.is_gt()))
                {
                    *current = Some(v);
                }
            }
            (Self::First(first), Some(v)) => {
                if first.is_none() {
                    *first = Some(v);
                }
            }
            (_, None) => {}
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Self::Count(n) => Value::Integer(n),
            Self::Sum(sum) => sum.finish(),
            Self::Avg { sum, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Float(sum / count as f64)
                }
            }
            Self::Min(v) | Self::Max(v) | Self::First(v) => v.unwrap_or(Value::Null),
        }
    }
}

/// A validated, ready-to-run sequence of stages
#[derive(Debug, Clone)]
pub struct AggregationPipeline {
    stages: Vec<PipelineStage>,
    output_fields: FieldSet,
}

impl AggregationPipeline {
    /// Start building a pipeline
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Pipeline stages
    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    /// Fields known to be present on output rows
    pub fn output_fields(&self) -> &FieldSet {
        &self.output_fields
    }

    /// Execute the pipeline over a snapshot of rows.
    ///
    /// Stages run in order, each over the previous stage's output; the first
    /// failing stage aborts the run.
    pub fn execute(&self, rows: Vec<Row>) -> Result<Vec<Row>, PipelineError> {
        let mut rows = rows;

        for stage in &self.stages {
            let rows_in = rows.len();
            rows = execute_stage(stage, rows)?;
            debug!(
                stage = stage.name(),
                rows_in,
                rows_out = rows.len(),
                "pipeline stage executed"
            );
        }

        Ok(rows)
    }
}

/// Execute a single stage
fn execute_stage(stage: &PipelineStage, rows: Vec<Row>) -> Result<Vec<Row>, PipelineError> {
    match stage {
        PipelineStage::Match(query) => Ok(rows.into_iter().filter(|r| query.matches(r)).collect()),
        PipelineStage::Unwind(path) => Ok(execute_unwind(rows, path)),
        PipelineStage::Group(spec) => execute_group(rows, spec),
        PipelineStage::Project(spec) => rows.iter().map(|r| spec.apply(r)).collect(),
        PipelineStage::Sort(keys) => Ok(execute_sort(rows, keys)),
        PipelineStage::Limit(n) => Ok(rows.into_iter().take(*n).collect()),
    }
}

/// Empty lists and absent or null fields drop the row; a non-list value
/// passes through unchanged.
fn execute_unwind(rows: Vec<Row>, path: &str) -> Vec<Row> {
    let mut result = Vec::with_capacity(rows.len());

    for mut row in rows {
        match row.remove(path) {
            Some(Value::List(items)) => {
                for item in items {
                    let mut out = row.clone();
                    out.insert(path, item);
                    result.push(out);
                }
            }
            None | Some(Value::Null) => {}
            Some(other) => {
                row.insert(path, other);
                result.push(row);
            }
        }
    }

    result
}

/// Partitions come out in order of first appearance of their key.
fn execute_group(rows: Vec<Row>, spec: &GroupSpec) -> Result<Vec<Row>, PipelineError> {
    let mut index: HashMap<Value, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<AccumulatorState>)> = Vec::new();

    for row in &rows {
        let key = row.get(&spec.key);
        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                let states = spec.accumulators.iter().map(|(_, acc)| acc.start()).collect();
                groups.push((key.clone(), states));
                index.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };

        for (state, (_, acc)) in groups[slot].1.iter_mut().zip(&spec.accumulators) {
            state.update(acc, row)?;
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, states)| {
            let mut out = Row::new().with(spec.key_name(), key);
            for (state, (name, _)) in states.into_iter().zip(&spec.accumulators) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect())
}

fn execute_sort(rows: Vec<Row>, keys: &[(String, SortDirection)]) -> Vec<Row> {
    let mut keyed: Vec<(Vec<Value>, Row)> = rows
        .into_iter()
        .map(|row| (keys.iter().map(|(field, _)| row.get(field)).collect(), row))
        .collect();

    // slice::sort_by is stable, so full ties keep their input order
    keyed.sort_by(|(a, _), (b, _)| {
        for ((va, vb), (_, direction)) in a.iter().zip(b).zip(keys) {
            let cmp = va.sort_cmp(vb);
            if cmp.is_ne() {
                return match direction {
                    SortDirection::Ascending => cmp,
                    SortDirection::Descending => cmp.reverse(),
                };
            }
        }
        std::cmp::Ordering::Equal
    });

    keyed.into_iter().map(|(_, row)| row).collect()
}

/// Accumulates stages and validates them against an input shape
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    stages: Vec<PipelineStage>,
}

impl PipelineBuilder {
    /// Append an arbitrary stage
    pub fn stage(mut self, stage: PipelineStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Append a match stage
    pub fn filter(self, query: RowQuery) -> Self {
        self.stage(PipelineStage::Match(query))
    }

    /// Append an unwind stage
    pub fn unwind(self, path: &str) -> Self {
        self.stage(PipelineStage::Unwind(path.to_string()))
    }

    /// Append a group stage
    pub fn group(self, spec: GroupSpec) -> Self {
        self.stage(PipelineStage::Group(spec))
    }

    /// Append a project stage
    pub fn project(self, spec: ProjectSpec) -> Self {
        self.stage(PipelineStage::Project(spec))
    }

    /// Append a sort stage
    pub fn sort(self, keys: &[(&str, SortDirection)]) -> Self {
        let keys = keys.iter().map(|(f, d)| (f.to_string(), *d)).collect();
        self.stage(PipelineStage::Sort(keys))
    }

    /// Append a limit stage
    pub fn limit(self, n: usize) -> Self {
        self.stage(PipelineStage::Limit(n))
    }

    /// Validate every stage against the input shape and build the pipeline
    pub fn build(self, input: &FieldSet) -> Result<AggregationPipeline, PipelineError> {
        let mut fields = input.clone();

        for (index, stage) in self.stages.iter().enumerate() {
            fields = validate_stage(stage, fields).map_err(|reason| {
                PipelineError::InvalidStage {
                    index,
                    stage: stage.name(),
                    reason,
                }
            })?;
        }

        Ok(AggregationPipeline {
            stages: self.stages,
            output_fields: fields,
        })
    }
}

fn require(fields: &FieldSet, path: &str) -> Result<(), String> {
    if fields.contains(path) {
        Ok(())
    } else {
        Err(format!("unknown field '{}'", path))
    }
}

fn require_unique<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), String> {
    let mut seen = HashSet::new();
    for name in names {
        if !FieldSet::is_top_level(name) || name.is_empty() {
            return Err(format!("output name '{}' must be a plain field name", name));
        }
        if !seen.insert(name) {
            return Err(format!("duplicate output field '{}'", name));
        }
    }
    Ok(())
}

/// Check one stage and return the field set of its output rows
fn validate_stage(stage: &PipelineStage, fields: FieldSet) -> Result<FieldSet, String> {
    match stage {
        PipelineStage::Match(query) => {
            for condition in query.conditions() {
                require(&fields, &condition.field)?;
            }
            Ok(fields)
        }
        PipelineStage::Unwind(path) => {
            if !FieldSet::is_top_level(path) {
                return Err(format!("unwind path '{}' must be a top-level field", path));
            }
            require(&fields, path)?;
            Ok(fields)
        }
        PipelineStage::Group(spec) => {
            require(&fields, &spec.key)?;
            if spec.accumulators.is_empty() {
                return Err("group needs at least one accumulator".into());
            }
            for (_, acc) in &spec.accumulators {
                if let Some(path) = acc.source() {
                    require(&fields, path)?;
                }
            }
            let names = std::iter::once(spec.key_name())
                .chain(spec.accumulators.iter().map(|(name, _)| name.as_str()));
            require_unique(names.clone())?;
            Ok(FieldSet::from_paths(names))
        }
        PipelineStage::Project(spec) => {
            if spec.fields.is_empty() {
                return Err("project needs at least one field".into());
            }
            require_unique(spec.fields.iter().map(|(name, _)| name.as_str()))?;

            let mut out = FieldSet::new();
            for (name, value) in &spec.fields {
                let source = value.source();
                require(&fields, source)?;
                out.insert(name);
                // Copied fields keep their known nested paths under the new name
                if let ProjectValue::Field(_) = value {
                    let prefix = format!("{}.", source);
                    for nested in fields.iter().filter_map(|p| p.strip_prefix(&prefix)) {
                        out.insert(&format!("{}.{}", name, nested));
                    }
                }
            }
            Ok(out)
        }
        PipelineStage::Sort(keys) => {
            if keys.is_empty() {
                return Err("sort needs at least one key".into());
            }
            for (field, _) in keys {
                require(&fields, field)?;
            }
            Ok(fields)
        }
        PipelineStage::Limit(_) => Ok(fields),
    }
}
