//! Projection specification and evaluation

use super::aggregation::NumericSum;
use super::row::Row;
use super::value::Value;
use super::PipelineError;

/// How a projected field is produced
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectValue {
    /// Copy the value at a (dotted) path
    Field(String),
    /// Sum of the numeric values the path resolves to
    Sum(String),
    /// Length of the list at the path (0 when absent or not a list)
    Size(String),
}

impl ProjectValue {
    /// Path the value reads from
    pub fn source(&self) -> &str {
        match self {
            Self::Field(path) | Self::Sum(path) | Self::Size(path) => path,
        }
    }

    /// Evaluate against a row
    pub fn evaluate(&self, row: &Row) -> Result<Value, PipelineError> {
        match self {
            Self::Field(path) => Ok(row.get(path)),
            Self::Sum(path) => {
                let mut sum = NumericSum::default();
                match row.get(path) {
                    Value::List(items) => {
                        for item in &items {
                            sum.add(item, path)?;
                        }
                    }
                    other => sum.add(&other, path)?,
                }
                Ok(sum.finish())
            }
            Self::Size(path) => {
                let len = row
                    .lookup(path)
                    .as_ref()
                    .and_then(Value::as_list)
                    .map_or(0, <[Value]>::len);
                Ok(Value::Integer(len as i64))
            }
        }
    }
}

/// Ordered list of output fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectSpec {
    /// Output name and how to produce it
    pub fields: Vec<(String, ProjectValue)>,
}

impl ProjectSpec {
    /// Create an empty projection
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `path` into a field of the same name as its last segment
    pub fn include(self, path: &str) -> Self {
        let name = path.rsplit('.').next().unwrap_or(path).to_string();
        self.field(&name, ProjectValue::Field(path.to_string()))
    }

    /// Add a named output field
    pub fn field(mut self, name: &str, value: ProjectValue) -> Self {
        self.fields.push((name.to_string(), value));
        self
    }

    /// Build the output row for one input row
    pub fn apply(&self, row: &Row) -> Result<Row, PipelineError> {
        let mut out = Row::new();
        for (name, value) in &self.fields {
            out.insert(name.clone(), value.evaluate(row)?);
        }
        Ok(out)
    }
}
