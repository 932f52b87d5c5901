//! Conversion of terminal pipeline rows into caller types

use chrono::NaiveDate;
use serde::Serialize;

use gradebook_pipeline::pipeline::{Row, Value};

use super::catalog::{
    ResultKind, AVG_SCORE_FIELD, DATE_FIELD, ID_FIELD, PHONE_FIELD, SCORE_FIELD, SUBJECT_FIELD,
};
use super::model::{Mark, StudentAvgScore, StudentSummary};
use crate::config::{ResultsConfig, ScoreRounding};
use crate::error::{GradebookError, Result};

/// Typed result of a catalog query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    /// Student summaries
    Students(Vec<StudentSummary>),
    /// Zero or one student summary
    Student(Option<StudentSummary>),
    /// Marks
    Marks(Vec<Mark>),
    /// Average scores
    AvgScores(Vec<StudentAvgScore>),
    /// Ranked ids
    Ids(Vec<i64>),
}

/// Pure projection of terminal rows into caller types
#[derive(Debug, Clone, Copy)]
pub struct ResultMapper {
    rounding: ScoreRounding,
}

impl ResultMapper {
    /// Create a mapper from the results configuration
    pub fn new(config: &ResultsConfig) -> Self {
        Self {
            rounding: config.score_rounding,
        }
    }

    /// Map rows into the result kind a query declares
    pub fn map(&self, kind: ResultKind, rows: &[Row]) -> Result<QueryResult> {
        Ok(match kind {
            ResultKind::Students => QueryResult::Students(self.students(rows)?),
            ResultKind::OptionalStudent => {
                QueryResult::Student(self.students(rows)?.into_iter().next())
            }
            ResultKind::Marks => QueryResult::Marks(self.marks(rows)?),
            ResultKind::AvgScores => QueryResult::AvgScores(self.avg_scores(rows)?),
            ResultKind::Ids => QueryResult::Ids(self.ids(rows)?),
        })
    }

    /// Rows carrying `id` and `phone`; any other field is ignored
    pub fn students(&self, rows: &[Row]) -> Result<Vec<StudentSummary>> {
        rows.iter()
            .map(|row| Ok(StudentSummary::new(int(row, ID_FIELD)?, text(row, PHONE_FIELD)?)))
            .collect()
    }

    /// Rows carrying `subject`, `score` and `date`
    pub fn marks(&self, rows: &[Row]) -> Result<Vec<Mark>> {
        rows.iter()
            .map(|row| {
                Ok(Mark::new(
                    text(row, SUBJECT_FIELD)?,
                    int(row, SCORE_FIELD)?,
                    date(row, DATE_FIELD)?,
                ))
            })
            .collect()
    }

    /// Rows carrying `id` and a numeric `avgScore`, rounded per configuration
    pub fn avg_scores(&self, rows: &[Row]) -> Result<Vec<StudentAvgScore>> {
        rows.iter()
            .map(|row| {
                let avg = row
                    .field(AVG_SCORE_FIELD)
                    .and_then(Value::as_f64)
                    .ok_or_else(|| shape(row, AVG_SCORE_FIELD, "number"))?;
                Ok(StudentAvgScore::new(int(row, ID_FIELD)?, self.round(avg)))
            })
            .collect()
    }

    /// Ids in row order
    pub fn ids(&self, rows: &[Row]) -> Result<Vec<i64>> {
        rows.iter().map(|row| int(row, ID_FIELD)).collect()
    }

    fn round(&self, value: f64) -> i64 {
        match self.rounding {
            ScoreRounding::TowardZero => value.trunc() as i64,
            ScoreRounding::HalfUp => value.round() as i64,
        }
    }
}

fn shape(row: &Row, field: &str, expected: &str) -> GradebookError {
    GradebookError::ResultShape(format!("expected {} field '{}' in {}", expected, field, row))
}

fn int(row: &Row, field: &str) -> Result<i64> {
    row.field(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| shape(row, field, "integer"))
}

fn text(row: &Row, field: &str) -> Result<String> {
    row.field(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| shape(row, field, "text"))
}

fn date(row: &Row, field: &str) -> Result<NaiveDate> {
    row.field(field)
        .and_then(Value::as_date)
        .ok_or_else(|| shape(row, field, "date"))
}
