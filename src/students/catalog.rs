//! Named analytic queries expressed as aggregation pipelines
//!
//! Every query binds its parameters into a fixed stage sequence that is
//! validated against the student row shape before any row is read.
//! Rankings always break ties by ascending id so repeated runs over the
//! same snapshot return the same order.

use chrono::{Months, NaiveDate};
use serde::Serialize;

use gradebook_pipeline::pipeline::{
    Accumulator, AggregationPipeline, FieldSet, GroupSpec, PipelineBuilder, ProjectSpec,
    ProjectValue, QueryBuilder, Row, SortDirection, Value,
};

use super::model::Student;
use crate::error::{GradebookError, Result};

/// Student id field
pub const ID_FIELD: &str = "id";
/// Student phone field
pub const PHONE_FIELD: &str = "phone";
/// List of marks on a student row
pub const MARKS_FIELD: &str = "marks";
/// Mark subject, reached through the marks list
pub const MARKS_SUBJECT_FIELD: &str = "marks.subject";
/// Mark score, reached through the marks list
pub const MARKS_SCORE_FIELD: &str = "marks.score";
/// Mark date, reached through the marks list
pub const MARKS_DATE_FIELD: &str = "marks.date";
/// Number of rows per group
pub const COUNT_FIELD: &str = "count";
/// Average score per student
pub const AVG_SCORE_FIELD: &str = "avgScore";
/// Lowest score per student
pub const MIN_SCORE_FIELD: &str = "minScore";
/// Sum of all scores per student
pub const SUM_SCORES_FIELD: &str = "sumScore";
/// Number of marks per student
pub const MARK_COUNT_FIELD: &str = "markCount";
/// Projected mark subject
pub const SUBJECT_FIELD: &str = "subject";
/// Projected mark score
pub const SCORE_FIELD: &str = "score";
/// Projected mark date
pub const DATE_FIELD: &str = "date";

/// Shape of a student row before any stage runs
pub fn student_fields() -> FieldSet {
    FieldSet::from_paths([
        ID_FIELD,
        PHONE_FIELD,
        MARKS_FIELD,
        MARKS_SUBJECT_FIELD,
        MARKS_SCORE_FIELD,
        MARKS_DATE_FIELD,
    ])
}

/// Convert a stored student into the engine row representation
pub fn student_row(student: &Student) -> Row {
    let marks: Vec<Value> = student
        .marks
        .iter()
        .map(|mark| {
            Value::Row(
                Row::new()
                    .with(SUBJECT_FIELD, mark.subject.as_str())
                    .with(SCORE_FIELD, mark.score)
                    .with(DATE_FIELD, mark.date),
            )
        })
        .collect();

    Row::new()
        .with(ID_FIELD, student.id)
        .with(PHONE_FIELD, student.phone.as_str())
        .with(MARKS_FIELD, marks)
}

/// The typed result a query produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// Student summaries (id, phone)
    Students,
    /// At most one student summary
    OptionalStudent,
    /// Marks (subject, score, date)
    Marks,
    /// Id with rounded average score
    AvgScores,
    /// Ordered ids
    Ids,
}

/// The catalog of analytic queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    /// Students having a mark on a date
    StudentsMarksDate {
        /// Exam date
        date: NaiveDate,
    },
    /// Students having a mark in a month of a year
    StudentsMarksMonthYear {
        /// Month, 1-12
        month: u32,
        /// Year
        year: i32,
    },
    /// Students having a mark in a subject scoring above a threshold
    StudentsGoodSubjectMark {
        /// Subject
        subject: String,
        /// Exclusive lower bound
        threshold: i64,
    },
    /// Students whose every mark scores above a threshold
    StudentsAllGoodMarks {
        /// Exclusive lower bound
        threshold: i64,
    },
    /// Students having fewer than `n_marks` marks (zero included)
    StudentsFewMarks {
        /// Exclusive upper bound on the mark count
        n_marks: i64,
    },
    /// Marks of one student in a subject
    StudentMarksSubject {
        /// Student id
        id: i64,
        /// Subject
        subject: String,
    },
    /// Students whose average score is above a threshold, best first
    StudentAvgScoreGreater {
        /// Exclusive lower bound
        threshold: i64,
    },
    /// Students whose every mark in a subject scores above a threshold
    StudentsAllGoodMarksSubject {
        /// Subject
        subject: String,
        /// Exclusive lower bound
        threshold: i64,
    },
    /// Students whose mark count is within `[min, max]`
    StudentsMarksAmountBetween {
        /// Inclusive lower bound
        min: i64,
        /// Inclusive upper bound
        max: i64,
    },
    /// Marks of one student dated within `[from, to]`
    StudentMarksAtDates {
        /// Student id
        id: i64,
        /// Inclusive first date
        from: NaiveDate,
        /// Inclusive last date
        to: NaiveDate,
    },
    /// Top `limit` students by number of marks above `threshold`
    BestStudents {
        /// Number of ids to return
        limit: usize,
        /// Exclusive lower bound for a mark to count
        threshold: i64,
    },
    /// Bottom `limit` students by sum of scores
    WorstStudents {
        /// Number of ids to return
        limit: usize,
    },
    /// Student with an exact phone number
    StudentByPhone {
        /// Phone number
        phone: String,
    },
    /// Students whose phone starts with a prefix
    StudentsByPhonePrefix {
        /// Phone prefix
        prefix: String,
    },
}

impl CatalogQuery {
    /// Query name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::StudentsMarksDate { .. } => "students_marks_date",
            Self::StudentsMarksMonthYear { .. } => "students_marks_month_year",
            Self::StudentsGoodSubjectMark { .. } => "students_good_subject_mark",
            Self::StudentsAllGoodMarks { .. } => "students_all_good_marks",
            Self::StudentsFewMarks { .. } => "students_few_marks",
            Self::StudentMarksSubject { .. } => "student_marks_subject",
            Self::StudentAvgScoreGreater { .. } => "student_avg_score_greater",
            Self::StudentsAllGoodMarksSubject { .. } => "students_all_good_marks_subject",
            Self::StudentsMarksAmountBetween { .. } => "students_marks_amount_between",
            Self::StudentMarksAtDates { .. } => "student_marks_at_dates",
            Self::BestStudents { .. } => "best_students",
            Self::WorstStudents { .. } => "worst_students",
            Self::StudentByPhone { .. } => "student_by_phone",
            Self::StudentsByPhonePrefix { .. } => "students_by_phone_prefix",
        }
    }

    /// Result type produced by this query
    pub fn result_kind(&self) -> ResultKind {
        match self {
            Self::StudentMarksSubject { .. } | Self::StudentMarksAtDates { .. } => {
                ResultKind::Marks
            }
            Self::StudentAvgScoreGreater { .. } => ResultKind::AvgScores,
            Self::BestStudents { .. } | Self::WorstStudents { .. } => ResultKind::Ids,
            Self::StudentByPhone { .. } => ResultKind::OptionalStudent,
            _ => ResultKind::Students,
        }
    }

    /// Student that must exist for the query to run
    pub fn required_student(&self) -> Option<i64> {
        match self {
            Self::StudentMarksSubject { id, .. } | Self::StudentMarksAtDates { id, .. } => {
                Some(*id)
            }
            _ => None,
        }
    }

    /// Bind parameters and build the validated pipeline
    pub fn pipeline(&self) -> Result<AggregationPipeline> {
        let builder = match self {
            Self::StudentsMarksDate { date } => distinct_students(
                AggregationPipeline::builder()
                    .unwind(MARKS_FIELD)
                    .filter(QueryBuilder::new().eq(MARKS_DATE_FIELD, *date).build()),
            ),
            Self::StudentsMarksMonthYear { month, year } => {
                let (first, last) = month_bounds(*month, *year)?;
                distinct_students(
                    AggregationPipeline::builder()
                        .unwind(MARKS_FIELD)
                        .filter(QueryBuilder::new().between(MARKS_DATE_FIELD, first, last).build()),
                )
            }
            Self::StudentsGoodSubjectMark { subject, threshold } => distinct_students(
                AggregationPipeline::builder().unwind(MARKS_FIELD).filter(
                    QueryBuilder::new()
                        .eq(MARKS_SUBJECT_FIELD, subject.as_str())
                        .gt(MARKS_SCORE_FIELD, *threshold)
                        .build(),
                ),
            ),
            Self::StudentsAllGoodMarks { threshold } => {
                min_score_above(AggregationPipeline::builder().unwind(MARKS_FIELD), *threshold)
            }
            Self::StudentsFewMarks { n_marks } => with_mark_count()
                .filter(QueryBuilder::new().lt(MARK_COUNT_FIELD, *n_marks).build()),
            Self::StudentMarksSubject { id, subject } => student_marks(
                *id,
                QueryBuilder::new().eq(MARKS_SUBJECT_FIELD, subject.as_str()),
            ),
            Self::StudentAvgScoreGreater { threshold } => AggregationPipeline::builder()
                .unwind(MARKS_FIELD)
                .group(
                    GroupSpec::by(ID_FIELD)
                        .with(AVG_SCORE_FIELD, Accumulator::Avg(MARKS_SCORE_FIELD.into())),
                )
                .filter(QueryBuilder::new().gt(AVG_SCORE_FIELD, *threshold).build())
                .sort(&[
                    (AVG_SCORE_FIELD, SortDirection::Descending),
                    (ID_FIELD, SortDirection::Ascending),
                ]),
            Self::StudentsAllGoodMarksSubject { subject, threshold } => min_score_above(
                AggregationPipeline::builder()
                    .unwind(MARKS_FIELD)
                    .filter(QueryBuilder::new().eq(MARKS_SUBJECT_FIELD, subject.as_str()).build()),
                *threshold,
            ),
            Self::StudentsMarksAmountBetween { min, max } => {
                if min > max {
                    return Err(GradebookError::InvalidRange(format!(
                        "min {} is greater than max {}",
                        min, max
                    )));
                }
                with_mark_count()
                    .filter(QueryBuilder::new().between(MARK_COUNT_FIELD, *min, *max).build())
            }
            Self::StudentMarksAtDates { id, from, to } => {
                if from > to {
                    return Err(GradebookError::InvalidRange(format!(
                        "from {} is after to {}",
                        from, to
                    )));
                }
                student_marks(*id, QueryBuilder::new().between(MARKS_DATE_FIELD, *from, *to))
            }
            Self::BestStudents { limit, threshold } => {
                require_positive(*limit)?;
                AggregationPipeline::builder()
                    .unwind(MARKS_FIELD)
                    .filter(QueryBuilder::new().gt(MARKS_SCORE_FIELD, *threshold).build())
                    .group(GroupSpec::by(ID_FIELD).with(COUNT_FIELD, Accumulator::Count))
                    .sort(&[
                        (COUNT_FIELD, SortDirection::Descending),
                        (ID_FIELD, SortDirection::Ascending),
                    ])
                    .limit(*limit)
            }
            Self::WorstStudents { limit } => {
                require_positive(*limit)?;
                AggregationPipeline::builder()
                    .project(
                        ProjectSpec::new().include(ID_FIELD).field(
                            SUM_SCORES_FIELD,
                            ProjectValue::Sum(MARKS_SCORE_FIELD.into()),
                        ),
                    )
                    .sort(&[
                        (SUM_SCORES_FIELD, SortDirection::Ascending),
                        (ID_FIELD, SortDirection::Ascending),
                    ])
                    .limit(*limit)
            }
            Self::StudentByPhone { phone } => AggregationPipeline::builder()
                .filter(QueryBuilder::new().eq(PHONE_FIELD, phone.as_str()).build())
                .project(summary_projection()),
            Self::StudentsByPhonePrefix { prefix } => AggregationPipeline::builder()
                .filter(QueryBuilder::new().starts_with(PHONE_FIELD, prefix).build())
                .project(summary_projection()),
        };

        Ok(builder.build(&student_fields())?)
    }
}

fn summary_projection() -> ProjectSpec {
    ProjectSpec::new().include(ID_FIELD).include(PHONE_FIELD)
}

/// One row per student in first-match order, carrying id and phone
fn distinct_students(builder: PipelineBuilder) -> PipelineBuilder {
    builder.group(
        GroupSpec::by(ID_FIELD).with(PHONE_FIELD, Accumulator::First(PHONE_FIELD.into())),
    )
}

/// Students whose lowest remaining mark scores above `threshold`.
/// Students without marks never reach the group and are excluded.
fn min_score_above(builder: PipelineBuilder, threshold: i64) -> PipelineBuilder {
    builder
        .group(
            GroupSpec::by(ID_FIELD)
                .with(PHONE_FIELD, Accumulator::First(PHONE_FIELD.into()))
                .with(MIN_SCORE_FIELD, Accumulator::Min(MARKS_SCORE_FIELD.into())),
        )
        .filter(QueryBuilder::new().gt(MIN_SCORE_FIELD, threshold).build())
}

/// Per-student mark count computed from the list itself, so a student
/// with no marks counts as zero instead of disappearing
fn with_mark_count() -> PipelineBuilder {
    AggregationPipeline::builder().project(
        summary_projection().field(MARK_COUNT_FIELD, ProjectValue::Size(MARKS_FIELD.into())),
    )
}

fn student_marks(id: i64, mark_filter: QueryBuilder) -> PipelineBuilder {
    AggregationPipeline::builder()
        .filter(QueryBuilder::new().eq(ID_FIELD, id).build())
        .unwind(MARKS_FIELD)
        .filter(mark_filter.build())
        .project(
            ProjectSpec::new()
                .include(MARKS_SUBJECT_FIELD)
                .include(MARKS_SCORE_FIELD)
                .include(MARKS_DATE_FIELD),
        )
}

/// First and last calendar day of a month
pub fn month_bounds(month: u32, year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        GradebookError::InvalidRange(format!("no such month {}/{}", month, year))
    })?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| {
            GradebookError::InvalidRange(format!("month {}/{} is out of range", month, year))
        })?;
    Ok((first, last))
}

fn require_positive(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(GradebookError::InvalidRange(
            "number of students must be positive".to_string(),
        ));
    }
    Ok(())
}
