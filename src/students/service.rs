//! Student service: mutations through the store, analytics through the catalog
//!
//! Every catalog call follows the same path:
//!
//! ```text
//! CatalogQuery ──build──> AggregationPipeline
//!                              │
//! StudentStore::scan_all ──> Vec<Row> ──execute──> Vec<Row> ──ResultMapper──> typed result
//! ```
//!
//! The pipeline is built and validated before the snapshot is taken, so a
//! bad parameter never costs a scan. Queries hold no lock of their own; the
//! snapshot is whatever the store returned at call time.

use chrono::NaiveDate;
use tracing::{debug, warn};

use gradebook_pipeline::pipeline::Row;

use super::catalog::{student_row, CatalogQuery};
use super::mapper::{QueryResult, ResultMapper};
use super::model::{Mark, Student, StudentAvgScore, StudentSummary};
use super::store::StudentStore;
use crate::config::Config;
use crate::error::{GradebookError, Result};

/// Service over a student store
pub struct StudentsService<S: StudentStore> {
    store: S,
    mapper: ResultMapper,
    best_students_threshold: i64,
}

impl<S: StudentStore> StudentsService<S> {
    /// Create a service over a store
    pub fn new(store: S, config: &Config) -> Self {
        Self {
            store,
            mapper: ResultMapper::new(&config.results),
            best_students_threshold: config.catalog.best_students_threshold,
        }
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a student with no marks
    pub fn add_student(&self, student: StudentSummary) -> Result<StudentSummary> {
        let id = student.id;
        self.store
            .insert_unique(Student::from(student.clone()))
            .map_err(|e| rejected("add_student", id, e.into()))?;
        debug!(id, "student added");
        Ok(student)
    }

    /// Append a mark; returns the appended mark
    pub fn add_mark(&self, id: i64, mark: Mark) -> Result<Mark> {
        let updated = self
            .store
            .append_mark_atomic(id, mark.clone())
            .map_err(|e| rejected("add_mark", id, e.into()))?;
        debug!(id, marks = updated.marks.len(), %mark, "mark added");
        Ok(mark)
    }

    /// Replace a student's phone number
    pub fn update_phone_number(&self, id: i64, phone: &str) -> Result<StudentSummary> {
        let updated = self
            .store
            .update_phone(id, phone)
            .map_err(|e| rejected("update_phone_number", id, e.into()))?;
        debug!(id, phone, "phone updated");
        Ok(updated.summary())
    }

    /// Delete a student; returns the removed summary
    pub fn remove_student(&self, id: i64) -> Result<StudentSummary> {
        let removed = self
            .store
            .remove_by_id(id)
            .map_err(|e| rejected("remove_student", id, e.into()))?;
        debug!(id, "student removed");
        Ok(removed.summary())
    }

    /// Student without marks
    pub fn get_student(&self, id: i64) -> Result<StudentSummary> {
        Ok(self.find(id)?.summary())
    }

    /// Marks in append order
    pub fn get_marks(&self, id: i64) -> Result<Vec<Mark>> {
        Ok(self.find(id)?.marks)
    }

    /// Student with this exact phone, if any
    pub fn get_student_by_phone_number(&self, phone: &str) -> Result<Option<StudentSummary>> {
        let rows = self.run(&CatalogQuery::StudentByPhone {
            phone: phone.to_string(),
        })?;
        Ok(self.mapper.students(&rows)?.into_iter().next())
    }

    /// Students whose phone starts with `prefix`
    pub fn get_students_by_phone_prefix(&self, prefix: &str) -> Result<Vec<StudentSummary>> {
        self.students(CatalogQuery::StudentsByPhonePrefix {
            prefix: prefix.to_string(),
        })
    }

    /// Students with a mark on `date`
    pub fn get_students_marks_date(&self, date: NaiveDate) -> Result<Vec<StudentSummary>> {
        self.students(CatalogQuery::StudentsMarksDate { date })
    }

    /// Students with a mark in `month` of `year`
    pub fn get_students_marks_month_year(
        &self,
        month: u32,
        year: i32,
    ) -> Result<Vec<StudentSummary>> {
        self.students(CatalogQuery::StudentsMarksMonthYear { month, year })
    }

    /// Students with a mark in `subject` scoring above `threshold`
    pub fn get_students_good_subject_mark(
        &self,
        subject: &str,
        threshold: i64,
    ) -> Result<Vec<StudentSummary>> {
        self.students(CatalogQuery::StudentsGoodSubjectMark {
            subject: subject.to_string(),
            threshold,
        })
    }

    /// Students with at least one mark, every one above `threshold`
    pub fn get_students_all_good_marks(&self, threshold: i64) -> Result<Vec<StudentSummary>> {
        self.students(CatalogQuery::StudentsAllGoodMarks { threshold })
    }

    /// Students with fewer than `n_marks` marks, zero included
    pub fn get_students_few_marks(&self, n_marks: i64) -> Result<Vec<StudentSummary>> {
        self.students(CatalogQuery::StudentsFewMarks { n_marks })
    }

    /// Marks of student `id` in `subject`, in append order
    pub fn get_student_marks_subject(&self, id: i64, subject: &str) -> Result<Vec<Mark>> {
        let rows = self.run(&CatalogQuery::StudentMarksSubject {
            id,
            subject: subject.to_string(),
        })?;
        self.mapper.marks(&rows)
    }

    /// Students averaging above `threshold`, highest average first
    pub fn get_student_avg_score_greater(&self, threshold: i64) -> Result<Vec<StudentAvgScore>> {
        let rows = self.run(&CatalogQuery::StudentAvgScoreGreater { threshold })?;
        self.mapper.avg_scores(&rows)
    }

    /// Students whose every mark in `subject` scores above `threshold`
    pub fn get_students_all_good_marks_subject(
        &self,
        subject: &str,
        threshold: i64,
    ) -> Result<Vec<StudentSummary>> {
        self.students(CatalogQuery::StudentsAllGoodMarksSubject {
            subject: subject.to_string(),
            threshold,
        })
    }

    /// Students whose mark count lies in `[min, max]`
    pub fn get_students_marks_amount_between(
        &self,
        min: i64,
        max: i64,
    ) -> Result<Vec<StudentSummary>> {
        self.students(CatalogQuery::StudentsMarksAmountBetween { min, max })
    }

    /// Marks of student `id` dated in `[from, to]`, in append order
    pub fn get_student_marks_at_dates(
        &self,
        id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Mark>> {
        let rows = self.run(&CatalogQuery::StudentMarksAtDates { id, from, to })?;
        self.mapper.marks(&rows)
    }

    /// Ids of the `n` students with the most high marks
    pub fn get_best_students(&self, n: usize) -> Result<Vec<i64>> {
        let rows = self.run(&CatalogQuery::BestStudents {
            limit: n,
            threshold: self.best_students_threshold,
        })?;
        self.mapper.ids(&rows)
    }

    /// Ids of the `n` students with the lowest score sum
    pub fn get_worst_students(&self, n: usize) -> Result<Vec<i64>> {
        let rows = self.run(&CatalogQuery::WorstStudents { limit: n })?;
        self.mapper.ids(&rows)
    }

    /// Run any catalog query and map it to its declared result kind
    pub fn query(&self, query: &CatalogQuery) -> Result<QueryResult> {
        let rows = self.run(query)?;
        self.mapper.map(query.result_kind(), &rows)
    }

    fn find(&self, id: i64) -> Result<Student> {
        self.store.find_by_id(id)?.ok_or_else(|| {
            warn!(id, "student not found");
            GradebookError::NotFound(id)
        })
    }

    fn students(&self, query: CatalogQuery) -> Result<Vec<StudentSummary>> {
        let rows = self.run(&query)?;
        self.mapper.students(&rows)
    }

    fn run(&self, query: &CatalogQuery) -> Result<Vec<Row>> {
        let pipeline = query.pipeline().map_err(|e| {
            warn!(query = query.name(), error = %e, "query rejected");
            e
        })?;

        let snapshot = self.store.scan_all()?;
        if let Some(id) = query.required_student() {
            if !snapshot.iter().any(|s| s.id == id) {
                warn!(query = query.name(), id, "student not found");
                return Err(GradebookError::NotFound(id));
            }
        }

        let students = snapshot.len();
        let rows = pipeline.execute(snapshot.iter().map(student_row).collect())?;
        debug!(
            query = query.name(),
            students,
            results = rows.len(),
            "catalog query executed"
        );
        Ok(rows)
    }
}

fn rejected(operation: &'static str, id: i64, err: GradebookError) -> GradebookError {
    warn!(operation, id, error = %err, "mutation rejected");
    err
}
