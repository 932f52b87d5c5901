//! Student and mark types

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One exam mark, owned by exactly one student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    /// Subject name
    pub subject: String,
    /// Score, nominally 0-100
    pub score: i64,
    /// Calendar date of the exam
    pub date: NaiveDate,
}

impl Mark {
    /// Create a new mark
    pub fn new(subject: impl Into<String>, score: i64, date: NaiveDate) -> Self {
        Self {
            subject: subject.into(),
            score,
            date,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.subject, self.score, self.date)
    }
}

/// Stored student document, marks in append order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Primary key
    pub id: i64,
    /// Phone number (not unique)
    pub phone: String,
    /// Marks in the order they were appended
    #[serde(default)]
    pub marks: Vec<Mark>,
}

impl Student {
    /// Create a student with no marks
    pub fn new(id: i64, phone: impl Into<String>) -> Self {
        Self {
            id,
            phone: phone.into(),
            marks: Vec::new(),
        }
    }

    /// Builder-style mark append
    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.marks.push(mark);
        self
    }

    /// Id and phone only
    pub fn summary(&self) -> StudentSummary {
        StudentSummary {
            id: self.id,
            phone: self.phone.clone(),
        }
    }
}

/// Student as returned by list queries: never carries marks
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentSummary {
    /// Primary key
    pub id: i64,
    /// Phone number
    pub phone: String,
}

impl StudentSummary {
    /// Create a summary
    pub fn new(id: i64, phone: impl Into<String>) -> Self {
        Self {
            id,
            phone: phone.into(),
        }
    }
}

impl fmt::Display for StudentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.phone)
    }
}

impl From<StudentSummary> for Student {
    fn from(summary: StudentSummary) -> Self {
        Self::new(summary.id, summary.phone)
    }
}

/// Average score of one student, rounded to an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAvgScore {
    /// Student id
    pub id: i64,
    /// Rounded average
    #[serde(rename = "avgScore")]
    pub avg_score: i64,
}

impl StudentAvgScore {
    /// Create a record
    pub fn new(id: i64, avg_score: i64) -> Self {
        Self { id, avg_score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_deserializes_without_marks() {
        let student: Student = serde_json::from_str(r#"{"id": 7, "phone": "0510000007"}"#).unwrap();
        assert_eq!(student, Student::new(7, "0510000007"));
    }

    #[test]
    fn test_mark_dates_are_iso() {
        let mark: Mark =
            serde_json::from_str(r#"{"subject": "Math", "score": 70, "date": "2024-01-05"}"#)
                .unwrap();
        assert_eq!(mark.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(mark.to_string(), "Math:70@2024-01-05");
    }

    #[test]
    fn test_summary_drops_marks() {
        let student = Student::new(1, "0510000001").with_mark(Mark::new(
            "Math",
            70,
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        ));
        assert_eq!(student.summary(), StudentSummary::new(1, "0510000001"));
    }
}
