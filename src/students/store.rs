//! Storage collaborator for student documents
//!
//! The engine only needs the [`StudentStore`] contract. [`MemoryStudentStore`]
//! is the in-process implementation used by the binary and the tests.

use std::path::Path;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use super::model::{Mark, Student};
use crate::error::{GradebookError, Result};

/// Storage-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Insert of an id that already exists
    #[error("duplicate id {0}")]
    DuplicateId(i64),

    /// Operation on an id that does not exist
    #[error("id {0} not found")]
    NotFound(i64),

    /// Backend could not serve the request
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage contract consumed by the service.
///
/// Every mutation must be atomic for a single document; no operation spans
/// two students.
pub trait StudentStore: Send + Sync {
    /// Insert a new student, failing if the id exists
    fn insert_unique(&self, student: Student) -> std::result::Result<(), StoreError>;

    /// Find a student by id
    fn find_by_id(&self, id: i64) -> std::result::Result<Option<Student>, StoreError>;

    /// Returns true if the id exists
    fn exists(&self, id: i64) -> std::result::Result<bool, StoreError> {
        Ok(self.find_by_id(id)?.is_some())
    }

    /// Append a mark as one indivisible read-check-append
    fn append_mark_atomic(&self, id: i64, mark: Mark) -> std::result::Result<Student, StoreError>;

    /// Replace the phone number
    fn update_phone(&self, id: i64, phone: &str) -> std::result::Result<Student, StoreError>;

    /// Delete and return a student
    fn remove_by_id(&self, id: i64) -> std::result::Result<Student, StoreError>;

    /// Snapshot of every student in storage order
    fn scan_all(&self) -> std::result::Result<Vec<Student>, StoreError>;
}

/// In-memory store keeping students in insertion order
#[derive(Debug, Default)]
pub struct MemoryStudentStore {
    students: RwLock<Vec<Student>>,
}

impl MemoryStudentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from students; duplicate ids are rejected
    pub fn with_students(students: Vec<Student>) -> std::result::Result<Self, StoreError> {
        let store = Self::new();
        for student in students {
            store.insert_unique(student)?;
        }
        Ok(store)
    }

    /// Load a JSON array of students from a file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let students: Vec<Student> = serde_json::from_str(&contents).map_err(|e| {
            GradebookError::Dataset(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        let count = students.len();
        let store = Self::with_students(students)?;
        debug!(path = %path.display(), count, "dataset loaded");
        Ok(store)
    }

    /// Number of stored students
    pub fn len(&self) -> usize {
        self.students.read().len()
    }

    /// Returns true if the store is empty
    pub fn is_empty(&self) -> bool {
        self.students.read().is_empty()
    }

    fn with_student_mut<T>(
        &self,
        id: i64,
        f: impl FnOnce(&mut Student) -> T,
    ) -> std::result::Result<T, StoreError> {
        let mut students = self.students.write();
        let student = students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound(id))?;
        Ok(f(student))
    }
}

impl StudentStore for MemoryStudentStore {
    fn insert_unique(&self, student: Student) -> std::result::Result<(), StoreError> {
        let mut students = self.students.write();
        if students.iter().any(|s| s.id == student.id) {
            return Err(StoreError::DuplicateId(student.id));
        }
        students.push(student);
        Ok(())
    }

    fn find_by_id(&self, id: i64) -> std::result::Result<Option<Student>, StoreError> {
        Ok(self.students.read().iter().find(|s| s.id == id).cloned())
    }

    fn append_mark_atomic(&self, id: i64, mark: Mark) -> std::result::Result<Student, StoreError> {
        self.with_student_mut(id, |student| {
            student.marks.push(mark);
            student.clone()
        })
    }

    fn update_phone(&self, id: i64, phone: &str) -> std::result::Result<Student, StoreError> {
        self.with_student_mut(id, |student| {
            student.phone = phone.to_string();
            student.clone()
        })
    }

    fn remove_by_id(&self, id: i64) -> std::result::Result<Student, StoreError> {
        let mut students = self.students.write();
        let index = students
            .iter()
            .position(|s| s.id == id)
            .ok_or(StoreError::NotFound(id))?;
        Ok(students.remove(index))
    }

    fn scan_all(&self) -> std::result::Result<Vec<Student>, StoreError> {
        Ok(self.students.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use std::sync::Arc;

    fn mark(score: i64) -> Mark {
        Mark::new("Math", score, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
    }

    #[test]
    fn test_insert_unique() {
        let store = MemoryStudentStore::new();
        store.insert_unique(Student::new(1, "051")).unwrap();
        assert_eq!(
            store.insert_unique(Student::new(1, "052")),
            Err(StoreError::DuplicateId(1))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_scan_keeps_insertion_order() {
        let store = MemoryStudentStore::with_students(vec![
            Student::new(3, "a"),
            Student::new(1, "b"),
            Student::new(2, "c"),
        ])
        .unwrap();
        let ids: Vec<i64> = store.scan_all().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_mutations_on_missing_id() {
        let store = MemoryStudentStore::new();
        assert_eq!(
            store.append_mark_atomic(5, mark(70)),
            Err(StoreError::NotFound(5))
        );
        assert_eq!(store.update_phone(5, "x"), Err(StoreError::NotFound(5)));
        assert_eq!(store.remove_by_id(5), Err(StoreError::NotFound(5)));
        assert!(!store.exists(5).unwrap());
    }

    #[test]
    fn test_append_returns_updated_student() {
        let store = MemoryStudentStore::with_students(vec![Student::new(1, "051")]).unwrap();
        let updated = store.append_mark_atomic(1, mark(70)).unwrap();
        assert_eq!(updated.marks, vec![mark(70)]);
        let updated = store.append_mark_atomic(1, mark(80)).unwrap();
        assert_eq!(updated.marks, vec![mark(70), mark(80)]);
    }

    #[test]
    fn test_remove_returns_document() {
        let store =
            MemoryStudentStore::with_students(vec![Student::new(1, "051").with_mark(mark(70))])
                .unwrap();
        let removed = store.remove_by_id(1).unwrap();
        assert_eq!(removed.marks.len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let store =
            Arc::new(MemoryStudentStore::with_students(vec![Student::new(1, "051")]).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        store.append_mark_atomic(1, mark(i * 50 + j)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.find_by_id(1).unwrap().unwrap().marks.len(), 400);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": 1, "phone": "051", "marks": [{{"subject": "Math", "score": 70, "date": "2024-01-05"}}]}},
                {{"id": 2, "phone": "052"}}]"#
        )
        .unwrap();
        let store = MemoryStudentStore::from_json_file(file.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.find_by_id(1).unwrap().unwrap().marks, vec![mark(70)]);
    }

    #[test]
    fn test_from_json_file_rejects_duplicates_and_garbage() {
        let mut dup = tempfile::NamedTempFile::new().unwrap();
        write!(dup, r#"[{{"id": 1, "phone": "a"}}, {{"id": 1, "phone": "b"}}]"#).unwrap();
        assert!(matches!(
            MemoryStudentStore::from_json_file(dup.path()),
            Err(GradebookError::DuplicateId(1))
        ));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        assert!(matches!(
            MemoryStudentStore::from_json_file(bad.path()),
            Err(GradebookError::Dataset(_))
        ));
    }
}
