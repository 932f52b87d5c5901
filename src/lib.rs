#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gradebook
//!
//! Tracks students and their exam marks and answers a fixed catalog of
//! analytic questions over them.
//!
//! Mutations go straight to a [`StudentStore`]. Analytic queries take a
//! snapshot of the store, run it through an aggregation pipeline from the
//! `gradebook-pipeline` crate and map the terminal rows back into typed
//! results.
//!
//! ## Crate Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`students`] | Model, storage collaborator, query catalog, service |
//! | [`config`] | TOML configuration |
//! | [`error`] | Error types |
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use gradebook::{Config, Mark, MemoryStudentStore, StudentSummary, StudentsService};
//!
//! let service = StudentsService::new(MemoryStudentStore::new(), &Config::default());
//! service.add_student(StudentSummary::new(1, "0510000001"))?;
//! let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
//! service.add_mark(1, Mark::new("Math", 90, day))?;
//!
//! assert_eq!(service.get_best_students(3)?, vec![1]);
//! # Ok::<(), gradebook::GradebookError>(())
//! ```

pub mod config;
pub mod error;
pub mod students;

pub use config::Config;
pub use error::{GradebookError, Result};
pub use students::{
    CatalogQuery, Mark, MemoryStudentStore, QueryResult, Student, StudentAvgScore, StudentStore,
    StudentSummary, StudentsService,
};

pub use gradebook_pipeline::pipeline;
