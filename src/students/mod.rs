//! Student domain: model, storage, query catalog and service

pub mod catalog;
pub mod mapper;
pub mod model;
pub mod service;
pub mod store;

pub use catalog::{CatalogQuery, ResultKind};
pub use mapper::{QueryResult, ResultMapper};
pub use model::{Mark, Student, StudentAvgScore, StudentSummary};
pub use service::StudentsService;
pub use store::{MemoryStudentStore, StoreError, StudentStore};
