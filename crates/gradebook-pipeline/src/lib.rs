#![forbid(unsafe_code)]
#![warn(missing_docs)]
//! # gradebook-pipeline
//!
//! Row model and staged aggregation pipeline for Gradebook

pub mod pipeline;
