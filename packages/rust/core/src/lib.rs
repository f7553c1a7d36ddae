//! Pipeline orchestration for MetricCli.
//!
//! This crate ties the adapter, the external tool wrappers and the persisted
//! metrics record together into a single run (see [`pipeline::Pipeline`]).

pub mod persist;
pub mod pipeline;

pub use pipeline::{Pipeline, StageError, run_guarded};
