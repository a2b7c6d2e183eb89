//! # gradeflow
//!
//! Durable fan-out/fan-in grading of student result batches.
//!
//! A batch uploaded to the input container is split by student, each student
//! is graded by an independent task, and the results are merged into one
//! `results_<batch>` report in the output container. The orchestration is
//! replay-safe: its history is persisted after every settled task, so an
//! interrupted run resumes without re-running finished work.
//!
//! ## Modules
//!
//! - `grading` - Pure grading rules: weighted average, gating, classification
//! - `orchestration` - Durable runtime, task execution and the grading workflow
//! - `ingest` - Batch partitioning and the ingestion trigger
//! - `output` - Report rendering and the output writer
//! - `storage` - Blob storage abstraction with file and memory backends
//! - `config` - TOML configuration with environment overrides
//! - `app` - Logging setup and component wiring
//! - `cli` - Command-line interface
pub mod app;
pub mod cli;
pub mod config;
pub mod grading;
pub mod ingest;
pub mod orchestration;
pub mod output;
pub mod storage;
