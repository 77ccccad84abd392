//! Shared data model and configuration schema for the doctriage pipeline.
//!
//! This crate holds the types that cross crate boundaries: the [`WorkItem`]
//! unit of work, terminal [`TaskResult`]s, the end-of-run [`RunSummary`],
//! and the [`AnalyzerConfig`] loaded from YAML.

pub mod config;
pub mod error;
pub mod item;

pub use config::{AnalyzerConfig, ApiConfig, CacheConfig, ThrottleConfig, WorkerConfig};
pub use error::{ConfigError, Result};
pub use item::{RunSummary, TaskResult, TaskStatus, WorkItem};
