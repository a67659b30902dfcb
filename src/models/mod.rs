// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod counts;
mod cursor;
mod query;
mod record;

// Re-export all public types
pub use config::{
    Config, LoggingConfig, PipelineConfig, QueryConfig, SourceConfig, StorageConfig,
};
pub use counts::{CountSample, DailyCount};
pub use cursor::{CursorState, ResumePoint};
pub use query::{QueryDescriptor, QueryKind};
pub use record::{RawBatch, Record, Snapshot, content_digest};
