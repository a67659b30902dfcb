// src/lib.rs

//! Follow Crawler Library
//!
//! Resumable crawl of a paginated following listing, with snapshot merging
//! and snapshot diffing.

pub mod config;
pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;

#[cfg(test)]
mod test_support;
