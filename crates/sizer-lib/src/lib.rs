//! Worker sizing library for PHP application servers
//!
//! This crate provides:
//! - The sizing core for fixed-process pools and threaded workers
//! - Host resource probing (memory, CPUs, worker resident size)
//! - Overhead estimation from the PHP runtime configuration
//! - Table and JSON report rendering
//! - An HTTP load driver for checking a recommendation empirically

pub mod error;
pub mod load;
pub mod models;
pub mod probe;
pub mod report;
pub mod sizing;

pub use error::{Result, SizerError};
pub use models::*;
pub use report::{Formatter, JsonFormatter, Report, TableFormatter};
