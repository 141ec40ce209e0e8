//! Construction of the RDD context object from files, tables or a config.

mod config;
mod rdd;
mod source;

pub use config::{RddConfig, DEFAULT_LEVELS};
pub use rdd::{RddCounts, RddCountsBuilder};
pub use source::{DirectorySource, NetworkSource};
