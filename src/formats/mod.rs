//! File format parsers and value normalization

pub mod delimited;
pub mod normalize;
pub mod reader;

pub use reader::{DelimitedConfig, Record, RecordSet};
