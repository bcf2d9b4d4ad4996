//! Delimited (CSV-style) file reading

pub mod reader;

pub use reader::read_file;
