//! Run orchestration: input discovery and per-file batch loading

pub mod coordinator;
pub mod discovery;

pub use coordinator::{Coordinator, LoadConfig, LoadConfigBuilder};
