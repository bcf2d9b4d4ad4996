//! Database layer - table schemas, the table catalog, and the session

pub mod catalog;
pub mod schema;
pub mod session;

pub use session::{Backend, Session};
