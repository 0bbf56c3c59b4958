// selectspec - fluent query specifications and an in-memory engine to run them
// This is the library root that exposes the public API

pub mod listing;
pub mod query;
pub mod spec;
pub mod storage;

// Re-export commonly used types for convenience
pub use query::{QueryExecutor, QueryParser, QueryResult, SessionId};
pub use spec::{LockContention, LockMode, QuerySpec, QuerySpecBuilder, SpecError};
pub use storage::{Column, DataType, Row, Schema, Value};
