// Query module - compiles resolved specs and executes them against tables
pub mod eval;
pub mod executor;
pub mod lock;
pub mod parser;

pub use executor::{QueryExecutor, QueryResult};
pub use lock::SessionId;
pub use parser::QueryParser;
