/// Database Module
///
/// The database layer is split into three concerns:
/// - **Connection Management** (`connection.rs`): the `Db` handle and the
///   registry of named handles
/// - **Query Execution** (`query.rs`): statement construction, execution
///   and result fetching
/// - **Schema Introspection** (`schema.rs`): column metadata and primary
///   keys, with caching
///
/// All operations use the crate-wide `LitequeryError` type for consistent
/// error propagation.
pub mod connection;
pub mod query;
pub mod schema;

pub use connection::*;
pub use query::*;
pub use schema::*;
