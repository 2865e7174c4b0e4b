//! litequery — a small convention-driven convenience layer over SQLite.
//!
//! The crate wraps `rusqlite` with a process-wide configuration store,
//! named connection handles, basic statement construction with named
//! parameter binding, comment stripping before preparation, schema-aware
//! key defaults and simple result-fetching helpers.

// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod sql;

#[cfg(test)]
mod integration_tests;

pub use crate::core::db::{ColumnInfo, ConnectInfo, Db, ParamMap, ResultSet, Row};
pub use crate::core::{LitequeryError, Result};
pub use crate::sql::conditions::{Conditions, WhereClause};
pub use crate::sql::{FieldList, Limit, Order, QualifiedName};
