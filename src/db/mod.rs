//! Database abstraction layer.
//!
//! This module provides the moving parts behind the facade:
//! - Connection pool registry keyed by profile
//! - Parameter binding
//! - Row and value representations
//! - Declared-binding, dynamic, and callback row mapping
//! - Statement execution
//! - Explicit transactions

pub mod dynamic;
pub mod executor;
pub mod mapper;
pub mod params;
pub mod pool;
pub mod transaction;
pub mod types;

pub use dynamic::map_dynamic;
pub use executor::StatementExecutor;
pub use mapper::{Entity, FieldBinding, FieldKind, FieldType, RowMapper, map_record};
pub use params::SqlParam;
pub use pool::{DatabaseType, DbPool, PoolHandle, PoolRegistry};
pub use transaction::Transaction;
pub use types::{Row, SqlValue};
