//! dbkit - profile-keyed SQL access
//!
//! A thin data-access layer over sqlx: resolve a [`Profile`], hand it to a
//! [`DataAccess`] facade, and run parameterized statements that come back
//! as typed records. Pools are cached per profile in a shared
//! [`PoolRegistry`] and rebuilt transparently when found closed; explicit
//! [`Transaction`]s pin one connection across statements until commit or
//! rollback.
//!
//! ```no_run
//! use dbkit::{DataAccess, PoolRegistry, Profile, entity, params};
//! use std::sync::Arc;
//!
//! entity! {
//!     #[derive(Debug)]
//!     pub struct Book {
//!         pub author: String => "Author",
//!         pub pages: i32 => "Pages",
//!     }
//! }
//!
//! # async fn demo() -> dbkit::DbResult<()> {
//! let registry = Arc::new(PoolRegistry::new());
//! let profile = Profile::new("app", None, "sqlite:books.db", "sqlite")?;
//! let db = DataAccess::new(registry, profile);
//!
//! let book: Option<Book> = db
//!     .query("SELECT * FROM book WHERE author = ?", &params!["Mario Dennis"])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod config;
pub mod db;
pub mod error;

pub use access::DataAccess;
pub use config::{Profile, ProfileStore};
pub use db::mapper::{Entity, FieldBinding, FieldKind, FieldType, RowMapper};
pub use db::params::SqlParam;
pub use db::pool::{DatabaseType, PoolHandle, PoolRegistry};
pub use db::transaction::Transaction;
pub use db::types::{Row, SqlValue};
pub use error::{DbError, DbResult};
