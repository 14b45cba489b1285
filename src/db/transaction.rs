//! Explicit transactions on a pinned connection.
//!
//! A [`Transaction`] owns one connection borrowed from its profile's pool
//! for its whole lifetime and multiplexes further statements on it, in
//! issuing order, until an explicit commit or rollback. Both outcomes are
//! terminal: any operation afterwards — including a second commit or
//! rollback — fails with [`DbError::ConnectionClosed`], checked before the
//! driver is touched.
//!
//! Dropping an open transaction rolls it back and returns the connection
//! to its pool.

use crate::db::dynamic::map_dynamic;
use crate::db::executor::{self, validate_statement};
use crate::db::mapper::{Entity, RowMapper, ensure_mappable, map_record};
use crate::db::params::SqlParam;
use crate::db::pool::{DatabaseType, DbPool, PoolHandle};
use crate::db::types::Row;
use crate::error::{DbError, DbResult};
use serde::de::DeserializeOwned;
use sqlx::{MySql, Postgres, Sqlite};
use tracing::{debug, info};

/// Database-specific transaction wrapper.
enum DbTransaction {
    MySql(sqlx::Transaction<'static, MySql>),
    Postgres(sqlx::Transaction<'static, Postgres>),
    SQLite(sqlx::Transaction<'static, Sqlite>),
}

impl DbTransaction {
    fn db_type(&self) -> DatabaseType {
        match self {
            DbTransaction::MySql(_) => DatabaseType::MySql,
            DbTransaction::Postgres(_) => DatabaseType::Postgres,
            DbTransaction::SQLite(_) => DatabaseType::SQLite,
        }
    }

    async fn commit(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::SQLite(tx) => tx.commit().await.map_err(DbError::from),
        }
    }

    async fn rollback(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::SQLite(tx) => tx.rollback().await.map_err(DbError::from),
        }
    }
}

/// An open transaction holding one pinned connection.
pub struct Transaction {
    inner: Option<DbTransaction>,
}

impl Transaction {
    /// Begin a transaction on a connection borrowed from the pool.
    ///
    /// Autocommit is off for the connection until commit or rollback.
    pub(crate) async fn begin(handle: &PoolHandle) -> DbResult<Self> {
        let inner = match handle.pool() {
            DbPool::MySql(pool) => {
                DbTransaction::MySql(pool.begin().await.map_err(DbError::from)?)
            }
            DbPool::Postgres(pool) => {
                DbTransaction::Postgres(pool.begin().await.map_err(DbError::from)?)
            }
            DbPool::SQLite(pool) => {
                DbTransaction::SQLite(pool.begin().await.map_err(DbError::from)?)
            }
        };

        info!(
            pool = %handle.name(),
            db_type = %inner.db_type(),
            "Transaction started"
        );
        Ok(Self { inner: Some(inner) })
    }

    /// Whether the transaction is still open.
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn active(&mut self) -> DbResult<&mut DbTransaction> {
        self.inner.as_mut().ok_or(DbError::ConnectionClosed)
    }

    async fn fetch_first_held(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Option<Row>> {
        validate_statement(sql)?;
        match self.active()? {
            DbTransaction::MySql(tx) => executor::mysql::fetch_first(&mut **tx, sql, params).await,
            DbTransaction::Postgres(tx) => {
                executor::postgres::fetch_first(&mut **tx, sql, params).await
            }
            DbTransaction::SQLite(tx) => {
                executor::sqlite::fetch_first(&mut **tx, sql, params).await
            }
        }
    }

    async fn fetch_rows_held(&mut self, sql: &str, params: &[SqlParam]) -> DbResult<Vec<Row>> {
        validate_statement(sql)?;
        match self.active()? {
            DbTransaction::MySql(tx) => executor::mysql::fetch_rows(&mut **tx, sql, params).await,
            DbTransaction::Postgres(tx) => {
                executor::postgres::fetch_rows(&mut **tx, sql, params).await
            }
            DbTransaction::SQLite(tx) => {
                executor::sqlite::fetch_rows(&mut **tx, sql, params).await
            }
        }
    }

    /// Execute an update on the held connection.
    pub async fn execute_update(&mut self, sql: &str, params: &[SqlParam]) -> DbResult<u64> {
        validate_statement(sql)?;
        let count = match self.active()? {
            DbTransaction::MySql(tx) => executor::mysql::execute(&mut **tx, sql, params).await?,
            DbTransaction::Postgres(tx) => {
                executor::postgres::execute(&mut **tx, sql, params).await?
            }
            DbTransaction::SQLite(tx) => {
                executor::sqlite::execute(&mut **tx, sql, params).await?
            }
        };
        debug!(sql = %sql, rows_affected = count, "Executed in transaction");
        Ok(count)
    }

    /// Execute a batch update on the held connection, one entry per
    /// argument set.
    pub async fn execute_batch_update(
        &mut self,
        sql: &str,
        arg_sets: &[Vec<SqlParam>],
    ) -> DbResult<Vec<u64>> {
        validate_statement(sql)?;
        let counts = match self.active()? {
            DbTransaction::MySql(tx) => {
                executor::mysql::execute_batch(&mut **tx, sql, arg_sets).await?
            }
            DbTransaction::Postgres(tx) => {
                executor::postgres::execute_batch(&mut **tx, sql, arg_sets).await?
            }
            DbTransaction::SQLite(tx) => {
                executor::sqlite::execute_batch(&mut **tx, sql, arg_sets).await?
            }
        };
        debug!(sql = %sql, entries = counts.len(), "Executed batch in transaction");
        Ok(counts)
    }

    /// Query for at most one record through declared bindings.
    pub async fn query<T: Entity>(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Option<T>> {
        ensure_mappable::<T>()?;
        let row = self.fetch_first_held(sql, params).await?;
        row.map(|r| map_record(&r)).transpose()
    }

    /// Query for all matching records through declared bindings.
    pub async fn query_for_list<T: Entity>(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Vec<T>> {
        ensure_mappable::<T>()?;
        let rows = self.fetch_rows_held(sql, params).await?;
        rows.iter().map(|r| map_record(r)).collect()
    }

    /// Query for at most one result through a row-mapper callback.
    pub async fn query_with<T, M: RowMapper<T>>(
        &mut self,
        sql: &str,
        params: &[SqlParam],
        mapper: M,
    ) -> DbResult<Option<T>> {
        let row = self.fetch_first_held(sql, params).await?;
        Ok(row.map(|r| mapper.map_row(&r)))
    }

    /// Query for all matching results through a row-mapper callback.
    pub async fn query_for_list_with<T, M: RowMapper<T>>(
        &mut self,
        sql: &str,
        params: &[SqlParam],
        mapper: M,
    ) -> DbResult<Vec<T>> {
        let rows = self.fetch_rows_held(sql, params).await?;
        Ok(rows.iter().map(|r| mapper.map_row(r)).collect())
    }

    /// Query for at most one record through dynamic field-name matching.
    pub async fn query_dynamic<T: DeserializeOwned>(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Option<T>> {
        match self.fetch_first_held(sql, params).await? {
            None => Ok(None),
            Some(row) => map_dynamic(&row),
        }
    }

    /// Query for all matching records through dynamic field-name matching.
    pub async fn query_for_list_dynamic<T: DeserializeOwned>(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Vec<T>> {
        let rows = self.fetch_rows_held(sql, params).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(record) = map_dynamic(row)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Commit the transaction and release the held connection.
    ///
    /// The transaction is terminal afterwards and cannot be reused.
    pub async fn commit(&mut self) -> DbResult<()> {
        let tx = self.inner.take().ok_or(DbError::ConnectionClosed)?;
        tx.commit().await?;
        info!("Transaction committed");
        Ok(())
    }

    /// Roll back the transaction.
    ///
    /// The held connection is returned to its pool; the transaction is
    /// terminal afterwards and cannot be reused.
    pub async fn rollback(&mut self) -> DbResult<()> {
        let tx = self.inner.take().ok_or(DbError::ConnectionClosed)?;
        tx.rollback().await?;
        info!("Transaction rolled back");
        Ok(())
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("open", &self.is_open())
            .finish()
    }
}
