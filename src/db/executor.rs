//! Statement execution engine.
//!
//! Prepares, binds, and executes statements with guaranteed resource
//! release: the auto-managed path borrows a connection from the pool for
//! exactly one statement (or one batch) and sqlx's RAII returns it on every
//! exit path, success or failure. Transactions reuse the same per-driver
//! functions on their held connection.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in
//! submodules (`mysql`, `postgres`, `sqlite`), each generic over
//! `sqlx::Executor` so pools, pooled connections, and transaction
//! connections all flow through one code path per driver.

use crate::db::params::SqlParam;
use crate::db::pool::{DbPool, PoolHandle};
use crate::db::types::Row;
use crate::error::{DbError, DbResult};
use tracing::debug;

/// Validate statement arguments before any connection is touched.
pub(crate) fn validate_statement(sql: &str) -> DbResult<()> {
    if sql.trim().is_empty() {
        return Err(DbError::invalid_argument(
            "null or empty sql argument supplied",
        ));
    }
    Ok(())
}

fn ensure_open(handle: &PoolHandle) -> DbResult<()> {
    if handle.is_closed() {
        return Err(DbError::ConnectionClosed);
    }
    Ok(())
}

/// Auto-managed statement execution against a pooled data source.
///
/// Every method validates its arguments fail-fast, checks the pool is still
/// open, executes, and releases the borrowed connection before returning.
pub struct StatementExecutor;

impl StatementExecutor {
    /// Execute a query and consume at most the first row.
    ///
    /// First row wins: a query expected to yield one logical result
    /// truncates after row one rather than erroring on extras.
    pub async fn fetch_first(
        handle: &PoolHandle,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Option<Row>> {
        validate_statement(sql)?;
        ensure_open(handle)?;
        debug!(sql = %sql, params = params.len(), "Executing query");

        match handle.pool() {
            DbPool::MySql(p) => mysql::fetch_first(p, sql, params).await,
            DbPool::Postgres(p) => postgres::fetch_first(p, sql, params).await,
            DbPool::SQLite(p) => sqlite::fetch_first(p, sql, params).await,
        }
    }

    /// Execute a query and consume every row, in result-set order.
    ///
    /// No rows matched is an empty sequence, never an error.
    pub async fn fetch_rows(
        handle: &PoolHandle,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Vec<Row>> {
        validate_statement(sql)?;
        ensure_open(handle)?;
        debug!(sql = %sql, params = params.len(), "Executing query");

        match handle.pool() {
            DbPool::MySql(p) => mysql::fetch_rows(p, sql, params).await,
            DbPool::Postgres(p) => postgres::fetch_rows(p, sql, params).await,
            DbPool::SQLite(p) => sqlite::fetch_rows(p, sql, params).await,
        }
    }

    /// Execute an update and return the affected-row count (`0` when the
    /// update touched nothing).
    pub async fn execute(handle: &PoolHandle, sql: &str, params: &[SqlParam]) -> DbResult<u64> {
        validate_statement(sql)?;
        ensure_open(handle)?;
        debug!(sql = %sql, params = params.len(), "Executing update");

        match handle.pool() {
            DbPool::MySql(p) => mysql::execute(p, sql, params).await,
            DbPool::Postgres(p) => postgres::execute(p, sql, params).await,
            DbPool::SQLite(p) => sqlite::execute(p, sql, params).await,
        }
    }

    /// Execute a batch update on a single borrowed connection, one entry
    /// per argument set, returning per-entry affected-row counts.
    ///
    /// An empty argument-set list degenerates to a single unparameterized
    /// execution.
    pub async fn execute_batch(
        handle: &PoolHandle,
        sql: &str,
        arg_sets: &[Vec<SqlParam>],
    ) -> DbResult<Vec<u64>> {
        validate_statement(sql)?;
        ensure_open(handle)?;
        debug!(sql = %sql, entries = arg_sets.len(), "Executing batch update");

        match handle.pool() {
            DbPool::MySql(p) => {
                let mut conn = p.acquire().await.map_err(DbError::from)?;
                mysql::execute_batch(&mut conn, sql, arg_sets).await
            }
            DbPool::Postgres(p) => {
                let mut conn = p.acquire().await.map_err(DbError::from)?;
                postgres::execute_batch(&mut conn, sql, arg_sets).await
            }
            DbPool::SQLite(p) => {
                let mut conn = p.acquire().await.map_err(DbError::from)?;
                sqlite::execute_batch(&mut conn, sql, arg_sets).await
            }
        }
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database
// type. The code structure is intentionally parallel to make differences
// obvious.

pub(crate) mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use crate::db::types::ToRow;
    use sqlx::MySql;
    use sqlx::mysql::MySqlConnection;

    pub async fn fetch_first<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [SqlParam],
    ) -> DbResult<Option<Row>>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_mysql_param(query, param);
        }
        let row = query.fetch_optional(executor).await.map_err(DbError::from)?;
        Ok(row.map(|r| r.to_row()))
    }

    pub async fn fetch_rows<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [SqlParam],
    ) -> DbResult<Vec<Row>>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_mysql_param(query, param);
        }
        let rows = query.fetch_all(executor).await.map_err(DbError::from)?;
        Ok(rows.iter().map(|r| r.to_row()).collect())
    }

    pub async fn execute<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [SqlParam],
    ) -> DbResult<u64>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_mysql_param(query, param);
        }
        let result = query.execute(executor).await.map_err(DbError::from)?;
        Ok(result.rows_affected())
    }

    pub async fn execute_batch(
        conn: &mut MySqlConnection,
        sql: &str,
        arg_sets: &[Vec<SqlParam>],
    ) -> DbResult<Vec<u64>> {
        if arg_sets.is_empty() {
            let count = execute(&mut *conn, sql, &[]).await?;
            return Ok(vec![count]);
        }
        let mut counts = Vec::with_capacity(arg_sets.len());
        for params in arg_sets {
            counts.push(execute(&mut *conn, sql, params).await?);
        }
        Ok(counts)
    }
}

pub(crate) mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use crate::db::types::ToRow;
    use sqlx::Postgres;
    use sqlx::postgres::PgConnection;

    pub async fn fetch_first<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [SqlParam],
    ) -> DbResult<Option<Row>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_postgres_param(query, param);
        }
        let row = query.fetch_optional(executor).await.map_err(DbError::from)?;
        Ok(row.map(|r| r.to_row()))
    }

    pub async fn fetch_rows<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [SqlParam],
    ) -> DbResult<Vec<Row>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_postgres_param(query, param);
        }
        let rows = query.fetch_all(executor).await.map_err(DbError::from)?;
        Ok(rows.iter().map(|r| r.to_row()).collect())
    }

    pub async fn execute<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [SqlParam],
    ) -> DbResult<u64>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_postgres_param(query, param);
        }
        let result = query.execute(executor).await.map_err(DbError::from)?;
        Ok(result.rows_affected())
    }

    pub async fn execute_batch(
        conn: &mut PgConnection,
        sql: &str,
        arg_sets: &[Vec<SqlParam>],
    ) -> DbResult<Vec<u64>> {
        if arg_sets.is_empty() {
            let count = execute(&mut *conn, sql, &[]).await?;
            return Ok(vec![count]);
        }
        let mut counts = Vec::with_capacity(arg_sets.len());
        for params in arg_sets {
            counts.push(execute(&mut *conn, sql, params).await?);
        }
        Ok(counts)
    }
}

pub(crate) mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use crate::db::types::ToRow;
    use sqlx::Sqlite;
    use sqlx::sqlite::SqliteConnection;

    pub async fn fetch_first<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [SqlParam],
    ) -> DbResult<Option<Row>>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_sqlite_param(query, param);
        }
        let row = query.fetch_optional(executor).await.map_err(DbError::from)?;
        Ok(row.map(|r| r.to_row()))
    }

    pub async fn fetch_rows<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [SqlParam],
    ) -> DbResult<Vec<Row>>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_sqlite_param(query, param);
        }
        let rows = query.fetch_all(executor).await.map_err(DbError::from)?;
        Ok(rows.iter().map(|r| r.to_row()).collect())
    }

    pub async fn execute<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [SqlParam],
    ) -> DbResult<u64>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_sqlite_param(query, param);
        }
        let result = query.execute(executor).await.map_err(DbError::from)?;
        Ok(result.rows_affected())
    }

    pub async fn execute_batch(
        conn: &mut SqliteConnection,
        sql: &str,
        arg_sets: &[Vec<SqlParam>],
    ) -> DbResult<Vec<u64>> {
        if arg_sets.is_empty() {
            let count = execute(&mut *conn, sql, &[]).await?;
            return Ok(vec![count]);
        }
        let mut counts = Vec::with_capacity(arg_sets.len());
        for params in arg_sets {
            counts.push(execute(&mut *conn, sql, params).await?);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sql_is_invalid_argument() {
        assert!(matches!(
            validate_statement(""),
            Err(DbError::InvalidArgument { .. })
        ));
        assert!(matches!(
            validate_statement("   \n"),
            Err(DbError::InvalidArgument { .. })
        ));
        assert!(validate_statement("SELECT 1").is_ok());
    }
}
