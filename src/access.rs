//! The data-access facade.
//!
//! [`DataAccess`] ties a [`Profile`] to a [`PoolRegistry`] and exposes the
//! public operations: single-row and multi-row queries in each mapping
//! mode, updates, batch updates, and explicit transactions. It owns no
//! state beyond the registry reference and the profile; the registry is
//! injected, so several facades can share one set of pools.

use crate::config::Profile;
use crate::db::dynamic::map_dynamic;
use crate::db::executor::{StatementExecutor, validate_statement};
use crate::db::mapper::{Entity, RowMapper, ensure_mappable, map_record};
use crate::db::params::SqlParam;
use crate::db::pool::{PoolHandle, PoolRegistry};
use crate::db::transaction::Transaction;
use crate::error::DbResult;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Facade over one database profile.
///
/// All query/update operations borrow a pooled connection for exactly one
/// statement and release it before returning;
/// [`begin_transaction`](DataAccess::begin_transaction) pins a connection
/// instead.
#[derive(Debug, Clone)]
pub struct DataAccess {
    registry: Arc<PoolRegistry>,
    profile: Profile,
}

impl DataAccess {
    /// Create a facade for a profile, using pools from `registry`.
    pub fn new(registry: Arc<PoolRegistry>, profile: Profile) -> Self {
        Self { registry, profile }
    }

    /// The profile this facade targets.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// The registry this facade draws pools from.
    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    async fn data_source(&self) -> DbResult<PoolHandle> {
        self.registry.get_data_source(&self.profile).await
    }

    /// Query for at most one record through declared bindings.
    ///
    /// First row wins; zero rows is `Ok(None)`, never an error.
    pub async fn query<T: Entity>(&self, sql: &str, params: &[SqlParam]) -> DbResult<Option<T>> {
        validate_statement(sql)?;
        ensure_mappable::<T>()?;
        let handle = self.data_source().await?;
        let row = StatementExecutor::fetch_first(&handle, sql, params).await?;
        row.map(|r| map_record(&r)).transpose()
    }

    /// Query for all matching records through declared bindings.
    ///
    /// Zero rows is an empty vector, never an error.
    pub async fn query_for_list<T: Entity>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Vec<T>> {
        validate_statement(sql)?;
        ensure_mappable::<T>()?;
        let handle = self.data_source().await?;
        let rows = StatementExecutor::fetch_rows(&handle, sql, params).await?;
        rows.iter().map(|r| map_record(r)).collect()
    }

    /// Query for at most one result through a row-mapper callback.
    pub async fn query_with<T, M: RowMapper<T>>(
        &self,
        sql: &str,
        params: &[SqlParam],
        mapper: M,
    ) -> DbResult<Option<T>> {
        validate_statement(sql)?;
        let handle = self.data_source().await?;
        let row = StatementExecutor::fetch_first(&handle, sql, params).await?;
        Ok(row.map(|r| mapper.map_row(&r)))
    }

    /// Query for all matching results through a row-mapper callback.
    pub async fn query_for_list_with<T, M: RowMapper<T>>(
        &self,
        sql: &str,
        params: &[SqlParam],
        mapper: M,
    ) -> DbResult<Vec<T>> {
        validate_statement(sql)?;
        let handle = self.data_source().await?;
        let rows = StatementExecutor::fetch_rows(&handle, sql, params).await?;
        Ok(rows.iter().map(|r| mapper.map_row(r)).collect())
    }

    /// Query for at most one record through dynamic field-name matching.
    pub async fn query_dynamic<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Option<T>> {
        validate_statement(sql)?;
        let handle = self.data_source().await?;
        match StatementExecutor::fetch_first(&handle, sql, params).await? {
            None => Ok(None),
            Some(row) => map_dynamic(&row),
        }
    }

    /// Query for all matching records through dynamic field-name matching.
    pub async fn query_for_list_dynamic<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Vec<T>> {
        validate_statement(sql)?;
        let handle = self.data_source().await?;
        let rows = StatementExecutor::fetch_rows(&handle, sql, params).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(record) = map_dynamic(row)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Issue a single update statement; returns the affected-row count.
    pub async fn execute_update(&self, sql: &str, params: &[SqlParam]) -> DbResult<u64> {
        validate_statement(sql)?;
        let handle = self.data_source().await?;
        StatementExecutor::execute(&handle, sql, params).await
    }

    /// Issue a batch update, one entry per argument set, on a single
    /// borrowed connection; returns per-entry affected-row counts.
    pub async fn execute_batch_update(
        &self,
        sql: &str,
        arg_sets: &[Vec<SqlParam>],
    ) -> DbResult<Vec<u64>> {
        validate_statement(sql)?;
        let handle = self.data_source().await?;
        StatementExecutor::execute_batch(&handle, sql, arg_sets).await
    }

    /// Begin a transaction on a connection pinned from this profile's
    /// pool.
    pub async fn begin_transaction(&self) -> DbResult<Transaction> {
        let handle = self.data_source().await?;
        Transaction::begin(&handle).await
    }

    /// Close all pooled resources held by the registry.
    ///
    /// Call once at process exit. Affects every profile sharing the
    /// registry, not just this facade's.
    pub async fn shutdown(&self) {
        self.registry.close_all().await;
    }
}
