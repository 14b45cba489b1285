//! Connection pool registry.
//!
//! This module caches database-specific pools (MySqlPool, PgPool,
//! SqlitePool) keyed by [`Profile`]. A pool is built lazily on first
//! request, handed out as a cheap cloneable handle, and rebuilt
//! transparently when a cached pool is found closed. At most one live pool
//! exists per distinct profile; a lost creation race closes the extra pool
//! rather than leaking it.

use crate::config::Profile;
use crate::error::{DbError, DbResult};
use sqlx::{
    MySqlPool, PgPool, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    postgres::PgConnectOptions, postgres::PgPoolOptions, sqlite::SqliteConnectOptions,
    sqlite::SqlitePoolOptions,
};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Maximum lifetime of a pooled connection before it is recycled.
const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(240);

/// How long an idle connection may linger before it is reaped.
const IDLE_TIMEOUT: Duration = Duration::from_secs(240);

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    MySql,
    Postgres,
    SQLite,
}

impl DatabaseType {
    /// Parse a driver id as it appears in a [`Profile`].
    pub fn from_driver_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" => Some(Self::SQLite),
            _ => None,
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }

    /// Whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        match self {
            DbPool::MySql(pool) => pool.is_closed(),
            DbPool::Postgres(pool) => pool.is_closed(),
            DbPool::SQLite(pool) => pool.is_closed(),
        }
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySql,
            DbPool::Postgres(_) => DatabaseType::Postgres,
            DbPool::SQLite(_) => DatabaseType::SQLite,
        }
    }
}

/// A handle to one live pooled data source.
///
/// Handles are cheap to clone; all clones refer to the same underlying
/// pool. The name identifies the pool instance itself — two handles from
/// the same registry entry share it, a rebuilt pool gets a fresh one.
#[derive(Debug, Clone)]
pub struct PoolHandle {
    pool: DbPool,
    name: Arc<str>,
}

impl PoolHandle {
    fn new(pool: DbPool) -> Self {
        let name = format!("pool_{}", uuid::Uuid::new_v4().simple());
        Self {
            pool,
            name: name.into(),
        }
    }

    /// The generated name of this pool instance.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        self.pool.db_type()
    }

    /// Whether the underlying pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Profile-keyed cache of pooled data sources.
///
/// Explicitly constructed and shared by reference; there is no process-wide
/// instance. Clones share the same cache.
#[derive(Debug, Clone)]
pub struct PoolRegistry {
    pools: Arc<RwLock<HashMap<Profile, PoolHandle>>>,
}

impl PoolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            pools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the live pool for a profile, creating it on first use.
    ///
    /// A cached pool found closed is evicted and rebuilt. Pool construction
    /// runs outside the registry lock; when two callers race on the same
    /// profile, one pool wins and the other is closed.
    pub async fn get_data_source(&self, profile: &Profile) -> DbResult<PoolHandle> {
        // Fast path: live cached pool
        {
            let pools = self.pools.read().await;
            if let Some(handle) = pools.get(profile) {
                if !handle.is_closed() {
                    return Ok(handle.clone());
                }
                warn!(
                    pool = %handle.name(),
                    url = %profile.masked_url(),
                    "Cached pool is closed, recreating"
                );
            }
        }

        // Build outside the lock; construction does network I/O and must
        // not block unrelated profiles.
        let fresh = Self::create_pool(profile).await?;

        // Re-check after async work to prevent TOCTOU race. If another
        // caller won, surrender our pool and close it outside the lock.
        let mut extra: Option<PoolHandle> = None;
        let handle = {
            let mut pools = self.pools.write().await;
            match pools.get(profile) {
                Some(existing) if !existing.is_closed() => {
                    extra = Some(fresh);
                    existing.clone()
                }
                _ => {
                    pools.insert(profile.clone(), fresh.clone());
                    fresh
                }
            }
        }; // Lock released here

        if let Some(loser) = extra {
            debug!(pool = %loser.name(), "Lost pool creation race, closing extra pool");
            loser.close().await;
        }

        Ok(handle)
    }

    /// Close and evict the pool for one profile; no-op when absent.
    pub async fn close_one(&self, profile: &Profile) {
        let removed = {
            let mut pools = self.pools.write().await;
            pools.remove(profile)
        };
        if let Some(handle) = removed {
            info!(pool = %handle.name(), "Closing pool");
            handle.close().await;
        }
    }

    /// Close every cached pool and clear the registry.
    ///
    /// Safe to call when empty; call once at process shutdown.
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (profile, handle) in pools.drain() {
            info!(
                pool = %handle.name(),
                url = %profile.masked_url(),
                "Closing pool"
            );
            handle.close().await;
        }
        info!("All pools closed");
    }

    /// Number of cached pools.
    pub async fn pool_count(&self) -> usize {
        let pools = self.pools.read().await;
        pools.len()
    }

    /// Create a connection pool for the given profile.
    async fn create_pool(profile: &Profile) -> DbResult<PoolHandle> {
        let db_type = DatabaseType::from_driver_id(profile.driver()).ok_or_else(|| {
            DbError::pool_creation(format!("unknown driver id '{}'", profile.driver()))
        })?;
        let max_connections = profile.max_pool_size().max(1);
        let min_connections = profile.min_pool_size();

        let pool = match db_type {
            DatabaseType::MySql => {
                let mut options = MySqlConnectOptions::from_str(profile.url())
                    .map_err(|e| {
                        DbError::pool_creation(format!("invalid MySQL url: {}", e))
                    })?
                    .username(profile.user())
                    .charset("utf8mb4");
                if let Some(password) = profile.password() {
                    options = options.password(password);
                }

                let pool = MySqlPoolOptions::new()
                    .min_connections(min_connections)
                    .max_connections(max_connections)
                    .max_lifetime(MAX_CONNECTION_LIFETIME)
                    .idle_timeout(IDLE_TIMEOUT)
                    .connect_with(options)
                    .await
                    .map_err(|e| DbError::pool_creation(format!("failed to connect: {}", e)))?;
                DbPool::MySql(pool)
            }
            DatabaseType::Postgres => {
                let mut options = PgConnectOptions::from_str(profile.url())
                    .map_err(|e| {
                        DbError::pool_creation(format!("invalid PostgreSQL url: {}", e))
                    })?
                    .username(profile.user());
                if let Some(password) = profile.password() {
                    options = options.password(password);
                }

                let pool = PgPoolOptions::new()
                    .min_connections(min_connections)
                    .max_connections(max_connections)
                    .max_lifetime(MAX_CONNECTION_LIFETIME)
                    .idle_timeout(IDLE_TIMEOUT)
                    .connect_with(options)
                    .await
                    .map_err(|e| DbError::pool_creation(format!("failed to connect: {}", e)))?;
                DbPool::Postgres(pool)
            }
            DatabaseType::SQLite => {
                // Credentials do not apply; the URL is a file path
                let options = SqliteConnectOptions::from_str(profile.url())
                    .map_err(|e| {
                        DbError::pool_creation(format!("invalid SQLite url: {}", e))
                    })?
                    .create_if_missing(true);

                let pool = SqlitePoolOptions::new()
                    .min_connections(min_connections)
                    .max_connections(max_connections)
                    .max_lifetime(MAX_CONNECTION_LIFETIME)
                    .idle_timeout(IDLE_TIMEOUT)
                    .connect_with(options)
                    .await
                    .map_err(|e| DbError::pool_creation(format!("failed to connect: {}", e)))?;
                DbPool::SQLite(pool)
            }
        };

        let handle = PoolHandle::new(pool);
        info!(
            pool = %handle.name(),
            db_type = %db_type,
            url = %profile.masked_url(),
            "Created connection pool"
        );
        Ok(handle)
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_profile() -> Profile {
        Profile::new("app", None, "sqlite::memory:", "sqlite")
            .unwrap()
            .with_max_pool_size(2)
    }

    #[tokio::test]
    async fn test_registry_starts_empty() {
        let registry = PoolRegistry::new();
        assert_eq!(registry.pool_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_driver_is_pool_creation_error() {
        let registry = PoolRegistry::new();
        let profile = Profile::new("app", None, "oracle://db", "oracle").unwrap();
        let err = registry.get_data_source(&profile).await.unwrap_err();
        assert!(matches!(err, DbError::PoolCreation { .. }));
        assert_eq!(registry.pool_count().await, 0);
    }

    #[tokio::test]
    async fn test_equal_profiles_share_one_pool() {
        let registry = PoolRegistry::new();
        let a = registry.get_data_source(&sqlite_profile()).await.unwrap();
        let b = registry.get_data_source(&sqlite_profile()).await.unwrap();
        assert_eq!(a.name(), b.name());
        assert_eq!(registry.pool_count().await, 1);
        registry.close_all().await;
    }

    #[tokio::test]
    async fn test_distinct_profiles_get_distinct_pools() {
        let registry = PoolRegistry::new();
        let a = registry.get_data_source(&sqlite_profile()).await.unwrap();
        let other = sqlite_profile().with_min_pool_size(1);
        let b = registry.get_data_source(&other).await.unwrap();
        assert_ne!(a.name(), b.name());
        assert_eq!(registry.pool_count().await, 2);
        registry.close_all().await;
    }

    #[tokio::test]
    async fn test_closed_pool_is_recreated() {
        let registry = PoolRegistry::new();
        let first = registry.get_data_source(&sqlite_profile()).await.unwrap();
        first.close().await;
        assert!(first.is_closed());

        let second = registry.get_data_source(&sqlite_profile()).await.unwrap();
        assert!(!second.is_closed());
        assert_ne!(first.name(), second.name());
        assert_eq!(registry.pool_count().await, 1);
        registry.close_all().await;
    }

    #[tokio::test]
    async fn test_close_all_safe_when_empty() {
        let registry = PoolRegistry::new();
        registry.close_all().await;
        assert_eq!(registry.pool_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_one_evicts_and_noops_when_absent() {
        let registry = PoolRegistry::new();
        let profile = sqlite_profile();
        let handle = registry.get_data_source(&profile).await.unwrap();
        registry.close_one(&profile).await;
        assert!(handle.is_closed());
        assert_eq!(registry.pool_count().await, 0);

        // absent entry is a no-op
        registry.close_one(&profile).await;
    }
}
