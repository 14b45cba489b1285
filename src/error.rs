//! Error types for the access layer.
//!
//! This module defines all error types using `thiserror` for ergonomic error
//! handling. Every failure a caller can observe is one of these variants;
//! underlying SQL failures are wrapped rather than swallowed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Invalid profile fields, a missing named profile, or an unreadable
    /// profile source. Surfaced at construction time, never retried.
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// Pooled data source construction failed (unknown driver id, refused
    /// connection, malformed URL). Not retried automatically.
    #[error("Failed to create connection pool: {message}")]
    PoolCreation { message: String },

    /// A record type used in declared-binding mode carries no column
    /// bindings. Always a caller bug.
    #[error("{type_name} declares no column bindings")]
    NoMappableFields { type_name: String },

    /// A parameter value outside the supported set.
    #[error("Unsupported parameter type: {type_name}")]
    UnsupportedParameterType { type_name: String },

    /// A column value whose shape cannot feed the declared field kind.
    #[error("Unsupported value for field '{field}': {type_name}")]
    UnsupportedFieldType { field: String, type_name: String },

    /// Any underlying SQL execution failure: bad SQL, constraint violation,
    /// connectivity loss mid-statement.
    #[error("Database access error: {message}")]
    DataAccess {
        message: String,
        /// e.g. "42P01" for undefined table
        sql_state: Option<String>,
    },

    /// An operation was attempted on a connection or transaction already
    /// closed; checked proactively before the driver is touched.
    #[error("Connection already closed")]
    ConnectionClosed,

    /// Argument validation failure (empty SQL, and so on), raised before
    /// any connection is acquired.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a pool creation error.
    pub fn pool_creation(message: impl Into<String>) -> Self {
        Self::PoolCreation {
            message: message.into(),
        }
    }

    /// Create a no-mappable-fields error for a record type.
    pub fn no_mappable_fields(type_name: impl Into<String>) -> Self {
        Self::NoMappableFields {
            type_name: type_name.into(),
        }
    }

    /// Create an unsupported parameter type error.
    pub fn unsupported_parameter(type_name: impl Into<String>) -> Self {
        Self::UnsupportedParameterType {
            type_name: type_name.into(),
        }
    }

    /// Create an unsupported field type error.
    pub fn unsupported_field(field: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnsupportedFieldType {
            field: field.into(),
            type_name: type_name.into(),
        }
    }

    /// Create a data access error without a SQLSTATE.
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess {
            message: message.into(),
            sql_state: None,
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// The SQLSTATE reported by the database, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::DataAccess { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Whether this error signals a caller bug rather than a runtime
    /// failure of the database round-trip.
    pub fn is_caller_bug(&self) -> bool {
        matches!(
            self,
            Self::NoMappableFields { .. }
                | Self::UnsupportedParameterType { .. }
                | Self::UnsupportedFieldType { .. }
                | Self::InvalidArgument { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::pool_creation(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::DataAccess {
                    message: db_err.message().to_string(),
                    sql_state: code,
                }
            }
            sqlx::Error::RowNotFound => DbError::data_access("no rows returned"),
            sqlx::Error::PoolTimedOut => DbError::data_access("connection pool acquire timed out"),
            sqlx::Error::PoolClosed => DbError::ConnectionClosed,
            sqlx::Error::Io(io_err) => DbError::data_access(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => DbError::data_access(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => DbError::data_access(format!("protocol error: {}", msg)),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::data_access(format!("column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::data_access(format!(
                "column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::data_access(format!("failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                DbError::data_access(format!("decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => DbError::data_access("database worker crashed"),
            _ => DbError::data_access(format!("database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
