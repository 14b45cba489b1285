//! Parameter binding for prepared statements.
//!
//! [`SqlParam`] is the tagged set of bindable values; the `bind_*_param`
//! functions fold one parameter into a database-specific query object.
//!
//! Date policy: only timezone-naive SQL types are bindable. `Date` carries a
//! `chrono::NaiveDate` and `Timestamp` a `chrono::NaiveDateTime`; the
//! timezone-carrying `chrono::DateTime` deliberately has no conversion into
//! [`SqlParam`] — callers convert explicitly to the naive type they mean.

use crate::error::{DbError, DbResult};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Postgres, Sqlite};

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// NULL value (binds SQL NULL into its placeholder)
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    /// Single character, bound as a length-1 string
    Char(char),
    /// Timezone-naive SQL DATE
    Date(NaiveDate),
    /// Timezone-naive SQL TIMESTAMP
    Timestamp(NaiveDateTime),
}

impl SqlParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The tag name of this parameter for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Byte(_) => "byte",
            Self::Short(_) => "short",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Text(_) => "text",
            Self::Char(_) => "char",
            Self::Date(_) => "date",
            Self::Timestamp(_) => "timestamp",
        }
    }

    /// Convert a JSON value into a parameter.
    ///
    /// JSON arrays and objects have no placeholder representation and fail
    /// with [`DbError::UnsupportedParameterType`].
    pub fn from_json(value: &serde_json::Value) -> DbResult<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(v) => Ok(Self::Bool(*v)),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(Self::Int64(v))
                } else if let Some(v) = n.as_f64() {
                    Ok(Self::Float64(v))
                } else {
                    Err(DbError::unsupported_parameter("number"))
                }
            }
            serde_json::Value::String(v) => Ok(Self::Text(v.clone())),
            serde_json::Value::Array(_) => Err(DbError::unsupported_parameter("array")),
            serde_json::Value::Object(_) => Err(DbError::unsupported_parameter("object")),
        }
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i8> for SqlParam {
    fn from(v: i8) -> Self {
        Self::Byte(v)
    }
}

impl From<i16> for SqlParam {
    fn from(v: i16) -> Self {
        Self::Short(v)
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f32> for SqlParam {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<char> for SqlParam {
    fn from(v: char) -> Self {
        Self::Char(v)
    }
}

impl From<NaiveDate> for SqlParam {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for SqlParam {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// Build a `Vec<SqlParam>` from values convertible into [`SqlParam`].
///
/// ```
/// use dbkit::params;
/// let args = params!["Mario Dennis", 320i32, true];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => { Vec::<$crate::SqlParam>::new() };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::SqlParam::from($value)),+]
    };
}

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q SqlParam,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(v) => query.bind(*v),
        SqlParam::Byte(v) => query.bind(*v),
        SqlParam::Short(v) => query.bind(*v),
        SqlParam::Int32(v) => query.bind(*v),
        SqlParam::Int64(v) => query.bind(*v),
        SqlParam::Float32(v) => query.bind(*v),
        SqlParam::Float64(v) => query.bind(*v),
        SqlParam::Text(v) => query.bind(v.as_str()),
        SqlParam::Char(v) => query.bind(v.to_string()),
        SqlParam::Date(v) => query.bind(*v),
        SqlParam::Timestamp(v) => query.bind(*v),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q SqlParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(v) => query.bind(*v),
        // PostgreSQL has no single-byte integer; widen to SMALLINT
        SqlParam::Byte(v) => query.bind(*v as i16),
        SqlParam::Short(v) => query.bind(*v),
        SqlParam::Int32(v) => query.bind(*v),
        SqlParam::Int64(v) => query.bind(*v),
        SqlParam::Float32(v) => query.bind(*v),
        SqlParam::Float64(v) => query.bind(*v),
        SqlParam::Text(v) => query.bind(v.as_str()),
        SqlParam::Char(v) => query.bind(v.to_string()),
        SqlParam::Date(v) => query.bind(*v),
        SqlParam::Timestamp(v) => query.bind(*v),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q SqlParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(v) => query.bind(*v),
        SqlParam::Byte(v) => query.bind(*v),
        SqlParam::Short(v) => query.bind(*v),
        SqlParam::Int32(v) => query.bind(*v),
        SqlParam::Int64(v) => query.bind(*v),
        SqlParam::Float32(v) => query.bind(*v),
        SqlParam::Float64(v) => query.bind(*v),
        SqlParam::Text(v) => query.bind(v.as_str()),
        SqlParam::Char(v) => query.bind(v.to_string()),
        // SQLite stores dates as ISO-8601 text
        SqlParam::Date(v) => query.bind(*v),
        SqlParam::Timestamp(v) => query.bind(*v),
    }
}
