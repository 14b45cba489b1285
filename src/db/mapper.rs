//! Declared-binding row mapping.
//!
//! A record type opts in by declaring field-to-column bindings through the
//! [`entity!`](crate::entity) macro, which builds the binding table once at
//! compile time and generates the row conversion. Mapping a type whose
//! table is empty is always a caller bug and fails with
//! [`DbError::NoMappableFields`].
//!
//! NULL handling mirrors typed result-set getters: textual, numeric,
//! boolean, and char fields fall back to their zero value, while temporal
//! fields reject NULL — declare those as `Option` when the column is
//! nullable.

use crate::db::types::{Row, SqlValue};
use crate::error::{DbError, DbResult};
use chrono::{NaiveDate, NaiveDateTime};

/// Semantic type tag of a bound field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Bool,
    Char,
    Byte,
    Short,
    Int32,
    Int64,
    Float32,
    Float64,
    Date,
    Timestamp,
}

/// Declared association between a record field and a result-set column.
#[derive(Debug, Clone, Copy)]
pub struct FieldBinding {
    pub column: &'static str,
    pub field: &'static str,
    pub kind: FieldType,
}

/// A record type with a declared binding table.
///
/// Implemented by the [`entity!`](crate::entity) macro; the table is
/// resolved once per type and reused for every row.
pub trait Entity: Sized {
    /// The record type's name, used in diagnostics.
    fn type_name() -> &'static str;

    /// The declared field-to-column bindings.
    fn bindings() -> &'static [FieldBinding];

    /// Convert one row into a record instance.
    fn from_row(row: &Row) -> DbResult<Self>;
}

/// Fail fast when a record type declares no bindings.
pub(crate) fn ensure_mappable<T: Entity>() -> DbResult<()> {
    if T::bindings().is_empty() {
        return Err(DbError::no_mappable_fields(T::type_name()));
    }
    Ok(())
}

/// Map one row through a record type's declared bindings.
pub fn map_record<T: Entity>(row: &Row) -> DbResult<T> {
    ensure_mappable::<T>()?;
    T::from_row(row)
}

/// Per-row mapping callback, the hand-written alternative to declared
/// bindings. Implemented for any `Fn(&Row) -> T`.
pub trait RowMapper<T> {
    fn map_row(&self, row: &Row) -> T;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&Row) -> T,
{
    fn map_row(&self, row: &Row) -> T {
        self(row)
    }
}

/// Field-level decoding for the supported field types.
///
/// The associated tag feeds the binding table; `decode` dispatches the
/// column value into the field's representation.
pub trait FieldKind: Sized {
    const KIND: FieldType;

    fn decode(field: &'static str, value: Option<&SqlValue>) -> DbResult<Self>;
}

fn mismatch<T>(field: &'static str, value: &SqlValue) -> DbResult<T> {
    Err(DbError::unsupported_field(field, value.type_name()))
}

impl FieldKind for String {
    const KIND: FieldType = FieldType::Text;

    fn decode(field: &'static str, value: Option<&SqlValue>) -> DbResult<Self> {
        match value {
            None | Some(SqlValue::Null) => Ok(String::new()),
            Some(SqlValue::Text(v)) => Ok(v.clone()),
            Some(other) => mismatch(field, other),
        }
    }
}

impl FieldKind for bool {
    const KIND: FieldType = FieldType::Bool;

    fn decode(field: &'static str, value: Option<&SqlValue>) -> DbResult<Self> {
        match value {
            None | Some(SqlValue::Null) => Ok(false),
            Some(SqlValue::Bool(v)) => Ok(*v),
            // SQLite surfaces booleans as integers
            Some(SqlValue::Int(v)) => Ok(*v != 0),
            Some(other) => mismatch(field, other),
        }
    }
}

impl FieldKind for char {
    const KIND: FieldType = FieldType::Char;

    fn decode(field: &'static str, value: Option<&SqlValue>) -> DbResult<Self> {
        match value {
            // NULL and the empty string leave the zero value
            None | Some(SqlValue::Null) => Ok(char::default()),
            Some(SqlValue::Text(v)) => Ok(v.chars().next().unwrap_or_default()),
            Some(other) => mismatch(field, other),
        }
    }
}

macro_rules! integer_field_kind {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(
            impl FieldKind for $ty {
                const KIND: FieldType = FieldType::$kind;

                fn decode(field: &'static str, value: Option<&SqlValue>) -> DbResult<Self> {
                    match value {
                        None | Some(SqlValue::Null) => Ok(0),
                        Some(SqlValue::Int(v)) => Ok(*v as $ty),
                        Some(other) => mismatch(field, other),
                    }
                }
            }
        )+
    };
}

integer_field_kind! {
    i8 => Byte,
    i16 => Short,
    i32 => Int32,
    i64 => Int64,
}

macro_rules! float_field_kind {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(
            impl FieldKind for $ty {
                const KIND: FieldType = FieldType::$kind;

                fn decode(field: &'static str, value: Option<&SqlValue>) -> DbResult<Self> {
                    match value {
                        None | Some(SqlValue::Null) => Ok(0.0),
                        Some(SqlValue::Float(v)) => Ok(*v as $ty),
                        Some(SqlValue::Int(v)) => Ok(*v as $ty),
                        Some(other) => mismatch(field, other),
                    }
                }
            }
        )+
    };
}

float_field_kind! {
    f32 => Float32,
    f64 => Float64,
}

impl FieldKind for NaiveDate {
    const KIND: FieldType = FieldType::Date;

    fn decode(field: &'static str, value: Option<&SqlValue>) -> DbResult<Self> {
        match value {
            Some(SqlValue::Date(v)) => Ok(*v),
            // A timestamp column feeding a date field truncates to its date
            Some(SqlValue::Timestamp(v)) => Ok(v.date()),
            None | Some(SqlValue::Null) => {
                Err(DbError::unsupported_field(field, "null"))
            }
            Some(other) => mismatch(field, other),
        }
    }
}

impl FieldKind for NaiveDateTime {
    const KIND: FieldType = FieldType::Timestamp;

    fn decode(field: &'static str, value: Option<&SqlValue>) -> DbResult<Self> {
        match value {
            Some(SqlValue::Timestamp(v)) => Ok(*v),
            Some(SqlValue::Date(v)) => Ok(v.and_time(chrono::NaiveTime::MIN)),
            None | Some(SqlValue::Null) => {
                Err(DbError::unsupported_field(field, "null"))
            }
            Some(other) => mismatch(field, other),
        }
    }
}

impl<T: FieldKind> FieldKind for Option<T> {
    const KIND: FieldType = T::KIND;

    fn decode(field: &'static str, value: Option<&SqlValue>) -> DbResult<Self> {
        match value {
            None | Some(SqlValue::Null) => Ok(None),
            some => T::decode(field, some).map(Some),
        }
    }
}

/// Declare a record struct with field-to-column bindings.
///
/// Generates the struct plus its [`Entity`] implementation: a binding table
/// resolved at compile time and a `from_row` conversion using the
/// type-appropriate decoder per field.
///
/// ```
/// use dbkit::entity;
///
/// entity! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub struct Book {
///         pub author: String => "Author",
///         pub pages: i32 => "Pages",
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty => $column:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::Entity for $name {
            fn type_name() -> &'static str {
                stringify!($name)
            }

            fn bindings() -> &'static [$crate::FieldBinding] {
                const BINDINGS: &[$crate::FieldBinding] = &[
                    $(
                        $crate::FieldBinding {
                            column: $column,
                            field: stringify!($field),
                            kind: <$ty as $crate::FieldKind>::KIND,
                        },
                    )*
                ];
                BINDINGS
            }

            fn from_row(row: &$crate::Row) -> $crate::DbResult<Self> {
                Ok(Self {
                    $(
                        $field: <$ty as $crate::FieldKind>::decode(
                            stringify!($field),
                            row.get($column),
                        )?,
                    )*
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::entity! {
        #[derive(Debug, Clone, PartialEq)]
        pub struct Book {
            pub author: String => "Author",
            pub pages: i32 => "Pages",
            pub in_print: bool => "InPrint",
            pub rating: Option<f64> => "Rating",
            pub edition: char => "Edition",
        }
    }

    crate::entity! {
        #[derive(Debug)]
        pub struct Unmapped {}
    }

    fn book_row() -> Row {
        Row::from_pairs(vec![
            ("AUTHOR".to_string(), SqlValue::Text("Mario Dennis".into())),
            ("PAGES".to_string(), SqlValue::Int(320)),
            ("INPRINT".to_string(), SqlValue::Int(1)),
            ("RATING".to_string(), SqlValue::Float(4.5)),
            ("EDITION".to_string(), SqlValue::Text("b".into())),
        ])
    }

    #[test]
    fn test_bindings_resolved_once_per_type() {
        let bindings = Book::bindings();
        assert_eq!(bindings.len(), 5);
        assert_eq!(bindings[0].column, "Author");
        assert_eq!(bindings[0].field, "author");
        assert_eq!(bindings[0].kind, FieldType::Text);
        assert_eq!(bindings[3].kind, FieldType::Float64);
    }

    #[test]
    fn test_map_record_round_trip() {
        let book: Book = map_record(&book_row()).unwrap();
        assert_eq!(book.author, "Mario Dennis");
        assert_eq!(book.pages, 320);
        assert!(book.in_print);
        assert_eq!(book.rating, Some(4.5));
        assert_eq!(book.edition, 'b');
    }

    #[test]
    fn test_no_bindings_is_an_error() {
        let err = map_record::<Unmapped>(&book_row()).unwrap_err();
        assert!(matches!(err, DbError::NoMappableFields { .. }));
        assert!(err.to_string().contains("Unmapped"));
    }

    #[test]
    fn test_char_field_null_and_empty_leave_zero_value() {
        let row = Row::from_pairs(vec![
            ("AUTHOR".to_string(), SqlValue::Text("x".into())),
            ("PAGES".to_string(), SqlValue::Int(1)),
            ("INPRINT".to_string(), SqlValue::Bool(false)),
            ("RATING".to_string(), SqlValue::Null),
            ("EDITION".to_string(), SqlValue::Text(String::new())),
        ]);
        let book: Book = map_record(&row).unwrap();
        assert_eq!(book.edition, char::default());
        assert_eq!(book.rating, None);

        let row = Row::from_pairs(vec![
            ("AUTHOR".to_string(), SqlValue::Null),
            ("PAGES".to_string(), SqlValue::Null),
            ("INPRINT".to_string(), SqlValue::Null),
            ("RATING".to_string(), SqlValue::Null),
            ("EDITION".to_string(), SqlValue::Null),
        ]);
        let book: Book = map_record(&row).unwrap();
        assert_eq!(book.edition, char::default());
        assert_eq!(book.author, "");
        assert_eq!(book.pages, 0);
    }

    #[test]
    fn test_incompatible_value_shape_is_unsupported_field() {
        let row = Row::from_pairs(vec![
            ("AUTHOR".to_string(), SqlValue::Bytes(vec![1, 2])),
            ("PAGES".to_string(), SqlValue::Int(1)),
            ("INPRINT".to_string(), SqlValue::Bool(true)),
            ("RATING".to_string(), SqlValue::Null),
            ("EDITION".to_string(), SqlValue::Null),
        ]);
        let err = map_record::<Book>(&row).unwrap_err();
        assert!(matches!(
            err,
            DbError::UnsupportedFieldType { ref field, .. } if field == "author"
        ));
    }

    #[test]
    fn test_timestamp_column_feeds_date_field() {
        let ts = NaiveDate::from_ymd_opt(2016, 3, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let got = <NaiveDate as FieldKind>::decode("published", Some(&SqlValue::Timestamp(ts)))
            .unwrap();
        assert_eq!(got, NaiveDate::from_ymd_opt(2016, 3, 14).unwrap());
    }

    #[test]
    fn test_null_temporal_field_requires_option() {
        let err =
            <NaiveDate as FieldKind>::decode("published", Some(&SqlValue::Null)).unwrap_err();
        assert!(matches!(err, DbError::UnsupportedFieldType { .. }));

        let got =
            <Option<NaiveDate> as FieldKind>::decode("published", Some(&SqlValue::Null)).unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn test_closure_row_mapper() {
        let mapper = |row: &Row| match row.get("Author") {
            Some(SqlValue::Text(v)) => v.clone(),
            _ => String::new(),
        };
        assert_eq!(mapper.map_row(&book_row()), "Mario Dennis");
    }
}
