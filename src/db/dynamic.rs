//! Dynamic row mapping.
//!
//! Maps a [`Row`] into any `serde`-deserializable record without declared
//! column bindings. The deserializer receives the target's declared field
//! names and matches each against the row's uppercased column names
//! case-insensitively; matched values flow through serde in their
//! driver-native representation. A field with no matching column is simply
//! not emitted, so `Option` fields come out `None` and `#[serde(default)]`
//! covers the rest. An empty row is "no result", never an error.

use crate::db::types::{Row, SqlValue};
use crate::error::{DbError, DbResult};
use serde::de::{self, DeserializeOwned, MapAccess, Visitor};
use std::fmt;

/// Map one row into a deserializable record.
///
/// Returns `Ok(None)` for an empty row — a query that genuinely returned
/// nothing usable is an absent result, not an error.
pub fn map_dynamic<T: DeserializeOwned>(row: &Row) -> DbResult<Option<T>> {
    if row.is_empty() {
        return Ok(None);
    }
    T::deserialize(RowDeserializer { row })
        .map(Some)
        .map_err(|e| DbError::data_access(format!("failed to map row: {}", e)))
}

#[derive(Debug)]
struct MapError(String);

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MapError {}

impl de::Error for MapError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        MapError(msg.to_string())
    }
}

struct RowDeserializer<'de> {
    row: &'de Row,
}

impl<'de> de::Deserializer<'de> for RowDeserializer<'de> {
    type Error = MapError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let entries: Vec<(&str, &SqlValue)> = self.row.iter().collect();
        visitor.visit_map(RowMapAccess {
            entries: entries.into_iter(),
            value: None,
        })
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        // The declared field list stands in for runtime reflection: emit
        // only fields with a matching column, keyed by the field name so
        // the generated visitor recognizes them.
        let entries: Vec<(&str, &SqlValue)> = fields
            .iter()
            .filter_map(|field| self.row.get(field).map(|value| (*field, value)))
            .collect();
        visitor.visit_map(RowMapAccess {
            entries: entries.into_iter(),
            value: None,
        })
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_any(visitor)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct enum identifier ignored_any
    }
}

struct RowMapAccess<'de, I>
where
    I: Iterator<Item = (&'de str, &'de SqlValue)>,
{
    entries: I,
    value: Option<&'de SqlValue>,
}

impl<'de, I> MapAccess<'de> for RowMapAccess<'de, I>
where
    I: Iterator<Item = (&'de str, &'de SqlValue)>,
{
    type Error = MapError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: de::DeserializeSeed<'de>,
    {
        match self.entries.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(de::value::StrDeserializer::<MapError>::new(key))
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: de::DeserializeSeed<'de>,
    {
        let value = self.value.take().expect("next_value_seed before next_key_seed");
        seed.deserialize(SqlValueDeserializer { value })
    }
}

struct SqlValueDeserializer<'de> {
    value: &'de SqlValue,
}

impl<'de> de::Deserializer<'de> for SqlValueDeserializer<'de> {
    type Error = MapError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            SqlValue::Null => visitor.visit_unit(),
            SqlValue::Bool(v) => visitor.visit_bool(*v),
            SqlValue::Int(v) => visitor.visit_i64(*v),
            SqlValue::Float(v) => visitor.visit_f64(*v),
            SqlValue::Text(v) => visitor.visit_str(v),
            SqlValue::Bytes(v) => visitor.visit_bytes(v),
            SqlValue::Date(v) => visitor.visit_string(v.to_string()),
            SqlValue::Time(v) => visitor.visit_string(v.to_string()),
            // chrono expects the ISO-8601 "T" separator
            SqlValue::Timestamp(v) => {
                visitor.visit_string(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            SqlValue::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct newtype_struct seq tuple tuple_struct
        map struct enum identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        name: String,
        age: i64,
        nickname: Option<String>,
    }

    fn person_row() -> Row {
        Row::from_pairs(vec![
            ("NAME".to_string(), SqlValue::Text("Sarah".into())),
            ("AGE".to_string(), SqlValue::Int(34)),
        ])
    }

    #[test]
    fn test_dynamic_mapping_matches_case_insensitively() {
        let person: Person = map_dynamic(&person_row()).unwrap().unwrap();
        assert_eq!(
            person,
            Person {
                name: "Sarah".to_string(),
                age: 34,
                nickname: None,
            }
        );
    }

    #[test]
    fn test_empty_row_is_no_result() {
        let got: Option<Person> = map_dynamic(&Row::default()).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let row = Row::from_pairs(vec![(
            "NAME".to_string(),
            SqlValue::Text("Sarah".into()),
        )]);
        let got: DbResult<Option<Person>> = map_dynamic(&row);
        assert!(got.is_err());
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let row = Row::from_pairs(vec![
            ("NAME".to_string(), SqlValue::Text("Sarah".into())),
            ("AGE".to_string(), SqlValue::Int(34)),
            ("UNUSED".to_string(), SqlValue::Float(1.5)),
        ]);
        let person: Person = map_dynamic(&row).unwrap().unwrap();
        assert_eq!(person.name, "Sarah");
    }

    #[test]
    fn test_null_column_feeds_option_as_none() {
        let row = Row::from_pairs(vec![
            ("NAME".to_string(), SqlValue::Text("Sarah".into())),
            ("AGE".to_string(), SqlValue::Int(34)),
            ("NICKNAME".to_string(), SqlValue::Null),
        ]);
        let person: Person = map_dynamic(&row).unwrap().unwrap();
        assert_eq!(person.nickname, None);
    }

    #[test]
    fn test_temporal_values_deserialize_via_chrono() {
        #[derive(Debug, Deserialize)]
        struct Event {
            on: chrono::NaiveDate,
            at: chrono::NaiveDateTime,
        }

        let ts = chrono::NaiveDate::from_ymd_opt(2016, 3, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let row = Row::from_pairs(vec![
            ("ON".to_string(), SqlValue::Date(ts.date())),
            ("AT".to_string(), SqlValue::Timestamp(ts)),
        ]);
        let event: Event = map_dynamic(&row).unwrap().unwrap();
        assert_eq!(event.on, ts.date());
        assert_eq!(event.at, ts);
    }
}
