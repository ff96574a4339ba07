//! Positional argument values with date revival.
//!
//! JSON has no date type, so dates cross the wire as ISO-8601 strings with
//! millisecond precision (`2024-09-01T08:30:00.000Z`). Any string that matches
//! that exact shape is revived to [`Datum::Date`] when decoded.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$")
        .expect("ISO-8601 pattern is valid");
}

/// A JSON value with a first-class date variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Datum {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Datum>),
    Object(BTreeMap<String, Datum>),
}

impl Datum {
    /// A date truncated to the millisecond precision the wire carries.
    pub fn date(date: DateTime<Utc>) -> Self {
        Datum::Date(date.trunc_subsecs(3))
    }

    /// Convert a JSON value, reviving date-shaped strings.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Bool(b),
            Value::Number(n) => Datum::Number(n),
            Value::String(s) => revive(s),
            Value::Array(items) => Datum::Array(items.into_iter().map(Datum::from_json).collect()),
            Value::Object(map) => Datum::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Datum::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back to plain JSON; dates become ISO-8601 strings.
    pub fn to_json(&self) -> Value {
        match self {
            Datum::Null => Value::Null,
            Datum::Bool(b) => Value::Bool(*b),
            Datum::Number(n) => Value::Number(n.clone()),
            Datum::String(s) => Value::String(s.clone()),
            Datum::Date(d) => Value::String(format_date(d)),
            Datum::Array(items) => Value::Array(items.iter().map(Datum::to_json).collect()),
            Datum::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }

    /// Build a datum from any serializable value.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Datum::from_json)
    }

    /// Deserialize into a typed value. Dates deserialize from their string form,
    /// so `DateTime<Utc>` fields work as expected.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Datum::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Look up a field of an object.
    pub fn get(&self, field: &str) -> Option<&Datum> {
        match self {
            Datum::Object(map) => map.get(field),
            _ => None,
        }
    }
}

fn revive(s: String) -> Datum {
    if ISO_DATE.is_match(&s) {
        if let Ok(date) = DateTime::parse_from_rfc3339(&s) {
            return Datum::date(date.with_timezone(&Utc));
        }
    }
    Datum::String(s)
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Serialize for Datum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Datum::Null => serializer.serialize_unit(),
            Datum::Bool(b) => serializer.serialize_bool(*b),
            Datum::Number(n) => n.serialize(serializer),
            Datum::String(s) => serializer.serialize_str(s),
            Datum::Date(d) => serializer.serialize_str(&format_date(d)),
            Datum::Array(items) => items.serialize(serializer),
            Datum::Object(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Datum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Datum::from_json)
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::from_json(value)
    }
}

impl From<DateTime<Utc>> for Datum {
    fn from(date: DateTime<Utc>) -> Self {
        Datum::date(date)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::String(s.to_string())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::String(s)
    }
}

impl From<i64> for Datum {
    fn from(n: i64) -> Self {
        Datum::Number(n.into())
    }
}

impl From<bool> for Datum {
    fn from(b: bool) -> Self {
        Datum::Bool(b)
    }
}

impl From<Vec<Datum>> for Datum {
    fn from(items: Vec<Datum>) -> Self {
        Datum::Array(items)
    }
}
