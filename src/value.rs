// Copyright (c) 2025 Opteryx Driver Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Backend type tags and scalar value conversion.
//!
//! The service reports a type tag per column; [`Value::from_raw`] converts
//! each raw JSON cell into a typed scalar. Conversion is best-effort and
//! total: an unknown tag or an unparsable cell degrades to text rather
//! than failing, so a malformed cell can never abort an otherwise valid
//! result set.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer};

/// Backend-reported column type tag.
///
/// Known tags form a closed set; anything the service reports outside it
/// is carried verbatim in [`TypeTag::Other`] and mapped as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Boolean,
    Integer,
    Double,
    Varchar,
    Date,
    Time,
    Timestamp,
    Null,
    Other(String),
}

impl TypeTag {
    /// Parse a type tag reported by the service.
    ///
    /// Tags are matched case-insensitively on the base name, so
    /// `DECIMAL(10,2)` and `varchar(64)` resolve like their bare forms.
    pub fn parse(raw: &str) -> TypeTag {
        let upper = raw.to_uppercase();
        let base = upper.split('(').next().unwrap_or(&upper).trim();

        match base {
            "BOOLEAN" | "BOOL" => TypeTag::Boolean,
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "TINYINT" => TypeTag::Integer,
            "DOUBLE" | "FLOAT" | "REAL" | "DECIMAL" | "NUMERIC" => TypeTag::Double,
            "VARCHAR" | "STRING" | "CHAR" | "TEXT" => TypeTag::Varchar,
            "DATE" => TypeTag::Date,
            "TIME" => TypeTag::Time,
            "TIMESTAMP" | "DATETIME" => TypeTag::Timestamp,
            "NULL" | "VOID" => TypeTag::Null,
            _ => TypeTag::Other(raw.to_string()),
        }
    }
}

impl Default for TypeTag {
    // The service omits the tag for computed columns; text is the safe guess.
    fn default() -> Self {
        TypeTag::Varchar
    }
}

impl<'de> Deserialize<'de> for TypeTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(TypeTag::parse(&raw))
    }
}

/// A single typed cell in a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Convert a raw JSON cell into a typed scalar using the column's tag.
    ///
    /// Pure and total: JSON null is [`Value::Null`] regardless of tag, and
    /// any cell that does not match its tag falls back to its textual form.
    pub fn from_raw(tag: &TypeTag, raw: &serde_json::Value) -> Value {
        if raw.is_null() {
            return Value::Null;
        }

        match tag {
            TypeTag::Boolean => match raw {
                serde_json::Value::Bool(b) => Value::Boolean(*b),
                serde_json::Value::String(s) if s.eq_ignore_ascii_case("true") => {
                    Value::Boolean(true)
                }
                serde_json::Value::String(s) if s.eq_ignore_ascii_case("false") => {
                    Value::Boolean(false)
                }
                _ => Value::fallback_text(raw),
            },
            TypeTag::Integer => match raw.as_i64() {
                Some(n) => Value::Integer(n),
                None => raw
                    .as_str()
                    .and_then(|s| s.parse().ok())
                    .map(Value::Integer)
                    .unwrap_or_else(|| Value::fallback_text(raw)),
            },
            TypeTag::Double => match raw.as_f64() {
                Some(f) => Value::Double(f),
                None => raw
                    .as_str()
                    .and_then(|s| s.parse().ok())
                    .map(Value::Double)
                    .unwrap_or_else(|| Value::fallback_text(raw)),
            },
            TypeTag::Date => raw
                .as_str()
                .and_then(parse_date)
                .map(Value::Date)
                .unwrap_or_else(|| Value::fallback_text(raw)),
            TypeTag::Time => raw
                .as_str()
                .and_then(parse_time)
                .map(Value::Time)
                .unwrap_or_else(|| Value::fallback_text(raw)),
            TypeTag::Timestamp => raw
                .as_str()
                .and_then(parse_timestamp)
                .map(Value::Timestamp)
                .unwrap_or_else(|| Value::fallback_text(raw)),
            TypeTag::Null => Value::fallback_text(raw),
            TypeTag::Varchar | TypeTag::Other(_) => Value::fallback_text(raw),
        }
    }

    /// Textual form of a raw cell: strings pass through unquoted, anything
    /// else uses its JSON rendering.
    fn fallback_text(raw: &serde_json::Value) -> Value {
        match raw {
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::Timestamp(ts) => write!(f, "{ts}"),
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").ok()
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    // The service emits ISO 8601 with either a 'T' or a space separator,
    // with or without fractional seconds, sometimes Zulu-suffixed.
    let s = s.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}
