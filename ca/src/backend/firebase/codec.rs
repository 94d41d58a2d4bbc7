//! Firestore typed values ⇄ plain JSON
//!
//! The REST API wraps every value in a single-key object naming its type
//! (`{"stringValue": "x"}`), which is exactly serde's externally tagged enum
//! layout.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

use crate::error::ServiceError;
use crate::schema::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FirestoreValue {
    NullValue(()),
    BooleanValue(bool),
    /// int64 travels as a decimal string
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(LatLng),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<FirestoreValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FirestoreValue>,
}

/// Document fields on the wire
pub type Fields = BTreeMap<String, FirestoreValue>;

impl FirestoreValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FirestoreValue::NullValue(()),
            Value::Bool(b) => FirestoreValue::BooleanValue(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FirestoreValue::IntegerValue(i.to_string()),
                None => FirestoreValue::DoubleValue(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FirestoreValue::StringValue(s.clone()),
            Value::Array(items) => FirestoreValue::ArrayValue(ArrayValue {
                values: items.iter().map(Self::from_json).collect(),
            }),
            Value::Object(map) => FirestoreValue::MapValue(MapValue {
                fields: encode_fields(map),
            }),
        }
    }

    /// Timestamps, bytes and references become strings; geo points become
    /// `{latitude, longitude}` mappings
    pub fn into_json(self) -> Result<Value, ServiceError> {
        Ok(match self {
            FirestoreValue::NullValue(()) => Value::Null,
            FirestoreValue::BooleanValue(b) => Value::Bool(b),
            FirestoreValue::IntegerValue(s) => {
                let i: i64 = s
                    .parse()
                    .map_err(|_| ServiceError::InvalidResponse(format!("bad integerValue '{}'", s)))?;
                Value::Number(i.into())
            }
            FirestoreValue::DoubleValue(d) => Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
            FirestoreValue::TimestampValue(s)
            | FirestoreValue::StringValue(s)
            | FirestoreValue::BytesValue(s)
            | FirestoreValue::ReferenceValue(s) => Value::String(s),
            FirestoreValue::GeoPointValue(point) => serde_json::json!({
                "latitude": point.latitude,
                "longitude": point.longitude,
            }),
            FirestoreValue::ArrayValue(array) => Value::Array(
                array
                    .values
                    .into_iter()
                    .map(Self::into_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            FirestoreValue::MapValue(map) => Value::Object(decode_fields(map.fields)?),
        })
    }
}

pub fn encode_fields(record: &Record) -> Fields {
    record
        .iter()
        .map(|(name, value)| (name.clone(), FirestoreValue::from_json(value)))
        .collect()
}

pub fn decode_fields(fields: Fields) -> Result<Record, ServiceError> {
    fields
        .into_iter()
        .map(|(name, value)| value.into_json().map(|v| (name, v)))
        .collect()
}
