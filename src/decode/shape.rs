//! Field Shapes
//!
//! Helpers for fields that may legally take more than one shape:
//!
//! - **Primitive-or-object**: a bare string (or bool) is mapped onto the
//!   type's primary field, an object is decoded field-by-field on top of
//!   the type's defaults ([`Shorthand`]).
//! - **Path-aware object access**: [`Fields`] pulls typed values out of a
//!   JSON object while tracking the dotted/bracketed path used in errors.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// A type whose canonical form is an object but which also accepts a
/// primitive shorthand in place of that object.
///
/// The object form is decoded with the type's derived `Deserialize`, which
/// must be `#[serde(default)]` so omitted fields keep their defaults.
pub trait Shorthand: DeserializeOwned {
    /// Field name used in error messages.
    const FIELD: &'static str;

    /// Accepted shape set, as shown to users.
    const ACCEPTED: &'static str = "string or object";

    /// Builds the value from its primitive shorthand.
    ///
    /// Returns `None` when the primitive kind is not an accepted shorthand.
    fn from_primitive(value: &Value) -> Option<Self>;
}

/// Decodes a primitive-or-object value into `T`.
pub fn decode_shorthand<T: Shorthand>(value: Value) -> Result<T, String> {
    match value {
        Value::Object(_) => {
            serde_json::from_value(value).map_err(|e| format!("{}: {}", T::FIELD, e))
        }
        other => T::from_primitive(&other)
            .ok_or_else(|| format!("{} must be {}", T::FIELD, T::ACCEPTED)),
    }
}

/// `deserialize_with` adapter for required primitive-or-object fields.
pub fn shorthand<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Shorthand,
{
    let value = Value::deserialize(deserializer)?;
    decode_shorthand(value).map_err(de::Error::custom)
}

/// `deserialize_with` adapter for optional primitive-or-object fields.
///
/// `null` decodes as `None`; pair with `#[serde(default)]`.
pub fn shorthand_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Shorthand,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    decode_shorthand(value).map(Some).map_err(de::Error::custom)
}

/// Human-readable name of a JSON value's shape.
pub fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Joins a parent path and a child key.
pub fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Path-aware accessor over one JSON object.
///
/// Each accessor removes the key it reads, so a decode function touches
/// every field at most once.
#[derive(Debug)]
pub struct Fields {
    path: String,
    map: Map<String, Value>,
}

impl Fields {
    /// Wraps an object value; any other shape is rejected.
    pub fn new(value: Value, path: impl Into<String>) -> Result<Self, DecodeError> {
        let path = path.into();
        match value {
            Value::Object(map) => Ok(Self { path, map }),
            _ => Err(DecodeError::UnsupportedShape {
                path,
                accepted: "object".to_string(),
            }),
        }
    }

    /// Path of the object itself.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of a child key.
    pub fn path_of(&self, key: &str) -> String {
        join(&self.path, key)
    }

    /// Removes and returns the raw value under `key`; `null` counts as absent.
    pub fn take_raw(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key).filter(|v| !v.is_null())
    }

    /// Puts a raw value back, e.g. after resolving a file reference.
    pub fn put_raw(&mut self, key: &str, value: Value) {
        self.map.insert(key.to_string(), value);
    }

    /// Returns true if `key` is present and not `null`.
    pub fn contains(&self, key: &str) -> bool {
        self.map.get(key).map_or(false, |v| !v.is_null())
    }

    /// Decodes an optional field.
    pub fn opt<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, DecodeError> {
        match self.take_raw(key) {
            None => Ok(None),
            Some(value) => decode_value(value, self.path_of(key)).map(Some),
        }
    }

    /// Decodes a field, falling back to `T::default()` when absent.
    pub fn or_default<T: DeserializeOwned + Default>(
        &mut self,
        key: &str,
    ) -> Result<T, DecodeError> {
        Ok(self.opt(key)?.unwrap_or_default())
    }

    /// Decodes a field, falling back to `default` when absent.
    pub fn or<T: DeserializeOwned>(&mut self, key: &str, default: T) -> Result<T, DecodeError> {
        Ok(self.opt(key)?.unwrap_or(default))
    }

    /// Decodes an optional primitive-or-object field.
    pub fn shorthand<T: Shorthand>(&mut self, key: &str) -> Result<Option<T>, DecodeError> {
        match self.take_raw(key) {
            None => Ok(None),
            Some(value) => decode_shorthand_at(value, self.path_of(key)).map(Some),
        }
    }

    /// Decodes an array field element by element with the derived decoder.
    pub fn list<T: DeserializeOwned>(&mut self, key: &str) -> Result<Vec<T>, DecodeError> {
        self.list_with(key, decode_value)
    }

    /// Decodes an array field element by element with a custom decoder.
    ///
    /// Each element is decoded with its own `key[i]` path.
    pub fn list_with<T, F>(&mut self, key: &str, mut decode: F) -> Result<Vec<T>, DecodeError>
    where
        F: FnMut(Value, String) -> Result<T, DecodeError>,
    {
        let path = self.path_of(key);
        match self.take_raw(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| decode(item, format!("{}[{}]", path, i)))
                .collect(),
            Some(_) => Err(DecodeError::UnsupportedShape {
                path,
                accepted: "array".to_string(),
            }),
        }
    }

    /// Decodes a required-by-structure object field with a custom decoder.
    pub fn object_with<T, F>(&mut self, key: &str, decode: F) -> Result<Option<T>, DecodeError>
    where
        F: FnOnce(Value, String) -> Result<T, DecodeError>,
    {
        match self.take_raw(key) {
            None => Ok(None),
            Some(value) => decode(value, self.path_of(key)).map(Some),
        }
    }
}

/// Decodes a value with its derived decoder, qualifying errors with `path`.
pub fn decode_value<T: DeserializeOwned>(value: Value, path: String) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|e| DecodeError::TypeMismatch {
        path,
        detail: e.to_string(),
    })
}

/// Decodes a primitive-or-object value, qualifying errors with `path`.
pub fn decode_shorthand_at<T: Shorthand>(value: Value, path: String) -> Result<T, DecodeError> {
    match value {
        Value::Object(_) => decode_value(value, path),
        other => T::from_primitive(&other).ok_or(DecodeError::UnsupportedShape {
            path,
            accepted: T::ACCEPTED.to_string(),
        }),
    }
}

/// Decodes a `bool`-or-object `end` marker.
///
/// `true` yields the default value, `false` leaves the marker unset.
pub fn bool_or_object<T>(value: Value, path: String) -> Result<Option<T>, DecodeError>
where
    T: DeserializeOwned + Default,
{
    match value {
        Value::Bool(true) => Ok(Some(T::default())),
        Value::Bool(false) | Value::Null => Ok(None),
        Value::Object(_) => decode_value(value, path).map(Some),
        _ => Err(DecodeError::UnsupportedShape {
            path,
            accepted: "boolean or object".to_string(),
        }),
    }
}

/// `deserialize_with` adapter for `bool`-or-object fields.
pub fn bool_or_object_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Bool(true) => Ok(Some(T::default())),
        Value::Bool(false) | Value::Null => Ok(None),
        Value::Object(_) => serde_json::from_value(value).map(Some).map_err(de::Error::custom),
        other => Err(de::Error::custom(format!(
            "end must be boolean or object, found {}",
            shape_name(&other)
        ))),
    }
}
