//! Named simulation parameters.
//!
//! Parameters are read from a JSON object whose keys are the parameter names
//! used throughout the crate (`"nx"`, `"E"`, `"staticCoefficient"`, ...).
//! Typed views such as [`LatticeInfo`](crate::LatticeInfo) and
//! [`FrictionInfo`](crate::FrictionInfo) pull the values they need and report
//! [`ConfigError::Missing`] for anything absent.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::ConfigError;

/// A set of named, loosely typed parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parameters {
    /// Raw values keyed by parameter name.
    values: BTreeMap<String, Value>,
}

impl Parameters {
    /// Create an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read parameters from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unreadable`] when the file cannot be opened and
    /// [`ConfigError::Malformed`] or [`ConfigError::NotAnObject`] when its
    /// contents are not a JSON object.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Read parameters from {}", path.display());
        Self::from_json_str(&text)
    }

    /// Parse parameters from a JSON document.
    ///
    /// # Examples
    /// ```
    /// use stickslip::Parameters;
    ///
    /// let parameters = Parameters::from_json_str(r#"{"nx": 57, "d": 0.005}"#)
    ///     .expect("valid document");
    /// assert_eq!(parameters.get::<usize>("nx").expect("nx is set"), 57);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Malformed`] when `text` is not valid JSON and
    /// [`ConfigError::NotAnObject`] when the root is not an object.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Ok(Self {
                values: map.into_iter().collect(),
            }),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    /// Set (or replace) a parameter, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Serialize) -> Self {
        self.set(name, value);
        self
    }

    /// Set (or replace) a parameter.
    pub fn set(&mut self, name: &str, value: impl Serialize) {
        // Serializing plain numbers, strings and booleans cannot fail.
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.values.insert(name.to_owned(), value);
    }

    /// Whether `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Fetch a required parameter.
    ///
    /// Integers written as floating point (`1e6`) are accepted for integer
    /// targets as long as they carry no fractional part.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `name` is absent and
    /// [`ConfigError::WrongType`] when the stored value does not convert to `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ConfigError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| ConfigError::Missing(name.to_owned()))?;
        match serde_json::from_value::<T>(value.clone()) {
            Ok(parsed) => Ok(parsed),
            Err(source) => match integral_float(value) {
                Some(integral) => serde_json::from_value::<T>(integral)
                    .map_err(|source| ConfigError::WrongType {
                        name: name.to_owned(),
                        source,
                    }),
                None => Err(ConfigError::WrongType {
                    name: name.to_owned(),
                    source,
                }),
            },
        }
    }

    /// Fetch an optional parameter, falling back to `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] when the parameter is present but
    /// does not convert to `T`.
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T, ConfigError> {
        if self.contains(name) {
            self.get(name)
        } else {
            Ok(default)
        }
    }
}

/// Reinterpret `1e6`-style floats as integers.
fn integral_float(value: &Value) -> Option<Value> {
    let float = value.as_f64()?;
    if float.fract() == 0.0 && float.abs() < 9.0e15 {
        // Checked above: the value is integral and well inside i64 range.
        Some(Value::from(float as i64))
    } else {
        None
    }
}

/// Reject parameters that must be strictly positive.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            value,
            reason: "must be positive",
        })
    }
}
