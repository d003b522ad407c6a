use std::fmt::Debug;

use serde_json::Value;

use crate::{
    entity::REDACTED,
    path::{self, KeyPath},
};

/// An untyped document fragment, kept verbatim.
///
/// Paths registered with [`RawDocument::with_secret_path`] are redacted unless
/// secrets are explicitly revealed when serializing.
#[derive(Clone, PartialEq, Eq)]
pub struct RawDocument {
    value: Value,
    secret_paths: Vec<KeyPath>,
}

impl RawDocument {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            secret_paths: Vec::new(),
        }
    }

    pub fn with_secret_path(mut self, path: KeyPath) -> Self {
        self.add_secret_path(path);
        self
    }

    pub fn add_secret_path(&mut self, path: KeyPath) {
        if !self.secret_paths.contains(&path) {
            self.secret_paths.push(path);
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub(crate) fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn secret_paths(&self) -> &[KeyPath] {
        &self.secret_paths
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// A copy of the document with every present secret replaced by [`REDACTED`].
    pub fn redacted(&self) -> Value {
        let mut value = self.value.clone();
        for secret_path in &self.secret_paths {
            if !path::get_path(&value, secret_path, &Value::Null).is_null() {
                path::set_path(&mut value, secret_path, Value::String(REDACTED.to_owned()));
            }
        }
        value
    }
}

impl Debug for RawDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RawDocument").field(&self.redacted()).finish()
    }
}

impl From<Value> for RawDocument {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
