//! Properties passed to loaders and lifecycle hooks.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::location::Location;

/// Function computing custom props per call from the app name and location.
pub type PropsFn = Arc<dyn Fn(&str, &Location) -> Map<String, Value> + Send + Sync>;

/// User-supplied custom props for an application.
#[derive(Clone)]
pub enum CustomProps {
    /// A fixed bag of values. Must be a JSON object (or null for "none").
    Static(Value),
    /// Props computed on every lifecycle call.
    Computed(PropsFn),
}

impl CustomProps {
    /// Static props from a JSON value.
    pub fn fixed(value: Value) -> Self {
        Self::Static(value)
    }

    /// Props computed from the app name and the current location.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&str, &Location) -> Map<String, Value> + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Whether this value is an acceptable props bag.
    ///
    /// Static props must be an object or null; computed props always are.
    pub(crate) fn is_valid(&self) -> bool {
        match self {
            Self::Static(Value::Object(_) | Value::Null) => true,
            Self::Static(_) => false,
            Self::Computed(_) => true,
        }
    }

    /// Resolve the props bag for one call.
    pub(crate) fn resolve(&self, name: &str, location: &Location) -> Map<String, Value> {
        match self {
            Self::Static(Value::Object(map)) => map.clone(),
            Self::Static(_) => Map::new(),
            Self::Computed(f) => f(name, location),
        }
    }
}

impl Default for CustomProps {
    fn default() -> Self {
        Self::Static(Value::Object(Map::new()))
    }
}

impl fmt::Debug for CustomProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<Value> for CustomProps {
    fn from(value: Value) -> Self {
        Self::Static(value)
    }
}

/// Properties handed to a loader or lifecycle hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Props {
    /// Name of the application the call is made for.
    pub name: String,
    /// Resolved custom props.
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl Props {
    pub fn new(name: impl Into<String>, custom: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            custom,
        }
    }

    /// Look up a custom prop.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.custom.get(key)
    }
}
