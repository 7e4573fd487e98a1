//! Activity predicates: deciding whether an application should be active.
//!
//! Registrations accept a predicate, a path pattern, or a list of either.
//! Lists are composed by disjunction: the application is active when any
//! entry matches.

use std::fmt;
use std::sync::Arc;

use crate::domain::Location;
use crate::error::RegistrationError;
use crate::path::path_to_active_when;

/// Compiled activity predicate.
pub type ActivityFn = Arc<dyn Fn(&Location) -> bool + Send + Sync>;

/// Activity input as supplied at registration.
#[derive(Clone)]
pub enum ActiveWhen {
    /// Arbitrary predicate over the location.
    Predicate(ActivityFn),
    /// Path pattern, compiled with [`path_to_active_when`].
    Path(String),
    /// Active when any entry is active. Entries may not be nested lists.
    Any(Vec<ActiveWhen>),
}

impl ActiveWhen {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Location) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub fn path(pattern: impl Into<String>) -> Self {
        Self::Path(pattern.into())
    }

    /// Compile into a single predicate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for nested lists or patterns that fail to
    /// compile.
    pub fn compile(&self) -> Result<ActivityFn, RegistrationError> {
        let entries: Vec<&ActiveWhen> = match self {
            ActiveWhen::Any(list) => list.iter().collect(),
            single => vec![single],
        };

        let predicates = entries
            .into_iter()
            .map(|entry| match entry {
                ActiveWhen::Predicate(f) => Ok(Arc::clone(f)),
                ActiveWhen::Path(pattern) => {
                    path_to_active_when(pattern, false).map_err(|err| {
                        RegistrationError::invalid(format!(
                            "activeWhen path '{pattern}' could not be compiled: {err}"
                        ))
                    })
                }
                ActiveWhen::Any(_) => Err(RegistrationError::invalid(
                    "activeWhen must be a string, function or an array with both",
                )),
            })
            .collect::<Result<Vec<ActivityFn>, _>>()?;

        if let [only] = predicates.as_slice() {
            return Ok(Arc::clone(only));
        }
        Ok(Arc::new(move |location: &Location| {
            predicates.iter().any(|predicate| predicate(location))
        }))
    }
}

impl fmt::Debug for ActiveWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveWhen::Predicate(_) => f.write_str("Predicate(..)"),
            ActiveWhen::Path(pattern) => f.debug_tuple("Path").field(pattern).finish(),
            ActiveWhen::Any(list) => f.debug_tuple("Any").field(list).finish(),
        }
    }
}

impl From<&str> for ActiveWhen {
    fn from(pattern: &str) -> Self {
        Self::Path(pattern.to_string())
    }
}

impl From<String> for ActiveWhen {
    fn from(pattern: String) -> Self {
        Self::Path(pattern)
    }
}

impl From<ActivityFn> for ActiveWhen {
    fn from(predicate: ActivityFn) -> Self {
        Self::Predicate(predicate)
    }
}

impl<T: Into<ActiveWhen>> From<Vec<T>> for ActiveWhen {
    fn from(list: Vec<T>) -> Self {
        Self::Any(list.into_iter().map(Into::into).collect())
    }
}
