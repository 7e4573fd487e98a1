//! Registration gateway.
//!
//! Two call shapes are accepted: [`Registration`] (name, app, activity and
//! optional props) and [`RegistrationConfig`], the keyed form used by
//! declarative configuration. Both are validated and normalised into a
//! [`Unit`] in `NotLoaded`.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::activity::ActiveWhen;
use crate::domain::{static_loader, CustomProps, Loader, Module, ModuleExports, Unit};
use crate::error::RegistrationError;

const VALID_CONFIG_KEYS: [&str; 4] = ["name", "app", "active_when", "custom_props"];

/// What a registration supplies as the application.
#[derive(Clone)]
pub enum AppSource {
    /// A function producing the module asynchronously.
    Loader(Loader),
    /// An already available module; wrapped into a loader that resolves
    /// immediately.
    Module(Module),
}

impl AppSource {
    fn is_missing(&self) -> bool {
        matches!(self, AppSource::Module(Module::Opaque(Value::Null)))
    }

    fn into_loader(self) -> Loader {
        match self {
            AppSource::Loader(loader) => loader,
            AppSource::Module(module) => static_loader(module),
        }
    }
}

impl From<Loader> for AppSource {
    fn from(loader: Loader) -> Self {
        AppSource::Loader(loader)
    }
}

impl From<Module> for AppSource {
    fn from(module: Module) -> Self {
        AppSource::Module(module)
    }
}

impl From<ModuleExports> for AppSource {
    fn from(exports: ModuleExports) -> Self {
        AppSource::Module(Module::Exports(exports))
    }
}

impl fmt::Debug for AppSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppSource::Loader(_) => f.write_str("AppSource::Loader(..)"),
            AppSource::Module(module) => f.debug_tuple("AppSource::Module").field(module).finish(),
        }
    }
}

/// Positional registration: name, app, activity, optional props.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub app: AppSource,
    pub active_when: ActiveWhen,
    pub custom_props: Option<CustomProps>,
}

impl Registration {
    pub fn new(
        name: impl Into<String>,
        app: impl Into<AppSource>,
        active_when: impl Into<ActiveWhen>,
    ) -> Self {
        Self {
            name: name.into(),
            app: app.into(),
            active_when: active_when.into(),
            custom_props: None,
        }
    }

    #[must_use]
    pub fn custom_props(mut self, props: impl Into<CustomProps>) -> Self {
        self.custom_props = Some(props.into());
        self
    }

    /// Validate and build the unit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty name, a missing app, an
    /// activity that fails to compile, or static props that are not an
    /// object.
    pub(crate) fn into_unit(self) -> Result<Unit, RegistrationError> {
        if self.name.is_empty() {
            return Err(RegistrationError::invalid(
                "the application name must be a non-empty string",
            ));
        }
        if self.app.is_missing() {
            return Err(RegistrationError::invalid(
                "the app must be an application or a loading function",
            ));
        }
        let custom_props = self.custom_props.unwrap_or_default();
        if !custom_props.is_valid() {
            return Err(RegistrationError::invalid("customProps must be an object"));
        }
        let activity = self.active_when.compile()?;
        Ok(Unit::new(
            self.name,
            self.app.into_loader(),
            activity,
            custom_props,
        ))
    }
}

/// Keyed registration, as found in configuration files.
///
/// Every field is optional here so that missing keys are reported as
/// validation errors rather than parse errors.
#[derive(Debug, Clone, Default)]
pub struct RegistrationConfig {
    pub name: Option<String>,
    pub app: Option<AppSource>,
    pub active_when: Option<ActiveWhen>,
    pub custom_props: Option<CustomProps>,
}

impl RegistrationConfig {
    /// Read a registration from a TOML table, resolving `app` through the
    /// catalog.
    ///
    /// # Errors
    ///
    /// Returns `UnknownConfigKey` when the table has keys other than
    /// `name`, `app`, `active_when` and `custom_props`, and
    /// `InvalidArgument` when a value has the wrong type or names a loader
    /// the catalog does not know.
    pub fn from_table(
        table: &toml::Table,
        catalog: &LoaderCatalog,
    ) -> Result<Self, RegistrationError> {
        let invalid: Vec<String> = table
            .keys()
            .filter(|key| !VALID_CONFIG_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();
        if !invalid.is_empty() {
            return Err(RegistrationError::UnknownConfigKey {
                valid: VALID_CONFIG_KEYS.join(", "),
                invalid,
            });
        }

        let name = match table.get("name") {
            None => None,
            Some(toml::Value::String(name)) => Some(name.clone()),
            Some(_) => {
                return Err(RegistrationError::invalid(
                    "config.name must be a non-empty string",
                ))
            }
        };

        let app = match table.get("app") {
            None => None,
            Some(toml::Value::String(key)) => {
                let loader = catalog.get(key).ok_or_else(|| {
                    RegistrationError::invalid(format!("no loader named '{key}' in the catalog"))
                })?;
                Some(AppSource::Loader(loader))
            }
            Some(_) => {
                return Err(RegistrationError::invalid(
                    "config.app must name a loader in the catalog",
                ))
            }
        };

        let active_when = table.get("active_when").map(parse_active_when).transpose()?;

        let custom_props = match table.get("custom_props") {
            None => None,
            Some(value @ toml::Value::Table(_)) => {
                let json = serde_json::to_value(value).map_err(|err| {
                    RegistrationError::invalid(format!("config.custom_props: {err}"))
                })?;
                Some(CustomProps::fixed(json))
            }
            Some(_) => {
                return Err(RegistrationError::invalid(
                    "config.custom_props must be an object",
                ))
            }
        };

        Ok(Self {
            name,
            app,
            active_when,
            custom_props,
        })
    }

    /// Check that the required keys are present.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` naming the first missing key.
    pub fn into_registration(self) -> Result<Registration, RegistrationError> {
        let name = self
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| RegistrationError::invalid("config.name must be a non-empty string"))?;
        let app = self.app.ok_or_else(|| {
            RegistrationError::invalid("config.app must be an application or a loading function")
        })?;
        let active_when = self.active_when.ok_or_else(|| {
            RegistrationError::invalid(
                "config.active_when must be a string, function or an array with both",
            )
        })?;
        Ok(Registration {
            name,
            app,
            active_when,
            custom_props: self.custom_props,
        })
    }
}

fn parse_active_when(value: &toml::Value) -> Result<ActiveWhen, RegistrationError> {
    let invalid = || {
        RegistrationError::invalid("config.active_when must be a string or an array of strings")
    };
    match value {
        toml::Value::String(path) => Ok(ActiveWhen::path(path.as_str())),
        toml::Value::Array(entries) => entries
            .iter()
            .map(|entry| entry.as_str().map(ActiveWhen::path).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()
            .map(ActiveWhen::Any),
        _ => Err(invalid()),
    }
}

/// Named loaders that declarative registrations refer to by key.
#[derive(Default, Clone)]
pub struct LoaderCatalog {
    loaders: HashMap<String, Loader>,
}

impl LoaderCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, loader: Loader) -> Option<Loader> {
        self.loaders.insert(key.into(), loader)
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, loader: Loader) -> Self {
        self.insert(key, loader);
        self
    }

    pub fn get(&self, key: &str) -> Option<Loader> {
        self.loaders.get(key).cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.loaders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl fmt::Debug for LoaderCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("LoaderCatalog").field("keys", &keys).finish()
    }
}
