//! Core domain types: statuses, locations, props, modules, and units.

mod loader;
mod location;
mod module;
mod props;
mod status;
mod timeouts;
mod unit;

pub use loader::{loader, static_loader, AppLoader, LoadReturn, Loader};
pub use location::Location;
pub use module::{hook, Export, Hook, Lifecycle, LifecycleHook, Lifecycles, Module, ModuleExports};
pub use props::{CustomProps, Props, PropsFn};
pub use status::Status;
pub use timeouts::{AppTimeouts, Phase, TimeoutConfig, TimeoutOverrides};
pub use unit::{Unit, UnitSnapshot};

pub(crate) use unit::LoadHandle;
