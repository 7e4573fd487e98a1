//! Insertion-ordered registry of application units.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::{Status, Unit};
use crate::error::RegistrationError;

/// The authoritative collection of registered units.
///
/// Listing order is registration order. Status lives on each [`Unit`], so
/// reads never block a transition in flight.
#[derive(Default)]
pub struct UnitRegistry {
    units: RwLock<Vec<Arc<Unit>>>,
}

impl UnitRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRegistration` if a unit with the same name exists;
    /// the registry is left unchanged.
    pub fn insert(&self, unit: Unit) -> Result<Arc<Unit>, RegistrationError> {
        let mut units = self.units.write();
        if units.iter().any(|existing| existing.name() == unit.name()) {
            return Err(RegistrationError::DuplicateRegistration {
                name: unit.name().to_string(),
            });
        }
        let unit = Arc::new(unit);
        units.push(Arc::clone(&unit));
        Ok(unit)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Unit>> {
        let mut units = self.units.write();
        let index = units.iter().position(|unit| unit.name() == name)?;
        Some(units.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Unit>> {
        self.units
            .read()
            .iter()
            .find(|unit| unit.name() == name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.read().iter().any(|unit| unit.name() == name)
    }

    /// All units, in registration order.
    pub fn list(&self) -> Vec<Arc<Unit>> {
        self.units.read().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.units
            .read()
            .iter()
            .map(|unit| unit.name().to_string())
            .collect()
    }

    /// Names of units currently in `Mounted`.
    pub fn mounted_names(&self) -> Vec<String> {
        self.units
            .read()
            .iter()
            .filter(|unit| unit.status() == Status::Mounted)
            .map(|unit| unit.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.read().is_empty()
    }
}
