//! Driver registry for stage drivers.
//!
//! Maps the `driver` field of an axis configuration to a factory. The
//! registry is built at startup and passed to whoever creates controllers.

use stagectl_common::hal::config::AxisConfig;
use stagectl_common::hal::driver::{DriverFactory, StageDriver};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Registry lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No factory registered under this name.
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
}

/// Registry of available stage drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Whether a driver is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Create a driver instance for one axis, using `config.driver` as the name.
    ///
    /// # Errors
    /// Returns `RegistryError::DriverNotFound` for an unknown name.
    pub fn create_driver(&self, config: &AxisConfig) -> Result<Box<dyn StageDriver>, RegistryError> {
        let factory = self
            .factories
            .get(config.driver.as_str())
            .ok_or_else(|| RegistryError::DriverNotFound(config.driver.clone()))?;
        debug!("Creating '{}' driver for axis {}", config.driver, config.name);
        Ok(factory(config))
    }

    /// List all registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
