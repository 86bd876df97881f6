//! A set of axes built from one `station.toml`.

use crate::controller::{AxisController, ControllerOptions};
use crate::error::ControllerError;
use crate::state::AxisSnapshot;
use crate::status::{AxisEvent, StatusBus};
use crossbeam_channel::Receiver;
use stagectl_common::hal::config::StationConfig;
use stagectl_hal::discovery::PortResolver;
use stagectl_hal::driver_registry::DriverRegistry;
use std::sync::Arc;
use tracing::{info, warn};

/// All axes of a microscope, sharing one event bus.
pub struct Station {
    axes: Vec<AxisController>,
    bus: StatusBus,
}

impl Station {
    /// Build one controller per configured axis, in configuration order.
    ///
    /// # Errors
    /// `DriverNotFound` for an unregistered driver name, `Configuration`
    /// for invalid axis settings.
    pub fn from_config(
        config: &StationConfig,
        registry: &DriverRegistry,
        resolver: Arc<dyn PortResolver>,
    ) -> Result<Self, ControllerError> {
        let bus = StatusBus::new();
        let options = ControllerOptions {
            poll_interval: config.poll_interval(),
            resolver,
            bus: bus.clone(),
        };

        let axes = config
            .axes
            .iter()
            .map(|axis| {
                let driver = registry.create_driver(axis)?;
                AxisController::new(axis.clone(), driver, options.clone())
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Station {} with {} axes",
            config.shared.service_name,
            axes.len()
        );
        Ok(Self { axes, bus })
    }

    pub fn axis(&self, name: &str) -> Option<&AxisController> {
        self.axes.iter().find(|a| a.name() == name)
    }

    pub fn axis_mut(&mut self, name: &str) -> Option<&mut AxisController> {
        self.axes.iter_mut().find(|a| a.name() == name)
    }

    pub fn axes(&self) -> &[AxisController] {
        &self.axes
    }

    pub fn axes_mut(&mut self) -> &mut [AxisController] {
        &mut self.axes
    }

    /// Connect every axis. One failing axis does not stop the others.
    ///
    /// Returns the failures, empty when all axes connected.
    pub fn connect_all(&mut self) -> Vec<ControllerError> {
        let mut failures = Vec::new();
        for axis in &mut self.axes {
            if let Err(e) = axis.connect() {
                warn!("Axis {} not connected: {}", axis.name(), e);
                failures.push(e);
            }
        }
        failures
    }

    pub fn disconnect_all(&mut self) {
        for axis in &mut self.axes {
            axis.disconnect();
        }
    }

    pub fn snapshot(&self) -> Vec<AxisSnapshot> {
        self.axes.iter().map(AxisController::snapshot).collect()
    }

    /// Receiver for the events of every axis.
    pub fn subscribe(&self) -> Receiver<AxisEvent> {
        self.bus.subscribe()
    }
}
