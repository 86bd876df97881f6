//! Serial port discovery.
//!
//! Stage controllers enumerate as USB CDC devices. The configured USB serial
//! number identifies a controller independently of the port name the OS
//! happens to assign.

use serialport::SerialPortType;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Port enumeration errors.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The OS refused to list ports.
    #[error("Failed to enumerate serial ports: {0}")]
    Enumeration(String),
}

/// One serial port as seen by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    /// OS port name (`/dev/ttyACM0`, `COM3`).
    pub port_name: String,
    /// USB serial number, USB ports only.
    pub serial_number: Option<String>,
    /// USB manufacturer string.
    pub manufacturer: Option<String>,
    /// USB product string.
    pub product: Option<String>,
}

impl PortEntry {
    /// Human readable one-liner.
    pub fn display(&self) -> String {
        let parts: Vec<&str> = [self.manufacturer.as_deref(), self.product.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        let mut line = self.port_name.clone();
        if !parts.is_empty() {
            line.push_str(": ");
            line.push_str(&parts.join(" "));
        }
        if let Some(serial) = &self.serial_number {
            line.push_str(&format!(" [{serial}]"));
        }
        line
    }
}

/// List serial ports, sorted by port name.
///
/// # Errors
/// `DiscoveryError::Enumeration` when the OS query fails.
pub fn list_ports() -> Result<Vec<PortEntry>, DiscoveryError> {
    let ports =
        serialport::available_ports().map_err(|e| DiscoveryError::Enumeration(e.to_string()))?;

    let mut entries: Vec<PortEntry> = ports
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(info) => PortEntry {
                port_name: p.port_name,
                serial_number: info.serial_number,
                manufacturer: info.manufacturer,
                product: info.product,
            },
            _ => PortEntry {
                port_name: p.port_name,
                serial_number: None,
                manufacturer: None,
                product: None,
            },
        })
        .collect();

    entries.sort_by(|a, b| a.port_name.cmp(&b.port_name));
    debug!("Found {} serial ports", entries.len());
    Ok(entries)
}

/// First entry whose USB serial number equals `serial_number`.
pub fn match_serial<'a>(entries: &'a [PortEntry], serial_number: &str) -> Option<&'a PortEntry> {
    let wanted = serial_number.trim();
    entries
        .iter()
        .find(|e| e.serial_number.as_deref().map(str::trim) == Some(wanted))
}

/// Port name of the device with `serial_number`, if attached.
pub fn find_port_by_serial(serial_number: &str) -> Result<Option<String>, DiscoveryError> {
    let entries = list_ports()?;
    Ok(match_serial(&entries, serial_number).map(|e| e.port_name.clone()))
}

/// Maps a USB serial number to a port name.
///
/// Controllers resolve through this trait so tests and fixed installations
/// can bypass USB enumeration.
pub trait PortResolver: Send + Sync {
    /// Port of the device with `serial_number`, None when not attached.
    fn resolve(&self, serial_number: &str) -> Option<String>;
}

/// Resolver backed by OS enumeration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortResolver;

impl PortResolver for SerialPortResolver {
    fn resolve(&self, serial_number: &str) -> Option<String> {
        match find_port_by_serial(serial_number) {
            Ok(port) => port,
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }
}

/// Resolver with a fixed serial → port table.
#[derive(Debug, Clone, Default)]
pub struct FixedPortResolver {
    ports: HashMap<String, String>,
}

impl FixedPortResolver {
    /// Resolver with no mappings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping (builder style).
    pub fn with(mut self, serial_number: impl Into<String>, port: impl Into<String>) -> Self {
        self.ports.insert(serial_number.into(), port.into());
        self
    }
}

impl PortResolver for FixedPortResolver {
    fn resolve(&self, serial_number: &str) -> Option<String> {
        self.ports.get(serial_number).cloned()
    }
}
