//! Host boundary.
//!
//! A [`DescriptorReader`] hands out a device's report descriptor on demand; a
//! [`Device`] additionally delivers raw reports and accepts output reports.
//! Backends implement both.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::DescriptorSource;
use crate::metadata::DeviceDescription;

/// Why an output report did not reach the device.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("device does not accept output reports")]
    Unsupported,
    #[error("output report rejected: {0}")]
    Rejected(String),
}

/// State of the status LED next to the cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedStatus {
    Off = 0,
    On = 1,
}

/// Output report switching the LED: `[report_id, status]`.
pub fn led_report(report_id: u8, status: LedStatus) -> [u8; 2] {
    [report_id, status as u8]
}

/// A report descriptor as obtained from the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawDescriptor {
    /// Raw report descriptor bytes.
    Binary(Vec<u8>),
    /// Pre-parsed descriptor JSON.
    Json(String),
}

impl RawDescriptor {
    pub fn source(&self) -> DescriptorSource<'_> {
        match self {
            RawDescriptor::Binary(bytes) => DescriptorSource::Binary(bytes),
            RawDescriptor::Json(text) => DescriptorSource::Json(text),
        }
    }
}

/// Reads a device's full descriptor. Used by the deep matching pass when the
/// description carries no elements.
pub trait DescriptorReader {
    /// `None` if the host cannot supply a descriptor.
    fn read_raw_descriptor(&self) -> Option<RawDescriptor>;
}

/// A device that delivers input reports.
pub trait Device: DescriptorReader {
    fn description(&self) -> &DeviceDescription;
    /// Stable id, unique among connected devices.
    fn id(&self) -> &str;
    /// Reports received since the last poll, each `[report_id, body..]`.
    fn poll(&mut self) -> Vec<Vec<u8>>;

    /// Send one output report, `[report_id, body..]`.
    fn write_report(&mut self, _data: &[u8]) -> Result<(), OutputError> {
        Err(OutputError::Unsupported)
    }

    fn set_led(&mut self, report_id: u8, status: LedStatus) -> Result<(), OutputError> {
        self.write_report(&led_report(report_id, status))
    }
}
