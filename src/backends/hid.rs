//! hidapi backend.
//!
//! [`HidSpaceMouse`] wraps a `hidapi::HidDevice` and is responsible for:
//! - describing the device for matching ([`describe`])
//! - reading the binary report descriptor once at open time
//! - draining a bounded number of raw reports per poll, non-blocking
//! - writing output reports (the status LED)
//!
//! This module does **not** decode anything; reports are handed out as
//! `[report_id, body..]` for a [`StateMergeEngine`](crate::state::StateMergeEngine).

use std::fs;
use std::path::Path;

use hidapi::{DeviceInfo, HidApi, HidDevice, HidError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::descriptor::UsagePage;
use crate::device::{DescriptorReader, Device, OutputError, RawDescriptor};
use crate::matcher::{self, DeviceMatcher};
use crate::metadata::{DeviceDescription, HID_INTERFACE};
use crate::usage;

/// Maximum number of reports drained per [`Device::poll`] call.
///
/// Keeps one chatty device from starving the rest of the host loop.
const MAX_REPORTS_PER_TICK: usize = 32;

/// HID 1.11 caps report descriptors at 4 KiB in practice.
const MAX_REPORT_DESCRIPTOR_SIZE: usize = 4096;

/// Large enough for every full-speed input report.
const READ_BUFFER_SIZE: usize = 64;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("hidapi: {0}")]
    Hid(#[from] HidError),
}

/// Description of a hidapi device entry.
pub fn describe(info: &DeviceInfo) -> DeviceDescription {
    DeviceDescription {
        interface_name: HID_INTERFACE.to_string(),
        manufacturer: info.manufacturer_string().map(str::to_string),
        product: info.product_string().map(str::to_string),
        vendor_id: Some(info.vendor_id()),
        product_id: Some(info.product_id()),
        serial_number: info.serial_number().map(str::to_string),
        path: Some(info.path().to_string_lossy().into_owned()),
        capabilities: None,
    }
}

/// Skip the auxiliary interfaces some receivers expose next to the
/// multi-axis collection. Usage page 0 means the platform did not say.
fn is_multi_axis_endpoint(info: &DeviceInfo) -> bool {
    let page = UsagePage(info.usage_page());
    page == UsagePage::UNDEFINED
        || (page == UsagePage::GENERIC_DESKTOP && info.usage() == usage::MULTI_AXIS_CONTROLLER)
}

/// A SpaceMouse opened through hidapi.
pub struct HidSpaceMouse {
    id: String,
    description: DeviceDescription,
    raw: HidDevice,
    descriptor: Option<Vec<u8>>,
    buf: Vec<u8>,
}

impl HidSpaceMouse {
    /// Open a device and read its report descriptor.
    pub fn open(api: &HidApi, info: &DeviceInfo) -> Result<Self, BackendError> {
        let raw = info.open_device(api)?;
        // The host loop polls; never block it.
        raw.set_blocking_mode(false)?;

        let description = describe(info);
        let descriptor = read_report_descriptor(&raw, description.path.as_deref());
        if descriptor.is_none() {
            warn!(device = %description, "report descriptor unavailable");
        }
        debug!(
            device = %description,
            descriptor_len = descriptor.as_ref().map_or(0, Vec::len),
            "opened HID device"
        );

        Ok(Self {
            id: description.path.clone().unwrap_or_default(),
            description,
            raw,
            descriptor,
            buf: vec![0u8; READ_BUFFER_SIZE],
        })
    }
}

fn read_report_descriptor(raw: &HidDevice, path: Option<&str>) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; MAX_REPORT_DESCRIPTOR_SIZE];
    match raw.get_report_descriptor(&mut buf) {
        Ok(n) if n > 0 => {
            buf.truncate(n);
            return Some(buf);
        }
        Ok(_) => {}
        Err(e) => debug!(error = %e, "get_report_descriptor failed"),
    }
    path.and_then(read_sysfs_descriptor)
}

/// On Linux, hidraw nodes expose the descriptor through sysfs.
fn read_sysfs_descriptor(path: &str) -> Option<Vec<u8>> {
    if !path.starts_with("/dev/hidraw") {
        return None;
    }
    let node = Path::new(path).file_name()?.to_str()?;
    fs::read(format!("/sys/class/hidraw/{node}/device/report_descriptor"))
        .ok()
        .filter(|b| !b.is_empty())
}

impl DescriptorReader for HidSpaceMouse {
    fn read_raw_descriptor(&self) -> Option<RawDescriptor> {
        self.descriptor.clone().map(RawDescriptor::Binary)
    }
}

impl Device for HidSpaceMouse {
    fn description(&self) -> &DeviceDescription {
        &self.description
    }

    fn id(&self) -> &str {
        &self.id
    }

    /// Drain up to [`MAX_REPORTS_PER_TICK`] reports.
    fn poll(&mut self) -> Vec<Vec<u8>> {
        let mut reports = Vec::new();
        while reports.len() < MAX_REPORTS_PER_TICK {
            match self.raw.read(&mut self.buf) {
                Ok(0) => break,
                Ok(n) => reports.push(self.buf[..n].to_vec()),
                Err(e) => {
                    warn!(device = %self.id, error = %e, "HID read failed");
                    break;
                }
            }
        }
        reports
    }

    fn write_report(&mut self, data: &[u8]) -> Result<(), OutputError> {
        self.raw
            .write(data)
            .map(|_| ())
            .map_err(|e| OutputError::Rejected(e.to_string()))
    }
}

/// Open every connected device that passes the shallow match.
///
/// Devices that fail to open are logged and skipped.
pub fn open_matching_devices(api: &HidApi, matchers: &[DeviceMatcher]) -> Vec<HidSpaceMouse> {
    let mut found = Vec::new();
    for info in api.device_list() {
        if !is_multi_axis_endpoint(info) {
            continue;
        }
        let description = describe(info);
        if !matcher::shallow_pass(matchers, &description) {
            continue;
        }
        match HidSpaceMouse::open(api, info) {
            Ok(dev) => found.push(dev),
            Err(e) => warn!(device = %description, error = %e, "could not open device"),
        }
    }
    found
}
