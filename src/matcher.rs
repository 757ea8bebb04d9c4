//! Device matching.
//!
//! Recognition runs in two passes:
//! - **shallow**: cheap checks against the [`DeviceDescription`] only
//!   (interface tag, manufacturer pattern, vendor/product ids). Most devices
//!   are rejected here.
//! - **deep**: obtain the element list, from the description's capabilities
//!   JSON or, if that carries no elements, from the device's raw descriptor.
//!
//! # Defaults
//! - any HID device with vendor `0x256F` (3Dconnexion)
//! - HID devices with vendor `0x046D` (Logitech) whose manufacturer string
//!   starts with `3Dconnexion` (older SpaceNavigator / SpaceExplorer units)

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::{self, DescriptorParseError, ReportElementDescriptor};
use crate::device::DescriptorReader;
use crate::metadata::{DeviceDescription, HID_INTERFACE};

pub const VENDOR_3DCONNEXION: u16 = 0x256F;
pub const VENDOR_LOGITECH: u16 = 0x046D;

/// Serializable form of a [`DeviceMatcher`], as found in configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub interface: Option<String>,
    /// Regular expression, matched case-insensitively against the whole
    /// manufacturer string.
    pub manufacturer: Option<String>,
    pub vendor_ids: Vec<u16>,
    pub product_ids: Vec<u16>,
}

/// Accepts or rejects devices by their description.
///
/// Unset criteria and empty id lists match anything.
#[derive(Clone, Debug)]
pub struct DeviceMatcher {
    interface: Option<String>,
    manufacturer: Option<Regex>,
    vendor_ids: Vec<u16>,
    product_ids: Vec<u16>,
}

impl DeviceMatcher {
    /// Matches every HID device.
    pub fn hid() -> Self {
        Self {
            interface: Some(HID_INTERFACE.to_string()),
            manufacturer: None,
            vendor_ids: Vec::new(),
            product_ids: Vec::new(),
        }
    }

    pub fn with_vendor(mut self, vendor_id: u16) -> Self {
        self.vendor_ids.push(vendor_id);
        self
    }

    pub fn with_product(mut self, product_id: u16) -> Self {
        self.product_ids.push(product_id);
        self
    }

    pub fn with_manufacturer(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.manufacturer = Some(compile_pattern(pattern)?);
        Ok(self)
    }

    pub fn from_config(config: &MatcherConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            interface: config.interface.clone(),
            manufacturer: config.manufacturer.as_deref().map(compile_pattern).transpose()?,
            vendor_ids: config.vendor_ids.clone(),
            product_ids: config.product_ids.clone(),
        })
    }

    /// Shallow pass.
    pub fn matches(&self, d: &DeviceDescription) -> bool {
        if let Some(interface) = &self.interface {
            if !d.interface_name.eq_ignore_ascii_case(interface) {
                return false;
            }
        }
        if let Some(re) = &self.manufacturer {
            match d.manufacturer.as_deref() {
                Some(m) if re.is_match(m) => {}
                _ => return false,
            }
        }
        if !self.vendor_ids.is_empty()
            && !d.effective_vendor_id().is_some_and(|v| self.vendor_ids.contains(&v))
        {
            return false;
        }
        if !self.product_ids.is_empty()
            && !d.effective_product_id().is_some_and(|p| self.product_ids.contains(&p))
        {
            return false;
        }
        true
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()
}

/// Matchers recognizing the 3Dconnexion device family.
pub fn default_matchers() -> Vec<DeviceMatcher> {
    let mut out = vec![DeviceMatcher::hid().with_vendor(VENDOR_3DCONNEXION)];
    // A fixed literal pattern; compiling it cannot fail.
    if let Ok(m) = DeviceMatcher::hid()
        .with_vendor(VENDOR_LOGITECH)
        .with_manufacturer("3Dconnexion.*")
    {
        out.push(m);
    }
    out
}

/// True if any matcher accepts the device.
pub fn shallow_pass(matchers: &[DeviceMatcher], d: &DeviceDescription) -> bool {
    matchers.iter().any(|m| m.matches(d))
}

/// Deep pass: the device's input element list.
///
/// Prefers the elements in `capabilities`; falls back to the descriptor the
/// reader supplies when there are none.
pub fn deep_pass(
    d: &DeviceDescription,
    reader: &dyn DescriptorReader,
) -> Result<Vec<ReportElementDescriptor>, DescriptorParseError> {
    if let Some(text) = d.capabilities.as_deref() {
        match descriptor::parse(descriptor::DescriptorSource::Json(text)) {
            Ok(elements) => return Ok(elements),
            Err(DescriptorParseError::Empty) => {
                debug!(device = %d, "capabilities carry no elements, reading full descriptor");
            }
            Err(e) => {
                debug!(device = %d, error = %e, "unusable capabilities, reading full descriptor");
            }
        }
    }

    let raw = reader.read_raw_descriptor().ok_or(DescriptorParseError::Empty)?;
    descriptor::parse(raw.source())
}
