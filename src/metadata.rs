//! Device description.
//!
//! [`DeviceDescription`] is what the host knows about a device before its
//! descriptor is read: identity strings, USB ids, and optionally a pre-parsed
//! JSON descriptor (`capabilities`). Matching runs against it; unknown fields
//! stay `None`.
//!
//! ## Persistence notes
//! - `vendor_id`/`product_id` and `serial_number` (when present) are stable and
//!   key the layout cache.
//! - `path` is platform-specific and may change across ports and reconnects;
//!   treat it as diagnostic first, identity second.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::descriptor::HidDeviceDescriptor;

/// Interface tag of HID devices.
pub const HID_INTERFACE: &str = "HID";

/// What the host reports about a device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceDescription {
    /// Interface tag, e.g. `"HID"`.
    pub interface_name: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub serial_number: Option<String>,
    /// OS/topology path. Opaque.
    pub path: Option<String>,
    /// Pre-parsed descriptor JSON, when the host supplies one.
    pub capabilities: Option<String>,
}

impl DeviceDescription {
    /// Descriptor carried in `capabilities`, if present and well-formed.
    pub fn capabilities_descriptor(&self) -> Option<HidDeviceDescriptor> {
        let text = self.capabilities.as_deref()?;
        HidDeviceDescriptor::from_json(text).ok()
    }

    /// Vendor id, falling back to the one in `capabilities`.
    pub fn effective_vendor_id(&self) -> Option<u16> {
        self.vendor_id
            .or_else(|| self.capabilities_descriptor().map(|d| d.vendor_id))
    }

    /// Product id, falling back to the one in `capabilities`.
    pub fn effective_product_id(&self) -> Option<u16> {
        self.product_id
            .or_else(|| self.capabilities_descriptor().map(|d| d.product_id))
    }

    /// Name used for layouts: the product string, else `vid:pid`.
    pub fn display_name(&self) -> String {
        match &self.product {
            Some(p) if !p.is_empty() => p.clone(),
            _ => format!(
                "{:04x}:{:04x}",
                self.effective_vendor_id().unwrap_or(0),
                self.effective_product_id().unwrap_or(0)
            ),
        }
    }
}

impl fmt::Display for DeviceDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{:04x}:{:04x}]",
            self.manufacturer.as_deref().unwrap_or("?"),
            self.product.as_deref().unwrap_or("?"),
            self.effective_vendor_id().unwrap_or(0),
            self.effective_product_id().unwrap_or(0)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_fall_back_to_capabilities() {
        let d = DeviceDescription {
            interface_name: HID_INTERFACE.into(),
            capabilities: Some(r#"{ "vendorId": 9583, "productId": 50726 }"#.into()),
            ..Default::default()
        };
        assert_eq!(d.effective_vendor_id(), Some(0x256f));
        assert_eq!(d.effective_product_id(), Some(0xc626));
        assert_eq!(d.display_name(), "256f:c626");
    }

    #[test]
    fn explicit_ids_win() {
        let d = DeviceDescription {
            vendor_id: Some(0x046d),
            product: Some("SpaceNavigator".into()),
            capabilities: Some(r#"{ "vendorId": 9583 }"#.into()),
            ..Default::default()
        };
        assert_eq!(d.effective_vendor_id(), Some(0x046d));
        assert_eq!(d.display_name(), "SpaceNavigator");
    }
}
