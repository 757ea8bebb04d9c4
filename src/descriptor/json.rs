//! Pre-parsed (JSON) HID descriptors.
//!
//! Some host runtimes cannot hand out the raw report descriptor (Windows being the
//! usual suspect) and instead supply a JSON document with the element list already
//! flattened. Field names are camelCase and enums are numeric:
//!
//! ```json
//! {
//!   "vendorId": 9583, "productId": 50741, "usagePage": 1, "usage": 8,
//!   "inputReportSize": 13,
//!   "elements": [
//!     { "usagePage": 1, "usage": 48, "reportType": 1, "reportId": 1,
//!       "reportSizeInBits": 16, "reportOffsetInBits": 0,
//!       "logicalMin": -350, "logicalMax": 350, "flags": 6 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::{DescriptorParseError, ReportElementDescriptor, UsagePage};

/// A collection entry as listed by the JSON form. Carried for diagnostics only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HidCollectionDescriptor {
    #[serde(rename = "type")]
    pub collection_type: u8,
    pub parent: i32,
    pub usage_page: UsagePage,
    pub usage: u16,
    pub first_child: i32,
    pub child_count: i32,
}

/// Whole-device descriptor in its JSON form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HidDeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage_page: UsagePage,
    pub usage: u16,
    pub input_report_size: u32,
    pub output_report_size: u32,
    pub feature_report_size: u32,
    pub elements: Vec<ReportElementDescriptor>,
    pub collections: Vec<HidCollectionDescriptor>,
}

impl HidDeviceDescriptor {
    /// Decode a JSON descriptor.
    ///
    /// An element list that is missing or empty is **not** an error here; callers
    /// decide whether to fall back to the binary descriptor.
    pub fn from_json(text: &str) -> Result<Self, DescriptorParseError> {
        let descriptor: HidDeviceDescriptor = serde_json::from_str(text)
            .map_err(|e| DescriptorParseError::Malformed(e.to_string()))?;

        if let Some((idx, _)) = descriptor
            .elements
            .iter()
            .enumerate()
            .find(|(_, e)| e.report_size_in_bits == 0)
        {
            return Err(DescriptorParseError::Malformed(format!(
                "element {idx} has a report size of 0 bits"
            )));
        }

        Ok(descriptor)
    }

    /// Pretty JSON, mainly for logging unsupported devices.
    pub fn to_json(&self) -> String {
        // Serializing plain data with string keys cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
