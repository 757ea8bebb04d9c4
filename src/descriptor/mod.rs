//! HID report descriptor model.
//!
//! A device's report descriptor is flattened into an ordered list of
//! [`ReportElementDescriptor`]s, one per field per report. Two input shapes are
//! supported:
//! - **Binary**: the raw report descriptor bytes as returned by the device
//!   (see [`binary`]).
//! - **JSON**: a pre-parsed descriptor as produced by some host input runtimes
//!   (see [`json`] and [`HidDeviceDescriptor`]).
//!
//! ## Offsets
//! `report_offset_in_bits` is relative to the start of the report **body**, i.e.
//! the bytes following the report ID prefix. Every report starts at bit 0.
//!
//! ## Example
//! ```
//! use spacenav_hid::descriptor::{parse, DescriptorSource};
//!
//! let json = r#"{ "vendorId": 9583, "elements": [
//!     { "usagePage": 1, "usage": 48, "reportType": 1, "reportId": 1,
//!       "reportSizeInBits": 16, "reportOffsetInBits": 0,
//!       "logicalMin": -350, "logicalMax": 350 } ] }"#;
//! let elements = parse(DescriptorSource::Json(json)).unwrap();
//! assert_eq!(elements.len(), 1);
//! ```

pub mod binary;
pub mod json;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use json::HidDeviceDescriptor;

/// Failure to turn a descriptor source into elements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorParseError {
    /// The source could not be decoded into the expected schema.
    #[error("malformed HID descriptor: {0}")]
    Malformed(String),
    /// Decoding succeeded but produced no elements.
    ///
    /// Callers should attempt a deeper/alternate read path (e.g. the binary descriptor).
    #[error("HID descriptor contains no elements")]
    Empty,
}

/// Where a descriptor comes from.
#[derive(Debug, Clone, Copy)]
pub enum DescriptorSource<'a> {
    Binary(&'a [u8]),
    Json(&'a str),
}

/// Parse a descriptor source into its element list.
///
/// Fails with [`DescriptorParseError::Empty`] when the source is well-formed but
/// describes no fields.
pub fn parse(source: DescriptorSource<'_>) -> Result<Vec<ReportElementDescriptor>, DescriptorParseError> {
    let elements = match source {
        DescriptorSource::Binary(bytes) => binary::parse_report_descriptor(bytes)?,
        DescriptorSource::Json(text) => HidDeviceDescriptor::from_json(text)?.elements,
    };

    if elements.is_empty() {
        return Err(DescriptorParseError::Empty);
    }
    Ok(elements)
}

/// HID usage page (HUT 1.x).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsagePage(pub u16);

impl UsagePage {
    pub const UNDEFINED: UsagePage = UsagePage(0x00);
    pub const GENERIC_DESKTOP: UsagePage = UsagePage(0x01);
    pub const LEDS: UsagePage = UsagePage(0x08);
    pub const BUTTON: UsagePage = UsagePage(0x09);
}

/// Which kind of report a field belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ReportType {
    #[default]
    Unknown,
    Input,
    Output,
    Feature,
}

impl TryFrom<u8> for ReportType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(ReportType::Unknown),
            1 => Ok(ReportType::Input),
            2 => Ok(ReportType::Output),
            3 => Ok(ReportType::Feature),
            other => Err(format!("unknown report type {other}")),
        }
    }
}

impl From<ReportType> for u8 {
    fn from(t: ReportType) -> u8 {
        match t {
            ReportType::Unknown => 0,
            ReportType::Input => 1,
            ReportType::Output => 2,
            ReportType::Feature => 3,
        }
    }
}

/// Main item data bits (HID 1.11 §6.2.2.5), as carried on each element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementFlags(pub u32);

impl ElementFlags {
    pub const CONSTANT: u32 = 1 << 0;
    pub const VARIABLE: u32 = 1 << 1;
    pub const RELATIVE: u32 = 1 << 2;
    pub const NULL_STATE: u32 = 1 << 6;

    #[inline]
    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }
    pub fn is_constant(self) -> bool {
        self.contains(Self::CONSTANT)
    }
    pub fn is_relative(self) -> bool {
        self.contains(Self::RELATIVE)
    }
    pub fn has_null_state(self) -> bool {
        self.contains(Self::NULL_STATE)
    }
}

/// One field inside one HID report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportElementDescriptor {
    pub usage_page: UsagePage,
    pub usage: u16,
    /// Report this field belongs to. `0` means the device does not use report IDs.
    pub report_id: u8,
    pub report_type: ReportType,
    /// Bit offset within the report body (report ID byte excluded).
    pub report_offset_in_bits: u32,
    pub report_size_in_bits: u32,
    pub logical_min: i32,
    pub logical_max: i32,
    pub physical_min: i32,
    pub physical_max: i32,
    pub unit: u32,
    pub unit_exponent: i32,
    pub collection_index: i32,
    pub flags: ElementFlags,
}

impl ReportElementDescriptor {
    #[inline]
    pub fn has_null_state(&self) -> bool {
        self.flags.has_null_state()
    }

    /// First bit past the end of this field within its report body.
    #[inline]
    pub fn end_bit(&self) -> u64 {
        self.report_offset_in_bits as u64 + self.report_size_in_bits as u64
    }
}
