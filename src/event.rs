//! Raw report events.
//!
//! The host hands every input report to the merge engine as a [`RawReportEvent`]:
//! a format tag, a delta flag and the report bytes.
//!
//! ## Payload convention
//! `data[0]` is the report ID, `data[1..]` the report body. Only events tagged
//! [`HID_FORMAT`] with `is_delta == false` carry reports; everything else is
//! ignored by [`StateMergeEngine`](crate::state::StateMergeEngine).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Four-character code identifying a state or event format.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> Self {
        FourCC(*code)
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(code: [u8; 4]) -> Self {
        FourCC(code)
    }
}

/// Format of full (non-delta) HID input reports.
pub const HID_FORMAT: FourCC = FourCC::new(b"HID ");

/// One report as delivered by the host.
#[derive(Clone, Copy, Debug)]
pub struct RawReportEvent<'a> {
    pub format: FourCC,
    /// Partial state update. Never produced for HID reports.
    pub is_delta: bool,
    /// `[report_id, body..]`.
    pub data: &'a [u8],
}

impl<'a> RawReportEvent<'a> {
    /// A full HID report.
    #[inline]
    pub fn hid(data: &'a [u8]) -> Self {
        Self {
            format: HID_FORMAT,
            is_delta: false,
            data,
        }
    }

    #[inline]
    pub fn report_id(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Report bytes after the ID prefix.
    #[inline]
    pub fn body(&self) -> &'a [u8] {
        self.data.get(1..).unwrap_or(&[])
    }
}
