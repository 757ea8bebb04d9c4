//! A software SpaceNavigator.
//!
//! [`VirtualSpaceMouse`] carries the report descriptor of a 3Dconnexion
//! SpaceNavigator and produces byte-exact input reports for it, so the whole
//! pipeline (matching, descriptor parsing, layout, merging) can run without
//! hardware.
//!
//! Reports are queued by the setters and drained by [`Device::poll`]:
//! - report 1: X, Y, Z as little-endian `i16` in `-350..=350`
//! - report 2: Rx, Ry, Rz, same encoding
//! - report 3: two button bits plus 14 bits of padding
//!
//! Output reports (report 4 switches the LED) are recorded, not acted on.

use crate::device::{DescriptorReader, Device, LedStatus, OutputError, RawDescriptor};
use crate::metadata::{DeviceDescription, HID_INTERFACE};

/// Report descriptor of a SpaceNavigator (046d:c626).
pub const SPACE_NAVIGATOR_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x08, // Usage (Multi-axis Controller)
    0xA1, 0x01, // Collection (Application)
    0xA1, 0x00, //   Collection (Physical)
    0x85, 0x01, //     Report ID (1)
    0x16, 0xA2, 0xFE, //     Logical Minimum (-350)
    0x26, 0x5E, 0x01, //     Logical Maximum (350)
    0x36, 0x88, 0xFA, //     Physical Minimum (-1400)
    0x46, 0x78, 0x05, //     Physical Maximum (1400)
    0x55, 0x0C, //     Unit Exponent (-4)
    0x65, 0x11, //     Unit (cm, SI linear)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x09, 0x32, //     Usage (Z)
    0x75, 0x10, //     Report Size (16)
    0x95, 0x03, //     Report Count (3)
    0x81, 0x06, //     Input (Data, Var, Rel)
    0xC0, //   End Collection
    0xA1, 0x00, //   Collection (Physical)
    0x85, 0x02, //     Report ID (2)
    0x09, 0x33, //     Usage (Rx)
    0x09, 0x34, //     Usage (Ry)
    0x09, 0x35, //     Usage (Rz)
    0x75, 0x10, //     Report Size (16)
    0x95, 0x03, //     Report Count (3)
    0x81, 0x06, //     Input (Data, Var, Rel)
    0xC0, //   End Collection
    0xA1, 0x02, //   Collection (Logical)
    0x85, 0x03, //     Report ID (3)
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (1)
    0x29, 0x02, //     Usage Maximum (2)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x35, 0x00, //     Physical Minimum (0)
    0x45, 0x01, //     Physical Maximum (1)
    0x75, 0x01, //     Report Size (1)
    0x95, 0x02, //     Report Count (2)
    0x81, 0x02, //     Input (Data, Var, Abs)
    0x95, 0x0E, //     Report Count (14)
    0x81, 0x03, //     Input (Const, Var, Abs)
    0xC0, //   End Collection
    0xA1, 0x02, //   Collection (Logical)
    0x85, 0x04, //     Report ID (4)
    0x05, 0x08, //     Usage Page (LED)
    0x09, 0x4B, //     Usage (Generic Indicator)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x01, //     Report Size (1)
    0x91, 0x02, //     Output (Data, Var, Abs)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x07, //     Report Size (7)
    0x91, 0x03, //     Output (Const, Var, Abs)
    0xC0, //   End Collection
    0xC0, // End Collection
];

/// Full-scale deflection reported by the device.
pub const AXIS_RANGE: i16 = 350;

/// Output report carrying the LED bit.
pub const LED_REPORT_ID: u8 = 4;

/// Software SpaceNavigator. See the module docs for the report format.
#[derive(Debug, Clone)]
pub struct VirtualSpaceMouse {
    id: String,
    description: DeviceDescription,
    pending: Vec<Vec<u8>>,
    written: Vec<Vec<u8>>,
}

impl VirtualSpaceMouse {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            description: DeviceDescription {
                interface_name: HID_INTERFACE.to_string(),
                manufacturer: Some("3Dconnexion".to_string()),
                product: Some("SpaceNavigator".to_string()),
                vendor_id: Some(0x046D),
                product_id: Some(0xC626),
                serial_number: None,
                path: Some(format!("virtual://{id}")),
                capabilities: None,
            },
            pending: Vec::new(),
            written: Vec::new(),
        }
    }

    /// Queue a raw report, `[report_id, body..]`.
    pub fn feed(&mut self, report: Vec<u8>) {
        self.pending.push(report);
    }

    fn axes_report(report_id: u8, a: i16, b: i16, c: i16) -> Vec<u8> {
        let mut report = Vec::with_capacity(7);
        report.push(report_id);
        for v in [a, b, c] {
            report.extend_from_slice(&v.clamp(-AXIS_RANGE, AXIS_RANGE).to_le_bytes());
        }
        report
    }

    /// Queue a translation report. Values are clamped to `±350`.
    pub fn set_translation(&mut self, x: i16, y: i16, z: i16) {
        self.feed(Self::axes_report(1, x, y, z));
    }

    /// Queue a rotation report. Values are clamped to `±350`.
    pub fn set_rotation(&mut self, rx: i16, ry: i16, rz: i16) {
        self.feed(Self::axes_report(2, rx, ry, rz));
    }

    /// Queue a button report.
    pub fn set_buttons(&mut self, left: bool, right: bool) {
        let bits = u8::from(left) | (u8::from(right) << 1);
        self.feed(vec![3, bits, 0]);
    }
}

impl VirtualSpaceMouse {
    /// Every output report written so far, oldest first.
    pub fn written_reports(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// LED state after the last LED report, `None` if none was written.
    pub fn led(&self) -> Option<LedStatus> {
        self.written
            .iter()
            .rev()
            .find(|r| r.first() == Some(&LED_REPORT_ID))
            .map(|r| match r.get(1) {
                Some(b) if b & 1 == 1 => LedStatus::On,
                _ => LedStatus::Off,
            })
    }
}

impl DescriptorReader for VirtualSpaceMouse {
    fn read_raw_descriptor(&self) -> Option<RawDescriptor> {
        Some(RawDescriptor::Binary(SPACE_NAVIGATOR_DESCRIPTOR.to_vec()))
    }
}

impl Device for VirtualSpaceMouse {
    fn description(&self) -> &DeviceDescription {
        &self.description
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn poll(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending)
    }

    fn write_report(&mut self, data: &[u8]) -> Result<(), OutputError> {
        self.written.push(data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_are_little_endian_and_clamped() {
        let mut m = VirtualSpaceMouse::new("v");
        m.set_translation(1, -1, 1000);
        m.set_buttons(false, true);
        let reports = m.poll();
        assert_eq!(reports[0], vec![1, 1, 0, 0xFF, 0xFF, 0x5E, 0x01]);
        assert_eq!(reports[1], vec![3, 0b10, 0]);
        assert!(m.poll().is_empty());
    }

    #[test]
    fn led_follows_the_last_led_report() {
        let mut m = VirtualSpaceMouse::new("v");
        assert_eq!(m.led(), None);
        m.set_led(LED_REPORT_ID, LedStatus::On).unwrap();
        assert_eq!(m.led(), Some(LedStatus::On));
        m.set_led(LED_REPORT_ID, LedStatus::Off).unwrap();
        assert_eq!(m.written_reports(), &[vec![4, 1], vec![4, 0]]);
        assert_eq!(m.led(), Some(LedStatus::Off));
    }
}
