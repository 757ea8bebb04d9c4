//! Generic Desktop usage table (HUT 1.x, page 0x01).
//!
//! Only the usages a 3D mouse (or anything classified alongside one) can expose
//! are named here. Names follow the HUT spelling in PascalCase; control names
//! derive from them by lower-casing the first letter.

pub const POINTER: u16 = 0x01;
pub const MOUSE: u16 = 0x02;
pub const JOYSTICK: u16 = 0x04;
pub const GAMEPAD: u16 = 0x05;
pub const KEYBOARD: u16 = 0x06;
pub const KEYPAD: u16 = 0x07;
pub const MULTI_AXIS_CONTROLLER: u16 = 0x08;

pub const X: u16 = 0x30;
pub const Y: u16 = 0x31;
pub const Z: u16 = 0x32;
pub const RX: u16 = 0x33;
pub const RY: u16 = 0x34;
pub const RZ: u16 = 0x35;
pub const SLIDER: u16 = 0x36;
pub const DIAL: u16 = 0x37;
pub const WHEEL: u16 = 0x38;
pub const HAT_SWITCH: u16 = 0x39;
pub const COUNTED_BUFFER: u16 = 0x3A;
pub const BYTE_COUNT: u16 = 0x3B;
pub const MOTION_WAKEUP: u16 = 0x3C;
pub const START: u16 = 0x3D;
pub const SELECT: u16 = 0x3E;
pub const VX: u16 = 0x40;
pub const VY: u16 = 0x41;
pub const VZ: u16 = 0x42;
pub const VBRX: u16 = 0x43;
pub const VBRY: u16 = 0x44;
pub const VBRZ: u16 = 0x45;
pub const VNO: u16 = 0x46;
pub const FEATURE_NOTIFICATION: u16 = 0x47;
pub const RESOLUTION_MULTIPLIER: u16 = 0x48;
pub const DPAD_UP: u16 = 0x90;
pub const DPAD_DOWN: u16 = 0x91;
pub const DPAD_RIGHT: u16 = 0x92;
pub const DPAD_LEFT: u16 = 0x93;

/// HUT name for a Generic Desktop usage.
pub fn generic_desktop_name(usage: u16) -> Option<&'static str> {
    let s = match usage {
        POINTER => "Pointer",
        MOUSE => "Mouse",
        JOYSTICK => "Joystick",
        GAMEPAD => "Gamepad",
        KEYBOARD => "Keyboard",
        KEYPAD => "Keypad",
        MULTI_AXIS_CONTROLLER => "MultiAxisController",
        X => "X",
        Y => "Y",
        Z => "Z",
        RX => "Rx",
        RY => "Ry",
        RZ => "Rz",
        SLIDER => "Slider",
        DIAL => "Dial",
        WHEEL => "Wheel",
        HAT_SWITCH => "HatSwitch",
        COUNTED_BUFFER => "CountedBuffer",
        BYTE_COUNT => "ByteCount",
        MOTION_WAKEUP => "MotionWakeup",
        START => "Start",
        SELECT => "Select",
        VX => "Vx",
        VY => "Vy",
        VZ => "Vz",
        VBRX => "Vbrx",
        VBRY => "Vbry",
        VBRZ => "Vbrz",
        VNO => "Vno",
        FEATURE_NOTIFICATION => "FeatureNotification",
        RESOLUTION_MULTIPLIER => "ResolutionMultiplier",
        DPAD_UP => "DpadUp",
        DPAD_DOWN => "DpadDown",
        DPAD_RIGHT => "DpadRight",
        DPAD_LEFT => "DpadLeft",
        _ => return None,
    };
    Some(s)
}

/// Linear and rotary Generic Desktop usages that decode as axes.
pub fn is_axis_usage(usage: u16) -> bool {
    matches!(
        usage,
        X | Y | Z | RX | RY | RZ | VX | VY | VZ | VBRX | VBRY | VBRZ | SLIDER | DIAL | WHEEL
    )
}

/// Generic Desktop usages that behave as buttons.
pub fn is_button_usage(usage: u16) -> bool {
    matches!(usage, SELECT | START | DPAD_UP | DPAD_DOWN | DPAD_LEFT | DPAD_RIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_and_button_sets_are_disjoint() {
        for u in 0..=0xFFu16 {
            assert!(!(is_axis_usage(u) && is_button_usage(u)), "usage {u:#x}");
        }
    }

    #[test]
    fn names_cover_the_classified_usages() {
        for u in 0..=0xFFu16 {
            if is_axis_usage(u) || is_button_usage(u) {
                assert!(generic_desktop_name(u).is_some(), "usage {u:#x}");
            }
        }
        assert_eq!(generic_desktop_name(HAT_SWITCH), Some("HatSwitch"));
        assert_eq!(generic_desktop_name(0x2F), None);
    }
}
