//! Decoding controls out of a merged state buffer.
//!
//! Everything here is a pure function of `(buffer, control)`; locking is the
//! caller's business (see [`crate::state::StateReader`]).

use serde::{Deserialize, Serialize};

use crate::classify::{NormalizeParams, Processor, StateFormat};
use crate::layout::LayoutControl;
use crate::number::{self, int_to_normalized_f64, uint_to_normalized_f64};

/// Default threshold at which a button counts as pressed.
pub const DEFAULT_PRESS_POINT: f32 = 0.5;

// --------------------- bit access ---------------------

/// Read `bits` (at most 64) little-endian bits starting at `bit_offset`.
///
/// Bits past the end of `buf` read as zero.
pub fn read_bits(buf: &[u8], bit_offset: u64, bits: u32) -> u64 {
    let bits = bits.min(64);
    let mut value = 0u64;
    for i in 0..bits as u64 {
        let pos = bit_offset + i;
        let Some(&byte) = buf.get((pos / 8) as usize) else {
            break;
        };
        if byte >> (pos % 8) & 1 != 0 {
            value |= 1 << i;
        }
    }
    value
}

/// Write the low `bits` of `value` at `bit_offset`. Bits past the end of `buf`
/// are dropped.
pub fn write_bits(buf: &mut [u8], bit_offset: u64, bits: u32, value: u64) {
    let bits = bits.min(64);
    for i in 0..bits as u64 {
        let pos = bit_offset + i;
        let Some(byte) = buf.get_mut((pos / 8) as usize) else {
            break;
        };
        let mask = 1u8 << (pos % 8);
        if value >> i & 1 != 0 {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }
}

fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

/// Raw integer value of a control, sign-extended for signed fields.
pub fn read_raw(buf: &[u8], c: &LayoutControl) -> i64 {
    let size = c.control.size_in_bits;
    let raw = read_bits(buf, c.global_bit_offset(), size);
    if c.control.format.is_signed() || (c.control.format == StateFormat::Bit && c.control.logical_min < 0) {
        sign_extend(raw, size)
    } else {
        raw as i64
    }
}

// --------------------- value decoding ---------------------

/// Stored value as a float, per the control's format.
///
/// Signed formats map their storage range through the signed normalization and
/// then onto `[-1, 1]`; unsigned formats map onto `[0, 1]`. A single bit reads
/// as `0.0` or `1.0`. Wider bitfields follow the field's signedness.
pub fn read_float(buf: &[u8], c: &LayoutControl) -> f32 {
    let size = c.control.size_in_bits;
    let raw = read_raw(buf, c);
    let signed = match c.control.format {
        StateFormat::Vector3 => return 0.0,
        StateFormat::Bit if size == 1 => return raw as f32,
        StateFormat::Bit => c.control.logical_min < 0,
        f => f.is_signed(),
    };
    let value = if signed {
        let (min, max) = number::signed_range(size);
        int_to_normalized_f64(raw, min, max) * 2.0 - 1.0
    } else {
        uint_to_normalized_f64(raw.max(0) as u64, 0, number::unsigned_max(size))
    };
    value as f32
}

/// Map `value` onto `[-1, 1]` around `zero` (or `[0, 1]` when `zero <= min`).
pub fn normalize(value: f32, params: &NormalizeParams) -> f32 {
    let NormalizeParams { min, max, zero } = *params;
    let zero = zero.max(min);
    if number::approximately(value, min) {
        return if min < zero { -1.0 } else { 0.0 };
    }
    let percentage = (value - min) / (max - min);
    if min < zero {
        2.0 * percentage - 1.0
    } else {
        percentage
    }
}

/// Zeroes small deflections and saturates large ones, rescaling in between.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisDeadzone {
    pub min: f32,
    pub max: f32,
}

impl Default for AxisDeadzone {
    fn default() -> Self {
        Self {
            min: 0.125,
            max: 0.925,
        }
    }
}

impl AxisDeadzone {
    pub fn apply(&self, value: f32) -> f32 {
        let abs = value.abs();
        if abs < self.min {
            return 0.0;
        }
        if abs > self.max {
            return value.signum();
        }
        value.signum() * ((abs - self.min) / (self.max - self.min))
    }
}

/// Runtime decode knobs shared by every control of a device.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodeSettings {
    pub deadzone: AxisDeadzone,
    pub press_point: f32,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            deadzone: AxisDeadzone::default(),
            press_point: DEFAULT_PRESS_POINT,
        }
    }
}

/// Processed axis value: scale, normalize, invert, then processors.
pub fn read_axis(buf: &[u8], c: &LayoutControl, settings: &DecodeSettings) -> f32 {
    let control = &c.control;
    let mut value = read_float(buf, c);
    if let Some(scale) = control.parameters.scale_factor {
        value *= scale;
    }
    if let Some(params) = &control.normalize {
        value = normalize(value, params);
    }
    if control.parameters.invert {
        value = -value;
    }
    for processor in &control.processors {
        match processor {
            Processor::AxisDeadzone => value = settings.deadzone.apply(value),
        }
    }
    value
}

pub fn is_pressed(buf: &[u8], c: &LayoutControl, press_point: f32) -> bool {
    read_float(buf, c) >= press_point
}

// --------------------- dpad ---------------------

/// Eight-way hat direction, clockwise from up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DpadDirection {
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

impl DpadDirection {
    const ALL: [DpadDirection; 8] = [
        DpadDirection::Up,
        DpadDirection::UpRight,
        DpadDirection::Right,
        DpadDirection::DownRight,
        DpadDirection::Down,
        DpadDirection::DownLeft,
        DpadDirection::Left,
        DpadDirection::UpLeft,
    ];

    /// Direction for slot `0..8`.
    pub fn from_slot(slot: i64) -> Option<Self> {
        usize::try_from(slot).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Unit-ish 2D vector, `+y` up.
    pub fn to_vector(self) -> (f32, f32) {
        match self {
            DpadDirection::Up => (0.0, 1.0),
            DpadDirection::UpRight => (1.0, 1.0),
            DpadDirection::Right => (1.0, 0.0),
            DpadDirection::DownRight => (1.0, -1.0),
            DpadDirection::Down => (0.0, -1.0),
            DpadDirection::DownLeft => (-1.0, -1.0),
            DpadDirection::Left => (-1.0, 0.0),
            DpadDirection::UpLeft => (-1.0, 1.0),
        }
    }
}

/// Hat position, or `None` when centered (any value outside the 8 slots).
pub fn read_dpad(buf: &[u8], c: &LayoutControl) -> Option<DpadDirection> {
    let raw = read_raw(buf, c);
    DpadDirection::from_slot(raw - c.control.logical_min as i64)
}

/// Three-component value of a vector composite.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}
