//! Element classification.
//!
//! Turns one [`ReportElementDescriptor`] into a [`ClassifiedControl`] (or
//! nothing). All derivations are pure and depend on the element alone:
//! - control kind (axis / button / dpad), canonical and display names
//! - storage format from bit width and signedness
//! - axis normalization parameters and default (resting) state
//! - semantic usage tags and axis processors
//!
//! Elements that are not Input, are constant padding, or have no recognized
//! usage are filtered out. Heterogeneous third-party descriptors routinely carry
//! such elements; they never abort device setup.
//!
//! ## Signedness
//! [`ReportElementDescriptor::is_signed`] (`logical_min < 0`) selects between the
//! two's-complement and the unsigned decode branch for every derivation below.
//! Getting it wrong flips axis polarity.

use serde::{Deserialize, Serialize};

use crate::descriptor::{ReportElementDescriptor, ReportType, UsagePage};
use crate::number::{self, int_to_normalized_f64, uint_to_normalized_f64};
use crate::usage;

/// Kind of control an element (or group) decodes as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKind {
    Axis,
    Button,
    Dpad,
    /// Composite over three axis children; occupies no storage itself.
    Vector3,
}

/// Storage format of a control within the state buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateFormat {
    /// Generic bitfield of any width.
    Bit,
    SByte,
    Byte,
    Short,
    UShort,
    Int,
    UInt,
    Vector3,
}

impl StateFormat {
    /// Four-character format tag.
    pub fn four_cc(self) -> [u8; 4] {
        match self {
            StateFormat::Bit => *b"BIT ",
            StateFormat::SByte => *b"SBYT",
            StateFormat::Byte => *b"BYTE",
            StateFormat::Short => *b"SHRT",
            StateFormat::UShort => *b"USHT",
            StateFormat::Int => *b"INT ",
            StateFormat::UInt => *b"UINT",
            StateFormat::Vector3 => *b"VC3S",
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, StateFormat::SByte | StateFormat::Short | StateFormat::Int)
    }
}

/// Maps a decoded float from `[min, max]` onto `[-1, 1]` (or `[0, 1]` when
/// `zero == min`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizeParams {
    pub min: f32,
    pub max: f32,
    pub zero: f32,
}

impl NormalizeParams {
    /// Used when the descriptor carries no logical bounds.
    pub const UNIT: NormalizeParams = NormalizeParams {
        min: 0.0,
        max: 1.0,
        zero: 0.5,
    };
}

/// Per-control value parameters contributed by group definitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlParameters {
    pub invert: bool,
    pub scale_factor: Option<f32>,
}

/// Semantic role of a control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageTag {
    PrimaryTrigger,
    PrimaryAction,
    SecondaryTrigger,
    SecondaryAction,
    Twist,
}

/// Post-decode processing applied to axis values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Processor {
    AxisDeadzone,
}

/// Classifier output for one retained element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedControl {
    pub name: String,
    pub display_name: Option<String>,
    pub kind: ControlKind,
    pub format: StateFormat,
    pub size_in_bits: u32,
    pub normalize: Option<NormalizeParams>,
    pub parameters: ControlParameters,
    pub default_state: i64,
    pub usage_tags: Vec<UsageTag>,
    pub processors: Vec<Processor>,
    pub usage_page: UsagePage,
    pub usage: u16,
    pub report_id: u8,
    pub logical_min: i32,
    pub logical_max: i32,
}

/// Classify one element, or `None` if it produces no control.
pub fn classify(e: &ReportElementDescriptor) -> Option<ClassifiedControl> {
    let kind = e.determine_layout()?;
    Some(ClassifiedControl {
        name: e.determine_name(),
        display_name: e.determine_display_name(),
        kind,
        format: e.determine_format(),
        size_in_bits: e.report_size_in_bits,
        normalize: if kind == ControlKind::Axis {
            e.determine_axis_normalization()
        } else {
            None
        },
        parameters: ControlParameters::default(),
        default_state: e.determine_default_state(),
        usage_tags: e.determine_usages(),
        processors: e.determine_processors(),
        usage_page: e.usage_page,
        usage: e.usage,
        report_id: e.report_id,
        logical_min: e.logical_min,
        logical_max: e.logical_max,
    })
}

impl ReportElementDescriptor {
    #[inline]
    pub fn is_signed(&self) -> bool {
        self.logical_min < 0
    }

    fn is_generic_desktop_axis(&self) -> bool {
        self.usage_page == UsagePage::GENERIC_DESKTOP && usage::is_axis_usage(self.usage)
    }

    /// `logical_min` as a float in the field's storage range.
    pub fn min_float_value(&self) -> f32 {
        self.bound_to_float(self.logical_min)
    }

    /// `logical_max` as a float in the field's storage range.
    pub fn max_float_value(&self) -> f32 {
        self.bound_to_float(self.logical_max)
    }

    fn bound_to_float(&self, bound: i32) -> f32 {
        if self.is_signed() {
            let (min, max) = number::signed_range(self.report_size_in_bits);
            (int_to_normalized_f64(bound as i64, min, max) * 2.0 - 1.0) as f32
        } else {
            let max = number::unsigned_max(self.report_size_in_bits);
            uint_to_normalized_f64(bound.max(0) as u64, 0, max) as f32
        }
    }

    pub fn determine_layout(&self) -> Option<ControlKind> {
        if self.report_type != ReportType::Input || self.flags.is_constant() {
            return None;
        }
        match self.usage_page {
            UsagePage::BUTTON if self.usage != 0 => Some(ControlKind::Button),
            UsagePage::GENERIC_DESKTOP => match self.usage {
                u if usage::is_axis_usage(u) => Some(ControlKind::Axis),
                u if usage::is_button_usage(u) => Some(ControlKind::Button),
                // Only 8-way hats are supported.
                usage::HAT_SWITCH
                    if self.logical_max as i64 - self.logical_min as i64 + 1 == 8 =>
                {
                    Some(ControlKind::Dpad)
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Canonical control name. Device-supplied strings are never used: they are
    /// rare, often odd, and not guaranteed unique.
    pub fn determine_name(&self) -> String {
        match self.usage_page {
            UsagePage::BUTTON => format!("button{}", self.usage),
            UsagePage::GENERIC_DESKTOP if self.usage == usage::HAT_SWITCH => "hat".to_string(),
            UsagePage::GENERIC_DESKTOP => match usage::generic_desktop_name(self.usage) {
                Some(name) => lower_first(name),
                None => format!("usage{}", self.usage),
            },
            page => format!("UsagePage({:X}) Usage({:X})", page.0, self.usage),
        }
    }

    pub fn determine_display_name(&self) -> Option<String> {
        match self.usage_page {
            UsagePage::BUTTON => Some(format!("Button {}", self.usage)),
            UsagePage::GENERIC_DESKTOP => {
                usage::generic_desktop_name(self.usage).map(str::to_string)
            }
            _ => None,
        }
    }

    pub fn determine_format(&self) -> StateFormat {
        let signed = self.is_signed();
        match (self.report_size_in_bits, signed) {
            (8, true) => StateFormat::SByte,
            (8, false) => StateFormat::Byte,
            (16, true) => StateFormat::Short,
            (16, false) => StateFormat::UShort,
            (32, true) => StateFormat::Int,
            (32, false) => StateFormat::UInt,
            _ => StateFormat::Bit,
        }
    }

    pub fn determine_usages(&self) -> Vec<UsageTag> {
        match (self.usage_page, self.usage) {
            (UsagePage::BUTTON, 1) => vec![UsageTag::PrimaryTrigger, UsageTag::PrimaryAction],
            (UsagePage::BUTTON, 2) => vec![UsageTag::SecondaryTrigger, UsageTag::SecondaryAction],
            (UsagePage::GENERIC_DESKTOP, usage::RZ) => vec![UsageTag::Twist],
            _ => Vec::new(),
        }
    }

    pub fn determine_processors(&self) -> Vec<Processor> {
        if self.is_generic_desktop_axis() {
            vec![Processor::AxisDeadzone]
        } else {
            Vec::new()
        }
    }

    /// Normalization for axis elements.
    ///
    /// The zero point sits halfway between min and max: the resting position of
    /// an axis is unknown (a trigger rests at its minimum), so it is not forced
    /// through 0.
    pub fn determine_axis_normalization(&self) -> Option<NormalizeParams> {
        if self.logical_min == 0 && self.logical_max == 0 {
            return Some(NormalizeParams::UNIT);
        }
        let min = self.min_float_value();
        let max = self.max_float_value();
        if number::approximately(0.0, min) && number::approximately(0.0, max) {
            return None;
        }
        Some(NormalizeParams {
            min,
            max,
            zero: min + (max - min) / 2.0,
        })
    }

    /// Raw value a control holds before any report arrives.
    pub fn determine_default_state(&self) -> i64 {
        if self.usage_page != UsagePage::GENERIC_DESKTOP {
            return 0;
        }
        if self.usage == usage::HAT_SWITCH {
            if !self.has_null_state() {
                return 0;
            }
            // Out of logical range but still storable in the field's bits.
            if self.logical_min >= 1 {
                return self.logical_min as i64 - 1;
            }
            let max_value = number::unsigned_max(self.report_size_in_bits) as i64;
            if (self.logical_max as i64) < max_value {
                return self.logical_max as i64 + 1;
            }
            return 0;
        }
        if usage::is_axis_usage(self.usage) && !self.is_signed() {
            let mid = self.logical_min as i64 + (self.logical_max as i64 - self.logical_min as i64) / 2;
            if mid != 0 {
                return mid;
            }
        }
        0
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
