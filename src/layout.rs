//! Merged state layout.
//!
//! A SpaceMouse splits its state across several input reports (translation in
//! report 1, rotation in report 2, buttons in report 3). Rather than keeping one
//! buffer per report, every report is given a fixed-size *slot* in one merged
//! buffer:
//!
//! ```text
//! | slot 0 (report 1) | slot 1 (report 2) | slot 2 (report 3) |
//! |<- report_size ->|
//! ```
//!
//! An element at bit `o` of report `id`'s body lands at
//! `o + (id - 1) * report_size * 8` in the merged buffer. A slot is one byte
//! larger than the largest body so a full report (ID byte included) always fits.
//!
//! Groups coalesce usage ranges (X..Z, Rx..Rz) into composite vector controls.
//! The composite itself stores nothing; its children are ordinary axis controls
//! named `group/axis`.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::classify::{self, ClassifiedControl, ControlKind, ControlParameters, StateFormat};
use crate::control;
use crate::descriptor::{ReportElementDescriptor, ReportType, UsagePage};
use crate::usage;

/// Why a device could not be fitted into the fixed-slot model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutBuildError {
    #[error("element {usage_page:#06x}/{usage:#06x} is in report {report_id}, outside 1..={report_count}")]
    ElementOutOfRange {
        usage_page: u16,
        usage: u16,
        report_id: u8,
        report_count: u32,
    },
    #[error("report {report_id} needs {required} bytes but slots hold {slot_size}")]
    SlotOverflow {
        report_id: u8,
        required: u64,
        slot_size: u32,
    },
    #[error("{report_count} slots of {report_size} bytes exceed 255 slots of at most {MAX_SLOT_SIZE} bytes")]
    GeometryTooLarge { report_count: u32, report_size: u32 },
    #[error("invalid group `{name}`: {reason}")]
    InvalidGroup { name: String, reason: String },
}

/// One child of a [`GroupDefinition`], for a single usage of its range.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupElement {
    pub name: String,
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub parameters: ControlParameters,
}

impl GroupElement {
    fn new(name: &str, invert: bool) -> Self {
        Self {
            name: name.to_string(),
            display_name: Some(name.to_uppercase()),
            parameters: ControlParameters {
                invert,
                scale_factor: None,
            },
        }
    }
}

fn default_group_format() -> StateFormat {
    StateFormat::Vector3
}

/// Coalesces a contiguous usage range into one named composite.
///
/// `elements[i]` describes the child for usage `usage_min + i`; reordering
/// happens by naming (the element for `Y` may be called `z`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupDefinition {
    #[serde(default = "generic_desktop")]
    pub usage_page: UsagePage,
    pub usage_min: u16,
    pub usage_max: u16,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_group_format")]
    pub format: StateFormat,
    pub elements: Vec<GroupElement>,
}

fn generic_desktop() -> UsagePage {
    UsagePage::GENERIC_DESKTOP
}

impl GroupDefinition {
    /// X/Y/Z as a vector with Y and Z swapped; both swapped children inverted.
    pub fn translation() -> Self {
        Self {
            usage_page: UsagePage::GENERIC_DESKTOP,
            usage_min: usage::X,
            usage_max: usage::Z,
            name: "translation".to_string(),
            display_name: Some("Translation".to_string()),
            format: StateFormat::Vector3,
            elements: vec![
                GroupElement::new("x", false),
                GroupElement::new("z", true),
                GroupElement::new("y", true),
            ],
        }
    }

    /// Rx/Ry/Rz as a vector with Ry and Rz swapped; x inverted.
    pub fn rotation() -> Self {
        Self {
            usage_page: UsagePage::GENERIC_DESKTOP,
            usage_min: usage::RX,
            usage_max: usage::RZ,
            name: "rotation".to_string(),
            display_name: Some("Rotation".to_string()),
            format: StateFormat::Vector3,
            elements: vec![
                GroupElement::new("x", true),
                GroupElement::new("z", false),
                GroupElement::new("y", false),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), LayoutBuildError> {
        let invalid = |reason: String| LayoutBuildError::InvalidGroup {
            name: self.name.clone(),
            reason,
        };
        if self.name.is_empty() || self.name.contains('/') {
            return Err(invalid("name must be non-empty and contain no '/'".into()));
        }
        if self.usage_min > self.usage_max {
            return Err(invalid(format!(
                "usage_min {:#x} exceeds usage_max {:#x}",
                self.usage_min, self.usage_max
            )));
        }
        let span = (self.usage_max - self.usage_min) as usize + 1;
        if self.elements.len() != span {
            return Err(invalid(format!(
                "{} elements for a range of {span} usages",
                self.elements.len()
            )));
        }
        if let Some(i) = self.elements.iter().position(|e| e.name.is_empty()) {
            return Err(invalid(format!("child {i} has an empty name")));
        }
        Ok(())
    }

    fn overlaps(&self, other: &GroupDefinition) -> bool {
        self.usage_page == other.usage_page
            && self.usage_min <= other.usage_max
            && other.usage_min <= self.usage_max
    }

    fn element_for(&self, e: &ReportElementDescriptor) -> Option<&GroupElement> {
        if e.usage_page != self.usage_page || e.usage < self.usage_min || e.usage > self.usage_max {
            return None;
        }
        self.elements.get((e.usage - self.usage_min) as usize)
    }

    fn composite(&self, report_id: u8) -> ClassifiedControl {
        ClassifiedControl {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            kind: ControlKind::Vector3,
            format: self.format,
            size_in_bits: 0,
            normalize: None,
            parameters: ControlParameters::default(),
            default_state: 0,
            usage_tags: Vec::new(),
            processors: Vec::new(),
            usage_page: self.usage_page,
            usage: self.usage_min,
            report_id,
            logical_min: 0,
            logical_max: 0,
        }
    }
}

/// The translation and rotation groups.
pub fn default_groups() -> Vec<GroupDefinition> {
    vec![GroupDefinition::translation(), GroupDefinition::rotation()]
}

/// Largest slot the builder accepts, report ID byte included. Far beyond any
/// real input report; keeps every bit offset within `u32`.
pub const MAX_SLOT_SIZE: u32 = 1 << 16;

/// Fixed-slot geometry of a merged buffer.
///
/// Ids are bytes, so at most 255 slots are meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotGeometry {
    /// Number of slots; equal to the highest input report id.
    pub report_count: u32,
    /// Bytes per slot, report ID byte included.
    pub report_size: u32,
}

impl SlotGeometry {
    /// Derive the geometry from a device's input elements.
    ///
    /// Saturates at `u32::MAX` bytes per slot; [`LayoutBuilder::build`]
    /// rejects such devices.
    pub fn from_elements(elements: &[ReportElementDescriptor]) -> Self {
        let bodies = report_bodies(elements);
        let report_count = bodies.keys().next_back().map_or(0, |&id| id as u32);
        let largest = bodies.values().copied().max().unwrap_or(0);
        SlotGeometry {
            report_count,
            report_size: u32::try_from(largest.saturating_add(1)).unwrap_or(u32::MAX),
        }
    }

    fn check(&self) -> Result<(), LayoutBuildError> {
        if self.report_count > u8::MAX as u32 || self.report_size > MAX_SLOT_SIZE {
            return Err(LayoutBuildError::GeometryTooLarge {
                report_count: self.report_count,
                report_size: self.report_size,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn state_size_in_bytes(&self) -> usize {
        self.report_count as usize * self.report_size as usize
    }
}

/// Body length in bytes per input report id.
///
/// The body covers every input element of the report (constant padding
/// included), rounded up to whole bytes, and at least reaches the furthest
/// element end.
fn report_bodies(elements: &[ReportElementDescriptor]) -> BTreeMap<u8, u64> {
    let mut bits: BTreeMap<u8, (u64, u64)> = BTreeMap::new();
    for e in elements.iter().filter(|e| e.report_type == ReportType::Input) {
        let entry = bits.entry(e.report_id).or_default();
        entry.0 += e.report_size_in_bits as u64;
        entry.1 = entry.1.max(e.end_bit());
    }
    bits.into_iter()
        .map(|(id, (sum, end))| (id, sum.max(end).div_ceil(8)))
        .collect()
}

/// A control placed in the merged buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutControl {
    pub control: ClassifiedControl,
    pub byte_offset: u32,
    pub bit_offset: u32,
}

impl LayoutControl {
    #[inline]
    pub fn name(&self) -> &str {
        &self.control.name
    }

    #[inline]
    pub fn global_bit_offset(&self) -> u64 {
        self.byte_offset as u64 * 8 + self.bit_offset as u64
    }

    #[inline]
    pub fn is_composite(&self) -> bool {
        self.control.kind == ControlKind::Vector3
    }
}

/// Device-type-wide layout: where every control lives in the merged buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergedStateLayout {
    display_name: String,
    geometry: SlotGeometry,
    /// Body length per report, indexed by `report_id - 1`. Zero for ids the
    /// device never sends.
    report_lengths: Vec<u32>,
    controls: Vec<LayoutControl>,
    /// Output report holding the status LED, if the device has one.
    #[serde(default)]
    status_led_report: Option<u8>,
}

impl MergedStateLayout {
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn geometry(&self) -> SlotGeometry {
        self.geometry
    }

    pub fn state_size_in_bytes(&self) -> usize {
        self.geometry.state_size_in_bytes()
    }

    pub fn controls(&self) -> &[LayoutControl] {
        &self.controls
    }

    /// Report id of the status LED output, if the device declares one.
    pub fn status_led_report(&self) -> Option<u8> {
        self.status_led_report
    }

    /// Look up a control by name, ignoring ASCII case.
    pub fn control(&self, name: &str) -> Option<&LayoutControl> {
        self.controls.iter().find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Children of a composite, in layout order.
    pub fn children<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a LayoutControl> + 'a {
        self.controls.iter().filter(move |c| {
            c.name()
                .split_once('/')
                .is_some_and(|(parent, _)| parent.eq_ignore_ascii_case(group))
        })
    }

    /// Byte range of the merged buffer a report's body is copied into.
    ///
    /// `None` for report id 0, ids past the last slot, and ids the device never
    /// declared.
    pub fn report_region(&self, report_id: u8) -> Option<Range<usize>> {
        let index = (report_id as usize).checked_sub(1)?;
        let len = *self.report_lengths.get(index)? as usize;
        if len == 0 {
            return None;
        }
        let start = index * self.geometry.report_size as usize;
        Some(start..start + len)
    }

    /// Buffer contents before any report arrives: each control's default state
    /// written at its offset, zero elsewhere.
    pub fn default_state(&self) -> Box<[u8]> {
        let mut buf = vec![0u8; self.state_size_in_bytes()].into_boxed_slice();
        for c in self.controls.iter().filter(|c| c.control.default_state != 0) {
            control::write_bits(
                &mut buf,
                c.global_bit_offset(),
                c.control.size_in_bits,
                c.control.default_state as u64,
            );
        }
        buf
    }
}

/// Builds a [`MergedStateLayout`] from a device's elements.
#[derive(Clone, Debug)]
pub struct LayoutBuilder {
    display_name: String,
    groups: Vec<GroupDefinition>,
    geometry: Option<SlotGeometry>,
}

impl LayoutBuilder {
    /// A builder with the default translation/rotation groups and derived geometry.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            groups: default_groups(),
            geometry: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_groups(mut self, groups: Vec<GroupDefinition>) -> Self {
        self.groups = groups;
        self
    }

    /// Use a fixed geometry instead of deriving one from the elements.
    pub fn with_geometry(mut self, geometry: Option<SlotGeometry>) -> Self {
        self.geometry = geometry;
        self
    }

    fn validate_groups(&self) -> Result<(), LayoutBuildError> {
        for (i, g) in self.groups.iter().enumerate() {
            g.validate()?;
            if let Some(other) = self.groups[..i].iter().find(|o| o.overlaps(g)) {
                return Err(LayoutBuildError::InvalidGroup {
                    name: g.name.clone(),
                    reason: format!("usage range overlaps group `{}`", other.name),
                });
            }
        }
        Ok(())
    }

    pub fn build(&self, elements: &[ReportElementDescriptor]) -> Result<MergedStateLayout, LayoutBuildError> {
        self.validate_groups()?;

        let geometry = self.geometry.unwrap_or_else(|| SlotGeometry::from_elements(elements));
        let bodies = report_bodies(elements);
        for (&id, &len) in &bodies {
            let required = len.saturating_add(1);
            if required > geometry.report_size.min(MAX_SLOT_SIZE) as u64 {
                return Err(LayoutBuildError::SlotOverflow {
                    report_id: id,
                    required,
                    slot_size: geometry.report_size.min(MAX_SLOT_SIZE),
                });
            }
        }
        geometry.check()?;

        // Every input element must sit in a slot it fits.
        for e in elements.iter().filter(|e| e.report_type == ReportType::Input) {
            if e.report_id == 0 || e.report_id as u32 > geometry.report_count {
                return Err(LayoutBuildError::ElementOutOfRange {
                    usage_page: e.usage_page.0,
                    usage: e.usage,
                    report_id: e.report_id,
                    report_count: geometry.report_count,
                });
            }
        }
        // Bodies fit their slots and slots are bounded, so lengths and bit
        // offsets below stay within u32.
        let mut report_lengths = vec![0u32; geometry.report_count as usize];
        for (&id, &len) in &bodies {
            report_lengths[id as usize - 1] = len as u32;
        }

        let mut controls: Vec<LayoutControl> = Vec::new();
        for e in elements {
            let Some(mut classified) = classify::classify(e) else {
                continue;
            };

            let group = self
                .groups
                .iter()
                .find_map(|g| g.element_for(e).map(|child| (g, child)));

            let base_name = match group {
                Some((g, child)) => {
                    if !controls.iter().any(|c| c.is_composite() && c.name() == g.name) {
                        controls.push(LayoutControl {
                            control: g.composite(e.report_id),
                            byte_offset: 0,
                            bit_offset: 0,
                        });
                    }
                    classified.display_name = child.display_name.clone();
                    classified.parameters = ControlParameters {
                        invert: classified.parameters.invert ^ child.parameters.invert,
                        scale_factor: child.parameters.scale_factor.or(classified.parameters.scale_factor),
                    };
                    format!("{}/{}", g.name, child.name)
                }
                None => classified.name.clone(),
            };
            classified.name = make_unique_name(&base_name, controls.iter().map(LayoutControl::name));

            let offset = e.report_offset_in_bits as u64
                + (e.report_id as u64 - 1) * geometry.report_size as u64 * 8;
            let byte_offset = u32::try_from(offset / 8).map_err(|_| LayoutBuildError::GeometryTooLarge {
                report_count: geometry.report_count,
                report_size: geometry.report_size,
            })?;
            debug!(
                control = %classified.name,
                report_id = e.report_id,
                offset,
                report_offset = e.report_offset_in_bits,
                size = e.report_size_in_bits,
                "placed control"
            );
            controls.push(LayoutControl {
                control: classified,
                byte_offset,
                bit_offset: (offset % 8) as u32,
            });
        }

        let status_led_report = elements
            .iter()
            .find(|e| {
                e.report_type == ReportType::Output
                    && e.usage_page == UsagePage::LEDS
                    && !e.flags.is_constant()
                    && e.report_id != 0
            })
            .map(|e| e.report_id);

        Ok(MergedStateLayout {
            display_name: self.display_name.clone(),
            geometry,
            report_lengths,
            controls,
            status_led_report,
        })
    }
}

/// Make `base` unique among `existing`, comparing case-insensitively.
///
/// Collisions get a numeric suffix. If `base` already ends in digits, counting
/// continues from that number: `x` -> `x1`, `x2`; `button1` -> `button2`.
pub fn make_unique_name<'a>(base: &str, existing: impl Iterator<Item = &'a str> + Clone) -> String {
    let taken = |candidate: &str| existing.clone().any(|n| n.eq_ignore_ascii_case(candidate));
    if !taken(base) {
        return base.to_string();
    }

    let stem = base.trim_end_matches(|c: char| c.is_ascii_digit());
    let mut next: u64 = match base[stem.len()..].parse::<u64>() {
        Ok(n) => n.saturating_add(1),
        Err(_) => 1,
    };
    loop {
        let candidate = format!("{stem}{next}");
        if !taken(&candidate) {
            return candidate;
        }
        next = next.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ElementFlags;

    fn input(page: UsagePage, usage: u16, id: u8, offset: u32, bits: u32, min: i32, max: i32) -> ReportElementDescriptor {
        ReportElementDescriptor {
            usage_page: page,
            usage,
            report_id: id,
            report_type: ReportType::Input,
            report_offset_in_bits: offset,
            report_size_in_bits: bits,
            logical_min: min,
            logical_max: max,
            flags: ElementFlags(ElementFlags::VARIABLE),
            ..Default::default()
        }
    }

    fn axis(usage: u16, id: u8, offset: u32) -> ReportElementDescriptor {
        input(UsagePage::GENERIC_DESKTOP, usage, id, offset, 16, -350, 350)
    }

    #[test]
    fn second_report_lands_one_slot_in() {
        let elements = [axis(usage::SLIDER, 1, 0), axis(usage::DIAL, 2, 0)];
        let layout = LayoutBuilder::new("test").build(&elements).unwrap();
        let g = layout.geometry();
        assert_eq!(g, SlotGeometry { report_count: 2, report_size: 3 });
        assert_eq!(layout.control("slider").unwrap().byte_offset, 0);
        assert_eq!(layout.control("dial").unwrap().byte_offset, g.report_size);
        assert_eq!(layout.state_size_in_bytes(), 6);
    }

    #[test]
    fn slot_is_sized_by_the_largest_report() {
        let elements = [
            axis(usage::X, 1, 0),
            axis(usage::Y, 1, 16),
            axis(usage::Z, 1, 32),
            input(UsagePage::BUTTON, 1, 3, 0, 1, 0, 1),
        ];
        let g = SlotGeometry::from_elements(&elements);
        assert_eq!(g, SlotGeometry { report_count: 3, report_size: 7 });

        let layout = LayoutBuilder::new("test").build(&elements).unwrap();
        assert_eq!(layout.report_region(1), Some(0..6));
        assert_eq!(layout.report_region(2), None);
        assert_eq!(layout.report_region(3), Some(14..15));
        assert_eq!(layout.report_region(0), None);
        assert_eq!(layout.report_region(4), None);
    }

    #[test]
    fn unique_names_count_up() {
        let mut names: Vec<String> = Vec::new();
        for _ in 0..3 {
            let n = make_unique_name("x", names.iter().map(String::as_str));
            names.push(n);
        }
        assert_eq!(names, ["x", "x1", "x2"]);
    }

    #[test]
    fn unique_names_ignore_case_and_continue_trailing_digits() {
        let existing = ["Button1", "button2"];
        assert_eq!(make_unique_name("button1", existing.iter().copied()), "button3");
        assert_eq!(make_unique_name("button7", existing.iter().copied()), "button7");
        assert_eq!(make_unique_name("BUTTON2", existing.iter().copied()), "BUTTON3");
    }

    #[test]
    fn ungrouped_duplicates_are_deduplicated() {
        let elements = [
            axis(usage::SLIDER, 1, 0),
            axis(usage::SLIDER, 2, 0),
            axis(usage::SLIDER, 3, 0),
        ];
        let layout = LayoutBuilder::new("test").build(&elements).unwrap();
        let names: Vec<_> = layout.controls().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["slider", "slider1", "slider2"]);
    }

    #[test]
    fn translation_group_reorders_and_inverts() {
        let elements = [axis(usage::X, 1, 0), axis(usage::Y, 1, 16), axis(usage::Z, 1, 32)];
        let layout = LayoutBuilder::new("test").build(&elements).unwrap();

        let names: Vec<_> = layout.controls().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["translation", "translation/x", "translation/z", "translation/y"]);

        let group = layout.control("translation").unwrap();
        assert!(group.is_composite());
        assert_eq!(group.control.size_in_bits, 0);
        assert_eq!((group.byte_offset, group.bit_offset), (0, 0));

        let z = layout.control("translation/z").unwrap();
        assert_eq!(z.control.usage, usage::Y);
        assert_eq!(z.byte_offset, 2);
        assert!(z.control.parameters.invert);
        assert_eq!(z.control.display_name.as_deref(), Some("Z"));
        assert!(layout.control("translation/y").unwrap().control.parameters.invert);
        assert!(!layout.control("translation/x").unwrap().control.parameters.invert);

        let children: Vec<_> = layout.children("translation").map(|c| c.name()).collect();
        assert_eq!(children.len(), 3);
    }

    #[test]
    fn rotation_group_inverts_x_only() {
        let elements = [axis(usage::RX, 2, 0), axis(usage::RY, 2, 16), axis(usage::RZ, 2, 32)];
        let layout = LayoutBuilder::new("test").build(&elements).unwrap();
        assert!(layout.control("rotation/x").unwrap().control.parameters.invert);
        assert!(!layout.control("rotation/z").unwrap().control.parameters.invert);
        let y = layout.control("rotation/y").unwrap();
        assert_eq!(y.control.usage, usage::RZ);
        assert!(!y.control.parameters.invert);
    }

    #[test]
    fn composite_is_added_once_even_across_reports() {
        let elements = [axis(usage::X, 1, 0), axis(usage::Y, 2, 0), axis(usage::Z, 3, 0)];
        let layout = LayoutBuilder::new("test").build(&elements).unwrap();
        let composites = layout.controls().iter().filter(|c| c.is_composite()).count();
        assert_eq!(composites, 1);
    }

    #[test]
    fn report_id_zero_is_rejected() {
        let elements = [axis(usage::X, 0, 0)];
        assert!(matches!(
            LayoutBuilder::new("test").build(&elements),
            Err(LayoutBuildError::ElementOutOfRange { report_id: 0, .. })
        ));
    }

    #[test]
    fn fixed_geometry_rejects_oversized_reports() {
        let elements = [axis(usage::X, 1, 0), axis(usage::Y, 1, 16)];
        let small = SlotGeometry { report_count: 1, report_size: 4 };
        assert!(matches!(
            LayoutBuilder::new("test").with_geometry(Some(small)).build(&elements),
            Err(LayoutBuildError::SlotOverflow { report_id: 1, required: 5, slot_size: 4 })
        ));

        let few = SlotGeometry { report_count: 1, report_size: 16 };
        let elements = [axis(usage::X, 2, 0)];
        assert!(matches!(
            LayoutBuilder::new("test").with_geometry(Some(few)).build(&elements),
            Err(LayoutBuildError::ElementOutOfRange { report_id: 2, report_count: 1, .. })
        ));
    }

    #[test]
    fn huge_reports_are_rejected_instead_of_truncated() {
        let mut wide = input(UsagePage::BUTTON, 1, 1, 0, 1, 0, 1);
        wide.report_size_in_bits = 1 << 31;
        let elements = [wide, input(UsagePage::BUTTON, 2, 20, 0, 1, 0, 1)];
        assert!(matches!(
            LayoutBuilder::new("test").build(&elements),
            Err(LayoutBuildError::SlotOverflow {
                report_id: 1,
                required: 268_435_457,
                slot_size: MAX_SLOT_SIZE,
            })
        ));

        let g = SlotGeometry::from_elements(&elements);
        assert_eq!(g.report_size, 268_435_457);
    }

    #[test]
    fn oversized_fixed_geometry_is_rejected() {
        let elements = [axis(usage::X, 1, 0)];
        let huge = SlotGeometry { report_count: 1, report_size: MAX_SLOT_SIZE + 1 };
        assert!(matches!(
            LayoutBuilder::new("test").with_geometry(Some(huge)).build(&elements),
            Err(LayoutBuildError::GeometryTooLarge { .. })
        ));
        let many = SlotGeometry { report_count: 256, report_size: 8 };
        assert!(matches!(
            LayoutBuilder::new("test").with_geometry(Some(many)).build(&elements),
            Err(LayoutBuildError::GeometryTooLarge { report_count: 256, .. })
        ));
    }

    #[test]
    fn largest_accepted_layout_keeps_exact_offsets() {
        // 255 slots of the maximum size; the last control sits past 16 MiB.
        let mut last = input(UsagePage::BUTTON, 1, 255, 0, 1, 0, 1);
        last.report_offset_in_bits = (MAX_SLOT_SIZE - 1) * 8 - 1;
        let layout = LayoutBuilder::new("test").build(&[last.clone()]).unwrap();
        let c = layout.control("button1").unwrap();
        let expected = 254 * MAX_SLOT_SIZE as u64 * 8 + last.report_offset_in_bits as u64;
        assert_eq!(c.global_bit_offset(), expected);
        assert_eq!(layout.state_size_in_bytes(), 255 * MAX_SLOT_SIZE as usize);
    }

    #[test]
    fn led_output_report_is_recorded() {
        let mut led = input(UsagePage::LEDS, 0x4B, 4, 0, 1, 0, 1);
        led.report_type = ReportType::Output;
        let elements = [axis(usage::X, 1, 0), led];
        let layout = LayoutBuilder::new("test").build(&elements).unwrap();
        assert_eq!(layout.status_led_report(), Some(4));
        assert_eq!(layout.geometry().report_count, 1);

        let layout = LayoutBuilder::new("test").build(&elements[..1]).unwrap();
        assert_eq!(layout.status_led_report(), None);
    }

    #[test]
    fn overlapping_groups_are_rejected() {
        let mut wide = GroupDefinition::translation();
        wide.name = "wide".into();
        wide.usage_max = usage::RX;
        wide.elements.push(GroupElement::new("w", false));
        let builder = LayoutBuilder::new("test").with_groups(vec![GroupDefinition::rotation(), wide]);
        assert!(matches!(builder.build(&[]), Err(LayoutBuildError::InvalidGroup { .. })));
    }

    #[test]
    fn group_with_wrong_child_count_is_rejected() {
        let mut g = GroupDefinition::translation();
        g.elements.pop();
        assert!(g.validate().is_err());
    }

    #[test]
    fn non_input_and_padding_do_not_become_controls() {
        let mut pad = input(UsagePage::BUTTON, 0, 1, 2, 6, 0, 0);
        pad.flags = ElementFlags(ElementFlags::CONSTANT);
        let mut feature = axis(usage::X, 1, 0);
        feature.report_type = ReportType::Feature;
        let elements = [
            input(UsagePage::BUTTON, 1, 1, 0, 1, 0, 1),
            input(UsagePage::BUTTON, 2, 1, 1, 1, 0, 1),
            pad,
            feature,
        ];
        let layout = LayoutBuilder::new("test").build(&elements).unwrap();
        let names: Vec<_> = layout.controls().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["button1", "button2"]);
        assert_eq!(layout.report_region(1), Some(0..1));
    }

    #[test]
    fn default_state_is_written_at_control_offsets() {
        let mut hat = input(UsagePage::GENERIC_DESKTOP, usage::HAT_SWITCH, 2, 0, 4, 0, 7);
        hat.flags = ElementFlags(ElementFlags::VARIABLE | ElementFlags::NULL_STATE);
        let elements = [input(UsagePage::GENERIC_DESKTOP, usage::SLIDER, 1, 0, 8, 0, 255), hat];
        let layout = LayoutBuilder::new("test").build(&elements).unwrap();
        assert_eq!(layout.geometry().report_size, 2);
        assert_eq!(&*layout.default_state(), &[127, 0, 8, 0]);
    }

    #[test]
    fn no_storage_overlap_between_leaf_controls() {
        let elements = [
            axis(usage::X, 1, 0),
            axis(usage::Y, 1, 16),
            axis(usage::Z, 1, 32),
            axis(usage::RX, 2, 0),
            axis(usage::RY, 2, 16),
            axis(usage::RZ, 2, 32),
            input(UsagePage::BUTTON, 1, 3, 0, 1, 0, 1),
            input(UsagePage::BUTTON, 2, 3, 1, 1, 0, 1),
        ];
        let layout = LayoutBuilder::new("test").build(&elements).unwrap();
        let mut ranges: Vec<_> = layout
            .controls()
            .iter()
            .filter(|c| !c.is_composite())
            .map(|c| (c.global_bit_offset(), c.global_bit_offset() + c.control.size_in_bits as u64))
            .collect();
        ranges.sort();
        for w in ranges.windows(2) {
            assert!(w[0].1 <= w[1].0, "{:?} overlaps {:?}", w[0], w[1]);
        }
        let end = ranges.last().unwrap().1;
        assert!(end <= layout.state_size_in_bytes() as u64 * 8);
    }
}
