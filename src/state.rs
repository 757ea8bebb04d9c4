//! Merged device state.
//!
//! [`StateMergeEngine`] owns the write side of one device's merged buffer and
//! patches it report by report. [`StateReader`] is the cheap, cloneable read
//! side handed to consumers.
//!
//! ## Lifecycle
//! - **Uninitialized**: buffer holds every control's default state.
//! - **Live**: at least one report has been applied since creation or
//!   [`reset`](StateMergeEngine::reset).
//!
//! - **Disconnected**: the engine was dropped (device removed or replaced).
//!   The buffer is freed with it; readers see neutral values from then on.
//!
//! ## Concurrency
//! One writer, many readers. Each report is patched in place under the write
//! lock; each control (or whole vector) is decoded under one read lock, so a
//! single read never observes half of a report.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::control::{self, DecodeSettings, DpadDirection, Vec3};
use crate::event::{RawReportEvent, HID_FORMAT};
use crate::layout::MergedStateLayout;
use crate::snapshot::{self, StateSnapshot};

/// Whether any report has landed yet, or the device is gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatePhase {
    Uninitialized,
    Live,
    Disconnected,
}

/// What [`StateMergeEngine::apply_report`] did with an event.
///
/// Purely informational; none of these is an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Body copied into the report's slot.
    Applied { report_id: u8, bytes: usize },
    IgnoredDelta,
    IgnoredFormat,
    /// No bytes at all, not even a report ID.
    Empty,
    /// Report ID the layout does not know.
    UnknownReport { report_id: u8 },
}

impl ReportOutcome {
    #[inline]
    pub fn is_applied(&self) -> bool {
        matches!(self, ReportOutcome::Applied { .. })
    }
}

#[derive(Debug)]
struct Inner {
    bytes: Box<[u8]>,
    phase: StatePhase,
    reports_applied: u64,
}

/// Live buffer of one device plus its layout.
#[derive(Debug)]
pub struct DeviceState {
    layout: Arc<MergedStateLayout>,
    inner: RwLock<Inner>,
}

impl DeviceState {
    fn new(layout: Arc<MergedStateLayout>) -> Self {
        let bytes = layout.default_state();
        Self {
            layout,
            inner: RwLock::new(Inner {
                bytes,
                phase: StatePhase::Uninitialized,
                reports_applied: 0,
            }),
        }
    }

    pub fn layout(&self) -> &Arc<MergedStateLayout> {
        &self.layout
    }
}

/// Single writer for a device's merged state.
///
/// Holds the only strong reference to the buffer.
#[derive(Debug)]
pub struct StateMergeEngine {
    state: Arc<DeviceState>,
    settings: DecodeSettings,
    log_unknown_reports: bool,
}

impl StateMergeEngine {
    /// New engine with the buffer at its default state.
    pub fn new(layout: Arc<MergedStateLayout>) -> Self {
        Self {
            state: Arc::new(DeviceState::new(layout)),
            settings: DecodeSettings::default(),
            log_unknown_reports: false,
        }
    }

    /// Decode settings handed to readers created after this call.
    pub fn with_settings(mut self, settings: DecodeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Trace reports whose ID the layout does not declare.
    pub fn with_unknown_report_logging(mut self, enabled: bool) -> Self {
        self.log_unknown_reports = enabled;
        self
    }

    pub fn layout(&self) -> &Arc<MergedStateLayout> {
        &self.state.layout
    }

    /// A read handle onto this engine's state.
    pub fn reader(&self) -> StateReader {
        StateReader {
            layout: Arc::clone(&self.state.layout),
            state: Arc::downgrade(&self.state),
            settings: self.settings,
        }
    }

    /// Patch the merged buffer with one report.
    ///
    /// The body is copied to the report's slot, truncated to the length the
    /// descriptor declares for it. Slot padding and other reports' bytes are
    /// never touched.
    pub fn apply_report(&mut self, event: &RawReportEvent<'_>) -> ReportOutcome {
        if event.is_delta {
            return ReportOutcome::IgnoredDelta;
        }
        if event.format != HID_FORMAT {
            return ReportOutcome::IgnoredFormat;
        }
        let Some(report_id) = event.report_id() else {
            return ReportOutcome::Empty;
        };
        let Some(region) = self.state.layout.report_region(report_id) else {
            if self.log_unknown_reports {
                trace!(report_id, len = event.data.len(), "ignoring undeclared report");
            }
            return ReportOutcome::UnknownReport { report_id };
        };

        let body = event.body();
        let len = body.len().min(region.len());
        let mut inner = self.state.inner.write();
        inner.bytes[region.start..region.start + len].copy_from_slice(&body[..len]);
        inner.phase = StatePhase::Live;
        inner.reports_applied += 1;
        drop(inner);

        trace!(report_id, bytes = len, "applied report");
        ReportOutcome::Applied { report_id, bytes: len }
    }

    /// Back to the default state, as if no report had arrived.
    pub fn reset(&mut self) {
        let defaults = self.state.layout.default_state();
        let mut inner = self.state.inner.write();
        inner.bytes = defaults;
        inner.phase = StatePhase::Uninitialized;
        inner.reports_applied = 0;
    }
}

/// Cloneable, read-only view of a device's merged state.
///
/// Unknown control names read as the neutral value, and so does every control
/// once the engine is gone.
#[derive(Clone, Debug)]
pub struct StateReader {
    layout: Arc<MergedStateLayout>,
    state: Weak<DeviceState>,
    settings: DecodeSettings,
}

impl StateReader {
    pub fn layout(&self) -> &MergedStateLayout {
        &self.layout
    }

    /// False once the device was disconnected or replaced.
    pub fn is_connected(&self) -> bool {
        self.state.strong_count() > 0
    }

    pub fn phase(&self) -> StatePhase {
        match self.state.upgrade() {
            Some(state) => state.inner.read().phase,
            None => StatePhase::Disconnected,
        }
    }

    pub fn reports_applied(&self) -> u64 {
        self.state.upgrade().map_or(0, |state| state.inner.read().reports_applied)
    }

    pub fn read_axis(&self, name: &str) -> f32 {
        let Some(c) = self.layout.control(name) else {
            return 0.0;
        };
        let Some(state) = self.state.upgrade() else {
            return 0.0;
        };
        let inner = state.inner.read();
        control::read_axis(&inner.bytes, c, &self.settings)
    }

    /// All three components under one lock.
    pub fn read_vector3(&self, name: &str) -> Vec3 {
        let Some(state) = self.state.upgrade() else {
            return Vec3::ZERO;
        };
        let inner = state.inner.read();
        snapshot::decode_vector3(&self.layout, &inner.bytes, name, &self.settings)
    }

    pub fn read_button(&self, name: &str) -> bool {
        let Some(c) = self.layout.control(name) else {
            return false;
        };
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let inner = state.inner.read();
        control::is_pressed(&inner.bytes, c, self.settings.press_point)
    }

    pub fn read_dpad(&self, name: &str) -> Option<DpadDirection> {
        let c = self.layout.control(name)?;
        let state = self.state.upgrade()?;
        let inner = state.inner.read();
        control::read_dpad(&inner.bytes, c)
    }

    /// Stored integer, sign-extended for signed fields.
    pub fn read_raw(&self, name: &str) -> Option<i64> {
        let c = self.layout.control(name)?;
        if c.is_composite() {
            return None;
        }
        let state = self.state.upgrade()?;
        let inner = state.inner.read();
        Some(control::read_raw(&inner.bytes, c))
    }

    /// Copy of the whole buffer, or `None` after disconnect.
    pub fn snapshot(&self) -> Option<StateSnapshot> {
        let state = self.state.upgrade()?;
        let inner = state.inner.read();
        Some(StateSnapshot::new(
            Arc::clone(&self.layout),
            self.settings,
            inner.bytes.clone(),
            inner.phase,
            inner.reports_applied,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ElementFlags, ReportElementDescriptor, ReportType, UsagePage};
    use crate::event::FourCC;
    use crate::layout::LayoutBuilder;
    use crate::usage;

    fn element(page: UsagePage, usage: u16, id: u8, offset: u32, bits: u32, min: i32, max: i32) -> ReportElementDescriptor {
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

    /// Report 1: two 16-bit axes. Report 2: one 8-bit unsigned slider.
    fn engine() -> StateMergeEngine {
        let elements = [
            element(UsagePage::GENERIC_DESKTOP, usage::X, 1, 0, 16, -350, 350),
            element(UsagePage::GENERIC_DESKTOP, usage::Y, 1, 16, 16, -350, 350),
            element(UsagePage::GENERIC_DESKTOP, usage::SLIDER, 2, 0, 8, 0, 254),
        ];
        let layout = LayoutBuilder::new("test").build(&elements).unwrap();
        StateMergeEngine::new(Arc::new(layout))
    }

    #[test]
    fn defaults_before_the_first_report() {
        let e = engine();
        let r = e.reader();
        assert_eq!(r.phase(), StatePhase::Uninitialized);
        assert_eq!(r.read_raw("slider"), Some(127));
        assert_eq!(r.read_raw("translation/x"), Some(0));
        assert_eq!(r.read_raw("translation"), None);
    }

    #[test]
    fn reports_merge_without_clobbering_each_other() {
        let mut e = engine();
        let r = e.reader();
        let out = e.apply_report(&RawReportEvent::hid(&[1, 0x5E, 0x01, 0xA2, 0xFE]));
        assert_eq!(out, ReportOutcome::Applied { report_id: 1, bytes: 4 });
        assert_eq!(r.read_raw("translation/x"), Some(350));
        assert_eq!(r.read_raw("translation/z"), Some(-350));

        e.apply_report(&RawReportEvent::hid(&[2, 200]));
        assert_eq!(r.read_raw("slider"), Some(200));
        assert_eq!(r.read_raw("translation/x"), Some(350));
        assert_eq!(r.phase(), StatePhase::Live);
        assert_eq!(r.reports_applied(), 2);
    }

    #[test]
    fn long_reports_are_truncated_to_the_declared_length() {
        let mut e = engine();
        let slot = e.layout().geometry().report_size as usize;
        let out = e.apply_report(&RawReportEvent::hid(&[2, 9, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]));
        assert_eq!(out, ReportOutcome::Applied { report_id: 2, bytes: 1 });
        let snap = e.reader().snapshot().unwrap();
        assert_eq!(snap.bytes()[slot], 9);
        assert!(snap.bytes()[slot + 1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn short_reports_patch_only_what_they_carry() {
        let mut e = engine();
        e.apply_report(&RawReportEvent::hid(&[1, 1, 0, 2, 0]));
        e.apply_report(&RawReportEvent::hid(&[1, 5]));
        let r = e.reader();
        assert_eq!(r.read_raw("translation/x"), Some(5));
        assert_eq!(r.read_raw("translation/z"), Some(2));
    }

    #[test]
    fn ignored_events_leave_state_untouched() {
        let mut e = engine();
        let before = e.reader().snapshot().unwrap().into_bytes();

        let delta = RawReportEvent {
            is_delta: true,
            ..RawReportEvent::hid(&[1, 0xFF, 0xFF])
        };
        assert_eq!(e.apply_report(&delta), ReportOutcome::IgnoredDelta);

        let foreign = RawReportEvent {
            format: FourCC::new(b"XINP"),
            ..RawReportEvent::hid(&[1, 0xFF, 0xFF])
        };
        assert_eq!(e.apply_report(&foreign), ReportOutcome::IgnoredFormat);
        assert_eq!(e.apply_report(&RawReportEvent::hid(&[])), ReportOutcome::Empty);
        assert_eq!(
            e.apply_report(&RawReportEvent::hid(&[7, 0xFF])),
            ReportOutcome::UnknownReport { report_id: 7 }
        );
        assert_eq!(
            e.apply_report(&RawReportEvent::hid(&[0, 0xFF])),
            ReportOutcome::UnknownReport { report_id: 0 }
        );

        let r = e.reader();
        assert_eq!(r.snapshot().unwrap().bytes(), &*before);
        assert_eq!(r.phase(), StatePhase::Uninitialized);
        assert_eq!(r.reports_applied(), 0);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut e = engine();
        e.apply_report(&RawReportEvent::hid(&[2, 3]));
        e.reset();
        let r = e.reader();
        assert_eq!(r.read_raw("slider"), Some(127));
        assert_eq!(r.phase(), StatePhase::Uninitialized);
    }

    #[test]
    fn vector_reads_apply_group_inversion() {
        let settings = DecodeSettings {
            deadzone: control::AxisDeadzone { min: 0.0, max: 1.0 },
            ..Default::default()
        };
        let mut e = engine().with_settings(settings);
        // x = +350, y-usage = +350 (exposed as inverted z)
        e.apply_report(&RawReportEvent::hid(&[1, 0x5E, 0x01, 0x5E, 0x01]));
        let v = e.reader().read_vector3("translation");
        assert_eq!(v.x, 1.0);
        assert_eq!(v.z, -1.0);
        assert_eq!(v.y, 0.0);
        assert_eq!(e.reader().read_axis("translation/z"), -1.0);
    }

    #[test]
    fn readers_go_neutral_once_the_engine_drops() {
        let settings = DecodeSettings {
            deadzone: control::AxisDeadzone { min: 0.0, max: 1.0 },
            ..Default::default()
        };
        let mut e = engine().with_settings(settings);
        e.apply_report(&RawReportEvent::hid(&[1, 0x5E, 0x01, 0x5E, 0x01]));
        e.apply_report(&RawReportEvent::hid(&[2, 42]));
        let r = e.reader();
        assert!(r.is_connected());
        assert_eq!(r.read_vector3("translation").x, 1.0);

        drop(e);
        assert!(!r.is_connected());
        assert_eq!(r.phase(), StatePhase::Disconnected);
        assert_eq!(r.reports_applied(), 0);
        assert_eq!(r.read_raw("slider"), None);
        assert_eq!(r.read_axis("translation/x"), 0.0);
        assert_eq!(r.read_vector3("translation"), Vec3::ZERO);
        assert!(r.snapshot().is_none());
        // the layout stays readable
        assert!(r.layout().control("slider").is_some());
    }
}
