//! Point-in-time copy of a device's merged state.
//!
//! [`StateSnapshot`] is an **owned**, read-only copy of the merged buffer taken
//! under a single read lock, together with the layout it was decoded against.
//! It is produced by [`StateReader::snapshot`](crate::state::StateReader::snapshot)
//! and is cheap enough to clone for per-frame fan-out.
//!
//! # Semantics
//! - All controls read from one consistent buffer; no report lands mid-read.
//! - A snapshot is **immutable**. To refresh, take a new one.
//! - Lookups by unknown name return the neutral value (`0.0`, `false`, `None`).
//!
//! # Examples
//! ```no_run
//! use spacenav_hid::StateSnapshot;
//!
//! fn print_motion(snap: &StateSnapshot) {
//!     let t = snap.vector3("translation");
//!     let r = snap.vector3("rotation");
//!     println!("t=({:.2},{:.2},{:.2}) r=({:.2},{:.2},{:.2}) b1={}",
//!              t.x, t.y, t.z, r.x, r.y, r.z, snap.button("button1"));
//! }
//! ```

use std::sync::Arc;

use crate::control::{self, DecodeSettings, DpadDirection, Vec3};
use crate::layout::MergedStateLayout;
use crate::state::StatePhase;

/// Owned copy of one device's merged state.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    layout: Arc<MergedStateLayout>,
    settings: DecodeSettings,
    bytes: Box<[u8]>,
    phase: StatePhase,
    reports_applied: u64,
}

impl StateSnapshot {
    pub(crate) fn new(
        layout: Arc<MergedStateLayout>,
        settings: DecodeSettings,
        bytes: Box<[u8]>,
        phase: StatePhase,
        reports_applied: u64,
    ) -> Self {
        Self {
            layout,
            settings,
            bytes,
            phase,
            reports_applied,
        }
    }

    /// Raw merged bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn layout(&self) -> &MergedStateLayout {
        &self.layout
    }

    #[inline]
    pub fn phase(&self) -> StatePhase {
        self.phase
    }

    #[inline]
    pub fn reports_applied(&self) -> u64 {
        self.reports_applied
    }

    pub fn axis(&self, name: &str) -> f32 {
        self.layout
            .control(name)
            .map_or(0.0, |c| control::read_axis(&self.bytes, c, &self.settings))
    }

    pub fn button(&self, name: &str) -> bool {
        self.layout
            .control(name)
            .is_some_and(|c| control::is_pressed(&self.bytes, c, self.settings.press_point))
    }

    pub fn dpad(&self, name: &str) -> Option<DpadDirection> {
        self.layout.control(name).and_then(|c| control::read_dpad(&self.bytes, c))
    }

    pub fn vector3(&self, name: &str) -> Vec3 {
        decode_vector3(&self.layout, &self.bytes, name, &self.settings)
    }

    /// Consume the snapshot and return the merged bytes.
    #[inline]
    pub fn into_bytes(self) -> Box<[u8]> {
        self.bytes
    }
}

/// Decode a vector composite from its `name/x`, `name/y`, `name/z` children.
/// Missing children read as `0.0`.
pub(crate) fn decode_vector3(
    layout: &MergedStateLayout,
    bytes: &[u8],
    name: &str,
    settings: &DecodeSettings,
) -> Vec3 {
    let mut v = Vec3::ZERO;
    for child in layout.children(name) {
        let value = control::read_axis(bytes, child, settings);
        match child.name().rsplit('/').next() {
            Some(axis) if axis.eq_ignore_ascii_case("x") => v.x = value,
            Some(axis) if axis.eq_ignore_ascii_case("y") => v.y = value,
            Some(axis) if axis.eq_ignore_ascii_case("z") => v.z = value,
            _ => {}
        }
    }
    v
}
