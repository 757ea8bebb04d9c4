//! spacenav-hid: HID decoding for 3Dconnexion SpaceNavigator / SpaceMouse devices.
//!
//! A SpaceMouse reports translation, rotation and buttons in separate HID input
//! reports, each on its own cadence. This crate turns the device's report
//! descriptor into a **merged state layout** ahead of time and then patches one
//! persistent buffer report by report, so consumers always read a complete,
//! consistent state.
//!
//! Pipeline:
//! 1. [`descriptor`] parses a binary or JSON descriptor into elements.
//! 2. [`classify`] derives a control (kind, name, format, normalization) per element.
//! 3. [`layout`] places every control in a fixed-slot merged buffer and groups
//!    X/Y/Z and Rx/Ry/Rz into `translation` / `rotation` vectors.
//! 4. [`state`] merges incoming reports and decodes named controls.
//!
//! [`DeviceRegistry`] ties matching, layout caching and per-device engines together.

pub mod backends;
pub mod classify;
pub mod config;
pub mod control;
pub mod descriptor;
pub mod device;
pub mod event;
pub mod layout;
pub mod matcher;
pub mod metadata;
pub mod number;
pub mod registry;
pub mod snapshot;
pub mod state;
pub mod usage;

pub use config::{Config, ConfigError};
pub use control::{DpadDirection, Vec3};
pub use descriptor::{DescriptorParseError, DescriptorSource, ReportElementDescriptor};
pub use device::{DescriptorReader, Device, LedStatus, OutputError, RawDescriptor};
pub use event::{FourCC, RawReportEvent, HID_FORMAT};
pub use layout::{LayoutBuildError, LayoutBuilder, MergedStateLayout};
pub use metadata::DeviceDescription;
pub use registry::{DeviceId, DeviceRegistry, LedCommand, RecognitionError};
pub use snapshot::StateSnapshot;
pub use state::{ReportOutcome, StateMergeEngine, StatePhase, StateReader};
