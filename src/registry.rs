//! Device registry.
//!
//! [`DeviceRegistry`] is the explicit replacement for a process-wide "current
//! device" singleton. The host calls [`connect`](DeviceRegistry::connect) when a
//! device appears and [`disconnect`](DeviceRegistry::disconnect) when it goes
//! away, and routes every input report through
//! [`apply_report`](DeviceRegistry::apply_report).
//!
//! Layouts are built once per `(vendor_id, product_id)` and shared by every
//! connected unit of that model.
//!
//! Disconnecting (or reconnecting under the same id) drops the device's state;
//! readers handed out earlier read neutral values from then on.
//!
//! ## Status LED
//! A device that becomes current gets its LED switched on; a disconnected one
//! gets it switched off. The registry does not own devices, so these switches
//! are queued as [`LedCommand`]s and written by
//! [`flush_leds`](DeviceRegistry::flush_leds).
//!
//! # Example
//! ```
//! use spacenav_hid::backends::virtual_input::VirtualSpaceMouse;
//! use spacenav_hid::{Device, DeviceRegistry, RawReportEvent};
//!
//! let mut registry = DeviceRegistry::new();
//! let mut mouse = VirtualSpaceMouse::new("virtual:0");
//! let reader = registry
//!     .connect(mouse.id(), mouse.description(), &mouse)
//!     .unwrap();
//!
//! mouse.set_translation(350, 0, 0);
//! for report in mouse.poll() {
//!     registry.apply_report(mouse.id(), &RawReportEvent::hid(&report));
//! }
//! assert_eq!(reader.read_raw("translation/x"), Some(350));
//! assert_eq!(registry.current().map(|(id, _)| id.as_str()), Some("virtual:0"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::control::DecodeSettings;
use crate::descriptor::DescriptorParseError;
use crate::device::{DescriptorReader, Device, LedStatus, OutputError};
use crate::event::RawReportEvent;
use crate::layout::{LayoutBuildError, LayoutBuilder, MergedStateLayout};
use crate::matcher::{self, DeviceMatcher};
use crate::metadata::DeviceDescription;
use crate::state::{ReportOutcome, StateMergeEngine, StateReader};

/// Host-assigned device identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId(s)
    }
}

/// Why a device was not taken on.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("device is not a supported 3D mouse")]
    NotMatched,
    #[error(transparent)]
    Descriptor(#[from] DescriptorParseError),
    #[error(transparent)]
    Layout(#[from] LayoutBuildError),
}

/// A pending LED switch for one device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedCommand {
    pub device: DeviceId,
    pub report_id: u8,
    pub status: LedStatus,
}

type LayoutKey = (u16, u16);

struct Entry {
    description: DeviceDescription,
    engine: StateMergeEngine,
}

/// Connected devices, their engines, and the shared layout cache.
pub struct DeviceRegistry {
    matchers: Vec<DeviceMatcher>,
    builder_template: LayoutBuilder,
    settings: DecodeSettings,
    log_unknown_reports: bool,
    layouts: HashMap<LayoutKey, Arc<MergedStateLayout>>,
    devices: HashMap<DeviceId, Entry>,
    current: Option<DeviceId>,
    led_commands: Vec<LedCommand>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    /// Registry with the built-in matchers, groups and decode settings.
    pub fn new() -> Self {
        Self {
            matchers: matcher::default_matchers(),
            builder_template: LayoutBuilder::new(""),
            settings: DecodeSettings::default(),
            log_unknown_reports: false,
            layouts: HashMap::new(),
            devices: HashMap::new(),
            current: None,
            led_commands: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            matchers: config.device_matchers()?,
            builder_template: config.layout_builder(""),
            settings: config.decode_settings(),
            log_unknown_reports: config.log_unknown_reports,
            ..Self::new()
        })
    }

    /// Recognize a device and start tracking its state.
    ///
    /// Reconnecting an id that is already registered replaces its state.
    pub fn connect(
        &mut self,
        id: impl Into<DeviceId>,
        description: &DeviceDescription,
        reader: &dyn DescriptorReader,
    ) -> Result<StateReader, RecognitionError> {
        let id = id.into();
        if !matcher::shallow_pass(&self.matchers, description) {
            debug!(device = %description, "rejected by shallow pass");
            return Err(RecognitionError::NotMatched);
        }

        let cached = self
            .layout_key(description)
            .and_then(|k| self.layouts.get(&k).cloned());
        let layout = match cached {
            Some(layout) => layout,
            None => self.build_layout(description, reader)?,
        };

        let engine = StateMergeEngine::new(layout)
            .with_settings(self.settings)
            .with_unknown_report_logging(self.log_unknown_reports);
        let state = engine.reader();

        info!(device = %description, %id, "device connected");
        if self.current.as_ref() == Some(&id) {
            self.current = None;
        }
        self.devices.insert(
            id,
            Entry {
                description: description.clone(),
                engine,
            },
        );
        Ok(state)
    }

    fn layout_key(&self, d: &DeviceDescription) -> Option<LayoutKey> {
        Some((d.effective_vendor_id()?, d.effective_product_id()?))
    }

    fn build_layout(
        &mut self,
        description: &DeviceDescription,
        reader: &dyn DescriptorReader,
    ) -> Result<Arc<MergedStateLayout>, RecognitionError> {
        let elements = matcher::deep_pass(description, reader).map_err(|e| {
            warn!(device = %description, error = %e, "could not read HID descriptor");
            e
        })?;

        let builder = self
            .builder_template
            .clone()
            .with_display_name(description.display_name());
        let layout = builder.build(&elements).map_err(|e| {
            warn!(device = %description, error = %e, "device reports its state in an unsupported format");
            e
        })?;

        debug!(
            device = %description,
            controls = layout.controls().len(),
            state_size = layout.state_size_in_bytes(),
            "layout built"
        );
        let layout = Arc::new(layout);
        if let Some(key) = self.layout_key(description) {
            self.layouts.insert(key, Arc::clone(&layout));
        }
        Ok(layout)
    }

    /// Stop tracking a device. Returns `false` if it was not registered.
    pub fn disconnect(&mut self, id: &str) -> bool {
        let Some(entry) = self.devices.remove(&DeviceId::from(id)) else {
            return false;
        };
        if self.current.as_ref().is_some_and(|c| c.as_str() == id) {
            self.current = None;
        }
        info!(device = %entry.description, %id, "device disconnected");
        self.queue_led(DeviceId::from(id), &entry.engine, LedStatus::Off);
        true
    }

    /// Disconnect every device, switching all LEDs off.
    pub fn disconnect_all(&mut self) {
        let ids: Vec<DeviceId> = self.devices.keys().cloned().collect();
        for id in ids {
            self.disconnect(id.as_str());
        }
    }

    fn queue_led(&mut self, device: DeviceId, engine: &StateMergeEngine, status: LedStatus) {
        if let Some(report_id) = engine.layout().status_led_report() {
            self.led_commands.push(LedCommand {
                device,
                report_id,
                status,
            });
        }
    }

    /// Drain the queued LED switches.
    pub fn take_led_commands(&mut self) -> Vec<LedCommand> {
        std::mem::take(&mut self.led_commands)
    }

    /// Write the queued LED switches to the matching devices.
    ///
    /// Commands for devices not in `devices` are dropped. Write failures are
    /// logged; devices without an output path are skipped silently.
    pub fn flush_leds<D: Device>(&mut self, devices: &mut [D]) {
        for cmd in self.take_led_commands() {
            let Some(dev) = devices.iter_mut().find(|d| d.id() == cmd.device.as_str()) else {
                continue;
            };
            match dev.set_led(cmd.report_id, cmd.status) {
                Ok(()) => debug!(device = %cmd.device, status = ?cmd.status, "LED switched"),
                Err(OutputError::Unsupported) => {}
                Err(e) => warn!(device = %cmd.device, error = %e, "could not switch LED"),
            }
        }
    }

    /// Route one report to its device. Unknown ids are ignored.
    ///
    /// A device becomes current when one of its reports is applied.
    pub fn apply_report(&mut self, id: &str, event: &RawReportEvent<'_>) -> Option<ReportOutcome> {
        let key = DeviceId::from(id);
        let entry = self.devices.get_mut(&key)?;
        let outcome = entry.engine.apply_report(event);
        if outcome.is_applied() && self.current.as_ref() != Some(&key) {
            if let Some(report_id) = entry.engine.layout().status_led_report() {
                self.led_commands.push(LedCommand {
                    device: key.clone(),
                    report_id,
                    status: LedStatus::On,
                });
            }
            debug!(device = %key, "device became current");
            self.current = Some(key);
        }
        Some(outcome)
    }

    /// The device that most recently delivered a report.
    pub fn current(&self) -> Option<(&DeviceId, StateReader)> {
        let id = self.current.as_ref()?;
        let entry = self.devices.get(id)?;
        Some((id, entry.engine.reader()))
    }

    pub fn reader(&self, id: &str) -> Option<StateReader> {
        self.devices.get(&DeviceId::from(id)).map(|e| e.engine.reader())
    }

    /// Reset a device to its default state.
    pub fn reset(&mut self, id: &str) -> bool {
        match self.devices.get_mut(&DeviceId::from(id)) {
            Some(entry) => {
                entry.engine.reset();
                true
            }
            None => false,
        }
    }

    pub fn devices(&self) -> impl Iterator<Item = (&DeviceId, &DeviceDescription)> {
        self.devices.iter().map(|(id, e)| (id, &e.description))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Number of distinct device models with a cached layout.
    pub fn cached_layouts(&self) -> usize {
        self.layouts.len()
    }
}
