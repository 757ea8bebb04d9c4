//! Device backends.
//!
//! Implementations of [`Device`](crate::device::Device) that feed raw reports
//! into the merge engine.
//!
//! # Feature flags
//! - **`hid`** (default): hidapi-backed devices ([`hid`]).
//!
//! [`virtual_input`] is always available and needs no hardware.

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;

pub mod virtual_input;
