// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Drivers that ship with the crate.  Real GPU backends implement [`crate::Driver`]
//! out of tree.

pub mod nop;
pub mod recording;
pub mod software;

pub use nop::NopDriver;
pub use recording::{Call, CallLog, RecordingDriver};
pub use software::{SoftwareDriver, SoftwareStats};
