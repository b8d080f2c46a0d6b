//! Contracts with the surrounding UI
//!
//! The pipeline never renders anything itself. It reports status through a
//! [`NotificationSink`] and hands accepted codes to a [`CompletionTarget`].

use crate::carrier::{self, CarrierMatch};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A scan completed
    Success,
    /// A degraded mode is active
    Warning,
    /// The scan could not start or continue
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        })
    }
}

/// Displays status messages; the implementation handles auto-dismissal
pub trait NotificationSink: Send + Sync {
    /// Show a message
    fn notify(&self, message: &str, kind: NotificationKind);
}

/// Receives the result of a completed scan
pub trait CompletionTarget: Send + Sync {
    /// Write the decoded code into the tracking-code field
    fn set_tracking_code(&self, code: &str);

    /// Show the classified carrier next to the field
    fn show_carrier(&self, carrier: &CarrierMatch);

    /// Move focus to the next input
    fn focus_next(&self);
}

/// What caused a manual-entry classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryTrigger {
    /// The field lost focus
    Blur,
    /// The operator pressed Enter
    Submit,
}

/// Classifies typed tracking codes, independent of any scan session
#[derive(Clone)]
pub struct ManualEntry {
    target: Arc<dyn CompletionTarget>,
}

impl ManualEntry {
    /// Create a handler writing to `target`
    pub fn new(target: Arc<dyn CompletionTarget>) -> Self {
        Self { target }
    }

    /// Classify `text` and show the carrier; blank input is ignored
    pub fn handle(&self, text: &str, _trigger: EntryTrigger) -> Option<CarrierMatch> {
        let code = text.trim();
        if code.is_empty() {
            return None;
        }

        let matched = carrier::detect(code);

        #[cfg(feature = "logging")]
        debug!("Manual entry ({:?}) classified as {}", _trigger, matched.carrier.name);

        self.target.show_carrier(&matched);
        Some(matched)
    }
}
