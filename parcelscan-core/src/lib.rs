//! # Parcelscan Core
//!
//! Turns a live camera feed into a validated tracking code and the carrier it belongs to.
//!
//! ## Modules
//!
//! - `constants`: Tuning defaults and preferred barcode formats
//! - `types`: Frames, device descriptions, camera capabilities, scanner states
//! - `error`: Camera, backend and session error taxonomy
//! - `config`: TOML scanner configuration
//! - `carrier`: Tracking code → carrier classification
//! - `debounce`: Consecutive-read confirmation of decoded candidates
//! - `camera`: Camera acquisition, capability negotiation and release
//! - `backend`: Native, library and QR-only detection backends
//! - `controller`: Scanner session state machine
//! - `ui`: Notification and completion contracts, manual entry
//! - `sim`: Deterministic simulated platform
//! - `cancel`: Session liveness token

#![warn(missing_docs)]

pub mod backend;
pub mod camera;
pub mod cancel;
pub mod carrier;
pub mod config;
pub mod constants;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod sim;
pub mod types;
pub mod ui;

// Re-export commonly used types
pub use carrier::{classify, detect, CarrierDescriptor, CarrierMatch};
pub use config::ScannerConfig;
pub use controller::{PageEvent, ScannerController, ScannerEvent, StartOutcome, StopOutcome};
pub use debounce::CandidateDebouncer;
pub use error::{CameraError, ConfigError, ScanError};
pub use types::{BackendKind, ScannerState, VideoFrame};
pub use ui::{CompletionTarget, EntryTrigger, NotificationKind, NotificationSink};

/// Result type alias for scanner operations
pub type Result<T> = core::result::Result<T, ScanError>;
