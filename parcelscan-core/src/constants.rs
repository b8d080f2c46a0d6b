//! Defaults and fixed tables for the detection pipeline

use crate::types::BarcodeFormat;

/// Identical consecutive readings required before a candidate is accepted
pub const DEFAULT_CONSECUTIVE_HITS: u32 = 2;

/// Upper bound on the zoom level requested during capability negotiation
pub const DEFAULT_MAX_ZOOM: f64 = 2.0;

/// Preferred capture width in pixels
pub const DEFAULT_IDEAL_WIDTH: u32 = 1280;

/// Preferred capture height in pixels
pub const DEFAULT_IDEAL_HEIGHT: u32 = 720;

/// Preferred capture frame rate
pub const DEFAULT_IDEAL_FRAME_RATE: u32 = 30;

/// Native detector polling cadence, roughly one display refresh at 60 Hz
pub const DEFAULT_NATIVE_POLL_INTERVAL_MS: u64 = 16;

/// Frames per second decoded by the library and fallback backends
pub const DEFAULT_LIBRARY_FPS: u32 = 10;

/// Time allowed for a single decoding library source to load
pub const DEFAULT_LIBRARY_LOAD_TIMEOUT_MS: u64 = 8_000;

/// How long the UI keeps a notification on screen
pub const DEFAULT_NOTIFICATION_DISMISS_MS: u64 = 5_000;

/// Capacity of the scanner event broadcast channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Primary and alternate locations of the external decoding library
pub const DEFAULT_LIBRARY_SOURCES: [&str; 2] = [
    "https://unpkg.com/html5-qrcode@2.3.8/html5-qrcode.min.js",
    "https://cdn.jsdelivr.net/npm/html5-qrcode@2.3.8/html5-qrcode.min.js",
];

/// Symbologies requested from a native detector, most common parcel labels first
///
/// The native backend intersects this list with whatever the platform reports,
/// preserving this order.
pub const PREFERRED_FORMATS: [BarcodeFormat; 13] = [
    BarcodeFormat::Code128,
    BarcodeFormat::Code39,
    BarcodeFormat::Code93,
    BarcodeFormat::Codabar,
    BarcodeFormat::Ean13,
    BarcodeFormat::Ean8,
    BarcodeFormat::UpcA,
    BarcodeFormat::UpcE,
    BarcodeFormat::Itf,
    BarcodeFormat::Pdf417,
    BarcodeFormat::DataMatrix,
    BarcodeFormat::Aztec,
    BarcodeFormat::QrCode,
];

/// Substrings in a device label that indicate a back-facing camera
pub const BACK_CAMERA_HINTS: [&str; 3] = ["back", "rear", "environment"];
