//! Core value types shared across the pipeline

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single captured video frame
///
/// The pixel layout is opaque to the pipeline; only detection backends look
/// inside `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Monotonic frame counter assigned by the track
    pub sequence: u64,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Raw frame contents
    pub data: Bytes,
}

impl VideoFrame {
    /// Create a new frame
    pub fn new(sequence: u64, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            sequence,
            width,
            height,
            data,
        }
    }
}

/// Barcode symbologies a detector may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeFormat {
    /// Code 128
    #[serde(rename = "code_128")]
    Code128,
    /// Code 39
    #[serde(rename = "code_39")]
    Code39,
    /// Code 93
    #[serde(rename = "code_93")]
    Code93,
    /// Codabar
    Codabar,
    /// EAN-13
    #[serde(rename = "ean_13")]
    Ean13,
    /// EAN-8
    #[serde(rename = "ean_8")]
    Ean8,
    /// UPC-A
    UpcA,
    /// UPC-E
    UpcE,
    /// Interleaved 2 of 5
    Itf,
    /// PDF417 stacked code
    Pdf417,
    /// Data Matrix
    DataMatrix,
    /// Aztec
    Aztec,
    /// QR code
    QrCode,
}

/// A barcode found in a frame by a native detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedBarcode {
    /// Decoded text
    pub raw_value: String,

    /// Symbology the value was decoded from
    pub format: BarcodeFormat,
}

/// Kind of media device reported by enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Camera
    VideoInput,
    /// Microphone
    AudioInput,
}

/// An enumerated media device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Platform device identifier
    pub device_id: String,

    /// Human-readable label; may be empty before permission is granted
    #[serde(default)]
    pub label: String,

    /// Device kind
    pub kind: DeviceKind,
}

/// Which way a camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Back camera
    Environment,
    /// Front camera
    User,
}

/// Constraints passed to the platform when opening a camera
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoConstraints {
    /// Preferred facing mode
    pub facing: Option<FacingMode>,

    /// Exact device to open
    pub device_id: Option<String>,

    /// Ideal width in pixels
    pub width: Option<u32>,

    /// Ideal height in pixels
    pub height: Option<u32>,

    /// Ideal frame rate
    pub frame_rate: Option<u32>,
}

impl VideoConstraints {
    /// Back-facing camera at the given resolution and frame rate
    pub fn environment(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            facing: Some(FacingMode::Environment),
            device_id: None,
            width: Some(width),
            height: Some(height),
            frame_rate: Some(frame_rate),
        }
    }

    /// Any camera, no resolution or frame-rate hints
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Pin the constraints to a specific device
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// True when no hint at all is set
    pub fn is_minimal(&self) -> bool {
        *self == Self::minimal()
    }
}

/// Focus modes a track may advertise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    /// Focus continuously
    Continuous,
    /// Focus once, then hold
    SingleShot,
    /// Fixed focus distance
    Manual,
}

/// Zoom range advertised by a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    /// Minimum zoom factor
    pub min: f64,
    /// Maximum zoom factor
    pub max: f64,
}

/// Optional features of an acquired video track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraCapabilities {
    /// Continuous autofocus is available
    #[serde(default)]
    pub continuous_focus: bool,

    /// Zoom range, if the track supports zoom
    #[serde(default)]
    pub zoom: Option<ZoomRange>,

    /// An illumination source can be switched on
    #[serde(default)]
    pub torch: bool,
}

/// Current values of a track's adjustable settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSettings {
    /// Active focus mode
    pub focus_mode: Option<FocusMode>,
    /// Active zoom factor
    pub zoom: Option<f64>,
    /// Torch state
    pub torch: Option<bool>,
}

/// A single adjustment applied to a live track
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackConstraint {
    /// Switch focus mode
    FocusMode(FocusMode),
    /// Set zoom factor
    Zoom(f64),
    /// Turn the torch on or off
    Torch(bool),
}

/// Lifecycle state of the scanner controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerState {
    /// No session
    Idle,
    /// Selecting a backend and acquiring the camera
    Starting,
    /// Polling frames
    Active,
    /// Tearing down the session
    Stopping,
    /// A start or runtime failure is being surfaced; always followed by `Idle`
    Error,
}

impl fmt::Display for ScannerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScannerState::Idle => "idle",
            ScannerState::Starting => "starting",
            ScannerState::Active => "active",
            ScannerState::Stopping => "stopping",
            ScannerState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Detection backend variants, in selection priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Platform-native frame detector
    Native,
    /// General-purpose decoding library loaded on demand
    Library,
    /// QR-only decoder
    Fallback,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Native => "native",
            BackendKind::Library => "library",
            BackendKind::Fallback => "qr-fallback",
        };
        f.write_str(name)
    }
}
