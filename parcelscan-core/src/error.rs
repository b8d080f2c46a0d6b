//! Error types for the detection pipeline

use std::time::Duration;

/// Raw failure reported by a platform facility (camera, detector, library loader)
///
/// `name` carries the platform's error class, e.g. `NotAllowedError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name}: {message}")]
pub struct PlatformError {
    /// Platform error class name
    pub name: String,
    /// Human-readable detail
    pub message: String,
}

impl PlatformError {
    /// Create a platform error from a class name and message
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Camera acquisition failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    /// The user or a policy refused camera access
    #[error("Camera permission denied")]
    PermissionDenied,

    /// No video input device exists
    #[error("No camera device found")]
    NoDeviceFound,

    /// The device cannot satisfy the requested constraints
    #[error("Camera constraints could not be satisfied")]
    ConstraintsUnsatisfiable,

    /// Camera access is blocked in an insecure context
    #[error("Camera access blocked: insecure context")]
    Blocked,

    /// Any other platform failure
    #[error("Camera error {name}: {message}")]
    Unknown {
        /// Platform error class name
        name: String,
        /// Platform error detail
        message: String,
    },
}

impl CameraError {
    /// Map a platform error onto the camera error taxonomy
    pub fn classify(err: &PlatformError) -> Self {
        match err.name.as_str() {
            "NotAllowedError" | "PermissionDeniedError" => CameraError::PermissionDenied,
            "NotFoundError" | "DevicesNotFoundError" => CameraError::NoDeviceFound,
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => {
                CameraError::ConstraintsUnsatisfiable
            }
            "SecurityError" => CameraError::Blocked,
            _ => CameraError::Unknown {
                name: err.name.clone(),
                message: err.message.clone(),
            },
        }
    }

    /// Message shown to the operator
    pub fn user_message(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied => {
                "Camera access was denied. Please allow camera permissions and try again."
            }
            CameraError::NoDeviceFound => "No camera was found on this device.",
            CameraError::ConstraintsUnsatisfiable => {
                "The camera does not support the requested settings."
            }
            CameraError::Blocked => "Camera access requires a secure (HTTPS) connection.",
            CameraError::Unknown { .. } => "Unable to access camera. Please check permissions.",
        }
    }
}

/// Failure to load the decoding library from one source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The source did not finish loading in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The source failed to load
    #[error("load failed: {0}")]
    Failed(String),
}

/// Per-frame decode failure; expected steady state, never surfaced
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("decode failed: {0}")]
pub struct DecodeError(pub String);

/// Detection backend setup or teardown failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be initialized
    #[error("Backend setup failed: {0}")]
    Setup(String),

    /// Releasing decoder state failed
    #[error("Backend teardown failed: {0}")]
    Teardown(String),
}

/// Errors surfaced by a scanner session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// Camera acquisition failed
    #[error(transparent)]
    Camera(#[from] CameraError),

    /// No detection backend could be initialized
    #[error("No barcode detection backend available")]
    BackendUnavailable,

    /// Every decoding library source failed; `url` is the last one tried
    #[error("Decoding library failed to load from {url}: {reason}")]
    LibraryLoadFailed {
        /// Location of the last attempted source
        url: String,
        /// Why it failed
        reason: LoadError,
    },
}

impl ScanError {
    /// Message shown to the operator
    pub fn user_message(&self) -> &'static str {
        match self {
            ScanError::Camera(err) => err.user_message(),
            ScanError::BackendUnavailable | ScanError::LibraryLoadFailed { .. } => {
                "Barcode scanning is not supported on this device. Please enter the tracking code manually."
            }
        }
    }
}

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path of the config file
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The TOML document is malformed
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its permitted range
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending key
        field: &'static str,
        /// Constraint that was violated
        reason: String,
    },
}
