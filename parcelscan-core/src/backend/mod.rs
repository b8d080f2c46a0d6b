//! Detection backends and the selection chain
//!
//! Three strategies turn frames into raw candidate strings:
//!
//! - [`native::NativeBackend`]: the platform's own barcode detector
//! - [`library::LibraryBackend`]: an external decoding library loaded on demand
//! - [`fallback::FallbackBackend`]: a QR-only decoder
//!
//! [`select_backend`] tries them in that order once per session start.

pub mod fallback;
pub mod library;
pub mod native;

use crate::config::ScannerConfig;
use crate::error::{BackendError, ScanError};
use crate::types::{BackendKind, VideoFrame};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use fallback::{FallbackBackend, QrDecoder};
pub use library::{DecoderLibrary, LibraryBackend, LibraryLoader, LoadStrategy};
pub use native::{NativeBackend, NativeDetector};

#[cfg(feature = "logging")]
use tracing::{info, warn};

/// Warning shown when the library failed and the QR decoder took over
pub const DEGRADED_NOTICE: &str =
    "Barcode library unavailable. Scanning QR codes only; enter other codes manually.";

/// Warning shown whenever the QR-only decoder is the active backend
pub const QR_ONLY_NOTICE: &str = "QR-only scanning mode active. Enter other codes manually.";

/// One strategy for turning frames into candidate strings
#[async_trait]
pub trait DetectionBackend: Send {
    /// Which variant this is
    fn kind(&self) -> BackendKind;

    /// Delay between polls
    fn poll_interval(&self) -> Duration;

    /// Decode at most one candidate from `frame`
    ///
    /// `None` is the normal "nothing found" result; per-frame decode errors
    /// are swallowed and also yield `None`.
    async fn detect(&mut self, frame: &VideoFrame) -> Option<String>;

    /// Release decoder state; safe to call more than once
    fn stop(&mut self) -> Result<(), BackendError>;
}

/// Decoding facilities the environment offers
#[derive(Clone, Default)]
pub struct DetectionPlatform {
    /// Platform-native detector
    pub native: Option<Arc<dyn NativeDetector>>,

    /// Loader for the external decoding library
    pub loader: Option<Arc<dyn LibraryLoader>>,

    /// QR-only decoder
    pub qr_fallback: Option<Arc<dyn QrDecoder>>,
}

impl DetectionPlatform {
    /// A platform with no decoding facilities
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native detector
    pub fn with_native(mut self, detector: Arc<dyn NativeDetector>) -> Self {
        self.native = Some(detector);
        self
    }

    /// Register a library loader
    pub fn with_loader(mut self, loader: Arc<dyn LibraryLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Register a QR-only decoder
    pub fn with_qr_fallback(mut self, decoder: Arc<dyn QrDecoder>) -> Self {
        self.qr_fallback = Some(decoder);
        self
    }

    /// True when nothing could ever be selected
    pub fn is_empty(&self) -> bool {
        self.native.is_none() && self.loader.is_none() && self.qr_fallback.is_none()
    }
}

/// Backend chosen for a session, with any notice the UI must show
pub struct SelectedBackend {
    /// The backend
    pub backend: Box<dyn DetectionBackend>,

    /// Warning to surface, set for degraded modes
    pub notice: Option<&'static str>,
}

/// Pick the first usable backend: native, then library, then QR-only
pub async fn select_backend(
    platform: &DetectionPlatform,
    config: &ScannerConfig,
) -> Result<SelectedBackend, ScanError> {
    if let Some(detector) = &platform.native {
        match NativeBackend::new(Arc::clone(detector), config.native_poll_interval()).await {
            Ok(backend) => {
                #[cfg(feature = "logging")]
                info!(
                    "Using native detector with {} formats",
                    backend.formats().len()
                );

                return Ok(SelectedBackend {
                    backend: Box::new(backend),
                    notice: None,
                });
            }
            Err(_err) => {
                #[cfg(feature = "logging")]
                warn!("Native detector unusable: {}", _err);
            }
        }
    }

    let mut library_failed = false;
    if let Some(loader) = &platform.loader {
        let strategy = LoadStrategy::from_config(config);
        match strategy.load(loader.as_ref()).await {
            Ok(library) => {
                #[cfg(feature = "logging")]
                info!("Using decoding library backend");

                return Ok(SelectedBackend {
                    backend: Box::new(LibraryBackend::new(library, config.library_poll_interval())),
                    notice: None,
                });
            }
            Err(_err) => {
                #[cfg(feature = "logging")]
                warn!("{}", _err);

                library_failed = true;
            }
        }
    }

    if let Some(decoder) = &platform.qr_fallback {
        #[cfg(feature = "logging")]
        warn!("Falling back to QR-only decoding");

        return Ok(SelectedBackend {
            backend: Box::new(FallbackBackend::new(
                Arc::clone(decoder),
                config.library_poll_interval(),
            )),
            notice: Some(if library_failed {
                DEGRADED_NOTICE
            } else {
                QR_ONLY_NOTICE
            }),
        });
    }

    Err(ScanError::BackendUnavailable)
}

/// Text decoded from a frame, trimmed; blank results count as nothing found
pub(crate) fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}
