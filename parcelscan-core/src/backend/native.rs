//! Platform-native barcode detector backend

use super::{non_blank, DetectionBackend};
use crate::constants::PREFERRED_FORMATS;
use crate::error::{BackendError, DecodeError};
use crate::types::{BackendKind, BarcodeFormat, DetectedBarcode, VideoFrame};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "logging")]
use tracing::trace;

/// A barcode detector built into the platform
#[async_trait]
pub trait NativeDetector: Send + Sync {
    /// Symbologies the platform can decode
    async fn supported_formats(&self) -> Result<Vec<BarcodeFormat>, DecodeError>;

    /// Detect barcodes of the given formats in a frame
    async fn detect(
        &self,
        frame: &VideoFrame,
        formats: &[BarcodeFormat],
    ) -> Result<Vec<DetectedBarcode>, DecodeError>;
}

/// Polls the native detector at display refresh cadence
pub struct NativeBackend {
    detector: Arc<dyn NativeDetector>,
    formats: Vec<BarcodeFormat>,
    interval: Duration,
}

impl NativeBackend {
    /// Query supported formats and keep those from [`PREFERRED_FORMATS`]
    ///
    /// Fails when the query fails or nothing overlaps; this is the only
    /// point where the native backend can fail.
    pub async fn new(
        detector: Arc<dyn NativeDetector>,
        interval: Duration,
    ) -> Result<Self, BackendError> {
        let supported = detector
            .supported_formats()
            .await
            .map_err(|e| BackendError::Setup(e.to_string()))?;

        let formats = negotiate_formats(&supported);
        if formats.is_empty() {
            return Err(BackendError::Setup(
                "native detector supports none of the preferred formats".to_string(),
            ));
        }

        Ok(Self {
            detector,
            formats,
            interval,
        })
    }

    /// Formats requested on every frame
    pub fn formats(&self) -> &[BarcodeFormat] {
        &self.formats
    }
}

/// Preferred formats the platform supports, in preference order
pub fn negotiate_formats(supported: &[BarcodeFormat]) -> Vec<BarcodeFormat> {
    PREFERRED_FORMATS
        .iter()
        .copied()
        .filter(|f| supported.contains(f))
        .collect()
}

#[async_trait]
impl DetectionBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    async fn detect(&mut self, frame: &VideoFrame) -> Option<String> {
        match self.detector.detect(frame, &self.formats).await {
            Ok(found) => found.into_iter().find_map(|b| non_blank(b.raw_value)),
            Err(_err) => {
                #[cfg(feature = "logging")]
                trace!("Native detect failed on frame {}: {}", frame.sequence, _err);
                None
            }
        }
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        // The platform detector holds no per-session state
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimNativeDetector, SIM_DECODE_ERROR_SCENE};
    use bytes::Bytes;

    fn frame(seq: u64, scene: &str) -> VideoFrame {
        VideoFrame::new(seq, 640, 480, Bytes::from(scene.to_string()))
    }

    #[test]
    fn test_negotiate_preserves_preference_order() {
        let supported = [
            BarcodeFormat::QrCode,
            BarcodeFormat::Ean13,
            BarcodeFormat::Code128,
        ];
        assert_eq!(
            negotiate_formats(&supported),
            vec![
                BarcodeFormat::Code128,
                BarcodeFormat::Ean13,
                BarcodeFormat::QrCode
            ]
        );
    }

    #[tokio::test]
    async fn test_detects_and_swallows_frame_errors() {
        let mut backend = NativeBackend::new(
            Arc::new(SimNativeDetector::new()),
            Duration::from_millis(16),
        )
        .await
        .unwrap();

        assert_eq!(backend.detect(&frame(1, "")).await, None);
        assert_eq!(backend.detect(&frame(2, SIM_DECODE_ERROR_SCENE)).await, None);
        assert_eq!(
            backend.detect(&frame(3, "1Z999AA10123456784")).await.as_deref(),
            Some("1Z999AA10123456784")
        );
        assert!(backend.stop().is_ok());
    }

    #[tokio::test]
    async fn test_setup_fails_without_overlap() {
        let result = NativeBackend::new(
            Arc::new(SimNativeDetector::with_formats(vec![])),
            Duration::from_millis(16),
        )
        .await;
        assert!(matches!(result, Err(BackendError::Setup(_))));
    }
}
