//! QR-only fallback backend

use super::{non_blank, DetectionBackend};
use crate::error::{BackendError, DecodeError};
use crate::types::{BackendKind, VideoFrame};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Minimal decoder that only understands QR codes
#[async_trait]
pub trait QrDecoder: Send + Sync {
    /// Decode a QR code from a frame
    async fn decode_qr(&self, frame: &VideoFrame) -> Result<Option<String>, DecodeError>;
}

/// Narrowest backend; the controller always announces when it is active
pub struct FallbackBackend {
    decoder: Arc<dyn QrDecoder>,
    interval: Duration,
    stopped: bool,
}

impl FallbackBackend {
    /// Wrap a QR decoder
    pub fn new(decoder: Arc<dyn QrDecoder>, interval: Duration) -> Self {
        Self {
            decoder,
            interval,
            stopped: false,
        }
    }
}

#[async_trait]
impl DetectionBackend for FallbackBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Fallback
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    async fn detect(&mut self, frame: &VideoFrame) -> Option<String> {
        if self.stopped {
            return None;
        }
        self.decoder
            .decode_qr(frame)
            .await
            .ok()
            .flatten()
            .and_then(non_blank)
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.stopped = true;
        Ok(())
    }
}
