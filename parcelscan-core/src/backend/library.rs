//! External decoding library backend

use super::{non_blank, DetectionBackend};
use crate::config::ScannerConfig;
use crate::error::{BackendError, DecodeError, LoadError, ScanError};
use crate::types::{BackendKind, VideoFrame};
use async_trait::async_trait;
use std::time::Duration;

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

/// Fetches the decoding library from a source location
#[async_trait]
pub trait LibraryLoader: Send + Sync {
    /// Load from `source`; may never complete, callers bound it with a timeout
    async fn load(&self, source: &str) -> Result<Box<dyn DecoderLibrary>, LoadError>;
}

/// A loaded decoding library instance
#[async_trait]
pub trait DecoderLibrary: Send {
    /// Decode one frame
    async fn decode(&mut self, frame: &VideoFrame) -> Result<Option<String>, DecodeError>;

    /// Release decoder-internal state
    fn reset(&mut self) -> Result<(), DecodeError>;
}

/// Ordered sources and a per-source timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStrategy {
    /// Sources tried in order; the default has a primary and one alternate
    pub sources: Vec<String>,

    /// Time allowed for each source
    pub timeout: Duration,
}

impl LoadStrategy {
    /// Strategy described by a scanner config
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            sources: config.library_sources.clone(),
            timeout: config.library_load_timeout(),
        }
    }

    /// Try each source in turn, returning the first library that loads in time
    pub async fn load(
        &self,
        loader: &dyn LibraryLoader,
    ) -> Result<Box<dyn DecoderLibrary>, ScanError> {
        let mut last_failure = None;

        for source in &self.sources {
            #[cfg(feature = "logging")]
            debug!("Loading decoding library from {}", source);

            let reason = match tokio::time::timeout(self.timeout, loader.load(source)).await {
                Ok(Ok(library)) => return Ok(library),
                Ok(Err(err)) => err,
                Err(_) => LoadError::Timeout(self.timeout),
            };

            #[cfg(feature = "logging")]
            warn!("Decoding library source {} failed: {}", source, reason);

            last_failure = Some(ScanError::LibraryLoadFailed {
                url: source.clone(),
                reason,
            });
        }

        Err(last_failure.unwrap_or_else(|| ScanError::LibraryLoadFailed {
            url: String::new(),
            reason: LoadError::Failed("no library sources configured".to_string()),
        }))
    }
}

/// Decodes frames through a loaded library at a fixed rate
pub struct LibraryBackend {
    library: Box<dyn DecoderLibrary>,
    interval: Duration,
    stopped: bool,
}

impl LibraryBackend {
    /// Wrap a loaded library
    pub fn new(library: Box<dyn DecoderLibrary>, interval: Duration) -> Self {
        Self {
            library,
            interval,
            stopped: false,
        }
    }
}

#[async_trait]
impl DetectionBackend for LibraryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Library
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    async fn detect(&mut self, frame: &VideoFrame) -> Option<String> {
        if self.stopped {
            return None;
        }
        match self.library.decode(frame).await {
            Ok(value) => value.and_then(non_blank),
            Err(_err) => {
                #[cfg(feature = "logging")]
                trace!("Library decode failed on frame {}: {}", frame.sequence, _err);
                None
            }
        }
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.library
            .reset()
            .map_err(|e| BackendError::Teardown(e.to_string()))
    }
}
