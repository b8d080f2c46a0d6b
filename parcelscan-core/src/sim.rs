//! Deterministic simulated platform
//!
//! Every platform seam has an in-memory stand-in here. Frames carry a
//! "scene" as UTF-8 text: a plain string is a linear barcode, a `qr:` prefix
//! marks a QR code, an empty frame shows nothing and
//! [`SIM_DECODE_ERROR_SCENE`] makes every decoder fail on that frame.

use crate::backend::{DecoderLibrary, DetectionPlatform, LibraryLoader, NativeDetector, QrDecoder};
use crate::camera::{CameraDevice, MediaTrack};
use crate::carrier::CarrierMatch;
use crate::config::ScannerConfig;
use crate::error::{DecodeError, LoadError, PlatformError};
use crate::types::{
    BarcodeFormat, CameraCapabilities, DetectedBarcode, DeviceInfo, DeviceKind, FocusMode,
    TrackConstraint, TrackSettings, VideoConstraints, VideoFrame,
};
use crate::ui::{CompletionTarget, NotificationKind, NotificationSink};
use async_trait::async_trait;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Scene that makes decoders return an error for the frame
pub const SIM_DECODE_ERROR_SCENE: &str = "!decode-error";

const QR_PREFIX: &str = "qr:";

enum Scene<'a> {
    Blank,
    Garbled,
    Linear(&'a str),
    Qr(&'a str),
}

fn scene(frame: &VideoFrame) -> Scene<'_> {
    let Ok(text) = std::str::from_utf8(&frame.data) else {
        return Scene::Garbled;
    };
    if text.is_empty() {
        Scene::Blank
    } else if text == SIM_DECODE_ERROR_SCENE {
        Scene::Garbled
    } else if let Some(qr) = text.strip_prefix(QR_PREFIX) {
        Scene::Qr(qr)
    } else {
        Scene::Linear(text)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the simulated camera has been asked to do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraLog {
    /// Calls to `open`, successful or not
    pub opens: usize,

    /// Tracks stopped
    pub track_stops: usize,

    /// Constraints passed to each `open`
    pub constraints: Vec<VideoConstraints>,
}

struct CameraState {
    secure: bool,
    open_failures: VecDeque<String>,
    devices: Vec<DeviceInfo>,
    capabilities: CameraCapabilities,
    reject_constraints: bool,
    settings: TrackSettings,
    scenes: VecDeque<String>,
    sequence: u64,
    misreads: Option<(f64, StdRng)>,
    open_delay: Option<Duration>,
    log: CameraLog,
}

impl CameraState {
    fn next_frame(&mut self) -> VideoFrame {
        self.sequence += 1;
        let mut scene = self.scenes.pop_front().unwrap_or_default();
        if let Some((rate, rng)) = self.misreads.as_mut() {
            if !scene.is_empty() && rng.gen_bool(*rate) {
                scene = misread(&scene);
            }
        }
        VideoFrame::new(self.sequence, 1280, 720, Bytes::from(scene))
    }
}

/// Flip the final character so the reading differs from the real code
fn misread(scene: &str) -> String {
    let mut chars: Vec<char> = scene.chars().collect();
    if let Some(last) = chars.last_mut() {
        *last = if *last == '0' { '1' } else { '0' };
    }
    chars.into_iter().collect()
}

/// In-memory camera with scripted failures and scenes
#[derive(Clone)]
pub struct SimCamera {
    state: Arc<Mutex<CameraState>>,
}

impl Default for SimCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCamera {
    /// A secure-context camera with a front and a back device and no optional features
    pub fn new() -> Self {
        let devices = vec![
            DeviceInfo {
                device_id: "sim-front".to_string(),
                label: "Front Camera".to_string(),
                kind: DeviceKind::VideoInput,
            },
            DeviceInfo {
                device_id: "sim-back".to_string(),
                label: "Back Camera".to_string(),
                kind: DeviceKind::VideoInput,
            },
        ];
        Self {
            state: Arc::new(Mutex::new(CameraState {
                secure: true,
                open_failures: VecDeque::new(),
                devices,
                capabilities: CameraCapabilities::default(),
                reject_constraints: false,
                settings: TrackSettings::default(),
                scenes: VecDeque::new(),
                sequence: 0,
                misreads: None,
                open_delay: None,
                log: CameraLog::default(),
            })),
        }
    }

    /// Fail the next `open` with a platform error of this name; calls queue up
    pub fn fail_next_open(self, name: &str) -> Self {
        lock(&self.state).open_failures.push_back(name.to_string());
        self
    }

    /// Pretend the page is not a secure context
    pub fn insecure(self) -> Self {
        lock(&self.state).secure = false;
        self
    }

    /// Advertise these capabilities on opened tracks
    pub fn with_capabilities(self, capabilities: CameraCapabilities) -> Self {
        lock(&self.state).capabilities = capabilities;
        self
    }

    /// Replace the enumerated devices
    pub fn with_devices(self, devices: Vec<DeviceInfo>) -> Self {
        lock(&self.state).devices = devices;
        self
    }

    /// Take this long to hand out tracks after a successful open
    pub fn with_open_delay(self, delay: Duration) -> Self {
        lock(&self.state).open_delay = Some(delay);
        self
    }

    /// Reject every track adjustment
    pub fn reject_constraints(self) -> Self {
        lock(&self.state).reject_constraints = true;
        self
    }

    /// Corrupt a share of non-empty frames, reproducibly for a given seed
    pub fn with_misreads(self, rate: f64, seed: u64) -> Self {
        let rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
        lock(&self.state).misreads = Some((rate, StdRng::seed_from_u64(seed)));
        self
    }

    /// Queue scenes for upcoming frames; blank frames follow once they run out
    pub fn with_scenes<I, S>(self, scenes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_scenes(scenes);
        self
    }

    /// Queue more scenes on a live camera
    pub fn push_scenes<I, S>(&self, scenes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.state)
            .scenes
            .extend(scenes.into_iter().map(Into::into));
    }

    /// Change the torch setting from outside the pipeline
    pub fn set_torch(&self, on: bool) {
        lock(&self.state).settings.torch = Some(on);
    }

    /// Current track settings
    pub fn settings(&self) -> TrackSettings {
        lock(&self.state).settings.clone()
    }

    /// Frames handed out so far
    pub fn frames_served(&self) -> u64 {
        lock(&self.state).sequence
    }

    /// Snapshot of recorded activity
    pub fn log(&self) -> CameraLog {
        lock(&self.state).log.clone()
    }
}

#[async_trait]
impl CameraDevice for SimCamera {
    fn is_secure_context(&self) -> bool {
        lock(&self.state).secure
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, PlatformError> {
        Ok(lock(&self.state).devices.clone())
    }

    async fn open(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Vec<Box<dyn MediaTrack>>, PlatformError> {
        let (label, delay) = {
            let mut state = lock(&self.state);
            state.log.opens += 1;
            state.log.constraints.push(constraints.clone());

            if let Some(name) = state.open_failures.pop_front() {
                return Err(PlatformError::new(name, "simulated failure"));
            }

            let label = constraints
                .device_id
                .as_deref()
                .and_then(|id| state.devices.iter().find(|d| d.device_id == id))
                .map(|d| d.label.clone())
                .unwrap_or_else(|| "Simulated Camera".to_string());
            (label, state.open_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(vec![Box::new(SimTrack {
            state: Arc::clone(&self.state),
            label,
            stopped: false,
        })])
    }
}

struct SimTrack {
    state: Arc<Mutex<CameraState>>,
    label: String,
    stopped: bool,
}

#[async_trait]
impl MediaTrack for SimTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn capabilities(&self) -> CameraCapabilities {
        lock(&self.state).capabilities.clone()
    }

    fn settings(&self) -> TrackSettings {
        lock(&self.state).settings.clone()
    }

    async fn apply(&mut self, constraint: TrackConstraint) -> Result<(), PlatformError> {
        let mut state = lock(&self.state);
        if state.reject_constraints {
            return Err(PlatformError::new(
                "OverconstrainedError",
                "simulated constraint rejection",
            ));
        }
        match constraint {
            TrackConstraint::FocusMode(mode) => state.settings.focus_mode = Some(mode),
            TrackConstraint::Zoom(level) => state.settings.zoom = Some(level),
            TrackConstraint::Torch(on) => state.settings.torch = Some(on),
        }
        Ok(())
    }

    async fn grab_frame(&mut self) -> Option<VideoFrame> {
        if self.stopped {
            return None;
        }
        Some(lock(&self.state).next_frame())
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let mut state = lock(&self.state);
        state.log.track_stops += 1;
        if state.settings.focus_mode == Some(FocusMode::Continuous) {
            state.settings.focus_mode = None;
        }
    }
}

/// Native detector that reads scenes
pub struct SimNativeDetector {
    formats: Vec<BarcodeFormat>,
    fail_query: bool,
}

impl Default for SimNativeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SimNativeDetector {
    /// Supports every preferred format
    pub fn new() -> Self {
        Self::with_formats(crate::constants::PREFERRED_FORMATS.to_vec())
    }

    /// Supports only `formats`
    pub fn with_formats(formats: Vec<BarcodeFormat>) -> Self {
        Self {
            formats,
            fail_query: false,
        }
    }

    /// Make the supported-format query fail
    pub fn failing_format_query(mut self) -> Self {
        self.fail_query = true;
        self
    }
}

#[async_trait]
impl NativeDetector for SimNativeDetector {
    async fn supported_formats(&self) -> Result<Vec<BarcodeFormat>, DecodeError> {
        if self.fail_query {
            return Err(DecodeError("format query rejected".to_string()));
        }
        Ok(self.formats.clone())
    }

    async fn detect(
        &self,
        frame: &VideoFrame,
        formats: &[BarcodeFormat],
    ) -> Result<Vec<DetectedBarcode>, DecodeError> {
        let (value, format) = match scene(frame) {
            Scene::Blank => return Ok(Vec::new()),
            Scene::Garbled => return Err(DecodeError("unreadable frame".to_string())),
            Scene::Linear(value) => (value, BarcodeFormat::Code128),
            Scene::Qr(value) => (value, BarcodeFormat::QrCode),
        };
        if !formats.contains(&format) {
            return Ok(Vec::new());
        }
        Ok(vec![DetectedBarcode {
            raw_value: value.to_string(),
            format,
        }])
    }
}

/// Scripted result of loading the library from one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    /// The library loads
    #[default]
    Ok,
    /// The load reports an error
    Fail,
    /// The load never completes
    Hang,
}

#[derive(Default)]
struct LoaderState {
    outcomes: HashMap<String, LoadOutcome>,
    attempts: Vec<String>,
    resets: usize,
    fail_reset: bool,
}

/// Library loader with per-source scripted outcomes; unscripted sources load
#[derive(Clone, Default)]
pub struct SimLibraryLoader {
    state: Arc<Mutex<LoaderState>>,
}

impl SimLibraryLoader {
    /// Every source loads
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome for `source`
    pub fn with_outcome(self, source: &str, outcome: LoadOutcome) -> Self {
        lock(&self.state)
            .outcomes
            .insert(source.to_string(), outcome);
        self
    }

    /// Make every loaded library report an error when reset; the reset is still counted
    pub fn failing_reset(self) -> Self {
        lock(&self.state).fail_reset = true;
        self
    }

    /// Sources attempted, in order
    pub fn attempts(&self) -> Vec<String> {
        lock(&self.state).attempts.clone()
    }

    /// Times a loaded library was reset
    pub fn resets(&self) -> usize {
        lock(&self.state).resets
    }
}

#[async_trait]
impl LibraryLoader for SimLibraryLoader {
    async fn load(&self, source: &str) -> Result<Box<dyn DecoderLibrary>, LoadError> {
        let outcome = {
            let mut state = lock(&self.state);
            state.attempts.push(source.to_string());
            state.outcomes.get(source).copied().unwrap_or_default()
        };
        match outcome {
            LoadOutcome::Ok => Ok(Box::new(SimLibrary {
                state: Arc::clone(&self.state),
            })),
            LoadOutcome::Fail => Err(LoadError::Failed(format!("{} unreachable", source))),
            LoadOutcome::Hang => std::future::pending().await,
        }
    }
}

struct SimLibrary {
    state: Arc<Mutex<LoaderState>>,
}

#[async_trait]
impl DecoderLibrary for SimLibrary {
    async fn decode(&mut self, frame: &VideoFrame) -> Result<Option<String>, DecodeError> {
        match scene(frame) {
            Scene::Blank => Ok(None),
            Scene::Garbled => Err(DecodeError("no code found".to_string())),
            Scene::Linear(value) | Scene::Qr(value) => Ok(Some(value.to_string())),
        }
    }

    fn reset(&mut self) -> Result<(), DecodeError> {
        let mut state = lock(&self.state);
        state.resets += 1;
        if state.fail_reset {
            return Err(DecodeError("decoder state already released".to_string()));
        }
        Ok(())
    }
}

/// QR-only decoder; linear scenes read as nothing
#[derive(Debug, Clone, Default)]
pub struct SimQrDecoder;

impl SimQrDecoder {
    /// Create a decoder
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QrDecoder for SimQrDecoder {
    async fn decode_qr(&self, frame: &VideoFrame) -> Result<Option<String>, DecodeError> {
        match scene(frame) {
            Scene::Garbled => Err(DecodeError("corrupt QR code".to_string())),
            Scene::Qr(value) => Ok(Some(value.to_string())),
            Scene::Blank | Scene::Linear(_) => Ok(None),
        }
    }
}

/// Notification sink that keeps every message
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<(String, NotificationKind)>>>,
}

impl RecordingSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far
    pub fn messages(&self) -> Vec<(String, NotificationKind)> {
        lock(&self.messages).clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, message: &str, kind: NotificationKind) {
        lock(&self.messages).push((message.to_string(), kind));
    }
}

/// Everything a [`RecordingTarget`] was told
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetRecord {
    /// Codes written into the tracking-code field
    pub tracking_codes: Vec<String>,

    /// Carriers shown
    pub carriers: Vec<CarrierMatch>,

    /// Focus-next requests
    pub focus_requests: usize,
}

/// Completion target that records every call
#[derive(Debug, Clone, Default)]
pub struct RecordingTarget {
    record: Arc<Mutex<TargetRecord>>,
}

impl RecordingTarget {
    /// Empty target
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded calls
    pub fn record(&self) -> TargetRecord {
        lock(&self.record).clone()
    }
}

impl CompletionTarget for RecordingTarget {
    fn set_tracking_code(&self, code: &str) {
        lock(&self.record).tracking_codes.push(code.to_string());
    }

    fn show_carrier(&self, carrier: &CarrierMatch) {
        lock(&self.record).carriers.push(carrier.clone());
    }

    fn focus_next(&self) {
        lock(&self.record).focus_requests += 1;
    }
}

/// A scripted environment for one simulated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Offer a native detector
    pub native: bool,

    /// Formats the native detector supports; all preferred formats when unset
    pub native_formats: Option<Vec<BarcodeFormat>>,

    /// Offer the decoding library, with one outcome per configured source
    pub library: Option<Vec<LoadOutcome>>,

    /// Offer the QR-only decoder
    pub qr_fallback: bool,

    /// Whether the page is a secure context
    pub secure_context: bool,

    /// Platform error names returned by successive camera opens
    pub open_failures: Vec<String>,

    /// Capabilities of the opened track
    pub capabilities: CameraCapabilities,

    /// Enumerated devices; a front and a back camera when unset
    pub devices: Option<Vec<DeviceInfo>>,

    /// Frame scenes, in order
    pub frames: Vec<String>,

    /// Share of frames read wrong
    pub misread_rate: f64,

    /// Seed for misreads
    pub seed: u64,

    /// Give up and stop after this long
    pub timeout_ms: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            native: false,
            native_formats: None,
            library: None,
            qr_fallback: false,
            secure_context: true,
            open_failures: Vec::new(),
            capabilities: CameraCapabilities::default(),
            devices: None,
            frames: Vec::new(),
            misread_rate: 0.0,
            seed: 0,
            timeout_ms: 5_000,
        }
    }
}

/// Simulated platform built from a [`Scenario`]
pub struct SimEnvironment {
    /// Camera
    pub camera: SimCamera,

    /// Detection facilities
    pub platform: DetectionPlatform,

    /// Library loader, when the scenario offers one
    pub loader: Option<SimLibraryLoader>,
}

impl Scenario {
    /// Build the simulated platform; library outcomes map onto `config.library_sources` in order
    pub fn build(&self, config: &ScannerConfig) -> SimEnvironment {
        let mut camera = SimCamera::new()
            .with_capabilities(self.capabilities.clone())
            .with_scenes(self.frames.iter().cloned());
        if !self.secure_context {
            camera = camera.insecure();
        }
        for name in &self.open_failures {
            camera = camera.fail_next_open(name);
        }
        if let Some(devices) = &self.devices {
            camera = camera.with_devices(devices.clone());
        }
        if self.misread_rate > 0.0 {
            camera = camera.with_misreads(self.misread_rate, self.seed);
        }

        let mut platform = DetectionPlatform::new();
        if self.native {
            let detector = match &self.native_formats {
                Some(formats) => SimNativeDetector::with_formats(formats.clone()),
                None => SimNativeDetector::new(),
            };
            platform = platform.with_native(Arc::new(detector));
        }

        let loader = self.library.as_ref().map(|outcomes| {
            config
                .library_sources
                .iter()
                .zip(outcomes)
                .fold(SimLibraryLoader::new(), |loader, (source, outcome)| {
                    loader.with_outcome(source, *outcome)
                })
        });
        if let Some(loader) = &loader {
            platform = platform.with_loader(Arc::new(loader.clone()));
        }

        if self.qr_fallback {
            platform = platform.with_qr_fallback(Arc::new(SimQrDecoder::new()));
        }

        SimEnvironment {
            camera,
            platform,
            loader,
        }
    }
}
