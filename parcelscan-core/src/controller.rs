//! Scanner session state machine
//!
//! ```text
//! Idle ──start──▶ Starting ──▶ Active ──stop/accept──▶ Stopping ──▶ Idle
//!                    │            │
//!                    └──failure───┴──▶ Error ──▶ Idle
//! ```
//!
//! A session owns the backend, the camera and the debouncer together; it is
//! built in full before it becomes visible and torn down in one place.

use crate::backend::{select_backend, DetectionBackend, DetectionPlatform, NativeDetector};
use crate::backend::{LibraryLoader, QrDecoder};
use crate::camera::{select_back_camera, CameraDevice, CameraManager, NegotiatedCapabilities};
use crate::cancel::CancellationToken;
use crate::carrier::{self, CarrierMatch};
use crate::config::ScannerConfig;
use crate::debounce::CandidateDebouncer;
use crate::error::{CameraError, ScanError};
use crate::types::{BackendKind, CameraCapabilities, ScannerState};
use crate::ui::{CompletionTarget, EntryTrigger, ManualEntry, NotificationKind, NotificationSink};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

#[cfg(feature = "logging")]
use tracing::{debug, info, warn};

/// Externally visible scanner events
#[derive(Debug, Clone, PartialEq)]
pub enum ScannerEvent {
    /// The controller moved to a new state
    StateChanged(ScannerState),

    /// A backend was chosen for the session being started
    BackendSelected(BackendKind),

    /// A candidate was accepted and classified
    Accepted(CarrierMatch),

    /// A session failed to start
    Failed(ScanError),
}

/// Result of [`ScannerController::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session is polling frames
    Started(BackendKind),

    /// A session was already starting, running or stopping
    AlreadyRunning,

    /// `stop()` was called before the start completed
    Cancelled,
}

/// Result of [`ScannerController::stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// An active session was torn down
    Stopped,

    /// A pending start was cancelled
    CancelledStart,

    /// Nothing was running
    AlreadyIdle,
}

/// Page lifecycle signals forwarded by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// The page or tab became hidden
    Hidden,

    /// The page or tab became visible again
    Visible,

    /// The page is being unloaded
    Unload,
}

struct ScannerSession {
    generation: u64,
    backend: Box<dyn DetectionBackend>,
    camera: CameraManager,
    negotiated: NegotiatedCapabilities,
    debouncer: CandidateDebouncer,
    cancel: CancellationToken,
}

struct Lifecycle {
    state: ScannerState,
    generation: u64,
    cancel: Option<CancellationToken>,
}

struct Shared {
    config: ScannerConfig,
    camera: Arc<dyn CameraDevice>,
    platform: RwLock<DetectionPlatform>,
    notifications: Arc<dyn NotificationSink>,
    target: Arc<dyn CompletionTarget>,
    lifecycle: Mutex<Lifecycle>,
    session: tokio::sync::Mutex<Option<ScannerSession>>,
    events: broadcast::Sender<ScannerEvent>,
}

/// Builder for [`ScannerController`]
pub struct ScannerControllerBuilder {
    config: ScannerConfig,
    camera: Arc<dyn CameraDevice>,
    platform: DetectionPlatform,
    notifications: Arc<dyn NotificationSink>,
    target: Arc<dyn CompletionTarget>,
}

impl ScannerControllerBuilder {
    /// Start a builder with the required collaborators
    pub fn new(
        camera: Arc<dyn CameraDevice>,
        notifications: Arc<dyn NotificationSink>,
        target: Arc<dyn CompletionTarget>,
    ) -> Self {
        Self {
            config: ScannerConfig::default(),
            camera,
            platform: DetectionPlatform::default(),
            notifications,
            target,
        }
    }

    /// Use a specific configuration
    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a prepared set of decoding facilities
    pub fn platform(mut self, platform: DetectionPlatform) -> Self {
        self.platform = platform;
        self
    }

    /// Register a native detector
    pub fn native(mut self, detector: Arc<dyn NativeDetector>) -> Self {
        self.platform.native = Some(detector);
        self
    }

    /// Register a decoding library loader
    pub fn library_loader(mut self, loader: Arc<dyn LibraryLoader>) -> Self {
        self.platform.loader = Some(loader);
        self
    }

    /// Register a QR-only decoder
    pub fn qr_fallback(mut self, decoder: Arc<dyn QrDecoder>) -> Self {
        self.platform.qr_fallback = Some(decoder);
        self
    }

    /// Build the controller in the `Idle` state
    pub fn build(self) -> ScannerController {
        let (events, _) = broadcast::channel(self.config.event_channel_capacity.max(1));
        ScannerController {
            shared: Arc::new(Shared {
                config: self.config,
                camera: self.camera,
                platform: RwLock::new(self.platform),
                notifications: self.notifications,
                target: self.target,
                lifecycle: Mutex::new(Lifecycle {
                    state: ScannerState::Idle,
                    generation: 0,
                    cancel: None,
                }),
                session: tokio::sync::Mutex::new(None),
                events,
            }),
        }
    }
}

/// Orchestrates one scan session at a time
///
/// Clone is cheap; clones share the same controller.
#[derive(Clone)]
pub struct ScannerController {
    shared: Arc<Shared>,
}

impl ScannerController {
    /// Start building a controller
    pub fn builder(
        camera: Arc<dyn CameraDevice>,
        notifications: Arc<dyn NotificationSink>,
        target: Arc<dyn CompletionTarget>,
    ) -> ScannerControllerBuilder {
        ScannerControllerBuilder::new(camera, notifications, target)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ScannerState {
        self.lifecycle().state
    }

    /// Effective configuration
    pub fn config(&self) -> &ScannerConfig {
        &self.shared.config
    }

    /// Subscribe to scanner events
    pub fn subscribe(&self) -> broadcast::Receiver<ScannerEvent> {
        self.shared.events.subscribe()
    }

    /// Register a native detector for future sessions
    pub fn register_native(&self, detector: Arc<dyn NativeDetector>) {
        self.platform_mut().native = Some(detector);
    }

    /// Register a library loader for future sessions
    pub fn register_library_loader(&self, loader: Arc<dyn LibraryLoader>) {
        self.platform_mut().loader = Some(loader);
    }

    /// Register a QR-only decoder for future sessions
    pub fn register_qr_fallback(&self, decoder: Arc<dyn QrDecoder>) {
        self.platform_mut().qr_fallback = Some(decoder);
    }

    /// Start a session
    ///
    /// No-op while a session is starting, running or stopping. Setup failures
    /// are reported to the notification sink and leave the controller idle.
    pub async fn start(&self) -> Result<StartOutcome, ScanError> {
        let (generation, cancel) = {
            let mut lc = self.lifecycle();
            match lc.state {
                ScannerState::Starting | ScannerState::Active | ScannerState::Stopping => {
                    #[cfg(feature = "logging")]
                    debug!("start() ignored in state {}", lc.state);
                    return Ok(StartOutcome::AlreadyRunning);
                }
                ScannerState::Idle | ScannerState::Error => {}
            }
            lc.generation += 1;
            let cancel = CancellationToken::new();
            lc.cancel = Some(cancel.clone());
            self.set_state(&mut lc, ScannerState::Starting);
            (lc.generation, cancel)
        };

        #[cfg(feature = "logging")]
        info!("Starting scanner session {}", generation);

        let session = match self.build_session(generation, &cancel).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.finish_stop(generation);
                return Ok(StartOutcome::Cancelled);
            }
            Err(_err) if cancel.is_cancelled() => {
                #[cfg(feature = "logging")]
                debug!("Session {} setup failed after cancellation: {}", generation, _err);

                self.finish_stop(generation);
                return Ok(StartOutcome::Cancelled);
            }
            Err(err) => {
                self.fail(generation, &err);
                return Err(err);
            }
        };

        self.activate(session).await
    }

    async fn build_session(
        &self,
        generation: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<ScannerSession>, ScanError> {
        let platform = self
            .shared
            .platform
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let selected = select_backend(&platform, &self.shared.config).await?;
        let mut backend = selected.backend;
        if cancel.is_cancelled() {
            stop_backend(backend.as_mut());
            return Ok(None);
        }

        let mut camera = CameraManager::new(Arc::clone(&self.shared.camera), self.shared.config.max_zoom);
        let mut constraints = self.shared.config.video_constraints();
        if backend.kind() == BackendKind::Library {
            let inputs = camera.video_inputs().await;
            if let Some(device) = select_back_camera(&inputs) {
                #[cfg(feature = "logging")]
                debug!("Selected camera {:?} ({})", device.label, device.device_id);
                constraints = constraints.with_device(device.device_id.clone());
            }
        }

        if let Err(err) = camera.acquire(constraints).await {
            stop_backend(backend.as_mut());
            return Err(err.into());
        }
        if cancel.is_cancelled() {
            stop_backend(backend.as_mut());
            camera.release();
            return Ok(None);
        }

        let negotiated = camera.negotiate_capabilities().await;

        if let Some(notice) = selected.notice {
            self.shared
                .notifications
                .notify(notice, NotificationKind::Warning);
        }
        self.emit(ScannerEvent::BackendSelected(backend.kind()));

        Ok(Some(ScannerSession {
            generation,
            backend,
            camera,
            negotiated,
            debouncer: CandidateDebouncer::new(self.shared.config.consecutive_hits),
            cancel: cancel.clone(),
        }))
    }

    async fn activate(&self, session: ScannerSession) -> Result<StartOutcome, ScanError> {
        let generation = session.generation;
        let kind = session.backend.kind();
        let interval = session.backend.poll_interval();
        let cancel = session.cancel.clone();

        // Hold the slot while flipping to Active so a concurrent stop() always finds the session
        let mut slot = self.shared.session.lock().await;
        {
            let mut lc = self.lifecycle();
            if lc.generation != generation
                || lc.state != ScannerState::Starting
                || cancel.is_cancelled()
            {
                drop(lc);
                drop(slot);
                teardown(session);
                self.finish_stop(generation);
                return Ok(StartOutcome::Cancelled);
            }
            *slot = Some(session);
            self.set_state(&mut lc, ScannerState::Active);
        }
        drop(slot);

        #[cfg(feature = "logging")]
        info!("Scanner session {} active using {} backend", generation, kind);

        tokio::spawn(self.clone().run_frame_loop(generation, cancel, interval));
        Ok(StartOutcome::Started(kind))
    }

    async fn run_frame_loop(self, generation: u64, cancel: CancellationToken, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            if cancel.is_cancelled() {
                break;
            }

            let mut slot = self.shared.session.lock().await;
            let Some(session) = slot.as_mut().filter(|s| s.generation == generation) else {
                break;
            };
            if cancel.is_cancelled() {
                break;
            }

            let Some(frame) = session.camera.grab_frame().await else {
                continue;
            };
            let reading = session.backend.detect(&frame).await;

            // A stop may have landed while the decode was in flight
            if cancel.is_cancelled() {
                break;
            }
            let Some(raw) = reading else {
                continue;
            };
            let Some(accepted) = session.debouncer.push(&raw) else {
                continue;
            };

            if !self.claim_acceptance(generation) {
                break;
            }
            let finished = slot.take();
            drop(slot);

            #[cfg(feature = "logging")]
            info!("Accepted {:?} at frame {}", accepted, frame.sequence);

            self.complete(&accepted);
            if let Some(session) = finished {
                teardown(session);
            }
            self.finish_stop(generation);
            break;
        }

        #[cfg(feature = "logging")]
        debug!("Frame loop for session {} exited", generation);
    }

    /// Move Active → Stopping for an accepted candidate, unless stop() got there first
    fn claim_acceptance(&self, generation: u64) -> bool {
        let mut lc = self.lifecycle();
        if lc.generation != generation || lc.state != ScannerState::Active {
            return false;
        }
        if let Some(cancel) = lc.cancel.take() {
            cancel.cancel();
        }
        self.set_state(&mut lc, ScannerState::Stopping);
        true
    }

    fn complete(&self, code: &str) {
        let matched = carrier::detect(code);
        let target = &self.shared.target;
        target.set_tracking_code(code);
        target.show_carrier(&matched);
        self.shared.notifications.notify(
            &format!("{} package scanned successfully!", matched.carrier.name),
            NotificationKind::Success,
        );
        target.focus_next();
        self.emit(ScannerEvent::Accepted(matched));
    }

    /// Stop the current session
    ///
    /// Idempotent and total: safe in any state, and teardown failures are
    /// logged rather than returned. A pending start is cancelled and the
    /// controller stays `Stopping` until that start has released what it
    /// acquired, so a new start can never overlap it.
    pub async fn stop(&self) -> StopOutcome {
        let (generation, cancel) = {
            let mut lc = self.lifecycle();
            match lc.state {
                ScannerState::Idle | ScannerState::Stopping | ScannerState::Error => {
                    return StopOutcome::AlreadyIdle;
                }
                ScannerState::Starting => {
                    // The pending start sees the token, releases what it holds, then moves to Idle
                    if let Some(cancel) = lc.cancel.take() {
                        cancel.cancel();
                    }
                    self.set_state(&mut lc, ScannerState::Stopping);

                    #[cfg(feature = "logging")]
                    info!("Cancelled pending start of session {}", lc.generation);

                    return StopOutcome::CancelledStart;
                }
                ScannerState::Active => {
                    self.set_state(&mut lc, ScannerState::Stopping);
                    (lc.generation, lc.cancel.take())
                }
            }
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }

        // Waits for any in-flight poll to finish
        let session = self.shared.session.lock().await.take();
        if let Some(session) = session {
            teardown(session);
        }
        self.finish_stop(generation);

        #[cfg(feature = "logging")]
        info!("Scanner session {} stopped", generation);

        StopOutcome::Stopped
    }

    fn finish_stop(&self, generation: u64) {
        let mut lc = self.lifecycle();
        if lc.generation == generation && lc.state == ScannerState::Stopping {
            self.set_state(&mut lc, ScannerState::Idle);
        }
    }

    /// React to page visibility and navigation; hiding or unloading stops the session
    pub async fn handle_page_event(&self, event: PageEvent) -> Option<StopOutcome> {
        match event {
            PageEvent::Hidden | PageEvent::Unload => Some(self.stop().await),
            PageEvent::Visible => None,
        }
    }

    /// Flip the torch on the active camera; `None` when no session is active
    pub async fn toggle_torch(&self) -> Option<Result<bool, CameraError>> {
        let mut slot = self.shared.session.lock().await;
        match slot.as_mut() {
            Some(session) => Some(session.camera.toggle_torch().await),
            None => None,
        }
    }

    /// Capabilities of the active camera
    pub async fn capabilities(&self) -> Option<CameraCapabilities> {
        let slot = self.shared.session.lock().await;
        slot.as_ref().and_then(|s| s.camera.capabilities())
    }

    /// Features capability negotiation actually enabled on the active camera
    pub async fn negotiated_capabilities(&self) -> Option<NegotiatedCapabilities> {
        let slot = self.shared.session.lock().await;
        slot.as_ref().map(|s| s.negotiated.clone())
    }

    /// Backend of the active session
    pub async fn active_backend(&self) -> Option<BackendKind> {
        let slot = self.shared.session.lock().await;
        slot.as_ref().map(|s| s.backend.kind())
    }

    /// Classify a typed tracking code and show its carrier
    pub fn manual_entry(&self, text: &str, trigger: EntryTrigger) -> Option<CarrierMatch> {
        ManualEntry::new(Arc::clone(&self.shared.target)).handle(text, trigger)
    }

    fn fail(&self, generation: u64, err: &ScanError) {
        {
            let mut lc = self.lifecycle();
            if lc.generation != generation || lc.state != ScannerState::Starting {
                // Superseded by stop() or a newer start
                return;
            }
            lc.cancel = None;
            self.set_state(&mut lc, ScannerState::Error);
        }

        #[cfg(feature = "logging")]
        warn!("Scanner session {} failed: {}", generation, err);

        self.shared
            .notifications
            .notify(err.user_message(), NotificationKind::Error);
        self.emit(ScannerEvent::Failed(err.clone()));

        let mut lc = self.lifecycle();
        if lc.generation == generation && lc.state == ScannerState::Error {
            self.set_state(&mut lc, ScannerState::Idle);
        }
    }

    fn set_state(&self, lc: &mut Lifecycle, state: ScannerState) {
        if lc.state != state {
            lc.state = state;
            self.emit(ScannerEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: ScannerEvent) {
        // No subscribers is fine
        let _ = self.shared.events.send(event);
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn platform_mut(&self) -> std::sync::RwLockWriteGuard<'_, DetectionPlatform> {
        self.shared
            .platform
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn stop_backend(backend: &mut dyn DetectionBackend) {
    if let Err(_err) = backend.stop() {
        #[cfg(feature = "logging")]
        warn!("Ignoring {} backend teardown failure: {}", backend.kind(), _err);
    }
}

/// Decoder stop, then camera release; each step runs regardless of the other
fn teardown(mut session: ScannerSession) {
    session.cancel.cancel();
    stop_backend(session.backend.as_mut());
    session.camera.release();
    session.debouncer.reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{RecordingSink, RecordingTarget, SimCamera, SimQrDecoder};

    fn controller(camera: &SimCamera) -> (ScannerController, RecordingSink, RecordingTarget) {
        let sink = RecordingSink::new();
        let target = RecordingTarget::new();
        let controller = ScannerController::builder(
            Arc::new(camera.clone()),
            Arc::new(sink.clone()),
            Arc::new(target.clone()),
        )
        .config(ScannerConfig {
            library_load_timeout_ms: 20,
            ..Default::default()
        })
        .build();
        (controller, sink, target)
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_session_futures_are_send() {
        let camera = SimCamera::new();
        let (controller, _, _) = controller(&camera);
        assert_send(controller.start());
        assert_send(controller.stop());
        assert_send(controller.handle_page_event(PageEvent::Hidden));
        assert_send(controller.toggle_torch());
        assert_send(controller.negotiated_capabilities());
    }

    #[tokio::test]
    async fn test_starts_idle_and_stop_is_noop() {
        let camera = SimCamera::new();
        let (controller, _, _) = controller(&camera);
        assert_eq!(controller.state(), ScannerState::Idle);
        assert_eq!(controller.stop().await, StopOutcome::AlreadyIdle);
        assert_eq!(camera.log().track_stops, 0);
    }

    #[tokio::test]
    async fn test_backend_unavailable_returns_to_idle() {
        let camera = SimCamera::new();
        let (controller, sink, _) = controller(&camera);
        let err = controller.start().await.unwrap_err();
        assert_eq!(err, ScanError::BackendUnavailable);
        assert_eq!(controller.state(), ScannerState::Idle);
        assert_eq!(camera.log().opens, 0);

        let notes = sink.messages();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].1, NotificationKind::Error);
        assert!(notes[0].0.contains("manually"));
    }

    #[tokio::test]
    async fn test_page_hidden_stops_session() {
        let camera = SimCamera::new();
        let (controller, _, _) = controller(&camera);
        controller.register_qr_fallback(Arc::new(SimQrDecoder::new()));
        controller.start().await.unwrap();
        assert_eq!(controller.state(), ScannerState::Active);

        assert_eq!(controller.handle_page_event(PageEvent::Visible).await, None);
        assert_eq!(controller.state(), ScannerState::Active);

        assert_eq!(
            controller.handle_page_event(PageEvent::Hidden).await,
            Some(StopOutcome::Stopped)
        );
        assert_eq!(controller.state(), ScannerState::Idle);
        assert_eq!(camera.log().track_stops, 1);
    }

    #[tokio::test]
    async fn test_torch_requires_active_session() {
        let camera = SimCamera::new();
        let (controller, _, _) = controller(&camera);
        assert!(controller.toggle_torch().await.is_none());
        assert!(controller.capabilities().await.is_none());
        assert!(controller.active_backend().await.is_none());
    }
}
