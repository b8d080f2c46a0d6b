//! Camera acquisition, capability negotiation and release

use crate::constants::BACK_CAMERA_HINTS;
use crate::error::{CameraError, PlatformError};
use crate::types::{
    CameraCapabilities, DeviceInfo, DeviceKind, FocusMode, TrackConstraint, TrackSettings,
    VideoConstraints, VideoFrame,
};
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, info, warn};

/// Platform camera access
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Whether the page runs in a secure context; camera access is blocked otherwise
    fn is_secure_context(&self) -> bool {
        true
    }

    /// List media devices
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, PlatformError>;

    /// Open a stream matching `constraints`; the first track is the video track
    async fn open(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Vec<Box<dyn MediaTrack>>, PlatformError>;
}

/// One live track of an opened stream
#[async_trait]
pub trait MediaTrack: Send + Sync {
    /// Track label
    fn label(&self) -> &str;

    /// Optional features the track advertises
    fn capabilities(&self) -> CameraCapabilities;

    /// Current adjustable settings
    fn settings(&self) -> TrackSettings;

    /// Apply one adjustment
    async fn apply(&mut self, constraint: TrackConstraint) -> Result<(), PlatformError>;

    /// Grab the next frame; `None` when no frame is available yet
    async fn grab_frame(&mut self) -> Option<VideoFrame>;

    /// Stop the track; further calls are no-ops
    fn stop(&mut self);
}

/// What capability negotiation actually switched on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NegotiatedCapabilities {
    /// Continuous autofocus was applied
    pub continuous_focus: bool,

    /// Zoom level that was applied
    pub zoom: Option<f64>,

    /// A torch toggle can be offered
    pub torch_available: bool,
}

/// Owns the video stream of one scanner session
pub struct CameraManager {
    device: Arc<dyn CameraDevice>,
    max_zoom: f64,
    tracks: Vec<Box<dyn MediaTrack>>,
}

impl CameraManager {
    /// Create a manager with nothing acquired
    pub fn new(device: Arc<dyn CameraDevice>, max_zoom: f64) -> Self {
        Self {
            device,
            max_zoom,
            tracks: Vec::new(),
        }
    }

    /// Open a camera, retrying once with minimal constraints if the first
    /// request cannot be satisfied
    pub async fn acquire(&mut self, constraints: VideoConstraints) -> Result<(), CameraError> {
        if !self.tracks.is_empty() {
            return Ok(());
        }
        if !self.device.is_secure_context() {
            return Err(CameraError::Blocked);
        }

        let tracks = match self.open(&constraints).await {
            Err(CameraError::ConstraintsUnsatisfiable) if !constraints.is_minimal() => {
                #[cfg(feature = "logging")]
                warn!("Camera rejected {:?}, retrying with minimal constraints", constraints);

                self.open(&VideoConstraints::minimal()).await?
            }
            other => other?,
        };

        if tracks.is_empty() {
            return Err(CameraError::NoDeviceFound);
        }

        #[cfg(feature = "logging")]
        info!("Camera acquired: {}", tracks[0].label());

        self.tracks = tracks;
        Ok(())
    }

    async fn open(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Vec<Box<dyn MediaTrack>>, CameraError> {
        self.device
            .open(constraints)
            .await
            .map_err(|err| CameraError::classify(&err))
    }

    /// Enumerated video inputs, empty if enumeration fails
    pub async fn video_inputs(&self) -> Vec<DeviceInfo> {
        match self.device.enumerate_devices().await {
            Ok(devices) => devices
                .into_iter()
                .filter(|d| d.kind == DeviceKind::VideoInput)
                .collect(),
            Err(_err) => {
                #[cfg(feature = "logging")]
                warn!("Device enumeration failed: {}", _err);
                Vec::new()
            }
        }
    }

    /// Opportunistically enable continuous focus, capped zoom and report torch support
    ///
    /// Each step is independent; a failure is logged and the rest continue.
    pub async fn negotiate_capabilities(&mut self) -> NegotiatedCapabilities {
        let mut negotiated = NegotiatedCapabilities::default();
        let max_zoom = self.max_zoom;
        let Some(track) = self.tracks.first_mut() else {
            return negotiated;
        };
        let caps = track.capabilities();

        if caps.continuous_focus {
            match track
                .apply(TrackConstraint::FocusMode(FocusMode::Continuous))
                .await
            {
                Ok(()) => negotiated.continuous_focus = true,
                Err(_err) => {
                    #[cfg(feature = "logging")]
                    debug!("Continuous focus not applied: {}", _err);
                }
            }
        }

        if let Some(range) = caps.zoom {
            let level = max_zoom.min(range.max).max(range.min);
            match track.apply(TrackConstraint::Zoom(level)).await {
                Ok(()) => negotiated.zoom = Some(level),
                Err(_err) => {
                    #[cfg(feature = "logging")]
                    debug!("Zoom {} not applied: {}", level, _err);
                }
            }
        }

        negotiated.torch_available = caps.torch;

        #[cfg(feature = "logging")]
        debug!("Negotiated capabilities: {:?}", negotiated);

        negotiated
    }

    /// Flip the torch, reading its current state first; returns the new state
    pub async fn toggle_torch(&mut self) -> Result<bool, CameraError> {
        let track = self.tracks.first_mut().ok_or(CameraError::NoDeviceFound)?;
        if !track.capabilities().torch {
            return Err(CameraError::ConstraintsUnsatisfiable);
        }
        let next = !track.settings().torch.unwrap_or(false);
        track
            .apply(TrackConstraint::Torch(next))
            .await
            .map_err(|err| CameraError::classify(&err))?;
        Ok(next)
    }

    /// Capabilities of the held video track
    pub fn capabilities(&self) -> Option<CameraCapabilities> {
        self.tracks.first().map(|t| t.capabilities())
    }

    /// Next frame from the video track
    pub async fn grab_frame(&mut self) -> Option<VideoFrame> {
        match self.tracks.first_mut() {
            Some(track) => track.grab_frame().await,
            None => None,
        }
    }

    /// True while a stream is held
    pub fn is_acquired(&self) -> bool {
        !self.tracks.is_empty()
    }

    /// Stop every track and drop the stream; returns false if nothing was held
    pub fn release(&mut self) -> bool {
        if self.tracks.is_empty() {
            return false;
        }
        for track in self.tracks.iter_mut() {
            track.stop();
        }
        self.tracks.clear();

        #[cfg(feature = "logging")]
        info!("Camera released");

        true
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        self.release();
    }
}

/// Pick a back-facing camera by label, falling back to the last video input
pub fn select_back_camera(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    let mut inputs = devices.iter().filter(|d| d.kind == DeviceKind::VideoInput);
    let labelled = inputs.clone().find(|d| {
        let label = d.label.to_lowercase();
        BACK_CAMERA_HINTS.iter().any(|hint| label.contains(hint))
    });
    labelled.or_else(|| inputs.next_back())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimCamera;
    use crate::types::ZoomRange;

    fn device(id: &str, label: &str) -> DeviceInfo {
        DeviceInfo {
            device_id: id.to_string(),
            label: label.to_string(),
            kind: DeviceKind::VideoInput,
        }
    }

    #[test]
    fn test_select_back_camera_by_label() {
        let devices = vec![
            device("a", "Front Camera"),
            device("b", "Back Camera"),
            device("c", "USB Webcam"),
        ];
        assert_eq!(select_back_camera(&devices).unwrap().device_id, "b");

        let devices = vec![device("a", "FaceTime HD"), device("b", "camera2 0, facing REAR")];
        assert_eq!(select_back_camera(&devices).unwrap().device_id, "b");
    }

    #[test]
    fn test_select_back_camera_defaults_to_last() {
        let mut devices = vec![device("a", ""), device("b", "")];
        devices.push(DeviceInfo {
            device_id: "mic".into(),
            label: "Rear microphone".into(),
            kind: DeviceKind::AudioInput,
        });
        assert_eq!(select_back_camera(&devices).unwrap().device_id, "b");
        assert!(select_back_camera(&[]).is_none());
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let camera = SimCamera::new();
        let mut manager = CameraManager::new(Arc::new(camera.clone()), 2.0);
        manager
            .acquire(VideoConstraints::environment(1280, 720, 30))
            .await
            .expect("camera should open");
        assert!(manager.is_acquired());
        assert_eq!(camera.log().opens, 1);

        assert!(manager.release());
        assert!(!manager.release());
        assert_eq!(camera.log().track_stops, 1);
    }

    #[tokio::test]
    async fn test_overconstrained_retries_once_with_minimal() {
        let camera = SimCamera::new().fail_next_open("OverconstrainedError");
        let mut manager = CameraManager::new(Arc::new(camera.clone()), 2.0);
        manager
            .acquire(VideoConstraints::environment(1920, 1080, 60))
            .await
            .expect("retry should succeed");

        let log = camera.log();
        assert_eq!(log.opens, 2);
        assert!(log.constraints[1].is_minimal());
    }

    #[tokio::test]
    async fn test_overconstrained_twice_surfaces_error() {
        let camera = SimCamera::new()
            .fail_next_open("OverconstrainedError")
            .fail_next_open("OverconstrainedError");
        let mut manager = CameraManager::new(Arc::new(camera.clone()), 2.0);
        let err = manager
            .acquire(VideoConstraints::environment(1920, 1080, 60))
            .await
            .unwrap_err();
        assert_eq!(err, CameraError::ConstraintsUnsatisfiable);
        assert_eq!(camera.log().opens, 2);
    }

    #[tokio::test]
    async fn test_permission_denied_is_not_retried() {
        let camera = SimCamera::new().fail_next_open("NotAllowedError");
        let mut manager = CameraManager::new(Arc::new(camera.clone()), 2.0);
        let err = manager
            .acquire(VideoConstraints::environment(1280, 720, 30))
            .await
            .unwrap_err();
        assert_eq!(err, CameraError::PermissionDenied);
        assert_eq!(camera.log().opens, 1);
        assert!(!manager.is_acquired());
    }

    #[tokio::test]
    async fn test_insecure_context_is_blocked() {
        let camera = SimCamera::new().insecure();
        let mut manager = CameraManager::new(Arc::new(camera.clone()), 2.0);
        let err = manager.acquire(VideoConstraints::minimal()).await.unwrap_err();
        assert_eq!(err, CameraError::Blocked);
        assert_eq!(camera.log().opens, 0);
    }

    #[test]
    fn test_error_classification() {
        let cases = [
            ("NotAllowedError", CameraError::PermissionDenied),
            ("NotFoundError", CameraError::NoDeviceFound),
            ("OverconstrainedError", CameraError::ConstraintsUnsatisfiable),
            ("SecurityError", CameraError::Blocked),
        ];
        for (name, expected) in cases {
            assert_eq!(CameraError::classify(&PlatformError::new(name, "")), expected);
        }
        assert!(matches!(
            CameraError::classify(&PlatformError::new("NotReadableError", "busy")),
            CameraError::Unknown { .. }
        ));
    }

    #[tokio::test]
    async fn test_zoom_is_capped() {
        let camera = SimCamera::new().with_capabilities(CameraCapabilities {
            continuous_focus: true,
            zoom: Some(ZoomRange { min: 1.0, max: 8.0 }),
            torch: false,
        });
        let mut manager = CameraManager::new(Arc::new(camera.clone()), 2.0);
        manager.acquire(VideoConstraints::minimal()).await.unwrap();
        let negotiated = manager.negotiate_capabilities().await;
        assert!(negotiated.continuous_focus);
        assert_eq!(negotiated.zoom, Some(2.0));
        assert!(!negotiated.torch_available);
    }

    #[tokio::test]
    async fn test_zoom_never_exceeds_hardware_max() {
        let camera = SimCamera::new().with_capabilities(CameraCapabilities {
            continuous_focus: false,
            zoom: Some(ZoomRange { min: 1.0, max: 1.5 }),
            torch: true,
        });
        let mut manager = CameraManager::new(Arc::new(camera.clone()), 2.0);
        manager.acquire(VideoConstraints::minimal()).await.unwrap();
        let negotiated = manager.negotiate_capabilities().await;
        assert!(!negotiated.continuous_focus);
        assert_eq!(negotiated.zoom, Some(1.5));
        assert!(negotiated.torch_available);
    }

    #[tokio::test]
    async fn test_failed_capability_does_not_fail_negotiation() {
        let camera = SimCamera::new()
            .with_capabilities(CameraCapabilities {
                continuous_focus: true,
                zoom: Some(ZoomRange { min: 1.0, max: 4.0 }),
                torch: true,
            })
            .reject_constraints();
        let mut manager = CameraManager::new(Arc::new(camera.clone()), 2.0);
        manager.acquire(VideoConstraints::minimal()).await.unwrap();
        let negotiated = manager.negotiate_capabilities().await;
        assert!(!negotiated.continuous_focus);
        assert_eq!(negotiated.zoom, None);
        assert!(negotiated.torch_available);
        assert!(manager.is_acquired());
    }

    #[tokio::test]
    async fn test_torch_toggle_reads_current_state() {
        let camera = SimCamera::new().with_capabilities(CameraCapabilities {
            torch: true,
            ..Default::default()
        });
        let mut manager = CameraManager::new(Arc::new(camera.clone()), 2.0);
        manager.acquire(VideoConstraints::minimal()).await.unwrap();

        assert!(manager.toggle_torch().await.unwrap());
        // Something else switched it off behind our back
        camera.set_torch(false);
        assert!(manager.toggle_torch().await.unwrap());
        assert!(!manager.toggle_torch().await.unwrap());
    }

    #[tokio::test]
    async fn test_torch_toggle_unsupported() {
        let camera = SimCamera::new();
        let mut manager = CameraManager::new(Arc::new(camera), 2.0);
        assert_eq!(
            manager.toggle_torch().await.unwrap_err(),
            CameraError::NoDeviceFound
        );
        manager.acquire(VideoConstraints::minimal()).await.unwrap();
        assert_eq!(
            manager.toggle_torch().await.unwrap_err(),
            CameraError::ConstraintsUnsatisfiable
        );
    }
}
