use super::device::{CaptureDevice, DeviceLease, StreamRequest};
use super::import::{encode_import, read_image_file};
use super::state::{CaptureEvent, CaptureState, Effect, Transition};
use crate::config::CaptureConfig;
use crate::encoder::{encode_frame_region, EncodedImage};
use crate::error::{CaptureError, ImportError};
use crate::notify::{Notification, NotificationBus};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Owns the camera session: device lease, countdown timer and the current photo
pub struct CaptureController {
    config: CaptureConfig,
    device: Arc<dyn CaptureDevice>,
    notifications: NotificationBus,
    session: Arc<Mutex<Session>>,
}

struct Session {
    state: CaptureState,
    lease: Option<DeviceLease>,
    countdown: Option<CancellationToken>,
    result: Option<EncodedImage>,
    /// Bumped on every start/stop so late device grants can be detected
    generation: u64,
}

impl Session {
    fn transition(&self, event: CaptureEvent) -> Result<Transition, CaptureError> {
        self.state
            .apply(event)
            .ok_or_else(|| CaptureError::InvalidTransition {
                action: format!("{:?}", event),
                state: self.state.to_string(),
            })
    }

    /// Move to the next state, carrying out the synchronous part of its
    /// effect. Capturing and arming the timer are left to the caller.
    fn enter(&mut self, transition: Transition) {
        match transition.effect {
            Effect::Release => self.release_resources(),
            // Invalidates any grant still in flight from an earlier start
            Effect::AcquireDevice => self.generation += 1,
            Effect::None | Effect::ArmTimer | Effect::CaptureAndRelease => {}
        }
        self.state = transition.next;
    }

    fn release_resources(&mut self) {
        if let Some(token) = self.countdown.take() {
            token.cancel();
        }
        if let Some(lease) = self.lease.take() {
            lease.release();
        }
        self.generation += 1;
    }

    /// Cancel timers, release the device and go idle
    fn teardown(&mut self) {
        self.release_resources();
        self.state = CaptureState::Idle;
    }
}

#[derive(Clone, Copy)]
struct EncodeSettings {
    aspect_ratio: f64,
    jpeg_quality: u8,
}

impl CaptureController {
    pub fn new(
        config: CaptureConfig,
        device: Arc<dyn CaptureDevice>,
        notifications: NotificationBus,
    ) -> Self {
        Self {
            config,
            device,
            notifications,
            session: Arc::new(Mutex::new(Session {
                state: CaptureState::Idle,
                lease: None,
                countdown: None,
                result: None,
                generation: 0,
            })),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.session.lock().state
    }

    /// The captured or imported photo, if any
    pub fn result(&self) -> Option<EncodedImage> {
        self.session.lock().result.clone()
    }

    pub fn take_result(&self) -> Option<EncodedImage> {
        self.session.lock().result.take()
    }

    /// Discard the current photo without touching the device
    pub fn clear(&self) {
        if self.session.lock().result.take().is_some() {
            debug!("Cleared captured photo");
        }
    }

    fn settings(&self) -> EncodeSettings {
        EncodeSettings {
            aspect_ratio: self.config.aspect_ratio,
            jpeg_quality: self.config.jpeg_quality,
        }
    }

    /// Acquire the camera. Also retries after a device error.
    pub async fn start(&self) -> Result<(), CaptureError> {
        let generation = {
            let mut session = self.session.lock();
            let transition = session.transition(CaptureEvent::Start)?;
            session.enter(transition);
            session.generation
        };

        let request = StreamRequest::from(&self.config);
        info!(
            "Requesting capture device '{}' ({}x{}, facing {})",
            self.device.name(),
            request.ideal_resolution.0,
            request.ideal_resolution.1,
            request.facing_mode
        );

        let opened = self.device.open(&request).await;

        let mut session = self.session.lock();
        let stale = session.generation != generation
            || session.state != CaptureState::AcquiringDevice;

        match opened {
            Ok(stream) => {
                let lease = DeviceLease::new(self.device.name(), stream);
                if stale {
                    info!("Capture stopped while acquiring the device; releasing it");
                    lease.release();
                    return Ok(());
                }
                let transition = session.transition(CaptureEvent::DeviceGranted)?;
                session.enter(transition);
                session.lease = Some(lease);
                debug!("Capture state -> {}", session.state);
                Ok(())
            }
            Err(device_error) => {
                if stale {
                    debug!("Ignoring device error after stop: {}", device_error);
                    return Ok(());
                }
                let transition =
                    session.transition(CaptureEvent::DeviceFailed(device_error.kind))?;
                session.enter(transition);
                drop(session);

                error!("Failed to acquire capture device: {}", device_error);
                let (title, description) = device_error.kind.user_message();
                self.notifications
                    .publish(Notification::error(title, description));
                Err(device_error.into())
            }
        }
    }

    /// Release the device, cancel any countdown and return to idle
    pub fn stop(&self) {
        let mut session = self.session.lock();
        match session.transition(CaptureEvent::Stop) {
            Ok(transition) => {
                if transition.effect == Effect::Release {
                    debug!("Stopping capture session from {}", session.state);
                }
                session.enter(transition);
            }
            Err(e) => warn!("Stop rejected: {}", e),
        }
    }

    /// Leave the error state without retrying
    pub fn dismiss_error(&self) -> Result<(), CaptureError> {
        let mut session = self.session.lock();
        let transition = session.transition(CaptureEvent::Retry)?;
        session.enter(transition);
        Ok(())
    }

    /// Grab a frame right away, then release the device
    pub fn capture_now(&self) -> Result<EncodedImage, CaptureError> {
        let mut session = self.session.lock();
        session.transition(CaptureEvent::CaptureNow)?;
        capture_and_release(&mut session, self.settings(), &self.notifications)
    }

    /// Start the timed capture; the photo is taken when the countdown ends
    pub async fn start_countdown(&self) -> Result<(), CaptureError> {
        let mut session = self.session.lock();
        let transition =
            session.transition(CaptureEvent::StartCountdown(self.config.countdown_seconds))?;

        match transition.effect {
            Effect::CaptureAndRelease => {
                capture_and_release(&mut session, self.settings(), &self.notifications)?;
                Ok(())
            }
            Effect::ArmTimer => {
                let token = CancellationToken::new();
                session.enter(transition);
                session.countdown = Some(token.clone());
                info!("Countdown started at {}", self.config.countdown_seconds);

                tokio::spawn(run_countdown(
                    Arc::clone(&self.session),
                    token,
                    self.config.countdown_tick(),
                    self.settings(),
                    self.notifications.clone(),
                ));
                Ok(())
            }
            other => {
                warn!("Unexpected countdown effect {:?}", other);
                Ok(())
            }
        }
    }

    /// Remaining countdown steps, if a timed capture is running
    pub fn countdown_remaining(&self) -> Option<u8> {
        match self.session.lock().state {
            CaptureState::CountingDown(n) => Some(n),
            _ => None,
        }
    }

    /// Import a photo from disk, bypassing the camera
    pub async fn import_file(&self, path: &Path) -> Result<EncodedImage, ImportError> {
        let imported = read_image_file(path, self.config.max_import_bytes).await;
        self.finish_import(imported)
    }

    /// Import in-memory image bytes with a declared mime type
    pub fn import_bytes(&self, mime: &str, bytes: &[u8]) -> Result<EncodedImage, ImportError> {
        let imported = encode_import(mime, bytes, self.config.max_import_bytes);
        self.finish_import(imported)
    }

    fn finish_import(
        &self,
        imported: Result<EncodedImage, ImportError>,
    ) -> Result<EncodedImage, ImportError> {
        match imported {
            Ok(image) => {
                self.session.lock().result = Some(image.clone());
                self.notifications.publish(Notification::success(
                    "Image loaded",
                    "The image was loaded successfully.",
                ));
                Ok(image)
            }
            Err(e) => {
                let (title, description) = e.user_message();
                self.notifications
                    .publish(Notification::error(title, description));
                Err(e)
            }
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.session.lock().teardown();
    }
}

fn capture_and_release(
    session: &mut Session,
    settings: EncodeSettings,
    notifications: &NotificationBus,
) -> Result<EncodedImage, CaptureError> {
    let grabbed = match session.lease.as_mut() {
        Some(lease) => lease.grab_frame(),
        None => Err(CaptureError::FrameGrab {
            details: "no device is held".to_string(),
        }),
    };

    // The device goes back whether or not the frame was usable
    session.teardown();

    let encoded = grabbed.and_then(|frame| {
        encode_frame_region(&frame, settings.aspect_ratio, settings.jpeg_quality)
            .map_err(CaptureError::from)
    });

    match encoded {
        Ok(image) => {
            info!("Captured photo ({} data URL chars)", image.as_str().len());
            session.result = Some(image.clone());
            notifications.publish(Notification::success(
                "Photo captured",
                "The image was saved successfully.",
            ));
            Ok(image)
        }
        Err(e) => {
            error!("Capture failed: {}", e);
            notifications.publish(Notification::error("Capture failed", e.to_string()));
            Err(e)
        }
    }
}

enum TickOutcome {
    Continue,
    Done,
}

async fn run_countdown(
    session: Arc<Mutex<Session>>,
    token: CancellationToken,
    tick: Duration,
    settings: EncodeSettings,
    notifications: NotificationBus,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Countdown cancelled");
                return;
            }
            _ = tokio::time::sleep(tick) => {}
        }

        let outcome = {
            let mut session = session.lock();
            if token.is_cancelled() {
                TickOutcome::Done
            } else {
                match session.state.apply(CaptureEvent::Tick) {
                    Some(
                        transition @ Transition {
                            effect: Effect::None,
                            ..
                        },
                    ) => {
                        session.enter(transition);
                        debug!("Countdown -> {}", transition.next);
                        TickOutcome::Continue
                    }
                    Some(Transition {
                        effect: Effect::CaptureAndRelease,
                        ..
                    }) => {
                        // Failures were already published
                        let _ = capture_and_release(&mut session, settings, &notifications);
                        TickOutcome::Done
                    }
                    _ => TickOutcome::Done,
                }
            }
        };

        if let TickOutcome::Done = outcome {
            return;
        }
    }
}
