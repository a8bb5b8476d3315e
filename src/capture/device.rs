use crate::config::CaptureConfig;
use crate::error::{CaptureError, DeviceError, DeviceErrorKind};
use crate::frame::FrameData;
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Parameters sent when asking for a video device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing_mode: String,
    pub ideal_resolution: (u32, u32),
}

impl From<&CaptureConfig> for StreamRequest {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            facing_mode: config.facing_mode.clone(),
            ideal_resolution: config.ideal_resolution,
        }
    }
}

/// Source of exclusive live video streams
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire the device. The returned stream holds it until released.
    async fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, DeviceError>;
}

/// A live stream on an acquired device
pub trait VideoStream: Send {
    fn grab_frame(&mut self) -> Result<FrameData, CaptureError>;

    /// Give the device back. Must be idempotent.
    fn release(&mut self);
}

/// Scoped ownership of an acquired stream; dropping it releases the device
pub struct DeviceLease {
    device: String,
    stream: Option<Box<dyn VideoStream>>,
}

impl DeviceLease {
    pub fn new<S: Into<String>>(device: S, stream: Box<dyn VideoStream>) -> Self {
        let device = device.into();
        info!("Acquired capture device '{}'", device);
        Self {
            device,
            stream: Some(stream),
        }
    }

    pub fn grab_frame(&mut self) -> Result<FrameData, CaptureError> {
        match self.stream.as_mut() {
            Some(stream) => stream.grab_frame(),
            None => Err(CaptureError::FrameGrab {
                details: format!("device '{}' already released", self.device),
            }),
        }
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            info!("Released capture device '{}'", self.device);
        }
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Camera that renders a moving gradient instead of reading hardware.
///
/// Enforces exclusivity like a real device: a second open while a stream is
/// live fails with `NotReadable`.
pub struct SyntheticCamera {
    name: String,
    resolution: Mutex<Option<(u32, u32)>>,
    failure: Mutex<Option<DeviceErrorKind>>,
    open_delay: Mutex<Duration>,
    held: Arc<AtomicBool>,
    opens: AtomicU64,
    releases: Arc<AtomicU64>,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self {
            name: "synthetic".to_string(),
            resolution: Mutex::new(None),
            failure: Mutex::new(None),
            open_delay: Mutex::new(Duration::ZERO),
            held: Arc::new(AtomicBool::new(false)),
            opens: AtomicU64::new(0),
            releases: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Force a frame size instead of honoring the request hint
    pub fn with_resolution(self, width: u32, height: u32) -> Self {
        *self.resolution.lock() = Some((width, height));
        self
    }

    pub fn with_open_delay(self, delay: Duration) -> Self {
        *self.open_delay.lock() = delay;
        self
    }

    /// Make subsequent opens fail with `kind` (or succeed again with `None`)
    pub fn fail_with(&self, kind: Option<DeviceErrorKind>) {
        *self.failure.lock() = kind;
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for SyntheticCamera {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, DeviceError> {
        let delay = *self.open_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failure = *self.failure.lock();
        if let Some(kind) = failure {
            warn!("Synthetic camera configured to fail with {}", kind);
            return Err(DeviceError::new(kind, "synthetic failure"));
        }

        if self.held.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::new(
                DeviceErrorKind::NotReadable,
                "device is already in use",
            ));
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        let forced = *self.resolution.lock();
        let (width, height) = forced.unwrap_or(request.ideal_resolution);
        debug!(
            "Synthetic camera streaming {}x{} (facing {})",
            width, height, request.facing_mode
        );

        Ok(Box::new(SyntheticStream {
            width,
            height,
            frame_counter: 0,
            held: Arc::clone(&self.held),
            releases: Arc::clone(&self.releases),
            released: false,
        }))
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    frame_counter: u64,
    held: Arc<AtomicBool>,
    releases: Arc<AtomicU64>,
    released: bool,
}

impl VideoStream for SyntheticStream {
    fn grab_frame(&mut self) -> Result<FrameData, CaptureError> {
        if self.released {
            return Err(CaptureError::FrameGrab {
                details: "stream released".to_string(),
            });
        }

        let frame_id = self.frame_counter;
        self.frame_counter += 1;

        let shift = (frame_id % 256) as u32;
        let (width, height) = (self.width, self.height);
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 255 / width.max(1) + shift) % 256) as u8,
                ((y * 255 / height.max(1)) % 256) as u8,
                (((x + y) / 4 + shift) % 256) as u8,
            ])
        });

        trace!("Generated synthetic frame {} ({}x{})", frame_id, width, height);
        Ok(FrameData::from_rgb_image(frame_id, image))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.held.store(false, Ordering::SeqCst);
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.release();
    }
}
