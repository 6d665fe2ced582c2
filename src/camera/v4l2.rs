use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture as _;
use v4l::{Device, Format, FourCC};

use super::{Camera, Capture, CaptureOptions, ImageRef, Permission};
use crate::error::CameraError;

/// Configuration for a Video4Linux still capture
#[derive(Clone, Debug)]
pub struct V4l2Config {
    device: String,
    width: u32,
    height: u32,
    warmup_frames: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
            warmup_frames: 5,
        }
    }
}

impl V4l2Config {
    /// Set the device path (e.g., "/dev/video0").
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Frames dropped before the kept one while auto-exposure settles
    pub fn with_warmup_frames(mut self, frames: u32) -> Self {
        self.warmup_frames = frames;
        self
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

/// Grabs a single MJPEG frame per capture and keeps it as a `.jpg`
///
/// Captured files live in a private temporary directory that is removed when
/// the camera is dropped.
#[derive(Debug)]
pub struct V4l2Camera {
    config: V4l2Config,
    captures: TempDir,
    counter: AtomicUsize,
}

impl V4l2Camera {
    pub fn new(config: V4l2Config) -> Result<Self, CameraError> {
        let captures = tempfile::Builder::new().prefix("leafscan-").tempdir()?;
        Ok(Self {
            config,
            captures,
            counter: AtomicUsize::new(0),
        })
    }

    fn next_capture_path(&self) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.captures.path().join(format!("capture-{:04}.jpg", n))
    }

    /// Open the device, switch to MJPEG and return one encoded frame
    fn grab_frame(config: &V4l2Config) -> Result<Vec<u8>, CameraError> {
        let device = Device::with_path(config.device())?;

        let mut format = Format::new(config.width, config.height, FourCC::new(b"MJPG"));
        format = device.set_format(&format)?;

        // The driver may silently pick another format
        if format.fourcc != FourCC::new(b"MJPG") {
            return Err(CameraError::Device(
                "MJPEG format not supported by device".to_string(),
            ));
        }

        let mut stream = MmapStream::with_buffers(&device, Type::VideoCapture, 4)?;
        for _ in 0..config.warmup_frames {
            CaptureStream::next(&mut stream)?;
        }

        let (frame, metadata) = CaptureStream::next(&mut stream)?;
        let used = (metadata.bytesused as usize).min(frame.len());
        if used == 0 {
            return Err(CameraError::Device("device returned an empty frame".to_string()));
        }
        Ok(frame[..used].to_vec())
    }
}

#[async_trait]
impl Camera for V4l2Camera {
    async fn request_permission(&self) -> Permission {
        let device = self.config.device().to_string();
        let opened = tokio::task::spawn_blocking(move || Device::with_path(&device).map(drop)).await;

        match opened {
            Ok(Err(e)) if e.kind() == ErrorKind::PermissionDenied => {
                log::warn!("Access to {} denied: {}", self.config.device(), e);
                Permission::Denied
            }
            _ => Permission::Granted,
        }
    }

    async fn launch(&self, options: CaptureOptions) -> Result<Capture, CameraError> {
        if options.allows_editing {
            log::debug!("V4L2 captures cannot be edited, keeping the raw frame");
        }

        let config = self.config.clone();
        let frame = tokio::task::spawn_blocking(move || Self::grab_frame(&config))
            .await
            .map_err(|e| CameraError::Device(format!("capture task failed: {}", e)))??;

        let path = self.next_capture_path();
        tokio::fs::write(&path, &frame).await?;
        log::info!("Captured {} bytes to {}", frame.len(), path.display());

        Ok(Capture::Asset(ImageRef::from_path(&path)))
    }
}
