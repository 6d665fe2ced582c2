use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::io::AsyncReadExt;

use super::{Camera, Capture, CaptureOptions, ImageRef, Permission};
use crate::error::CameraError;

/// Camera backed by image files already on disk
///
/// Each `launch` hands out the next queued file as if it had just been shot.
/// An empty queue behaves like the user backing out of the camera.
///
/// `request_permission` takes the next file off the queue and checks it; only
/// files that passed the check are handed out by `launch`. With several
/// captures running at once, every file that is launched was checked, and a
/// refused file is never launched.
#[derive(Debug, Default)]
pub struct FileCamera {
    queue: Mutex<VecDeque<PathBuf>>,
    checked: Mutex<VecDeque<PathBuf>>,
}

impl FileCamera {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            queue: Mutex::new(paths.into_iter().map(Into::into).collect()),
            checked: Mutex::default(),
        }
    }

    fn lock(queue: &Mutex<VecDeque<PathBuf>>) -> MutexGuard<'_, VecDeque<PathBuf>> {
        queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Camera for FileCamera {
    async fn request_permission(&self) -> Permission {
        let next = Self::lock(&self.queue).pop_front();
        let Some(path) = next else {
            return Permission::Granted;
        };

        // Only an access refusal counts as a denial; other errors surface on launch
        match tokio::fs::File::open(&path).await {
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                log::warn!("Access to {} denied: {}", path.display(), e);
                Permission::Denied
            }
            _ => {
                Self::lock(&self.checked).push_back(path);
                Permission::Granted
            }
        }
    }

    async fn launch(&self, options: CaptureOptions) -> Result<Capture, CameraError> {
        let checked = Self::lock(&self.checked).pop_front();
        let next = checked.or_else(|| Self::lock(&self.queue).pop_front());
        let Some(path) = next else {
            log::debug!("No queued image, treating capture as cancelled");
            return Ok(Capture::Cancelled);
        };

        log::debug!(
            "Capturing {} (editing: {}, quality: {:.2})",
            path.display(),
            options.allows_editing,
            options.quality
        );

        let path = tokio::fs::canonicalize(&path).await?;
        check_image(&path).await.map(Capture::Asset)
    }
}

/// Confirm a file looks like an image and return its reference
///
/// Only the header is sniffed; anything but JPEG is still uploaded as-is.
pub async fn check_image(path: &Path) -> Result<ImageRef, CameraError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut header = [0u8; 32];
    let read = file.read(&mut header).await?;

    let format = image::guess_format(&header[..read])
        .map_err(|_| CameraError::NotAnImage(path.display().to_string()))?;
    if format != image::ImageFormat::Jpeg {
        log::warn!(
            "{} is {:?}, it will still be uploaded as image/jpeg",
            path.display(),
            format
        );
    }

    Ok(ImageRef::from_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Smallest header image::guess_format recognizes as JPEG
    const JPEG_HEADER: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    fn jpeg_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(&JPEG_HEADER).unwrap();
        file.write_all(&[0u8; 64]).unwrap();
        file
    }

    #[tokio::test]
    async fn test_launch_serves_queue_in_order() {
        let first = jpeg_file();
        let second = jpeg_file();
        let camera = FileCamera::new([first.path(), second.path()]);

        let capture = camera.launch(CaptureOptions::default()).await.unwrap();
        let expected = ImageRef::from_path(&first.path().canonicalize().unwrap());
        assert_eq!(capture, Capture::Asset(expected));

        let capture = camera.launch(CaptureOptions::default()).await.unwrap();
        let expected = ImageRef::from_path(&second.path().canonicalize().unwrap());
        assert_eq!(capture, Capture::Asset(expected));
    }

    #[tokio::test]
    async fn test_empty_queue_is_cancel() {
        let camera = FileCamera::default();
        assert_eq!(camera.request_permission().await, Permission::Granted);
        let capture = camera.launch(CaptureOptions::default()).await.unwrap();
        assert_eq!(capture, Capture::Cancelled);
    }

    #[tokio::test]
    async fn test_rejects_non_image() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not pixels").unwrap();

        let camera = FileCamera::new([file.path()]);
        let err = camera.launch(CaptureOptions::default()).await.unwrap_err();
        assert!(matches!(err, CameraError::NotAnImage(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let camera = FileCamera::new(["/nonexistent/leafscan/leaf.jpg"]);
        assert_eq!(camera.request_permission().await, Permission::Granted);
        let err = camera.launch(CaptureOptions::default()).await.unwrap_err();
        assert!(matches!(err, CameraError::Io(_)));
    }

    #[tokio::test]
    async fn test_permission_check_reserves_file() {
        let first = jpeg_file();
        let second = jpeg_file();
        let camera = FileCamera::new([first.path(), second.path()]);

        // Two captures ask for permission before either launches
        assert_eq!(camera.request_permission().await, Permission::Granted);
        assert_eq!(camera.request_permission().await, Permission::Granted);

        let capture = camera.launch(CaptureOptions::default()).await.unwrap();
        let expected = ImageRef::from_path(&first.path().canonicalize().unwrap());
        assert_eq!(capture, Capture::Asset(expected));

        let capture = camera.launch(CaptureOptions::default()).await.unwrap();
        let expected = ImageRef::from_path(&second.path().canonicalize().unwrap());
        assert_eq!(capture, Capture::Asset(expected));

        assert_eq!(
            camera.launch(CaptureOptions::default()).await.unwrap(),
            Capture::Cancelled
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_refused_file_is_never_launched() {
        use std::os::unix::fs::PermissionsExt;

        let locked = jpeg_file();
        std::fs::set_permissions(locked.path(), std::fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::File::open(locked.path()).is_ok() {
            // Running as root, the mode bits are not enforced
            return;
        }
        let open = jpeg_file();
        let camera = FileCamera::new([locked.path(), open.path()]);

        assert_eq!(camera.request_permission().await, Permission::Denied);
        assert_eq!(camera.request_permission().await, Permission::Granted);

        let capture = camera.launch(CaptureOptions::default()).await.unwrap();
        let expected = ImageRef::from_path(&open.path().canonicalize().unwrap());
        assert_eq!(capture, Capture::Asset(expected));
    }
}
