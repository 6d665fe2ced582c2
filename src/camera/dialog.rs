use async_trait::async_trait;

use super::file::check_image;
use super::{Camera, Capture, CaptureOptions, Permission};
use crate::error::CameraError;

/// Desktop stand-in for the camera UI: a native file picker
///
/// Closing the dialog without a selection is a cancelled capture.
#[derive(Debug, Default)]
pub struct DialogCamera;

#[async_trait]
impl Camera for DialogCamera {
    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn launch(&self, _options: CaptureOptions) -> Result<Capture, CameraError> {
        let picked = rfd::AsyncFileDialog::new()
            .set_title("Take a photo")
            .add_filter("Images", &["jpg", "jpeg", "png", "webp", "tiff"])
            .pick_file()
            .await;

        match picked {
            Some(handle) => check_image(handle.path()).await.map(Capture::Asset),
            None => Ok(Capture::Cancelled),
        }
    }
}
