//! Camera collaborators
//!
//! A camera answers two questions: may we use it, and what did the user
//! shoot. Backends are selected by the front-end; the controller only sees
//! the [`Camera`] trait.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::CameraError;

pub mod file;

#[cfg(feature = "v4l2")]
pub mod v4l2;

#[cfg(feature = "gui")]
pub mod dialog;

pub use file::FileCamera;

#[cfg(feature = "v4l2")]
pub use v4l2::{V4l2Camera, V4l2Config};

#[cfg(feature = "gui")]
pub use dialog::DialogCamera;

/// Opaque reference to a captured image, kept as a URI string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Build a `file://` reference; relative or unrepresentable paths are kept verbatim
    pub fn from_path(path: &Path) -> Self {
        match Url::from_file_path(path) {
            Ok(url) => Self(url.into()),
            Err(()) => Self(path.display().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local file behind this reference, if there is one
    pub fn to_file_path(&self) -> Option<PathBuf> {
        match Url::parse(&self.0) {
            Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
            // Windows drive letters parse as one-letter schemes
            Ok(url) if url.scheme().len() == 1 => Some(PathBuf::from(&self.0)),
            Ok(_) => None,
            Err(_) => Some(PathBuf::from(&self.0)),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(
            Url::parse(&self.0).map(|url| url.scheme().to_string()).as_deref(),
            Ok("http") | Ok("https")
        )
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Options handed to the capture UI
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    /// Let the user crop/rotate before confirming
    pub allows_editing: bool,
    /// 0.0 - 1.0, 1.0 = no lossy re-encode
    pub quality: f32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            allows_editing: true,
            quality: 1.0,
        }
    }
}

/// Result of a capture hand-off
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Cancelled,
    Asset(ImageRef),
}

#[async_trait]
pub trait Camera: Send + Sync {
    async fn request_permission(&self) -> Permission;

    async fn launch(&self, options: CaptureOptions) -> Result<Capture, CameraError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_ref_from_absolute_path() {
        let path = std::env::temp_dir().join("leaf one.jpg");
        let image = ImageRef::from_path(&path);
        assert!(image.as_str().starts_with("file://"));
        assert_eq!(image.to_file_path(), Some(path));
        assert!(!image.is_remote());
    }

    #[test]
    fn test_image_ref_plain_path() {
        let image = ImageRef::new("captures/leaf.jpg");
        assert_eq!(image.to_file_path(), Some(PathBuf::from("captures/leaf.jpg")));
    }

    #[test]
    fn test_image_ref_remote() {
        let image = ImageRef::new("https://example.com/leaf.jpg");
        assert!(image.is_remote());
        assert_eq!(image.to_file_path(), None);

        let image = ImageRef::new("blob:https://example.com/1234");
        assert!(!image.is_remote());
        assert_eq!(image.to_file_path(), None);
    }

    #[test]
    fn test_capture_options_default() {
        let options = CaptureOptions::default();
        assert!(options.allows_editing);
        assert_eq!(options.quality, 1.0);
    }
}
