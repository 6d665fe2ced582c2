//! Multipart payload construction
//!
//! The upload always carries a single part named `file`, labelled `leaf.jpg`
//! with type `image/jpeg`. How the bytes get into that part depends on where
//! the client runs: a browser-hosted client has to fetch its image reference
//! into a blob first, a native client can hand the file over directly.
//! The strategy is chosen once at startup.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::camera::ImageRef;
use crate::error::ClassifyError;

pub const FIELD_NAME: &str = "file";
pub const FILE_NAME: &str = "leaf.jpg";
pub const MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// Fetch the reference into memory, then attach the bytes
    Blob,
    /// Stream the referenced local file without reading it up front
    Uri,
}

impl PayloadKind {
    /// Capability check: browser targets can only work with blobs
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            PayloadKind::Blob
        } else {
            PayloadKind::Uri
        }
    }

    pub fn builder(self, client: reqwest::Client) -> Box<dyn PayloadBuilder> {
        match self {
            PayloadKind::Blob => Box::new(BlobPayload::new(client)),
            PayloadKind::Uri => Box::new(UriPayload),
        }
    }
}

#[async_trait]
pub trait PayloadBuilder: Send + Sync {
    fn kind(&self) -> PayloadKind;

    async fn build(&self, image: &ImageRef) -> Result<Form, ClassifyError>;
}

fn image_part(part: Part) -> Result<Form, ClassifyError> {
    let part = part.file_name(FILE_NAME).mime_str(MIME_TYPE)?;
    Ok(Form::new().part(FIELD_NAME, part))
}

fn local_path(image: &ImageRef) -> Result<std::path::PathBuf, ClassifyError> {
    image
        .to_file_path()
        .ok_or_else(|| ClassifyError::UnsupportedRef(image.to_string()))
}

/// Browser-style payload: resolve the reference to bytes, then wrap them
#[derive(Debug, Clone)]
pub struct BlobPayload {
    client: reqwest::Client,
}

impl BlobPayload {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>, ClassifyError> {
        if image.is_remote() {
            let fetch_error = |source: reqwest::Error| ClassifyError::Fetch {
                uri: image.to_string(),
                source,
            };
            let response = self
                .client
                .get(image.as_str())
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(fetch_error)?;
            let bytes = response.bytes().await.map_err(fetch_error)?;
            return Ok(bytes.to_vec());
        }

        let path = local_path(image)?;
        tokio::fs::read(&path)
            .await
            .map_err(|source| ClassifyError::Payload {
                uri: image.to_string(),
                source,
            })
    }
}

#[async_trait]
impl PayloadBuilder for BlobPayload {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Blob
    }

    async fn build(&self, image: &ImageRef) -> Result<Form, ClassifyError> {
        let bytes = self.fetch(image).await?;
        log::debug!("Fetched {} bytes from {}", bytes.len(), image);
        image_part(Part::bytes(bytes))
    }
}

/// Native-style payload: attach the file behind the reference as a stream
#[derive(Debug, Clone, Copy, Default)]
pub struct UriPayload;

#[async_trait]
impl PayloadBuilder for UriPayload {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Uri
    }

    async fn build(&self, image: &ImageRef) -> Result<Form, ClassifyError> {
        let path = local_path(image)?;
        let read_error = |source: std::io::Error| ClassifyError::Payload {
            uri: image.to_string(),
            source,
        };

        let file = tokio::fs::File::open(&path).await.map_err(read_error)?;
        let length = file.metadata().await.map_err(read_error)?.len();
        log::debug!("Streaming {} ({} bytes)", path.display(), length);

        image_part(Part::stream_with_length(file, length))
    }
}
