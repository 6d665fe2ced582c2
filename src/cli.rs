use clap::{Parser, ValueEnum};
use reqwest::Url;
use std::path::PathBuf;

use crate::controller::OverlapPolicy;
use crate::error::ClassifyError;
use crate::payload::PayloadKind;
use crate::predictor::{self, DEFAULT_ENDPOINT};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CameraSource {
    /// Treat the --image files as captured photos
    #[value(name = "file")]
    File,
    /// Grab a frame from a Video4Linux device (requires the v4l2 feature)
    #[value(name = "v4l2")]
    V4l2,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum PayloadChoice {
    /// Pick the strategy for the platform we are running on
    #[value(name = "auto")]
    Auto,
    /// Read the image into memory before attaching it
    #[value(name = "blob")]
    Blob,
    /// Stream the image file straight into the request
    #[value(name = "uri")]
    Uri,
}

impl PayloadChoice {
    pub fn resolve(self) -> PayloadKind {
        match self {
            PayloadChoice::Auto => PayloadKind::detect(),
            PayloadChoice::Blob => PayloadKind::Blob,
            PayloadChoice::Uri => PayloadKind::Uri,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OverlapChoice {
    /// Every upload writes its result; the last one to finish wins
    #[value(name = "race")]
    Race,
    /// Results of uploads overtaken by a newer capture are discarded
    #[value(name = "supersede")]
    Supersede,
}

impl From<OverlapChoice> for OverlapPolicy {
    fn from(choice: OverlapChoice) -> Self {
        match choice {
            OverlapChoice::Race => OverlapPolicy::Race,
            OverlapChoice::Supersede => OverlapPolicy::Supersede,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "leafscan",
    about = "Capture a leaf photo and ask the prediction service what it shows",
    long_about = "
Leafscan - capture and classify

Takes a photo (an image file, or a frame from a V4L2 camera), uploads it as a
multipart form to a prediction service and prints the label it returns.

Example Usage:
  # Classify one photo against the local service (http://localhost:8000/predict)
  leafscan -i ~/Photos/tomato_leaf.jpg

  # Two captures in quick succession; the last answer to arrive is shown
  leafscan -i leaf_a.jpg -i leaf_b.jpg

  # Same, but only the newest capture may update the result
  leafscan -i leaf_a.jpg -i leaf_b.jpg --overlap supersede

  # Grab a frame from a webcam
  leafscan --camera v4l2 --device /dev/video0

  # Another service, JSON lines on stdout for a front-end
  leafscan -i leaf.jpg --endpoint http://192.168.1.20:8000/predict --json"
)]
pub struct Args {
    /// Image files to capture (can be specified multiple times)
    #[arg(short = 'i', long = "image", value_name = "FILE")]
    pub images: Vec<PathBuf>,

    /// Where photos come from
    #[arg(long = "camera", default_value = "file")]
    pub camera: CameraSource,

    /// Video4Linux device used by --camera v4l2
    #[arg(long = "device", default_value = "/dev/video0", value_name = "PATH")]
    pub device: String,

    /// Prediction endpoint
    #[arg(long = "endpoint", default_value = DEFAULT_ENDPOINT, value_name = "URL")]
    pub endpoint: String,

    /// How the image is attached to the upload
    #[arg(long = "payload", default_value = "auto")]
    pub payload: PayloadChoice,

    /// What to do when a capture lands while an upload is still in flight
    #[arg(long = "overlap", default_value = "race")]
    pub overlap: OverlapChoice,

    /// JSON configuration file (command-line flags take precedence)
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Emit JSON lines instead of styled output
    #[arg(long = "json")]
    pub json: bool,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    pub fn parse_endpoint(&self) -> Result<Url, ClassifyError> {
        predictor::parse_endpoint(&self.endpoint)
    }

    pub fn payload_kind(&self) -> PayloadKind {
        self.payload.resolve()
    }

    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.overlap.into()
    }
}


// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            images: vec![],
            camera: CameraSource::File,
            device: "/dev/video0".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            payload: PayloadChoice::Auto,
            overlap: OverlapChoice::Race,
            config_file: None,
            json: false,
            verbose: false,
        }
    }
}
