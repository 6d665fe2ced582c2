// Library exports for reuse by the CLI, the GUI and other front-ends
pub mod camera;
pub mod cli;
pub mod config_file;
pub mod controller;
pub mod error;
pub mod json_output;
pub mod payload;
pub mod predictor;
pub mod screen;
pub mod utils;

// Re-export commonly used types
pub use camera::{Camera, Capture, CaptureOptions, FileCamera, ImageRef, Permission};
pub use controller::{
    Alert, CaptureAndClassify, CaptureFlow, Notifier, OverlapPolicy, UploadOutcome,
};
pub use error::{CameraError, ClassifyError};
pub use json_output::JsonMessage;
pub use payload::{PayloadBuilder, PayloadKind};
pub use predictor::{HttpPredictor, Predictor, DEFAULT_ENDPOINT};
pub use screen::{Screen, ScreenState, Transition};
