//! The capture → upload → classify event chain
//!
//! [`CaptureAndClassify`] owns the screen state and drives the collaborators.
//! Nothing escapes it: every failure becomes an alert, and every upload puts
//! the in-flight flag back down on its way out.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::camera::{Camera, Capture, CaptureOptions, ImageRef, Permission};
use crate::predictor::Predictor;
use crate::screen::{Screen, Transition};

/// A user-facing dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn permission_denied() -> Self {
        Self::new("Permission denied", "Allow access to the camera.")
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    pub fn camera(message: impl Into<String>) -> Self {
        Self::new("Camera error", message)
    }

    /// For failures that carry nothing worth showing
    pub fn unknown() -> Self {
        Self::new("Unknown error", "An error occurred.")
    }
}

pub trait Notifier: Send + Sync {
    fn alert(&self, alert: Alert);
}

/// What happens when a capture lands while an upload is still running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Both uploads write their results; whichever finishes last wins
    #[default]
    Race,
    /// Only the newest upload may touch the screen; older results are dropped
    Supersede,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Predicted(String),
    Failed(Alert),
    /// A newer upload started before this one finished (supersede policy only)
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFlow {
    PermissionDenied,
    Cancelled,
    CameraFailed(Alert),
    Uploaded(UploadOutcome),
}

impl CaptureFlow {
    /// True when the user ended up looking at an alert
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CaptureFlow::PermissionDenied
                | CaptureFlow::CameraFailed(_)
                | CaptureFlow::Uploaded(UploadOutcome::Failed(_))
        )
    }
}

#[derive(Clone)]
pub struct CaptureAndClassify {
    camera: Arc<dyn Camera>,
    predictor: Arc<dyn Predictor>,
    notifier: Arc<dyn Notifier>,
    screen: Screen,
    policy: OverlapPolicy,
    tickets: Arc<AtomicU64>,
}

impl CaptureAndClassify {
    pub fn new(
        camera: Arc<dyn Camera>,
        predictor: Arc<dyn Predictor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            camera,
            predictor,
            notifier,
            screen: Screen::new(),
            policy: OverlapPolicy::default(),
            tickets: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Publish into an existing screen, e.g. one a renderer already watches
    pub fn with_screen(mut self, screen: Screen) -> Self {
        self.screen = screen;
        self
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    /// Ask for the camera, take a photo and classify it
    pub async fn capture_photo(&self) -> CaptureFlow {
        if self.camera.request_permission().await == Permission::Denied {
            self.notifier.alert(Alert::permission_denied());
            return CaptureFlow::PermissionDenied;
        }

        match self.camera.launch(CaptureOptions::default()).await {
            Ok(Capture::Cancelled) => {
                log::debug!("Capture cancelled by user");
                CaptureFlow::Cancelled
            }
            Ok(Capture::Asset(image)) => {
                self.screen.apply(Transition::Captured(image.clone()));
                CaptureFlow::Uploaded(self.upload_and_classify(image).await)
            }
            Err(e) => {
                log::error!("Camera error: {}", e);
                let alert = Alert::camera(e.to_string());
                self.notifier.alert(alert.clone());
                CaptureFlow::CameraFailed(alert)
            }
        }
    }

    /// Upload an image and publish the label it gets back
    pub async fn upload_and_classify(&self, image: ImageRef) -> UploadOutcome {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        self.screen.apply(Transition::RequestStarted);
        let in_flight = InFlight {
            controller: self,
            ticket,
        };

        let result = AssertUnwindSafe(self.predictor.classify(&image))
            .catch_unwind()
            .await;

        if in_flight.is_stale() {
            log::debug!("Dropping superseded result for {}", image);
            return UploadOutcome::Superseded;
        }

        let outcome = match result {
            Ok(Ok(label)) => {
                log::info!("Prediction for {}: {}", image, label);
                self.screen.apply(Transition::Predicted(label.clone()));
                UploadOutcome::Predicted(label)
            }
            Ok(Err(e)) => {
                log::error!("API error: {}", e);
                let alert = Alert::error(e.to_string());
                self.notifier.alert(alert.clone());
                UploadOutcome::Failed(alert)
            }
            Err(_) => {
                log::error!("Unknown error while classifying {}", image);
                let alert = Alert::unknown();
                self.notifier.alert(alert.clone());
                UploadOutcome::Failed(alert)
            }
        };

        drop(in_flight);
        outcome
    }

    fn is_stale(&self, ticket: u64) -> bool {
        self.policy == OverlapPolicy::Supersede && self.tickets.load(Ordering::SeqCst) != ticket
    }
}

/// Lowers the in-flight flag when an upload ends, including when its future
/// is dropped mid-request. A superseded upload leaves the flag to the newer one.
struct InFlight<'a> {
    controller: &'a CaptureAndClassify,
    ticket: u64,
}

impl InFlight<'_> {
    fn is_stale(&self) -> bool {
        self.controller.is_stale(self.ticket)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.is_stale() {
            self.controller.screen.apply(Transition::RequestFinished);
        }
    }
}
