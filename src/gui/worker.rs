// Capture worker for the GUI
// Runs the capture-and-classify controller on a tokio runtime in a background thread

use super::AlertQueue;
use anyhow::{Context, Result};
use eframe::egui;
use leafscan::camera::DialogCamera;
use leafscan::predictor::parse_endpoint;
use leafscan::{Alert, CaptureAndClassify, HttpPredictor, Notifier, OverlapPolicy, PayloadKind, Screen};
use std::sync::{Arc, PoisonError};
use tokio::sync::mpsc;

/// Queues alerts for the UI thread and wakes it up
struct GuiNotifier {
    alerts: AlertQueue,
    ctx: egui::Context,
}

impl Notifier for GuiNotifier {
    fn alert(&self, alert: Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(alert);
        self.ctx.request_repaint();
    }
}

/// Handle to the background thread; dropping it stops the thread
pub struct Worker {
    captures: mpsc::UnboundedSender<()>,
}

impl Worker {
    pub fn spawn(
        ctx: egui::Context,
        endpoint: &str,
        payload: PayloadKind,
        overlap: OverlapPolicy,
        screen: Screen,
        alerts: AlertQueue,
    ) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        let predictor = HttpPredictor::new(endpoint, payload).context("Failed to create HTTP client")?;

        let notifier = GuiNotifier {
            alerts,
            ctx: ctx.clone(),
        };
        let controller = CaptureAndClassify::new(
            Arc::new(DialogCamera),
            Arc::new(predictor),
            Arc::new(notifier),
        )
        .with_policy(overlap)
        .with_screen(screen);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        std::thread::spawn(move || {
            runtime.block_on(async move {
                // Repaint whenever the screen changes
                let mut updates = controller.screen().subscribe();
                let repaint_ctx = ctx.clone();
                tokio::spawn(async move {
                    while updates.changed().await.is_ok() {
                        repaint_ctx.request_repaint();
                    }
                });

                // Captures are not serialized: a second tap starts a second upload
                while rx.recv().await.is_some() {
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        let flow = controller.capture_photo().await;
                        log::debug!("Capture finished: {:?}", flow);
                    });
                }
            });
        });

        Ok(Self { captures: tx })
    }

    /// Same as pressing the shutter button
    pub fn capture(&self) {
        if self.captures.send(()).is_err() {
            log::error!("Capture worker is gone");
        }
    }
}
