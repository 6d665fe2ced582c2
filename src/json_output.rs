//! JSON output for front-end integration
//!
//! When --json is enabled, screen updates, alerts and the final summary are
//! emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};

use crate::controller::{Alert, Notifier};
use crate::screen::ScreenState;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonMessage {
    /// Snapshot of what the screen shows
    State {
        image: Option<String>,
        prediction: Option<String>,
        loading: bool,
    },
    /// A dialog the user would have seen
    Alert { title: String, message: String },
    /// Run summary
    Summary {
        captures: usize,
        predicted: usize,
        failed: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn state(state: &ScreenState) -> Self {
        Self::State {
            image: state.image.as_ref().map(|image| image.to_string()),
            prediction: state.prediction.clone(),
            loading: state.loading,
        }
    }

    pub fn alert(alert: &Alert) -> Self {
        Self::Alert {
            title: alert.title.clone(),
            message: alert.message.clone(),
        }
    }

    /// Create and emit summary message
    pub fn summary(captures: usize, predicted: usize, failed: usize, duration_secs: f64) {
        Self::Summary {
            captures,
            predicted,
            failed,
            duration_secs,
        }
        .emit();
    }
}

/// Alerts as JSON lines
#[derive(Debug, Default)]
pub struct JsonNotifier;

impl Notifier for JsonNotifier {
    fn alert(&self, alert: Alert) {
        JsonMessage::alert(&alert).emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ImageRef;

    #[test]
    fn test_state_message_shape() {
        let state = ScreenState {
            image: Some(ImageRef::new("file:///tmp/leaf.jpg")),
            prediction: None,
            loading: true,
        };
        let json = serde_json::to_value(JsonMessage::state(&state)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "state",
                "image": "file:///tmp/leaf.jpg",
                "prediction": null,
                "loading": true
            })
        );
    }

    #[test]
    fn test_alert_message_round_trip() {
        let message = JsonMessage::alert(&Alert::permission_denied());
        let line = serde_json::to_string(&message).unwrap();
        assert!(line.starts_with(r#"{"type":"alert""#));
        let parsed: JsonMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, message);
    }
}
