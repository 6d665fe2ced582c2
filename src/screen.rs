//! Screen state for the capture-and-classify view
//!
//! Three cells (captured image, prediction, in-flight flag) that only change
//! through [`ScreenState::apply`]. [`Screen`] publishes them over a watch
//! channel so a renderer always sees a consistent snapshot.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use crate::camera::ImageRef;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScreenState {
    pub image: Option<ImageRef>,
    pub prediction: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A capture completed; replaces the previous image
    Captured(ImageRef),
    /// An upload began: flag up, old prediction gone
    RequestStarted,
    Predicted(String),
    /// An upload ended, however it ended
    RequestFinished,
}

impl ScreenState {
    pub fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Captured(image) => self.image = Some(image),
            Transition::RequestStarted => {
                self.loading = true;
                self.prediction = None;
            }
            Transition::Predicted(label) => self.prediction = Some(label),
            Transition::RequestFinished => self.loading = false,
        }
    }
}

/// Shared handle to the published screen state
#[derive(Debug, Clone)]
pub struct Screen {
    state: Arc<watch::Sender<ScreenState>>,
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ScreenState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn apply(&self, transition: Transition) {
        log::debug!("Screen transition: {:?}", transition);
        self.state.send_modify(|state| state.apply(transition));
    }

    pub fn snapshot(&self) -> ScreenState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_cycle() {
        let mut state = ScreenState {
            prediction: Some("healthy".to_string()),
            ..Default::default()
        };

        state.apply(Transition::RequestStarted);
        assert!(state.loading);
        assert_eq!(state.prediction, None);

        state.apply(Transition::Predicted("blight".to_string()));
        state.apply(Transition::RequestFinished);
        assert!(!state.loading);
        assert_eq!(state.prediction.as_deref(), Some("blight"));
    }

    #[test]
    fn test_capture_overwrites_image() {
        let mut state = ScreenState::default();
        state.apply(Transition::Captured(ImageRef::new("file:///a.jpg")));
        state.apply(Transition::Captured(ImageRef::new("file:///b.jpg")));
        assert_eq!(state.image, Some(ImageRef::new("file:///b.jpg")));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let screen = Screen::new();
        let mut rx = screen.subscribe();

        screen.apply(Transition::RequestStarted);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().loading);

        let clone = screen.clone();
        clone.apply(Transition::RequestFinished);
        assert!(!screen.snapshot().loading);
    }
}
