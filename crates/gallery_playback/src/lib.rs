//! Git Gallery Event Playback
//!
//! Replays a recorded sequence of repository events (file reads, edits,
//! tool calls) one at a time so a map view can highlight each as it
//! happens.
//!
//! - **Events**: timestamped records with an opaque pass-through payload
//! - **Controller**: play/pause/step/seek over the sequence on a timer
//! - **Listeners**: subscribe to state snapshots and cursor moves
//!
//! # Example
//!
//! ```rust,no_run
//! use gallery_playback::{EventChange, EventPlaybackController, PlaybackSpeed};
//! use std::sync::Arc;
//!
//! # async fn run() -> gallery_playback::Result<()> {
//! let events = gallery_playback::load_events("session.json")?;
//! let controller = EventPlaybackController::new(events);
//!
//! let _sub = controller.on_event_change(Arc::new(|change: &EventChange| {
//!     println!("#{} at {}", change.index, change.event.timestamp());
//! }));
//!
//! controller.set_speed(PlaybackSpeed::Double);
//! controller.play();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod listeners;
pub mod speed;
mod timer;

pub use config::PlaybackConfig;
pub use controller::{
    EventChange, EventListener, EventPlaybackController, PlaybackSnapshot, StateListener,
};
pub use error::{PlaybackError, Result};
pub use event::{load_events, PlaybackEvent};
pub use listeners::{Listener, ListenerSet, Subscription};
pub use speed::{PlaybackSpeed, BASE_INTERVAL};
