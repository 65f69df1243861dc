//! Event playback controller.
//!
//! Steps a cursor through a loaded event sequence, either by hand
//! (`next`, `previous`, `go_to_*`) or on a repeating timer while playing.
//! Playback always stops on the final event; it never loops on its own.
//!
//! # State
//!
//! | state   | `is_playing` | `current_index` |
//! |---------|--------------|-----------------|
//! | Empty   | false        | `None`, no events loaded |
//! | Idle    | false        | `None`          |
//! | Paused  | false        | `Some(i)`       |
//! | Playing | true         | `Some(i)`       |
//!
//! `is_playing` is true exactly while a tick timer exists, so the two can
//! never disagree.
//!
//! # Notifications
//!
//! State listeners receive a [`PlaybackSnapshot`] after every transition.
//! Event listeners receive an [`EventChange`] whenever the cursor lands on an
//! event, immediately followed by the matching state notification. Listeners
//! are called with no internal lock held and may call back into the
//! controller.
//!
//! # Example
//!
//! ```ignore
//! use gallery_playback::{EventPlaybackController, PlaybackSpeed};
//! use std::sync::Arc;
//!
//! let controller = EventPlaybackController::new(events);
//! let _sub = controller.on_event_change(Arc::new(|change: &EventChange| {
//!     println!("{} -> {}", change.index, change.event.timestamp());
//! }));
//! controller.set_speed(PlaybackSpeed::Double);
//! controller.play();
//! ```

use crate::config::PlaybackConfig;
use crate::event::PlaybackEvent;
use crate::listeners::{Listener, ListenerSet, Subscription};
use crate::speed::PlaybackSpeed;
use crate::timer::TickTimer;
use parking_lot::Mutex;
use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;

/// Point-in-time view of the controller, delivered to state listeners.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    /// `None` before playback has started.
    pub current_index: Option<usize>,
    pub total_events: usize,
    pub speed: PlaybackSpeed,
    pub current_event: Option<PlaybackEvent>,
}

/// The cursor moved onto `event` at `index`.
#[derive(Clone, Debug, PartialEq)]
pub struct EventChange {
    pub event: PlaybackEvent,
    pub index: usize,
}

pub type StateListener = Listener<PlaybackSnapshot>;
pub type EventListener = Listener<EventChange>;

enum Notification {
    State(PlaybackSnapshot),
    Event(EventChange),
}

type Outbox = Vec<Notification>;

struct PlaybackState {
    events: Vec<PlaybackEvent>,
    current_index: Option<usize>,
    speed: PlaybackSpeed,
    /// Set by `start_timer`, cleared by `stop_timer`.
    timer: Option<TickTimer>,
    /// Bumped on every timer start; ticks from older timers are ignored.
    generation: u64,
    destroyed: bool,
}

impl PlaybackState {
    fn is_playing(&self) -> bool {
        self.timer.is_some()
    }

    fn last_index(&self) -> Option<usize> {
        self.events.len().checked_sub(1)
    }

    fn current_event(&self) -> Option<&PlaybackEvent> {
        self.current_index.and_then(|i| self.events.get(i))
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: self.is_playing(),
            current_index: self.current_index,
            total_events: self.events.len(),
            speed: self.speed,
            current_event: self.current_event().cloned(),
        }
    }
}

struct Shared {
    state: Mutex<PlaybackState>,
    state_listeners: ListenerSet<PlaybackSnapshot>,
    event_listeners: ListenerSet<EventChange>,
    runtime: Option<Handle>,
    base_interval: Duration,
    this: Weak<Shared>,
}

impl Shared {
    /// Run a transition under the state lock, then deliver whatever it
    /// queued. Returns `None` once the controller has been destroyed.
    fn update<R>(&self, f: impl FnOnce(&Self, &mut PlaybackState, &mut Outbox) -> R) -> Option<R> {
        let mut outbox = Outbox::new();
        let result = {
            let mut state = self.state.lock();
            if state.destroyed {
                tracing::debug!("Ignoring call on destroyed playback controller");
                return None;
            }
            f(self, &mut state, &mut outbox)
        };
        for notification in outbox {
            match notification {
                Notification::State(snapshot) => self.state_listeners.notify(&snapshot),
                Notification::Event(change) => self.event_listeners.notify(&change),
            }
        }
        Some(result)
    }

    fn emit_state(state: &PlaybackState, out: &mut Outbox) {
        out.push(Notification::State(state.snapshot()));
    }

    fn emit_event_change(state: &PlaybackState, out: &mut Outbox) {
        if let (Some(index), Some(event)) = (state.current_index, state.current_event()) {
            out.push(Notification::Event(EventChange {
                event: event.clone(),
                index,
            }));
        }
        Self::emit_state(state, out);
    }

    fn start_timer(&self, state: &mut PlaybackState) -> bool {
        Self::stop_timer(state);
        let Some(runtime) = &self.runtime else {
            tracing::warn!("No tokio runtime available; playback timer not started");
            return false;
        };

        state.generation += 1;
        let generation = state.generation;
        let period = state.speed.interval(self.base_interval);
        let this = self.this.clone();
        state.timer = Some(TickTimer::spawn(runtime, period, move || {
            match this.upgrade() {
                Some(shared) => shared.on_tick(generation),
                None => ControlFlow::Break(()),
            }
        }));
        tracing::debug!("Playback timer started ({:?} per event)", period);
        true
    }

    fn stop_timer(state: &mut PlaybackState) {
        state.timer = None;
    }

    fn on_tick(&self, generation: u64) -> ControlFlow<()> {
        self.update(|shared, state, out| {
            if state.generation != generation || !state.is_playing() {
                return ControlFlow::Break(());
            }
            shared.next(state, out);
            tracing::trace!("Playback tick -> {:?}", state.current_index);
            if state.current_index.is_some() && state.current_index == state.last_index() {
                shared.pause(state, out);
            }
            if state.is_playing() {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        })
        .unwrap_or(ControlFlow::Break(()))
    }

    fn play(&self, state: &mut PlaybackState, out: &mut Outbox) {
        if state.is_playing() || state.events.is_empty() {
            return;
        }
        if self.runtime.is_none() {
            tracing::warn!("Cannot play without a tokio runtime");
            return;
        }

        if state.current_index.is_some() && state.current_index == state.last_index() {
            state.current_index = None;
        }
        if state.current_index.is_none() {
            state.current_index = Some(0);
            Self::emit_event_change(state, out);
        }

        if self.start_timer(state) {
            tracing::debug!("Playback started at {:?}", state.current_index);
            Self::emit_state(state, out);
        }
    }

    fn pause(&self, state: &mut PlaybackState, out: &mut Outbox) {
        if !state.is_playing() {
            return;
        }
        Self::stop_timer(state);
        tracing::debug!("Playback paused at {:?}", state.current_index);
        Self::emit_state(state, out);
    }

    fn next(&self, state: &mut PlaybackState, out: &mut Outbox) {
        let target = state.current_index.map_or(0, |i| i + 1);
        if target < state.events.len() {
            state.current_index = Some(target);
            Self::emit_event_change(state, out);
        } else {
            self.pause(state, out);
        }
    }

    fn previous(&self, state: &mut PlaybackState, out: &mut Outbox) {
        if let Some(index) = state.current_index.filter(|&i| i > 0) {
            state.current_index = Some(index - 1);
            Self::emit_event_change(state, out);
        }
    }

    fn jump(&self, state: &mut PlaybackState, out: &mut Outbox, index: usize) {
        self.pause(state, out);
        state.current_index = Some(index);
        Self::emit_event_change(state, out);
    }

    fn go_to_index(&self, state: &mut PlaybackState, out: &mut Outbox, index: usize) {
        if index >= state.events.len() {
            return;
        }
        let was_playing = state.is_playing();
        self.jump(state, out, index);
        // Resuming on the last event would rewind to the start.
        if was_playing && Some(index) != state.last_index() {
            self.play(state, out);
        }
    }

    fn set_speed(&self, state: &mut PlaybackState, out: &mut Outbox, speed: PlaybackSpeed) {
        state.speed = speed;
        if state.is_playing() {
            self.start_timer(state);
        }
        tracing::debug!("Playback speed set to {}", speed);
        Self::emit_state(state, out);
    }

    fn reset(&self, state: &mut PlaybackState, out: &mut Outbox) {
        self.pause(state, out);
        state.current_index = None;
        Self::emit_state(state, out);
    }

    fn load_events(&self, state: &mut PlaybackState, out: &mut Outbox, events: Vec<PlaybackEvent>) {
        self.pause(state, out);
        tracing::debug!("Loaded {} events", events.len());
        state.events = events;
        state.current_index = None;
        Self::emit_state(state, out);
    }
}

/// Timed playback over an ordered sequence of events.
///
/// The tick timer runs on a tokio runtime. `new` and `with_config` pick up
/// the runtime of the calling context; outside a runtime, navigation still
/// works but `play` does nothing.
///
/// No operation fails. Calls whose preconditions do not hold (playing an
/// empty sequence, stepping past either end, anything after `destroy`) are
/// no-ops.
pub struct EventPlaybackController {
    shared: Arc<Shared>,
}

impl EventPlaybackController {
    /// Create a controller with default settings.
    pub fn new(events: Vec<PlaybackEvent>) -> Self {
        Self::with_config(events, PlaybackConfig::default())
    }

    /// Create a controller with the given settings.
    pub fn with_config(events: Vec<PlaybackEvent>, config: PlaybackConfig) -> Self {
        Self::build(events, config, Handle::try_current().ok())
    }

    /// Create a controller whose timer runs on `runtime`.
    pub fn with_runtime(events: Vec<PlaybackEvent>, config: PlaybackConfig, runtime: Handle) -> Self {
        Self::build(events, config, Some(runtime))
    }

    fn build(events: Vec<PlaybackEvent>, config: PlaybackConfig, runtime: Option<Handle>) -> Self {
        let shared = Arc::new_cyclic(|this| Shared {
            state: Mutex::new(PlaybackState {
                events,
                current_index: None,
                speed: config.speed,
                timer: None,
                generation: 0,
                destroyed: false,
            }),
            state_listeners: ListenerSet::new(),
            event_listeners: ListenerSet::new(),
            runtime,
            base_interval: config.base_interval(),
            this: this.clone(),
        });
        Self { shared }
    }

    /// Start playing from the cursor.
    ///
    /// From Idle the cursor moves to the first event, which is reported
    /// before the timer starts. At the last event playback restarts from the
    /// beginning.
    pub fn play(&self) {
        self.shared.update(|s, state, out| s.play(state, out));
    }

    /// Stop the timer, keeping the cursor where it is.
    pub fn pause(&self) {
        self.shared.update(|s, state, out| s.pause(state, out));
    }

    /// Pause if playing, play otherwise.
    pub fn toggle(&self) {
        self.shared.update(|s, state, out| {
            if state.is_playing() {
                s.pause(state, out);
            } else {
                s.play(state, out);
            }
        });
    }

    /// Advance one event. At the last event this pauses instead.
    pub fn next(&self) {
        self.shared.update(|s, state, out| s.next(state, out));
    }

    /// Step back one event. Does nothing at the first event or before
    /// playback has started.
    pub fn previous(&self) {
        self.shared.update(|s, state, out| s.previous(state, out));
    }

    /// Pause and move to the first event. No-op on an empty sequence.
    pub fn go_to_start(&self) {
        self.shared.update(|s, state, out| {
            if !state.events.is_empty() {
                s.jump(state, out, 0);
            }
        });
    }

    /// Pause and move to the last event. No-op on an empty sequence.
    pub fn go_to_end(&self) {
        self.shared.update(|s, state, out| {
            if let Some(last) = state.last_index() {
                s.jump(state, out, last);
            }
        });
    }

    /// Move to `index`, resuming playback afterwards if it was playing.
    ///
    /// Out-of-range indices are ignored. Jumping to the last event is the
    /// one exception to resuming: playback stays paused there, since `play`
    /// at the last event would rewind to the start and playback always
    /// stops on the final event.
    pub fn go_to_index(&self, index: usize) {
        self.shared.update(|s, state, out| s.go_to_index(state, out, index));
    }

    /// Change speed. While playing the timer restarts at the new interval.
    pub fn set_speed(&self, speed: PlaybackSpeed) {
        self.shared.update(|s, state, out| s.set_speed(state, out, speed));
    }

    /// Pause and return to Idle.
    pub fn reset(&self) {
        self.shared.update(|s, state, out| s.reset(state, out));
    }

    /// Replace the sequence and return to Idle.
    pub fn load_events(&self, events: Vec<PlaybackEvent>) {
        self.shared.update(|s, state, out| s.load_events(state, out, events));
    }

    /// Stop the timer, drop all listeners and the sequence.
    ///
    /// The controller is inert afterwards; every later call is a no-op.
    pub fn destroy(&self) {
        let destroyed = self.shared.update(|_, state, _| {
            Shared::stop_timer(state);
            state.events.clear();
            state.current_index = None;
            state.destroyed = true;
        });
        if destroyed.is_some() {
            self.shared.state_listeners.clear();
            self.shared.event_listeners.clear();
            tracing::debug!("Playback controller destroyed");
        }
    }

    /// Subscribe to state snapshots.
    pub fn on_state_change(&self, listener: StateListener) -> Subscription {
        self.shared.state_listeners.subscribe(listener)
    }

    /// Subscribe to cursor moves.
    pub fn on_event_change(&self, listener: EventListener) -> Subscription {
        self.shared.event_listeners.subscribe(listener)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.shared.state.lock().snapshot()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.state.lock().is_playing()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.shared.state.lock().current_index
    }

    pub fn current_event(&self) -> Option<PlaybackEvent> {
        self.shared.state.lock().current_event().cloned()
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.shared.state.lock().speed
    }

    /// Interval between ticks at the current speed.
    pub fn tick_interval(&self) -> Duration {
        self.speed().interval(self.shared.base_interval)
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.state.lock().destroyed
    }
}

impl std::fmt::Debug for EventPlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("EventPlaybackController")
            .field("total_events", &state.events.len())
            .field("current_index", &state.current_index)
            .field("is_playing", &state.is_playing())
            .field("speed", &state.speed)
            .field("timer_period", &state.timer.as_ref().map(TickTimer::period))
            .field("state_listeners", &self.shared.state_listeners.len())
            .field("event_listeners", &self.shared.event_listeners.len())
            .finish()
    }
}
