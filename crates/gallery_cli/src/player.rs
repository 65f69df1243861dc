//! Terminal playback loop

use anyhow::Result;
use gallery_playback::{
    EventChange, EventPlaybackController, PlaybackConfig, PlaybackEvent, PlaybackSnapshot,
};
use std::sync::Arc;
use tokio::sync::Notify;

/// Play `events` to stdout until the last event or Ctrl-C.
pub async fn run(
    events: Vec<PlaybackEvent>,
    config: PlaybackConfig,
    start_at: Option<usize>,
) -> Result<()> {
    play_with_output(events, config, start_at, |line| println!("{line}")).await
}

async fn play_with_output(
    events: Vec<PlaybackEvent>,
    config: PlaybackConfig,
    start_at: Option<usize>,
    emit: impl Fn(String) + Send + Sync + 'static,
) -> Result<()> {
    if events.is_empty() {
        emit("No events to play".to_string());
        return Ok(());
    }

    let total = events.len();
    let controller = EventPlaybackController::with_config(events, config);
    let _events = controller.on_event_change(Arc::new(move |change: &EventChange| {
        emit(format_change(change, total));
    }));

    tokio::select! {
        _ = play_to_end(&controller, start_at) => {
            tracing::info!("Playback finished");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Interrupted at {:?}", controller.current_index());
        }
    }

    controller.destroy();
    Ok(())
}

/// Start at `start_at` (or the beginning) and wait until playback stops on
/// the final event.
async fn play_to_end(controller: &EventPlaybackController, start_at: Option<usize>) {
    let total = controller.len();
    match start_at {
        Some(index) if index < total => controller.go_to_index(index),
        Some(index) => tracing::warn!(
            "Start index {} out of range ({} events); starting from the beginning",
            index,
            total
        ),
        None => {}
    }

    // Starting on the final event: it has been printed and `play` would
    // rewind to the first one.
    if is_finished(&controller.snapshot()) {
        return;
    }

    let finished = Arc::new(Notify::new());
    let done = finished.clone();
    let _state = controller.on_state_change(Arc::new(move |snapshot: &PlaybackSnapshot| {
        tracing::debug!(
            "playing={} index={:?} speed={}",
            snapshot.is_playing,
            snapshot.current_index,
            snapshot.speed
        );
        if is_finished(snapshot) {
            done.notify_one();
        }
    }));

    tracing::info!(
        "Playing {} events at {} ({:?} per event)",
        total,
        controller.speed(),
        controller.tick_interval()
    );
    controller.play();
    finished.notified().await;
}

/// Playback has stopped on the final event.
fn is_finished(snapshot: &PlaybackSnapshot) -> bool {
    !snapshot.is_playing
        && snapshot.total_events > 0
        && snapshot.current_index == Some(snapshot.total_events - 1)
}

/// `[3/10] 2024-05-01T12:00:02Z {"tool":"Edit"}`
fn format_change(change: &EventChange, total: usize) -> String {
    let payload = serde_json::Value::Object(change.event.payload().clone());
    format!(
        "[{}/{}] {} {}",
        change.index + 1,
        total,
        change.event.timestamp(),
        payload
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_playback::PlaybackSpeed;
    use serde_json::{json, Map};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    fn events(count: usize) -> Vec<PlaybackEvent> {
        (0..count)
            .map(|i| {
                let mut payload = Map::new();
                payload.insert("seq".into(), json!(i));
                PlaybackEvent::from_parts(
                    format!("2024-05-01T12:00:0{i}Z"),
                    1_714_564_800_000 + i as i64 * 1000,
                    payload,
                )
            })
            .collect()
    }

    /// Runs playback to completion and returns the printed lines with the
    /// virtual time it took.
    async fn play_collecting(count: usize, start_at: Option<usize>) -> (Vec<String>, Duration) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let started = Instant::now();
        play_with_output(events(count), PlaybackConfig::default(), start_at, move |line| {
            sink.lock().unwrap().push(line);
        })
        .await
        .unwrap();
        let lines = lines.lock().unwrap().clone();
        (lines, started.elapsed())
    }

    fn snapshot(is_playing: bool, current_index: Option<usize>, total: usize) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing,
            current_index,
            total_events: total,
            speed: PlaybackSpeed::Normal,
            current_event: None,
        }
    }

    #[test]
    fn test_format_change() {
        let mut payload = Map::new();
        payload.insert("tool".into(), json!("Edit"));
        let change = EventChange {
            event: PlaybackEvent::from_parts("2024-05-01T12:00:02Z", 0, payload),
            index: 2,
        };
        assert_eq!(
            format_change(&change, 10),
            r#"[3/10] 2024-05-01T12:00:02Z {"tool":"Edit"}"#
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_at_last_event_shows_it_without_rewinding() {
        let (lines, elapsed) = play_collecting(3, Some(2)).await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[3/3] "));
        assert_eq!(elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_at_middle_plays_remaining_events() {
        let (lines, elapsed) = play_collecting(3, Some(1)).await;
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[2/3] "));
        assert!(lines[1].starts_with("[3/3] "));
        assert!(elapsed >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_all_events_from_the_beginning() {
        let (lines, elapsed) = play_collecting(3, None).await;
        let prefixes: Vec<&str> = lines.iter().map(|l| &l[..5]).collect();
        assert_eq!(prefixes, ["[1/3]", "[2/3]", "[3/3]"]);
        assert!(elapsed >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_start_plays_from_the_beginning() {
        let (lines, _) = play_collecting(3, Some(7)).await;
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("[1/3] "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_file_reports_nothing_to_play() {
        let (lines, _) = play_collecting(0, None).await;
        assert_eq!(lines, ["No events to play"]);
    }

    #[test]
    fn test_is_finished() {
        assert!(is_finished(&snapshot(false, Some(2), 3)));
        assert!(!is_finished(&snapshot(true, Some(2), 3)));
        assert!(!is_finished(&snapshot(false, Some(1), 3)));
        assert!(!is_finished(&snapshot(false, None, 3)));
        assert!(!is_finished(&snapshot(false, None, 0)));
    }
}
