//! Git Gallery playback CLI
//!
//! Plays a recorded event file (a JSON array of timestamped file events)
//! in the terminal, one event per tick, through the same controller the
//! map view uses.

mod config;
mod player;

use anyhow::{Context, Result};
use clap::Parser;
use config::GalleryConfig;
use gallery_playback::PlaybackSpeed;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Play recorded repository events in the terminal
#[derive(Parser, Debug)]
#[command(name = "gallery-playback")]
#[command(about = "Play recorded repository events in the terminal")]
#[command(version)]
struct Args {
    /// JSON file containing an array of events
    #[arg(required_unless_present = "print_config")]
    file: Option<PathBuf>,

    /// Playback speed: 0.5, 1, 2 or 5
    #[arg(short, long)]
    speed: Option<PlaybackSpeed>,

    /// Config file (defaults to ./gallery.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Event index to start from
    #[arg(long)]
    start_at: Option<usize>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = GalleryConfig::load(args.config.as_deref())?;
    init_logging(&config.log.filter);

    if let Some(speed) = args.speed {
        config.playback.speed = speed;
    }

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let Some(file) = args.file else {
        anyhow::bail!("No event file given");
    };
    tracing::info!("Loading events from {}", file.display());
    let events = gallery_playback::load_events(&file)
        .with_context(|| format!("Failed to load events from {}", file.display()))?;

    player::run(events, config.playback, args.start_at).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_required_unless_printing_config() {
        assert!(Args::try_parse_from(["gallery-playback"]).is_err());

        let args = Args::try_parse_from(["gallery-playback", "--print-config", "-s", "2x"]).unwrap();
        assert!(args.print_config);
        assert!(args.file.is_none());
        assert_eq!(args.speed, Some(PlaybackSpeed::Double));

        let args =
            Args::try_parse_from(["gallery-playback", "events.json", "--start-at", "3"]).unwrap();
        assert_eq!(args.file, Some(PathBuf::from("events.json")));
        assert_eq!(args.start_at, Some(3));
    }
}
