//! Demo binary for the carousel core.
//!
//! Stands in for the hosting page: terminal surfaces log what a real UI
//! would paint, and a short delayed echo plays the role of the CSS
//! transition-end signal.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::sync::mpsc::{self, Sender};
use tokio::time::sleep;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use photo_carousel::config::CarouselConfig;
use photo_carousel::events::TransitionEnded;
use photo_carousel::surface::{CaptionPanel, CarouselSurfaces, SlideTrio, Surface, ThumbnailPair};
use photo_carousel::tasks::carousel::Carousel;

/// How long the pretend slide transition takes before its end signal fires.
const TRANSITION_TIME: Duration = Duration::from_millis(400);

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "photo-carousel", about = "Flickr-backed photo carousel")]
struct Cli {
    /// Path to YAML config file; defaults apply when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the search term
    #[arg(long, value_name = "TEXT")]
    search_text: Option<String>,

    /// Override the autoplay interval (ms)
    #[arg(long, value_name = "MILLIS")]
    interval_ms: Option<u64>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("photo_carousel={}", level).parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap());
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

struct LogSlide {
    label: &'static str,
    transitions: Sender<TransitionEnded>,
}

impl Surface for LogSlide {
    fn set_image(&mut self, url: &str) {
        info!(slot = self.label, url, "slide image");
    }

    fn show(&mut self) {
        info!(slot = self.label, "slide shown");
    }

    fn hide(&mut self) {
        info!(slot = self.label, "slide hidden");
        // The recycled slot is hidden exactly once per move; echo the
        // transition-end signal after the pretend animation time.
        let transitions = self.transitions.clone();
        tokio::spawn(async move {
            sleep(TRANSITION_TIME).await;
            let _ = transitions.send(TransitionEnded).await;
        });
    }
}

struct LogPanel {
    label: &'static str,
}

impl Surface for LogPanel {
    fn set_image(&mut self, url: &str) {
        info!(slot = self.label, url, "thumbnail image");
    }

    fn show(&mut self) {
        info!(slot = self.label, "thumbnail shown");
    }

    fn hide(&mut self) {
        info!(slot = self.label, "thumbnail hidden");
    }
}

struct LogCaption;

impl CaptionPanel for LogCaption {
    fn set_title(&mut self, title: &str) {
        info!(title, "caption");
    }

    fn show(&mut self) {
        info!("caption shown");
    }

    fn hide(&mut self) {
        info!("caption hidden");
    }
}

fn build_surfaces(transitions: Sender<TransitionEnded>) -> CarouselSurfaces {
    let slide = |label| {
        Box::new(LogSlide {
            label,
            transitions: transitions.clone(),
        }) as Box<dyn Surface>
    };
    CarouselSurfaces {
        slides: SlideTrio {
            previous: slide("slide-a"),
            current: slide("slide-b"),
            next: slide("slide-c"),
        },
        thumbnails: ThumbnailPair {
            previous: Box::new(LogPanel {
                label: "thumb-prev",
            }),
            next: Box::new(LogPanel {
                label: "thumb-next",
            }),
        },
        caption: Box::new(LogCaption),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut cfg = match &cli.config {
        Some(path) => CarouselConfig::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CarouselConfig::default(),
    };
    if let Some(text) = cli.search_text {
        cfg.search_text = text;
    }
    if let Some(ms) = cli.interval_ms {
        cfg.interval = Duration::from_millis(ms);
    }
    info!(
        search = %cfg.search_text,
        background = ?cfg.background_size,
        interval = ?cfg.effective_interval(),
        "starting carousel"
    );

    let (transition_tx, transition_rx) = mpsc::channel(4);
    let surfaces = build_surfaces(transition_tx);
    let carousel = Carousel::spawn(cfg, surfaces, transition_rx)?;

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("ctrl-c received; tearing down");
    carousel.destroy();
    carousel.join().await
}
