use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collection::PhotoCollection;
use crate::config::CarouselConfig;
use crate::error::TransportError;
use crate::events::{CarouselCommand, TransitionEnded};
use crate::paths::{PhotoSize, photo_url};
use crate::source::{FlickrSource, PageSource};
use crate::surface::{
    CaptionPanel, CarouselSurfaces, Direction, SlideTrio, Surface, ThumbnailPair,
};

/// Lifecycle of the machine. Suspension points that the original widget hid
/// in callback nesting are explicit states here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing in progress; moves allowed, autoplay may be armed.
    Idle,
    /// The autoplay tick fired while a page load was in flight; the forward
    /// move is deferred until the load settles, then attempted exactly once.
    AwaitingLoad,
    /// A move started and the visual transition has not finished; further
    /// moves are rejected until the end signal arrives.
    Transitioning { forward: bool },
    /// Terminal; set during teardown.
    Destroyed,
}

/// Which slide slot to address by its current role.
#[derive(Debug, Clone, Copy)]
enum SlotRole {
    Previous,
    Next,
    Current,
}

enum Wake {
    Cancelled,
    Tick,
    Command(Option<CarouselCommand>),
    Transition(Option<TransitionEnded>),
    Settled(Result<bool, TransportError>),
}

/// Drives one carousel instance to completion.
///
/// Rules:
/// - All shared state is touched from this task only; the timer, user
///   commands, transition-end signals and the in-flight page fetch are
///   competing wake sources, never concurrent mutators.
/// - The autoplay tick never starts a move while a fetch is outstanding; it
///   defers and the move fires once after the fetch settles.
/// - A move never starts while a previous move's transition is pending.
/// - Cancellation tears down in any state; a fetch that resolves afterwards
///   has nowhere to deliver and touches no surface.
pub async fn run(
    mut collection: PhotoCollection,
    surfaces: CarouselSurfaces,
    interval: Duration,
    mut commands: Receiver<CarouselCommand>,
    mut transitions: Receiver<TransitionEnded>,
    cancel: CancellationToken,
) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => {
            info!("carousel cancelled before the first page landed");
            return Ok(());
        }
        first = collection.load_first_page() => {
            first.context("loading the first page of search results")?;
        }
    }

    let mut state = CarouselState::new(collection, surfaces, interval);
    state.present_initial();

    loop {
        let deadline = state.deadline;
        let loading = state.collection.is_loading();
        let wake = tokio::select! {
            _ = cancel.cancelled() => Wake::Cancelled,
            _ = autoplay(deadline) => Wake::Tick,
            command = commands.recv() => Wake::Command(command),
            signal = transitions.recv() => Wake::Transition(signal),
            settled = state.collection.settle_pending(), if loading => Wake::Settled(settled),
        };
        match wake {
            Wake::Cancelled => break,
            Wake::Tick => state.handle_tick(),
            Wake::Command(Some(command)) => state.handle_command(command),
            Wake::Command(None) => {
                debug!("widget handle dropped; shutting down");
                break;
            }
            Wake::Transition(Some(TransitionEnded)) => state.handle_transition_end(),
            Wake::Transition(None) => {
                warn!("transition signal source went away; shutting down");
                break;
            }
            Wake::Settled(outcome) => state.after_settle(outcome),
        }
    }

    state.teardown();
    Ok(())
}

async fn autoplay(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

struct CarouselState {
    collection: PhotoCollection,
    slides: SlideTrio,
    thumbnails: ThumbnailPair,
    caption: Box<dyn CaptionPanel>,
    interval: Duration,
    index: usize,
    phase: Phase,
    deadline: Option<Instant>,
}

impl CarouselState {
    fn new(collection: PhotoCollection, surfaces: CarouselSurfaces, interval: Duration) -> Self {
        Self {
            collection,
            slides: surfaces.slides,
            thumbnails: surfaces.thumbnails,
            caption: surfaces.caption,
            interval,
            index: 0,
            phase: Phase::Idle,
            deadline: None,
        }
    }

    /// First-page presentation: current and next slides, thumbnail rail and
    /// caption for index 0, then autoplay.
    fn present_initial(&mut self) {
        if self.collection.is_empty() {
            warn!("search returned no photos; nothing to present");
            self.caption.hide();
            self.thumbnails.previous.hide();
            self.thumbnails.next.hide();
            return;
        }
        self.populate(SlotRole::Current, Some(self.index));
        if self.collection.len() > 1 {
            self.populate(SlotRole::Next, Some(self.index + 1));
        }
        self.refresh_thumbnails();
        self.refresh_caption();
        self.arm_autoplay();
        info!(
            total = self.collection.total_items(),
            interval = ?self.interval,
            "carousel presenting"
        );
    }

    /// Attempt a move. Returns whether a transition actually started.
    ///
    /// Refused while busy, at either boundary (clamped, not wrapping), and
    /// when the target item is not buffered yet; in that last case the
    /// lookup itself has queued the page fetch, so a later attempt succeeds.
    fn advance(&mut self, direction: Direction) -> bool {
        match self.phase {
            Phase::Idle => {}
            Phase::Transitioning { .. } => {
                debug!(?direction, "move rejected; transition still in progress");
                return false;
            }
            Phase::AwaitingLoad => {
                debug!(?direction, "move rejected; waiting on a page load");
                return false;
            }
            Phase::Destroyed => return false,
        }

        let target = match direction {
            Direction::Forward => {
                if self.collection.is_last_index(self.index) {
                    debug!(index = self.index, "at the last photo; forward move clamped");
                    return false;
                }
                self.index + 1
            }
            Direction::Backward => match self.index.checked_sub(1) {
                Some(target) => target,
                None => {
                    debug!("at the first photo; backward move clamped");
                    return false;
                }
            },
        };
        if self.collection.item(target).is_none() {
            // Never rotate onto a slide we cannot fill.
            debug!(index = target, "target photo not buffered yet; move deferred");
            return false;
        }

        self.deadline = None;
        self.slides.rotate(direction);
        match direction {
            Direction::Forward => self.slides.next.hide(),
            Direction::Backward => self.slides.previous.hide(),
        }
        self.index = target;
        self.refresh_thumbnails();
        self.refresh_caption();
        self.phase = Phase::Transitioning {
            forward: matches!(direction, Direction::Forward),
        };
        debug!(index = self.index, ?direction, "transition started");
        true
    }

    fn handle_command(&mut self, command: CarouselCommand) {
        let direction = match command {
            CarouselCommand::Next => Direction::Forward,
            CarouselCommand::Prev => Direction::Backward,
        };
        self.advance(direction);
    }

    fn handle_tick(&mut self) {
        self.deadline = None;
        if self.phase != Phase::Idle {
            return;
        }
        if self.collection.is_loading() {
            debug!("autoplay tick while a page load is in flight; deferring");
            self.phase = Phase::AwaitingLoad;
            return;
        }
        if self.collection.is_last_index(self.index) {
            info!(index = self.index, "autoplay reached the last photo; stopping");
            return;
        }
        if !self.advance(Direction::Forward) && self.collection.is_loading() {
            // The refused advance queued the missing page; treat this tick
            // like one that fired mid-load so the move lands after it.
            self.phase = Phase::AwaitingLoad;
        }
    }

    /// The visual transition finished: fill the slot that rotated to the far
    /// edge with the photo one past the new index, then rearm autoplay.
    fn handle_transition_end(&mut self) {
        let Phase::Transitioning { forward } = self.phase else {
            debug!("transition-end signal with no move in progress; ignoring");
            return;
        };
        if forward {
            self.populate(SlotRole::Next, Some(self.index + 1));
        } else {
            self.populate(SlotRole::Previous, self.index.checked_sub(1));
        }
        self.phase = Phase::Idle;
        self.arm_autoplay();
    }

    fn after_settle(&mut self, outcome: Result<bool, TransportError>) {
        match outcome {
            Ok(true) => debug!(buffered = self.collection.len(), "page load settled"),
            Ok(false) => {}
            Err(err) => warn!(error = %err, "page load failed; will retry on demand"),
        }
        if self.phase == Phase::AwaitingLoad {
            self.phase = Phase::Idle;
            if !self.advance(Direction::Forward) {
                // Deferred move refused (end of results, or the load
                // failed); keep the autoplay heartbeat going.
                self.arm_autoplay();
            }
        }
    }

    fn populate(&mut self, role: SlotRole, index: Option<usize>) {
        let url = match index {
            Some(i)
                if self
                    .collection
                    .total_items()
                    .is_some_and(|total| (i as u64) < total) =>
            {
                self.collection
                    .item(i)
                    .map(|item| photo_url(PhotoSize::Large, item))
            }
            _ => None,
        };
        let slot = match role {
            SlotRole::Previous => &mut self.slides.previous,
            SlotRole::Current => &mut self.slides.current,
            SlotRole::Next => &mut self.slides.next,
        };
        match url {
            Some(url) => {
                slot.set_image(&url);
                slot.show();
            }
            // Not ready; leave the slot dark rather than stale.
            None => slot.hide(),
        }
    }

    fn refresh_thumbnails(&mut self) {
        match self.index.checked_sub(1) {
            Some(prev_index) => {
                let url = self
                    .collection
                    .item(prev_index)
                    .map(|item| photo_url(PhotoSize::Thumbnail, item));
                match url {
                    Some(url) => {
                        self.thumbnails.previous.set_image(&url);
                        self.thumbnails.previous.show();
                    }
                    None => self.thumbnails.previous.hide(),
                }
            }
            None => self.thumbnails.previous.hide(),
        }

        if self.collection.is_last_index(self.index) {
            self.thumbnails.next.hide();
        } else {
            // This lookup is one ahead of the current photo, which is what
            // keeps the prefetch window primed during autoplay.
            let url = self
                .collection
                .item(self.index + 1)
                .map(|item| photo_url(PhotoSize::Thumbnail, item));
            match url {
                Some(url) => {
                    self.thumbnails.next.set_image(&url);
                    self.thumbnails.next.show();
                }
                None => self.thumbnails.next.hide(),
            }
        }
    }

    fn refresh_caption(&mut self) {
        let title = self
            .collection
            .item(self.index)
            .and_then(|item| item.title.clone())
            .filter(|title| !title.is_empty());
        match title {
            Some(title) => {
                self.caption.set_title(&title);
                self.caption.show();
            }
            None => self.caption.hide(),
        }
    }

    fn arm_autoplay(&mut self) {
        self.deadline = Some(Instant::now() + self.interval);
    }

    fn teardown(&mut self) {
        if self.phase == Phase::Destroyed {
            return;
        }
        self.phase = Phase::Destroyed;
        self.deadline = None;
        self.collection.discard_pending();
        info!("carousel destroyed");
    }
}

/// Widget handle exposed to the hosting application.
///
/// Construction spawns the run task; `next`/`prev` enqueue navigation,
/// `destroy` tears the instance down from any state and is safe to call
/// more than once.
pub struct Carousel {
    commands: Sender<CarouselCommand>,
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl Carousel {
    /// Spawn a carousel bound to the Flickr endpoint named by `config`.
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: CarouselConfig,
        surfaces: CarouselSurfaces,
        transitions: Receiver<TransitionEnded>,
    ) -> Result<Self> {
        let config = config.validated()?;
        let source = FlickrSource::from_config(&config).context("building the search client")?;
        Ok(Self::spawn_with_source(
            &config,
            Arc::new(source),
            surfaces,
            transitions,
        ))
    }

    /// Spawn against any page source; the seam used by tests and proxies.
    pub fn spawn_with_source(
        config: &CarouselConfig,
        source: Arc<dyn PageSource>,
        surfaces: CarouselSurfaces,
        transitions: Receiver<TransitionEnded>,
    ) -> Self {
        let (commands, commands_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let collection = PhotoCollection::new(source);
        let task = tokio::spawn(run(
            collection,
            surfaces,
            config.effective_interval(),
            commands_rx,
            transitions,
            cancel.clone(),
        ));
        Self {
            commands,
            cancel,
            task,
        }
    }

    pub fn next(&self) {
        self.send(CarouselCommand::Next);
    }

    pub fn prev(&self) {
        self.send(CarouselCommand::Prev);
    }

    fn send(&self, command: CarouselCommand) {
        if self.commands.try_send(command).is_err() {
            debug!(?command, "carousel not accepting commands; dropped");
        }
    }

    /// Tear down the carousel. Idempotent; a second call has no effect.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run task to finish and surface its result.
    pub async fn join(self) -> Result<()> {
        self.task.await.context("carousel task panicked")?
    }
}
