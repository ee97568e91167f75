use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use photo_carousel::config::CarouselConfig;
use photo_carousel::error::TransportError;
use photo_carousel::events::TransitionEnded;
use photo_carousel::source::{ItemRecord, PageResult, PageSource};
use photo_carousel::surface::{CaptionPanel, CarouselSurfaces, SlideTrio, Surface, ThumbnailPair};
use photo_carousel::tasks::carousel::Carousel;

/// Shared log of every surface call, in arrival order.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    fn has(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.contains(needle))
    }
}

fn slide_hides(rec: &Recorder) -> usize {
    rec.entries()
        .iter()
        .filter(|e| e.starts_with("slide-") && e.ends_with("hidden"))
        .count()
}

async fn wait_until(rec: &Recorder, needle: &str) {
    let outcome = timeout(Duration::from_secs(5), async {
        loop {
            if rec.has(needle) {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if outcome.is_err() {
        panic!("timed out waiting for {needle:?}; saw {:#?}", rec.entries());
    }
}

struct FakeSurface {
    label: &'static str,
    rec: Recorder,
}

impl Surface for FakeSurface {
    fn set_image(&mut self, url: &str) {
        self.rec.push(format!("{} image {}", self.label, url));
    }

    fn show(&mut self) {
        self.rec.push(format!("{} shown", self.label));
    }

    fn hide(&mut self) {
        self.rec.push(format!("{} hidden", self.label));
    }
}

struct FakeCaption {
    rec: Recorder,
}

impl CaptionPanel for FakeCaption {
    fn set_title(&mut self, title: &str) {
        self.rec.push(format!("caption title {title}"));
    }

    fn show(&mut self) {
        self.rec.push("caption shown".to_owned());
    }

    fn hide(&mut self) {
        self.rec.push("caption hidden".to_owned());
    }
}

fn surfaces(rec: &Recorder) -> CarouselSurfaces {
    let surface = |label| {
        Box::new(FakeSurface {
            label,
            rec: rec.clone(),
        }) as Box<dyn Surface>
    };
    CarouselSurfaces {
        slides: SlideTrio {
            previous: surface("slide-a"),
            current: surface("slide-b"),
            next: surface("slide-c"),
        },
        thumbnails: ThumbnailPair {
            previous: surface("thumb-prev"),
            next: surface("thumb-next"),
        },
        caption: Box::new(FakeCaption { rec: rec.clone() }),
    }
}

/// Serves `total` photos in fixed-size pages; pages at or past `gate_from`
/// block until released. Photo 1 deliberately carries an empty title.
struct PagedSource {
    total: u64,
    page_size: u64,
    gate_from: Option<u32>,
    gate: Notify,
    calls: AtomicUsize,
}

impl PagedSource {
    fn new(total: u64, page_size: u64) -> Arc<Self> {
        Arc::new(Self {
            total,
            page_size,
            gate_from: None,
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        })
    }

    fn gated_from(total: u64, page_size: u64, from: u32) -> Arc<Self> {
        Arc::new(Self {
            total,
            page_size,
            gate_from: Some(from),
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        })
    }

    fn release(&self) {
        self.gate.notify_one();
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for PagedSource {
    async fn fetch_page(&self, page: u32) -> Result<PageResult, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gate_from.is_some_and(|from| page >= from) {
            self.gate.notified().await;
        }
        let start = u64::from(page - 1) * self.page_size;
        let end = (start + self.page_size).min(self.total);
        let items = (start..end)
            .map(|n| ItemRecord {
                farm: 66,
                server: "server".to_owned(),
                id: format!("photo-{n}"),
                secret: "sec".to_owned(),
                title: if n == 1 {
                    Some(String::new())
                } else {
                    Some(format!("Photo {n}"))
                },
            })
            .collect();
        Ok(PageResult {
            items,
            page,
            total_pages: self.total.div_ceil(self.page_size) as u32,
            total_items: self.total,
        })
    }
}

fn config_with_interval(interval_ms: u64) -> CarouselConfig {
    CarouselConfig {
        interval: Duration::from_millis(interval_ms),
        ..CarouselConfig::default()
    }
}

#[tokio::test]
async fn initial_presentation_covers_slides_thumbnails_and_caption() {
    let rec = Recorder::default();
    let source = PagedSource::new(3, 3);
    let (_transitions, transitions_rx) = mpsc::channel(4);
    let carousel = Carousel::spawn_with_source(
        &config_with_interval(30_000),
        source,
        surfaces(&rec),
        transitions_rx,
    );

    wait_until(&rec, "caption title Photo 0").await;
    assert!(rec.has("slide-b image https://farm66.staticflickr.com/server/photo-0_sec_h.jpg"));
    assert!(rec.has("slide-b shown"));
    assert!(rec.has("slide-c image https://farm66.staticflickr.com/server/photo-1_sec_h.jpg"));
    assert!(rec.has("thumb-prev hidden"));
    assert!(rec.has("thumb-next image https://farm66.staticflickr.com/server/photo-1_sec_q.jpg"));
    assert!(rec.has("caption shown"));

    carousel.destroy();
    carousel.join().await.unwrap();
}

#[tokio::test]
async fn second_move_before_transition_end_is_rejected() {
    let rec = Recorder::default();
    let source = PagedSource::new(3, 3);
    let (transitions, transitions_rx) = mpsc::channel(4);
    let carousel = Carousel::spawn_with_source(
        &config_with_interval(30_000),
        source,
        surfaces(&rec),
        transitions_rx,
    );

    wait_until(&rec, "caption title Photo 0").await;
    rec.clear();

    // A forward move recycles the old previous slot and hides it.
    carousel.next();
    wait_until(&rec, "slide-a hidden").await;

    // A second move before the transition-end signal must change nothing.
    carousel.next();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(slide_hides(&rec), 1, "second move must not rotate the deck");

    // After the signal the revealed edge is refilled and moves are legal again.
    transitions.send(TransitionEnded).await.unwrap();
    wait_until(&rec, "slide-a image https://farm66.staticflickr.com/server/photo-2_sec_h.jpg")
        .await;
    rec.clear();
    carousel.next();
    wait_until(&rec, "slide-b hidden").await;

    carousel.destroy();
    carousel.join().await.unwrap();
}

#[tokio::test]
async fn moves_clamp_at_both_ends_and_thumbnails_follow() {
    let rec = Recorder::default();
    let source = PagedSource::new(2, 2);
    let (transitions, transitions_rx) = mpsc::channel(4);
    let carousel = Carousel::spawn_with_source(
        &config_with_interval(30_000),
        source,
        surfaces(&rec),
        transitions_rx,
    );

    wait_until(&rec, "caption title Photo 0").await;
    // No photo before index 0: the trailing thumbnail stays dark.
    assert!(rec.has("thumb-prev hidden"));
    rec.clear();

    // Backward from index 0 is clamped.
    carousel.prev();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(slide_hides(&rec), 0, "backward move at index 0 must be a no-op");

    carousel.next();
    wait_until(&rec, "slide-a hidden").await;
    // Index 1 is the last photo: leading thumbnail dark, trailing shows photo 0,
    // and its empty title blanks the caption.
    assert!(rec.has("thumb-next hidden"));
    assert!(rec.has("thumb-prev image https://farm66.staticflickr.com/server/photo-0_sec_q.jpg"));
    assert!(rec.has("caption hidden"));

    transitions.send(TransitionEnded).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    rec.clear();

    // Forward from the last index is clamped.
    carousel.next();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(slide_hides(&rec), 0, "forward move at the last index must be a no-op");

    carousel.destroy();
    carousel.join().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn autoplay_tick_defers_during_load_and_moves_once_after_settle() {
    let rec = Recorder::default();
    let source = PagedSource::gated_from(4, 2, 2);
    let (_transitions, transitions_rx) = mpsc::channel(4);
    let carousel = Carousel::spawn_with_source(
        &config_with_interval(1_500),
        source.clone(),
        surfaces(&rec),
        transitions_rx,
    );

    // The initial thumbnail refresh looks one photo ahead, which queues the
    // (gated) page-2 fetch before the first tick can fire.
    wait_until(&rec, "caption title Photo 0").await;
    sleep(Duration::from_secs(3)).await;
    assert_eq!(slide_hides(&rec), 0, "tick must not advance while a page load is in flight");

    source.release();
    wait_until(&rec, "slide-a hidden").await;
    sleep(Duration::from_millis(200)).await;
    assert_eq!(slide_hides(&rec), 1, "deferred move must fire exactly once");
    assert!(
        rec.has("thumb-next image https://farm66.staticflickr.com/server/photo-2_sec_q.jpg"),
        "after the deferred move the rail shows the photo past the new index"
    );
    assert_eq!(source.calls(), 2, "the deferred tick must not issue extra fetches");

    carousel.destroy();
    carousel.join().await.unwrap();
}

#[tokio::test]
async fn destroy_is_idempotent_and_a_late_fetch_touches_no_surface() {
    let rec = Recorder::default();
    let source = PagedSource::gated_from(4, 2, 2);
    let (_transitions, transitions_rx) = mpsc::channel(4);
    let carousel = Carousel::spawn_with_source(
        &config_with_interval(30_000),
        source.clone(),
        surfaces(&rec),
        transitions_rx,
    );

    // Page 2 is stuck behind the gate by the time the first page presents.
    wait_until(&rec, "caption title Photo 0").await;

    carousel.destroy();
    carousel.destroy();
    carousel.join().await.unwrap();

    let before = rec.entries();
    source.release();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(
        rec.entries(),
        before,
        "a fetch settling after destroy must not paint anything"
    );
}
