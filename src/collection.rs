use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::source::{ItemRecord, PageResult, PageSource};

/// Lazily-growing buffer over a paginated remote photo search.
///
/// Rules:
/// - The buffer is append-only for the life of the search session; items are
///   kept in arrival order and never reordered or truncated.
/// - At most one page fetch is in flight at any time; a trigger that lands
///   while one is outstanding observes it instead of issuing another.
/// - The total item count reported by the first successful response is
///   authoritative; later discrepancies are logged and ignored.
/// - A failed fetch clears the in-flight slot so the next lookup inside the
///   prefetch window re-issues it.
pub struct PhotoCollection {
    source: Arc<dyn PageSource>,
    items: Vec<ItemRecord>,
    page: u32,
    total_pages: u32,
    total_items: Option<u64>,
    pending: Option<JoinHandle<Result<PageResult, TransportError>>>,
}

impl PhotoCollection {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            items: Vec::new(),
            page: 0,
            total_pages: 0,
            total_items: None,
            pending: None,
        }
    }

    /// Reset the buffer and fetch page 1, applying it before returning.
    pub async fn load_first_page(&mut self) -> Result<(), TransportError> {
        if let Some(stale) = self.pending.take() {
            stale.abort();
        }
        self.items.clear();
        self.page = 0;
        self.total_pages = 0;
        self.total_items = None;
        let first = self.source.fetch_page(1).await?;
        self.apply(first);
        Ok(())
    }

    /// Buffered lookup. `None` means "not ready", never an error.
    ///
    /// Looking up an index within one position of the buffer end queues the
    /// next page in the background, so the fetch hides behind the time the
    /// current slide stays on screen.
    pub fn item(&mut self, index: usize) -> Option<&ItemRecord> {
        if index + 2 >= self.items.len() {
            self.request_next_page();
        }
        self.items.get(index)
    }

    /// Spawn the fetch for the next page unless one is already in flight or
    /// the buffer has reached the reported total.
    pub fn request_next_page(&mut self) {
        if self.pending.is_some() || self.complete() {
            return;
        }
        let source = Arc::clone(&self.source);
        let page = self.page + 1;
        debug!(page, buffered = self.items.len(), "requesting next page");
        self.pending = Some(tokio::spawn(async move { source.fetch_page(page).await }));
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Await the in-flight fetch, if any, and fold its outcome into the
    /// buffer. Returns whether a page landed.
    ///
    /// Cancel-safe: dropping the future mid-await leaves the fetch in
    /// flight to be settled by a later call.
    pub async fn settle_pending(&mut self) -> Result<bool, TransportError> {
        let Some(handle) = self.pending.as_mut() else {
            return Ok(false);
        };
        let joined = handle.await;
        self.pending = None;
        match joined {
            Ok(Ok(page)) => {
                self.apply(page);
                Ok(true)
            }
            Ok(Err(err)) => Err(err),
            Err(join_err) => {
                warn!(error = %join_err, "page fetch task failed to join");
                Err(TransportError::Aborted)
            }
        }
    }

    /// Drop the in-flight fetch, letting the network task finish on its own
    /// with nowhere to deliver. Used during teardown.
    pub fn discard_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            debug!("discarding in-flight page fetch");
            drop(handle);
        }
    }

    fn apply(&mut self, result: PageResult) {
        let authoritative = *self.total_items.get_or_insert(result.total_items);
        if result.total_items != authoritative {
            warn!(
                first_seen = authoritative,
                reported = result.total_items,
                page = result.page,
                "remote changed its total item count; keeping the first-seen value"
            );
        }
        self.page = result.page;
        self.total_pages = result.total_pages;

        let room = (authoritative as usize).saturating_sub(self.items.len());
        let mut items = result.items;
        if items.len() > room {
            warn!(
                dropped = items.len() - room,
                "page carried more items than the reported total; dropping the excess"
            );
            items.truncate(room);
        }
        self.items.extend(items);
        debug!(
            page = self.page,
            buffered = self.items.len(),
            total = authoritative,
            "page applied"
        );
    }

    /// Whether the buffer holds everything the remote reported.
    pub fn complete(&self) -> bool {
        self.total_items
            .is_some_and(|total| self.items.len() as u64 >= total)
    }

    pub fn is_last_index(&self, index: usize) -> bool {
        self.total_items == Some(index as u64 + 1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_items(&self) -> Option<u64> {
        self.total_items
    }
}
