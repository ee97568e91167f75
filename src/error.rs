use thiserror::Error;

/// Failure of a single page fetch against the remote search endpoint.
///
/// The collection never retries or swallows these; they surface through
/// `load_first_page` / `settle_pending` and the carousel decides what to do.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure (DNS, connect, timeout, body read).
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("search endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    /// The body was not the expected search envelope.
    #[error("malformed search response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The in-flight fetch task was torn down before it produced a result.
    #[error("page fetch aborted")]
    Aborted,
}
