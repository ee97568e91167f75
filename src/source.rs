use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, LocalResult, NaiveTime, TimeDelta, TimeZone};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use tracing::debug;

use crate::config::CarouselConfig;
use crate::error::TransportError;

const SEARCH_METHOD: &str = "flickr.photos.search";

/// Metadata for a single photo, immutable once fetched. The field set is
/// exactly what the URL templating in [`crate::paths`] needs, plus the title.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRecord {
    pub farm: u64,
    pub server: String,
    // The local search proxy emits `flickrId` where the live API says `id`.
    #[serde(alias = "flickrId")]
    pub id: String,
    pub secret: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// One page of search results plus the pagination metadata that came with it.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub items: Vec<ItemRecord>,
    pub page: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

/// Issues one request per page against a photo-search backend.
///
/// Search text and page size are bound in at construction; a different
/// search needs a fresh source (and a fresh collection).
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<PageResult, TransportError>;
}

#[derive(Deserialize)]
struct SearchEnvelope {
    photos: PhotosPayload,
}

#[derive(Deserialize)]
struct PhotosPayload {
    page: u32,
    #[serde(deserialize_with = "count_field")]
    pages: u32,
    #[serde(deserialize_with = "count_field")]
    total: u64,
    photo: Vec<ItemRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaybeQuoted<T> {
    Raw(T),
    Text(String),
}

// The live API has historically returned `total` (and sometimes `pages`) as
// a quoted numeric string; accept both shapes.
fn count_field<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    match MaybeQuoted::<T>::deserialize(deserializer)? {
        MaybeQuoted::Raw(value) => Ok(value),
        MaybeQuoted::Text(text) => text.trim().parse().map_err(de::Error::custom),
    }
}

/// Unix seconds of "yesterday at midnight" in `now`'s timezone.
///
/// Used as the `max_upload_date` upper bound so a search returns a stable
/// result set for a whole calendar day. Pure in `now` so callers can pin it.
pub fn last_day_timestamp<Tz: TimeZone>(now: DateTime<Tz>) -> i64 {
    let shifted = now - TimeDelta::days(1);
    let midnight = shifted.date_naive().and_time(NaiveTime::MIN);
    match shifted.timezone().from_local_datetime(&midnight) {
        LocalResult::Single(rounded) => rounded.timestamp(),
        // A DST fold at midnight: take the earlier instant.
        LocalResult::Ambiguous(earlier, _) => earlier.timestamp(),
        LocalResult::None => shifted.timestamp(),
    }
}

/// [`PageSource`] backed by the Flickr photo-search REST endpoint.
pub struct FlickrSource {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    search_text: String,
    page_size: u32,
}

impl FlickrSource {
    pub fn from_config(cfg: &CarouselConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: cfg.host.clone(),
            api_key: cfg.api_key.clone(),
            search_text: cfg.search_text.clone(),
            page_size: cfg.slides_per_request,
        })
    }

    fn search_query(&self, page: u32, max_upload_date: i64) -> Vec<(&'static str, String)> {
        vec![
            ("method", SEARCH_METHOD.to_owned()),
            ("text", self.search_text.clone()),
            ("max_upload_date", max_upload_date.to_string()),
            ("page", page.to_string()),
            ("per_page", self.page_size.to_string()),
            ("api_key", self.api_key.clone()),
            ("format", "json".to_owned()),
            ("nojsoncallback", "1".to_owned()),
        ]
    }
}

#[async_trait]
impl PageSource for FlickrSource {
    async fn fetch_page(&self, page: u32) -> Result<PageResult, TransportError> {
        let ceiling = last_day_timestamp(chrono::Local::now());
        let response = self
            .http
            .get(&self.endpoint)
            .query(&self.search_query(page, ceiling))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }
        let body = response.text().await?;
        let envelope: SearchEnvelope = serde_json::from_str(&body)?;
        let photos = envelope.photos;
        debug!(
            page = photos.page,
            pages = photos.pages,
            total = photos.total,
            items = photos.photo.len(),
            "search page fetched"
        );
        Ok(PageResult {
            items: photos.photo,
            page: photos.page,
            total_pages: photos.pages,
            total_items: photos.total,
        })
    }
}
