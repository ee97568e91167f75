use crate::source::ItemRecord;

/// Flickr static-farm size variants, keyed by the URL suffix letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSize {
    Thumbnail,
    Small,
    Medium,
    Large,
}

impl PhotoSize {
    fn suffix(self) -> char {
        match self {
            Self::Thumbnail => 'q',
            Self::Small => 'n',
            Self::Medium => 'c',
            Self::Large => 'h',
        }
    }
}

/// Display URL for a fetched photo record at the requested size.
pub fn photo_url(size: PhotoSize, item: &ItemRecord) -> String {
    format!(
        "https://farm{}.staticflickr.com/{}/{}_{}_{}.jpg",
        item.farm,
        item.server,
        item.id,
        item.secret,
        size.suffix()
    )
}
