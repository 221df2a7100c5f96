use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

/// One record from `GET /api/v2/images/tagged`.
///
/// Only `imageId` and `createdAt` are required; everything else is optional
/// so that schema drift on auxiliary fields never fails a whole page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)] // auxiliary wire fields are accepted but never read
pub struct TaggedImage {
    pub image_id: String,
    pub created_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "url_big")]
    pub url_big: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub big: Option<ImageRef>,
    #[serde(default)]
    pub thumbnail: Option<ImageRef>,
    #[serde(default)]
    pub dim: Option<Vec<u32>>,
    #[serde(default, rename = "dim_big")]
    pub dim_big: Option<Vec<u32>>,
    #[serde(default)]
    pub expiration: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub likes: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub liked: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)] // only `url` is read
pub struct ImageRef {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Where the full-resolution bytes of an item live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Url(String),
    Composed {
        prefix: String,
        width: u32,
        height: u32,
        key: String,
    },
}

impl SourceLocator {
    pub fn to_url(&self) -> String {
        match self {
            SourceLocator::Url(url) => url.clone(),
            SourceLocator::Composed {
                prefix,
                width,
                height,
                key,
            } => format!(
                "{}/{}x{}/{}",
                prefix.trim_end_matches('/'),
                width,
                height,
                key.trim_start_matches('/')
            ),
        }
    }
}

/// A media record as the sync engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub id: String,
    /// Capture time in the offset the server reported it in.
    pub created_at: DateTime<FixedOffset>,
    /// `None` when the record carries no usable URL or locator tuple.
    pub source: Option<SourceLocator>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl From<TaggedImage> for MediaItem {
    fn from(img: TaggedImage) -> Self {
        let composed = match (
            non_empty(&img.prefix),
            non_empty(&img.key),
            img.width,
            img.height,
        ) {
            (Some(prefix), Some(key), Some(width), Some(height)) => {
                Some(SourceLocator::Composed {
                    prefix: prefix.to_string(),
                    width,
                    height,
                    key: key.to_string(),
                })
            }
            _ => None,
        };

        let source = non_empty(&img.url_big)
            .or_else(|| img.big.as_ref().and_then(|b| non_empty(&b.url)))
            .map(|u| SourceLocator::Url(u.to_string()))
            .or(composed)
            .or_else(|| non_empty(&img.url).map(|u| SourceLocator::Url(u.to_string())));

        Self {
            id: img.image_id,
            created_at: img.created_at,
            source,
        }
    }
}
