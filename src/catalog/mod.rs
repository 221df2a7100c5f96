//! Client for the paginated "tagged images" listing.
//!
//! The client owns no pagination state; callers pass the cursor in. An empty
//! page is the end of the catalog and is returned as an empty `Vec`.

pub mod cursor;
pub mod error;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

pub use cursor::{Cursor, Watermark};
pub use error::CatalogError;
pub use types::{MediaItem, SourceLocator, TaggedImage};

const TAGGED_IMAGES_PATH: &str = "api/v2/images/tagged";
const ACCESS_TOKEN_HEADER: &str = "x-famly-accesstoken";
const INSTALLATION_ID_HEADER: &str = "x-famly-installationid";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";

/// Cap on how much of an error body ends up in a log line.
const ERROR_BODY_LIMIT: usize = 200;

/// Credentials attached to every catalog request. How they were obtained is
/// not this module's concern.
#[derive(Clone)]
pub struct ApiAuth {
    pub access_token: String,
    pub installation_id: Option<String>,
}

impl std::fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiAuth")
            .field("access_token", &"<redacted>")
            .field("installation_id", &self.installation_id)
            .finish()
    }
}

/// One page of the remote catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch up to `limit` items older than `cursor`, newest first.
    ///
    /// `cursor` is `None` on the first request of a run.
    async fn fetch_page(
        &self,
        child_id: &str,
        cursor: Option<Cursor>,
        limit: u32,
    ) -> Result<Vec<MediaItem>, CatalogError>;
}

/// Build the shared HTTP client used for both listing and media downloads.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// `CatalogClient` backed by the Famly web API.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: Client,
    endpoint: Url,
    auth: ApiAuth,
}

impl HttpCatalogClient {
    /// `base` is the site root, e.g. `https://app.famly.co/`.
    pub fn new(client: Client, base: &Url, auth: ApiAuth) -> Result<Self, CatalogError> {
        let endpoint = base
            .join(TAGGED_IMAGES_PATH)
            .map_err(|e| CatalogError::Url(format!("{}: {}", base, e)))?;
        Ok(Self {
            client,
            endpoint,
            auth,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn page_url(&self, child_id: &str, cursor: Option<Cursor>, limit: u32) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("childId", child_id);
            query.append_pair("limit", &limit.to_string());
            if let Some(cursor) = cursor {
                query.append_pair("olderThan", &cursor.to_query_value());
            }
        }
        url
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_page(
        &self,
        child_id: &str,
        cursor: Option<Cursor>,
        limit: u32,
    ) -> Result<Vec<MediaItem>, CatalogError> {
        let url = self.page_url(child_id, cursor, limit);
        tracing::debug!(url = %url, "Fetching catalog page");

        let mut request = self
            .client
            .get(url.clone())
            .header(ACCESS_TOKEN_HEADER, &self.auth.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(installation_id) = &self.auth.installation_id {
            request = request.header(INSTALLATION_ID_HEADER, installation_id);
        }

        let network = |source| CatalogError::Network {
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let bytes = response.bytes().await.map_err(network)?;
        let images: Vec<TaggedImage> = serde_json::from_slice(&bytes)?;
        Ok(images.into_iter().map(MediaItem::from).collect())
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
