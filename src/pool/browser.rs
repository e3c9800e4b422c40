//! Browser sessions
//!
//! A lightweight page session used by UI units: each session owns its own
//! HTTP agent and a list of open pages. Sessions are expensive enough to be
//! pooled and reset between units.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::resource::{PoolError, ResourceManager};
use crate::http::{HttpClient, HttpError};

/// URL of an empty page
pub const BLANK_PAGE: &str = "about:blank";

/// A page opened in a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub status_code: u16,
    pub body: String,
}

impl Page {
    pub fn blank() -> Self {
        Self {
            url: BLANK_PAGE.to_string(),
            status_code: 200,
            body: String::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.url == BLANK_PAGE
    }

    /// Whether the page loaded with a 2xx status
    pub fn is_loaded(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Text of the `<title>` element, if any
    pub fn title(&self) -> Option<String> {
        let lower = self.body.to_ascii_lowercase();
        let open = lower.find("<title")?;
        let start = open + lower[open..].find('>')? + 1;
        let end = start + lower[start..].find("</title>")?;
        Some(self.body[start..end].trim().to_string())
    }

    pub fn contains(&self, text: &str) -> bool {
        self.body.contains(text)
    }
}

/// A reusable page session
#[derive(Debug)]
pub struct BrowserSession {
    id: u64,
    client: HttpClient,
    pages: Vec<Page>,
}

impl BrowserSession {
    pub fn new(id: u64, client: HttpClient) -> Self {
        Self {
            id,
            client,
            pages: vec![Page::blank()],
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Open `url` in a new page
    pub async fn open(&mut self, url: &str) -> Result<&Page, HttpError> {
        let response = self.client.get(url).await?;
        debug!("Session {} opened {} ({})", self.id, url, response.status_code);

        self.pages.push(Page {
            url: url.to_string(),
            status_code: response.status_code,
            body: response.body,
        });
        Ok(&self.pages[self.pages.len() - 1])
    }

    /// Close every page except a single blank one
    pub fn close_all_but_blank(&mut self) {
        self.pages.retain(Page::is_blank);
        self.pages.truncate(1);
        if self.pages.is_empty() {
            self.pages.push(Page::blank());
        }
    }
}

/// Creates and resets browser sessions for the pool
pub struct BrowserManager {
    timeout_secs: u64,
    next_id: AtomicU64,
}

impl BrowserManager {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl ResourceManager for BrowserManager {
    type Resource = BrowserSession;

    async fn create(&self) -> Result<BrowserSession, PoolError> {
        // One idle socket per host: sessions should not share connection state
        let client = HttpClient::keep_alive(self.timeout_secs, 1)
            .map_err(|e| PoolError::Construction(e.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("Launched browser session {}", id);
        Ok(BrowserSession::new(id, client))
    }

    async fn cleanup(&self, session: &mut BrowserSession) -> Result<(), PoolError> {
        session.close_all_but_blank();
        Ok(())
    }

    async fn dispose(&self, session: BrowserSession) {
        debug!(
            "Closed browser session {} with {} open pages",
            session.id,
            session.pages().len()
        );
    }
}
