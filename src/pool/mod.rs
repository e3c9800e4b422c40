//! Shared resource pooling
//!
//! Idle-resource pool for browser sessions, keyed cache for per-endpoint HTTP
//! agents, and the `SharedResources` hub that units reach them through.

mod browser;
mod keyed;
mod resource;

pub use browser::{BrowserManager, BrowserSession, Page};
pub use keyed::KeyedPool;
pub use resource::{
    PoolError, PoolStats, PooledResource, ResourcePool, DEFAULT_CAPACITY,
};

use tracing::{debug, info};

use crate::config::PoolConfig;
use crate::http::{endpoint_of, HttpClient, HttpError};

/// Browser session checked out of the pool
pub type Browser = PooledResource<BrowserSession>;

/// Pools shared by every concurrently running unit
pub struct SharedResources {
    browsers: ResourcePool<BrowserManager>,
    agents: KeyedPool<String, HttpClient>,
    timeout_secs: u64,
    max_idle_per_host: usize,
}

impl SharedResources {
    pub fn new(config: &PoolConfig, timeout_secs: u64) -> Self {
        Self {
            browsers: ResourcePool::with_capacity(
                BrowserManager::new(timeout_secs),
                config.max_browsers,
            ),
            agents: KeyedPool::new(),
            timeout_secs,
            max_idle_per_host: config.max_idle_per_host,
        }
    }

    pub async fn acquire_browser(&self) -> Result<Browser, PoolError> {
        self.browsers.acquire().await
    }

    pub async fn release_browser(&self, browser: Browser) {
        self.browsers.release(browser).await;
    }

    /// Keep-alive agent for the endpoint serving `url`
    pub async fn http_agent(&self, url: &str) -> Result<HttpClient, HttpError> {
        let endpoint = endpoint_of(url)?;
        let (timeout_secs, max_idle) = (self.timeout_secs, self.max_idle_per_host);
        self.agents
            .get_or_try_insert_with(&endpoint, || HttpClient::keep_alive(timeout_secs, max_idle))
            .await
    }

    pub async fn browser_stats(&self) -> PoolStats {
        self.browsers.stats().await
    }

    /// Dispose idle browsers and drop every cached agent
    pub async fn drain_all(&self) {
        let browsers = self.browsers.drain_all().await;
        let agents = self.agents.clear().await;
        let stats = self.browser_stats().await;
        info!(
            "Released shared resources: {} idle browser sessions, {} HTTP agents",
            browsers, agents
        );
        debug!(
            "Browser pool (capacity {}): created {}, reused {}, returned {}, disposed {}",
            self.browsers.capacity(),
            stats.created,
            stats.reused,
            stats.returned,
            stats.disposed
        );
    }
}
