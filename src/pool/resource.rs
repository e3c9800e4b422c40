//! Idle-resource pool
//!
//! Caches idle instances of an expensive resource under a capacity bound.
//! The bound applies to the idle cache only: `acquire` never waits, and the
//! number of resources checked out at once is limited by the scheduler's
//! concurrency, not by this pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::ops::{Deref, DerefMut};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::models::{FailureKind, UnitError};

/// Default number of idle resources kept for reuse
pub const DEFAULT_CAPACITY: usize = 3;

/// Pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Failed to create resource: {0}")]
    Construction(String),

    #[error("Failed to clean up resource: {0}")]
    Cleanup(String),

    #[error("Resource pool has been drained")]
    Closed,
}

impl From<PoolError> for UnitError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Closed => UnitError::new(FailureKind::Other, err.to_string()),
            err => UnitError::from_message(err.to_string()),
        }
    }
}

/// Lifecycle hooks for a pooled resource kind
#[async_trait]
pub trait ResourceManager: Send + Sync + 'static {
    type Resource: Send + 'static;

    /// Construct a new resource
    async fn create(&self) -> Result<Self::Resource, PoolError>;

    /// Reset a resource to a reusable state before it goes idle
    async fn cleanup(&self, resource: &mut Self::Resource) -> Result<(), PoolError>;

    /// Release everything the resource holds
    async fn dispose(&self, resource: Self::Resource);
}

/// A resource checked out of a pool
#[derive(Debug)]
pub struct PooledResource<R> {
    resource: R,
    acquired_at: DateTime<Utc>,
}

impl<R> PooledResource<R> {
    fn new(resource: R) -> Self {
        Self {
            resource,
            acquired_at: Utc::now(),
        }
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn into_inner(self) -> R {
        self.resource
    }
}

impl<R> Deref for PooledResource<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource
    }
}

impl<R> DerefMut for PooledResource<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.resource
    }
}

/// Lifetime counters of a pool, plus the current idle count
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub created: usize,
    pub reused: usize,
    pub returned: usize,
    pub disposed: usize,
}

struct PoolState<R> {
    idle: Vec<R>,
    closed: bool,
    stats: PoolStats,
}

/// Capacity-bounded cache of idle resources
pub struct ResourcePool<M: ResourceManager> {
    manager: M,
    capacity: usize,
    state: Mutex<PoolState<M::Resource>>,
}

impl<M: ResourceManager> ResourcePool<M> {
    pub fn with_capacity(manager: M, capacity: usize) -> Self {
        Self {
            manager,
            capacity,
            state: Mutex::new(PoolState {
                idle: Vec::with_capacity(capacity),
                closed: false,
                stats: PoolStats::default(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn stats(&self) -> PoolStats {
        let state = self.state.lock().await;
        PoolStats {
            idle: state.idle.len(),
            ..state.stats
        }
    }

    /// Take an idle resource, or construct one when none is idle
    pub async fn acquire(&self) -> Result<PooledResource<M::Resource>, PoolError> {
        let idle = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(PoolError::Closed);
            }
            let idle = state.idle.pop();
            if idle.is_some() {
                state.stats.reused += 1;
            }
            idle
        };

        let resource = match idle {
            Some(resource) => {
                debug!("Reusing idle resource");
                resource
            }
            None => {
                let resource = self.manager.create().await?;
                self.state.lock().await.stats.created += 1;
                debug!("Created new resource");
                resource
            }
        };

        Ok(PooledResource::new(resource))
    }

    /// Return a resource: cache it if there is room, dispose it otherwise
    pub async fn release(&self, pooled: PooledResource<M::Resource>) {
        let held = Utc::now() - pooled.acquired_at();
        debug!("Releasing resource held for {}ms", held.num_milliseconds());
        let mut resource = pooled.into_inner();

        if !self.has_room().await {
            self.dispose(resource).await;
            return;
        }

        if let Err(e) = self.manager.cleanup(&mut resource).await {
            warn!("Disposing resource after failed cleanup: {}", e);
            self.dispose(resource).await;
            return;
        }

        // Re-checked: other releases may have filled the cache during cleanup
        let overflow = {
            let mut state = self.state.lock().await;
            if !state.closed && state.idle.len() < self.capacity {
                state.idle.push(resource);
                state.stats.returned += 1;
                None
            } else {
                Some(resource)
            }
        };

        if let Some(resource) = overflow {
            self.dispose(resource).await;
        }
    }

    /// Dispose every idle resource and stop caching.
    ///
    /// Resources still checked out are disposed when they are released.
    pub async fn drain_all(&self) -> usize {
        let idle = {
            let mut state = self.state.lock().await;
            state.closed = true;
            std::mem::take(&mut state.idle)
        };

        let count = idle.len();
        for resource in idle {
            self.dispose(resource).await;
        }

        debug!("Drained {} idle resources", count);
        count
    }

    async fn has_room(&self) -> bool {
        let state = self.state.lock().await;
        !state.closed && state.idle.len() < self.capacity
    }

    async fn dispose(&self, resource: M::Resource) {
        self.manager.dispose(resource).await;
        self.state.lock().await.stats.disposed += 1;
    }
}
