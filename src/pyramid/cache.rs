//! LRU cache of whole pyramids.
//!
//! The cache provides:
//! - LRU eviction over complete pyramids, bounded by a pyramid count
//! - Single-flight builds so concurrent misses for one key share one build
//! - Builds that finish even if the caller that started them goes away
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilesrv::pyramid::{PyramidCache, PyramidOptions};
//!
//! let cache = PyramidCache::new(Arc::new(backend), PyramidOptions::default());
//!
//! // Builds on first access, then served from memory
//! let pyramid = cache.resolve("slides/sample.jpg").await?;
//! let tile = pyramid.get_tile(cache.backend().as_ref(), 9, 0, 0).await?;
//! ```

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, warn};

use super::builder::build_pyramid;
use super::{Pyramid, PyramidOptions};
use crate::backend::TileBackend;
use crate::error::{BackendError, TileError};

/// Default number of pyramids kept in memory.
pub const DEFAULT_PYRAMID_CACHE_CAPACITY: usize = 10;

type SharedPyramid<B> = Arc<Pyramid<<B as TileBackend>::Image>>;
type BuildResult<B> = Result<SharedPyramid<B>, TileError>;

// =============================================================================
// PyramidCache
// =============================================================================

/// Capacity-bounded LRU map from source key to pyramid.
///
/// Lock order is always `in_flight` before `pyramids`, so a caller holding
/// `in_flight` sees either a running build or its published pyramid.
pub struct PyramidCache<B: TileBackend> {
    backend: Arc<B>,
    options: PyramidOptions,
    state: Arc<CacheState<B>>,
}

struct CacheState<B: TileBackend> {
    /// Built pyramids in recency order
    pyramids: RwLock<LruCache<String, SharedPyramid<B>>>,

    /// Builds currently running, by source key
    in_flight: Mutex<HashMap<String, Arc<InFlightBuild<B>>>>,
}

/// Shared outcome of one running build.
struct InFlightBuild<B: TileBackend> {
    /// Notification for waiters
    notify: Notify,
    /// Result of the build (set when complete)
    result: Mutex<Option<BuildResult<B>>>,
}

impl<B: TileBackend> InFlightBuild<B> {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            result: Mutex::new(None),
        }
    }

    /// Wait for the build to publish its result.
    async fn wait(&self) -> BuildResult<B> {
        loop {
            // Register before checking so a publish in between still wakes us
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = self.result.lock().await.as_ref() {
                return result.clone();
            }

            notified.await;
        }
    }
}

impl<B: TileBackend> PyramidCache<B> {
    /// Create a cache holding up to [`DEFAULT_PYRAMID_CACHE_CAPACITY`] pyramids.
    pub fn new(backend: Arc<B>, options: PyramidOptions) -> Self {
        Self::with_capacity(backend, options, DEFAULT_PYRAMID_CACHE_CAPACITY)
    }

    /// Create a cache holding up to `capacity` pyramids (at least one).
    pub fn with_capacity(backend: Arc<B>, options: PyramidOptions, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            options,
            state: Arc::new(CacheState {
                pyramids: RwLock::new(LruCache::new(capacity)),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Get the pyramid for `source_key`, building it on a miss.
    ///
    /// A hit promotes the key to most recently used. On a miss the pyramid
    /// is built once no matter how many callers ask concurrently; every
    /// caller receives the same result. A failed build is not cached, so the
    /// next request retries.
    pub async fn resolve(&self, source_key: &str) -> BuildResult<B> {
        // Fast path: check cache
        {
            let mut pyramids = self.state.pyramids.write().await;
            if let Some(pyramid) = pyramids.get(source_key) {
                return Ok(Arc::clone(pyramid));
            }
        }

        // Slow path: join a running build or start one
        let build = {
            let mut in_flight = self.state.in_flight.lock().await;

            if let Some(build) = in_flight.get(source_key) {
                Arc::clone(build)
            } else {
                // A build may have been published since the fast path
                {
                    let mut pyramids = self.state.pyramids.write().await;
                    if let Some(pyramid) = pyramids.get(source_key) {
                        return Ok(Arc::clone(pyramid));
                    }
                }

                let build = Arc::new(InFlightBuild::new());
                in_flight.insert(source_key.to_string(), Arc::clone(&build));
                self.spawn_build(source_key.to_string(), Arc::clone(&build));
                build
            }
        };

        build.wait().await
    }

    /// Run a build on its own task so it completes even when the caller
    /// that triggered it is cancelled.
    fn spawn_build(&self, source_key: String, build: Arc<InFlightBuild<B>>) {
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let options = self.options.clone();

        tokio::spawn(async move {
            // Inner task so a panicking backend still publishes a result
            let build_key = source_key.clone();
            let task = tokio::spawn(async move {
                build_pyramid(backend.as_ref(), &build_key, &options).await
            });
            let result = match task.await {
                Ok(result) => result.map(Arc::new),
                Err(e) => Err(BackendError::new("build_pyramid", e.to_string()).into()),
            };

            if let Err(ref e) = result {
                warn!(source_key = %source_key, error = %e, "Pyramid build failed");
            }

            {
                let mut in_flight = state.in_flight.lock().await;

                if let Ok(ref pyramid) = result {
                    let mut pyramids = state.pyramids.write().await;
                    if let Some((evicted, _)) = pyramids.push(source_key.clone(), Arc::clone(pyramid)) {
                        if evicted != source_key {
                            debug!(evicted = %evicted, "Evicted least recently used pyramid");
                        }
                    }
                }

                *build.result.lock().await = Some(result);
                in_flight.remove(&source_key);
            }

            build.notify.notify_waiters();
        });
    }

    /// Whether a pyramid is cached, without changing recency.
    pub async fn contains(&self, source_key: &str) -> bool {
        self.state.pyramids.read().await.contains(source_key)
    }

    /// Drop a cached pyramid, forcing a rebuild on next access.
    pub async fn invalidate(&self, source_key: &str) -> bool {
        self.state.pyramids.write().await.pop(source_key).is_some()
    }

    /// Drop every cached pyramid.
    pub async fn clear(&self) {
        self.state.pyramids.write().await.clear();
    }

    /// Number of cached pyramids.
    pub async fn len(&self) -> usize {
        self.state.pyramids.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Keys in recency order, least recently used first.
    pub async fn keys(&self) -> Vec<String> {
        let pyramids = self.state.pyramids.read().await;
        pyramids.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    /// Number of builds currently running.
    pub async fn builds_in_flight(&self) -> usize {
        self.state.in_flight.lock().await.len()
    }

    /// Maximum number of cached pyramids.
    pub async fn capacity(&self) -> usize {
        self.state.pyramids.read().await.cap().get()
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn options(&self) -> &PyramidOptions {
        &self.options
    }
}

// =============================================================================
// Tests
// =============================================================================
