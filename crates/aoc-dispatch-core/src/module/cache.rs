//! Memoizing solver cache with in-flight load sharing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use rustc_hash::FxHashMap;

use crate::error::LoadError;
use crate::key::SolverKey;

use super::ffi::panic_message;
use super::loader::{ModuleLoader, SolverHandle};

type LoadResult = Result<SolverHandle, LoadError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

#[derive(Default)]
struct CacheState {
    /// Successfully loaded and initialized solvers.
    entries: FxHashMap<SolverKey, SolverHandle>,
    /// At most one in-flight load per key.
    pending: FxHashMap<SolverKey, SharedLoad>,
}

/// Resolves keys to ready solvers.
///
/// A key has an entry iff its module loaded and initialized successfully.
/// Concurrent [`ensure`](Self::ensure) calls for the same key share a single
/// load; failures are handed to every waiter and leave nothing behind, so
/// the next call retries from scratch.
pub struct ModuleCache {
    loader: Arc<dyn ModuleLoader>,
    state: Arc<Mutex<CacheState>>,
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ModuleCache {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// Return the solver for `key`, loading it if needed.
    pub async fn ensure(&self, key: SolverKey) -> LoadResult {
        let load = {
            let mut state = lock(&self.state);

            if let Some(handle) = state.entries.get(&key) {
                tracing::trace!("Cache hit for {}", key);
                return Ok(handle.clone());
            }

            match state.pending.get(&key) {
                Some(load) => {
                    tracing::debug!("Joining in-flight load of {}", key);
                    load.clone()
                }
                None => {
                    let load = self.start_load(key);
                    state.pending.insert(key, load.clone());
                    load
                }
            }
        };

        load.await
    }

    fn start_load(&self, key: SolverKey) -> SharedLoad {
        let loader = Arc::clone(&self.loader);
        let state = Arc::clone(&self.state);

        async move {
            let result = match tokio::task::spawn_blocking(move || loader.load(key)).await {
                Ok(result) => result,
                Err(e) => Err(LoadError::Instantiate {
                    artifact: key.artifact_name(),
                    message: if e.is_panic() {
                        format!("loader panicked: {}", panic_message(&*e.into_panic()))
                    } else {
                        e.to_string()
                    },
                }),
            };

            let mut state = lock(&state);
            state.pending.remove(&key);
            match &result {
                Ok(handle) => {
                    tracing::info!("Loaded {} ({})", key.artifact_name(), handle.language());
                    state.entries.insert(key, Arc::clone(handle));
                }
                Err(e) => tracing::warn!("Failed to load {}: {}", key, e),
            }

            result
        }
        .boxed()
        .shared()
    }

    /// Whether `key` has a ready entry.
    pub fn contains(&self, key: &SolverKey) -> bool {
        lock(&self.state).entries.contains_key(key)
    }

    /// Whether a load for `key` is currently in flight.
    pub fn is_pending(&self, key: &SolverKey) -> bool {
        lock(&self.state).pending.contains_key(key)
    }

    /// Number of ready entries.
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
