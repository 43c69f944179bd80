//! Query cache and fetch coordinator.
//!
//! Every read goes through [`QueryCache::resolve`]. Entries are keyed by
//! [`RequestSignature`]; at most one loader runs per signature at a time and
//! later callers attach to the running fetch. A fetch settles its entry from
//! inside the shared future, so settlement happens exactly once no matter which
//! waiter ends up driving it.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use futures::future::{BoxFuture, FutureExt, Shared};
use shared::error::CatalogError;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info, warn};

use crate::signature::RequestSignature;

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub stale_after: Duration,
    /// Additional attempts after the first failed one.
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
        }
    }
}

impl CachePolicy {
    /// Delay before retry number `attempt` (0-based): doubling from the base, capped.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_base_delay
            .saturating_mul(factor)
            .min(self.retry_max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Fresh,
    Stale,
    Error,
}

/// Point-in-time view of one cache slot.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub signature: RequestSignature,
    pub status: EntryStatus,
    pub payload: Option<T>,
    pub error: Option<CatalogError>,
    /// Time of the last successful resolution.
    pub last_resolved_at: Option<Instant>,
    pub is_fetching: bool,
}

impl<T> CacheEntry<T> {
    /// Entry for a signature that has never been requested.
    pub fn idle(signature: RequestSignature) -> Self {
        Self {
            signature,
            status: EntryStatus::Pending,
            payload: None,
            error: None,
            last_resolved_at: None,
            is_fetching: false,
        }
    }

    pub fn map_payload<U>(self, f: impl FnOnce(T) -> Option<U>) -> CacheEntry<U> {
        CacheEntry {
            signature: self.signature,
            status: self.status,
            payload: self.payload.and_then(f),
            error: self.error,
            last_resolved_at: self.last_resolved_at,
            is_fetching: self.is_fetching,
        }
    }
}

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, CatalogError>>>;

struct InFlight<T> {
    generation: u64,
    fetch: SharedFetch<T>,
}

struct Slot<T> {
    payload: Option<T>,
    error: Option<CatalogError>,
    last_resolved_at: Option<Instant>,
    invalidated: bool,
    inflight: Option<InFlight<T>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            payload: None,
            error: None,
            last_resolved_at: None,
            invalidated: false,
            inflight: None,
        }
    }
}

impl<T: Clone> Slot<T> {
    fn status(&self, now: Instant, stale_after: Duration) -> EntryStatus {
        if self.error.is_some() {
            return EntryStatus::Error;
        }
        match (&self.payload, self.last_resolved_at) {
            (Some(_), Some(resolved_at)) => {
                if self.invalidated || now.saturating_duration_since(resolved_at) >= stale_after {
                    EntryStatus::Stale
                } else {
                    EntryStatus::Fresh
                }
            }
            _ => EntryStatus::Pending,
        }
    }

    fn snapshot(
        &self,
        signature: &RequestSignature,
        now: Instant,
        stale_after: Duration,
    ) -> CacheEntry<T> {
        CacheEntry {
            signature: signature.clone(),
            status: self.status(now, stale_after),
            payload: self.payload.clone(),
            error: self.error.clone(),
            last_resolved_at: self.last_resolved_at,
            is_fetching: self.inflight.is_some(),
        }
    }
}

struct CacheState<T> {
    entries: HashMap<RequestSignature, Slot<T>>,
    next_generation: u64,
    /// Fetches started before the last reset never write back.
    reset_floor: u64,
}

impl<T> CacheState<T> {
    fn settle(
        &mut self,
        signature: &RequestSignature,
        generation: u64,
        outcome: &Result<T, CatalogError>,
    ) where
        T: Clone,
    {
        if generation < self.reset_floor {
            debug!(signature = %signature, generation, "query: dropping settlement from before reset");
            return;
        }
        let slot = self.entries.entry(signature.clone()).or_default();
        match outcome {
            Ok(payload) => {
                slot.payload = Some(payload.clone());
                slot.error = None;
                slot.last_resolved_at = Some(Instant::now());
            }
            // The previous payload stays so a failed refresh never blanks the view.
            Err(err) => slot.error = Some(err.clone()),
        }
        if slot
            .inflight
            .as_ref()
            .is_some_and(|inflight| inflight.generation == generation)
        {
            slot.inflight = None;
        }
    }
}

pub struct QueryCache<T> {
    state: Arc<Mutex<CacheState<T>>>,
    policy: CachePolicy,
}

impl<T> QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                next_generation: 0,
                reset_floor: 0,
            })),
            policy,
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Serves a fresh payload, joins a running fetch, or starts a new one.
    pub async fn resolve<F, Fut>(
        &self,
        signature: &RequestSignature,
        loader: F,
    ) -> Result<T, CatalogError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CatalogError>> + Send + 'static,
    {
        let fetch = {
            let mut guard = self.state.lock().await;
            let CacheState {
                entries,
                next_generation,
                ..
            } = &mut *guard;
            let slot = entries.entry(signature.clone()).or_default();

            if slot.status(Instant::now(), self.policy.stale_after) == EntryStatus::Fresh {
                if let Some(payload) = &slot.payload {
                    debug!(signature = %signature, "query: served fresh from cache");
                    return Ok(payload.clone());
                }
            }

            match &slot.inflight {
                Some(inflight) => {
                    debug!(
                        signature = %signature,
                        generation = inflight.generation,
                        "query: attached to in-flight fetch"
                    );
                    inflight.fetch.clone()
                }
                None => {
                    let generation = *next_generation;
                    *next_generation += 1;
                    info!(signature = %signature, generation, "query: fetch issued");
                    let fetch = run_fetch(
                        Arc::clone(&self.state),
                        signature.clone(),
                        generation,
                        self.policy,
                        loader,
                    )
                    .boxed()
                    .shared();
                    slot.invalidated = false;
                    slot.inflight = Some(InFlight {
                        generation,
                        fetch: fetch.clone(),
                    });
                    fetch
                }
            }
        };

        fetch.await
    }

    /// Makes the next `resolve` refetch. The current payload is kept until that
    /// fetch settles, and a running fetch is detached rather than joined.
    pub async fn invalidate(&self, signature: &RequestSignature) {
        let mut guard = self.state.lock().await;
        if let Some(slot) = guard.entries.get_mut(signature) {
            slot.invalidated = true;
            slot.inflight = None;
            debug!(signature = %signature, "query: invalidated");
        }
    }

    pub async fn entry(&self, signature: &RequestSignature) -> Option<CacheEntry<T>> {
        let guard = self.state.lock().await;
        guard
            .entries
            .get(signature)
            .map(|slot| slot.snapshot(signature, Instant::now(), self.policy.stale_after))
    }

    /// Drops every entry. Fetches still running will not write back.
    pub async fn clear(&self) {
        let mut guard = self.state.lock().await;
        guard.entries.clear();
        guard.reset_floor = guard.next_generation;
        info!("query: cache reset");
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

async fn run_fetch<T, F, Fut>(
    state: Arc<Mutex<CacheState<T>>>,
    signature: RequestSignature,
    generation: u64,
    policy: CachePolicy,
    loader: F,
) -> Result<T, CatalogError>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, CatalogError>> + Send + 'static,
{
    let outcome = load_with_retry(&signature, policy, &loader).await;
    match &outcome {
        Ok(_) => info!(signature = %signature, generation, "query: fetch settled"),
        Err(err) => warn!(signature = %signature, generation, error = %err, "query: fetch failed"),
    }
    state.lock().await.settle(&signature, generation, &outcome);
    outcome
}

async fn load_with_retry<T, F, Fut>(
    signature: &RequestSignature,
    policy: CachePolicy,
    loader: &F,
) -> Result<T, CatalogError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CatalogError>>,
{
    let max_attempts = policy.retry_attempts + 1;
    let mut attempt = 0;
    loop {
        match loader().await {
            Ok(payload) => return Ok(payload),
            Err(err) if err.is_transient() && attempt < policy.retry_attempts => {
                let delay = policy.retry_delay(attempt);
                warn!(
                    signature = %signature,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "query: transient failure; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
#[path = "tests/query_cache_tests.rs"]
mod tests;
