use std::sync::Arc;

use shared::{
    domain::{CollectionPage, Entity, EntityId, FilterKey, FilterSet},
    error::CatalogError,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    gateway::CatalogGateway,
    query_cache::{CacheEntry, CachePolicy, QueryCache},
    signature::RequestSignature,
    url_state::{is_acceptable_filter_value, parse_query, rewrite_query, AddressBar, ViewState},
};

/// Payload stored per signature; the signature kind decides the variant.
#[derive(Debug, Clone)]
pub enum QueryPayload {
    Collection(Arc<CollectionPage>),
    Entity(Arc<Entity>),
}

impl QueryPayload {
    pub fn into_collection(self) -> Option<Arc<CollectionPage>> {
        match self {
            Self::Collection(page) => Some(page),
            Self::Entity(_) => None,
        }
    }

    pub fn into_entity(self) -> Option<Arc<Entity>> {
        match self {
            Self::Entity(entity) => Some(entity),
            Self::Collection(_) => None,
        }
    }
}

/// Result of a manual refresh. `retained` is what the view keeps showing,
/// which on failure is the last good payload.
#[derive(Debug, Clone)]
pub struct RefreshReport<T> {
    pub outcome: Result<T, CatalogError>,
    pub retained: Option<T>,
}

impl<T> RefreshReport<T> {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

struct SynchronizerState {
    view: ViewState,
    staged: FilterSet,
    selected: Option<EntityId>,
    /// Page count from the last successful collection page for the committed filters.
    total_pages: Option<u32>,
}

pub struct CatalogSynchronizer {
    gateway: Arc<dyn CatalogGateway>,
    address_bar: Arc<dyn AddressBar>,
    cache: QueryCache<QueryPayload>,
    inner: Mutex<SynchronizerState>,
}

fn validate_filters(filters: &FilterSet) -> Result<(), CatalogError> {
    for (key, value) in filters.active() {
        if !is_acceptable_filter_value(value) {
            return Err(CatalogError::validation(format!(
                "filter '{key}' contains control characters"
            )));
        }
    }
    Ok(())
}

fn kind_mismatch(signature: &RequestSignature) -> CatalogError {
    CatalogError::transport(None, format!("cached payload kind mismatch for {signature}"))
}

impl CatalogSynchronizer {
    pub fn new(
        gateway: Arc<dyn CatalogGateway>,
        address_bar: Arc<dyn AddressBar>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            gateway,
            address_bar,
            cache: QueryCache::new(policy),
            inner: Mutex::new(SynchronizerState {
                view: ViewState::default(),
                staged: FilterSet::new(),
                selected: None,
                total_pages: None,
            }),
        }
    }

    pub fn cache(&self) -> &QueryCache<QueryPayload> {
        &self.cache
    }

    /// Re-derives state from the address bar and loads it. This is the only
    /// address bar -> state path; call it again after external back/forward.
    pub async fn activate(&self) -> Result<Arc<CollectionPage>, CatalogError> {
        let view = parse_query(&self.address_bar.read_query());
        {
            let mut inner = self.inner.lock().await;
            if inner.view.filters != view.filters {
                inner.total_pages = None;
            }
            inner.view = view.clone();
            inner.staged = view.filters.clone();
        }
        info!(signature = %view.signature(), "sync: activated from address bar");
        self.resolve_collection(view.current_page, view.filters).await
    }

    pub async fn view_state(&self) -> ViewState {
        self.inner.lock().await.view.clone()
    }

    pub async fn staged_filters(&self) -> FilterSet {
        self.inner.lock().await.staged.clone()
    }

    /// Local edit; no fetch and no address bar write until committed.
    pub async fn stage_filter(&self, key: FilterKey, value: impl Into<String>) {
        self.inner.lock().await.staged.set(key, Some(value.into()));
    }

    pub async fn has_active_filters(&self) -> bool {
        !self.inner.lock().await.staged.is_empty()
    }

    pub async fn submit_filters(
        &self,
        filters: FilterSet,
    ) -> Result<Arc<CollectionPage>, CatalogError> {
        validate_filters(&filters)?;
        let view = {
            let mut inner = self.inner.lock().await;
            inner.staged = filters;
            self.commit_staged(&mut inner)
        };
        info!(signature = %view.signature(), "sync: filters committed");
        self.resolve_collection(view.current_page, view.filters).await
    }

    pub async fn clear_filters(&self) -> Result<Arc<CollectionPage>, CatalogError> {
        self.submit_filters(FilterSet::new()).await
    }

    /// Commits the staged filters and returns to the first page.
    pub async fn submit_staged(&self) -> Result<Arc<CollectionPage>, CatalogError> {
        let view = {
            let mut inner = self.inner.lock().await;
            validate_filters(&inner.staged)?;
            self.commit_staged(&mut inner)
        };
        info!(signature = %view.signature(), "sync: filters committed");
        self.resolve_collection(view.current_page, view.filters).await
    }

    pub async fn go_to_page(&self, target: u32) -> Result<Arc<CollectionPage>, CatalogError> {
        self.move_to_page(|_| Some(target)).await
    }

    pub async fn next_page(&self) -> Result<Arc<CollectionPage>, CatalogError> {
        self.move_to_page(|current| current.checked_add(1)).await
    }

    pub async fn previous_page(&self) -> Result<Arc<CollectionPage>, CatalogError> {
        self.move_to_page(|current| current.checked_sub(1)).await
    }

    async fn move_to_page(
        &self,
        target: impl FnOnce(u32) -> Option<u32>,
    ) -> Result<Arc<CollectionPage>, CatalogError> {
        let view = {
            let mut inner = self.inner.lock().await;
            let current = inner.view.current_page;
            let Some(total_pages) = inner.total_pages else {
                warn!(current, "sync: page change rejected; page count unknown");
                return Err(CatalogError::validation(
                    "page count unknown until a collection page has loaded",
                ));
            };
            let target = target(current).unwrap_or(0);
            if target < 1 || target > total_pages {
                warn!(requested = target, total_pages, "sync: page change rejected; out of range");
                return Err(CatalogError::validation(format!(
                    "page {target} is outside 1..={total_pages}"
                )));
            }
            inner.view.current_page = target;
            self.write_address_bar(&inner.view);
            inner.view.clone()
        };
        info!(page = view.current_page, "sync: page changed");
        self.resolve_collection(view.current_page, view.filters).await
    }

    /// Refetches the active collection without touching state or the address bar.
    pub async fn refresh(&self) -> RefreshReport<Arc<CollectionPage>> {
        let view = self.view_state().await;
        let signature = view.signature();
        self.cache.invalidate(&signature).await;
        let outcome = self
            .resolve_collection(view.current_page, view.filters)
            .await;
        let retained = self
            .cache
            .entry(&signature)
            .await
            .and_then(|entry| entry.payload)
            .and_then(QueryPayload::into_collection);
        match &outcome {
            Ok(_) => info!(signature = %signature, "sync: refresh succeeded"),
            Err(err) => warn!(
                signature = %signature,
                error = %err,
                kept_previous = retained.is_some(),
                "sync: refresh failed"
            ),
        }
        RefreshReport { outcome, retained }
    }

    /// Status and payload for the active collection signature.
    pub async fn current_result(&self) -> CacheEntry<Arc<CollectionPage>> {
        let signature = self.view_state().await.signature();
        self.cache
            .entry(&signature)
            .await
            .unwrap_or_else(|| CacheEntry::idle(signature))
            .map_payload(QueryPayload::into_collection)
    }

    pub async fn selected_entity(&self) -> Option<EntityId> {
        self.inner.lock().await.selected
    }

    pub async fn select_entity(&self, id: EntityId) -> CacheEntry<Arc<Entity>> {
        self.inner.lock().await.selected = Some(id);
        info!(entity_id = id.0, "sync: entity selected");
        let _ = self.resolve_entity(id).await;
        self.entity_result(id).await
    }

    pub async fn deselect_entity(&self) {
        self.inner.lock().await.selected = None;
    }

    pub async fn entity_result(&self, id: EntityId) -> CacheEntry<Arc<Entity>> {
        let signature = RequestSignature::entity(id);
        self.cache
            .entry(&signature)
            .await
            .unwrap_or_else(|| CacheEntry::idle(signature))
            .map_payload(QueryPayload::into_entity)
    }

    pub async fn refresh_entity(&self) -> Result<RefreshReport<Arc<Entity>>, CatalogError> {
        let id = self
            .selected_entity()
            .await
            .ok_or_else(|| CatalogError::validation("no entity selected"))?;
        let signature = RequestSignature::entity(id);
        self.cache.invalidate(&signature).await;
        let outcome = self.resolve_entity(id).await;
        let retained = self.entity_result(id).await.payload;
        if let Err(err) = &outcome {
            warn!(entity_id = id.0, error = %err, "sync: entity refresh failed");
        }
        Ok(RefreshReport { outcome, retained })
    }

    fn commit_staged(&self, inner: &mut SynchronizerState) -> ViewState {
        if inner.view.filters != inner.staged {
            inner.total_pages = None;
        }
        inner.view = ViewState {
            current_page: 1,
            filters: inner.staged.clone(),
        };
        self.write_address_bar(&inner.view);
        inner.view.clone()
    }

    fn write_address_bar(&self, view: &ViewState) {
        let query = rewrite_query(&self.address_bar.read_query(), view);
        debug!(query = %query, "sync: address bar updated");
        self.address_bar.push_query(&query);
    }

    async fn resolve_collection(
        &self,
        page: u32,
        filters: FilterSet,
    ) -> Result<Arc<CollectionPage>, CatalogError> {
        let signature = RequestSignature::collection(page, &filters);
        let gateway = Arc::clone(&self.gateway);
        let outcome = self
            .cache
            .resolve(&signature, move || {
                let gateway = Arc::clone(&gateway);
                let filters = filters.clone();
                async move {
                    gateway
                        .fetch_collection(page, &filters)
                        .await
                        .map(|page| QueryPayload::Collection(Arc::new(page)))
                }
            })
            .await
            .and_then(|payload| {
                payload
                    .into_collection()
                    .ok_or_else(|| kind_mismatch(&signature))
            });

        let mut inner = self.inner.lock().await;
        if inner.view.signature() != signature {
            debug!(signature = %signature, "sync: superseded collection response not applied");
            return outcome;
        }
        // Bounds only move on success; a failed page keeps the last known count.
        if let Ok(page) = &outcome {
            inner.total_pages = Some(page.total_pages);
        }
        outcome
    }

    async fn resolve_entity(&self, id: EntityId) -> Result<Arc<Entity>, CatalogError> {
        let signature = RequestSignature::entity(id);
        let gateway = Arc::clone(&self.gateway);
        self.cache
            .resolve(&signature, move || {
                let gateway = Arc::clone(&gateway);
                async move {
                    gateway
                        .fetch_entity(id)
                        .await
                        .map(|entity| QueryPayload::Entity(Arc::new(entity)))
                }
            })
            .await
            .and_then(|payload| payload.into_entity().ok_or_else(|| kind_mismatch(&signature)))
    }
}

#[cfg(test)]
#[path = "tests/synchronizer_tests.rs"]
mod tests;
