pub mod config;
pub mod gateway;
pub mod query_cache;
pub mod signature;
pub mod synchronizer;
pub mod url_state;

use std::sync::Arc;

pub use config::{load_settings, load_settings_from, Settings};
pub use gateway::{CatalogGateway, HttpCatalogGateway};
pub use query_cache::{CacheEntry, CachePolicy, EntryStatus, QueryCache};
pub use signature::RequestSignature;
pub use synchronizer::{CatalogSynchronizer, QueryPayload, RefreshReport};
pub use url_state::{parse_query, rewrite_query, to_query, AddressBar, MemoryAddressBar, ViewState};

/// Wires an HTTP gateway and cache policy from `settings` into a synchronizer.
pub fn connect(
    settings: &Settings,
    address_bar: Arc<dyn AddressBar>,
) -> anyhow::Result<CatalogSynchronizer> {
    let gateway =
        HttpCatalogGateway::with_timeout(settings.base_url.clone(), settings.request_timeout())?;
    tracing::info!(base_url = %gateway.base_url(), "client: gateway configured");
    Ok(CatalogSynchronizer::new(
        Arc::new(gateway),
        address_bar,
        settings.cache_policy(),
    ))
}
