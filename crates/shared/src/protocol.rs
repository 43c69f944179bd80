use serde::{Deserialize, Serialize};

use crate::domain::{CollectionPage, Entity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    pub count: u32,
    pub pages: u32,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
}

/// Envelope returned by the remote collection endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub info: PageInfo,
    pub results: Vec<T>,
}

pub type CharactersResponse = ApiResponse<Entity>;

/// Body the remote sends alongside non-2xx statuses, e.g. `{"error":"There is nothing here"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteErrorBody {
    pub error: String,
}

impl From<CharactersResponse> for CollectionPage {
    fn from(value: CharactersResponse) -> Self {
        Self {
            total_count: value.info.count,
            total_pages: value.info.pages,
            has_next: value.info.next.is_some(),
            has_prev: value.info.prev.is_some(),
            entities: value.results,
        }
    }
}
