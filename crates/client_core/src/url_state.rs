use std::sync::Mutex;

use shared::domain::{FilterKey, FilterSet};
use url::{form_urlencoded, Url};

use crate::signature::RequestSignature;

pub const PAGE_PARAM: &str = "page";

/// Canonical navigable state: the committed page and filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub current_page: u32,
    pub filters: FilterSet,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            current_page: 1,
            filters: FilterSet::new(),
        }
    }
}

impl ViewState {
    pub fn signature(&self) -> RequestSignature {
        RequestSignature::collection(self.current_page, &self.filters)
    }
}

/// Accepts a bare query (`page=2`), a leading-`?` query, or a full URL.
fn query_part(raw: &str) -> String {
    if raw.contains("://") {
        return Url::parse(raw)
            .ok()
            .and_then(|url| url.query().map(str::to_string))
            .unwrap_or_default();
    }
    let raw = raw.split('#').next().unwrap_or_default();
    raw.trim_start_matches('?').to_string()
}

/// Filter values may not carry control characters, whether typed or deep-linked.
pub fn is_acceptable_filter_value(value: &str) -> bool {
    !value.chars().any(char::is_control)
}

fn parse_page(raw: &str) -> u32 {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|page| *page >= 1)
        .unwrap_or(1)
}

/// Address bar -> state. Missing or unusable values fall back to defaults;
/// the first occurrence of a repeated parameter wins, and filter values with
/// control characters are treated as absent.
pub fn parse_query(raw: &str) -> ViewState {
    let query = query_part(raw);
    let mut page = None;
    let mut filters = FilterSet::new();
    let mut seen = Vec::new();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key == PAGE_PARAM {
            if page.is_none() {
                page = Some(parse_page(&value));
            }
        } else if let Some(filter_key) = FilterKey::parse(&key) {
            if !seen.contains(&filter_key) {
                seen.push(filter_key);
                if is_acceptable_filter_value(&value) {
                    filters.set(filter_key, Some(value.into_owned()));
                }
            }
        }
    }

    ViewState {
        current_page: page.unwrap_or(1),
        filters,
    }
}

/// State -> query string with a leading `?`. Absent filters write nothing.
pub fn to_query(state: &ViewState) -> String {
    rewrite_query("", state)
}

/// Rewrites the owned parameters of `existing`, keeping any foreign ones
/// after them in their original order.
pub fn rewrite_query(existing: &str, state: &ViewState) -> String {
    let existing = query_part(existing);
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.append_pair(PAGE_PARAM, &state.current_page.to_string());
    for (key, value) in state.filters.active() {
        serializer.append_pair(key.as_str(), value);
    }
    for (key, value) in form_urlencoded::parse(existing.as_bytes()) {
        if key != PAGE_PARAM && FilterKey::parse(&key).is_none() {
            serializer.append_pair(&key, &value);
        }
    }
    format!("?{}", serializer.finish())
}

/// Where the navigable query string lives (a browser location, a CLI flag, ...).
pub trait AddressBar: Send + Sync {
    fn read_query(&self) -> String;
    fn push_query(&self, query: &str);
}

/// History-keeping address bar used by the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryAddressBar {
    history: Mutex<Vec<String>>,
}

impl MemoryAddressBar {
    pub fn new(initial_query: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(vec![initial_query.into()]),
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn current(&self) -> String {
        self.lock().last().cloned().unwrap_or_default()
    }

    /// Pops the current entry, like a browser back button. The first entry stays.
    pub fn back(&self) -> Option<String> {
        let mut history = self.lock();
        if history.len() <= 1 {
            return None;
        }
        history.pop();
        history.last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AddressBar for MemoryAddressBar {
    fn read_query(&self) -> String {
        self.current()
    }

    fn push_query(&self, query: &str) {
        self.lock().push(query.to_string());
    }
}

#[cfg(test)]
#[path = "tests/url_state_tests.rs"]
mod tests;
