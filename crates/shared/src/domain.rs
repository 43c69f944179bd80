use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(EntityId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityStatus {
    Alive,
    Dead,
    #[serde(rename = "unknown")]
    Unknown,
}

/// Visual weight a consumer should give a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeVariant {
    Default,
    Destructive,
    Secondary,
}

impl EntityStatus {
    pub fn badge(self) -> BadgeVariant {
        match self {
            Self::Alive => BadgeVariant::Default,
            Self::Dead => BadgeVariant::Destructive,
            Self::Unknown => BadgeVariant::Secondary,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alive => "Alive",
            Self::Dead => "Dead",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityGender {
    Female,
    Male,
    Genderless,
    #[serde(rename = "unknown")]
    Unknown,
}

impl EntityGender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Female => "Female",
            Self::Male => "Male",
            Self::Genderless => "Genderless",
            Self::Unknown => "unknown",
        }
    }
}

/// A named place reference; the url's last path segment is its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRef {
    pub name: String,
    pub url: String,
}

impl LocationRef {
    pub fn id(&self) -> Option<EntityId> {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|segment| segment.parse::<i64>().ok())
            .map(EntityId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub status: EntityStatus,
    pub species: String,
    #[serde(rename = "type", default)]
    pub subtype: String,
    pub gender: EntityGender,
    pub origin: LocationRef,
    pub location: LocationRef,
    pub image: String,
    #[serde(default)]
    pub episode: Vec<String>,
    #[serde(default)]
    pub url: String,
    pub created: DateTime<Utc>,
}

impl Entity {
    pub fn episode_count(&self) -> usize {
        self.episode.len()
    }
}

/// One page of a collection query. Rebuilt from every successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPage {
    pub entities: Vec<Entity>,
    pub total_count: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl CollectionPage {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn summary(&self, current_page: u32) -> String {
        format!(
            "Showing page {current_page} of {} ({} total)",
            self.total_pages, self.total_count
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterKey {
    Name,
    Status,
    Species,
    Gender,
}

impl FilterKey {
    /// Canonical order used for signatures and URL serialization.
    pub const ALL: [FilterKey; 4] = [
        FilterKey::Name,
        FilterKey::Status,
        FilterKey::Species,
        FilterKey::Gender,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Status => "status",
            Self::Species => "species",
            Self::Gender => "gender",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == raw)
    }

    /// Options offered by the filter panel. Empty for free-text keys.
    pub fn suggested_values(self) -> &'static [&'static str] {
        match self {
            Self::Name => &[],
            Self::Status => &["alive", "dead", "unknown"],
            Self::Species => &[
                "human",
                "alien",
                "humanoid",
                "robot",
                "cronenberg",
                "disease",
                "poopybutthole",
            ],
            Self::Gender => &["female", "male", "genderless", "unknown"],
        }
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional constraint per recognized filter key.
///
/// Empty strings are stored as absent, so derived equality already treats
/// `Some("")` and `None` as the same constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterSet {
    name: Option<String>,
    status: Option<String>,
    species: Option<String>,
    gender: Option<String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: FilterKey, value: impl Into<String>) -> Self {
        self.set(key, Some(value.into()));
        self
    }

    pub fn set(&mut self, key: FilterKey, value: Option<String>) {
        *self.slot_mut(key) = value.filter(|v| !v.is_empty());
    }

    pub fn get(&self, key: FilterKey) -> Option<&str> {
        match key {
            FilterKey::Name => self.name.as_deref(),
            FilterKey::Status => self.status.as_deref(),
            FilterKey::Species => self.species.as_deref(),
            FilterKey::Gender => self.gender.as_deref(),
        }
    }

    /// Non-empty entries in canonical key order.
    pub fn active(&self) -> impl Iterator<Item = (FilterKey, &str)> + '_ {
        FilterKey::ALL
            .into_iter()
            .filter_map(move |key| self.get(key).map(|value| (key, value)))
    }

    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    fn slot_mut(&mut self, key: FilterKey) -> &mut Option<String> {
        match key {
            FilterKey::Name => &mut self.name,
            FilterKey::Status => &mut self.status,
            FilterKey::Species => &mut self.species,
            FilterKey::Gender => &mut self.gender,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for FilterSet
where
    K: Into<FilterKey>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = FilterSet::new();
        for (key, value) in iter {
            filters.set(key.into(), Some(value.into()));
        }
        filters
    }
}
