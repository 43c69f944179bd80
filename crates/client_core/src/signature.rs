use std::fmt;

use shared::domain::{EntityId, FilterSet};

/// Cache key for one logical query.
///
/// `FilterSet` stores each key in a fixed slot with empty values already
/// dropped, so equal inputs hash equally no matter how the set was built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestSignature {
    Collection { page: u32, filters: FilterSet },
    Entity { id: EntityId },
}

impl RequestSignature {
    pub fn collection(page: u32, filters: &FilterSet) -> Self {
        Self::Collection {
            page,
            filters: filters.clone(),
        }
    }

    pub fn entity(id: EntityId) -> Self {
        Self::Entity { id }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Collection { .. } => "characters",
            Self::Entity { .. } => "character",
        }
    }
}

impl fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collection { page, filters } => {
                write!(f, "{}?page={page}", self.kind())?;
                for (key, value) in filters.active() {
                    write!(f, "&{key}={value}")?;
                }
                Ok(())
            }
            Self::Entity { id } => write!(f, "{}/{id}", self.kind()),
        }
    }
}
