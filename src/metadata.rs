//! Store taxonomy: category and platform ids by name

use crate::client::{MetadataResponse, NamedId, StoreClient};
use crate::{Error, Result};

/// Name to id mapping that keeps the server's order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMap {
    entries: Vec<(String, u64)>,
}

impl IdMap {
    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    pub fn first(&self) -> Option<(&str, u64)> {
        self.entries.first().map(|(n, id)| (n.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick `preferred` if present, otherwise the first-seen entry
    pub fn select(&self, preferred: &str) -> Option<Selection> {
        if let Some(id) = self.get(preferred) {
            return Some(Selection {
                id,
                name: preferred.to_string(),
                fallback: false,
            });
        }

        self.first().map(|(name, id)| Selection {
            id,
            name: name.to_string(),
            fallback: true,
        })
    }
}

/// A repeated name keeps its first position but takes the later id
impl FromIterator<NamedId> for IdMap {
    fn from_iter<I: IntoIterator<Item = NamedId>>(iter: I) -> Self {
        let mut map = IdMap::default();
        for item in iter {
            match map.entries.iter_mut().find(|(name, _)| *name == item.name) {
                Some(existing) => existing.1 = item.id,
                None => map.entries.push((item.name, item.id)),
            }
        }
        map
    }
}

/// A resolved category or platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub id: u64,
    pub name: String,
    /// True when the preferred name was absent and the first entry was used
    pub fallback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    pub categories: IdMap,
    pub platforms: IdMap,
}

impl From<MetadataResponse> for Taxonomy {
    fn from(metadata: MetadataResponse) -> Self {
        Self {
            categories: metadata.categories.into_iter().collect(),
            platforms: metadata.platforms.into_iter().collect(),
        }
    }
}

/// Category and platform ids attached to every created app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTargets {
    pub category: Selection,
    pub platform: Selection,
}

/// Fetch the taxonomy; a rejected request is an [`Error::Auth`]
pub fn resolve_metadata(client: &StoreClient) -> Result<Taxonomy> {
    Ok(client.get_metadata()?.into())
}

impl Taxonomy {
    /// Apply the selection policy, warning on every fallback
    pub fn select_targets(&self, category: &str, platform: &str) -> Result<PublishTargets> {
        let category = select_one(&self.categories, "category", category)?;
        let platform = select_one(&self.platforms, "platform", platform)?;
        Ok(PublishTargets { category, platform })
    }
}

fn select_one(map: &IdMap, kind: &str, preferred: &str) -> Result<Selection> {
    let selection = map.select(preferred).ok_or_else(|| {
        Error::MalformedResponse(format!("store metadata lists no {} entries", kind))
    })?;

    if selection.fallback {
        eprintln!(
            "  ⚠ No {} named \"{}\"; using \"{}\" (ID: {}) instead",
            kind, preferred, selection.name, selection.id
        );
    }

    Ok(selection)
}
