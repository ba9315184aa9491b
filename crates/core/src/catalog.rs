//! Ordered set of known organizations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::Slug;

/// One entry of `organizations.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub slug: Slug,
}

/// Known organization slugs, sorted lexicographically.
///
/// Serializes as the `[{"slug": ...}]` array written by the build pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CatalogEntry>", into = "Vec<CatalogEntry>")]
pub struct OrganizationCatalog {
    slugs: BTreeSet<Slug>,
}

impl OrganizationCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `slug` names a known organization.
    #[must_use]
    pub fn exists(&self, slug: &str) -> bool {
        Slug::parse(slug).is_ok_and(|slug| self.slugs.contains(&slug))
    }

    /// The lexicographically first organization.
    #[must_use]
    pub fn first(&self) -> Option<&Slug> {
        self.slugs.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slug> {
        self.slugs.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }

    /// Adds `slug`; returns `false` if it was already present.
    pub fn insert(&mut self, slug: Slug) -> bool {
        self.slugs.insert(slug)
    }

    /// Removes `slug`; returns `false` if it was not present.
    pub fn remove(&mut self, slug: &str) -> bool {
        Slug::parse(slug).is_ok_and(|slug| self.slugs.remove(&slug))
    }
}

impl From<Vec<CatalogEntry>> for OrganizationCatalog {
    fn from(entries: Vec<CatalogEntry>) -> Self {
        entries.into_iter().map(|entry| entry.slug).collect()
    }
}

impl From<OrganizationCatalog> for Vec<CatalogEntry> {
    fn from(catalog: OrganizationCatalog) -> Self {
        catalog
            .slugs
            .into_iter()
            .map(|slug| CatalogEntry { slug })
            .collect()
    }
}

impl FromIterator<Slug> for OrganizationCatalog {
    fn from_iter<I: IntoIterator<Item = Slug>>(iter: I) -> Self {
        Self {
            slugs: iter.into_iter().collect(),
        }
    }
}
