use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ConfigError;

/// Opaque identifier (path or URL) of an artwork asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct CatalogEntry(String);

impl CatalogEntry {
    /// Wrap a raw asset path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Borrow the underlying path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable ordered list of the artworks the server can reveal.
///
/// The list is shared behind an [`Arc`] so engines (server and offline
/// client fallbacks) can hold it without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingCatalog {
    entries: Arc<[CatalogEntry]>,
}

impl DrawingCatalog {
    /// Build a catalog, refusing an empty list.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        Ok(Self {
            entries: entries.into(),
        })
    }

    /// Convenience constructor from plain path strings.
    pub fn from_paths<I, S>(paths: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(paths.into_iter().map(CatalogEntry::new).collect())
    }

    /// Number of artworks; never zero.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true; an empty list is refused by [`DrawingCatalog::new`].
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `position`, wrapping past the end; total because the catalog is never empty.
    pub fn at(&self, position: usize) -> &CatalogEntry {
        &self.entries[position % self.entries.len()]
    }

    /// Position of the first occurrence of `entry` in catalog order.
    pub fn position(&self, entry: &CatalogEntry) -> Option<usize> {
        self.entries.iter().position(|candidate| candidate == entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalog_is_rejected() {
        let err = DrawingCatalog::new(Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCatalog));
    }

    #[test]
    fn position_follows_catalog_order() {
        let catalog = DrawingCatalog::from_paths(["/a.png", "/b.png", "/c.png"]).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.position(&CatalogEntry::new("/c.png")), Some(2));
        assert_eq!(catalog.position(&CatalogEntry::new("/missing.png")), None);
        assert_eq!(catalog.at(4).as_str(), "/b.png");
    }
}
