use std::collections::HashSet;

use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use crate::state::catalog::{CatalogEntry, DrawingCatalog};

/// Strategy used to pick the next artwork after each reveal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    /// Walk the catalog in order and wrap around at the end.
    #[default]
    Sequential,
    /// Pick uniformly among entries not yet shown in the current round.
    Shuffle,
}

/// Artwork chosen by a [`RotationCursor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick {
    /// Zero-based position in the catalog.
    pub position: usize,
    /// The chosen artwork.
    pub entry: CatalogEntry,
}

impl Pick {
    /// Human-readable, 1-based drawing number.
    pub fn number(&self) -> usize {
        self.position + 1
    }
}

/// Mutable rotation state owned by exactly one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationCursor {
    /// Walking the catalog in order.
    Sequential {
        /// Index of the next entry to reveal.
        index: usize,
    },
    /// Drawing without repeats until the round is exhausted.
    Shuffle {
        /// Catalog positions already revealed in the current round.
        used: HashSet<usize>,
    },
}

impl RotationCursor {
    /// Fresh cursor for `policy`, starting at the head of the catalog.
    pub fn new(policy: RotationPolicy) -> Self {
        match policy {
            RotationPolicy::Sequential => Self::Sequential { index: 0 },
            RotationPolicy::Shuffle => Self::Shuffle {
                used: HashSet::new(),
            },
        }
    }

    /// Choose the next artwork and advance the cursor.
    pub fn next<R: Rng>(&mut self, catalog: &DrawingCatalog, rng: &mut R) -> Pick {
        let len = catalog.len();
        let position = match self {
            Self::Sequential { index } => {
                let position = *index % len;
                *index = (position + 1) % len;
                position
            }
            Self::Shuffle { used } => {
                if used.len() >= len {
                    debug!(round = len, "every drawing shown; starting a new shuffle round");
                    used.clear();
                }
                let candidates = (0..len)
                    .filter(|position| !used.contains(position))
                    .collect::<Vec<_>>();
                let position = candidates[rng.random_range(0..candidates.len())];
                used.insert(position);
                position
            }
        };

        Pick {
            position,
            entry: catalog.at(position).clone(),
        }
    }

    /// Continue rotating as if `position` had just been picked.
    pub fn resume_after(&mut self, catalog: &DrawingCatalog, position: usize) {
        let len = catalog.len();
        match self {
            Self::Sequential { index } => *index = (position + 1) % len,
            Self::Shuffle { used } => {
                if position < len {
                    used.insert(position);
                }
            }
        }
    }
}
