// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Live set of places mirrored from the document store.
//!
//! The registry never merges: every update installs a complete new set.
//! Readers hold an [`Arc`] to an immutable snapshot, so a concurrent replace
//! is observed either entirely or not at all.
//!
//! Two update paths exist:
//! - [`PlaceRegistry::replace_all`] swaps the whole set from mixed records.
//! - [`PlaceRegistry::replace_collection`] swaps one collection (`pois` or
//!   `zones`) and keeps the other, matching one listener per collection.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::place::{Place, PlaceKind};
use crate::protocol::parse_document;

/// Immutable view of the registry at one point in time.
pub type PlaceSnapshot = Arc<Vec<Place>>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Emitted after every swap.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Replaced {
        /// Collection that was replaced, `None` for a full replace.
        kind: Option<PlaceKind>,
        /// Places now in the registry.
        count: usize,
        /// Records dropped from the incoming snapshot.
        skipped: usize,
        at: DateTime<Utc>,
    },
}

/// Deduplicated place set with snapshot-replace semantics.
pub struct PlaceRegistry {
    places: RwLock<PlaceSnapshot>,
    event_tx: broadcast::Sender<RegistryEvent>,
}

impl std::fmt::Debug for PlaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceRegistry")
            .field("place_count", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for PlaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceRegistry {
    #[must_use]
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            places: RwLock::new(Arc::new(Vec::new())),
            event_tx,
        }
    }

    /// Replace the entire set with the places decoded from `raw_docs`.
    ///
    /// Each record's shape decides its kind. Malformed records and repeated
    /// ids are skipped; the rest of the snapshot is still installed.
    pub fn replace_all<I>(&self, raw_docs: I) -> PlaceSnapshot
    where
        I: IntoIterator<Item = Value>,
    {
        let (places, skipped) = decode(raw_docs, None, &HashSet::new());
        let snapshot = Arc::new(places);
        self.install(Arc::clone(&snapshot), None, skipped);
        snapshot
    }

    /// Replace only the places of one collection.
    ///
    /// POIs are kept ahead of zones so iteration order is stable across
    /// updates of either collection.
    pub fn replace_collection<I>(&self, kind: PlaceKind, raw_docs: I) -> PlaceSnapshot
    where
        I: IntoIterator<Item = Value>,
    {
        let (snapshot, skipped) = {
            let mut guard = match self.places.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };

            let kept: Vec<Place> = guard.iter().filter(|p| p.kind != kind).cloned().collect();
            let reserved: HashSet<String> = kept.iter().map(|p| p.id.clone()).collect();
            let (fresh, skipped) = decode(raw_docs, Some(kind), &reserved);

            let merged = match kind {
                PlaceKind::Poi => fresh.into_iter().chain(kept).collect(),
                PlaceKind::Zone => kept.into_iter().chain(fresh).collect(),
            };
            let snapshot: PlaceSnapshot = Arc::new(merged);
            *guard = Arc::clone(&snapshot);
            (snapshot, skipped)
        };

        self.announce(Some(kind), snapshot.len(), skipped);
        snapshot
    }

    /// Current snapshot. Cheap; clones an `Arc`.
    #[must_use]
    pub fn snapshot(&self) -> PlaceSnapshot {
        match self.places.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Look up a place by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Place> {
        self.snapshot().iter().find(|p| p.id == id).cloned()
    }

    /// Places of a single kind, in registry order.
    #[must_use]
    pub fn of_kind(&self, kind: PlaceKind) -> Vec<Place> {
        self.snapshot()
            .iter()
            .filter(|p| p.kind == kind)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Subscribe to replace notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    fn install(&self, snapshot: PlaceSnapshot, kind: Option<PlaceKind>, skipped: usize) {
        let count = snapshot.len();
        {
            let mut guard = match self.places.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = snapshot;
        }
        self.announce(kind, count, skipped);
    }

    fn announce(&self, kind: Option<PlaceKind>, count: usize, skipped: usize) {
        let scope = kind.map_or("all", PlaceKind::collection);
        info!("Registry replaced ({scope}): {count} places, {skipped} skipped");
        let _ = self.event_tx.send(RegistryEvent::Replaced {
            kind,
            count,
            skipped,
            at: Utc::now(),
        });
    }
}

/// Decode records, dropping malformed ones and duplicate or reserved ids.
fn decode<I>(raw_docs: I, expected: Option<PlaceKind>, reserved: &HashSet<String>) -> (Vec<Place>, usize)
where
    I: IntoIterator<Item = Value>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut places = Vec::new();
    let mut skipped = 0;

    for raw in raw_docs {
        let place = match parse_document(raw, expected) {
            Ok(place) => place,
            Err(e) => {
                warn!("Skipping malformed document: {e}");
                skipped += 1;
                continue;
            }
        };

        if reserved.contains(&place.id) || !seen.insert(place.id.clone()) {
            debug!("Skipping duplicate place id {}", place.id);
            skipped += 1;
            continue;
        }

        places.push(place);
    }

    (places, skipped)
}
