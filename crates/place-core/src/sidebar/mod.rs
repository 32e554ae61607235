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

//! Searchable POI and zone lists.
//!
//! Rows mirror the registry snapshot they were rendered from, in registry
//! order. Filtering only flips visibility so list order never changes.

use log::{debug, warn};

use crate::links::Clipboard;
use crate::place::{Place, PlaceKind};
use crate::selection::{SelectionController, SelectionError};

/// One list entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SidebarRow {
    pub id: String,
    pub title: String,
    pub kind: PlaceKind,
    pub thumbnail: String,
    pub visible: bool,
    place: Place,
}

impl SidebarRow {
    fn new(place: &Place) -> Self {
        Self {
            id: place.id.clone(),
            title: place.title.clone(),
            kind: place.kind,
            thumbnail: place.thumbnail_src().to_string(),
            visible: true,
            place: place.clone(),
        }
    }

    /// "POI" or "Zone".
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    #[must_use]
    pub fn place(&self) -> &Place {
        &self.place
    }
}

/// The two sidebar lists plus the active search query.
#[derive(Debug, Clone, Default)]
pub struct SidebarProjector {
    pois: Vec<SidebarRow>,
    zones: Vec<SidebarRow>,
    query: String,
}

impl SidebarProjector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild both lists from a full snapshot and re-apply the filter.
    pub fn render(&mut self, places: &[Place]) {
        self.pois.clear();
        self.zones.clear();

        for place in places {
            let row = SidebarRow::new(place);
            match place.kind {
                PlaceKind::Poi => self.pois.push(row),
                PlaceKind::Zone => self.zones.push(row),
            }
        }

        let query = std::mem::take(&mut self.query);
        self.filter(&query);
        debug!(
            "Sidebar rendered {} POIs and {} zones",
            self.pois.len(),
            self.zones.len()
        );
    }

    /// Show rows whose title contains `query`, ignoring case and
    /// surrounding whitespace. An empty query shows everything.
    pub fn filter(&mut self, query: &str) {
        self.query = query.trim().to_lowercase();
        let needle = self.query.as_str();
        for row in self.pois.iter_mut().chain(self.zones.iter_mut()) {
            row.visible = needle.is_empty() || row.title.to_lowercase().contains(needle);
        }
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn pois(&self) -> &[SidebarRow] {
        &self.pois
    }

    #[must_use]
    pub fn zones(&self) -> &[SidebarRow] {
        &self.zones
    }

    /// Rows currently shown, POIs first.
    pub fn visible_rows(&self) -> impl Iterator<Item = &SidebarRow> {
        self.pois
            .iter()
            .chain(self.zones.iter())
            .filter(|row| row.visible)
    }

    fn row(&self, id: &str) -> Option<&SidebarRow> {
        self.pois
            .iter()
            .chain(self.zones.iter())
            .find(|row| row.id == id)
    }

    /// The row's "go" action: select the place and fit both maps to it.
    pub fn go(&self, id: &str, controller: &mut SelectionController) -> Result<(), SelectionError> {
        let place = self
            .row(id)
            .map(|row| row.place.clone())
            .ok_or_else(|| SelectionError::UnknownPlace(id.to_string()))?;

        controller.select(&place)?;
        controller.fit_place(&place);
        Ok(())
    }

    /// The row's "share" action: copy an external map link to the place.
    ///
    /// Returns `None` when the row is unknown or no link can be built.
    pub fn share<C: Clipboard + ?Sized>(
        &self,
        id: &str,
        controller: &SelectionController,
        clipboard: &mut C,
    ) -> Option<String> {
        let place = &self.row(id)?.place;
        let display = place.display_coords();
        let Some(url) = controller.links().directions_url(
            place.real_world_coords,
            crate::geo::GeoPoint::new(display.y, display.x),
        ) else {
            debug!("No map link for '{}': missing real-world position", place.title);
            return None;
        };

        if let Err(e) = clipboard.write_text(&url) {
            warn!("Could not copy map link for '{}': {e}", place.title);
        }
        Some(url)
    }
}
