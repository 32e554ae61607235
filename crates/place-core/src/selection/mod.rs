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

//! The single current selection and everything that follows from it.
//!
//! [`SelectionController`] is a two-state machine (`Empty` / `Active`). Every
//! transition rewrites the dependent [`Views`] in one place:
//!
//! - details panel and footer
//! - desktop and mobile viewports (centered, never zoomed out)
//! - nearby recommendations, ranked against the registry at that moment
//! - assistant question/answer, cleared so answers never outlive the place
//!   they were about

mod views;

pub use views::{
    AssistantPanel, DetailsPanel, RecommendationPanel, Views, IDLE_FOOTER, SHARE_COPIED_LABEL,
    SHARE_LABEL,
};

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::geo::{GeoPoint, Pixel};
use crate::links::{parse_fragment, Clipboard, LinkConfig};
use crate::place::{Place, PlaceKind};
use crate::recommend::{recommend, DEFAULT_RECOMMENDATIONS};
use crate::registry::PlaceRegistry;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Coordinates as callers hand them in: `[lat, lng]` or `{lat, lng}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordsInput {
    Pair([f64; 2]),
    Object(GeoPoint),
}

impl CoordsInput {
    /// Canonical `{lat, lng}` form.
    #[must_use]
    pub fn normalize(self) -> GeoPoint {
        match self {
            CoordsInput::Pair([lat, lng]) => GeoPoint::new(lat, lng),
            CoordsInput::Object(point) => point,
        }
    }
}

/// Anything that can be selected: a registry place or an ad-hoc record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub kind: Option<PlaceKind>,
    pub title: String,
    #[serde(default, alias = "desc")]
    pub description: Option<String>,
    #[serde(default, alias = "img")]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub coords: Option<CoordsInput>,
    #[serde(default)]
    pub display_coords: Option<Pixel>,
    #[serde(default)]
    pub real_world_coords: Option<GeoPoint>,
}

impl From<&Place> for SelectRequest {
    fn from(place: &Place) -> Self {
        Self {
            id: Some(place.id.clone()),
            kind: Some(place.kind),
            title: place.title.clone(),
            description: place.description.clone(),
            image_ref: place.image_ref.clone(),
            coords: None,
            display_coords: Some(place.display_coords()),
            real_world_coords: place.real_world_coords,
        }
    }
}

impl From<Place> for SelectRequest {
    fn from(place: Place) -> Self {
        Self::from(&place)
    }
}

/// The active selection: a self-contained copy of the selected place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub id: Option<String>,
    pub kind: Option<PlaceKind>,
    pub title: String,
    pub description: Option<String>,
    pub image_ref: Option<String>,
    /// Map position in `{lat, lng}` form; these are image pixels, not degrees.
    pub coords: GeoPoint,
    pub real_world_coords: Option<GeoPoint>,
}

impl Selection {
    /// The map position as a pixel point.
    #[must_use]
    pub fn display_coords(&self) -> Pixel {
        Pixel::new(self.coords.lat, self.coords.lng)
    }

    /// Id used in deep links; the title stands in for ad-hoc selections.
    #[must_use]
    pub fn link_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.title)
    }
}

impl TryFrom<SelectRequest> for Selection {
    type Error = SelectionError;

    fn try_from(request: SelectRequest) -> Result<Self, Self::Error> {
        let coords = request
            .coords
            .map(CoordsInput::normalize)
            .or_else(|| request.display_coords.map(|p| GeoPoint::new(p.y, p.x)))
            .ok_or(SelectionError::MissingCoords)?;

        if !coords.lat.is_finite() || !coords.lng.is_finite() {
            return Err(SelectionError::NonFiniteCoords);
        }

        Ok(Self {
            id: request.id,
            kind: request.kind,
            title: request.title,
            description: request.description,
            image_ref: request.image_ref,
            coords,
            real_world_coords: request.real_world_coords,
        })
    }
}

/// Rejected selection requests.
#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("selection has neither coords nor displayCoords")]
    MissingCoords,

    #[error("selection coordinates are not finite")]
    NonFiniteCoords,

    #[error("no place with id '{0}'")]
    UnknownPlace(String),
}

/// Emitted on every state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    Selected {
        id: Option<String>,
        title: String,
        recommendations: usize,
    },
    Dismissed,
}

/// Owner of the current selection.
pub struct SelectionController {
    registry: Arc<PlaceRegistry>,
    links: LinkConfig,
    current: Option<Selection>,
    views: Views,
    event_tx: broadcast::Sender<SelectionEvent>,
}

impl std::fmt::Debug for SelectionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionController")
            .field("current", &self.current.as_ref().map(|s| &s.title))
            .finish_non_exhaustive()
    }
}

impl SelectionController {
    #[must_use]
    pub fn new(registry: Arc<PlaceRegistry>, views: Views, links: LinkConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry,
            links,
            current: None,
            views,
            event_tx,
        }
    }

    /// Current selection, `None` when empty.
    #[must_use]
    pub fn current(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    #[must_use]
    pub fn views(&self) -> &Views {
        &self.views
    }

    /// Mutable views for user-driven pan/zoom and assistant output.
    pub fn views_mut(&mut self) -> &mut Views {
        &mut self.views
    }

    #[must_use]
    pub fn links(&self) -> &LinkConfig {
        &self.links
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PlaceRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent> {
        self.event_tx.subscribe()
    }

    /// Make `request` the current selection and update every view.
    pub fn select(&mut self, request: impl Into<SelectRequest>) -> Result<&Selection, SelectionError> {
        let selection = Selection::try_from(request.into())?;
        let origin = selection.display_coords();

        self.views.panel = DetailsPanel {
            visible: true,
            title: selection.title.clone(),
            image: selection
                .image_ref
                .clone()
                .unwrap_or_else(|| crate::place::PLACEHOLDER_IMAGE.to_string()),
            description: selection.description.clone().unwrap_or_default(),
        };
        self.views.footer.clone_from(&selection.title);

        for viewport in self.views.viewports_mut() {
            viewport.center_on(origin);
        }

        let places = self.registry.snapshot();
        let ranked = recommend(origin, selection.id.as_deref(), &places, DEFAULT_RECOMMENDATIONS);
        self.views.recommendations = RecommendationPanel {
            visible: !ranked.is_empty(),
            items: ranked,
        };

        self.views.assistant.reset();

        info!(
            "Selected '{}' ({} nearby)",
            selection.title,
            self.views.recommendations.items.len()
        );
        let _ = self.event_tx.send(SelectionEvent::Selected {
            id: selection.id.clone(),
            title: selection.title.clone(),
            recommendations: self.views.recommendations.items.len(),
        });

        Ok(self.current.insert(selection))
    }

    /// Select a registry place by id, as if it had been clicked.
    pub fn select_by_id(&mut self, id: &str) -> Result<&Selection, SelectionError> {
        let place = self
            .registry
            .get(id)
            .ok_or_else(|| SelectionError::UnknownPlace(id.to_string()))?;
        self.select(place)
    }

    /// Follow a click on the `index`-th recommendation.
    pub fn select_recommendation(&mut self, index: usize) -> Result<&Selection, SelectionError> {
        let place = self
            .views
            .recommendations
            .items
            .get(index)
            .map(|r| r.place.clone())
            .ok_or_else(|| SelectionError::UnknownPlace(format!("recommendation #{index}")))?;
        self.select(place)
    }

    /// Resolve a `#poi=<id>` deep link against the registry and select it.
    ///
    /// Unknown or malformed fragments are ignored.
    pub fn open_from_fragment(&mut self, fragment: &str) -> Option<&Selection> {
        let id = parse_fragment(fragment)?;
        match self.select_by_id(&id) {
            Ok(selection) => Some(selection),
            Err(e) => {
                debug!("Ignoring deep link: {e}");
                None
            }
        }
    }

    /// Clear the selection. Does nothing when already empty.
    pub fn dismiss(&mut self) -> bool {
        if self.current.take().is_none() {
            return false;
        }

        self.views.panel = DetailsPanel::default();
        self.views.footer = IDLE_FOOTER.to_string();
        self.views.recommendations = RecommendationPanel::default();
        self.views.share_label = SHARE_LABEL.to_string();
        self.views.assistant.reset();

        debug!("Selection dismissed");
        let _ = self.event_tx.send(SelectionEvent::Dismissed);
        true
    }

    /// Copy a deep link to the current place.
    ///
    /// Returns the link even when the clipboard write fails; the failure is
    /// only logged. `None` when nothing is selected.
    pub fn share_link<C: Clipboard + ?Sized>(&mut self, clipboard: &mut C) -> Option<String> {
        let url = self.links.share_url(self.current.as_ref()?.link_id());

        match clipboard.write_text(&url) {
            Ok(()) => self.views.share_label = SHARE_COPIED_LABEL.to_string(),
            Err(e) => warn!("Could not copy share link {url}: {e}"),
        }

        Some(url)
    }

    /// Copy the map's own address, without a place fragment.
    ///
    /// Works with or without a selection. A clipboard failure is logged.
    pub fn copy_map_link<C: Clipboard + ?Sized>(&self, clipboard: &mut C) -> String {
        let url = self.links.map_url().to_string();
        if let Err(e) = clipboard.write_text(&url) {
            warn!("Could not copy map link {url}: {e}");
        }
        url
    }

    /// Restore the share button label after its confirmation timeout.
    pub fn reset_share_label(&mut self) {
        self.views.share_label = SHARE_LABEL.to_string();
    }

    /// External map link for the current place.
    ///
    /// `None` when nothing is selected, or when the place has no real-world
    /// position and the pixel fallback is disabled.
    #[must_use]
    pub fn directions_link(&self) -> Option<String> {
        let current = self.current.as_ref()?;
        self.links
            .directions_url(current.real_world_coords, current.coords)
    }

    /// Fit both viewports to the whole image.
    pub fn fit_all(&mut self, image: crate::geo::ImageSize) {
        for viewport in self.views.viewports_mut() {
            viewport.fit_bounds(image.bounds(), crate::viewport::FitOptions::default());
        }
    }

    /// Fit both viewports to a place, the way list navigation does.
    pub fn fit_place(&mut self, place: &Place) {
        let options = match place.kind {
            PlaceKind::Poi => crate::viewport::FitOptions::point(),
            PlaceKind::Zone => crate::viewport::FitOptions::default(),
        };
        for viewport in self.views.viewports_mut() {
            viewport.fit_bounds(place.bounds(), options);
        }
    }
}
