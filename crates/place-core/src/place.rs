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

//! The place model shared by every layer.
//!
//! A [`Place`] is either a point of interest or a zone polygon. Both carry a
//! single representative pixel point ([`Place::display_coords`]) that is used
//! for distance ranking and for centering the map; for zones it is derived
//! from the boundary and cannot drift from it.

use serde::{Deserialize, Serialize};

use crate::geo::{GeoPoint, Pixel, PixelBounds};

/// Image shown when a place has no image of its own.
pub const PLACEHOLDER_IMAGE: &str = "placeholder.jpg";

/// Minimum number of vertices for a zone boundary.
pub const MIN_ZONE_VERTICES: usize = 3;

/// Place category. Each kind lives in its own document collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Poi,
    Zone,
}

impl PlaceKind {
    /// Name of the document collection holding this kind.
    #[must_use]
    pub fn collection(self) -> &'static str {
        match self {
            PlaceKind::Poi => "pois",
            PlaceKind::Zone => "zones",
        }
    }

    /// Short label shown in list rows.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            PlaceKind::Poi => "POI",
            PlaceKind::Zone => "Zone",
        }
    }

    #[must_use]
    pub fn from_collection(name: &str) -> Option<Self> {
        match name {
            "pois" => Some(PlaceKind::Poi),
            "zones" => Some(PlaceKind::Zone),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A point of interest or a zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    /// Identifier assigned by the document store.
    pub id: String,
    pub kind: PlaceKind,
    pub title: String,
    pub description: Option<String>,
    pub image_ref: Option<String>,
    pub thumbnail_ref: Option<String>,
    /// Geodetic position used for external map links.
    pub real_world_coords: Option<GeoPoint>,
    display_coords: Pixel,
    boundary: Option<Vec<Pixel>>,
}

impl Place {
    /// Create a point of interest at a pixel location.
    pub fn poi(id: impl Into<String>, title: impl Into<String>, at: Pixel) -> Self {
        Self {
            id: id.into(),
            kind: PlaceKind::Poi,
            title: title.into(),
            description: None,
            image_ref: None,
            thumbnail_ref: None,
            real_world_coords: None,
            display_coords: at,
            boundary: None,
        }
    }

    /// Create a zone from its polygon boundary.
    ///
    /// Returns `None` when the boundary has fewer than three vertices.
    pub fn zone(id: impl Into<String>, title: impl Into<String>, boundary: Vec<Pixel>) -> Option<Self> {
        if boundary.len() < MIN_ZONE_VERTICES {
            return None;
        }
        let center = PixelBounds::from_points(&boundary)?.center();
        Some(Self {
            id: id.into(),
            kind: PlaceKind::Zone,
            title: title.into(),
            description: None,
            image_ref: None,
            thumbnail_ref: None,
            real_world_coords: None,
            display_coords: center,
            boundary: Some(boundary),
        })
    }

    /// Representative pixel point: the marker for a POI, the boundary
    /// bounding-box center for a zone.
    #[must_use]
    pub fn display_coords(&self) -> Pixel {
        self.display_coords
    }

    /// Zone polygon vertices, `None` for a POI.
    #[must_use]
    pub fn boundary(&self) -> Option<&[Pixel]> {
        self.boundary.as_deref()
    }

    /// Area a viewport should fit to show this place.
    #[must_use]
    pub fn bounds(&self) -> PixelBounds {
        self.boundary
            .as_deref()
            .and_then(PixelBounds::from_points)
            .unwrap_or(PixelBounds {
                min: self.display_coords,
                max: self.display_coords,
            })
    }

    /// Image to display, falling back to the placeholder.
    #[must_use]
    pub fn image_or_placeholder(&self) -> &str {
        self.image_ref.as_deref().unwrap_or(PLACEHOLDER_IMAGE)
    }

    /// List thumbnail: thumbnail, then full image, then nothing.
    #[must_use]
    pub fn thumbnail_src(&self) -> &str {
        self.thumbnail_ref
            .as_deref()
            .or(self.image_ref.as_deref())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_center_is_bounding_box_center() {
        // Mean of vertices would be (7.5, 7.5); bounding box center is (10, 10)
        let zone = Place::zone(
            "zone-c",
            "Zone C",
            vec![
                Pixel::new(0.0, 0.0),
                Pixel::new(0.0, 20.0),
                Pixel::new(20.0, 20.0),
                Pixel::new(20.0, 0.0),
                Pixel::new(0.0, 0.0),
            ],
        )
        .unwrap();
        assert_eq!(zone.display_coords(), Pixel::new(10.0, 10.0));
        assert_eq!(zone.kind, PlaceKind::Zone);
    }

    #[test]
    fn test_zone_needs_three_vertices() {
        let zone = Place::zone("z", "Z", vec![Pixel::new(0.0, 0.0), Pixel::new(1.0, 1.0)]);
        assert!(zone.is_none());
    }

    #[test]
    fn test_image_fallbacks() {
        let poi = Place::poi("a", "A", Pixel::new(1.0, 2.0));
        assert_eq!(poi.image_or_placeholder(), PLACEHOLDER_IMAGE);
        assert_eq!(poi.thumbnail_src(), "");

        let mut poi = poi;
        poi.image_ref = Some("a.jpg".to_string());
        assert_eq!(poi.thumbnail_src(), "a.jpg");

        poi.thumbnail_ref = Some("a_thumb.jpg".to_string());
        assert_eq!(poi.thumbnail_src(), "a_thumb.jpg");
        assert_eq!(poi.image_or_placeholder(), "a.jpg");
    }

    #[test]
    fn test_poi_bounds_is_single_point() {
        let poi = Place::poi("a", "A", Pixel::new(5.0, 6.0));
        let bounds = poi.bounds();
        assert_eq!(bounds.min, bounds.max);
        assert_eq!(bounds.center(), Pixel::new(5.0, 6.0));
    }

    #[test]
    fn test_kind_collections() {
        assert_eq!(PlaceKind::from_collection("pois"), Some(PlaceKind::Poi));
        assert_eq!(PlaceKind::from_collection("zones"), Some(PlaceKind::Zone));
        assert_eq!(PlaceKind::from_collection("users"), None);
        assert_eq!(PlaceKind::Zone.label(), "Zone");
    }
}
