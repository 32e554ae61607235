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

//! Document layer: raw store records to [`Place`] values.
//!
//! Snapshots arrive as JSON. Each document is decoded on its own so that one
//! malformed record is reported as a [`ParseError`] for that record only and
//! never poisons the rest of the snapshot.

mod document;

pub use document::{RawDocument, RawGeo, RawPoint};

use serde_json::Value;
use thiserror::Error;

use crate::geo::{GeoPoint, Pixel};
use crate::place::{Place, PlaceKind};

/// Errors that can occur while decoding documents.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid snapshot format: {0}")]
    InvalidFormat(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("zone boundary has {0} vertices, need at least 3")]
    TooFewVertices(usize),

    #[error("document shape does not match the {expected} collection")]
    ShapeMismatch { expected: PlaceKind },
}

/// Split a snapshot payload into its documents.
///
/// Accepts either a bare JSON array or an object with a `documents` array.
pub fn parse_snapshot(input: &[u8]) -> Result<Vec<Value>, ParseError> {
    let value: Value =
        serde_json::from_slice(input).map_err(|e| ParseError::InvalidFormat(e.to_string()))?;

    match value {
        Value::Array(docs) => Ok(docs),
        Value::Object(mut map) => match map.remove("documents") {
            Some(Value::Array(docs)) => Ok(docs),
            _ => Err(ParseError::MissingField("documents")),
        },
        other => Err(ParseError::InvalidFormat(format!(
            "expected array or object, got {other}"
        ))),
    }
}

/// Decode one raw document into a place.
///
/// `expected` is the kind implied by the source collection; `None` lets the
/// document's shape decide (polygon list → zone, point → POI).
pub fn parse_document(value: Value, expected: Option<PlaceKind>) -> Result<Place, ParseError> {
    let doc: RawDocument =
        serde_json::from_value(value).map_err(|e| ParseError::InvalidFormat(e.to_string()))?;
    doc.into_place(expected)
}

impl RawDocument {
    /// Validate coordinates and build the place.
    pub fn into_place(self, expected: Option<PlaceKind>) -> Result<Place, ParseError> {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ParseError::MissingField("id"))?;

        let kind = match (expected, &self.coordinates, &self.coords) {
            (Some(kind), _, _) => kind,
            (None, Some(_), _) => PlaceKind::Zone,
            (None, None, Some(_)) => PlaceKind::Poi,
            (None, None, None) => return Err(ParseError::MissingField("coords")),
        };

        let title = self.title.unwrap_or_default();

        let mut place = match kind {
            PlaceKind::Poi => {
                let point = self
                    .coords
                    .as_ref()
                    .ok_or(ParseError::ShapeMismatch { expected: kind })?;
                Place::poi(id, title, point_to_pixel(point, "coords")?)
            }
            PlaceKind::Zone => {
                let vertices = self
                    .coordinates
                    .as_ref()
                    .ok_or(ParseError::ShapeMismatch { expected: kind })?;
                let boundary = vertices
                    .iter()
                    .map(|v| point_to_pixel(v, "coordinates"))
                    .collect::<Result<Vec<_>, _>>()?;
                let count = boundary.len();
                Place::zone(id, title, boundary).ok_or(ParseError::TooFewVertices(count))?
            }
        };

        place.description = self.desc.filter(|d| !d.is_empty());
        place.image_ref = self.img.filter(|s| !s.is_empty());
        place.thumbnail_ref = self.thumb.filter(|s| !s.is_empty());
        place.real_world_coords = self.real_world_coords.as_ref().and_then(RawGeo::to_geo);
        Ok(place)
    }
}

/// Store points put the row axis in `x` and the column axis in `y`.
fn point_to_pixel(point: &RawPoint, field: &'static str) -> Result<Pixel, ParseError> {
    let row = number(point.x.as_ref(), field)?;
    let col = number(point.y.as_ref(), field)?;
    Ok(Pixel::new(row, col))
}

fn number(value: Option<&Value>, field: &'static str) -> Result<f64, ParseError> {
    let value = value.ok_or(ParseError::MissingField(field))?;
    finite_number(value).ok_or_else(|| ParseError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

/// Numbers, or strings holding numbers, that are finite.
pub(crate) fn finite_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

impl RawGeo {
    fn to_geo(&self) -> Option<GeoPoint> {
        let lat = finite_number(self.lat.as_ref()?)?;
        let lng = finite_number(self.lng.as_ref()?)?;
        Some(GeoPoint::new(lat, lng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_poi_document() {
        let place = parse_document(
            json!({
                "id": "marker-9",
                "title": "Library",
                "desc": "Built in 1920.",
                "img": "lib.jpg",
                "coords": { "x": 127, "y": 1000 },
                "realWorldCoords": { "lat": 2.98, "lng": 101.51 }
            }),
            Some(PlaceKind::Poi),
        )
        .unwrap();

        assert_eq!(place.kind, PlaceKind::Poi);
        assert_eq!(place.display_coords(), Pixel::new(127.0, 1000.0));
        assert_eq!(place.description.as_deref(), Some("Built in 1920."));
        assert_eq!(place.real_world_coords, Some(GeoPoint::new(2.98, 101.51)));
    }

    #[test]
    fn test_parse_zone_document() {
        let place = parse_document(
            json!({
                "id": "zone-j",
                "title": "Zone J",
                "coordinates": [
                    { "x": 677, "y": 719 },
                    { "x": 637, "y": 766 },
                    { "x": 601, "y": 737 },
                    { "x": 643, "y": 695 }
                ]
            }),
            None,
        )
        .unwrap();

        assert_eq!(place.kind, PlaceKind::Zone);
        assert_eq!(place.boundary().unwrap().len(), 4);
        assert_eq!(place.display_coords(), Pixel::new(639.0, 730.5));
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let place = parse_document(
            json!({ "id": "a", "title": "A", "coords": { "x": "10.5", "y": " 20 " } }),
            None,
        )
        .unwrap();
        assert_eq!(place.display_coords(), Pixel::new(10.5, 20.0));
    }

    #[test]
    fn test_non_numeric_coordinate_rejected() {
        let result = parse_document(
            json!({ "id": "a", "title": "A", "coords": { "x": "north", "y": 20 } }),
            None,
        );
        assert!(matches!(
            result,
            Err(ParseError::InvalidValue { field: "coords", .. })
        ));
    }

    #[test]
    fn test_zone_with_two_vertices_rejected() {
        let result = parse_document(
            json!({ "id": "z", "coordinates": [{ "x": 0, "y": 0 }, { "x": 1, "y": 1 }] }),
            Some(PlaceKind::Zone),
        );
        assert!(matches!(result, Err(ParseError::TooFewVertices(2))));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result = parse_document(
            json!({ "id": "a", "coords": { "x": 1, "y": 2 } }),
            Some(PlaceKind::Zone),
        );
        assert!(matches!(
            result,
            Err(ParseError::ShapeMismatch {
                expected: PlaceKind::Zone
            })
        ));
    }

    #[test]
    fn test_partial_real_world_coords_ignored() {
        let place = parse_document(
            json!({
                "id": "a",
                "coords": { "x": 1, "y": 2 },
                "realWorldCoords": { "lat": 2.9, "lng": null }
            }),
            None,
        )
        .unwrap();
        assert!(place.real_world_coords.is_none());
    }

    #[test]
    fn test_parse_snapshot_shapes() {
        let docs = parse_snapshot(br#"[{"id":"a"},{"id":"b"}]"#).unwrap();
        assert_eq!(docs.len(), 2);

        let docs = parse_snapshot(br#"{"documents":[{"id":"a"}]}"#).unwrap();
        assert_eq!(docs.len(), 1);

        assert!(matches!(
            parse_snapshot(br#"{"items":[]}"#),
            Err(ParseError::MissingField("documents"))
        ));
        assert!(parse_snapshot(b"not json").is_err());
    }
}
