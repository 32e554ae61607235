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

//! Nearby-place recommendations.
//!
//! Ranking is a plain nearest-neighbour pass over the registry snapshot the
//! caller hands in. Nothing is cached: zone centers move whenever a new
//! snapshot arrives, so every call ranks from scratch.

use crate::geo::Pixel;
use crate::place::Place;

/// Number of recommendations shown for a selection.
pub const DEFAULT_RECOMMENDATIONS: usize = 3;

/// A recommended place with its distance from the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub place: Place,
    /// Pixel distance from the origin to the place's display point.
    pub distance: f64,
}

/// Rank `places` by distance from `origin`, skipping `exclude_id`.
///
/// The sort is stable, so equal distances keep registry order. An empty
/// result means there is nothing to recommend.
#[must_use]
pub fn recommend(origin: Pixel, exclude_id: Option<&str>, places: &[Place], k: usize) -> Vec<Recommendation> {
    let mut ranked: Vec<Recommendation> = places
        .iter()
        .filter(|p| Some(p.id.as_str()) != exclude_id)
        .map(|p| Recommendation {
            distance: origin.distance_to(p.display_coords()),
            place: p.clone(),
        })
        .collect();

    ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    ranked.truncate(k);
    ranked
}
