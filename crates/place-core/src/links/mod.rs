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

//! Deep links, external map links and the clipboard seam.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::GeoPoint;

/// Fragment key used for place deep links (`#poi=<id>`).
pub const FRAGMENT_KEY: &str = "poi";

/// Default external map search URL; coordinates are appended as `lat,lng`.
pub const DEFAULT_DIRECTIONS_URL: &str = "https://www.google.com/maps?q=";

/// Settings for link generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Page origin + path the map is served from.
    pub page_url: String,
    /// External map URL prefix.
    pub directions_url: String,
    /// Build directions from pixel coordinates when a place has no
    /// real-world position. Produces links to meaningless locations.
    pub pixel_directions_fallback: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            page_url: "http://localhost:8080/".to_string(),
            directions_url: DEFAULT_DIRECTIONS_URL.to_string(),
            pixel_directions_fallback: false,
        }
    }
}

impl LinkConfig {
    /// Page URL without any fragment.
    #[must_use]
    pub fn map_url(&self) -> &str {
        self.page_url
            .split_once('#')
            .map_or(self.page_url.as_str(), |(base, _)| base)
    }

    /// Fully-qualified deep link to a place.
    #[must_use]
    pub fn share_url(&self, id: &str) -> String {
        format!(
            "{}#{FRAGMENT_KEY}={}",
            self.map_url(),
            urlencoding::encode(id)
        )
    }

    /// External map link for a place.
    ///
    /// `real_world` wins when present. Otherwise `pixel` is used only when
    /// the fallback is enabled.
    #[must_use]
    pub fn directions_url(&self, real_world: Option<GeoPoint>, pixel: GeoPoint) -> Option<String> {
        let target = match real_world {
            Some(coords) => coords,
            None if self.pixel_directions_fallback => pixel,
            None => return None,
        };
        Some(format!("{}{},{}", self.directions_url, target.lat, target.lng))
    }
}

/// Extract the place id from a `#poi=<id>` fragment.
///
/// Accepts the fragment with or without the leading `#` and ignores other
/// `key=value` pairs.
#[must_use]
pub fn parse_fragment(fragment: &str) -> Option<String> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    fragment
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == FRAGMENT_KEY)
        .and_then(|(_, value)| urlencoding::decode(&value.replace('+', " ")).ok().map(|v| v.into_owned()))
        .filter(|id| !id.is_empty())
}

/// Clipboard failures.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard is not available")]
    Unavailable,

    #[error("clipboard write failed: {0}")]
    Write(String),
}

/// Destination for share actions.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard that keeps the last written value in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    last: Option<String>,
}

impl MemoryClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.last = Some(text.to_string());
        Ok(())
    }
}
