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

//! Wire shape of `pois` and `zones` documents.
//!
//! ```text
//! { "id", "title", "desc", "img", "thumb",
//!   "coords": {"x", "y"} | "coordinates": [{"x", "y"}, ...],
//!   "realWorldCoords": {"lat", "lng"} }
//! ```
//!
//! Coordinate members are kept as raw JSON values and validated later, so a
//! bad number is reported against its field instead of failing the decode.

use serde::Deserialize;
use serde_json::Value;

/// A pixel point as stored, possibly holding strings or garbage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPoint {
    #[serde(default)]
    pub x: Option<Value>,
    #[serde(default)]
    pub y: Option<Value>,
}

/// A geodetic point as stored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGeo {
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lng: Option<Value>,
}

/// One document from either collection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub coords: Option<RawPoint>,
    #[serde(default)]
    pub coordinates: Option<Vec<RawPoint>>,
    #[serde(default, rename = "realWorldCoords")]
    pub real_world_coords: Option<RawGeo>,
}
