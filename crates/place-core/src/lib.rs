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

//! Place data and selection state for image-based venue maps.
//!
//! A venue map is a single image (a campus plan, a floor plan) with points
//! of interest and zone polygons drawn in image pixels. This crate keeps
//! those places in sync with a live document source and drives a single
//! "current selection" that every part of the viewer renders from.
//!
//! - **Geo layer**: calibrated GPS → pixel mapping ([`geo`])
//! - **Registry layer**: snapshot-replaced place set with change events
//!   ([`protocol`], [`registry`], [`feed`])
//! - **Selection layer**: current place, nearby recommendations, two map
//!   viewports, the searchable sidebar and deep links ([`selection`],
//!   [`recommend`], [`viewport`], [`sidebar`], [`links`])
//! - **Assistant layer**: questions about the selected place with model
//!   fallback ([`assistant`])
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use place_core::links::LinkConfig;
//! use place_core::registry::PlaceRegistry;
//! use place_core::selection::{SelectionController, Views};
//! use serde_json::json;
//!
//! let registry = Arc::new(PlaceRegistry::new());
//! registry.replace_all(vec![
//!     json!({ "id": "lib", "title": "Library", "coords": { "x": 100, "y": 100 } }),
//!     json!({ "id": "caf", "title": "Cafe", "coords": { "x": 110, "y": 100 } }),
//! ]);
//!
//! let mut selection =
//!     SelectionController::new(Arc::clone(&registry), Views::default(), LinkConfig::default());
//! selection.select_by_id("lib").unwrap();
//!
//! let nearby = &selection.views().recommendations.items;
//! assert_eq!(nearby[0].place.id, "caf");
//! ```
//!
//! For a fully wired viewer with feeds, location tracking and the assistant,
//! see [`session::Session`].

pub mod assistant;
pub mod feed;
pub mod geo;
pub mod links;
pub mod place;
pub mod protocol;
pub mod recommend;
pub mod registry;
pub mod selection;
pub mod session;
pub mod sidebar;
pub mod tracking;
pub mod viewport;

pub use assistant::{AssistantBridge, AssistantConfig, AssistantError, OpenRouterBackend, WikipediaSummaries};
pub use feed::{Feed, FeedConfig, FeedError, FeedEvent, FeedSource};
pub use geo::{Calibration, CalibrationError, CoordinateMapper, GeoPoint, ImageSize, Pixel};
pub use links::{Clipboard, ClipboardError, LinkConfig, MemoryClipboard};
pub use place::{Place, PlaceKind};
pub use protocol::ParseError;
pub use recommend::{recommend, Recommendation, DEFAULT_RECOMMENDATIONS};
pub use registry::{PlaceRegistry, PlaceSnapshot, RegistryEvent};
pub use selection::{SelectRequest, Selection, SelectionController, SelectionError, SelectionEvent, Views};
pub use session::{Session, SessionConfig, SessionError};
pub use sidebar::{SidebarProjector, SidebarRow};
pub use tracking::{GeoFix, LocationTracker};
pub use viewport::{FitOptions, Viewport, ViewportConfig, ViewportError, ViewportId};
