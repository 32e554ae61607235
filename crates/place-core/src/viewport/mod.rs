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

//! Map viewport state.
//!
//! The desktop and mobile maps are two views of the same selection. Neither
//! owns any place data; each is a small camera (center + zoom within limits)
//! that the selection controller drives and a map widget renders.
//!
//! Zoom follows the simple-CRS convention: at zoom `z` one image pixel spans
//! `2^z` screen pixels.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{Pixel, PixelBounds};

/// Unusable viewport limits.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ViewportError {
    #[error("{id:?} zoom limits must be finite")]
    NonFiniteZoom { id: ViewportId },

    #[error("{id:?} minimum zoom {min} is above maximum zoom {max}")]
    InvertedZoomRange { id: ViewportId, min: f64, max: f64 },

    #[error("{id:?} screen size must be positive, got {width}x{height}")]
    InvalidScreen { id: ViewportId, width: f64, height: f64 },
}

/// Which of the two map displays a viewport belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportId {
    Desktop,
    Mobile,
}

/// Zoom limits and screen size for one viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub initial_zoom: f64,
    /// Screen size in CSS pixels, `(width, height)`.
    pub screen: (f64, f64),
}

impl ViewportConfig {
    #[must_use]
    pub fn desktop() -> Self {
        Self {
            min_zoom: -1.0,
            max_zoom: 3.0,
            initial_zoom: 0.0,
            screen: (1280.0, 800.0),
        }
    }

    /// Check the limits before building a [`Viewport`] from them.
    pub fn validate(&self, id: ViewportId) -> Result<(), ViewportError> {
        if ![self.min_zoom, self.max_zoom, self.initial_zoom]
            .iter()
            .all(|z| z.is_finite())
        {
            return Err(ViewportError::NonFiniteZoom { id });
        }
        if self.min_zoom > self.max_zoom {
            return Err(ViewportError::InvertedZoomRange {
                id,
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        let (width, height) = self.screen;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(ViewportError::InvalidScreen { id, width, height });
        }
        Ok(())
    }

    /// `zoom` brought within the limits. Never panics, even on limits that
    /// failed [`ViewportConfig::validate`].
    #[must_use]
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.min(self.max_zoom).max(self.min_zoom)
    }

    #[must_use]
    pub fn mobile() -> Self {
        Self {
            min_zoom: -2.0,
            max_zoom: 3.0,
            initial_zoom: 0.0,
            screen: (390.0, 700.0),
        }
    }
}

/// Options for [`Viewport::fit_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FitOptions {
    /// Screen padding on every side.
    pub padding: f64,
    /// Upper zoom bound for this fit, on top of the viewport's own limit.
    pub max_zoom: Option<f64>,
}

impl FitOptions {
    /// Fit used when jumping to a single POI from the list.
    #[must_use]
    pub fn point() -> Self {
        Self {
            padding: 80.0,
            max_zoom: Some(1.0),
        }
    }
}

/// Camera state of one map display.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    id: ViewportId,
    config: ViewportConfig,
    center: Pixel,
    zoom: f64,
    user_location: Option<Pixel>,
}

impl Viewport {
    #[must_use]
    pub fn new(id: ViewportId, config: ViewportConfig) -> Self {
        let zoom = config.clamp_zoom(config.initial_zoom);
        Self {
            id,
            config,
            center: Pixel::default(),
            zoom,
            user_location: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> ViewportId {
        self.id
    }

    #[must_use]
    pub fn center(&self) -> Pixel {
        self.center
    }

    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    #[must_use]
    pub fn min_zoom(&self) -> f64 {
        self.config.min_zoom
    }

    #[must_use]
    pub fn user_location(&self) -> Option<Pixel> {
        self.user_location
    }

    /// Center on `point` without zooming out past the current zoom or below
    /// the minimum.
    pub fn center_on(&mut self, point: Pixel) {
        self.center = point;
        self.zoom = self.config.clamp_zoom(self.zoom);
    }

    /// Center on `bounds` at the largest whole zoom that shows all of it.
    pub fn fit_bounds(&mut self, bounds: PixelBounds, options: FitOptions) {
        let (screen_w, screen_h) = self.config.screen;
        let avail_w = (screen_w - 2.0 * options.padding).max(1.0);
        let avail_h = (screen_h - 2.0 * options.padding).max(1.0);

        let scale_w = if bounds.width() > 0.0 {
            avail_w / bounds.width()
        } else {
            f64::INFINITY
        };
        let scale_h = if bounds.height() > 0.0 {
            avail_h / bounds.height()
        } else {
            f64::INFINITY
        };

        let ceiling = options
            .max_zoom
            .map_or(self.config.max_zoom, |z| z.min(self.config.max_zoom));
        let wanted = scale_w.min(scale_h).log2().floor();

        self.center = bounds.center();
        self.zoom = wanted.min(ceiling).max(self.config.min_zoom);
    }

    /// Zoom in or out by whole steps, within limits.
    pub fn zoom_by(&mut self, delta: f64) {
        self.zoom = self.config.clamp_zoom(self.zoom + delta);
    }

    /// Move the "you are here" marker.
    pub fn set_user_location(&mut self, location: Pixel) {
        self.user_location = Some(location);
    }
}
