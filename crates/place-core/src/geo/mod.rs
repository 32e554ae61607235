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

//! Geodetic and image-pixel coordinate types.
//!
//! The venue map is a single raster image. Places are stored in its pixel
//! space using the `(y, x)` row/column order the map widget expects, and GPS
//! fixes are converted into that space by a [`CoordinateMapper`] calibrated
//! with two geodetic corners.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A geodetic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    fn is_finite(self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// A point in image-pixel space. `y` is the row axis, `x` the column axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pixel {
    pub y: f64,
    pub x: f64,
}

impl Pixel {
    #[must_use]
    pub fn new(y: f64, x: f64) -> Self {
        Self { y, x }
    }

    /// Planar Euclidean distance in pixels.
    #[must_use]
    pub fn distance_to(self, other: Pixel) -> f64 {
        let dy = self.y - other.y;
        let dx = self.x - other.x;
        dy.hypot(dx)
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBounds {
    pub min: Pixel,
    pub max: Pixel,
}

impl PixelBounds {
    /// Smallest rectangle containing every point, or `None` for an empty set.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Pixel>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for p in iter {
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
            bounds.max.x = bounds.max.x.max(p.x);
        }
        Some(bounds)
    }

    /// Midpoint of the min/max extents on each axis.
    #[must_use]
    pub fn center(&self) -> Pixel {
        Pixel {
            y: (self.min.y + self.max.y) / 2.0,
            x: (self.min.x + self.max.x) / 2.0,
        }
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }
}

/// Pixel dimensions of the map image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: f64,
    pub height: f64,
}

impl ImageSize {
    /// Full-image bounds, used by "fit all".
    #[must_use]
    pub fn bounds(&self) -> PixelBounds {
        PixelBounds {
            min: Pixel::new(0.0, 0.0),
            max: Pixel::new(self.height, self.width),
        }
    }
}

/// The two geodetic reference corners of the map image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub top_left: GeoPoint,
    pub bottom_right: GeoPoint,
}

/// Configuration errors rejected when building a mapper.
#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("calibration corners share latitude {0}")]
    DegenerateLatitude(f64),

    #[error("calibration corners share longitude {0}")]
    DegenerateLongitude(f64),

    #[error("calibration corner is not a finite coordinate")]
    NonFiniteCorner,

    #[error("image size must be positive and finite, got {width}x{height}")]
    InvalidImageSize { width: f64, height: f64 },
}

/// Linear geodetic → pixel mapping for a calibrated image.
///
/// Construction validates the calibration, so [`CoordinateMapper::to_pixel`]
/// is total and side-effect free.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    calibration: Calibration,
    image: ImageSize,
}

impl CoordinateMapper {
    pub fn new(calibration: Calibration, image: ImageSize) -> Result<Self, CalibrationError> {
        let Calibration {
            top_left,
            bottom_right,
        } = calibration;

        if !top_left.is_finite() || !bottom_right.is_finite() {
            return Err(CalibrationError::NonFiniteCorner);
        }
        if same_value(top_left.lat, bottom_right.lat) {
            return Err(CalibrationError::DegenerateLatitude(top_left.lat));
        }
        if same_value(top_left.lng, bottom_right.lng) {
            return Err(CalibrationError::DegenerateLongitude(top_left.lng));
        }
        let size_ok = |v: f64| v.is_finite() && v > 0.0;
        if !size_ok(image.width) || !size_ok(image.height) {
            return Err(CalibrationError::InvalidImageSize {
                width: image.width,
                height: image.height,
            });
        }

        Ok(Self { calibration, image })
    }

    #[must_use]
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    #[must_use]
    pub fn image(&self) -> ImageSize {
        self.image
    }

    /// Convert a geodetic position into image pixels.
    #[must_use]
    pub fn to_pixel(&self, lat: f64, lng: f64) -> Pixel {
        let Calibration {
            top_left: tl,
            bottom_right: br,
        } = self.calibration;

        let y = (lat - br.lat) / (tl.lat - br.lat) * self.image.height;
        let x = (lng - tl.lng) / (br.lng - tl.lng) * self.image.width;

        Pixel { y, x }
    }
}

#[allow(clippy::float_cmp, reason = "only exact equality divides by zero")]
fn same_value(a: f64, b: f64) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campus() -> CoordinateMapper {
        CoordinateMapper::new(
            Calibration {
                top_left: GeoPoint::new(2.983_514, 101.506_878),
                bottom_right: GeoPoint::new(2.979_212, 101.516_265),
            },
            ImageSize {
                width: 1530.0,
                height: 1050.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_corners_map_to_image_edges() {
        let mapper = campus();
        let cal = mapper.calibration();

        let tl = mapper.to_pixel(cal.top_left.lat, cal.top_left.lng);
        assert!((tl.y - 1050.0).abs() < 1e-9);
        assert!(tl.x.abs() < 1e-9);

        let br = mapper.to_pixel(cal.bottom_right.lat, cal.bottom_right.lng);
        assert!(br.y.abs() < 1e-9);
        assert!((br.x - 1530.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_in_each_axis() {
        let mapper = campus();
        let cal = mapper.calibration();
        let mid_lat = (cal.top_left.lat + cal.bottom_right.lat) / 2.0;
        let mid_lng = (cal.top_left.lng + cal.bottom_right.lng) / 2.0;

        let mid = mapper.to_pixel(mid_lat, mid_lng);
        assert!((mid.y - 525.0).abs() < 1e-6);
        assert!((mid.x - 765.0).abs() < 1e-6);

        // Moving lng alone must not change y
        let shifted = mapper.to_pixel(mid_lat, cal.top_left.lng);
        assert!((shifted.y - mid.y).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_calibration_rejected() {
        let image = ImageSize {
            width: 100.0,
            height: 100.0,
        };
        let same_lat = Calibration {
            top_left: GeoPoint::new(3.0, 101.0),
            bottom_right: GeoPoint::new(3.0, 102.0),
        };
        assert_eq!(
            CoordinateMapper::new(same_lat, image).unwrap_err(),
            CalibrationError::DegenerateLatitude(3.0)
        );

        let same_lng = Calibration {
            top_left: GeoPoint::new(3.0, 101.0),
            bottom_right: GeoPoint::new(2.0, 101.0),
        };
        assert_eq!(
            CoordinateMapper::new(same_lng, image).unwrap_err(),
            CalibrationError::DegenerateLongitude(101.0)
        );
    }

    #[test]
    fn test_invalid_image_size_rejected() {
        let cal = Calibration {
            top_left: GeoPoint::new(3.0, 101.0),
            bottom_right: GeoPoint::new(2.0, 102.0),
        };
        let result = CoordinateMapper::new(
            cal,
            ImageSize {
                width: 0.0,
                height: 10.0,
            },
        );
        assert!(matches!(
            result,
            Err(CalibrationError::InvalidImageSize { .. })
        ));
    }

    #[test]
    fn test_bounds_center() {
        let pts = [
            Pixel::new(0.0, 0.0),
            Pixel::new(0.0, 20.0),
            Pixel::new(20.0, 20.0),
            Pixel::new(20.0, 0.0),
        ];
        let bounds = PixelBounds::from_points(&pts).unwrap();
        assert_eq!(bounds.center(), Pixel::new(10.0, 10.0));
        assert!(PixelBounds::from_points(&[]).is_none());
    }
}
