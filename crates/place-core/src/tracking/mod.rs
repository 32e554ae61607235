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

//! "You are here" tracking.
//!
//! Position fixes are kept in a `watch` channel, so a slow consumer only
//! ever sees the most recent one.

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::geo::{CoordinateMapper, Pixel};

/// One geolocation reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in metres, when the source reports it.
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl GeoFix {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            timestamp: Utc::now(),
        }
    }
}

/// Latest position fix, mapped onto the venue image on demand.
#[derive(Debug)]
pub struct LocationTracker {
    mapper: CoordinateMapper,
    fix_tx: watch::Sender<Option<GeoFix>>,
}

impl LocationTracker {
    #[must_use]
    pub fn new(mapper: CoordinateMapper) -> Self {
        let (fix_tx, _) = watch::channel(None);
        Self { mapper, fix_tx }
    }

    #[must_use]
    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// Record a new fix, replacing any earlier one.
    ///
    /// Fixes with non-finite coordinates are dropped.
    pub fn report(&self, fix: GeoFix) -> bool {
        if !fix.latitude.is_finite() || !fix.longitude.is_finite() {
            warn!("Ignoring invalid position fix {fix:?}");
            return false;
        }
        self.fix_tx.send_replace(Some(fix));
        true
    }

    /// Log a failure from the position source. The last good fix stays.
    pub fn report_error(&self, message: &str) {
        error!("GPS error: {message}");
    }

    #[must_use]
    pub fn latest_fix(&self) -> Option<GeoFix> {
        *self.fix_tx.borrow()
    }

    /// Latest fix in image pixels.
    #[must_use]
    pub fn latest_pixel(&self) -> Option<Pixel> {
        self.latest_fix()
            .map(|fix| self.mapper.to_pixel(fix.latitude, fix.longitude))
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<GeoFix>> {
        self.fix_tx.subscribe()
    }
}

/// Call `on_fix` with the pixel position of every fix `fix_rx` sees until
/// `cancel` fires or the tracker is dropped.
///
/// Subscribe before spawning so a fix reported in between is not missed.
/// Fixes that arrive while `on_fix` runs collapse into the newest one.
pub async fn follow<F>(
    mut fix_rx: watch::Receiver<Option<GeoFix>>,
    mapper: CoordinateMapper,
    cancel: CancellationToken,
    mut on_fix: F,
) where
    F: FnMut(Pixel),
{
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            changed = fix_rx.changed() => {
                if changed.is_err() {
                    debug!("Location source closed");
                    return;
                }
            }
        }

        let fix = *fix_rx.borrow_and_update();
        if let Some(fix) = fix {
            on_fix(mapper.to_pixel(fix.latitude, fix.longitude));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Calibration, GeoPoint, ImageSize};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn mapper() -> CoordinateMapper {
        CoordinateMapper::new(
            Calibration {
                top_left: GeoPoint::new(2.983_514_010_761_342, 101.506_878_517_088_54),
                bottom_right: GeoPoint::new(2.979_212_941_647_669, 101.516_265_332_000_81),
            },
            ImageSize {
                width: 1530.0,
                height: 1050.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_latest_fix_maps_to_pixels() {
        let tracker = LocationTracker::new(mapper());
        assert!(tracker.latest_pixel().is_none());

        assert!(tracker.report(GeoFix::new(2.983_514_010_761_342, 101.506_878_517_088_54)));
        let pixel = tracker.latest_pixel().unwrap();
        assert!((pixel.y - 1050.0).abs() < 1e-6);
        assert!(pixel.x.abs() < 1e-6);
    }

    #[test]
    fn test_invalid_fix_keeps_previous() {
        let tracker = LocationTracker::new(mapper());
        tracker.report(GeoFix::new(2.981, 101.51));
        assert!(!tracker.report(GeoFix::new(f64::NAN, 101.51)));
        tracker.report_error("permission denied");
        assert!((tracker.latest_fix().unwrap().latitude - 2.981).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_most_recent_fix_wins() {
        let tracker = LocationTracker::new(mapper());
        let mut rx = tracker.subscribe();

        for lat in [2.980, 2.981, 2.982] {
            tracker.report(GeoFix::new(lat, 101.51));
        }

        rx.changed().await.unwrap();
        let fix = rx.borrow_and_update().unwrap();
        assert!((fix.latitude - 2.982).abs() < f64::EPSILON);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_follow_until_cancelled() {
        let tracker = Arc::new(LocationTracker::new(mapper()));
        let cancel = CancellationToken::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let rx = tracker.subscribe();
            let mapper = *tracker.mapper();
            let cancel = cancel.clone();
            let seen = Arc::clone(&seen);
            tokio::spawn(follow(rx, mapper, cancel, move |pixel| {
                seen.lock().unwrap().push(pixel);
            }))
        };

        tracker.report(GeoFix::new(2.981, 101.51));
        tokio::time::timeout(Duration::from_secs(5), async {
            while seen.lock().unwrap().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
