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

//! Application configuration management.
//!
//! Persistent TOML configuration: the venue image and its GPS calibration,
//! link settings, viewport zoom limits, collection feeds and the assistant.
//! Older files are migrated on load.

use std::path::Path;
use std::time::Duration;

use log::info;
use place_core::assistant::{AssistantConfig, DEFAULT_COMPLETION_URL, DEFAULT_MAX_TOKENS, DEFAULT_SUMMARY_URL};
use place_core::feed::{FeedConfig, FeedError, FeedSource};
use place_core::{Calibration, GeoPoint, ImageSize, LinkConfig, PlaceKind, SessionConfig, ViewportConfig};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "campus-map";
pub const CONFIG_NAME: &str = "config";

/// Environment variable that overrides `openrouter_api_key`.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

const CURRENT_CONFIG_VERSION: u32 = 2;

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Venue image width in pixels
    #[serde(default = "default_image_width")]
    pub image_width: f64,

    /// Venue image height in pixels
    #[serde(default = "default_image_height")]
    pub image_height: f64,

    #[serde(default = "default_desktop_min_zoom")]
    pub desktop_min_zoom: f64,

    #[serde(default = "default_mobile_min_zoom")]
    pub mobile_min_zoom: f64,

    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,

    #[serde(default)]
    pub initial_zoom: f64,

    /// POI documents: an http(s) URL or a local JSON file
    #[serde(default)]
    pub pois_source: Option<String>,

    /// Zone documents: an http(s) URL or a local JSON file
    #[serde(default)]
    pub zones_source: Option<String>,

    /// Seconds between feed polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_completion_url")]
    pub completion_url: String,

    #[serde(default = "default_summary_url")]
    pub summary_url: String,

    /// Models tried in order until one answers
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sent as the `X-Title` header
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// OpenRouter API key (optional, env var takes precedence)
    #[serde(default)]
    pub openrouter_api_key: Option<String>,

    // TOML tables must follow plain values
    /// GPS position of the image's top-left and bottom-right corners
    #[serde(default = "default_calibration")]
    pub calibration: Calibration,

    /// Page URL, external map URL and the pixel directions fallback
    #[serde(default)]
    pub links: LinkConfig,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_image_width() -> f64 {
    1530.0
}

fn default_image_height() -> f64 {
    1050.0
}

fn default_calibration() -> Calibration {
    Calibration {
        top_left: GeoPoint::new(2.983_514_010_761_342, 101.506_878_517_088_54),
        bottom_right: GeoPoint::new(2.979_212_941_647_669, 101.516_265_332_000_81),
    }
}

fn default_desktop_min_zoom() -> f64 {
    ViewportConfig::desktop().min_zoom
}

fn default_mobile_min_zoom() -> f64 {
    ViewportConfig::mobile().min_zoom
}

fn default_max_zoom() -> f64 {
    ViewportConfig::desktop().max_zoom
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_completion_url() -> String {
    DEFAULT_COMPLETION_URL.to_string()
}

fn default_summary_url() -> String {
    DEFAULT_SUMMARY_URL.to_string()
}

fn default_models() -> Vec<String> {
    AssistantConfig::default().models
}

fn default_system_instruction() -> String {
    AssistantConfig::default().system_instruction
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_app_title() -> String {
    "Campus Map AI Assistant".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            image_width: default_image_width(),
            image_height: default_image_height(),
            desktop_min_zoom: default_desktop_min_zoom(),
            mobile_min_zoom: default_mobile_min_zoom(),
            max_zoom: default_max_zoom(),
            initial_zoom: 0.0,
            pois_source: None,
            zones_source: None,
            poll_interval_secs: default_poll_interval_secs(),
            completion_url: default_completion_url(),
            summary_url: default_summary_url(),
            models: default_models(),
            system_instruction: default_system_instruction(),
            max_tokens: default_max_tokens(),
            app_title: default_app_title(),
            openrouter_api_key: None,
            calibration: default_calibration(),
            links: LinkConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, or from `path` when given, migrating
    /// older files in place.
    pub fn load(path: Option<&Path>) -> Result<Self, confy::ConfyError> {
        let config: AppConfig = match path {
            Some(path) => confy::load_path(path)?,
            None => confy::load(APP_NAME, CONFIG_NAME)?,
        };

        if config.config_version < CURRENT_CONFIG_VERSION {
            let from = config.config_version;
            let migrated = config.migrate();
            match path {
                Some(path) => confy::store_path(path, &migrated)?,
                None => migrated.save()?,
            }
            info!("Configuration migrated from version {from} to {CURRENT_CONFIG_VERSION}");
            return Ok(migrated);
        }

        Ok(config)
    }

    /// Version 1 files allowed an empty model list and a zero poll interval.
    fn migrate(mut self) -> Self {
        if self.models.is_empty() {
            self.models = default_models();
        }
        if self.poll_interval_secs == 0 {
            self.poll_interval_secs = default_poll_interval_secs();
        }
        self.config_version = CURRENT_CONFIG_VERSION;
        self
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    #[must_use]
    pub fn image(&self) -> ImageSize {
        ImageSize {
            width: self.image_width,
            height: self.image_height,
        }
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let mut session = SessionConfig::new(self.image(), self.calibration);
        session.links = self.links.clone();
        session.desktop = ViewportConfig {
            min_zoom: self.desktop_min_zoom,
            max_zoom: self.max_zoom,
            initial_zoom: self.initial_zoom,
            ..ViewportConfig::desktop()
        };
        session.mobile = ViewportConfig {
            min_zoom: self.mobile_min_zoom,
            max_zoom: self.max_zoom,
            initial_zoom: self.initial_zoom,
            ..ViewportConfig::mobile()
        };
        session
    }

    /// One feed per configured collection source.
    pub fn feed_configs(&self) -> Result<Vec<FeedConfig>, FeedError> {
        let poll_interval = Duration::from_secs(self.poll_interval_secs.max(1));
        [
            (PlaceKind::Poi, &self.pois_source),
            (PlaceKind::Zone, &self.zones_source),
        ]
        .into_iter()
        .filter_map(|(kind, source)| source.as_deref().map(|s| (kind, s)))
        .map(|(kind, source)| {
            source
                .parse::<FeedSource>()
                .map(|source| FeedConfig::new(kind, source).with_poll_interval(poll_interval))
        })
        .collect()
    }

    #[must_use]
    pub fn assistant_config(&self) -> AssistantConfig {
        AssistantConfig {
            models: self.models.clone(),
            system_instruction: self.system_instruction.clone(),
            max_tokens: self.max_tokens,
        }
    }

    /// API key from the environment, falling back to the config file
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        resolve_api_key(std::env::var(API_KEY_ENV).ok(), self.openrouter_api_key.as_deref())
    }

    /// Get the source of the API key for display
    #[must_use]
    pub fn api_key_source(&self) -> Option<&'static str> {
        if std::env::var(API_KEY_ENV).is_ok_and(|k| !k.is_empty()) {
            Some("environment variable")
        } else if self.openrouter_api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            Some("config file")
        } else {
            None
        }
    }
}

fn resolve_api_key(env_key: Option<String>, config_key: Option<&str>) -> Option<String> {
    env_key
        .filter(|k| !k.is_empty())
        .or_else(|| config_key.filter(|k| !k.is_empty()).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_venue() {
        let config = AppConfig::default();
        let session = config.session_config();
        assert!((session.image.width - 1530.0).abs() < f64::EPSILON);
        assert!((session.desktop.min_zoom + 1.0).abs() < f64::EPSILON);
        assert!((session.mobile.min_zoom + 2.0).abs() < f64::EPSILON);
        assert!((session.mobile.max_zoom - 3.0).abs() < f64::EPSILON);
        assert!(!session.links.pixel_directions_fallback);
        assert!(config.feed_configs().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.pois_source = Some("https://campus.example/pois.json".to_string());
        config.zones_source = Some("data/zones.json".to_string());
        config.links.pixel_directions_fallback = true;
        confy::store_path(&path, &config).unwrap();

        let loaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.pois_source, config.pois_source);
        assert!(loaded.links.pixel_directions_fallback);

        let feeds = loaded.feed_configs().unwrap();
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].kind, PlaceKind::Poi);
        assert!(matches!(feeds[1].source, FeedSource::File(_)));
    }

    #[test]
    fn test_partial_file_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "config_version = 2").unwrap();
        writeln!(file, "max_zoom = 4.0").unwrap();
        writeln!(file, "[links]").unwrap();
        writeln!(file, "page_url = \"https://campus.example/map/\"").unwrap();
        drop(file);

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!((config.max_zoom - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.links.page_url, "https://campus.example/map/");
        assert_eq!(config.links.directions_url, "https://www.google.com/maps?q=");
        assert_eq!(config.models, default_models());
    }

    #[test]
    fn test_old_version_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut old = AppConfig::default();
        old.config_version = 1;
        old.models.clear();
        old.poll_interval_secs = 0;
        confy::store_path(&path, &old).unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.models, default_models());
        assert_eq!(config.poll_interval_secs, 5);

        let stored: AppConfig = confy::load_path(&path).unwrap();
        assert_eq!(stored.config_version, CURRENT_CONFIG_VERSION);
    }

    #[test]
    fn test_env_key_takes_precedence() {
        assert_eq!(
            resolve_api_key(Some("env-key".to_string()), Some("file-key")).as_deref(),
            Some("env-key")
        );
        assert_eq!(
            resolve_api_key(Some(String::new()), Some("file-key")).as_deref(),
            Some("file-key")
        );
        assert_eq!(resolve_api_key(None, Some("")), None);
    }

    #[test]
    fn test_bad_feed_source_rejected() {
        let config = AppConfig {
            pois_source: Some("   ".to_string()),
            ..AppConfig::default()
        };
        assert!(config.feed_configs().is_err());
    }

    #[test]
    fn test_inverted_zoom_limits_rejected() {
        let config = AppConfig {
            mobile_min_zoom: 5.0,
            ..AppConfig::default()
        };
        let session = config.session_config();
        assert!(session.desktop.validate(place_core::ViewportId::Desktop).is_ok());
        assert!(session.mobile.validate(place_core::ViewportId::Mobile).is_err());
    }
}
