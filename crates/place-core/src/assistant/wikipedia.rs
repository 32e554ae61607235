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

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::debug;
use serde::Deserialize;

use super::{AssistantError, SummarySource, DEFAULT_SUMMARY_URL};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    extract: Option<String>,
}

#[derive(Debug)]
struct CacheEntry {
    extract: Option<String>,
    fetched: Instant,
}

/// Page summaries from the Wikipedia REST API, cached per title.
#[derive(Debug)]
pub struct WikipediaSummaries {
    client: reqwest::Client,
    base_url: String,
    cache: Mutex<HashMap<String, CacheEntry>>,
    cache_ttl: Duration,
}

impl WikipediaSummaries {
    pub fn new() -> Result<Self, AssistantError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_SUMMARY_URL.to_string(),
            cache: Mutex::new(HashMap::new()),
            cache_ttl: CACHE_TTL,
        })
    }

    /// Summary endpoint prefix; the encoded title is appended.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Lookup URL for `title`.
    #[must_use]
    pub fn url_for(&self, title: &str) -> String {
        format!("{}{}", self.base_url, urlencoding::encode(title))
    }

    fn cached(&self, title: &str) -> Option<Option<String>> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(title)
            .filter(|entry| entry.fetched.elapsed() < self.cache_ttl)
            .map(|entry| entry.extract.clone())
    }

    fn store(&self, title: &str, extract: Option<String>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.retain(|_, entry| entry.fetched.elapsed() < self.cache_ttl);
            cache.insert(
                title.to_string(),
                CacheEntry {
                    extract,
                    fetched: Instant::now(),
                },
            );
        }
    }
}

impl SummarySource for WikipediaSummaries {
    async fn summary(&self, title: &str) -> Result<Option<String>, AssistantError> {
        if let Some(hit) = self.cached(title) {
            return Ok(hit);
        }

        let response = self.client.get(self.url_for(title)).send().await?;
        if !response.status().is_success() {
            debug!("No summary for '{title}': HTTP {}", response.status());
            self.store(title, None);
            return Ok(None);
        }

        let body: SummaryResponse = response.json().await?;
        let extract = body.extract.filter(|e| !e.trim().is_empty());
        self.store(title, extract.clone());
        Ok(extract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encodes_title() {
        let summaries = WikipediaSummaries::new().unwrap();
        assert_eq!(
            summaries.url_for("Petronas Towers & Park"),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Petronas%20Towers%20%26%20Park"
        );
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        // unroutable base URL: only a cache hit can succeed
        let summaries = WikipediaSummaries::new()
            .unwrap()
            .with_base_url("http://127.0.0.1:9/");
        summaries.store("Library", Some("A big library.".to_string()));

        let hit = summaries.summary("Library").await.unwrap();
        assert_eq!(hit.as_deref(), Some("A big library."));
    }

    #[test]
    fn test_expired_entries_ignored() {
        let mut summaries = WikipediaSummaries::new().unwrap();
        summaries.cache_ttl = Duration::ZERO;
        summaries.store("Library", Some("stale".to_string()));
        assert!(summaries.cached("Library").is_none());
    }
}
