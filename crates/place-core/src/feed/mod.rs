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

//! Snapshot feeds for the `pois` and `zones` collections.
//!
//! A feed polls one source (an HTTP URL or a local JSON file) in a
//! background task and emits a full snapshot whenever the source changes.
//! The stream restarts itself after errors and never ends on its own; only
//! [`Feed::shutdown`] or dropping the handle stops it.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::place::PlaceKind;
use crate::protocol::{parse_snapshot, ParseError};
use crate::registry::{PlaceRegistry, PlaceSnapshot};

/// Where a collection's documents come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FeedSource {
    Http(String),
    File(PathBuf),
}

impl FromStr for FeedSource {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(FeedError::EmptySource);
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            Ok(FeedSource::Http(s.to_string()))
        } else {
            Ok(FeedSource::File(PathBuf::from(s.strip_prefix("file://").unwrap_or(s))))
        }
    }
}

impl TryFrom<String> for FeedSource {
    type Error = FeedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FeedSource> for String {
    fn from(source: FeedSource) -> Self {
        source.to_string()
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Http(url) => write!(f, "{url}"),
            FeedSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Configuration for one collection feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub kind: PlaceKind,
    pub source: FeedSource,
    /// Delay between polls, and before retrying after an error.
    pub poll_interval: Duration,
    /// Channel buffer size for events.
    pub buffer_size: usize,
}

impl FeedConfig {
    #[must_use]
    pub fn new(kind: PlaceKind, source: FeedSource) -> Self {
        Self {
            kind,
            source,
            poll_interval: Duration::from_secs(5),
            buffer_size: 16,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Feed health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState {
    /// Source read and parsed.
    Live,
    /// Last poll failed; the feed keeps retrying.
    Error(String),
}

/// Events emitted by a feed.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    StateChanged { kind: PlaceKind, state: FeedState },
    /// The full current content of the collection.
    Snapshot { kind: PlaceKind, documents: Vec<Value> },
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed source is empty")]
    EmptySource,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),

    #[error("could not read feed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid snapshot: {0}")]
    Parse(#[from] ParseError),
}

/// What the last successful poll saw, to skip unchanged sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fingerprint {
    File { modified: Option<SystemTime>, len: u64 },
    Body(u64),
}

/// Handle to a running feed task.
pub struct Feed {
    kind: PlaceKind,
    event_rx: mpsc::Receiver<FeedEvent>,
    source_tx: watch::Sender<FeedSource>,
    cancel_token: CancellationToken,
}

impl fmt::Debug for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feed")
            .field("kind", &self.kind)
            .field("source", &*self.source_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl Feed {
    /// Spawn the polling task on the current runtime.
    #[must_use]
    pub fn spawn(config: FeedConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.buffer_size.max(1));
        let (source_tx, source_rx) = watch::channel(config.source.clone());
        let cancel_token = CancellationToken::new();

        let task_cancel = cancel_token.clone();
        let kind = config.kind;
        let poll_interval = config.poll_interval;

        tokio::spawn(async move {
            feed_loop(kind, event_tx, source_rx, task_cancel, poll_interval).await;
        });

        Self {
            kind,
            event_rx,
            source_tx,
            cancel_token,
        }
    }

    #[must_use]
    pub fn kind(&self) -> PlaceKind {
        self.kind
    }

    /// Next event. `None` once the feed has shut down.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.event_rx.recv().await
    }

    /// Switch to another source. The next poll happens immediately.
    pub fn set_source(&self, source: FeedSource) {
        self.source_tx.send_replace(source);
    }

    #[must_use]
    pub fn current_source(&self) -> FeedSource {
        self.source_tx.borrow().clone()
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Install a snapshot event into the registry.
///
/// Returns the new registry snapshot, or `None` for state changes.
pub fn apply_event(registry: &PlaceRegistry, event: FeedEvent) -> Option<PlaceSnapshot> {
    match event {
        FeedEvent::Snapshot { kind, documents } => Some(registry.replace_collection(kind, documents)),
        FeedEvent::StateChanged { kind, state } => {
            debug!("{} feed is {state:?}", kind.collection());
            None
        }
    }
}

async fn feed_loop(
    kind: PlaceKind,
    event_tx: mpsc::Sender<FeedEvent>,
    mut source_rx: watch::Receiver<FeedSource>,
    cancel_token: CancellationToken,
    poll_interval: Duration,
) {
    let client = reqwest::Client::new();
    let mut last_seen: Option<Fingerprint> = None;
    let mut last_state: Option<FeedState> = None;

    loop {
        if cancel_token.is_cancelled() {
            info!("{} feed cancelled", kind.collection());
            return;
        }

        let source = source_rx.borrow_and_update().clone();

        let (state, snapshot) = match poll(&client, &source, last_seen).await {
            Ok(Some((fingerprint, documents))) => {
                last_seen = Some(fingerprint);
                info!(
                    "{} feed: {} documents from {source}",
                    kind.collection(),
                    documents.len()
                );
                (FeedState::Live, Some(documents))
            }
            Ok(None) => (FeedState::Live, None),
            Err(e) => {
                error!("{} feed error from {source}: {e}", kind.collection());
                (FeedState::Error(e.to_string()), None)
            }
        };

        if last_state.as_ref() != Some(&state) {
            last_state = Some(state.clone());
            if event_tx
                .send(FeedEvent::StateChanged { kind, state })
                .await
                .is_err()
            {
                return; // Receiver dropped
            }
        }

        if let Some(documents) = snapshot {
            if event_tx
                .send(FeedEvent::Snapshot { kind, documents })
                .await
                .is_err()
            {
                return;
            }
        }

        tokio::select! {
            () = sleep(poll_interval) => {}
            changed = source_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                warn!("{} feed source changed, polling immediately", kind.collection());
                last_seen = None;
            }
            () = cancel_token.cancelled() => {
                info!("{} feed cancelled", kind.collection());
                return;
            }
        }
    }
}

/// Read `source` unless it still matches `last_seen`.
async fn poll(
    client: &reqwest::Client,
    source: &FeedSource,
    last_seen: Option<Fingerprint>,
) -> Result<Option<(Fingerprint, Vec<Value>)>, FeedError> {
    let (fingerprint, body) = match source {
        FeedSource::File(path) => {
            let metadata = tokio::fs::metadata(path).await?;
            let fingerprint = Fingerprint::File {
                modified: metadata.modified().ok(),
                len: metadata.len(),
            };
            if last_seen == Some(fingerprint) {
                return Ok(None);
            }
            (fingerprint, tokio::fs::read(path).await?)
        }
        FeedSource::Http(url) => {
            let response = client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(FeedError::Status(response.status()));
            }
            let body = response.bytes().await?.to_vec();
            let mut hasher = DefaultHasher::new();
            body.hash(&mut hasher);
            let fingerprint = Fingerprint::Body(hasher.finish());
            if last_seen == Some(fingerprint) {
                return Ok(None);
            }
            (fingerprint, body)
        }
    };

    Ok(Some((fingerprint, parse_snapshot(&body)?)))
}
