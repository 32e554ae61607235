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

//! One map viewer: every layer wired together.
//!
//! ```text
//! Feed ──► PlaceRegistry ──► SidebarProjector
//!                 │
//!                 ▼
//! user ──► SelectionController ──► Views (panel, viewports, nearby)
//!                 │
//!                 ▼
//!          AssistantBridge ──► Views.assistant
//! ```
//!
//! Background work (feeds, the sidebar listener, location following and
//! asks) runs in tokio tasks that share the controller and sidebar behind
//! `Arc<Mutex<_>>`. Locks are only held for synchronous updates.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::assistant::{AssistantBridge, CompletionBackend, SummarySource, ThinkingIndicator, THINKING_INTERVAL};
use crate::feed::{apply_event, Feed, FeedConfig};
use crate::geo::{Calibration, CalibrationError, CoordinateMapper, ImageSize};
use crate::links::{parse_fragment, Clipboard, LinkConfig};
use crate::registry::PlaceRegistry;
use crate::selection::{SelectionController, SelectionError, Views};
use crate::sidebar::SidebarProjector;
use crate::tracking::{follow, GeoFix, LocationTracker};
use crate::viewport::{ViewportConfig, ViewportError, ViewportId};

/// How long the share button reads "Link copied".
pub const SHARE_LABEL_RESET: Duration = Duration::from_millis(1_400);

/// Static settings for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub image: ImageSize,
    pub calibration: Calibration,
    pub links: LinkConfig,
    pub desktop: ViewportConfig,
    pub mobile: ViewportConfig,
    pub thinking_interval: Duration,
}

impl SessionConfig {
    #[must_use]
    pub fn new(image: ImageSize, calibration: Calibration) -> Self {
        Self {
            image,
            calibration,
            links: LinkConfig::default(),
            desktop: ViewportConfig::desktop(),
            mobile: ViewportConfig::mobile(),
            thinking_interval: THINKING_INTERVAL,
        }
    }
}

/// Setup failures for a [`Session`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid calibration: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("invalid viewport: {0}")]
    Viewport(#[from] ViewportError),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub struct Session<B, S> {
    registry: Arc<PlaceRegistry>,
    controller: Arc<Mutex<SelectionController>>,
    sidebar: Arc<Mutex<SidebarProjector>>,
    assistant: Arc<AssistantBridge<B, S>>,
    tracker: Arc<LocationTracker>,
    image: ImageSize,
    thinking_interval: Duration,
    /// Cancels the ask currently in flight, if any.
    pending_ask: Mutex<Option<CancellationToken>>,
    /// Cancels the share label reset still waiting, if any.
    pending_share_reset: Mutex<Option<CancellationToken>>,
    cancel_token: CancellationToken,
}

impl<B, S> std::fmt::Debug for Session<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("places", &self.registry.len())
            .field("image", &self.image)
            .finish_non_exhaustive()
    }
}

impl<B, S> Session<B, S>
where
    B: CompletionBackend + Send + Sync + 'static,
    S: SummarySource + Send + Sync + 'static,
{
    /// Build a session. Fails on an unusable calibration or zoom limits.
    pub fn new(config: SessionConfig, assistant: AssistantBridge<B, S>) -> Result<Self, SessionError> {
        let mapper = CoordinateMapper::new(config.calibration, config.image)?;
        config.desktop.validate(ViewportId::Desktop)?;
        config.mobile.validate(ViewportId::Mobile)?;
        let registry = Arc::new(PlaceRegistry::new());
        let views = Views::new(config.desktop, config.mobile);
        let controller = SelectionController::new(Arc::clone(&registry), views, config.links);

        Ok(Self {
            registry,
            controller: Arc::new(Mutex::new(controller)),
            sidebar: Arc::new(Mutex::new(SidebarProjector::new())),
            assistant: Arc::new(assistant),
            tracker: Arc::new(LocationTracker::new(mapper)),
            image: config.image,
            thinking_interval: config.thinking_interval,
            pending_ask: Mutex::new(None),
            pending_share_reset: Mutex::new(None),
            cancel_token: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PlaceRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<LocationTracker> {
        &self.tracker
    }

    #[must_use]
    pub fn image(&self) -> ImageSize {
        self.image
    }

    /// Exclusive access to the selection controller.
    pub fn controller(&self) -> MutexGuard<'_, SelectionController> {
        lock(&self.controller)
    }

    pub fn sidebar(&self) -> MutexGuard<'_, SidebarProjector> {
        lock(&self.sidebar)
    }

    /// Start the background tasks: one per feed, the sidebar listener and
    /// location following. All stop on [`Session::shutdown`].
    pub fn start(&self, feeds: Vec<FeedConfig>) -> Vec<JoinHandle<()>> {
        let mut tasks = vec![self.spawn_sidebar_listener(), self.spawn_location_follower()];
        tasks.extend(feeds.into_iter().map(|config| self.spawn_feed(config)));
        tasks
    }

    fn spawn_feed(&self, config: FeedConfig) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let cancel = self.cancel_token.clone();

        tokio::spawn(async move {
            let mut feed = Feed::spawn(config);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    event = feed.recv() => match event {
                        Some(event) => {
                            apply_event(&registry, event);
                        }
                        None => break,
                    },
                }
            }
            debug!("{} feed task stopped", feed.kind().collection());
        })
    }

    fn spawn_sidebar_listener(&self) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let sidebar = Arc::clone(&self.sidebar);
        let cancel = self.cancel_token.clone();
        let mut events = registry.subscribe();

        lock(&sidebar).render(&registry.snapshot());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    event = events.recv() => match event {
                        // Lagging only means several snapshots landed; the
                        // latest one is all that matters.
                        Ok(_) | Err(RecvError::Lagged(_)) => {
                            lock(&sidebar).render(&registry.snapshot());
                        }
                        Err(RecvError::Closed) => return,
                    },
                }
            }
        })
    }

    fn spawn_location_follower(&self) -> JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        let fixes = self.tracker.subscribe();
        let mapper = *self.tracker.mapper();
        let cancel = self.cancel_token.clone();

        tokio::spawn(follow(fixes, mapper, cancel, move |pixel| {
            let mut controller = lock(&controller);
            for viewport in controller.views_mut().viewports_mut() {
                viewport.set_user_location(pixel);
            }
        }))
    }

    /// Feed a position fix from the platform's location source.
    pub fn report_fix(&self, fix: GeoFix) -> bool {
        self.tracker.report(fix)
    }

    pub fn select_by_id(&self, id: &str) -> Result<(), SelectionError> {
        self.controller().select_by_id(id).map(|_| ())
    }

    /// Sidebar "go" for `id`.
    pub fn go(&self, id: &str) -> Result<(), SelectionError> {
        let sidebar = self.sidebar();
        sidebar.go(id, &mut self.controller())
    }

    /// Sidebar "share" for `id`.
    pub fn share_place<C: Clipboard + ?Sized>(&self, id: &str, clipboard: &mut C) -> Option<String> {
        let sidebar = self.sidebar();
        sidebar.share(id, &self.controller(), clipboard)
    }

    pub fn filter(&self, query: &str) {
        self.sidebar().filter(query);
    }

    pub fn dismiss(&self) -> bool {
        self.controller().dismiss()
    }

    pub fn open_fragment(&self, fragment: &str) -> bool {
        self.controller().open_from_fragment(fragment).is_some()
    }

    /// Open a deep link given at startup.
    ///
    /// Places usually arrive after startup, so an id that is not in the
    /// registry yet stays pending and is retried on every registry update
    /// until it matches once. A selection made in the meantime wins and the
    /// pending link is dropped. Returns the waiting task, or `None` when the
    /// link resolved at once or has no place id.
    pub fn open_on_load(&self, fragment: &str) -> Option<JoinHandle<()>> {
        let Some(id) = parse_fragment(fragment) else {
            warn!("Ignoring deep link without a place id: {fragment}");
            return None;
        };

        // Subscribe first so an update landing in between is not missed.
        let mut events = self.registry.subscribe();
        if self.controller().select_by_id(&id).is_ok() {
            return None;
        }
        info!("Deep link to '{id}' waiting for places to load");

        let controller = Arc::clone(&self.controller);
        let cancel = self.cancel_token.clone();

        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    event = events.recv() => match event {
                        Ok(_) | Err(RecvError::Lagged(_)) => {
                            let mut controller = lock(&controller);
                            if controller.is_active() {
                                debug!("Deep link to '{id}' superseded by a selection");
                                return;
                            }
                            if controller.select_by_id(&id).is_ok() {
                                info!("Deep link to '{id}' opened");
                                return;
                            }
                        }
                        Err(RecvError::Closed) => return,
                    },
                }
            }
        }))
    }

    /// Copy a deep link to the selection. The share button label reverts
    /// after [`SHARE_LABEL_RESET`].
    pub fn share_link<C: Clipboard + ?Sized>(&self, clipboard: &mut C) -> Option<String> {
        let url = self.controller().share_link(clipboard)?;

        let controller = Arc::clone(&self.controller);
        let cancel = self.cancel_token.child_token();
        if let Some(previous) = lock(&self.pending_share_reset).replace(cancel.clone()) {
            previous.cancel();
        }
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(SHARE_LABEL_RESET) => lock(&controller).reset_share_label(),
            }
        });

        Some(url)
    }

    /// Copy the map's own address, without a place fragment.
    pub fn copy_map_link<C: Clipboard + ?Sized>(&self, clipboard: &mut C) -> String {
        self.controller().copy_map_link(clipboard)
    }

    pub fn fit_all(&self) {
        self.controller().fit_all(self.image);
    }

    /// Ask about the current selection in the background.
    ///
    /// The answer lands in the assistant panel. A newer ask cancels this
    /// one, and a selection change discards its answer. Returns `None` for
    /// a blank question.
    pub fn ask(&self, question: &str) -> Option<JoinHandle<()>> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return None;
        }

        let (generation, selection) = {
            let mut controller = self.controller();
            let panel = &mut controller.views_mut().assistant;
            panel.question.clone_from(&question);
            let generation = panel.begin();
            (generation, controller.current().cloned())
        };

        let indicator = {
            let controller = Arc::clone(&self.controller);
            ThinkingIndicator::start(self.thinking_interval, move |text| {
                lock(&controller).views_mut().assistant.show(generation, text);
            })
        };
        let superseded = indicator.cancel_token();
        if let Some(previous) = lock(&self.pending_ask).replace(superseded.clone()) {
            previous.cancel();
        }

        let assistant = Arc::clone(&self.assistant);
        let controller = Arc::clone(&self.controller);

        Some(tokio::spawn(async move {
            let _indicator = indicator;
            tokio::select! {
                answer = assistant.ask_opt(&question, selection.as_ref()) => {
                    let Some(answer) = answer else { return };
                    if !lock(&controller).views_mut().assistant.finish(generation, answer) {
                        debug!("Discarding answer for a stale question");
                    }
                }
                () = superseded.cancelled() => {
                    info!("Question superseded: {question}");
                }
            }
        }))
    }

    /// Stop every background task and any ask in flight.
    pub fn shutdown(&self) {
        if let Some(pending) = lock(&self.pending_ask).take() {
            pending.cancel();
        }
        self.cancel_token.cancel();
    }
}

impl<B, S> Drop for Session<B, S> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{AssistantConfig, AssistantError, CompletionRequest, NO_SELECTION_MESSAGE};
    use crate::feed::FeedSource;
    use crate::geo::{GeoPoint, Pixel};
    use crate::links::MemoryClipboard;
    use crate::place::PlaceKind;
    use serde_json::json;
    use std::io::Write;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    /// Answers after `delay` when the question mentions "slow".
    struct EchoBackend {
        delay: Duration,
    }

    impl CompletionBackend for EchoBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, AssistantError> {
            let prompt = &request.messages[1].content;
            let question = prompt.rsplit("Question:\n").next().unwrap_or_default().trim().to_string();
            if question.contains("slow") {
                tokio::time::sleep(self.delay).await;
            }
            Ok(format!("answer to {question}"))
        }
    }

    struct NoSummary;

    impl SummarySource for NoSummary {
        async fn summary(&self, _title: &str) -> Result<Option<String>, AssistantError> {
            Ok(None)
        }
    }

    fn session() -> Session<EchoBackend, NoSummary> {
        let config = SessionConfig::new(
            ImageSize {
                width: 1530.0,
                height: 1050.0,
            },
            Calibration {
                top_left: GeoPoint::new(2.983_514_010_761_342, 101.506_878_517_088_54),
                bottom_right: GeoPoint::new(2.979_212_941_647_669, 101.516_265_332_000_81),
            },
        );
        let assistant = AssistantBridge::new(
            EchoBackend {
                delay: Duration::from_secs(30),
            },
            NoSummary,
            AssistantConfig::default(),
        );
        Session::new(config, assistant).unwrap()
    }

    fn seed(session: &Session<EchoBackend, NoSummary>) {
        session.registry().replace_all(vec![
            json!({ "id": "lib", "title": "Library", "coords": { "x": 100, "y": 100 } }),
            json!({ "id": "caf", "title": "Cafe", "coords": { "x": 120, "y": 100 },
                    "realWorldCoords": { "lat": 2.981, "lng": 101.51 } }),
        ]);
    }

    async fn eventually<F: Fn() -> bool>(check: F) {
        timeout(WAIT, async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_rejects_degenerate_calibration() {
        let config = SessionConfig::new(
            ImageSize {
                width: 100.0,
                height: 100.0,
            },
            Calibration {
                top_left: GeoPoint::new(1.0, 1.0),
                bottom_right: GeoPoint::new(1.0, 2.0),
            },
        );
        let assistant = AssistantBridge::new(
            EchoBackend {
                delay: Duration::ZERO,
            },
            NoSummary,
            AssistantConfig::default(),
        );
        assert!(Session::new(config, assistant).is_err());
    }

    #[tokio::test]
    async fn test_feed_populates_sidebar_and_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pois.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(br#"[{"id":"lib","title":"Library","coords":{"x":100,"y":100}},
                            {"id":"caf","title":"Cafe","coords":{"x":120,"y":100}}]"#)
            .unwrap();

        let session = session();
        let feed = FeedConfig::new(PlaceKind::Poi, FeedSource::File(path))
            .with_poll_interval(Duration::from_millis(20));
        let _tasks = session.start(vec![feed]);

        eventually(|| session.sidebar().pois().len() == 2).await;

        session.filter("caf");
        assert_eq!(session.sidebar().visible_rows().count(), 1);

        session.go("lib").unwrap();
        let controller = session.controller();
        assert_eq!(controller.current().unwrap().title, "Library");
        assert_eq!(controller.views().recommendations.items[0].place.id, "caf");
        drop(controller);

        session.shutdown();
    }

    #[tokio::test]
    async fn test_ask_writes_answer_to_panel() {
        let session = session();
        seed(&session);
        session.select_by_id("lib").unwrap();

        session.ask("  opening hours?  ").unwrap().await.unwrap();

        let controller = session.controller();
        let panel = &controller.views().assistant;
        assert_eq!(panel.question, "opening hours?");
        assert_eq!(panel.answer, "answer to opening hours?");
    }

    #[tokio::test]
    async fn test_ask_without_selection() {
        let session = session();
        assert!(session.ask("   ").is_none());

        session.ask("where am I?").unwrap().await.unwrap();
        assert_eq!(session.controller().views().assistant.answer, NO_SELECTION_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_ask_supersedes_older() {
        let session = session();
        seed(&session);
        session.select_by_id("lib").unwrap();

        let slow = session.ask("slow question").unwrap();
        let fast = session.ask("fast question").unwrap();
        fast.await.unwrap();
        slow.await.unwrap();

        assert_eq!(
            session.controller().views().assistant.answer,
            "answer to fast question"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_change_discards_pending_answer() {
        let session = session();
        seed(&session);
        session.select_by_id("lib").unwrap();

        let pending = session.ask("slow question").unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(session
            .controller()
            .views()
            .assistant
            .answer
            .starts_with("Thinking"));

        session.select_by_id("caf").unwrap();
        pending.await.unwrap();

        let controller = session.controller();
        assert!(controller.views().assistant.answer.is_empty());
        assert!(controller.views().assistant.question.is_empty());
    }

    #[tokio::test]
    async fn test_location_reaches_both_viewports() {
        let session = session();
        let _tasks = session.start(Vec::new());

        session.report_fix(GeoFix::new(2.983_514_010_761_342, 101.506_878_517_088_54));
        eventually(|| session.controller().views().mobile.user_location().is_some()).await;

        let controller = session.controller();
        let expected = Some(Pixel::new(1050.0, 0.0));
        let near = |p: Option<Pixel>| {
            p.zip(expected)
                .is_some_and(|(a, b)| a.distance_to(b) < 1e-6)
        };
        assert!(near(controller.views().desktop.user_location()));
        assert!(near(controller.views().mobile.user_location()));
    }

    #[tokio::test]
    async fn test_share_and_deep_link() {
        let session = session();
        seed(&session);
        session.sidebar().render(&session.registry().snapshot());

        let mut clipboard = MemoryClipboard::new();
        assert_eq!(
            session.share_place("caf", &mut clipboard).as_deref(),
            Some("https://www.google.com/maps?q=2.981,101.51")
        );

        assert!(session.open_fragment("#poi=caf"));
        assert!(!session.open_fragment("#poi=ghost"));
        assert_eq!(session.controller().current().unwrap().title, "Cafe");
        assert!(session.dismiss());
    }

    #[test]
    fn test_rejects_inverted_zoom_limits() {
        let mut config = SessionConfig::new(
            ImageSize {
                width: 100.0,
                height: 100.0,
            },
            Calibration {
                top_left: GeoPoint::new(2.0, 1.0),
                bottom_right: GeoPoint::new(1.0, 2.0),
            },
        );
        config.mobile.min_zoom = 4.0;
        let assistant = AssistantBridge::new(
            EchoBackend {
                delay: Duration::ZERO,
            },
            NoSummary,
            AssistantConfig::default(),
        );
        assert!(matches!(
            Session::new(config, assistant),
            Err(SessionError::Viewport(ViewportError::InvertedZoomRange {
                id: ViewportId::Mobile,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_deep_link_waits_for_places() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pois.json");
        std::fs::write(&path, br#"[{"id":"lib","title":"Library","coords":{"x":100,"y":100}}]"#).unwrap();

        let session = session();
        let pending = session.open_on_load("#poi=lib").unwrap();
        let feed = FeedConfig::new(PlaceKind::Poi, FeedSource::File(path))
            .with_poll_interval(Duration::from_millis(20));
        let _tasks = session.start(vec![feed]);

        timeout(WAIT, pending).await.unwrap().unwrap();
        assert_eq!(session.controller().current().unwrap().title, "Library");
        session.shutdown();
    }

    #[tokio::test]
    async fn test_deep_link_resolves_at_once_when_loaded() {
        let session = session();
        seed(&session);
        assert!(session.open_on_load("#poi=caf").is_none());
        assert_eq!(session.controller().current().unwrap().title, "Cafe");
        assert!(session.open_on_load("#about").is_none());
    }

    #[tokio::test]
    async fn test_deep_link_yields_to_user_selection() {
        let session = session();
        let pending = session.open_on_load("#poi=caf").unwrap();

        session
            .controller()
            .select(crate::selection::SelectRequest {
                title: "Gate".to_string(),
                coords: Some(crate::selection::CoordsInput::Pair([5.0, 5.0])),
                ..Default::default()
            })
            .unwrap();
        seed(&session);

        timeout(WAIT, pending).await.unwrap().unwrap();
        assert_eq!(session.controller().current().unwrap().title, "Gate");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_discards_pending_answer() {
        let session = session();
        seed(&session);
        session.select_by_id("lib").unwrap();

        let pending = session.ask("slow question").unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(session.dismiss());
        pending.await.unwrap();

        let controller = session.controller();
        assert!(controller.current().is_none());
        assert!(controller.views().assistant.answer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_share_label_reverts() {
        let session = session();
        seed(&session);
        session.select_by_id("lib").unwrap();

        let mut clipboard = MemoryClipboard::new();
        assert_eq!(
            session.share_link(&mut clipboard).as_deref(),
            Some("http://localhost:8080/#poi=lib")
        );
        assert_eq!(session.controller().views().share_label, "Link copied");

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        session.share_link(&mut clipboard);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(session.controller().views().share_label, "Link copied");

        tokio::time::sleep(SHARE_LABEL_RESET).await;
        assert_eq!(
            session.controller().views().share_label,
            crate::selection::SHARE_LABEL
        );

        assert_eq!(session.copy_map_link(&mut clipboard), "http://localhost:8080/");
        assert_eq!(clipboard.last(), Some("http://localhost:8080/"));
    }
}
