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

//! "Ask about this place".
//!
//! The bridge enriches a question with the selected place and an
//! encyclopedia summary, then tries each configured model in turn until one
//! produces a non-empty answer. Nothing here returns an error to the caller:
//! every failure ends in one of the fixed user-facing messages below.

mod openrouter;
mod thinking;
mod wikipedia;

pub use openrouter::OpenRouterBackend;
pub use thinking::{thinking_text, ThinkingIndicator, THINKING_INTERVAL};
pub use wikipedia::WikipediaSummaries;

use std::future::Future;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selection::Selection;

pub const NO_SELECTION_MESSAGE: &str = "Please select a POI or Zone first.";
pub const NO_EXTERNAL_DATA: &str = "No external data found.";
pub const UNAVAILABLE_MESSAGE: &str =
    "AI is temporarily unavailable due to free model limits. Please try again in a moment.";

/// Summary text beyond this many characters is dropped.
pub const SUMMARY_MAX_CHARS: usize = 800;

pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_COMPLETION_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/";

/// Assistant failures. These are logged and turned into fallbacks.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model returned an error: {0}")]
    Api(String),

    #[error("model returned no content")]
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of an OpenAI-style chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// A chat completion service.
pub trait CompletionBackend {
    /// Run one completion. `Ok` carries the raw message content, which may
    /// still be blank.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<String, AssistantError>> + Send;
}

/// Encyclopedia lookup by place title.
pub trait SummarySource {
    /// `Ok(None)` when there is no article.
    fn summary(&self, title: &str) -> impl Future<Output = Result<Option<String>, AssistantError>> + Send;
}

/// Model list and prompt settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Tried in order; the first non-empty answer wins.
    pub models: Vec<String>,
    pub system_instruction: String,
    pub max_tokens: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            models: vec![
                "meta-llama/llama-3.3-70b-instruct:free".to_string(),
                "mistralai/mistral-7b-instruct:free".to_string(),
                "google/gemma-2-9b-it:free".to_string(),
            ],
            system_instruction: "You are a friendly campus guide. Answer briefly about the selected place."
                .to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Question answering over the current selection.
#[derive(Debug)]
pub struct AssistantBridge<B, S> {
    backend: B,
    summaries: S,
    config: AssistantConfig,
}

impl<B, S> AssistantBridge<B, S>
where
    B: CompletionBackend + Sync,
    S: SummarySource + Sync,
{
    pub fn new(backend: B, summaries: S, config: AssistantConfig) -> Self {
        Self {
            backend,
            summaries,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Answer `question`, or the empty string for a blank question.
    pub async fn ask(&self, question: &str, selection: Option<&Selection>) -> String {
        self.ask_opt(question, selection).await.unwrap_or_default()
    }

    /// Answer `question`. `None` means the question was blank and nothing
    /// should change on screen.
    pub async fn ask_opt(&self, question: &str, selection: Option<&Selection>) -> Option<String> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }
        let Some(selection) = selection else {
            return Some(NO_SELECTION_MESSAGE.to_string());
        };

        let external = self.external_results(&selection.title).await;
        let prompt = user_prompt(selection, &external, question);

        for model in &self.config.models {
            let request = CompletionRequest {
                model: model.clone(),
                messages: vec![
                    ChatMessage::system(&self.config.system_instruction),
                    ChatMessage::user(&prompt),
                ],
                max_tokens: self.config.max_tokens,
            };

            match self.backend.complete(&request).await {
                Ok(content) if !content.trim().is_empty() => {
                    info!("Answered with model {model}");
                    return Some(content);
                }
                Ok(_) => warn!("Empty response from model {model}"),
                Err(e) => warn!("Model {model} failed: {e}"),
            }
        }

        Some(UNAVAILABLE_MESSAGE.to_string())
    }

    async fn external_results(&self, title: &str) -> String {
        match self.summaries.summary(title).await {
            Ok(Some(extract)) if !extract.trim().is_empty() => {
                let extract: String = extract.chars().take(SUMMARY_MAX_CHARS).collect();
                format!("Wikipedia summary:\n{extract}")
            }
            Ok(_) => NO_EXTERNAL_DATA.to_string(),
            Err(e) => {
                debug!("Summary lookup for '{title}' failed: {e}");
                NO_EXTERNAL_DATA.to_string()
            }
        }
    }
}

/// User message sent to every model.
///
/// Latitude and longitude are the place's real-world position; map pixel
/// coordinates are never presented as degrees. The pixel position goes on
/// its own labelled line so a place without a real-world position still
/// has some location context.
#[must_use]
pub fn user_prompt(selection: &Selection, external: &str, question: &str) -> String {
    let description = selection
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("No description available.");
    let (lat, lng) = selection.real_world_coords.map_or_else(
        || ("Unknown".to_string(), "Unknown".to_string()),
        |c| (c.lat.to_string(), c.lng.to_string()),
    );

    let position = selection.display_coords();

    format!(
        "Place name: {}\n\n\
         Description from map database:\n{description}\n\n\
         Coordinates:\nLatitude: {lat}\nLongitude: {lng}\n\
         Map position (image pixels): row {}, column {}\n\n\
         External search results:\n{external}\n\n\
         Question:\n{question}\n",
        selection.title, position.y, position.x
    )
}
