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

//! OpenRouter (OpenAI-compatible) chat completion backend.

use std::time::Duration;

use serde::Deserialize;

use super::{AssistantError, CompletionBackend, CompletionRequest, DEFAULT_COMPLETION_URL};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn into_content(self) -> Result<String, AssistantError> {
        if let Some(error) = self.error {
            return Err(AssistantError::Api(
                error.message.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or(AssistantError::EmptyResponse)
    }
}

/// HTTP client for an OpenAI-compatible completion endpoint.
pub struct OpenRouterBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    referer: String,
    title: String,
}

impl std::fmt::Debug for OpenRouterBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterBackend")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl OpenRouterBackend {
    /// `referer` and `title` identify the app to the service.
    pub fn new(
        api_key: Option<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, AssistantError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: DEFAULT_COMPLETION_URL.to_string(),
            api_key,
            referer: referer.into(),
            title: title.into(),
        })
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl CompletionBackend for OpenRouterBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AssistantError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        // Error payloads arrive with non-2xx statuses too, so the body is
        // decoded regardless of status.
        let response: CompletionResponse = builder.send().await?.json().await?;
        response.into_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<String, AssistantError> {
        serde_json::from_str::<CompletionResponse>(body)
            .unwrap()
            .into_content()
    }

    #[test]
    fn test_content_extracted() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}]}"#;
        assert_eq!(parse(body).unwrap(), "Hello");
    }

    #[test]
    fn test_error_payload_wins() {
        let body = r#"{"error":{"message":"Rate limit exceeded","code":429},"choices":[]}"#;
        match parse(body) {
            Err(AssistantError::Api(message)) => assert_eq!(message, "Rate limit exceeded"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_content_is_empty_response() {
        assert!(matches!(parse(r#"{"choices":[]}"#), Err(AssistantError::EmptyResponse)));
        assert!(matches!(
            parse(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(AssistantError::EmptyResponse)
        ));
        assert!(matches!(parse("{}"), Err(AssistantError::EmptyResponse)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let backend = OpenRouterBackend::new(Some("sk-secret".to_string()), "http://localhost", "Campus")
            .unwrap();
        assert!(!format!("{backend:?}").contains("sk-secret"));
        assert!(backend.has_api_key());
    }
}
