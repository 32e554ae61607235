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

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const THINKING_INTERVAL: Duration = Duration::from_millis(500);

/// "Thinking" followed by zero to three dots.
#[must_use]
pub fn thinking_text(tick: usize) -> String {
    format!("Thinking{}", ".".repeat(tick % 4))
}

/// Animated placeholder shown while an ask is in flight.
///
/// The ticker stops when the indicator is cancelled or dropped, so holding
/// it for the lifetime of the request covers every exit path.
#[derive(Debug)]
pub struct ThinkingIndicator {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ThinkingIndicator {
    /// Start ticking on the current runtime. `on_tick` receives the text to
    /// display, immediately and then every `period`.
    pub fn start<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(String) + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancel = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut tick = 0usize;
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        on_tick(thinking_text(tick));
                        tick += 1;
                    }
                }
            }
        });

        Self { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token that stops this indicator when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the ticker task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ThinkingIndicator {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl FnMut(String) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |text| sink.lock().unwrap().push(text))
    }

    #[test]
    fn test_thinking_text_cycles() {
        assert_eq!(thinking_text(0), "Thinking");
        assert_eq!(thinking_text(3), "Thinking...");
        assert_eq!(thinking_text(4), "Thinking");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_cancelled() {
        let (seen, on_tick) = recorder();
        let indicator = ThinkingIndicator::start(THINKING_INTERVAL, on_tick);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Thinking", "Thinking.", "Thinking.."]
        );

        indicator.cancel();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert!(indicator.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticker() {
        let (seen, on_tick) = recorder();
        let indicator = ThinkingIndicator::start(THINKING_INTERVAL, on_tick);
        tokio::time::sleep(Duration::from_millis(600)).await;
        drop(indicator);

        let before = seen.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(seen.lock().unwrap().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_cancels_previous() {
        let (first_seen, first_tick) = recorder();
        let (second_seen, second_tick) = recorder();

        let mut slot = Some(ThinkingIndicator::start(THINKING_INTERVAL, first_tick));
        tokio::time::sleep(Duration::from_millis(100)).await;
        slot = Some(ThinkingIndicator::start(THINKING_INTERVAL, second_tick));

        let before = first_seen.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(first_seen.lock().unwrap().len(), before);
        assert!(second_seen.lock().unwrap().len() > 1);
        assert!(slot.is_some_and(|s| !s.is_cancelled()));
    }
}
