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

//! Render state fed by the selection controller.
//!
//! Renderers only read these values; the controller is the only writer.

use crate::recommend::Recommendation;
use crate::viewport::{Viewport, ViewportConfig, ViewportId};

/// Footer text shown when nothing is selected.
pub const IDLE_FOOTER: &str = "Select a POI or Zone to see details";

/// Share button label at rest.
pub const SHARE_LABEL: &str = "Copy link";

/// Share button label after a successful copy.
pub const SHARE_COPIED_LABEL: &str = "Link copied";

/// Details panel content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailsPanel {
    pub visible: bool,
    pub title: String,
    pub image: String,
    pub description: String,
}

/// The "nearby" list under the details panel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecommendationPanel {
    pub visible: bool,
    pub items: Vec<Recommendation>,
}

/// Question box and answer area of the assistant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssistantPanel {
    pub question: String,
    pub answer: String,
    generation: u64,
}

impl AssistantPanel {
    /// Start a new ask. Any earlier ask still in flight becomes stale.
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Show an indicator or answer for ask `generation`.
    ///
    /// Returns `false` and leaves the panel untouched when a newer ask or a
    /// selection change has happened since.
    pub fn show(&mut self, generation: u64, text: impl Into<String>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.answer = text.into();
        true
    }

    /// Show the final answer for ask `generation` and close it, so late
    /// indicator ticks for the same ask are ignored.
    pub fn finish(&mut self, generation: u64, text: impl Into<String>) -> bool {
        if !self.show(generation, text) {
            return false;
        }
        self.generation += 1;
        true
    }

    /// Clear question and answer, invalidating in-flight asks.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.question.clear();
        self.answer.clear();
    }
}

/// Everything the UI draws from the current selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Views {
    pub panel: DetailsPanel,
    pub footer: String,
    pub share_label: String,
    pub recommendations: RecommendationPanel,
    pub assistant: AssistantPanel,
    pub desktop: Viewport,
    pub mobile: Viewport,
}

impl Views {
    #[must_use]
    pub fn new(desktop: ViewportConfig, mobile: ViewportConfig) -> Self {
        Self {
            panel: DetailsPanel::default(),
            footer: IDLE_FOOTER.to_string(),
            share_label: SHARE_LABEL.to_string(),
            recommendations: RecommendationPanel::default(),
            assistant: AssistantPanel::default(),
            desktop: Viewport::new(ViewportId::Desktop, desktop),
            mobile: Viewport::new(ViewportId::Mobile, mobile),
        }
    }

    /// Both viewports, desktop first.
    pub fn viewports_mut(&mut self) -> [&mut Viewport; 2] {
        [&mut self.desktop, &mut self.mobile]
    }
}

impl Default for Views {
    fn default() -> Self {
        Self::new(ViewportConfig::desktop(), ViewportConfig::mobile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_answer_is_dropped() {
        let mut panel = AssistantPanel::default();
        let first = panel.begin();
        let second = panel.begin();

        assert!(!panel.show(first, "old"));
        assert!(panel.show(second, "new"));
        assert_eq!(panel.answer, "new");

        panel.reset();
        assert!(!panel.show(second, "late"));
        assert!(panel.answer.is_empty());
    }

    #[test]
    fn test_finish_seals_the_ask() {
        let mut panel = AssistantPanel::default();
        let ask = panel.begin();

        assert!(panel.show(ask, "Thinking."));
        assert!(panel.finish(ask, "It opens at 8am."));
        assert!(!panel.show(ask, "Thinking.."));
        assert!(!panel.finish(ask, "again"));
        assert_eq!(panel.answer, "It opens at 8am.");
    }
}
