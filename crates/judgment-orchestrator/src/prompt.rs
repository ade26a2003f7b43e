//! Prompt assembly for the generation collaborators.
//!
//! Everything here is pure string building with no access to the session.
//! The wording targets the hosted image-editing model and can change
//! independently from the quiz flow.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::question::Protocol;

/// Marker left in reference descriptions that were never filled in.
const PLACEHOLDER_MARKER: &str = "PASTE YOUR";

/// Prompt used to summarize the final transformed image.
pub const SUMMARY_PROMPT: &str = "You are an AI that summarizes images. \
Based on the image provided, create a summary of the image.";

/// Prompt used to describe a reference image for later theme guidance.
pub const REFERENCE_THEME_PROMPT: &str = "Analyze the following image. \
Describe in detail the specific objects, props, items, and distinct visual elements \
(e.g., robots, futuristic guns, specific machinery, energy effects, particular patterns) \
that are present.\n\
Also, briefly note the overall artistic style if it's very prominent \
(e.g., '80s retro-futuristic', 'cyberpunk').\n\
Focus on elements that could be incorporated into a new, visually rich background. \
Do not describe any people in the image.";

/// A transformation theme tied to one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    /// Name the image-editing prompt refers to.
    pub name: String,

    /// Name shown in the verdict table. Falls back to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Pre-generated descriptions of reference images, one per step.
    #[serde(default)]
    pub descriptions: Vec<String>,
}

impl Theme {
    /// Creates a theme without reference descriptions.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            descriptions: Vec::new(),
        }
    }

    /// Sets the verdict display name.
    #[must_use]
    pub fn displayed_as(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Name shown in the verdict table.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Returns the reference description for a zero-based question index.
    ///
    /// Descriptions cycle when there are fewer descriptions than questions.
    /// Blank entries and unfilled placeholders yield `None`.
    #[must_use]
    pub fn guidance_for(&self, question_index: usize) -> Option<&str> {
        if self.descriptions.is_empty() {
            return None;
        }
        let description = self.descriptions[question_index % self.descriptions.len()].trim();
        if description.is_empty() || description.contains(PLACEHOLDER_MARKER) {
            warn!(
                theme = %self.name,
                question = question_index + 1,
                "Theme description is empty or still a placeholder; prompting without it"
            );
            return None;
        }
        Some(description)
    }
}

/// The pair of themes the quiz transforms towards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Themes {
    /// Theme for `code` answers.
    #[serde(default = "default_code_theme")]
    pub code: Theme,

    /// Theme for `chaos` answers.
    #[serde(default = "default_chaos_theme")]
    pub chaos: Theme,
}

fn default_code_theme() -> Theme {
    Theme::named(Protocol::Code.label()).displayed_as("TerminAEtor")
}

fn default_chaos_theme() -> Theme {
    Theme::named(Protocol::Chaos.label()).displayed_as("TerminAItor")
}

impl Default for Themes {
    fn default() -> Self {
        Self {
            code: default_code_theme(),
            chaos: default_chaos_theme(),
        }
    }
}

impl Themes {
    /// Returns the theme for a protocol.
    #[must_use]
    pub const fn for_protocol(&self, protocol: Protocol) -> &Theme {
        match protocol {
            Protocol::Code => &self.code,
            Protocol::Chaos => &self.chaos,
        }
    }
}

/// Builds the title shown with the final result.
#[must_use]
pub fn verdict_title(protocol: Protocol) -> String {
    format!("Judgment: {} Protocol", protocol.label())
}

/// Builds the image-editing prompt for one quiz step.
///
/// `guidance` is the reference description picked for the step, usually
/// `theme.guidance_for(question_index)`. Blank guidance is ignored.
#[must_use]
pub fn transform_prompt(theme: &Theme, guidance: Option<&str>) -> String {
    let mut prompt = format!(
        "A photo of a user. Please edit the background to incorporate elements of the {} theme.",
        theme.name
    );

    if let Some(description) = guidance.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(" The theme is described as: ");
        prompt.push_str(description.trim_end_matches('.'));
        prompt.push('.');
    }

    prompt.push_str(" Please preserve the user's face, body, and pose. The user should not be altered.");
    prompt
}
