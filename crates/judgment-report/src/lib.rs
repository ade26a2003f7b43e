//! Judgment Result Reports
//!
//! This crate provides the types for the result shown at the end of a quiz:
//! the verdict tally, the per-question answers and the generated summary.
//! Reports can be serialized to JSON for the front end or rendered to
//! Markdown for sharing.
//!
//! # Types
//!
//! - [`Report`] - The complete result of one quiz attempt
//! - [`Verdict`] - Code vs chaos tally with rounded percentages
//! - [`AnswerEntry`] - One answered question
//!
//! # Generators
//!
//! - [`json::JsonGenerator`] - Generate JSON reports with compact or pretty formatting
//! - [`MarkdownGenerator`] - Generate human-readable Markdown reports
//!
//! # Example
//!
//! ```rust
//! use judgment_report::{AnswerEntry, Report, Side};
//! use judgment_report::json::JsonGenerator;
//!
//! let report = Report::builder()
//!     .title("Judgment: Code Protocol")
//!     .summary("A figure framed by chrome machinery.")
//!     .answer(AnswerEntry::new(1, "Order or chaos?", "Order", Side::Code))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(report.verdict.code_percent, 100);
//!
//! let json = JsonGenerator::new(&report).generate_pretty().unwrap();
//! assert!(json.contains("TerminAEtor"));
//! ```

pub mod json;
mod markdown;

pub use markdown::MarkdownGenerator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid report data.
    #[error("invalid report data: {0}")]
    InvalidData(String),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Side (local copy to avoid cross-crate dependency)
// ============================================================================

/// Which protocol an answer counted towards.
///
/// This is a local copy of `Protocol` from the orchestrator crate so the
/// report crate stays free of orchestrator dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Orderly, systematic answers.
    #[default]
    Code,
    /// Unpredictable, emergent answers.
    Chaos,
}

impl Side {
    /// Returns the display label used in rendered reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Code => "Code",
            Self::Chaos => "Chaos",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Verdict
// ============================================================================

/// Tally of code and chaos answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Number of code answers.
    pub code: usize,
    /// Number of chaos answers.
    pub chaos: usize,
    /// Share of code answers, rounded to the nearest percent.
    pub code_percent: usize,
    /// Share of chaos answers; always `100 - code_percent`.
    pub chaos_percent: usize,
    /// The side with the larger share. Ties go to code.
    pub dominant: Side,
}

impl Verdict {
    /// Tallies a sequence of answers.
    ///
    /// With no answers the verdict is an even split with code dominant.
    ///
    /// # Examples
    ///
    /// ```
    /// use judgment_report::{Side, Verdict};
    ///
    /// let verdict = Verdict::tally([Side::Chaos, Side::Code, Side::Chaos]);
    /// assert_eq!(verdict.code_percent, 33);
    /// assert_eq!(verdict.chaos_percent, 67);
    /// assert_eq!(verdict.dominant, Side::Chaos);
    /// ```
    #[must_use]
    pub fn tally(sides: impl IntoIterator<Item = Side>) -> Self {
        let (code, chaos) = sides
            .into_iter()
            .fold((0usize, 0usize), |(code, chaos), side| match side {
                Side::Code => (code + 1, chaos),
                Side::Chaos => (code, chaos + 1),
            });

        let total = code + chaos;
        let code_percent = if total == 0 {
            50
        } else {
            // round half up, integer only
            (code * 200 + total) / (total * 2)
        };
        let chaos_percent = 100 - code_percent;
        let dominant = if code_percent >= chaos_percent {
            Side::Code
        } else {
            Side::Chaos
        };

        Self {
            code,
            chaos,
            code_percent,
            chaos_percent,
            dominant,
        }
    }

    /// Total number of tallied answers.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.code + self.chaos
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Self::tally(std::iter::empty())
    }
}

// ============================================================================
// AnswerEntry
// ============================================================================

/// One answered question as shown in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    /// One-based position in the quiz.
    pub question_number: usize,
    /// The question text.
    pub question: String,
    /// Label of the chosen answer.
    pub answer: String,
    /// Side the answer counted towards.
    pub side: Side,
}

impl AnswerEntry {
    /// Creates a new answer entry.
    #[must_use]
    pub fn new(
        question_number: usize,
        question: impl Into<String>,
        answer: impl Into<String>,
        side: Side,
    ) -> Self {
        Self {
            question_number,
            question: question.into(),
            answer: answer.into(),
            side,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Complete result of one quiz attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Result title, e.g. `Judgment: Code Protocol`.
    pub title: String,

    /// Summary generated from the final image.
    pub summary: String,

    /// Display name of the code theme.
    pub code_theme: String,

    /// Display name of the chaos theme.
    pub chaos_theme: String,

    /// Code vs chaos tally.
    pub verdict: Verdict,

    /// Answers in quiz order.
    pub answers: Vec<AnswerEntry>,

    /// Seconds between session start and the last answer.
    pub duration_seconds: u64,

    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// Creates a new report builder.
    #[must_use]
    pub fn builder() -> ReportBuilder {
        ReportBuilder::default()
    }

    /// Serializes the report to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Serialization` if JSON serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ReportError::from)
    }

    /// Display name of the dominant side's theme.
    #[must_use]
    pub fn dominant_theme(&self) -> &str {
        match self.verdict.dominant {
            Side::Code => &self.code_theme,
            Side::Chaos => &self.chaos_theme,
        }
    }
}

// ============================================================================
// ReportBuilder
// ============================================================================

/// Builder for constructing [`Report`] instances.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    title: Option<String>,
    summary: Option<String>,
    code_theme: Option<String>,
    chaos_theme: Option<String>,
    answers: Vec<AnswerEntry>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl ReportBuilder {
    /// Sets the result title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the summary text.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the theme display names.
    #[must_use]
    pub fn themes(mut self, code: impl Into<String>, chaos: impl Into<String>) -> Self {
        self.code_theme = Some(code.into());
        self.chaos_theme = Some(chaos.into());
        self
    }

    /// Adds an answer.
    #[must_use]
    pub fn answer(mut self, answer: AnswerEntry) -> Self {
        self.answers.push(answer);
        self
    }

    /// Sets all answers at once.
    #[must_use]
    pub fn answers(mut self, answers: Vec<AnswerEntry>) -> Self {
        self.answers = answers;
        self
    }

    /// Sets the start and completion timestamps used for the duration.
    #[must_use]
    pub const fn timing(
        mut self,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.started_at = started_at;
        self.completed_at = completed_at;
        self
    }

    /// Builds the report, tallying the verdict from the answers.
    ///
    /// Theme names default to `Code` and `Chaos` when not set.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidData` if the title or summary is missing.
    pub fn build(self) -> Result<Report> {
        let title = self
            .title
            .ok_or_else(|| ReportError::InvalidData("title is required".to_string()))?;

        let summary = self
            .summary
            .ok_or_else(|| ReportError::InvalidData("summary is required".to_string()))?;

        let duration_seconds = match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => u64::try_from((end - start).num_seconds()).unwrap_or(0),
            _ => 0,
        };

        Ok(Report {
            title,
            summary,
            code_theme: self.code_theme.unwrap_or_else(|| Side::Code.to_string()),
            chaos_theme: self.chaos_theme.unwrap_or_else(|| Side::Chaos.to_string()),
            verdict: Verdict::tally(self.answers.iter().map(|a| a.side)),
            answers: self.answers,
            duration_seconds,
            generated_at: Utc::now(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    // ------------------------------------------------------------------------
    // Verdict tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_verdict_empty_is_even_split() {
        let verdict = Verdict::tally(Vec::<Side>::new());
        assert_eq!(verdict.code_percent, 50);
        assert_eq!(verdict.chaos_percent, 50);
        assert_eq!(verdict.dominant, Side::Code);
        assert_eq!(verdict.total(), 0);
        assert_eq!(Verdict::default(), verdict);
    }

    #[test]
    fn test_verdict_tie_goes_to_code() {
        let verdict = Verdict::tally([Side::Chaos, Side::Code]);
        assert_eq!(verdict.code_percent, 50);
        assert_eq!(verdict.dominant, Side::Code);
    }

    #[test]
    fn test_verdict_rounding() {
        let verdict = Verdict::tally([Side::Code, Side::Chaos, Side::Chaos]);
        assert_eq!(verdict.code_percent, 33);
        assert_eq!(verdict.chaos_percent, 67);

        let mut sides = vec![Side::Code];
        sides.extend(std::iter::repeat(Side::Chaos).take(7));
        let verdict = Verdict::tally(sides);
        assert_eq!(verdict.code_percent, 13, "12.5 rounds up");
        assert_eq!(verdict.chaos_percent, 87);
        assert_eq!(verdict.dominant, Side::Chaos);
    }

    #[test]
    fn test_verdict_serialization() {
        let verdict = Verdict::tally([Side::Code, Side::Code, Side::Code, Side::Chaos, Side::Chaos]);
        insta::assert_json_snapshot!(verdict, @r###"
        {
          "code": 3,
          "chaos": 2,
          "codePercent": 60,
          "chaosPercent": 40,
          "dominant": "code"
        }
        "###);
    }

    // ------------------------------------------------------------------------
    // Builder tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_builder_requires_title_and_summary() {
        let err = Report::builder().summary("s").build().unwrap_err();
        assert!(err.to_string().contains("title is required"));

        let err = Report::builder().title("t").build().unwrap_err();
        assert!(err.to_string().contains("summary is required"));
    }

    #[test]
    fn test_builder_computes_verdict_and_duration() {
        let start = Utc::now();
        let report = Report::builder()
            .title("Judgment: Chaos Protocol")
            .summary("Glitching neon")
            .themes("TerminAEtor", "TerminAItor")
            .answers(vec![
                AnswerEntry::new(1, "Q1", "Order", Side::Code),
                AnswerEntry::new(2, "Q2", "Chaos", Side::Chaos),
                AnswerEntry::new(3, "Q3", "Chaos", Side::Chaos),
            ])
            .timing(Some(start), Some(start + Duration::seconds(95)))
            .build()
            .unwrap();

        assert_eq!(report.verdict.chaos, 2);
        assert_eq!(report.verdict.dominant, Side::Chaos);
        assert_eq!(report.dominant_theme(), "TerminAItor");
        assert_eq!(report.duration_seconds, 95);
    }

    #[test]
    fn test_builder_defaults() {
        let report = Report::builder().title("t").summary("s").build().unwrap();
        assert_eq!(report.code_theme, "Code");
        assert_eq!(report.chaos_theme, "Chaos");
        assert_eq!(report.duration_seconds, 0);
        assert!(report.answers.is_empty());
    }

    #[test]
    fn test_report_to_json_round_trip() {
        let report = Report::builder()
            .title("Judgment: Code Protocol")
            .summary("Chrome")
            .answer(AnswerEntry::new(1, "Q1", "Order", Side::Code))
            .build()
            .unwrap();

        let json = report.to_json().unwrap();
        assert!(json.contains("\"codeTheme\""));
        assert!(json.contains("\"questionNumber\": 1"));

        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.title, report.title);
        assert_eq!(parsed.verdict, report.verdict);
        assert_eq!(parsed.answers, report.answers);
    }

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Code.to_string(), "Code");
        assert_eq!(
            serde_json::to_string(&Side::Chaos).unwrap(),
            r#""chaos""#
        );
    }
}
