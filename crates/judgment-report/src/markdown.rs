//! Markdown report generation.
//!
//! This module provides the [`MarkdownGenerator`] struct for converting a
//! [`Report`] into a shareable Markdown document with the verdict table, the
//! generated summary and the answers in quiz order.
//!
//! # Example
//!
//! ```rust
//! use judgment_report::{MarkdownGenerator, Report};
//!
//! let report = Report::builder()
//!     .title("Judgment: Code Protocol")
//!     .summary("Chrome and circuitry")
//!     .build()
//!     .unwrap();
//!
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.starts_with("# Judgment Rendered: Judgment: Code Protocol"));
//! ```

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::{Report, Side};

/// Generates Markdown reports from quiz results.
pub struct MarkdownGenerator<'a> {
    report: &'a Report,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_verdict(&mut output);
        self.write_summary(&mut output);
        self.write_answers(&mut output);
        self.write_footer(&mut output);

        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# Judgment Rendered: {}\n",
            escape_markdown(&self.report.title)
        );
    }

    /// Writes the verdict table and the dominant protocol line.
    fn write_verdict(&self, output: &mut String) {
        let verdict = &self.report.verdict;

        let _ = writeln!(output, "## Verdict & Analysis\n");
        let _ = writeln!(output, "| Protocol | Theme | Answers | Share |");
        let _ = writeln!(output, "|----------|-------|---------|-------|");
        let _ = writeln!(
            output,
            "| {} | {} | {} | {}% |",
            Side::Code,
            escape_markdown(&self.report.code_theme),
            verdict.code,
            verdict.code_percent
        );
        let _ = writeln!(
            output,
            "| {} | {} | {} | {}% |",
            Side::Chaos,
            escape_markdown(&self.report.chaos_theme),
            verdict.chaos,
            verdict.chaos_percent
        );
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "**Dominant protocol**: {} ({})\n",
            verdict.dominant,
            escape_markdown(self.report.dominant_theme())
        );
    }

    fn write_summary(&self, output: &mut String) {
        let _ = writeln!(output, "## Summary\n");
        if self.report.summary.trim().is_empty() {
            let _ = writeln!(output, "*No summary available.*\n");
        } else {
            let _ = writeln!(output, "{}\n", self.report.summary.trim());
        }
    }

    /// Writes the answers table.
    fn write_answers(&self, output: &mut String) {
        let _ = writeln!(output, "## Answers\n");

        if self.report.answers.is_empty() {
            let _ = writeln!(output, "*No answers recorded.*\n");
            return;
        }

        let _ = writeln!(output, "| # | Question | Answer | Protocol |");
        let _ = writeln!(output, "|---|----------|--------|----------|");
        for answer in &self.report.answers {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                answer.question_number,
                escape_markdown(&answer.question),
                escape_markdown(&answer.answer),
                answer.side
            );
        }
        let _ = writeln!(output);
    }

    fn write_footer(&self, output: &mut String) {
        let _ = writeln!(output, "---\n");
        let _ = writeln!(
            output,
            "*Completed in {} · Generated {}*",
            format_duration(self.report.duration_seconds),
            format_timestamp(&self.report.generated_at)
        );
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Formats a duration in seconds to a human-readable string.
///
/// Examples: "45s", "2m 5s", "1h 30m"
fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();

    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }

    parts.join(" ")
}

/// Format: "YYYY-MM-DD HH:MM:SS UTC"
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Escapes Markdown control characters for use inside table cells.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '|' | '<' | '>' | '\\' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' => result.push_str("<br>"),
            _ => result.push(ch),
        }
    }

    result
}
