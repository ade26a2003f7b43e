//! Configuration types for the Judgment quiz service.
//!
//! This module provides the configuration loaded from `judgment.json`: the
//! question set, the transformation themes, the generation service endpoints
//! and the lead file location. Every key is optional.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{JudgmentError, Result};
use crate::prompt::Themes;
use crate::question::{default_questions, Question, QuestionBank};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "judgment.json";

fn default_transform_base_url() -> String {
    "https://api.bfl.ai/v1".to_string()
}

fn default_transform_model() -> String {
    "flux-kontext-pro".to_string()
}

fn default_transform_key_env() -> String {
    "BFL_API_KEY".to_string()
}

/// Default delay between result polls in milliseconds.
const fn default_poll_interval_ms() -> u64 {
    1500
}

/// Default number of polls before giving up (five minutes at 1.5s).
const fn default_max_poll_attempts() -> u32 {
    200
}

fn default_summary_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_summary_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_summary_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

/// Default lead file path.
fn default_lead_file() -> String {
    ".judgment/leads.jsonl".to_string()
}

/// Main configuration for the quiz service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// The full question set.
    #[serde(default = "default_questions")]
    pub questions: Vec<Question>,

    /// Questions per session; all of them when absent.
    #[serde(default)]
    pub question_count: Option<usize>,

    /// Sample questions at random instead of taking them in order.
    #[serde(default)]
    pub shuffle_questions: bool,

    /// Themes for the two protocols.
    #[serde(default)]
    pub themes: Themes,

    /// Image transformation service.
    #[serde(default)]
    pub transform: TransformConfig,

    /// Summary service.
    #[serde(default)]
    pub summary: SummaryConfig,

    /// JSON-lines file receiving captured emails.
    #[serde(default = "default_lead_file")]
    pub lead_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            questions: default_questions(),
            question_count: None,
            shuffle_questions: false,
            themes: Themes::default(),
            transform: TransformConfig::default(),
            summary: SummaryConfig::default(),
            lead_file: default_lead_file(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `judgment.json` in the current directory. If not found,
    /// returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            JudgmentError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `judgment.json` from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `JudgmentError::ConfigParseError` if the file cannot be read or
    /// is not valid JSON, and `JudgmentError::ConfigValidationError` if the
    /// values are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(JudgmentError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| JudgmentError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `JudgmentError::ConfigValidationError` for the first failing check.
    pub fn validate(&self) -> Result<()> {
        if self.questions.is_empty() {
            return Err(JudgmentError::config_validation(
                "questions must not be empty",
                "Remove the questions key to use the built-in set, or add at least one question",
            ));
        }

        let mut seen = HashSet::new();
        for question in &self.questions {
            if !seen.insert(question.id) {
                return Err(JudgmentError::config_validation(
                    format!("duplicate question id {}", question.id),
                    "Give every question a unique id in your judgment.json",
                ));
            }
            if question.choices.len() < 2 {
                return Err(JudgmentError::config_validation(
                    format!("question {} has fewer than two choices", question.id),
                    "Give every question at least one code and one chaos choice",
                ));
            }
        }

        if let Some(count) = self.question_count {
            if count == 0 || count > self.questions.len() {
                return Err(JudgmentError::config_validation(
                    format!(
                        "questionCount must be between 1 and {} (got {count})",
                        self.questions.len()
                    ),
                    "Lower questionCount or add more questions",
                ));
            }
        }

        if self.transform.poll_interval_ms == 0 {
            return Err(JudgmentError::config_validation(
                "transform.pollIntervalMs must be greater than 0",
                "Set transform.pollIntervalMs to at least 1 in your judgment.json",
            ));
        }

        if self.transform.max_poll_attempts == 0 {
            return Err(JudgmentError::config_validation(
                "transform.maxPollAttempts must be greater than 0",
                "Set transform.maxPollAttempts to at least 1 in your judgment.json",
            ));
        }

        for (key, value) in [
            ("transform.baseUrl", &self.transform.base_url),
            ("transform.model", &self.transform.model),
            ("transform.apiKeyEnv", &self.transform.api_key_env),
            ("summary.baseUrl", &self.summary.base_url),
            ("summary.model", &self.summary.model),
            ("summary.apiKeyEnv", &self.summary.api_key_env),
            ("leadFile", &self.lead_file),
        ] {
            if value.trim().is_empty() {
                return Err(JudgmentError::config_validation(
                    format!("{key} must not be empty"),
                    format!("Remove {key} to use the default, or provide a value"),
                ));
            }
        }

        Ok(())
    }

    /// Builds the question bank described by this configuration.
    #[must_use]
    pub fn question_bank(&self) -> QuestionBank {
        QuestionBank::new(
            self.questions.clone(),
            self.question_count,
            self.shuffle_questions,
        )
    }
}

/// Image transformation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformConfig {
    /// API base URL.
    #[serde(default = "default_transform_base_url")]
    pub base_url: String,

    /// Model endpoint name.
    #[serde(default = "default_transform_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_transform_key_env")]
    pub api_key_env: String,

    /// Delay between result polls in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls before the request is abandoned.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            base_url: default_transform_base_url(),
            model: default_transform_model(),
            api_key_env: default_transform_key_env(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

/// Summary service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryConfig {
    /// API base URL.
    #[serde(default = "default_summary_base_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_summary_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_summary_key_env")]
    pub api_key_env: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            base_url: default_summary_base_url(),
            model: default_summary_model(),
            api_key_env: default_summary_key_env(),
        }
    }
}

/// Reads an API key from the named environment variable.
///
/// # Errors
///
/// Returns `JudgmentError::ConfigValidationError` naming the variable if it
/// is unset or blank.
pub fn read_api_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(JudgmentError::config_validation(
            format!("environment variable {var} is not set"),
            format!("Export {var} with your API key before starting the server"),
        )),
    }
}
