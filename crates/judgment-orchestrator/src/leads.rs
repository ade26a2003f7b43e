//! Lead capture: validated email addresses appended to a JSON-lines file.
//!
//! Lead capture is independent of the quiz session. A failure here is
//! reported to the caller and never touches session state.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::collaborator::LeadSink;
use crate::error::{JudgmentError, Result};

/// `local@domain.tld` with no whitespace and exactly one `@`.
static EMAIL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Trims and validates an email address.
///
/// # Errors
///
/// Returns `JudgmentError::InvalidEmail` for empty or malformed addresses.
///
/// # Examples
///
/// ```
/// use judgment_orchestrator::leads::validate_email;
///
/// assert_eq!(validate_email("  ada@example.com ").unwrap(), "ada@example.com");
/// assert!(validate_email("not-an-email").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<&str> {
    let trimmed = email.trim();
    let Some(re) = EMAIL_PATTERN.as_ref() else {
        return Err(JudgmentError::invalid_email(email));
    };
    if trimmed.is_empty() || !re.is_match(trimmed) {
        return Err(JudgmentError::invalid_email(email));
    }
    Ok(trimmed)
}

/// One stored submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    /// The submitted address.
    pub email: String,
    /// When it was submitted.
    pub timestamp: DateTime<Utc>,
}

/// Appends leads to a JSON-lines file, one object per line.
#[derive(Debug, Clone)]
pub struct JsonlLeadStore {
    path: PathBuf,
}

impl JsonlLeadStore {
    /// Creates a store writing to `path`. The file and its parent directory
    /// are created on first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The lead file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait]
impl LeadSink for JsonlLeadStore {
    async fn submit(&self, email: &str) -> Result<()> {
        let email = validate_email(email)?;
        let lead = Lead {
            email: email.to_string(),
            timestamp: Utc::now(),
        };
        let mut line = serde_json::to_string(&lead)?;
        line.push('\n');

        self.append(&line)
            .await
            .map_err(|e| JudgmentError::lead_store(&self.path, e.to_string()))?;

        info!(path = %self.path.display(), "Lead saved");
        Ok(())
    }
}
