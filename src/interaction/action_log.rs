//! Append-only audit log of interaction attempts

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::utils::{safe_truncate_chars, ACTIONS_LOG_FILE, ACTION_ERROR_MAX_CHARS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    ForcedClick,
    AnchorClick,
    SkipAnchor,
    QueueSubpage,
    SkipExternal,
    Click,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ForcedClick => "forced-click",
            Self::AnchorClick => "anchor-click",
            Self::SkipAnchor => "skip-anchor",
            Self::QueueSubpage => "queue-subpage",
            Self::SkipExternal => "skip-external",
            Self::Click => "click",
        };
        f.write_str(name)
    }
}

/// One attempted interaction on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionAction {
    pub url: String,
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InteractionAction {
    #[must_use]
    pub fn new(url: &str, action: ActionKind) -> Self {
        Self {
            url: url.to_string(),
            action,
            selector: None,
            href: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_selector(mut self, selector: &str) -> Self {
        self.selector = Some(selector.to_string());
        self
    }

    #[must_use]
    pub fn with_href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    /// Attach an error message, truncated to the log's limit
    #[must_use]
    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        let message = error.to_string();
        self.error = Some(safe_truncate_chars(&message, ACTION_ERROR_MAX_CHARS).to_string());
        self
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Job-wide action log
#[derive(Debug, Default, Clone)]
pub struct ActionLog {
    entries: Vec<InteractionAction>,
}

impl ActionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: InteractionAction) {
        match &action.error {
            Some(error) => log::debug!("{} on {} failed: {error}", action.action, action.url),
            None => log::trace!("{} on {}", action.action, action.url),
        }
        self.entries.push(action);
    }

    #[must_use]
    pub fn entries(&self) -> &[InteractionAction] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<InteractionAction> {
        self.entries
    }

    /// Write the log as pretty JSON to `actions_log.json` under `out_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn persist(&self, out_dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)
            .context("Failed to serialize action log")?;
        let path = out_dir.join(ACTIONS_LOG_FILE);
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
