//! Interaction policy: what the interaction engine may click and how often.
//!
//! Defaults can be overlaid by a user-supplied YAML document; JSON documents
//! parse as YAML too. The overlay is forgiving: unknown keys are ignored, a
//! key whose value has the wrong shape keeps its default, and an unreadable
//! or non-mapping document leaves the defaults untouched. Every deviation is
//! logged.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::utils::DEFAULT_MAX_CLICKS_PER_PAGE;

const THEME_KEYWORDS: &[&str] = &["dark", "light", "theme", "mode", "night", "day"];
const MODAL_KEYWORDS: &[&str] = &["modal", "popup", "dialog", "lightbox"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionPolicy {
    pub max_clicks_per_page: usize,
    pub selectors_force_click: Vec<String>,
    pub anchor_click: bool,
    pub theme_toggle_keywords: Vec<String>,
    pub open_modals_keywords: Vec<String>,
}

impl Default for InteractionPolicy {
    fn default() -> Self {
        Self {
            max_clicks_per_page: DEFAULT_MAX_CLICKS_PER_PAGE,
            selectors_force_click: Vec::new(),
            anchor_click: true,
            theme_toggle_keywords: THEME_KEYWORDS.iter().map(|k| (*k).to_string()).collect(),
            open_modals_keywords: MODAL_KEYWORDS.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

impl InteractionPolicy {
    /// Overlay the recognized keys of `doc` on top of `self`.
    #[must_use]
    pub fn with_overlay(mut self, doc: &Value) -> Self {
        let Some(map) = doc.as_object() else {
            log::warn!(
                target: "snapshot::config",
                "Interaction override is not a mapping, using defaults"
            );
            return self;
        };

        for (key, value) in map {
            let applied = match key.as_str() {
                "max_clicks_per_page" => value
                    .as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .map(|n| self.max_clicks_per_page = n)
                    .is_some(),
                "selectors_force_click" => string_list(value)
                    .map(|list| self.selectors_force_click = list)
                    .is_some(),
                "anchor_click" => value
                    .as_bool()
                    .map(|flag| self.anchor_click = flag)
                    .is_some(),
                "theme_toggle_keywords" => string_list(value)
                    .map(|list| self.theme_toggle_keywords = list)
                    .is_some(),
                "open_modals_keywords" => string_list(value)
                    .map(|list| self.open_modals_keywords = list)
                    .is_some(),
                other => {
                    log::warn!(
                        target: "snapshot::config",
                        "Ignoring unknown interaction key '{other}'"
                    );
                    continue;
                }
            };
            if !applied {
                log::warn!(
                    target: "snapshot::config",
                    "Invalid value for interaction key '{key}', keeping default"
                );
            }
        }
        self
    }

    /// Defaults overlaid with a YAML or JSON document held in memory.
    #[must_use]
    pub fn from_override_str(raw: &str) -> Self {
        match serde_yaml::from_str::<Value>(raw) {
            Ok(doc) => Self::default().with_overlay(&doc),
            Err(e) => {
                log::warn!(
                    target: "snapshot::config",
                    "Interaction override is not valid YAML ({e}), using defaults"
                );
                Self::default()
            }
        }
    }

    /// Defaults overlaid with the document at `path`, if any.
    ///
    /// A missing or unreadable file yields the defaults.
    pub async fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Self::from_override_str(&raw),
            Err(e) => {
                log::warn!(
                    target: "snapshot::config",
                    "Cannot read interaction override {}: {e}, using defaults",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Case-insensitive alternation of the theme keywords, escaped for use as
    /// a regular expression source.
    #[must_use]
    pub fn theme_pattern(&self) -> String {
        keyword_pattern(&self.theme_toggle_keywords)
    }

    #[must_use]
    pub fn modal_pattern(&self) -> String {
        keyword_pattern(&self.open_modals_keywords)
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn keyword_pattern(keywords: &[String]) -> String {
    let escaped: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        // Never matches anything
        return "(?!)".to_string();
    }
    escaped.join("|")
}
