//! Heuristic page interaction.
//!
//! Runs once per page after scrolling: forced selectors first, then
//! discovered candidates, within the per-page click budget. Links on the same
//! site are handed to the frontier instead of being clicked. Every attempt
//! lands in the [`ActionLog`]; no failure here ever aborts the page.

pub mod action_log;
pub mod js_scripts;

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::browser::PageDriver;
use crate::config::{CaptureJob, InteractionPolicy};
use crate::crawl_frontier::CrawlFrontier;
use crate::utils::{normalize_url, same_registered_domain, CLICK_TIMEOUT_MS};

pub use action_log::{ActionKind, ActionLog, InteractionAction};
pub use js_scripts::{anchor_click_script, discovery_script};

/// An element reported by the discovery script
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub text: String,
    /// Raw `href` attribute, for anchors
    #[serde(default)]
    pub href: Option<String>,
}

/// What a link candidate points at, relative to the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Fragment on the current page
    InPage,
    /// Another page on the same registered domain (normalized URL)
    SameSite(String),
    /// Anything else (resolved URL, or the raw value if unresolvable)
    External(String),
}

/// Classify a raw `href` found on `page_url`.
#[must_use]
pub fn classify_link(page_url: &str, raw_href: &str) -> LinkTarget {
    let raw = raw_href.trim();
    let Ok(base) = Url::parse(page_url) else {
        return LinkTarget::External(raw.to_string());
    };
    let Ok(resolved) = base.join(raw) else {
        return LinkTarget::External(raw.to_string());
    };
    let normalized = normalize_url(resolved.as_str());
    if resolved.fragment().is_some() && normalized == normalize_url(page_url) {
        return LinkTarget::InPage;
    }
    if matches!(resolved.scheme(), "http" | "https") && same_registered_domain(&normalized, page_url)
    {
        LinkTarget::SameSite(normalized)
    } else {
        LinkTarget::External(normalized)
    }
}

/// Counters for one page's interaction phase
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InteractionSummary {
    pub clicks: usize,
    pub queued: usize,
    pub failures: usize,
}

pub struct InteractionEngine {
    policy: InteractionPolicy,
    discovery_script: String,
    settle: Duration,
    click_timeout: Duration,
    follow_subpages: bool,
}

impl InteractionEngine {
    /// Engine for a job; the discovery script is built once here.
    #[must_use]
    pub fn new(job: &CaptureJob) -> Self {
        let policy = job.policy().clone();
        Self {
            discovery_script: discovery_script(&policy),
            policy,
            settle: Duration::from_millis(job.wait_idle_ms()),
            click_timeout: Duration::from_millis(CLICK_TIMEOUT_MS),
            follow_subpages: job.follow_subpages(),
        }
    }

    /// Interact with the page currently loaded in `driver`.
    pub async fn run<D: PageDriver>(
        &self,
        driver: &D,
        page_url: &str,
        frontier: &mut CrawlFrontier,
        log: &mut ActionLog,
    ) -> InteractionSummary {
        let mut summary = InteractionSummary::default();
        let mut budget = self.policy.max_clicks_per_page;

        for selector in &self.policy.selectors_force_click {
            if budget == 0 {
                break;
            }
            match driver.element_exists(selector).await {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    summary.failures += 1;
                    log.push(
                        InteractionAction::new(page_url, ActionKind::ForcedClick)
                            .with_selector(selector)
                            .with_error(e),
                    );
                    continue;
                }
            }
            budget -= 1;
            let action = InteractionAction::new(page_url, ActionKind::ForcedClick).with_selector(selector);
            match driver.click(selector, self.click_timeout).await {
                Ok(()) => {
                    tokio::time::sleep(self.settle).await;
                    summary.clicks += 1;
                    log.push(action);
                }
                Err(e) => {
                    summary.failures += 1;
                    log.push(action.with_error(e));
                }
            }
        }

        let candidates = self.discover(driver).await;
        log::debug!("Discovered {} interaction candidates on {page_url}", candidates.len());

        let mut clicks = 0usize;
        for candidate in candidates {
            if clicks >= budget {
                break;
            }
            let href = candidate.href.as_deref().filter(|h| !h.trim().is_empty());
            match href {
                Some(raw) => match classify_link(page_url, raw) {
                    LinkTarget::InPage if self.policy.anchor_click => {
                        // Matched against the attribute exactly as the page wrote it
                        let action =
                            InteractionAction::new(page_url, ActionKind::AnchorClick).with_href(raw);
                        match driver.evaluate(&anchor_click_script(raw)).await {
                            Ok(Value::Bool(true)) => {
                                tokio::time::sleep(self.settle).await;
                                clicks += 1;
                                log.push(action);
                            }
                            Ok(_) => {
                                summary.failures += 1;
                                log.push(action.with_error("anchor not found"));
                            }
                            Err(e) => {
                                summary.failures += 1;
                                log.push(action.with_error(e));
                            }
                        }
                    }
                    LinkTarget::InPage => {
                        log.push(InteractionAction::new(page_url, ActionKind::SkipAnchor).with_href(raw));
                    }
                    LinkTarget::SameSite(target) if self.follow_subpages => {
                        if frontier.enqueue(&target) {
                            summary.queued += 1;
                        }
                        log.push(
                            InteractionAction::new(page_url, ActionKind::QueueSubpage).with_href(&target),
                        );
                    }
                    LinkTarget::SameSite(target) | LinkTarget::External(target) => {
                        log.push(
                            InteractionAction::new(page_url, ActionKind::SkipExternal).with_href(&target),
                        );
                    }
                },
                None => {
                    if candidate.selector.is_empty() {
                        continue;
                    }
                    let action =
                        InteractionAction::new(page_url, ActionKind::Click).with_selector(&candidate.selector);
                    match driver.element_exists(&candidate.selector).await {
                        Ok(true) => {}
                        Ok(false) => continue,
                        Err(e) => {
                            summary.failures += 1;
                            log.push(action.with_error(e));
                            continue;
                        }
                    }
                    match driver.click(&candidate.selector, self.click_timeout).await {
                        Ok(()) => {
                            tokio::time::sleep(self.settle).await;
                            clicks += 1;
                            log.push(action);
                        }
                        Err(e) => {
                            summary.failures += 1;
                            log.push(action.with_error(e));
                        }
                    }
                }
            }
        }

        summary.clicks += clicks;
        summary
    }

    /// Candidates reported by the page; empty when discovery fails.
    async fn discover<D: PageDriver>(&self, driver: &D) -> Vec<Candidate> {
        match driver.evaluate(&self.discovery_script).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                log::warn!("Unexpected discovery result: {e}");
                Vec::new()
            }),
            Err(e) => {
                log::warn!("Candidate discovery failed: {e}");
                Vec::new()
            }
        }
    }
}
