//! Breadth-first queue of pages to capture.
//!
//! URLs are deduplicated on their normalized form. When domain scoping is on,
//! only URLs sharing the start URL's registered domain are accepted. The
//! frontier stops handing out URLs once `max_pages` have been taken.

use std::collections::{HashSet, VecDeque};

use crate::utils::{normalize_url, registered_domain};

#[derive(Debug)]
pub struct CrawlFrontier {
    queue: VecDeque<String>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    pages_done: usize,
    max_pages: usize,
    /// Registered domain of the start URL, when scoping is enabled
    scope: Option<String>,
}

impl CrawlFrontier {
    /// Frontier seeded with `start_url`.
    #[must_use]
    pub fn new(start_url: &str, max_pages: usize, same_domain_only: bool) -> Self {
        let start = normalize_url(start_url);
        let scope = if same_domain_only {
            registered_domain(&start)
        } else {
            None
        };
        let mut frontier = Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            pages_done: 0,
            max_pages,
            scope,
        };
        frontier.enqueue(&start);
        frontier
    }

    /// Whether `url` passes domain scoping
    #[must_use]
    pub fn in_scope(&self, url: &str) -> bool {
        match &self.scope {
            None => true,
            Some(domain) => registered_domain(url).as_deref() == Some(domain.as_str()),
        }
    }

    /// Queue `url` unless it was already queued or visited, or is out of
    /// scope. Returns whether the URL was added.
    pub fn enqueue(&mut self, url: &str) -> bool {
        let url = normalize_url(url);
        if url.is_empty() || self.visited.contains(&url) || self.queued.contains(&url) {
            return false;
        }
        if !self.in_scope(&url) {
            log::debug!("Rejecting out-of-scope URL: {url}");
            return false;
        }
        self.queued.insert(url.clone());
        self.queue.push_back(url);
        true
    }

    /// Next URL to capture, or `None` once the queue is empty or the page cap
    /// has been reached. Whatever remains queued past the cap is discarded
    /// with the frontier.
    pub fn dequeue(&mut self) -> Option<String> {
        if self.is_capped() {
            return None;
        }
        while let Some(url) = self.queue.pop_front() {
            self.queued.remove(&url);
            if !self.visited.contains(&url) {
                return Some(url);
            }
        }
        None
    }

    /// Record that `url` is about to be processed.
    ///
    /// Returns the 1-based page number, or `None` if it was already visited.
    pub fn mark_visited(&mut self, url: &str) -> Option<usize> {
        if !self.visited.insert(normalize_url(url)) {
            return None;
        }
        self.pages_done += 1;
        Some(self.pages_done)
    }

    #[must_use]
    pub fn pages_done(&self) -> usize {
        self.pages_done
    }

    #[must_use]
    pub fn is_capped(&self) -> bool {
        self.pages_done >= self.max_pages
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
