//! Check coordinator orchestrating one cycle: fan-out, match, commit, notify
//!
//! Per cycle the coordinator fans out one task per target under a bounded
//! semaphore. Tasks are side-effect free: they fetch, parse, and compute
//! candidate discoveries. All ledger mutation happens serially as task
//! results arrive, and each commit that actually transitions a pair gates
//! exactly one notification dispatch. One target's failure never affects
//! another's processing.

mod types;

pub use types::*;

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use scraper::Html;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::content::{matcher, normalize, ContentCollector, DetailExtractor};
use crate::fetch::PageSource;
use crate::ledger::DiscoveryLedger;
use crate::notify::{self, NotificationSink};
use crate::types::{Discovery, ProductInfo, SearchTerm, Target};

/// Coordinates fetching, matching, and ledger commits for all targets.
pub struct CheckCoordinator {
    config: CheckConfig,
    source: Arc<dyn PageSource>,
    sink: Arc<dyn NotificationSink>,
    collector: Arc<ContentCollector>,
    extractor: Arc<DetailExtractor>,
    ledger: Arc<DiscoveryLedger>,
    stats: Mutex<CheckStats>,
}

impl CheckCoordinator {
    pub fn new(
        config: CheckConfig,
        source: Arc<dyn PageSource>,
        sink: Arc<dyn NotificationSink>,
        targets: Vec<Target>,
        terms: Vec<SearchTerm>,
    ) -> Self {
        Self {
            config,
            source,
            sink,
            collector: Arc::new(ContentCollector::new()),
            extractor: Arc::new(DetailExtractor::new()),
            ledger: Arc::new(DiscoveryLedger::new(targets, terms)),
            stats: Mutex::new(CheckStats::default()),
        }
    }

    pub fn ledger(&self) -> &DiscoveryLedger {
        &self.ledger
    }

    pub fn stats(&self) -> CheckStats {
        self.stats.lock().clone()
    }

    /// Run one full check cycle. Returns whether any new discovery was
    /// committed.
    pub async fn run_cycle(&self) -> anyhow::Result<bool> {
        tracing::info!("starting check cycle");

        // Discoveries whose dispatch failed in an earlier cycle get retried
        // before any new work.
        self.retry_pending_notifications().await;

        let max_concurrent = self
            .config
            .max_concurrent_fetches
            .min(self.ledger.targets().len())
            .max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let mut tasks: JoinSet<TargetReport> = JoinSet::new();

        for target in self.ledger.targets().to_vec() {
            if self.ledger.pending_terms(&target).is_empty() {
                tracing::debug!(url = %target, "all terms already found, skipping");
                continue;
            }

            let source = Arc::clone(&self.source);
            let collector = Arc::clone(&self.collector);
            let extractor = Arc::clone(&self.extractor);
            let ledger = Arc::clone(&self.ledger);
            let terms = self.ledger.terms().to_vec();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return TargetReport::failure(target, "semaphore closed"),
                };
                check_target(source, collector, extractor, ledger, target, terms).await
            });
        }

        let mut any_new = false;
        while let Some(joined) = tasks.join_next().await {
            let report = match joined {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(error = %e, "check task failed to complete");
                    continue;
                }
            };

            self.stats.lock().targets_checked += 1;

            if let Some(error) = &report.error {
                tracing::warn!(url = %report.target, error = %error, "target check failed");
                self.stats.lock().failed_targets += 1;
                continue;
            }

            for discovery in report.discoveries {
                if self.commit_and_notify(discovery).await {
                    any_new = true;
                }
            }
        }

        self.stats.lock().cycles_completed += 1;
        Ok(any_new)
    }

    /// Commit one candidate discovery; dispatch its notification iff the
    /// commit actually transitioned the pair.
    async fn commit_and_notify(&self, discovery: Discovery) -> bool {
        if !self
            .ledger
            .commit_found(&discovery.target, &discovery.term, Utc::now())
        {
            // A racing task already committed this pair.
            return false;
        }

        tracing::info!(url = %discovery.target, term = %discovery.term, "discovery committed");
        self.stats.lock().discoveries += 1;

        self.dispatch(&discovery.target, &discovery.term, discovery.details.first())
            .await;
        true
    }

    /// Claim, dispatch, and record the outcome of one notification.
    async fn dispatch(&self, target: &Target, term: &SearchTerm, detail: Option<&ProductInfo>) {
        if !self.ledger.begin_notification(target, term) {
            return;
        }

        let (title, body) = notify::discovery_message(target, term, detail);
        match self.sink.send(&title, &body).await {
            Ok(()) => {
                self.ledger.mark_notified(target, term);
                self.stats.lock().notifications_sent += 1;
            }
            Err(e) => {
                tracing::error!(
                    url = %target,
                    term = %term,
                    error = %e,
                    "notification dispatch failed, will retry next cycle"
                );
                self.ledger.reset_pending_notification(target, term);
                self.stats.lock().notification_failures += 1;
            }
        }
    }

    async fn retry_pending_notifications(&self) {
        for (target, term) in self.ledger.awaiting_notification() {
            tracing::info!(url = %target, term = %term, "retrying pending notification");
            self.dispatch(&target, &term, None).await;
        }
    }
}

/// Fetch one target and compute candidate discoveries. No ledger mutation
/// happens here; the ledger is only consulted for the already-found set.
async fn check_target(
    source: Arc<dyn PageSource>,
    collector: Arc<ContentCollector>,
    extractor: Arc<DetailExtractor>,
    ledger: Arc<DiscoveryLedger>,
    target: Target,
    terms: Vec<SearchTerm>,
) -> TargetReport {
    tracing::info!(url = %target, "checking target");

    let body = match source.fetch(target.url()).await {
        Ok(body) => body,
        Err(e) => return TargetReport::failure(target, format!("fetch failed: {e}")),
    };

    // HTML parsing and matching are CPU-bound; keep them off the runtime
    // worker threads.
    let scan_target = target.clone();
    let scanned = tokio::task::spawn_blocking(move || {
        scan_page(&body, &scan_target, &terms, &ledger, &collector, &extractor)
    })
    .await;

    match scanned {
        Ok(discoveries) => TargetReport {
            target,
            discoveries,
            error: None,
        },
        Err(e) => TargetReport::failure(target, format!("scan failed: {e}")),
    }
}

/// Parse a page and compute which terms are newly present, with details.
fn scan_page(
    body: &str,
    target: &Target,
    terms: &[SearchTerm],
    ledger: &DiscoveryLedger,
    collector: &ContentCollector,
    extractor: &DetailExtractor,
) -> Vec<Discovery> {
    let document = Html::parse_document(body);

    let collected = collector.collect(&document);
    let normalized = normalize(&collected.join(" "));
    tracing::debug!(url = %target, chars = normalized.len(), "scanning normalized content");

    let newly_found =
        matcher::find_new_terms(&normalized, terms, |term| ledger.is_found(target, term));
    if newly_found.is_empty() {
        tracing::debug!(url = %target, "no new terms on page");
        return Vec::new();
    }

    let details = extractor.extract(&document, &newly_found, target);

    newly_found
        .into_iter()
        .map(|term| {
            let term_details: Vec<ProductInfo> = details
                .iter()
                .filter(|d| d.term == term)
                .cloned()
                .collect();
            Discovery {
                target: target.clone(),
                term,
                details: term_details,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::ledger::DiscoveryState;
    use crate::notify::NotifyError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// Page source serving fixed bodies per URL; unknown URLs fail.
    struct FixedPages {
        pages: HashMap<String, String>,
    }

    impl FixedPages {
        fn new(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(u, b)| (u.to_string(), b.to_string()))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl PageSource for FixedPages {
        async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
            self.pages.get(url.as_str()).cloned().ok_or_else(|| {
                FetchError::RetriesExhausted {
                    attempts: 3,
                    last: "connection refused".to_string(),
                }
            })
        }
    }

    /// Sink recording every dispatch; the first `fail_first` sends fail.
    struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
        attempts: AtomicUsize,
        fail_first: usize,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Self::failing(0)
        }

        fn failing(fail_first: usize) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                attempts: AtomicUsize::new(0),
                fail_first,
            })
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().clone()
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                return Err(NotifyError::Status(500));
            }
            self.sent.lock().push((title.to_string(), message.to_string()));
            Ok(())
        }
    }

    fn target(s: &str) -> Target {
        Target::new(Url::parse(s).unwrap())
    }

    fn coordinator(
        source: Arc<dyn PageSource>,
        sink: Arc<dyn NotificationSink>,
        targets: Vec<Target>,
        terms: Vec<SearchTerm>,
    ) -> CheckCoordinator {
        CheckCoordinator::new(CheckConfig::default(), source, sink, targets, terms)
    }

    #[tokio::test]
    async fn discovery_commits_and_notifies_once() {
        let source = FixedPages::new(&[(
            "https://a.example/",
            r#"<body><a href="/p/1">Buy the DJI Mini 5 Pro now!</a></body>"#,
        )]);
        let sink = RecordingSink::new();
        let coordinator = coordinator(
            source,
            sink.clone(),
            vec![target("https://a.example/")],
            vec![SearchTerm::new("DJI Mini 5 Pro")],
        );

        let found = coordinator.run_cycle().await.unwrap();
        assert!(found);

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "Found: DJI Mini 5 Pro");
        assert!(sent[0].1.contains("Type: link"));
        assert!(sent[0].1.contains("Link: https://a.example/p/1"));

        let t = target("https://a.example/");
        let s = SearchTerm::new("DJI Mini 5 Pro");
        assert_eq!(coordinator.ledger().state_of(&t, &s), Some(DiscoveryState::Notified));

        // A second cycle over the same page changes nothing.
        let found_again = coordinator.run_cycle().await.unwrap();
        assert!(!found_again);
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_target_does_not_affect_siblings() {
        let source = FixedPages::new(&[(
            "https://ok.example/",
            r#"<body><p>DJI Mini 5 Pro here</p></body>"#,
        )]);
        let sink = RecordingSink::new();
        let coordinator = coordinator(
            source,
            sink.clone(),
            vec![target("https://down.example/"), target("https://ok.example/")],
            vec![SearchTerm::new("DJI Mini 5 Pro")],
        );

        let found = coordinator.run_cycle().await.unwrap();
        assert!(found);
        assert_eq!(sink.sent().len(), 1);

        let down = target("https://down.example/");
        let s = SearchTerm::new("DJI Mini 5 Pro");
        assert_eq!(
            coordinator.ledger().state_of(&down, &s),
            Some(DiscoveryState::NotFound)
        );

        let stats = coordinator.stats();
        assert_eq!(stats.failed_targets, 1);
        assert_eq!(stats.discoveries, 1);
    }

    #[tokio::test]
    async fn failed_dispatch_is_retried_next_cycle() {
        let source = FixedPages::new(&[(
            "https://a.example/",
            r#"<body><h2>DJI Mini 5 Pro</h2></body>"#,
        )]);
        let sink = RecordingSink::failing(1);
        let coordinator = coordinator(
            source,
            sink.clone(),
            vec![target("https://a.example/")],
            vec![SearchTerm::new("DJI Mini 5 Pro")],
        );

        let t = target("https://a.example/");
        let s = SearchTerm::new("DJI Mini 5 Pro");

        // Cycle 1: discovery commits but the dispatch fails.
        coordinator.run_cycle().await.unwrap();
        assert_eq!(coordinator.ledger().state_of(&t, &s), Some(DiscoveryState::Found));
        assert_eq!(sink.attempts(), 1);
        assert!(sink.sent().is_empty());

        // Cycle 2: the pending notification is retried and succeeds; the
        // term is not rediscovered.
        let found = coordinator.run_cycle().await.unwrap();
        assert!(!found);
        assert_eq!(coordinator.ledger().state_of(&t, &s), Some(DiscoveryState::Notified));
        assert_eq!(sink.attempts(), 2);
        assert_eq!(sink.sent().len(), 1);

        let stats = coordinator.stats();
        assert_eq!(stats.notification_failures, 1);
        assert_eq!(stats.notifications_sent, 1);
    }

    #[tokio::test]
    async fn completed_targets_are_skipped() {
        let source = FixedPages::new(&[(
            "https://a.example/",
            r#"<body><p>DJI Mini 5 Pro</p></body>"#,
        )]);
        let sink = RecordingSink::new();
        let coordinator = coordinator(
            source,
            sink.clone(),
            vec![target("https://a.example/")],
            vec![SearchTerm::new("DJI Mini 5 Pro")],
        );

        coordinator.run_cycle().await.unwrap();
        let checked_after_first = coordinator.stats().targets_checked;

        coordinator.run_cycle().await.unwrap();
        // The completed target was not fetched again.
        assert_eq!(coordinator.stats().targets_checked, checked_after_first);
    }
}
