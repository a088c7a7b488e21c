//! Discovery ledger: the authoritative record of per-(target, term) state.
//!
//! One entry per (target, term) pair, fixed at construction. State only
//! moves forward (NotFound → Found → Notified); the single exception is the
//! notify claim, which is released when a dispatch fails so a later cycle
//! can retry. Every operation runs under one mutex, so a commit observed by
//! one task is observed by all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::types::{SearchTerm, Target};

/// Per-pair progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiscoveryState {
    NotFound,
    Found,
    Notified,
}

#[derive(Debug, Clone)]
struct DiscoveryEntry {
    state: DiscoveryState,
    /// Set on the NotFound → Found transition, never cleared.
    found_at: Option<DateTime<Utc>>,
    /// A dispatch attempt is in flight for this entry.
    notify_claimed: bool,
}

impl DiscoveryEntry {
    fn new() -> Self {
        Self {
            state: DiscoveryState::NotFound,
            found_at: None,
            notify_claimed: false,
        }
    }
}

/// Point-in-time view of one entry, for summaries and tests.
#[derive(Debug, Clone)]
pub struct DiscoveryRecord {
    pub target: Target,
    pub term: SearchTerm,
    pub state: DiscoveryState,
    pub found_at: Option<DateTime<Utc>>,
}

/// Concurrency-safe discovery/notification state for the whole run.
pub struct DiscoveryLedger {
    entries: Mutex<HashMap<(Target, SearchTerm), DiscoveryEntry>>,
    targets: Vec<Target>,
    terms: Vec<SearchTerm>,
}

impl DiscoveryLedger {
    /// Build the full (targets × terms) matrix, every pair NotFound.
    pub fn new(targets: Vec<Target>, terms: Vec<SearchTerm>) -> Self {
        let mut entries = HashMap::with_capacity(targets.len() * terms.len());
        for target in &targets {
            for term in &terms {
                entries.insert((target.clone(), term.clone()), DiscoveryEntry::new());
            }
        }

        Self {
            entries: Mutex::new(entries),
            targets,
            terms,
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    /// True iff the pair is Found or Notified.
    pub fn is_found(&self, target: &Target, term: &SearchTerm) -> bool {
        self.entries
            .lock()
            .get(&(target.clone(), term.clone()))
            .is_some_and(|e| e.state != DiscoveryState::NotFound)
    }

    /// Transition NotFound → Found. Returns whether the transition occurred;
    /// idempotent, and the first timestamp wins.
    pub fn commit_found(&self, target: &Target, term: &SearchTerm, at: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(&(target.clone(), term.clone())) {
            Some(entry) if entry.state == DiscoveryState::NotFound => {
                entry.state = DiscoveryState::Found;
                entry.found_at = Some(at);
                true
            }
            _ => false,
        }
    }

    /// Claim the pending dispatch for a Found entry. At most one claim can be
    /// outstanding per pair, so a discovery never gets two concurrent
    /// dispatch attempts.
    pub fn begin_notification(&self, target: &Target, term: &SearchTerm) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(&(target.clone(), term.clone())) {
            Some(entry) if entry.state == DiscoveryState::Found && !entry.notify_claimed => {
                entry.notify_claimed = true;
                true
            }
            _ => false,
        }
    }

    /// Transition Found → Notified after a successful dispatch.
    pub fn mark_notified(&self, target: &Target, term: &SearchTerm) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(&(target.clone(), term.clone())) {
            Some(entry) if entry.state == DiscoveryState::Found => {
                entry.state = DiscoveryState::Notified;
                entry.notify_claimed = false;
                true
            }
            _ => false,
        }
    }

    /// Dispatch failed: the entry stays Found and the claim is released so a
    /// later cycle retries.
    pub fn reset_pending_notification(&self, target: &Target, term: &SearchTerm) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(&(target.clone(), term.clone())) {
            if entry.state == DiscoveryState::Found {
                entry.notify_claimed = false;
            }
        }
    }

    /// Terms not yet found for a target: the matcher's candidate set.
    pub fn pending_terms(&self, target: &Target) -> Vec<SearchTerm> {
        let entries = self.entries.lock();
        self.terms
            .iter()
            .filter(|term| {
                entries
                    .get(&(target.clone(), (*term).clone()))
                    .is_some_and(|e| e.state == DiscoveryState::NotFound)
            })
            .cloned()
            .collect()
    }

    /// Pairs whose discovery notification still needs a (re)dispatch.
    pub fn awaiting_notification(&self) -> Vec<(Target, SearchTerm)> {
        let entries = self.entries.lock();
        self.pairs()
            .filter(|pair| {
                entries
                    .get(pair)
                    .is_some_and(|e| e.state == DiscoveryState::Found && !e.notify_claimed)
            })
            .collect()
    }

    /// (found-or-notified, total). Total is fixed at |targets| × |terms|.
    pub fn completion_counts(&self) -> (usize, usize) {
        let entries = self.entries.lock();
        let found = entries
            .values()
            .filter(|e| e.state != DiscoveryState::NotFound)
            .count();
        (found, self.targets.len() * self.terms.len())
    }

    /// True once every pair has been found.
    pub fn is_complete(&self) -> bool {
        let (found, total) = self.completion_counts();
        found == total
    }

    /// Current state of a single pair, if it exists.
    pub fn state_of(&self, target: &Target, term: &SearchTerm) -> Option<DiscoveryState> {
        self.entries
            .lock()
            .get(&(target.clone(), term.clone()))
            .map(|e| e.state)
    }

    /// Ordered view of every entry (target-major), for the final summary.
    pub fn snapshot(&self) -> Vec<DiscoveryRecord> {
        let entries = self.entries.lock();
        self.pairs()
            .filter_map(|(target, term)| {
                entries.get(&(target.clone(), term.clone())).map(|e| DiscoveryRecord {
                    target,
                    term,
                    state: e.state,
                    found_at: e.found_at,
                })
            })
            .collect()
    }

    fn pairs(&self) -> impl Iterator<Item = (Target, SearchTerm)> + '_ {
        self.targets.iter().flat_map(move |target| {
            self.terms
                .iter()
                .map(move |term| (target.clone(), term.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn target(s: &str) -> Target {
        Target::new(Url::parse(s).unwrap())
    }

    fn ledger_1x1() -> (DiscoveryLedger, Target, SearchTerm) {
        let t = target("https://example.com/");
        let s = SearchTerm::new("DJI Mini 5 Pro");
        (DiscoveryLedger::new(vec![t.clone()], vec![s.clone()]), t, s)
    }

    #[test]
    fn starts_with_full_matrix_not_found() {
        let targets = vec![target("https://a.example/"), target("https://b.example/")];
        let terms = vec![SearchTerm::new("one"), SearchTerm::new("two"), SearchTerm::new("three")];
        let ledger = DiscoveryLedger::new(targets.clone(), terms.clone());

        assert_eq!(ledger.completion_counts(), (0, 6));
        for t in &targets {
            assert_eq!(ledger.pending_terms(t), terms);
            for s in &terms {
                assert_eq!(ledger.state_of(t, s), Some(DiscoveryState::NotFound));
                assert!(!ledger.is_found(t, s));
            }
        }
    }

    #[test]
    fn commit_transitions_exactly_once() {
        let (ledger, t, s) = ledger_1x1();
        let first = Utc::now();

        assert!(ledger.commit_found(&t, &s, first));
        assert!(ledger.is_found(&t, &s));
        assert_eq!(ledger.state_of(&t, &s), Some(DiscoveryState::Found));

        // Second commit is a no-op and keeps the first timestamp.
        let later = first + chrono::Duration::seconds(90);
        assert!(!ledger.commit_found(&t, &s, later));
        assert_eq!(ledger.snapshot()[0].found_at, Some(first));
    }

    #[test]
    fn states_are_monotonic() {
        let (ledger, t, s) = ledger_1x1();

        let mut observed = vec![ledger.state_of(&t, &s).unwrap()];
        ledger.commit_found(&t, &s, Utc::now());
        observed.push(ledger.state_of(&t, &s).unwrap());
        ledger.begin_notification(&t, &s);
        ledger.reset_pending_notification(&t, &s);
        observed.push(ledger.state_of(&t, &s).unwrap());
        ledger.mark_notified(&t, &s);
        observed.push(ledger.state_of(&t, &s).unwrap());

        assert!(observed.windows(2).all(|w| w[0] <= w[1]), "{observed:?}");
        assert_eq!(observed.last(), Some(&DiscoveryState::Notified));
    }

    #[test]
    fn mark_notified_requires_found() {
        let (ledger, t, s) = ledger_1x1();
        assert!(!ledger.mark_notified(&t, &s));

        ledger.commit_found(&t, &s, Utc::now());
        assert!(ledger.mark_notified(&t, &s));
        // Already Notified: no second transition.
        assert!(!ledger.mark_notified(&t, &s));
    }

    #[test]
    fn notify_claim_is_exclusive_until_reset() {
        let (ledger, t, s) = ledger_1x1();
        ledger.commit_found(&t, &s, Utc::now());

        assert!(ledger.begin_notification(&t, &s));
        assert!(!ledger.begin_notification(&t, &s));

        ledger.reset_pending_notification(&t, &s);
        assert!(ledger.begin_notification(&t, &s));
    }

    #[test]
    fn claim_is_impossible_before_commit_and_after_notify() {
        let (ledger, t, s) = ledger_1x1();
        assert!(!ledger.begin_notification(&t, &s));

        ledger.commit_found(&t, &s, Utc::now());
        ledger.mark_notified(&t, &s);
        assert!(!ledger.begin_notification(&t, &s));
    }

    #[test]
    fn awaiting_notification_tracks_unclaimed_found_entries() {
        let targets = vec![target("https://a.example/")];
        let terms = vec![SearchTerm::new("one"), SearchTerm::new("two")];
        let ledger = DiscoveryLedger::new(targets.clone(), terms.clone());

        assert!(ledger.awaiting_notification().is_empty());

        ledger.commit_found(&targets[0], &terms[0], Utc::now());
        ledger.commit_found(&targets[0], &terms[1], Utc::now());
        assert_eq!(ledger.awaiting_notification().len(), 2);

        // A claimed entry is no longer awaiting.
        assert!(ledger.begin_notification(&targets[0], &terms[0]));
        assert_eq!(ledger.awaiting_notification().len(), 1);

        // A failed dispatch puts it back; a successful one removes it.
        ledger.reset_pending_notification(&targets[0], &terms[0]);
        assert_eq!(ledger.awaiting_notification().len(), 2);
        ledger.mark_notified(&targets[0], &terms[1]);
        assert_eq!(ledger.awaiting_notification().len(), 1);
    }

    #[test]
    fn pending_terms_shrinks_as_terms_are_found() {
        let t = target("https://a.example/");
        let terms = vec![SearchTerm::new("one"), SearchTerm::new("two")];
        let ledger = DiscoveryLedger::new(vec![t.clone()], terms.clone());

        ledger.commit_found(&t, &terms[0], Utc::now());
        assert_eq!(ledger.pending_terms(&t), vec![terms[1].clone()]);
    }

    #[test]
    fn completion_counts_only_increase() {
        let targets = vec![target("https://a.example/"), target("https://b.example/")];
        let terms = vec![SearchTerm::new("one"), SearchTerm::new("two")];
        let ledger = DiscoveryLedger::new(targets.clone(), terms.clone());

        assert_eq!(ledger.completion_counts(), (0, 4));
        ledger.commit_found(&targets[0], &terms[0], Utc::now());
        assert_eq!(ledger.completion_counts(), (1, 4));
        assert!(!ledger.is_complete());

        // Notifying does not change the found-or-notified count.
        ledger.mark_notified(&targets[0], &terms[0]);
        assert_eq!(ledger.completion_counts(), (1, 4));

        for t in &targets {
            for s in &terms {
                ledger.commit_found(t, s, Utc::now());
            }
        }
        assert_eq!(ledger.completion_counts(), (4, 4));
        assert!(ledger.is_complete());
    }

    #[test]
    fn unknown_pairs_are_no_ops() {
        let (ledger, t, _) = ledger_1x1();
        let stranger = SearchTerm::new("never configured");

        assert!(!ledger.commit_found(&t, &stranger, Utc::now()));
        assert!(!ledger.is_found(&t, &stranger));
        assert!(ledger.state_of(&t, &stranger).is_none());
        assert_eq!(ledger.completion_counts(), (0, 1));
    }

    #[test]
    fn snapshot_is_target_major_and_complete() {
        let targets = vec![target("https://a.example/"), target("https://b.example/")];
        let terms = vec![SearchTerm::new("one"), SearchTerm::new("two")];
        let ledger = DiscoveryLedger::new(targets.clone(), terms.clone());

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[0].target, targets[0]);
        assert_eq!(snapshot[0].term, terms[0]);
        assert_eq!(snapshot[1].target, targets[0]);
        assert_eq!(snapshot[1].term, terms[1]);
        assert_eq!(snapshot[2].target, targets[1]);
    }
}
