//! Core domain types shared across the monitor.

use std::fmt;
use std::hash::{Hash, Hasher};

use url::Url;

use crate::content::normalize;

/// One monitored URL, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(Url);

impl Target {
    pub fn new(url: Url) -> Self {
        Self(url)
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// One configured text pattern, with its normalized form computed once.
///
/// Identity is the raw text; the normalized form is derived and cached so
/// matching never re-normalizes the same term per page.
#[derive(Debug, Clone)]
pub struct SearchTerm {
    raw: String,
    normalized: String,
}

impl SearchTerm {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        Self { raw, normalized }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl PartialEq for SearchTerm {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for SearchTerm {}

impl Hash for SearchTerm {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Where on the page a detail record was located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailKind {
    Link,
    Heading { level: String },
    ProductContainer,
}

impl fmt::Display for DetailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailKind::Link => f.write_str("link"),
            DetailKind::Heading { level } => write!(f, "heading ({})", level),
            DetailKind::ProductContainer => f.write_str("product container"),
        }
    }
}

/// Best-effort enrichment for one discovery, consumed by the notification
/// formatter and not retained afterwards.
#[derive(Debug, Clone)]
pub struct ProductInfo {
    pub kind: DetailKind,
    pub text: String,
    pub url: Option<Url>,
    pub price: Option<String>,
    pub term: SearchTerm,
    pub target: Target,
}

/// A term newly present on a target, with whatever details could be located.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub target: Target,
    pub term: SearchTerm,
    pub details: Vec<ProductInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_term_caches_normalized_form() {
        let term = SearchTerm::new("DJI Mini-5 Pro!");
        assert_eq!(term.raw(), "DJI Mini-5 Pro!");
        assert_eq!(term.normalized(), "dji mini 5 pro");
    }

    #[test]
    fn search_term_identity_is_raw_text() {
        // Different raw text, same normalized form: still distinct terms.
        let a = SearchTerm::new("DJI Mini 5 Pro");
        let b = SearchTerm::new("dji mini 5 pro");
        assert_ne!(a, b);
        assert_eq!(a.normalized(), b.normalized());
    }

    #[test]
    fn detail_kind_display() {
        assert_eq!(DetailKind::Link.to_string(), "link");
        assert_eq!(
            DetailKind::Heading { level: "h2".to_string() }.to_string(),
            "heading (h2)"
        );
        assert_eq!(DetailKind::ProductContainer.to_string(), "product container");
    }
}
