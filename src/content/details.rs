//! Best-effort detail extraction for discovered terms.
//!
//! Three independent strategies per term: the first matching anchor, the
//! first matching heading, and the first product-like container. Each may
//! contribute one record; any of them failing just omits that record and
//! never fails the check.

use scraper::{ElementRef, Html, Selector};

use crate::content::normalize;
use crate::types::{DetailKind, ProductInfo, SearchTerm, Target};
use crate::util::truncate_str;

/// Display-text cap for product container records.
pub const PRODUCT_TEXT_LIMIT: usize = 200;

/// Currency markers recognized when sniffing for a price-like text node.
const PRICE_MARKERS: [char; 4] = ['₪', '$', '€', '£'];

/// Locates representative occurrences of matched terms on a page.
pub struct DetailExtractor {
    anchors: Option<Selector>,
    headings: Option<Selector>,
    containers: Option<Selector>,
}

impl DetailExtractor {
    pub fn new() -> Self {
        Self {
            anchors: Selector::parse("a").ok(),
            headings: Selector::parse("h1, h2, h3, h4").ok(),
            containers: Selector::parse("div, article, section").ok(),
        }
    }

    /// Produce up to three records per newly found term.
    pub fn extract(
        &self,
        document: &Html,
        terms: &[SearchTerm],
        target: &Target,
    ) -> Vec<ProductInfo> {
        let mut details = Vec::new();

        for term in terms {
            if let Some(info) = self.find_link(document, term, target) {
                details.push(info);
            }
            if let Some(info) = self.find_heading(document, term, target) {
                details.push(info);
            }
            if let Some(info) = self.find_product_container(document, term, target) {
                details.push(info);
            }
        }

        details
    }

    /// First anchor whose text contains the term; href resolved against the
    /// page URL.
    fn find_link(&self, document: &Html, term: &SearchTerm, target: &Target) -> Option<ProductInfo> {
        let anchors = self.anchors.as_ref()?;

        for anchor in document.select(anchors) {
            let text = element_text(&anchor);
            if !contains_term(&text, term) {
                continue;
            }
            let url = anchor
                .value()
                .attr("href")
                .and_then(|href| target.url().join(href).ok());
            return Some(ProductInfo {
                kind: DetailKind::Link,
                text: text.trim().to_string(),
                url,
                price: None,
                term: term.clone(),
                target: target.clone(),
            });
        }

        None
    }

    /// First h1–h4 whose text contains the term; records the heading tag.
    fn find_heading(
        &self,
        document: &Html,
        term: &SearchTerm,
        target: &Target,
    ) -> Option<ProductInfo> {
        let headings = self.headings.as_ref()?;

        for heading in document.select(headings) {
            let text = element_text(&heading);
            if !contains_term(&text, term) {
                continue;
            }
            return Some(ProductInfo {
                kind: DetailKind::Heading {
                    level: heading.value().name().to_string(),
                },
                text: text.trim().to_string(),
                url: None,
                price: None,
                term: term.clone(),
                target: target.clone(),
            });
        }

        None
    }

    /// First div/article/section whose class mentions "product" and whose
    /// normalized text contains the term. Sniffs for a price-like text node
    /// and the first descendant anchor.
    fn find_product_container(
        &self,
        document: &Html,
        term: &SearchTerm,
        target: &Target,
    ) -> Option<ProductInfo> {
        let containers = self.containers.as_ref()?;

        for container in document.select(containers) {
            let is_product = container
                .value()
                .attr("class")
                .is_some_and(|c| c.to_ascii_lowercase().contains("product"));
            if !is_product {
                continue;
            }

            let text = element_text(&container);
            if !normalize(&text).contains(term.normalized()) {
                continue;
            }

            let price = container
                .text()
                .find(|t| {
                    t.chars().any(|c| PRICE_MARKERS.contains(&c))
                        && t.chars().any(|c| c.is_ascii_digit())
                })
                .map(|t| t.trim().to_string());

            let url = self.anchors.as_ref().and_then(|anchors| {
                container
                    .select(anchors)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| target.url().join(href).ok())
            });

            return Some(ProductInfo {
                kind: DetailKind::ProductContainer,
                text: truncate_str(text.trim(), PRODUCT_TEXT_LIMIT),
                url,
                price,
                term: term.clone(),
                target: target.clone(),
            });
        }

        None
    }
}

impl Default for DetailExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Concatenated text content of an element's subtree.
fn element_text(el: &ElementRef) -> String {
    el.text().collect()
}

/// Raw case-insensitive or normalized containment check.
fn contains_term(text: &str, term: &SearchTerm) -> bool {
    let normalized_term = term.normalized();
    text.to_lowercase().contains(&term.raw().to_lowercase())
        || (!normalized_term.is_empty() && normalize(text).contains(normalized_term))
}
