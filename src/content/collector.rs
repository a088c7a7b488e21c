//! Searchable content collection from a parsed page.
//!
//! Pages hide product names in many places besides the visible text: meta
//! tags, image alt text, link targets, data attributes, form placeholders.
//! The collector flattens all of them into one list of candidate strings.

use scraper::{Html, Selector};

/// Attribute sources scanned in addition to the page text: CSS selector plus
/// the attributes to read from each matching element.
const ATTRIBUTE_SOURCES: &[(&str, &[&str])] = &[
    (
        "meta[name=\"description\"], meta[name=\"keywords\"]",
        &["content"],
    ),
    ("img", &["alt", "title"]),
    ("a", &["title", "href"]),
    ("[data-product-name]", &["data-product-name"]),
    ("[data-title]", &["data-title"]),
    ("input, textarea", &["placeholder", "value"]),
];

/// Collects every searchable string from a parsed page.
pub struct ContentCollector {
    title: Option<Selector>,
    attribute_sources: Vec<(Selector, &'static [&'static str])>,
}

impl ContentCollector {
    pub fn new() -> Self {
        let attribute_sources = ATTRIBUTE_SOURCES
            .iter()
            .filter_map(|(css, attrs)| Selector::parse(css).ok().map(|s| (s, *attrs)))
            .collect();

        Self {
            title: Selector::parse("title").ok(),
            attribute_sources,
        }
    }

    /// Gather all candidate searchable strings from the document.
    ///
    /// The result is unordered and may contain duplicates; deduplication
    /// happens implicitly when the caller matches against the normalized
    /// concatenation.
    pub fn collect(&self, document: &Html) -> Vec<String> {
        let mut out = Vec::new();

        // Full text of the document, scripts and all.
        let page_text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
        tracing::debug!(chars = page_text.len(), "collected page text");
        out.push(page_text);

        if let Some(title) = &self.title {
            if let Some(el) = document.select(title).next() {
                out.push(el.text().collect());
            }
        }

        for (selector, attrs) in &self.attribute_sources {
            for el in document.select(selector) {
                for attr in *attrs {
                    if let Some(value) = el.value().attr(attr) {
                        if !value.trim().is_empty() {
                            out.push(value.to_string());
                        }
                    }
                }
            }
        }

        out
    }
}

impl Default for ContentCollector {
    fn default() -> Self {
        Self::new()
    }
}
