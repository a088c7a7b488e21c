//! Pattern matching over normalized page content.

use crate::types::SearchTerm;

/// Determine which candidate terms are newly present in the normalized page
/// content.
///
/// A term is newly found iff its normalized form is a non-empty substring of
/// the content and `already_found` reports it untracked. The predicate must
/// reflect ledger state at call time; the result is only a candidate set —
/// the ledger's atomic commit remains the deciding step, so concurrent
/// invocations for the same target cannot double-trigger.
pub fn find_new_terms<F>(
    normalized_content: &str,
    candidates: &[SearchTerm],
    already_found: F,
) -> Vec<SearchTerm>
where
    F: Fn(&SearchTerm) -> bool,
{
    candidates
        .iter()
        .filter(|term| !already_found(term))
        .filter(|term| {
            let normalized = term.normalized();
            !normalized.is_empty() && normalized_content.contains(normalized)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::normalize;

    fn terms(raws: &[&str]) -> Vec<SearchTerm> {
        raws.iter().map(|raw| SearchTerm::new(*raw)).collect()
    }

    #[test]
    fn finds_present_terms() {
        let content = normalize("Buy the DJI Mini 5 Pro now!");
        let found = find_new_terms(&content, &terms(&["DJI Mini 5 Pro", "Mavic 4"]), |_| false);
        assert_eq!(found, terms(&["DJI Mini 5 Pro"]));
    }

    #[test]
    fn matching_is_punctuation_and_case_insensitive() {
        let content = normalize("NEW: dji_mini-5-PRO (in stock)");
        let found = find_new_terms(&content, &terms(&["DJI Mini 5 Pro"]), |_| false);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn skips_already_found_terms() {
        let content = normalize("DJI Mini 5 Pro and Mavic 4 both here");
        let candidates = terms(&["DJI Mini 5 Pro", "Mavic 4"]);
        let found = find_new_terms(&content, &candidates, |t| t.raw() == "DJI Mini 5 Pro");
        assert_eq!(found, terms(&["Mavic 4"]));
    }

    #[test]
    fn symbol_only_term_never_matches() {
        // "!!!" normalizes to the empty string; empty substrings match
        // everything, so they are rejected outright.
        let content = normalize("anything at all");
        let found = find_new_terms(&content, &terms(&["!!!"]), |_| false);
        assert!(found.is_empty());
    }

    #[test]
    fn absent_terms_are_not_found() {
        let content = normalize("nothing interesting here");
        let found = find_new_terms(&content, &terms(&["DJI Mini 5 Pro"]), |_| false);
        assert!(found.is_empty());
    }
}
