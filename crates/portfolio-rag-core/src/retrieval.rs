//! Intent-aware retrieval policy: search breadth and project filtering.
//!
//! The application's retriever embeds the query and searches the store;
//! this module decides how many neighbours to ask for and which of them
//! survive for project-listing queries.

use crate::intent::Intent;
use crate::models::Hit;

/// Markers matched against the lower-cased chunk text.
const LOWERCASE_MARKERS: &[&str] = &["project", "data", "web", "application"];

/// Markers matched against the chunk text verbatim.
const VERBATIM_MARKERS: &[&str] = &["- ", "AI", "ETL"];

/// Retrieval breadth knobs, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    /// Neighbours requested for most queries.
    pub default_k: usize,
    /// Neighbours requested for project-listing queries.
    pub list_k: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            default_k: 5,
            list_k: 15,
        }
    }
}

impl RetrievalParams {
    /// Number of neighbours to request for `intent`.
    pub fn k_for(&self, intent: Intent) -> usize {
        match intent {
            Intent::ProjectList => self.list_k,
            _ => self.default_k,
        }
    }
}

/// True when a chunk looks like a project entry.
///
/// `"AI"` and `"ETL"` are case-sensitive, as is the bullet marker `"- "`;
/// the remaining words match in any case.
pub fn looks_like_project(text: &str) -> bool {
    let lower = text.to_lowercase();
    LOWERCASE_MARKERS.iter().any(|m| lower.contains(m))
        || VERBATIM_MARKERS.iter().any(|m| text.contains(m))
}

/// Keep only project-looking hits, unless that would leave nothing.
///
/// Filtering never shrinks a non-empty result to empty: when no hit carries
/// a marker, the unfiltered hits are returned unchanged.
pub fn filter_project_hits(hits: Vec<Hit>) -> Vec<Hit> {
    if !hits.iter().any(|h| looks_like_project(&h.text)) {
        return hits;
    }
    hits.into_iter()
        .filter(|h| looks_like_project(&h.text))
        .collect()
}

/// Apply the intent-specific secondary filter to raw search hits.
pub fn refine(intent: Intent, hits: Vec<Hit>) -> Vec<Hit> {
    match intent {
        Intent::ProjectList => filter_project_hits(hits),
        _ => hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str, distance: f32) -> Hit {
        Hit {
            text: text.to_string(),
            distance,
        }
    }

    #[test]
    fn test_k_for_intent() {
        let params = RetrievalParams::default();
        assert_eq!(params.k_for(Intent::ProjectList), 15);
        assert_eq!(params.k_for(Intent::Generic), 5);
        assert_eq!(params.k_for(Intent::Contact), 5);
        assert_eq!(params.k_for(Intent::Greeting), 5);
    }

    #[test]
    fn test_marker_words() {
        assert!(looks_like_project("Project Alpha - an ETL pipeline for sales data"));
        assert!(looks_like_project("Built a WEB scraper"));
        assert!(looks_like_project("Mobile Application"));
        assert!(looks_like_project("- bullet"));
        assert!(looks_like_project("Worked on AI tooling"));
        assert!(!looks_like_project("I enjoy hiking and photography."));
    }

    #[test]
    fn test_ai_and_etl_are_case_sensitive() {
        assert!(!looks_like_project("trained in ai ethics"));
        assert!(!looks_like_project("etl"));
        assert!(looks_like_project("ETL"));
    }

    #[test]
    fn test_filter_keeps_only_markers_and_order() {
        let hits = vec![
            hit("Likes cricket", 0.1),
            hit("Project Alpha", 0.2),
            hit("Lives in Colombo", 0.3),
            hit("Data dashboard", 0.4),
        ];
        let kept = filter_project_hits(hits);
        let texts: Vec<&str> = kept.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["Project Alpha", "Data dashboard"]);
    }

    #[test]
    fn test_filter_fails_open() {
        let hits = vec![hit("Likes cricket", 0.1), hit("Lives in Colombo", 0.3)];
        let kept = filter_project_hits(hits.clone());
        assert_eq!(kept, hits);
    }

    #[test]
    fn test_refine_only_filters_project_list() {
        let hits = vec![hit("Likes cricket", 0.1), hit("Project Alpha", 0.2)];
        assert_eq!(refine(Intent::Generic, hits.clone()).len(), 2);
        assert_eq!(refine(Intent::ProjectList, hits).len(), 1);
    }
}
