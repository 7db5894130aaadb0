//! Keyword-driven query intent classification.
//!
//! A query is classified by case-insensitive substring membership against
//! fixed keyword lists. When several lists match, the priority is
//! `ProjectList > Contact > Link > Generic`. Greetings are detected
//! separately by prefix and take precedence over everything else, because a
//! greeting short-circuits the whole answer pipeline.
//!
//! # Example
//!
//! ```rust
//! use portfolio_rag_core::intent::{classify, Intent};
//!
//! assert_eq!(classify("hi there"), Intent::Greeting);
//! assert_eq!(classify("List my projects"), Intent::ProjectList);
//! assert_eq!(classify("what is your email?"), Intent::Contact);
//! assert_eq!(classify("where is your github"), Intent::Link);
//! assert_eq!(classify("what are your skills"), Intent::Generic);
//! ```

use serde::Serialize;

pub const PROJECT_KEYWORDS: &[&str] = &[
    "list",
    "projects",
    "major project",
    "portfolio",
    "works",
    "freelance",
    "show projects",
    "my projects",
];

pub const CONTACT_KEYWORDS: &[&str] = &["contact", "phone", "number", "email", "whatsapp"];

pub const LINK_KEYWORDS: &[&str] = &[
    "linkedin",
    "github",
    "portfolio",
    "website",
    "twitter",
    "facebook",
    "instagram",
    "tiktok",
    "link",
];

pub const GREETING_PREFIXES: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
];

/// The classified purpose of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    ProjectList,
    Contact,
    Link,
    Generic,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::ProjectList => "project_list",
            Intent::Contact => "contact",
            Intent::Link => "link",
            Intent::Generic => "generic",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// True when the trimmed, lower-cased query starts with a greeting.
///
/// This is a plain prefix test: `"history"` counts as a greeting because it
/// starts with `"hi"`.
pub fn is_greeting(query: &str) -> bool {
    let normalized = query.trim().to_lowercase();
    GREETING_PREFIXES
        .iter()
        .any(|greet| normalized.starts_with(greet))
}

/// True when the query asks for a list of projects or works.
pub fn is_project_list(query: &str) -> bool {
    contains_any(&query.to_lowercase(), PROJECT_KEYWORDS)
}

/// Classify the topical intent of a query, ignoring greetings.
///
/// Used for retrieval breadth and template selection. Never returns
/// [`Intent::Greeting`].
pub fn classify_topic(query: &str) -> Intent {
    let lower = query.to_lowercase();
    if contains_any(&lower, PROJECT_KEYWORDS) {
        Intent::ProjectList
    } else if contains_any(&lower, CONTACT_KEYWORDS) {
        Intent::Contact
    } else if contains_any(&lower, LINK_KEYWORDS) {
        Intent::Link
    } else {
        Intent::Generic
    }
}

/// Classify a query, checking for a greeting first.
pub fn classify(query: &str) -> Intent {
    if is_greeting(query) {
        Intent::Greeting
    } else {
        classify_topic(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greetings() {
        for q in [
            "hi",
            "  Hello there",
            "HEY!",
            "good morning, who are you?",
            "Good Afternoon",
            "good evening",
        ] {
            assert_eq!(classify(q), Intent::Greeting, "query: {q:?}");
        }
    }

    #[test]
    fn test_greeting_is_a_prefix_match() {
        assert!(is_greeting("history of your work"));
        assert!(!is_greeting("say hi"));
        assert!(!is_greeting(""));
    }

    #[test]
    fn test_greeting_beats_project_list() {
        assert_eq!(classify("hello, list my projects"), Intent::Greeting);
        assert_eq!(classify_topic("hello, list my projects"), Intent::ProjectList);
    }

    #[test]
    fn test_project_list_keywords() {
        for q in [
            "list my projects",
            "What PROJECTS have you done?",
            "tell me about your major project",
            "freelance experience",
            "show your works",
        ] {
            assert_eq!(classify(q), Intent::ProjectList, "query: {q:?}");
        }
    }

    #[test]
    fn test_portfolio_prefers_project_list_over_link() {
        assert_eq!(classify("portfolio website"), Intent::ProjectList);
    }

    #[test]
    fn test_contact_beats_link() {
        assert_eq!(classify("email or linkedin?"), Intent::Contact);
        assert_eq!(classify("What's your WhatsApp number"), Intent::Contact);
    }

    #[test]
    fn test_link_keywords() {
        assert_eq!(classify("your GitHub?"), Intent::Link);
        assert_eq!(classify("share your tiktok"), Intent::Link);
    }

    #[test]
    fn test_generic_fallback() {
        assert_eq!(classify("what are your skills"), Intent::Generic);
        assert_eq!(classify(""), Intent::Generic);
    }

    #[test]
    fn test_is_project_list() {
        assert!(is_project_list("Show Projects"));
        assert!(!is_project_list("what are your skills"));
    }
}
