//! Post-processing of raw LLM answers.
//!
//! Rules, applied in order:
//!
//! 1. Greeting queries get the fixed [`GREETING_INTRO`], whatever the model said.
//! 2. Project-list answers containing a markdown bullet are returned as-is.
//! 3. Answers containing a known "no answer" phrase become [`FALLBACK_CONTACT`].
//! 4. Anything else is returned unchanged.

use crate::intent::{is_greeting, is_project_list};

/// Introduction returned for greetings.
pub const GREETING_INTRO: &str = "Hello! I am Kavinda's AI assistant. Ask me anything about Kavinda's skills, projects, or contact info.";

/// Answer substituted whenever no grounded answer exists.
pub const FALLBACK_CONTACT: &str = "I don't have information about that. Please contact my owner on WhatsApp: +94 779160381. Thank you for your question!";

/// Lower-case phrases that mark an answer as a miss.
pub const FAILURE_PHRASES: &[&str] = &[
    "no answer found",
    "sorry, i couldn't",
    "no query provided",
    "i don't have information",
    "no match found",
];

const BULLET_MARKERS: &[&str] = &["- ", "* "];

/// True when the answer is one of the model's "I don't know" variants.
pub fn is_failure_answer(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    FAILURE_PHRASES.iter().any(|p| lower.contains(p))
}

/// Normalize the model's raw answer for `query`.
///
/// ```rust
/// use portfolio_rag_core::answer::{postprocess, FALLBACK_CONTACT, GREETING_INTRO};
///
/// assert_eq!(postprocess("hi there", "anything"), GREETING_INTRO);
/// assert_eq!(postprocess("skills?", "Sorry, I couldn't find that."), FALLBACK_CONTACT);
/// assert_eq!(postprocess("skills?", "Rust and Python."), "Rust and Python.");
/// ```
pub fn postprocess(query: &str, raw_answer: &str) -> String {
    if is_greeting(query) {
        return GREETING_INTRO.to_string();
    }
    if is_project_list(query) && BULLET_MARKERS.iter().any(|m| raw_answer.contains(m)) {
        return raw_answer.to_string();
    }
    if is_failure_answer(raw_answer) {
        return FALLBACK_CONTACT.to_string();
    }
    raw_answer.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_discards_raw_answer() {
        for raw in ["", "- a\n- b", "No answer found in context.", "Error: boom"] {
            assert_eq!(postprocess("Hello!", raw), GREETING_INTRO);
        }
    }

    #[test]
    fn test_project_bullets_kept_even_with_failure_phrase() {
        let raw = "- Project Alpha\n- no answer found for Beta";
        assert_eq!(postprocess("list my projects", raw), raw);
        let starred = "* Project Alpha";
        assert_eq!(postprocess("show projects", starred), starred);
    }

    #[test]
    fn test_project_without_bullets_falls_through() {
        assert_eq!(
            postprocess("list my projects", "No answer found in context."),
            FALLBACK_CONTACT
        );
        assert_eq!(
            postprocess("list my projects", "Project Alpha is an ETL pipeline."),
            "Project Alpha is an ETL pipeline."
        );
    }

    #[test]
    fn test_failure_phrases_case_insensitive() {
        for raw in [
            "NO ANSWER FOUND",
            "Sorry, I couldn't find it",
            "No query provided.",
            "I don't have information about that.",
            "No match found.",
        ] {
            assert_eq!(postprocess("what are your skills", raw), FALLBACK_CONTACT);
        }
    }

    #[test]
    fn test_bullets_outside_project_queries_are_not_special() {
        let raw = "- I don't have information";
        assert_eq!(postprocess("what are your skills", raw), FALLBACK_CONTACT);
    }

    #[test]
    fn test_plain_answer_unchanged() {
        assert_eq!(
            postprocess("what are your skills", "Rust, Python and SQL."),
            "Rust, Python and SQL."
        );
    }
}
