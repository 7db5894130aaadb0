//! Instruction prompt assembly.
//!
//! Every prompt has the same shape:
//!
//! ```text
//! <instructions for the intent>
//!
//! Context:
//! <chunk 1>
//! ---
//! <chunk 2>
//!
//! Question: <query>
//! Answer:
//! ```
//!
//! Instructions are selected by [`template_for`], a mapping from [`Intent`]
//! to a pure template function. Greetings never reach the LLM in the normal
//! pipeline; if one does, it gets the generic template.

use crate::answer::FALLBACK_CONTACT;
use crate::intent::Intent;

/// Separator placed between context chunks.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Fallback phrase the project-list template asks the model to use.
pub const NO_ANSWER_IN_CONTEXT: &str = "No answer found in context.";

const GROUNDING: &str = "Given the context below, answer the user's question only using information from the context. ";
const NO_INVENTION: &str = "Do NOT invent details, only use what is present in context. ";

/// A template renders the instruction block for a context and query.
pub type Template = fn(context: &str, query: &str) -> String;

/// Join retrieved chunks into one context block.
pub fn join_context<S: AsRef<str>>(chunks: &[S]) -> String {
    chunks
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn frame(instructions: String, context: &str, query: &str) -> String {
    format!(
        "{}\n\nContext:\n{}\n\nQuestion: {}\nAnswer:",
        instructions, context, query
    )
}

fn contact_fallback() -> String {
    format!("If not present, say '{}'", FALLBACK_CONTACT)
}

fn project_list_template(context: &str, query: &str) -> String {
    let instructions = format!(
        "{GROUNDING}\
         If the question asks for projects or lists, answer with a markdown bullet list of ALL relevant projects, with NAMES and brief DESCRIPTIONS if available. \
         {NO_INVENTION}\
         If several projects appear in context, include ALL of them in the bullet list. \
         If not present, say '{NO_ANSWER_IN_CONTEXT}' Thank you for your question!"
    );
    frame(instructions, context, query)
}

fn contact_template(context: &str, query: &str) -> String {
    let instructions = format!(
        "{GROUNDING}\
         If the user asks for contact information (phone, email, WhatsApp), reply in a friendly way, e.g. 'Yes, these are my contact numbers:' and list all numbers and emails found in context. \
         {NO_INVENTION}{}",
        contact_fallback()
    );
    frame(instructions, context, query)
}

fn link_template(context: &str, query: &str) -> String {
    let instructions = format!(
        "{GROUNDING}\
         If the user asks for social links (LinkedIn, GitHub, portfolio, website, Twitter, etc.), reply in a friendly way, e.g. 'Yes, these are my links:' and list all links found in context. \
         {NO_INVENTION}{}",
        contact_fallback()
    );
    frame(instructions, context, query)
}

fn generic_template(context: &str, query: &str) -> String {
    let instructions = format!(
        "{GROUNDING}\
         Reply in a natural and conversational way, using the context. If several possible answers appear, give all of them. \
         {NO_INVENTION}{}",
        contact_fallback()
    );
    frame(instructions, context, query)
}

/// Select the instruction template for an intent.
pub fn template_for(intent: Intent) -> Template {
    match intent {
        Intent::ProjectList => project_list_template,
        Intent::Contact => contact_template,
        Intent::Link => link_template,
        Intent::Generic | Intent::Greeting => generic_template,
    }
}

/// Build the full prompt for `query` from its intent and context chunks.
///
/// # Example
///
/// ```rust
/// use portfolio_rag_core::intent::Intent;
/// use portfolio_rag_core::prompt::build_prompt;
///
/// let prompt = build_prompt("list my projects", Intent::ProjectList, &["Project Alpha"]);
/// assert!(prompt.contains("markdown bullet list"));
/// assert!(prompt.ends_with("Question: list my projects\nAnswer:"));
/// ```
pub fn build_prompt<S: AsRef<str>>(query: &str, intent: Intent, chunks: &[S]) -> String {
    let context = join_context(chunks);
    template_for(intent)(&context, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_joined_with_separator() {
        let prompt = build_prompt("q", Intent::Generic, &["one", "two", "three"]);
        assert!(prompt.contains("Context:\none\n---\ntwo\n---\nthree\n\nQuestion: q\nAnswer:"));
    }

    #[test]
    fn test_empty_context() {
        let chunks: [&str; 0] = [];
        let prompt = build_prompt("what are your skills", Intent::Generic, &chunks);
        assert!(prompt.contains("Context:\n\n\nQuestion: what are your skills\nAnswer:"));
    }

    #[test]
    fn test_every_template_grounds_and_forbids_invention() {
        for intent in [
            Intent::ProjectList,
            Intent::Contact,
            Intent::Link,
            Intent::Generic,
            Intent::Greeting,
        ] {
            let prompt = build_prompt("q", intent, &["ctx"]);
            assert!(prompt.starts_with(GROUNDING), "{intent}");
            assert!(prompt.contains(NO_INVENTION), "{intent}");
            assert!(prompt.ends_with("Question: q\nAnswer:"), "{intent}");
        }
    }

    #[test]
    fn test_project_list_fallback_differs() {
        let prompt = build_prompt("list my projects", Intent::ProjectList, &["x"]);
        assert!(prompt.contains("say 'No answer found in context.' Thank you for your question!"));
        assert!(!prompt.contains("WhatsApp: +94"));
    }

    #[test]
    fn test_contact_and_link_use_whatsapp_fallback() {
        for intent in [Intent::Contact, Intent::Link, Intent::Generic] {
            let prompt = build_prompt("q", intent, &["x"]);
            assert!(
                prompt.contains(&format!("If not present, say '{}'", FALLBACK_CONTACT)),
                "{intent}"
            );
        }
    }

    #[test]
    fn test_intent_specific_rules() {
        assert!(build_prompt("q", Intent::Contact, &["x"]).contains("Yes, these are my contact numbers:"));
        assert!(build_prompt("q", Intent::Link, &["x"]).contains("Yes, these are my links:"));
        assert!(build_prompt("q", Intent::Generic, &["x"]).contains("natural and conversational"));
    }

    #[test]
    fn test_greeting_uses_generic_template() {
        assert_eq!(
            build_prompt("q", Intent::Greeting, &["x"]),
            build_prompt("q", Intent::Generic, &["x"])
        );
    }
}
