//! Query intent detection, keyword expansion and positional boosting.

use regex::Regex;
use std::sync::LazyLock;

use askdb_core::types::{ChunkMetadata, Embedding, Query};

/// Short questions about who a document is by or about, or how to reach them.
static IDENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^
        (?:(?:what\s+is|what's|whats|tell\s+me)\s+(?:(?:the|your|his|her|their|my)\s+)?)?
        (?:full\s+)?
        (?:name|names|who|whom|author|authors|contact|contacts|email|e-mail|phone|identity|candidate)
        (?:\s+(?:
            info|information|details
          | is\s+(?:this|it|he|she|the\s+author)
          | wrote\s+(?:this|it)
          | name
          | of\s+the\s+(?:author|candidate|person|document|writer)
        ))?
        $",
    )
    .expect("identity regex is valid")
});

/// Trigger word and the terms appended to the embedded text when it fires.
/// Applied in table order.
const EXPANSIONS: &[(&str, &str)] = &[
    ("name", "name full name candidate person called"),
    ("contact", "contact email phone address linkedin"),
    ("email", "email address contact mail"),
    ("phone", "phone number mobile telephone contact"),
    ("skills", "skills technologies tools proficient expertise"),
    ("experience", "experience work history employment roles positions"),
    ("education", "education degree university school graduated"),
    ("projects", "projects built developed implemented"),
    ("summary", "summary overview profile objective about"),
    ("author", "author written by name"),
    ("who", "name person author about"),
];

/// Words of a query after lowercasing and turning punctuation (other than
/// apostrophes and hyphens) into spaces.
fn normalized_words(raw: &str) -> Vec<String> {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' || c == '-' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

pub fn word_count(raw: &str) -> usize {
    raw.split_whitespace().count()
}

pub fn is_identity_query(raw: &str) -> bool {
    let normalized = normalized_words(raw).join(" ");
    !normalized.is_empty() && IDENTITY_RE.is_match(&normalized)
}

/// Appends the expansion of every trigger the query matches. A trigger matches
/// when it is the whole query, or one of its words in a query of at most three
/// words. Without a match the raw text is returned as is.
pub fn expand_query(raw: &str) -> String {
    let words = normalized_words(raw);
    let whole = words.join(" ");
    let short = words.len() <= 3;
    let additions: Vec<&str> = EXPANSIONS
        .iter()
        .filter(|(trigger, _)| whole == *trigger || (short && words.iter().any(|w| w == trigger)))
        .map(|(_, terms)| *terms)
        .collect();
    if additions.is_empty() {
        raw.to_string()
    } else {
        format!("{raw} {}", additions.join(" "))
    }
}

/// Extra semantic score for chunks near the start of a document.
pub fn positional_boost(metadata: &ChunkMetadata, boost: f32) -> f32 {
    if metadata.starts_document() {
        boost
    } else if metadata.early_on_first_page() {
        boost / 2.0
    } else {
        0.0
    }
}

/// A query analysed but not yet embedded. Only `expanded_text` is embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    pub raw_text: String,
    pub expanded_text: String,
    pub is_identity: bool,
}

impl PreparedQuery {
    pub fn with_vector(self, vector: Embedding) -> Query {
        Query {
            raw_text: self.raw_text,
            expanded_text: self.expanded_text,
            is_identity: self.is_identity,
            vector,
        }
    }
}

pub fn prepare_query(raw: &str) -> PreparedQuery {
    let raw_text = raw.trim().to_string();
    PreparedQuery {
        expanded_text: expand_query(&raw_text),
        is_identity: is_identity_query(&raw_text),
        raw_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_identity_phrasings() {
        for q in [
            "name",
            "Name?",
            "who",
            "Who is this?",
            "what is the name",
            "What's your name?",
            "author?",
            "email",
            "contact info",
            "full name",
            "who wrote this",
            "what is the name of the author",
        ] {
            assert!(is_identity_query(q), "{q:?} should be an identity query");
        }
    }

    #[test]
    fn ignores_content_questions() {
        for q in [
            "what is the name of the algorithm used in chapter 3",
            "who won the 2010 world cup",
            "how do I prune tomatoes",
            "",
        ] {
            assert!(!is_identity_query(q), "{q:?} should not be an identity query");
        }
    }

    #[test]
    fn exact_trigger_expands() {
        assert_eq!(expand_query("Skills"), "Skills skills technologies tools proficient expertise");
    }

    #[test]
    fn short_query_expands_every_trigger_in_table_order() {
        let expanded = expand_query("email or phone?");
        assert!(expanded.starts_with("email or phone? email address"));
        let email_at = expanded.find("mail").unwrap_or(usize::MAX);
        let phone_at = expanded.find("telephone").unwrap_or(0);
        assert!(email_at < phone_at);
    }

    #[test]
    fn long_query_with_trigger_word_is_left_alone() {
        let q = "list the education of every team member";
        assert_eq!(expand_query(q), q);
    }

    #[test]
    fn boost_prefers_document_start() {
        assert!((positional_boost(&ChunkMetadata::new(Some(3), Some(0)), 0.15) - 0.15).abs() < 1e-6);
        assert!((positional_boost(&ChunkMetadata::new(Some(1), Some(1)), 0.15) - 0.075).abs() < 1e-6);
        assert!(positional_boost(&ChunkMetadata::new(Some(1), Some(2)), 0.15).abs() < 1e-6);
        assert!(positional_boost(&ChunkMetadata::default(), 0.15).abs() < 1e-6);
    }

    #[test]
    fn prepared_query_keeps_raw_text_for_lexical_use() {
        let prepared = prepare_query("  name ");
        assert_eq!(prepared.raw_text, "name");
        assert!(prepared.is_identity);
        assert!(prepared.expanded_text.starts_with("name name full name"));
    }
}
