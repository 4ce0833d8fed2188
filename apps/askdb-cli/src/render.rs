//! Terminal output for answers and sources.

use serde_json::{json, Value};

use askdb_core::types::Source;
use askdb_pipeline::AnsweredQuery;

const SNIPPET_CHARS: usize = 120;

/// One line per source: label, chunk id, page, combined score and a snippet.
pub fn format_source(source: &Source) -> String {
    let page = source.metadata().page.map(|p| format!(" page {p}")).unwrap_or_default();
    let flat = source.text().split_whitespace().collect::<Vec<_>>().join(" ");
    let snippet = match flat.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    };
    format!(
        "{} {}{} score={:.3}  {}",
        source.source_id.citation(),
        source.chunk.id,
        page,
        source.scores.combined,
        snippet
    )
}

/// Turns cumulative partial answers into the suffix not yet printed.
#[derive(Debug, Default)]
pub struct PartialPrinter {
    printed: String,
}

impl PartialPrinter {
    /// `None` when nothing new arrived or the text was rewritten rather than
    /// extended.
    pub fn delta(&mut self, cumulative: &str) -> Option<String> {
        let suffix = cumulative.strip_prefix(self.printed.as_str())?;
        if suffix.is_empty() {
            return None;
        }
        let suffix = suffix.to_string();
        self.printed = cumulative.to_string();
        Some(suffix)
    }

    pub fn printed_anything(&self) -> bool {
        !self.printed.is_empty()
    }
}

pub fn answer_json(answer: &AnsweredQuery) -> Value {
    json!({
        "answer": answer.text,
        "path": answer.path,
        "sources": answer.sources,
    })
}
