//! Answer synthesis: gate, fallbacks, prompted generation and citation
//! enforcement over one query's labeled sources.

use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use askdb_core::config::{GateSettings, SynthesisSettings};
use askdb_core::traits::Generator;
use askdb_core::types::{Query, QueryStage, Source};

use crate::citation::{attach_verbatim_citation, has_valid_citation, strip_invalid_citations};
use crate::extractive::summarize;
use crate::gate::ConfidenceGate;
use crate::identity::extract_name;
use crate::{ABSTENTION_MESSAGE, NO_DOCUMENTS_MESSAGE};

static CONTROL_TOKENS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\|[^|>]{1,40}\|>|</?s>|\[/?INST\]|<<SYS>>|<</SYS>>").expect("control token regex is valid")
});
static ANSWER_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*answer\s*:\s*").expect("answer prefix regex is valid"));

/// Text beyond the abstention phrase longer than this turns the answer into a
/// plain abstention.
pub const CONTRADICTION_REMAINDER_CHARS: usize = 50;

/// Which branch produced the final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPath {
    NoDocuments,
    IdentityHeuristic,
    Extractive,
    Abstained,
    Generated,
    /// Generated text with a citation attached by verbatim match.
    GeneratedRepaired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub path: AnswerPath,
}

impl Answer {
    fn new(text: impl Into<String>, path: AnswerPath) -> Self {
        Self { text: text.into(), path }
    }

    fn abstain() -> Self {
        Self::new(ABSTENTION_MESSAGE, AnswerPath::Abstained)
    }
}

/// Receives stage changes and streamed partial answers.
pub trait AnswerObserver {
    fn on_stage(&mut self, _stage: QueryStage) {}
    fn on_partial(&mut self, _text: &str) {}
}

impl AnswerObserver for () {}

/// Renders sources as `[S#] (page p, start of document)` blocks separated by
/// `---`, cut to `budget` characters.
pub fn build_context(sources: &[Source], budget: usize) -> String {
    let blocks: Vec<String> = sources
        .iter()
        .map(|source| {
            let metadata = source.metadata();
            let mut notes = Vec::new();
            if let Some(page) = metadata.page {
                notes.push(format!("page {page}"));
            }
            if metadata.starts_document() {
                notes.push("start of document".to_string());
            }
            let header = if notes.is_empty() {
                source.source_id.citation()
            } else {
                format!("{} ({})", source.source_id.citation(), notes.join(", "))
            };
            format!("{header}\n{}", source.text().trim())
        })
        .collect();
    let context = blocks.join("\n---\n");
    match context.char_indices().nth(budget) {
        Some((cut, _)) => context[..cut].to_string(),
        None => context,
    }
}

pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You answer questions about the user's documents.\n\
         Rules:\n\
         - Write in English only.\n\
         - Use only facts stated in the context below.\n\
         - If the context does not contain the answer, reply exactly: {ABSTENTION_MESSAGE}\n\
         - End every factual sentence with the citation of its source, for example [S1].\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         Answer:"
    )
}

/// Drops an echoed prompt, model control delimiters and a leading `Answer:`.
pub fn clean_partial(text: &str, prompt: &str) -> String {
    let echo = prompt.trim();
    let after_echo = match text.find(echo) {
        Some(pos) if !echo.is_empty() => &text[pos + echo.len()..],
        _ => text,
    };
    let without_controls = CONTROL_TOKENS_RE.replace_all(after_echo, "");
    ANSWER_PREFIX_RE.replace(&without_controls, "").trim().to_string()
}

pub fn is_abstention(text: &str) -> bool {
    text.to_lowercase().contains(&ABSTENTION_MESSAGE.to_lowercase())
}

/// Final cleanup of generated text. An abstention followed by a substantial
/// answer is reduced to the abstention alone.
pub fn finalize_generation(raw: &str, prompt: &str) -> String {
    let cleaned = clean_partial(raw, prompt);
    if !is_abstention(&cleaned) {
        return cleaned;
    }
    let lower = cleaned.to_lowercase();
    let phrase = ABSTENTION_MESSAGE.to_lowercase();
    let remainder = lower.replacen(&phrase, "", 1);
    if remainder.trim().chars().count() > CONTRADICTION_REMAINDER_CHARS {
        ABSTENTION_MESSAGE.to_string()
    } else {
        cleaned
    }
}

pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
    gate: ConfidenceGate,
    settings: SynthesisSettings,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>, gate: GateSettings, settings: SynthesisSettings) -> Self {
        Self { generator, gate: ConfidenceGate::new(gate), settings }
    }

    /// Produces the answer for `query` from its labeled sources. Only a
    /// generator failure is an error; unusable output falls back to the
    /// extractive summary or the abstention message.
    pub fn answer(
        &self,
        query: &Query,
        sources: &[Source],
        observer: &mut dyn AnswerObserver,
    ) -> anyhow::Result<Answer> {
        if sources.is_empty() {
            return Ok(Answer::new(NO_DOCUMENTS_MESSAGE, AnswerPath::NoDocuments));
        }

        observer.on_stage(QueryStage::Gating);
        let verdict = self.gate.evaluate(&query.raw_text, query.is_identity, sources);
        debug!(
            top_score = verdict.top_score,
            threshold = verdict.threshold,
            words = verdict.word_count,
            passed = verdict.passed,
            "confidence gate"
        );

        if query.is_identity {
            if let Some(name) = extract_name(sources) {
                return Ok(Answer::new(name, AnswerPath::IdentityHeuristic));
            }
        }
        if !verdict.passed {
            return Ok(self.fallback(query, sources, observer));
        }

        observer.on_stage(QueryStage::Generating);
        let context = build_context(sources, self.settings.context_char_budget);
        let prompt = build_prompt(&query.raw_text, &context);
        let mut streamed = String::new();
        let mut last_partial = String::new();
        let on_partial: &mut dyn FnMut(&str) = &mut |fragment: &str| {
            streamed.push_str(fragment);
            let cleaned = clean_partial(&streamed, &prompt);
            if !cleaned.is_empty() && cleaned != last_partial {
                observer.on_partial(&cleaned);
                last_partial = cleaned;
            }
        };
        let raw = self.generator.generate(&prompt, &self.settings.sampling(), Some(on_partial))?;
        let finalized = finalize_generation(&raw, &prompt);
        Ok(self.enforce_citations(query, finalized, sources, observer))
    }

    fn enforce_citations(
        &self,
        query: &Query,
        text: String,
        sources: &[Source],
        observer: &mut dyn AnswerObserver,
    ) -> Answer {
        let text = strip_invalid_citations(&text, sources.len());
        if is_abstention(&text) {
            // leftover text may only reach the caller when it is cited
            if has_valid_citation(&text, sources.len()) {
                return Answer::new(text, AnswerPath::Abstained);
            }
            return Answer::abstain();
        }
        if text.is_empty() {
            debug!("generation produced no usable text");
            return self.fallback(query, sources, observer);
        }
        if has_valid_citation(&text, sources.len()) {
            return Answer::new(text, AnswerPath::Generated);
        }
        if let Some(repaired) = attach_verbatim_citation(&text, sources) {
            return Answer::new(repaired, AnswerPath::GeneratedRepaired);
        }
        debug!("generated answer carried no valid citation");
        self.fallback(query, sources, observer)
    }

    fn fallback(&self, query: &Query, sources: &[Source], observer: &mut dyn AnswerObserver) -> Answer {
        observer.on_stage(QueryStage::ExtractiveFallback);
        summarize(&query.raw_text, sources, self.settings.max_extractive_sentences)
            .map_or_else(Answer::abstain, |summary| Answer::new(summary, AnswerPath::Extractive))
    }
}
