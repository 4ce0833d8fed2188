use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use askdb_answer::citation::has_valid_citation;
use askdb_answer::{AnswerObserver, AnswerPath, AnswerSynthesizer, ABSTENTION_MESSAGE, NO_DOCUMENTS_MESSAGE};
use askdb_core::config::{GateSettings, SynthesisSettings};
use askdb_core::traits::{Generator, SamplingConfig};
use askdb_core::types::{label_sources, ChunkDraft, ChunkMetadata, Query, QueryStage, ScoredCandidate, Source};

/// Streams a fixed list of fragments and counts how often it was called.
struct ScriptedGenerator {
    fragments: Vec<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(fragments: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fragments: fragments.iter().map(|f| (*f).to_string()).collect(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Generator for ScriptedGenerator {
    fn generate(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
        mut on_partial: Option<&mut dyn FnMut(&str)>,
    ) -> anyhow::Result<String> {
        assert!(sampling.greedy);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        for fragment in &self.fragments {
            if let Some(callback) = on_partial.as_deref_mut() {
                callback(fragment);
            }
        }
        Ok(self.fragments.concat())
    }
}

struct FailingGenerator;

impl Generator for FailingGenerator {
    fn generate(&self, _: &str, _: &SamplingConfig, _: Option<&mut dyn FnMut(&str)>) -> anyhow::Result<String> {
        anyhow::bail!("model not loaded")
    }
}

#[derive(Default)]
struct Recorder {
    stages: Vec<QueryStage>,
    partials: Vec<String>,
}

impl AnswerObserver for Recorder {
    fn on_stage(&mut self, stage: QueryStage) {
        self.stages.push(stage);
    }

    fn on_partial(&mut self, text: &str) {
        self.partials.push(text.to_string());
    }
}

fn synthesizer(generator: Arc<dyn Generator>) -> AnswerSynthesizer {
    AnswerSynthesizer::new(generator, GateSettings::default(), SynthesisSettings::default())
}

fn sources(texts: &[(&str, f32)]) -> Vec<Source> {
    label_sources(
        texts
            .iter()
            .enumerate()
            .map(|(i, (text, score))| {
                let index = u32::try_from(i + 3).unwrap();
                let draft = ChunkDraft::with_metadata(*text, ChunkMetadata::new(Some(2), Some(index)));
                let mut candidate = ScoredCandidate::new(Arc::new(draft.into_chunk("notes", i, vec![1.0])), *score);
                candidate.scores.combined = *score;
                candidate
            })
            .collect(),
    )
}

fn query(raw: &str, is_identity: bool) -> Query {
    Query { raw_text: raw.into(), expanded_text: raw.into(), is_identity, vector: vec![1.0] }
}

#[test]
fn below_threshold_never_generates() {
    let generator = ScriptedGenerator::new(&["should not run [S1]"]);
    let mut recorder = Recorder::default();
    let answer = synthesizer(generator.clone())
        .answer(
            &query("how often should the goats be milked", false),
            &sources(&[("Goats should be milked twice a day at regular hours.", 0.12)]),
            &mut recorder,
        )
        .unwrap();

    assert_eq!(generator.calls(), 0);
    assert_eq!(answer.path, AnswerPath::Extractive);
    assert_eq!(answer.text, "Goats should be milked twice a day at regular hours. [S1]");
    assert_eq!(recorder.stages, vec![QueryStage::Gating, QueryStage::ExtractiveFallback]);
}

#[test]
fn name_query_reads_the_first_line() {
    let generator = ScriptedGenerator::new(&["Someone Else [S2]"]);
    let first = ChunkDraft::with_metadata("Jane Doe\nHomestead manager", ChunkMetadata::new(Some(1), Some(0)));
    let mut candidate = ScoredCandidate::new(Arc::new(first.into_chunk("cv", 0, vec![1.0])), 0.4);
    candidate.scores.combined = 0.4;
    let labeled = label_sources(vec![candidate]);

    let answer = synthesizer(generator.clone()).answer(&query("name", true), &labeled, &mut ()).unwrap();

    assert_eq!(answer.text, "Jane Doe [S1]");
    assert_eq!(answer.path, AnswerPath::IdentityHeuristic);
    assert_eq!(generator.calls(), 0);
}

#[test]
fn name_query_ignores_mid_document_headings() {
    let generator = ScriptedGenerator::new(&["The notes do not name an author [S1]."]);
    let labeled = sources(&[("Raised Beds\nBuild raised beds from untreated timber.", 0.4)]);

    let answer = synthesizer(generator.clone()).answer(&query("who wrote this", true), &labeled, &mut ()).unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(answer.path, AnswerPath::Generated);
    assert!(!answer.text.starts_with("Raised Beds"));
}

#[test]
fn weak_short_query_without_overlap_abstains() {
    let generator = ScriptedGenerator::new(&["irrelevant"]);
    let labeled = sources(&[("Bees swarm in late spring when hives get crowded.", 0.05)]);
    let answer = synthesizer(generator.clone()).answer(&query("quantum flux", false), &labeled, &mut ()).unwrap();

    assert_eq!(answer.text, ABSTENTION_MESSAGE);
    assert_eq!(answer.path, AnswerPath::Abstained);
    assert_eq!(labeled.len(), 1);
    assert_eq!(generator.calls(), 0);
}

#[test]
fn empty_sources_report_no_documents() {
    let answer = synthesizer(ScriptedGenerator::new(&[])).answer(&query("anything", false), &[], &mut ()).unwrap();
    assert_eq!(answer.text, NO_DOCUMENTS_MESSAGE);
    assert_eq!(answer.path, AnswerPath::NoDocuments);
}

#[test]
fn cited_generation_streams_cleaned_partials() {
    let generator = ScriptedGenerator::new(&["<|assistant|>", "Answer: Plant garlic", " in October", " [S1].", "</s>"]);
    let mut recorder = Recorder::default();
    let answer = synthesizer(generator.clone())
        .answer(
            &query("when should garlic be planted outdoors", false),
            &sources(&[("Plant garlic in October before the ground freezes.", 0.6)]),
            &mut recorder,
        )
        .unwrap();

    assert_eq!(answer.text, "Plant garlic in October [S1].");
    assert_eq!(answer.path, AnswerPath::Generated);
    assert_eq!(
        recorder.partials,
        vec!["Plant garlic", "Plant garlic in October", "Plant garlic in October [S1]."]
    );
    assert_eq!(recorder.stages, vec![QueryStage::Gating, QueryStage::Generating]);
    let prompts = generator.prompts.lock().unwrap();
    assert!(prompts[0].contains("[S1] (page 2)\nPlant garlic in October"));
    assert!(prompts[0].contains("Question: when should garlic be planted outdoors"));
}

#[test]
fn out_of_range_citation_falls_back_to_a_cited_extract() {
    let generator = ScriptedGenerator::new(&["The pump runs on a small solar array [S7]."]);
    let labeled = sources(&[
        ("The well pump is powered by two solar panels on the shed roof.", 0.7),
        ("Spare fuses for the pump controller are kept in the kitchen drawer.", 0.5),
    ]);
    let answer =
        synthesizer(generator.clone()).answer(&query("how is the well pump powered", false), &labeled, &mut ()).unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(answer.path, AnswerPath::Extractive);
    assert!(!answer.text.contains("[S7]"));
    assert!(has_valid_citation(&answer.text, labeled.len()));
}

#[test]
fn short_verbatim_answer_gets_its_citation() {
    let generator = ScriptedGenerator::new(&["Rhode Island Red."]);
    let labeled = sources(&[("Our laying flock is mostly Rhode Island Red hens.", 0.7)]);
    let answer =
        synthesizer(generator).answer(&query("which chicken breed do we keep", false), &labeled, &mut ()).unwrap();

    assert_eq!(answer.text, "Rhode Island Red. [S1]");
    assert_eq!(answer.path, AnswerPath::GeneratedRepaired);
}

#[test]
fn abstention_that_keeps_talking_is_cut_back() {
    let rambling = format!(
        "{ABSTENTION_MESSAGE} That said, most barns of that era were built from local oak by the farmers themselves."
    );
    let generator = ScriptedGenerator::new(&[rambling.as_str()]);
    let labeled = sources(&[("The barn roof was replaced with steel sheets last summer.", 0.6)]);
    let answer =
        synthesizer(generator).answer(&query("who originally built the old barn", false), &labeled, &mut ()).unwrap();

    assert_eq!(answer.text, ABSTENTION_MESSAGE);
    assert_eq!(answer.path, AnswerPath::Abstained);
}

#[test]
fn short_uncited_claim_after_abstention_is_dropped() {
    let output = format!("{ABSTENTION_MESSAGE} It was 1902.");
    let generator = ScriptedGenerator::new(&[output.as_str()]);
    let labeled = sources(&[("The barn roof was replaced with steel sheets last summer.", 0.6)]);
    let answer =
        synthesizer(generator).answer(&query("when was the old barn built", false), &labeled, &mut ()).unwrap();

    assert_eq!(answer.text, ABSTENTION_MESSAGE);
    assert_eq!(answer.path, AnswerPath::Abstained);
}

#[test]
fn short_cited_note_after_abstention_is_kept() {
    let output = format!("{ABSTENTION_MESSAGE} The roof is steel [S1].");
    let generator = ScriptedGenerator::new(&[output.as_str()]);
    let labeled = sources(&[("The barn roof was replaced with steel sheets last summer.", 0.6)]);
    let answer =
        synthesizer(generator).answer(&query("when was the old barn built", false), &labeled, &mut ()).unwrap();

    assert_eq!(answer.text, output);
    assert_eq!(answer.path, AnswerPath::Abstained);
}

#[test]
fn every_non_abstention_answer_is_cited() {
    let outputs: &[&[&str]] = &[
        &["Mulch keeps the soil moist [S1]."],
        &["Mulch keeps the soil moist."],
        &["Mulch [S9] keeps soil moist."],
        &[""],
        &["mulch keeps the soil moist"],
    ];
    let labeled = sources(&[
        ("Mulch keeps the soil moist through dry summer weeks.", 0.5),
        ("Straw mulch should be spread after the soil warms up.", 0.4),
    ]);
    for output in outputs {
        let answer = synthesizer(ScriptedGenerator::new(output))
            .answer(&query("why should the garden beds be mulched", false), &labeled, &mut ())
            .unwrap();
        if answer.path != AnswerPath::Abstained {
            assert!(has_valid_citation(&answer.text, labeled.len()), "{output:?} gave {:?}", answer.text);
        }
    }
}

#[test]
fn generator_failure_is_an_error() {
    let labeled = sources(&[("Seed potatoes go in when the soil reaches ten degrees.", 0.6)]);
    let err = synthesizer(Arc::new(FailingGenerator))
        .answer(&query("when do seed potatoes go in the ground", false), &labeled, &mut ())
        .unwrap_err();
    assert!(err.to_string().contains("model not loaded"));
}
