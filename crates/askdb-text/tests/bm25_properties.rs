use askdb_text::{tokenize, unique_terms, Bm25Params, Bm25Scorer, CorpusStats};

fn scorer(docs: &[Vec<String>]) -> Bm25Scorer {
    Bm25Scorer::new(Bm25Params::default(), CorpusStats::from_documents(docs.iter().map(Vec::as_slice)))
}

#[test]
fn score_never_drops_as_term_frequency_grows() {
    // Same length (8 tokens), the query term appears 0..=8 times.
    let docs: Vec<Vec<String>> = (0..=8)
        .map(|tf| {
            let mut words = vec!["pump"; tf];
            words.extend(std::iter::repeat("filler").take(8 - tf));
            tokenize(&words.join(" "))
        })
        .collect();
    let scorer = scorer(&docs);
    let query = unique_terms("pump");

    let scores: Vec<f32> = docs.iter().map(|d| scorer.score(&query, d)).collect();
    for pair in scores.windows(2) {
        assert!(pair[1] >= pair[0], "scores must be non-decreasing: {scores:?}");
    }
}

#[test]
fn longer_documents_are_normalized_down() {
    let short = tokenize("water filter");
    let long = tokenize("water filter cartridge replacement schedule notes appendix");
    let docs = vec![short.clone(), long.clone()];
    let scorer = scorer(&docs);
    let query = unique_terms("filter");
    assert!(scorer.score(&query, &short) > scorer.score(&query, &long));
}

#[test]
fn statistics_depend_on_the_document_set() {
    let target = tokenize("rainwater catchment design");
    let subset = vec![target.clone(), tokenize("rainwater barrels")];
    let corpus = vec![
        target.clone(),
        tokenize("rainwater barrels"),
        tokenize("compost heaps"),
        tokenize("goat fencing"),
    ];
    let query = unique_terms("rainwater");

    let in_subset = scorer(&subset).score(&query, &target);
    let in_corpus = scorer(&corpus).score(&query, &target);
    assert!(in_corpus > in_subset, "term is rarer across the wider corpus");
}

#[test]
fn repeated_query_terms_do_not_change_distinct_scoring() {
    let docs = vec![tokenize("battery bank sizing"), tokenize("inverter sizing")];
    let scorer = scorer(&docs);
    let once = scorer.score(&unique_terms("battery battery sizing"), &docs[0]);
    let plain = scorer.score(&unique_terms("battery sizing"), &docs[0]);
    assert!((once - plain).abs() < 1e-6);
}
