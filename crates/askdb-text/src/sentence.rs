/// Splits after `.`, `!` and `?`, collapsing internal whitespace. A trailing
/// fragment without terminal punctuation is kept as its own sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            push_normalized(&mut sentences, &current);
            current.clear();
        }
    }
    push_normalized(&mut sentences, &current);
    sentences
}

fn push_normalized(out: &mut Vec<String>, raw: &str) {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        out.push(normalized);
    }
}
