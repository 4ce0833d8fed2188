use askdb_core::error::{Error, Result};

/// `dot(a, b) / (|a| * |b|)`, or 0 when either norm is zero. Extra trailing
/// elements of the longer slice are ignored; use [`checked_cosine`] to reject
/// mismatched widths.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

pub fn checked_cosine(query: &[f32], candidate: &[f32]) -> Result<f32> {
    if query.len() != candidate.len() {
        return Err(Error::DimensionMismatch { expected: query.len(), actual: candidate.len() });
    }
    Ok(cosine(query, candidate))
}
