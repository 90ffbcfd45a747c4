//! Confidence propagation for blast-radius traversal.
//!
//! Path confidence is the product of the traversed edge confidences with a
//! per-hop decay applied from the second hop on, so a direct caller over an
//! exact edge still scores 1.0. A node reached by several paths keeps the
//! highest path confidence; the radius-wide score is the mean over the
//! reached set.

/// Per-hop decay applied beyond the first hop.
pub const DECAY_FACTOR: f32 = 0.9;

/// Applied to the overall confidence when node or wall-clock limits cut the
/// traversal short.
pub const TRUNCATION_PENALTY: f32 = 0.8;

/// Confidence of a path extended by one edge to a node at `hop` (1-based).
///
/// # Examples
///
/// ```
/// use ripple::impact::confidence::step_confidence;
///
/// // Direct caller over an exact edge: no decay.
/// assert_eq!(step_confidence(1.0, 1.0, 1), 1.0);
/// // Second hop picks up one decay factor.
/// assert!((step_confidence(1.0, 1.0, 2) - 0.9).abs() < 0.001);
/// ```
pub fn step_confidence(parent_confidence: f32, edge_confidence: f32, hop: usize) -> f32 {
    let decay = if hop >= 2 { DECAY_FACTOR } else { 1.0 };
    clamp_unit(parent_confidence * edge_confidence * decay)
}

/// Mean over per-node confidences. An empty reached set is a certain answer:
/// nothing depends on the change.
pub fn mean_confidence(values: impl IntoIterator<Item = f32>) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        1.0
    } else {
        clamp_unit(sum / count as f32)
    }
}

pub fn apply_truncation(confidence: f32) -> f32 {
    clamp_unit(confidence * TRUNCATION_PENALTY)
}

pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}
