//! Pure scoring functions for CPC code comparison.
//!
//! Two stages, coarse to fine:
//! - `score_class`: compares the section/scheme prefix of two codes one
//!   character at a time, with an exact-class bonus
//! - `score_group`: rewards two groups that stay under a shared, more
//!   specific ancestor in the classification hierarchy

use expertrank_model::LevelEntry;

/// Compare the class halves of two CPC codes character by character.
///
/// Walks the first 4 characters (section + scheme) position by position,
/// adding `weights[i]` for each match and stopping at the first mismatch.
/// Later positions are never scored once a mismatch occurs, even if they
/// would coincidentally match. If all 4 positions matched and the remainder
/// of both halves (the class digits) is identical, adds the exact-class
/// bonus `weights[4]`.
///
/// `weights` must hold the 5 class-stage coordinates. Symmetric in its
/// two code arguments.
pub fn score_class(half_a: &str, half_b: &str, weights: &[f64]) -> f64 {
    let mut score = 0.0;

    let mut matched = 0;
    for (i, (ca, cb)) in half_a
        .bytes()
        .take(4)
        .zip(half_b.bytes().take(4))
        .enumerate()
    {
        if ca != cb {
            break;
        }
        score += weights[i];
        matched = i + 1;
    }

    let prefix_sum: f64 = weights[..4].iter().sum();
    if matched == 4 && score == prefix_sum && half_a.as_bytes()[4..] == half_b.as_bytes()[4..] {
        return score + weights[4];
    }

    score
}

/// Score the hierarchy proximity of two groups under one shared class.
///
/// `level_slice` is the ordered window of all known hierarchy entries whose
/// group suffix lies between the two compared codes' suffixes, endpoints
/// included (the first and last entries correspond exactly to the two
/// codes). `weights` holds the 12 group-stage coordinates; they are padded
/// internally with a leading zero sentinel so that prefix sums line up
/// with hierarchy levels.
///
/// An entry *between* the endpoints at a shallower level breaks the chain
/// of shared ancestry and caps the reward at that level's cumulative
/// weight.
pub fn score_group(level_slice: &[LevelEntry], weights: &[f64]) -> f64 {
    // Missing corpus data degrades to a zero contribution.
    if level_slice.is_empty() {
        return 0.0;
    }

    let mut padded = Vec::with_capacity(weights.len() + 1);
    padded.push(0.0);
    padded.extend_from_slice(weights);

    let first = level_slice[0].level as usize;
    let last = level_slice[level_slice.len() - 1].level as usize;
    let (lo, hi) = if first <= last {
        (first, last)
    } else {
        (last, first)
    };

    // Both endpoints are leaf siblings with no ancestor change possible.
    if lo == 1 && hi == 1 {
        return padded[1];
    }

    // One endpoint is itself a top-level grouping marker.
    if lo == 0 {
        return padded[2];
    }

    let interior: &[LevelEntry] = if level_slice.len() > 1 {
        &level_slice[1..level_slice.len() - 1]
    } else {
        &[]
    };
    let scan_top = if lo == hi { lo - 1 } else { lo };

    for level in 1..=scan_top {
        if interior.iter().any(|entry| entry.level as usize == level) {
            return padded[..=level].iter().sum();
        }
    }

    padded[..=scan_top].iter().sum()
}
