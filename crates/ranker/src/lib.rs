//! Pairwise patent similarity and expert ranking.
//!
//! Collapses all code-pair scores between two patents into one scalar and
//! expands a sorted patent scan into a deduplicated expert prediction list.

use expertrank_corpus::{CodeCorpus, ExpertHistory};
use expertrank_model::{Aggregate, CpcCode, LevelEntry, PatentId, RankedExpert, Weights};
use expertrank_scoring::{score_class, score_group};
use std::collections::HashSet;

/// Score every (code_a, code_b) pair in the cartesian product of one
/// patent's codes against another patent's codes.
///
/// Byte-identical codes short-circuit to the full-match score. Otherwise
/// the coarse class stage runs first, and the group-level hierarchy lookup
/// happens only for pairs that already match exactly through the class
/// level, including the exact-class bonus. Dissimilar codes never trigger
/// a hierarchy fetch.
pub fn pairwise_scores<C: CodeCorpus>(
    corpus: &C,
    codes_a: &[CpcCode],
    patent_b: PatentId,
    weights: &Weights,
) -> Vec<f64> {
    let codes_b = corpus.codes_for_patent(patent_b);

    let mut scores = Vec::with_capacity(codes_a.len() * codes_b.len());
    for code_a in codes_a {
        for code_b in &codes_b {
            if code_a == code_b {
                scores.push(weights.full_match_score());
                continue;
            }

            let mut score = score_class(code_a.class_half(), code_b.class_half(), weights.class());
            if score == weights.max_class_score() {
                let slice = level_slice(corpus, code_a, code_b);
                score += score_group(&slice, weights.group());
            }
            scores.push(score);
        }
    }

    scores
}

/// The window of hierarchy entries between two codes' group suffixes,
/// endpoints included. Both codes share the same class half when this is
/// called.
fn level_slice<C: CodeCorpus>(corpus: &C, code_a: &CpcCode, code_b: &CpcCode) -> Vec<LevelEntry> {
    let (lo, hi) = if code_a.group() <= code_b.group() {
        (code_a.group(), code_b.group())
    } else {
        (code_b.group(), code_a.group())
    };

    corpus
        .levels_under(code_a.class_half())
        .into_iter()
        .filter(|entry| entry.group.as_str() >= lo && entry.group.as_str() <= hi)
        .collect()
}

/// Ranks candidate experts for a query patent.
///
/// Holds its corpus and history adapters by reference; nothing here owns
/// mutable state.
pub struct ExpertRanker<'a, C, H> {
    corpus: &'a C,
    history: &'a H,
}

impl<'a, C: CodeCorpus, H: ExpertHistory> ExpertRanker<'a, C, H> {
    pub fn new(corpus: &'a C, history: &'a H) -> Self {
        Self { corpus, history }
    }

    /// Produce the full deduplicated expert ranking for `query`, strictly
    /// non-increasing by score.
    ///
    /// Every training patent is scored against the query via the pairwise
    /// aggregator and the injected `aggregate` reduction. The sorted patent
    /// list is then expanded to experts: each expert enters the ranking at
    /// the score of their best-matching patent, ties keeping first-seen
    /// order (stable sort). With `exclude_self` the query patent is removed
    /// from the scan, for leave-one-out evaluation.
    pub fn rank(
        &self,
        query: PatentId,
        weights: &Weights,
        aggregate: Aggregate,
        exclude_self: bool,
    ) -> Vec<RankedExpert> {
        let query_codes = self.corpus.codes_for_patent(query);

        let mut training = self.history.training_patents();
        if exclude_self {
            training.retain(|&patent| patent != query);
        }

        let mut scored: Vec<(PatentId, f64)> = training
            .into_iter()
            .map(|patent| {
                let scores = pairwise_scores(self.corpus, &query_codes, patent, weights);
                (patent, aggregate.apply(&scores))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut seen = HashSet::new();
        let mut ranking = Vec::new();
        for (patent, score) in scored {
            for expert in self.history.experts_for_patent(patent) {
                if seen.insert(expert) {
                    ranking.push(RankedExpert { expert, score });
                }
            }
        }

        tracing::debug!(
            query = %query,
            experts = ranking.len(),
            "Ranked candidate experts"
        );

        ranking
    }
}
