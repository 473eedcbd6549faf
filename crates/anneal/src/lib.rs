//! Parameter tuning: leave-one-out cost evaluation and simulated annealing.
//!
//! The cost of a parameter vector is the sum, over the evaluation set, of
//! the rank position at which the true expert appears in the prediction
//! list. The annealer walks the 17-dimensional unit cube one coordinate at
//! a time, accepting regressions with a temperature-decaying probability.

use expertrank_corpus::{CodeCorpus, ExpertHistory};
use expertrank_model::{Aggregate, ExpertId, PatentId, Weights, WeightsError, PARAM_COUNT};
use expertrank_ranker::ExpertRanker;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Errors from cost evaluation and optimization runs.
#[derive(Debug, Error)]
pub enum AnnealError {
    /// No qualifying (patent, expert) pairs exist; a cost has no meaning
    /// and the run cannot proceed.
    #[error("Evaluation set is empty")]
    EmptyEvaluationSet,

    #[error(transparent)]
    InvalidWeights(#[from] WeightsError),
}

/// Evaluates parameter vectors against the historical-accuracy objective.
///
/// The evaluation set is built once at construction and is immutable for
/// the lifetime of the evaluator.
pub struct CostEvaluator<'a, C, H> {
    ranker: ExpertRanker<'a, C, H>,
    evaluation_set: Vec<(PatentId, ExpertId)>,
}

impl<'a, C: CodeCorpus, H: ExpertHistory> CostEvaluator<'a, C, H> {
    pub fn new(corpus: &'a C, history: &'a H) -> Result<Self, AnnealError> {
        let evaluation_set = history.evaluation_set();
        if evaluation_set.is_empty() {
            return Err(AnnealError::EmptyEvaluationSet);
        }

        tracing::debug!(patents = evaluation_set.len(), "Evaluation set built");

        Ok(Self {
            ranker: ExpertRanker::new(corpus, history),
            evaluation_set,
        })
    }

    /// Total cost of one parameter vector: for each held-out patent, the
    /// zero-based position of its true expert in the leave-one-out ranking.
    ///
    /// A true expert missing from the ranking altogether is charged the
    /// ranking's full length, the position one past the end of the scan.
    pub fn cost(&self, weights: &Weights, aggregate: Aggregate) -> u64 {
        let mut total = 0u64;

        for &(patent, true_expert) in &self.evaluation_set {
            let ranking = self.ranker.rank(patent, weights, aggregate, true);
            let position = ranking
                .iter()
                .position(|entry| entry.expert == true_expert)
                .unwrap_or(ranking.len());
            total += position as u64;
        }

        total
    }

    pub fn evaluation_set(&self) -> &[(PatentId, ExpertId)] {
        &self.evaluation_set
    }
}

/// Annealing schedule and perturbation settings.
#[derive(Debug, Clone)]
pub struct AnnealConfig {
    /// Starting temperature.
    pub temperature: f64,

    /// Multiplicative cooling factor, 0 < cooling < 1.
    pub cooling: f64,

    /// Temperature floor terminating the run.
    pub floor: f64,

    /// Half-width of the uniform perturbation applied to one coordinate.
    pub step: f64,

    /// RNG seed for reproducible runs; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            temperature: 10_000.0,
            cooling: 0.95,
            floor: 0.1,
            step: 1.0,
            seed: None,
        }
    }
}

/// Perturb one uniformly-chosen coordinate by a uniform delta, wrapping
/// around the [0, 1] interval rather than clamping: overshoot past 1 comes
/// back in from 0, undershoot past 0 comes back in from 1.
fn shift_params(values: &[f64; PARAM_COUNT], step: f64, rng: &mut impl Rng) -> [f64; PARAM_COUNT] {
    let index = rng.gen_range(0..PARAM_COUNT);
    let delta = rng.gen_range(-step..=step);

    let mut shifted = *values;
    shifted[index] += delta;
    if shifted[index] > 1.0 {
        shifted[index] -= 1.0;
    } else if shifted[index] < 0.0 {
        shifted[index] += 1.0;
    }

    shifted
}

/// Tune a parameter vector by simulated annealing.
///
/// Starts from `start` when supplied (resuming a previous run) or a uniform
/// random point otherwise. Each iteration perturbs one coordinate,
/// re-evaluates the cost, accepts strict improvements unconditionally and
/// regressions with probability `exp(-(old + new) / temperature)`, then
/// cools. The run ends when the temperature reaches the floor; the vector
/// held at that moment is returned. A starting temperature at or below the
/// floor returns the start vector after zero iterations.
pub fn optimize<C: CodeCorpus, H: ExpertHistory>(
    evaluator: &CostEvaluator<'_, C, H>,
    aggregate: Aggregate,
    config: &AnnealConfig,
    start: Option<Weights>,
) -> Result<Weights, AnnealError> {
    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let mut current = match start {
        Some(weights) => weights,
        None => {
            let mut values = [0.0; PARAM_COUNT];
            for value in values.iter_mut() {
                *value = rng.gen_range(0.0..=1.0);
            }
            Weights::new(&values)?
        }
    };
    let mut current_cost = evaluator.cost(&current, aggregate);

    tracing::info!(cost = current_cost, "Annealing start");

    let mut temperature = config.temperature;
    let mut iteration = 0u64;

    while temperature > config.floor {
        let mut values = [0.0; PARAM_COUNT];
        values.copy_from_slice(current.as_slice());
        let shifted = shift_params(&values, config.step, &mut rng);
        let candidate = Weights::new(&shifted)?;
        let candidate_cost = evaluator.cost(&candidate, aggregate);

        // Historical acceptance criterion: the exponent sums the two costs
        // rather than taking their difference.
        let probability = (-((current_cost + candidate_cost) as f64) / temperature).exp();
        let accepted = candidate_cost < current_cost || rng.gen::<f64>() < probability;

        tracing::debug!(
            iteration,
            temperature,
            candidate_cost,
            current_cost,
            accepted,
            "Annealing step"
        );

        if accepted {
            current = candidate;
            current_cost = candidate_cost;
        }

        temperature *= config.cooling;
        iteration += 1;
    }

    tracing::info!(iterations = iteration, cost = current_cost, "Annealing done");

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use expertrank_corpus::{CorpusFile, CpcRow, ExpertRow, InMemoryCorpus, LevelRow};
    use expertrank_model::CpcCode;
    use pretty_assertions::assert_eq;

    fn sample_corpus() -> InMemoryCorpus {
        // Patents 1 and 2 share codes and expert 100; patent 3 is distant
        // with expert 200 on two patents (3 and 4).
        InMemoryCorpus::from_file(CorpusFile {
            cpcs: vec![
                CpcRow { patent: PatentId(1), code: CpcCode::new("A01B1/02") },
                CpcRow { patent: PatentId(2), code: CpcCode::new("A01B1/02") },
                CpcRow { patent: PatentId(3), code: CpcCode::new("Z99Z9/99") },
                CpcRow { patent: PatentId(4), code: CpcCode::new("Z99Z9/99") },
            ],
            levels: vec![LevelRow { code: CpcCode::new("A01B1/02"), level: 1 }],
            experts: vec![
                ExpertRow { patent: PatentId(1), expert: ExpertId(100) },
                ExpertRow { patent: PatentId(2), expert: ExpertId(100) },
                ExpertRow { patent: PatentId(3), expert: ExpertId(200) },
                ExpertRow { patent: PatentId(4), expert: ExpertId(200) },
            ],
        })
    }

    #[test]
    fn test_cost_counts_rank_positions() {
        let corpus = sample_corpus();
        let evaluator = CostEvaluator::new(&corpus, &corpus).unwrap();

        // All four patents qualify for the evaluation set, and each true
        // expert sits at the top of its leave-one-out ranking.
        assert_eq!(evaluator.evaluation_set().len(), 4);
        assert_eq!(evaluator.cost(&Weights::uniform(), Aggregate::Max), 0);
    }

    #[test]
    fn test_cost_degrades_gracefully_on_missing_codes() {
        // Patent 4 has an expert but no retrievable codes; it still ranks
        // (at zero score) instead of aborting the pass.
        let corpus = InMemoryCorpus::from_file(CorpusFile {
            cpcs: vec![
                CpcRow { patent: PatentId(1), code: CpcCode::new("A01B1/02") },
                CpcRow { patent: PatentId(2), code: CpcCode::new("A01B1/02") },
                CpcRow { patent: PatentId(3), code: CpcCode::new("A01B1/02") },
            ],
            levels: vec![],
            experts: vec![
                ExpertRow { patent: PatentId(1), expert: ExpertId(100) },
                ExpertRow { patent: PatentId(2), expert: ExpertId(100) },
                ExpertRow { patent: PatentId(3), expert: ExpertId(200) },
                ExpertRow { patent: PatentId(4), expert: ExpertId(200) },
            ],
        });
        let evaluator = CostEvaluator::new(&corpus, &corpus).unwrap();

        // Patent 4 is in the evaluation set but has no codes; its ranking
        // still lists every expert, with 200 behind 100, contributing 1.
        // Patents 1 and 2 contribute 0, patent 3 contributes 1.
        assert_eq!(evaluator.cost(&Weights::uniform(), Aggregate::Max), 2);
    }

    /// History double whose evaluation set names an expert that no patent
    /// expansion ever produces.
    struct OrphanHistory(InMemoryCorpus);

    impl ExpertHistory for OrphanHistory {
        fn experts_for_patent(&self, patent: PatentId) -> Vec<ExpertId> {
            self.0.experts_for_patent(patent)
        }

        fn training_patents(&self) -> Vec<PatentId> {
            self.0.training_patents()
        }

        fn evaluation_set(&self) -> Vec<(PatentId, ExpertId)> {
            vec![(PatentId(1), ExpertId(999))]
        }
    }

    #[test]
    fn test_cost_charges_absent_expert_full_ranking_length() {
        let corpus = sample_corpus();
        let history = OrphanHistory(sample_corpus());
        let evaluator = CostEvaluator::new(&corpus, &history).unwrap();

        // The leave-one-out ranking for patent 1 holds experts 100 and 200;
        // the unknown true expert is charged the full length of 2.
        assert_eq!(evaluator.cost(&Weights::uniform(), Aggregate::Max), 2);
    }

    #[test]
    fn test_empty_evaluation_set_is_fatal() {
        let corpus = InMemoryCorpus::from_file(CorpusFile::default());
        assert!(matches!(
            CostEvaluator::new(&corpus, &corpus),
            Err(AnnealError::EmptyEvaluationSet)
        ));
    }

    #[test]
    fn test_shift_wraps_instead_of_clamping() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let values = [0.5; PARAM_COUNT];
        for _ in 0..200 {
            let shifted = shift_params(&values, 1.0, &mut rng);
            for &v in &shifted {
                assert!((0.0..=1.0).contains(&v), "coordinate escaped: {}", v);
            }
        }
    }

    #[test]
    fn test_shift_changes_exactly_one_coordinate() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let values = [0.5; PARAM_COUNT];
        let shifted = shift_params(&values, 0.1, &mut rng);
        let changed = values
            .iter()
            .zip(shifted.iter())
            .filter(|(a, b)| a != b)
            .count();
        assert!(changed <= 1);
    }

    #[test]
    fn test_optimize_below_floor_returns_start_unchanged() {
        let corpus = sample_corpus();
        let evaluator = CostEvaluator::new(&corpus, &corpus).unwrap();
        let start = Weights::uniform();

        let config = AnnealConfig {
            temperature: 0.05,
            ..Default::default()
        };
        let tuned = optimize(&evaluator, Aggregate::Mean, &config, Some(start.clone())).unwrap();
        assert_eq!(tuned, start);
    }

    #[test]
    fn test_optimize_keeps_coordinates_in_unit_interval() {
        let corpus = sample_corpus();
        let evaluator = CostEvaluator::new(&corpus, &corpus).unwrap();

        let config = AnnealConfig {
            temperature: 10.0,
            cooling: 0.7,
            seed: Some(42),
            ..Default::default()
        };
        let tuned = optimize(&evaluator, Aggregate::Mean, &config, None).unwrap();
        for &v in tuned.as_slice() {
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
