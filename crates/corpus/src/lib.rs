//! Corpus adapters for classification codes and expert history.
//!
//! Provides the `CodeCorpus` and `ExpertHistory` traits and their in-memory
//! implementation. This abstraction keeps the scoring and ranking logic
//! storage-agnostic: adapters are passed explicitly to every component that
//! needs corpus data, never held in process-wide state.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use expertrank_model::{CpcCode, ExpertId, LevelEntry, PatentId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from corpus loading.
///
/// Lookup misses are not errors: an unknown patent or class prefix degrades
/// to an empty sequence so that one missing record never invalidates a whole
/// ranking pass.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Failed to read corpus file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse corpus file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read-only access to the classification-code corpus.
pub trait CodeCorpus {
    /// All codes attached to a patent, duplicates preserved. Empty when the
    /// patent is unknown.
    fn codes_for_patent(&self, patent: PatentId) -> Vec<CpcCode>;

    /// All hierarchy entries under one class prefix, ordered by group
    /// suffix ascending. Empty when the prefix is unknown.
    fn levels_under(&self, class_prefix: &str) -> Vec<LevelEntry>;
}

/// Read-only access to historical expert testimony.
pub trait ExpertHistory {
    /// Experts known to have testified on a patent. Empty when unknown.
    fn experts_for_patent(&self, patent: PatentId) -> Vec<ExpertId>;

    /// All patents with at least one associated expert, in a stable
    /// deterministic order.
    fn training_patents(&self) -> Vec<PatentId>;

    /// The leave-one-out evaluation set: (patent, true expert) pairs where
    /// the patent has exactly one known expert and that expert appears on
    /// at least one other patent.
    fn evaluation_set(&self) -> Vec<(PatentId, ExpertId)>;
}

/// One patent-to-code row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpcRow {
    pub patent: PatentId,
    pub code: CpcCode,
}

/// One full-code-to-level row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelRow {
    pub code: CpcCode,
    pub level: u8,
}

/// One expert-testimony row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertRow {
    pub patent: PatentId,
    pub expert: ExpertId,
}

/// On-disk corpus format: three flat tables, mirroring the relational
/// layout the data is exported from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusFile {
    /// Patent-to-code pairings, one row per code.
    #[serde(default)]
    pub cpcs: Vec<CpcRow>,

    /// Hierarchy level per full code.
    #[serde(default)]
    pub levels: Vec<LevelRow>,

    /// Expert-to-patent pairings, one row per testimony.
    #[serde(default)]
    pub experts: Vec<ExpertRow>,
}

/// In-memory corpus implementing both adapter traits.
#[derive(Debug, Default)]
pub struct InMemoryCorpus {
    codes: HashMap<PatentId, Vec<CpcCode>>,
    // Class prefix -> entries sorted by group suffix.
    levels: HashMap<String, Vec<LevelEntry>>,
    // BTreeMap keeps training_patents() and evaluation_set() deterministic.
    experts: BTreeMap<PatentId, Vec<ExpertId>>,
    patents_per_expert: HashMap<ExpertId, usize>,
}

impl InMemoryCorpus {
    /// Build the lookup structures from flat table rows.
    pub fn from_file(file: CorpusFile) -> Self {
        let mut corpus = Self::default();

        for row in file.cpcs {
            corpus.codes.entry(row.patent).or_default().push(row.code);
        }

        for row in file.levels {
            let entry = LevelEntry::new(row.code.group(), row.level);
            corpus
                .levels
                .entry(row.code.class_half().to_string())
                .or_default()
                .push(entry);
        }
        for entries in corpus.levels.values_mut() {
            entries.sort_by(|a, b| a.group.cmp(&b.group));
        }

        for row in file.experts {
            corpus.experts.entry(row.patent).or_default().push(row.expert);
            *corpus.patents_per_expert.entry(row.expert).or_insert(0) += 1;
        }

        tracing::debug!(
            patents = corpus.codes.len(),
            classes = corpus.levels.len(),
            training_patents = corpus.experts.len(),
            "Corpus loaded"
        );

        corpus
    }

    /// Load a corpus from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let text = std::fs::read_to_string(path)?;
        let file: CorpusFile = serde_json::from_str(&text)?;
        Ok(Self::from_file(file))
    }
}

impl CodeCorpus for InMemoryCorpus {
    fn codes_for_patent(&self, patent: PatentId) -> Vec<CpcCode> {
        self.codes.get(&patent).cloned().unwrap_or_default()
    }

    fn levels_under(&self, class_prefix: &str) -> Vec<LevelEntry> {
        self.levels.get(class_prefix).cloned().unwrap_or_default()
    }
}

impl ExpertHistory for InMemoryCorpus {
    fn experts_for_patent(&self, patent: PatentId) -> Vec<ExpertId> {
        self.experts.get(&patent).cloned().unwrap_or_default()
    }

    fn training_patents(&self) -> Vec<PatentId> {
        self.experts.keys().copied().collect()
    }

    fn evaluation_set(&self) -> Vec<(PatentId, ExpertId)> {
        self.experts
            .iter()
            .filter_map(|(&patent, experts)| match experts.as_slice() {
                [expert] if self.patents_per_expert.get(expert).copied().unwrap_or(0) > 1 => {
                    Some((patent, *expert))
                }
                _ => None,
            })
            .collect()
    }
}

/// Memoizing wrapper over a `CodeCorpus`.
///
/// Repeated lookups for the same patent or prefix are common within one
/// cost evaluation; this bounds adapter I/O without violating the
/// read-only invariant. Single-threaded, matching the synchronous
/// execution model of the ranker and optimizer.
pub struct CachedCorpus<C> {
    inner: C,
    codes: RefCell<HashMap<PatentId, Vec<CpcCode>>>,
    levels: RefCell<HashMap<String, Vec<LevelEntry>>>,
}

impl<C: CodeCorpus> CachedCorpus<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            codes: RefCell::new(HashMap::new()),
            levels: RefCell::new(HashMap::new()),
        }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: CodeCorpus> CodeCorpus for CachedCorpus<C> {
    fn codes_for_patent(&self, patent: PatentId) -> Vec<CpcCode> {
        self.codes
            .borrow_mut()
            .entry(patent)
            .or_insert_with(|| self.inner.codes_for_patent(patent))
            .clone()
    }

    fn levels_under(&self, class_prefix: &str) -> Vec<LevelEntry> {
        if let Some(entries) = self.levels.borrow().get(class_prefix) {
            return entries.clone();
        }
        let entries = self.inner.levels_under(class_prefix);
        self.levels
            .borrow_mut()
            .insert(class_prefix.to_string(), entries.clone());
        entries
    }
}

// Adapters are routinely passed by reference.
impl<C: CodeCorpus + ?Sized> CodeCorpus for &C {
    fn codes_for_patent(&self, patent: PatentId) -> Vec<CpcCode> {
        (**self).codes_for_patent(patent)
    }

    fn levels_under(&self, class_prefix: &str) -> Vec<LevelEntry> {
        (**self).levels_under(class_prefix)
    }
}

impl<H: ExpertHistory + ?Sized> ExpertHistory for &H {
    fn experts_for_patent(&self, patent: PatentId) -> Vec<ExpertId> {
        (**self).experts_for_patent(patent)
    }

    fn training_patents(&self) -> Vec<PatentId> {
        (**self).training_patents()
    }

    fn evaluation_set(&self) -> Vec<(PatentId, ExpertId)> {
        (**self).evaluation_set()
    }
}
