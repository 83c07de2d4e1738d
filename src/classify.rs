//! Classification of protein sequences against forward and reverse word
//! indices.
//!
//! Every window of a query is looked up in the index; each neighbour found
//! contributes per-position alignment scores to its family. A family keeps
//! the best score per query position, and its total is the sum of those
//! maxima.

use rayon::prelude::*;

use crate::encode::{ALPHABET_SIZE, Amino, Geometry, Word, WordCodec};
use crate::error::{Error, Result};
use crate::index::{Family, WordIndex};
use crate::thresh::ThresholdMatrix;
use crate::tree::WordTree;

/// Scores at or below this never pass the default filter.
pub const EPSILON: f64 = 1e-5;

const MATRIX_STRIDE: usize = ALPHABET_SIZE * ALPHABET_SIZE;

/// Per-suffix-position substitution scores, `[position][from][to]`.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceMatrix {
    positions: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// All-zero matrix.
    pub fn new(positions: usize) -> Self {
        Self {
            positions,
            values: vec![0.0; positions * MATRIX_STRIDE],
        }
    }

    pub fn from_fn<F>(positions: usize, mut f: F) -> Self
    where
        F: FnMut(usize, Amino, Amino) -> f64,
    {
        let mut values = Vec::with_capacity(positions * MATRIX_STRIDE);
        for pos in 0..positions {
            for from in 0..ALPHABET_SIZE as Amino {
                for to in 0..ALPHABET_SIZE as Amino {
                    values.push(f(pos, from, to));
                }
            }
        }
        Self { positions, values }
    }

    /// Row-major `positions * 20 * 20` values.
    pub fn from_values(positions: usize, values: Vec<f64>) -> Result<Self> {
        if positions.checked_mul(MATRIX_STRIDE) != Some(values.len()) {
            return Err(Error::Incompatible(format!(
                "{} values for {positions} distance matrices",
                values.len()
            )));
        }
        Ok(Self { positions, values })
    }

    /// Number of suffix positions covered.
    #[inline]
    pub fn positions(&self) -> usize {
        self.positions
    }

    #[inline]
    fn offset(&self, pos: usize, from: Amino, to: Amino) -> Option<usize> {
        let (from, to) = (from as usize, to as usize);
        (pos < self.positions && from < ALPHABET_SIZE && to < ALPHABET_SIZE)
            .then_some(pos * MATRIX_STRIDE + from * ALPHABET_SIZE + to)
    }

    pub fn get(&self, pos: usize, from: Amino, to: Amino) -> Option<f64> {
        self.offset(pos, from, to).map(|i| self.values[i])
    }

    pub fn set(&mut self, pos: usize, from: Amino, to: Amino, value: f64) -> Result<()> {
        let i = self.offset(pos, from, to).ok_or_else(|| {
            Error::Incompatible(format!("no distance entry ({pos}, {from}, {to})"))
        })?;
        self.values[i] = value;
        Ok(())
    }
}

const UNSET: f64 = f64::NEG_INFINITY;

/// Running score of one family: a window of `P + S` query positions holding
/// the best score seen per position, and the total of positions already left
/// behind.
#[derive(Clone, Debug)]
struct FamilyScore {
    total: f64,
    base: usize,
    slots: Vec<f64>,
}

impl FamilyScore {
    fn new(word_len: usize, start: usize) -> Self {
        Self {
            total: 0.0,
            base: start,
            slots: vec![UNSET; word_len],
        }
    }

    /// Move the window to `start`, adding the positions that leave it.
    fn advance(&mut self, start: usize) {
        if start <= self.base {
            return;
        }
        let width = self.slots.len();
        let end = start.min(self.base.saturating_add(width));
        for pos in self.base..end {
            let slot = &mut self.slots[pos % width];
            if *slot > UNSET {
                self.total += *slot;
            }
            *slot = UNSET;
        }
        self.base = start;
    }

    /// `pos` must lie in the current window.
    fn record(&mut self, pos: usize, score: f64) {
        let width = self.slots.len();
        let slot = &mut self.slots[pos % width];
        if score > *slot {
            *slot = score;
        }
    }

    fn finish(mut self) -> f64 {
        self.advance(usize::MAX);
        self.total
    }
}

struct Scorer<'a> {
    distances: &'a DistanceMatrix,
    geometry: Geometry,
    families: WordTree<u64, FamilyScore>,
}

impl<'a> Scorer<'a> {
    fn new(distances: &'a DistanceMatrix, geometry: Geometry) -> Self {
        Self {
            distances,
            geometry,
            families: WordTree::new(),
        }
    }

    /// Score the neighbours of `query`, a word starting at `start`.
    /// Reverse words map suffix position `i` to query position `S - 1 - i`.
    fn score(&mut self, index: &WordIndex, query: Word, start: usize, reverse: bool) -> Result<()> {
        let Some(nb) = index.neighbors(query) else {
            return Ok(());
        };
        let (p, s) = (self.geometry.prefix_len(), self.geometry.suffix_len());

        for i in nb.indices() {
            let (Some(found), Some(family)) = (index.word_at(i), index.family_at(i)) else {
                continue;
            };
            // Mapped tables are not verified on open.
            index.codec().check(found)?;
            let key = family as u64;
            if self.families.get(&key).is_none() {
                self.families
                    .insert(key, FamilyScore::new(self.geometry.word_len(), start))?;
            }
            let Some(entry) = self.families.get_mut(&key) else {
                continue;
            };
            entry.advance(start);
            for pos in 0..s {
                let from = query.suffix_amino(pos, self.geometry);
                let to = found.suffix_amino(pos, self.geometry);
                let score = self.distances.get(pos, from, to).ok_or_else(|| {
                    Error::Incompatible(format!("no distance entry ({pos}, {from}, {to})"))
                })?;
                let at = if reverse { start + s - 1 - pos } else { start + p + pos };
                entry.record(at, score);
            }
        }
        Ok(())
    }

    /// Final totals in ascending family order.
    fn finish(self) -> Vec<(Family, f64)> {
        self.families
            .into_sorted()
            .map(|(family, score)| (family as Family, score.finish()))
            .collect()
    }
}

/// Which families a classification reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// The single best-scoring family.
    #[default]
    Max,
    /// Every family passing the filter.
    All,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    pub family: Family,
    pub score: f64,
}

/// Score predicate: `(sequence length, score) -> pass`.
pub type Filter = Box<dyn Fn(usize, f64) -> bool + Send + Sync>;

/// Classifier over a forward and/or reverse index sharing one codec.
pub struct Classifier<'a> {
    distances: &'a DistanceMatrix,
    fwd: Option<&'a WordIndex>,
    rev: Option<&'a WordIndex>,
    codec: WordCodec,
    mode: Mode,
    filter: Option<Filter>,
}

impl<'a> Classifier<'a> {
    pub fn new(
        distances: &'a DistanceMatrix,
        fwd: Option<&'a WordIndex>,
        rev: Option<&'a WordIndex>,
    ) -> Result<Self> {
        let codec = fwd.or(rev).ok_or(Error::EmptyIndex)?.codec().clone();
        if let (Some(f), Some(r)) = (fwd, rev) {
            if f.codec() != r.codec() {
                return Err(Error::Incompatible(
                    "forward and reverse indices use different codecs".into(),
                ));
            }
        }
        let s = codec.geometry().suffix_len();
        if distances.positions() != s {
            return Err(Error::Incompatible(format!(
                "{} distance matrices for suffix length {s}",
                distances.positions()
            )));
        }
        Ok(Self {
            distances,
            fwd,
            rev,
            codec,
            mode: Mode::default(),
            filter: None,
        })
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the default `score > EPSILON` filter.
    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, f64) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(f));
        self
    }

    /// Filter with per-length protein cutoffs.
    pub fn thresholds(self, t: &ThresholdMatrix) -> Self {
        let t = t.clone();
        self.filter(move |len, score| score >= t.protein_cutoff(len))
    }

    fn passes(&self, len: usize, score: f64) -> bool {
        match &self.filter {
            Some(f) => f(len, score),
            None => score > EPSILON,
        }
    }

    pub fn classify(&self, seq: &[u8]) -> Result<Vec<Prediction>> {
        let word_len = self.codec.geometry().word_len();
        if seq.len() < word_len {
            return Err(Error::SequenceTooShort {
                len: seq.len(),
                word_len,
            });
        }

        let mut scorer = Scorer::new(self.distances, self.codec.geometry());
        for (start, fwd, rev) in self.codec.words(seq) {
            if let Some(index) = self.fwd {
                scorer.score(index, fwd, start, false)?;
            }
            if let Some(index) = self.rev {
                scorer.score(index, rev, start, true)?;
            }
        }

        let passing = scorer
            .finish()
            .into_iter()
            .filter(|&(_, score)| self.passes(seq.len(), score))
            .map(|(family, score)| Prediction { family, score });

        Ok(match self.mode {
            Mode::All => passing.collect(),
            // Ascending family order: ties keep the lowest id.
            Mode::Max => passing
                .fold(None, |best: Option<Prediction>, p| match best {
                    Some(b) if b.score >= p.score => Some(b),
                    _ => Some(p),
                })
                .into_iter()
                .collect(),
        })
    }

    /// Classify `seqs` in parallel; results are in input order.
    pub fn classify_many<S>(&self, seqs: &[S]) -> Vec<Result<Vec<Prediction>>>
    where
        S: AsRef<[u8]> + Sync,
    {
        seqs.par_iter().map(|s| self.classify(s.as_ref())).collect()
    }

    /// Every reported score over `seqs`, in no particular order.
    ///
    /// Sequences shorter than one word are skipped.
    pub fn pooled_scores<S>(&self, seqs: &[S]) -> Result<Vec<f64>>
    where
        S: AsRef<[u8]> + Sync,
    {
        seqs.par_iter()
            .try_fold(Vec::new, |mut acc, s| {
                match self.classify(s.as_ref()) {
                    Ok(preds) => acc.extend(preds.iter().map(|p| p.score)),
                    Err(Error::SequenceTooShort { .. }) => {}
                    Err(e) => return Err(e),
                }
                Ok(acc)
            })
            .try_reduce(Vec::new, |mut a, b| {
                a.extend(b);
                Ok(a)
            })
    }
}

impl std::fmt::Debug for Classifier<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("codec", &self.codec)
            .field("forward", &self.fwd.is_some())
            .field("reverse", &self.rev.is_some())
            .field("mode", &self.mode)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// Best family for `seq` (default filter).
pub fn classify(
    seq: &[u8],
    distances: &DistanceMatrix,
    fwd: Option<&WordIndex>,
    rev: Option<&WordIndex>,
) -> Result<Vec<Prediction>> {
    Classifier::new(distances, fwd, rev)?.classify(seq)
}

/// Every family passing the default filter, ascending by family id.
pub fn classify_all(
    seq: &[u8],
    distances: &DistanceMatrix,
    fwd: Option<&WordIndex>,
    rev: Option<&WordIndex>,
) -> Result<Vec<Prediction>> {
    Classifier::new(distances, fwd, rev)?
        .mode(Mode::All)
        .classify(seq)
}
