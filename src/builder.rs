//! Index construction from family-labelled protein sequences.
//!
//! Words are extracted in parallel (rayon) over blocks of records and
//! inserted by a single writer in input order, so the result does not depend
//! on the thread count.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::encode::{Word, WordCodec};
use crate::error::Result;
use crate::index::{Family, WordIndex, check_family};
use crate::tree::WordTree;

const BLOCK_SIZE: usize = 4_096;

/// Which word of each window is indexed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    /// The window as read (forward index).
    #[default]
    Forward,
    /// The window read backwards (reverse index).
    Reverse,
}

/// Build-time configuration.
#[derive(Clone, Debug, Default)]
pub struct BuildConfig {
    direction: Direction,
    keep_ambiguous: bool,
    min_seq_len: usize,
    threads: Option<usize>,
}

impl BuildConfig {
    pub fn direction(mut self, d: Direction) -> Self {
        self.direction = d;
        self
    }
    /// Keep words seen with several families under their first family
    /// (default: drop them).
    pub fn keep_ambiguous(mut self, yes: bool) -> Self {
        self.keep_ambiguous = yes;
        self
    }
    /// Minimum sequence length to consider (shorter sequences are skipped).
    pub fn min_seq_len(mut self, n: usize) -> Self {
        self.min_seq_len = n;
        self
    }
    /// Fix the number of threads used by rayon.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    family: Family,
    ambiguous: bool,
}

/// Accumulates `(word, family)` pairs and flattens them into a [`WordIndex`].
#[derive(Debug)]
pub struct IndexBuilder {
    codec: WordCodec,
    direction: Direction,
    keep_ambiguous: bool,
    min_seq_len: usize,
    words: WordTree<Word, Slot>,
    ambiguous: usize,
}

impl IndexBuilder {
    pub fn new(codec: WordCodec, cfg: &BuildConfig) -> Self {
        Self {
            codec,
            direction: cfg.direction,
            keep_ambiguous: cfg.keep_ambiguous,
            min_seq_len: cfg.min_seq_len,
            words: WordTree::new(),
            ambiguous: 0,
        }
    }

    /// Record `word` under `family`.
    ///
    /// Repeating a pair is a no-op; a second, different family marks the word
    /// ambiguous.
    pub fn insert(&mut self, word: Word, family: Family) -> Result<()> {
        self.codec.check(word)?;
        check_family(family)?;
        match self.words.get_mut(&word) {
            Some(slot) => {
                if slot.family != family && !slot.ambiguous {
                    slot.ambiguous = true;
                    self.ambiguous += 1;
                }
                Ok(())
            }
            None => self.words.insert(
                word,
                Slot {
                    family,
                    ambiguous: false,
                },
            ),
        }
    }

    /// Record every word of `seq` under `family`. Returns the number of
    /// windows seen.
    pub fn add_sequence(&mut self, seq: &[u8], family: Family) -> Result<usize> {
        if seq.len() < self.min_seq_len {
            return Ok(0);
        }
        let words = extract_words(&self.codec, self.direction, seq);
        for &word in &words {
            self.insert(word, family)?;
        }
        Ok(words.len())
    }

    /// Distinct words recorded so far, ambiguous ones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words seen with more than one family.
    #[inline]
    pub fn ambiguous(&self) -> usize {
        self.ambiguous
    }

    pub fn finish(self) -> Result<WordIndex> {
        let IndexBuilder {
            codec,
            direction,
            keep_ambiguous,
            words,
            ambiguous,
            ..
        } = self;
        debug!(ambiguous, keep_ambiguous, "resolving ambiguous words");

        let entries = words
            .into_sorted()
            .filter(|(_, slot)| keep_ambiguous || !slot.ambiguous)
            .map(|(word, slot)| (word, slot.family));
        let index = WordIndex::from_sorted(codec, entries)?;

        info!(
            words = index.len(),
            ambiguous,
            direction = ?direction,
            prefix_len = index.geometry().prefix_len(),
            suffix_len = index.geometry().suffix_len(),
            "built word index"
        );
        Ok(index)
    }
}

/// Build an index from `(family, sequence)` records.
pub fn build_index<S>(
    codec: WordCodec,
    records: &[(Family, S)],
    cfg: &BuildConfig,
) -> Result<WordIndex>
where
    S: AsRef<[u8]> + Sync,
{
    if let Some(n) = cfg.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok();
        debug!(threads = n, "rayon pool requested");
    }

    let mut builder = IndexBuilder::new(codec, cfg);
    for block in records.chunks(BLOCK_SIZE) {
        let shards: Vec<(Family, Vec<Word>)> = block
            .par_iter()
            .filter(|(_, seq)| seq.as_ref().len() >= cfg.min_seq_len)
            .map(|(family, seq)| {
                (
                    *family,
                    extract_words(&builder.codec, cfg.direction, seq.as_ref()),
                )
            })
            .collect();

        for (family, words) in shards {
            for word in words {
                builder.insert(word, family)?;
            }
        }
    }
    builder.finish()
}

fn extract_words(codec: &WordCodec, direction: Direction, seq: &[u8]) -> Vec<Word> {
    codec
        .words(seq)
        .map(|(_, fwd, rev)| match direction {
            Direction::Forward => fwd,
            Direction::Reverse => rev,
        })
        .collect()
}
