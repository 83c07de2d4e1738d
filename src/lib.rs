//! Protein family classification against a two-level word index ("ecurve").
//!
//! A word is `P + S` amino acids (6 + 12 by default), split into a dense
//! prefix table and per-prefix sorted suffix runs. Queries are classified by
//! scoring the index entries ordinally adjacent to each of their words.
//!
//! - [`encode`]: alphabet, word geometry, word codec and rolling iteration.
//! - [`WordIndex`]: lookup structure, owned or memory-mapped.
//! - [`io`]: binary, plain text and mmap image persistence (optionally gzip).
//! - [`build_index`] / [`IndexBuilder`]: construction from labelled sequences.
//! - [`Classifier`]: per-query scoring, batch classification on rayon.
//! - [`ThresholdMatrix`]: calibration cutoffs used as classification filters.
//!
//! See README for the on-disk formats.

mod builder;
pub mod classify;
pub mod encode;
mod error;
mod index;
pub mod io;
pub mod pack;
pub mod thresh;
pub mod tree;

pub use builder::{BuildConfig, Direction, IndexBuilder, build_index};
pub use classify::{Classifier, DistanceMatrix, Mode, Prediction, classify, classify_all};
pub use encode::{Alphabet, Geometry, Word, WordCodec};
pub use error::{Error, Result};
pub use index::{
    FAMILY_INVALID, FAMILY_MAX, Family, Nearest, Neighbors, PrefixEntry, RunState, WordIndex,
};
pub use io::{Compression, Format, StorageOptions, load, load_file, store, store_file};
pub use thresh::ThresholdMatrix;
pub use tree::WordTree;
