//! Error type shared by the codec, the index, persistence and classification.

use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by ecurve operations.
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed header or record in a persisted index or matrix.
    #[error("Invalid file: {0}")]
    Format(String),
    /// A character outside the alphabet was passed to the word codec.
    #[error("Invalid symbol {symbol:?} at position {position}")]
    InvalidSymbol { symbol: char, position: usize },
    /// Wrong number of symbols for a word, prefix or suffix.
    #[error("Expected {expected} symbols, got {got}")]
    WordLength { expected: usize, got: usize },
    /// A word whose prefix or suffix fields are out of range.
    #[error("Invalid word (prefix {prefix}, suffix {suffix:#x})")]
    InvalidWord { prefix: u32, suffix: u64 },
    /// Alphabet string rejected.
    #[error("Invalid alphabet: {0}")]
    Alphabet(String),
    /// Prefix/suffix lengths rejected.
    #[error("Invalid word geometry: {0}")]
    Geometry(String),
    /// Reserved family id.
    #[error("Invalid family id {0}")]
    InvalidFamily(u16),
    /// Key already present in an ordered map.
    #[error("Duplicate key")]
    DuplicateKey,
    /// Key absent from an ordered map.
    #[error("Key not found")]
    NotFound,
    /// Index entries were not supplied in strictly ascending word order.
    #[error("Entries are not in ascending word order")]
    Unsorted,
    /// Neither a forward nor a reverse index was supplied.
    #[error("No word index supplied")]
    EmptyIndex,
    /// Query cannot hold a single word.
    #[error("Sequence of length {len} is shorter than one word ({word_len})")]
    SequenceTooShort { len: usize, word_len: usize },
    /// Indices or matrices that cannot be used together.
    #[error("Incompatible inputs: {0}")]
    Incompatible(String),
    /// Bytemuck cast failed.
    #[error("Cast error: {0}")]
    Cast(String),
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Error::Format(message.into())
    }
}
