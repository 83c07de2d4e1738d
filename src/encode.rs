//! Word encoding: amino-acid alphabet, prefix/suffix split, rolling words.
//!
//! Conventions
//! - A word is `P + S` amino acids (`Geometry::STANDARD` is 6 + 12).
//! - `prefix` is the first `P` amino acids as a base-20 number, first symbol
//!   most significant. Every value in `[0, 20^P)` is a valid prefix.
//! - `suffix` packs the last `S` amino acids into 5-bit fields, first symbol
//!   in the most significant field. Not every bit pattern is valid.
//! - `Word` orders by `(prefix, suffix)`, which is the index sort order.

use crate::error::{Error, Result};

/// Number of amino acids in an alphabet.
pub const ALPHABET_SIZE: usize = 20;

/// Bits per amino acid in a suffix.
pub const AMINO_BITS: u32 = 5;

const AMINO_MASK: u64 = (1 << AMINO_BITS) - 1;

/// Alphabet used when none is given.
pub const DEFAULT_ALPHABET: &str = "ARNDCQEGHILKMFPSTWYV";

/// Amino acid code in `0..ALPHABET_SIZE`.
pub type Amino = u8;

const INVALID: u8 = 0xFF;

/// Mapping between alphabet symbols and amino acid codes.
///
/// Amino acid `i` is the `i`-th symbol of the alphabet string. Lookups are
/// case-insensitive; the stored string is uppercase.
#[derive(Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: String,
    lut: [u8; 256],
}

impl Alphabet {
    /// Build an alphabet from exactly 20 distinct ASCII letters.
    pub fn new(symbols: &str) -> Result<Self> {
        if symbols.len() != ALPHABET_SIZE {
            return Err(Error::Alphabet(format!(
                "expected {ALPHABET_SIZE} symbols, got {:?}",
                symbols
            )));
        }
        let upper = symbols.to_ascii_uppercase();
        let mut seen = [false; 256];
        for &b in upper.as_bytes() {
            if !b.is_ascii_alphabetic() {
                return Err(Error::Alphabet(format!("{:?} is not a letter", b as char)));
            }
            if seen[b as usize] {
                return Err(Error::Alphabet(format!("{:?} appears twice", b as char)));
            }
            seen[b as usize] = true;
        }
        Ok(Self::from_upper(upper))
    }

    /// Parse an alphabet from its persisted bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(bytes)
            .map_err(|_| Error::Alphabet("alphabet is not valid UTF-8".into()))?;
        Self::new(s)
    }

    fn from_upper(symbols: String) -> Self {
        let mut lut = [INVALID; 256];
        for (i, &b) in symbols.as_bytes().iter().enumerate() {
            lut[b as usize] = i as u8;
            lut[b.to_ascii_lowercase() as usize] = i as u8;
        }
        Self { symbols, lut }
    }

    /// The alphabet string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.symbols
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.symbols.as_bytes()
    }

    /// Amino acid code of `symbol`, `None` if it is not in the alphabet.
    #[inline]
    pub fn to_amino(&self, symbol: u8) -> Option<Amino> {
        let v = self.lut[symbol as usize];
        if v == INVALID { None } else { Some(v) }
    }

    /// Symbol of amino acid `amino`, `None` if out of range.
    #[inline]
    pub fn to_symbol(&self, amino: Amino) -> Option<u8> {
        self.symbols.as_bytes().get(amino as usize).copied()
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::from_upper(DEFAULT_ALPHABET.to_owned())
    }
}

impl std::fmt::Debug for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Alphabet").field(&self.symbols).finish()
    }
}

/// Prefix and suffix lengths of a word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Geometry {
    prefix_len: u8,
    suffix_len: u8,
}

impl Geometry {
    /// 6 prefix + 12 suffix amino acids.
    pub const STANDARD: Geometry = Geometry {
        prefix_len: 6,
        suffix_len: 12,
    };
    /// `20^7` is the largest prefix space that fits `u32`.
    pub const MAX_PREFIX_LEN: usize = 7;
    /// `12 * 5` bits is the largest suffix that fits `u64`.
    pub const MAX_SUFFIX_LEN: usize = 12;

    pub fn new(prefix_len: usize, suffix_len: usize) -> Result<Self> {
        if !(1..=Self::MAX_PREFIX_LEN).contains(&prefix_len) {
            return Err(Error::Geometry(format!(
                "prefix length {prefix_len} outside 1..={}",
                Self::MAX_PREFIX_LEN
            )));
        }
        if !(1..=Self::MAX_SUFFIX_LEN).contains(&suffix_len) {
            return Err(Error::Geometry(format!(
                "suffix length {suffix_len} outside 1..={}",
                Self::MAX_SUFFIX_LEN
            )));
        }
        Ok(Self {
            prefix_len: prefix_len as u8,
            suffix_len: suffix_len as u8,
        })
    }

    #[inline]
    pub fn prefix_len(&self) -> usize {
        self.prefix_len as usize
    }

    #[inline]
    pub fn suffix_len(&self) -> usize {
        self.suffix_len as usize
    }

    #[inline]
    pub fn word_len(&self) -> usize {
        self.prefix_len() + self.suffix_len()
    }

    /// Number of distinct prefixes, `20^P`.
    #[inline]
    pub fn prefix_count(&self) -> u32 {
        (ALPHABET_SIZE as u32).pow(self.prefix_len as u32)
    }

    /// Bits used by a suffix.
    #[inline]
    pub fn suffix_mask(&self) -> u64 {
        (1u64 << (AMINO_BITS * self.suffix_len as u32)) - 1
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// An encoded word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Word {
    pub prefix: u32,
    pub suffix: u64,
}

impl Word {
    #[inline]
    pub const fn new(prefix: u32, suffix: u64) -> Self {
        Self { prefix, suffix }
    }

    /// Position of the word in the `(prefix, suffix)` order as one integer.
    #[inline]
    pub fn ordinal(&self) -> u128 {
        ((self.prefix as u128) << 64) | self.suffix as u128
    }

    /// Amino acid at suffix position `i` (0 = first suffix symbol).
    ///
    /// `i` must be below `geometry.suffix_len()`; debug builds panic otherwise.
    #[inline]
    pub fn suffix_amino(&self, i: usize, geometry: Geometry) -> Amino {
        debug_assert!(
            i < geometry.suffix_len(),
            "suffix position {i} out of range for S = {}",
            geometry.suffix_len()
        );
        let shift = AMINO_BITS * (geometry.suffix_len() - 1 - i) as u32;
        ((self.suffix >> shift) & AMINO_MASK) as Amino
    }

    /// Shift `amino` in at the end, dropping the first symbol.
    #[inline]
    pub(crate) fn append(&mut self, amino: Amino, geometry: Geometry) {
        let s = geometry.suffix_len() as u32;
        let carry = (self.suffix >> (AMINO_BITS * (s - 1))) & AMINO_MASK;
        self.suffix = ((self.suffix << AMINO_BITS) | amino as u64) & geometry.suffix_mask();
        let prefix = self.prefix as u64 * ALPHABET_SIZE as u64 + carry;
        self.prefix = (prefix % geometry.prefix_count() as u64) as u32;
    }

    /// Shift `amino` in at the front, dropping the last symbol.
    #[inline]
    pub(crate) fn prepend(&mut self, amino: Amino, geometry: Geometry) {
        let s = geometry.suffix_len() as u32;
        let carry = (self.prefix % ALPHABET_SIZE as u32) as u64;
        self.suffix = (carry << (AMINO_BITS * (s - 1))) | (self.suffix >> AMINO_BITS);
        let lead = geometry.prefix_count() / ALPHABET_SIZE as u32;
        self.prefix = amino as u32 * lead + self.prefix / ALPHABET_SIZE as u32;
    }
}

/// Alphabet plus geometry: converts between symbol strings and words.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WordCodec {
    alphabet: Alphabet,
    geometry: Geometry,
}

impl WordCodec {
    pub fn new(alphabet: Alphabet, geometry: Geometry) -> Self {
        Self { alphabet, geometry }
    }

    /// Default alphabet with the given geometry.
    pub fn with_geometry(geometry: Geometry) -> Self {
        Self::new(Alphabet::default(), geometry)
    }

    #[inline]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    #[inline]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[inline]
    fn amino(&self, symbol: u8, position: usize) -> Result<Amino> {
        self.alphabet.to_amino(symbol).ok_or(Error::InvalidSymbol {
            symbol: symbol as char,
            position,
        })
    }

    /// Encode exactly `P + S` symbols.
    pub fn encode(&self, seq: &[u8]) -> Result<Word> {
        expect_len(seq, self.geometry.word_len())?;
        let (p, s) = seq.split_at(self.geometry.prefix_len());
        Ok(Word {
            prefix: self.prefix_from(p, 0)?,
            suffix: self.suffix_from(s, p.len())?,
        })
    }

    /// Encode exactly `P` symbols.
    pub fn encode_prefix(&self, seq: &[u8]) -> Result<u32> {
        expect_len(seq, self.geometry.prefix_len())?;
        self.prefix_from(seq, 0)
    }

    /// Encode exactly `S` symbols.
    pub fn encode_suffix(&self, seq: &[u8]) -> Result<u64> {
        expect_len(seq, self.geometry.suffix_len())?;
        self.suffix_from(seq, 0)
    }

    fn prefix_from(&self, seq: &[u8], offset: usize) -> Result<u32> {
        let mut prefix = 0u32;
        for (i, &b) in seq.iter().enumerate() {
            prefix = prefix * ALPHABET_SIZE as u32 + self.amino(b, offset + i)? as u32;
        }
        Ok(prefix)
    }

    fn suffix_from(&self, seq: &[u8], offset: usize) -> Result<u64> {
        let mut suffix = 0u64;
        for (i, &b) in seq.iter().enumerate() {
            suffix = (suffix << AMINO_BITS) | self.amino(b, offset + i)? as u64;
        }
        Ok(suffix)
    }

    #[inline]
    pub fn is_valid_prefix(&self, prefix: u32) -> bool {
        prefix < self.geometry.prefix_count()
    }

    pub fn is_valid_suffix(&self, suffix: u64) -> bool {
        if suffix & !self.geometry.suffix_mask() != 0 {
            return false;
        }
        let w = Word::new(0, suffix);
        (0..self.geometry.suffix_len())
            .all(|i| (w.suffix_amino(i, self.geometry) as usize) < ALPHABET_SIZE)
    }

    /// Fail with `InvalidWord` unless `word` decodes.
    pub fn check(&self, word: Word) -> Result<()> {
        if self.is_valid_prefix(word.prefix) && self.is_valid_suffix(word.suffix) {
            Ok(())
        } else {
            Err(Error::InvalidWord {
                prefix: word.prefix,
                suffix: word.suffix,
            })
        }
    }

    /// Decode a word back to its `P + S` symbols.
    pub fn decode(&self, word: Word) -> Result<Vec<u8>> {
        self.check(word)?;
        let mut out = Vec::with_capacity(self.geometry.word_len());
        self.render_prefix(word.prefix, &mut out);
        self.render_suffix(word.suffix, &mut out);
        Ok(out)
    }

    pub fn decode_prefix(&self, prefix: u32) -> Result<Vec<u8>> {
        self.check(Word::new(prefix, 0))?;
        let mut out = Vec::with_capacity(self.geometry.prefix_len());
        self.render_prefix(prefix, &mut out);
        Ok(out)
    }

    pub fn decode_suffix(&self, suffix: u64) -> Result<Vec<u8>> {
        self.check(Word::new(0, suffix))?;
        let mut out = Vec::with_capacity(self.geometry.suffix_len());
        self.render_suffix(suffix, &mut out);
        Ok(out)
    }

    // Callers have validated the value.
    fn render_prefix(&self, mut prefix: u32, out: &mut Vec<u8>) {
        let start = out.len();
        let symbols = self.alphabet.as_bytes();
        for _ in 0..self.geometry.prefix_len() {
            out.push(symbols[(prefix % ALPHABET_SIZE as u32) as usize]);
            prefix /= ALPHABET_SIZE as u32;
        }
        out[start..].reverse();
    }

    fn render_suffix(&self, suffix: u64, out: &mut Vec<u8>) {
        let symbols = self.alphabet.as_bytes();
        let w = Word::new(0, suffix);
        for i in 0..self.geometry.suffix_len() {
            out.push(symbols[w.suffix_amino(i, self.geometry) as usize]);
        }
    }

    /// Iterate over all words of `seq` (see [`Words`]).
    pub fn words<'a>(&'a self, seq: &'a [u8]) -> Words<'a> {
        Words {
            codec: self,
            seq,
            pos: 0,
            fill: 0,
            fwd: Word::default(),
            rev: Word::default(),
        }
    }
}

#[inline]
fn expect_len(seq: &[u8], expected: usize) -> Result<()> {
    if seq.len() == expected {
        Ok(())
    } else {
        Err(Error::WordLength {
            expected,
            got: seq.len(),
        })
    }
}

/// Rolling iterator over the words of a sequence.
///
/// Yields `(start, forward, reverse)` for every window of `P + S` alphabet
/// symbols, where `reverse` is the window read backwards. A symbol outside
/// the alphabet resets the window, so no word spans it.
pub struct Words<'a> {
    codec: &'a WordCodec,
    seq: &'a [u8],
    pos: usize,
    fill: usize,
    fwd: Word,
    rev: Word,
}

impl Iterator for Words<'_> {
    type Item = (usize, Word, Word);

    fn next(&mut self) -> Option<Self::Item> {
        let geometry = self.codec.geometry;
        let word_len = geometry.word_len();
        while self.pos < self.seq.len() {
            let b = self.seq[self.pos];
            self.pos += 1;
            let Some(amino) = self.codec.alphabet.to_amino(b) else {
                // ambiguous: reset
                self.fill = 0;
                continue;
            };
            self.fwd.append(amino, geometry);
            self.rev.prepend(amino, geometry);
            self.fill += 1;
            if self.fill >= word_len {
                return Some((self.pos - word_len, self.fwd, self.rev));
            }
        }
        None
    }
}
