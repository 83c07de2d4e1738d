//! WordIndex: dense prefix table over sorted suffix/family arrays, owned or
//! mmap-backed.

use bytemuck::{Pod, Zeroable};
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::encode::{Geometry, Word, WordCodec};
use crate::error::{Error, Result};
use crate::io::{ImageHeader, ImageLayout};

/// Protein family identifier.
pub type Family = u16;

/// Largest usable family id.
pub const FAMILY_MAX: Family = u16::MAX - 1;

/// Reserved, never stored in an index.
pub const FAMILY_INVALID: Family = u16::MAX;

/// `count` of prefixes past the last non-empty run.
pub(crate) const BEYOND_DATA: u64 = u64::MAX;

/// Raw prefix table entry, laid out as it is persisted in mmap images.
///
/// Prefer [`PrefixEntry::state`] over reading the fields.
#[repr(C)]
#[derive(Copy, Clone, Default, Pod, Zeroable, PartialEq, Eq, Debug)]
pub struct PrefixEntry {
    /// Offset into the suffix/family tables.
    pub first: u64,
    /// Run length, 0 for an empty prefix, `u64::MAX` past the data.
    pub count: u64,
}

/// Interpretation of a prefix table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// No words with this prefix; `fallback` is the end offset of the nearest
    /// preceding run (0 if there is none).
    Empty { fallback: usize },
    /// `count > 0` words starting at `offset`.
    Occupied { offset: usize, count: usize },
    /// At or beyond the last run.
    BeyondData,
}

impl PrefixEntry {
    #[inline]
    pub(crate) fn empty(fallback: u64) -> Self {
        Self {
            first: fallback,
            count: 0,
        }
    }

    #[inline]
    pub(crate) fn beyond(end: u64) -> Self {
        Self {
            first: end,
            count: BEYOND_DATA,
        }
    }

    #[inline]
    pub fn state(&self) -> RunState {
        match self.count {
            BEYOND_DATA => RunState::BeyondData,
            0 => RunState::Empty {
                fallback: self.first as usize,
            },
            count => RunState::Occupied {
                offset: self.first as usize,
                count: count as usize,
            },
        }
    }
}

/// The two index entries ordinally adjacent to a query word.
///
/// Both are the same entry on an exact hit or at either end of the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighbors {
    pub lower: usize,
    pub upper: usize,
    pub exact: bool,
}

impl Neighbors {
    /// Distinct neighbour offsets, lower first.
    pub fn indices(&self) -> impl Iterator<Item = usize> {
        let upper = (self.upper != self.lower).then_some(self.upper);
        std::iter::once(self.lower).chain(upper)
    }
}

/// Result of [`WordIndex::lookup_nearest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nearest {
    /// Offset into the suffix/family tables.
    pub index: usize,
    /// `|ordinal(query) - ordinal(found)|`, 0 on an exact hit.
    pub distance: u128,
}

struct OwnedTables {
    prefixes: Vec<PrefixEntry>,
    suffixes: Vec<u64>,
    families: Vec<Family>,
}

struct MappedTables {
    map: memmap2::Mmap, // keep mmap alive
    layout: ImageLayout,
}

enum Storage {
    Owned(OwnedTables),
    Mmap(MappedTables),
}

/// Word index ("ecurve"): read-only after construction.
pub struct WordIndex {
    codec: WordCodec,
    storage: Storage,
}

impl WordIndex {
    /// Index without words: every prefix is beyond the data.
    pub fn empty(codec: WordCodec) -> Self {
        let n = codec.geometry().prefix_count() as usize;
        Self::from_tables(codec, vec![PrefixEntry::beyond(0); n], Vec::new(), Vec::new())
    }

    /// Build from `(word, family)` pairs in strictly ascending word order.
    pub fn from_sorted<I>(codec: WordCodec, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Word, Family)>,
    {
        let n = codec.geometry().prefix_count() as usize;
        let mut prefixes: Vec<PrefixEntry> = Vec::with_capacity(n);
        let mut suffixes = Vec::new();
        let mut families = Vec::new();
        let mut prev: Option<Word> = None;

        for (word, family) in entries {
            codec.check(word)?;
            check_family(family)?;
            if prev.is_some_and(|p| word <= p) {
                return Err(Error::Unsorted);
            }
            if prev.map(|p| p.prefix) != Some(word.prefix) {
                let first = suffixes.len() as u64;
                prefixes.resize(word.prefix as usize, PrefixEntry::empty(first));
                prefixes.push(PrefixEntry { first, count: 0 });
            }
            suffixes.push(word.suffix);
            families.push(family);
            if let Some(run) = prefixes.last_mut() {
                run.count += 1;
            }
            prev = Some(word);
        }
        let end = suffixes.len() as u64;
        prefixes.resize(n, PrefixEntry::beyond(end));
        Ok(Self::from_tables(codec, prefixes, suffixes, families))
    }

    pub(crate) fn from_tables(
        codec: WordCodec,
        prefixes: Vec<PrefixEntry>,
        suffixes: Vec<u64>,
        families: Vec<Family>,
    ) -> Self {
        Self {
            codec,
            storage: Storage::Owned(OwnedTables {
                prefixes,
                suffixes,
                families,
            }),
        }
    }

    /// Open an mmap image without copying its tables.
    ///
    /// Header, geometry and file length are validated; the table contents
    /// are trusted (see [`WordIndex::verify`]).
    pub fn open_mmap(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: read-only mapping; `store_file` replaces index files by rename, never in place.
        let map = unsafe { memmap2::MmapOptions::new().map(&file)? };

        let header = ImageHeader::parse(&map)?;
        let codec = header.codec()?;
        let layout = ImageLayout::new(codec.geometry(), header.suffix_count)?;
        if map.len() as u64 != layout.total {
            return Err(Error::format(format!(
                "image is {} bytes, layout requires {}",
                map.len(),
                layout.total
            )));
        }
        cast::<PrefixEntry>(&map[layout.prefixes.clone()])?;
        cast::<u64>(&map[layout.suffixes.clone()])?;
        cast::<Family>(&map[layout.families.clone()])?;

        info!(
            path = %path.display(),
            words = header.suffix_count,
            prefix_len = codec.geometry().prefix_len(),
            suffix_len = codec.geometry().suffix_len(),
            "mapped word index"
        );
        Ok(Self {
            codec,
            storage: Storage::Mmap(MappedTables { map, layout }),
        })
    }

    #[inline]
    fn tables(&self) -> (&[PrefixEntry], &[u64], &[Family]) {
        match &self.storage {
            Storage::Owned(o) => (&o.prefixes, &o.suffixes, &o.families),
            // Alignment and sizes were checked in `open_mmap`.
            Storage::Mmap(m) => (
                bytemuck::cast_slice(&m.map[m.layout.prefixes.clone()]),
                bytemuck::cast_slice(&m.map[m.layout.suffixes.clone()]),
                bytemuck::cast_slice(&m.map[m.layout.families.clone()]),
            ),
        }
    }

    #[inline]
    pub fn codec(&self) -> &WordCodec {
        &self.codec
    }

    #[inline]
    pub fn geometry(&self) -> Geometry {
        self.codec.geometry()
    }

    /// Number of indexed words.
    #[inline]
    pub fn len(&self) -> usize {
        self.tables().1.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the tables live in a memory map.
    pub fn is_mapped(&self) -> bool {
        matches!(self.storage, Storage::Mmap(_))
    }

    #[inline]
    pub fn prefix_table(&self) -> &[PrefixEntry] {
        self.tables().0
    }

    #[inline]
    pub fn suffix_table(&self) -> &[u64] {
        self.tables().1
    }

    #[inline]
    pub fn class_table(&self) -> &[Family] {
        self.tables().2
    }

    /// Run state of `prefix`; prefixes outside the table are beyond the data.
    pub fn run(&self, prefix: u32) -> RunState {
        self.prefix_table()
            .get(prefix as usize)
            .map_or(RunState::BeyondData, PrefixEntry::state)
    }

    /// Word stored at `index`.
    pub fn word_at(&self, index: usize) -> Option<Word> {
        let (prefixes, suffixes, _) = self.tables();
        let suffix = *suffixes.get(index)?;
        // `first` is non-decreasing; the owner is the last run starting at or before `index`.
        let owner = prefixes
            .partition_point(|e| e.first <= index as u64)
            .checked_sub(1)?;
        Some(Word::new(owner as u32, suffix))
    }

    #[inline]
    pub fn family_at(&self, index: usize) -> Option<Family> {
        self.class_table().get(index).copied()
    }

    /// Family of `word` if it is indexed verbatim.
    pub fn lookup_exact(&self, word: Word) -> Option<Family> {
        let nb = self.neighbors(word)?;
        if nb.exact {
            self.family_at(nb.lower)
        } else {
            None
        }
    }

    /// Ordinal neighbours of `word`.
    ///
    /// `None` if the index is empty or the prefix lies outside the table.
    pub fn neighbors(&self, word: Word) -> Option<Neighbors> {
        let (prefixes, suffixes, _) = self.tables();
        let last = suffixes.len().checked_sub(1)?;
        let entry = prefixes.get(word.prefix as usize)?;

        let insert_at = match entry.state() {
            RunState::Occupied { offset, count } => {
                let run = run_slice(suffixes, offset, count)?;
                match run.binary_search(&word.suffix) {
                    Ok(i) => {
                        return Some(Neighbors {
                            lower: offset + i,
                            upper: offset + i,
                            exact: true,
                        });
                    }
                    Err(i) => offset + i,
                }
            }
            RunState::Empty { fallback } => fallback,
            RunState::BeyondData => last + 1,
        };
        Some(Neighbors {
            lower: insert_at.saturating_sub(1).min(last),
            upper: insert_at.min(last),
            exact: false,
        })
    }

    /// Single nearest entry to `word`.
    ///
    /// Within an occupied prefix the closer of the two ordinal neighbours
    /// wins, ties going to the lower one. An empty prefix resolves to the last
    /// entry of the nearest preceding run (the first entry if none precedes),
    /// a prefix past the data to the last entry.
    pub fn lookup_nearest(&self, word: Word) -> Option<Nearest> {
        let nb = self.neighbors(word)?;
        let key = word.ordinal();
        let distance = |i: usize| self.word_at(i).map(|w| w.ordinal().abs_diff(key));

        let index = match self.run(word.prefix) {
            RunState::Occupied { .. } if !nb.exact => {
                if distance(nb.upper)? < distance(nb.lower)? {
                    nb.upper
                } else {
                    nb.lower
                }
            }
            _ => nb.lower,
        };
        Some(Nearest {
            index,
            distance: distance(index)?,
        })
    }

    /// Check every table invariant.
    pub fn verify(&self) -> Result<()> {
        let (prefixes, suffixes, families) = self.tables();
        let expected = self.geometry().prefix_count() as usize;
        if prefixes.len() != expected {
            return Err(Error::format(format!(
                "prefix table has {} entries, expected {expected}",
                prefixes.len()
            )));
        }
        if suffixes.len() != families.len() {
            return Err(Error::format(format!(
                "{} suffixes but {} families",
                suffixes.len(),
                families.len()
            )));
        }

        let total = suffixes.len();
        let mut cursor = 0usize;
        let mut beyond = false;
        for (p, entry) in prefixes.iter().enumerate() {
            match entry.state() {
                RunState::Occupied { offset, count } => {
                    if beyond || offset != cursor {
                        return Err(Error::format(format!(
                            "prefix {p}: run at {offset}, expected {cursor}"
                        )));
                    }
                    let run = run_slice(suffixes, offset, count).ok_or_else(|| {
                        Error::format(format!("prefix {p}: run exceeds the suffix table"))
                    })?;
                    if !run.windows(2).all(|w| w[0] < w[1]) {
                        return Err(Error::format(format!("prefix {p}: suffixes not ascending")));
                    }
                    if let Some(&s) = run.iter().find(|&&s| !self.codec.is_valid_suffix(s)) {
                        return Err(Error::InvalidWord {
                            prefix: p as u32,
                            suffix: s,
                        });
                    }
                    cursor += count;
                }
                RunState::Empty { fallback } => {
                    if beyond || fallback != cursor {
                        return Err(Error::format(format!(
                            "prefix {p}: fallback {fallback}, expected {cursor}"
                        )));
                    }
                }
                RunState::BeyondData => {
                    if entry.first != total as u64 || cursor != total {
                        return Err(Error::format(format!(
                            "prefix {p}: end marker before the end of the data"
                        )));
                    }
                    beyond = true;
                }
            }
        }
        if cursor != total {
            return Err(Error::format(format!(
                "runs cover {cursor} of {total} suffixes"
            )));
        }
        families.iter().try_for_each(|&f| check_family(f))
    }
}

impl PartialEq for WordIndex {
    fn eq(&self, other: &Self) -> bool {
        self.codec == other.codec && self.tables() == other.tables()
    }
}

impl std::fmt::Debug for WordIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordIndex")
            .field("alphabet", self.codec.alphabet())
            .field("geometry", &self.geometry())
            .field("words", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

#[inline]
fn run_slice(suffixes: &[u64], offset: usize, count: usize) -> Option<&[u64]> {
    suffixes.get(offset..offset.checked_add(count)?)
}

#[inline]
pub(crate) fn check_family(family: Family) -> Result<()> {
    if family == FAMILY_INVALID {
        Err(Error::InvalidFamily(family))
    } else {
        Ok(())
    }
}

fn cast<T: Pod>(bytes: &[u8]) -> Result<&[T]> {
    bytemuck::try_cast_slice(bytes).map_err(|e| Error::Cast(format!("{e:?}")))
}
