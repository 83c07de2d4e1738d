//! Persisted word indices: binary, plain text and mmap image.
//!
//! Binary and plain files are a header (alphabet, total suffix count)
//! followed, for each non-empty prefix in ascending order, by a prefix record
//! `(prefix, run length)` and `run length` suffix records `(suffix, family)`.
//! Both go through one driver ([`load_records`] / [`store_records`]) with a
//! per-format [`RecordCodec`]. Neither stores the word geometry; readers
//! supply it.
//!
//! The mmap image is a 48-byte header followed by the in-memory prefix,
//! suffix and family tables, zero-padded to 8 bytes. Integers are in native
//! (little-endian) order; a foreign-endian image fails the version check.

use bytemuck::{Pod, Zeroable};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{debug, info, info_span};

use crate::encode::{ALPHABET_SIZE, Alphabet, Geometry, WordCodec};
use crate::error::{Error, Result};
use crate::index::{Family, PrefixEntry, RunState, WordIndex, check_family};
use crate::pack::{pack, unpack};

pub const IMAGE_MAGIC: [u8; 8] = *b"ECURVEM\x01";
pub const IMAGE_VERSION: u32 = 1;

/// u64 total suffix count.
const BIN_HEADER_FMT: &str = "L";
/// u32 prefix, u64 run length.
const BIN_PREFIX_FMT: &str = "IL";
/// u64 suffix, u16 family.
const BIN_SUFFIX_FMT: &str = "LH";

const PLAIN_COMMENT: char = '#';
const PLAIN_HEADER: &str = ">> alphabet: ";
const PLAIN_SUFFIXES: &str = ", suffixes: ";

// Upper bound on capacity reserved from an untrusted header.
const PREALLOC_LIMIT: usize = 1 << 20;

/// On-disk encoding of a word index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Packed big-endian records.
    Binary,
    /// One text line per record.
    Plain,
    /// Raw table image, openable with [`WordIndex::open_mmap`].
    Mmap,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "B" | "b" | "binary" => Ok(Format::Binary),
            "P" | "p" | "plain" | "text" => Ok(Format::Plain),
            "M" | "m" | "mmap" => Ok(Format::Mmap),
            _ => Err(Error::format(format!("unknown index format {s:?}"))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Format::Binary => "binary",
            Format::Plain => "plain",
            Format::Mmap => "mmap",
        })
    }
}

/// Stream compression for binary and plain files.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

/// How [`load_file`] / [`store_file`] read and write an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageOptions {
    format: Format,
    compression: Compression,
    geometry: Geometry,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            format: Format::Binary,
            compression: Compression::None,
            geometry: Geometry::STANDARD,
        }
    }
}

impl StorageOptions {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }
    pub fn compression(mut self, c: Compression) -> Self {
        self.compression = c;
        self
    }
    /// Geometry of the stored words (binary and plain files do not record it).
    pub fn geometry(mut self, g: Geometry) -> Self {
        self.geometry = g;
        self
    }
    pub fn format(&self) -> Format {
        self.format
    }

    fn check(&self) -> Result<()> {
        if self.format == Format::Mmap && self.compression != Compression::None {
            return Err(Error::format("mmap images cannot be compressed"));
        }
        Ok(())
    }
}

/// Per-format record readers and writers used by the shared driver.
pub trait RecordCodec {
    fn read_header<R: BufRead>(&mut self, r: &mut R) -> Result<(Alphabet, u64)>;
    fn read_prefix<R: BufRead>(&mut self, r: &mut R, codec: &WordCodec) -> Result<(u32, u64)>;
    fn read_suffix<R: BufRead>(&mut self, r: &mut R, codec: &WordCodec) -> Result<(u64, Family)>;

    fn write_header<W: Write>(&mut self, w: &mut W, alphabet: &Alphabet, count: u64)
    -> Result<()>;
    fn write_prefix<W: Write>(
        &mut self,
        w: &mut W,
        codec: &WordCodec,
        prefix: u32,
        count: u64,
    ) -> Result<()>;
    fn write_suffix<W: Write>(
        &mut self,
        w: &mut W,
        codec: &WordCodec,
        suffix: u64,
        family: Family,
    ) -> Result<()>;
}

/// Packed records: alphabet bytes, then `L` / `IL` / `LH`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

impl RecordCodec for BinaryCodec {
    fn read_header<R: BufRead>(&mut self, r: &mut R) -> Result<(Alphabet, u64)> {
        let mut alpha = [0u8; ALPHABET_SIZE];
        r.read_exact(&mut alpha)?;
        let [count] = unpack(r, BIN_HEADER_FMT)?;
        Ok((Alphabet::from_bytes(&alpha)?, count))
    }

    fn read_prefix<R: BufRead>(&mut self, r: &mut R, _codec: &WordCodec) -> Result<(u32, u64)> {
        let [prefix, count] = unpack(r, BIN_PREFIX_FMT)?;
        Ok((prefix as u32, count))
    }

    fn read_suffix<R: BufRead>(&mut self, r: &mut R, _codec: &WordCodec) -> Result<(u64, Family)> {
        let [suffix, family] = unpack(r, BIN_SUFFIX_FMT)?;
        Ok((suffix, family as Family))
    }

    fn write_header<W: Write>(
        &mut self,
        w: &mut W,
        alphabet: &Alphabet,
        count: u64,
    ) -> Result<()> {
        w.write_all(alphabet.as_bytes())?;
        pack(w, BIN_HEADER_FMT, &[count])?;
        Ok(())
    }

    fn write_prefix<W: Write>(
        &mut self,
        w: &mut W,
        _codec: &WordCodec,
        prefix: u32,
        count: u64,
    ) -> Result<()> {
        pack(w, BIN_PREFIX_FMT, &[prefix as u64, count])?;
        Ok(())
    }

    fn write_suffix<W: Write>(
        &mut self,
        w: &mut W,
        _codec: &WordCodec,
        suffix: u64,
        family: Family,
    ) -> Result<()> {
        pack(w, BIN_SUFFIX_FMT, &[suffix, family as u64])?;
        Ok(())
    }
}

/// Text records:
///
/// ```text
/// >> alphabet: ARNDCQEGHILKMFPSTWYV, suffixes: 2
/// >AAAAAA 2
/// AAAAAAAAAAAA 3
/// AAAAAAAAAAAR 7
/// ```
///
/// Lines starting with `#` are ignored when reading.
#[derive(Debug, Default)]
pub struct PlainCodec {
    line: String,
    line_no: usize,
}

impl PlainCodec {
    fn next_line<R: BufRead>(&mut self, r: &mut R) -> Result<()> {
        loop {
            self.line.clear();
            if r.read_line(&mut self.line)? == 0 {
                return Err(Error::format(format!(
                    "unexpected end of file after line {}",
                    self.line_no
                )));
            }
            self.line_no += 1;
            if !self.line.starts_with(PLAIN_COMMENT) {
                return Ok(());
            }
        }
    }

    fn current(&self) -> &str {
        self.line.trim_end_matches(['\n', '\r'])
    }

    fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::format(format!("line {}: {message}", self.line_no))
    }

    fn parse<T>(&self, field: &str, what: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        field.parse().map_err(|e| self.error(format!("{what}: {e}")))
    }

    /// Split a record line into its two fields.
    fn fields(&self) -> Result<(&str, &str)> {
        let mut it = self.current().split_ascii_whitespace();
        match (it.next(), it.next(), it.next()) {
            (Some(a), Some(b), None) => Ok((a, b)),
            _ => Err(self.error(format!("expected two fields in {:?}", self.current()))),
        }
    }
}

impl RecordCodec for PlainCodec {
    fn read_header<R: BufRead>(&mut self, r: &mut R) -> Result<(Alphabet, u64)> {
        self.next_line(r)?;
        let (alpha, count) = self
            .current()
            .strip_prefix(PLAIN_HEADER)
            .and_then(|rest| rest.split_once(PLAIN_SUFFIXES))
            .ok_or_else(|| self.error("malformed header"))?;
        let alphabet = Alphabet::new(alpha).map_err(|e| self.error(e))?;
        Ok((alphabet, self.parse(count.trim(), "suffix count")?))
    }

    fn read_prefix<R: BufRead>(&mut self, r: &mut R, codec: &WordCodec) -> Result<(u32, u64)> {
        self.next_line(r)?;
        let line = self.current();
        if !line.starts_with('>') || line.starts_with(">>") {
            return Err(self.error("expected a prefix record"));
        }
        let (word, count) = self.fields()?;
        let prefix = codec
            .encode_prefix(word[1..].as_bytes())
            .map_err(|e| self.error(e))?;
        Ok((prefix, self.parse(count, "run length")?))
    }

    fn read_suffix<R: BufRead>(&mut self, r: &mut R, codec: &WordCodec) -> Result<(u64, Family)> {
        self.next_line(r)?;
        let (word, family) = self.fields()?;
        let suffix = codec
            .encode_suffix(word.as_bytes())
            .map_err(|e| self.error(e))?;
        Ok((suffix, self.parse(family, "family")?))
    }

    fn write_header<W: Write>(
        &mut self,
        w: &mut W,
        alphabet: &Alphabet,
        count: u64,
    ) -> Result<()> {
        writeln!(w, "{PLAIN_HEADER}{}{PLAIN_SUFFIXES}{count}", alphabet.as_str())?;
        Ok(())
    }

    fn write_prefix<W: Write>(
        &mut self,
        w: &mut W,
        codec: &WordCodec,
        prefix: u32,
        count: u64,
    ) -> Result<()> {
        w.write_all(b">")?;
        w.write_all(&codec.decode_prefix(prefix)?)?;
        writeln!(w, " {count}")?;
        Ok(())
    }

    fn write_suffix<W: Write>(
        &mut self,
        w: &mut W,
        codec: &WordCodec,
        suffix: u64,
        family: Family,
    ) -> Result<()> {
        w.write_all(&codec.decode_suffix(suffix)?)?;
        writeln!(w, " {family}")?;
        Ok(())
    }
}

/// Read a record-based index.
pub fn load_records<R: BufRead, C: RecordCodec>(
    r: &mut R,
    geometry: Geometry,
    records: &mut C,
) -> Result<WordIndex> {
    let (alphabet, suffix_count) = records.read_header(r)?;
    let codec = WordCodec::new(alphabet, geometry);
    let n = geometry.prefix_count();
    let total = usize::try_from(suffix_count)
        .map_err(|_| Error::format(format!("suffix count {suffix_count} too large")))?;

    let mut prefixes: Vec<PrefixEntry> = Vec::with_capacity(n as usize);
    let mut suffixes = Vec::with_capacity(total.min(PREALLOC_LIMIT));
    let mut families = Vec::with_capacity(total.min(PREALLOC_LIMIT));

    while suffixes.len() < total {
        let (prefix, run) = records.read_prefix(r, &codec)?;
        if prefix >= n || (prefix as usize) < prefixes.len() {
            return Err(Error::format(format!(
                "prefix {prefix} out of range or out of order"
            )));
        }
        let remaining = (total - suffixes.len()) as u64;
        if run == 0 || run > remaining {
            return Err(Error::format(format!(
                "prefix {prefix}: run of {run} with {remaining} suffixes left"
            )));
        }

        let first = suffixes.len() as u64;
        prefixes.resize(prefix as usize, PrefixEntry::empty(first));
        prefixes.push(PrefixEntry { first, count: run });

        let mut prev: Option<u64> = None;
        for _ in 0..run {
            let (suffix, family) = records.read_suffix(r, &codec)?;
            if !codec.is_valid_suffix(suffix) {
                return Err(Error::InvalidWord { prefix, suffix });
            }
            check_family(family)?;
            if prev.is_some_and(|p| suffix <= p) {
                return Err(Error::format(format!(
                    "prefix {prefix}: suffixes not ascending"
                )));
            }
            suffixes.push(suffix);
            families.push(family);
            prev = Some(suffix);
        }
    }
    let end = suffixes.len() as u64;
    prefixes.resize(n as usize, PrefixEntry::beyond(end));
    Ok(WordIndex::from_tables(codec, prefixes, suffixes, families))
}

/// Write a record-based index.
pub fn store_records<W: Write, C: RecordCodec>(
    w: &mut W,
    index: &WordIndex,
    records: &mut C,
) -> Result<()> {
    let codec = index.codec();
    let (suffixes, families) = (index.suffix_table(), index.class_table());
    records.write_header(w, codec.alphabet(), suffixes.len() as u64)?;

    for (p, entry) in index.prefix_table().iter().enumerate() {
        let RunState::Occupied { offset, count } = entry.state() else {
            continue;
        };
        let run = offset..offset + count;
        let (s, f) = suffixes
            .get(run.clone())
            .zip(families.get(run))
            .ok_or_else(|| Error::format(format!("prefix {p}: run exceeds the tables")))?;
        records.write_prefix(w, codec, p as u32, count as u64)?;
        for (&suffix, &family) in s.iter().zip(f) {
            records.write_suffix(w, codec, suffix, family)?;
        }
    }
    Ok(())
}

/// Mmap image header.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct ImageHeader {
    pub magic: [u8; 8],
    pub version: u32,
    pub prefix_len: u8,
    pub suffix_len: u8,
    pub reserved0: u16,
    pub alphabet: [u8; ALPHABET_SIZE],
    pub reserved1: u32,
    pub suffix_count: u64,
}

const IMAGE_HEADER_LEN: usize = std::mem::size_of::<ImageHeader>();

impl ImageHeader {
    fn new(codec: &WordCodec, suffix_count: u64) -> Self {
        let mut alphabet = [0u8; ALPHABET_SIZE];
        alphabet.copy_from_slice(codec.alphabet().as_bytes());
        ImageHeader {
            magic: IMAGE_MAGIC,
            version: IMAGE_VERSION,
            prefix_len: codec.geometry().prefix_len() as u8,
            suffix_len: codec.geometry().suffix_len() as u8,
            reserved0: 0,
            alphabet,
            reserved1: 0,
            suffix_count,
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let head = bytes
            .get(..IMAGE_HEADER_LEN)
            .ok_or_else(|| Error::format("image shorter than its header"))?;
        let header: ImageHeader = bytemuck::pod_read_unaligned(head);
        if header.magic != IMAGE_MAGIC {
            return Err(Error::format("bad magic"));
        }
        if header.version != IMAGE_VERSION {
            return Err(Error::format(format!(
                "unsupported image version {:#x}",
                header.version
            )));
        }
        Ok(header)
    }

    pub fn codec(&self) -> Result<WordCodec> {
        let geometry = Geometry::new(self.prefix_len as usize, self.suffix_len as usize)?;
        Ok(WordCodec::new(Alphabet::from_bytes(&self.alphabet)?, geometry))
    }
}

/// Byte ranges of the tables inside an image.
#[derive(Clone, Debug)]
pub(crate) struct ImageLayout {
    pub prefixes: Range<usize>,
    pub suffixes: Range<usize>,
    pub families: Range<usize>,
    pub total: u64,
}

impl ImageLayout {
    pub fn new(geometry: Geometry, suffix_count: u64) -> Result<Self> {
        let overflow = || Error::format(format!("{suffix_count} suffixes overflow the image"));
        let entry = std::mem::size_of::<PrefixEntry>() as u64;
        let p_end = IMAGE_HEADER_LEN as u64 + geometry.prefix_count() as u64 * entry;
        let s_end = suffix_count
            .checked_mul(8)
            .and_then(|b| b.checked_add(p_end))
            .ok_or_else(overflow)?;
        let f_end = suffix_count
            .checked_mul(2)
            .and_then(|b| b.checked_add(s_end))
            .ok_or_else(overflow)?;
        let total = f_end.checked_add(7).ok_or_else(overflow)? & !7;
        let at = |v: u64| usize::try_from(v).map_err(|_| overflow());
        Ok(Self {
            prefixes: IMAGE_HEADER_LEN..at(p_end)?,
            suffixes: at(p_end)?..at(s_end)?,
            families: at(s_end)?..at(f_end)?,
            total,
        })
    }

    fn padding(&self) -> usize {
        (self.total - self.families.end as u64) as usize
    }
}

fn write_image<W: Write>(w: &mut W, index: &WordIndex) -> Result<()> {
    let count = index.len() as u64;
    let layout = ImageLayout::new(index.geometry(), count)?;
    let header = ImageHeader::new(index.codec(), count);
    w.write_all(bytemuck::bytes_of(&header))?;
    w.write_all(bytemuck::cast_slice(index.prefix_table()))?;
    w.write_all(bytemuck::cast_slice(index.suffix_table()))?;
    w.write_all(bytemuck::cast_slice(index.class_table()))?;
    w.write_all(&[0u8; 8][..layout.padding()])?;
    Ok(())
}

fn read_image<R: Read>(r: &mut R, geometry: Geometry) -> Result<WordIndex> {
    let mut head = [0u8; IMAGE_HEADER_LEN];
    r.read_exact(&mut head)?;
    let header = ImageHeader::parse(&head)?;
    let codec = header.codec()?;
    check_geometry(codec.geometry(), geometry)?;
    let layout = ImageLayout::new(geometry, header.suffix_count)?;
    let count = header.suffix_count as usize;

    let prefixes = read_pod_vec::<PrefixEntry, _>(r, geometry.prefix_count() as usize)?;
    let suffixes = read_pod_vec::<u64, _>(r, count)?;
    let families = read_pod_vec::<Family, _>(r, count)?;
    let mut pad = [0u8; 8];
    r.read_exact(&mut pad[..layout.padding()])?;

    let index = WordIndex::from_tables(codec, prefixes, suffixes, families);
    index.verify()?;
    Ok(index)
}

/// Read `count` values without trusting `count` for the allocation up front.
fn read_pod_vec<T: Pod, R: Read>(r: &mut R, count: usize) -> Result<Vec<T>> {
    const CHUNK: usize = 1 << 16;
    let mut out: Vec<T> = Vec::new();
    while out.len() < count {
        let start = out.len();
        out.resize(start + (count - start).min(CHUNK), T::zeroed());
        r.read_exact(bytemuck::cast_slice_mut(&mut out[start..]))?;
    }
    Ok(out)
}

fn check_geometry(found: Geometry, expected: Geometry) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        Err(Error::Incompatible(format!(
            "index geometry {}+{}, expected {}+{}",
            found.prefix_len(),
            found.suffix_len(),
            expected.prefix_len(),
            expected.suffix_len()
        )))
    }
}

fn eof_as_format(e: Error) -> Error {
    match e {
        Error::Io(io) if io.kind() == ErrorKind::UnexpectedEof => {
            Error::format("unexpected end of file")
        }
        e => e,
    }
}

/// Load an index of `format` from a stream.
pub fn load<R: BufRead>(mut r: R, format: Format, geometry: Geometry) -> Result<WordIndex> {
    let loaded = match format {
        Format::Binary => load_records(&mut r, geometry, &mut BinaryCodec),
        Format::Plain => load_records(&mut r, geometry, &mut PlainCodec::default()),
        Format::Mmap => read_image(&mut r, geometry),
    };
    loaded.map_err(eof_as_format)
}

/// Write `index` to a stream in `format`.
pub fn store<W: Write>(mut w: W, index: &WordIndex, format: Format) -> Result<()> {
    match format {
        Format::Binary => store_records(&mut w, index, &mut BinaryCodec)?,
        Format::Plain => store_records(&mut w, index, &mut PlainCodec::default())?,
        Format::Mmap => write_image(&mut w, index)?,
    }
    w.flush()?;
    Ok(())
}

/// Load an index file. Mmap images are mapped, not copied.
pub fn load_file(path: &Path, opts: &StorageOptions) -> Result<WordIndex> {
    let _span = info_span!("load_file", path = %path.display(), format = %opts.format).entered();
    opts.check()?;

    let index = match (opts.format, opts.compression) {
        (Format::Mmap, _) => {
            let index = WordIndex::open_mmap(path)?;
            check_geometry(index.geometry(), opts.geometry)?;
            index
        }
        (format, Compression::None) => {
            load(BufReader::new(File::open(path)?), format, opts.geometry)?
        }
        (format, Compression::Gzip) => load(
            BufReader::new(GzDecoder::new(File::open(path)?)),
            format,
            opts.geometry,
        )?,
    };
    info!(words = index.len(), "loaded word index");
    Ok(index)
}

/// Store `index` to a file.
///
/// The data goes to a temporary file next to `path`, renamed over it once
/// complete: a failed store leaves any previous file untouched, and an index
/// mapped from `path` stays valid.
pub fn store_file(path: &Path, index: &WordIndex, opts: &StorageOptions) -> Result<()> {
    let _span = info_span!("store_file", path = %path.display(), format = %opts.format).entered();
    opts.check()?;

    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    match opts.compression {
        Compression::None => store(BufWriter::new(tmp.as_file()), index, opts.format)?,
        Compression::Gzip => {
            let mut enc =
                GzEncoder::new(BufWriter::new(tmp.as_file()), flate2::Compression::default());
            store(&mut enc, index, opts.format)?;
            enc.finish()?.flush()?;
        }
    }
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    debug!(compression = ?opts.compression, "renamed into place");
    info!(words = index.len(), "stored word index");
    Ok(())
}
