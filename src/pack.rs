//! Fixed-width big-endian packing driven by a format string.
//!
//! One letter per field: `B` = u8, `H` = u16, `I` = u32, `L` = u64.
//! Values are passed and returned as `u64`; packing rejects values that do
//! not fit their field.

use byteorder::{BigEndian as BE, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{Error, Result};

#[inline]
fn field_width(c: char) -> Result<usize> {
    match c {
        'B' => Ok(1),
        'H' => Ok(2),
        'I' => Ok(4),
        'L' => Ok(8),
        _ => Err(Error::format(format!("unknown pack field {c:?}"))),
    }
}

/// Number of bytes `fmt` packs into.
pub fn packed_len(fmt: &str) -> Result<usize> {
    fmt.chars().map(field_width).sum()
}

/// Write `values` to `w` using `fmt`. Returns the number of bytes written.
pub fn pack<W: Write>(w: &mut W, fmt: &str, values: &[u64]) -> Result<usize> {
    if fmt.chars().count() != values.len() {
        return Err(Error::format(format!(
            "format {fmt:?} takes {} values, got {}",
            fmt.chars().count(),
            values.len()
        )));
    }
    let mut n = 0usize;
    for (c, &v) in fmt.chars().zip(values) {
        let width = field_width(c)?;
        if width < 8 && v >> (width * 8) != 0 {
            return Err(Error::format(format!("{v} does not fit field {c:?}")));
        }
        match c {
            'B' => w.write_u8(v as u8)?,
            'H' => w.write_u16::<BE>(v as u16)?,
            'I' => w.write_u32::<BE>(v as u32)?,
            _ => w.write_u64::<BE>(v)?,
        }
        n += width;
    }
    Ok(n)
}

/// Read `N` values described by `fmt` from `r`.
pub fn unpack<R: Read, const N: usize>(r: &mut R, fmt: &str) -> Result<[u64; N]> {
    if fmt.chars().count() != N {
        return Err(Error::format(format!(
            "format {fmt:?} yields {} values, expected {N}",
            fmt.chars().count()
        )));
    }
    let mut out = [0u64; N];
    for (slot, c) in out.iter_mut().zip(fmt.chars()) {
        *slot = match field_width(c)? {
            1 => r.read_u8()? as u64,
            2 => r.read_u16::<BE>()? as u64,
            4 => r.read_u32::<BE>()? as u64,
            _ => r.read_u64::<BE>()?,
        };
    }
    Ok(out)
}
