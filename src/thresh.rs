//! Calibration threshold tables.
//!
//! Text format: first non-comment line `rows cols`, then `rows * cols`
//! whitespace separated values in row-major order. Lines starting with `#`
//! are ignored.

use std::io::{BufRead, Write};

use crate::error::{Error, Result};

/// Score cutoffs indexed by `(row, col)`; lookups past the table clamp to
/// the last row or column.
#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl ThresholdMatrix {
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::format("threshold table must not be empty"));
        }
        if rows.checked_mul(cols) != Some(values.len()) {
            return Err(Error::format(format!(
                "{rows}x{cols} threshold table with {} values",
                values.len()
            )));
        }
        Ok(Self { rows, cols, values })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            self.values.get(row * self.cols + col).copied()
        } else {
            None
        }
    }

    pub fn get_clamped(&self, row: usize, col: usize) -> f64 {
        let (row, col) = (row.min(self.rows - 1), col.min(self.cols - 1));
        self.values[row * self.cols + col]
    }

    /// Cutoff for a protein of `len` residues (column 0 of row `len`).
    #[inline]
    pub fn protein_cutoff(&self, len: usize) -> f64 {
        self.get_clamped(len, 0)
    }

    /// Cutoff for an ORF of `len` residues from DNA with GC fraction `gc`.
    #[inline]
    pub fn orf_cutoff(&self, gc: f64, len: usize) -> f64 {
        // NaN and negative fractions saturate to row 0.
        let row = (gc * 100.0).floor() as usize;
        self.get_clamped(row, len)
    }

    pub fn load<R: BufRead>(r: R) -> Result<Self> {
        let mut tokens = Vec::new();
        for line in r.lines() {
            let line = line?;
            if line.starts_with('#') {
                continue;
            }
            tokens.extend(line.split_ascii_whitespace().map(str::to_owned));
        }
        let mut it = tokens.iter();
        let mut dim = |what: &str| -> Result<usize> {
            it.next()
                .ok_or_else(|| Error::format(format!("missing {what}")))?
                .parse()
                .map_err(|e| Error::format(format!("{what}: {e}")))
        };
        let rows = dim("row count")?;
        let cols = dim("column count")?;
        let values = it
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|e| Error::format(format!("threshold {t:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(rows, cols, values)
    }

    pub fn store<W: Write>(&self, mut w: W) -> Result<()> {
        writeln!(w, "{} {}", self.rows, self.cols)?;
        for row in self.values.chunks(self.cols) {
            let line: Vec<String> = row.iter().map(f64::to_string).collect();
            writeln!(w, "{}", line.join(" "))?;
        }
        w.flush()?;
        Ok(())
    }
}
