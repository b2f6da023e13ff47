//! Numeric indexing of the plaintext keyspace
//!
//! A plaintext is addressed by three values:
//! - string length: which sub-space it lives in (`aa..zz` is length 2)
//! - block number: which fixed-size chunk of that sub-space
//! - block index: offset inside the block
//!
//! `block_number * block_size + block_index` is the plaintext's global index,
//! read as a base-`|alphabet|` number, most significant digit first.

use crate::{Alphabet, Error, Result};

/// Plaintexts per block (100 million)
pub const DEFAULT_BLOCK_SIZE: u32 = 100_000_000;

/// Longest supported plaintext
///
/// Any alphabet of two or more symbols overflows an `i64` index first; this
/// bounds a single-symbol alphabet, whose size never overflows.
pub const MAX_STRING_LENGTH: u32 = 64;

/// Keyspace over one alphabet, split into blocks of `block_size` plaintexts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    alphabet: Alphabet,
    block_size: u32,
}

impl KeySpace {
    /// Keyspace with the default block size
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            alphabet,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Keyspace with a custom block size
    pub fn with_block_size(alphabet: Alphabet, block_size: u32) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidConfig("block size must be at least 1".to_string()));
        }
        Ok(Self {
            alphabet,
            block_size,
        })
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Number of plaintexts of the given length, `|alphabet|^string_length`
    ///
    /// Uses checked exponentiation, so a size that does not fit in an `i64`
    /// is reported as [`Error::Overflow`] instead of wrapping. Lengths past
    /// [`MAX_STRING_LENGTH`] are rejected as [`Error::InvalidConfig`].
    pub fn size(&self, string_length: u32) -> Result<i64> {
        if string_length > MAX_STRING_LENGTH {
            return Err(Error::InvalidConfig(format!(
                "string length {} exceeds the maximum of {}",
                string_length, MAX_STRING_LENGTH
            )));
        }
        let overflow = || Error::Overflow {
            alphabet_len: self.alphabet.len(),
            string_length,
        };
        let radix = i64::try_from(self.alphabet.len()).map_err(|_| overflow())?;
        radix.checked_pow(string_length).ok_or_else(overflow)
    }

    /// `ceil(size / block_size)` for the given length
    pub fn number_of_blocks(&self, string_length: u32) -> Result<i64> {
        let size = self.size(string_length)?;
        let block_size = i64::from(self.block_size);
        Ok(size / block_size + i64::from(size % block_size != 0))
    }

    /// Plaintext at `block_index` inside block `block_number`
    ///
    /// Fails with [`Error::IndexOutOfBounds`] when the offset is not inside a
    /// block or the global index lies past the end of the keyspace (the last
    /// block of a length is usually truncated).
    pub fn text_at(&self, string_length: u32, block_number: i64, block_index: u32) -> Result<String> {
        if block_index >= self.block_size {
            return Err(Error::IndexOutOfBounds {
                index: i64::from(block_index),
                max: i64::from(self.block_size),
            });
        }

        let size = self.size(string_length)?;
        let index = block_number
            .checked_mul(i64::from(self.block_size))
            .and_then(|base| base.checked_add(i64::from(block_index)))
            .unwrap_or(i64::MAX);
        if !(0..size).contains(&index) {
            return Err(Error::IndexOutOfBounds { index, max: size });
        }

        Ok(self
            .digits(string_length, index)
            .into_iter()
            .map(|digit| self.alphabet.symbols()[digit])
            .collect())
    }

    /// Iterate over every plaintext of one block in index order
    pub fn block_texts(&self, string_length: u32, block_number: i64) -> Result<BlockTexts<'_>> {
        let size = self.size(string_length)?;
        let first = block_number
            .checked_mul(i64::from(self.block_size))
            .unwrap_or(i64::MAX);
        if !(0..size).contains(&first) {
            return Err(Error::IndexOutOfBounds {
                index: first,
                max: size,
            });
        }

        Ok(BlockTexts {
            alphabet: &self.alphabet,
            digits: self.digits(string_length, first),
            remaining: (size - first).min(i64::from(self.block_size)),
        })
    }

    /// Base-`|alphabet|` digits of `index`, most significant first
    fn digits(&self, string_length: u32, mut index: i64) -> Vec<usize> {
        let radix = self.alphabet.len() as i64;
        let mut digits = vec![0; string_length as usize];
        for digit in digits.iter_mut().rev() {
            *digit = (index % radix) as usize;
            index /= radix;
        }
        digits
    }
}

/// Iterator over the plaintexts of one block
///
/// Keeps the current digits and increments them in place instead of
/// re-decoding every index.
pub struct BlockTexts<'a> {
    alphabet: &'a Alphabet,
    digits: Vec<usize>,
    remaining: i64,
}

impl Iterator for BlockTexts<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.remaining == 0 {
            return None;
        }
        let symbols = self.alphabet.symbols();
        let text = self.digits.iter().map(|&digit| symbols[digit]).collect();

        self.remaining -= 1;
        for digit in self.digits.iter_mut().rev() {
            *digit += 1;
            if *digit < symbols.len() {
                break;
            }
            *digit = 0;
        }

        Some(text)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
