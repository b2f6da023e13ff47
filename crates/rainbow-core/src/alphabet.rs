//! Plaintext alphabets

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Named character classes that can be combined into an alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharClass {
    /// `a-z`
    Lower,
    /// `A-Z`
    Upper,
    /// `0-9`
    Digits,
}

impl CharClass {
    /// Symbols of this class in ascending order
    pub fn symbols(&self) -> &'static str {
        match self {
            CharClass::Lower => "abcdefghijklmnopqrstuvwxyz",
            CharClass::Upper => "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
            CharClass::Digits => "0123456789",
        }
    }
}

/// Ordered set of distinct plaintext symbols
///
/// The position of a symbol is its digit value when keyspace indices are
/// decoded, so the first symbol is the padding symbol and the last one is
/// the highest digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
}

impl Alphabet {
    /// Build an alphabet from a string of distinct symbols
    pub fn new(symbols: &str) -> Result<Self> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.is_empty() {
            return Err(Error::InvalidAlphabet("alphabet is empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(symbols.len());
        for symbol in &symbols {
            if !seen.insert(*symbol) {
                return Err(Error::InvalidAlphabet(format!(
                    "duplicate symbol {:?}",
                    symbol
                )));
            }
        }

        Ok(Self { symbols })
    }

    /// Concatenate character classes in the given order
    pub fn from_classes(classes: &[CharClass]) -> Result<Self> {
        let joined: String = classes.iter().map(|class| class.symbols()).collect();
        Self::new(&joined)
    }

    /// The 26 lowercase ASCII letters
    pub fn lowercase() -> Self {
        Self {
            symbols: CharClass::Lower.symbols().chars().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    pub fn symbol(&self, digit: usize) -> Option<char> {
        self.symbols.get(digit).copied()
    }

    /// Padding symbol, digit zero
    pub fn first(&self) -> char {
        self.symbols[0]
    }

    /// Highest digit
    pub fn last(&self) -> char {
        self.symbols[self.symbols.len() - 1]
    }
}

impl FromStr for Alphabet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: String = self.symbols.iter().collect();
        f.write_str(&joined)
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_rejects_empty() {
        assert!(matches!(Alphabet::new(""), Err(Error::InvalidAlphabet(_))));
    }

    #[test]
    fn test_alphabet_rejects_duplicates() {
        assert!(matches!(Alphabet::new("abca"), Err(Error::InvalidAlphabet(_))));
    }

    #[test]
    fn test_from_classes_keeps_order() {
        let alphabet =
            Alphabet::from_classes(&[CharClass::Upper, CharClass::Lower, CharClass::Digits]).unwrap();
        assert_eq!(alphabet.len(), 62);
        assert_eq!(alphabet.first(), 'A');
        assert_eq!(alphabet.last(), '9');
        assert_eq!(alphabet.symbol(26), Some('a'));
    }

    #[test]
    fn test_overlapping_classes_rejected() {
        assert!(Alphabet::from_classes(&[CharClass::Digits, CharClass::Digits]).is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let alphabet: Alphabet = "xyz".parse().unwrap();
        assert_eq!(alphabet.to_string(), "xyz");
        assert_eq!(Alphabet::default(), Alphabet::lowercase());
    }
}
