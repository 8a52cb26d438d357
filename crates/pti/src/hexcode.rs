//! Short public identifiers for uploaded images.
//!
//! A hexcode is eight lowercase hexadecimal characters. It is drawn at random
//! and carries no information about the image it names; uniqueness is the
//! record store's job, not the generator's.

use std::{fmt, ops::Deref, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of characters in a hexcode.
pub const HEXCODE_LEN: usize = 8;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexcodeError {
    #[error("hexcode must be {HEXCODE_LEN} characters, got {0}")]
    Length(usize),

    #[error("hexcode may only contain 0-9 and a-f, found {0:?}")]
    Character(char),
}

/// Validated 8-character lowercase hex identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hexcode(String);

impl Hexcode {
    /// Draw a new hexcode uniformly from the 16^8 keyspace.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Draw a new hexcode from the given random source.
    pub fn generate_with<R: Rng>(rng: &mut R) -> Self {
        let code = (0..HEXCODE_LEN)
            .map(|_| HEX_DIGITS[rng.random_range(0..HEX_DIGITS.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Hexcode {
    type Err = HexcodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let len = s.chars().count();
        if len != HEXCODE_LEN {
            return Err(HexcodeError::Length(len));
        }
        if let Some(bad) = s.chars().find(|&c| !matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(HexcodeError::Character(bad));
        }
        Ok(Self(s.to_owned()))
    }
}

impl TryFrom<String> for Hexcode {
    type Error = HexcodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Hexcode> for String {
    fn from(value: Hexcode) -> Self {
        value.0
    }
}

impl Deref for Hexcode {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Hexcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hexcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
