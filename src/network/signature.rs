//! Ordered boolean signatures over a fixed vertex list.
//!
//! Signatures are enumerated exhaustively in a fixed order: true before false,
//! leftmost position varying slowest. Parameter storage and variant selection
//! depend on this order being stable, so [`Signature::from_index`] and
//! [`Signature::index`] are the only way positions are mapped to bits.

use std::fmt;
use std::str::FromStr;

use crate::error::NetworkError;

/// One assignment of true/false to an ordered list of vertices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(Vec<bool>);

impl Signature {
    pub fn new(bits: Vec<bool>) -> Self {
        Self(bits)
    }

    /// The `index`-th signature of width `width` in enumeration order.
    pub fn from_index(index: usize, width: usize) -> Self {
        Self(
            (0..width)
                .map(|i| (index >> (width - 1 - i)) & 1 == 0)
                .collect(),
        )
    }

    /// Position of this signature in enumeration order.
    pub fn index(&self) -> usize {
        let width = self.0.len();
        self.0
            .iter()
            .enumerate()
            .filter(|(_, bit)| !**bit)
            .fold(0, |acc, (i, _)| acc | (1 << (width - 1 - i)))
    }

    /// All `2^width` signatures in enumeration order.
    pub fn all(width: usize) -> impl Iterator<Item = Signature> {
        (0..1usize << width).map(move |k| Signature::from_index(k, width))
    }

    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    pub fn get(&self, position: usize) -> bool {
        self.0[position]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in &self.0 {
            f.write_str(if *bit { "T" } else { "F" })?;
        }
        Ok(())
    }
}

impl FromStr for Signature {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .map(|c| match c {
                'T' | 't' => Ok(true),
                'F' | 'f' => Ok(false),
                other => Err(NetworkError::InvalidDefinition {
                    message: format!("invalid signature character {other:?} in {s:?}"),
                }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Signature)
    }
}
