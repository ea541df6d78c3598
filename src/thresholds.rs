//! Widening thresholds (jump sets).
//!
//! A [`Thresholds`] is a sorted set of landing points for threshold
//! widening: instead of extrapolating straight to ±∞, an unstable bound
//! jumps to the nearest threshold beyond it. The empty set degrades to
//! ordinary widening.

use std::collections::BTreeSet;
use std::fmt;

use crate::bound::Bound;
use crate::num::Number;

/// A sorted set of widening thresholds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thresholds {
    values: BTreeSet<Number>,
}

impl Thresholds {
    pub fn new() -> Self {
        Thresholds::default()
    }

    pub fn add(&mut self, value: impl Into<Number>) {
        self.values.insert(value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Smallest threshold `>= b`, or `+∞` when none exists.
    pub fn next_up(&self, b: &Bound) -> Bound {
        match b {
            Bound::NegInf => self
                .values
                .iter()
                .next()
                .cloned()
                .map_or(Bound::NegInf, Bound::Finite),
            Bound::Finite(n) => self
                .values
                .range(n.clone()..)
                .next()
                .cloned()
                .map_or(Bound::PosInf, Bound::Finite),
            Bound::PosInf => Bound::PosInf,
        }
    }

    /// Largest threshold `<= b`, or `-∞` when none exists.
    pub fn next_down(&self, b: &Bound) -> Bound {
        match b {
            Bound::PosInf => self
                .values
                .iter()
                .next_back()
                .cloned()
                .map_or(Bound::PosInf, Bound::Finite),
            Bound::Finite(n) => self
                .values
                .range(..=n.clone())
                .next_back()
                .cloned()
                .map_or(Bound::NegInf, Bound::Finite),
            Bound::NegInf => Bound::NegInf,
        }
    }
}

impl FromIterator<Number> for Thresholds {
    fn from_iter<I: IntoIterator<Item = Number>>(iter: I) -> Self {
        Thresholds {
            values: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Thresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}
