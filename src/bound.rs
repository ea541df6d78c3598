//! Extended-integer bounds: `-∞`, finite, `+∞`.
//!
//! Bounds order naturally (`-∞ < n < +∞`) and carry the saturating
//! arithmetic intervals need. Mixed `∞ - ∞` forms cannot arise from
//! well-formed intervals; where they could appear the operations
//! saturate toward the imprecise side.

use std::fmt;

use num_integer::Integer;
use num_traits::{Signed, Zero};

use crate::num::Number;

/// Bound of an interval: `-∞`, a finite number, or `+∞`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bound {
    NegInf,
    Finite(Number),
    PosInf,
}

impl Bound {
    pub fn finite(n: impl Into<Number>) -> Self {
        Bound::Finite(n.into())
    }

    pub fn zero() -> Self {
        Bound::Finite(Number::zero())
    }

    /// The finite value, if any.
    pub fn number(&self) -> Option<&Number> {
        match self {
            Bound::Finite(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Bound::Finite(_))
    }

    pub fn add(&self, other: &Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a + b),
            // Undefined; saturate high.
            (Bound::NegInf, Bound::PosInf) | (Bound::PosInf, Bound::NegInf) => Bound::PosInf,
            (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
            (Bound::PosInf, _) | (_, Bound::PosInf) => Bound::PosInf,
        }
    }

    pub fn sub(&self, other: &Bound) -> Bound {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a * b),
            // 0 * ±∞ = 0 by the interval-arithmetic convention.
            (Bound::Finite(a), _) if a.is_zero() => Bound::zero(),
            (_, Bound::Finite(b)) if b.is_zero() => Bound::zero(),
            _ => {
                if self.is_negative() == other.is_negative() {
                    Bound::PosInf
                } else {
                    Bound::NegInf
                }
            }
        }
    }

    pub fn neg(&self) -> Bound {
        match self {
            Bound::NegInf => Bound::PosInf,
            Bound::Finite(n) => Bound::Finite(-n),
            Bound::PosInf => Bound::NegInf,
        }
    }

    /// `self + 1`.
    pub fn succ(&self) -> Bound {
        self.add(&Bound::finite(1))
    }

    /// `self - 1`.
    pub fn pred(&self) -> Bound {
        self.sub(&Bound::finite(1))
    }

    /// Divides by a non-zero finite number, rounding toward `-∞`.
    pub fn div_floor(&self, d: &Number) -> Bound {
        debug_assert!(!d.is_zero());
        match self {
            Bound::Finite(n) => Bound::Finite(n.div_floor(d)),
            inf => {
                if d.is_negative() {
                    inf.neg()
                } else {
                    inf.clone()
                }
            }
        }
    }

    /// Divides by a non-zero finite number, rounding toward `+∞`.
    pub fn div_ceil(&self, d: &Number) -> Bound {
        debug_assert!(!d.is_zero());
        match self {
            Bound::Finite(n) => Bound::Finite(n.div_ceil(d)),
            inf => {
                if d.is_negative() {
                    inf.neg()
                } else {
                    inf.clone()
                }
            }
        }
    }

    fn is_negative(&self) -> bool {
        match self {
            Bound::NegInf => true,
            Bound::Finite(n) => n.is_negative(),
            Bound::PosInf => false,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::NegInf => write!(f, "-oo"),
            Bound::Finite(n) => write!(f, "{}", n),
            Bound::PosInf => write!(f, "+oo"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::num;

    #[test]
    fn test_ordering() {
        assert!(Bound::NegInf < Bound::finite(-1000));
        assert!(Bound::finite(-1) < Bound::finite(1));
        assert!(Bound::finite(1000) < Bound::PosInf);
        assert!(Bound::NegInf < Bound::PosInf);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(Bound::finite(2).add(&Bound::finite(3)), Bound::finite(5));
        assert_eq!(Bound::finite(2).sub(&Bound::PosInf), Bound::NegInf);
        assert_eq!(Bound::NegInf.add(&Bound::finite(7)), Bound::NegInf);
        assert_eq!(Bound::PosInf.neg(), Bound::NegInf);
    }

    #[test]
    fn test_mul_zero_infinity() {
        assert_eq!(Bound::zero().mul(&Bound::PosInf), Bound::zero());
        assert_eq!(Bound::NegInf.mul(&Bound::zero()), Bound::zero());
        assert_eq!(Bound::NegInf.mul(&Bound::finite(2)), Bound::NegInf);
        assert_eq!(Bound::NegInf.mul(&Bound::finite(-2)), Bound::PosInf);
        assert_eq!(Bound::NegInf.mul(&Bound::NegInf), Bound::PosInf);
    }

    #[test]
    fn test_rounded_division() {
        assert_eq!(Bound::finite(7).div_floor(&num(2)), Bound::finite(3));
        assert_eq!(Bound::finite(7).div_ceil(&num(2)), Bound::finite(4));
        assert_eq!(Bound::finite(-7).div_floor(&num(2)), Bound::finite(-4));
        assert_eq!(Bound::finite(-7).div_ceil(&num(2)), Bound::finite(-3));
        assert_eq!(Bound::finite(7).div_floor(&num(-2)), Bound::finite(-4));
        assert_eq!(Bound::PosInf.div_floor(&num(-3)), Bound::NegInf);
    }
}
