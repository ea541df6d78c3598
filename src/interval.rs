//! The interval lattice over extended integers.
//!
//! An [`Interval`] is a closed bound pair `[low, high]`:
//!
//! - **Order** (`⊑`): containment --- `[l₁, h₁] ⊑ [l₂, h₂]` iff `l₂ ≤ l₁` and `h₁ ≤ h₂`
//! - **Join** (`⊔`): convex hull
//! - **Meet** (`⊓`): intersection
//! - **Bottom** (`⊥`): the empty interval, canonically `[+∞, -∞]`
//! - **Top** (`⊤`): `[-∞, +∞]`
//!
//! Widening extrapolates unstable bounds to ±∞ (or to the nearest
//! threshold); narrowing pulls infinite bounds back in. The abstract
//! arithmetic follows integer semantics: division truncates toward
//! zero and splits the divisor around 0.

use std::cmp::{max, min};
use std::fmt;

use num_traits::{Signed, Zero};

use crate::bound::Bound;
use crate::num::Number;
use crate::thresholds::Thresholds;

/// A closed interval `[low, high]` over extended integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    low: Bound,
    high: Bound,
}

impl Interval {
    /// Builds `[low, high]`, collapsing empty pairs to the canonical bottom.
    pub fn new(low: Bound, high: Bound) -> Self {
        if low > high {
            Interval::bottom()
        } else {
            Interval { low, high }
        }
    }

    pub fn constant(n: impl Into<Number>) -> Self {
        let n = n.into();
        Interval {
            low: Bound::Finite(n.clone()),
            high: Bound::Finite(n),
        }
    }

    /// Finite range `[l, h]`.
    pub fn range(l: impl Into<Number>, h: impl Into<Number>) -> Self {
        Interval::new(Bound::finite(l), Bound::finite(h))
    }

    pub fn top() -> Self {
        Interval {
            low: Bound::NegInf,
            high: Bound::PosInf,
        }
    }

    pub fn bottom() -> Self {
        Interval {
            low: Bound::PosInf,
            high: Bound::NegInf,
        }
    }

    /// `[0, +∞]`.
    pub fn non_negative() -> Self {
        Interval::new(Bound::zero(), Bound::PosInf)
    }

    pub fn is_bottom(&self) -> bool {
        self.low > self.high
    }

    pub fn is_top(&self) -> bool {
        self.low == Bound::NegInf && self.high == Bound::PosInf
    }

    pub fn lb(&self) -> &Bound {
        &self.low
    }

    pub fn ub(&self) -> &Bound {
        &self.high
    }

    /// The single member, when the interval is a point.
    pub fn singleton(&self) -> Option<&Number> {
        match (&self.low, &self.high) {
            (Bound::Finite(l), Bound::Finite(h)) if l == h => Some(l),
            _ => None,
        }
    }

    pub fn contains(&self, n: &Number) -> bool {
        !self.is_bottom()
            && self.low <= Bound::Finite(n.clone())
            && Bound::Finite(n.clone()) <= self.high
    }

    // Lattice operations.

    pub fn leq(&self, other: &Interval) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        other.low <= self.low && self.high <= other.high
    }

    pub fn join(&self, other: &Interval) -> Interval {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        Interval {
            low: min(self.low.clone(), other.low.clone()),
            high: max(self.high.clone(), other.high.clone()),
        }
    }

    pub fn meet(&self, other: &Interval) -> Interval {
        Interval::new(
            max(self.low.clone(), other.low.clone()),
            min(self.high.clone(), other.high.clone()),
        )
    }

    pub fn widen(&self, other: &Interval) -> Interval {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let low = if other.low < self.low {
            Bound::NegInf
        } else {
            self.low.clone()
        };
        let high = if other.high > self.high {
            Bound::PosInf
        } else {
            self.high.clone()
        };
        Interval { low, high }
    }

    /// Widening that lands on the nearest threshold instead of ±∞.
    pub fn widen_thresholds(&self, other: &Interval, ts: &Thresholds) -> Interval {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let low = if other.low < self.low {
            ts.next_down(&other.low)
        } else {
            self.low.clone()
        };
        let high = if other.high > self.high {
            ts.next_up(&other.high)
        } else {
            self.high.clone()
        };
        Interval::new(low, high)
    }

    /// Narrowing: refines bounds that widening sent to infinity.
    pub fn narrow(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        let low = if self.low == Bound::NegInf {
            other.low.clone()
        } else {
            self.low.clone()
        };
        let high = if self.high == Bound::PosInf {
            other.high.clone()
        } else {
            self.high.clone()
        };
        Interval::new(low, high)
    }

    // Abstract arithmetic.

    pub fn add(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        Interval::new(self.low.add(&other.low), self.high.add(&other.high))
    }

    pub fn sub(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        Interval::new(self.low.sub(&other.high), self.high.sub(&other.low))
    }

    pub fn neg(&self) -> Interval {
        if self.is_bottom() {
            return Interval::bottom();
        }
        Interval::new(self.high.neg(), self.low.neg())
    }

    pub fn mul(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        let corners = [
            self.low.mul(&other.low),
            self.low.mul(&other.high),
            self.high.mul(&other.low),
            self.high.mul(&other.high),
        ];
        Interval::new(
            corners.iter().min().unwrap().clone(),
            corners.iter().max().unwrap().clone(),
        )
    }

    /// Integer division, truncating toward zero.
    ///
    /// The divisor is split around 0; a divisor that is exactly `[0, 0]`
    /// yields bottom (the operation cannot complete).
    pub fn div(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        let pos = other.meet(&Interval::new(Bound::finite(1), Bound::PosInf));
        let neg = other.meet(&Interval::new(Bound::NegInf, Bound::finite(-1)));
        let mut res = Interval::bottom();
        if !pos.is_bottom() {
            res = res.join(&self.div_by_positive(&pos));
        }
        if !neg.is_bottom() {
            res = res.join(&self.neg().div_by_positive(&neg.neg()));
        }
        res
    }

    // Divisor is wholly >= 1.
    fn div_by_positive(&self, d: &Interval) -> Interval {
        let corners = [
            Self::trunc_div(&self.low, &d.low),
            Self::trunc_div(&self.low, &d.high),
            Self::trunc_div(&self.high, &d.low),
            Self::trunc_div(&self.high, &d.high),
        ];
        Interval::new(
            corners.iter().min().unwrap().clone(),
            corners.iter().max().unwrap().clone(),
        )
    }

    // b >= 1.
    fn trunc_div(a: &Bound, b: &Bound) -> Bound {
        match (a, b) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a / b),
            (Bound::Finite(_), Bound::PosInf) => Bound::zero(),
            (Bound::NegInf, _) => Bound::NegInf,
            (Bound::PosInf, _) => Bound::PosInf,
            (_, Bound::NegInf) => unreachable!("divisor is positive"),
        }
    }

    /// Over-approximation of `{ q : q * other ∩ self ≠ ∅ }`, the
    /// multiplication pre-image used by inverse propagation. Rounds
    /// outward; gives up (top) when the divisor straddles 0.
    pub fn div_outward(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        if other.contains(&Number::zero()) {
            return Interval::top();
        }
        let (x, d) = if other.high < Bound::zero() {
            (self.neg(), other.neg())
        } else {
            (self.clone(), other.clone())
        };
        // d is wholly >= 1 here.
        let floors = [
            Self::floor_corner(&x.low, &d.low),
            Self::floor_corner(&x.low, &d.high),
            Self::floor_corner(&x.high, &d.low),
            Self::floor_corner(&x.high, &d.high),
        ];
        let ceils = [
            Self::ceil_corner(&x.low, &d.low),
            Self::ceil_corner(&x.low, &d.high),
            Self::ceil_corner(&x.high, &d.low),
            Self::ceil_corner(&x.high, &d.high),
        ];
        Interval::new(
            floors.iter().min().unwrap().clone(),
            ceils.iter().max().unwrap().clone(),
        )
    }

    fn floor_corner(a: &Bound, b: &Bound) -> Bound {
        match (a, b) {
            (_, Bound::Finite(b)) => a.div_floor(b),
            (Bound::Finite(a), Bound::PosInf) => {
                if a.is_negative() {
                    Bound::finite(-1)
                } else {
                    Bound::zero()
                }
            }
            (Bound::NegInf, Bound::PosInf) => Bound::NegInf,
            (Bound::PosInf, Bound::PosInf) => Bound::PosInf,
            (_, Bound::NegInf) => unreachable!("divisor is positive"),
        }
    }

    fn ceil_corner(a: &Bound, b: &Bound) -> Bound {
        match (a, b) {
            (_, Bound::Finite(b)) => a.div_ceil(b),
            (Bound::Finite(a), Bound::PosInf) => {
                if a.is_positive() {
                    Bound::finite(1)
                } else {
                    Bound::zero()
                }
            }
            (Bound::NegInf, Bound::PosInf) => Bound::NegInf,
            (Bound::PosInf, Bound::PosInf) => Bound::PosInf,
            (_, Bound::NegInf) => unreachable!("divisor is positive"),
        }
    }

    /// Truncated remainder: `|result| < |divisor|`, sign of the dividend.
    pub fn rem(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        let mag = max(other.low.neg(), other.high.clone());
        let bound = match mag {
            Bound::Finite(m) if !m.is_zero() => Bound::Finite(m - Number::from(1)),
            Bound::Finite(_) => return Interval::bottom(), // divisor is exactly 0
            _ => return Interval::top(),
        };
        let full = Interval::new(bound.neg(), bound);
        // Keep the dividend's sign when it is known.
        if self.low >= Bound::zero() {
            full.meet(&Interval::non_negative())
        } else if self.high <= Bound::zero() {
            full.meet(&Interval::new(Bound::NegInf, Bound::zero()))
        } else {
            full
        }
    }

    /// Coarse bitwise transfer: exact on single points, sound bounds on
    /// non-negative ranges, top otherwise.
    pub fn bitand(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        if let (Some(a), Some(b)) = (self.singleton(), other.singleton()) {
            return Interval::constant(a & b);
        }
        if self.low >= Bound::zero() && other.low >= Bound::zero() {
            // a & b <= min(a, b)
            return Interval::new(Bound::zero(), min(self.high.clone(), other.high.clone()));
        }
        Interval::top()
    }

    /// See [`Interval::bitand`].
    pub fn bitor(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        if let (Some(a), Some(b)) = (self.singleton(), other.singleton()) {
            return Interval::constant(a | b);
        }
        if self.low >= Bound::zero() && other.low >= Bound::zero() {
            // a | b <= a + b for non-negative operands
            return Interval::new(Bound::zero(), self.high.add(&other.high));
        }
        Interval::top()
    }

    /// See [`Interval::bitand`].
    pub fn bitxor(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        if let (Some(a), Some(b)) = (self.singleton(), other.singleton()) {
            return Interval::constant(a ^ b);
        }
        if self.low >= Bound::zero() && other.low >= Bound::zero() {
            return Interval::new(Bound::zero(), self.high.add(&other.high));
        }
        Interval::top()
    }

    /// Left shift by a known amount multiplies by `2^k`; otherwise top.
    pub fn shl(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        match other.singleton().and_then(|k| u32::try_from(k).ok()) {
            Some(k) => self.mul(&Interval::constant(Number::from(1u8) << k)),
            None => Interval::top(),
        }
    }

    /// Logical right shift by a known amount on non-negative values.
    pub fn shr(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        match other.singleton().and_then(|k| u32::try_from(k).ok()) {
            Some(k) if self.low >= Bound::zero() => {
                self.div(&Interval::constant(Number::from(1u8) << k))
            }
            _ => Interval::top(),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            write!(f, "_|_")
        } else {
            write!(f, "[{}, {}]", self.low, self.high)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::num;

    #[test]
    fn test_lattice() {
        let i1 = Interval::range(0, 10);
        let i2 = Interval::range(5, 15);

        assert_eq!(i1.join(&i2), Interval::range(0, 15));
        assert_eq!(i1.meet(&i2), Interval::range(5, 10));
        assert!(i1.meet(&Interval::range(11, 12)).is_bottom());

        assert!(Interval::bottom().leq(&i1));
        assert!(i1.leq(&Interval::top()));
        assert!(Interval::range(2, 3).leq(&i1));
        assert!(!i1.leq(&i2));
    }

    #[test]
    fn test_widen_narrow() {
        let i1 = Interval::range(0, 10);
        let i2 = Interval::range(0, 15);

        let w = i1.widen(&i2);
        assert_eq!(w, Interval::new(Bound::zero(), Bound::PosInf));

        // Narrowing pulls the widened bound back.
        assert_eq!(w.narrow(&Interval::range(0, 12)), Interval::range(0, 12));
        // Finite bounds are kept.
        assert_eq!(i1.narrow(&i2), i1);
    }

    #[test]
    fn test_widen_thresholds() {
        let ts: Thresholds = [num(16), num(64)].into_iter().collect();
        let i1 = Interval::range(0, 10);
        let i2 = Interval::range(0, 20);
        assert_eq!(i1.widen_thresholds(&i2, &ts), Interval::range(0, 64));
        let i3 = Interval::range(0, 100);
        assert_eq!(
            i1.widen_thresholds(&i3, &ts),
            Interval::new(Bound::zero(), Bound::PosInf)
        );
    }

    #[test]
    fn test_arithmetic() {
        let a = Interval::range(1, 3);
        let b = Interval::range(-2, 4);
        assert_eq!(a.add(&b), Interval::range(-1, 7));
        assert_eq!(a.sub(&b), Interval::range(-3, 5));
        assert_eq!(a.mul(&b), Interval::range(-6, 12));
        assert_eq!(a.neg(), Interval::range(-3, -1));
    }

    #[test]
    fn test_division() {
        // Truncation toward zero.
        assert_eq!(
            Interval::range(-7, 7).div(&Interval::constant(2)),
            Interval::range(-3, 3)
        );
        // Divisor straddling zero: both signs contribute.
        assert_eq!(
            Interval::range(4, 8).div(&Interval::range(-2, 2)),
            Interval::range(-8, 8)
        );
        // Division by exactly zero is infeasible.
        assert!(Interval::range(1, 2)
            .div(&Interval::constant(0))
            .is_bottom());
    }

    #[test]
    fn test_div_outward() {
        // Pre-image of multiplication: q * [2,2] ∈ [1,5] → q ∈ [1, 3]
        // (1/2 floors to 0... outward: floor(1/2)=0, ceil(5/2)=3).
        assert_eq!(
            Interval::range(1, 5).div_outward(&Interval::constant(2)),
            Interval::range(0, 3)
        );
        assert_eq!(
            Interval::range(1, 5).div_outward(&Interval::range(-1, 1)),
            Interval::top()
        );
    }

    #[test]
    fn test_rem() {
        assert_eq!(
            Interval::range(0, 100).rem(&Interval::constant(4)),
            Interval::range(0, 3)
        );
        assert_eq!(
            Interval::range(-100, -1).rem(&Interval::constant(4)),
            Interval::range(-3, 0)
        );
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(
            Interval::constant(12).bitand(&Interval::constant(10)),
            Interval::constant(8)
        );
        assert_eq!(
            Interval::range(0, 10).bitand(&Interval::range(0, 6)),
            Interval::range(0, 6)
        );
        assert_eq!(
            Interval::range(0, 3).shl(&Interval::constant(2)),
            Interval::range(0, 12)
        );
        assert!(Interval::range(-1, 3)
            .bitor(&Interval::range(0, 1))
            .is_top());
    }
}
