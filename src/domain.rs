//! The base-domain capability contract.
//!
//! Every numerical lattice the analysis can run over --- intervals here,
//! octagons or polyhedra elsewhere --- is a plain value satisfying
//! [`BaseDomain`]. There is no domain-object/element split and no
//! inheritance: the value *is* the abstract state, and combinators
//! ([`crate::term_domain::TermDomain`], [`crate::powerset::PowersetDomain`])
//! are values wrapping other values.
//!
//! # Lattice laws
//!
//! Implementations must satisfy, for all well-formed values:
//!
//! - Reflexivity: `a ⊑ a`
//! - `⊥ ⊑ x ⊑ ⊤`
//! - Join upper bound: `a ⊑ a ⊔ b`, `b ⊑ a ⊔ b`
//! - Meet lower bound: `a ⊓ b ⊑ a`, `a ⊓ b ⊑ b`
//! - Widen upper bound: `a ⊑ a ∇ b`, `b ⊑ a ∇ b`, and every ascending
//!   chain `a, a ∇ b₁, (a ∇ b₁) ∇ b₂, …` stabilizes
//!
//! Transfer operations mutate in place; lattice operations build fresh
//! values. Cloning a value clones the whole abstract state --- no two
//! values ever alias.

use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;

use crate::interval::Interval;
use crate::linear::{ConstraintSystem, LinCons, LinExpr};
use crate::num::Number;
use crate::thresholds::Thresholds;

/// Arithmetic operations. These are the functors the term DAG folds over.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithOp::Add => write!(f, "+"),
            ArithOp::Sub => write!(f, "-"),
            ArithOp::Mul => write!(f, "*"),
            ArithOp::Div => write!(f, "/"),
        }
    }
}

/// Bitwise operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

impl fmt::Display for BitwiseOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitwiseOp::And => write!(f, "&"),
            BitwiseOp::Or => write!(f, "|"),
            BitwiseOp::Xor => write!(f, "^"),
            BitwiseOp::Shl => write!(f, "<<"),
            BitwiseOp::LShr => write!(f, ">>l"),
            BitwiseOp::AShr => write!(f, ">>a"),
        }
    }
}

/// Signed/unsigned division and remainder variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DivOp {
    SDiv,
    UDiv,
    SRem,
    URem,
}

impl fmt::Display for DivOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivOp::SDiv => write!(f, "/s"),
            DivOp::UDiv => write!(f, "/u"),
            DivOp::SRem => write!(f, "%s"),
            DivOp::URem => write!(f, "%u"),
        }
    }
}

/// Width-conversion operations. The analysis reasons in unbounded
/// integers, so these degrade to plain copies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
}

impl fmt::Display for CastOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastOp::Trunc => write!(f, "trunc"),
            CastOp::ZExt => write!(f, "zext"),
            CastOp::SExt => write!(f, "sext"),
        }
    }
}

/// A term functor: any binary operation a term application can carry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Op {
    Arith(ArithOp),
    Bitwise(BitwiseOp),
    Div(DivOp),
}

impl Op {
    /// Dense opcode for canonical hashing.
    pub(crate) fn opcode(self) -> u64 {
        match self {
            Op::Arith(ArithOp::Add) => 0,
            Op::Arith(ArithOp::Sub) => 1,
            Op::Arith(ArithOp::Mul) => 2,
            Op::Arith(ArithOp::Div) => 3,
            Op::Bitwise(BitwiseOp::And) => 4,
            Op::Bitwise(BitwiseOp::Or) => 5,
            Op::Bitwise(BitwiseOp::Xor) => 6,
            Op::Bitwise(BitwiseOp::Shl) => 7,
            Op::Bitwise(BitwiseOp::LShr) => 8,
            Op::Bitwise(BitwiseOp::AShr) => 9,
            Op::Div(DivOp::SDiv) => 10,
            Op::Div(DivOp::UDiv) => 11,
            Op::Div(DivOp::SRem) => 12,
            Op::Div(DivOp::URem) => 13,
        }
    }
}

impl From<ArithOp> for Op {
    fn from(op: ArithOp) -> Self {
        Op::Arith(op)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Arith(op) => write!(f, "{}", op),
            Op::Bitwise(op) => write!(f, "{}", op),
            Op::Div(op) => write!(f, "{}", op),
        }
    }
}

/// The contract every numerical abstract domain satisfies.
///
/// `Var` is the domain's own variable namespace: program variables for
/// a domain used directly, proxy variables when the domain sits under
/// the term-equivalence layer.
pub trait BaseDomain: Clone + Debug + fmt::Display {
    type Var: Clone + Eq + Ord + Hash + Debug + fmt::Display;

    // Constructors and predicates.

    fn top() -> Self;
    fn bottom() -> Self;
    fn is_top(&self) -> bool;
    fn is_bottom(&self) -> bool;

    // Lattice.

    fn leq(&self, other: &Self) -> bool;
    fn join(&self, other: &Self) -> Self;
    fn meet(&self, other: &Self) -> Self;
    fn widen(&self, other: &Self) -> Self;
    fn narrow(&self, other: &Self) -> Self;

    /// Widening with a jump set; with an empty set this must equal
    /// plain widening.
    fn widen_with_thresholds(&self, other: &Self, ts: &Thresholds) -> Self;

    /// `a = b` as lattice elements (mutual inclusion).
    fn same_as(&self, other: &Self) -> bool {
        self.leq(other) && other.leq(self)
    }

    // Transfer functions.

    /// `x := e`.
    fn assign(&mut self, x: &Self::Var, e: &LinExpr<Self::Var>);

    /// `x := y op z`.
    fn apply(&mut self, op: ArithOp, x: &Self::Var, y: &Self::Var, z: &Self::Var);

    /// `x := y op k`.
    fn apply_const(&mut self, op: ArithOp, x: &Self::Var, y: &Self::Var, k: &Number);

    /// `x := y op z` for bitwise operations.
    fn apply_bitwise(&mut self, op: BitwiseOp, x: &Self::Var, y: &Self::Var, z: &Self::Var);

    /// `x := y op k` for bitwise operations.
    fn apply_bitwise_const(&mut self, op: BitwiseOp, x: &Self::Var, y: &Self::Var, k: &Number);

    /// `x := y op z` for division/remainder variants.
    fn apply_div(&mut self, op: DivOp, x: &Self::Var, y: &Self::Var, z: &Self::Var);

    /// `x := y op k` for division/remainder variants.
    fn apply_div_const(&mut self, op: DivOp, x: &Self::Var, y: &Self::Var, k: &Number);

    /// `x := cast(y)` at the given bit width.
    fn apply_cast(&mut self, op: CastOp, x: &Self::Var, y: &Self::Var, width: u32);

    /// Conjoins a linear constraint (`+=` in operator terms).
    fn add_constraint(&mut self, c: &LinCons<Self::Var>);

    /// Conjoins a whole system.
    fn add_constraints(&mut self, cs: &ConstraintSystem<Self::Var>) {
        for c in cs.iter() {
            self.add_constraint(c);
        }
    }

    /// Removes a variable from scope (`-=`).
    fn forget(&mut self, v: &Self::Var);

    /// Constrains `v` to an interval.
    fn set(&mut self, v: &Self::Var, itv: Interval);

    /// Interval projection of `v`.
    fn value_of(&self, v: &Self::Var) -> Interval;

    /// Extracts the state as a constraint system over `Var`.
    fn to_constraints(&self) -> ConstraintSystem<Self::Var>;

    /// Human-readable domain name, owned by the caller.
    fn name() -> String;
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Validates the lattice laws over a sample of values.
    pub fn check_lattice_axioms<D: BaseDomain>(samples: &[D]) {
        for a in samples {
            assert!(a.leq(a), "reflexivity failed");
            assert!(D::bottom().leq(a), "bottom is not least");
            assert!(a.leq(&D::top()), "top is not greatest");

            let with_bottom = a.join(&D::bottom());
            assert!(a.same_as(&with_bottom), "join with bottom changed value");
            let with_top = a.meet(&D::top());
            assert!(a.same_as(&with_top), "meet with top changed value");
        }

        for a in samples {
            for b in samples {
                let j = a.join(b);
                assert!(a.leq(&j), "join is not an upper bound of a");
                assert!(b.leq(&j), "join is not an upper bound of b");
                assert!(j.same_as(&b.join(a)), "join is not commutative");

                let m = a.meet(b);
                assert!(m.leq(a), "meet is not a lower bound of a");
                assert!(m.leq(b), "meet is not a lower bound of b");

                let w = a.widen(b);
                assert!(a.leq(&w), "widening does not cover a");
                assert!(b.leq(&w), "widening does not cover b");
            }
        }
    }
}
