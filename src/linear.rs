//! Linear expressions and constraints.
//!
//! A [`LinExpr`] is `Σ aᵢ·vᵢ + c` with arbitrary-precision
//! coefficients; a [`LinCons`] is `expr ⋈ 0` for `⋈ ∈ {=, ≠, ≤, <}`.
//! Expressions are kept canonical: zero coefficients are dropped, so
//! structural equality coincides with algebraic equality.
//!
//! Constraints are built with chained methods rather than operator
//! overloads:
//!
//! ```text
//! x.sub(y).le()          // x - y ≤ 0
//! LinExpr::var("x").sub_const(num(5)).eq()   // x = 5
//! ```

use std::collections::BTreeMap;
use std::fmt;

use num_traits::Zero;

use crate::num::Number;

/// A linear expression `Σ aᵢ·vᵢ + c` over variables of type `V`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinExpr<V: Ord> {
    terms: BTreeMap<V, Number>,
    constant: Number,
}

impl<V: Ord + Clone> LinExpr<V> {
    /// The zero expression.
    pub fn zero() -> Self {
        LinExpr {
            terms: BTreeMap::new(),
            constant: Number::zero(),
        }
    }

    /// A constant expression.
    pub fn constant(n: impl Into<Number>) -> Self {
        LinExpr {
            terms: BTreeMap::new(),
            constant: n.into(),
        }
    }

    /// A single variable with coefficient 1.
    pub fn var(v: impl Into<V>) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(v.into(), Number::from(1));
        LinExpr {
            terms,
            constant: Number::zero(),
        }
    }

    /// `self + other`.
    pub fn add(mut self, other: Self) -> Self {
        for (v, a) in other.terms {
            self.add_term(v, a);
        }
        self.constant += other.constant;
        self
    }

    /// `self - other`.
    pub fn sub(self, other: Self) -> Self {
        self.add(other.neg())
    }

    /// `self + k`.
    pub fn add_const(mut self, k: impl Into<Number>) -> Self {
        self.constant += k.into();
        self
    }

    /// `self - k`.
    pub fn sub_const(mut self, k: impl Into<Number>) -> Self {
        self.constant -= k.into();
        self
    }

    /// `self * k`.
    pub fn scale(mut self, k: impl Into<Number>) -> Self {
        let k = k.into();
        if k.is_zero() {
            return LinExpr::zero();
        }
        for a in self.terms.values_mut() {
            *a *= &k;
        }
        self.constant *= &k;
        self
    }

    /// `-self`.
    pub fn neg(self) -> Self {
        self.scale(Number::from(-1))
    }

    /// Adds `a·v`, dropping the entry if the coefficient cancels.
    pub fn add_term(&mut self, v: V, a: Number) {
        if a.is_zero() {
            return;
        }
        let cancelled = match self.terms.get_mut(&v) {
            Some(entry) => {
                *entry += a;
                entry.is_zero()
            }
            None => {
                self.terms.insert(v, a);
                return;
            }
        };
        if cancelled {
            self.terms.remove(&v);
        }
    }

    /// Coefficient of `v` (zero if absent).
    pub fn coefficient(&self, v: &V) -> Number {
        self.terms.get(v).cloned().unwrap_or_else(Number::zero)
    }

    /// The constant part `c`.
    pub fn constant_part(&self) -> &Number {
        &self.constant
    }

    /// Iterates over the `(variable, coefficient)` pairs, in variable order.
    pub fn terms(&self) -> impl Iterator<Item = (&V, &Number)> {
        self.terms.iter()
    }

    /// Iterates over the variables mentioned with non-zero coefficient.
    pub fn variables(&self) -> impl Iterator<Item = &V> {
        self.terms.keys()
    }

    /// True when no variable has a non-zero coefficient.
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// `Some(v)` when the expression is exactly `1·v + 0`.
    pub fn as_variable(&self) -> Option<&V> {
        if !self.constant.is_zero() || self.terms.len() != 1 {
            return None;
        }
        let (v, a) = self.terms.iter().next().unwrap();
        if *a == Number::from(1) {
            Some(v)
        } else {
            None
        }
    }

    /// Renames every variable through `f`, keeping coefficients.
    pub fn rename<W: Ord + Clone>(&self, mut f: impl FnMut(&V) -> W) -> LinExpr<W> {
        let mut out = LinExpr::constant(self.constant.clone());
        for (v, a) in &self.terms {
            out.add_term(f(v), a.clone());
        }
        out
    }

    // Constraint builders: `self ⋈ 0`.

    /// `self = 0`.
    pub fn eq(self) -> LinCons<V> {
        LinCons::new(self, ConsKind::Eq)
    }

    /// `self ≠ 0`.
    pub fn neq(self) -> LinCons<V> {
        LinCons::new(self, ConsKind::Neq)
    }

    /// `self ≤ 0`.
    pub fn le(self) -> LinCons<V> {
        LinCons::new(self, ConsKind::Leq)
    }

    /// `self < 0`.
    pub fn lt(self) -> LinCons<V> {
        LinCons::new(self, ConsKind::Lt)
    }
}

impl<V: Ord + Clone + fmt::Display> fmt::Display for LinExpr<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (v, a) in &self.terms {
            if first {
                if *a == Number::from(1) {
                    write!(f, "{}", v)?;
                } else if *a == Number::from(-1) {
                    write!(f, "-{}", v)?;
                } else {
                    write!(f, "{}*{}", a, v)?;
                }
                first = false;
            } else if *a == Number::from(1) {
                write!(f, " + {}", v)?;
            } else if *a == Number::from(-1) {
                write!(f, " - {}", v)?;
            } else if a < &Number::zero() {
                write!(f, " - {}*{}", -a.clone(), v)?;
            } else {
                write!(f, " + {}*{}", a, v)?;
            }
        }
        if first {
            write!(f, "{}", self.constant)?;
        } else if self.constant > Number::zero() {
            write!(f, " + {}", self.constant)?;
        } else if self.constant < Number::zero() {
            write!(f, " - {}", -self.constant.clone())?;
        }
        Ok(())
    }
}

/// Comparison kind of a linear constraint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConsKind {
    Eq,
    Neq,
    Leq,
    Lt,
}

impl fmt::Display for ConsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsKind::Eq => write!(f, "="),
            ConsKind::Neq => write!(f, "!="),
            ConsKind::Leq => write!(f, "<="),
            ConsKind::Lt => write!(f, "<"),
        }
    }
}

/// A linear constraint `expr ⋈ 0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinCons<V: Ord> {
    expr: LinExpr<V>,
    kind: ConsKind,
}

impl<V: Ord + Clone> LinCons<V> {
    pub fn new(expr: LinExpr<V>, kind: ConsKind) -> Self {
        LinCons { expr, kind }
    }

    /// An unsatisfiable constraint (`1 = 0`).
    pub fn contradiction() -> Self {
        LinCons::new(LinExpr::constant(Number::from(1)), ConsKind::Eq)
    }

    pub fn expr(&self) -> &LinExpr<V> {
        &self.expr
    }

    pub fn kind(&self) -> ConsKind {
        self.kind
    }

    pub fn variables(&self) -> impl Iterator<Item = &V> {
        self.expr.variables()
    }

    /// For a constant expression, whether the constraint holds.
    /// `None` if the expression still mentions variables.
    pub fn constant_truth(&self) -> Option<bool> {
        if !self.expr.is_constant() {
            return None;
        }
        let c = self.expr.constant_part();
        Some(match self.kind {
            ConsKind::Eq => c.is_zero(),
            ConsKind::Neq => !c.is_zero(),
            ConsKind::Leq => c <= &Number::zero(),
            ConsKind::Lt => c < &Number::zero(),
        })
    }

    /// Renames every variable through `f`.
    pub fn rename<W: Ord + Clone>(&self, f: impl FnMut(&V) -> W) -> LinCons<W> {
        LinCons::new(self.expr.rename(f), self.kind)
    }
}

impl<V: Ord + Clone + fmt::Display> fmt::Display for LinCons<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} 0", self.expr, self.kind)
    }
}

/// A conjunction of linear constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSystem<V: Ord> {
    constraints: Vec<LinCons<V>>,
}

impl<V: Ord + Clone> ConstraintSystem<V> {
    pub fn new() -> Self {
        ConstraintSystem {
            constraints: Vec::new(),
        }
    }

    pub fn push(&mut self, c: LinCons<V>) {
        self.constraints.push(c);
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinCons<V>> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// True when some member is a constant falsehood.
    pub fn is_contradiction(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| c.constant_truth() == Some(false))
    }
}

impl<V: Ord + Clone> FromIterator<LinCons<V>> for ConstraintSystem<V> {
    fn from_iter<I: IntoIterator<Item = LinCons<V>>>(iter: I) -> Self {
        ConstraintSystem {
            constraints: iter.into_iter().collect(),
        }
    }
}

impl<V: Ord + Clone> Extend<LinCons<V>> for ConstraintSystem<V> {
    fn extend<I: IntoIterator<Item = LinCons<V>>>(&mut self, iter: I) {
        self.constraints.extend(iter);
    }
}

impl<V: Ord> IntoIterator for ConstraintSystem<V> {
    type Item = LinCons<V>;
    type IntoIter = std::vec::IntoIter<LinCons<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.constraints.into_iter()
    }
}

impl<V: Ord + Clone + fmt::Display> fmt::Display for ConstraintSystem<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, c) in self.constraints.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, "}}")
    }
}
