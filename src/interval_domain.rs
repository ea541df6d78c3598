//! Non-relational interval environment.
//!
//! Maps each variable to an [`Interval`]; variables not in the map are
//! unconstrained. The environment never stores bottom intervals (the
//! whole state collapses to bottom instead) and never stores top
//! intervals (the entry is dropped), so `is_top` is just emptiness.
//!
//! Constraint addition runs a bounded constraint-propagation loop: for
//! each pivot variable the residual of the remaining terms is
//! evaluated and the pivot's interval refined, iterated a fixed number
//! of passes.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;

use num_traits::Zero;

use crate::bound::Bound;
use crate::domain::{ArithOp, BaseDomain, BitwiseOp, CastOp, DivOp};
use crate::interval::Interval;
use crate::linear::{ConsKind, ConstraintSystem, LinCons, LinExpr};
use crate::num::Number;
use crate::thresholds::Thresholds;

/// Refinement passes over a constraint's variables.
const PROPAGATION_PASSES: usize = 3;

/// An interval environment over variables of type `V`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalDomain<V: Ord> {
    env: BTreeMap<V, Interval>,
    is_bottom: bool,
}

impl<V> IntervalDomain<V>
where
    V: Clone + Eq + Ord + Hash + Debug + fmt::Display,
{
    fn set_to_bottom(&mut self) {
        self.env.clear();
        self.is_bottom = true;
    }

    fn get(&self, v: &V) -> Interval {
        if self.is_bottom {
            return Interval::bottom();
        }
        self.env.get(v).cloned().unwrap_or_else(Interval::top)
    }

    // Stores an interval, keeping the no-bottom/no-top invariants.
    fn put(&mut self, v: &V, itv: Interval) {
        if itv.is_bottom() {
            log::debug!("intervals: {} became infeasible", v);
            self.set_to_bottom();
        } else if itv.is_top() {
            self.env.remove(v);
        } else {
            self.env.insert(v.clone(), itv);
        }
    }

    /// Evaluates a linear expression in this environment.
    pub fn eval(&self, e: &LinExpr<V>) -> Interval {
        let mut acc = Interval::constant(e.constant_part().clone());
        for (v, a) in e.terms() {
            let term = self.get(v).mul(&Interval::constant(a.clone()));
            acc = acc.add(&term);
        }
        acc
    }

    // Evaluates the expression with the pivot's term removed.
    fn eval_residual(&self, e: &LinExpr<V>, pivot: &V) -> Interval {
        let mut acc = Interval::constant(e.constant_part().clone());
        for (v, a) in e.terms() {
            if v == pivot {
                continue;
            }
            let term = self.get(v).mul(&Interval::constant(a.clone()));
            acc = acc.add(&term);
        }
        acc
    }

    // One refinement pass; returns whether anything tightened.
    fn propagate_once(&mut self, c: &LinCons<V>) -> bool {
        let e = c.expr();
        let total = self.eval(e);
        let feasible = match c.kind() {
            ConsKind::Eq => total.contains(&Number::zero()),
            ConsKind::Leq => *total.lb() <= Bound::zero(),
            ConsKind::Lt => *total.lb() < Bound::zero(),
            ConsKind::Neq => total.singleton() != Some(&Number::zero()),
        };
        if !feasible {
            self.set_to_bottom();
            return false;
        }

        let mut changed = false;
        for (v, a) in e.terms() {
            if self.is_bottom {
                return false;
            }
            let residual = self.eval_residual(e, v);
            let target = match c.kind() {
                // a·v = -R
                ConsKind::Eq => residual.neg(),
                // a·v ≤ -inf(R)
                ConsKind::Leq => Interval::new(Bound::NegInf, residual.lb().neg()),
                ConsKind::Lt => Interval::new(Bound::NegInf, residual.lb().neg().pred()),
                ConsKind::Neq => {
                    self.refine_disequality(v, a, &residual);
                    continue;
                }
            };
            let refined = target.div_outward(&Interval::constant(a.clone()));
            let old = self.get(v);
            let new = old.meet(&refined);
            if new != old {
                self.put(v, new);
                changed = true;
            }
        }
        changed
    }

    // v ≠ q only trims when q is an endpoint of v's interval.
    fn refine_disequality(&mut self, v: &V, a: &Number, residual: &Interval) {
        let Some(r) = residual.singleton() else {
            return;
        };
        let target = -r.clone();
        if (&target % a).is_zero() {
            let q = target / a;
            let old = self.get(v);
            if old.singleton() == Some(&q) {
                self.set_to_bottom();
                return;
            }
            let mut new = old.clone();
            if *old.lb() == Bound::Finite(q.clone()) {
                new = new.meet(&Interval::new(
                    Bound::Finite(q.clone() + Number::from(1)),
                    Bound::PosInf,
                ));
            }
            if *old.ub() == Bound::Finite(q.clone()) {
                new = new.meet(&Interval::new(
                    Bound::NegInf,
                    Bound::Finite(q.clone() - Number::from(1)),
                ));
            }
            if new != old {
                self.put(v, new);
            }
        }
    }

    fn arith(&self, op: ArithOp, y: &Interval, z: &Interval) -> Interval {
        match op {
            ArithOp::Add => y.add(z),
            ArithOp::Sub => y.sub(z),
            ArithOp::Mul => y.mul(z),
            ArithOp::Div => y.div(z),
        }
    }

    fn bitwise(&self, op: BitwiseOp, y: &Interval, z: &Interval) -> Interval {
        match op {
            BitwiseOp::And => y.bitand(z),
            BitwiseOp::Or => y.bitor(z),
            BitwiseOp::Xor => y.bitxor(z),
            BitwiseOp::Shl => y.shl(z),
            BitwiseOp::LShr | BitwiseOp::AShr => y.shr(z),
        }
    }

    fn division(&self, op: DivOp, y: &Interval, z: &Interval) -> Interval {
        match op {
            DivOp::SDiv => y.div(z),
            DivOp::UDiv => {
                if *y.lb() >= Bound::zero() && *z.lb() >= Bound::zero() {
                    y.div(z)
                } else {
                    Interval::top()
                }
            }
            DivOp::SRem => y.rem(z),
            DivOp::URem => y.rem(z).meet(&Interval::non_negative()),
        }
    }
}

impl<V> BaseDomain for IntervalDomain<V>
where
    V: Clone + Eq + Ord + Hash + Debug + fmt::Display,
{
    type Var = V;

    fn top() -> Self {
        IntervalDomain {
            env: BTreeMap::new(),
            is_bottom: false,
        }
    }

    fn bottom() -> Self {
        IntervalDomain {
            env: BTreeMap::new(),
            is_bottom: true,
        }
    }

    fn is_top(&self) -> bool {
        !self.is_bottom && self.env.is_empty()
    }

    fn is_bottom(&self) -> bool {
        self.is_bottom
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom {
            return true;
        }
        if other.is_bottom {
            return false;
        }
        // Every constraint on the right must be implied on the left.
        other.env.iter().all(|(v, i2)| self.get(v).leq(i2))
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom {
            return other.clone();
        }
        if other.is_bottom {
            return self.clone();
        }
        let mut res = IntervalDomain::top();
        for (v, i1) in &self.env {
            if let Some(i2) = other.env.get(v) {
                res.put(v, i1.join(i2));
            }
        }
        res
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom || other.is_bottom {
            return IntervalDomain::bottom();
        }
        let mut res = self.clone();
        for (v, i2) in &other.env {
            let met = res.get(v).meet(i2);
            res.put(v, met);
            if res.is_bottom {
                break;
            }
        }
        res
    }

    fn widen(&self, other: &Self) -> Self {
        if self.is_bottom {
            return other.clone();
        }
        if other.is_bottom {
            return self.clone();
        }
        let mut res = IntervalDomain::top();
        for (v, i1) in &self.env {
            if let Some(i2) = other.env.get(v) {
                res.put(v, i1.widen(i2));
            }
        }
        res
    }

    fn narrow(&self, other: &Self) -> Self {
        if self.is_bottom || other.is_bottom {
            return IntervalDomain::bottom();
        }
        let mut res = IntervalDomain::top();
        for (v, i2) in &other.env {
            res.put(v, self.get(v).narrow(i2));
            if res.is_bottom {
                return res;
            }
        }
        for (v, i1) in &self.env {
            if !other.env.contains_key(v) {
                res.put(v, i1.clone());
            }
        }
        res
    }

    fn widen_with_thresholds(&self, other: &Self, ts: &Thresholds) -> Self {
        if self.is_bottom {
            return other.clone();
        }
        if other.is_bottom {
            return self.clone();
        }
        let mut res = IntervalDomain::top();
        for (v, i1) in &self.env {
            if let Some(i2) = other.env.get(v) {
                res.put(v, i1.widen_thresholds(i2, ts));
            }
        }
        res
    }

    fn assign(&mut self, x: &V, e: &LinExpr<V>) {
        if self.is_bottom {
            return;
        }
        let itv = self.eval(e);
        self.put(x, itv);
    }

    fn apply(&mut self, op: ArithOp, x: &V, y: &V, z: &V) {
        if self.is_bottom {
            return;
        }
        let itv = self.arith(op, &self.get(y), &self.get(z));
        self.put(x, itv);
    }

    fn apply_const(&mut self, op: ArithOp, x: &V, y: &V, k: &Number) {
        if self.is_bottom {
            return;
        }
        let itv = self.arith(op, &self.get(y), &Interval::constant(k.clone()));
        self.put(x, itv);
    }

    fn apply_bitwise(&mut self, op: BitwiseOp, x: &V, y: &V, z: &V) {
        if self.is_bottom {
            return;
        }
        let itv = self.bitwise(op, &self.get(y), &self.get(z));
        self.put(x, itv);
    }

    fn apply_bitwise_const(&mut self, op: BitwiseOp, x: &V, y: &V, k: &Number) {
        if self.is_bottom {
            return;
        }
        let itv = self.bitwise(op, &self.get(y), &Interval::constant(k.clone()));
        self.put(x, itv);
    }

    fn apply_div(&mut self, op: DivOp, x: &V, y: &V, z: &V) {
        if self.is_bottom {
            return;
        }
        let itv = self.division(op, &self.get(y), &self.get(z));
        self.put(x, itv);
    }

    fn apply_div_const(&mut self, op: DivOp, x: &V, y: &V, k: &Number) {
        if self.is_bottom {
            return;
        }
        let itv = self.division(op, &self.get(y), &Interval::constant(k.clone()));
        self.put(x, itv);
    }

    fn apply_cast(&mut self, _op: CastOp, x: &V, y: &V, _width: u32) {
        // Unbounded integers: the width is irrelevant, casts copy.
        if self.is_bottom {
            return;
        }
        let itv = self.get(y);
        self.put(x, itv);
    }

    fn add_constraint(&mut self, c: &LinCons<V>) {
        if self.is_bottom {
            return;
        }
        if let Some(truth) = c.constant_truth() {
            if !truth {
                self.set_to_bottom();
            }
            return;
        }
        for _ in 0..PROPAGATION_PASSES {
            if !self.propagate_once(c) || self.is_bottom {
                break;
            }
        }
    }

    fn forget(&mut self, v: &V) {
        if self.is_bottom {
            return;
        }
        self.env.remove(v);
    }

    fn set(&mut self, v: &V, itv: Interval) {
        if self.is_bottom {
            return;
        }
        self.put(v, itv);
    }

    fn value_of(&self, v: &V) -> Interval {
        self.get(v)
    }

    fn to_constraints(&self) -> ConstraintSystem<V> {
        let mut sys = ConstraintSystem::new();
        if self.is_bottom {
            sys.push(LinCons::contradiction());
            return sys;
        }
        for (v, itv) in &self.env {
            if let Some(n) = itv.singleton() {
                // v - n = 0
                sys.push(LinExpr::var(v.clone()).sub_const(n.clone()).eq());
                continue;
            }
            if let Bound::Finite(l) = itv.lb() {
                // l - v <= 0
                sys.push(
                    LinExpr::constant(l.clone())
                        .sub(LinExpr::var(v.clone()))
                        .le(),
                );
            }
            if let Bound::Finite(h) = itv.ub() {
                // v - h <= 0
                sys.push(LinExpr::var(v.clone()).sub_const(h.clone()).le());
            }
        }
        sys
    }

    fn name() -> String {
        "intervals".to_string()
    }
}

impl<V> fmt::Display for IntervalDomain<V>
where
    V: Clone + Eq + Ord + Hash + Debug + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom {
            return write!(f, "_|_");
        }
        write!(f, "{{")?;
        for (i, (v, itv)) in self.env.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} -> {}", v, itv)?;
        }
        write!(f, "}}")
    }
}
