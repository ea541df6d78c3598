//! Bounded disjunctions of base-domain values.
//!
//! A [`PowersetDomain`] holds a non-empty vector of disjuncts. Bottom
//! is `[⊥]`, top is any vector containing a top element (normalized to
//! `[⊤]`); the empty vector never occurs. Transfer operations apply to
//! every disjunct; joins accumulate disjuncts, pruning dominated ones.
//!
//! There is no genuine widening over unbounded disjunction --- it would
//! not terminate --- so the lattice operations that must converge
//! (`leq`, `widen`, `narrow`) *smash* both sides into a single base
//! value first. Exceeding the disjunct budget smashes too. Smashing is
//! sound (the fold is a join) and loses exactly the relational
//! precision the disjunction was buying.

use std::fmt;

use crate::domain::{ArithOp, BaseDomain, BitwiseOp, CastOp, DivOp};
use crate::interval::Interval;
use crate::linear::{ConstraintSystem, LinCons, LinExpr};
use crate::num::Number;
use crate::thresholds::Thresholds;

/// Powerset policy knobs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PowersetParams {
    /// Smash when a join would exceed this many disjuncts.
    pub max_disjuncts: usize,
    /// Pairwise meet instead of smash-then-meet.
    pub exact_meet: bool,
}

impl Default for PowersetParams {
    fn default() -> Self {
        PowersetParams {
            max_disjuncts: 99_999,
            exact_meet: false,
        }
    }
}

/// A bounded disjunction of `D` values.
#[derive(Debug, Clone)]
pub struct PowersetDomain<D: BaseDomain> {
    disjuncts: Vec<D>,
    params: PowersetParams,
}

impl<D: BaseDomain> PowersetDomain<D> {
    /// Top with explicit policy parameters.
    pub fn with_params(params: PowersetParams) -> Self {
        PowersetDomain {
            disjuncts: vec![D::top()],
            params,
        }
    }

    /// Wraps a single base value.
    pub fn from_base(dom: D) -> Self {
        let mut res = PowersetDomain {
            disjuncts: vec![dom],
            params: PowersetParams::default(),
        };
        res.normalize_if_top();
        res
    }

    pub fn params(&self) -> PowersetParams {
        self.params
    }

    /// Number of disjuncts currently held.
    pub fn len(&self) -> usize {
        self.disjuncts.len()
    }

    pub fn disjuncts(&self) -> &[D] {
        &self.disjuncts
    }

    fn set_to_top(&mut self) {
        self.disjuncts = vec![D::top()];
    }

    fn set_to_bottom(&mut self) {
        self.disjuncts = vec![D::bottom()];
    }

    fn normalize_if_top(&mut self) {
        if self.disjuncts.iter().any(|d| d.is_top()) {
            self.set_to_top();
        }
    }

    /// The join of all disjuncts, as a single base value.
    pub fn smashed(&self) -> D {
        if self.is_bottom() {
            return D::bottom();
        }
        if self.is_top() {
            return D::top();
        }
        debug_assert!(!self.disjuncts.is_empty());
        let mut res = self.disjuncts[0].clone();
        for d in &self.disjuncts[1..] {
            res = res.join(d);
        }
        res
    }

    /// Collapses the disjunction in place.
    pub fn smash(&mut self) {
        log::debug!("powerset: smashing {} disjuncts", self.disjuncts.len());
        let smashed = self.smashed();
        self.disjuncts = vec![smashed];
    }

    // Adds a disjunct unless it is dominated by an existing one.
    fn insert(vec: &mut Vec<D>, dom: D) {
        if vec.iter().any(|d| dom.leq(d)) {
            return;
        }
        vec.push(dom);
    }

    fn append(vec: &mut Vec<D>, other: &[D]) {
        for d in other {
            Self::insert(vec, d.clone());
        }
    }

    fn rebuild(&mut self, disjuncts: Vec<D>) {
        self.disjuncts = disjuncts;
        if self.disjuncts.is_empty() {
            self.set_to_bottom();
            return;
        }
        self.normalize_if_top();
        if self.disjuncts.len() > self.params.max_disjuncts {
            self.smash();
        }
    }

    // Applies a transfer to every disjunct.
    fn each(&mut self, mut f: impl FnMut(&mut D)) {
        if self.is_bottom() {
            return;
        }
        for d in &mut self.disjuncts {
            f(d);
        }
    }

    // Applies a filtering transfer: disjuncts that become bottom drop
    // out of the disjunction.
    fn each_pruning(&mut self, mut f: impl FnMut(&mut D)) {
        if self.is_bottom() {
            return;
        }
        let mut kept = Vec::with_capacity(self.disjuncts.len());
        for mut d in std::mem::take(&mut self.disjuncts) {
            f(&mut d);
            if !d.is_bottom() {
                kept.push(d);
            }
        }
        if kept.is_empty() {
            self.set_to_bottom();
        } else {
            self.disjuncts = kept;
        }
    }

    /// In-place join (`|=`).
    pub fn join_assign(&mut self, other: &Self) {
        if self.is_top() || other.is_bottom() {
            return;
        }
        if self.is_bottom() {
            *self = other.clone();
            return;
        }
        if other.is_top() {
            self.set_to_top();
            return;
        }
        let mut vec = std::mem::take(&mut self.disjuncts);
        Self::append(&mut vec, &other.disjuncts);
        self.rebuild(vec);
    }

    /// One constraint system per disjunct.
    pub fn to_disjunctive_constraints(&self) -> Vec<ConstraintSystem<D::Var>> {
        self.disjuncts.iter().map(|d| d.to_constraints()).collect()
    }
}

impl<D: BaseDomain> BaseDomain for PowersetDomain<D> {
    type Var = D::Var;

    fn top() -> Self {
        PowersetDomain::with_params(PowersetParams::default())
    }

    fn bottom() -> Self {
        PowersetDomain {
            disjuncts: vec![D::bottom()],
            params: PowersetParams::default(),
        }
    }

    fn is_top(&self) -> bool {
        self.disjuncts.iter().any(|d| d.is_top())
    }

    fn is_bottom(&self) -> bool {
        self.disjuncts.iter().all(|d| d.is_bottom())
    }

    fn leq(&self, other: &Self) -> bool {
        // Coarse but sound: compare the smashed values.
        self.smashed().leq(&other.smashed())
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_top() {
            let mut res = other.clone();
            res.params = self.params;
            return res;
        }
        if other.is_bottom() || self.is_top() {
            return self.clone();
        }
        let mut res = self.clone();
        let mut vec = std::mem::take(&mut res.disjuncts);
        Self::append(&mut vec, &other.disjuncts);
        res.rebuild(vec);
        res
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            let mut res = Self::bottom();
            res.params = self.params;
            return res;
        }
        if self.is_top() {
            let mut res = other.clone();
            res.params = self.params;
            return res;
        }
        if other.is_top() {
            return self.clone();
        }
        if self.params.exact_meet {
            let mut vec = Vec::with_capacity(self.disjuncts.len() * other.disjuncts.len());
            for a in &self.disjuncts {
                for b in &other.disjuncts {
                    let met = a.meet(b);
                    if !met.is_bottom() {
                        vec.push(met);
                    }
                }
            }
            let mut res = self.clone();
            res.rebuild(vec);
            res
        } else {
            let mut res = self.clone();
            res.disjuncts = vec![self.smashed().meet(&other.smashed())];
            res
        }
    }

    fn widen(&self, other: &Self) -> Self {
        let mut res = self.clone();
        res.disjuncts = vec![self.smashed().widen(&other.smashed())];
        res
    }

    fn narrow(&self, other: &Self) -> Self {
        let mut res = self.clone();
        res.disjuncts = vec![self.smashed().narrow(&other.smashed())];
        res
    }

    fn widen_with_thresholds(&self, other: &Self, ts: &Thresholds) -> Self {
        let mut res = self.clone();
        res.disjuncts = vec![self.smashed().widen_with_thresholds(&other.smashed(), ts)];
        res
    }

    fn assign(&mut self, x: &Self::Var, e: &LinExpr<Self::Var>) {
        self.each(|d| d.assign(x, e));
    }

    fn apply(&mut self, op: ArithOp, x: &Self::Var, y: &Self::Var, z: &Self::Var) {
        self.each(|d| d.apply(op, x, y, z));
    }

    fn apply_const(&mut self, op: ArithOp, x: &Self::Var, y: &Self::Var, k: &Number) {
        self.each(|d| d.apply_const(op, x, y, k));
    }

    fn apply_bitwise(&mut self, op: BitwiseOp, x: &Self::Var, y: &Self::Var, z: &Self::Var) {
        self.each(|d| d.apply_bitwise(op, x, y, z));
    }

    fn apply_bitwise_const(&mut self, op: BitwiseOp, x: &Self::Var, y: &Self::Var, k: &Number) {
        self.each(|d| d.apply_bitwise_const(op, x, y, k));
    }

    fn apply_div(&mut self, op: DivOp, x: &Self::Var, y: &Self::Var, z: &Self::Var) {
        self.each(|d| d.apply_div(op, x, y, z));
    }

    fn apply_div_const(&mut self, op: DivOp, x: &Self::Var, y: &Self::Var, k: &Number) {
        self.each(|d| d.apply_div_const(op, x, y, k));
    }

    fn apply_cast(&mut self, op: CastOp, x: &Self::Var, y: &Self::Var, width: u32) {
        self.each(|d| d.apply_cast(op, x, y, width));
    }

    fn add_constraint(&mut self, c: &LinCons<Self::Var>) {
        self.each_pruning(|d| d.add_constraint(c));
    }

    fn forget(&mut self, v: &Self::Var) {
        if self.is_bottom() {
            return;
        }
        self.each(|d| d.forget(v));
        self.normalize_if_top();
    }

    fn set(&mut self, v: &Self::Var, itv: Interval) {
        self.each(|d| d.set(v, itv.clone()));
    }

    fn value_of(&self, v: &Self::Var) -> Interval {
        self.smashed().value_of(v)
    }

    fn to_constraints(&self) -> ConstraintSystem<Self::Var> {
        self.smashed().to_constraints()
    }

    fn name() -> String {
        format!("powerset({})", D::name())
    }
}

impl<D: BaseDomain> fmt::Display for PowersetDomain<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            return write!(f, "_|_");
        }
        if self.is_top() {
            return write!(f, "top");
        }
        for (i, d) in self.disjuncts.iter().enumerate() {
            if i > 0 {
                write!(f, " or ")?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval_domain::IntervalDomain;
    use crate::num::num;
    use crate::variable::VarName;

    type Base = IntervalDomain<VarName>;
    type Pow = PowersetDomain<Base>;

    fn v(name: &str) -> VarName {
        VarName::new(name)
    }

    fn point(name: &str, value: i64) -> Base {
        let mut d = Base::top();
        d.set(&v(name), Interval::constant(value));
        d
    }

    #[test]
    fn test_lattice_axioms() {
        use crate::domain::tests::check_lattice_axioms;

        let a = Pow::from_base(point("x", 0));
        let b = Pow::from_base(point("x", 10)).join(&Pow::from_base(point("x", 20)));
        let mut c = Pow::top();
        c.set(&v("y"), Interval::range(0, 5));

        check_lattice_axioms(&[Pow::bottom(), Pow::top(), a, b, c]);
    }

    #[test]
    fn test_join_accumulates_disjuncts() {
        let a = Pow::from_base(point("x", 0));
        let b = Pow::from_base(point("x", 10));
        let j = a.join(&b);
        assert_eq!(j.len(), 2);

        // Dominated disjuncts are pruned.
        let again = j.join(&Pow::from_base(point("x", 0)));
        assert_eq!(again.len(), 2);

        // The smashed query loses the gap.
        assert_eq!(j.value_of(&v("x")), Interval::range(0, 10));
    }

    #[test]
    fn test_budget_smashes() {
        let params = PowersetParams {
            max_disjuncts: 1,
            exact_meet: false,
        };
        let mut a = Pow::with_params(params);
        a.set(&v("x"), Interval::constant(0));
        let mut b = Pow::top();
        b.set(&v("x"), Interval::constant(10));

        let j = a.join(&b);
        assert_eq!(j.len(), 1);
        assert_eq!(j.value_of(&v("x")), Interval::range(0, 10));
    }

    #[test]
    fn test_smashing_is_sound() {
        // smash(D) is an upper bound of every disjunct.
        let a = Pow::from_base(point("x", 0)).join(&Pow::from_base(point("x", 10)));
        let smashed = a.smashed();
        for d in a.disjuncts() {
            assert!(d.leq(&smashed));
        }
    }

    #[test]
    fn test_constraint_prunes_disjuncts() {
        let mut a = Pow::from_base(point("x", 0)).join(&Pow::from_base(point("x", 10)));
        // x >= 5 kills the x = 0 disjunct.
        a.add_constraint(
            &LinExpr::constant(num(5))
                .sub(LinExpr::var(v("x")))
                .le(),
        );
        assert_eq!(a.len(), 1);
        assert_eq!(a.value_of(&v("x")), Interval::constant(10));

        // An infeasible constraint empties the disjunction.
        a.add_constraint(&LinExpr::var(v("x")).eq());
        assert!(a.is_bottom());
    }

    #[test]
    fn test_exact_meet() {
        let params = PowersetParams {
            max_disjuncts: 99_999,
            exact_meet: true,
        };
        let mut a = Pow::with_params(params);
        a.set(&v("x"), Interval::range(0, 5));
        let a = a.join(&Pow::from_base({
            let mut d = Base::top();
            d.set(&v("x"), Interval::range(10, 15));
            d
        }));

        let mut b = Pow::top();
        b.set(&v("x"), Interval::range(3, 12));

        let m = a.meet(&b);
        // Pairwise: [0,5] ∩ [3,12] = [3,5], [10,15] ∩ [3,12] = [10,12].
        assert_eq!(m.len(), 2);
        assert_eq!(m.value_of(&v("x")), Interval::range(3, 12));

        // Smashed meet collapses first.
        let coarse = Pow::from_base(a.smashed()).meet(&b);
        assert_eq!(coarse.len(), 1);
    }

    #[test]
    fn test_widen_smashes() {
        let a = Pow::from_base(point("x", 0)).join(&Pow::from_base(point("x", 1)));
        let b = Pow::from_base(point("x", 0)).join(&Pow::from_base(point("x", 5)));
        let w = a.widen(&b);
        assert_eq!(w.len(), 1);
        assert!(a.leq(&w));
        assert!(b.leq(&w));
    }

    #[test]
    fn test_transfer_elementwise() {
        let mut a = Pow::from_base(point("x", 1)).join(&Pow::from_base(point("x", 2)));
        // y := x * 10 in each disjunct.
        a.apply_const(ArithOp::Mul, &v("y"), &v("x"), &num(10));
        assert_eq!(a.len(), 2);
        assert_eq!(a.value_of(&v("y")), Interval::range(10, 20));

        let systems = a.to_disjunctive_constraints();
        assert_eq!(systems.len(), 2);
    }

    #[test]
    fn test_top_bottom_normalization() {
        let mut a = Pow::from_base(point("x", 1));
        a.forget(&v("x"));
        assert!(a.is_top());
        assert_eq!(a.len(), 1);

        assert!(Pow::bottom().is_bottom());
        assert_eq!(format!("{}", Pow::bottom()), "_|_");
        assert_eq!(format!("{}", Pow::top()), "top");
        assert_eq!(Pow::name(), "powerset(intervals)");
    }
}
