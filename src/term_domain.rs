//! The term-equivalence domain: anti-unification over a base domain.
//!
//! Lifts any [`BaseDomain`] with a symbolic layer that remembers *how*
//! each program variable was computed. Every assignment builds a
//! hash-consed term; every term owns a fresh proxy variable in the
//! underlying domain, and the underlying state constrains proxies, not
//! program variables. Two program variables that were assigned the
//! same expression share a term --- and therefore a proxy --- so their
//! equality is tracked for free, even over a non-relational base.
//!
//! Lattice operations work by *anti-unification*: the join of two
//! states generalizes each variable's pair of terms to the most
//! specific common shape, rebuilding a fresh table and renaming the
//! matched proxies into a common namespace before delegating to the
//! base domain.
//!
//! Adding a constraint can tighten a proxy; the affected terms go into
//! a dirty set and [`TermDomain::normalize`] re-establishes
//! consistency by propagating the tightening down to children (via
//! inverse operations) and up to parents (by re-applying functors).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::domain::{ArithOp, BaseDomain, BitwiseOp, CastOp, DivOp, Op};
use crate::interval::Interval;
use crate::linear::{ConstraintSystem, LinCons, LinExpr};
use crate::num::Number;
use crate::term::{Term, TermId, TermTable};
use crate::thresholds::Thresholds;
use crate::variable::VarName;

/// A proxy variable in the underlying domain's namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProxyVar(u32);

impl fmt::Display for ProxyVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Monotone allocator of proxy variable names.
///
/// [`ProxyAlloc::merge`] builds an allocator whose every future name
/// is fresh for *both* input states; combining two independently built
/// states must go through it before any shared renaming.
#[derive(Debug, Clone, Default)]
pub struct ProxyAlloc {
    next: u32,
}

impl ProxyAlloc {
    pub fn new() -> Self {
        ProxyAlloc::default()
    }

    pub fn next(&mut self) -> ProxyVar {
        let v = ProxyVar(self.next);
        self.next += 1;
        v
    }

    /// An allocator disjoint from everything either input ever issued.
    pub fn merge(a: &ProxyAlloc, b: &ProxyAlloc) -> ProxyAlloc {
        ProxyAlloc {
            next: a.next.max(b.next),
        }
    }
}

/// Term-equivalence domain over a base domain `D`.
#[derive(Debug, Clone)]
pub struct TermDomain<D: BaseDomain<Var = ProxyVar>> {
    is_bottom: bool,
    ttbl: TermTable,
    var_map: BTreeMap<VarName, TermId>,
    term_map: BTreeMap<TermId, ProxyVar>,
    base: D,
    alloc: ProxyAlloc,
    changed_terms: BTreeSet<TermId>,
}

impl<D: BaseDomain<Var = ProxyVar>> TermDomain<D> {
    fn set_to_bottom(&mut self) {
        self.is_bottom = true;
        self.var_map.clear();
        self.term_map.clear();
        self.changed_terms.clear();
        self.base = D::bottom();
    }

    fn check_terms(&self) {
        for t in self.var_map.values() {
            debug_assert!(self.ttbl.contains(*t), "dangling term {}", t);
        }
    }

    fn rebind(&mut self, v: &VarName, t: TermId) {
        self.var_map.insert(v.clone(), t);
    }

    /// The term a variable is bound to, binding it to a fresh free
    /// variable if it was unconstrained.
    fn term_of_var(&mut self, v: &VarName) -> TermId {
        match self.var_map.get(v) {
            Some(t) => *t,
            None => {
                let t = self.ttbl.fresh_var();
                self.var_map.insert(v.clone(), t);
                t
            }
        }
    }

    /// The proxy owned by a term, allocated on first use.
    fn proxy_of_term(&mut self, t: TermId) -> ProxyVar {
        match self.term_map.get(&t) {
            Some(p) => p.clone(),
            None => {
                let p = self.alloc.next();
                self.term_map.insert(t, p.clone());
                p
            }
        }
    }

    fn existing_proxy(&self, t: TermId) -> Option<ProxyVar> {
        self.term_map.get(&t).cloned()
    }

    fn proxy_of_var(&mut self, v: &VarName) -> ProxyVar {
        let t = self.term_of_var(v);
        self.proxy_of_term(t)
    }

    fn build_const(&mut self, n: &Number) -> TermId {
        if let Some(t) = self.ttbl.find_const(n) {
            return t;
        }
        let t = self.ttbl.make_const(n.clone());
        let p = self.proxy_of_term(t);
        self.base.assign(&p, &LinExpr::constant(n.clone()));
        t
    }

    // Hash-conses `op(ty, tz)`. An existing term already carries a
    // sound proxy value, so the base domain is only touched on
    // creation.
    fn build_term(&mut self, op: ArithOp, ty: TermId, tz: TermId) -> TermId {
        if let Some(t) = self.ttbl.find_ftor(op.into(), ty, tz) {
            return t;
        }
        let tx = self.ttbl.apply_ftor(op.into(), ty, tz);
        let px = self.proxy_of_term(tx);
        let py = self.proxy_of_term(ty);
        let pz = self.proxy_of_term(tz);
        self.base.apply(op, &px, &py, &pz);
        tx
    }

    // Folds a linear expression into the term DAG. A bare variable or
    // a bare constant maps to its own term, which is what lets
    // `assign(y, x)` share `x`'s term.
    fn build_linexpr(&mut self, e: &LinExpr<VarName>) -> TermId {
        if let Some(v) = e.as_variable() {
            let v = v.clone();
            return self.term_of_var(&v);
        }
        if e.is_constant() {
            let n = e.constant_part().clone();
            return self.build_const(&n);
        }
        let cst = e.constant_part().clone();
        let mut t = self.build_const(&cst);
        let terms: Vec<(VarName, Number)> = e
            .terms()
            .map(|(v, a)| (v.clone(), a.clone()))
            .collect();
        for (v, a) in terms {
            let coeff = self.build_const(&a);
            let var_term = self.term_of_var(&v);
            let product = self.build_term(ArithOp::Mul, coeff, var_term);
            t = self.build_term(ArithOp::Add, t, product);
        }
        t
    }

    // A term holding an interval: the constant term for a point, a
    // fresh free variable constrained in the base otherwise.
    fn term_of_itv(&mut self, itv: &Interval) -> TermId {
        if let Some(n) = itv.singleton() {
            let n = n.clone();
            return self.build_const(&n);
        }
        let t = self.ttbl.fresh_var();
        let p = self.proxy_of_term(t);
        self.base.set(&p, itv.clone());
        t
    }

    // A bitwise or division result is not folded into the DAG: the
    // result gets a fresh term whose proxy takes whatever the base
    // transfer can offer.
    fn taint_transfer(&mut self, x: &VarName, apply: impl FnOnce(&mut D, &ProxyVar)) {
        let t = self.ttbl.fresh_var();
        let p = self.proxy_of_term(t);
        apply(&mut self.base, &p);
        self.rebind(x, t);
        self.check_terms();
    }

    /// Binds `y` to `x`'s current term. The two variables share the
    /// term from here on; rebinding `x` later does not move `y`.
    pub fn expand(&mut self, x: &VarName, y: &VarName) {
        if self.is_bottom {
            return;
        }
        let t = self.term_of_var(x);
        self.rebind(y, t);
        self.check_terms();
    }

    /// The variables currently bound.
    pub fn variables(&self) -> impl Iterator<Item = &VarName> {
        self.var_map.keys()
    }

    /// True when no tightening is pending.
    pub fn is_normalized(&self) -> bool {
        self.changed_terms.is_empty()
    }

    /// Propagates pending tightenings through the term DAG: first down
    /// to children by inverse operations (deepest terms first), then
    /// up to parents by re-applying functors (shallowest first). A
    /// refinement is accepted only when the base state strictly
    /// tightens; accepted refinements enqueue their neighbors.
    pub fn normalize(&mut self) {
        if self.is_bottom {
            self.changed_terms.clear();
            return;
        }

        // Downward pass.
        let mut queue: Vec<Vec<TermId>> = Vec::new();
        for t in self.changed_terms.clone() {
            Self::queue_push(&mut queue, self.ttbl.depth(t), t);
        }
        let mut d = queue.len();
        while d > 1 {
            d -= 1;
            let mut i = 0;
            while i < queue[d].len() {
                let t = queue[d][i];
                i += 1;
                let mut cand = self.base.clone();
                self.eval_inverse(&mut cand, t);
                if !self.base.leq(&cand) {
                    self.base = cand;
                    if let Term::App(_, a, b) = self.ttbl.get(t) {
                        for c in [*a, *b] {
                            if self.changed_terms.insert(c) {
                                Self::queue_push(&mut queue, self.ttbl.depth(c), c);
                            }
                        }
                    }
                }
            }
        }

        // Upward pass.
        let mut up_terms: BTreeSet<TermId> = BTreeSet::new();
        let mut up_queue: Vec<Vec<TermId>> = Vec::new();
        for t in &self.changed_terms {
            for p in self.ttbl.parents(*t) {
                if up_terms.insert(*p) {
                    Self::queue_push(&mut up_queue, self.ttbl.depth(*p), *p);
                }
            }
        }
        let mut d = 1;
        while d < up_queue.len() {
            let mut i = 0;
            while i < up_queue[d].len() {
                let t = up_queue[d][i];
                i += 1;
                let mut cand = self.base.clone();
                self.eval_forward(&mut cand, t);
                if !self.base.leq(&cand) {
                    self.base = cand;
                    for p in self.ttbl.parents(t).to_vec() {
                        if up_terms.insert(p) {
                            Self::queue_push(&mut up_queue, self.ttbl.depth(p), p);
                        }
                    }
                }
            }
            d += 1;
        }

        self.changed_terms.clear();
        if self.base.is_bottom() {
            self.set_to_bottom();
        }
    }

    fn queue_push(queue: &mut Vec<Vec<TermId>>, depth: u32, t: TermId) {
        let depth = depth as usize;
        while queue.len() <= depth {
            queue.push(Vec::new());
        }
        queue[depth].push(t);
    }

    // Refines the children of `t` from `t`'s own value.
    fn eval_inverse(&self, cand: &mut D, t: TermId) {
        let (op, a, b) = match self.ttbl.get(t) {
            Term::App(op, a, b) => (*op, *a, *b),
            _ => return,
        };
        let (Some(pt), Some(pa), Some(pb)) = (
            self.existing_proxy(t),
            self.existing_proxy(a),
            self.existing_proxy(b),
        ) else {
            return;
        };
        let vt = cand.value_of(&pt);
        let va = cand.value_of(&pa);
        let vb = cand.value_of(&pb);
        match op {
            Op::Arith(ArithOp::Add) => {
                cand.set(&pa, va.meet(&vt.sub(&vb)));
                let va = cand.value_of(&pa);
                cand.set(&pb, vb.meet(&vt.sub(&va)));
            }
            Op::Arith(ArithOp::Sub) => {
                cand.set(&pa, va.meet(&vt.add(&vb)));
                let va = cand.value_of(&pa);
                cand.set(&pb, vb.meet(&va.sub(&vt)));
            }
            Op::Arith(ArithOp::Mul) => {
                cand.set(&pa, va.meet(&vt.div_outward(&vb)));
                let va = cand.value_of(&pa);
                cand.set(&pb, vb.meet(&vt.div_outward(&va)));
            }
            _ => {
                log::warn!("term domain: no inverse for {}, children not refined", op);
            }
        }
    }

    // Recomputes `t`'s proxy from its children.
    fn eval_forward(&self, cand: &mut D, t: TermId) {
        let (op, a, b) = match self.ttbl.get(t) {
            Term::App(op, a, b) => (*op, *a, *b),
            _ => return,
        };
        let (Some(pt), Some(pa), Some(pb)) = (
            self.existing_proxy(t),
            self.existing_proxy(a),
            self.existing_proxy(b),
        ) else {
            return;
        };
        match op {
            Op::Arith(op) => cand.apply(op, &pt, &pa, &pb),
            Op::Bitwise(op) => cand.apply_bitwise(op, &pt, &pa, &pb),
            Op::Div(op) => cand.apply_div(op, &pt, &pa, &pb),
        }
    }

    fn peek_value(&self, v: &VarName) -> Interval {
        if self.is_bottom || self.base.is_bottom() {
            return Interval::bottom();
        }
        let Some(t) = self.var_map.get(v) else {
            return Interval::top();
        };
        match self.term_map.get(t) {
            Some(p) => self.base.value_of(p),
            None => Interval::top(),
        }
    }

    // Join and widening share the renaming machinery; they differ in
    // which operands get normalized and in the final base operation.
    fn merge(&self, other: &Self, widening: bool, ts: Option<&Thresholds>) -> Self {
        let mut lhs = self.clone();
        // The left operand of a widening must not be normalized, or
        // termination is lost; normalizing the right only improves
        // precision.
        if !widening {
            lhs.normalize();
        }
        let mut rhs = other.clone();
        rhs.normalize();

        if lhs.is_bottom() || rhs.is_top() {
            return rhs;
        }
        if rhs.is_bottom() || lhs.is_top() {
            return lhs;
        }

        // Generalize each bound variable's pair of terms into a fresh
        // table.
        let mut out_tbl = TermTable::new();
        let mut gener_map: BTreeMap<(TermId, TermId), TermId> = BTreeMap::new();
        let mut out_vmap: BTreeMap<VarName, TermId> = BTreeMap::new();
        let vars: Vec<(VarName, TermId)> = lhs
            .var_map
            .iter()
            .map(|(v, t)| (v.clone(), *t))
            .collect();
        for (v, tx) in vars {
            let ty = rhs.term_of_var(&v);
            let tz = lhs.ttbl.generalize(&rhs.ttbl, tx, ty, &mut out_tbl, &mut gener_map);
            debug_assert!(out_tbl.contains(tz));
            out_vmap.insert(v, tz);
        }

        // Materialize every component proxy first, so the merged
        // allocator is disjoint from all of them.
        for &(tx, ty) in gener_map.keys() {
            lhs.proxy_of_term(tx);
            rhs.proxy_of_term(ty);
        }
        let mut palloc = ProxyAlloc::merge(&lhs.alloc, &rhs.alloc);

        // Rename matched proxies to a shared fresh name on both sides,
        // then project each copy onto the shared namespace. The
        // combined state only ever constrains the fresh names.
        let mut x_impl = lhs.base.clone();
        let mut y_impl = rhs.base.clone();
        let mut out_map: BTreeMap<TermId, ProxyVar> = BTreeMap::new();
        for (&(tx, ty), &tz) in &gener_map {
            let vt = palloc.next();
            out_map.insert(tz, vt.clone());
            let vx = lhs.proxy_of_term(tx);
            let vy = rhs.proxy_of_term(ty);
            x_impl.assign(&vt, &LinExpr::var(vx));
            y_impl.assign(&vt, &LinExpr::var(vy));
        }
        for vx in lhs.term_map.values() {
            x_impl.forget(vx);
        }
        for vy in rhs.term_map.values() {
            y_impl.forget(vy);
        }

        let combined = if widening {
            match ts {
                Some(ts) => x_impl.widen_with_thresholds(&y_impl, ts),
                None => x_impl.widen(&y_impl),
            }
        } else {
            x_impl.join(&y_impl)
        };

        let res = TermDomain {
            is_bottom: combined.is_bottom(),
            ttbl: out_tbl,
            var_map: out_vmap,
            term_map: out_map,
            base: combined,
            alloc: palloc,
            changed_terms: BTreeSet::new(),
        };
        res.check_terms();
        res
    }
}

impl<D: BaseDomain<Var = ProxyVar>> BaseDomain for TermDomain<D> {
    type Var = VarName;

    fn top() -> Self {
        TermDomain {
            is_bottom: false,
            ttbl: TermTable::new(),
            var_map: BTreeMap::new(),
            term_map: BTreeMap::new(),
            base: D::top(),
            alloc: ProxyAlloc::new(),
            changed_terms: BTreeSet::new(),
        }
    }

    fn bottom() -> Self {
        let mut d = Self::top();
        d.is_bottom = true;
        d.base = D::bottom();
        d
    }

    fn is_top(&self) -> bool {
        !self.is_bottom && self.var_map.is_empty()
    }

    fn is_bottom(&self) -> bool {
        self.is_bottom
    }

    fn leq(&self, other: &Self) -> bool {
        let mut lhs = self.clone();
        lhs.normalize();
        if lhs.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        let mut rhs = other.clone();

        // Build the structural mapping of rhs terms onto lhs terms,
        // variable by variable.
        let keys: BTreeSet<VarName> = lhs
            .var_map
            .keys()
            .chain(rhs.var_map.keys())
            .cloned()
            .collect();
        let mut gen_map: BTreeMap<TermId, TermId> = BTreeMap::new();
        for v in keys {
            let tx = lhs.term_of_var(&v);
            let ty = rhs.term_of_var(&v);
            if !lhs.ttbl.map_leq(&rhs.ttbl, tx, ty, &mut gen_map) {
                return false;
            }
        }

        // Rename each matched pair to a shared fresh proxy, project
        // both copies onto the shared namespace, and compare in the
        // base domain.
        for (&ty, &tx) in &gen_map {
            lhs.proxy_of_term(tx);
            rhs.proxy_of_term(ty);
        }
        let mut palloc = ProxyAlloc::merge(&lhs.alloc, &rhs.alloc);
        let mut x_impl = lhs.base.clone();
        let mut y_impl = rhs.base.clone();
        for (&ty, &tx) in &gen_map {
            let vt = palloc.next();
            let vx = lhs.proxy_of_term(tx);
            let vy = rhs.proxy_of_term(ty);
            x_impl.assign(&vt, &LinExpr::var(vx));
            y_impl.assign(&vt, &LinExpr::var(vy));
        }
        for vx in lhs.term_map.values() {
            x_impl.forget(vx);
        }
        for vy in rhs.term_map.values() {
            y_impl.forget(vy);
        }
        x_impl.leq(&y_impl)
    }

    fn join(&self, other: &Self) -> Self {
        self.merge(other, false, None)
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        if self.is_top() {
            return other.clone();
        }
        if other.is_top() {
            return self.clone();
        }
        // Refinement sink: keep the refining operand. Sound only under
        // the convention that meet is used to refine, never to prove
        // disjointness.
        log::warn!("term domain: meet approximated by its right operand");
        other.clone()
    }

    fn widen(&self, other: &Self) -> Self {
        self.merge(other, true, None)
    }

    fn narrow(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        if self.is_top() {
            return other.clone();
        }
        log::warn!("term domain: narrowing approximated by its left operand");
        self.clone()
    }

    fn widen_with_thresholds(&self, other: &Self, ts: &Thresholds) -> Self {
        self.merge(other, true, Some(ts))
    }

    fn assign(&mut self, x: &VarName, e: &LinExpr<VarName>) {
        if self.is_bottom {
            return;
        }
        let t = self.build_linexpr(e);
        self.rebind(x, t);
        self.check_terms();
    }

    fn apply(&mut self, op: ArithOp, x: &VarName, y: &VarName, z: &VarName) {
        if self.is_bottom {
            return;
        }
        let ty = self.term_of_var(y);
        let tz = self.term_of_var(z);
        let t = self.build_term(op, ty, tz);
        self.rebind(x, t);
        self.check_terms();
    }

    fn apply_const(&mut self, op: ArithOp, x: &VarName, y: &VarName, k: &Number) {
        if self.is_bottom {
            return;
        }
        let ty = self.term_of_var(y);
        let tk = self.build_const(k);
        let t = self.build_term(op, ty, tk);
        self.rebind(x, t);
        self.check_terms();
    }

    fn apply_bitwise(&mut self, op: BitwiseOp, x: &VarName, y: &VarName, z: &VarName) {
        if self.is_bottom {
            return;
        }
        log::warn!("term domain: bitwise {} is not tracked symbolically", op);
        let py = self.proxy_of_var(y);
        let pz = self.proxy_of_var(z);
        self.taint_transfer(x, |base, px| base.apply_bitwise(op, px, &py, &pz));
    }

    fn apply_bitwise_const(&mut self, op: BitwiseOp, x: &VarName, y: &VarName, k: &Number) {
        if self.is_bottom {
            return;
        }
        log::warn!("term domain: bitwise {} is not tracked symbolically", op);
        let py = self.proxy_of_var(y);
        self.taint_transfer(x, |base, px| base.apply_bitwise_const(op, px, &py, k));
    }

    fn apply_div(&mut self, op: DivOp, x: &VarName, y: &VarName, z: &VarName) {
        if self.is_bottom {
            return;
        }
        log::warn!("term domain: division {} is not tracked symbolically", op);
        let py = self.proxy_of_var(y);
        let pz = self.proxy_of_var(z);
        self.taint_transfer(x, |base, px| base.apply_div(op, px, &py, &pz));
    }

    fn apply_div_const(&mut self, op: DivOp, x: &VarName, y: &VarName, k: &Number) {
        if self.is_bottom {
            return;
        }
        log::warn!("term domain: division {} is not tracked symbolically", op);
        let py = self.proxy_of_var(y);
        self.taint_transfer(x, |base, px| base.apply_div_const(op, px, &py, k));
    }

    fn apply_cast(&mut self, _op: CastOp, x: &VarName, y: &VarName, _width: u32) {
        // Unbounded integers: a cast is a copy, and the copy shares
        // the source's term.
        self.assign(x, &LinExpr::var(y.clone()));
    }

    fn add_constraint(&mut self, c: &LinCons<VarName>) {
        if self.is_bottom {
            return;
        }
        let renamed = c.rename(|v| self.proxy_of_var(v));
        self.base.add_constraint(&renamed);
        for v in c.variables().cloned().collect::<Vec<_>>() {
            let t = self.term_of_var(&v);
            self.changed_terms.insert(t);
        }
        self.normalize();
    }

    fn forget(&mut self, v: &VarName) {
        if self.is_bottom {
            return;
        }
        let Some(t) = self.var_map.remove(v) else {
            return;
        };
        // The proxy stays alive while another variable still reaches
        // the term.
        if !self.var_map.values().any(|u| *u == t) {
            if let Some(p) = self.term_map.remove(&t) {
                self.base.forget(&p);
            }
        }
    }

    fn set(&mut self, v: &VarName, itv: Interval) {
        if self.is_bottom {
            return;
        }
        let t = self.term_of_itv(&itv);
        self.rebind(v, t);
        self.check_terms();
    }

    fn value_of(&self, v: &VarName) -> Interval {
        if self.changed_terms.is_empty() {
            return self.peek_value(v);
        }
        let mut n = self.clone();
        n.normalize();
        n.peek_value(v)
    }

    fn to_constraints(&self) -> ConstraintSystem<VarName> {
        let mut me = self.clone();
        me.normalize();
        let mut out = ConstraintSystem::new();
        if me.is_bottom() {
            out.push(LinCons::contradiction());
            return out;
        }

        // Reverse-map each visible proxy to one program variable;
        // additional sharers become explicit equalities.
        let mut rev_map: BTreeMap<ProxyVar, VarName> = BTreeMap::new();
        let mut equivs: Vec<(VarName, VarName)> = Vec::new();
        let vars: Vec<(VarName, TermId)> =
            me.var_map.iter().map(|(v, t)| (v.clone(), *t)).collect();
        for (v, t) in vars {
            let p = me.proxy_of_term(t);
            match rev_map.get(&p) {
                Some(first) => equivs.push((first.clone(), v)),
                None => {
                    rev_map.insert(p, v);
                }
            }
        }

        // Project the base state onto the visible proxies.
        let mut visible = me.base.clone();
        for p in me.term_map.values() {
            if !rev_map.contains_key(p) {
                visible.forget(p);
            }
        }

        for cst in visible.to_constraints() {
            if cst.variables().all(|p| rev_map.contains_key(p)) {
                out.push(cst.rename(|p| rev_map[p].clone()));
            }
        }
        for (a, b) in equivs {
            out.push(LinExpr::var(a).sub(LinExpr::var(b)).eq());
        }
        out
    }

    fn name() -> String {
        format!("term({})", D::name())
    }
}

impl<D: BaseDomain<Var = ProxyVar>> fmt::Display for TermDomain<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let me = if self.changed_terms.is_empty() {
            None
        } else {
            let mut n = self.clone();
            n.normalize();
            Some(n)
        };
        let me = me.as_ref().unwrap_or(self);
        if me.is_bottom {
            return write!(f, "_|_");
        }
        if me.var_map.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{")?;
        for (i, (v, t)) in me.var_map.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match me.term_map.get(t) {
                Some(p) => write!(f, "{} -> {}[{}]", v, t, p)?,
                None => write!(f, "{} -> {}", v, t)?,
            }
        }
        write!(f, "}} {}", me.base)
    }
}
