//! Hash-consed term DAG.
//!
//! A [`TermTable`] owns every term of one abstract value: free-variable
//! placeholders, constants, and binary functor applications. Constants
//! and applications are hash-consed --- for every `(op, a, b)` at most
//! one `App` exists, for every number at most one `Const` --- so term
//! identity is pointer-free equality on [`TermId`]s. Free variables are
//! deliberately *not* consed: each `fresh_var` is a new term.
//!
//! The table keeps, per term, its depth (0 for leaves, 1 + max child
//! depth for applications) and its parent set, both of which drive the
//! term domain's normalization passes. Terms are never removed; a
//! table only grows.
//!
//! Buckets chain intrusively through a per-term `next` index, and the
//! bucket of a term is derived from a canonical structural hash, so
//! the same term lands in the same bucket in every table.
//!
//! Two algorithms work across *pairs* of tables:
//!
//! - [`TermTable::map_leq`] extends a mapping witnessing that one term
//!   structurally covers another (the ordering test);
//! - [`TermTable::generalize`] anti-unifies two terms into a third
//!   table (the join/widening kernel).

use std::collections::BTreeMap;
use std::fmt;

use num_traits::Signed;

use crate::domain::Op;
use crate::hashing::CanonHash;
use crate::num::Number;

const NO_NEXT: u32 = u32::MAX;

/// Index of a term within its owning [`TermTable`].
///
/// Dense and stable within one table; never meaningful across tables.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(u32);

impl TermId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A term: free variable, constant, or binary functor application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Free-variable placeholder; the ordinal only disambiguates debug
    /// output.
    Var(u32),
    Const(Number),
    App(Op, TermId, TermId),
}

impl Term {
    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }
}

#[derive(Debug, Clone)]
struct TermData {
    term: Term,
    depth: u32,
    parents: Vec<TermId>,
    next: u32,
    hash: u64,
}

fn hash_number(n: &Number) -> u64 {
    let digits = n
        .iter_u64_digits()
        .fold(0u64, |acc, d| acc.rotate_left(7) ^ d);
    (if n.is_negative() { 1 } else { 0 }, digits).canon_hash()
}

fn hash_app(op: Op, a: TermId, b: TermId) -> u64 {
    (op.opcode(), a.0 as u64, b.0 as u64).canon_hash()
}

/// A hash-consed store of terms.
#[derive(Debug, Clone)]
pub struct TermTable {
    terms: Vec<TermData>,
    buckets: Vec<u32>,
    bitmask: u64,
    free_ordinal: u32,
}

impl Default for TermTable {
    fn default() -> Self {
        TermTable::new()
    }
}

impl TermTable {
    pub fn new() -> Self {
        TermTable {
            terms: Vec::new(),
            buckets: vec![NO_NEXT; 16],
            bitmask: 15,
            free_ordinal: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, t: TermId) -> bool {
        t.index() < self.terms.len()
    }

    /// The term behind an id.
    pub fn get(&self, t: TermId) -> &Term {
        &self.terms[t.index()].term
    }

    /// 0 for leaves, `1 + max(children)` for applications.
    pub fn depth(&self, t: TermId) -> u32 {
        self.terms[t.index()].depth
    }

    /// Terms whose application arguments include `t`.
    pub fn parents(&self, t: TermId) -> &[TermId] {
        &self.terms[t.index()].parents
    }

    /// Allocates a fresh free-variable term. Never consed: every call
    /// yields a distinct term.
    pub fn fresh_var(&mut self) -> TermId {
        let ordinal = self.free_ordinal;
        self.free_ordinal += 1;
        self.push(Term::Var(ordinal), 0, 0)
    }

    /// Hash lookup of a constant term.
    pub fn find_const(&self, n: &Number) -> Option<TermId> {
        self.find(hash_number(n), |term| {
            matches!(term, Term::Const(m) if m == n)
        })
    }

    /// The constant term for `n`, created if absent.
    pub fn make_const(&mut self, n: Number) -> TermId {
        if let Some(t) = self.find_const(&n) {
            return t;
        }
        let hash = hash_number(&n);
        let t = self.push(Term::Const(n), 0, hash);
        self.link(t);
        t
    }

    /// Hash lookup of an application term.
    pub fn find_ftor(&self, op: Op, a: TermId, b: TermId) -> Option<TermId> {
        self.find(hash_app(op, a, b), |term| {
            matches!(term, Term::App(o, x, y) if *o == op && *x == a && *y == b)
        })
    }

    /// The application term `op(a, b)`, created (with depth and parent
    /// registration) if absent.
    pub fn apply_ftor(&mut self, op: Op, a: TermId, b: TermId) -> TermId {
        debug_assert!(self.contains(a), "argument {} out of range", a);
        debug_assert!(self.contains(b), "argument {} out of range", b);
        if let Some(t) = self.find_ftor(op, a, b) {
            return t;
        }
        let depth = 1 + self.depth(a).max(self.depth(b));
        let hash = hash_app(op, a, b);
        let t = self.push(Term::App(op, a, b), depth, hash);
        self.link(t);
        self.add_parent(a, t);
        self.add_parent(b, t);
        t
    }

    fn push(&mut self, term: Term, depth: u32, hash: u64) -> TermId {
        if self.terms.len() >= self.buckets.len() {
            self.grow();
        }
        let id = TermId(self.terms.len() as u32);
        self.terms.push(TermData {
            term,
            depth,
            parents: Vec::new(),
            next: NO_NEXT,
            hash,
        });
        id
    }

    fn add_parent(&mut self, child: TermId, parent: TermId) {
        let parents = &mut self.terms[child.index()].parents;
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash & self.bitmask) as usize
    }

    fn find(&self, hash: u64, matches: impl Fn(&Term) -> bool) -> Option<TermId> {
        let mut index = self.buckets[self.bucket_of(hash)];
        while index != NO_NEXT {
            let data = &self.terms[index as usize];
            if data.hash == hash && matches(&data.term) {
                return Some(TermId(index));
            }
            index = data.next;
        }
        None
    }

    // Prepends a consed term to its bucket chain.
    fn link(&mut self, t: TermId) {
        let bucket = self.bucket_of(self.terms[t.index()].hash);
        self.terms[t.index()].next = self.buckets[bucket];
        self.buckets[bucket] = t.0;
    }

    fn grow(&mut self) {
        let size = self.buckets.len() * 2;
        self.buckets = vec![NO_NEXT; size];
        self.bitmask = (size - 1) as u64;
        for i in 0..self.terms.len() {
            self.terms[i].next = NO_NEXT;
            if !self.terms[i].term.is_var() {
                self.link(TermId(i as u32));
            }
        }
    }

    /// Tries to extend `map` (other's ids → self's ids) so that every
    /// subterm of `t_y` in `other` is covered by the corresponding
    /// subterm of `t_x` in `self`:
    ///
    /// - a free variable on the right covers anything;
    /// - identical constants cover each other;
    /// - applications must agree on the functor, children recursively.
    ///
    /// Every covered pair is recorded, consistently with any previous
    /// binding of the same right-hand term --- the caller renames each
    /// recorded pair to a shared name before comparing base states, so
    /// the map must span everything reachable, not just the leaves.
    ///
    /// Returns false (leaving `map` partially extended) on mismatch.
    pub fn map_leq(
        &self,
        other: &TermTable,
        t_x: TermId,
        t_y: TermId,
        map: &mut BTreeMap<TermId, TermId>,
    ) -> bool {
        if let Some(bound) = map.get(&t_y) {
            return *bound == t_x;
        }
        let covered = match other.get(t_y) {
            Term::Var(_) => true,
            Term::Const(n) => {
                matches!(self.get(t_x), Term::Const(m) if m == n)
            }
            Term::App(op_y, a_y, b_y) => match self.get(t_x) {
                Term::App(op_x, a_x, b_x) if op_x == op_y => {
                    let (a_x, b_x, a_y, b_y) = (*a_x, *b_x, *a_y, *b_y);
                    self.map_leq(other, a_x, a_y, map) && self.map_leq(other, b_x, b_y, map)
                }
                _ => false,
            },
        };
        if covered {
            map.insert(t_y, t_x);
        }
        covered
    }

    /// Anti-unification: builds, in `out`, the most specific term that
    /// subsumes both `t_x` (in `self`) and `t_y` (in `other`).
    ///
    /// Results are memoized in `gener_map` keyed by `(t_x, t_y)`, so a
    /// pair that generalizes to a mismatch placeholder gets the *same*
    /// placeholder everywhere it appears --- this is what keeps shared
    /// subterms shared through a join.
    pub fn generalize(
        &self,
        other: &TermTable,
        t_x: TermId,
        t_y: TermId,
        out: &mut TermTable,
        gener_map: &mut BTreeMap<(TermId, TermId), TermId>,
    ) -> TermId {
        if let Some(t) = gener_map.get(&(t_x, t_y)) {
            return *t;
        }
        let t_z = match (self.get(t_x), other.get(t_y)) {
            (Term::Const(a), Term::Const(b)) if a == b => out.make_const(a.clone()),
            (Term::App(op_x, a_x, b_x), Term::App(op_y, a_y, b_y)) if op_x == op_y => {
                let (op, a_x, b_x, a_y, b_y) = (*op_x, *a_x, *b_x, *a_y, *b_y);
                let a_z = self.generalize(other, a_x, a_y, out, gener_map);
                let b_z = self.generalize(other, b_x, b_y, out, gener_map);
                out.apply_ftor(op, a_z, b_z)
            }
            _ => out.fresh_var(),
        };
        gener_map.insert((t_x, t_y), t_z);
        t_z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ArithOp;
    use crate::num::num;

    fn add() -> Op {
        Op::Arith(ArithOp::Add)
    }
    fn mul() -> Op {
        Op::Arith(ArithOp::Mul)
    }

    #[test]
    fn test_hash_consing() {
        let mut tbl = TermTable::new();
        let c1 = tbl.make_const(num(1));
        let c2 = tbl.make_const(num(2));
        assert_ne!(c1, c2);
        assert_eq!(tbl.make_const(num(1)), c1);
        assert_eq!(tbl.find_const(&num(2)), Some(c2));
        assert_eq!(tbl.find_const(&num(3)), None);

        let a1 = tbl.apply_ftor(add(), c1, c2);
        let a2 = tbl.apply_ftor(add(), c1, c2);
        assert_eq!(a1, a2);
        // Argument order matters: no commutative canonicalization.
        let a3 = tbl.apply_ftor(add(), c2, c1);
        assert_ne!(a1, a3);
        assert_eq!(tbl.len(), 4);
    }

    #[test]
    fn test_fresh_vars_are_distinct() {
        let mut tbl = TermTable::new();
        let v1 = tbl.fresh_var();
        let v2 = tbl.fresh_var();
        assert_ne!(v1, v2);
        assert!(tbl.get(v1).is_var());
    }

    #[test]
    fn test_depth_and_parents() {
        let mut tbl = TermTable::new();
        let v = tbl.fresh_var();
        let c = tbl.make_const(num(3));
        let m = tbl.apply_ftor(mul(), c, v);
        let s = tbl.apply_ftor(add(), m, v);

        assert_eq!(tbl.depth(v), 0);
        assert_eq!(tbl.depth(c), 0);
        assert_eq!(tbl.depth(m), 1);
        assert_eq!(tbl.depth(s), 2);

        assert_eq!(tbl.parents(c), &[m]);
        assert_eq!(tbl.parents(v), &[m, s]);
        assert_eq!(tbl.parents(m), &[s]);
        assert!(tbl.parents(s).is_empty());

        // Re-consing does not duplicate parent links.
        tbl.apply_ftor(mul(), c, v);
        assert_eq!(tbl.parents(c), &[m]);
    }

    #[test]
    fn test_growth_keeps_lookups() {
        let mut tbl = TermTable::new();
        let ids: Vec<TermId> = (0..100).map(|i| tbl.make_const(num(i))).collect();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(tbl.find_const(&num(i as i64)), Some(*id));
        }
    }

    #[test]
    fn test_map_leq_free_variable() {
        let mut x = TermTable::new();
        let mut y = TermTable::new();

        // x: 3 + 3; y: v + v (same variable twice)
        let c3 = x.make_const(num(3));
        let tx = x.apply_ftor(add(), c3, c3);
        let v = y.fresh_var();
        let ty = y.apply_ftor(add(), v, v);

        let mut map = BTreeMap::new();
        assert!(x.map_leq(&y, tx, ty, &mut map));
        assert_eq!(map.get(&v), Some(&c3));
    }

    #[test]
    fn test_map_leq_inconsistent_binding() {
        let mut x = TermTable::new();
        let mut y = TermTable::new();

        // x: 3 + 4; y: v + v requires v to cover both 3 and 4.
        let c3 = x.make_const(num(3));
        let c4 = x.make_const(num(4));
        let tx = x.apply_ftor(add(), c3, c4);
        let v = y.fresh_var();
        let ty = y.apply_ftor(add(), v, v);

        let mut map = BTreeMap::new();
        assert!(!x.map_leq(&y, tx, ty, &mut map));
    }

    #[test]
    fn test_map_leq_structure() {
        let mut x = TermTable::new();
        let mut y = TermTable::new();

        let c1x = x.make_const(num(1));
        let c1y = y.make_const(num(1));
        let c2y = y.make_const(num(2));

        // Identical constants are compatible; different ones are not.
        let mut map = BTreeMap::new();
        assert!(x.map_leq(&y, c1x, c1y, &mut map));
        assert!(!x.map_leq(&y, c1x, c2y, &mut map));

        // Mismatched functors fail.
        let ax = x.apply_ftor(add(), c1x, c1x);
        let my = y.apply_ftor(mul(), c1y, c1y);
        assert!(!x.map_leq(&y, ax, my, &mut map));

        // A right-hand application never covers a left-hand leaf.
        let ay = y.apply_ftor(add(), c1y, c1y);
        assert!(!x.map_leq(&y, c1x, ay, &mut map));
    }

    #[test]
    fn test_generalize_identical_structure() {
        let mut x = TermTable::new();
        let mut y = TermTable::new();

        // x: (1 * v) + 2 ; y: (1 * w) + 2
        let c1x = x.make_const(num(1));
        let c2x = x.make_const(num(2));
        let vx = x.fresh_var();
        let mx = x.apply_ftor(mul(), c1x, vx);
        let tx = x.apply_ftor(add(), mx, c2x);

        let c1y = y.make_const(num(1));
        let c2y = y.make_const(num(2));
        let vy = y.fresh_var();
        let my = y.apply_ftor(mul(), c1y, vy);
        let ty = y.apply_ftor(add(), my, c2y);

        let mut out = TermTable::new();
        let mut memo = BTreeMap::new();
        let tz = x.generalize(&y, tx, ty, &mut out, &mut memo);

        // Shape is preserved: add(mul(1, ?), 2).
        match out.get(tz) {
            Term::App(op, a, b) => {
                assert_eq!(*op, add());
                assert!(matches!(out.get(*b), Term::Const(n) if *n == num(2)));
                match out.get(*a) {
                    Term::App(op, c, v) => {
                        assert_eq!(*op, mul());
                        assert!(matches!(out.get(*c), Term::Const(n) if *n == num(1)));
                        assert!(out.get(*v).is_var());
                    }
                    t => panic!("unexpected term {:?}", t),
                }
            }
            t => panic!("unexpected term {:?}", t),
        }
    }

    #[test]
    fn test_generalize_mismatch_is_memoized() {
        let mut x = TermTable::new();
        let mut y = TermTable::new();

        // x: 1 + 1 ; y: 5 + 5 --- the (1,5) mismatch must map to one
        // placeholder used for both children.
        let c1 = x.make_const(num(1));
        let tx = x.apply_ftor(add(), c1, c1);
        let c5 = y.make_const(num(5));
        let ty = y.apply_ftor(add(), c5, c5);

        let mut out = TermTable::new();
        let mut memo = BTreeMap::new();
        let tz = x.generalize(&y, tx, ty, &mut out, &mut memo);

        match out.get(tz) {
            Term::App(op, a, b) => {
                assert_eq!(*op, add());
                assert_eq!(a, b);
                assert!(out.get(*a).is_var());
            }
            t => panic!("unexpected term {:?}", t),
        }
        // Memo holds every visited pair.
        assert_eq!(memo.get(&(c1, c5)), Some(&out_var(&out, tz)));
    }

    fn out_var(out: &TermTable, tz: TermId) -> TermId {
        match out.get(tz) {
            Term::App(_, a, _) => *a,
            _ => panic!("expected application"),
        }
    }
}
