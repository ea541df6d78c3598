//! Interleaved forward fixpoint iteration over a WTO.
//!
//! The iterator walks the weak topological ordering of the CFG. Plain
//! vertices get the join of their predecessors' post-states and one
//! transfer application. Cycles run an *ascending* sequence --- join
//! below the widening threshold, widening (plain or thresholded)
//! above it --- until a post-fixpoint is reached, then a *descending*
//! sequence --- meet once, narrowing afterwards --- capped by the
//! narrowing iteration budget. Nested cycles re-stabilize on every
//! round of their enclosing cycle.
//!
//! Given the same CFG, initial state and transfer function, the visit
//! order (and therefore the result) is fully deterministic.
//!
//! The widening/narrowing interleaving follows Amato & Scozzari,
//! "Localizing widening and narrowing" (SAS 2013).

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::BaseDomain;
use crate::thresholds::Thresholds;
use crate::wto::{Wto, WtoComponent, WtoCycle, WtoVisitor};

/// The control-flow graph surface the iterator consumes. Construction
/// of blocks, statements and edges lives outside the core.
pub trait Cfg {
    type NodeName: Clone + Eq + Ord + Hash + Debug;

    fn entry(&self) -> Self::NodeName;
    fn next_nodes(&self, n: &Self::NodeName) -> Vec<Self::NodeName>;
    fn prev_nodes(&self, n: &Self::NodeName) -> Vec<Self::NodeName>;

    /// Statically selected widening landing points. The default is no
    /// thresholds, which makes threshold widening degrade to plain
    /// widening.
    fn thresholds_for_widening(&self, _size: usize) -> Thresholds {
        Thresholds::new()
    }
}

/// The abstract semantics of a basic block: `post = transfer(node, pre)`.
pub trait Analyzer<G: Cfg, V> {
    fn transfer(&mut self, node: &G::NodeName, pre: &V) -> V;
}

impl<G: Cfg, V, F> Analyzer<G, V> for F
where
    F: FnMut(&G::NodeName, &V) -> V,
{
    fn transfer(&mut self, node: &G::NodeName, pre: &V) -> V {
        self(node, pre)
    }
}

/// Sink for the reporting pass over the stabilized invariant tables.
pub trait InvariantProcessor<G: Cfg, V> {
    fn process_pre(&mut self, node: &G::NodeName, value: &V);
    fn process_post(&mut self, node: &G::NodeName, value: &V);
}

/// Iteration control knobs.
#[derive(Debug, Clone)]
pub struct FixpointConfig {
    /// Join iterations on a cycle head before widening kicks in.
    pub widening_threshold: u32,
    /// Hard cap on descending iterations.
    pub narrowing_iterations: u32,
    /// Size of the widening jump set; 0 disables threshold widening.
    pub jump_set_size: usize,
}

impl Default for FixpointConfig {
    fn default() -> Self {
        FixpointConfig {
            widening_threshold: 1,
            narrowing_iterations: 2,
            jump_set_size: 0,
        }
    }
}

/// The interleaved forward fixpoint iterator.
///
/// Owns one pair of invariant tables (pre, post) for the duration of
/// a run; nodes never visited map to bottom.
pub struct InterleavedFixpoint<'g, G: Cfg, V: BaseDomain> {
    cfg: &'g G,
    wto: Wto<G::NodeName>,
    pre: BTreeMap<G::NodeName, V>,
    post: BTreeMap<G::NodeName, V>,
    widening_threshold: u32,
    narrowing_iterations: u32,
    jump_set: Option<Thresholds>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'g, G, V> InterleavedFixpoint<'g, G, V>
where
    G: Cfg,
    V: BaseDomain,
{
    pub fn new(cfg: &'g G, config: FixpointConfig) -> Self {
        let wto = Wto::new(cfg);
        let jump_set = if config.jump_set_size > 0 {
            Some(cfg.thresholds_for_widening(config.jump_set_size))
        } else {
            None
        };
        InterleavedFixpoint {
            cfg,
            wto,
            pre: BTreeMap::new(),
            post: BTreeMap::new(),
            widening_threshold: config.widening_threshold,
            narrowing_iterations: config.narrowing_iterations,
            jump_set,
            cancel: None,
        }
    }

    pub fn cfg(&self) -> &G {
        self.cfg
    }

    pub fn wto(&self) -> &Wto<G::NodeName> {
        &self.wto
    }

    /// Stabilized pre-state of a node (bottom if never reached).
    pub fn pre(&self, n: &G::NodeName) -> V {
        self.pre.get(n).cloned().unwrap_or_else(V::bottom)
    }

    /// Stabilized post-state of a node (bottom if never reached).
    pub fn post(&self, n: &G::NodeName) -> V {
        self.post.get(n).cloned().unwrap_or_else(V::bottom)
    }

    /// Installs a cooperative cancellation flag, checked between WTO
    /// component visits. A cancelled run discards its tables.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// Runs the analysis from `init` at the CFG entry. Returns false
    /// when cancelled (the tables are then empty).
    pub fn run<A: Analyzer<G, V>>(&mut self, init: V, analyzer: &mut A) -> bool {
        self.pre.clear();
        self.post.clear();
        self.pre.insert(self.cfg.entry(), init);

        let components = self.wto.components().to_vec();
        for c in &components {
            if !self.visit_component(c, analyzer) {
                log::debug!("fixpoint run cancelled, discarding invariant tables");
                self.pre.clear();
                self.post.clear();
                return false;
            }
        }
        true
    }

    /// Reports the stabilized invariants to `processor` in WTO order.
    pub fn report<P: InvariantProcessor<G, V>>(&self, processor: &mut P) {
        struct Reporter<'a, 'g, G: Cfg, V: BaseDomain, P> {
            fix: &'a InterleavedFixpoint<'g, G, V>,
            processor: &'a mut P,
        }

        impl<'a, 'g, G, V, P> WtoVisitor<G::NodeName> for Reporter<'a, 'g, G, V, P>
        where
            G: Cfg,
            V: BaseDomain,
            P: InvariantProcessor<G, V>,
        {
            fn visit_vertex(&mut self, node: &G::NodeName) {
                self.processor.process_pre(node, &self.fix.pre(node));
                self.processor.process_post(node, &self.fix.post(node));
            }

            fn visit_cycle(&mut self, cycle: &WtoCycle<G::NodeName>) {
                self.visit_vertex(cycle.head());
                for c in cycle.body() {
                    c.accept(self);
                }
            }
        }

        let mut reporter = Reporter {
            fix: self,
            processor,
        };
        self.wto.accept(&mut reporter);
    }

    fn visit_component<A: Analyzer<G, V>>(
        &mut self,
        c: &WtoComponent<G::NodeName>,
        analyzer: &mut A,
    ) -> bool {
        if self.cancelled() {
            return false;
        }
        match c {
            WtoComponent::Vertex(n) => {
                self.visit_vertex(n, analyzer);
                true
            }
            WtoComponent::Cycle(cycle) => self.visit_cycle(cycle, analyzer),
        }
    }

    fn visit_vertex<A: Analyzer<G, V>>(&mut self, n: &G::NodeName, analyzer: &mut A) {
        let pre = if *n == self.cfg.entry() {
            self.pre(n)
        } else {
            let pre = self.join_preds(n, |_| true);
            self.pre.insert(n.clone(), pre.clone());
            pre
        };
        let post = analyzer.transfer(n, &pre);
        self.post.insert(n.clone(), post);
    }

    fn visit_cycle<A: Analyzer<G, V>>(
        &mut self,
        cycle: &WtoCycle<G::NodeName>,
        analyzer: &mut A,
    ) -> bool {
        let head = cycle.head().clone();

        // Seed from the predecessors outside the cycle; back edges
        // contribute from the second round on.
        let mut pre = self.join_preds(&head, |p| !self.wto.nesting(p).within(&head));

        // Ascending sequence.
        let mut iteration = 0u32;
        loop {
            iteration += 1;
            self.pre.insert(head.clone(), pre.clone());
            let post = analyzer.transfer(&head, &pre);
            self.post.insert(head.clone(), post);
            for c in cycle.body() {
                if !self.visit_component(c, analyzer) {
                    return false;
                }
            }
            let new_pre = self.join_preds(&head, |_| true);
            if new_pre.leq(&pre) {
                // Post-fixpoint reached.
                log::debug!(
                    "cycle {:?} stabilized after {} ascending iterations",
                    head,
                    iteration
                );
                self.pre.insert(head.clone(), new_pre.clone());
                pre = new_pre;
                break;
            }
            pre = self.extrapolate(iteration, &pre, &new_pre);
        }

        // Descending sequence.
        let mut iteration = 0u32;
        loop {
            iteration += 1;
            let post = analyzer.transfer(&head, &pre);
            self.post.insert(head.clone(), post);
            for c in cycle.body() {
                if !self.visit_component(c, analyzer) {
                    return false;
                }
            }
            let new_pre = self.join_preds(&head, |_| true);
            if pre.leq(&new_pre) {
                // No further refinement possible.
                break;
            }
            if iteration > self.narrowing_iterations {
                log::debug!("cycle {:?}: narrowing cap reached", head);
                break;
            }
            pre = self.refine(iteration, &pre, &new_pre);
            self.pre.insert(head.clone(), pre.clone());
        }
        true
    }

    fn join_preds(&self, n: &G::NodeName, keep: impl Fn(&G::NodeName) -> bool) -> V {
        let mut acc = V::bottom();
        for p in self.cfg.prev_nodes(n) {
            if keep(&p) {
                acc = acc.join(&self.post(&p));
            }
        }
        acc
    }

    fn extrapolate(&self, iteration: u32, before: &V, after: &V) -> V {
        if iteration <= self.widening_threshold {
            before.join(after)
        } else if let Some(ts) = &self.jump_set {
            before.widen_with_thresholds(after, ts)
        } else {
            before.widen(after)
        }
    }

    fn refine(&self, iteration: u32, before: &V, after: &V) -> V {
        if iteration == 1 {
            before.meet(after)
        } else {
            before.narrow(after)
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::interval::Interval;
    use crate::interval_domain::IntervalDomain;
    use crate::linear::LinExpr;
    use crate::num::num;
    use crate::variable::VarName;

    /// Insertion-ordered adjacency-list CFG for tests.
    pub struct Graph {
        entry: &'static str,
        succ: Vec<(&'static str, Vec<&'static str>)>,
        pred: Vec<(&'static str, Vec<&'static str>)>,
    }

    impl Graph {
        pub fn new(entry: &'static str, edges: &[(&'static str, &'static str)]) -> Self {
            let mut g = Graph {
                entry,
                succ: vec![(entry, Vec::new())],
                pred: vec![(entry, Vec::new())],
            };
            for &(from, to) in edges {
                g.touch(from);
                g.touch(to);
                g.list_mut(true, from).push(to);
                g.list_mut(false, to).push(from);
            }
            g
        }

        fn touch(&mut self, n: &'static str) {
            if !self.succ.iter().any(|(m, _)| *m == n) {
                self.succ.push((n, Vec::new()));
                self.pred.push((n, Vec::new()));
            }
        }

        fn list_mut(&mut self, fwd: bool, n: &'static str) -> &mut Vec<&'static str> {
            let lists = if fwd { &mut self.succ } else { &mut self.pred };
            &mut lists.iter_mut().find(|(m, _)| *m == n).unwrap().1
        }

        fn list(&self, fwd: bool, n: &'static str) -> Vec<&'static str> {
            let lists = if fwd { &self.succ } else { &self.pred };
            lists
                .iter()
                .find(|(m, _)| *m == n)
                .map(|(_, l)| l.clone())
                .unwrap_or_default()
        }
    }

    impl Cfg for Graph {
        type NodeName = &'static str;

        fn entry(&self) -> &'static str {
            self.entry
        }

        fn next_nodes(&self, n: &&'static str) -> Vec<&'static str> {
            self.list(true, n)
        }

        fn prev_nodes(&self, n: &&'static str) -> Vec<&'static str> {
            self.list(false, n)
        }
    }

    type Dom = IntervalDomain<VarName>;

    fn v(name: &str) -> VarName {
        VarName::new(name)
    }

    #[test]
    fn test_straight_line() {
        let g = Graph::new("entry", &[("entry", "a"), ("a", "b")]);
        let mut fix = InterleavedFixpoint::new(&g, FixpointConfig::default());

        let mut transfer = |node: &&'static str, pre: &Dom| -> Dom {
            let mut post = pre.clone();
            match *node {
                "entry" => post.assign(&v("x"), &LinExpr::constant(num(0))),
                _ => post.assign(&v("x"), &LinExpr::var(v("x")).add_const(num(1))),
            }
            post
        };
        assert!(fix.run(Dom::top(), &mut transfer));

        assert_eq!(fix.post(&"entry").value_of(&v("x")), Interval::constant(0));
        assert_eq!(fix.pre(&"b").value_of(&v("x")), Interval::constant(1));
        assert_eq!(fix.post(&"b").value_of(&v("x")), Interval::constant(2));
    }

    #[test]
    fn test_merge_joins_predecessors() {
        let g = Graph::new(
            "e",
            &[("e", "t"), ("e", "f"), ("t", "m"), ("f", "m")],
        );
        let mut fix = InterleavedFixpoint::new(&g, FixpointConfig::default());
        let mut transfer = |node: &&'static str, pre: &Dom| -> Dom {
            let mut post = pre.clone();
            match *node {
                "t" => post.assign(&v("x"), &LinExpr::constant(num(1))),
                "f" => post.assign(&v("x"), &LinExpr::constant(num(5))),
                _ => {}
            }
            post
        };
        assert!(fix.run(Dom::top(), &mut transfer));
        assert_eq!(fix.pre(&"m").value_of(&v("x")), Interval::range(1, 5));
    }

    #[test]
    fn test_loop_widens_to_infinity() {
        let g = Graph::new(
            "entry",
            &[
                ("entry", "head"),
                ("head", "body"),
                ("body", "head"),
                ("head", "exit"),
            ],
        );
        let config = FixpointConfig {
            widening_threshold: 1,
            narrowing_iterations: 1,
            jump_set_size: 0,
        };
        let mut fix = InterleavedFixpoint::new(&g, config);
        let mut transfer = |node: &&'static str, pre: &Dom| -> Dom {
            let mut post = pre.clone();
            match *node {
                "entry" => post.assign(&v("i"), &LinExpr::constant(num(0))),
                "body" => post.assign(&v("i"), &LinExpr::var(v("i")).add_const(num(1))),
                _ => {}
            }
            post
        };
        assert!(fix.run(Dom::top(), &mut transfer));

        let head_pre = fix.pre(&"head").value_of(&v("i"));
        assert_eq!(head_pre.lb(), Interval::range(0, 0).lb());
        assert!(!head_pre.ub().is_finite());
    }

    #[test]
    fn test_fixpoint_is_inductive() {
        // pre(n) ⊒ ⊔ post(preds) and post(n) ⊒ transfer(n, pre(n)).
        let g = Graph::new(
            "entry",
            &[
                ("entry", "head"),
                ("head", "body"),
                ("body", "head"),
                ("head", "exit"),
            ],
        );
        let mut fix = InterleavedFixpoint::new(&g, FixpointConfig::default());
        let transfer = |node: &&'static str, pre: &Dom| -> Dom {
            let mut post = pre.clone();
            match *node {
                "entry" => post.assign(&v("i"), &LinExpr::constant(num(0))),
                "body" => post.assign(&v("i"), &LinExpr::var(v("i")).add_const(num(1))),
                "head" => post
                    .add_constraint(&LinExpr::var(v("i")).sub_const(num(9)).le()),
                _ => {}
            }
            post
        };
        let mut analyzer = transfer;
        assert!(fix.run(Dom::top(), &mut analyzer));

        for node in ["entry", "head", "body", "exit"] {
            let pre = fix.pre(&node);
            if node != "entry" {
                let mut joined = Dom::bottom();
                for p in g.prev_nodes(&node) {
                    joined = joined.join(&fix.post(&p));
                }
                assert!(joined.leq(&pre), "pre({}) not inductive", node);
            }
            let recomputed = transfer(&node, &pre);
            assert!(
                recomputed.leq(&fix.post(&node)),
                "post({}) not inductive",
                node
            );
        }
    }

    #[test]
    fn test_report_visits_wto_order() {
        let g = Graph::new(
            "entry",
            &[
                ("entry", "head"),
                ("head", "body"),
                ("body", "head"),
                ("head", "exit"),
            ],
        );
        let mut fix = InterleavedFixpoint::new(&g, FixpointConfig::default());
        let mut transfer = |_: &&'static str, pre: &Dom| pre.clone();
        assert!(fix.run(Dom::top(), &mut transfer));

        struct Collect {
            pres: Vec<&'static str>,
            posts: Vec<&'static str>,
        }
        impl InvariantProcessor<Graph, Dom> for Collect {
            fn process_pre(&mut self, node: &&'static str, _: &Dom) {
                self.pres.push(node);
            }
            fn process_post(&mut self, node: &&'static str, _: &Dom) {
                self.posts.push(node);
            }
        }
        let mut c = Collect {
            pres: Vec::new(),
            posts: Vec::new(),
        };
        fix.report(&mut c);
        assert_eq!(c.pres, ["entry", "head", "body", "exit"]);
        assert_eq!(c.posts, c.pres);
    }

    #[test]
    fn test_cancellation_discards_tables() {
        let g = Graph::new("entry", &[("entry", "a"), ("a", "b")]);
        let mut fix = InterleavedFixpoint::new(&g, FixpointConfig::default());
        let flag = Arc::new(AtomicBool::new(true));
        fix.set_cancel_flag(flag);

        let mut transfer = |_: &&'static str, pre: &Dom| pre.clone();
        assert!(!fix.run(Dom::top(), &mut transfer));
        assert!(fix.pre(&"entry").is_bottom());
        assert!(fix.post(&"b").is_bottom());
    }
}
