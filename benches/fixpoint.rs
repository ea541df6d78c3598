//! Fixpoint-iterator benchmarks.
//!
//! Measures whole-analysis runs over synthetic CFGs: a chain of
//! sequential loops (many small cycles) and one deep nest of loops
//! (hierarchical re-stabilization).
//!
//! Run with:
//! ```bash
//! cargo bench --bench fixpoint
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use absint_rs::{
    num, BaseDomain, Cfg, FixpointConfig, IntervalDomain, InterleavedFixpoint, LinExpr,
    Thresholds, VarName,
};

/// Adjacency-list CFG with numeric node names.
struct Graph {
    entry: usize,
    succ: Vec<Vec<usize>>,
    pred: Vec<Vec<usize>>,
}

impl Graph {
    fn new(nodes: usize, entry: usize, edges: &[(usize, usize)]) -> Self {
        let mut g = Graph {
            entry,
            succ: vec![Vec::new(); nodes],
            pred: vec![Vec::new(); nodes],
        };
        for &(from, to) in edges {
            g.succ[from].push(to);
            g.pred[to].push(from);
        }
        g
    }
}

impl Cfg for Graph {
    type NodeName = usize;

    fn entry(&self) -> usize {
        self.entry
    }

    fn next_nodes(&self, n: &usize) -> Vec<usize> {
        self.succ[*n].clone()
    }

    fn prev_nodes(&self, n: &usize) -> Vec<usize> {
        self.pred[*n].clone()
    }

    fn thresholds_for_widening(&self, _size: usize) -> Thresholds {
        [num(16), num(256), num(65_536)].into_iter().collect()
    }
}

/// `k` sequential loops: entry, then head/body pairs, then exit.
fn chain_of_loops(k: usize) -> Graph {
    let nodes = 2 + 2 * k;
    let mut edges = Vec::new();
    let mut prev = 0; // entry
    for i in 0..k {
        let head = 1 + 2 * i;
        let body = head + 1;
        edges.push((prev, head));
        edges.push((head, body));
        edges.push((body, head));
        prev = head;
    }
    edges.push((prev, nodes - 1)); // exit
    Graph::new(nodes, 0, &edges)
}

/// `k` nested loops: heads 1..=k, innermost body bounces back to every head.
fn nested_loops(k: usize) -> Graph {
    let nodes = k + 3;
    let mut edges = vec![(0, 1)];
    for h in 1..=k {
        edges.push((h, h + 1));
    }
    let inner = k + 1;
    for h in (1..=k).rev() {
        edges.push((inner, h));
    }
    edges.push((1, nodes - 1)); // exit
    Graph::new(nodes, 0, &edges)
}

fn run_analysis(g: &Graph) -> IntervalDomain<VarName> {
    type Dom = IntervalDomain<VarName>;
    let config = FixpointConfig {
        widening_threshold: 1,
        narrowing_iterations: 2,
        jump_set_size: 0,
    };
    let mut fix: InterleavedFixpoint<Graph, Dom> = InterleavedFixpoint::new(g, config);
    let i = VarName::new("i");
    let mut transfer = |node: &usize, pre: &Dom| -> Dom {
        let mut post = pre.clone();
        if *node == 0 {
            post.assign(&i, &LinExpr::constant(num(0)));
        } else if *node % 2 == 0 {
            // Bodies increment; heads and the exit are pass-through.
            post.assign(&i, &LinExpr::var(i.clone()).add_const(num(1)));
        }
        post
    };
    fix.run(Dom::top(), &mut transfer);
    fix.post(&(g.succ.len() - 1))
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_of_loops");
    for k in [4usize, 16, 64] {
        group.throughput(Throughput::Elements(k as u64));
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            let g = chain_of_loops(k);
            b.iter(|| run_analysis(&g));
        });
    }
    group.finish();
}

fn bench_nested(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_loops");
    for k in [2usize, 4, 8] {
        group.throughput(Throughput::Elements(k as u64));
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            let g = nested_loops(k);
            b.iter(|| run_analysis(&g));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chain, bench_nested);
criterion_main!(benches);
