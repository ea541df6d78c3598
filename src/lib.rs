//! # absint-rs: Abstract Interpretation over Control-Flow Graphs
//!
//! **`absint-rs`** computes sound numerical invariants at every point of a
//! program given as a control-flow graph over integer variables. It iterates
//! abstract transfer functions over a lattice of abstract values until a
//! fixpoint is reached, accelerating loops with widening and recovering
//! precision with narrowing.
//!
//! ## What's inside
//!
//! Three subsystems form the core:
//!
//! - **An interleaved forward fixpoint iterator** ([`InterleavedFixpoint`])
//!   driven by a weak topological ordering ([`Wto`], Bourdoncle's
//!   recursive strategy) of the CFG, with hierarchical widening and
//!   narrowing control per cycle.
//! - **A term-equivalence domain** ([`TermDomain`]) that lifts any base
//!   domain with a hash-consed DAG of symbolic terms. Variables assigned
//!   the same expression share a term --- and a proxy variable underneath ---
//!   so equalities survive even over a non-relational base. Joins
//!   anti-unify term pairs into their most specific common shape.
//! - **A powerset combinator** ([`PowersetDomain`]) holding a bounded
//!   disjunction of base values, degrading gracefully (by *smashing* the
//!   disjuncts into their join) when the budget is exceeded.
//!
//! A non-relational interval environment ([`IntervalDomain`]) is provided
//! as the reference base domain; anything satisfying [`BaseDomain`] plugs
//! into the same seams.
//!
//! ## Design
//!
//! - **Values, not hierarchies**: an abstract state is a plain value
//!   implementing [`BaseDomain`]. Combinators wrap values in values.
//! - **Arena terms**: the term DAG is a flat, hash-consed table indexed by
//!   [`TermId`]; parent/child links are index arrays owned by the table,
//!   so cloning a domain clones the whole DAG with no aliasing.
//! - **Errors are values**: infeasibility is `bottom`, unsupported
//!   transfers degrade soundly and log a warning through the [`log`]
//!   facade. Lattice laws hold under every degradation.
//!
//! ## Example
//!
//! Joining two branches keeps the relation `y = x + 2`, something the
//! interval base domain alone cannot express:
//!
//! ```rust
//! use absint_rs::{num, ArithOp, BaseDomain, Interval, IntervalDomain, LinExpr};
//! use absint_rs::{ProxyVar, TermDomain, VarName};
//!
//! type Dom = TermDomain<IntervalDomain<ProxyVar>>;
//!
//! let x = VarName::new("x");
//! let y = VarName::new("y");
//!
//! // Branch A: x := 1; y := x + 2
//! let mut a = Dom::top();
//! a.assign(&x, &LinExpr::constant(num(1)));
//! a.apply_const(ArithOp::Add, &y, &x, &num(2));
//!
//! // Branch B: x := 5; y := x + 2
//! let mut b = Dom::top();
//! b.assign(&x, &LinExpr::constant(num(5)));
//! b.apply_const(ArithOp::Add, &y, &x, &num(2));
//!
//! // The join anti-unifies the branches; the shape y = x + 2 survives.
//! let mut merged = a.join(&b);
//! assert_eq!(merged.value_of(&x), Interval::range(1, 5));
//! assert_eq!(merged.value_of(&y), Interval::range(3, 7));
//!
//! // Pinning x propagates through the shared term structure to y.
//! merged.add_constraint(&LinExpr::var(x.clone()).sub_const(num(4)).eq());
//! assert_eq!(merged.value_of(&y), Interval::constant(6));
//! ```
//!
//! Analyzing a loop end-to-end: implement [`Cfg`] for your graph, hand the
//! iterator a transfer function (any `FnMut(&Node, &V) -> V` works), and
//! read the stabilized `pre`/`post` tables afterwards --- see
//! [`InterleavedFixpoint`].

pub mod bound;
pub mod domain;
pub mod fixpoint;
pub mod hashing;
pub mod interval;
pub mod interval_domain;
pub mod linear;
pub mod num;
pub mod powerset;
pub mod term;
pub mod term_domain;
pub mod thresholds;
pub mod variable;
pub mod wto;

// Re-exports for convenience
pub use bound::Bound;
pub use domain::{ArithOp, BaseDomain, BitwiseOp, CastOp, DivOp, Op};
pub use fixpoint::{Analyzer, Cfg, FixpointConfig, InterleavedFixpoint, InvariantProcessor};
pub use interval::Interval;
pub use interval_domain::IntervalDomain;
pub use linear::{ConsKind, ConstraintSystem, LinCons, LinExpr};
pub use num::{num, Number};
pub use powerset::{PowersetDomain, PowersetParams};
pub use term::{Term, TermId, TermTable};
pub use term_domain::{ProxyAlloc, ProxyVar, TermDomain};
pub use thresholds::Thresholds;
pub use variable::{VarKind, VarName, Variable};
pub use wto::{Wto, WtoComponent, WtoCycle, WtoNesting, WtoVisitor};
