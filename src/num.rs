//! Arbitrary-precision numbers.
//!
//! Every coefficient, constant and interval bound in the crate is a
//! [`Number`]. Analyses reason about mathematical integers; machine
//! widths are handled (by being ignored) at the cast operations.

use num_bigint::BigInt;

/// Arbitrary-precision signed integer.
pub type Number = BigInt;

/// Shorthand for building a [`Number`] from a machine integer.
pub fn num(value: i64) -> Number {
    Number::from(value)
}
