//! Canonical hashing for the hash-consed term table.
//!
//! A term's bucket index must depend only on the term's own structure:
//! `(op, a, b)` has to land in the same bucket no matter which table
//! holds it or what was inserted before it, and a constant's bucket
//! must follow from its digits alone. That is what lets a lookup probe
//! a single chain instead of scanning the table, and what keeps
//! lookups valid across a rehash.
//!
//! The hashes are built by folding the fields of a term into one word
//! with Szudzik's pairing function. It suits dense indices like term
//! ids: values near the origin fill square shells without gaps, so
//! distinct small pairs stay distinct until the 32-bit range is
//! exhausted, and the computation is one multiplication and two
//! additions. Since only the bucket mask consumes the result, the
//! arithmetic wraps rather than widens.

/// Folds two words into one: `b`'s square shell is indexed by `a` on
/// one side of the diagonal and by `a`'s shell on the other.
pub fn pairing2(a: u64, b: u64) -> u64 {
    if a >= b {
        // a is the outer shell: row entry a² + a + b.
        a.wrapping_mul(a).wrapping_add(a).wrapping_add(b)
    } else {
        // b is the outer shell: column entry b² + a.
        b.wrapping_mul(b).wrapping_add(a)
    }
}

/// Folds three words by nesting [`pairing2`], left to right.
pub fn pairing3(a: u64, b: u64, c: u64) -> u64 {
    pairing2(pairing2(a, b), c)
}

/// A structural hash: equal structures hash equally in every table,
/// independent of insertion history.
pub trait CanonHash {
    fn canon_hash(&self) -> u64;
}

impl CanonHash for u64 {
    fn canon_hash(&self) -> u64 {
        *self
    }
}

impl CanonHash for (u64, u64) {
    fn canon_hash(&self) -> u64 {
        pairing2(self.0, self.1)
    }
}

impl CanonHash for (u64, u64, u64) {
    fn canon_hash(&self) -> u64 {
        pairing3(self.0, self.1, self.2)
    }
}
