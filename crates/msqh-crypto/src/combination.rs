//! Canonical enumeration of size-`m` subsets of `n` questions
//!
//! A combination is an `n`-bit mask with exactly `m` bits set. Masks are
//! produced in strictly increasing numeric order, starting at `(1 << m) - 1`,
//! using the "next integer with the same popcount" step. The `i`-th mask
//! always pairs with the `i`-th derived key in a container, so encryption and
//! decryption must enumerate with identical `(n, m)`.

use msqh_core::{MsqhError, MsqhResult};

use crate::digest::Word256;

/// Largest supported question count; every mask must fit a `u64` with the
/// enumeration step staying in range.
pub const MAX_QUESTIONS: u16 = 63;

/// One size-`m` subset of question indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Combination(u64);

impl Combination {
    pub fn from_mask(mask: u64) -> Self {
        Self(mask)
    }

    pub fn mask(self) -> u64 {
        self.0
    }

    /// Number of questions in the subset.
    pub fn size(self) -> u32 {
        self.0.count_ones()
    }

    pub fn contains(self, index: usize) -> bool {
        index < 64 && (self.0 >> index) & 1 == 1
    }

    /// Question indices in ascending order.
    pub fn positions(self) -> impl Iterator<Item = usize> {
        let mask = self.0;
        (0..64).filter(move |i| (mask >> i) & 1 == 1)
    }

    /// XOR of the digests at this combination's positions.
    ///
    /// Positions beyond `digests` contribute nothing; callers pass exactly
    /// `n` digests.
    pub fn fold(self, digests: &[Word256]) -> Word256 {
        self.positions()
            .filter_map(|i| digests.get(i))
            .fold(Word256::ZERO, |acc, d| acc ^ *d)
    }
}

/// Check that `n` questions with threshold `m` can be enumerated.
pub fn validate_threshold(n: u16, m: u16) -> MsqhResult<()> {
    if n == 0 || n > MAX_QUESTIONS {
        return Err(MsqhError::InvalidParameters(format!(
            "question count must be between 1 and {MAX_QUESTIONS}, got {n}"
        )));
    }
    if m == 0 || m > n {
        return Err(MsqhError::InvalidParameters(format!(
            "threshold must be between 1 and {n}, got {m}"
        )));
    }
    Ok(())
}

/// C(n, k), or `None` if it does not fit a `u64`.
pub fn binomial(n: u64, k: u64) -> Option<u64> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut c: u128 = 1;
    for i in 0..k {
        // c * (n - i) / (i + 1) stays exact: c is C(n, i) at this point
        c = c * u128::from(n - i) / u128::from(i + 1);
        if c > u128::from(u64::MAX) {
            return None;
        }
    }
    u64::try_from(c).ok()
}

/// Iterator over every combination of `m` out of `n` in increasing order.
#[derive(Debug, Clone)]
pub struct Combinations {
    current: u64,
    end: u64,
    remaining: usize,
}

/// Enumerate all size-`m` subsets of `n` questions.
pub fn combinations(n: u16, m: u16) -> MsqhResult<Combinations> {
    validate_threshold(n, m)?;
    let total = binomial(u64::from(n), u64::from(m))
        .and_then(|c| usize::try_from(c).ok())
        .ok_or_else(|| {
            MsqhError::InvalidParameters(format!("C({n}, {m}) is too large to enumerate"))
        })?;
    Ok(Combinations {
        current: (1u64 << m) - 1,
        end: 1u64 << n,
        remaining: total,
    })
}

/// Smallest integer greater than `b` with the same number of set bits.
///
/// Requires `0 < b < 2^63`.
fn next_same_popcount(b: u64) -> u64 {
    let t = b | (b - 1);
    let inv = !t;
    let lowest_clear = inv & inv.wrapping_neg();
    (t + 1) | ((lowest_clear - 1) >> (b.trailing_zeros() + 1))
}

impl Iterator for Combinations {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        if self.current >= self.end {
            return None;
        }
        let b = self.current;
        self.current = next_same_popcount(b);
        self.remaining = self.remaining.saturating_sub(1);
        Some(Combination(b))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Combinations {}
