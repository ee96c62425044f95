//! Keyed probability tables
//!
//! A computed cube of joint probabilities is packaged into a map from
//! unordered marginal pairs to 2 x |corrs| matrices: row 0 carries the
//! correlation grid, row 1 the joint probabilities for that pair. Keys are
//! fixed-precision integers rather than float tuples so that hashing and
//! lookup are deterministic across platforms.
use ndarray::{s, Array2, Array3, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Decimal digits of marginal precision retained in table keys.
///
/// Two requested marginals collide only if they agree to `KEY_DIGITS`
/// decimal digits, i.e. are numerically indistinguishable at that precision.
pub const KEY_DIGITS: u32 = 10;

const KEY_SCALE: f64 = 1e10;

/// Unordered pair of marginal probabilities, stored smaller-first as scaled
/// integers at [`KEY_DIGITS`] decimal digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    lo: u64,
    hi: u64,
}

impl PairKey {
    /// Key for the unordered pair `(p, q)`; argument order is irrelevant.
    pub fn new(p: f64, q: f64) -> Self {
        let a = (p * KEY_SCALE).round() as u64;
        let b = (q * KEY_SCALE).round() as u64;
        if a <= b {
            PairKey { lo: a, hi: b }
        } else {
            PairKey { lo: b, hi: a }
        }
    }

    /// The two marginals rounded to [`KEY_DIGITS`] decimal digits, smaller
    /// first.
    pub fn margins(&self) -> (f64, f64) {
        (self.lo as f64 / KEY_SCALE, self.hi as f64 / KEY_SCALE)
    }
}

/// Joint-probability table keyed by unordered marginal pairs.
///
/// Each value is a 2 x |corrs| matrix pairing the correlation grid (row 0)
/// with the joint probabilities of the keyed marginal pair (row 1).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProbTable {
    entries: HashMap<PairKey, Array2<f64>>,
}

impl ProbTable {
    /// Looks up the matrix for the unordered pair `(p, q)`.
    pub fn get(&self, p: f64, q: f64) -> Option<&Array2<f64>> {
        self.entries.get(&PairKey::new(p, q))
    }

    /// Number of distinct unordered marginal pairs in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &Array2<f64>)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PairKey> {
        self.entries.keys()
    }

    /// Packages a cube indexed `[margin, margin, corr]` over the upper
    /// triangle of the marginal pairs.
    pub(crate) fn from_margin_major(
        margins: ArrayView1<f64>,
        corrs: ArrayView1<f64>,
        cube: &Array3<f64>,
    ) -> Self {
        let mut entries = HashMap::new();
        for j in 0..margins.len() {
            for k in j..margins.len() {
                let mut mat = Array2::zeros((2, corrs.len()));
                mat.row_mut(0).assign(&corrs);
                mat.row_mut(1).assign(&cube.slice(s![j, k, ..]));
                entries.insert(PairKey::new(margins[j], margins[k]), mat);
            }
        }
        ProbTable { entries }
    }

    /// Packages a cube indexed `[corr, margin, margin]` over the upper
    /// triangle of the marginal pairs.
    pub(crate) fn from_corr_major(
        margins: ArrayView1<f64>,
        corrs: ArrayView1<f64>,
        cube: &Array3<f64>,
    ) -> Self {
        let mut entries = HashMap::new();
        for j in 0..margins.len() {
            for k in j..margins.len() {
                let mut mat = Array2::zeros((2, corrs.len()));
                mat.row_mut(0).assign(&corrs);
                mat.row_mut(1).assign(&cube.slice(s![.., j, k]));
                entries.insert(PairKey::new(margins[j], margins[k]), mat);
            }
        }
        ProbTable { entries }
    }
}
