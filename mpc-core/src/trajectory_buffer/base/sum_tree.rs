//! Sum tree for weighted sampling without replacement.
//!
//! Adapted from the sum tree of prioritized experience replay: leaves hold
//! weights, internal nodes the sums of their children. A drawn leaf is zeroed
//! so it cannot be drawn again.
use crate::error::MpcError;
use rand::Rng;

#[derive(Debug)]
pub struct SumTree {
    n_leaves: usize,
    tree: Vec<f64>,
}

impl SumTree {
    /// Builds a tree over the given weights.
    ///
    /// Every weight must be finite and non-negative.
    pub fn build(weights: &[f32]) -> Result<Self, MpcError> {
        let n_leaves = weights.len();
        if n_leaves == 0 {
            return Err(MpcError::DegenerateWeights("no candidates".to_string()));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(MpcError::DegenerateWeights(format!(
                "weight {} is not finite and non-negative",
                w
            )));
        }

        let mut tree = vec![0f64; 2 * n_leaves - 1];
        for (i, &w) in weights.iter().enumerate() {
            tree[i + n_leaves - 1] = w as f64;
        }
        for ix in (0..(n_leaves - 1)).rev() {
            tree[ix] = tree[2 * ix + 1] + tree[2 * ix + 2];
        }

        Ok(Self { n_leaves, tree })
    }

    // Sums are recomputed from the children rather than shifted by the change,
    // so a subtree of zeroed leaves sums to exactly zero.
    fn propagate(&mut self, mut ix: usize) {
        while ix != 0 {
            let parent = (ix - 1) / 2;
            self.tree[parent] = self.tree[2 * parent + 1] + self.tree[2 * parent + 2];
            ix = parent;
        }
    }

    fn retrieve(&self, mut ix: usize, mut s: f64) -> usize {
        loop {
            let left = 2 * ix + 1;
            let right = left + 1;

            if left >= self.tree.len() {
                return ix;
            }

            let go_left = self.tree[left] > 0.0 && (s < self.tree[left] || self.tree[right] <= 0.0);
            if go_left {
                ix = left;
            } else {
                s = (s - self.tree[left]).max(0.0);
                ix = right;
            }
        }
    }

    pub fn total(&self) -> f64 {
        self.tree[0]
    }

    pub fn weight(&self, leaf: usize) -> f64 {
        self.tree[leaf + self.n_leaves - 1]
    }

    pub fn update(&mut self, leaf: usize, w: f64) {
        debug_assert!(leaf < self.n_leaves);
        let ix = leaf + self.n_leaves - 1;
        self.tree[ix] = w;
        self.propagate(ix);
    }

    /// Leaf covering the prefix sum `s`.
    pub fn get(&self, s: f64) -> usize {
        let ix = self.retrieve(0, s);
        debug_assert!(ix >= (self.n_leaves - 1));
        ix + 1 - self.n_leaves
    }

    /// Draws `n` distinct leaves, each with probability proportional to its
    /// weight among the leaves not drawn yet.
    pub fn sample_without_replacement<R: Rng>(
        &mut self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, MpcError> {
        let mut leaves = Vec::with_capacity(n);
        for _ in 0..n {
            let total = self.total();
            if !(total > 0.0) {
                return Err(MpcError::DegenerateWeights(format!(
                    "total weight {} after {} draws",
                    total,
                    leaves.len()
                )));
            }
            let leaf = self.get(total * rng.gen::<f64>());
            if self.weight(leaf) <= 0.0 {
                return Err(MpcError::DegenerateWeights(format!(
                    "drew leaf {} with zero weight",
                    leaf
                )));
            }
            self.update(leaf, 0.0);
            leaves.push(leaf);
        }
        Ok(leaves)
    }
}
