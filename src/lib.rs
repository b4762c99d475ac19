//! # negsampling
//!
//! O(1) weighted sampling and the negative-sampling loss that feeds on it.
//!
//! This crate wraps a compact implementation of
//! [Walker’s Alias Method](https://en.wikipedia.org/wiki/Alias_method)
//! to draw from a fixed discrete distribution, and builds the skip-gram
//! negative-sampling objective on top of it.
//!
//! There are two primary pieces:
//!
//! 1. [`AliasTable`]: built once from a weight vector, then sampled in O(1)
//!    per draw, one at a time or as whole `ndarray` batches.
//! 2. [`NegativeSamplingLoss`]: owns an [`EmbeddingTable`] and an
//!    [`AliasTable`] over `frequency ^ power`, and scores a batch of
//!    `(target, context)` pairs against `K` drawn negatives each.
//!
//! ## Quick start (sampler)
//!
//! ```rust,ignore
//! use negsampling::AliasTable;
//! use rand::{SeedableRng, rngs::StdRng};
//!
//! let table = AliasTable::new(&[60.0, 30.0, 9.0, 1.0])?;
//! let mut rng = StdRng::seed_from_u64(7);
//! let one = table.sample_index(&mut rng);          // usize
//! let batch = table.sample((32, 5), &mut rng)?;    // Array2<usize>
//! let big = table.sample_par((4096, 5), 7)?;       // same, on rayon
//! ```
//!
//! ## Quick start (loss)
//!
//! ```rust,ignore
//! use ndarray::Array2;
//! use negsampling::{NegativeSamplingConfig, NegativeSamplingLoss};
//!
//! let config = NegativeSamplingConfig {
//!     embedding_dim: 64,
//!     n_negatives: 5,
//!     ignore_index: Some(0),
//!     ..Default::default()
//! };
//! let loss = NegativeSamplingLoss::new(&counts, config, &mut rng)?;
//! let contexts = Array2::<f32>::zeros((targets.len(), 64));
//! let value = loss.forward(&targets, contexts.view(), &mut rng)?;
//! ```
//!
//! ## Performance
//! * **Build**: O(n log n), dominated by sorting items by probability.
//! * **Sample**: O(1) per draw (1 random number, 1 branch).
//! * **Space**: 3 vectors of length `n` (f64 + 2 × usize).
//!
//! ## Gotchas
//! * Weights must be **non-negative** and not all zero; `NaN`/∞ are rejected.
//! * This is for *fixed* distributions. If weights change, rebuild the table.
//! * Negatives are drawn with replacement and may coincide with the positive.
//! * Embeddings start at zero unless [`Init`] says otherwise.
//!
//! ## Logging
//! Construction emits `tracing` events at `debug` (and `warn` when a rounding
//! remainder lands on item 0). No subscriber is installed here.

mod embedding;
mod error;
mod loss;
mod walker;

pub use embedding::{EmbeddingTable, Init};
pub use error::{LossError, ProbError, SampleError};
pub use loss::{Gradients, NegativeSamplingConfig, NegativeSamplingLoss, log_sigmoid, softplus};
pub use walker::{AliasTable, DEFAULT_TOLERANCE};

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn smoke_end_to_end() {
        let mut rng = StdRng::seed_from_u64(0);
        let counts = [0.0, 120.0, 40.0, 9.0, 3.0, 1.0];
        let config = NegativeSamplingConfig {
            embedding_dim: 8,
            n_negatives: 4,
            ignore_index: Some(0),
            ..Default::default()
        };
        let loss = NegativeSamplingLoss::new(&counts, config, &mut rng).unwrap();
        let contexts = Array2::from_elem((3, 8), 0.1f32);
        let value = loss.forward(&[1, 2, 5], contexts.view(), &mut rng).unwrap();
        assert!(value.is_finite() && value > 0.0);
    }
}
