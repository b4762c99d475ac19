//! Dense embedding table with a pinned "ignore" row.

use ndarray::prelude::*;
use rand::Rng;
use rand::distr::{Distribution, Uniform};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::error::LossError;

/// How trainable rows are filled at construction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Init {
    /// Every row starts at zero.
    #[default]
    Zeros,
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std: f32 },
}

/// `vocab x dim` matrix of embeddings. Row `ignore_index`, if any, is
/// always zero and is skipped by [`sgd_step`](Self::sgd_step).
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    weights: Array2<f32>,
    ignore_index: Option<usize>,
}

impl EmbeddingTable {
    /// Build a `vocab x dim` table filled according to `init`.
    ///
    /// # Errors
    /// * [`LossError::ZeroEmbeddingDim`] if `dim` is zero.
    /// * [`LossError::IgnoreIndexOutOfRange`] if `ignore_index >= vocab`.
    /// * [`LossError::InvalidInit`] if the initializer's parameters are
    ///   rejected (empty uniform range, negative or non-finite std).
    pub fn new<R: Rng + ?Sized>(
        vocab: usize,
        dim: usize,
        ignore_index: Option<usize>,
        init: &Init,
        rng: &mut R,
    ) -> Result<Self, LossError> {
        if dim == 0 {
            return Err(LossError::ZeroEmbeddingDim);
        }
        if let Some(index) = ignore_index.filter(|&i| i >= vocab) {
            return Err(LossError::IgnoreIndexOutOfRange { index, vocab });
        }

        let mut weights = match *init {
            Init::Zeros => Array2::zeros((vocab, dim)),
            Init::Uniform { low, high } => {
                let dist = Uniform::new(low, high)
                    .map_err(|e| LossError::InvalidInit(e.to_string()))?;
                Array2::from_shape_simple_fn((vocab, dim), || dist.sample(rng))
            }
            Init::Normal { mean, std } => {
                let dist =
                    Normal::new(mean, std).map_err(|e| LossError::InvalidInit(e.to_string()))?;
                Array2::from_shape_simple_fn((vocab, dim), || dist.sample(rng))
            }
        };
        if let Some(i) = ignore_index {
            weights.row_mut(i).fill(0.0);
        }
        Ok(Self {
            weights,
            ignore_index,
        })
    }

    /// Number of rows.
    pub fn vocab(&self) -> usize {
        self.weights.nrows()
    }

    /// Length of each row.
    pub fn dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn ignore_index(&self) -> Option<usize> {
        self.ignore_index
    }

    /// The whole `vocab x dim` matrix.
    pub fn weights(&self) -> ArrayView2<'_, f32> {
        self.weights.view()
    }

    /// Panics if `index` is out of range; [`lookup`](Self::lookup) is the
    /// checked path.
    pub(crate) fn row(&self, index: usize) -> ArrayView1<'_, f32> {
        self.weights.row(index)
    }

    /// Gather rows into a `(indices.len(), dim)` matrix.
    ///
    /// # Errors
    /// [`LossError::TargetOutOfRange`] for the first index `>= vocab`.
    pub fn lookup(&self, indices: &[usize]) -> Result<Array2<f32>, LossError> {
        self.check_indices(indices)?;
        Ok(self.weights.select(Axis(0), indices))
    }

    pub(crate) fn check_indices(&self, indices: &[usize]) -> Result<(), LossError> {
        let vocab = self.vocab();
        match indices.iter().find(|&&i| i >= vocab) {
            Some(&index) => Err(LossError::TargetOutOfRange { index, vocab }),
            None => Ok(()),
        }
    }

    /// `weights -= lr * grad`, leaving the ignore row at zero.
    ///
    /// # Errors
    /// [`LossError::GradientShape`] if `grad` does not have the table's
    /// shape; the table is left untouched.
    pub fn sgd_step(&mut self, grad: ArrayView2<'_, f32>, lr: f32) -> Result<(), LossError> {
        if grad.dim() != self.weights.dim() {
            return Err(LossError::GradientShape {
                expected: self.weights.dim(),
                found: grad.dim(),
            });
        }
        self.weights.scaled_add(-lr, &grad);
        if let Some(i) = self.ignore_index {
            self.weights.row_mut(i).fill(0.0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn zeros_by_default() {
        let mut rng = StdRng::seed_from_u64(0);
        let table = EmbeddingTable::new(6, 4, Some(0), &Init::default(), &mut rng).unwrap();
        assert_eq!(table.weights().dim(), (6, 4));
        assert!(table.weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn random_init_keeps_ignore_row_zero() {
        let mut rng = StdRng::seed_from_u64(0);
        let init = Init::Normal {
            mean: 0.0,
            std: 1.0,
        };
        let table = EmbeddingTable::new(5, 3, Some(2), &init, &mut rng).unwrap();
        assert!(table.row(2).iter().all(|&w| w == 0.0));
        assert!(table.row(1).iter().any(|&w| w != 0.0));

        let init = Init::Uniform {
            low: -0.5,
            high: 0.5,
        };
        let table = EmbeddingTable::new(5, 3, Some(4), &init, &mut rng).unwrap();
        assert!(table.row(4).iter().all(|&w| w == 0.0));
        assert!(
            table
                .weights()
                .iter()
                .all(|&w| (-0.5..0.5).contains(&w))
        );
    }

    #[test]
    fn rejects_bad_configuration() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            EmbeddingTable::new(4, 0, None, &Init::Zeros, &mut rng),
            Err(LossError::ZeroEmbeddingDim)
        ));
        assert!(matches!(
            EmbeddingTable::new(4, 2, Some(4), &Init::Zeros, &mut rng),
            Err(LossError::IgnoreIndexOutOfRange { index: 4, vocab: 4 })
        ));
        let init = Init::Uniform {
            low: 1.0,
            high: 0.0,
        };
        assert!(matches!(
            EmbeddingTable::new(4, 2, None, &init, &mut rng),
            Err(LossError::InvalidInit(_))
        ));
    }

    #[test]
    fn lookup_gathers_rows() {
        let mut rng = StdRng::seed_from_u64(5);
        let init = Init::Normal {
            mean: 0.0,
            std: 1.0,
        };
        let table = EmbeddingTable::new(4, 3, None, &init, &mut rng).unwrap();
        let rows = table.lookup(&[3, 1, 3]).unwrap();
        assert_eq!(rows.row(0), table.row(3));
        assert_eq!(rows.row(1), table.row(1));
        assert_eq!(rows.row(2), table.row(3));
        assert!(matches!(
            table.lookup(&[0, 4]),
            Err(LossError::TargetOutOfRange { index: 4, vocab: 4 })
        ));
    }

    #[test]
    fn sgd_step_skips_ignore_row() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut table = EmbeddingTable::new(3, 2, Some(1), &Init::Zeros, &mut rng).unwrap();
        let grad = Array2::from_elem((3, 2), 1.0f32);
        table.sgd_step(grad.view(), 0.5).unwrap();
        assert_eq!(table.row(0), aview1(&[-0.5f32, -0.5]));
        assert_eq!(table.row(1), aview1(&[0.0f32, 0.0]));
        assert_eq!(table.row(2), aview1(&[-0.5f32, -0.5]));
    }

    #[test]
    fn sgd_step_rejects_wrong_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut table = EmbeddingTable::new(3, 2, None, &Init::Zeros, &mut rng).unwrap();
        let grad = Array2::from_elem((2, 2), 1.0f32);
        assert!(matches!(
            table.sgd_step(grad.view(), 0.5),
            Err(LossError::GradientShape {
                expected: (3, 2),
                found: (2, 2)
            })
        ));
        assert!(table.weights().iter().all(|&w| w == 0.0));
    }
}
