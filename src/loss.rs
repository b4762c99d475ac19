//! Negative-sampling loss.
//!
//! For a target `t` with context vector `c` and negatives `n_1..n_K` drawn
//! from the smoothed unigram distribution:
//!
//! ```text
//! L = -( log σ(e_t · c) + Σ_k log σ(-e_{n_k} · c) )
//! ```
//!
//! summed over the batch. Negatives are drawn with replacement and are not
//! filtered against the positive.

use ndarray::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::{EmbeddingTable, Init};
use crate::error::LossError;
use crate::walker::AliasTable;

/// `ln(1 + e^x)` without overflow for large `x` or underflow for small.
#[inline]
pub fn softplus(x: f32) -> f32 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// `ln σ(x)`, computed as `-softplus(-x)`.
#[inline]
pub fn log_sigmoid(x: f32) -> f32 {
    -softplus(-x)
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Construction parameters for [`NegativeSamplingLoss`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegativeSamplingConfig {
    pub embedding_dim: usize,
    /// Negatives drawn per target. Must be at least 1.
    pub n_negatives: usize,
    /// Exponent applied to raw frequencies before building the sampler.
    pub power: f64,
    /// Vocabulary slot (e.g. padding) pinned to zero and never drawn.
    pub ignore_index: Option<usize>,
    pub init: Init,
}

impl Default for NegativeSamplingConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 100,
            n_negatives: 5,
            power: 0.75,
            ignore_index: None,
            init: Init::Zeros,
        }
    }
}

impl NegativeSamplingConfig {
    pub fn validate(&self, vocab: usize) -> Result<(), LossError> {
        if self.n_negatives == 0 {
            return Err(LossError::NoNegatives);
        }
        if self.embedding_dim == 0 {
            return Err(LossError::ZeroEmbeddingDim);
        }
        if !self.power.is_finite() {
            return Err(LossError::NonFinitePower(self.power));
        }
        if let Some(index) = self.ignore_index.filter(|&i| i >= vocab) {
            return Err(LossError::IgnoreIndexOutOfRange { index, vocab });
        }
        Ok(())
    }
}

/// Loss value plus gradients with respect to every input of the formula.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub loss: f32,
    /// Same shape as the embedding table; the ignore row is zero.
    pub embedding: Array2<f32>,
    /// `(batch, dim)`, one row per context vector.
    pub context: Array2<f32>,
}

#[derive(Debug, Clone)]
pub struct NegativeSamplingLoss {
    config: NegativeSamplingConfig,
    embeddings: EmbeddingTable,
    sampler: AliasTable,
}

impl NegativeSamplingLoss {
    /// Build the embedding table and a sampler over `frequency[i] ^ power`.
    ///
    /// The ignore index gets zero sampling weight.
    pub fn new<R: Rng + ?Sized>(
        frequencies: &[f64],
        config: NegativeSamplingConfig,
        rng: &mut R,
    ) -> Result<Self, LossError> {
        let vocab = frequencies.len();
        config.validate(vocab)?;

        let mut weights: Vec<f64> = frequencies.iter().map(|f| f.powf(config.power)).collect();
        if let Some(i) = config.ignore_index {
            weights[i] = 0.0;
        }
        let sampler = AliasTable::new(&weights)?;
        let embeddings = EmbeddingTable::new(
            vocab,
            config.embedding_dim,
            config.ignore_index,
            &config.init,
            rng,
        )?;

        debug!(
            vocab,
            dim = config.embedding_dim,
            n_negatives = config.n_negatives,
            power = config.power,
            "negative sampling loss ready"
        );
        Ok(Self {
            config,
            embeddings,
            sampler,
        })
    }

    pub fn config(&self) -> &NegativeSamplingConfig {
        &self.config
    }

    pub fn sampler(&self) -> &AliasTable {
        &self.sampler
    }

    pub fn embeddings(&self) -> &EmbeddingTable {
        &self.embeddings
    }

    pub fn embeddings_mut(&mut self) -> &mut EmbeddingTable {
        &mut self.embeddings
    }

    /// Draw a `(batch, n_negatives)` matrix of negative indices.
    pub fn draw_negatives<R: Rng + ?Sized>(
        &self,
        batch: usize,
        rng: &mut R,
    ) -> Result<Array2<usize>, LossError> {
        Ok(self.sampler.sample((batch, self.config.n_negatives), rng)?)
    }

    /// Total loss for a batch, drawing fresh negatives from `rng`.
    ///
    /// `contexts` is `(batch, dim)`, row `b` paired with `targets[b]`.
    pub fn forward<R: Rng + ?Sized>(
        &self,
        targets: &[usize],
        contexts: ArrayView2<'_, f32>,
        rng: &mut R,
    ) -> Result<f32, LossError> {
        self.check_batch(targets, contexts)?;
        if targets.is_empty() {
            return Ok(0.0);
        }
        let negatives = self.draw_negatives(targets.len(), rng)?;
        self.loss_with_negatives(targets, contexts, negatives.view())
    }

    /// Total loss for a batch with a given negative set.
    pub fn loss_with_negatives(
        &self,
        targets: &[usize],
        contexts: ArrayView2<'_, f32>,
        negatives: ArrayView2<'_, usize>,
    ) -> Result<f32, LossError> {
        self.check_batch(targets, contexts)?;
        self.check_negatives(targets.len(), negatives)?;

        let mut total = 0.0f64;
        for (b, (&t, ctx)) in targets.iter().zip(contexts.rows()).enumerate() {
            let pos = self.embeddings.row(t).dot(&ctx);
            total += f64::from(log_sigmoid(pos));
            for &n in negatives.row(b) {
                let neg = -self.embeddings.row(n).dot(&ctx);
                total += f64::from(log_sigmoid(neg));
            }
        }
        // `+ 0.0` turns the empty batch's -0.0 into 0.0.
        Ok(-total as f32 + 0.0)
    }

    /// Loss and analytic gradients for a batch with a given negative set.
    ///
    /// With `s⁺ = e_t · c` and `s⁻ = e_n · c`:
    /// `∂L/∂e_t = -σ(-s⁺) c`, `∂L/∂e_n = σ(s⁻) c`, and `∂L/∂c` collects the
    /// matching terms. Repeated indices accumulate.
    pub fn backward(
        &self,
        targets: &[usize],
        contexts: ArrayView2<'_, f32>,
        negatives: ArrayView2<'_, usize>,
    ) -> Result<Gradients, LossError> {
        self.check_batch(targets, contexts)?;
        self.check_negatives(targets.len(), negatives)?;

        let mut embedding = Array2::<f32>::zeros(self.embeddings.weights().raw_dim());
        let mut context = Array2::<f32>::zeros(contexts.raw_dim());
        let mut total = 0.0f64;

        for (b, (&t, ctx)) in targets.iter().zip(contexts.rows()).enumerate() {
            let e_t = self.embeddings.row(t);
            let pos = e_t.dot(&ctx);
            total += f64::from(log_sigmoid(pos));
            let g = -sigmoid(-pos);
            embedding.row_mut(t).scaled_add(g, &ctx);
            context.row_mut(b).scaled_add(g, &e_t);

            for &n in negatives.row(b) {
                let e_n = self.embeddings.row(n);
                let neg = e_n.dot(&ctx);
                total += f64::from(log_sigmoid(-neg));
                let g = sigmoid(neg);
                embedding.row_mut(n).scaled_add(g, &ctx);
                context.row_mut(b).scaled_add(g, &e_n);
            }
        }

        if let Some(i) = self.embeddings.ignore_index() {
            embedding.row_mut(i).fill(0.0);
        }
        Ok(Gradients {
            loss: -total as f32 + 0.0,
            embedding,
            context,
        })
    }

    fn check_batch(&self, targets: &[usize], contexts: ArrayView2<'_, f32>) -> Result<(), LossError> {
        let (rows, dim) = contexts.dim();
        if rows != targets.len() {
            return Err(LossError::BatchMismatch {
                targets: targets.len(),
                contexts: rows,
            });
        }
        if dim != self.config.embedding_dim {
            return Err(LossError::ContextDim {
                expected: self.config.embedding_dim,
                found: dim,
            });
        }
        self.embeddings.check_indices(targets)
    }

    fn check_negatives(&self, batch: usize, negatives: ArrayView2<'_, usize>) -> Result<(), LossError> {
        if negatives.dim() != (batch, self.config.n_negatives) {
            return Err(LossError::NegativesShape {
                batch,
                n_negatives: self.config.n_negatives,
                found: negatives.shape().to_vec(),
            });
        }
        let vocab = self.embeddings.vocab();
        match negatives.iter().find(|&&n| n >= vocab) {
            Some(&index) => Err(LossError::TargetOutOfRange { index, vocab }),
            None => Ok(()),
        }
    }
}
