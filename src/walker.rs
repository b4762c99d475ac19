//! Walker's Alias Method for O(1) sampling from a discrete distribution.
//!
//! Construction uses the "excess redistribution" variant: items are visited in
//! ascending order of probability, each one becomes the primary occupant of the
//! next free slot, and an item holding more than one slot's worth of mass first
//! pours its overflow into the secondary region of earlier, under-full slots.

use ndarray::{Array, Dimension, IntoDimension};
use rand::Rng;
use rand_pcg::Pcg64;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{ProbError, SampleError};

/// Largest per-item probability error accepted by [`AliasTable::new`].
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Draws generated per PCG stream in [`AliasTable::sample_par`].
const PAR_CHUNK: usize = 4096;

/// Alias table for discrete distribution sampling.
///
/// Slot `i` returns `primary[i]` when the fractional part of a draw falls
/// below `threshold[i]`, and `alias[i]` otherwise.
#[derive(Debug, Clone)]
pub struct AliasTable {
    threshold: Vec<f64>,
    primary: Vec<usize>,
    alias: Vec<usize>,
}

struct Slots {
    threshold: Vec<f64>,
    primary: Vec<usize>,
    alias: Vec<usize>,
    /// Slots whose secondary outcome was never claimed and fell back to item 0.
    defaulted: usize,
}

/// Lay out slots from `(scaled mass, item)` pairs sorted ascending.
///
/// `threshold.len()` is the low cursor (next slot to receive a primary) and
/// `alias.len()` the high cursor (next slot to receive a secondary). Aliases
/// are only ever assigned in slot order, so both arrays grow by push.
fn fill_slots(sorted: &[(f64, usize)]) -> Slots {
    let n = sorted.len();
    let mut threshold: Vec<f64> = Vec::with_capacity(n);
    let mut primary = Vec::with_capacity(n);
    let mut alias = Vec::with_capacity(n);

    for &(scaled, item) in sorted {
        let mut p = scaled;
        while p > 1.0 && alias.len() < threshold.len() {
            p -= 1.0 - threshold[alias.len()];
            alias.push(item);
        }
        threshold.push(p);
        primary.push(item);
    }

    let defaulted = n - alias.len();
    alias.resize(n, 0);
    Slots {
        threshold,
        primary,
        alias,
        defaulted,
    }
}

impl AliasTable {
    /// Construct an alias table from non-negative weights, checked against
    /// [`DEFAULT_TOLERANCE`]. O(n log n), dominated by the sort.
    pub fn new(weights: &[f64]) -> Result<Self, ProbError> {
        Self::with_tolerance(weights, DEFAULT_TOLERANCE)
    }

    /// Construct an alias table and verify that the distribution it encodes
    /// matches `weights / sum(weights)` to within `tolerance` for every item.
    ///
    /// # Errors
    /// * [`ProbError::InvalidTolerance`] if `tolerance` is negative or not finite.
    /// * [`ProbError::Empty`], [`ProbError::Negative`], [`ProbError::NonFinite`]
    ///   and [`ProbError::ZeroSum`] for bad weights.
    /// * [`ProbError::AliasOutOfRange`] and [`ProbError::MassMismatch`] if the
    ///   built table fails its post-construction checks.
    pub fn with_tolerance(weights: &[f64], tolerance: f64) -> Result<Self, ProbError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ProbError::InvalidTolerance(tolerance));
        }
        let n = weights.len();
        if n == 0 {
            return Err(ProbError::Empty);
        }

        let mut sum = 0.0f64;
        for (index, &value) in weights.iter().enumerate() {
            if !value.is_finite() {
                return Err(ProbError::NonFinite { index, value });
            }
            if value < 0.0 {
                return Err(ProbError::Negative { index, value });
            }
            sum += value;
        }
        if !sum.is_finite() || sum == 0.0 {
            return Err(ProbError::ZeroSum);
        }

        let probs: Vec<f64> = weights.iter().map(|&w| w / sum).collect();

        // Ties broken by index so the layout is reproducible.
        let mut sorted: Vec<(f64, usize)> = probs
            .iter()
            .enumerate()
            .map(|(i, &p)| (p * n as f64, i))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let slots = fill_slots(&sorted);

        let leaked = slots.threshold[n - slots.defaulted..]
            .iter()
            .filter(|&&t| t < 1.0 - tolerance)
            .count();
        if leaked > 0 {
            warn!(
                items = n,
                leaked, "alias slots with rounding-sized secondary mass defaulted to item 0"
            );
        }
        debug!(items = n, defaulted = slots.defaulted, "built alias table");

        let table = Self {
            threshold: slots.threshold,
            primary: slots.primary,
            alias: slots.alias,
        };
        table.check(&probs, tolerance)?;
        Ok(table)
    }

    fn check(&self, expected: &[f64], tolerance: f64) -> Result<(), ProbError> {
        let len = self.len();
        for (slot, (&primary, &alias)) in self.primary.iter().zip(&self.alias).enumerate() {
            for idx in [primary, alias] {
                if idx >= len {
                    return Err(ProbError::AliasOutOfRange {
                        slot,
                        alias: idx,
                        len,
                    });
                }
            }
        }

        for (item, (&actual, &expected)) in self.probabilities().iter().zip(expected).enumerate() {
            if (actual - expected).abs() > tolerance {
                return Err(ProbError::MassMismatch {
                    item,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// The distribution this table actually samples from.
    pub fn probabilities(&self) -> Vec<f64> {
        let n = self.len();
        let mut mass = vec![0.0f64; n];
        for slot in 0..n {
            let t = self.threshold[slot].clamp(0.0, 1.0);
            mass[self.primary[slot]] += t;
            mass[self.alias[slot]] += 1.0 - t;
        }
        for m in &mut mass {
            *m /= n as f64;
        }
        mass
    }

    /// Map a uniform draw `u` in `[0, 1)` to an item.
    #[inline]
    pub fn index_for(&self, u: f64) -> usize {
        let n = self.threshold.len();
        let scaled = u * n as f64;
        let slot = (scaled as usize).min(n - 1);
        if scaled - (slot as f64) < self.threshold[slot] {
            self.primary[slot]
        } else {
            self.alias[slot]
        }
    }

    /// Draw a single sample in O(1).
    #[inline]
    pub fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.index_for(rng.random())
    }

    /// Draw an array of independent samples with the given shape.
    ///
    /// ```rust,ignore
    /// let negatives = table.sample((batch, 5), &mut rng)?; // Array2<usize>
    /// ```
    pub fn sample<Sh, R>(&self, shape: Sh, rng: &mut R) -> Result<Array<usize, Sh::Dim>, SampleError>
    where
        Sh: IntoDimension,
        R: Rng + ?Sized,
    {
        let dim = self.check_shape(shape)?;
        Ok(Array::from_shape_simple_fn(dim, || self.sample_index(rng)))
    }

    /// Like [`sample`](Self::sample), but fills the array on the rayon pool.
    ///
    /// The output is split into fixed chunks, each drawn from its own PCG
    /// stream keyed by `(seed, chunk)`. The result depends only on `seed`
    /// and the shape, not on how many threads ran.
    pub fn sample_par<Sh>(&self, shape: Sh, seed: u64) -> Result<Array<usize, Sh::Dim>, SampleError>
    where
        Sh: IntoDimension,
    {
        let dim = self.check_shape(shape)?;
        let mut out = vec![0usize; dim.size()];
        out.par_chunks_mut(PAR_CHUNK)
            .enumerate()
            .for_each(|(chunk, draws)| {
                let mut rng = Pcg64::new(u128::from(seed), chunk as u128);
                for d in draws {
                    *d = self.sample_index(&mut rng);
                }
            });
        Ok(Array::from_shape_vec(dim, out)?)
    }

    fn check_shape<Sh: IntoDimension>(&self, shape: Sh) -> Result<Sh::Dim, SampleError> {
        if self.is_empty() {
            return Err(SampleError::EmptyTable);
        }
        let dim = shape.into_dimension();
        if dim.ndim() == 0 {
            return Err(SampleError::NoDimensions);
        }
        if let Some(axis) = dim.slice().iter().position(|&d| d == 0) {
            return Err(SampleError::ZeroAxis { axis });
        }
        Ok(dim)
    }

    /// Draw `draws` samples, returning counts per index (useful for checks).
    #[cfg(test)]
    pub fn sample_counts<R: Rng + ?Sized>(&self, rng: &mut R, draws: usize) -> Vec<usize> {
        let mut counts = vec![0usize; self.len()];
        for _ in 0..draws {
            counts[self.sample_index(rng)] += 1;
        }
        counts
    }

    /// Per-slot cut point: a draw whose fractional part falls below it
    /// returns the slot's primary item.
    pub fn thresholds(&self) -> &[f64] {
        &self.threshold
    }

    /// Item occupying each slot's primary region.
    pub fn primaries(&self) -> &[usize] {
        &self.primary
    }

    /// Item returned from each slot's secondary region.
    pub fn aliases(&self) -> &[usize] {
        &self.alias
    }

    pub fn len(&self) -> usize {
        self.threshold.len()
    }
    pub fn is_empty(&self) -> bool {
        self.threshold.is_empty()
    }
}
