//! Fittable probability density functions (PDFs).
//!
//! Every density implements the [`Density`] trait: score an observation with
//! [`Density::log_probability`], draw observations with [`Density::sample`],
//! and re-estimate parameters from weighted data either directly with
//! [`Density::fit`] or incrementally with [`Density::summarize`] followed by
//! [`Density::fit_from_summaries`].
//!
//! The scalar densities are wrapped by the [`Univariate`] algebraic data type:
//! - [`UniformDensity`] A uniform density over a closed interval.
//! - [`NormalDensity`] A normal density with a given mean and standard deviation.
//! - [`LogNormalDensity`] A normal density over the logarithm of the observations.
//! - [`ExponentialDensity`] An exponential decay density for non-negative observations.
//! - [`ExtremeValueDensity`] A generalized extreme value density (frozen by default).
//! - [`GaussianKernelDensity`], [`UniformKernelDensity`], [`TriangleKernelDensity`]
//!   Kernel estimators over a weighted point cloud.
//! - [`MixtureDensity`] A weighted combination of alternative densities over one variable.
//!
//! Densities with non-scalar observations implement the same trait as stand
//! alone types:
//! - [`DiscreteDensity`] A categorical density over arbitrary ordered labels.
//! - [`LambdaDensity`] A density defined by a user supplied log-probability function.
//! - [`MultivariateDensity`] Independent per-component densities over fixed-length observations.
//!
//! ```
//! # use denfit::density::{Density, MixtureDensity, NormalDensity, UniformDensity};
//! let pdf = MixtureDensity::new(
//!     vec![
//!         NormalDensity::new(0.0, 1.0).unwrap(),
//!         UniformDensity::new(-3.0, 3.0).unwrap(),
//!     ],
//!     Some(&[0.7, 0.3]),
//! )
//! .unwrap();
//!
//! assert!(pdf.log_probability(&0.5) > pdf.log_probability(&2.5));
//! ```

mod discrete;
mod kernel;
mod lambda;
mod mixture;
mod multivariate;
mod univariate;

pub use discrete::DiscreteDensity;
pub use kernel::{GaussianKernelDensity, TriangleKernelDensity, UniformKernelDensity};
pub use lambda::LambdaDensity;
pub use mixture::MixtureDensity;
pub use multivariate::MultivariateDensity;
pub use univariate::{
    ExponentialDensity, ExtremeValueDensity, LogNormalDensity, NormalDensity, UniformDensity,
};

use crate::fXX;
use itertools::zip_eq;
use rand::Rng;
use rand_distr::{
    uniform::SampleUniform, Distribution, Exp1, Open01, StandardNormal, StandardUniform, Uniform,
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// Errors associated with the [`density`](crate::density) module.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum DensityError<T> {
    #[error("invalid range {name} [{minv} - {maxv}]")]
    InvalidRange {
        name: &'static str,
        minv: T,
        maxv: T,
    },
    #[error("invalid scale {value} for {name}")]
    InvalidScale { name: &'static str, value: T },
    #[error("weights for {name} cannot be normalized (total {total})")]
    InvalidWeights { name: &'static str, total: T },
    #[error("negative weight {value} passed to {name}")]
    NegativeWeight { name: &'static str, value: T },
    #[error("{name} received {found} weights for {expected} observations")]
    WeightCount {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{name} requires at least one component")]
    EmptySupport { name: &'static str },
    #[error("observation {value} lies outside the support of {name}")]
    OutOfSupport { name: &'static str, value: T },
    #[error("estimation is not implemented for {name}")]
    UnsupportedFit { name: &'static str },
    #[error("sampling is not implemented for {name}")]
    UnsupportedSample { name: &'static str },
}

/// A trait that must be implemented by every density sharing the crate's
/// scoring, sampling and estimation contract.
///
/// Estimation is all-or-nothing per density: a failing call leaves both the
/// parameters and any accumulated statistics untouched. Cloning a density
/// yields a fully detached instance, composites included.
pub trait Density<T>
where
    T: fXX,
    Self: Clone + Debug + Send + Sync,
{
    /// The observation type scored by and drawn from this density.
    type Obs: Clone + Debug;

    /// A static tag identifying the density variant, also carried by error values.
    fn name(&self) -> &'static str;

    /// Evaluates the log-probability of a single observation with respect to
    /// the current parameters.
    ///
    /// Observations outside of the support evaluate to negative infinity.
    fn log_probability(&self, x: &Self::Obs) -> T;

    /// Draws a single observation from the current parameters.
    fn sample(&self, rng: &mut impl Rng) -> Result<Self::Obs, DensityError<T>>;

    /// Accumulates the sufficient statistics of a weighted batch without
    /// committing a parameter update.
    ///
    /// Repeated calls merge, so committing after N batches is equivalent to a
    /// single [`Density::fit`] over their concatenation. Observations with
    /// zero weight are excluded. Frozen densities ignore the call.
    fn summarize(
        &mut self,
        items: &[Self::Obs],
        weights: Option<&[T]>,
    ) -> Result<(), DensityError<T>>;

    /// Commits the accumulated sufficient statistics into the parameters and
    /// clears the accumulator.
    ///
    /// The committed parameters are blended with the previous values as
    /// `new = inertia * old + (1 - inertia) * estimate`. Calls without
    /// accumulated statistics, and calls on frozen densities, do nothing.
    fn fit_from_summaries(&mut self, inertia: T) -> Result<(), DensityError<T>>;

    /// Re-estimates the parameters from a weighted sample.
    ///
    /// Equivalent to [`Density::summarize`] followed by
    /// [`Density::fit_from_summaries`]; statistics accumulated by earlier
    /// `summarize` calls are folded into the same update. A sample that is
    /// empty after zero-weight exclusion leaves the parameters unchanged.
    fn fit(
        &mut self,
        items: &[Self::Obs],
        weights: Option<&[T]>,
        inertia: T,
    ) -> Result<(), DensityError<T>> {
        self.summarize(items, weights)?;
        self.fit_from_summaries(inertia)
    }

    /// Freezes the density, turning every estimation call into a silent no-op.
    fn freeze(&mut self);

    /// Re-enables estimation after a [`Density::freeze`].
    fn thaw(&mut self);

    /// Returns `true` if the density is frozen.
    fn is_frozen(&self) -> bool;
}

/// An algebraic data type that contains all densities over scalar observations.
#[allow(missing_docs)]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", content = "content")]
pub enum Univariate<T> {
    Uniform(UniformDensity<T>),
    Normal(NormalDensity<T>),
    LogNormal(LogNormalDensity<T>),
    Exponential(ExponentialDensity<T>),
    ExtremeValue(ExtremeValueDensity<T>),
    GaussianKernel(GaussianKernelDensity<T>),
    UniformKernel(UniformKernelDensity<T>),
    TriangleKernel(TriangleKernelDensity<T>),
    Mixture(MixtureDensity<T>),
}

impl<T> Density<T> for Univariate<T>
where
    T: fXX + SampleUniform,
    StandardNormal: Distribution<T>,
    Exp1: Distribution<T>,
    Open01: Distribution<T>,
    StandardUniform: Distribution<T>,
{
    type Obs = T;

    fn name(&self) -> &'static str {
        match self {
            Univariate::Uniform(pdf) => pdf.name(),
            Univariate::Normal(pdf) => pdf.name(),
            Univariate::LogNormal(pdf) => pdf.name(),
            Univariate::Exponential(pdf) => pdf.name(),
            Univariate::ExtremeValue(pdf) => pdf.name(),
            Univariate::GaussianKernel(pdf) => pdf.name(),
            Univariate::UniformKernel(pdf) => pdf.name(),
            Univariate::TriangleKernel(pdf) => pdf.name(),
            Univariate::Mixture(pdf) => pdf.name(),
        }
    }

    fn log_probability(&self, x: &T) -> T {
        match self {
            Univariate::Uniform(pdf) => pdf.log_probability(x),
            Univariate::Normal(pdf) => pdf.log_probability(x),
            Univariate::LogNormal(pdf) => pdf.log_probability(x),
            Univariate::Exponential(pdf) => pdf.log_probability(x),
            Univariate::ExtremeValue(pdf) => pdf.log_probability(x),
            Univariate::GaussianKernel(pdf) => pdf.log_probability(x),
            Univariate::UniformKernel(pdf) => pdf.log_probability(x),
            Univariate::TriangleKernel(pdf) => pdf.log_probability(x),
            Univariate::Mixture(pdf) => pdf.log_probability(x),
        }
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<T, DensityError<T>> {
        match self {
            Univariate::Uniform(pdf) => pdf.sample(rng),
            Univariate::Normal(pdf) => pdf.sample(rng),
            Univariate::LogNormal(pdf) => pdf.sample(rng),
            Univariate::Exponential(pdf) => pdf.sample(rng),
            Univariate::ExtremeValue(pdf) => pdf.sample(rng),
            Univariate::GaussianKernel(pdf) => pdf.sample(rng),
            Univariate::UniformKernel(pdf) => pdf.sample(rng),
            Univariate::TriangleKernel(pdf) => pdf.sample(rng),
            Univariate::Mixture(pdf) => pdf.sample(rng),
        }
    }

    fn summarize(&mut self, items: &[T], weights: Option<&[T]>) -> Result<(), DensityError<T>> {
        match self {
            Univariate::Uniform(pdf) => pdf.summarize(items, weights),
            Univariate::Normal(pdf) => pdf.summarize(items, weights),
            Univariate::LogNormal(pdf) => pdf.summarize(items, weights),
            Univariate::Exponential(pdf) => pdf.summarize(items, weights),
            Univariate::ExtremeValue(pdf) => pdf.summarize(items, weights),
            Univariate::GaussianKernel(pdf) => pdf.summarize(items, weights),
            Univariate::UniformKernel(pdf) => pdf.summarize(items, weights),
            Univariate::TriangleKernel(pdf) => pdf.summarize(items, weights),
            Univariate::Mixture(pdf) => pdf.summarize(items, weights),
        }
    }

    fn fit_from_summaries(&mut self, inertia: T) -> Result<(), DensityError<T>> {
        match self {
            Univariate::Uniform(pdf) => pdf.fit_from_summaries(inertia),
            Univariate::Normal(pdf) => pdf.fit_from_summaries(inertia),
            Univariate::LogNormal(pdf) => pdf.fit_from_summaries(inertia),
            Univariate::Exponential(pdf) => pdf.fit_from_summaries(inertia),
            Univariate::ExtremeValue(pdf) => pdf.fit_from_summaries(inertia),
            Univariate::GaussianKernel(pdf) => pdf.fit_from_summaries(inertia),
            Univariate::UniformKernel(pdf) => pdf.fit_from_summaries(inertia),
            Univariate::TriangleKernel(pdf) => pdf.fit_from_summaries(inertia),
            Univariate::Mixture(pdf) => pdf.fit_from_summaries(inertia),
        }
    }

    fn freeze(&mut self) {
        match self {
            Univariate::Uniform(pdf) => pdf.freeze(),
            Univariate::Normal(pdf) => pdf.freeze(),
            Univariate::LogNormal(pdf) => pdf.freeze(),
            Univariate::Exponential(pdf) => pdf.freeze(),
            Univariate::ExtremeValue(pdf) => pdf.freeze(),
            Univariate::GaussianKernel(pdf) => pdf.freeze(),
            Univariate::UniformKernel(pdf) => pdf.freeze(),
            Univariate::TriangleKernel(pdf) => pdf.freeze(),
            Univariate::Mixture(pdf) => pdf.freeze(),
        }
    }

    fn thaw(&mut self) {
        match self {
            Univariate::Uniform(pdf) => pdf.thaw(),
            Univariate::Normal(pdf) => pdf.thaw(),
            Univariate::LogNormal(pdf) => pdf.thaw(),
            Univariate::Exponential(pdf) => pdf.thaw(),
            Univariate::ExtremeValue(pdf) => pdf.thaw(),
            Univariate::GaussianKernel(pdf) => pdf.thaw(),
            Univariate::UniformKernel(pdf) => pdf.thaw(),
            Univariate::TriangleKernel(pdf) => pdf.thaw(),
            Univariate::Mixture(pdf) => pdf.thaw(),
        }
    }

    fn is_frozen(&self) -> bool {
        match self {
            Univariate::Uniform(pdf) => pdf.is_frozen(),
            Univariate::Normal(pdf) => pdf.is_frozen(),
            Univariate::LogNormal(pdf) => pdf.is_frozen(),
            Univariate::Exponential(pdf) => pdf.is_frozen(),
            Univariate::ExtremeValue(pdf) => pdf.is_frozen(),
            Univariate::GaussianKernel(pdf) => pdf.is_frozen(),
            Univariate::UniformKernel(pdf) => pdf.is_frozen(),
            Univariate::TriangleKernel(pdf) => pdf.is_frozen(),
            Univariate::Mixture(pdf) => pdf.is_frozen(),
        }
    }
}

/// Validates an optional weight vector against a batch of observations and
/// returns the (observation, weight) pairs that remain after zero-weight
/// exclusion. Missing weights default to one.
pub(crate) fn filter_weighted<'a, T, O>(
    name: &'static str,
    items: &'a [O],
    weights: Option<&[T]>,
) -> Result<Vec<(&'a O, T)>, DensityError<T>>
where
    T: fXX,
{
    match weights {
        Some(weights) => {
            if weights.len() != items.len() {
                return Err(DensityError::WeightCount {
                    name,
                    expected: items.len(),
                    found: weights.len(),
                });
            }

            if let Some(value) = weights.iter().find(|weight| **weight < T::zero()) {
                return Err(DensityError::NegativeWeight {
                    name,
                    value: *value,
                });
            }

            Ok(zip_eq(items.iter(), weights.iter())
                .filter(|(_, weight)| **weight > T::zero())
                .map(|(item, weight)| (item, *weight))
                .collect())
        }
        None => Ok(items.iter().map(|item| (item, T::one())).collect()),
    }
}

/// Normalizes a weight vector to unit sum, rejecting negative entries and
/// non-normalizable totals.
pub(crate) fn normalized_weights<T>(
    name: &'static str,
    weights: &[T],
) -> Result<Vec<T>, DensityError<T>>
where
    T: fXX,
{
    if let Some(value) = weights.iter().find(|weight| **weight < T::zero()) {
        return Err(DensityError::NegativeWeight {
            name,
            value: *value,
        });
    }

    let total = weights.iter().sum::<T>();

    if !(total > T::zero()) || !num_traits::Float::is_finite(total) {
        return Err(DensityError::InvalidWeights { name, total });
    }

    Ok(weights.iter().map(|weight| *weight / total).collect())
}

/// Selects an index from a normalized weight vector by scanning the cumulative
/// sum against a uniform draw.
pub(crate) fn pick_index<T>(weights: &[T], rng: &mut impl Rng) -> usize
where
    T: fXX + SampleUniform,
{
    let uniform = Uniform::new(T::zero(), T::one()).unwrap();
    let wdx: T = rng.sample(uniform);

    // Here we abuse try_fold to return the index early wrapped within Err().
    match weights
        .iter()
        .enumerate()
        .try_fold(T::zero(), |acc, (idx, weight)| {
            let next_weight = acc + *weight;
            if wdx < next_weight {
                Err(idx)
            } else {
                Ok(next_weight)
            }
        }) {
        Ok(_) => weights.len() - 1,
        Err(idx) => idx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_weighted() {
        let items = [1.0_f64, 2.0, 3.0];

        let pairs = filter_weighted("test", &items, Some(&[0.5, 0.0, 1.5])).unwrap();
        assert!(pairs.len() == 2);
        assert!(*pairs[0].0 == 1.0 && pairs[0].1 == 0.5);
        assert!(*pairs[1].0 == 3.0 && pairs[1].1 == 1.5);

        let unweighted = filter_weighted::<f64, f64>("test", &items, None).unwrap();
        assert!(unweighted.iter().all(|(_, weight)| *weight == 1.0));

        assert!(matches!(
            filter_weighted("test", &items, Some(&[1.0, 1.0])),
            Err(DensityError::WeightCount { .. })
        ));
        assert!(matches!(
            filter_weighted("test", &items, Some(&[1.0, -0.5, 1.0])),
            Err(DensityError::NegativeWeight { .. })
        ));
    }

    #[test]
    fn test_normalized_weights() {
        let normalized = normalized_weights("test", &[2.0_f64, 6.0]).unwrap();
        assert!(normalized[0] == 0.25 && normalized[1] == 0.75);

        assert!(matches!(
            normalized_weights("test", &[0.0_f64, 0.0]),
            Err(DensityError::InvalidWeights { .. })
        ));
        assert!(matches!(
            normalized_weights("test", &[1.0_f64, -1.0]),
            Err(DensityError::NegativeWeight { .. })
        ));
    }

    #[test]
    fn test_pick_index() {
        use rand::SeedableRng;
        use rand_xoshiro::Xoshiro256PlusPlus;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);

        // A degenerate weight vector always selects the same index.
        for _ in 0..100 {
            assert!(pick_index(&[0.0_f64, 1.0, 0.0], &mut rng) == 1);
        }

        let mut counts = [0_usize; 2];
        for _ in 0..10_000 {
            counts[pick_index(&[0.25_f64, 0.75], &mut rng)] += 1;
        }

        let share = counts[0] as f64 / 10_000.0;
        assert!((share - 0.25).abs() < 0.02);
    }

    #[test]
    fn test_univariate_serde_roundtrip() {
        let pdf: Univariate<f64> = NormalDensity::new(0.5, 2.0).unwrap();

        let encoded = serde_json::to_string(&pdf).unwrap();
        let decoded: Univariate<f64> = serde_json::from_str(&encoded).unwrap();

        for x in [-1.0, 0.5, 3.0] {
            assert!(pdf.log_probability(&x) == decoded.log_probability(&x));
        }
    }
}
