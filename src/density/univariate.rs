use crate::{
    density::{filter_weighted, Density, DensityError, Univariate},
    fXX,
    math::{abs, exp, ln, mean_with_weights, powf, powi, sqrt, variance_with_weights, T},
};
use rand::Rng;
use rand_distr::{
    uniform::SampleUniform, Distribution, Exp, Exp1, LogNormal, Normal, Open01, StandardNormal,
    Uniform,
};
use serde::{Deserialize, Serialize};

/// The width of the neighborhood around a point mass that still scores a
/// log-probability of zero.
const POINT_MASS_EPS: f64 = 1e-9;

/// A uniform density over the closed interval `[lower, upper]`.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct UniformDensity<T> {
    lower: T,
    upper: T,
    frozen: bool,
    summary: Option<(T, T)>,
}

impl<T> UniformDensity<T>
where
    T: fXX,
{
    /// Create a new [`Univariate`] uniform density over `[lower, upper]`.
    ///
    /// Degenerate bounds are rejected here; a point mass can still arise from
    /// estimation over a constant sample and is handled by the scoring rule.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(lower: T, upper: T) -> Result<Univariate<T>, DensityError<T>> {
        if lower >= upper {
            return Err(DensityError::InvalidRange {
                name: "UniformDensity",
                minv: lower,
                maxv: upper,
            });
        }

        Ok(Univariate::Uniform(Self {
            lower,
            upper,
            frozen: false,
            summary: None,
        }))
    }

    /// Returns the interval bounds.
    pub fn bounds(&self) -> (T, T) {
        (self.lower, self.upper)
    }
}

impl<T> Density<T> for UniformDensity<T>
where
    T: fXX + SampleUniform,
{
    type Obs = T;

    fn name(&self) -> &'static str {
        "UniformDensity"
    }

    fn log_probability(&self, x: &T) -> T {
        if self.lower == self.upper {
            if *x == self.lower {
                T::zero()
            } else {
                T::neg_infinity()
            }
        } else if (self.lower <= *x) && (*x <= self.upper) {
            -ln!(self.upper - self.lower)
        } else {
            T::neg_infinity()
        }
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<T, DensityError<T>> {
        // lower <= upper is guaranteed by the constructor and by every commit.
        let uniform = Uniform::new_inclusive(self.lower, self.upper).unwrap();

        Ok(rng.sample(uniform))
    }

    fn summarize(&mut self, items: &[T], weights: Option<&[T]>) -> Result<(), DensityError<T>> {
        if self.frozen {
            return Ok(());
        }

        let batch = filter_weighted(self.name(), items, weights)?;

        if batch.is_empty() {
            return Ok(());
        }

        let (mut lower, mut upper) = self
            .summary
            .unwrap_or((T::infinity(), T::neg_infinity()));

        for (value, _) in batch {
            if *value < lower {
                lower = *value;
            }

            if *value > upper {
                upper = *value;
            }
        }

        self.summary = Some((lower, upper));

        Ok(())
    }

    fn fit_from_summaries(&mut self, inertia: T) -> Result<(), DensityError<T>> {
        if self.frozen {
            return Ok(());
        }

        let (lower, upper) = match self.summary.take() {
            Some(summary) => summary,
            None => return Ok(()),
        };

        self.lower = inertia * self.lower + (T::one() - inertia) * lower;
        self.upper = inertia * self.upper + (T::one() - inertia) * upper;

        Ok(())
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn thaw(&mut self) {
        self.frozen = false;
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// Sufficient statistics of a single summarized batch for the (log-)normal
/// densities.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub(crate) struct NormalSummary<T> {
    mean: T,
    variance: T,
    weight: T,
}

/// Merges per-batch moments into a combined mean and standard deviation using
/// the parallel variance rule, flooring the deviation at `min_std`.
fn merge_normal_summaries<T>(summaries: &[NormalSummary<T>], min_std: T) -> (T, T)
where
    T: fXX,
{
    let total = summaries.iter().map(|summary| summary.weight).sum::<T>();

    let mean = summaries
        .iter()
        .map(|summary| summary.mean * summary.weight)
        .sum::<T>()
        / total;

    let mean_sq = summaries
        .iter()
        .map(|summary| (summary.variance + powi!(summary.mean, 2)) * summary.weight)
        .sum::<T>()
        / total;

    let mut variance = mean_sq - powi!(mean, 2);

    if variance < T::zero() {
        variance = T::zero();
    }

    let std_dev = sqrt!(variance);

    (mean, if std_dev < min_std { min_std } else { std_dev })
}

/// Condenses a weighted batch into a [`NormalSummary`].
fn summarize_normal_batch<T>(values: &[T], weights: &[T]) -> NormalSummary<T>
where
    T: fXX,
{
    NormalSummary {
        mean: mean_with_weights(values, weights),
        variance: variance_with_weights(values, weights),
        weight: weights.iter().sum::<T>(),
    }
}

/// A normal density with a given mean and standard deviation.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NormalDensity<T> {
    mean: T,
    std_dev: T,
    min_std: T,
    frozen: bool,
    summaries: Vec<NormalSummary<T>>,
}

impl<T> NormalDensity<T>
where
    T: fXX,
{
    /// Create a new [`Univariate`] normal density.
    ///
    /// A zero standard deviation describes a point mass at the mean.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(mean: T, std_dev: T) -> Result<Univariate<T>, DensityError<T>> {
        Self::with_min_std(mean, std_dev, T!(0.01))
    }

    /// Create a new [`Univariate`] normal density with a custom floor for the
    /// standard deviation, applied whenever parameters are re-estimated.
    #[allow(clippy::new_ret_no_self)]
    pub fn with_min_std(mean: T, std_dev: T, min_std: T) -> Result<Univariate<T>, DensityError<T>> {
        if std_dev < T::zero() {
            return Err(DensityError::InvalidScale {
                name: "NormalDensity",
                value: std_dev,
            });
        }

        if min_std < T::zero() {
            return Err(DensityError::InvalidScale {
                name: "NormalDensity",
                value: min_std,
            });
        }

        Ok(Univariate::Normal(Self {
            mean,
            std_dev,
            min_std,
            frozen: false,
            summaries: Vec::new(),
        }))
    }

    /// Returns the mean.
    pub fn mean(&self) -> T {
        self.mean
    }

    /// Returns the standard deviation.
    pub fn std_dev(&self) -> T {
        self.std_dev
    }

    /// Returns the standard deviation floor applied at estimation time.
    pub fn min_std(&self) -> T {
        self.min_std
    }
}

impl<T> Density<T> for NormalDensity<T>
where
    T: fXX,
    StandardNormal: Distribution<T>,
{
    type Obs = T;

    fn name(&self) -> &'static str {
        "NormalDensity"
    }

    fn log_probability(&self, x: &T) -> T {
        if self.std_dev == T::zero() {
            return if abs!(*x - self.mean) < T!(POINT_MASS_EPS) {
                T::zero()
            } else {
                T::neg_infinity()
            };
        }

        -T!(0.5) * ln!(T::two_pi())
            - ln!(self.std_dev)
            - powi!(*x - self.mean, 2) / (T!(2.0) * powi!(self.std_dev, 2))
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<T, DensityError<T>> {
        // std_dev >= 0 is guaranteed by the constructor and by every commit.
        let normal = Normal::new(self.mean, self.std_dev).unwrap();

        Ok(rng.sample(normal))
    }

    fn summarize(&mut self, items: &[T], weights: Option<&[T]>) -> Result<(), DensityError<T>> {
        if self.frozen {
            return Ok(());
        }

        let batch = filter_weighted(self.name(), items, weights)?;

        if batch.is_empty() {
            return Ok(());
        }

        let values = batch.iter().map(|(value, _)| **value).collect::<Vec<T>>();
        let weights = batch.iter().map(|(_, weight)| *weight).collect::<Vec<T>>();

        self.summaries.push(summarize_normal_batch(&values, &weights));

        Ok(())
    }

    fn fit_from_summaries(&mut self, inertia: T) -> Result<(), DensityError<T>> {
        if self.frozen || self.summaries.is_empty() {
            return Ok(());
        }

        let (mean, std_dev) = merge_normal_summaries(&self.summaries, self.min_std);

        self.mean = inertia * self.mean + (T::one() - inertia) * mean;
        self.std_dev = inertia * self.std_dev + (T::one() - inertia) * std_dev;
        self.summaries.clear();

        Ok(())
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn thaw(&mut self) {
        self.frozen = false;
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// A density whose observation logarithms follow a normal density.
///
/// The support is the positive half line; estimation is performed on the
/// logarithms of the observations.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LogNormalDensity<T> {
    mean: T,
    std_dev: T,
    min_std: T,
    frozen: bool,
    summaries: Vec<NormalSummary<T>>,
}

impl<T> LogNormalDensity<T>
where
    T: fXX,
{
    /// Create a new [`Univariate`] log-normal density parameterized by the
    /// mean and standard deviation of the observation logarithms.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(mean: T, std_dev: T) -> Result<Univariate<T>, DensityError<T>> {
        Self::with_min_std(mean, std_dev, T!(0.01))
    }

    /// Create a new [`Univariate`] log-normal density with a custom floor for
    /// the standard deviation, applied whenever parameters are re-estimated.
    #[allow(clippy::new_ret_no_self)]
    pub fn with_min_std(mean: T, std_dev: T, min_std: T) -> Result<Univariate<T>, DensityError<T>> {
        if std_dev < T::zero() {
            return Err(DensityError::InvalidScale {
                name: "LogNormalDensity",
                value: std_dev,
            });
        }

        if min_std < T::zero() {
            return Err(DensityError::InvalidScale {
                name: "LogNormalDensity",
                value: min_std,
            });
        }

        Ok(Univariate::LogNormal(Self {
            mean,
            std_dev,
            min_std,
            frozen: false,
            summaries: Vec::new(),
        }))
    }

    /// Returns the mean of the observation logarithms.
    pub fn mean(&self) -> T {
        self.mean
    }

    /// Returns the standard deviation of the observation logarithms.
    pub fn std_dev(&self) -> T {
        self.std_dev
    }
}

impl<T> Density<T> for LogNormalDensity<T>
where
    T: fXX,
    StandardNormal: Distribution<T>,
{
    type Obs = T;

    fn name(&self) -> &'static str {
        "LogNormalDensity"
    }

    fn log_probability(&self, x: &T) -> T {
        if *x <= T::zero() {
            return T::neg_infinity();
        }

        let log_x = ln!(*x);

        if self.std_dev == T::zero() {
            return if abs!(log_x - self.mean) < T!(POINT_MASS_EPS) {
                T::zero()
            } else {
                T::neg_infinity()
            };
        }

        -T!(0.5) * ln!(T::two_pi())
            - ln!(self.std_dev)
            - log_x
            - powi!(log_x - self.mean, 2) / (T!(2.0) * powi!(self.std_dev, 2))
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<T, DensityError<T>> {
        // std_dev >= 0 is guaranteed by the constructor and by every commit.
        let log_normal = LogNormal::new(self.mean, self.std_dev).unwrap();

        Ok(rng.sample(log_normal))
    }

    fn summarize(&mut self, items: &[T], weights: Option<&[T]>) -> Result<(), DensityError<T>> {
        if self.frozen {
            return Ok(());
        }

        let batch = filter_weighted(self.name(), items, weights)?;

        if batch.is_empty() {
            return Ok(());
        }

        if let Some((value, _)) = batch.iter().find(|(value, _)| **value <= T::zero()) {
            return Err(DensityError::OutOfSupport {
                name: self.name(),
                value: **value,
            });
        }

        let values = batch
            .iter()
            .map(|(value, _)| ln!(**value))
            .collect::<Vec<T>>();
        let weights = batch.iter().map(|(_, weight)| *weight).collect::<Vec<T>>();

        self.summaries.push(summarize_normal_batch(&values, &weights));

        Ok(())
    }

    fn fit_from_summaries(&mut self, inertia: T) -> Result<(), DensityError<T>> {
        if self.frozen || self.summaries.is_empty() {
            return Ok(());
        }

        let (mean, std_dev) = merge_normal_summaries(&self.summaries, self.min_std);

        self.mean = inertia * self.mean + (T::one() - inertia) * mean;
        self.std_dev = inertia * self.std_dev + (T::one() - inertia) * std_dev;
        self.summaries.clear();

        Ok(())
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn thaw(&mut self) {
        self.frozen = false;
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// An exponential decay density over non-negative observations.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ExponentialDensity<T> {
    rate: T,
    frozen: bool,
    summary_weight: T,
    summary_total: T,
}

impl<T> ExponentialDensity<T>
where
    T: fXX,
{
    /// Create a new [`Univariate`] exponential density with the given decay
    /// rate.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(rate: T) -> Result<Univariate<T>, DensityError<T>> {
        if !(rate > T::zero()) || !num_traits::Float::is_finite(rate) {
            return Err(DensityError::InvalidScale {
                name: "ExponentialDensity",
                value: rate,
            });
        }

        Ok(Univariate::Exponential(Self {
            rate,
            frozen: false,
            summary_weight: T::zero(),
            summary_total: T::zero(),
        }))
    }

    /// Returns the decay rate.
    pub fn rate(&self) -> T {
        self.rate
    }
}

impl<T> Density<T> for ExponentialDensity<T>
where
    T: fXX,
    Exp1: Distribution<T>,
{
    type Obs = T;

    fn name(&self) -> &'static str {
        "ExponentialDensity"
    }

    fn log_probability(&self, x: &T) -> T {
        if *x < T::zero() {
            return T::neg_infinity();
        }

        ln!(self.rate) - self.rate * *x
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<T, DensityError<T>> {
        // rate > 0 is guaranteed by the constructor and by every commit.
        let exponential = Exp::new(self.rate).unwrap();

        Ok(rng.sample(exponential))
    }

    fn summarize(&mut self, items: &[T], weights: Option<&[T]>) -> Result<(), DensityError<T>> {
        if self.frozen {
            return Ok(());
        }

        let batch = filter_weighted(self.name(), items, weights)?;

        if let Some((value, _)) = batch.iter().find(|(value, _)| **value < T::zero()) {
            return Err(DensityError::OutOfSupport {
                name: self.name(),
                value: **value,
            });
        }

        for (value, weight) in batch {
            self.summary_weight += weight;
            self.summary_total += *value * weight;
        }

        Ok(())
    }

    fn fit_from_summaries(&mut self, inertia: T) -> Result<(), DensityError<T>> {
        if self.frozen || !(self.summary_weight > T::zero()) {
            return Ok(());
        }

        // An all-zero sample has no finite rate estimate; the previous rate
        // is retained.
        if self.summary_total > T::zero() {
            let rate = self.summary_weight / self.summary_total;

            self.rate = inertia * self.rate + (T::one() - inertia) * rate;
        }

        self.summary_weight = T::zero();
        self.summary_total = T::zero();

        Ok(())
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn thaw(&mut self) {
        self.frozen = false;
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// A generalized extreme value density, reducing to the Gumbel density for a
/// zero shape parameter.
///
/// Instances are constructed frozen: no estimation rule is implemented, and
/// thawing an instance turns estimation calls into errors rather than
/// parameter updates.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ExtremeValueDensity<T> {
    location: T,
    scale: T,
    shape: T,
    frozen: bool,
}

impl<T> ExtremeValueDensity<T>
where
    T: fXX,
{
    /// Create a new [`Univariate`] generalized extreme value density.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(location: T, scale: T, shape: T) -> Result<Univariate<T>, DensityError<T>> {
        if !(scale > T::zero()) {
            return Err(DensityError::InvalidScale {
                name: "ExtremeValueDensity",
                value: scale,
            });
        }

        Ok(Univariate::ExtremeValue(Self {
            location,
            scale,
            shape,
            frozen: true,
        }))
    }

    /// Returns the location parameter.
    pub fn location(&self) -> T {
        self.location
    }

    /// Returns the scale parameter.
    pub fn scale(&self) -> T {
        self.scale
    }

    /// Returns the shape parameter.
    pub fn shape(&self) -> T {
        self.shape
    }
}

impl<T> Density<T> for ExtremeValueDensity<T>
where
    T: fXX,
    Open01: Distribution<T>,
{
    type Obs = T;

    fn name(&self) -> &'static str {
        "ExtremeValueDensity"
    }

    fn log_probability(&self, x: &T) -> T {
        let z = (*x - self.location) / self.scale;

        if self.shape == T::zero() {
            -ln!(self.scale) - z - exp!(-z)
        } else {
            let m = T::one() + self.shape * z;

            if m <= T::zero() {
                return T::neg_infinity();
            }

            -ln!(self.scale) + (-T::one() - T::one() / self.shape) * ln!(m)
                - powf!(m, -T::one() / self.shape)
        }
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<T, DensityError<T>> {
        // Inverse transform sampling.
        let u: T = rng.sample(Open01);

        let sample = if self.shape == T::zero() {
            self.location - self.scale * ln!(-ln!(u))
        } else {
            self.location + self.scale * (powf!(-ln!(u), -self.shape) - T::one()) / self.shape
        };

        Ok(sample)
    }

    fn summarize(&mut self, _items: &[T], _weights: Option<&[T]>) -> Result<(), DensityError<T>> {
        if self.frozen {
            return Ok(());
        }

        Err(DensityError::UnsupportedFit { name: self.name() })
    }

    fn fit_from_summaries(&mut self, _inertia: T) -> Result<(), DensityError<T>> {
        // Nothing can accumulate, so a commit never has anything to apply.
        Ok(())
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn thaw(&mut self) {
        self.frozen = false;
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }
}
