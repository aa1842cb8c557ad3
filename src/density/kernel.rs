use crate::{
    density::{
        filter_weighted, normalized_weights, pick_index, Density, DensityError, Univariate,
    },
    fXX,
    math::{abs, exp, ln, powi, sqrt, T},
};
use itertools::zip_eq;
use log::warn;
use rand::Rng;
use rand_distr::{
    uniform::SampleUniform, Distribution, Normal, Open01, StandardNormal, StandardUniform,
    Triangular, Uniform,
};
use serde::{Deserialize, Serialize};
use std::mem;

/// Cloud sizes above this threshold report growth after an inertial commit.
const GROWTH_WARN_LEN: usize = 16_384;

/// Weighted point cloud storage shared by the kernel density estimators.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct PointCloud<T> {
    points: Vec<T>,
    weights: Vec<T>,
    bandwidth: T,
    frozen: bool,
    pending_points: Vec<T>,
    pending_weights: Vec<T>,
}

impl<T> PointCloud<T>
where
    T: fXX,
{
    fn new(
        name: &'static str,
        points: Vec<T>,
        bandwidth: T,
        weights: Option<&[T]>,
    ) -> Result<Self, DensityError<T>> {
        if points.is_empty() {
            return Err(DensityError::EmptySupport { name });
        }

        if !(bandwidth > T::zero()) || !num_traits::Float::is_finite(bandwidth) {
            return Err(DensityError::InvalidScale {
                name,
                value: bandwidth,
            });
        }

        let weights = match weights {
            Some(weights) => {
                if weights.len() != points.len() {
                    return Err(DensityError::WeightCount {
                        name,
                        expected: points.len(),
                        found: weights.len(),
                    });
                }

                normalized_weights(name, weights)?
            }
            None => {
                vec![T::one() / T::from_usize(points.len()).unwrap(); points.len()]
            }
        };

        Ok(Self {
            points,
            weights,
            bandwidth,
            frozen: false,
            pending_points: Vec::new(),
            pending_weights: Vec::new(),
        })
    }

    /// Log of the weighted kernel sum over all stored points.
    fn score(&self, x: T, kernel: impl Fn(T) -> T) -> T {
        let total = zip_eq(self.points.iter(), self.weights.iter())
            .map(|(point, weight)| *weight * kernel(abs!(x - *point)))
            .sum::<T>();

        ln!(total)
    }

    /// Selects a stored point by weight.
    fn pick(&self, rng: &mut impl Rng) -> T
    where
        T: SampleUniform,
    {
        self.points[pick_index(&self.weights, rng)]
    }

    fn accumulate(
        &mut self,
        name: &'static str,
        items: &[T],
        weights: Option<&[T]>,
    ) -> Result<(), DensityError<T>> {
        if self.frozen {
            return Ok(());
        }

        let batch = filter_weighted(name, items, weights)?;

        for (point, weight) in batch {
            self.pending_points.push(*point);
            self.pending_weights.push(weight);
        }

        Ok(())
    }

    fn commit(&mut self, name: &'static str, inertia: T) {
        if self.frozen || self.pending_points.is_empty() {
            return;
        }

        let points = mem::take(&mut self.pending_points);
        let raw_weights = mem::take(&mut self.pending_weights);

        // Zero weights were excluded during accumulation, so the total is
        // strictly positive.
        let total = raw_weights.iter().sum::<T>();

        if inertia == T::zero() {
            self.points = points;
            self.weights = raw_weights.iter().map(|weight| *weight / total).collect();
        } else {
            self.weights
                .iter_mut()
                .for_each(|weight| *weight *= inertia);
            self.points.extend(points);
            self.weights.extend(
                raw_weights
                    .iter()
                    .map(|weight| (T::one() - inertia) * *weight / total),
            );

            if self.points.len() >= GROWTH_WARN_LEN {
                warn!(
                    "{} point cloud has grown to {} entries under inertial re-estimation",
                    name,
                    self.points.len()
                );
            }
        }
    }
}

macro_rules! kernel_accessors {
    () => {
        /// Returns the stored points.
        pub fn points(&self) -> &[T] {
            &self.cloud.points
        }

        /// Returns the normalized point weights.
        pub fn weights(&self) -> &[T] {
            &self.cloud.weights
        }

        /// Returns the kernel bandwidth.
        pub fn bandwidth(&self) -> T {
            self.cloud.bandwidth
        }
    };
}

/// A kernel density estimate built from Gaussian kernels centered at a
/// weighted point cloud.
///
/// Re-estimating with a positive inertia concatenates the previous and the
/// new clouds, so the stored point set grows without bound under repeated
/// inertial updates. Growth is reported through [`log`] once the cloud
/// becomes large; bounding the cloud would change scoring output and is left
/// to the caller.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GaussianKernelDensity<T> {
    cloud: PointCloud<T>,
}

impl<T> GaussianKernelDensity<T>
where
    T: fXX,
{
    /// Create a new [`Univariate`] Gaussian kernel density estimate.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        points: Vec<T>,
        bandwidth: T,
        weights: Option<&[T]>,
    ) -> Result<Univariate<T>, DensityError<T>> {
        Ok(Univariate::GaussianKernel(Self {
            cloud: PointCloud::new("GaussianKernelDensity", points, bandwidth, weights)?,
        }))
    }

    kernel_accessors!();
}

impl<T> Density<T> for GaussianKernelDensity<T>
where
    T: fXX + SampleUniform,
    StandardNormal: Distribution<T>,
{
    type Obs = T;

    fn name(&self) -> &'static str {
        "GaussianKernelDensity"
    }

    fn log_probability(&self, x: &T) -> T {
        let bandwidth = self.cloud.bandwidth;
        let norm = bandwidth * sqrt!(T::two_pi());

        self.cloud.score(*x, |distance| {
            exp!(-powi!(distance / bandwidth, 2) / T!(2.0)) / norm
        })
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<T, DensityError<T>> {
        let point = self.cloud.pick(rng);

        // bandwidth > 0 is guaranteed by the constructor.
        let normal = Normal::new(point, self.cloud.bandwidth).unwrap();

        Ok(rng.sample(normal))
    }

    fn summarize(&mut self, items: &[T], weights: Option<&[T]>) -> Result<(), DensityError<T>> {
        self.cloud.accumulate(self.name(), items, weights)
    }

    fn fit_from_summaries(&mut self, inertia: T) -> Result<(), DensityError<T>> {
        self.cloud.commit(self.name(), inertia);

        Ok(())
    }

    fn freeze(&mut self) {
        self.cloud.frozen = true;
    }

    fn thaw(&mut self) {
        self.cloud.frozen = false;
    }

    fn is_frozen(&self) -> bool {
        self.cloud.frozen
    }
}

/// A kernel density estimate where every stored point contributes its full
/// weight within one bandwidth of the observation and nothing beyond it.
///
/// The growth behavior under inertial re-estimation matches
/// [`GaussianKernelDensity`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UniformKernelDensity<T> {
    cloud: PointCloud<T>,
}

impl<T> UniformKernelDensity<T>
where
    T: fXX,
{
    /// Create a new [`Univariate`] uniform kernel density estimate.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        points: Vec<T>,
        bandwidth: T,
        weights: Option<&[T]>,
    ) -> Result<Univariate<T>, DensityError<T>> {
        Ok(Univariate::UniformKernel(Self {
            cloud: PointCloud::new("UniformKernelDensity", points, bandwidth, weights)?,
        }))
    }

    kernel_accessors!();
}

impl<T> Density<T> for UniformKernelDensity<T>
where
    T: fXX + SampleUniform,
{
    type Obs = T;

    fn name(&self) -> &'static str {
        "UniformKernelDensity"
    }

    fn log_probability(&self, x: &T) -> T {
        let bandwidth = self.cloud.bandwidth;

        self.cloud.score(*x, |distance| {
            if distance <= bandwidth {
                T::one()
            } else {
                T::zero()
            }
        })
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<T, DensityError<T>> {
        let point = self.cloud.pick(rng);

        let uniform = Uniform::new_inclusive(
            point - self.cloud.bandwidth,
            point + self.cloud.bandwidth,
        )
        .unwrap();

        Ok(rng.sample(uniform))
    }

    fn summarize(&mut self, items: &[T], weights: Option<&[T]>) -> Result<(), DensityError<T>> {
        self.cloud.accumulate(self.name(), items, weights)
    }

    fn fit_from_summaries(&mut self, inertia: T) -> Result<(), DensityError<T>> {
        self.cloud.commit(self.name(), inertia);

        Ok(())
    }

    fn freeze(&mut self) {
        self.cloud.frozen = true;
    }

    fn thaw(&mut self) {
        self.cloud.frozen = false;
    }

    fn is_frozen(&self) -> bool {
        self.cloud.frozen
    }
}

/// A kernel density estimate where a stored point's contribution decays
/// linearly from the bandwidth down to zero with distance.
///
/// The growth behavior under inertial re-estimation matches
/// [`GaussianKernelDensity`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TriangleKernelDensity<T> {
    cloud: PointCloud<T>,
}

impl<T> TriangleKernelDensity<T>
where
    T: fXX,
{
    /// Create a new [`Univariate`] triangle kernel density estimate.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        points: Vec<T>,
        bandwidth: T,
        weights: Option<&[T]>,
    ) -> Result<Univariate<T>, DensityError<T>> {
        Ok(Univariate::TriangleKernel(Self {
            cloud: PointCloud::new("TriangleKernelDensity", points, bandwidth, weights)?,
        }))
    }

    kernel_accessors!();
}

impl<T> Density<T> for TriangleKernelDensity<T>
where
    T: fXX + SampleUniform,
    Open01: Distribution<T>,
    StandardUniform: Distribution<T>,
{
    type Obs = T;

    fn name(&self) -> &'static str {
        "TriangleKernelDensity"
    }

    fn log_probability(&self, x: &T) -> T {
        let bandwidth = self.cloud.bandwidth;

        self.cloud.score(*x, |distance| {
            if distance < bandwidth {
                bandwidth - distance
            } else {
                T::zero()
            }
        })
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<T, DensityError<T>> {
        let point = self.cloud.pick(rng);

        // The interval is non-degenerate since bandwidth > 0.
        let triangular = Triangular::new(
            point - self.cloud.bandwidth,
            point + self.cloud.bandwidth,
            point,
        )
        .unwrap();

        Ok(rng.sample(triangular))
    }

    fn summarize(&mut self, items: &[T], weights: Option<&[T]>) -> Result<(), DensityError<T>> {
        self.cloud.accumulate(self.name(), items, weights)
    }

    fn fit_from_summaries(&mut self, inertia: T) -> Result<(), DensityError<T>> {
        self.cloud.commit(self.name(), inertia);

        Ok(())
    }

    fn freeze(&mut self) {
        self.cloud.frozen = true;
    }

    fn thaw(&mut self) {
        self.cloud.frozen = false;
    }

    fn is_frozen(&self) -> bool {
        self.cloud.frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_gaussian_kernel_log_probability() {
        let pdf = GaussianKernelDensity::new(vec![0.0_f64, 1.0], 1.0, None).unwrap();

        let phi = |z: f64| (-z * z / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt();
        let expected = (0.5 * phi(0.0) + 0.5 * phi(1.0)).ln();

        assert!((pdf.log_probability(&0.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_kernel_log_probability() {
        let pdf = UniformKernelDensity::new(vec![0.0_f64, 2.0], 1.0, None).unwrap();

        // Only the point at zero lies within one bandwidth of 0.5.
        assert!((pdf.log_probability(&0.5) - 0.5_f64.ln()).abs() < 1e-12);

        // Both points contribute at 1.0.
        assert!(pdf.log_probability(&1.0).abs() < 1e-12);

        assert!(pdf.log_probability(&5.0) == f64::NEG_INFINITY);
    }

    #[test]
    fn test_triangle_kernel_log_probability() {
        let pdf = TriangleKernelDensity::new(vec![0.0_f64], 1.0, None).unwrap();

        assert!((pdf.log_probability(&0.5) - 0.5_f64.ln()).abs() < 1e-12);
        assert!(pdf.log_probability(&0.0).abs() < 1e-12);
        assert!(pdf.log_probability(&1.5) == f64::NEG_INFINITY);
    }

    #[test]
    fn test_kernel_weighted_scoring() {
        let pdf =
            UniformKernelDensity::new(vec![0.0_f64, 10.0], 1.0, Some(&[3.0, 1.0])).unwrap();

        assert!((pdf.log_probability(&0.0) - 0.75_f64.ln()).abs() < 1e-12);
        assert!((pdf.log_probability(&10.0) - 0.25_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_kernel_replacement_fit() {
        let mut pdf = GaussianKernelDensity::new(vec![0.0_f64, 1.0, 2.0], 0.5, None).unwrap();

        pdf.fit(&[5.0, 6.0, 7.0, 8.0, 9.0], None, 0.0).unwrap();

        match &pdf {
            Univariate::GaussianKernel(kernel) => {
                assert!(kernel.points() == [5.0, 6.0, 7.0, 8.0, 9.0]);
                assert!(kernel.weights().iter().all(|weight| *weight == 0.2));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_kernel_inertial_fit_concatenates() {
        let mut pdf = GaussianKernelDensity::new(vec![0.0_f64, 1.0], 0.5, None).unwrap();

        pdf.fit(&[5.0, 6.0, 7.0], None, 0.5).unwrap();

        match &pdf {
            Univariate::GaussianKernel(kernel) => {
                assert!(kernel.points() == [0.0, 1.0, 5.0, 6.0, 7.0]);

                let total = kernel.weights().iter().sum::<f64>();
                assert!((total - 1.0).abs() < 1e-12);

                // The previous cloud retains half of the mass.
                assert!((kernel.weights()[0] - 0.25).abs() < 1e-12);
                assert!((kernel.weights()[2] - 0.5 / 3.0).abs() < 1e-12);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_kernel_batched_equals_direct() {
        let mut batched = TriangleKernelDensity::new(vec![0.0_f64], 1.0, None).unwrap();
        batched.summarize(&[1.0, 2.0], None).unwrap();
        batched.summarize(&[3.0], Some(&[2.0])).unwrap();
        batched.fit_from_summaries(0.0).unwrap();

        let mut direct = TriangleKernelDensity::new(vec![0.0_f64], 1.0, None).unwrap();
        direct
            .fit(&[1.0, 2.0, 3.0], Some(&[1.0, 1.0, 2.0]), 0.0)
            .unwrap();

        match (&batched, &direct) {
            (Univariate::TriangleKernel(batched), Univariate::TriangleKernel(direct)) => {
                assert!(batched.points() == direct.points());
                assert!(batched.weights() == direct.weights());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_kernel_sampling_stays_near_the_cloud() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(41);

        let uniform = UniformKernelDensity::new(vec![0.0_f64, 4.0], 1.0, None).unwrap();
        for _ in 0..1_000 {
            let draw = uniform.sample(&mut rng).unwrap();
            assert!((-1.0..=1.0).contains(&draw) || (3.0..=5.0).contains(&draw));
        }

        let triangle = TriangleKernelDensity::new(vec![2.0_f64], 0.5, None).unwrap();
        for _ in 0..1_000 {
            let draw = triangle.sample(&mut rng).unwrap();
            assert!((1.5..=2.5).contains(&draw));
        }
    }

    #[test]
    fn test_kernel_validation() {
        assert!(matches!(
            GaussianKernelDensity::new(Vec::<f64>::new(), 1.0, None),
            Err(DensityError::EmptySupport { .. })
        ));
        assert!(matches!(
            GaussianKernelDensity::new(vec![1.0_f64], 0.0, None),
            Err(DensityError::InvalidScale { .. })
        ));
        assert!(matches!(
            UniformKernelDensity::new(vec![1.0_f64, 2.0], 1.0, Some(&[1.0])),
            Err(DensityError::WeightCount { .. })
        ));
        assert!(matches!(
            TriangleKernelDensity::new(vec![1.0_f64, 2.0], 1.0, Some(&[1.0, -1.0])),
            Err(DensityError::NegativeWeight { .. })
        ));
    }

    #[test]
    fn test_kernel_freeze() {
        let mut pdf = GaussianKernelDensity::new(vec![0.0_f64, 1.0], 1.0, None).unwrap();
        let before = pdf.log_probability(&0.3);

        pdf.freeze();
        pdf.fit(&[7.0, 8.0], None, 0.0).unwrap();

        assert!(pdf.log_probability(&0.3) == before);
    }
}
