use crate::{
    density::{Density, DensityError, Univariate},
    fXX,
};
use derive_more::{Deref, DerefMut};
use nalgebra::SVector;
use rand::Rng;
use rand_distr::{uniform::SampleUniform, Distribution, Exp1, Open01, StandardNormal, StandardUniform};
use serde::{Deserialize, Serialize};

/// A joint density over fixed-length observations, composed of `D`
/// independent univariate component densities.
///
/// Estimation slices the observations into per-dimension columns and
/// delegates to each component on its own, so the dimensions never couple.
/// Scoring sums the per-component scores, each scaled by an optional
/// dimension weight (a relative factor that is deliberately not normalized).
/// The type dereferences to its component array.
#[derive(Clone, Debug, Deref, DerefMut, Deserialize, Serialize)]
pub struct MultivariateDensity<T, const D: usize>
where
    T: fXX,
{
    #[deref]
    #[deref_mut]
    #[serde(with = "serde_arrays")]
    #[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
    components: [Univariate<T>; D],
    weights: SVector<T, D>,
    frozen: bool,
}

impl<T, const D: usize> MultivariateDensity<T, D>
where
    T: fXX,
{
    /// Create a new [`MultivariateDensity`] with unit dimension weights.
    pub fn new(components: [Univariate<T>; D]) -> Self {
        Self {
            components,
            weights: SVector::repeat(T::one()),
            frozen: false,
        }
    }

    /// Create a new [`MultivariateDensity`] with per-dimension scoring
    /// weights.
    pub fn with_weights(
        components: [Univariate<T>; D],
        weights: [T; D],
    ) -> Result<Self, DensityError<T>> {
        if let Some(value) = weights.iter().find(|weight| **weight < T::zero()) {
            return Err(DensityError::NegativeWeight {
                name: "MultivariateDensity",
                value: *value,
            });
        }

        Ok(Self {
            components,
            weights: SVector::from(weights),
            frozen: false,
        })
    }

    /// Returns the per-dimension scoring weights.
    pub fn dimension_weights(&self) -> &SVector<T, D> {
        &self.weights
    }
}

impl<T, const D: usize> Density<T> for MultivariateDensity<T, D>
where
    T: fXX + SampleUniform,
    StandardNormal: Distribution<T>,
    Exp1: Distribution<T>,
    Open01: Distribution<T>,
    StandardUniform: Distribution<T>,
{
    type Obs = SVector<T, D>;

    fn name(&self) -> &'static str {
        "MultivariateDensity"
    }

    fn log_probability(&self, x: &SVector<T, D>) -> T {
        self.components
            .iter()
            .zip(self.weights.iter())
            .zip(x.iter())
            .map(|((component, weight), value)| {
                // Zero-weight dimensions are skipped entirely, so an excluded
                // component cannot poison the total with 0 * -inf.
                if *weight == T::zero() {
                    T::zero()
                } else {
                    *weight * component.log_probability(value)
                }
            })
            .sum::<T>()
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<SVector<T, D>, DensityError<T>> {
        let mut sample = [T::zero(); D];

        sample
            .iter_mut()
            .zip(self.components.iter())
            .try_for_each(|(value, component)| {
                *value = component.sample(rng)?;

                Ok(())
            })?;

        Ok(SVector::from(sample))
    }

    fn summarize(
        &mut self,
        items: &[SVector<T, D>],
        weights: Option<&[T]>,
    ) -> Result<(), DensityError<T>> {
        if self.frozen {
            return Ok(());
        }

        for (dim, component) in self.components.iter_mut().enumerate() {
            let column = items.iter().map(|item| item[dim]).collect::<Vec<T>>();

            component.summarize(&column, weights)?;
        }

        Ok(())
    }

    fn fit_from_summaries(&mut self, inertia: T) -> Result<(), DensityError<T>> {
        if self.frozen {
            return Ok(());
        }

        for component in self.components.iter_mut() {
            component.fit_from_summaries(inertia)?;
        }

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
