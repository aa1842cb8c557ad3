use crate::{
    density::{normalized_weights, pick_index, Density, DensityError, Univariate},
    fXX,
    math::{ln, ln_sum_exp},
};
use rand::Rng;
use rand_distr::{uniform::SampleUniform, Distribution, Exp1, Open01, StandardNormal, StandardUniform};
use serde::{Deserialize, Serialize};

/// A weighted combination of alternative densities over the same variable.
///
/// Scoring combines the components through a numerically stable log-sum-exp;
/// sampling first selects a component by weight and then delegates. No
/// estimation rule is implemented for mixtures: re-estimating the component
/// responsibilities would require an expectation-maximization loop, which is
/// deliberately out of scope.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MixtureDensity<T> {
    components: Vec<Univariate<T>>,
    weights: Vec<T>,
    frozen: bool,
}

impl<T> MixtureDensity<T>
where
    T: fXX,
{
    /// Create a new [`Univariate`] mixture from components and optional
    /// component weights.
    ///
    /// Weights are normalized to unit sum and default to uniform.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        components: Vec<Univariate<T>>,
        weights: Option<&[T]>,
    ) -> Result<Univariate<T>, DensityError<T>> {
        if components.is_empty() {
            return Err(DensityError::EmptySupport {
                name: "MixtureDensity",
            });
        }

        let weights = match weights {
            Some(weights) => {
                if weights.len() != components.len() {
                    return Err(DensityError::WeightCount {
                        name: "MixtureDensity",
                        expected: components.len(),
                        found: weights.len(),
                    });
                }

                normalized_weights("MixtureDensity", weights)?
            }
            None => {
                let share = T::one() / T::from_usize(components.len()).unwrap();

                vec![share; components.len()]
            }
        };

        Ok(Univariate::Mixture(Self {
            components,
            weights,
            frozen: false,
        }))
    }

    /// Returns the mixture components.
    pub fn components(&self) -> &[Univariate<T>] {
        &self.components
    }

    /// Returns the normalized component weights.
    pub fn weights(&self) -> &[T] {
        &self.weights
    }
}

impl<T> Density<T> for MixtureDensity<T>
where
    T: fXX + SampleUniform,
    StandardNormal: Distribution<T>,
    Exp1: Distribution<T>,
    Open01: Distribution<T>,
    StandardUniform: Distribution<T>,
{
    type Obs = T;

    fn name(&self) -> &'static str {
        "MixtureDensity"
    }

    fn log_probability(&self, x: &T) -> T {
        let scores = self
            .components
            .iter()
            .zip(self.weights.iter())
            .map(|(component, weight)| ln!(*weight) + component.log_probability(x))
            .collect::<Vec<T>>();

        ln_sum_exp(&scores)
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<T, DensityError<T>> {
        let component = &self.components[pick_index(&self.weights, rng)];

        component.sample(rng)
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
