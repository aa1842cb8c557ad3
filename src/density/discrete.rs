use crate::{
    density::{filter_weighted, Density, DensityError},
    fXX,
    math::ln,
};
use rand::Rng;
use rand_distr::{uniform::SampleUniform, Uniform};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Debug, mem};

/// A categorical density over an arbitrary set of ordered labels.
///
/// Category probabilities are normalized to unit sum at construction and at
/// every commit. Unseen categories score negative infinity.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DiscreteDensity<K, T>
where
    K: Ord,
{
    probabilities: BTreeMap<K, T>,
    frozen: bool,
    counts: BTreeMap<K, T>,
    count_total: T,
}

impl<K, T> DiscreteDensity<K, T>
where
    K: Clone + Debug + Ord + Send + Sync,
    T: fXX,
{
    /// Create a new [`DiscreteDensity`] from per-category weights.
    ///
    /// The weights are normalized to unit sum; negative entries and
    /// non-normalizable totals are rejected.
    pub fn new(weights: BTreeMap<K, T>) -> Result<Self, DensityError<T>> {
        if weights.is_empty() {
            return Err(DensityError::EmptySupport {
                name: "DiscreteDensity",
            });
        }

        if let Some(value) = weights.values().find(|weight| **weight < T::zero()) {
            return Err(DensityError::NegativeWeight {
                name: "DiscreteDensity",
                value: *value,
            });
        }

        let total = weights.values().sum::<T>();

        if !(total > T::zero()) || !num_traits::Float::is_finite(total) {
            return Err(DensityError::InvalidWeights {
                name: "DiscreteDensity",
                total,
            });
        }

        let probabilities = weights
            .into_iter()
            .map(|(category, weight)| (category, weight / total))
            .collect();

        Ok(Self {
            probabilities,
            frozen: false,
            counts: BTreeMap::new(),
            count_total: T::zero(),
        })
    }

    /// Returns the probability of a category, or zero for unseen categories.
    pub fn probability(&self, category: &K) -> T {
        self.probabilities
            .get(category)
            .copied()
            .unwrap_or(T::zero())
    }

    /// Returns the normalized category probabilities.
    pub fn probabilities(&self) -> &BTreeMap<K, T> {
        &self.probabilities
    }
}

impl<K, T> Density<T> for DiscreteDensity<K, T>
where
    K: Clone + Debug + Ord + Send + Sync,
    T: fXX + SampleUniform,
{
    type Obs = K;

    fn name(&self) -> &'static str {
        "DiscreteDensity"
    }

    fn log_probability(&self, x: &K) -> T {
        match self.probabilities.get(x) {
            Some(probability) => ln!(*probability),
            None => T::neg_infinity(),
        }
    }

    fn sample(&self, rng: &mut impl Rng) -> Result<K, DensityError<T>> {
        let uniform = Uniform::new(T::zero(), T::one()).unwrap();
        let wdx: T = rng.sample(uniform);

        // Here we abuse try_fold to return the category early wrapped within Err().
        match self
            .probabilities
            .iter()
            .try_fold(T::zero(), |acc, (category, weight)| {
                let next_weight = acc + *weight;
                if wdx < next_weight {
                    Err(category)
                } else {
                    Ok(next_weight)
                }
            }) {
            // The map is never empty, so falling through selects the last category.
            Ok(_) => Ok(self.probabilities.keys().next_back().cloned().unwrap()),
            Err(category) => Ok(category.clone()),
        }
    }

    fn summarize(&mut self, items: &[K], weights: Option<&[T]>) -> Result<(), DensityError<T>> {
        if self.frozen {
            return Ok(());
        }

        let batch = filter_weighted(self.name(), items, weights)?;

        for (category, weight) in batch {
            *self
                .counts
                .entry(category.clone())
                .or_insert_with(T::zero) += weight;
            self.count_total += weight;
        }

        Ok(())
    }

    fn fit_from_summaries(&mut self, inertia: T) -> Result<(), DensityError<T>> {
        if self.frozen || !(self.count_total > T::zero()) {
            return Ok(());
        }

        let counts = mem::take(&mut self.counts);
        let total = mem::replace(&mut self.count_total, T::zero());

        // Blend entrywise over the union of the previous and the observed
        // category sets; categories absent from the batch decay by inertia.
        let mut updated = self
            .probabilities
            .iter()
            .map(|(category, probability)| (category.clone(), inertia * *probability))
            .collect::<BTreeMap<K, T>>();

        for (category, count) in counts {
            *updated.entry(category).or_insert_with(T::zero) +=
                (T::one() - inertia) * count / total;
        }

        self.probabilities = updated;

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

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn coin() -> DiscreteDensity<char, f64> {
        DiscreteDensity::new(BTreeMap::from([('A', 0.5), ('B', 0.5)])).unwrap()
    }

    #[test]
    fn test_discrete_log_probability() {
        let pdf = coin();

        assert!((pdf.log_probability(&'A') - 0.5_f64.ln()).abs() < 1e-12);
        assert!(pdf.log_probability(&'C') == f64::NEG_INFINITY);
    }

    #[test]
    fn test_discrete_normalizes_at_construction() {
        let pdf = DiscreteDensity::new(BTreeMap::from([('x', 2.0_f64), ('y', 6.0)])).unwrap();

        assert!(pdf.probability(&'x') == 0.25);
        assert!(pdf.probability(&'y') == 0.75);
        assert!(pdf.probability(&'z') == 0.0);
    }

    #[test]
    fn test_discrete_validation() {
        assert!(matches!(
            DiscreteDensity::<char, f64>::new(BTreeMap::new()),
            Err(DensityError::EmptySupport { .. })
        ));
        assert!(matches!(
            DiscreteDensity::new(BTreeMap::from([('a', -0.5_f64), ('b', 1.5)])),
            Err(DensityError::NegativeWeight { .. })
        ));
        assert!(matches!(
            DiscreteDensity::new(BTreeMap::from([('a', 0.0_f64), ('b', 0.0)])),
            Err(DensityError::InvalidWeights { .. })
        ));
    }

    #[test]
    fn test_discrete_sampling_frequencies() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(29);
        let pdf = coin();

        let mut hits = 0_usize;
        for _ in 0..100_000 {
            if pdf.sample(&mut rng).unwrap() == 'A' {
                hits += 1;
            }
        }

        let frequency = hits as f64 / 100_000.0;
        assert!((frequency - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_discrete_fit() {
        let mut pdf = coin();

        pdf.fit(&['A', 'A', 'B'], None, 0.0).unwrap();

        assert!((pdf.probability(&'A') - 2.0 / 3.0).abs() < 1e-12);
        assert!((pdf.probability(&'B') - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_discrete_inertia_blends_the_union() {
        let mut pdf = coin();

        // All mass on a new category; the previous ones decay by inertia.
        pdf.fit(&['C', 'C'], None, 0.5).unwrap();

        assert!((pdf.probability(&'A') - 0.25).abs() < 1e-12);
        assert!((pdf.probability(&'B') - 0.25).abs() < 1e-12);
        assert!((pdf.probability(&'C') - 0.5).abs() < 1e-12);

        let total = pdf.probabilities().values().sum::<f64>();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_discrete_batched_equals_direct() {
        let mut batched = coin();
        batched.summarize(&['A', 'B', 'B'], None).unwrap();
        batched.summarize(&['B'], Some(&[3.0])).unwrap();
        batched.fit_from_summaries(0.0).unwrap();

        let mut direct = coin();
        direct
            .fit(&['A', 'B', 'B', 'B'], Some(&[1.0, 1.0, 1.0, 3.0]), 0.0)
            .unwrap();

        assert!((batched.probability(&'A') - direct.probability(&'A')).abs() < 1e-12);
        assert!((batched.probability(&'B') - direct.probability(&'B')).abs() < 1e-12);
    }

    #[test]
    fn test_discrete_freeze() {
        let mut pdf = coin();

        pdf.freeze();
        pdf.fit(&['A', 'A', 'A'], None, 0.0).unwrap();

        assert!(pdf.probability(&'A') == 0.5);
    }
}
