use crate::{
    density::{Density, DensityError},
    fXX,
};
use rand::Rng;

/// A density defined by a user supplied log-probability function.
///
/// The function is taken as a plain function pointer so that the density stays
/// cheap to copy. Neither sampling nor estimation are implemented; scoring
/// delegates directly to the wrapped function. This type is not serializable.
#[derive(Clone, Copy, Debug)]
pub struct LambdaDensity<T> {
    log_probability: fn(T) -> T,
    frozen: bool,
}

impl<T> LambdaDensity<T>
where
    T: fXX,
{
    /// Create a new [`LambdaDensity`] from a log-probability function.
    pub fn new(log_probability: fn(T) -> T) -> Self {
        Self {
            log_probability,
            frozen: false,
        }
    }
}

impl<T> Density<T> for LambdaDensity<T>
where
    T: fXX,
{
    type Obs = T;

    fn name(&self) -> &'static str {
        "LambdaDensity"
    }

    fn log_probability(&self, x: &T) -> T {
        (self.log_probability)(*x)
    }

    fn sample(&self, _rng: &mut impl Rng) -> Result<T, DensityError<T>> {
        Err(DensityError::UnsupportedSample { name: self.name() })
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

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn neg_abs(x: f64) -> f64 {
        -x.abs()
    }

    #[test]
    fn test_lambda_delegates_scoring() {
        let pdf = LambdaDensity::new(neg_abs);

        assert!(pdf.log_probability(&2.5) == -2.5);
        assert!(pdf.log_probability(&-4.0) == -4.0);
    }

    #[test]
    fn test_lambda_unsupported_operations() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let mut pdf = LambdaDensity::new(neg_abs);

        assert!(matches!(
            pdf.sample(&mut rng),
            Err(DensityError::UnsupportedSample { .. })
        ));
        assert!(matches!(
            pdf.fit(&[1.0, 2.0], None, 0.0),
            Err(DensityError::UnsupportedFit { .. })
        ));

        // Freezing silences estimation without enabling it.
        pdf.freeze();
        pdf.fit(&[1.0, 2.0], None, 0.0).unwrap();
        assert!(pdf.log_probability(&1.0) == -1.0);
    }
}
