use crate::{
    fXX,
    math::{exp, ln, powi},
};
use itertools::zip_eq;

/// Computes the weighted mean over a slice.
///
/// The length of both iterators must be equal (panic).
pub fn mean_with_weights<'a, T, IV, IW>(x: IV, w: IW) -> T
where
    T: fXX,
    IV: IntoIterator<Item = &'a T>,
    IW: IntoIterator<Item = &'a T>,
    <IW as IntoIterator>::IntoIter: Clone,
{
    let w_iter = w.into_iter();

    let wsum = w_iter.clone().sum::<T>();

    zip_eq(x, w_iter)
        .map(|(val_x, val_w)| *val_x * *val_w)
        .sum::<T>()
        / wsum
}

/// Computes the weighted maximum likelihood (population) variance over a
/// slice using the `E[x²] - E[x]²` identity.
///
/// Negative results from floating point cancellation are clamped to zero.
/// The length of both iterators must be equal (panic).
pub fn variance_with_weights<'a, T, IV, IW>(x: IV, w: IW) -> T
where
    T: fXX,
    IV: IntoIterator<Item = &'a T>,
    IW: IntoIterator<Item = &'a T>,
    <IV as IntoIterator>::IntoIter: Clone,
    <IW as IntoIterator>::IntoIter: Clone,
{
    let x_iter = x.into_iter();
    let w_iter = w.into_iter();

    let wsum = w_iter.clone().sum::<T>();

    let mu = zip_eq(x_iter.clone(), w_iter.clone())
        .map(|(val_x, val_w)| *val_x * *val_w)
        .sum::<T>()
        / wsum;

    let mu_sq = zip_eq(x_iter, w_iter)
        .map(|(val_x, val_w)| powi!(*val_x, 2) * *val_w)
        .sum::<T>()
        / wsum;

    let variance = mu_sq - powi!(mu, 2);

    if variance < T::zero() {
        T::zero()
    } else {
        variance
    }
}

/// Computes `ln(Σ exp(vᵢ))` without overflowing for large magnitude inputs.
///
/// An empty slice and a slice of negative infinities both evaluate to
/// negative infinity.
pub fn ln_sum_exp<T>(values: &[T]) -> T
where
    T: fXX,
{
    let vmax = values
        .iter()
        .fold(T::neg_infinity(), |acc, value| if *value > acc { *value } else { acc });

    if !num_traits::Float::is_finite(vmax) {
        return vmax;
    }

    let total = values.iter().map(|value| exp!(*value - vmax)).sum::<T>();

    vmax + ln!(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::ulps_eq;

    #[test]
    fn test_mean_with_weights() {
        assert!(ulps_eq!(
            mean_with_weights(&[1.0_f64, 2.0, 3.0], &[1.0, 1.0, 1.0]),
            2.0
        ));
        assert!(ulps_eq!(
            mean_with_weights(&[1.0_f64, 2.0, 3.0], &[1.0, 2.0, 1.0]),
            2.0
        ));
        assert!(ulps_eq!(mean_with_weights(&[1.0_f64, 3.0], &[3.0, 1.0]), 1.5));
    }

    #[test]
    fn test_variance_with_weights() {
        assert!(ulps_eq!(
            variance_with_weights(&[1.0_f64, 2.0, 3.0], &[1.0, 2.0, 1.0]),
            0.5
        ));

        // A constant sample must clamp any cancellation residue to zero.
        assert!(variance_with_weights(&[5.0_f64, 5.0, 5.0], &[1.0, 2.5, 0.5]) == 0.0);
    }

    #[test]
    fn test_ln_sum_exp() {
        let values = [-1.5_f64, -0.5, -2.5];
        let direct = values.iter().map(|value| value.exp()).sum::<f64>().ln();

        assert!((ln_sum_exp(&values) - direct).abs() < 1e-12);

        // Large offsets must not overflow.
        let shifted = [1000.0_f64, 1000.0];
        assert!((ln_sum_exp(&shifted) - (1000.0 + 2.0_f64.ln())).abs() < 1e-9);

        assert!(ln_sum_exp::<f64>(&[]) == f64::NEG_INFINITY);
        assert!(ln_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]) == f64::NEG_INFINITY);
    }
}
