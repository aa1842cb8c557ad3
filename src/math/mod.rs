//! Mathematical functions and routines.
//!
//! Besides the floating point shorthand macros used throughout the crate, this
//! module provides the weighted first and second moment estimators that back
//! the density estimation routines, and the numerically stable log-sum-exp
//! used to combine mixture components.

mod stats;

pub use stats::{ln_sum_exp, mean_with_weights, variance_with_weights};

/// A shorthand for converting constants to type `T`.
macro_rules! T {
    ($value: expr) => {
        T::from_f64($value).unwrap()
    };
}

macro_rules! abs {
    ($value: expr) => {
        num_traits::Float::abs($value)
    };
}

macro_rules! exp {
    ($value: expr) => {
        num_traits::Float::exp($value)
    };
}

macro_rules! ln {
    ($value: expr) => {
        num_traits::Float::ln($value)
    };
}

macro_rules! powf {
    ($value: expr, $float: expr) => {
        num_traits::Float::powf($value, $float)
    };
}

macro_rules! powi {
    ($value: expr, $integer: expr) => {
        num_traits::Float::powi($value, $integer)
    };
}

macro_rules! sqrt {
    ($value: expr) => {
        num_traits::Float::sqrt($value)
    };
}

pub(crate) use T;
pub(crate) use abs;
pub(crate) use exp;
pub(crate) use ln;
pub(crate) use powf;
pub(crate) use powi;
pub(crate) use sqrt;
