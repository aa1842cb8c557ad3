#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

pub mod density;
pub mod math;

use nalgebra::{RealField, Scalar};
use num_traits::{Float, FromPrimitive};
use std::{
    fmt::{Debug, Display},
    iter::Sum,
};

/// A trait that describes a generic floating point number within the **denfit** crate.
/// In practical terms this trait is only used for the f32/f64 types.
#[allow(non_camel_case_types)]
pub trait fXX:
    'static
    + Copy
    + Debug
    + Default
    + Display
    + Float
    + FromPrimitive
    + RealField
    + Scalar
    + Send
    + Sum
    + for<'x> Sum<&'x Self>
    + Sync
{
}

impl fXX for f32 {}
impl fXX for f64 {}
