//! Fixed-point encoding of real values into the ring.

use crate::ring::Ring64Tensor;
use ndarray::prelude::*;

pub fn scaling_factor(fractional_precision: u32) -> u64 {
    1_u64 << fractional_precision
}

pub fn fixedpoint_encode<D: Dimension>(x: &ArrayView<f64, D>, fractional_precision: u32) -> Ring64Tensor {
    let factor = scaling_factor(fractional_precision) as f64;
    let x_upshifted = x.mapv(|el| (el * factor).round() as i64);
    Ring64Tensor::from_signed(x_upshifted)
}

pub fn fixedpoint_decode(x: &Ring64Tensor, fractional_precision: u32) -> ArrayD<f64> {
    let factor = scaling_factor(fractional_precision) as f64;
    x.to_signed().mapv(|el| el as f64 / factor)
}
