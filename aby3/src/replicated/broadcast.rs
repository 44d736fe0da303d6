//! Axis-aligned broadcasting of share tensors and the matching gradient
//! reduction.
//!
//! The lower-rank operand is aligned with the higher-rank one starting at
//! dimension `axis`, or against the trailing dimensions when no axis is
//! given. Aligned dimensions must match or be 1.

use super::RepTensor;
use crate::error::{Error, Result};

/// Pads `small` with ones to the rank of `big`, placing it at `axis`.
pub fn aligned_shape(big: &[usize], small: &[usize], axis: Option<usize>) -> Result<Vec<usize>> {
    if small.len() > big.len() {
        return Err(Error::ShapeMismatch(format!(
            "cannot align shape {:?} with lower-rank shape {:?}",
            small, big
        )));
    }
    // the axis only places operands of lower rank
    let offset = if small.len() == big.len() {
        0
    } else {
        axis.unwrap_or(big.len() - small.len())
    };
    if offset + small.len() > big.len() {
        return Err(Error::ShapeMismatch(format!(
            "axis {} is out of range when aligning {:?} with {:?}",
            offset, small, big
        )));
    }

    let mut aligned = vec![1; big.len()];
    aligned[offset..offset + small.len()].copy_from_slice(small);
    for (a, b) in aligned.iter().zip(big) {
        if a != b && *a != 1 && *b != 1 {
            return Err(Error::ShapeMismatch(format!(
                "shapes {:?} and {:?} are not broadcastable at axis {}",
                big, small, offset
            )));
        }
    }
    Ok(aligned)
}

/// Output shape of a broadcasting binary operation.
pub fn broadcast_shape(x: &[usize], y: &[usize], axis: Option<usize>) -> Result<Vec<usize>> {
    let (big, small) = if x.len() >= y.len() { (x, y) } else { (y, x) };
    let aligned = aligned_shape(big, small, axis)?;
    Ok(big
        .iter()
        .zip(aligned.iter())
        .map(|(b, a)| if *b == 1 { *a } else { *b })
        .collect())
}

fn expand(x: &RepTensor, shape: &[usize], axis: Option<usize>) -> Result<RepTensor> {
    if x.shape() == shape {
        return Ok(x.clone());
    }
    let aligned = aligned_shape(shape, x.shape(), axis)?;
    x.try_map(|s| s.reshape(&aligned)?.broadcast_to(shape))
}

/// Broadcasts both operands to their common shape.
pub(crate) fn broadcast_pair(
    x: &RepTensor,
    y: &RepTensor,
    axis: Option<usize>,
) -> Result<(RepTensor, RepTensor)> {
    let shape = broadcast_shape(x.shape(), y.shape(), axis)?;
    Ok((expand(x, &shape, axis)?, expand(y, &shape, axis)?))
}

/// Sums `grad` over every dimension along which an operand of `shape` was
/// broadcast, returning a tensor of exactly `shape`.
pub fn reduce_to_shape(grad: &RepTensor, shape: &[usize], axis: Option<usize>) -> Result<RepTensor> {
    if grad.shape() == shape {
        return Ok(grad.clone());
    }
    let aligned = aligned_shape(grad.shape(), shape, axis)?;
    let mut reduced = grad.clone();
    for (i, (a, g)) in aligned.iter().zip(grad.shape()).enumerate() {
        if *a == 1 && *g != 1 {
            reduced = reduced.try_map(|s| Ok(s.sum_keep_axis(i)))?;
        }
    }
    if reduced.shape() != aligned.as_slice() {
        return Err(Error::ShapeMismatch(format!(
            "gradient of shape {:?} cannot be reduced to {:?}",
            grad.shape(),
            shape
        )));
    }
    reduced.try_map(|s| s.reshape(shape))
}
