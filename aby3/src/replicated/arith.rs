//! Elementwise arithmetic on replicated shares and the matching gradients.
//!
//! Addition and subtraction are local. Every multiplication costs exactly one
//! round in which each party sends a single message.

use super::broadcast::{broadcast_pair, broadcast_shape, reduce_to_shape};
use super::trunc::reshare_product;
use super::zero_share::zero_share;
use super::RepTensor;
use crate::context::Aby3Context;
use crate::error::{Error, Result};

fn check_same_shape(op: &str, x: &RepTensor, y: &RepTensor) -> Result<()> {
    if x.shape() != y.shape() {
        return Err(Error::ShapeMismatch(format!(
            "{} expects operands of equal shape, got {:?} and {:?}",
            op,
            x.shape(),
            y.shape()
        )));
    }
    Ok(())
}

fn check_gradient_shape(op: &str, dout: &RepTensor, shape: &[usize]) -> Result<()> {
    if dout.shape() != shape {
        return Err(Error::ShapeMismatch(format!(
            "{} expects an output gradient of shape {:?}, got {:?}",
            op,
            shape,
            dout.shape()
        )));
    }
    Ok(())
}

pub fn add(x: &RepTensor, y: &RepTensor, axis: Option<usize>) -> Result<RepTensor> {
    let (x, y) = broadcast_pair(x, y, axis)?;
    let RepTensor { shares: [x0, x1] } = &x;
    let RepTensor { shares: [y0, y1] } = &y;
    Ok(RepTensor {
        shares: [x0 + y0, x1 + y1],
    })
}

/// Gradients of [`add`] with respect to both operands.
pub fn add_grad(
    x: &RepTensor,
    y: &RepTensor,
    dout: &RepTensor,
    axis: Option<usize>,
) -> Result<(RepTensor, RepTensor)> {
    let shape = broadcast_shape(x.shape(), y.shape(), axis)?;
    check_gradient_shape("add_grad", dout, &shape)?;
    let dx = reduce_to_shape(dout, x.shape(), axis)?;
    let dy = reduce_to_shape(dout, y.shape(), axis)?;
    Ok((dx, dy))
}

pub fn sub(x: &RepTensor, y: &RepTensor) -> Result<RepTensor> {
    check_same_shape("sub", x, y)?;
    let RepTensor { shares: [x0, x1] } = x;
    let RepTensor { shares: [y0, y1] } = y;
    Ok(RepTensor {
        shares: [x0 - y0, x1 - y1],
    })
}

pub fn sub_grad(dout: &RepTensor) -> (RepTensor, RepTensor) {
    (dout.clone(), dout.neg())
}

/// Multiplies two sharings of equal shape.
///
/// Each party computes its 3-of-3 share of the product from the cross terms
/// it can see, masks it with a fresh zero-share and reshares it. With a
/// nonzero fractional precision the product is truncated on the way.
pub fn mul_with_same_dim(ctx: &Aby3Context, x: &RepTensor, y: &RepTensor) -> Result<RepTensor> {
    check_same_shape("mul_with_same_dim", x, y)?;
    ctx.check_usable()?;
    let RepTensor { shares: [x0, x1] } = x;
    let RepTensor { shares: [y0, y1] } = y;

    let v = &(&(x0 * y0) + &(x0 * y1)) + &(x1 * y0);
    let alpha = zero_share(ctx, v.shape())?;
    tracing::trace!("{} resharing product of shape {:?}", ctx.party(), v.shape());
    reshare_product(ctx, v + alpha)
}

pub fn mul(ctx: &Aby3Context, x: &RepTensor, y: &RepTensor, axis: Option<usize>) -> Result<RepTensor> {
    let (x, y) = broadcast_pair(x, y, axis)?;
    mul_with_same_dim(ctx, &x, &y)
}

/// Gradients of [`mul`]: `dx = dout * y` and `dy = dout * x`, each summed
/// back to its operand's shape. Computes `dx` before `dy`.
pub fn mul_grad(
    ctx: &Aby3Context,
    x: &RepTensor,
    y: &RepTensor,
    dout: &RepTensor,
    axis: Option<usize>,
) -> Result<(RepTensor, RepTensor)> {
    let shape = broadcast_shape(x.shape(), y.shape(), axis)?;
    check_gradient_shape("mul_grad", dout, &shape)?;
    let (xb, yb) = broadcast_pair(x, y, axis)?;

    let dx = mul_with_same_dim(ctx, dout, &yb)?;
    let dy = mul_with_same_dim(ctx, dout, &xb)?;
    Ok((
        reduce_to_shape(&dx, x.shape(), axis)?,
        reduce_to_shape(&dy, y.shape(), axis)?,
    ))
}

/// Same as `mul_with_same_dim(ctx, x, x)` with the cross term computed once.
pub fn square(ctx: &Aby3Context, x: &RepTensor) -> Result<RepTensor> {
    ctx.check_usable()?;
    let RepTensor { shares: [x0, x1] } = x;
    let v = &(x0 * x0) + &(x0 * x1).scale(2);
    let alpha = zero_share(ctx, v.shape())?;
    reshare_product(ctx, v + alpha)
}

/// `2 * dout * x`, doubling `x` before the product so the result carries a
/// single truncation.
pub fn square_grad(ctx: &Aby3Context, x: &RepTensor, dout: &RepTensor) -> Result<RepTensor> {
    check_gradient_shape("square_grad", dout, x.shape())?;
    mul_with_same_dim(ctx, dout, &x.scale(2))
}
