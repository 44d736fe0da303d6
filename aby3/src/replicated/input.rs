//! Getting plaintext into shares and back out.

use super::RepTensor;
use crate::context::Aby3Context;
use crate::error::{Error, Result};
use crate::party::PartyId;
use crate::prng::PRIVATE_STREAM;
use crate::ring::Ring64Tensor;

/// Secret-shares a value known only to `owner`.
///
/// The owner passes `Some(value)`, everybody else `None`. The owner draws two
/// components from its private stream, derives the third and sends each
/// other party the pair it will hold.
pub fn share_input(
    ctx: &Aby3Context,
    owner: PartyId,
    value: Option<&Ring64Tensor>,
) -> Result<RepTensor> {
    match (ctx.party() == owner, value) {
        (true, Some(x)) => {
            ctx.check_usable()?;
            let (s_own, s_next) = {
                let mut prngs = ctx.prngs();
                let s_own = prngs.fill(PRIVATE_STREAM, x.shape())?;
                let s_next = prngs.fill(PRIVATE_STREAM, x.shape())?;
                (s_own, s_next)
            };
            let s_prev = &(x - &s_own) - &s_next;

            tracing::debug!("{} sharing input of shape {:?}", owner, x.shape());
            ctx.send_tensor(ctx.next_party(), &s_next)?;
            ctx.send_tensor(ctx.next_party(), &s_prev)?;
            ctx.send_tensor(ctx.prev_party(), &s_prev)?;
            ctx.send_tensor(ctx.prev_party(), &s_own)?;
            RepTensor::new(s_own, s_next)
        }
        (true, None) => Err(Error::InvalidArgument(format!(
            "{} owns the input but provided no value",
            owner
        ))),
        (false, Some(_)) => Err(Error::InvalidArgument(format!(
            "{} provided a value for an input owned by {}",
            ctx.party(),
            owner
        ))),
        (false, None) => {
            let first = ctx.receive_tensor(owner, None)?;
            let second = ctx.receive_tensor(owner, Some(first.shape()))?;
            RepTensor::new(first, second)
        }
    }
}

/// Opens a shared value to all three parties.
pub fn reveal(ctx: &Aby3Context, x: &RepTensor) -> Result<Ring64Tensor> {
    let RepTensor { shares: [x0, x1] } = x;
    let missing = ctx.exchange_backward(x1)?;
    Ok(&(x0 + x1) + &missing)
}
