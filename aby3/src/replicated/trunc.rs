//! Resharing of 3-of-3 products and probabilistic truncation.

use super::zero_share::zero_share;
use super::RepTensor;
use crate::context::Aby3Context;
use crate::error::{Error, Result};
use crate::party::PartyId;
use crate::prng::{NEXT_STREAM, PREV_STREAM};
use crate::ring::Ring64Tensor;

/// Turns a masked 3-of-3 sharing into a replicated one: every party sends
/// its component to the previous party and keeps the one of the next party.
pub(crate) fn reshare(ctx: &Aby3Context, z: Ring64Tensor) -> Result<RepTensor> {
    let z_next = ctx.exchange_backward(&z)?;
    Ok(RepTensor {
        shares: [z, z_next],
    })
}

/// Turns a masked 3-of-3 sharing of `z` into a replicated sharing of
/// `z / 2^amount`, correct up to one unit in the last place with
/// overwhelming probability.
///
/// The first party truncates its own component locally. The second party
/// learns the third component, truncates the sum of both and re-randomizes
/// it with the stream it shares with the third party. The third component
/// of the result is that common randomness. Every party sends one message.
fn reshare_truncated(ctx: &Aby3Context, z: Ring64Tensor, amount: u32) -> Result<RepTensor> {
    let shape = z.shape().to_vec();
    let shares = match ctx.party() {
        PartyId::P0 => {
            let t0 = z.shr_signed(amount);
            ctx.send_tensor(PartyId::P2, &t0)?;
            let t1 = ctx.receive_tensor(PartyId::P1, Some(shape.as_slice()))?;
            [t0, t1]
        }
        PartyId::P1 => {
            let z2 = ctx.receive_tensor(PartyId::P2, Some(shape.as_slice()))?;
            let r = ctx.prngs().fill(NEXT_STREAM, &shape)?;
            let t1 = &(&z + &z2).shr_signed(amount) - &r;
            ctx.send_tensor(PartyId::P0, &t1)?;
            [t1, r]
        }
        _ => {
            ctx.send_tensor(PartyId::P1, &z)?;
            let r = ctx.prngs().fill(PREV_STREAM, &shape)?;
            let t0 = ctx.receive_tensor(PartyId::P0, Some(shape.as_slice()))?;
            [r, t0]
        }
    };
    Ok(RepTensor { shares })
}

/// Reshares a masked product at the context's fractional precision.
pub(crate) fn reshare_product(ctx: &Aby3Context, z: Ring64Tensor) -> Result<RepTensor> {
    match ctx.fractional_precision() {
        0 => reshare(ctx, z),
        f => reshare_truncated(ctx, z, f),
    }
}

/// Probabilistically divides a shared value by `2^amount`.
///
/// The result may be off by one unit in the last place. Values whose
/// magnitude comes close to `2^63` can fail with noticeable probability.
pub fn trunc_pr(ctx: &Aby3Context, x: &RepTensor, amount: u32) -> Result<RepTensor> {
    if amount >= 64 {
        return Err(Error::InvalidArgument(format!(
            "cannot truncate a 64 bit ring by {} bits",
            amount
        )));
    }
    if amount == 0 {
        return Ok(x.clone());
    }
    ctx.check_usable()?;
    let alpha = zero_share(ctx, x.shape())?;
    let z = &x.shares[0] + &alpha;
    reshare_truncated(ctx, z, amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_within, run_parties, shares_of, test_configs};
    use ndarray::prelude::*;
    use proptest::prelude::*;

    fn truncated(x: &Ring64Tensor, amount: u32) -> Ring64Tensor {
        let x = x.clone();
        let outputs = run_parties(test_configs(16), move |ctx| {
            let pairs = shares_of(&x, 3);
            trunc_pr(ctx, &pairs[ctx.party().index()], amount).unwrap()
        });
        RepTensor::reconstruct(&outputs).unwrap()
    }

    #[test]
    fn truncation_of_mixed_signs() {
        let x = Ring64Tensor::from_signed(array![
            1_i64 << 40,
            -(1_i64 << 40),
            12345 << 16,
            -(7 << 16),
            0
        ]);
        let expected = Ring64Tensor::from_signed(array![1_i64 << 24, -(1_i64 << 24), 12345, -7, 0]);
        assert_within(&truncated(&x, 16), &expected, 1);
    }

    #[test]
    fn zero_amount_is_identity() {
        let x = Ring64Tensor::from_signed(array![[-3_i64, 4], [5, -6]]);
        assert_eq!(truncated(&x, 0), x);
    }

    #[test]
    fn oversized_amount_is_rejected() {
        let x = Ring64Tensor::from(vec![1]);
        let errors = run_parties(test_configs(16), move |ctx| {
            let pairs = shares_of(&x, 1);
            trunc_pr(ctx, &pairs[ctx.party().index()], 64).unwrap_err()
        });
        for err in errors.iter() {
            assert!(matches!(err, Error::InvalidArgument(_)));
        }
    }

    #[test]
    fn integer_reshare_is_exact() {
        let outputs = run_parties(test_configs(0), |ctx| {
            let alpha = zero_share(ctx, &[3]).unwrap();
            let own = Ring64Tensor::from(vec![ctx.party().index() as u64 + 1; 3]);
            reshare(ctx, &own + &alpha).unwrap()
        });
        let opened = RepTensor::reconstruct(&outputs).unwrap();
        assert_eq!(opened, Ring64Tensor::from(vec![6, 6, 6]));
    }

    fn any_bounded_i64() -> impl Strategy<Value = i64> {
        -(1_i64 << 40)..(1_i64 << 40)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]
        #[test]
        fn fuzzy_truncation(raw in proptest::collection::vec(any_bounded_i64(), 1..8), amount in 1_u32..30) {
            let x = Ring64Tensor::from_signed(Array::from(raw));
            let expected = x.shr_signed(amount);
            assert_within(&truncated(&x, amount), &expected, 1);
        }
    }
}
