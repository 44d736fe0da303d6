//! Support for generating zero-shares

use crate::context::Aby3Context;
use crate::error::Result;
use crate::prng::{NEXT_STREAM, PREV_STREAM};
use crate::ring::Ring64Tensor;

/// Draws this party's mask of a fresh three-way sharing of zero.
///
/// Party `i` computes `alpha_i = F(k_i) - F(k_{i-1})`; summed around the ring
/// every stream value appears once with each sign, so `alpha_0 + alpha_1 +
/// alpha_2 = 0`. All three parties must call this in the same order and for
/// the same shape.
pub(crate) fn zero_share(ctx: &Aby3Context, shape: &[usize]) -> Result<Ring64Tensor> {
    let mut prngs = ctx.prngs();
    let r_next = prngs.fill(NEXT_STREAM, shape)?;
    let r_prev = prngs.fill(PREV_STREAM, shape)?;
    Ok(r_next - r_prev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{run_parties, test_configs};

    #[test]
    fn masks_sum_to_zero() {
        let alphas = run_parties(test_configs(16), |ctx| {
            let first = zero_share(ctx, &[2, 3]).unwrap();
            let second = zero_share(ctx, &[4]).unwrap();
            (first, second)
        });

        let first = &(&alphas[0].0 + &alphas[1].0) + &alphas[2].0;
        let second = &(&alphas[0].1 + &alphas[1].1) + &alphas[2].1;
        assert_eq!(first, Ring64Tensor::zeros(&[2, 3]));
        assert_eq!(second, Ring64Tensor::zeros(&[4]));

        // fresh masks on every call
        assert_ne!(alphas[0].0, Ring64Tensor::zeros(&[2, 3]));
        assert_ne!(alphas[0].1, alphas[1].1);
    }
}
