//! Replicated secret sharing over the 64 bit ring.
//!
//! A secret `x` is split into three additive shares `x = s_0 + s_1 + s_2`.
//! Party `i` holds the pair `(s_i, s_{i+1})`, so every share is held by two
//! parties and every pair of parties jointly holds all three.

use crate::error::{Error, Result};
use crate::party::{PartyId, NUM_PARTIES};
use crate::ring::Ring64Tensor;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

mod arith;
mod broadcast;
mod input;
mod trunc;
mod zero_share;

pub use arith::{
    add, add_grad, mul, mul_grad, mul_with_same_dim, square, square_grad, sub, sub_grad,
};
pub use broadcast::{aligned_shape, broadcast_shape, reduce_to_shape};
pub use input::{reveal, share_input};
pub use trunc::trunc_pr;

/// The share pair one party holds for a tensor of secrets.
///
/// Both components always have the same shape.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "SharePair")]
pub struct RepTensor {
    pub(crate) shares: [Ring64Tensor; 2],
}

#[derive(Deserialize)]
struct SharePair {
    shares: [Ring64Tensor; 2],
}

impl TryFrom<SharePair> for RepTensor {
    type Error = Error;

    fn try_from(pair: SharePair) -> Result<RepTensor> {
        let [own, next] = pair.shares;
        RepTensor::new(own, next)
    }
}

impl RepTensor {
    pub fn new(own: Ring64Tensor, next: Ring64Tensor) -> Result<RepTensor> {
        if own.shape() != next.shape() {
            return Err(Error::ShapeMismatch(format!(
                "share components have shapes {:?} and {:?}",
                own.shape(),
                next.shape()
            )));
        }
        Ok(RepTensor {
            shares: [own, next],
        })
    }

    /// This party's own component followed by the next party's.
    pub fn shares(&self) -> &[Ring64Tensor; 2] {
        &self.shares
    }

    pub fn shape(&self) -> &[usize] {
        self.shares[0].shape()
    }

    pub fn neg(&self) -> RepTensor {
        let [x0, x1] = &self.shares;
        RepTensor {
            shares: [-x0, -x1],
        }
    }

    pub(crate) fn try_map<F>(&self, f: F) -> Result<RepTensor>
    where
        F: Fn(&Ring64Tensor) -> Result<Ring64Tensor>,
    {
        let [x0, x1] = &self.shares;
        RepTensor::new(f(x0)?, f(x1)?)
    }

    /// Multiplies by a public integer; needs no communication.
    pub fn scale(&self, factor: u64) -> RepTensor {
        let [x0, x1] = &self.shares;
        RepTensor {
            shares: [x0.scale(factor), x1.scale(factor)],
        }
    }

    /// Splits `x` into the share pairs of all three parties, indexed by party id.
    pub fn share<R: RngCore + ?Sized>(x: &Ring64Tensor, rng: &mut R) -> [RepTensor; NUM_PARTIES] {
        let s0 = Ring64Tensor::sample_uniform(x.shape(), rng);
        let s1 = Ring64Tensor::sample_uniform(x.shape(), rng);
        let s2 = &(x - &s0) - &s1;
        [
            RepTensor {
                shares: [s0.clone(), s1.clone()],
            },
            RepTensor {
                shares: [s1, s2.clone()],
            },
            RepTensor {
                shares: [s2, s0],
            },
        ]
    }

    /// Recombines the pairs of all three parties, checking that the
    /// replicated copies agree.
    pub fn reconstruct(pairs: &[RepTensor; NUM_PARTIES]) -> Result<Ring64Tensor> {
        for i in 0..NUM_PARTIES {
            if pairs[i].shares[1] != pairs[(i + 1) % NUM_PARTIES].shares[0] {
                return Err(Error::KernelError(format!(
                    "share {} differs between party{} and party{}",
                    (i + 1) % NUM_PARTIES,
                    i,
                    (i + 1) % NUM_PARTIES
                )));
            }
        }
        let [s0, s1] = &pairs[0].shares;
        let s2 = &pairs[1].shares[1];
        Ok(&(s0 + s1) + s2)
    }

    /// Recombines the pairs held by two distinct parties.
    pub fn reconstruct_pair(
        (p, x): (PartyId, &RepTensor),
        (q, y): (PartyId, &RepTensor),
    ) -> Result<Ring64Tensor> {
        if p == q {
            return Err(Error::InvalidArgument(format!(
                "reconstruction needs two distinct parties, got {} twice",
                p
            )));
        }
        let mut shares: [Option<&Ring64Tensor>; NUM_PARTIES] = [None, None, None];
        for &(party, pair) in [(p, x), (q, y)].iter() {
            shares[party.index()] = Some(&pair.shares[0]);
            shares[party.next().index()] = Some(&pair.shares[1]);
        }
        match shares {
            [Some(s0), Some(s1), Some(s2)] => Ok(&(s0 + s1) + s2),
            _ => Err(Error::KernelError("missing share".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::prelude::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn share_and_reconstruct() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let x = Ring64Tensor::from_raw(array![[1_u64, 2], [3, u64::MAX]]);
        let pairs = RepTensor::share(&x, &mut rng);

        assert_eq!(RepTensor::reconstruct(&pairs).unwrap(), x);
        for (p, q) in &[(0, 1), (1, 2), (2, 0), (2, 1)] {
            let p = PartyId::new(*p).unwrap();
            let q = PartyId::new(*q).unwrap();
            let opened =
                RepTensor::reconstruct_pair((p, &pairs[p.index()]), (q, &pairs[q.index()]))
                    .unwrap();
            assert_eq!(opened, x);
        }
    }

    #[test]
    fn single_party_cannot_reconstruct() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let x = Ring64Tensor::from(vec![5]);
        let pairs = RepTensor::share(&x, &mut rng);
        let res = RepTensor::reconstruct_pair(
            (PartyId::P1, &pairs[1]),
            (PartyId::P1, &pairs[1]),
        );
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn inconsistent_pairs_are_detected() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let x = Ring64Tensor::from(vec![5, 6]);
        let mut pairs = RepTensor::share(&x, &mut rng);
        pairs[2].shares[0] = Ring64Tensor::from(vec![0, 0]);
        assert!(RepTensor::reconstruct(&pairs).is_err());
    }

    #[test]
    fn component_shapes_must_agree() {
        let res = RepTensor::new(Ring64Tensor::from(vec![1, 2]), Ring64Tensor::from(vec![1]));
        assert!(matches!(res, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn deserialization_checks_component_shapes() {
        let matching = r#"
            [[shares]]
            v = 1
            dim = [2]
            data = [1, 2]

            [[shares]]
            v = 1
            dim = [2]
            data = [3, 4]
        "#;
        let x: RepTensor = toml::from_str(matching).unwrap();
        assert_eq!(x.shares()[1], Ring64Tensor::from(vec![3, 4]));

        let mismatched = r#"
            [[shares]]
            v = 1
            dim = [2]
            data = [1, 2]

            [[shares]]
            v = 1
            dim = [1]
            data = [3]
        "#;
        let err = toml::from_str::<RepTensor>(mismatched).unwrap_err();
        assert!(err.to_string().contains("Shape mismatch"), "{}", err);
    }

    #[test]
    fn shares_look_uniform() {
        // a single party's view of a constant secret must not be biased by it
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let trials = 4000;
        for secret in &[0_u64, 1, u64::MAX / 3] {
            let x = Ring64Tensor::from(vec![*secret]);
            let mut top_bit_set = [0usize; 2];
            for _ in 0..trials {
                let pairs = RepTensor::share(&x, &mut rng);
                for (k, share) in pairs[1].shares.iter().enumerate() {
                    if share.to_raw().sum() >> 63 == 1 {
                        top_bit_set[k] += 1;
                    }
                }
            }
            for count in top_bit_set.iter() {
                let ratio = *count as f64 / trials as f64;
                assert!((ratio - 0.5).abs() < 0.05, "ratio = {}", ratio);
            }
        }
    }

    proptest! {
        #[test]
        fn fuzzy_reconstruct(raw in proptest::collection::vec(any::<u64>(), 1..20), seed in any::<u64>()) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let x = Ring64Tensor::from(raw);
            let pairs = RepTensor::share(&x, &mut rng);
            prop_assert_eq!(RepTensor::reconstruct(&pairs).unwrap(), x);
        }
    }
}
