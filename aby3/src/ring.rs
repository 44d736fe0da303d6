//! Tensors over the ring of integers modulo 2^64.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use ndarray::prelude::*;
use ndarray::IxDyn;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::num::Wrapping;
use std::ops::{Add, Mul, Neg, Sub};

const WORD_BYTES: usize = 8;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Ring64Tensor(pub ArrayD<Wrapping<u64>>);

impl Ring64Tensor {
    pub fn from_raw<D: Dimension>(raw: Array<u64, D>) -> Ring64Tensor {
        Ring64Tensor(raw.mapv(Wrapping).into_dyn())
    }

    pub fn from_signed<D: Dimension>(raw: Array<i64, D>) -> Ring64Tensor {
        Ring64Tensor(raw.mapv(|x| Wrapping(x as u64)).into_dyn())
    }

    pub fn zeros(shape: &[usize]) -> Ring64Tensor {
        Ring64Tensor(ArrayD::from_elem(IxDyn(shape), Wrapping(0)))
    }

    pub fn fill(shape: &[usize], el: u64) -> Ring64Tensor {
        Ring64Tensor(ArrayD::from_elem(IxDyn(shape), Wrapping(el)))
    }

    /// Draws every element uniformly from the ring, in row-major order.
    pub fn sample_uniform<R: RngCore + ?Sized>(shape: &[usize], rng: &mut R) -> Ring64Tensor {
        Ring64Tensor(ArrayD::from_shape_fn(IxDyn(shape), |_| Wrapping(rng.next_u64())))
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_raw(&self) -> ArrayD<u64> {
        self.0.mapv(|x| x.0)
    }

    pub fn to_signed(&self) -> ArrayD<i64> {
        self.0.mapv(|x| x.0 as i64)
    }

    /// Multiplies every element by a public constant.
    pub fn scale(&self, factor: u64) -> Ring64Tensor {
        let factor = Wrapping(factor);
        Ring64Tensor(self.0.mapv(|x| x * factor))
    }

    pub fn shl(&self, amount: u32) -> Ring64Tensor {
        Ring64Tensor(self.0.mapv(|x| Wrapping(x.0.wrapping_shl(amount))))
    }

    /// Arithmetic (sign-extending) right shift, reading elements as two's complement.
    pub fn shr_signed(&self, amount: u32) -> Ring64Tensor {
        Ring64Tensor(
            self.0
                .mapv(|x| Wrapping(((x.0 as i64).wrapping_shr(amount)) as u64)),
        )
    }

    /// Sums over `axis`, keeping it as a dimension of length one.
    pub fn sum_keep_axis(&self, axis: usize) -> Ring64Tensor {
        let summed = self
            .0
            .fold_axis(Axis(axis), Wrapping(0), |acc, x| *acc + *x)
            .insert_axis(Axis(axis));
        Ring64Tensor(summed)
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Ring64Tensor> {
        let values: Vec<_> = self.0.iter().cloned().collect();
        let raw = ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|e| {
            Error::ShapeMismatch(format!(
                "cannot reshape {:?} into {:?}: {}",
                self.shape(),
                shape,
                e
            ))
        })?;
        Ok(Ring64Tensor(raw))
    }

    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Ring64Tensor> {
        let view = self.0.broadcast(IxDyn(shape)).ok_or_else(|| {
            Error::ShapeMismatch(format!(
                "cannot broadcast {:?} to {:?}",
                self.shape(),
                shape
            ))
        })?;
        Ok(Ring64Tensor(view.to_owned()))
    }

    /// Serializes into a shape-tagged little-endian byte block.
    pub fn to_bytes(&self) -> Vec<u8> {
        let shape = self.shape();
        let mut bytes = vec![0u8; WORD_BYTES * (1 + shape.len() + self.len())];
        let words = std::iter::once(shape.len() as u64)
            .chain(shape.iter().map(|d| *d as u64))
            .chain(self.0.iter().map(|x| x.0));
        for (chunk, word) in bytes.chunks_exact_mut(WORD_BYTES).zip(words) {
            LittleEndian::write_u64(chunk, word);
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Ring64Tensor> {
        if bytes.len() % WORD_BYTES != 0 || bytes.is_empty() {
            return Err(Error::Networking(format!(
                "malformed ring tensor message of {} bytes",
                bytes.len()
            )));
        }
        let words: Vec<u64> = bytes
            .chunks_exact(WORD_BYTES)
            .map(LittleEndian::read_u64)
            .collect();
        let header = usize::try_from(words[0])
            .ok()
            .and_then(|ndim| ndim.checked_add(1))
            .filter(|header| *header <= words.len())
            .ok_or_else(|| {
                Error::Networking(format!(
                    "ring tensor message of {} words cannot hold a {} dimensional shape",
                    words.len(),
                    words[0]
                ))
            })?;
        let shape = words[1..header]
            .iter()
            .map(|d| usize::try_from(*d))
            .collect::<std::result::Result<Vec<usize>, _>>()
            .map_err(|e| Error::Networking(format!("malformed ring tensor shape: {}", e)))?;
        let values: Vec<_> = words[header..].iter().map(|x| Wrapping(*x)).collect();
        let raw = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| Error::Networking(format!("malformed ring tensor message: {}", e)))?;
        Ok(Ring64Tensor(raw))
    }
}

impl From<Vec<u64>> for Ring64Tensor {
    fn from(v: Vec<u64>) -> Ring64Tensor {
        Ring64Tensor::from_raw(Array::from(v))
    }
}

impl From<ArrayD<u64>> for Ring64Tensor {
    fn from(raw: ArrayD<u64>) -> Ring64Tensor {
        Ring64Tensor::from_raw(raw)
    }
}

impl<'a> Add<&'a Ring64Tensor> for &'a Ring64Tensor {
    type Output = Ring64Tensor;
    fn add(self, other: &'a Ring64Tensor) -> Ring64Tensor {
        Ring64Tensor(&self.0 + &other.0)
    }
}

impl Add for Ring64Tensor {
    type Output = Ring64Tensor;
    fn add(self, other: Ring64Tensor) -> Ring64Tensor {
        Ring64Tensor(self.0 + other.0)
    }
}

impl<'a> Sub<&'a Ring64Tensor> for &'a Ring64Tensor {
    type Output = Ring64Tensor;
    fn sub(self, other: &'a Ring64Tensor) -> Ring64Tensor {
        Ring64Tensor(&self.0 - &other.0)
    }
}

impl Sub for Ring64Tensor {
    type Output = Ring64Tensor;
    fn sub(self, other: Ring64Tensor) -> Ring64Tensor {
        Ring64Tensor(self.0 - other.0)
    }
}

impl<'a> Mul<&'a Ring64Tensor> for &'a Ring64Tensor {
    type Output = Ring64Tensor;
    fn mul(self, other: &'a Ring64Tensor) -> Ring64Tensor {
        Ring64Tensor(&self.0 * &other.0)
    }
}

impl Mul for Ring64Tensor {
    type Output = Ring64Tensor;
    fn mul(self, other: Ring64Tensor) -> Ring64Tensor {
        Ring64Tensor(self.0 * other.0)
    }
}

impl<'a> Neg for &'a Ring64Tensor {
    type Output = Ring64Tensor;
    fn neg(self) -> Ring64Tensor {
        Ring64Tensor(self.0.mapv(|x| -x))
    }
}

impl Neg for Ring64Tensor {
    type Output = Ring64Tensor;
    fn neg(self) -> Ring64Tensor {
        -&self
    }
}
