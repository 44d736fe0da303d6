//! Seeds and the bank of three PRNG streams held by every party.
//!
//! Stream indices have fixed roles once a context finished its handshake:
//!
//! - [`NEXT_STREAM`] is keyed by a seed known to this party and the next party,
//! - [`PREV_STREAM`] is keyed by a seed known to this party and the previous party,
//! - [`PRIVATE_STREAM`] is keyed by a seed only this party knows.
//!
//! Two parties holding the same seed draw identical values as long as they
//! consume their copies of the stream in the same order.

use crate::error::{Error, Result};
use crate::ring::Ring64Tensor;
use aes_prng::AesRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::Wrapping;

pub const SEED_SIZE: usize = 16;

pub const NEXT_STREAM: usize = 0;
pub const PREV_STREAM: usize = 1;
pub const PRIVATE_STREAM: usize = 2;

const NUM_STREAMS: usize = 3;

#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub struct RawSeed(pub [u8; SEED_SIZE]);

impl RawSeed {
    /// Sentinel asking for a seed drawn from OS entropy.
    pub const ZERO: RawSeed = RawSeed([0; SEED_SIZE]);

    pub fn random() -> Result<RawSeed> {
        let mut raw = [0u8; SEED_SIZE];
        getrandom::getrandom(&mut raw)
            .map_err(|e| Error::KernelError(format!("failed to get randomness: {}", e)))?;
        Ok(RawSeed(raw))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; SEED_SIZE]
    }

    /// Replaces the zero sentinel with a fresh random seed.
    pub fn or_random(self) -> Result<RawSeed> {
        if self.is_zero() {
            RawSeed::random()
        } else {
            Ok(self)
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; SEED_SIZE]> for RawSeed {
    fn from(raw: [u8; SEED_SIZE]) -> RawSeed {
        RawSeed(raw)
    }
}

// seeds are key material; keep them out of logs
impl fmt::Debug for RawSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            write!(f, "RawSeed(zero)")
        } else {
            write!(f, "RawSeed(..)")
        }
    }
}

/// Pseudorandom generator backend used for the streams.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PrngKind {
    Aes,
    ChaCha20,
}

impl Default for PrngKind {
    fn default() -> Self {
        PrngKind::Aes
    }
}

impl PrngKind {
    pub(crate) fn seeded(self, seed: &RawSeed) -> Box<dyn RngCore + Send> {
        match self {
            PrngKind::Aes => Box::new(AesRng::from_seed(seed.0)),
            PrngKind::ChaCha20 => Box::new(ChaCha20Rng::from_seed(expand_seed(seed))),
        }
    }
}

fn expand_seed(seed: &RawSeed) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(seed.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Three independently addressable pseudorandom streams.
pub struct PrngBank {
    kind: PrngKind,
    streams: [Option<Box<dyn RngCore + Send>>; NUM_STREAMS],
}

impl PrngBank {
    pub fn new(kind: PrngKind) -> Self {
        PrngBank {
            kind,
            streams: [None, None, None],
        }
    }

    pub fn kind(&self) -> PrngKind {
        self.kind
    }

    /// (Re)keys stream `index`; identical seeds yield identical future output.
    pub fn seed(&mut self, index: usize, seed: &RawSeed) -> Result<()> {
        let slot = self
            .streams
            .get_mut(index)
            .ok_or_else(|| Error::InvalidArgument(format!("no PRNG stream {}", index)))?;
        *slot = Some(self.kind.seeded(seed));
        Ok(())
    }

    pub fn is_seeded(&self, index: usize) -> bool {
        matches!(self.streams.get(index), Some(Some(_)))
    }

    fn stream(&mut self, index: usize) -> Result<&mut (dyn RngCore + Send)> {
        match self.streams.get_mut(index) {
            Some(Some(rng)) => Ok(rng.as_mut()),
            Some(None) => Err(Error::UnseededStream(index)),
            None => Err(Error::InvalidArgument(format!("no PRNG stream {}", index))),
        }
    }

    pub fn next(&mut self, index: usize) -> Result<Wrapping<u64>> {
        Ok(Wrapping(self.stream(index)?.next_u64()))
    }

    /// Draws a tensor of the given shape, filled in row-major order.
    pub fn fill(&mut self, index: usize, shape: &[usize]) -> Result<Ring64Tensor> {
        let rng = self.stream(index)?;
        Ok(Ring64Tensor::sample_uniform(shape, rng))
    }
}

impl fmt::Debug for PrngBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrngBank")
            .field("kind", &self.kind)
            .field("seeded", &[self.is_seeded(0), self.is_seeded(1), self.is_seeded(2)])
            .finish()
    }
}
