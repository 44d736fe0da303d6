//! Party configuration and the protocol-name registry.
//!
//! A process (or thread, see [`crate::instance`]) first fixes which protocol
//! variant it runs via [`init_protocol_name`], then builds its context from an
//! [`Aby3Config`].

use crate::error::{Error, Result};
use crate::party::PartyId;
use crate::prng::{PrngKind, RawSeed};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::Path;
use std::time::Duration;

/// Name under which the ABY3 protocol is registered.
pub const ABY3_PROTOCOL_NAME: &str = "aby3";

/// Default number of fractional bits used for fixed-point values.
pub const DEFAULT_FRACTIONAL_PRECISION: u32 = 16;

const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 60_000;

/// Configuration of a single party.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Aby3Config {
    /// Identity of this party on the ring.
    pub party: PartyId,

    /// Number of fractional bits; zero switches multiplication to integer mode.
    #[serde(default = "default_fractional_precision")]
    pub fractional_precision: u32,

    #[serde(default)]
    pub prng: PrngKind,

    /// Seed of the stream shared with the next party. Zero means "draw from OS entropy".
    #[serde(default)]
    pub next_seed: RawSeed,

    /// Seed of the private stream. Zero means "draw from OS entropy".
    #[serde(default)]
    pub private_seed: RawSeed,

    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
}

fn default_fractional_precision() -> u32 {
    DEFAULT_FRACTIONAL_PRECISION
}

fn default_receive_timeout_ms() -> u64 {
    DEFAULT_RECEIVE_TIMEOUT_MS
}

impl Aby3Config {
    pub fn new(party: PartyId) -> Self {
        Aby3Config {
            party,
            fractional_precision: DEFAULT_FRACTIONAL_PRECISION,
            prng: PrngKind::default(),
            next_seed: RawSeed::ZERO,
            private_seed: RawSeed::ZERO,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
        }
    }

    pub fn with_seeds(mut self, next_seed: RawSeed, private_seed: RawSeed) -> Self {
        self.next_seed = next_seed;
        self.private_seed = private_seed;
        self
    }

    pub fn with_fractional_precision(mut self, fractional_precision: u32) -> Self {
        self.fractional_precision = fractional_precision;
        self
    }

    pub fn with_prng(mut self, prng: PrngKind) -> Self {
        self.prng = prng;
        self
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Aby3Config = toml::from_str(raw)
            .map_err(|e| Error::Config(format!("failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        // products of two scaled values must leave room for the sign bit
        if self.fractional_precision >= 31 {
            return Err(Error::Config(format!(
                "fractional precision {} too large for a 64 bit ring",
                self.fractional_precision
            )));
        }
        Ok(())
    }
}

thread_local! {
    static PROTOCOL_NAME: RefCell<Option<String>> = RefCell::new(None);
}

/// Sets the protocol name for the current thread.
///
/// Only the first call has an effect; later calls are ignored.
pub fn init_protocol_name(name: &str) {
    PROTOCOL_NAME.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            tracing::debug!("initializing mpc protocol name: {}", name);
            *slot = Some(name.to_string());
        }
    })
}

/// Returns the protocol name configured for the current thread.
pub fn protocol_name() -> Result<String> {
    PROTOCOL_NAME.with(|cell| cell.borrow().clone().ok_or(Error::ProtocolNameUninitialized))
}
