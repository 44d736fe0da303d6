//! ABY3 three-party replicated secret sharing over the ring of 64 bit
//! integers.
//!
//! Every party builds an [`Aby3Context`](context::Aby3Context) over a
//! [`SyncNetworking`](networking::SyncNetworking) channel to the two other
//! parties and then runs the kernels in [`replicated`] on its share tensors,
//! either directly or through the operator descriptors in [`kernels`].

pub mod config;
pub mod context;
pub mod error;
pub mod fixedpoint;
pub mod instance;
pub mod kernels;
pub mod networking;
pub mod party;
pub mod prelude;
pub mod prng;
pub mod replicated;
pub mod ring;

#[cfg(test)]
pub(crate) mod test_utils;

#[doc(inline)]
pub use error::{Error, Result};
