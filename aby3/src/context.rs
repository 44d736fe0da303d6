//! Per-party ABY3 context: correlated-randomness setup and share exchange.

use crate::config::Aby3Config;
use crate::error::{Error, Result};
use crate::fixedpoint::{fixedpoint_decode, fixedpoint_encode};
use crate::networking::SyncNetworking;
use crate::party::PartyId;
use crate::prng::{PrngBank, RawSeed, NEXT_STREAM, PREV_STREAM, PRIVATE_STREAM, SEED_SIZE};
use crate::ring::Ring64Tensor;
use ndarray::{ArrayD, ArrayView, Dimension};
use std::cell::{Cell, RefCell, RefMut};
use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;

/// Everything one party needs to run the ABY3 kernels.
///
/// Construction performs the seed handshake with the two other parties and
/// blocks until it completes. After that, this party's [`NEXT_STREAM`] is
/// keyed identically to the next party's [`PREV_STREAM`], which is what
/// zero-sharing and truncation rely on.
///
/// A context owns its PRNG streams exclusively and is not `Clone`; two
/// copies would replay the same randomness.
///
/// A failed send or receive leaves the streams and channel queues out of
/// step with the peers. The context is poisoned from then on and every
/// communicating kernel fails with [`Error::Networking`].
pub struct Aby3Context {
    party: PartyId,
    fractional_precision: u32,
    prngs: RefCell<PrngBank>,
    network: Arc<dyn SyncNetworking>,
    poisoned: Cell<bool>,
}

impl Aby3Context {
    #[tracing::instrument(skip_all, fields(party = %config.party))]
    pub fn new(config: &Aby3Config, network: Arc<dyn SyncNetworking>) -> Result<Aby3Context> {
        config.validate()?;
        let party = config.party;
        if network.own_party() != party {
            return Err(Error::InvalidArgument(format!(
                "channel belongs to {} but context is for {}",
                network.own_party(),
                party
            )));
        }

        let next_seed = config.next_seed.or_random()?;
        let private_seed = config.private_seed.or_random()?;

        let mut prngs = PrngBank::new(config.prng);
        prngs.seed(NEXT_STREAM, &next_seed)?;
        prngs.seed(PRIVATE_STREAM, &private_seed)?;

        // the last party on the ring receives first so the exchange cannot deadlock
        let prev_seed = if party == PartyId::P2 {
            let received = receive_seed(network.as_ref(), party.prev())?;
            network.send(party.next(), next_seed.as_bytes())?;
            received
        } else {
            network.send(party.next(), next_seed.as_bytes())?;
            receive_seed(network.as_ref(), party.prev())?
        };
        prngs.seed(PREV_STREAM, &prev_seed)?;

        tracing::info!("seed handshake complete");
        Ok(Aby3Context {
            party,
            fractional_precision: config.fractional_precision,
            prngs: RefCell::new(prngs),
            network,
            poisoned: Cell::new(false),
        })
    }

    pub fn party(&self) -> PartyId {
        self.party
    }

    pub fn next_party(&self) -> PartyId {
        self.party.next()
    }

    pub fn prev_party(&self) -> PartyId {
        self.party.prev()
    }

    pub fn fractional_precision(&self) -> u32 {
        self.fractional_precision
    }

    pub fn prngs(&self) -> RefMut<'_, PrngBank> {
        self.prngs.borrow_mut()
    }

    /// Fails once an exchange of this context has broken off.
    pub fn check_usable(&self) -> Result<()> {
        if self.poisoned.get() {
            return Err(Error::Networking(format!(
                "{} is out of sync with its peers after a failed exchange",
                self.party
            )));
        }
        Ok(())
    }

    fn poison_on_error<T>(&self, res: Result<T>) -> Result<T> {
        if let Err(e) = &res {
            if !self.poisoned.replace(true) {
                tracing::warn!("{} poisoned by failed exchange: {}", self.party, e);
            }
        }
        res
    }

    pub(crate) fn send_tensor(&self, receiver: PartyId, x: &Ring64Tensor) -> Result<()> {
        self.check_usable()?;
        tracing::trace!("{} sending {:?} to {}", self.party, x.shape(), receiver);
        let res = self.network.send(receiver, &x.to_bytes());
        self.poison_on_error(res)
    }

    /// Receives a tensor, checking its shape when the caller knows it.
    pub(crate) fn receive_tensor(
        &self,
        sender: PartyId,
        expected_shape: Option<&[usize]>,
    ) -> Result<Ring64Tensor> {
        self.check_usable()?;
        let res = self
            .network
            .receive(sender)
            .and_then(|bytes| Ring64Tensor::from_bytes(&bytes))
            .and_then(|x| match expected_shape {
                Some(shape) if shape != x.shape() => Err(Error::Networking(format!(
                    "{} expected shape {:?} from {} but received {:?}",
                    self.party,
                    shape,
                    sender,
                    x.shape()
                ))),
                _ => Ok(x),
            });
        self.poison_on_error(res)
    }

    /// Sends `x` to the previous party and returns the tensor of the same
    /// shape sent by the next party.
    ///
    /// The last party receives first, so the exchange cannot deadlock even
    /// over unbuffered channels.
    pub(crate) fn exchange_backward(&self, x: &Ring64Tensor) -> Result<Ring64Tensor> {
        let shape = x.shape();
        if self.party == PartyId::P2 {
            let received = self.receive_tensor(self.next_party(), Some(shape))?;
            self.send_tensor(self.prev_party(), x)?;
            Ok(received)
        } else {
            self.send_tensor(self.prev_party(), x)?;
            self.receive_tensor(self.next_party(), Some(shape))
        }
    }

    /// Encodes real values at this context's fractional precision.
    pub fn encode<D: Dimension>(&self, x: &ArrayView<f64, D>) -> Ring64Tensor {
        fixedpoint_encode(x, self.fractional_precision)
    }

    pub fn decode(&self, x: &Ring64Tensor) -> ArrayD<f64> {
        fixedpoint_decode(x, self.fractional_precision)
    }
}

fn receive_seed(network: &dyn SyncNetworking, sender: PartyId) -> Result<RawSeed> {
    let bytes = network.receive(sender)?;
    let raw = <[u8; SEED_SIZE]>::try_from(bytes.as_slice()).map_err(|_| {
        Error::Networking(format!(
            "expected a {} byte seed from {} but received {} bytes",
            SEED_SIZE,
            sender,
            bytes.len()
        ))
    })?;
    Ok(RawSeed(raw))
}

impl fmt::Debug for Aby3Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aby3Context")
            .field("party", &self.party)
            .field("fractional_precision", &self.fractional_precision)
            .field("poisoned", &self.poisoned.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networking::LocalSyncNetworking;
    use crate::prng::PrngKind;
    use crate::test_utils::{run_parties, test_configs};
    use std::time::Duration;

    #[test]
    fn adjacent_streams_agree() {
        let draws = run_parties(test_configs(16), |ctx| {
            let mut prngs = ctx.prngs();
            let next: Vec<_> = (0..4).map(|_| prngs.next(NEXT_STREAM).unwrap()).collect();
            let prev: Vec<_> = (0..4).map(|_| prngs.next(PREV_STREAM).unwrap()).collect();
            let private: Vec<_> = (0..4).map(|_| prngs.next(PRIVATE_STREAM).unwrap()).collect();
            (next, prev, private)
        });

        for i in 0..3 {
            let (next, _, private) = &draws[i];
            let (_, prev_of_next, private_of_next) = &draws[(i + 1) % 3];
            assert_eq!(next, prev_of_next);
            assert_ne!(private, private_of_next);
            assert_ne!(next, private);
        }
    }

    #[test]
    fn handshake_is_deterministic() {
        let first = run_parties(test_configs(16), |ctx| ctx.prngs().next(PREV_STREAM).unwrap());
        let second = run_parties(test_configs(16), |ctx| ctx.prngs().next(PREV_STREAM).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn random_seeds_still_agree() {
        let configs = test_configs(16).map(|config| {
            config
                .with_seeds(RawSeed::ZERO, RawSeed::ZERO)
                .with_prng(PrngKind::ChaCha20)
        });
        let draws = run_parties(configs, |ctx| {
            let mut prngs = ctx.prngs();
            (prngs.next(NEXT_STREAM).unwrap(), prngs.next(PREV_STREAM).unwrap())
        });
        for i in 0..3 {
            assert_eq!(draws[i].0, draws[(i + 1) % 3].1);
        }
    }

    #[test]
    fn handshake_fails_without_peers() {
        let net = LocalSyncNetworking::new(Duration::from_millis(20));
        let config = test_configs(16)[1].clone();
        let res = Aby3Context::new(&config, Arc::new(net.endpoint(PartyId::P1)));
        assert!(matches!(res, Err(Error::Networking(_))));
    }

    #[test]
    fn channel_must_match_party() {
        let net = LocalSyncNetworking::new(Duration::from_millis(20));
        let config = test_configs(16)[0].clone();
        let res = Aby3Context::new(&config, Arc::new(net.endpoint(PartyId::P2)));
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn malformed_seed_is_rejected() {
        let net = LocalSyncNetworking::new(Duration::from_secs(1));
        let config = test_configs(16)[1].clone();
        net.endpoint(PartyId::P0).send(PartyId::P1, &[1, 2, 3]).unwrap();
        let res = Aby3Context::new(&config, Arc::new(net.endpoint(PartyId::P1)));
        assert!(matches!(res, Err(Error::Networking(_))));
    }

    #[test]
    fn failed_receive_poisons_context() {
        let outputs = run_parties(test_configs(16), |ctx| match ctx.party() {
            PartyId::P0 => {
                ctx.send_tensor(PartyId::P1, &Ring64Tensor::from(vec![1])).unwrap();
                ctx.check_usable()
            }
            PartyId::P1 => {
                let res = ctx.receive_tensor(PartyId::P0, Some(&[2][..]));
                assert!(matches!(res, Err(Error::Networking(_))));
                // a poisoned context refuses to send
                assert!(ctx.send_tensor(PartyId::P2, &Ring64Tensor::from(vec![1])).is_err());
                ctx.check_usable()
            }
            PartyId::P2 => Ok(()),
        });
        assert_eq!(outputs[0], Ok(()));
        assert!(matches!(outputs[1], Err(Error::Networking(_))));
        assert_eq!(outputs[2], Ok(()));
    }
}
