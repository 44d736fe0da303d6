//! Harness for running the three parties as threads of one test.

use crate::config::Aby3Config;
use crate::context::Aby3Context;
use crate::networking::LocalSyncNetworking;
use crate::party::{PartyId, NUM_PARTIES};
use crate::prng::{RawSeed, SEED_SIZE};
use crate::replicated::RepTensor;
use crate::ring::Ring64Tensor;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

/// Configurations with fixed, distinct seeds for all three parties.
pub(crate) fn test_configs(fractional_precision: u32) -> [Aby3Config; NUM_PARTIES] {
    PartyId::all().map(|party| {
        let i = party.index() as u8;
        Aby3Config::new(party)
            .with_fractional_precision(fractional_precision)
            .with_seeds(RawSeed([10 + i; SEED_SIZE]), RawSeed([20 + i; SEED_SIZE]))
    })
}

/// Builds one context per party over a shared in-memory hub and runs `f`
/// on each of them in its own thread. Results are indexed by party id.
pub(crate) fn run_parties<T, F>(configs: [Aby3Config; NUM_PARTIES], f: F) -> [T; NUM_PARTIES]
where
    T: Send + 'static,
    F: Fn(&Aby3Context) -> T + Send + Sync + 'static,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let net = LocalSyncNetworking::new(configs[0].receive_timeout());
    let f = Arc::new(f);
    let handles: Vec<_> = configs
        .iter()
        .cloned()
        .map(|config| {
            let endpoint = Arc::new(net.endpoint(config.party));
            let f = Arc::clone(&f);
            std::thread::spawn(move || {
                let ctx = Aby3Context::new(&config, endpoint).unwrap();
                f(&ctx)
            })
        })
        .collect();

    let mut results = handles.into_iter().map(|h| h.join().unwrap());
    let p0 = results.next().unwrap();
    let p1 = results.next().unwrap();
    let p2 = results.next().unwrap();
    [p0, p1, p2]
}

/// Deterministic dealer sharing of `x`.
pub(crate) fn shares_of(x: &Ring64Tensor, seed: u64) -> [RepTensor; NUM_PARTIES] {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    RepTensor::share(x, &mut rng)
}

/// Asserts that every element of `actual` is within `ulps` of `expected`.
pub(crate) fn assert_within(actual: &Ring64Tensor, expected: &Ring64Tensor, ulps: u64) {
    assert_eq!(actual.shape(), expected.shape());
    for (a, e) in actual.0.iter().zip(expected.0.iter()) {
        let diff = (a - e).0 as i64;
        assert!(
            diff.unsigned_abs() <= ulps,
            "difference = {}, actual = {}, expected = {}",
            diff,
            a.0 as i64,
            e.0 as i64
        );
    }
}
