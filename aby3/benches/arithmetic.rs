use aby3::prelude::*;
use aby3::prng::{PRIVATE_STREAM, SEED_SIZE};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

/// Runs `iters` rounds of `op` on all three parties and reports the slowest party.
fn run_three<F>(iters: u64, len: usize, op: F) -> Duration
where
    F: Fn(&Aby3Context, &RepTensor) -> RepTensor + Send + Sync + 'static,
{
    let net = LocalSyncNetworking::new(Duration::from_secs(60));
    let barrier = Arc::new(Barrier::new(3));
    let op = Arc::new(op);
    let x = Ring64Tensor::from(vec![3 << 16; len]);
    let shares = RepTensor::share(&x, &mut ChaCha20Rng::seed_from_u64(0));

    let handles: Vec<_> = PartyId::all()
        .iter()
        .map(|party| {
            let config = Aby3Config::new(*party)
                .with_seeds(RawSeed([1; SEED_SIZE]), RawSeed([2; SEED_SIZE]));
            let endpoint = Arc::new(net.endpoint(*party));
            let share = shares[party.index()].clone();
            let barrier = Arc::clone(&barrier);
            let op = Arc::clone(&op);
            std::thread::spawn(move || {
                let ctx = Aby3Context::new(&config, endpoint).unwrap();
                barrier.wait();
                let start = Instant::now();
                for _ in 0..iters {
                    let _ = op(&ctx, &share);
                }
                start.elapsed()
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .max()
        .unwrap_or_default()
}

fn multiplication(c: &mut Criterion) {
    let mut group = c.benchmark_group("mul_with_same_dim");
    for len in [1_usize, 1024, 65536].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, &len| {
            b.iter_custom(|iters| {
                run_three(iters, len, |ctx, x| mul_with_same_dim(ctx, x, x).unwrap())
            })
        });
    }
    group.finish();

    c.bench_function("square_1024", |b| {
        b.iter_custom(|iters| run_three(iters, 1024, |ctx, x| square(ctx, x).unwrap()))
    });
}

fn addition(c: &mut Criterion) {
    let x = Ring64Tensor::from(vec![5; 65536]);
    let shares = RepTensor::share(&x, &mut ChaCha20Rng::seed_from_u64(1));
    c.bench_function("add_65536", |b| {
        b.iter(|| add(&shares[0], &shares[1], None).unwrap())
    });
}

fn prng_fill(c: &mut Criterion) {
    for kind in [PrngKind::Aes, PrngKind::ChaCha20].iter() {
        let mut bank = aby3::prng::PrngBank::new(*kind);
        bank.seed(PRIVATE_STREAM, &RawSeed([7; SEED_SIZE])).unwrap();
        c.bench_function(&format!("prng_fill_{:?}_65536", kind), |b| {
            b.iter(|| bank.fill(PRIVATE_STREAM, &[65536]).unwrap())
        });
    }
}

criterion_group!(benches, multiplication, addition, prng_fill);
criterion_main!(benches);
