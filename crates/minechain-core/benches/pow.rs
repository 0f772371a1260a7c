use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use minechain_core::{Block, Miner, Payload, StopSignal, SystemClock, Transaction};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn bench_pow(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let txs: Vec<Transaction> = (0..10)
        .map(|i| {
            Transaction::new(format!("Sender{i}"), "Recipient", rng.gen_range(0.0..10.0))
                .expect("generated transaction is valid")
        })
        .collect();
    let block = Block::candidate(1, 1_700_000_000_000, Payload::Transactions(txs), [0u8; 32]);
    let stop = StopSignal::new();

    let mut group = c.benchmark_group("mine_block");
    for difficulty in [1u32, 2, 3, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(difficulty),
            &difficulty,
            |b, &difficulty| {
                b.iter(|| {
                    let _mined = Miner::default()
                        .mine(block.clone(), difficulty, &stop, &SystemClock)
                        .expect("unbounded search finishes");
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
