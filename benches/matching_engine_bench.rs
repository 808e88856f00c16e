use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use matchbook::{IOC, OrderBook, Side, VANILLA};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Seeds a book with `levels` ask levels of one order each.
fn seeded_book(levels: u64) -> OrderBook {
    let mut book = OrderBook::new();
    for i in 0..levels {
        book.submit_limit_order(
            Side::Ask,
            dec!(1.0),
            Decimal::from(100 + i),
            i + 1,
            VANILLA,
            Some(1),
        )
        .unwrap();
    }
    book
}

fn matching_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching_engine");

    // Benchmark a crossing limit order that sweeps several levels
    group.bench_function("sweep_five_levels", |b| {
        b.iter_batched(
            || seeded_book(10),
            |mut book| {
                let result = book
                    .submit_limit_order(Side::Bid, dec!(5.0), dec!(110), 1000, IOC, None)
                    .unwrap();
                black_box(result);
            },
            BatchSize::SmallInput,
        );
    });

    // Benchmark market orders against a deep level
    group.bench_function("market_order_by_size", |b| {
        b.iter_batched(
            || {
                let mut book = OrderBook::new();
                for i in 0..50u64 {
                    book.submit_limit_order(Side::Ask, dec!(1.0), dec!(100), i + 1, VANILLA, None)
                        .unwrap();
                }
                book
            },
            |mut book| {
                let result = book
                    .submit_market_order(Side::Bid, dec!(25.0), None)
                    .unwrap();
                black_box(result);
            },
            BatchSize::SmallInput,
        );
    });

    // Benchmark market-by-funds execution across levels
    group.bench_function("market_order_by_funds", |b| {
        b.iter_batched(
            || seeded_book(20),
            |mut book| {
                let result = book
                    .submit_market_order_by_funds(Side::Bid, dec!(500.0), None)
                    .unwrap();
                black_box(result);
            },
            BatchSize::SmallInput,
        );
    });

    // Benchmark a mixed submit/cancel/cross workload
    group.bench_function("mixed_workload", |b| {
        b.iter_batched(
            || (seeded_book(10), StdRng::seed_from_u64(7)),
            |(mut book, mut rng)| {
                for i in 0..20u64 {
                    let id = 2000 + i;
                    let price = Decimal::from(95 + rng.gen_range(0..10));
                    if rng.gen_bool(0.7) {
                        let _ = book.submit_limit_order(
                            Side::Bid,
                            dec!(1.0),
                            price,
                            id,
                            VANILLA,
                            None,
                        );
                    } else {
                        let _ = book.submit_market_order(Side::Bid, dec!(1.0), None);
                    }
                }
                black_box(book);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, matching_benchmark);
criterion_main!(benches);
