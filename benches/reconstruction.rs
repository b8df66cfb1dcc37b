//! Benchmarks for book reconstruction performance.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use crypto_book_reconstructor::checksum::compute_checksum;
use crypto_book_reconstructor::{
    OrderLevelBook, OrderLevelMetrics, OrderLine, PriceLevel, PriceLevelBook, PriceLevelMetrics,
    Side,
};

fn create_level_updates(count: usize) -> Vec<(Vec<PriceLevel>, Vec<PriceLevel>)> {
    let mut updates = Vec::with_capacity(count);

    for i in 0..count {
        let offset = (i % 25) as f64 * 0.5;
        // Every fourth update removes the level it touches.
        let quantity = if i % 4 == 3 { 0.0 } else { ((i % 100) + 1) as f64 / 10.0 };

        if i % 2 == 0 {
            updates.push((vec![PriceLevel::new(100.0 - offset, quantity)], Vec::new()));
        } else {
            updates.push((Vec::new(), vec![PriceLevel::new(100.5 + offset, quantity)]));
        }
    }

    updates
}

fn create_order_events(count: usize) -> Vec<(Side, OrderLine)> {
    let mut events = Vec::with_capacity(count);

    for i in 0..count {
        let side = if i % 2 == 0 { Side::Bid } else { Side::Ask };
        let offset = (i % 10) as f64 * 0.01;
        let price = match side {
            Side::Bid => 100.0 - offset,
            Side::Ask => 100.01 + offset,
        };
        let id = format!("o{}", i / 3);

        let line = match i % 3 {
            0 => OrderLine::add(id, price, ((i % 100) + 1) as f64),
            1 => OrderLine::modify(id, price, ((i % 50) + 1) as f64),
            _ => OrderLine::delete(id),
        };
        events.push((side, line));
    }

    events
}

fn populated_price_book() -> PriceLevelBook {
    let bids: Vec<_> = (0..50).map(|i| PriceLevel::new(100.0 - i as f64 * 0.5, 1.0 + i as f64)).collect();
    let asks: Vec<_> = (0..50).map(|i| PriceLevel::new(100.5 + i as f64 * 0.5, 1.0 + i as f64)).collect();

    let mut book = PriceLevelBook::new("BENCH");
    book.apply_snapshot(&bids, &asks);
    book
}

fn populated_order_book() -> OrderLevelBook {
    let bids: Vec<_> = (0..500)
        .map(|i| OrderLine::new(format!("b{i}"), 100.0 - (i % 20) as f64 * 0.01, 1.0))
        .collect();
    let asks: Vec<_> = (0..500)
        .map(|i| OrderLine::new(format!("a{i}"), 100.01 + (i % 20) as f64 * 0.01, 1.0))
        .collect();

    let mut book = OrderLevelBook::new("BENCH");
    book.apply_snapshot(&bids, &asks);
    book
}

fn bench_reconstruction(c: &mut Criterion) {
    let updates = create_level_updates(10_000);
    let events = create_order_events(10_000);

    let mut group = c.benchmark_group("reconstruction");
    group.throughput(Throughput::Elements(updates.len() as u64));

    group.bench_function("price_level_updates", |b| {
        b.iter(|| {
            let mut book = populated_price_book();
            for (bids, asks) in &updates {
                black_box(book.apply_update(bids, asks));
            }
        })
    });

    group.bench_function("order_level_events", |b| {
        b.iter(|| {
            let mut book = OrderLevelBook::new("BENCH");
            for (side, line) in &events {
                black_box(book.apply_event(*side, line));
            }
        })
    });

    group.finish();

    // Every order at one price, cancelled from the front of the queue.
    let deep: Vec<_> = (0..20_000)
        .map(|i| OrderLine::new(format!("d{i}"), 100.0, 1.0))
        .collect();
    let cancels: Vec<_> = (0..5_000).map(|i| OrderLine::delete(format!("d{i}"))).collect();

    let mut group = c.benchmark_group("deep_level");
    group.throughput(Throughput::Elements(cancels.len() as u64));
    group.sample_size(10);

    group.bench_function("front_cancels", |b| {
        b.iter(|| {
            let mut book = OrderLevelBook::new("BENCH");
            book.apply_snapshot(&deep, &[]);
            black_box(book.apply_update(&cancels, &[]))
        })
    });

    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let book = populated_price_book();
    let bids = book.top_n_bids(10);
    let asks = book.top_n_asks(10);

    let mut group = c.benchmark_group("checksum");

    group.bench_function("compute_checksum", |b| {
        b.iter(|| black_box(compute_checksum(black_box(&asks), black_box(&bids))))
    });

    group.bench_function("book_checksum", |b| b.iter(|| black_box(book.compute_checksum())));

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let price_book = populated_price_book();
    let order_book = populated_order_book();

    let mut group = c.benchmark_group("metrics");

    group.bench_function("price_level_metrics", |b| {
        b.iter(|| black_box(PriceLevelMetrics::calculate(&price_book, "2024-01-01 00:00:00.000")))
    });

    group.bench_function("order_level_metrics", |b| {
        b.iter(|| {
            black_box(OrderLevelMetrics::calculate(
                &order_book,
                "2024-01-01 00:00:00.000",
                1.0,
            ))
        })
    });

    group.bench_function("volume_within_bps", |b| {
        b.iter(|| black_box(order_book.volume_within_bps(100.005, 10.0, Side::Bid)))
    });

    group.finish();
}

criterion_group!(benches, bench_reconstruction, bench_checksum, bench_metrics);
criterion_main!(benches);
