// Find/Query operation benchmarks
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use std::time::Duration;

use oxidedb::bson::DocumentBuilder;

mod common;
use common::*;

async fn setup_server_with_data(doc_count: usize) -> tokio::net::TcpStream {
    let mut stream = setup_server().await;

    let batch_size = 100;
    let mut inserted = 0;
    let mut request_id = 1;
    while inserted < doc_count {
        let to_insert = std::cmp::min(batch_size, doc_count - inserted);
        let docs: Vec<_> = (0..to_insert)
            .map(|i| {
                let mut b = DocumentBuilder::new();
                b.append_i32("index", (inserted + i) as i32)
                    .append_str("name", format!("user_{}", inserted + i))
                    .append_i32("age", rand::thread_rng().gen_range(18..80))
                    .append_f64("score", rand::thread_rng().gen_range(0.0..100.0))
                    .append_bool("active", rand::thread_rng().gen_bool(0.8));
                b.build()
            })
            .collect();

        send_insert(&mut stream, "bench", "bench_db", docs, request_id).await;
        read_reply(&mut stream).await;
        request_id += 1;
        inserted += to_insert;
    }

    stream
}

fn find_command(filter: oxidedb::bson::Document, limit: Option<i32>) -> oxidedb::bson::Document {
    let mut b = DocumentBuilder::new();
    b.append_str("find", "bench").append_document("filter", filter).append_str("$db", "bench_db");
    if let Some(n) = limit {
        b.append_i32("limit", n);
    }
    b.build()
}

fn bench_find_by_id(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("find_by_id");
    group.measurement_time(Duration::from_secs(10));

    for &collection_size in &[100, 1000, 10000] {
        group.bench_with_input(BenchmarkId::new("collection_size", collection_size), &collection_size, |b, &size| {
            b.to_async(&rt).iter(|| async {
                let mut stream = setup_server_with_data(size).await;
                let mut filter = DocumentBuilder::new();
                filter.append_i32("index", 0);
                let find = find_command(filter.build(), None);
                send_command(&mut stream, find, 99).await;
                let response = read_reply(&mut stream).await;
                black_box(response);
            });
        });
    }

    group.finish();
}

fn bench_find_with_filter(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("find_with_filter");
    group.measurement_time(Duration::from_secs(10));
    let collection_size = 1000;

    group.bench_function("equality", |b| {
        b.to_async(&rt).iter(|| async {
            let mut stream = setup_server_with_data(collection_size).await;
            let mut filter = DocumentBuilder::new();
            filter.append_bool("active", true);
            let find = find_command(filter.build(), None);
            send_command(&mut stream, find, 99).await;
            let response = read_reply(&mut stream).await;
            black_box(response);
        });
    });

    group.finish();
}

fn bench_find_with_projection(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("find_with_projection");
    group.measurement_time(Duration::from_secs(10));
    let collection_size = 1000;

    group.bench_function("limited_batch", |b| {
        b.to_async(&rt).iter(|| async {
            let mut stream = setup_server_with_data(collection_size).await;
            let find = find_command(oxidedb::bson::Document::empty(), Some(100));
            send_command(&mut stream, find, 99).await;
            let response = read_reply(&mut stream).await;
            black_box(response);
        });
    });

    group.finish();
}

criterion_group!(
    find_benches,
    bench_find_by_id,
    bench_find_with_filter,
    bench_find_with_projection
);
criterion_main!(find_benches);
