// Insert operation benchmarks
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::Duration;

use oxidedb::bson::DocumentBuilder;

mod common;
use common::*;

fn random_string(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

#[derive(Debug, Clone, Copy)]
enum DocumentSize {
    Small,
    Medium,
    Large,
}

fn generate_document(size: DocumentSize) -> oxidedb::bson::Document {
    let mut b = DocumentBuilder::new();
    match size {
        DocumentSize::Small => {
            b.append_str("name", random_string(10))
                .append_i32("value", rand::thread_rng().gen_range(1..1000));
        }
        DocumentSize::Medium => {
            b.append_str("name", random_string(10))
                .append_str("email", format!("{}@example.com", random_string(8)))
                .append_i32("age", rand::thread_rng().gen_range(18..80));
            let tags: Vec<oxidedb::bson::Value> =
                (0..5).map(|_| oxidedb::bson::Value::from(random_string(5))).collect();
            b.append_array("tags", tags);
        }
        DocumentSize::Large => {
            b.append_str("name", random_string(20)).append_str("description", random_string(200));
            let data: Vec<oxidedb::bson::Value> =
                (0..100).map(|_| oxidedb::bson::Value::from(random_string(30))).collect();
            b.append_array("data", data);
        }
    }
    b.build()
}

fn bench_insert_single(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("insert_single");
    group.measurement_time(Duration::from_secs(10));

    for size in [DocumentSize::Small, DocumentSize::Medium, DocumentSize::Large] {
        let size_name = format!("{:?}", size);

        group.bench_with_input(BenchmarkId::new("size", &size_name), &size, |b, &doc_size| {
            b.to_async(&rt).iter(|| async {
                let mut stream = setup_server().await;
                let doc = generate_document(doc_size);
                send_insert(&mut stream, "bench", "bench_db", vec![doc], 1).await;
                let response = read_reply(&mut stream).await;
                black_box(response);
            });
        });
    }

    group.finish();
}

fn bench_insert_batch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("insert_batch");
    group.measurement_time(Duration::from_secs(10));

    for batch_size in [10, 50, 100, 500] {
        group.bench_with_input(BenchmarkId::new("batch_size", batch_size), &batch_size, |b, &size| {
            b.to_async(&rt).iter(|| async {
                let mut stream = setup_server().await;
                let docs: Vec<_> = (0..size).map(|_| generate_document(DocumentSize::Medium)).collect();
                send_insert(&mut stream, "bench", "bench_db", docs, 1).await;
                let response = read_reply(&mut stream).await;
                black_box(response);
            });
        });
    }

    group.finish();
}

criterion_group!(insert_benches, bench_insert_single, bench_insert_batch);
criterion_main!(insert_benches);
