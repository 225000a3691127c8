use criterion::{Criterion, criterion_group, criterion_main};
use event_bus::{Consumer, ConsumerConfig, EventBus, InMemoryEventBus};

fn payload() -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "product_id": "00000000-0000-0000-0000-000000000001",
        "quantity": 5
    }))
    .unwrap()
}

fn bench_publish_single(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_bus/publish_single", |b| {
        b.iter(|| {
            rt.block_on(async {
                let bus = InMemoryEventBus::new();
                bus.publish("product", "product-created", payload())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_publish_then_consume_100(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_bus/publish_then_consume_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let bus = InMemoryEventBus::new();
                for _ in 0..100 {
                    bus.publish("product", "product-created", payload())
                        .await
                        .unwrap();
                }

                let mut consumer =
                    Consumer::new(bus.clone(), "product", ConsumerConfig::new("bench"));
                let mut consumed = 0;
                while let Some(message) = consumer.poll().await.unwrap() {
                    consumer.commit(&message).await.unwrap();
                    consumed += 1;
                }
                assert_eq!(consumed, 100);
            });
        });
    });
}

criterion_group!(benches, bench_publish_single, bench_publish_then_consume_100);
criterion_main!(benches);
