//! PostgreSQL integration tests for the bus.
//!
//! These tests need Docker and are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p event-bus --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use event_bus::{BusConfig, Consumer, ConsumerConfig, EventBus, EventBusExt, PostgresEventBus};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresEventBus::new(pool.clone(), BusConfig::default())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_bus(partitions: u32) -> PostgresEventBus {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE bus_messages, consumer_offsets")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventBus::new(
        pool,
        BusConfig {
            partitions,
            ..BusConfig::default()
        },
    )
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn publish_and_fetch_in_order() {
    let bus = get_test_bus(1).await;

    for i in 0..3u8 {
        let delivery = bus.publish("product", "product-created", vec![i]).await.unwrap();
        assert_eq!(delivery.offset, i64::from(i));
    }

    let messages = bus.fetch("product", 0, 0, 10).await.unwrap();
    let values: Vec<u8> = messages.iter().map(|m| m.value[0]).collect();
    assert_eq!(values, vec![0, 1, 2]);
    assert_eq!(bus.end_offset("product", 0).await.unwrap(), 3);
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn commit_is_persisted_per_group() {
    let bus = get_test_bus(1).await;
    bus.publish("inventory", "inventory-created-failed", b"{}".to_vec())
        .await
        .unwrap();

    assert_eq!(bus.committed_offset("g", "inventory", 0).await.unwrap(), None);
    bus.commit("g", "inventory", 0, 1).await.unwrap();
    bus.commit("g", "inventory", 0, 1).await.unwrap();
    assert_eq!(bus.committed_offset("g", "inventory", 0).await.unwrap(), Some(1));
    assert_eq!(bus.lag("g", "inventory").await.unwrap(), 0);
    assert_eq!(bus.lag("other", "inventory").await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn concurrent_publishes_get_dense_offsets() {
    let bus = get_test_bus(1).await;

    let mut tasks = Vec::new();
    for i in 0..20u8 {
        let bus = bus.clone();
        tasks.push(tokio::spawn(async move {
            bus.publish("product", "product-created", vec![i]).await.unwrap()
        }));
    }
    let mut offsets = Vec::new();
    for task in tasks {
        offsets.push(task.await.unwrap().offset);
    }
    offsets.sort_unstable();

    assert_eq!(offsets, (0..20).collect::<Vec<i64>>());
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn consumer_resumes_from_committed_offset() {
    let bus = get_test_bus(2).await;
    for key in ["a", "b", "c", "d"] {
        bus.publish("product", key, key.as_bytes().to_vec()).await.unwrap();
    }

    let mut first = Consumer::new(bus.clone(), "product", ConsumerConfig::new("g"));
    let m = first.poll().await.unwrap().unwrap();
    first.commit(&m).await.unwrap();

    let mut second = Consumer::new(bus.clone(), "product", ConsumerConfig::new("g"));
    let mut rest = 0;
    while let Some(message) = second.poll().await.unwrap() {
        assert_ne!(message, m);
        rest += 1;
    }
    assert_eq!(rest, 3);
}
