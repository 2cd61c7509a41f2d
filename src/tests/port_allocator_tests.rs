use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use warp::Filter;

use crate::error::GatewayError;
use crate::port::PortAllocator;
use crate::tests::support::{free_port, free_port_pair, test_client};

fn allocator() -> PortAllocator {
    PortAllocator::new(test_client(), "127.0.0.1").with_probe_timeout(Duration::from_millis(300))
}

#[tokio::test]
async fn free_preferred_port_is_returned_as_is() {
    let port = free_port();

    let resolution = allocator().resolve_port(port, port).await.unwrap();

    assert_eq!(resolution.port, port);
    assert!(resolution.conflicts.is_empty());
    // the probe listener must not be kept open
    assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[tokio::test]
async fn foreign_occupant_is_skipped_and_recorded() {
    let port = free_port_pair();
    let _occupant = std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();

    let resolution = allocator().resolve_port(port, port + 1).await.unwrap();

    assert_eq!(resolution.port, port + 1);
    assert_eq!(resolution.conflicts.len(), 1);
    assert_eq!(resolution.conflicts[0].port, port);
    assert_eq!(resolution.conflicts[0].occupant_description, "unknown process");
}

#[tokio::test]
async fn exhausted_range_fails_with_bounds() {
    let port = free_port();
    let _occupant = std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();

    let result = allocator().resolve_port(port, port).await;

    match result {
        Err(GatewayError::PortExhausted { start, end }) => {
            assert_eq!(start, port);
            assert_eq!(end, port);
        }
        other => panic!("expected PortExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn http_occupant_without_identity_is_not_stopped() {
    let port = free_port_pair();
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .unwrap();
    let health = warp::path!("health").map(|| {
        warp::reply::json(&serde_json::json!({"status": "healthy", "service": "someone-else"}))
    });
    let stopped = Arc::new(AtomicBool::new(false));
    let stop_flag = stopped.clone();
    let stop = warp::path!("stop").map(move || {
        stop_flag.store(true, Ordering::SeqCst);
        "ok"
    });
    let token = CancellationToken::new();
    tokio::spawn(
        warp::serve(health.or(stop))
            .incoming(listener)
            .graceful(token.clone().cancelled_owned())
            .run(),
    );

    let resolution = allocator().resolve_port(port, port + 1).await.unwrap();

    assert_eq!(resolution.port, port + 1);
    assert!(!stopped.load(Ordering::SeqCst));
    token.cancel();
}
