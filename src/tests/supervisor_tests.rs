use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::events::GatewayEvent;
use crate::server::{HealthSupervisor, SupervisedListener};

/// Scriptable listener: reports `healthy`, and succeeds starting once
/// `starts_before_success` attempts have failed.
struct FakeListener {
    healthy: AtomicBool,
    starts: AtomicU32,
    stops: AtomicU32,
    starts_before_success: Option<u32>,
    events: Mutex<Vec<GatewayEvent>>,
}

impl FakeListener {
    fn new(healthy: bool, starts_before_success: Option<u32>) -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(healthy),
            starts: AtomicU32::new(0),
            stops: AtomicU32::new(0),
            starts_before_success,
            events: Mutex::new(Vec::new()),
        })
    }

    fn events(&self) -> Vec<GatewayEvent> {
        self.events.lock().unwrap().clone()
    }

    fn restart_failures(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, GatewayEvent::RestartFailed { .. }))
            .count()
    }
}

impl SupervisedListener for FakeListener {
    fn adopt_supervisor(&self, _token: CancellationToken) {}

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn probe_health(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn record_health(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    async fn shutdown_listener(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.healthy.store(false, Ordering::SeqCst);
    }

    async fn start_listener(&self, config: GatewayConfig) -> Result<u16, GatewayError> {
        let attempt = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        match self.starts_before_success {
            Some(failures) if attempt > failures => {
                self.healthy.store(true, Ordering::SeqCst);
                Ok(config.port)
            }
            _ => Err(GatewayError::Bind {
                address: format!("127.0.0.1:{}", config.port),
                reason: "address in use".to_string(),
            }),
        }
    }

    fn emit(&self, event: GatewayEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn fast_config(max_retries: u32) -> GatewayConfig {
    GatewayConfig {
        api_key: "k".to_string(),
        upstream_base_url: "https://up.example/v1".to_string(),
        auto_restart: true,
        max_retries,
        retry_delay_ms: 5,
        health_check_interval_ms: 10,
        ..GatewayConfig::default()
    }
}

#[tokio::test]
async fn exhausted_restarts_report_once_and_stop_supervision() {
    let listener = FakeListener::new(false, None);

    let handle = HealthSupervisor::attach_to(listener.clone(), fast_config(3));
    let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .unwrap();

    match result {
        Err(GatewayError::RestartExhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected RestartExhausted, got {:?}", other),
    }
    assert_eq!(listener.starts.load(Ordering::SeqCst), 3);
    assert_eq!(listener.restart_failures(), 1);
    assert!(matches!(
        listener.events().last(),
        Some(GatewayEvent::RestartFailed { attempts: 3, .. })
    ));
    assert!(!listener.healthy.load(Ordering::SeqCst));
}

#[tokio::test]
async fn recovery_on_second_attempt_is_not_a_failure() {
    let listener = FakeListener::new(false, Some(1));

    let handle = HealthSupervisor::attach_to(listener.clone(), fast_config(3));
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!handle.is_finished());
    assert_eq!(listener.starts.load(Ordering::SeqCst), 2);
    assert_eq!(listener.restart_failures(), 0);
    assert!(
        listener
            .events()
            .contains(&GatewayEvent::HealthCheck { healthy: true })
    );

    handle.cancel();
    let joined = tokio::time::timeout(Duration::from_secs(2), handle.join()).await;
    assert!(matches!(joined, Ok(Ok(()))));
}

#[tokio::test]
async fn healthy_listener_only_gets_health_checks() {
    let listener = FakeListener::new(true, None);

    let handle = HealthSupervisor::attach_to(listener.clone(), fast_config(3));
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();
    let joined = tokio::time::timeout(Duration::from_secs(2), handle.join()).await;

    assert!(matches!(joined, Ok(Ok(()))));
    assert_eq!(listener.starts.load(Ordering::SeqCst), 0);
    assert_eq!(listener.stops.load(Ordering::SeqCst), 0);
    let events = listener.events();
    assert!(!events.is_empty());
    assert!(
        events
            .iter()
            .all(|e| *e == GatewayEvent::HealthCheck { healthy: true })
    );
}

#[tokio::test]
async fn without_auto_restart_unhealthy_listener_is_left_alone() {
    let listener = FakeListener::new(false, None);
    let config = GatewayConfig {
        auto_restart: false,
        ..fast_config(3)
    };

    let handle = HealthSupervisor::attach_to(listener.clone(), config);
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), handle.join()).await;

    assert_eq!(listener.starts.load(Ordering::SeqCst), 0);
    assert_eq!(listener.restart_failures(), 0);
    assert!(
        listener
            .events()
            .contains(&GatewayEvent::HealthCheck { healthy: false })
    );
}

#[tokio::test]
async fn cancel_during_restart_wait_ends_quietly() {
    let listener = FakeListener::new(false, None);
    let config = GatewayConfig {
        retry_delay_ms: 60_000,
        ..fast_config(3)
    };

    let handle = HealthSupervisor::attach_to(listener.clone(), config);
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();
    let joined = tokio::time::timeout(Duration::from_secs(2), handle.join()).await;

    assert!(matches!(joined, Ok(Ok(()))));
    assert_eq!(listener.stops.load(Ordering::SeqCst), 1);
    assert_eq!(listener.starts.load(Ordering::SeqCst), 0);
    assert_eq!(listener.restart_failures(), 0);
}
