use std::time::Duration;

use serde_json::json;

use crate::error::{GatewayError, ProxyError, TranslationError};
use crate::handlers::new_request_id;
use crate::http::{CircuitBreaker, CircuitState, upstream_messages_url};
use crate::port::{is_self_identifying, probe_host};
use crate::translate::OutboundError;

#[test]
fn messages_url_handles_versioned_and_bare_bases() {
    assert_eq!(
        upstream_messages_url("https://up.example/v1"),
        "https://up.example/v1/messages"
    );
    assert_eq!(
        upstream_messages_url("https://up.example/v1/"),
        "https://up.example/v1/messages"
    );
    assert_eq!(
        upstream_messages_url("https://up.example"),
        "https://up.example/v1/messages"
    );
}

#[test]
fn breaker_opens_after_threshold_and_recovers() {
    let breaker = CircuitBreaker::new(3, Duration::from_millis(0));

    breaker.record_failure();
    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Closed);
    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);

    // zero reset window: the next call is the half-open trial
    assert!(breaker.allow_request());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    breaker.record_success();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.consecutive_failures(), 0);
}

#[test]
fn open_breaker_rejects_until_reset_window_passes() {
    let breaker = CircuitBreaker::new(1, Duration::from_secs(60));

    breaker.record_failure();

    assert!(!breaker.allow_request());
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn failed_half_open_trial_reopens() {
    let breaker = CircuitBreaker::new(1, Duration::from_millis(0));
    breaker.record_failure();
    assert!(breaker.allow_request());

    breaker.record_failure();

    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn transport_errors_map_to_documented_statuses() {
    assert_eq!(ProxyError::upstream_unavailable().status_code, 503);
    assert_eq!(ProxyError::upstream_timeout().status_code, 504);
    assert_eq!(ProxyError::upstream_failed("boom").status_code, 502);
    assert_eq!(ProxyError::circuit_open().status_code, 503);

    assert!(ProxyError::upstream_unavailable().is_retryable());
    assert!(ProxyError::upstream_timeout().is_retryable());
    assert!(!ProxyError::upstream_unresolvable().is_retryable());
    assert!(ProxyError::upstream_unresolvable().is_transport());
    assert!(!ProxyError::bad_request("x").is_retryable());
}

#[test]
fn upstream_status_decides_retryability() {
    let envelope = OutboundError::new("busy", "rate_limit_exceeded", "rate_limit_error");

    assert!(ProxyError::from_upstream(envelope.clone(), 429).is_retryable());
    assert!(ProxyError::from_upstream(envelope.clone(), 529).is_retryable());
    assert!(!ProxyError::from_upstream(envelope, 400).is_retryable());
}

#[test]
fn translation_errors_become_client_or_gateway_errors() {
    let bad_request: ProxyError = TranslationError::InvalidRequest("no messages".into()).into();
    let bad_payload: ProxyError = TranslationError::MalformedUpstream("garbage".into()).into();

    assert_eq!(bad_request.status_code, 400);
    assert_eq!(
        serde_json::to_value(bad_request.to_envelope()).unwrap(),
        json!({"error": {"message": "no messages", "type": "invalid_request_error", "code": "invalid_request_error"}})
    );
    assert_eq!(bad_payload.status_code, 502);
    assert_eq!(bad_payload.error_type, "conversion_error");
}

#[test]
fn request_ids_have_expected_shape() {
    let id = new_request_id();
    let parts: Vec<&str> = id.split('_').collect();

    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "req");
    assert!(parts[1].parse::<i64>().is_ok());
    assert_eq!(parts[2].len(), 8);
    assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(id, new_request_id());
}

#[test]
fn self_identification_requires_service_name() {
    assert!(is_self_identifying(
        &json!({"status": "healthy", "service": "dialect-gateway", "port": 8082})
    ));
    assert!(!is_self_identifying(&json!({"status": "healthy"})));
    assert!(!is_self_identifying(
        &json!({"status": "degraded", "service": "dialect-gateway"})
    ));
    assert!(!is_self_identifying(
        &json!({"status": "healthy", "service": "something-else"})
    ));
}

#[test]
fn probe_host_reaches_wildcard_binds_locally() {
    assert_eq!(probe_host("0.0.0.0"), "127.0.0.1");
    assert_eq!(probe_host("::"), "[::1]");
    assert_eq!(probe_host("::1"), "[::1]");
    assert_eq!(probe_host("localhost"), "localhost");
}

#[test]
fn only_lifecycle_errors_are_fatal() {
    assert!(GatewayError::Configuration("no key".into()).is_fatal());
    assert!(GatewayError::PortExhausted { start: 1, end: 2 }.is_fatal());
    assert!(
        GatewayError::RestartExhausted {
            attempts: 3,
            last_error: "bind".into()
        }
        .is_fatal()
    );
    assert!(!GatewayError::AlreadyRunning(8082).is_fatal());
    assert!(!GatewayError::UpstreamTransport("refused".into()).is_fatal());
    assert!(!GatewayError::HealthCheck("probe".into()).is_fatal());
}

#[test]
fn half_open_lets_only_one_trial_through() {
    let breaker = CircuitBreaker::new(1, Duration::from_millis(20));
    breaker.record_failure();
    std::thread::sleep(Duration::from_millis(30));

    assert!(breaker.allow_request());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert!(!breaker.allow_request());
    assert!(!breaker.allow_request());

    breaker.record_success();
    assert!(breaker.allow_request());
    assert!(breaker.allow_request());
}

#[test]
fn stalled_half_open_trial_is_replaced_after_reset_window() {
    let breaker = CircuitBreaker::new(1, Duration::from_millis(20));
    breaker.record_failure();
    std::thread::sleep(Duration::from_millis(30));
    assert!(breaker.allow_request());
    assert!(!breaker.allow_request());

    std::thread::sleep(Duration::from_millis(30));

    assert!(breaker.allow_request());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}
