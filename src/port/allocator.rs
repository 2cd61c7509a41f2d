use std::io::ErrorKind;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;

use crate::constants::{
    GATEWAY_SERVICE_NAME, HANDOFF_GRACE_MS, SELF_PROBE_TIMEOUT_MS, SELF_STOP_TIMEOUT_MS,
};
use crate::error::GatewayError;
use crate::server::state::PortConflictRecord;

const OCCUPANT_UNKNOWN: &str = "unknown process";
const OCCUPANT_STALE_SELF: &str = "previous gateway instance (did not release port)";

/// Outcome of a successful port resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortResolution {
    pub port: u16,
    pub conflicts: Vec<PortConflictRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BindProbe {
    Free,
    InUse,
    Unavailable,
    /// The host itself cannot be bound; trying other ports is pointless.
    Unbindable(String),
}

/// Picks the port the gateway binds to, handing off from a previous instance
/// of itself when one is found on the preferred port.
///
/// Self-identification is a best-effort HTTP probe: another process can take
/// the port between the probe and the rebind, so a successful resolution is a
/// strong hint, not a reservation.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    client: reqwest::Client,
    host: String,
    probe_timeout: Duration,
    stop_timeout: Duration,
    handoff_grace: Duration,
}

impl PortAllocator {
    pub fn new(client: reqwest::Client, host: &str) -> Self {
        Self {
            client,
            host: host.to_string(),
            probe_timeout: Duration::from_millis(SELF_PROBE_TIMEOUT_MS),
            stop_timeout: Duration::from_millis(SELF_STOP_TIMEOUT_MS),
            handoff_grace: Duration::from_millis(HANDOFF_GRACE_MS),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_handoff_grace(mut self, grace: Duration) -> Self {
        self.handoff_grace = grace;
        self
    }

    pub async fn resolve_port(
        &self,
        preferred: u16,
        max_port: u16,
    ) -> Result<PortResolution, GatewayError> {
        let mut conflicts = Vec::new();
        let mut port = preferred;

        loop {
            let occupant = match self.probe_bind(port).await {
                BindProbe::Free => return Ok(PortResolution { port, conflicts }),
                BindProbe::Unbindable(reason) => {
                    return Err(GatewayError::Bind {
                        address: format!("{}:{}", self.host, port),
                        reason,
                    });
                }
                BindProbe::Unavailable => OCCUPANT_UNKNOWN,
                BindProbe::InUse if self.is_previous_instance(port).await => {
                    log::info!(
                        "port {} held by a previous gateway instance, asking it to stop",
                        port
                    );
                    self.request_stop(port).await;
                    tokio::time::sleep(self.handoff_grace).await;

                    if self.probe_bind(port).await == BindProbe::Free {
                        log::info!("port {} released by previous instance", port);
                        return Ok(PortResolution { port, conflicts });
                    }
                    OCCUPANT_STALE_SELF
                }
                BindProbe::InUse => OCCUPANT_UNKNOWN,
            };

            log::warn!("port {} occupied by {}", port, occupant);
            conflicts.push(PortConflictRecord::new(port, occupant));

            if port >= max_port {
                return Err(GatewayError::PortExhausted {
                    start: preferred,
                    end: max_port,
                });
            }
            port += 1;
        }
    }

    async fn probe_bind(&self, port: u16) -> BindProbe {
        match TcpListener::bind((self.host.as_str(), port)).await {
            Ok(listener) => {
                drop(listener);
                BindProbe::Free
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => BindProbe::InUse,
            Err(e) if e.kind() == ErrorKind::AddrNotAvailable => BindProbe::Unbindable(e.to_string()),
            Err(e) => {
                log::debug!("port {} cannot be bound: {}", port, e);
                BindProbe::Unavailable
            }
        }
    }

    async fn is_previous_instance(&self, port: u16) -> bool {
        let url = format!("{}/health", self.occupant_base_url(port));
        let response = match self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                log::debug!("occupant of {} answered {}", port, response.status());
                return false;
            }
            Err(e) => {
                log::debug!("occupant of {} did not answer health probe: {}", port, e);
                return false;
            }
        };

        match response.json::<Value>().await {
            Ok(body) => is_self_identifying(&body),
            Err(_) => false,
        }
    }

    async fn request_stop(&self, port: u16) {
        let url = format!("{}/stop", self.occupant_base_url(port));
        if let Err(e) = self
            .client
            .post(&url)
            .timeout(self.stop_timeout)
            .send()
            .await
        {
            log::debug!("stop request to port {} failed (ignored): {}", port, e);
        }
    }

    fn occupant_base_url(&self, port: u16) -> String {
        format!("http://{}:{}", probe_host(&self.host), port)
    }
}

/// Whether a health payload was produced by this gateway.
pub fn is_self_identifying(body: &Value) -> bool {
    body.get("status").and_then(|s| s.as_str()) == Some("healthy")
        && body.get("service").and_then(|s| s.as_str()) == Some(GATEWAY_SERVICE_NAME)
}

/// Address to reach a listener bound on `host` from this machine, in URL form.
pub fn probe_host(host: &str) -> String {
    match host {
        "0.0.0.0" => "127.0.0.1".to_string(),
        "::" | "[::]" => "[::1]".to_string(),
        other if other.contains(':') && !other.starts_with('[') => format!("[{}]", other),
        other => other.to_string(),
    }
}
