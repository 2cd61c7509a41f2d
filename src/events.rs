use serde::Serialize;

/// Lifecycle notifications surfaced to whatever front end drives the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum GatewayEvent {
    Started {
        port: u16,
    },
    Stopped,
    Error {
        message: String,
    },
    HealthCheck {
        healthy: bool,
    },
    PortConflict {
        #[serde(rename = "originalPort")]
        original_port: u16,
        #[serde(rename = "newPort")]
        new_port: u16,
        occupant: String,
    },
    RestartFailed {
        attempts: u32,
        error: String,
    },
}

impl GatewayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GatewayEvent::Started { .. } => "started",
            GatewayEvent::Stopped => "stopped",
            GatewayEvent::Error { .. } => "error",
            GatewayEvent::HealthCheck { .. } => "health-check",
            GatewayEvent::PortConflict { .. } => "port-conflict",
            GatewayEvent::RestartFailed { .. } => "restart-failed",
        }
    }
}

/// Logs every event until the channel closes. Used by the CLI front end.
pub async fn log_events(mut rx: tokio::sync::broadcast::Receiver<GatewayEvent>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match rx.recv().await {
            Ok(event) => {
                let payload = serde_json::to_string(&event).unwrap_or_default();
                match &event {
                    GatewayEvent::Error { .. } | GatewayEvent::RestartFailed { .. } => {
                        log::error!("event {}: {}", event.name(), payload)
                    }
                    GatewayEvent::PortConflict { .. } | GatewayEvent::HealthCheck { healthy: false } => {
                        log::warn!("event {}: {}", event.name(), payload)
                    }
                    _ => log::info!("event {}: {}", event.name(), payload),
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("event log lagged, {} events skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
