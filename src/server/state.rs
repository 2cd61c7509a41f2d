use chrono::{DateTime, Utc};
use serde::Serialize;

/// One skipped port during resolution. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortConflictRecord {
    pub port: u16,
    pub occupant_description: String,
    pub timestamp: DateTime<Utc>,
}

impl PortConflictRecord {
    pub fn new(port: u16, occupant_description: &str) -> Self {
        Self {
            port,
            occupant_description: occupant_description.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Where the listener is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ListenerPhase {
    Stopped,
    Resolving { preferred: u16 },
    Bound { port: u16 },
    Serving { port: u16, started_at: DateTime<Utc> },
}

/// Named state changes; the only way `GatewayState` is mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    ResolveStarted { preferred: u16 },
    PortConflict(PortConflictRecord),
    PortBound { port: u16 },
    ServingStarted { at: DateTime<Utc> },
    StartFailed { message: String },
    RequestReceived,
    UpstreamFailed { message: String },
    HealthObserved { healthy: bool },
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayState {
    pub phase: ListenerPhase,
    pub healthy: bool,
    pub request_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub port_conflict_log: Vec<PortConflictRecord>,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self {
            phase: ListenerPhase::Stopped,
            healthy: false,
            request_count: 0,
            error_count: 0,
            last_error: None,
            port_conflict_log: Vec::new(),
        }
    }
}

impl GatewayState {
    pub fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::ResolveStarted { preferred } => {
                self.phase = ListenerPhase::Resolving { preferred };
            }
            Transition::PortConflict(record) => {
                self.port_conflict_log.push(record);
            }
            Transition::PortBound { port } => {
                if matches!(self.phase, ListenerPhase::Resolving { .. }) {
                    self.phase = ListenerPhase::Bound { port };
                }
            }
            Transition::ServingStarted { at } => {
                if let ListenerPhase::Bound { port } = self.phase {
                    self.phase = ListenerPhase::Serving {
                        port,
                        started_at: at,
                    };
                    self.healthy = true;
                }
            }
            Transition::StartFailed { message } => {
                self.phase = ListenerPhase::Stopped;
                self.healthy = false;
                self.last_error = Some(message);
            }
            Transition::RequestReceived => {
                self.request_count += 1;
            }
            Transition::UpstreamFailed { message } => {
                self.error_count += 1;
                self.last_error = Some(message);
            }
            Transition::HealthObserved { healthy } => {
                if self.is_running() {
                    self.healthy = healthy;
                }
            }
            Transition::Stopped => {
                // conflict history outlives the run for diagnostics
                let port_conflict_log = std::mem::take(&mut self.port_conflict_log);
                *self = GatewayState {
                    port_conflict_log,
                    ..GatewayState::default()
                };
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, ListenerPhase::Serving { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.phase, ListenerPhase::Stopped)
    }

    pub fn bound_port(&self) -> Option<u16> {
        match self.phase {
            ListenerPhase::Bound { port } | ListenerPhase::Serving { port, .. } => Some(port),
            _ => None,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self.phase {
            ListenerPhase::Serving { started_at, .. } => Some(started_at),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> GatewayStatus {
        GatewayStatus {
            running: self.is_running(),
            healthy: self.healthy,
            phase: self.phase,
            bound_port: self.bound_port(),
            started_at: self.started_at(),
            uptime_secs: self
                .started_at()
                .map(|at| (Utc::now() - at).num_seconds().max(0) as u64)
                .unwrap_or(0),
            request_count: self.request_count,
            error_count: self.error_count,
            last_error: self.last_error.clone(),
            port_conflict_log: self.port_conflict_log.clone(),
        }
    }
}

/// Read-only view handed to front ends and the metrics endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayStatus {
    pub running: bool,
    pub healthy: bool,
    pub phase: ListenerPhase,
    pub bound_port: Option<u16>,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
    pub request_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub port_conflict_log: Vec<PortConflictRecord>,
}
