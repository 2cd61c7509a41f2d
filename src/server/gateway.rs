use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{GatewayConfig, validate_config};
use crate::constants::{GRACEFUL_SHUTDOWN_SECS, HANDOFF_GRACE_MS, HEALTH_PROBE_TIMEOUT_MS};
use crate::error::GatewayError;
use crate::events::GatewayEvent;
use crate::handlers::GatewayContext;
use crate::http::{CircuitBreaker, UpstreamClient};
use crate::port::{PortAllocator, probe_host};
use crate::server::routes::gateway_filter;
use crate::server::state::{GatewayState, GatewayStatus, Transition};
use crate::server::supervisor::SupervisedListener;

const EVENT_CHANNEL_CAPACITY: usize = 64;

struct RunningListener {
    port: u16,
    host: String,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// The gateway listener: owns the bound socket, the serve task and the
/// state every handler reports into.
///
/// Start and stop are serialized by `lifecycle`; handlers only ever touch
/// `state`, and never hold it across an await.
pub struct Gateway {
    client: reqwest::Client,
    state: Arc<Mutex<GatewayState>>,
    events: broadcast::Sender<GatewayEvent>,
    lifecycle: Mutex<Option<RunningListener>>,
    supervisor: std::sync::Mutex<Option<CancellationToken>>,
    breaker: Arc<CircuitBreaker>,
    handoff_grace: Duration,
    self_ref: Weak<Gateway>,
}

impl Gateway {
    pub fn new() -> Result<Arc<Self>, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| GatewayError::Configuration(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self::with_client(
            client,
            Duration::from_millis(HANDOFF_GRACE_MS),
        ))
    }

    pub fn with_client(client: reqwest::Client, handoff_grace: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new_cyclic(|self_ref| Self {
            client,
            state: Arc::new(Mutex::new(GatewayState::default())),
            events,
            lifecycle: Mutex::new(None),
            supervisor: std::sync::Mutex::new(None),
            breaker: Arc::new(CircuitBreaker::default()),
            handoff_grace,
            self_ref: self_ref.clone(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> GatewayStatus {
        self.state.lock().await.snapshot()
    }

    /// Resolves a port, binds it and starts serving. Returns the bound port.
    pub async fn start(&self, config: GatewayConfig) -> Result<u16, GatewayError> {
        let mut slot = self.lifecycle.lock().await;
        self.start_locked(&mut slot, config).await
    }

    /// Stops serving and ends supervision. A no-op when already stopped.
    pub async fn stop(&self) {
        if let Some(token) = self.lock_supervisor().take() {
            token.cancel();
        }
        self.shutdown_listener().await;
    }

    fn publish(&self, event: GatewayEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    async fn apply(&self, transition: Transition) {
        self.state.lock().await.apply(transition);
    }

    fn lock_supervisor(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.supervisor.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn fail_start(&self, error: GatewayError) -> GatewayError {
        log::error!("gateway failed to start: {}", error);
        self.apply(Transition::StartFailed {
            message: error.to_string(),
        })
        .await;
        self.publish(GatewayEvent::Error {
            message: error.to_string(),
        });
        error
    }

    async fn start_locked(
        &self,
        slot: &mut Option<RunningListener>,
        config: GatewayConfig,
    ) -> Result<u16, GatewayError> {
        if let Some(running) = slot.as_ref() {
            return Err(GatewayError::AlreadyRunning(running.port));
        }
        if let Err(e) = validate_config(&config) {
            self.publish(GatewayEvent::Error {
                message: e.to_string(),
            });
            return Err(e);
        }

        self.apply(Transition::ResolveStarted {
            preferred: config.port,
        })
        .await;

        let allocator = PortAllocator::new(self.client.clone(), &config.host)
            .with_handoff_grace(self.handoff_grace);
        let resolution = match allocator.resolve_port(config.port, config.max_port).await {
            Ok(resolution) => resolution,
            Err(e) => return Err(self.fail_start(e).await),
        };

        if let Some(conflict) = resolution.conflicts.last() {
            self.publish(GatewayEvent::PortConflict {
                original_port: config.port,
                new_port: resolution.port,
                occupant: conflict.occupant_description.clone(),
            });
        }
        {
            let mut state = self.state.lock().await;
            for record in resolution.conflicts {
                state.apply(Transition::PortConflict(record));
            }
        }

        let port = resolution.port;
        let listener = match TcpListener::bind((config.host.as_str(), port)).await {
            Ok(listener) => listener,
            Err(e) => {
                let error = GatewayError::Bind {
                    address: format!("{}:{}", config.host, port),
                    reason: e.to_string(),
                };
                return Err(self.fail_start(error).await);
            }
        };
        self.apply(Transition::PortBound { port }).await;

        let shutdown = CancellationToken::new();
        let context = GatewayContext {
            config: Arc::new(config.clone()),
            upstream: UpstreamClient::new(self.client.clone(), &config, self.breaker.clone()),
            breaker: self.breaker.clone(),
            state: self.state.clone(),
            shutdown: shutdown.clone(),
            gateway: self.self_ref.clone(),
        };
        let server = warp::serve(gateway_filter(context))
            .incoming(listener)
            .graceful(shutdown.clone().cancelled_owned());
        let task = tokio::spawn(server.run());

        self.apply(Transition::ServingStarted {
            at: chrono::Utc::now(),
        })
        .await;
        log::info!(
            "gateway listening on {}:{} -> {}",
            config.host,
            port,
            crate::http::upstream_messages_url(&config.upstream_base_url)
        );
        self.publish(GatewayEvent::Started { port });

        *slot = Some(RunningListener {
            port,
            host: config.host,
            shutdown,
            task,
        });
        Ok(port)
    }

    async fn shutdown_locked(&self, slot: &mut Option<RunningListener>) {
        let Some(running) = slot.take() else {
            return;
        };

        log::info!("stopping gateway on port {}", running.port);
        running.shutdown.cancel();

        let abort = running.task.abort_handle();
        let grace = Duration::from_secs(GRACEFUL_SHUTDOWN_SECS);
        if tokio::time::timeout(grace, running.task).await.is_err() {
            log::warn!(
                "in-flight requests did not finish within {:?}, closing socket",
                grace
            );
            abort.abort();
        }

        self.apply(Transition::Stopped).await;
        self.publish(GatewayEvent::Stopped);
    }
}

impl SupervisedListener for Gateway {
    fn adopt_supervisor(&self, token: CancellationToken) {
        if let Some(previous) = self.lock_supervisor().replace(token) {
            previous.cancel();
        }
    }

    async fn is_healthy(&self) -> bool {
        self.state.lock().await.healthy
    }

    async fn probe_health(&self) -> bool {
        let target = {
            let slot = self.lifecycle.lock().await;
            slot.as_ref()
                .map(|running| (probe_host(&running.host), running.port))
        };
        let Some((host, port)) = target else {
            return false;
        };

        let url = format!("http://{}:{}/health", host, port);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_millis(HEALTH_PROBE_TIMEOUT_MS))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => response
                .json::<Value>()
                .await
                .map(|body| body.get("status").and_then(|s| s.as_str()) == Some("healthy"))
                .unwrap_or(false),
            Ok(response) => {
                log::warn!("health probe answered {}", response.status());
                false
            }
            Err(e) => {
                log::warn!("health probe failed: {}", e);
                false
            }
        }
    }

    async fn record_health(&self, healthy: bool) {
        self.apply(Transition::HealthObserved { healthy }).await;
    }

    async fn shutdown_listener(&self) {
        let mut slot = self.lifecycle.lock().await;
        self.shutdown_locked(&mut slot).await;
    }

    async fn start_listener(&self, config: GatewayConfig) -> Result<u16, GatewayError> {
        let mut slot = self.lifecycle.lock().await;
        let supervised = self
            .lock_supervisor()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled());
        if !supervised {
            return Err(GatewayError::HealthCheck(
                "supervision ended before restart".to_string(),
            ));
        }
        self.start_locked(&mut slot, config).await
    }

    fn emit(&self, event: GatewayEvent) {
        self.publish(event);
    }
}
