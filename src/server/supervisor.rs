use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::events::GatewayEvent;

/// What the health supervisor needs from the listener it watches.
pub trait SupervisedListener: Send + Sync + 'static {
    /// Hands over the token that `stop` cancels to end supervision.
    fn adopt_supervisor(&self, token: CancellationToken);

    /// Health as last recorded; `false` while stopped.
    fn is_healthy(&self) -> impl Future<Output = bool> + Send;

    /// Calls the listener's own health endpoint.
    fn probe_health(&self) -> impl Future<Output = bool> + Send;

    fn record_health(&self, healthy: bool) -> impl Future<Output = ()> + Send;

    fn shutdown_listener(&self) -> impl Future<Output = ()> + Send;

    fn start_listener(
        &self,
        config: GatewayConfig,
    ) -> impl Future<Output = Result<u16, GatewayError>> + Send;

    fn emit(&self, event: GatewayEvent);
}

/// Handle to a running supervisor task.
pub struct SupervisorHandle {
    token: CancellationToken,
    task: JoinHandle<Result<(), GatewayError>>,
}

impl SupervisorHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the supervisor to end. `Ok` when it was cancelled,
    /// `RestartExhausted` when it gave up.
    pub async fn join(self) -> Result<(), GatewayError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(GatewayError::HealthCheck(format!(
                "supervisor task failed: {}",
                e
            ))),
        }
    }
}

enum RestartOutcome {
    Restarted(u16),
    Cancelled,
}

pub struct HealthSupervisor;

impl HealthSupervisor {
    /// Starts watching `listener`, restarting it with `config` when it turns
    /// unhealthy and `auto_restart` is set.
    pub fn attach_to<L: SupervisedListener>(listener: Arc<L>, config: GatewayConfig) -> SupervisorHandle {
        let token = CancellationToken::new();
        listener.adopt_supervisor(token.clone());
        let task = tokio::spawn(supervise(listener, config, token.clone()));
        SupervisorHandle { token, task }
    }
}

async fn supervise<L: SupervisedListener>(
    listener: Arc<L>,
    config: GatewayConfig,
    token: CancellationToken,
) -> Result<(), GatewayError> {
    let interval = config.health_check_interval();
    log::debug!("health supervisor running every {:?}", interval);

    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = tokio::time::sleep(interval) => {}
        }

        if config.auto_restart && !listener.is_healthy().await {
            match restart_cycle(listener.as_ref(), &config, &token).await {
                Ok(RestartOutcome::Restarted(port)) => {
                    log::info!("gateway restarted on port {}", port);
                    continue;
                }
                Ok(RestartOutcome::Cancelled) => return Ok(()),
                Err(e) => {
                    token.cancel();
                    return Err(e);
                }
            }
        }

        let healthy = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            healthy = listener.probe_health() => healthy,
        };
        listener.record_health(healthy).await;
        listener.emit(GatewayEvent::HealthCheck { healthy });
        if !healthy {
            log::warn!("health check failed");
        }
    }
}

/// Stop, wait, start; at most `max_retries` times. Emits `restart-failed`
/// exactly once when every attempt fails, leaving the listener stopped.
async fn restart_cycle<L: SupervisedListener>(
    listener: &L,
    config: &GatewayConfig,
    token: &CancellationToken,
) -> Result<RestartOutcome, GatewayError> {
    let max_retries = config.max_retries;
    let mut last_error = "listener unhealthy".to_string();

    for attempt in 1..=max_retries {
        if token.is_cancelled() {
            return Ok(RestartOutcome::Cancelled);
        }
        log::warn!("restarting gateway (attempt {}/{})", attempt, max_retries);

        listener.shutdown_listener().await;
        tokio::select! {
            _ = token.cancelled() => return Ok(RestartOutcome::Cancelled),
            _ = tokio::time::sleep(config.retry_delay()) => {}
        }

        match listener.start_listener(config.clone()).await {
            Ok(port) => return Ok(RestartOutcome::Restarted(port)),
            Err(_) if token.is_cancelled() => return Ok(RestartOutcome::Cancelled),
            Err(e) => {
                log::error!("restart attempt {} failed: {}", attempt, e);
                last_error = e.to_string();
            }
        }
    }

    listener.shutdown_listener().await;
    log::error!(
        "giving up after {} restart attempts: {}",
        max_retries,
        last_error
    );
    listener.emit(GatewayEvent::RestartFailed {
        attempts: max_retries,
        error: last_error.clone(),
    });
    Err(GatewayError::RestartExhausted {
        attempts: max_retries,
        last_error,
    })
}
