use clap::Parser;

mod config;
mod constants;
mod environment;
mod error;
mod events;
mod handlers;
mod http;
mod logging;
mod model;
mod port;
mod server;
mod streaming;
mod translate;

#[cfg(test)]
mod tests;

use crate::server::{Gateway, HealthSupervisor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::parse();

    logging::setup_logging(&cfg.log_level)?;

    let gateway_config = config::GatewayConfig::from_cli(&cfg)?;
    config::validate_config(&gateway_config)?;

    let gateway = Gateway::new()?;
    let event_log = tokio::spawn(events::log_events(gateway.subscribe()));

    let port = gateway.start(gateway_config.clone()).await?;
    let supervisor = HealthSupervisor::attach_to(gateway.clone(), gateway_config.clone());

    if cfg.print_env {
        let vars = environment::child_environment(&gateway_config.host, port);
        println!("{}", environment::export_lines(&vars));
    }

    // ends on its own when a newer instance takes over through /stop or
    // when restarts are exhausted
    let supervision = supervisor.join();
    tokio::pin!(supervision);

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                log::error!("cannot listen for ctrl-c: {}", e);
            }
            log::info!("shutting down");
            gateway.stop().await;
            supervision.as_mut().await
        }
        outcome = &mut supervision => {
            gateway.stop().await;
            outcome
        }
    };
    event_log.abort();

    match outcome {
        Err(e) if e.is_fatal() => {
            log::error!("gateway stopped for good: {}", e);
            Err(e.into())
        }
        Err(e) => {
            log::warn!("supervision ended: {}", e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
