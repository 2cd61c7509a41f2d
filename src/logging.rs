use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::constants::{LOG_PREFIX_ERROR, LOG_PREFIX_SUCCESS, LOG_PREFIX_WARNING};
use crate::model::ModelClass;

pub struct LogConfig {
    pub debug_enabled: bool,
}

static LOG_CONFIG: OnceLock<LogConfig> = OnceLock::new();

impl LogConfig {
    pub fn init(debug: bool) {
        LOG_CONFIG.get_or_init(|| LogConfig {
            debug_enabled: debug,
        });
    }

    pub fn get() -> &'static LogConfig {
        LOG_CONFIG.get().unwrap_or_else(|| {
            static FALLBACK: LogConfig = LogConfig {
                debug_enabled: false,
            };
            &FALLBACK
        })
    }
}

pub fn setup_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = log_level
        .to_lowercase()
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);

    fern::Dispatch::new()
        .format(|out, message, record| {
            let level_str = match record.level() {
                log::Level::Error => "\x1b[1;31merror:\x1b[0m",
                log::Level::Warn => "\x1b[1;33mwarn:\x1b[0m",
                log::Level::Info => "\x1b[1;32minfo:\x1b[0m",
                log::Level::Debug => "\x1b[1;34mdebug:\x1b[0m",
                log::Level::Trace => "\x1b[1;35mtrace:\x1b[0m",
            };
            out.finish(format_args!(
                "{} {} [{}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                level_str,
                record.target(),
                message
            ))
        })
        .level(level)
        // reqwest/hyper internals are noisy at debug
        .level_for("hyper_util", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;

    LogConfig::init(matches!(
        level,
        log::LevelFilter::Debug | log::LevelFilter::Trace
    ));

    Ok(())
}

/// One line per routed request: what the client asked for and where it went.
pub fn log_routed(request_id: &str, path: &str, requested: Option<&str>, class: ModelClass, target: &str) {
    log::info!(
        "[{}] POST {} | {} -> {} ({})",
        request_id,
        sanitize_log_message(path),
        requested.map(sanitize_log_message).unwrap_or_else(|| "<none>".to_string()),
        sanitize_log_message(target),
        class
    );
}

pub fn log_timed(prefix: &str, operation: &str, start: Instant) {
    let formatted_duration = format_duration(start.elapsed());

    match prefix {
        LOG_PREFIX_SUCCESS => log::info!("{} | {}", operation, formatted_duration),
        LOG_PREFIX_ERROR => log::error!("{} | {}", operation, formatted_duration),
        LOG_PREFIX_WARNING => log::warn!("{} | {}", operation, formatted_duration),
        _ => log::info!("{} | {}", operation, formatted_duration),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_nanos = duration.as_nanos();

    if total_nanos < 1_000_000 {
        format!("{:.1}µs", total_nanos as f64 / 1_000.0)
    } else if total_nanos < 1_000_000_000 {
        format!("{:.2}ms", total_nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", total_nanos as f64 / 1_000_000_000.0)
    }
}

pub fn sanitize_log_message(message: &str) -> String {
    message
        .chars()
        .map(|c| {
            if c.is_control() && !matches!(c, '\t' | '\n' | '\r') {
                '?'
            } else {
                c
            }
        })
        .collect()
}

/// Dumps translated payloads when debug logging is on. Never pass anything
/// carrying the upstream key.
pub fn log_translation_io<T: serde::Serialize>(stage: &str, request_id: &str, payload: &T) {
    if LogConfig::get().debug_enabled {
        log::debug!(
            "[{}] {}: {}",
            request_id,
            stage,
            serde_json::to_string_pretty(payload).unwrap_or_default()
        );
    }
}
