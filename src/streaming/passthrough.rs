use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;

use crate::constants::{LOG_PREFIX_CONN, LOG_PREFIX_WARNING};
use crate::error::ProxyError;
use crate::logging::log_timed;
use crate::server::state::{GatewayState, Transition};
use crate::streaming::response::{ChunkSender, create_sse_response};

static STREAM_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Forwards an upstream event stream to the caller byte for byte.
///
/// Frames are not re-translated. A transport failure or idle timeout ends the
/// stream with a final `error` event and is recorded on the gateway state.
pub async fn handle_passthrough_streaming_response(
    response: reqwest::Response,
    request_id: &str,
    state: Arc<Mutex<GatewayState>>,
    idle_timeout: Duration,
) -> Result<warp::reply::Response, ProxyError> {
    let (tx, rx) = mpsc::unbounded_channel::<Result<bytes::Bytes, std::io::Error>>();
    let stream_id = STREAM_COUNTER.fetch_add(1, Ordering::Relaxed) % 1_000_000;
    let start_time = Instant::now();
    let task_request_id = request_id.to_string();

    tokio::spawn(async move {
        let mut stream = response.bytes_stream();
        let mut chunk_count = 0u64;

        let failure = loop {
            match timeout(idle_timeout, stream.next()).await {
                Ok(Some(Ok(chunk))) => {
                    chunk_count += 1;
                    if tx.send(Ok(chunk)).is_err() {
                        // caller went away
                        break None;
                    }
                }
                Ok(Some(Err(e))) => {
                    let error = if e.is_timeout() {
                        ProxyError::upstream_timeout()
                    } else {
                        ProxyError::upstream_failed(&format!("streaming error: {}", e))
                    };
                    break Some(error);
                }
                Ok(None) => break None,
                Err(_) => break Some(ProxyError::upstream_timeout()),
            }
        };

        if let Some(error) = failure {
            send_error_event(&tx, &error);
            log_timed(
                LOG_PREFIX_WARNING,
                &format!(
                    "[{}] stream [{}] failed: {}",
                    task_request_id, stream_id, error.message
                ),
                start_time,
            );
            state.lock().await.apply(Transition::UpstreamFailed {
                message: error.message,
            });
        }

        log_timed(
            LOG_PREFIX_CONN,
            &format!(
                "[{}] passthrough stream [{}] | {} chunks",
                task_request_id, stream_id, chunk_count
            ),
            start_time,
        );
    });

    create_sse_response(rx, request_id)
}

fn send_error_event(tx: &ChunkSender, error: &ProxyError) {
    let payload = serde_json::to_string(&error.to_envelope()).unwrap_or_default();
    let frame = format!("event: error\ndata: {}\n\n", payload);
    let _ = tx.send(Ok(bytes::Bytes::from(frame)));
}
