use std::error::Error as _;

use crate::error::ProxyError;

pub fn map_reqwest_error(err: reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::upstream_timeout()
    } else if err.is_connect() {
        if is_dns_failure(&err) {
            log::error!("upstream host could not be resolved: {}", err);
            ProxyError::upstream_unresolvable()
        } else {
            ProxyError::upstream_unavailable()
        }
    } else {
        log::error!("upstream request failed: {}", err);
        ProxyError::upstream_failed(&format!("upstream request failed: {}", err))
    }
}

// reqwest does not expose resolver failures as their own kind
fn is_dns_failure(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        source = cause.source();
    }
    false
}
