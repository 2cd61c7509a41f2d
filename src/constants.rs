/// Identity reported by the health endpoint and checked during port hand-off
pub const GATEWAY_SERVICE_NAME: &str = "dialect-gateway";
pub const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upstream messages API
pub const UPSTREAM_MESSAGES_PATH: &str = "/messages";
pub const UPSTREAM_VERSION_PREFIX: &str = "/v1";
pub const UPSTREAM_API_VERSION: &str = "2023-06-01";
pub const HEADER_UPSTREAM_API_KEY: &str = "x-api-key";
pub const HEADER_UPSTREAM_VERSION: &str = "anthropic-version";

/// Request correlation headers
pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_CORRELATION_ID: &str = "x-correlation-id";

/// Translation defaults and bounds
pub const DEFAULT_MAX_TOKENS: u64 = 4096;
pub const MAX_TOKENS_CEILING: u64 = 200_000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const MAX_STOP_SEQUENCES: usize = 4;
pub const SYSTEM_PROMPT_SEPARATOR: &str = "\n\n";
pub const IMAGE_PLACEHOLDER: &str = "[Image content - not supported in current conversion]";

/// Complexity classification thresholds
pub const COMPLEX_CONTENT_CHARS: usize = 2000;
pub const COMPLEX_MAX_TOKENS: u64 = 4000;
pub const COMPLEX_KEYWORDS: &[&str] = &["code", "function", "class", "implement", "debug", "refactor"];

/// Port allocation
pub const DEFAULT_PORT: u16 = 8082;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const SELF_PROBE_TIMEOUT_MS: u64 = 2000;
pub const SELF_STOP_TIMEOUT_MS: u64 = 1000;
pub const HANDOFF_GRACE_MS: u64 = 1000;

/// Lifecycle timing
pub const HEALTH_PROBE_TIMEOUT_MS: u64 = 5000;
pub const GRACEFUL_SHUTDOWN_SECS: u64 = 5;
pub const STREAM_IDLE_TIMEOUT_SECS: u64 = 120;

/// Circuit breaker
pub const BREAKER_FAILURE_THRESHOLD: u32 = 5;
pub const BREAKER_RESET_SECS: u64 = 60;

/// Gateway's own upstream inputs; distinct from what children get
pub const ENV_GATEWAY_UPSTREAM_URL: &str = "GATEWAY_UPSTREAM_URL";
pub const ENV_GATEWAY_API_KEY: &str = "GATEWAY_API_KEY";

/// Child process environment
pub const ENV_UPSTREAM_BASE_URL: &str = "UPSTREAM_BASE_URL";
pub const ENV_UPSTREAM_API_KEY: &str = "UPSTREAM_API_KEY";
pub const PLACEHOLDER_API_KEY: &str = "gateway-placeholder-key";

/// Response headers
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
pub const CONTENT_TYPE_SSE: &str = "text/event-stream";
pub const HEADER_CACHE_CONTROL: &str = "no-cache";
pub const HEADER_CONNECTION: &str = "keep-alive";
pub const HEADER_ACCESS_CONTROL_ALLOW_ORIGIN: &str = "*";
pub const HEADER_ACCESS_CONTROL_ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub const HEADER_ACCESS_CONTROL_ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Error messages
pub const ERROR_MISSING_MESSAGES: &str = "Request must include a \"messages\" array";
pub const ERROR_EMPTY_MESSAGES: &str = "Messages array cannot be empty";
pub const ERROR_INVALID_BODY: &str = "Request body must be a valid JSON object";
pub const ERROR_UPSTREAM_UNAVAILABLE: &str = "Unable to reach upstream API";
pub const ERROR_UPSTREAM_TIMEOUT: &str = "Upstream request timed out";
pub const ERROR_BAD_UPSTREAM_PAYLOAD: &str = "Upstream returned an unreadable response";
pub const ERROR_CIRCUIT_OPEN: &str = "Upstream temporarily disabled after repeated failures";
pub const ERROR_SHUTTING_DOWN: &str = "Gateway is shutting down, please try again later";

/// SSE parsing constants
pub const SSE_DATA_PREFIX: &str = "data:";
pub const SSE_DONE_MESSAGE: &str = "[DONE]";

/// Logging prefixes
pub const LOG_PREFIX_SUCCESS: &str = "✅";
pub const LOG_PREFIX_ERROR: &str = "❌";
pub const LOG_PREFIX_WARNING: &str = "⚠️";
pub const LOG_PREFIX_CONN: &str = "↔️";

/// Maximum accepted JSON body size (bytes)
pub const MAX_JSON_BODY_SIZE_BYTES: u64 = 50 * 1024 * 1024;
