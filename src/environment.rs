use crate::constants::{
    ENV_UPSTREAM_API_KEY, ENV_UPSTREAM_BASE_URL, PLACEHOLDER_API_KEY, UPSTREAM_VERSION_PREFIX,
};
use crate::port::probe_host;

/// Environment a child tool needs to talk to the gateway instead of the real
/// upstream. Carries a placeholder key; the real one never leaves the gateway.
pub fn child_environment(host: &str, port: u16) -> Vec<(&'static str, String)> {
    vec![
        (
            ENV_UPSTREAM_BASE_URL,
            format!(
                "http://{}:{}{}",
                probe_host(host),
                port,
                UPSTREAM_VERSION_PREFIX
            ),
        ),
        (ENV_UPSTREAM_API_KEY, PLACEHOLDER_API_KEY.to_string()),
    ]
}

/// `export KEY='value'` lines for a POSIX shell.
pub fn export_lines(vars: &[(&'static str, String)]) -> String {
    vars.iter()
        .map(|(key, value)| format!("export {}='{}'", key, value.replace('\'', r"'\''")))
        .collect::<Vec<_>>()
        .join("\n")
}
