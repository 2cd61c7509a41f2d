use std::time::Duration;

use clap::{CommandFactory, Parser};

use crate::config::{CollaboratorSettings, Config, GatewayConfig, RetryPolicy, validate_config};
use crate::environment::{child_environment, export_lines};
use crate::error::GatewayError;

fn valid_config() -> GatewayConfig {
    GatewayConfig {
        api_key: "k".to_string(),
        upstream_base_url: "https://up.example/v1".to_string(),
        ..GatewayConfig::default()
    }
}

#[test]
fn defaults_match_documented_values() {
    let config = GatewayConfig::default();

    assert_eq!(config.port, 8082);
    assert_eq!(config.host, "127.0.0.1");
    assert!(config.auto_restart);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.retry_delay(), Duration::from_millis(5000));
    assert_eq!(config.health_check_interval(), Duration::from_millis(30_000));
}

#[test]
fn valid_config_passes_validation() {
    assert!(validate_config(&valid_config()).is_ok());
}

#[test]
fn invalid_configs_are_rejected_before_binding() {
    let cases = [
        GatewayConfig {
            api_key: "  ".to_string(),
            ..valid_config()
        },
        GatewayConfig {
            upstream_base_url: String::new(),
            ..valid_config()
        },
        GatewayConfig {
            upstream_base_url: "ftp://up.example".to_string(),
            ..valid_config()
        },
        GatewayConfig {
            host: "not a host".to_string(),
            ..valid_config()
        },
        GatewayConfig {
            port: 0,
            ..valid_config()
        },
        GatewayConfig {
            port: 9000,
            max_port: 8999,
            ..valid_config()
        },
    ];

    for config in cases {
        assert!(
            matches!(validate_config(&config), Err(GatewayError::Configuration(_))),
            "accepted {:?}",
            config
        );
    }
}

#[test]
fn cli_flags_map_onto_gateway_config() {
    let cli = Config::parse_from([
        "dialect-gateway",
        "--port",
        "9100",
        "--api-url",
        "https://up.example",
        "--api-key",
        "secret",
        "--no-auto-restart",
        "--upstream-attempts",
        "0",
    ]);

    let config = GatewayConfig::from_cli(&cli).unwrap();

    assert_eq!(config.port, 9100);
    assert_eq!(config.upstream_base_url, "https://up.example");
    assert_eq!(config.api_key, "secret");
    assert!(!config.auto_restart);
    assert_eq!(config.upstream_retry.max_attempts, 1);
}

#[test]
fn collaborator_settings_overlay_present_fields() {
    let settings: CollaboratorSettings = serde_json::from_str(
        r#"{"apiUrl": "https://other.example/v1", "apiKey": "from-settings", "proxyPort": 9200}"#,
    )
    .unwrap();
    let mut config = valid_config();

    settings.apply_to(&mut config);

    assert_eq!(config.upstream_base_url, "https://other.example/v1");
    assert_eq!(config.api_key, "from-settings");
    assert_eq!(config.port, 9200);
    assert_eq!(config.big_model, GatewayConfig::default().big_model);
}

#[test]
fn missing_settings_file_is_a_configuration_error() {
    let path = std::env::temp_dir().join("dialect-gateway-missing-settings.json");

    assert!(matches!(
        CollaboratorSettings::load(&path),
        Err(GatewayError::Configuration(_))
    ));
}

#[test]
fn retry_delay_doubles_up_to_cap() {
    let policy = RetryPolicy {
        max_attempts: 5,
        base_delay_ms: 100,
        max_delay_ms: 350,
    };

    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(350));
    assert_eq!(policy.delay_for(30), Duration::from_millis(350));
    assert_eq!(RetryPolicy::none().max_attempts, 1);
}

#[test]
fn child_environment_points_at_gateway_with_placeholder_key() {
    let vars = child_environment("0.0.0.0", 8083);

    assert_eq!(
        vars,
        vec![
            ("UPSTREAM_BASE_URL", "http://127.0.0.1:8083/v1".to_string()),
            ("UPSTREAM_API_KEY", "gateway-placeholder-key".to_string()),
        ]
    );
    assert_eq!(
        export_lines(&vars),
        "export UPSTREAM_BASE_URL='http://127.0.0.1:8083/v1'\nexport UPSTREAM_API_KEY='gateway-placeholder-key'"
    );
}

#[test]
fn exported_child_key_is_rejected_as_gateway_key() {
    let config = GatewayConfig {
        api_key: "gateway-placeholder-key".to_string(),
        upstream_base_url: "http://127.0.0.1:8082/v1".to_string(),
        ..valid_config()
    };

    assert!(matches!(
        validate_config(&config),
        Err(GatewayError::Configuration(_))
    ));
}

#[test]
fn gateway_inputs_do_not_read_the_child_environment() {
    let command = Config::command();
    let env_of = |id: &str| {
        command
            .get_arguments()
            .find(|arg| arg.get_id() == id)
            .and_then(|arg| arg.get_env())
            .and_then(|env| env.to_str())
            .map(str::to_string)
    };
    let child_vars: Vec<&str> = child_environment("127.0.0.1", 8082)
        .iter()
        .map(|(key, _)| *key)
        .collect();

    let url_env = env_of("api_url").unwrap();
    let key_env = env_of("api_key").unwrap();

    assert_eq!(url_env, "GATEWAY_UPSTREAM_URL");
    assert_eq!(key_env, "GATEWAY_API_KEY");
    assert!(!child_vars.contains(&url_env.as_str()));
    assert!(!child_vars.contains(&key_env.as_str()));
}
