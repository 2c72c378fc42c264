use super::*;
use std::collections::HashMap;

fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    Config::from_lookup(|key| env.get(key).cloned())
}

#[test]
fn empty_environment_uses_defaults() {
    let config = config_from(&[]).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
    assert!(config.database_url.is_none());
}

#[test]
fn explicit_values_are_parsed() {
    let config = config_from(&[
        ("PORT", "8080"),
        ("BIND_ADDR", "127.0.0.1"),
        ("DATABASE_URL", "postgres://localhost/sketch"),
        ("DB_MAX_CONNECTIONS", "12"),
        ("OUTBOUND_CHANNEL_CAPACITY", "32"),
        ("COORDINATOR_QUEUE_CAPACITY", "64"),
        ("HISTORY_TIMEOUT_MS", "250"),
        ("ACTION_PERSIST_QUEUE_CAPACITY", "128"),
        ("ACTION_PERSIST_RETRIES", "5"),
        ("ACTION_PERSIST_RETRY_BASE_MS", "7"),
        ("SESSIONS_PAGE_SIZE", "20"),
        ("STATIC_DIR", "public"),
    ])
    .unwrap();

    assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
    assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/sketch"));
    assert_eq!(config.db_max_connections, 12);
    assert_eq!(config.outbound_capacity, 32);
    assert_eq!(config.coordinator_queue_capacity, 64);
    assert_eq!(config.history_timeout_ms, 250);
    assert_eq!(config.persist, PersistConfig { queue_capacity: 128, retries: 5, retry_base_ms: 7 });
    assert_eq!(config.sessions_page_size, 20);
    assert_eq!(config.static_dir, Some(PathBuf::from("public")));
}

#[test]
fn unparsable_numbers_fall_back_to_defaults() {
    let config = config_from(&[("PORT", "http"), ("ACTION_PERSIST_RETRIES", "-1")]).unwrap();
    assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
    assert_eq!(config.persist.retries, DEFAULT_PERSIST_RETRIES);
}

#[test]
fn zero_capacities_are_clamped() {
    let config = config_from(&[
        ("OUTBOUND_CHANNEL_CAPACITY", "0"),
        ("COORDINATOR_QUEUE_CAPACITY", "0"),
        ("ACTION_PERSIST_QUEUE_CAPACITY", "0"),
        ("SESSIONS_PAGE_SIZE", "0"),
    ])
    .unwrap();
    assert_eq!(config.outbound_capacity, 1);
    assert_eq!(config.coordinator_queue_capacity, 1);
    assert_eq!(config.persist.queue_capacity, 1);
    assert_eq!(config.sessions_page_size, 1);
}

#[test]
fn blank_database_url_means_memory_log() {
    let config = config_from(&[("DATABASE_URL", "  ")]).unwrap();
    assert!(config.database_url.is_none());
}

#[test]
fn invalid_bind_addr_is_an_error() {
    let err = config_from(&[("BIND_ADDR", "not an address")]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBindAddr { .. }));
    assert_eq!(err.error_code(), "E_CONFIG_BIND_ADDR");
}

#[test]
fn ipv6_bind_addr_is_accepted() {
    let config = config_from(&[("BIND_ADDR", "::"), ("PORT", "8080")]).unwrap();
    assert_eq!(config.bind_addr, SocketAddr::new(IpAddr::from([0u16; 8]), 8080));
    assert_eq!(config.bind_addr.to_string(), "[::]:8080");

    let config = config_from(&[("BIND_ADDR", "[::1]")]).unwrap();
    assert_eq!(config.bind_addr.to_string(), "[::1]:3000");
}

#[test]
fn bind_addr_with_port_is_an_error() {
    let err = config_from(&[("BIND_ADDR", "127.0.0.1:8080")]).unwrap_err();
    let ConfigError::InvalidBindAddr { addr, .. } = err;
    assert_eq!(addr, "127.0.0.1:8080");
}
