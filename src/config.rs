use crate::error::ServiceError;
use serde::Deserialize;
use std::{
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub api_key: String,
    pub max_pool_size: u32,
    pub connect_timeout: Duration,
    pub allow_raw: bool,
    pub pg_ssl_root_cert: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    db_host: Option<String>,
    #[serde(default)]
    db_port: Option<u16>,
    #[serde(default)]
    db_user: Option<String>,
    #[serde(default)]
    db_password: Option<String>,
    #[serde(default)]
    db_name: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    dbrelay_listen_addr: Option<String>,
    #[serde(default)]
    dbrelay_listen_host: Option<String>,
    #[serde(default)]
    dbrelay_listen_port: Option<u16>,
    #[serde(default = "default_pool_size")]
    dbrelay_max_pool_size: u32,
    #[serde(default = "default_connect_timeout_secs")]
    dbrelay_connect_timeout_secs: u64,
    #[serde(default = "default_allow_raw")]
    dbrelay_allow_raw: bool,
    #[serde(default)]
    pg_ssl_root_cert: Option<String>,
}

const fn default_pool_size() -> u32 {
    10
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_allow_raw() -> bool {
    true
}

impl AppConfig {
    /// Reads the environment exactly once; every later consumer receives
    /// this value explicitly. Credentials are never logged.
    pub fn from_env() -> Result<Self, ServiceError> {
        let raw: RawConfig = envy::from_env().map_err(|err| {
            ServiceError::Configuration(format!("failed to parse environment variables: {err}"))
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ServiceError> {
        let mut missing = Vec::new();
        let db_host = require(raw.db_host, "DB_HOST", &mut missing);
        let db_user = require(raw.db_user, "DB_USER", &mut missing);
        let db_password = require(raw.db_password, "DB_PASSWORD", &mut missing);
        let db_name = require(raw.db_name, "DB_NAME", &mut missing);
        let api_key = require(raw.api_key, "API_KEY", &mut missing);

        if !missing.is_empty() {
            return Err(ServiceError::Configuration(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let listen_addr = resolve_addr(
            raw.dbrelay_listen_addr,
            raw.dbrelay_listen_host,
            raw.dbrelay_listen_port,
        )?;

        Ok(Self {
            listen_addr,
            db_host,
            db_port: raw.db_port.unwrap_or(5432),
            db_user,
            db_password,
            db_name,
            api_key,
            max_pool_size: raw.dbrelay_max_pool_size.max(1),
            connect_timeout: Duration::from_secs(raw.dbrelay_connect_timeout_secs.max(1)),
            allow_raw: raw.dbrelay_allow_raw,
            pg_ssl_root_cert: raw.pg_ssl_root_cert,
        })
    }
}

fn require(value: Option<String>, name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value {
        Some(value) if !value.trim().is_empty() => value,
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

fn resolve_addr(
    addr: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<SocketAddr, ServiceError> {
    if let Some(addr) = addr {
        return addr
            .to_socket_addrs()
            .map_err(|err| {
                ServiceError::Configuration(format!("invalid DBRELAY_LISTEN_ADDR value: {err}"))
            })?
            .next()
            .ok_or_else(|| {
                ServiceError::Configuration(
                    "DBRELAY_LISTEN_ADDR resolved to no addresses".to_string(),
                )
            });
    }

    let host = host.unwrap_or_else(|| "0.0.0.0".to_string());
    let port = port.unwrap_or(8000);
    let combined = format!("{}:{}", host, port);
    combined
        .to_socket_addrs()
        .map_err(|err| {
            ServiceError::Configuration(format!("invalid listen host/port combination: {err}"))
        })?
        .next()
        .ok_or_else(|| {
            ServiceError::Configuration("listen address resolved to no targets".to_string())
        })
}
