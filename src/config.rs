use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

const DEFAULT_MONITORING_URL: &str = "https://monitoring.googleapis.com/v3/projects";
const DEFAULT_QUERY_URL: &str = "https://monitoring.googleapis.com/query";
const DEFAULT_RESOURCE_MANAGER_URL: &str = "https://cloudresourcemanager.googleapis.com/v1";

/// How the deployment authenticates against the monitoring API. Under
/// `Gce` the default project is not configured statically; it is
/// discovered from the provider on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    Jwt,
    Gce,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub monitoring_url: String,
    pub query_url: String,
    pub resource_manager_url: String,
    pub auth_type: AuthType,
    pub default_project: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    gcmq_listen_addr: Option<String>,
    #[serde(default)]
    gcmq_listen_host: Option<String>,
    #[serde(default)]
    gcmq_listen_port: Option<u16>,
    #[serde(default)]
    gcmq_monitoring_url: Option<String>,
    #[serde(default)]
    gcmq_query_url: Option<String>,
    #[serde(default)]
    gcmq_resource_manager_url: Option<String>,
    #[serde(default)]
    gcmq_auth_type: Option<AuthType>,
    #[serde(default)]
    gcmq_default_project: Option<String>,
    #[serde(default)]
    gcmq_api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    gcmq_request_timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig =
            envy::from_env().context("failed to parse GCMQ_* environment variables")?;

        let listen_addr = resolve_addr(
            raw.gcmq_listen_addr,
            raw.gcmq_listen_host,
            raw.gcmq_listen_port,
        )?;

        Ok(Self {
            listen_addr,
            monitoring_url: normalize_url(raw.gcmq_monitoring_url, DEFAULT_MONITORING_URL),
            query_url: normalize_url(raw.gcmq_query_url, DEFAULT_QUERY_URL),
            resource_manager_url: normalize_url(
                raw.gcmq_resource_manager_url,
                DEFAULT_RESOURCE_MANAGER_URL,
            ),
            auth_type: raw.gcmq_auth_type.unwrap_or_default(),
            default_project: raw.gcmq_default_project.filter(|p| !p.is_empty()),
            api_key: raw.gcmq_api_key,
            request_timeout: Duration::from_secs(raw.gcmq_request_timeout_secs.max(1)),
        })
    }
}

fn normalize_url(candidate: Option<String>, fallback: &str) -> String {
    candidate
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| fallback.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn resolve_addr(
    addr: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<SocketAddr> {
    if let Some(addr) = addr {
        return addr
            .to_socket_addrs()
            .context("invalid GCMQ_LISTEN_ADDR value")?
            .next()
            .context("GCMQ_LISTEN_ADDR resolved to no addresses");
    }

    let host = host.unwrap_or_else(|| "0.0.0.0".to_string());
    let port = port.unwrap_or(8485);
    let combined = format!("{}:{}", host, port);
    combined
        .to_socket_addrs()
        .context("invalid GCMQ listen host/port combination")?
        .next()
        .context("listen address resolved to no targets")
}
