mod location;
mod trusted_domain;

use std::net::SocketAddr;

use serde::Deserialize;

pub use location::NetLocation;
pub use trusted_domain::TrustedDomainEntry;

fn default_true() -> bool {
    true
}

/// One admission gate: a listening address, the upstream that admitted
/// requests are forwarded to, and the trust configuration consulted for
/// every incoming Host header.
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    #[serde(deserialize_with = "deserialize_socket_addr", alias = "bindAddress")]
    pub bind_address: SocketAddr,

    /// Optional so `--check` can run against a config without an upstream;
    /// serving a gate requires it.
    #[serde(default, alias = "upstream")]
    pub target: Option<NetLocation>,

    /// A non-empty value makes every candidate host trusted.
    #[serde(default, rename = "overwritehost", alias = "overwrite_host")]
    pub overwrite_host: String,

    #[serde(default)]
    pub trusted_domains: Vec<TrustedDomainEntry>,

    #[serde(default = "default_true")]
    pub tcp_nodelay: bool,
}

// serde can't deserialize IPv6 socket addresses through the derived path,
// so go through a string like the rest of the address fields.
fn deserialize_socket_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    use std::net::ToSocketAddrs;
    let value = String::deserialize(deserializer)?;
    let mut iter = value.to_socket_addrs().map_err(|_| {
        serde::de::Error::invalid_value(
            serde::de::Unexpected::Other("invalid socket address"),
            &"valid socket address",
        )
    })?;
    iter.next().ok_or_else(|| {
        serde::de::Error::invalid_value(
            serde::de::Unexpected::Other("unable to resolve socket address"),
            &"valid socket address",
        )
    })
}

/// A config file holds either a single gate object or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrManyGates {
    One(GateConfig),
    Many(Vec<GateConfig>),
}

pub fn deserialize_configs(config_str: &str, config_path: &str) -> std::io::Result<Vec<GateConfig>> {
    let is_json =
        config_path.ends_with(".json") || config_str.trim_start().starts_with(['{', '[']);

    let parsed: OneOrManyGates = if is_json {
        serde_json::from_str(config_str).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("failed to parse config JSON: {}", e),
            )
        })?
    } else {
        serde_yaml::from_str(config_str).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("failed to parse config YAML: {}", e),
            )
        })?
    };

    Ok(match parsed {
        OneOrManyGates::One(config) => vec![config],
        OneOrManyGates::Many(configs) => configs,
    })
}

pub async fn load_gate_configs(config_paths: &[String]) -> std::io::Result<Vec<GateConfig>> {
    let mut gate_configs = vec![];
    for config_path in config_paths {
        let config_str = tokio::fs::read_to_string(config_path).await?;
        gate_configs.extend(deserialize_configs(&config_str, config_path)?);
    }
    Ok(gate_configs)
}

/// Blocking variant for the config watcher thread.
pub fn load_gate_configs_sync(config_paths: &[String]) -> std::io::Result<Vec<GateConfig>> {
    let mut gate_configs = vec![];
    for config_path in config_paths {
        let config_str = std::fs::read_to_string(config_path)?;
        gate_configs.extend(deserialize_configs(&config_str, config_path)?);
    }
    Ok(gate_configs)
}
