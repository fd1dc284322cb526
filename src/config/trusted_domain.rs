use log::warn;
use serde::Deserialize;

/// A single `trusted_domains` entry.
///
/// Allowlists come from hand-edited deployment configs, so a non-string
/// entry must not fail the whole config load. It is kept as `Invalid`,
/// warned about once at load time, and never matches anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustedDomainEntry {
    Pattern(String),
    Invalid,
}

impl TrustedDomainEntry {
    pub fn as_pattern(&self) -> Option<&str> {
        match self {
            TrustedDomainEntry::Pattern(pattern) => Some(pattern.as_str()),
            TrustedDomainEntry::Invalid => None,
        }
    }
}

impl<'de> Deserialize<'de> for TrustedDomainEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(pattern) => Ok(TrustedDomainEntry::Pattern(pattern)),
            other => {
                warn!("Ignoring non-string trusted_domains entry: {}", other);
                Ok(TrustedDomainEntry::Invalid)
            }
        }
    }
}
