use serde::Deserialize;

/// An upstream network location.
///
/// The address is kept as a string rather than resolved to a `SocketAddr`
/// up front, so a hostname target can follow DNS changes without a process
/// restart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetLocation {
    pub address: String,
    pub port: u16,
}

impl TryFrom<&str> for NetLocation {
    type Error = std::io::Error;

    fn try_from(value: &str) -> std::io::Result<Self> {
        // Split on the last colon so bare IPv6 addresses keep their colons.
        let colon = value.rfind(':').ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("no port separator in target address: {}", value),
            )
        })?;
        let port = value[colon + 1..].parse::<u16>().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid target port: {}", value),
            )
        })?;
        if colon == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("empty target address: {}", value),
            ));
        }
        Ok(Self {
            address: value[..colon].to_string(),
            port,
        })
    }
}

impl<'de> Deserialize<'de> for NetLocation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value
            .as_str()
            .try_into()
            .map_err(|e: std::io::Error| serde::de::Error::custom(e.to_string()))
    }
}

impl std::fmt::Display for NetLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
