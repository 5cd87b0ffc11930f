//! Service instance records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Composite identity of one registered instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationKey {
    pub name: String,
    pub version: String,
    pub host: String,
    pub port: u16,
}

impl RegistrationKey {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.name, self.version, authority(&self.host, self.port))
    }
}

/// A live service instance as seen by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub name: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    /// Last registration (heartbeat) time, seconds since epoch on the wire.
    #[serde(with = "epoch_secs")]
    pub last_seen: SystemTime,
}

impl ServiceInstance {
    pub fn new(key: &RegistrationKey, last_seen: SystemTime) -> Self {
        Self {
            name: key.name.clone(),
            version: key.version.clone(),
            host: key.host.clone(),
            port: key.port,
            last_seen,
        }
    }

    pub fn key(&self) -> RegistrationKey {
        RegistrationKey::new(&self.name, &self.version, &self.host, self.port)
    }

    /// `host:port`, with IPv6 hosts bracketed.
    pub fn authority(&self) -> String {
        authority(&self.host, self.port)
    }

    /// Base URL for plain HTTP calls to this instance.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.authority())
    }
}

fn authority(host: &str, port: u16) -> String {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{}]:{}", host, port),
        _ => format!("{}:{}", host, port),
    }
}

mod epoch_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        let secs = t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        s.serialize_u64(secs)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }
}

/// Seconds since epoch, for logs.
pub fn epoch_seconds(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
