// Contains runtime configuration for the server and the protocol constants
// shared with the reference robot clients.
use crate::{Error, ServerResult};
use serde::Deserialize;
use std::{fmt::Display, fs::File, path::Path, str::FromStr, time::Duration};

/// Interface the listening socket binds to when none is configured.
pub const DEFAULT_HOST: &str = "localhost";

/// Port the listening socket binds to when none is configured.
pub const DEFAULT_PORT: u16 = 9999;

/// Per-chunk read deadline, in seconds. Protocol-level: raising it without
/// coordinating with the client fleet changes when half-dead peers are cut.
pub const TIMEOUT_SECS: u64 = 1;

/// Read deadline while a client recharges, in seconds.
pub const TIMEOUT_RECHARGING_SECS: u64 = 5;

/// The reference authentication key table. Clients pick a pair by index.
pub const DEFAULT_KEYS: [KeysPair; 5] = [
    KeysPair { server_key: 23019, client_key: 32037 },
    KeysPair { server_key: 32037, client_key: 29295 },
    KeysPair { server_key: 18789, client_key: 13603 },
    KeysPair { server_key: 16443, client_key: 29533 },
    KeysPair { server_key: 18189, client_key: 21952 },
];

/// One entry of the authentication key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct KeysPair {
    pub server_key: u16,
    pub client_key: u16,
}

/// Navigation strategy used once a client is oriented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Planner {
    /// Drive the X coordinate to zero, then the Y coordinate, sidestepping
    /// obstacles with fixed bypass sequences.
    Simple,
    /// Re-plan a shortest path over the discovered obstacle set after every
    /// refused move.
    Bfs,
}
impl FromStr for Planner {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        match s {
            _ if s == "simple" => Ok(Self::Simple),
            _ if s == "bfs" => Ok(Self::Bfs),
            _ => Err(Error::Config(format!(
                "unknown planner '{}', expected 'simple' or 'bfs'",
                s
            ))),
        }
    }
}

/// Server configuration. Every field has a default, so a config file only
/// needs to name the fields it overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Authentication key table, indexed by the KEY_ID records clients send.
    pub keys: Vec<KeysPair>,
    /// Per-chunk read deadline in seconds.
    pub timeout: u64,
    /// Read deadline in seconds while a client recharges.
    pub timeout_recharging: u64,
    /// Navigation strategy.
    pub planner: Planner,
    /// When false, a RECHARGING record is an unexpected control record and
    /// the session ends with a logic error.
    pub recharging_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            keys: DEFAULT_KEYS.to_vec(),
            timeout: TIMEOUT_SECS,
            timeout_recharging: TIMEOUT_RECHARGING_SECS,
            planner: Planner::Simple,
            recharging_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Loads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let file = File::open(path.as_ref())?;
        serde_json::from_reader(file)
            .map_err(|e| Error::Config(format!("{}: {}", path.as_ref().display(), e)))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn recharge_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_recharging)
    }
}

impl Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} ({} key pairs, planner {}, recharging {})",
            self.host,
            self.port,
            self.keys.len(),
            self.planner,
            if self.recharging_enabled { "on" } else { "off" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 9999);
        assert_eq!(config.keys.len(), 5);
        assert_eq!(config.keys[2].server_key, 18789);
        assert_eq!(config.keys[2].client_key, 13603);
        assert_eq!(config.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.recharge_timeout(), Duration::from_secs(5));
        assert!(config.recharging_enabled);
    }

    #[test]
    fn parses_partial_json() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"port": 2099, "planner": "bfs"}"#).unwrap();
        assert_eq!(config.port, 2099);
        assert_eq!(config.planner, Planner::Bfs);
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(serde_json::from_str::<ServerConfig>(r#"{"prot": 1}"#).is_err());
    }

    #[test]
    fn planner_from_str() {
        assert_eq!("simple".parse::<Planner>().unwrap(), Planner::Simple);
        assert_eq!("BFS".parse::<Planner>().unwrap(), Planner::Bfs);
        assert!("dijkstra".parse::<Planner>().is_err());
    }
}
