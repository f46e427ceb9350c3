/* Role bundles and the server builder. Each polymorphic role of a session
is a small closed set of variants; a bundle pins one choice per role. */

use crate::config::{Planner, ServerConfig};
use crate::server::Server;

/// Which reader variant sessions get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    /// Control records are protocol violations.
    Plain,
    /// RECHARGING .. FULL POWER pauses are absorbed transparently.
    Recharging,
}

/// One concrete choice per session role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bundle {
    pub reader: ReaderKind,
    pub planner: Planner,
}

impl Bundle {
    /// No recharging support, axis-by-axis navigation.
    pub fn plain() -> Self {
        Self {
            reader: ReaderKind::Plain,
            planner: Planner::Simple,
        }
    }

    /// Recharging-aware reader, axis-by-axis navigation.
    pub fn recharging() -> Self {
        Self {
            reader: ReaderKind::Recharging,
            planner: Planner::Simple,
        }
    }

    /// Recharging-aware reader plus the BFS path planner.
    pub fn extended() -> Self {
        Self {
            reader: ReaderKind::Recharging,
            planner: Planner::Bfs,
        }
    }

    pub(crate) fn from_config(config: &ServerConfig) -> Self {
        Self {
            reader: if config.recharging_enabled {
                ReaderKind::Recharging
            } else {
                ReaderKind::Plain
            },
            planner: config.planner,
        }
    }
}

/// Assembles a [`Server`] from a configuration and an optional explicit
/// bundle. Without one, the bundle follows the configuration.
pub struct ServerBuilder {
    config: ServerConfig,
    bundle: Option<Bundle>,
}

impl ServerBuilder {
    pub(crate) fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            bundle: None,
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_bundle(mut self, bundle: Bundle) -> Self {
        self.bundle = Some(bundle);
        self
    }

    pub fn build(self) -> Server {
        let bundle = self
            .bundle
            .unwrap_or_else(|| Bundle::from_config(&self.config));
        Server::new(self.config, bundle)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
