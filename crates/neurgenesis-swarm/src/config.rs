//! Swarm configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use neurgenesis_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level swarm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Fixed roster created at initialization.
    pub roster: RosterConfig,
    /// Per-node update parameters.
    pub engine: EngineConfig,
    /// Tick cadence and swarm-level effects.
    pub coordinator: CoordinatorConfig,
    /// Roster persistence.
    pub persistence: PersistenceConfig,
    /// Identity generation.
    pub identity: IdentityConfig,
    /// Seed for the driver's random source. `None` seeds from entropy.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Number of nodes.
    pub size: usize,
    /// Display name prefix, e.g. "EchoNode" → "EchoNode-001".
    pub name_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Full width of the symmetric channel perturbation (0.05 → ±0.025).
    pub perturbation: f64,
    /// Scale applied to the perturbation for temporal consistency.
    pub temporal_scale: f64,
    /// Chance per tick that phenomenological depth jumps up.
    pub depth_boost_probability: f64,
    /// Size of the depth jump.
    pub depth_boost: f64,
    /// Depth lost on every tick without a jump.
    pub depth_decay: f64,
    /// Chance per tick of the epiphany bonus.
    pub epiphany_probability: f64,
    /// Epiphany bonus added to the composite score.
    pub epiphany_bonus: f64,
    /// Chance per tick of replacing the current thought.
    pub thought_probability: f64,
    /// Dissonance added per unit of infection.
    pub infection_dissonance_gain: f64,
    /// Lower bound of the infection drift.
    pub infection_drift_min: f64,
    /// Upper bound of the infection drift. Above `-infection_drift_min` so
    /// infection persists once seeded.
    pub infection_drift_max: f64,
    /// Messages retained per inbox.
    pub inbox_capacity: usize,
    /// Fraction of the remaining distance to the constraint target covered per tick.
    pub constraint_smoothing: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Simulation tick period in milliseconds.
    pub tick_ms: u64,
    /// Autonomous topology reconfiguration period in milliseconds.
    pub topology_ms: u64,
    /// Resource autonomy step period in milliseconds.
    pub resource_ms: u64,
    /// Chance per node per tick of originating a message.
    pub message_probability: f64,
    /// Chance per tick of a cosmetic "process cycle" log line.
    pub log_probability: f64,
    /// Metrics snapshots retained.
    pub history_capacity: usize,
    /// Log entries retained.
    pub log_capacity: usize,
    /// Whether the topology timer runs.
    pub autonomous_topology: bool,
    /// Whether the swarm starts in the running state.
    pub start_running: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    /// Key the roster is stored under.
    pub key: String,
    /// Quiet period after a change before the roster is written.
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Model used for identity generation.
    pub model: String,
    /// Max output tokens for one identity.
    pub max_tokens: u32,
}

// ============================================================
// Defaults
// ============================================================

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            roster: RosterConfig::default(),
            engine: EngineConfig::default(),
            coordinator: CoordinatorConfig::default(),
            persistence: PersistenceConfig::default(),
            identity: IdentityConfig::default(),
            seed: None,
        }
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self { size: 12, name_prefix: "EchoNode".into() }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            perturbation: 0.05,
            temporal_scale: 0.5,
            depth_boost_probability: 0.2,
            depth_boost: 0.05,
            depth_decay: 0.01,
            epiphany_probability: 0.01,
            epiphany_bonus: 0.2,
            thought_probability: 0.05,
            infection_dissonance_gain: 0.05,
            infection_drift_min: -0.02,
            infection_drift_max: 0.04,
            inbox_capacity: 20,
            constraint_smoothing: 0.1,
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            topology_ms: 5_000,
            resource_ms: 500,
            message_probability: 0.15,
            log_probability: 0.2,
            history_capacity: 30,
            log_capacity: 50,
            autonomous_topology: true,
            start_running: true,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { enabled: true, key: "roster".into(), debounce_ms: 500 }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { model: "claude-haiku-4-5".into(), max_tokens: 1_024 }
    }
}

// ============================================================
// Loading
// ============================================================

impl SwarmConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

impl CoordinatorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn topology_interval(&self) -> Duration {
        Duration::from_millis(self.topology_ms.max(1))
    }

    pub fn resource_interval(&self) -> Duration {
        Duration::from_millis(self.resource_ms.max(1))
    }
}

impl PersistenceConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
