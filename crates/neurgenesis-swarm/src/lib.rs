//! Neurgenesis swarm: simulation engine, coordinator and host driver
//!
//! Layers, bottom up:
//! - `engine`: one node, one tick, pure over an injected random source
//! - `coordinator`: message origination, fan-out, metrics, overrides
//! - `driver`: authoritative snapshot, running flag, timers
//! - `persistence` / `identity`: the two collaborators the driver talks to

pub mod config;
pub mod consensus;
pub mod coordinator;
pub mod driver;
pub mod engine;
pub mod identity;
pub mod persistence;
pub mod resources;
pub mod roster;

pub use config::SwarmConfig;
pub use coordinator::{tick, SimulationState};
pub use driver::{LinkRef, Selection, Swarm, SwarmStatus};
pub use engine::{advance_node, TickContext};
pub use identity::IdentityForge;
pub use persistence::{run_persistence, FileStore, KeyValueStore, MemoryStore, RosterStore};
