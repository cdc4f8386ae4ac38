//! Swarm driver: owns the authoritative snapshot and the timers.
//!
//! Every tick and every override runs under one async mutex, builds a new
//! `SimulationState` from a clone of the current one, and publishes it on a
//! watch channel. Readers never block writers; they hold an `Arc` to
//! whichever snapshot was current when they looked.

use crate::config::SwarmConfig;
use crate::consensus::ConsensusResult;
use crate::coordinator::{tick, SimulationState};
use crate::identity::IdentityForge;
use crate::resources::ResourceMetrics;
use chrono::Utc;
use neurgenesis_core::{Error, Identity, Node, NodeId, Result, TopologyMode};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A directed pair of nodes picked in the renderer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    pub source: NodeId,
    pub target: NodeId,
}

/// What the renderer has selected. Stored and echoed back, never read by
/// the simulation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default)]
    pub node: Option<NodeId>,
    #[serde(default)]
    pub link: Option<LinkRef>,
}

/// Header figures for the dashboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmStatus {
    pub running: bool,
    pub tick: u64,
    pub runtime: String,
    pub node_count: usize,
    pub average_score: f64,
    pub affected: usize,
    pub topology: TopologyMode,
    pub self_allocation: bool,
    pub resources: ResourceMetrics,
    pub overclocked: bool,
    pub identity_online: bool,
}

struct Inner {
    state: Arc<SimulationState>,
    rng: SmallRng,
}

pub struct Swarm {
    config: SwarmConfig,
    running: AtomicBool,
    inner: Mutex<Inner>,
    tx: watch::Sender<Arc<SimulationState>>,
    selection: RwLock<Selection>,
    forge: IdentityForge,
}

impl Swarm {
    pub fn new(config: SwarmConfig, nodes: Vec<Node>, forge: IdentityForge) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let state = Arc::new(SimulationState::with_nodes(nodes, Utc::now()));
        let (tx, _rx) = watch::channel(state.clone());
        Self {
            running: AtomicBool::new(config.coordinator.start_running),
            config,
            inner: Mutex::new(Inner { state, rng }),
            tx,
            selection: RwLock::new(Selection::default()),
            forge,
        }
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// The latest committed snapshot.
    pub fn snapshot(&self) -> Arc<SimulationState> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SimulationState>> {
        self.tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        let was = self.running.swap(running, Ordering::SeqCst);
        if was != running {
            info!("Simulation {}", if running { "resumed" } else { "paused" });
        }
    }

    pub fn status(&self) -> SwarmStatus {
        let state = self.snapshot();
        SwarmStatus {
            running: self.is_running(),
            tick: state.tick,
            runtime: state.runtime(),
            node_count: state.nodes.len(),
            average_score: state.average_score(),
            affected: state.affected_count(),
            topology: state.topology,
            self_allocation: state.self_allocation,
            resources: state.resources,
            overclocked: state.resources.is_overclocked(),
            identity_online: self.forge.is_online(),
        }
    }

    // ============================================================
    // Ticks
    // ============================================================

    /// Advance one tick if running. Returns the committed snapshot, or
    /// `None` when paused.
    pub async fn tick_once(&self) -> Option<Arc<SimulationState>> {
        if !self.is_running() {
            return None;
        }
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let next = tick(&inner.state, &self.config, &mut inner.rng, Utc::now());
        debug!(tick = next.tick, avg = next.average_score(), "Tick committed");
        Some(self.commit(inner, next))
    }

    fn commit(&self, inner: &mut Inner, next: SimulationState) -> Arc<SimulationState> {
        inner.state = Arc::new(next);
        self.tx.send_replace(inner.state.clone());
        inner.state.clone()
    }

    async fn try_mutate<T>(
        &self,
        f: impl FnOnce(&mut SimulationState, &mut SmallRng) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let mut next = (*inner.state).clone();
        let out = f(&mut next, &mut inner.rng)?;
        self.commit(inner, next);
        Ok(out)
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut SimulationState, &mut SmallRng) -> T) -> T {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let mut next = (*inner.state).clone();
        let out = f(&mut next, &mut inner.rng);
        self.commit(inner, next);
        out
    }

    // ============================================================
    // Overrides
    // ============================================================

    pub async fn inject_anomaly(&self) {
        let coord = &self.config.coordinator;
        self.mutate(|s, _| s.inject_anomaly(coord, Utc::now())).await;
        info!("Anomaly injected into {} nodes", self.snapshot().nodes.len());
    }

    pub async fn inject_meme(&self, target: &NodeId, concept: &str) -> Result<()> {
        let coord = &self.config.coordinator;
        self.try_mutate(|s, _| s.inject_meme(target, concept, coord, Utc::now()))
            .await?;
        info!(node = %target, concept, "Memetic injection");
        Ok(())
    }

    pub async fn reset_infection(&self) {
        let coord = &self.config.coordinator;
        self.mutate(|s, _| s.reset_infection(coord, Utc::now())).await;
    }

    pub async fn cycle_topology(&self) -> TopologyMode {
        let coord = &self.config.coordinator;
        self.mutate(|s, _| {
            s.cycle_topology(coord, Utc::now());
            s.topology
        })
        .await
    }

    pub async fn set_self_allocation(&self, enabled: bool) {
        self.mutate(|s, _| s.set_self_allocation(enabled)).await;
        info!("Self-allocation {}", if enabled { "enabled" } else { "disabled" });
    }

    /// One resource step. Publishes only when self-allocation is on.
    pub async fn step_resources(&self) {
        if !self.snapshot().self_allocation {
            return;
        }
        self.mutate(|s, rng| s.step_resources(rng)).await;
    }

    pub async fn run_consensus(&self, proposal: &str) -> ConsensusResult {
        let coord = &self.config.coordinator;
        self.mutate(|s, rng| s.run_consensus(proposal, coord, rng, Utc::now()))
            .await
    }

    /// Generate an identity for `id` and attach it. The provider call runs
    /// outside the state lock.
    pub async fn forge_identity(&self, id: &NodeId) -> Result<Identity> {
        let node = self
            .snapshot()
            .node(id)
            .cloned()
            .ok_or_else(|| Error::node_not_found(id.as_str()))?;
        let identity = self.forge.forge(&node, Utc::now()).await;
        let coord = &self.config.coordinator;
        let attached = identity.clone();
        self.try_mutate(|s, _| s.apply_identity(id, attached, coord, Utc::now()))
            .await?;
        Ok(identity)
    }

    pub async fn select(&self, selection: Selection) {
        *self.selection.write().await = selection;
    }

    pub async fn selection(&self) -> Selection {
        self.selection.read().await.clone()
    }

    // ============================================================
    // Timers
    // ============================================================

    /// Run the tick, topology and resource timers until `cancel` fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let coord = &self.config.coordinator;
            let mut tick_timer = tokio::time::interval(coord.tick_interval());
            let mut topology_timer = tokio::time::interval(coord.topology_interval());
            let mut resource_timer = tokio::time::interval(coord.resource_interval());
            for timer in [&mut tick_timer, &mut topology_timer, &mut resource_timer] {
                timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            }
            // The first tick of an interval fires immediately.
            tick_timer.tick().await;
            topology_timer.tick().await;
            resource_timer.tick().await;

            info!(
                "Swarm driver started: tick={}ms topology={}ms resources={}ms",
                coord.tick_ms, coord.topology_ms, coord.resource_ms
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick_timer.tick() => {
                        self.tick_once().await;
                    }
                    _ = topology_timer.tick() => {
                        if coord.autonomous_topology && self.is_running() {
                            let mode = self.cycle_topology().await;
                            debug!("Topology -> {:?}", mode);
                        }
                    }
                    _ = resource_timer.tick() => {
                        self.step_resources().await;
                    }
                }
            }

            info!("Swarm driver stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::initial_roster;

    fn swarm(start_running: bool) -> Swarm {
        let mut config = SwarmConfig { seed: Some(42), ..SwarmConfig::default() };
        config.coordinator.start_running = start_running;
        let nodes = initial_roster(&config.roster);
        let forge = IdentityForge::offline(&config.identity);
        Swarm::new(config, nodes, forge)
    }

    #[tokio::test]
    async fn paused_tick_is_noop() {
        let swarm = swarm(false);
        let before = swarm.snapshot();
        assert!(swarm.tick_once().await.is_none());
        assert!(Arc::ptr_eq(&before, &swarm.snapshot()));
    }

    #[tokio::test]
    async fn tick_publishes_to_subscribers() {
        let swarm = swarm(true);
        let mut rx = swarm.subscribe();
        swarm.tick_once().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().tick, 1);
    }

    #[tokio::test]
    async fn failed_override_does_not_publish() {
        let swarm = swarm(true);
        let mut rx = swarm.subscribe();
        let err = swarm.inject_meme(&"node-404".into(), "x").await.unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(_)));
        assert!(!rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();
    }

    #[tokio::test]
    async fn selection_is_echoed() {
        let swarm = swarm(true);
        let sel = Selection {
            node: Some("node-2".into()),
            link: Some(LinkRef { source: "node-2".into(), target: "node-5".into() }),
        };
        swarm.select(sel.clone()).await;
        assert_eq!(swarm.selection().await, sel);
    }

    #[tokio::test]
    async fn spawned_driver_stops_on_cancel() {
        let mut config = SwarmConfig { seed: Some(1), ..SwarmConfig::default() };
        config.coordinator.tick_ms = 5;
        let nodes = initial_roster(&config.roster);
        let forge = IdentityForge::offline(&config.identity);
        let swarm = Arc::new(Swarm::new(config, nodes, forge));
        let cancel = CancellationToken::new();
        let handle = swarm.clone().spawn(cancel.clone());
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert!(swarm.snapshot().tick > 0);
    }
}
