//! Swarm coordinator: the tick and the out-of-band overrides.
//!
//! `SimulationState` is an immutable snapshot. `tick` consumes a reference to
//! the current snapshot and returns the next one; overrides are applied to a
//! clone. The host decides which snapshot is authoritative.

use crate::config::{CoordinatorConfig, SwarmConfig};
use crate::consensus::{poll_consensus, ConsensusResult};
use crate::engine::{advance_node, TickContext};
use crate::resources::ResourceMetrics;
use crate::roster::{boot_logs, initial_roster, MOCK_MESSAGES};
use chrono::{DateTime, Utc};
use neurgenesis_core::{
    clamp_unit, DeliveryStatus, Error, Identity, LogEntry, LogLevel, LogSource, Message,
    MetricsSnapshot, Node, NodeId, Result, TopologyMode,
};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

pub const GLOBAL_STABILITY: f64 = 0.95;
pub const ETHICAL_ALIGNMENT: f64 = 0.98;

/// Score added to every node by an anomaly injection.
pub const ANOMALY_SCORE_BOOST: f64 = 0.3;
/// Dissonance every node is forced to by an anomaly injection.
pub const ANOMALY_DISSONANCE: f64 = 0.9;

/// Infection above this counts a node as affected.
pub const AFFECTED_THRESHOLD: f64 = 0.1;

const CYCLE_SOURCES: [LogSource; 3] = [LogSource::Erps, LogSource::Sigma, LogSource::Epinoetics];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    /// Committed ticks since start.
    pub tick: u64,
    pub nodes: Vec<Node>,
    /// Oldest first.
    pub metrics_history: VecDeque<MetricsSnapshot>,
    /// Newest first.
    pub logs: VecDeque<LogEntry>,
    pub topology: TopologyMode,
    pub resources: ResourceMetrics,
    pub self_allocation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_consensus: Option<ConsensusResult>,
}

impl SimulationState {
    /// A state over `nodes` carrying the boot log.
    pub fn with_nodes(nodes: Vec<Node>, now: DateTime<Utc>) -> Self {
        Self {
            tick: 0,
            nodes,
            metrics_history: VecDeque::new(),
            logs: boot_logs(now).into(),
            topology: TopologyMode::default(),
            resources: ResourceMetrics::default(),
            self_allocation: false,
            last_consensus: None,
        }
    }

    /// The fixed initial roster.
    pub fn initial(config: &SwarmConfig, now: DateTime<Utc>) -> Self {
        Self::with_nodes(initial_roster(&config.roster), now)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == *id)
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == *id)
            .ok_or_else(|| Error::node_not_found(id.as_str()))
    }

    pub fn average_score(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        self.nodes.iter().map(|n| n.composite_score).sum::<f64>() / self.nodes.len() as f64
    }

    /// Nodes with infection above `AFFECTED_THRESHOLD`.
    pub fn affected_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.infection_level > AFFECTED_THRESHOLD)
            .count()
    }

    /// Ticks as wall time, `HH:MM:SS`.
    pub fn runtime(&self) -> String {
        let secs = self.tick;
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    pub fn latest_metrics(&self) -> Option<&MetricsSnapshot> {
        self.metrics_history.back()
    }

    /// Prepend to the in-world log and mirror to tracing.
    pub fn push_log(
        &mut self,
        source: LogSource,
        level: LogLevel,
        message: impl Into<String>,
        now: DateTime<Utc>,
        capacity: usize,
    ) {
        let entry = LogEntry::new(source, level, message, now);
        debug!(source = ?entry.source, level = ?entry.level, "{}", entry.message);
        self.logs.push_front(entry);
        self.logs.truncate(capacity);
    }

    // ============================================================
    // Overrides
    // ============================================================

    /// Boost every node's score and force dissonance high, immediately.
    pub fn inject_anomaly(&mut self, config: &CoordinatorConfig, now: DateTime<Utc>) {
        for node in &mut self.nodes {
            node.composite_score = clamp_unit(node.composite_score + ANOMALY_SCORE_BOOST);
            node.phenomenology.dissonance_response = ANOMALY_DISSONANCE;
        }
        self.push_log(
            LogSource::System,
            LogLevel::Critical,
            "FORCED ANOMALY INJECTION DETECTED",
            now,
            config.log_capacity,
        );
    }

    /// Seed `target` with full infection.
    pub fn inject_meme(
        &mut self,
        target: &NodeId,
        concept: &str,
        config: &CoordinatorConfig,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let node = self.node_mut(target)?;
        node.infection_level = 1.0;
        let name = node.name.clone();
        self.push_log(
            LogSource::Oracle,
            LogLevel::Alert,
            format!("Memetic payload \"{}\" injected into {}", concept, name),
            now,
            config.log_capacity,
        );
        Ok(())
    }

    /// Clear infection from every node.
    pub fn reset_infection(&mut self, config: &CoordinatorConfig, now: DateTime<Utc>) {
        let cleared = self.nodes.iter().filter(|n| n.is_infected()).count();
        for node in &mut self.nodes {
            node.infection_level = 0.0;
        }
        debug!("Cleared infection on {} nodes", cleared);
        self.push_log(
            LogSource::System,
            LogLevel::Success,
            "Memetic quarantine complete. Infection cleared.",
            now,
            config.log_capacity,
        );
    }

    pub fn cycle_topology(&mut self, config: &CoordinatorConfig, now: DateTime<Utc>) {
        self.topology = self.topology.next();
        self.push_log(
            LogSource::Epinoetics,
            LogLevel::Info,
            format!("Topology reconfigured: {:?}", self.topology).to_uppercase(),
            now,
            config.log_capacity,
        );
    }

    pub fn apply_identity(
        &mut self,
        id: &NodeId,
        identity: Identity,
        config: &CoordinatorConfig,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let node = self.node_mut(id)?;
        let line = format!("Identity forged for {}: {}", node.name, identity.alias);
        node.identity = Some(identity);
        self.push_log(LogSource::Oracle, LogLevel::Success, line, now, config.log_capacity);
        Ok(())
    }

    pub fn run_consensus<R: Rng + ?Sized>(
        &mut self,
        proposal: &str,
        config: &CoordinatorConfig,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> ConsensusResult {
        let result = poll_consensus(&self.nodes, proposal, rng);
        let (level, verdict) = if result.passed {
            (LogLevel::Success, "PASSED")
        } else {
            (LogLevel::Warning, "REJECTED")
        };
        self.push_log(
            LogSource::Sigma,
            level,
            format!(
                "Consensus {} on \"{}\" ({} yes / {} no / {} abstain)",
                verdict, proposal, result.yes, result.no, result.abstain
            ),
            now,
            config.log_capacity,
        );
        self.last_consensus = Some(result.clone());
        result
    }

    pub fn set_self_allocation(&mut self, enabled: bool) {
        self.self_allocation = enabled;
    }

    /// One resource step. No-op while self-allocation is off.
    pub fn step_resources<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.self_allocation {
            self.resources = self.resources.step(rng);
        }
    }
}

// ============================================================
// Tick
// ============================================================

/// Each node independently, with probability `probability`, sends one
/// message to a uniformly chosen other node. Never addressed to the sender:
/// recipients are redrawn while their id matches the sender's, and a roster
/// with a single distinct id originates nothing.
pub fn originate_messages<R: Rng + ?Sized>(
    nodes: &[Node],
    probability: f64,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Vec<Message> {
    if nodes.len() < 2 {
        return Vec::new();
    }

    let mut messages = Vec::new();
    for sender in nodes {
        if rng.gen::<f64>() >= probability {
            continue;
        }
        if nodes.iter().all(|n| n.id == sender.id) {
            continue;
        }
        let mut j = rng.gen_range(0..nodes.len());
        while nodes[j].id == sender.id {
            j = rng.gen_range(0..nodes.len());
        }
        let content = MOCK_MESSAGES.choose(rng).copied().unwrap_or_default();
        let status = if rng.gen::<bool>() {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Encrypted
        };
        messages.push(Message::new(
            sender.id.clone(),
            nodes[j].id.clone(),
            content,
            status,
            now,
        ));
    }
    messages
}

/// Advance the whole swarm one tick.
pub fn tick<R: Rng + ?Sized>(
    state: &SimulationState,
    config: &SwarmConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> SimulationState {
    let coord = &config.coordinator;
    let ctx = TickContext::new(state.tick + 1, now);

    let messages = originate_messages(&state.nodes, coord.message_probability, rng, now);

    let nodes: Vec<Node> = state
        .nodes
        .iter()
        .map(|node| {
            let relevant: Vec<Message> = messages
                .iter()
                .filter(|m| m.involves(&node.id))
                .cloned()
                .collect();
            advance_node(node, &relevant, &ctx, &config.engine, rng)
        })
        .collect();

    let mut next = SimulationState {
        tick: ctx.tick,
        nodes,
        ..state.clone()
    };

    let network_load = if next.nodes.is_empty() {
        0.0
    } else {
        messages.len() as f64 / next.nodes.len() as f64
    };
    next.metrics_history.push_back(MetricsSnapshot {
        timestamp: now,
        average_score: next.average_score(),
        global_stability: GLOBAL_STABILITY,
        ethical_alignment: ETHICAL_ALIGNMENT,
        network_load,
    });
    while next.metrics_history.len() > coord.history_capacity {
        next.metrics_history.pop_front();
    }

    if rng.gen::<f64>() < coord.log_probability {
        let source = *CYCLE_SOURCES.choose(rng).unwrap_or(&LogSource::System);
        next.push_log(source, LogLevel::Info, "Process cycle complete.", now, coord.log_capacity);
    }

    next
}
