//! Read-only views handed to the renderer

use neurgenesis_core::{LogEntry, MetricsSnapshot, Node, Tier, TopologyMode};
use neurgenesis_swarm::consensus::ConsensusResult;
use neurgenesis_swarm::{Selection, SimulationState, SwarmStatus};
use serde::Serialize;
use std::collections::VecDeque;

/// A node with its tier derived at serialization time.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport<'a> {
    #[serde(flatten)]
    pub node: &'a Node,
    pub tier: Tier,
}

impl<'a> From<&'a Node> for NodeReport<'a> {
    fn from(node: &'a Node) -> Self {
        Self { node, tier: node.tier() }
    }
}

/// Everything the dashboard draws in one frame.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateReport<'a> {
    pub status: SwarmStatus,
    pub nodes: Vec<NodeReport<'a>>,
    pub metrics_history: &'a VecDeque<MetricsSnapshot>,
    pub logs: &'a VecDeque<LogEntry>,
    pub topology: TopologyMode,
    pub selection: Selection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_consensus: Option<&'a ConsensusResult>,
}

impl<'a> StateReport<'a> {
    pub fn new(state: &'a SimulationState, status: SwarmStatus, selection: Selection) -> Self {
        Self {
            status,
            nodes: state.nodes.iter().map(NodeReport::from).collect(),
            metrics_history: &state.metrics_history,
            logs: &state.logs,
            topology: state.topology,
            selection,
            last_consensus: state.last_consensus.as_ref(),
        }
    }
}
