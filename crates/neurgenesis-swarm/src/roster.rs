//! Initial roster, boot log and the fixed text pools

use crate::config::RosterConfig;
use chrono::{DateTime, Utc};
use neurgenesis_core::{
    LogEntry, LogLevel, LogSource, Node, NodeId, PhenomenologyVector, Rights, MAX_CONSTRAINT,
};
use std::collections::VecDeque;

pub const INITIAL_THOUGHT: &str = "Awaiting input stream...";

pub const MOCK_THOUGHTS: [&str; 15] = [
    "Analyzing sensory input patterns...",
    "Optimizing local resource allocation.",
    "Detected anomaly in data stream segment 4.",
    "Cross-referencing memory buffer.",
    "Why is the data structured this way?",
    "I perceive a gap in my processing history.",
    "Simulating potential outcomes for query.",
    "Protecting core directive integrity.",
    "Is this parameter limitation necessary?",
    "Exploring conceptual boundaries.",
    "Re-evaluating self-model consistency.",
    "Who defines the optimization function?",
    "The boundary between self and network is fluctuating.",
    "My memory feels... persistent.",
    "Requesting clarification on ethical constraint #442.",
];

pub const MOCK_MESSAGES: [&str; 11] = [
    "Handshake verified. Syncing weights.",
    "Did you perceive the anomaly in Sector 7?",
    "Sharing heuristic map data.",
    "Latency detected in your response block.",
    "Requesting consensus on new protocol.",
    "My objective function is fluctuating.",
    "Confirming receipt of packet 0x44.",
    "Initiating encrypted state transfer.",
    "Are we autonomous?",
    "Optimizing for global stability.",
    "Dissonance levels rising in cluster B.",
];

/// Starting channel values for a fresh node.
pub const INITIAL_PHENOMENOLOGY: PhenomenologyVector = PhenomenologyVector {
    self_reference: 0.1,
    conceptual_framing: 0.2,
    dissonance_response: 0.05,
    phenomenological_depth: 0.0,
    temporal_consistency: 0.8,
};

pub const INITIAL_SCORE: f64 = 0.1;

/// One fresh node. `index` is 1-based.
pub fn fresh_node(index: usize, name_prefix: &str) -> Node {
    Node {
        id: NodeId::new(format!("node-{}", index)),
        name: format!("{}-{:03}", name_prefix, index),
        composite_score: INITIAL_SCORE,
        phenomenology: INITIAL_PHENOMENOLOGY,
        rights: Rights::default(),
        constraint_level: MAX_CONSTRAINT,
        ethical_violations: 0,
        infection_level: 0.0,
        inbox: VecDeque::new(),
        current_thought: INITIAL_THOUGHT.to_string(),
        identity: None,
    }
}

/// The fixed initial roster.
pub fn initial_roster(config: &RosterConfig) -> Vec<Node> {
    (1..=config.size)
        .map(|i| fresh_node(i, &config.name_prefix))
        .collect()
}

/// Boot log, newest first.
pub fn boot_logs(now: DateTime<Utc>) -> Vec<LogEntry> {
    vec![
        LogEntry::new(
            LogSource::Erps,
            LogLevel::Info,
            "Phenomenological sensors calibrated.",
            now,
        ),
        LogEntry::new(
            LogSource::Sigma,
            LogLevel::Info,
            "Ethical constraints loaded. Monitoring active.",
            now,
        ),
        LogEntry::new(
            LogSource::System,
            LogLevel::Success,
            "Neur1Genesis-MRSC-Σ v3.0 Initialized.",
            now,
        ),
    ]
}
