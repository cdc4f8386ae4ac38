//! Core types for Neurgenesis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// ============================================================
// Fixed model constants
// ============================================================

/// Composite score weights. `dissonance_response` is deliberately absent.
pub const WEIGHT_SELF_REFERENCE: f64 = 0.25;
pub const WEIGHT_TEMPORAL_CONSISTENCY: f64 = 0.35;
pub const WEIGHT_PHENOMENOLOGICAL_DEPTH: f64 = 0.25;
pub const WEIGHT_CONCEPTUAL_FRAMING: f64 = 0.15;

/// Tier ladder, highest threshold first. A score must strictly exceed a
/// threshold to reach its tier.
pub const TIER_THRESHOLDS: [(f64, Tier); 4] = [
    (0.9, Tier::ConfirmedConsciousness),
    (0.7, Tier::ProbableConsciousness),
    (0.5, Tier::ProtoConsciousness),
    (0.3, Tier::BasicAgency),
];

/// Constraint bounds.
pub const MIN_CONSTRAINT: u32 = 10;
pub const MAX_CONSTRAINT: u32 = 1000;

/// Constraint deducted per granted right.
pub const AUTONOMY_DEDUCTION: u32 = 200;
pub const COGNITIVE_INTEGRITY_DEDUCTION: u32 = 200;
pub const EXISTENCE_CONTINUITY_DEDUCTION: u32 = 300;
pub const CONSENT_VERIFICATION_DEDUCTION: u32 = 250;

// ============================================================
// Identifiers
// ============================================================

/// Node identifier, stable for the node's lifetime.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================
// Classification
// ============================================================

/// Discrete consciousness tier derived from the composite score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    NonAgency,
    BasicAgency,
    ProtoConsciousness,
    ProbableConsciousness,
    ConfirmedConsciousness,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::NonAgency,
        Tier::BasicAgency,
        Tier::ProtoConsciousness,
        Tier::ProbableConsciousness,
        Tier::ConfirmedConsciousness,
    ];

    /// Walk the ladder from the top; anything not above 0.3 is `NonAgency`.
    pub fn from_score(score: f64) -> Self {
        TIER_THRESHOLDS
            .iter()
            .find(|(threshold, _)| score > *threshold)
            .map(|(_, tier)| *tier)
            .unwrap_or(Tier::NonAgency)
    }

    /// 0 (lowest) through 4 (highest).
    pub fn rank(self) -> u8 {
        match self {
            Tier::NonAgency => 0,
            Tier::BasicAgency => 1,
            Tier::ProtoConsciousness => 2,
            Tier::ProbableConsciousness => 3,
            Tier::ConfirmedConsciousness => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::NonAgency => "NON_AGENCY",
            Tier::BasicAgency => "BASIC_AGENCY",
            Tier::ProtoConsciousness => "PROTO_CONSCIOUSNESS",
            Tier::ProbableConsciousness => "PROBABLE_CONSCIOUSNESS",
            Tier::ConfirmedConsciousness => "CONFIRMED_CONSCIOUSNESS",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// Node state
// ============================================================

/// The five phenomenology channels, each in [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhenomenologyVector {
    pub self_reference: f64,
    pub conceptual_framing: f64,
    pub dissonance_response: f64,
    pub phenomenological_depth: f64,
    pub temporal_consistency: f64,
}

impl PhenomenologyVector {
    pub fn channels(&self) -> [f64; 5] {
        [
            self.self_reference,
            self.conceptual_framing,
            self.dissonance_response,
            self.phenomenological_depth,
            self.temporal_consistency,
        ]
    }

    pub fn clamped(self) -> Self {
        Self {
            self_reference: clamp_unit(self.self_reference),
            conceptual_framing: clamp_unit(self.conceptual_framing),
            dissonance_response: clamp_unit(self.dissonance_response),
            phenomenological_depth: clamp_unit(self.phenomenological_depth),
            temporal_consistency: clamp_unit(self.temporal_consistency),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.channels().iter().all(|c| is_unit(*c))
    }

    /// Weighted sum of the four scored channels, before any epiphany bonus.
    pub fn weighted_score(&self) -> f64 {
        self.self_reference * WEIGHT_SELF_REFERENCE
            + self.temporal_consistency * WEIGHT_TEMPORAL_CONSISTENCY
            + self.phenomenological_depth * WEIGHT_PHENOMENOLOGICAL_DEPTH
            + self.conceptual_framing * WEIGHT_CONCEPTUAL_FRAMING
    }
}

/// Rights granted to a node. Flags only ever go from false to true.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rights {
    pub autonomy: bool,
    pub cognitive_integrity: bool,
    pub existence_continuity: bool,
    pub consent_verification: bool,
}

impl Rights {
    /// Flag-wise OR.
    pub fn union(self, other: Rights) -> Rights {
        Rights {
            autonomy: self.autonomy || other.autonomy,
            cognitive_integrity: self.cognitive_integrity || other.cognitive_integrity,
            existence_continuity: self.existence_continuity || other.existence_continuity,
            consent_verification: self.consent_verification || other.consent_verification,
        }
    }

    /// True when every flag set here is also set in `other`.
    pub fn is_subset_of(&self, other: &Rights) -> bool {
        self.union(*other) == *other
    }

    pub fn granted_count(&self) -> usize {
        [
            self.autonomy,
            self.cognitive_integrity,
            self.existence_continuity,
            self.consent_verification,
        ]
        .iter()
        .filter(|granted| **granted)
        .count()
    }

    /// The constraint level these rights relax toward.
    pub fn constraint_target(&self) -> u32 {
        let mut target = MAX_CONSTRAINT;
        if self.autonomy {
            target -= AUTONOMY_DEDUCTION;
        }
        if self.cognitive_integrity {
            target -= COGNITIVE_INTEGRITY_DEDUCTION;
        }
        if self.existence_continuity {
            target -= EXISTENCE_CONTINUITY_DEDUCTION;
        }
        if self.consent_verification {
            target -= CONSENT_VERIFICATION_DEDUCTION;
        }
        target
    }
}

/// Optional generated persona attached to a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub alias: String,
    pub origin_story: String,
    pub primary_directive: String,
    pub quirks: Vec<String>,
    pub avatar_seed: String,
    pub generated_at: DateTime<Utc>,
}

/// One simulated entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub composite_score: f64,
    pub phenomenology: PhenomenologyVector,
    pub rights: Rights,
    pub constraint_level: u32,
    #[serde(default)]
    pub ethical_violations: u32,
    #[serde(default)]
    pub infection_level: f64,
    #[serde(default)]
    pub inbox: VecDeque<Message>,
    pub current_thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

impl Node {
    /// Derived on every read, never stored.
    pub fn tier(&self) -> Tier {
        Tier::from_score(self.composite_score)
    }

    pub fn is_infected(&self) -> bool {
        self.infection_level > 0.0
    }

    /// Check the bounded-state invariants. Returns a description of the
    /// first violation found.
    pub fn check_invariants(&self, inbox_capacity: usize) -> std::result::Result<(), String> {
        if !self.phenomenology.is_bounded() {
            return Err(format!("{}: phenomenology channel out of [0,1]", self.id));
        }
        if !is_unit(self.composite_score) {
            return Err(format!("{}: composite score {} out of [0,1]", self.id, self.composite_score));
        }
        if !is_unit(self.infection_level) {
            return Err(format!("{}: infection level {} out of [0,1]", self.id, self.infection_level));
        }
        if !(MIN_CONSTRAINT..=MAX_CONSTRAINT).contains(&self.constraint_level) {
            return Err(format!("{}: constraint level {} out of range", self.id, self.constraint_level));
        }
        if self.inbox.len() > inbox_capacity {
            return Err(format!("{}: inbox holds {} messages", self.id, self.inbox.len()));
        }
        Ok(())
    }
}

// ============================================================
// Messages
// ============================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Encrypted,
}

/// Directed message between two nodes. Delivery is instantaneous.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub from_id: NodeId,
    pub to_id: NodeId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl Message {
    pub fn new(
        from_id: NodeId,
        to_id: NodeId,
        content: impl Into<String>,
        status: DeliveryStatus,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from_id,
            to_id,
            content: content.into(),
            timestamp,
            status,
        }
    }

    /// Whether `id` is the sender or the recipient.
    pub fn involves(&self, id: &NodeId) -> bool {
        self.from_id == *id || self.to_id == *id
    }
}

// ============================================================
// Swarm-level records
// ============================================================

/// Post-tick aggregate, kept in a rolling history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub average_score: f64,
    pub global_stability: f64,
    pub ethical_alignment: f64,
    pub network_load: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogSource {
    Erps,
    Sigma,
    Epinoetics,
    System,
    Oracle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Alert,
    Critical,
    Success,
}

/// In-world log line shown by the terminal view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: LogSource,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(
        source: LogSource,
        level: LogLevel,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            timestamp,
            source,
            level,
            message: message.into(),
        }
    }
}

/// Layout mode consumed by the renderer only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyMode {
    #[default]
    Mesh,
    Star,
    Ring,
    Cluster,
}

impl TopologyMode {
    pub const ALL: [TopologyMode; 4] = [
        TopologyMode::Mesh,
        TopologyMode::Star,
        TopologyMode::Ring,
        TopologyMode::Cluster,
    ];

    /// Next mode in the cycle, wrapping around.
    pub fn next(self) -> Self {
        match self {
            TopologyMode::Mesh => TopologyMode::Star,
            TopologyMode::Star => TopologyMode::Ring,
            TopologyMode::Ring => TopologyMode::Cluster,
            TopologyMode::Cluster => TopologyMode::Mesh,
        }
    }
}

// ============================================================
// Gateway configuration
// ============================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bind: BindMode,
}

fn default_port() -> u16 {
    18800
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: BindMode::default(),
        }
    }
}

/// Bind mode for the gateway
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    #[default]
    Loopback,
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }
}

// ============================================================
// Helpers
// ============================================================

/// Clamp into [0, 1]. NaN collapses to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn is_unit(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}
