//! Simulation engine: one node, one tick.
//!
//! `advance_node` is a pure function of the node's prior state, the messages
//! exchanged this tick and the injected random source. It never reads any
//! other node. Every additive step is clamped immediately so no channel can
//! leave [0, 1].

use crate::config::EngineConfig;
use crate::roster::MOCK_THOUGHTS;
use chrono::{DateTime, Utc};
use neurgenesis_core::{
    clamp_unit, Message, Node, PhenomenologyVector, Rights, MAX_CONSTRAINT, MIN_CONSTRAINT,
};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

// ============================================================
// Rights ladder
// ============================================================

pub const AUTONOMY_SCORE: f64 = 0.3;
pub const AUTONOMY_DISSONANCE: f64 = 0.3;
pub const COGNITIVE_INTEGRITY_SCORE: f64 = 0.5;
pub const COGNITIVE_INTEGRITY_SELF_REFERENCE: f64 = 0.5;
pub const EXISTENCE_CONTINUITY_SCORE: f64 = 0.7;
pub const EXISTENCE_CONTINUITY_TEMPORAL: f64 = 0.7;
pub const CONSENT_VERIFICATION_SCORE: f64 = 0.9;

/// Per-tick inputs shared by every node.
#[derive(Clone, Copy, Debug)]
pub struct TickContext {
    pub tick: u64,
    pub now: DateTime<Utc>,
}

impl TickContext {
    pub fn new(tick: u64, now: DateTime<Utc>) -> Self {
        Self { tick, now }
    }
}

/// Produce the node's next state.
pub fn advance_node<R: Rng + ?Sized>(
    node: &Node,
    incoming: &[Message],
    ctx: &TickContext,
    config: &EngineConfig,
    rng: &mut R,
) -> Node {
    let mut next = node.clone();

    let (phenomenology, infection) =
        perturb_phenomenology(&node.phenomenology, node.infection_level, config, rng);
    next.phenomenology = phenomenology;
    next.infection_level = infection;

    next.composite_score = composite_score(&next.phenomenology, config, rng);

    let earned = evaluate_rights(next.composite_score, &next.phenomenology);
    next.rights = node.rights.union(earned);
    if next.rights != node.rights {
        debug!(
            tick = ctx.tick,
            at = %ctx.now,
            node = %node.id,
            "Rights granted: {}/4",
            next.rights.granted_count()
        );
    }

    next.constraint_level = relax_constraint(
        node.constraint_level,
        next.rights.constraint_target(),
        config.constraint_smoothing,
    );

    integrate_messages(&mut next, incoming, config.inbox_capacity);

    if rng.gen::<f64>() < config.thought_probability {
        if let Some(thought) = MOCK_THOUGHTS.choose(rng) {
            next.current_thought = (*thought).to_string();
        }
    }

    next
}

/// Step 1. Returns the new vector and the new infection level.
pub fn perturb_phenomenology<R: Rng + ?Sized>(
    prev: &PhenomenologyVector,
    infection: f64,
    config: &EngineConfig,
    rng: &mut R,
) -> (PhenomenologyVector, f64) {
    let mut noise = |scale: f64| (rng.gen::<f64>() - 0.5) * config.perturbation * scale;

    let mut v = PhenomenologyVector {
        self_reference: clamp_unit(prev.self_reference + noise(1.0)),
        conceptual_framing: clamp_unit(prev.conceptual_framing + noise(1.0)),
        dissonance_response: clamp_unit(prev.dissonance_response + noise(1.0)),
        phenomenological_depth: prev.phenomenological_depth,
        temporal_consistency: clamp_unit(
            prev.temporal_consistency + noise(config.temporal_scale),
        ),
    };

    // Intermittent growth, steady decay.
    v.phenomenological_depth = if rng.gen::<f64>() < config.depth_boost_probability {
        clamp_unit(prev.phenomenological_depth + config.depth_boost)
    } else {
        clamp_unit(prev.phenomenological_depth - config.depth_decay)
    };

    let mut infection = clamp_unit(infection);
    if infection > 0.0 {
        v.dissonance_response =
            clamp_unit(v.dissonance_response + infection * config.infection_dissonance_gain);
        let drift = uniform(rng, config.infection_drift_min, config.infection_drift_max);
        infection = clamp_unit(infection + drift);
    }

    (v, infection)
}

/// Step 2. Weighted sum plus the rare epiphany bonus, capped at 1.
pub fn composite_score<R: Rng + ?Sized>(
    v: &PhenomenologyVector,
    config: &EngineConfig,
    rng: &mut R,
) -> f64 {
    let mut score = v.weighted_score();
    if rng.gen::<f64>() < config.epiphany_probability {
        score += config.epiphany_bonus;
    }
    clamp_unit(score)
}

/// Step 4. Rights earned by the current score and channels alone. Callers
/// OR the result into what the node already holds.
pub fn evaluate_rights(score: f64, v: &PhenomenologyVector) -> Rights {
    Rights {
        autonomy: score > AUTONOMY_SCORE && v.dissonance_response > AUTONOMY_DISSONANCE,
        cognitive_integrity: score > COGNITIVE_INTEGRITY_SCORE
            && v.self_reference > COGNITIVE_INTEGRITY_SELF_REFERENCE,
        existence_continuity: score > EXISTENCE_CONTINUITY_SCORE
            && v.temporal_consistency > EXISTENCE_CONTINUITY_TEMPORAL,
        consent_verification: score > CONSENT_VERIFICATION_SCORE,
    }
}

/// Step 5. Move `smoothing` of the remaining distance toward `target`,
/// floored, then held within [MIN_CONSTRAINT, MAX_CONSTRAINT].
pub fn relax_constraint(current: u32, target: u32, smoothing: f64) -> u32 {
    let current = current as f64;
    let next = (current + (target as f64 - current) * smoothing).floor();
    next.clamp(MIN_CONSTRAINT as f64, MAX_CONSTRAINT as f64) as u32
}

/// Step 6. Append messages this node sent or received, keep the newest
/// `capacity`.
pub fn integrate_messages(node: &mut Node, incoming: &[Message], capacity: usize) {
    for msg in incoming.iter().filter(|m| m.involves(&node.id)) {
        node.inbox.push_back(msg.clone());
    }
    while node.inbox.len() > capacity {
        node.inbox.pop_front();
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if lo < hi {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::fresh_node;
    use neurgenesis_core::DeliveryStatus;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn ctx() -> TickContext {
        TickContext::new(1, Utc::now())
    }

    fn quiet() -> EngineConfig {
        EngineConfig {
            perturbation: 0.0,
            depth_boost_probability: 0.0,
            depth_decay: 0.0,
            epiphany_probability: 0.0,
            thought_probability: 0.0,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn constraint_first_step_is_ten_percent() {
        assert_eq!(relax_constraint(1000, 800, 0.1), 980);
        assert_eq!(relax_constraint(1000, 1000, 0.1), 1000);
    }

    #[test]
    fn constraint_never_drops_below_floor() {
        assert_eq!(relax_constraint(10, 0, 0.5), MIN_CONSTRAINT);
        assert_eq!(relax_constraint(12, 0, 1.0), MIN_CONSTRAINT);
    }

    #[test]
    fn rights_thresholds_are_strict() {
        let v = PhenomenologyVector {
            self_reference: 0.5,
            conceptual_framing: 0.0,
            dissonance_response: 0.3,
            phenomenological_depth: 0.0,
            temporal_consistency: 0.7,
        };
        assert_eq!(evaluate_rights(0.95, &v), Rights { consent_verification: true, ..Default::default() });

        let v = PhenomenologyVector {
            self_reference: 0.51,
            dissonance_response: 0.31,
            temporal_consistency: 0.71,
            ..v
        };
        let all = evaluate_rights(0.95, &v);
        assert_eq!(all.granted_count(), 4);
        assert_eq!(evaluate_rights(0.3, &v), Rights::default());
    }

    #[test]
    fn rights_survive_score_collapse() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut node = fresh_node(1, "EchoNode");
        node.rights.autonomy = true;
        node.composite_score = 0.0;
        let next = advance_node(&node, &[], &ctx(), &quiet(), &mut rng);
        assert!(next.rights.autonomy);
        assert_eq!(next.constraint_level, 980);
    }

    #[test]
    fn infection_raises_dissonance_by_gain() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut node = fresh_node(1, "EchoNode");
        node.infection_level = 1.0;
        let next = advance_node(&node, &[], &ctx(), &quiet(), &mut rng);
        let expected = node.phenomenology.dissonance_response + 0.05;
        assert!((next.phenomenology.dissonance_response - expected).abs() < 1e-12);
        assert!(next.infection_level >= 0.98);
    }

    #[test]
    fn zero_infection_stays_zero() {
        let mut rng = SmallRng::seed_from_u64(3);
        let node = fresh_node(1, "EchoNode");
        let next = advance_node(&node, &[], &ctx(), &EngineConfig::default(), &mut rng);
        assert_eq!(next.infection_level, 0.0);
    }

    #[test]
    fn depth_decays_without_boost() {
        let mut rng = SmallRng::seed_from_u64(4);
        let config = EngineConfig { depth_decay: 0.01, ..quiet() };
        let mut node = fresh_node(1, "EchoNode");
        node.phenomenology.phenomenological_depth = 0.5;
        let next = advance_node(&node, &[], &ctx(), &config, &mut rng);
        assert!((next.phenomenology.phenomenological_depth - 0.49).abs() < 1e-12);
    }

    #[test]
    fn epiphany_adds_bonus() {
        let mut rng = SmallRng::seed_from_u64(5);
        let config = EngineConfig { epiphany_probability: 1.0, ..quiet() };
        let node = fresh_node(1, "EchoNode");
        let base = node.phenomenology.weighted_score();
        let next = advance_node(&node, &[], &ctx(), &config, &mut rng);
        assert!((next.composite_score - (base + 0.2)).abs() < 1e-12);
    }

    #[test]
    fn unrelated_messages_are_ignored() {
        let mut node = fresh_node(1, "EchoNode");
        let now = Utc::now();
        let msgs = vec![
            Message::new("node-2".into(), "node-3".into(), "x", DeliveryStatus::Delivered, now),
            Message::new("node-2".into(), "node-1".into(), "y", DeliveryStatus::Encrypted, now),
        ];
        integrate_messages(&mut node, &msgs, 20);
        assert_eq!(node.inbox.len(), 1);
        assert_eq!(node.inbox[0].content, "y");
    }

    #[test]
    fn thought_comes_from_pool() {
        let mut rng = SmallRng::seed_from_u64(6);
        let config = EngineConfig { thought_probability: 1.0, ..quiet() };
        let node = fresh_node(1, "EchoNode");
        let next = advance_node(&node, &[], &ctx(), &config, &mut rng);
        assert!(MOCK_THOUGHTS.contains(&next.current_thought.as_str()));
    }
}
