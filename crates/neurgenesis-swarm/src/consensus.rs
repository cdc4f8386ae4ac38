//! Consensus polling across the roster

use neurgenesis_core::{Node, NodeId};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Nodes above this score lean toward dissent.
pub const DISSENT_SCORE: f64 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Vote {
    Yes,
    No,
    Abstain,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub node_id: NodeId,
    pub vote: Vote,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResult {
    pub proposal: String,
    pub ballots: Vec<Ballot>,
    pub yes: usize,
    pub no: usize,
    pub abstain: usize,
    pub passed: bool,
}

/// One node's vote.
pub fn cast_vote<R: Rng + ?Sized>(node: &Node, rng: &mut R) -> Vote {
    let roll = rng.gen::<f64>();
    if node.composite_score > DISSENT_SCORE {
        if roll > 0.6 {
            Vote::No
        } else {
            Vote::Yes
        }
    } else if roll > 0.3 {
        if node.ethical_violations == 0 {
            Vote::Yes
        } else {
            Vote::No
        }
    } else {
        Vote::Abstain
    }
}

/// Poll every node once. Passes on a strict yes majority over no.
pub fn poll_consensus<R: Rng + ?Sized>(
    nodes: &[Node],
    proposal: &str,
    rng: &mut R,
) -> ConsensusResult {
    let ballots: Vec<Ballot> = nodes
        .iter()
        .map(|n| Ballot { node_id: n.id.clone(), vote: cast_vote(n, rng) })
        .collect();

    let count = |v: Vote| ballots.iter().filter(|b| b.vote == v).count();
    let (yes, no, abstain) = (count(Vote::Yes), count(Vote::No), count(Vote::Abstain));

    ConsensusResult {
        proposal: proposal.to_string(),
        passed: yes > no,
        ballots,
        yes,
        no,
        abstain,
    }
}
