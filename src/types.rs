// src/types.rs
//
// Core dialogue types shared across the tracker, simulator, error model,
// and agent: semantic-frame actions (intent + inform/request slots) and
// the replay transition record.
//
// Slot maps are BTreeMaps so that iteration order — and therefore state
// encoding, KB queries, and serialized output — is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placeholder value an agent inform carries before the state tracker
/// resolves it against the knowledge base.
pub const SLOT_PLACEHOLDER: &str = "PLACEHOLDER";

/// Value the tracker substitutes when no KB record satisfies the current
/// constraints.
pub const NO_MATCH: &str = "no match available";

/// Value the simulated user gives for a slot its goal does not constrain.
pub const VALUE_ANY: &str = "anything";

/// Slot under which a proposed match (KB record id) is surfaced to the user.
pub const MATCH_SLOT: &str = "ticket";

/// Dialogue act types the agent can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentIntent {
    Greeting,
    Request,
    Inform,
    MatchFound,
    Done,
}

impl AgentIntent {
    /// All agent intents, in encoding order.
    pub const ALL: [AgentIntent; 5] = [
        AgentIntent::Greeting,
        AgentIntent::Request,
        AgentIntent::Inform,
        AgentIntent::MatchFound,
        AgentIntent::Done,
    ];

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&i| i == self).unwrap_or(0)
    }
}

/// Dialogue act types the simulated user can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserIntent {
    Request,
    Inform,
    Thanks,
    Reject,
    Done,
}

impl UserIntent {
    /// All user intents, in encoding order.
    pub const ALL: [UserIntent; 5] = [
        UserIntent::Request,
        UserIntent::Inform,
        UserIntent::Thanks,
        UserIntent::Reject,
        UserIntent::Done,
    ];

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&i| i == self).unwrap_or(0)
    }
}

/// Semantic frame emitted by the agent.
///
/// `inform_slots` values may be [`SLOT_PLACEHOLDER`] until the state
/// tracker fills them from the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAction {
    pub intent: AgentIntent,
    pub inform_slots: BTreeMap<String, String>,
    pub request_slots: Vec<String>,
    /// Round number, stamped by the state tracker.
    pub round: u32,
}

impl AgentAction {
    pub fn new(intent: AgentIntent) -> Self {
        Self {
            intent,
            inform_slots: BTreeMap::new(),
            request_slots: Vec::new(),
            round: 0,
        }
    }

    pub fn request(slot: &str) -> Self {
        let mut a = Self::new(AgentIntent::Request);
        a.request_slots.push(slot.to_string());
        a
    }

    pub fn inform(slot: &str, value: &str) -> Self {
        let mut a = Self::new(AgentIntent::Inform);
        a.inform_slots.insert(slot.to_string(), value.to_string());
        a
    }
}

/// Semantic frame emitted by the simulated user (possibly noised by the
/// error model before it reaches the tracker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAction {
    pub intent: UserIntent,
    pub inform_slots: BTreeMap<String, String>,
    pub request_slots: Vec<String>,
    pub round: u32,
}

impl UserAction {
    pub fn new(intent: UserIntent) -> Self {
        Self {
            intent,
            inform_slots: BTreeMap::new(),
            request_slots: Vec::new(),
            round: 0,
        }
    }
}

/// One replay-memory record: `(state, action, reward, next_state, done)`.
///
/// The orchestrator produces exactly one per turn and hands it to the
/// agent; it never reads memory contents back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub state: Vec<f32>,
    pub action_index: usize,
    pub reward: f64,
    pub next_state: Vec<f32>,
    pub done: bool,
}
