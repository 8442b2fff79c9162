// src/tracker.rs
//
// Dialogue state tracker: maintains the conversation's running belief
// state (constraints gathered so far, the most recent action on each
// side, the round counter) and encodes it as a fixed-size f32 feature
// vector for the agent's value function.
//
// The tracker also resolves agent inform placeholders and match proposals
// against the knowledge base; it is the only component that reads the KB.

use std::collections::BTreeMap;

use crate::corpus::{Corpus, KnowledgeBase};
use crate::types::{
    AgentAction, AgentIntent, UserAction, UserIntent, MATCH_SLOT, NO_MATCH, SLOT_PLACEHOLDER,
    VALUE_ANY,
};

/// Scale cap for the KB match-count feature.
const KB_COUNT_CAP: f32 = 100.0;

pub struct StateTracker {
    kb: KnowledgeBase,
    /// Canonical slot ordering from the dictionary.
    slots: Vec<String>,
    slot_index: BTreeMap<String, usize>,
    max_round: u32,

    round: u32,
    current_informs: BTreeMap<String, String>,
    last_agent_action: Option<AgentAction>,
    last_user_action: Option<UserAction>,
}

impl StateTracker {
    pub fn new(corpus: &Corpus, max_round: u32) -> Self {
        let slots = corpus.dict.slots();
        let slot_index = slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self {
            kb: corpus.kb.clone(),
            slots,
            slot_index,
            max_round,
            round: 0,
            current_informs: BTreeMap::new(),
            last_agent_action: None,
            last_user_action: None,
        }
    }

    /// Clear all per-episode state.
    pub fn reset(&mut self) {
        self.round = 0;
        self.current_informs.clear();
        self.last_agent_action = None;
        self.last_user_action = None;
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Dimension of the encoded state vector.
    ///
    /// Sections, in order: user intent one-hot (5), user inform slots (S),
    /// user request slots (S), agent intent one-hot (5), agent inform
    /// slots (S), agent request slots (S), gathered constraints (S),
    /// round one-hot (max_round + 1), KB match features (2).
    pub fn state_size(&self) -> usize {
        let s = self.slots.len();
        5 + 5 * s + 5 + (self.max_round as usize + 1) + 2
    }

    /// Encode the current belief state. The terminal state (`done`) is the
    /// zero vector.
    pub fn get_state(&self, done: bool) -> Vec<f32> {
        let size = self.state_size();
        if done {
            return vec![0.0; size];
        }

        let s = self.slots.len();
        let mut v = vec![0.0f32; size];
        let mut base = 0;

        if let Some(ua) = &self.last_user_action {
            v[base + ua.intent.index()] = 1.0;
            for slot in ua.inform_slots.keys() {
                if let Some(&i) = self.slot_index.get(slot) {
                    v[base + 5 + i] = 1.0;
                }
            }
            for slot in &ua.request_slots {
                if let Some(&i) = self.slot_index.get(slot) {
                    v[base + 5 + s + i] = 1.0;
                }
            }
        }
        base += 5 + 2 * s;

        if let Some(aa) = &self.last_agent_action {
            v[base + aa.intent.index()] = 1.0;
            for slot in aa.inform_slots.keys() {
                if let Some(&i) = self.slot_index.get(slot) {
                    v[base + 5 + i] = 1.0;
                }
            }
            for slot in &aa.request_slots {
                if let Some(&i) = self.slot_index.get(slot) {
                    v[base + 5 + s + i] = 1.0;
                }
            }
        }
        base += 5 + 2 * s;

        for slot in self.current_informs.keys() {
            if let Some(&i) = self.slot_index.get(slot) {
                v[base + i] = 1.0;
            }
        }
        base += s;

        let round_slot = self.round.min(self.max_round) as usize;
        v[base + round_slot] = 1.0;
        base += self.max_round as usize + 1;

        let kb_constraints = self.kb_constraints();
        let match_count = self.kb.matching(&kb_constraints).len();
        v[base] = (match_count as f32).min(KB_COUNT_CAP) / KB_COUNT_CAP;
        v[base + 1] = if match_count == 0 { 1.0 } else { 0.0 };

        v
    }

    /// Record the agent's action, resolving placeholders / match proposals
    /// against the KB. Increments and returns the round number.
    pub fn update_state_agent(&mut self, action: &mut AgentAction) -> u32 {
        self.round += 1;
        action.round = self.round;

        match action.intent {
            AgentIntent::Inform => {
                let constraints = self.kb_constraints();
                let mut resolved: Vec<(String, String)> = Vec::new();
                for (slot, value) in action.inform_slots.iter() {
                    if value == SLOT_PLACEHOLDER {
                        let filled = self
                            .kb
                            .fill_value(slot, &constraints)
                            .unwrap_or_else(|| NO_MATCH.to_string());
                        resolved.push((slot.clone(), filled));
                    }
                }
                for (slot, value) in resolved {
                    action.inform_slots.insert(slot.clone(), value.clone());
                    self.current_informs.insert(slot, value);
                }
            }
            AgentIntent::MatchFound => {
                let constraints = self.kb_constraints();
                let matches = self.kb.matching(&constraints);
                match matches.first() {
                    Some(rec) => {
                        let record = (*rec).clone();
                        // Stable id: position of the record in the KB.
                        let id = self
                            .kb
                            .records
                            .iter()
                            .position(|r| r == &record)
                            .unwrap_or(0);
                        action.inform_slots = record;
                        action
                            .inform_slots
                            .insert(MATCH_SLOT.to_string(), id.to_string());
                    }
                    None => {
                        action.inform_slots.clear();
                        action
                            .inform_slots
                            .insert(MATCH_SLOT.to_string(), NO_MATCH.to_string());
                    }
                }
            }
            _ => {}
        }

        self.last_agent_action = Some(action.clone());
        self.round
    }

    /// Record the user's (possibly error-infused) action and fold its
    /// informs into the gathered constraints.
    pub fn update_state_user(&mut self, action: &UserAction) {
        for (slot, value) in &action.inform_slots {
            if value != VALUE_ANY {
                self.current_informs.insert(slot.clone(), value.clone());
            }
        }
        self.last_user_action = Some(action.clone());
    }

    /// Constraints usable as KB lookup keys (dictionary slots only, and
    /// never the no-match marker).
    fn kb_constraints(&self) -> BTreeMap<String, String> {
        self.current_informs
            .iter()
            .filter(|(slot, value)| {
                self.slot_index.contains_key(*slot) && value.as_str() != NO_MATCH
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
