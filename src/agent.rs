// src/agent.rs
//
// Dialogue agent: the Agent seam the orchestrator drives, plus a
// DQN-flavored implementation — a linear Q-function with a target copy,
// epsilon-greedy exploration, and a bounded FIFO replay memory.
//
// Action selection strategy is an explicit parameter on every call:
// `Rule` runs a scripted request sequence (used to seed the replay memory
// during warmup), `Learned` applies the value function with exploration.
// The agent never decides which of the two applies.

use std::collections::{BTreeMap, VecDeque};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::AgentConfig;
use crate::corpus::Corpus;
use crate::types::{AgentAction, AgentIntent, Transition, SLOT_PLACEHOLDER};

/// How the agent should pick its next action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStrategy {
    /// Scripted heuristic policy (warmup only).
    Rule,
    /// Learned policy with the agent's own exploration.
    Learned,
}

/// Agent contract as seen by the orchestrator.
///
/// The orchestrator only appends to and clears the replay memory; it
/// never inspects its contents.
pub trait Agent {
    /// Select an action for `state`. Never fails.
    fn get_action(&mut self, state: &[f32], strategy: ActionStrategy) -> (usize, AgentAction);

    /// Append one transition to replay memory.
    fn add_experience(&mut self, transition: Transition);

    /// Discard all stored transitions.
    fn empty_memory(&mut self);

    /// Synchronize the target representation from the online one.
    fn sync_target(&mut self);

    /// One optimization pass over the current memory contents.
    fn train(&mut self);

    /// Clear per-episode bookkeeping only (never memory).
    fn reset(&mut self);
}

/// Linear Q-function agent with a target network copy.
pub struct DqnAgent {
    state_size: usize,
    templates: Vec<AgentAction>,
    request_index: BTreeMap<String, usize>,

    /// Online weights, one row per action: state_size coefficients + bias.
    weights: Vec<Vec<f64>>,
    /// Target weights, same shape.
    target: Vec<Vec<f64>>,

    epsilon: f64,
    gamma: f64,
    learning_rate: f64,
    batch_size: usize,

    memory: VecDeque<Transition>,
    memory_capacity: usize,

    /// Rule-policy script: slots to request, in order, then match, then done.
    rule_requests: Vec<String>,
    rule_pos: usize,

    rng: ChaCha8Rng,
}

impl DqnAgent {
    pub fn new(state_size: usize, corpus: &Corpus, cfg: &AgentConfig, seed: u64) -> Self {
        let slots = corpus.dict.slots();

        // Deterministic action space: done, match, then request/inform per slot.
        let mut templates = vec![
            AgentAction::new(AgentIntent::Done),
            AgentAction::new(AgentIntent::MatchFound),
        ];
        let mut request_index = BTreeMap::new();
        for slot in &slots {
            request_index.insert(slot.clone(), templates.len());
            templates.push(AgentAction::request(slot));
        }
        for slot in &slots {
            templates.push(AgentAction::inform(slot, SLOT_PLACEHOLDER));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let num_actions = templates.len();
        let init = |rng: &mut ChaCha8Rng| -> Vec<Vec<f64>> {
            (0..num_actions)
                .map(|_| (0..=state_size).map(|_| rng.gen_range(-0.01..0.01)).collect())
                .collect()
        };
        let weights = init(&mut rng);
        let target = weights.clone();

        // Rule script only keeps slots that exist in the action space.
        let rule_requests = cfg
            .rule_requests
            .iter()
            .filter(|s| request_index.contains_key(*s))
            .cloned()
            .collect();

        Self {
            state_size,
            templates,
            request_index,
            weights,
            target,
            epsilon: cfg.epsilon,
            gamma: cfg.gamma,
            learning_rate: cfg.learning_rate,
            batch_size: cfg.batch_size,
            memory: VecDeque::new(),
            memory_capacity: cfg.memory_capacity,
            rule_requests,
            rule_pos: 0,
            rng,
        }
    }

    pub fn num_actions(&self) -> usize {
        self.templates.len()
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    fn q_value(weights: &[Vec<f64>], state: &[f32], action: usize) -> f64 {
        let row = &weights[action];
        let mut q = row[state.len()];
        for (j, &x) in state.iter().enumerate() {
            q += row[j] * x as f64;
        }
        q
    }

    fn best_action(weights: &[Vec<f64>], state: &[f32]) -> (usize, f64) {
        let mut best = 0;
        let mut best_q = f64::NEG_INFINITY;
        for a in 0..weights.len() {
            let q = Self::q_value(weights, state, a);
            if q > best_q {
                best_q = q;
                best = a;
            }
        }
        (best, best_q)
    }

    fn rule_action_index(&mut self) -> usize {
        let idx = if self.rule_pos < self.rule_requests.len() {
            self.request_index[&self.rule_requests[self.rule_pos]]
        } else if self.rule_pos == self.rule_requests.len() {
            1 // match found
        } else {
            0 // done
        };
        self.rule_pos += 1;
        idx
    }
}

impl Agent for DqnAgent {
    fn get_action(&mut self, state: &[f32], strategy: ActionStrategy) -> (usize, AgentAction) {
        let idx = match strategy {
            ActionStrategy::Rule => self.rule_action_index(),
            ActionStrategy::Learned => {
                if self.epsilon > 0.0 && self.rng.gen::<f64>() < self.epsilon {
                    self.rng.gen_range(0..self.templates.len())
                } else {
                    Self::best_action(&self.weights, state).0
                }
            }
        };
        (idx, self.templates[idx].clone())
    }

    fn add_experience(&mut self, transition: Transition) {
        if self.memory.len() == self.memory_capacity {
            self.memory.pop_front();
        }
        self.memory.push_back(transition);
    }

    fn empty_memory(&mut self) {
        self.memory.clear();
    }

    fn sync_target(&mut self) {
        self.target = self.weights.clone();
    }

    fn train(&mut self) {
        let n = self.memory.len();
        if n == 0 {
            return;
        }

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut self.rng);

        for batch in indices.chunks(self.batch_size) {
            for &i in batch {
                let t = self.memory[i].clone();
                let target_q = if t.done {
                    t.reward
                } else {
                    t.reward + self.gamma * Self::best_action(&self.target, &t.next_state).1
                };
                let q = Self::q_value(&self.weights, &t.state, t.action_index);
                let err = target_q - q;

                let row = &mut self.weights[t.action_index];
                for (j, &x) in t.state.iter().enumerate() {
                    row[j] += self.learning_rate * err * x as f64;
                }
                let bias = t.state.len();
                row[bias] += self.learning_rate * err;
            }
        }
    }

    fn reset(&mut self) {
        self.rule_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;

    fn mk_agent(epsilon: f64) -> DqnAgent {
        let corpus = Corpus::builtin();
        let cfg = AgentConfig {
            epsilon,
            ..AgentConfig::default()
        };
        DqnAgent::new(10, &corpus, &cfg, 42)
    }

    #[test]
    fn test_action_space_layout() {
        let agent = mk_agent(0.0);
        let corpus = Corpus::builtin();
        // done + match + request/inform per slot
        assert_eq!(agent.num_actions(), 2 + 2 * corpus.dict.slots().len());
    }

    #[test]
    fn test_rule_policy_scripts_requests_then_match_then_done() {
        let mut agent = mk_agent(0.0);
        agent.reset();

        let state = vec![0.0; 10];
        let n_requests = agent.rule_requests.len();
        for i in 0..n_requests {
            let (_, action) = agent.get_action(&state, ActionStrategy::Rule);
            assert_eq!(action.intent, AgentIntent::Request);
            assert_eq!(action.request_slots[0], agent.rule_requests[i]);
        }
        let (_, action) = agent.get_action(&state, ActionStrategy::Rule);
        assert_eq!(action.intent, AgentIntent::MatchFound);
        let (_, action) = agent.get_action(&state, ActionStrategy::Rule);
        assert_eq!(action.intent, AgentIntent::Done);

        // Reset restarts the script (memory untouched).
        agent.reset();
        let (_, action) = agent.get_action(&state, ActionStrategy::Rule);
        assert_eq!(action.intent, AgentIntent::Request);
    }

    #[test]
    fn test_greedy_action_deterministic_without_exploration() {
        let mut agent = mk_agent(0.0);
        let state: Vec<f32> = (0..10).map(|i| i as f32 / 10.0).collect();
        let (i1, a1) = agent.get_action(&state, ActionStrategy::Learned);
        let (i2, a2) = agent.get_action(&state, ActionStrategy::Learned);
        assert_eq!(i1, i2);
        assert_eq!(a1, a2);
    }

    #[test]
    fn test_memory_fifo_eviction() {
        let corpus = Corpus::builtin();
        let cfg = AgentConfig {
            memory_capacity: 3,
            ..AgentConfig::default()
        };
        let mut agent = DqnAgent::new(4, &corpus, &cfg, 1);

        for k in 0..5 {
            agent.add_experience(Transition {
                state: vec![k as f32; 4],
                action_index: 0,
                reward: -1.0,
                next_state: vec![0.0; 4],
                done: false,
            });
        }
        assert_eq!(agent.memory_len(), 3);
        assert_eq!(agent.memory[0].state[0], 2.0);
    }

    #[test]
    fn test_empty_memory_discards_everything() {
        let mut agent = mk_agent(0.0);
        agent.add_experience(Transition {
            state: vec![0.0; 10],
            action_index: 1,
            reward: 1.0,
            next_state: vec![0.0; 10],
            done: true,
        });
        assert_eq!(agent.memory_len(), 1);
        agent.empty_memory();
        assert_eq!(agent.memory_len(), 0);
    }

    #[test]
    fn test_train_moves_q_toward_terminal_reward() {
        let mut agent = mk_agent(0.0);
        let state: Vec<f32> = vec![1.0; 10];
        let t = Transition {
            state: state.clone(),
            action_index: 0,
            reward: 40.0,
            next_state: vec![0.0; 10],
            done: true,
        };
        for _ in 0..50 {
            agent.add_experience(t.clone());
        }

        let before = DqnAgent::q_value(&agent.weights, &state, 0);
        agent.sync_target();
        agent.train();
        let after = DqnAgent::q_value(&agent.weights, &state, 0);
        assert!(
            (after - 40.0).abs() < (before - 40.0).abs(),
            "q should move toward the target: before={before} after={after}"
        );
    }

    #[test]
    fn test_train_on_empty_memory_is_noop() {
        let mut agent = mk_agent(0.0);
        let before = agent.weights.clone();
        agent.train();
        assert_eq!(agent.weights, before);
    }

    #[test]
    fn test_sync_target_copies_online_weights() {
        let mut agent = mk_agent(0.0);
        agent.weights[0][0] = 123.0;
        assert_ne!(agent.target[0][0], 123.0);
        agent.sync_target();
        assert_eq!(agent.target[0][0], 123.0);
    }
}
