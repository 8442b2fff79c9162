// src/simulator.rs
//
// Goal-driven user simulator.
//
// Each episode the simulator samples a task goal (constraints it will
// inform, slots it wants answered) and plays an agenda against the
// agent's actions. It is the sole source of turn rewards and of the
// episode's `done` / `success` signals.
//
// Reward scheme: -1 per non-terminal turn, +2 * max_round on task
// success, -max_round on failure (including hitting the round cap).

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, UserGoal};
use crate::types::{AgentAction, AgentIntent, UserAction, UserIntent, NO_MATCH, VALUE_ANY};

/// Result of a single simulator step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimStep {
    /// The user's next action (pre error infusion).
    pub user_action: UserAction,
    /// Turn reward.
    pub reward: f64,
    /// Whether the episode has terminated.
    pub done: bool,
    /// Whether the task was completed successfully.
    pub success: bool,
}

/// Simulated-user seam the orchestrator drives.
pub trait UserSimulator {
    /// Start a new episode and return the user's opening action.
    fn reset(&mut self) -> UserAction;

    /// React to the agent's action at the given round number.
    fn step(&mut self, agent_action: &AgentAction, round_num: u32) -> SimStep;
}

pub struct GoalDrivenSimulator {
    goals: Vec<UserGoal>,
    max_round: u32,
    rng: ChaCha8Rng,

    // Per-episode agenda.
    goal: Option<UserGoal>,
    pending_informs: Vec<(String, String)>,
    pending_requests: Vec<String>,
    proposal_accepted: bool,
}

impl GoalDrivenSimulator {
    pub fn new(corpus: &Corpus, max_round: u32, seed: u64) -> Self {
        Self {
            goals: corpus.goals.clone(),
            max_round,
            rng: ChaCha8Rng::seed_from_u64(seed),
            goal: None,
            pending_informs: Vec::new(),
            pending_requests: Vec::new(),
            proposal_accepted: false,
        }
    }

    /// The goal currently being pursued (None before the first reset).
    pub fn current_goal(&self) -> Option<&UserGoal> {
        self.goal.as_ref()
    }

    fn terminal_reward(&self, success: bool) -> f64 {
        if success {
            2.0 * self.max_round as f64
        } else {
            -(self.max_round as f64)
        }
    }

    /// Next agenda item: outstanding constraint, then outstanding request,
    /// then thanks.
    fn agenda_next(&mut self) -> UserAction {
        if !self.pending_informs.is_empty() {
            let (slot, value) = self.pending_informs.remove(0);
            let mut a = UserAction::new(UserIntent::Inform);
            a.inform_slots.insert(slot, value);
            return a;
        }
        if let Some(slot) = self.pending_requests.first() {
            let mut a = UserAction::new(UserIntent::Request);
            a.request_slots.push(slot.clone());
            return a;
        }
        UserAction::new(UserIntent::Thanks)
    }

    /// Whether the proposed record satisfies every goal constraint.
    fn proposal_satisfies_goal(&self, agent_action: &AgentAction) -> bool {
        let goal = match &self.goal {
            Some(g) => g,
            None => return false,
        };
        if agent_action
            .inform_slots
            .values()
            .any(|v| v.as_str() == NO_MATCH)
        {
            return false;
        }
        goal.inform_slots.iter().all(|(slot, value)| {
            agent_action.inform_slots.get(slot).map(String::as_str) == Some(value.as_str())
        })
    }

    fn respond(&mut self, agent_action: &AgentAction) -> (UserAction, bool) {
        match agent_action.intent {
            AgentIntent::Request => {
                let slot = match agent_action.request_slots.first() {
                    Some(s) => s.clone(),
                    None => return (self.agenda_next(), false),
                };
                let value = self
                    .goal
                    .as_ref()
                    .and_then(|g| g.inform_slots.get(&slot).cloned())
                    .unwrap_or_else(|| VALUE_ANY.to_string());
                self.pending_informs.retain(|(s, _)| s != &slot);
                let mut a = UserAction::new(UserIntent::Inform);
                a.inform_slots.insert(slot, value);
                (a, false)
            }
            AgentIntent::Inform => {
                // Correct any value that contradicts a goal constraint;
                // otherwise treat answered request slots as satisfied and
                // move to the next agenda item.
                let goal_informs = self
                    .goal
                    .as_ref()
                    .map(|g| g.inform_slots.clone())
                    .unwrap_or_default();
                for (slot, value) in &agent_action.inform_slots {
                    if let Some(want) = goal_informs.get(slot) {
                        if value != want {
                            let mut a = UserAction::new(UserIntent::Inform);
                            a.inform_slots.insert(slot.clone(), want.clone());
                            return (a, false);
                        }
                    }
                }
                for (slot, value) in &agent_action.inform_slots {
                    if value.as_str() != NO_MATCH {
                        self.pending_requests.retain(|s| s != slot);
                    }
                }
                (self.agenda_next(), false)
            }
            AgentIntent::MatchFound => {
                if self.proposal_satisfies_goal(agent_action) {
                    self.proposal_accepted = true;
                    (UserAction::new(UserIntent::Thanks), false)
                } else {
                    self.proposal_accepted = false;
                    (UserAction::new(UserIntent::Reject), false)
                }
            }
            AgentIntent::Done => (UserAction::new(UserIntent::Done), true),
            AgentIntent::Greeting => (self.agenda_next(), false),
        }
    }
}

impl UserSimulator for GoalDrivenSimulator {
    fn reset(&mut self) -> UserAction {
        let idx = self.rng.gen_range(0..self.goals.len());
        let goal = self.goals[idx].clone();

        self.pending_informs = goal
            .inform_slots
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.pending_requests = goal.request_slots.clone();
        self.proposal_accepted = false;

        // Opening action: first constraint plus the primary request.
        let mut action = UserAction::new(UserIntent::Request);
        if !self.pending_informs.is_empty() {
            let (slot, value) = self.pending_informs.remove(0);
            action.inform_slots.insert(slot, value);
        }
        if let Some(slot) = self.pending_requests.first() {
            action.request_slots.push(slot.clone());
        }
        self.goal = Some(goal);
        action
    }

    fn step(&mut self, agent_action: &AgentAction, round_num: u32) -> SimStep {
        // Round cap: forced failure regardless of the agent's action.
        if round_num >= self.max_round {
            let mut user_action = UserAction::new(UserIntent::Done);
            user_action.round = round_num;
            return SimStep {
                user_action,
                reward: self.terminal_reward(false),
                done: true,
                success: false,
            };
        }

        let (mut user_action, done) = self.respond(agent_action);
        user_action.round = round_num;

        if done {
            let success = self.proposal_accepted;
            SimStep {
                user_action,
                reward: self.terminal_reward(success),
                done: true,
                success,
            }
        } else {
            SimStep {
                user_action,
                reward: -1.0,
                done: false,
                success: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::types::MATCH_SLOT;

    fn mk_sim(seed: u64) -> GoalDrivenSimulator {
        GoalDrivenSimulator::new(&Corpus::builtin(), 20, seed)
    }

    #[test]
    fn test_reset_produces_opening_request() {
        let mut sim = mk_sim(7);
        let a = sim.reset();
        assert_eq!(a.intent, UserIntent::Request);
        assert!(!a.request_slots.is_empty());
        assert!(sim.current_goal().is_some());
    }

    #[test]
    fn test_goal_sampling_deterministic_given_seed() {
        let mut s1 = mk_sim(42);
        let mut s2 = mk_sim(42);
        for _ in 0..10 {
            assert_eq!(s1.reset(), s2.reset());
        }
    }

    #[test]
    fn test_request_answered_from_goal() {
        let mut sim = mk_sim(1);
        sim.reset();
        let goal = sim.current_goal().unwrap().clone();
        let (slot, value) = goal.inform_slots.iter().next().unwrap();

        let step = sim.step(&AgentAction::request(slot), 2);
        assert_eq!(step.user_action.intent, UserIntent::Inform);
        assert_eq!(
            step.user_action.inform_slots.get(slot),
            Some(value),
        );
        assert!(!step.done);
        assert_eq!(step.reward, -1.0);
    }

    #[test]
    fn test_unconstrained_request_answered_anything() {
        let mut sim = mk_sim(1);
        sim.reset();
        // "numberofpeople" is unconstrained in every builtin goal except one;
        // pick a slot definitely outside the sampled goal's constraints.
        let goal = sim.current_goal().unwrap().clone();
        let free_slot = ["numberofpeople", "theater", "starttime", "date", "city"]
            .iter()
            .find(|s| !goal.inform_slots.contains_key(**s))
            .unwrap()
            .to_string();

        let step = sim.step(&AgentAction::request(&free_slot), 2);
        assert_eq!(
            step.user_action.inform_slots.get(&free_slot).map(String::as_str),
            Some(VALUE_ANY)
        );
    }

    #[test]
    fn test_good_match_is_accepted_and_done_succeeds() {
        let mut sim = mk_sim(3);
        sim.reset();
        let goal = sim.current_goal().unwrap().clone();

        let mut proposal = AgentAction::new(AgentIntent::MatchFound);
        for (slot, value) in &goal.inform_slots {
            proposal.inform_slots.insert(slot.clone(), value.clone());
        }
        proposal
            .inform_slots
            .insert(MATCH_SLOT.to_string(), "0".to_string());

        let step = sim.step(&proposal, 2);
        assert_eq!(step.user_action.intent, UserIntent::Thanks);
        assert!(!step.done);

        let step = sim.step(&AgentAction::new(AgentIntent::Done), 3);
        assert!(step.done);
        assert!(step.success);
        assert_eq!(step.reward, 2.0 * 20.0);
    }

    #[test]
    fn test_bad_match_rejected_and_done_fails() {
        let mut sim = mk_sim(3);
        sim.reset();

        let mut proposal = AgentAction::new(AgentIntent::MatchFound);
        proposal
            .inform_slots
            .insert(MATCH_SLOT.to_string(), NO_MATCH.to_string());

        let step = sim.step(&proposal, 2);
        assert_eq!(step.user_action.intent, UserIntent::Reject);

        let step = sim.step(&AgentAction::new(AgentIntent::Done), 3);
        assert!(step.done);
        assert!(!step.success);
        assert_eq!(step.reward, -20.0);
    }

    #[test]
    fn test_round_cap_forces_failure() {
        let mut sim = mk_sim(5);
        sim.reset();
        let step = sim.step(&AgentAction::request("city"), 20);
        assert!(step.done);
        assert!(!step.success);
        assert_eq!(step.reward, -20.0);
        assert_eq!(step.user_action.intent, UserIntent::Done);
    }

    #[test]
    fn test_contradicting_inform_is_corrected() {
        let mut sim = mk_sim(9);
        sim.reset();
        let goal = sim.current_goal().unwrap().clone();
        let (slot, value) = goal.inform_slots.iter().next().unwrap();

        let wrong = AgentAction::inform(slot, "definitely wrong value");
        let step = sim.step(&wrong, 2);
        assert_eq!(step.user_action.intent, UserIntent::Inform);
        assert_eq!(step.user_action.inform_slots.get(slot), Some(value));
    }
}
