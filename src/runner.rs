// src/runner.rs
//
// Training orchestrator: the episode state machine, the warmup and train
// phase controllers, and the evaluation/promotion bookkeeping that gates
// the replay-memory lifecycle.
//
// The runner owns the state tracker, every collaborator, and all
// process-lifetime counters; collaborators never mutate counters and the
// runner never inspects replay-memory contents. Execution is fully
// synchronous: every collaborator call completes before the next step.
//
// One cadence point governs everything learned: at each train_freq
// boundary the runner evaluates the window, conditionally flushes memory
// on promotion, resets the window counter, synchronizes target weights,
// and runs one optimization pass. These are deliberately coupled and must
// not be given independent schedules.

use anyhow::{bail, Result};

use crate::agent::{ActionStrategy, Agent};
use crate::config::RunConfig;
use crate::error_model::ErrorModel;
use crate::logging::{EpisodeRecord, EpisodeSink, WindowRecord};
use crate::simulator::UserSimulator;
use crate::tracker::StateTracker;
use crate::types::Transition;

/// Outcome of one completed episode.
#[derive(Debug, Clone)]
pub struct EpisodeOutcome {
    /// Sum of per-turn rewards returned by the simulator.
    pub reward: f64,
    /// Task success flag from the simulator's final step. For a
    /// budget-truncated warmup episode this is whatever the simulator
    /// last returned and may not reflect a real task outcome.
    pub success: bool,
    /// Rounds executed.
    pub rounds: u32,
    /// True when the warmup transition budget forced termination even
    /// though the simulator had not signalled it.
    pub truncated: bool,
}

/// Summary of a completed warmup phase.
#[derive(Debug, Clone)]
pub struct WarmupSummary {
    pub episodes: u32,
    /// Transitions recorded; always equals the configured budget.
    pub transitions: u64,
}

/// Summary of a completed train phase.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub episodes: u32,
    pub windows: u32,
    pub succ_rate_best: f64,
}

/// Summary of an evaluation-only run.
#[derive(Debug, Clone)]
pub struct EvalSummary {
    pub episodes: u32,
    pub successes: u32,
    pub succ_rate: f64,
    pub mean_reward: f64,
}

/// The orchestration context: collaborators plus all run counters.
pub struct DialogueRunner<A, U, E, S>
where
    A: Agent,
    U: UserSimulator,
    E: ErrorModel,
    S: EpisodeSink,
{
    run_cfg: RunConfig,
    tracker: StateTracker,
    agent: A,
    user: U,
    error_model: E,
    sink: S,

    /// Transitions recorded so far (warmup budget accounting).
    total_step: u64,
    /// Global episode index across phases (1-based).
    episode: u32,
    /// Successes accumulated in the current evaluation window.
    period_succ_total: u32,
    /// Best window success rate seen so far; non-decreasing.
    succ_rate_best: f64,

    /// 0 silences per-episode progress lines.
    verbosity: u8,
}

impl<A, U, E, S> DialogueRunner<A, U, E, S>
where
    A: Agent,
    U: UserSimulator,
    E: ErrorModel,
    S: EpisodeSink,
{
    pub fn new(
        run_cfg: RunConfig,
        tracker: StateTracker,
        agent: A,
        user: U,
        error_model: E,
        sink: S,
    ) -> Self {
        Self {
            run_cfg,
            tracker,
            agent,
            user,
            error_model,
            sink,
            total_step: 0,
            episode: 0,
            period_succ_total: 0,
            succ_rate_best: 0.0,
            verbosity: 1,
        }
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn total_step(&self) -> u64 {
        self.total_step
    }

    pub fn episode(&self) -> u32 {
        self.episode
    }

    pub fn succ_rate_best(&self) -> f64 {
        self.succ_rate_best
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Warmup phase: seed the replay memory with the rule policy.
    ///
    /// Runs episodes back-to-back until the cumulative transition count
    /// first reaches `warmup_mem`; the final episode is truncated
    /// mid-turn-loop if needed. No evaluation, no flush, no optimization.
    pub fn run_warmup(&mut self) -> Result<WarmupSummary> {
        println!("warmup started (budget: {} transitions)", self.run_cfg.warmup_mem);

        let budget = self.run_cfg.warmup_mem as u64;
        let mut episodes = 0u32;
        while self.total_step < budget {
            self.reset_episode()?;
            self.episode += 1;
            episodes += 1;
            let outcome = self.run_episode(ActionStrategy::Rule, Some(budget), true)?;
            self.report_episode("warmup", &outcome);
        }

        println!("warmup ended ({} episodes, {} transitions)", episodes, self.total_step);
        Ok(WarmupSummary {
            episodes,
            transitions: self.total_step,
        })
    }

    /// Train phase: `num_ep_train` episodes under the learned policy,
    /// with the promotion/flush/sync/optimize cadence every `train_freq`
    /// episodes.
    pub fn run_train(&mut self) -> Result<TrainSummary> {
        println!("train started ({} episodes)", self.run_cfg.num_ep_train);

        let train_freq = self.run_cfg.train_freq;
        let threshold = self.run_cfg.success_rate_threshold;
        let mut windows = 0u32;

        let mut ep = 0u32;
        while ep < self.run_cfg.num_ep_train {
            self.reset_episode()?;
            ep += 1;
            self.episode += 1;
            let outcome = self.run_episode(ActionStrategy::Learned, None, true)?;
            self.report_episode("train", &outcome);

            if outcome.success {
                self.period_succ_total += 1;
            }

            if ep % train_freq == 0 {
                windows += 1;
                let succ_rate = self.period_succ_total as f64 / train_freq as f64;
                let best_bound = self.succ_rate_best.max(threshold);
                println!("succ rate: {succ_rate:.3} (current bound: {best_bound:.3})");

                // Promotion: strictly better than the best so far AND at
                // least the configured threshold. Flushing stale
                // experience and recording the new best happen together.
                let promoted = succ_rate > self.succ_rate_best && succ_rate >= threshold;
                if promoted {
                    println!("new best: {succ_rate:.3}");
                    self.agent.empty_memory();
                    self.succ_rate_best = succ_rate;
                }
                self.period_succ_total = 0;
                self.agent.sync_target();
                self.agent.train();

                self.sink.log_window(&WindowRecord {
                    episode: ep,
                    succ_rate,
                    best_bound,
                    promoted,
                });
            }
        }

        println!("train ended (best succ rate: {:.3})", self.succ_rate_best);
        Ok(TrainSummary {
            episodes: ep,
            windows,
            succ_rate_best: self.succ_rate_best,
        })
    }

    /// Evaluation-only phase: `num_ep_test` episodes under the learned
    /// policy with no experience recording and no learning calls.
    pub fn run_eval(&mut self) -> Result<EvalSummary> {
        println!("eval started ({} episodes)", self.run_cfg.num_ep_test);

        let mut successes = 0u32;
        let mut total_reward = 0.0;
        let mut ep = 0u32;
        while ep < self.run_cfg.num_ep_test {
            self.reset_episode()?;
            ep += 1;
            self.episode += 1;
            let outcome = self.run_episode(ActionStrategy::Learned, None, false)?;
            self.report_episode("eval", &outcome);
            if outcome.success {
                successes += 1;
            }
            total_reward += outcome.reward;
        }

        let succ_rate = if ep > 0 {
            successes as f64 / ep as f64
        } else {
            0.0
        };
        let mean_reward = if ep > 0 { total_reward / ep as f64 } else { 0.0 };
        println!("eval ended (succ rate: {succ_rate:.3})");
        Ok(EvalSummary {
            episodes: ep,
            successes,
            succ_rate,
            mean_reward,
        })
    }

    /// Episode reset, in contract order: tracker, then the user's opening
    /// action, error infusion, tracker update, and finally the agent's
    /// per-episode bookkeeping.
    fn reset_episode(&mut self) -> Result<()> {
        self.tracker.reset();
        let mut user_action = self.user.reset();
        self.error_model.infuse_error(&mut user_action);
        self.tracker.update_state_user(&user_action);
        self.agent.reset();
        Ok(())
    }

    /// The turn loop. `budget` enables warmup's forced termination when
    /// the global transition counter reaches it; `record` disables
    /// experience collection for evaluation-only episodes.
    fn run_episode(
        &mut self,
        strategy: ActionStrategy,
        budget: Option<u64>,
        record: bool,
    ) -> Result<EpisodeOutcome> {
        let state_size = self.tracker.state_size();
        let max_round = self.run_cfg.max_round_num;

        let mut ep_reward = 0.0;
        let mut rounds = 0u32;
        let mut done = false;
        let mut success = false;
        let mut truncated = false;

        while !done {
            let state = self.tracker.get_state(false);
            if state.len() != state_size {
                bail!(
                    "state tracker contract violation: state length {} != {}",
                    state.len(),
                    state_size
                );
            }

            let (action_index, mut agent_action) = self.agent.get_action(&state, strategy);
            let round_num = self.tracker.update_state_agent(&mut agent_action);

            let step = self.user.step(&agent_action, round_num);
            if !step.reward.is_finite() {
                bail!(
                    "user simulator contract violation: non-finite reward at round {round_num}"
                );
            }
            if !step.done && round_num >= max_round {
                bail!(
                    "user simulator contract violation: no termination at round cap {max_round}"
                );
            }

            ep_reward += step.reward;
            done = step.done;
            success = step.success;
            rounds = round_num;

            let mut user_action = step.user_action;
            if !done {
                // Noise reaches the tracker; the raw terminal action does.
                self.error_model.infuse_error(&mut user_action);
            }
            self.tracker.update_state_user(&user_action);

            let next_state = self.tracker.get_state(done);

            if record {
                self.agent.add_experience(Transition {
                    state,
                    action_index,
                    reward: step.reward,
                    next_state,
                    done,
                });
                self.total_step += 1;

                if let Some(limit) = budget {
                    if self.total_step >= limit {
                        // Budget exhausted mid-episode: force termination.
                        // The success flag keeps the simulator's last word.
                        truncated = !done;
                        done = true;
                    }
                }
            }
        }

        Ok(EpisodeOutcome {
            reward: ep_reward,
            success,
            rounds,
            truncated,
        })
    }

    fn report_episode(&mut self, phase: &str, outcome: &EpisodeOutcome) {
        if self.verbosity >= 1 {
            println!(
                "episode {} | succ: {} | reward: {:.1}{}",
                self.episode,
                outcome.success,
                outcome.reward,
                if outcome.truncated { " | truncated" } else { "" }
            );
        }
        self.sink.log_episode(&EpisodeRecord {
            phase: phase.to_string(),
            episode: self.episode,
            success: outcome.success,
            reward: outcome.reward,
            rounds: outcome.rounds,
            truncated: outcome.truncated,
        });
    }
}
