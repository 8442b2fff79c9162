// src/config.rs
//
// Central configuration for the parlance training harness.
//
// The on-disk layout mirrors the settings file the run is driven by:
// a `file_paths` section naming the startup corpora, a `run` section with
// the orchestration constants, and per-collaborator sections for the
// agent and the error model. Every `run` key is required; a missing or
// malformed key aborts at load time, before any episode runs, with an
// error that names it.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Paths to the startup corpora (knowledge base, slot dictionary, user
/// goals). When absent, the built-in movie-domain corpus is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilePathsConfig {
    /// Domain knowledge base (JSON list of slot->value records).
    pub database: String,
    /// Slot/value dictionary (JSON map of slot -> candidate values).
    pub dict: String,
    /// Corpus of user goals (JSON list).
    pub user_goals: String,
}

/// Orchestration constants. All keys are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Transition budget terminating the warmup phase.
    pub warmup_mem: u32,
    /// Episode count for the train phase.
    pub num_ep_train: u32,
    /// Episodes per evaluation window.
    pub train_freq: u32,
    /// Episode count for the evaluation-only phase.
    pub num_ep_test: u32,
    /// Per-episode round cap, enforced by the user simulator.
    pub max_round_num: u32,
    /// Minimum window success rate required before a memory flush /
    /// promotion is allowed. In [0, 1].
    pub success_rate_threshold: f64,
}

/// Agent hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Epsilon-greedy exploration probability.
    pub epsilon: f64,
    /// Discount factor.
    pub gamma: f64,
    /// SGD learning rate.
    pub learning_rate: f64,
    /// Replay memory capacity (FIFO eviction beyond this).
    pub memory_capacity: usize,
    /// Minibatch size for one optimization pass.
    pub batch_size: usize,
    /// Slot order the rule policy requests before proposing a match.
    pub rule_requests: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.0,
            gamma: 0.9,
            learning_rate: 0.005,
            memory_capacity: 50_000,
            batch_size: 16,
            rule_requests: vec![
                "moviename".to_string(),
                "starttime".to_string(),
                "city".to_string(),
                "date".to_string(),
                "theater".to_string(),
                "numberofpeople".to_string(),
            ],
        }
    }
}

/// Error model controller parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorModelConfig {
    /// Probability that each user inform slot is corrupted.
    pub slot_error_prob: f64,
    /// Probability that the user intent is corrupted.
    pub intent_error_prob: f64,
}

impl Default for ErrorModelConfig {
    fn default() -> Self {
        Self {
            slot_error_prob: 0.05,
            intent_error_prob: 0.0,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Startup corpora paths; built-in corpus when omitted.
    #[serde(default)]
    pub file_paths: Option<FilePathsConfig>,
    pub run: RunConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub error_model: ErrorModelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file_paths: None,
            run: RunConfig {
                warmup_mem: 1000,
                num_ep_train: 40_000,
                train_freq: 100,
                num_ep_test: 100,
                max_round_num: 20,
                success_rate_threshold: 0.3,
            },
            agent: AgentConfig::default(),
            error_model: ErrorModelConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// Fails before any episode runs on I/O errors, malformed JSON, a
    /// missing/unknown key (serde names it), or an out-of-range value.
    pub fn load(path: &Path) -> Result<Config> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&raw)
            .with_context(|| format!("malformed config file {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(cfg)
    }

    /// Range checks beyond what serde's shape checks cover. Each failure
    /// names the offending key.
    pub fn validate(&self) -> Result<()> {
        let r = &self.run;
        if r.warmup_mem == 0 {
            bail!("run.warmup_mem must be at least 1");
        }
        if r.train_freq == 0 {
            bail!("run.train_freq must be at least 1");
        }
        if r.max_round_num == 0 {
            bail!("run.max_round_num must be at least 1");
        }
        if !(0.0..=1.0).contains(&r.success_rate_threshold) {
            bail!(
                "run.success_rate_threshold must be in [0, 1], got {}",
                r.success_rate_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.agent.epsilon) {
            bail!("agent.epsilon must be in [0, 1], got {}", self.agent.epsilon);
        }
        if self.agent.batch_size == 0 {
            bail!("agent.batch_size must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.error_model.slot_error_prob) {
            bail!(
                "error_model.slot_error_prob must be in [0, 1], got {}",
                self.error_model.slot_error_prob
            );
        }
        if !(0.0..=1.0).contains(&self.error_model.intent_error_prob) {
            bail!(
                "error_model.intent_error_prob must be in [0, 1], got {}",
                self.error_model.intent_error_prob
            );
        }
        Ok(())
    }
}
