//! Parlance core library.
//!
//! This crate trains a task-completion dialogue-management policy through
//! simulated episodic interaction. The binary (`src/main.rs`) is a thin
//! research harness around these components.
//!
//! # Architecture
//!
//! - **Runner** (`runner`): the training orchestrator — episode state
//!   machine, warmup/train phase controllers, evaluation/promotion logic,
//!   and the replay-memory lifecycle cadence. Owns every run counter.
//!
//! - **Collaborators**, each behind a trait seam the runner drives:
//!   - `tracker`: dialogue-state tracker and feature encoder
//!   - `simulator`: goal-driven user simulator (rewards, done/success)
//!   - `error_model`: slot-level noise injected before the tracker
//!   - `agent`: action selection, replay memory, learning procedure
//!
//! - **Corpus** (`corpus`): domain knowledge base, slot dictionary, and
//!   user goals, loaded once at startup and handed to collaborators.
//!
//! - **Logging** (`logging`): episode/window sinks (noop, JSONL file).

pub mod agent;
pub mod config;
pub mod corpus;
pub mod error_model;
pub mod logging;
pub mod runner;
pub mod simulator;
pub mod tracker;
pub mod types;

// --- Re-exports for ergonomic external use ---------------------------------

pub use agent::{ActionStrategy, Agent, DqnAgent};
pub use config::{AgentConfig, Config, ErrorModelConfig, FilePathsConfig, RunConfig};
pub use corpus::{Corpus, KnowledgeBase, SlotDictionary, UserGoal};
pub use error_model::{ErrorModel, SlotErrorModel};
pub use logging::{EpisodeRecord, EpisodeSink, FileSink, NoopSink, WindowRecord};
pub use runner::{DialogueRunner, EpisodeOutcome, EvalSummary, TrainSummary, WarmupSummary};
pub use simulator::{GoalDrivenSimulator, SimStep, UserSimulator};
pub use tracker::StateTracker;
pub use types::{
    AgentAction, AgentIntent, Transition, UserAction, UserIntent, MATCH_SLOT, NO_MATCH,
    SLOT_PLACEHOLDER, VALUE_ANY,
};
