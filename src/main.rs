// src/main.rs
//
// CLI entry point for the parlance training harness.
//
// Default run executes the warmup phase only; the train and eval phases
// are implemented but gated behind explicit flags. Deterministic runs via
// --seed (collaborator RNG streams are derived from it).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser};

use parlance::config::Config;
use parlance::corpus::Corpus;
use parlance::logging::{EpisodeSink, FileSink, NoopSink};
use parlance::runner::DialogueRunner;
use parlance::{DqnAgent, GoalDrivenSimulator, SlotErrorModel, StateTracker};

#[derive(Debug, Parser)]
#[command(
    name = "parlance",
    about = "Task-completion dialogue policy trainer (simulated user + DQN agent)",
    version
)]
struct Args {
    /// Settings file (JSON). Built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run the train phase after warmup (disabled by default).
    #[arg(long)]
    train: bool,

    /// Run an evaluation-only pass at the end.
    #[arg(long)]
    eval: bool,

    /// Deterministic seed for all collaborator RNG streams.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// JSONL telemetry output path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn run(args: &Args) -> Result<()> {
    let cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let corpus = match &cfg.file_paths {
        Some(paths) => Corpus::load(paths)?,
        None => Corpus::builtin(),
    };

    eprintln!(
        "parlance | seed={} | kb_records={} | slots={} | goals={}",
        args.seed,
        corpus.kb.records.len(),
        corpus.dict.slots().len(),
        corpus.goals.len()
    );
    println!(
        "run | warmup_mem={} num_ep_train={} train_freq={} max_round_num={} threshold={}",
        cfg.run.warmup_mem,
        cfg.run.num_ep_train,
        cfg.run.train_freq,
        cfg.run.max_round_num,
        cfg.run.success_rate_threshold
    );

    let tracker = StateTracker::new(&corpus, cfg.run.max_round_num);
    let agent = DqnAgent::new(tracker.state_size(), &corpus, &cfg.agent, args.seed);
    let user = GoalDrivenSimulator::new(&corpus, cfg.run.max_round_num, args.seed.wrapping_add(1));
    let emc = SlotErrorModel::new(&corpus, &cfg.error_model, args.seed.wrapping_add(2));

    let verbosity = 1 + args.verbose;

    let sink: Box<dyn EpisodeSink> = match &args.out {
        Some(path) => Box::new(FileSink::create(path)?),
        None => Box::new(NoopSink),
    };

    let mut runner = DialogueRunner::new(cfg.run.clone(), tracker, agent, user, emc, sink)
        .with_verbosity(verbosity);

    runner.run_warmup()?;
    if args.train {
        runner.run_train()?;
    }
    if args.eval {
        runner.run_eval()?;
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
