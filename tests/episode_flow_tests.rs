// tests/episode_flow_tests.rs
//
// Per-episode collaborator sequencing: reset order, the turn loop's
// call order, error infusion skipping terminal user actions, reward
// accumulation, and the evaluation phase's no-recording contract.


use testkit::{run_config, script, scripted_runner, trace_of, ScriptedSimulator};

#[test]
fn test_two_turn_episode_call_order() {
    // One 2-turn episode via warmup with budget 2. The terminal user
    // action must reach the tracker without error infusion.
    let cfg = run_config(2, 0, 1, 0.3);
    let (mut runner, trace, _sink) = scripted_runner(cfg, vec![script(2, true)]);
    runner.run_warmup().unwrap();

    let expected = vec![
        "user.reset",
        "emc.infuse",
        "agent.reset",
        "agent.get_action",
        "user.step(done=false)",
        "emc.infuse",
        "agent.add_experience(done=false)",
        "agent.get_action",
        "user.step(done=true)",
        "agent.add_experience(done=true)",
    ];
    assert_eq!(trace_of(&trace), expected);
}

#[test]
fn test_no_error_infusion_on_terminal_turn() {
    let cfg = run_config(3, 0, 1, 0.3);
    let (mut runner, trace, _sink) = scripted_runner(cfg, vec![script(3, false)]);
    runner.run_warmup().unwrap();

    // Per 3-turn episode: one infusion at reset plus one per
    // non-terminal turn.
    let events = trace_of(&trace);
    let infusions = events.iter().filter(|e| *e == "emc.infuse").count();
    assert_eq!(infusions, 3);
}

#[test]
fn test_episode_reward_is_the_sum_over_turns() {
    // 3 turns: -1, -1, then the success reward.
    let cfg = run_config(3, 0, 1, 0.3);
    let (mut runner, _trace, sink) = scripted_runner(cfg, vec![script(3, true)]);
    runner.run_warmup().unwrap();

    let episodes = sink.episodes.borrow();
    assert_eq!(episodes.len(), 1);
    let expected = -2.0 + ScriptedSimulator::SUCCESS_REWARD;
    assert!((episodes[0].reward - expected).abs() < 1e-9);
    assert!(episodes[0].success);
    assert_eq!(episodes[0].phase, "warmup");
}

#[test]
fn test_eval_records_no_experience() {
    let cfg = run_config(4, 0, 1, 0.3);
    let (mut runner, _trace, sink) = scripted_runner(cfg, vec![script(4, true)]);
    runner.run_warmup().unwrap();

    let added_before = runner.agent().added;
    let steps_before = runner.total_step();

    let summary = runner.run_eval().unwrap();
    assert_eq!(summary.episodes, 4);
    assert_eq!(runner.agent().added, added_before);
    assert_eq!(runner.total_step(), steps_before);
    assert!((summary.succ_rate - 1.0).abs() < 1e-9);

    let eval_episodes = sink
        .episodes
        .borrow()
        .iter()
        .filter(|e| e.phase == "eval")
        .count();
    assert_eq!(eval_episodes, 4);
}

#[test]
fn test_episode_indices_are_global_across_phases() {
    let cfg = run_config(4, 2, 2, 0.3);
    let (mut runner, _trace, sink) = scripted_runner(cfg, vec![script(4, false)]);
    runner.run_warmup().unwrap();
    runner.run_train().unwrap();

    let episodes = sink.episodes.borrow();
    let indices: Vec<u32> = episodes.iter().map(|e| e.episode).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(episodes[2].phase, "train");
}
