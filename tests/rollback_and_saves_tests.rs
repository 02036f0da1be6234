//! Rollback, rewind, hot-reload, and save/load behavior.

use kataribe::{storage, Engine, EngineConfig, EngineError, EngineStep, NavigationError, SaveData};

fn engine_with(rollback_steps: usize, scripts: &[(&str, &str)]) -> Engine {
    let mut engine = Engine::new(EngineConfig {
        rollback_steps,
        ..EngineConfig::default()
    });
    for (name, text) in scripts {
        let diags = engine.load_script(name, text);
        assert!(diags.is_empty(), "unexpected diagnostics in '{name}'");
    }
    engine
}

const COUNTING: &str = "@set n=1\nYui: one {n}\n@set n=2\nYui: two {n}\nYui: three";

#[test]
fn rewind_backward_restores_text_and_variables() {
    let mut engine = engine_with(32, &[("Main", COUNTING)]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "three");
    assert_eq!(engine.variables().get("n"), Some("2"));

    assert!(engine.can_rewind_to_line(1));
    assert_eq!(engine.rewind_to_line(1).unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "one 1");
    assert_eq!(engine.variables().get("n"), Some("1"));

    // Replaying from the restored point re-runs the later assignment.
    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "two 2");
    assert_eq!(engine.variables().get("n"), Some("2"));
}

#[test]
fn rewind_forward_fast_executes_crossed_commands() {
    let mut engine = engine_with(32, &[("Main", COUNTING)]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "one 1");

    assert_eq!(engine.rewind_to_line(4).unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "three");
    // The crossed assignment really executed.
    assert_eq!(engine.variables().get("n"), Some("2"));
}

#[test]
fn rewind_forward_refuses_to_cross_an_explicit_stop() {
    let mut engine = engine_with(32, &[("Main", "Yui: a\n@stop\nYui: b")]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    match engine.rewind_to_line(2) {
        Err(EngineError::Navigation(NavigationError::RewindUnreachable { line, .. })) => {
            assert_eq!(line, 2);
        }
        other => panic!("unexpected result {other:?}"),
    }
    // Playback is untouched by the failed rewind.
    assert_eq!(engine.printer().text, "a");
}

#[test]
fn history_depth_bounds_how_far_back_rewind_reaches() {
    let mut engine = engine_with(2, &[("Main", "Yui: one\nYui: two\nYui: three\nYui: four")]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    for _ in 0..3 {
        assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    }
    assert_eq!(engine.printer().text, "four");

    // Only the two newest suspension points survive.
    assert!(engine.can_rewind_to_line(3));
    assert!(engine.can_rewind_to_line(2));
    assert!(!engine.can_rewind_to_line(1));
    assert!(matches!(
        engine.rewind_to_line(1),
        Err(EngineError::Navigation(NavigationError::RewindUnreachable { .. }))
    ));
}

#[test]
fn save_round_trips_through_bytes_into_a_fresh_engine() {
    let mut first = engine_with(32, &[("Main", COUNTING)]);
    assert_eq!(first.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(first.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(first.printer().text, "two 2");

    let bytes = storage::save(&first.save_state()).unwrap();
    let restored = storage::load(&bytes).unwrap();

    let mut second = engine_with(32, &[("Main", COUNTING)]);
    assert_eq!(second.load_state(restored).unwrap(), EngineStep::WaitingForInput);
    assert_eq!(second.printer().text, "two 2");
    assert_eq!(second.variables().get("n"), Some("2"));

    // And playback continues normally from the loaded point.
    assert_eq!(second.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(second.printer().text, "three");
}

#[test]
fn loading_an_empty_save_is_an_error() {
    let mut engine = engine_with(32, &[("Main", "Yui: hi")]);
    assert!(matches!(
        engine.load_state(SaveData::new(Vec::new())),
        Err(EngineError::CorruptSaveData { .. })
    ));
}

#[test]
fn hot_reload_below_the_cursor_keeps_playing() {
    let v1 = "Yui: one\nYui: two\nYui: three";
    let v2 = "Yui: one\nYui: two\nYui: THREE";
    let mut engine = engine_with(32, &[("Main", v1)]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "two");

    // Only line 2 changed, which is still ahead of playback.
    let diags = engine.hot_reload("Main", v2).unwrap();
    assert!(diags.is_empty());
    assert_eq!(engine.step(), EngineStep::WaitingForInput);

    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "THREE");
}

#[test]
fn hot_reload_of_a_played_line_rolls_back_before_the_edit() {
    let v1 = "Yui: one\nYui: two\nYui: three";
    let v2 = "Yui: one\nYui: 2!\nYui: three";
    let mut engine = engine_with(32, &[("Main", v1)]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "three");

    // Line 1 changed behind the cursor: history at or after it is gone,
    // playback rolls back to the last snapshot the edit left valid.
    engine.hot_reload("Main", v2).unwrap();
    assert_eq!(engine.printer().text, "one");
    assert!(engine.can_rewind_to_line(0));

    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "2!");
}

#[test]
fn hot_reload_of_an_unloaded_script_behaves_like_load() {
    let mut engine = engine_with(32, &[]);
    let diags = engine.hot_reload("Fresh", "Yui: hi").unwrap();
    assert!(diags.is_empty());
    assert_eq!(engine.play("Fresh").unwrap(), EngineStep::WaitingForInput);
}

#[test]
fn unchanged_hot_reload_is_a_noop() {
    let text = "Yui: one\nYui: two";
    let mut engine = engine_with(32, &[("Main", text)]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    engine.hot_reload("Main", text).unwrap();

    assert_eq!(engine.step(), EngineStep::WaitingForInput);
    assert!(engine.can_rewind_to_line(0));
    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "two");
}

#[test]
fn rejected_save_applies_nothing() {
    let mut engine = engine_with(8, &[("Main", COUNTING)]);
    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "two 2");

    // One valid sub-state followed by a corrupt one.
    let mut snapshots = engine.save_state().into_snapshots();
    let last = snapshots.last_mut().unwrap();
    last.substates.insert(
        "variables".to_string(),
        serde_json::json!({ "vars": { "leaked": "yes" } }),
    );
    last.substates
        .insert("printer".to_string(), serde_json::json!(42));

    assert!(matches!(
        engine.load_state(SaveData::new(snapshots)),
        Err(EngineError::CorruptSaveData { .. })
    ));
    // No partial restore: the valid sub-state did not apply either, and
    // the live history survived.
    assert_eq!(engine.variables().get("leaked"), None);
    assert_eq!(engine.printer().text, "two 2");
    assert!(engine.can_rewind_to_line(1));
    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "three");
}
