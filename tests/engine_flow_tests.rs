//! End-to-end playback flows through the public engine API.

use kataribe::{Engine, EngineConfig, EngineError, EngineStep, NavigationError};

fn engine_with(scripts: &[(&str, &str)]) -> Engine {
    let mut engine = Engine::new(EngineConfig::default());
    for (name, text) in scripts {
        let diags = engine.load_script(name, text);
        assert!(
            diags.is_empty(),
            "unexpected diagnostics in '{name}': {:?}",
            diags.iter().collect::<Vec<_>>()
        );
    }
    engine
}

#[test]
fn dialogue_plays_line_by_line() {
    let mut engine = engine_with(&[("Main", "Yui: first\nYui: second")]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "first");

    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "second");

    assert_eq!(engine.continue_input().unwrap(), EngineStep::Halted);
    assert!(!engine.is_playing());
}

#[test]
fn cross_script_goto_resets_printer_and_audio_but_not_variables() {
    let mut engine = engine_with(&[
        ("Main", "@set n=5\n@bgm path:Theme\nYui: chapter one\n@goto Chapter2"),
        ("Chapter2", "Mei: chapter two"),
    ]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.audio().bgm_path.as_deref(), Some("Theme"));

    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "chapter two");
    assert_eq!(engine.audio().bgm_path, None);
    // Variables survive navigation regardless of the reset policy.
    assert_eq!(engine.variables().get("n"), Some("5"));
}

#[test]
fn goto_reset_dash_keeps_everything() {
    let mut engine = engine_with(&[
        ("Main", "@bgm path:Theme\n@goto Chapter2 reset:-"),
        ("Chapter2", "Mei: still playing"),
    ]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.audio().bgm_path.as_deref(), Some("Theme"));
}

#[test]
fn goto_reset_exclusion_spares_named_services() {
    let mut engine = engine_with(&[
        ("Main", "@bgm path:Theme\n@goto Chapter2 reset:audio"),
        ("Chapter2", "Mei: next"),
    ]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.audio().bgm_path.as_deref(), Some("Theme"));
}

#[test]
fn gosub_into_another_script_and_back() {
    let mut engine = engine_with(&[
        ("Main", "@gosub Shared.greet\nYui: back in main\n@stop"),
        ("Shared", "#greet\nMei: hello from shared\n@return"),
    ]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "hello from shared");

    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "back in main");

    assert_eq!(engine.continue_input().unwrap(), EngineStep::Halted);
}

#[test]
fn play_label_starts_mid_script() {
    let mut engine = engine_with(&[("Main", "Yui: intro\n#later\nYui: later scene")]);

    assert_eq!(
        engine.play_label("Main", "later").unwrap(),
        EngineStep::WaitingForInput
    );
    assert_eq!(engine.printer().text, "later scene");
}

#[test]
fn unknown_script_and_label_are_navigation_errors() {
    let mut engine = engine_with(&[("Main", "Yui: hi")]);

    match engine.play("Nope") {
        Err(EngineError::Navigation(NavigationError::ScriptNotFound { script })) => {
            assert_eq!(script, "Nope");
        }
        other => panic!("unexpected result {other:?}"),
    }
    match engine.play_label("Main", "nope") {
        Err(EngineError::Navigation(NavigationError::UndefinedLabel { label, .. })) => {
            assert_eq!(label, "nope");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn goto_to_unloaded_script_fails_cleanly() {
    let mut engine = engine_with(&[("Main", "@goto Nowhere")]);

    assert!(matches!(
        engine.play("Main"),
        Err(EngineError::Navigation(NavigationError::ScriptNotFound { .. }))
    ));
}

#[test]
fn script_with_only_broken_commands_refuses_to_play() {
    let mut engine = Engine::new(EngineConfig::default());
    let diags = engine.load_script("Broken", "@nosuchcommand");
    assert_eq!(diags.len(), 1);

    assert!(matches!(
        engine.play("Broken"),
        Err(EngineError::ScriptDiagnostics { count: 1, .. })
    ));
}

#[test]
fn empty_script_plays_to_immediate_halt() {
    let mut engine = engine_with(&[("Empty", "")]);
    assert_eq!(engine.play("Empty").unwrap(), EngineStep::Halted);
}

#[test]
fn skip_runs_to_the_end() {
    let mut engine = engine_with(&[("Main", "Yui: a\n@wait 5\nYui: b\nYui: c")]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.set_skip(true).unwrap(), EngineStep::Halted);
    assert_eq!(engine.printer().text, "c");
}

#[test]
fn auto_play_advances_on_ticks() {
    let mut engine = engine_with(&[("Main", "Yui: a\nYui: b")]);
    engine.set_auto_play(true);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForTimer);
    assert_eq!(engine.printer().text, "a");

    assert_eq!(engine.tick(3.1).unwrap(), EngineStep::WaitingForTimer);
    assert_eq!(engine.printer().text, "b");
}

#[test]
fn preload_paths_cover_commands_until_the_next_pause() {
    let mut engine = engine_with(&[(
        "Main",
        "Yui: hi\n@back Forest.Day\n@bgm path:Theme\nMei: yo",
    )]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    let paths = engine.preload_paths();
    assert_eq!(paths, vec!["Backgrounds/Forest/Day".to_string(), "Audio/Theme".to_string()]);
}

#[test]
fn directives_arrive_in_execution_order() {
    use kataribe::Directive;

    let mut engine = engine_with(&[("Main", "@back Forest\n@char Yui.Smile\nYui: here")]);
    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);

    let output = engine.drain_output();
    assert!(matches!(output[0], Directive::ShowBackground { ref id, .. } if id == "Forest"));
    assert!(matches!(output[1], Directive::ShowCharacter { ref id, .. } if id == "Yui"));
    assert!(matches!(output[2], Directive::Print { ref text, .. } if text == "here"));
    // Draining empties the buffer.
    assert!(engine.drain_output().is_empty());
}

#[test]
fn fresh_play_starts_with_an_empty_return_stack() {
    let mut engine = engine_with(&[
        ("Main", "@gosub Sub.s\nYui: back in main"),
        ("Sub", "#s\nMei: inside sub"),
        ("Other", "@return\nRin: fresh run"),
    ]);

    assert_eq!(engine.play("Main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "inside sub");

    // Abandoning the suspended subroutine for a new run: its opening
    // return must be the empty-stack no-op, not a jump into the old run.
    assert_eq!(engine.play("Other").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "fresh run");
    assert_eq!(engine.current_spot().unwrap().script, "Other");
}
