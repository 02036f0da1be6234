use super::*;
use crate::commands::registry::CommandRegistry;
use crate::script::Script;
use crate::state::VariableStore;

fn playlist_of(name: &str, text: &str) -> Playlist {
    let (script, mut diags) = Script::parse_text(name, text);
    let registry = CommandRegistry::builtin();
    let playlist = Playlist::build(&script, &registry, &mut diags);
    assert!(
        diags.is_empty(),
        "unexpected diagnostics: {:?}",
        diags.iter().collect::<Vec<_>>()
    );
    playlist
}

/// Player plus the collaborators an advance call needs.
struct Rig {
    player: Player,
    vars: VariableStore,
    printer: PrinterState,
    audio: AudioState,
    output: Vec<Directive>,
}

impl Rig {
    fn new() -> Self {
        Self {
            player: Player::new(0.5, 0.0),
            vars: VariableStore::new(),
            printer: PrinterState::default(),
            audio: AudioState::default(),
            output: Vec::new(),
        }
    }

    fn advance(&mut self) -> StepOutcome {
        let mut ctx = ExecutionContext {
            evaluator: &mut self.vars,
            printer: &mut self.printer,
            audio: &mut self.audio,
            output: &mut self.output,
        };
        self.player.advance(&mut ctx)
    }

    fn play(&mut self, name: &str, text: &str) -> StepOutcome {
        self.player.start(playlist_of(name, text), 0);
        self.advance()
    }

    fn continue_and_advance(&mut self) -> StepOutcome {
        assert!(self.player.continue_input());
        self.advance()
    }

    fn printed(&self) -> Vec<&str> {
        self.output
            .iter()
            .filter_map(|d| match d {
                Directive::Print { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn dialogue_prints_and_waits_for_input() {
    let mut rig = Rig::new();
    let outcome = rig.play("Main", "Yui: Hello");
    assert_eq!(outcome, StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.author.as_deref(), Some("Yui"));
    assert_eq!(rig.printer.text, "Hello");
    assert_eq!(rig.player.state(), &PlayerState::WaitingForInput { force: false });
}

#[test]
fn goto_jumps_over_intermediate_lines() {
    let mut rig = Rig::new();
    let outcome = rig.play(
        "Main",
        "@goto .after\nYui: Line A\n#after\nYui: Line B",
    );
    assert_eq!(outcome, StepOutcome::WaitingForInput);
    assert_eq!(rig.printed(), vec!["Line B"]);
}

#[test]
fn gosub_runs_subroutine_and_return_resumes_after_the_call() {
    let mut rig = Rig::new();
    let text = "@gosub .sub\nYui: back home\n@stop\n#sub\nYui: in sub\n@return";
    assert_eq!(rig.play("Main", text), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "in sub");

    assert_eq!(rig.continue_and_advance(), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "back home");

    assert_eq!(rig.continue_and_advance(), StepOutcome::Halted);
    assert!(rig.player.snapshot().gosub_stack.is_empty());
}

#[test]
fn stop_mid_wait_goes_idle_and_fresh_play_starts_from_the_top() {
    let mut rig = Rig::new();
    let text = "Yui: first\nYui: second";
    assert_eq!(rig.play("Main", text), StepOutcome::WaitingForInput);
    rig.player.stop();
    assert_eq!(rig.player.state(), &PlayerState::Idle);
    assert_eq!(rig.advance(), StepOutcome::Halted);

    rig.output.clear();
    assert_eq!(rig.play("Main", text), StepOutcome::WaitingForInput);
    assert_eq!(rig.printed(), vec!["first"]);
}

#[test]
fn return_with_empty_stack_is_a_logged_noop() {
    let mut rig = Rig::new();
    let outcome = rig.play("Main", "@return\nYui: after");
    assert_eq!(outcome, StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "after");
}

#[test]
fn goto_to_undefined_label_skips_the_jump() {
    let mut rig = Rig::new();
    let outcome = rig.play("Main", "@goto .missing\nYui: next");
    assert_eq!(outcome, StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "next");
}

#[test]
fn skip_collapses_input_and_timed_waits() {
    let mut rig = Rig::new();
    rig.player.set_skip(true);
    let outcome = rig.play("Main", "Yui: one\n@wait 2.5\nYui: two");
    assert_eq!(outcome, StepOutcome::Halted);
    assert_eq!(rig.printed(), vec!["one", "two"]);
}

#[test]
fn enabling_skip_releases_a_pending_input_wait() {
    let mut rig = Rig::new();
    assert_eq!(rig.play("Main", "Yui: one\nYui: two"), StepOutcome::WaitingForInput);
    assert!(rig.player.set_skip(true));
    assert_eq!(rig.advance(), StepOutcome::Halted);
    assert_eq!(rig.printed(), vec!["one", "two"]);
}

#[test]
fn timed_wait_drains_through_ticks() {
    let mut rig = Rig::new();
    assert_eq!(rig.play("Main", "@wait 0.5\nYui: hi"), StepOutcome::WaitingForTimer);
    assert!(!rig.player.tick(0.2));
    assert!(rig.player.tick(0.4));
    assert_eq!(rig.advance(), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "hi");
}

#[test]
fn input_or_timer_wait_releases_on_input() {
    let mut rig = Rig::new();
    assert_eq!(rig.play("Main", "@wait i2\nYui: hi"), StepOutcome::WaitingForTimer);
    assert!(rig.player.continue_input());
    assert_eq!(rig.advance(), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "hi");
}

#[test]
fn plain_timed_wait_ignores_input() {
    let mut rig = Rig::new();
    assert_eq!(rig.play("Main", "@wait 2\nYui: hi"), StepOutcome::WaitingForTimer);
    assert!(!rig.player.continue_input());
}

#[test]
fn auto_play_turns_input_waits_into_timers() {
    let mut rig = Rig::new();
    rig.player.set_auto_play(true);
    assert_eq!(rig.play("Main", "Yui: a\nYui: b"), StepOutcome::WaitingForTimer);
    assert!(rig.player.tick(0.6));
    assert_eq!(rig.advance(), StepOutcome::WaitingForTimer);
    assert_eq!(rig.printer.text, "b");
}

#[test]
fn variables_flow_from_set_into_expressions() {
    let mut rig = Rig::new();
    let outcome = rig.play("Main", "@set mood=great\nYui: I feel {mood}!");
    assert_eq!(outcome, StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "I feel great!");
}

#[test]
fn faulty_expression_skips_the_command_and_playback_survives() {
    let mut rig = Rig::new();
    let outcome = rig.play("Main", "Yui: value is {undefined_var}\nYui: still here");
    // The faulty print is dropped; its line still waits, with nothing shown.
    assert_eq!(outcome, StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "");
    assert_eq!(rig.continue_and_advance(), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "still here");
}

#[test]
fn cross_script_goto_surfaces_navigation() {
    let mut rig = Rig::new();
    let outcome = rig.play("Main", "@goto Chapter2.start reset:-");
    assert_eq!(
        outcome,
        StepOutcome::Navigate {
            script: "Chapter2".into(),
            label: Some("start".into()),
            reset: crate::commands::ResetPolicy::None,
            from_gosub: false,
        }
    );
}

#[test]
fn cross_script_gosub_returns_into_the_calling_script() {
    let mut rig = Rig::new();
    let outcome = rig.play("Main", "@gosub Sub\nYui: back");
    let StepOutcome::Navigate {
        script, from_gosub, ..
    } = outcome
    else {
        panic!("expected navigation, got {outcome:?}");
    };
    assert_eq!(script, "Sub");
    assert!(from_gosub);

    // The engine would rebuild the playlist and switch; the return then
    // surfaces the resumption spot back in the calling script.
    let sub = playlist_of("Sub", "@return");
    rig.player.switch_to(sub, &PlaybackSpot::new("Sub", 0, 0));
    let outcome = rig.advance();
    assert_eq!(
        outcome,
        StepOutcome::Resume(PlaybackSpot::new("Main", 1, 0))
    );
}

#[test]
fn movie_wait_is_not_skippable() {
    let mut rig = Rig::new();
    rig.player.set_skip(true);
    let outcome = rig.play("Main", "@movie Intro\nYui: after");
    assert_eq!(outcome, StepOutcome::WaitingForInput);
    assert_eq!(rig.player.state(), &PlayerState::WaitingForInput { force: true });
    assert!(!rig.player.set_skip(true));

    // Host signals movie completion; skip then collapses the dialogue wait.
    assert_eq!(rig.continue_and_advance(), StepOutcome::Halted);
    assert_eq!(rig.printer.text, "after");
}

#[test]
fn bgm_updates_audio_state_and_emits_a_directive() {
    let mut rig = Rig::new();
    let outcome = rig.play("Main", "@bgm path:Theme volume:0.5 loop:false\n@stop");
    assert_eq!(outcome, StepOutcome::Halted);
    assert_eq!(rig.audio.bgm_path.as_deref(), Some("Theme"));
    assert_eq!(rig.audio.bgm_volume, 0.5);
    assert!(!rig.audio.bgm_looped);
    assert!(matches!(
        rig.output.first(),
        Some(Directive::PlayMusic { path, .. }) if path == "Theme"
    ));
}

#[test]
fn snapshot_restore_resumes_at_the_captured_suspension() {
    let mut rig = Rig::new();
    let text = "Yui: one\nYui: two\nYui: three";
    assert_eq!(rig.play("Main", text), StepOutcome::WaitingForInput);
    assert_eq!(rig.continue_and_advance(), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "two");
    let snap = rig.player.snapshot();

    // Play past the capture point, then restore.
    assert_eq!(rig.continue_and_advance(), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "three");

    rig.player.restore(playlist_of("Main", text), &snap);
    assert_eq!(rig.player.state(), &PlayerState::WaitingForInput { force: false });
    assert_eq!(rig.continue_and_advance(), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "three");
}

#[test]
fn stop_detection_guards_forward_rewind() {
    let mut rig = Rig::new();
    let text = "Yui: one\n@stop\nYui: two";
    assert_eq!(rig.play("Main", text), StepOutcome::WaitingForInput);
    assert!(rig.player.stop_before_line(2));
    assert!(!rig.player.stop_before_line(1));
}

#[test]
fn starting_a_new_playlist_drops_pending_return_addresses() {
    let mut rig = Rig::new();
    let text = "@gosub .sub\nYui: after\n#sub\nMei: in sub\n@return";
    assert_eq!(rig.play("Main", text), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "in sub");

    // A fresh start while suspended inside the subroutine: the new run's
    // opening return must find an empty stack, not the old address.
    rig.player.start(playlist_of("Other", "@return\nRin: fresh"), 0);
    assert_eq!(rig.advance(), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "fresh");
    assert_eq!(rig.player.current_script(), Some("Other"));
}

#[test]
fn gosub_to_missing_label_records_no_return_address() {
    let mut rig = Rig::new();
    let text = "@gosub .nope\nYui: a\n@return\nYui: b";
    assert_eq!(rig.play("Main", text), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "a");

    // The failed call left nothing on the stack, so the return is the
    // empty-stack no-op and playback moves on instead of looping back.
    assert_eq!(rig.continue_and_advance(), StepOutcome::WaitingForInput);
    assert_eq!(rig.printer.text, "b");
}
