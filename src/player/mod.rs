//! Single-threaded playback state machine.
//!
//! The player owns the current [`Playlist`] and a cursor into it, and
//! advances by executing commands until one of them suspends playback
//! (waiting for input, waiting for a timer) or ends it. Cross-script
//! navigation is not resolved here: it surfaces as a [`StepOutcome`] for
//! the engine, which owns the script store, to act on.
//!
//! Execution never panics on a faulty command: runtime faults are logged
//! with their [`PlaybackSpot`] and the command is skipped, so a bad
//! expression in one line cannot take the whole playback down.

pub mod directive;

#[cfg(test)]
mod tests;

pub use directive::Directive;

use crate::commands::{
    Command, CommandKind, ExpressionEvaluator, NavigationPath, ParamValue, PlaybackSpot,
    ResetPolicy, WaitMode,
};
use crate::error::{ExecutionError, NavigationError};
use crate::playlist::Playlist;
use crate::state::{AudioState, PlayerSnapshot, PrinterState};

/// Where the state machine currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerState {
    /// Nothing playing; `play` starts from scratch.
    Idle,
    /// Mid-advance; the next `advance` call keeps executing.
    Playing,
    /// Suspended until `continue_input`. `force` marks waits that skip
    /// mode must not collapse (movie playback).
    WaitingForInput { force: bool },
    /// Suspended until `tick` drains the timer. `accepts_input` lets
    /// `continue_input` release the wait early.
    WaitingForTimer { remaining: f32, accepts_input: bool },
}

/// Why an `advance` call returned.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    WaitingForInput,
    WaitingForTimer,
    /// Playback ended: playlist exhausted or an explicit stop.
    Halted,
    /// A goto/gosub targets another script; the engine must rebuild the
    /// playlist and restart the player there.
    Navigate {
        script: String,
        label: Option<String>,
        reset: ResetPolicy,
        /// Gosub keeps the return stack alive across the switch.
        from_gosub: bool,
    },
    /// A return targets a spot in another script.
    Resume(PlaybackSpot),
}

/// Mutable collaborator slice handed to the player for one `advance`
/// call. Split out of the engine so the borrow checker can hand the
/// player and its collaborators out simultaneously.
pub struct ExecutionContext<'a> {
    pub evaluator: &'a mut dyn ExpressionEvaluator,
    pub printer: &'a mut PrinterState,
    pub audio: &'a mut AudioState,
    pub output: &'a mut Vec<Directive>,
}

#[derive(Debug)]
pub struct Player {
    playlist: Option<Playlist>,
    /// Index of the next command to execute.
    position: usize,
    state: PlayerState,
    gosub_stack: Vec<PlaybackSpot>,
    /// Spot of the most recently executed command; tags snapshots and
    /// error reports.
    last_spot: Option<PlaybackSpot>,
    skip: bool,
    auto_play: bool,
    auto_play_delay: f32,
    skip_time_scale: f32,
}

impl Player {
    pub fn new(auto_play_delay: f32, skip_time_scale: f32) -> Self {
        Self {
            playlist: None,
            position: 0,
            state: PlayerState::Idle,
            gosub_stack: Vec::new(),
            last_spot: None,
            skip: false,
            auto_play: false,
            auto_play_delay,
            skip_time_scale,
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn playlist(&self) -> Option<&Playlist> {
        self.playlist.as_ref()
    }

    pub fn current_script(&self) -> Option<&str> {
        self.playlist.as_ref().map(|p| p.script_name())
    }

    /// Index of the next command to execute.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Spot of the command playback last executed (the suspension point,
    /// while suspended).
    pub fn spot(&self) -> Option<&PlaybackSpot> {
        self.last_spot.as_ref()
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    /// Toggling skip on releases a pending input wait, except the forced
    /// kind.
    pub fn set_skip(&mut self, skip: bool) -> bool {
        self.skip = skip;
        if skip && matches!(self.state, PlayerState::WaitingForInput { force: false }) {
            self.state = PlayerState::Playing;
            return true;
        }
        false
    }

    pub fn auto_play(&self) -> bool {
        self.auto_play
    }

    pub fn set_auto_play(&mut self, auto_play: bool) {
        self.auto_play = auto_play;
    }

    /// Begin playing `playlist` from the first command at or after
    /// `line_index`. Resets the cursor, the return stack, and the state.
    pub fn start(&mut self, playlist: Playlist, line_index: usize) {
        self.position = playlist
            .index_at_or_after_line(line_index)
            .unwrap_or(playlist.len());
        self.playlist = Some(playlist);
        self.state = PlayerState::Playing;
        self.gosub_stack.clear();
        self.last_spot = None;
    }

    /// As [`start`](Self::start), but keeps the gosub return stack. Used
    /// for cross-script gosub and returning into another script.
    pub fn switch_to(&mut self, playlist: Playlist, spot: &PlaybackSpot) {
        self.position = playlist
            .index_at_spot(spot)
            .or_else(|| playlist.index_at_or_after_line(spot.line_index))
            .unwrap_or(playlist.len());
        self.playlist = Some(playlist);
        self.state = PlayerState::Playing;
    }

    /// End playback. The loaded playlist is kept for inspection; a later
    /// `start` replaces it.
    pub fn stop(&mut self) {
        self.state = PlayerState::Idle;
        self.gosub_stack.clear();
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            script: self.current_script().map(str::to_string),
            position: self.position,
            gosub_stack: self.gosub_stack.clone(),
        }
    }

    /// Restore from a snapshot taken at a suspension point. The engine
    /// supplies the rebuilt playlist for the snapshot's script; the player
    /// resumes suspended, waiting for input, exactly as it was captured.
    pub fn restore(&mut self, playlist: Playlist, snapshot: &PlayerSnapshot) {
        self.position = snapshot.position.min(playlist.len());
        self.playlist = Some(playlist);
        self.gosub_stack = snapshot.gosub_stack.clone();
        self.state = PlayerState::WaitingForInput { force: false };
    }

    /// Swap in a rebuilt playlist for the same script, keeping the cursor
    /// and suspension. Only valid when every command before the cursor is
    /// unchanged, which hot-reload guarantees by diffing line hashes.
    pub fn replace_playlist(&mut self, playlist: Playlist) {
        self.position = self.position.min(playlist.len());
        self.playlist = Some(playlist);
    }

    /// Execute quickly up to the first command at or after `line_index`,
    /// auto-releasing skippable waits, then resume normal advancing.
    /// Forced waits and cross-script navigation abort the fast phase and
    /// surface as usual.
    pub fn fast_forward(
        &mut self,
        ctx: &mut ExecutionContext<'_>,
        line_index: usize,
    ) -> StepOutcome {
        let saved_skip = self.skip;
        self.skip = true;
        self.state = PlayerState::Playing;
        // A backward goto inside the crossed region could loop forever.
        let mut budget = self.playlist.as_ref().map(|p| p.len() * 2 + 16).unwrap_or(0);
        let outcome = loop {
            let next_line = {
                let Some(playlist) = &self.playlist else {
                    self.state = PlayerState::Idle;
                    break StepOutcome::Halted;
                };
                match playlist.get(self.position) {
                    Some(command) => command.spot.line_index,
                    None => {
                        self.state = PlayerState::Idle;
                        break StepOutcome::Halted;
                    }
                }
            };
            if next_line >= line_index {
                self.skip = saved_skip;
                break self.advance(ctx);
            }
            if budget == 0 {
                log::error!("fast-forward to line {line_index} did not converge; stopping");
                self.stop();
                break StepOutcome::Halted;
            }
            budget -= 1;
            let command = match self.playlist.as_ref().and_then(|p| p.get(self.position)) {
                Some(command) => command.clone(),
                None => {
                    self.state = PlayerState::Idle;
                    break StepOutcome::Halted;
                }
            };
            self.position += 1;
            self.last_spot = Some(command.spot.clone());
            match self.execute(command, ctx) {
                Flow::Continue => {}
                Flow::Yield(outcome) => break outcome,
            }
        };
        self.skip = saved_skip;
        outcome
    }

    /// Signal reader input (or movie completion). Returns `true` when the
    /// signal released a suspension; the caller then advances.
    pub fn continue_input(&mut self) -> bool {
        match self.state {
            PlayerState::WaitingForInput { .. }
            | PlayerState::WaitingForTimer {
                accepts_input: true,
                ..
            } => {
                self.state = PlayerState::Playing;
                true
            }
            _ => false,
        }
    }

    /// Advance wall-clock time. Returns `true` when the tick drained a
    /// pending timer; the caller then advances.
    pub fn tick(&mut self, delta_secs: f32) -> bool {
        if let PlayerState::WaitingForTimer { remaining, .. } = &mut self.state {
            *remaining -= delta_secs;
            if *remaining <= 0.0 {
                self.state = PlayerState::Playing;
                return true;
            }
        }
        false
    }

    /// Whether an explicit stop command sits between the cursor and
    /// `line_index`; forward rewind must not cross one.
    pub fn stop_before_line(&self, line_index: usize) -> bool {
        let Some(playlist) = &self.playlist else {
            return false;
        };
        playlist.commands()[self.position.min(playlist.len())..]
            .iter()
            .take_while(|c| c.spot.line_index < line_index)
            .any(|c| matches!(c.kind, CommandKind::Stop))
    }

    /// Execute commands until playback suspends, ends, or needs the
    /// engine to navigate.
    pub fn advance(&mut self, ctx: &mut ExecutionContext<'_>) -> StepOutcome {
        if !matches!(self.state, PlayerState::Playing) {
            return match &self.state {
                PlayerState::Idle => StepOutcome::Halted,
                PlayerState::WaitingForInput { .. } => StepOutcome::WaitingForInput,
                PlayerState::WaitingForTimer { .. } => StepOutcome::WaitingForTimer,
                PlayerState::Playing => unreachable!(),
            };
        }
        loop {
            let command = {
                let Some(playlist) = &self.playlist else {
                    self.state = PlayerState::Idle;
                    return StepOutcome::Halted;
                };
                match playlist.get(self.position) {
                    Some(command) => command.clone(),
                    None => {
                        log::debug!("playlist '{}' exhausted", playlist.script_name());
                        self.state = PlayerState::Idle;
                        return StepOutcome::Halted;
                    }
                }
            };
            self.position += 1;
            self.last_spot = Some(command.spot.clone());
            match self.execute(command, ctx) {
                Flow::Continue => {}
                Flow::Yield(outcome) => return outcome,
            }
        }
    }

    fn execute(&mut self, command: Command, ctx: &mut ExecutionContext<'_>) -> Flow {
        let spot = command.spot;
        let result = match command.kind {
            CommandKind::Print {
                text,
                author,
                appearance,
                reset_printer,
            } => text.resolve(ctx.evaluator).map(|text| {
                if let Some(app) = &appearance {
                    ctx.printer.appearance = Some(app.clone());
                }
                ctx.printer.print(author.as_deref(), &text, reset_printer);
                ctx.output.push(Directive::Print {
                    author,
                    text,
                    reset: reset_printer,
                });
                Flow::Continue
            }),
            CommandKind::SetAppearance { author, appearance } => {
                ctx.printer.appearance = Some(appearance.clone());
                ctx.output.push(Directive::SetAppearance {
                    actor: author,
                    appearance,
                });
                Ok(Flow::Continue)
            }
            CommandKind::WaitInput => Ok(self.suspend_for_input(false)),
            CommandKind::Wait { mode } => self.execute_wait(mode, &spot, ctx),
            CommandKind::Goto { path, reset } => {
                self.navigate(path, &spot, ctx, NavKind::Goto(reset))
            }
            CommandKind::Gosub { path } => self.navigate(path, &spot, ctx, NavKind::Gosub),
            CommandKind::Return => Ok(self.execute_return(&spot)),
            CommandKind::Stop => {
                log::info!("playback stopped at {spot}");
                self.stop();
                Ok(Flow::Yield(StepOutcome::Halted))
            }
            CommandKind::Assign { expression } => expression
                .resolve(ctx.evaluator)
                .and_then(|expr| ctx.evaluator.assign(&expr, &spot))
                .map(|()| Flow::Continue),
            CommandKind::PlayMusic {
                path,
                volume,
                looped,
            } => path.resolve(ctx.evaluator).map(|path| {
                ctx.audio.bgm_path = Some(path.clone());
                ctx.audio.bgm_volume = volume;
                ctx.audio.bgm_looped = looped;
                ctx.output.push(Directive::PlayMusic {
                    path,
                    volume,
                    looped,
                });
                Flow::Continue
            }),
            CommandKind::PlaySound { path, volume } => path.resolve(ctx.evaluator).map(|path| {
                ctx.output.push(Directive::PlaySound { path, volume });
                Flow::Continue
            }),
            CommandKind::ShowBackground { id, appearance } => {
                ctx.output.push(Directive::ShowBackground { id, appearance });
                Ok(Flow::Continue)
            }
            CommandKind::ShowCharacter { id, appearance } => {
                ctx.output.push(Directive::ShowCharacter { id, appearance });
                Ok(Flow::Continue)
            }
            CommandKind::HideActor { id } => {
                ctx.output.push(Directive::HideActor { id });
                Ok(Flow::Continue)
            }
            CommandKind::PlayMovie { path } => path.resolve(ctx.evaluator).map(|path| {
                ctx.output.push(Directive::PlayMovie { path });
                // The movie must finish even when skipping.
                self.suspend_for_input(true)
            }),
        };
        match result {
            Ok(flow) => flow,
            Err(err) => {
                log::error!("skipping faulty command: {err}");
                Flow::Continue
            }
        }
    }

    fn suspend_for_input(&mut self, force: bool) -> Flow {
        if self.skip && !force {
            return Flow::Continue;
        }
        if self.auto_play && !force {
            self.state = PlayerState::WaitingForTimer {
                remaining: self.auto_play_delay,
                accepts_input: true,
            };
            return Flow::Yield(StepOutcome::WaitingForTimer);
        }
        self.state = PlayerState::WaitingForInput { force };
        Flow::Yield(StepOutcome::WaitingForInput)
    }

    fn suspend_for_timer(&mut self, secs: f32, accepts_input: bool) -> Flow {
        let secs = if self.skip {
            secs * self.skip_time_scale
        } else {
            secs
        };
        if secs <= 0.0 {
            return Flow::Continue;
        }
        self.state = PlayerState::WaitingForTimer {
            remaining: secs,
            accepts_input,
        };
        Flow::Yield(StepOutcome::WaitingForTimer)
    }

    fn execute_wait(
        &mut self,
        mode: WaitMode,
        spot: &PlaybackSpot,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Flow, ExecutionError> {
        match mode {
            WaitMode::Input => Ok(self.suspend_for_input(false)),
            WaitMode::Timer(secs) => Ok(self.suspend_for_timer(secs, false)),
            WaitMode::InputOrTimer(secs) => Ok(self.suspend_for_timer(secs, true)),
            WaitMode::Dynamic(value) => {
                let raw = value.resolve(ctx.evaluator)?;
                let mode = WaitMode::parse(&raw).map_err(|reason| ExecutionError::InvalidValue {
                    value: raw,
                    spot: spot.clone(),
                    reason,
                })?;
                self.execute_wait(mode, spot, ctx)
            }
        }
    }

    fn navigate(
        &mut self,
        path: ParamValue,
        spot: &PlaybackSpot,
        ctx: &mut ExecutionContext<'_>,
        kind: NavKind,
    ) -> Result<Flow, ExecutionError> {
        let raw = path.resolve(ctx.evaluator)?;
        let Some(target) = NavigationPath::parse(&raw) else {
            return Err(ExecutionError::InvalidValue {
                value: raw,
                spot: spot.clone(),
                reason: "expected 'Script.label', 'Script', or '.label'".into(),
            });
        };
        let from_gosub = matches!(kind, NavKind::Gosub);
        let local = match &target.script {
            None => true,
            Some(script) => Some(script.as_str()) == self.current_script(),
        };
        if local {
            return Ok(self.jump_local(&target, spot, from_gosub));
        }
        if from_gosub {
            // Resume at the line after the calling command.
            self.gosub_stack
                .push(PlaybackSpot::new(&spot.script, spot.line_index + 1, 0));
        }
        let reset = match kind {
            NavKind::Goto(reset) => reset,
            NavKind::Gosub => ResetPolicy::None,
        };
        Ok(Flow::Yield(StepOutcome::Navigate {
            // The local check above guarantees a script name here.
            script: target.script.unwrap_or_default(),
            label: target.label,
            reset,
            from_gosub,
        }))
    }

    fn jump_local(&mut self, target: &NavigationPath, spot: &PlaybackSpot, from_gosub: bool) -> Flow {
        let Some(playlist) = &self.playlist else {
            self.state = PlayerState::Idle;
            return Flow::Yield(StepOutcome::Halted);
        };
        let line = match &target.label {
            None => Some(0),
            Some(label) => playlist.label_line(label),
        };
        match line {
            Some(line) => {
                let position = playlist.index_at_or_after_line(line).unwrap_or(playlist.len());
                // The return address is recorded only once the target is
                // known to exist; a failed call must leave nothing behind
                // for a later return to consume.
                if from_gosub {
                    self.gosub_stack
                        .push(PlaybackSpot::new(&spot.script, spot.line_index + 1, 0));
                }
                self.position = position;
                Flow::Continue
            }
            None => {
                let err = NavigationError::UndefinedLabel {
                    script: playlist.script_name().to_string(),
                    label: target.label.clone().unwrap_or_default(),
                };
                log::error!("{err} (at {spot})");
                Flow::Continue
            }
        }
    }

    fn execute_return(&mut self, spot: &PlaybackSpot) -> Flow {
        let Some(target) = self.gosub_stack.pop() else {
            let err = NavigationError::EmptyReturnStack { spot: spot.clone() };
            log::error!("{err}");
            return Flow::Continue;
        };
        if Some(target.script.as_str()) == self.current_script() {
            // Borrow ends before the position write.
            let position = self
                .playlist
                .as_ref()
                .and_then(|p| p.index_at_or_after_line(target.line_index));
            self.position = position.unwrap_or_else(|| {
                self.playlist.as_ref().map(Playlist::len).unwrap_or(0)
            });
            Flow::Continue
        } else {
            Flow::Yield(StepOutcome::Resume(target))
        }
    }
}

enum Flow {
    Continue,
    Yield(StepOutcome),
}

enum NavKind {
    Goto(ResetPolicy),
    Gosub,
}
