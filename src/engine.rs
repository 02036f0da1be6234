//! Engine façade: script store, playback driver, and state capture.
//!
//! The engine owns everything mutable — the loaded scripts and their
//! derived playlists, the player, the built-in services, the rollback
//! history — and exposes the synchronous operations a host drives
//! playback with. Rendering stays outside: the host drains [`Directive`]s
//! after each call and reacts to the returned [`EngineStep`].

use crate::commands::registry::CommandRegistry;
use crate::commands::ResetPolicy;
use crate::error::{Diagnostics, EngineError, NavigationError};
use crate::player::{Directive, ExecutionContext, Player, PlayerState, StepOutcome};
use crate::playlist::Playlist;
use crate::script::Script;
use crate::state::{
    AudioState, GameService, PrinterState, Snapshot, StateManager, VariableStore,
};
use crate::storage::SaveData;
use std::collections::{BTreeMap, HashMap};

/// Tunables a host passes at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Snapshot history depth; the oldest entry is evicted past this.
    pub rollback_steps: usize,
    /// Seconds auto-play lingers on a line before continuing.
    pub auto_play_delay: f32,
    /// Multiplier applied to timed waits while skipping. Zero collapses
    /// them entirely.
    pub skip_time_scale: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rollback_steps: 32,
            auto_play_delay: 3.0,
            skip_time_scale: 0.0,
        }
    }
}

/// What the engine is doing after an operation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStep {
    /// Suspended until [`Engine::continue_input`].
    WaitingForInput,
    /// Suspended until [`Engine::tick`] drains the timer (input may also
    /// release it).
    WaitingForTimer,
    /// Nothing playing.
    Halted,
}

pub struct Engine {
    registry: CommandRegistry,
    scripts: HashMap<String, Script>,
    playlists: HashMap<String, Playlist>,
    diagnostics: HashMap<String, Diagnostics>,
    player: Player,
    variables: VariableStore,
    printer: PrinterState,
    audio: AudioState,
    services: Vec<Box<dyn GameService>>,
    state: StateManager,
    output: Vec<Directive>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, CommandRegistry::builtin())
    }

    /// Construct with a custom command registry, e.g. the built-ins plus
    /// host-specific command types.
    pub fn with_registry(config: EngineConfig, registry: CommandRegistry) -> Self {
        Self {
            registry,
            scripts: HashMap::new(),
            playlists: HashMap::new(),
            diagnostics: HashMap::new(),
            player: Player::new(config.auto_play_delay, config.skip_time_scale),
            variables: VariableStore::new(),
            printer: PrinterState::default(),
            audio: AudioState::default(),
            services: Vec::new(),
            state: StateManager::new(config.rollback_steps),
            output: Vec::new(),
        }
    }

    /// Register a host service participating in snapshots, saves, and
    /// goto resets.
    pub fn register_service(&mut self, service: Box<dyn GameService>) {
        self.services.push(service);
    }

    /// Parse `text` and store it under `name`, replacing any previous
    /// version. Parse and bind problems are returned batched; the script
    /// is stored and playable either way, minus its dropped commands.
    pub fn load_script(&mut self, name: &str, text: &str) -> Diagnostics {
        let (script, mut diags) = Script::parse_text(name, text);
        let playlist = Playlist::build(&script, &self.registry, &mut diags);
        if !diags.is_empty() {
            log::warn!("script '{name}': {} diagnostic(s)", diags.len());
        }
        self.scripts.insert(name.to_string(), script);
        self.playlists.insert(name.to_string(), playlist);
        self.diagnostics.insert(name.to_string(), diags.clone());
        diags
    }

    pub fn diagnostics(&self, script: &str) -> Option<&Diagnostics> {
        self.diagnostics.get(script)
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.set(name, value);
    }

    pub fn printer(&self) -> &PrinterState {
        &self.printer
    }

    pub fn audio(&self) -> &AudioState {
        &self.audio
    }

    /// Directives produced since the last drain, in execution order.
    pub fn drain_output(&mut self) -> Vec<Directive> {
        std::mem::take(&mut self.output)
    }

    /// Current suspension state without advancing anything.
    pub fn step(&self) -> EngineStep {
        match self.player.state() {
            PlayerState::Idle | PlayerState::Playing => EngineStep::Halted,
            PlayerState::WaitingForInput { .. } => EngineStep::WaitingForInput,
            PlayerState::WaitingForTimer { .. } => EngineStep::WaitingForTimer,
        }
    }

    pub fn is_playing(&self) -> bool {
        !matches!(self.player.state(), PlayerState::Idle)
    }

    /// Spot playback last executed at, if anything has played.
    pub fn current_spot(&self) -> Option<&crate::commands::PlaybackSpot> {
        self.player.spot()
    }

    pub fn play(&mut self, script: &str) -> Result<EngineStep, EngineError> {
        self.play_from_line(script, 0)
    }

    pub fn play_label(&mut self, script: &str, label: &str) -> Result<EngineStep, EngineError> {
        let playlist = self.playlist_for(script)?;
        let line = playlist
            .label_line(label)
            .ok_or_else(|| NavigationError::UndefinedLabel {
                script: script.to_string(),
                label: label.to_string(),
            })?;
        self.play_from_line(script, line)
    }

    pub fn play_from_line(&mut self, script: &str, line: usize) -> Result<EngineStep, EngineError> {
        let playlist = self.playlist_for(script)?;
        if playlist.is_empty()
            && let Some(diags) = self.diagnostics.get(script)
            && !diags.is_empty()
        {
            return Err(EngineError::ScriptDiagnostics {
                script: script.to_string(),
                count: diags.len(),
                first: diags
                    .iter()
                    .next()
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
            });
        }
        self.player.start(playlist, line);
        self.run()
    }

    pub fn stop(&mut self) {
        self.player.stop();
    }

    /// Reader input (also releases a finished movie). A no-op unless
    /// playback is suspended on an input-accepting wait.
    pub fn continue_input(&mut self) -> Result<EngineStep, EngineError> {
        if self.player.continue_input() {
            self.run()
        } else {
            Ok(self.step())
        }
    }

    /// Advance wall-clock time for timed waits.
    pub fn tick(&mut self, delta_secs: f32) -> Result<EngineStep, EngineError> {
        if self.player.tick(delta_secs) {
            self.run()
        } else {
            Ok(self.step())
        }
    }

    pub fn set_skip(&mut self, skip: bool) -> Result<EngineStep, EngineError> {
        if self.player.set_skip(skip) {
            self.run()
        } else {
            Ok(self.step())
        }
    }

    pub fn skip(&self) -> bool {
        self.player.skip()
    }

    pub fn set_auto_play(&mut self, auto_play: bool) {
        self.player.set_auto_play(auto_play);
    }

    pub fn auto_play(&self) -> bool {
        self.player.auto_play()
    }

    /// Move playback to `line_index` of the current script. Backward
    /// rewind restores the most recent snapshot covering that line;
    /// forward rewind fast-executes the crossed commands and fails when
    /// an explicit stop sits in between.
    pub fn rewind_to_line(&mut self, line_index: usize) -> Result<EngineStep, EngineError> {
        let current = self
            .player
            .spot()
            .cloned()
            .ok_or(NavigationError::NothingPlaying)?;
        if line_index > current.line_index {
            if self.player.stop_before_line(line_index) {
                return Err(NavigationError::RewindUnreachable {
                    line: line_index,
                    reason: "an explicit stop intervenes".to_string(),
                }
                .into());
            }
            let outcome = {
                let mut ctx = ExecutionContext {
                    evaluator: &mut self.variables,
                    printer: &mut self.printer,
                    audio: &mut self.audio,
                    output: &mut self.output,
                };
                self.player.fast_forward(&mut ctx, line_index)
            };
            return self.resolve(outcome);
        }
        let script = current.script.clone();
        let snapshot = self
            .state
            .stack()
            .peek_last(|s| s.script == script && s.line_index <= line_index)
            .cloned()
            .ok_or(NavigationError::RewindUnreachable {
                line: line_index,
                reason: "no snapshot covers that line".to_string(),
            })?;
        // Apply before truncating, so a failed restore leaves the history
        // intact.
        self.apply_snapshot(&snapshot)?;
        let _ = self
            .state
            .rollback_to(|s| s.script == script && s.line_index <= line_index);
        Ok(EngineStep::WaitingForInput)
    }

    /// Whether [`rewind_to_line`](Self::rewind_to_line) backwards to this
    /// line can succeed, for greying out a UI affordance.
    pub fn can_rewind_to_line(&self, line_index: usize) -> bool {
        let Some(spot) = self.player.spot() else {
            return false;
        };
        let script = spot.script.clone();
        self.state
            .can_rollback_to(|s| s.script == script && s.line_index <= line_index)
    }

    /// Replace a loaded script with edited text. Line hashes are diffed
    /// first: rollback history at or after the first changed line is
    /// pruned, and if playback already passed that line it is rolled back
    /// to the last snapshot the edit did not invalidate (or restarted from
    /// the top when none survives).
    pub fn hot_reload(&mut self, name: &str, text: &str) -> Result<Diagnostics, EngineError> {
        let Some(old) = self.scripts.get(name) else {
            return Ok(self.load_script(name, text));
        };
        let (script, mut diags) = Script::parse_text(name, text);
        let playlist = Playlist::build(&script, &self.registry, &mut diags);
        let changed = old.first_changed_line(&script);

        self.scripts.insert(name.to_string(), script);
        self.playlists.insert(name.to_string(), playlist.clone());
        self.diagnostics.insert(name.to_string(), diags.clone());

        let Some(changed_line) = changed else {
            if self.player.current_script() == Some(name) {
                self.player.replace_playlist(playlist);
            }
            return Ok(diags);
        };
        log::info!("script '{name}' changed from line {changed_line}");
        self.state
            .stack_mut()
            .prune_script_from_line(name, changed_line);

        if self.player.current_script() == Some(name) {
            let at = self.player.spot().map(|s| s.line_index).unwrap_or(0);
            if at < changed_line {
                self.player.replace_playlist(playlist);
            } else if let Some(snapshot) = self
                .state
                .stack()
                .peek_last(|s| s.script == name && s.line_index < changed_line)
                .cloned()
            {
                self.apply_snapshot(&snapshot)?;
                let _ = self
                    .state
                    .rollback_to(|s| s.script == name && s.line_index < changed_line);
            } else {
                self.player.start(playlist, 0);
                let _ = self.run()?;
            }
        }
        Ok(diags)
    }

    /// Persistable slice of the rollback history, newest last.
    pub fn save_state(&self) -> SaveData {
        SaveData::new(
            self.state
                .stack()
                .iter()
                .filter(|s| s.persistable())
                .cloned()
                .collect(),
        )
    }

    /// Replace the rollback history with a save and resume at its newest
    /// snapshot. The scripts the save references must already be loaded.
    pub fn load_state(&mut self, data: SaveData) -> Result<EngineStep, EngineError> {
        let snapshots = data.into_snapshots();
        let last = snapshots
            .last()
            .cloned()
            .ok_or(EngineError::CorruptSaveData {
                reason: "save contains no snapshots".to_string(),
            })?;
        // A corrupt save must not clobber the live history.
        self.check_snapshot(&last)?;
        self.state.stack_mut().clear();
        self.state.stack_mut().extend(snapshots);
        self.apply_snapshot(&last)?;
        Ok(EngineStep::WaitingForInput)
    }

    /// Statically known resource paths the commands between the cursor
    /// and the next blocking wait will need.
    pub fn preload_paths(&self) -> Vec<String> {
        let Some(playlist) = self.player.playlist() else {
            return Vec::new();
        };
        playlist.commands()[self.player.position().min(playlist.len())..]
            .iter()
            .take_while(|c| !c.is_blocking_wait())
            .flat_map(|c| c.resource_paths())
            .collect()
    }

    fn run(&mut self) -> Result<EngineStep, EngineError> {
        let outcome = self.advance_once();
        self.resolve(outcome)
    }

    fn advance_once(&mut self) -> StepOutcome {
        let mut ctx = ExecutionContext {
            evaluator: &mut self.variables,
            printer: &mut self.printer,
            audio: &mut self.audio,
            output: &mut self.output,
        };
        self.player.advance(&mut ctx)
    }

    fn resolve(&mut self, mut outcome: StepOutcome) -> Result<EngineStep, EngineError> {
        loop {
            match outcome {
                StepOutcome::WaitingForInput => {
                    let from_input = matches!(
                        self.player.state(),
                        PlayerState::WaitingForInput { force: false }
                    );
                    self.capture(from_input, false);
                    return Ok(EngineStep::WaitingForInput);
                }
                StepOutcome::WaitingForTimer => return Ok(EngineStep::WaitingForTimer),
                StepOutcome::Halted => return Ok(EngineStep::Halted),
                StepOutcome::Navigate {
                    script,
                    label,
                    reset,
                    from_gosub,
                } => {
                    self.navigate(&script, label.as_deref(), &reset, from_gosub)?;
                    // Position survives into saves even before the next
                    // reader stop.
                    self.capture(false, true);
                    outcome = self.advance_once();
                }
                StepOutcome::Resume(spot) => {
                    let playlist = self.playlist_for(&spot.script)?;
                    self.player.switch_to(playlist, &spot);
                    outcome = self.advance_once();
                }
            }
        }
    }

    fn navigate(
        &mut self,
        script: &str,
        label: Option<&str>,
        reset: &ResetPolicy,
        from_gosub: bool,
    ) -> Result<(), EngineError> {
        let playlist = self.playlist_for(script)?;
        let line = match label {
            None => 0,
            Some(label) => {
                playlist
                    .label_line(label)
                    .ok_or_else(|| NavigationError::UndefinedLabel {
                        script: script.to_string(),
                        label: label.to_string(),
                    })?
            }
        };
        if !from_gosub {
            self.reset_services(reset);
        }
        let spot = crate::commands::PlaybackSpot::new(script, line, 0);
        self.player.switch_to(playlist, &spot);
        Ok(())
    }

    fn playlist_for(&self, name: &str) -> Result<Playlist, EngineError> {
        self.playlists
            .get(name)
            .cloned()
            .ok_or_else(|| NavigationError::ScriptNotFound {
                script: name.to_string(),
            }
            .into())
    }

    fn reset_services(&mut self, policy: &ResetPolicy) {
        reset_one(&mut self.variables, policy);
        reset_one(&mut self.printer, policy);
        reset_one(&mut self.audio, policy);
        for service in &mut self.services {
            reset_one(service.as_mut(), policy);
        }
    }

    fn capture(&mut self, from_user_input: bool, force_serialize: bool) {
        let Some(spot) = self.player.spot().cloned() else {
            return;
        };
        let mut substates = BTreeMap::new();
        let services: Vec<&dyn GameService> = {
            let mut v: Vec<&dyn GameService> =
                vec![&self.variables, &self.printer, &self.audio];
            v.extend(self.services.iter().map(|s| s.as_ref() as &dyn GameService));
            v
        };
        for service in services {
            match service.serialize_state() {
                Ok(value) => {
                    substates.insert(service.name().to_string(), value);
                }
                Err(err) => {
                    log::warn!("service '{}' failed to serialize: {err}", service.name());
                }
            }
        }
        let snapshot = Snapshot {
            spot,
            from_user_input,
            force_serialize,
            substates,
            player: self.player.snapshot(),
        };
        self.state.capture(snapshot);
    }

    /// Whether `snapshot` can be applied in full, without mutating
    /// anything. Returns the resolved playlist for the snapshot's script.
    fn check_snapshot(&self, snapshot: &Snapshot) -> Result<Playlist, EngineError> {
        check_one(&self.variables, &snapshot.substates)?;
        check_one(&self.printer, &snapshot.substates)?;
        check_one(&self.audio, &snapshot.substates)?;
        for service in &self.services {
            check_one(service.as_ref(), &snapshot.substates)?;
        }
        let script = snapshot
            .player
            .script
            .as_deref()
            .ok_or(EngineError::CorruptSaveData {
                reason: "snapshot has no active script".to_string(),
            })?;
        self.playlist_for(script)
    }

    /// Restore is all-or-nothing: every sub-state and the playlist are
    /// checked first, and only then applied.
    fn apply_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), EngineError> {
        let playlist = self.check_snapshot(snapshot)?;
        restore_one(&mut self.variables, &snapshot.substates)?;
        restore_one(&mut self.printer, &snapshot.substates)?;
        restore_one(&mut self.audio, &snapshot.substates)?;
        for service in &mut self.services {
            restore_one(service.as_mut(), &snapshot.substates)?;
        }
        self.player.restore(playlist, &snapshot.player);
        // Let directive-driven hosts redraw the restored line.
        self.output.push(Directive::Print {
            author: self.printer.author.clone(),
            text: self.printer.text.clone(),
            reset: true,
        });
        Ok(())
    }
}

fn reset_one(service: &mut dyn GameService, policy: &ResetPolicy) {
    if policy.should_reset(service.name(), !service.reset_on_goto()) {
        log::debug!("resetting service '{}'", service.name());
        service.reset_state();
    }
}

fn check_one(
    service: &dyn GameService,
    substates: &BTreeMap<String, serde_json::Value>,
) -> Result<(), EngineError> {
    let Some(value) = substates.get(service.name()) else {
        return Ok(());
    };
    service
        .check_state(value)
        .map_err(|err| EngineError::CorruptSaveData {
            reason: format!("service '{}': {err}", service.name()),
        })
}

fn restore_one(
    service: &mut dyn GameService,
    substates: &BTreeMap<String, serde_json::Value>,
) -> Result<(), EngineError> {
    let Some(value) = substates.get(service.name()) else {
        return Ok(());
    };
    service
        .restore_state(value)
        .map_err(|err| EngineError::CorruptSaveData {
            reason: format!("service '{}': {err}", service.name()),
        })
}
