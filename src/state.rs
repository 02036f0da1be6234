//! Engine-wide state: rollback snapshots and the built-in stateful
//! services (variables, printer, audio).
//!
//! Snapshots are opaque to the rollback machinery: each holds an ordered
//! map of named sub-states contributed by interested services, restored by
//! handing each named sub-state back to its owning service. Capture only
//! ever happens at a player suspension point, which guarantees a
//! consistent cut of state.

use crate::commands::{ExpressionEvaluator, PlaybackSpot};
use crate::error::ExecutionError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Player-side part of a snapshot: enough to rebuild the playlist and
/// reposition playback on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub script: Option<String>,
    pub position: usize,
    pub gosub_stack: Vec<PlaybackSpot>,
}

/// One captured cut of engine-wide state, tagged with the playback spot
/// that was active when it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub spot: PlaybackSpot,
    /// Captured at a wait-for-input suspension, i.e. a spot the reader
    /// actually stopped at.
    pub from_user_input: bool,
    /// Include in persisted saves even when not reached via user input.
    pub force_serialize: bool,
    pub substates: BTreeMap<String, serde_json::Value>,
    pub player: PlayerSnapshot,
}

impl Snapshot {
    /// Whether this snapshot belongs in persisted save data.
    pub fn persistable(&self) -> bool {
        self.from_user_input || self.force_serialize
    }
}

/// Bounded, oldest-evicted-first stack of snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackStack {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl RollbackStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Most recent snapshot matching `pred`, leaving the stack untouched.
    pub fn peek_last(&self, pred: impl Fn(&PlaybackSpot) -> bool) -> Option<&Snapshot> {
        self.entries.iter().rev().find(|s| pred(&s.spot))
    }

    /// Pop entries newer than the most recent match and return a clone of
    /// the match itself, which stays on the stack so the same point can be
    /// rolled back to again. `None` when nothing matches.
    pub fn rewind_to(&mut self, pred: impl Fn(&PlaybackSpot) -> bool) -> Option<Snapshot> {
        let idx = self.entries.iter().rposition(|s| pred(&s.spot))?;
        self.entries.truncate(idx + 1);
        Some(self.entries[idx].clone())
    }

    /// Drop snapshots taken in `script` at or after `line_index`. Used by
    /// hot-reload to invalidate history the edited text no longer backs.
    pub fn prune_script_from_line(&mut self, script: &str, line_index: usize) {
        self.entries
            .retain(|s| s.spot.script != script || s.spot.line_index < line_index);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    pub fn extend(&mut self, snapshots: impl IntoIterator<Item = Snapshot>) {
        for s in snapshots {
            self.push(s);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Owner of the rollback stack. Restoration itself is performed by the
/// engine, which hands each named sub-state back to its service; this
/// component only finds and orders snapshots.
#[derive(Debug, Clone)]
pub struct StateManager {
    stack: RollbackStack,
}

impl StateManager {
    pub fn new(rollback_steps: usize) -> Self {
        Self {
            stack: RollbackStack::new(rollback_steps),
        }
    }

    pub fn capture(&mut self, snapshot: Snapshot) {
        log::debug!(
            "captured snapshot at {} (input={}, stack={}/{})",
            snapshot.spot,
            snapshot.from_user_input,
            self.stack.len() + 1,
            self.stack.capacity()
        );
        self.stack.push(snapshot);
    }

    /// Non-mutating existence check for a rollback affordance.
    pub fn can_rollback_to(&self, pred: impl Fn(&PlaybackSpot) -> bool) -> bool {
        self.stack.peek_last(pred).is_some()
    }

    pub fn rollback_to(&mut self, pred: impl Fn(&PlaybackSpot) -> bool) -> Option<Snapshot> {
        self.stack.rewind_to(pred)
    }

    pub fn stack(&self) -> &RollbackStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut RollbackStack {
        &mut self.stack
    }
}

/// A service contributing a named sub-state to snapshots and saves.
///
/// Restore is two-phase: every sub-state in a snapshot passes
/// [`check_state`](Self::check_state) before any service is mutated, so a
/// corrupt snapshot is rejected without leaving a partial restore behind.
pub trait GameService {
    fn name(&self) -> &'static str;

    fn serialize_state(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Whether `state` would restore cleanly, without applying it.
    fn check_state(&self, state: &serde_json::Value) -> Result<(), serde_json::Error>;

    fn restore_state(&mut self, state: &serde_json::Value) -> Result<(), serde_json::Error>;

    /// Return to the default state (cross-script goto reset).
    fn reset_state(&mut self);

    /// Services declaring `false` keep their state across cross-script
    /// gotos regardless of the reset policy.
    fn reset_on_goto(&self) -> bool {
        true
    }
}

/// Built-in string-valued variable store; doubles as the default
/// expression evaluator (`{name}` lookup, `name=value` assignment).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableStore {
    vars: BTreeMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

impl ExpressionEvaluator for VariableStore {
    fn evaluate(&mut self, body: &str, spot: &PlaybackSpot) -> Result<String, ExecutionError> {
        let name = body.trim();
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| ExecutionError::Expression {
                body: body.to_string(),
                spot: spot.clone(),
                message: format!("variable '{name}' is not defined"),
            })
    }

    fn assign(&mut self, expression: &str, spot: &PlaybackSpot) -> Result<(), ExecutionError> {
        match expression.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                self.vars
                    .insert(name.trim().to_string(), value.trim().to_string());
                Ok(())
            }
            _ => Err(ExecutionError::Expression {
                body: expression.to_string(),
                spot: spot.clone(),
                message: "expected 'name=value'".into(),
            }),
        }
    }
}

impl GameService for VariableStore {
    fn name(&self) -> &'static str {
        "variables"
    }

    fn serialize_state(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn check_state(&self, state: &serde_json::Value) -> Result<(), serde_json::Error> {
        serde_json::from_value::<Self>(state.clone()).map(|_| ())
    }

    fn restore_state(&mut self, state: &serde_json::Value) -> Result<(), serde_json::Error> {
        *self = serde_json::from_value(state.clone())?;
        Ok(())
    }

    fn reset_state(&mut self) {
        self.vars.clear();
    }

    // Variables survive navigation.
    fn reset_on_goto(&self) -> bool {
        false
    }
}

/// What the text printer currently shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterState {
    pub author: Option<String>,
    pub appearance: Option<String>,
    pub text: String,
}

impl PrinterState {
    pub fn print(&mut self, author: Option<&str>, text: &str, reset: bool) {
        if reset {
            self.text.clear();
        }
        self.author = author.map(str::to_string);
        self.text.push_str(text);
    }
}

impl GameService for PrinterState {
    fn name(&self) -> &'static str {
        "printer"
    }

    fn serialize_state(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn check_state(&self, state: &serde_json::Value) -> Result<(), serde_json::Error> {
        serde_json::from_value::<Self>(state.clone()).map(|_| ())
    }

    fn restore_state(&mut self, state: &serde_json::Value) -> Result<(), serde_json::Error> {
        *self = serde_json::from_value(state.clone())?;
        Ok(())
    }

    fn reset_state(&mut self) {
        *self = Self::default();
    }
}

/// Currently playing audio tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioState {
    pub bgm_path: Option<String>,
    pub bgm_volume: f32,
    pub bgm_looped: bool,
}

impl GameService for AudioState {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn serialize_state(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn check_state(&self, state: &serde_json::Value) -> Result<(), serde_json::Error> {
        serde_json::from_value::<Self>(state.clone()).map(|_| ())
    }

    fn restore_state(&mut self, state: &serde_json::Value) -> Result<(), serde_json::Error> {
        *self = serde_json::from_value(state.clone())?;
        Ok(())
    }

    fn reset_state(&mut self) {
        *self = Self::default();
    }
}
