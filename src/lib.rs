//! # kataribe
//!
//! A narrative-script playback engine: it parses line-oriented scripts
//! (`@command` lines, `#label` lines, and generic dialogue with inline
//! commands), binds them into executable playlists, and plays them
//! step by step with skip/auto-play, gosub/return, cross-script
//! navigation, bounded rollback, hot reload, and JSON saves.
//!
//! The engine is synchronous and render-agnostic: hosts drive it with
//! input and ticks, and drain [`Directive`]s to render however they like.
//! Script and resource I/O sit behind the async traits in [`loader`].
//!
//! ## Quick start
//!
//! ```rust
//! use kataribe::{Engine, EngineConfig, EngineStep};
//!
//! # fn main() -> Result<(), kataribe::EngineError> {
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.load_script("Main", "Yui: Hello, world!");
//!
//! let step = engine.play("Main")?;
//! assert_eq!(step, EngineStep::WaitingForInput);
//! assert_eq!(engine.printer().text, "Hello, world!");
//!
//! // Reader input moves to the next line (here: end of script).
//! assert_eq!(engine.continue_input()?, EngineStep::Halted);
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod loader;
pub mod parsing;
pub mod player;
pub mod playlist;
pub mod script;
pub mod state;
pub mod storage;

pub use commands::registry::{CommandRegistry, CommandSpec, FieldKind, FieldSpec};
pub use commands::{Command, CommandKind, ExpressionEvaluator, ParamValue, PlaybackSpot};
pub use engine::{Engine, EngineConfig, EngineStep};
pub use error::{Diagnostic, Diagnostics, EngineError, NavigationError};
pub use player::{Directive, Player, PlayerState};
pub use playlist::Playlist;
pub use script::Script;
pub use state::{GameService, PrinterState, Snapshot, VariableStore};
pub use storage::SaveData;
