//! Host-facing side effects produced while stepping playback.

/// One renderable effect. The player appends these to the execution
/// context's output buffer; the host drains the buffer after each step
/// and renders however it likes.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Reveal text on the message printer. `reset` distinguishes the
    /// first chunk of a line from appended continuation chunks.
    Print {
        author: Option<String>,
        text: String,
        reset: bool,
    },
    /// Change an actor's appearance without printing anything.
    SetAppearance { actor: String, appearance: String },
    PlayMusic {
        path: String,
        volume: f32,
        looped: bool,
    },
    PlaySound { path: String, volume: f32 },
    ShowBackground {
        id: String,
        appearance: Option<String>,
    },
    ShowCharacter {
        id: String,
        appearance: Option<String>,
    },
    HideActor { id: String },
    /// The movie blocks playback until the host signals completion via
    /// `continue_input`, even in skip mode.
    PlayMovie { path: String },
}
