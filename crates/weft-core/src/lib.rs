#![forbid(unsafe_code)]

//! Host-agnostic VT/ANSI terminal screen engine.
//!
//! `weft-core` is a byte-in/paint-out state machine: feed it the output of a
//! child process and it maintains the logical screen — a grid of grapheme
//! cells, cursor state, scrollback history, and the mode flags a renderer
//! needs. Everything host-facing (replies to the PTY, title changes, mouse
//! protocol selection, repaint hints) leaves through the [`EventHandler`]
//! trait.
//!
//! # Architecture
//!
//! - **[`Parser`]**: the classic DEC ANSI state machine, bytes → events.
//! - **[`Sequencer`]**: events → typed screen operations (all parameter
//!   decoding, including SGR and OSC payloads).
//! - **[`Screen`]**: operation semantics over [`Grid`], [`Cursor`],
//!   [`Modes`], [`Margins`]; the only type hosts normally touch.
//! - **[`Grid`]**: main page as a ring of [`Line`]s plus the bounded
//!   [`History`] ring, with reflow-on-resize on the primary buffer.
//!
//! # Design principles
//!
//! - **No I/O**: pure data + logic; the host adapter supplies bytes and
//!   consumes callbacks.
//! - **Deterministic**: identical byte sequences always produce identical
//!   state.
//! - **Unkillable**: malformed input is clamped, substituted or discarded;
//!   nothing the PTY sends can panic the engine.

pub mod cell;
pub mod charsets;
pub mod coords;
pub mod cursor;
pub mod events;
pub mod grid;
pub mod history;
pub mod line;
pub mod margins;
pub mod modes;
pub mod parser;
pub mod reply;
pub mod screen;
pub mod selection;
pub mod sequencer;
pub mod tabs;

pub use cell::{Cell, CellFlags, Color, GraphicsAttributes, HyperlinkId, HyperlinkStore};
pub use charsets::{Charset, CharsetState};
pub use coords::{CellLocation, ColumnOffset, LineOffset, PageSize};
pub use cursor::{Cursor, SavedCursor};
pub use events::{
    CursorDisplay, CursorShape, EventHandler, MouseProtocol, MouseTransport, MouseWheelMode,
    NullHandler, ScreenBuffer,
};
pub use grid::Grid;
pub use history::History;
pub use line::{Line, LineFlags};
pub use margins::{MarginRange, Margins};
pub use modes::{AnsiMode, DecMode, ModeStatus, Modes};
pub use parser::{Event, Params, Parser};
pub use screen::{default_palette, Screen, ScreenConfig};
pub use selection::{BufferPosition, Selection, SelectionMode};
pub use sequencer::Sequencer;
pub use tabs::TabStops;
