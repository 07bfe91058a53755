//! Cursor state and the DECSC/DECRC snapshot.

use crate::cell::GraphicsAttributes;
use crate::charsets::CharsetState;
use crate::coords::{CellLocation, PageSize};

/// The writing cursor.
///
/// `position` is stored in real (margin-independent) main-page coordinates;
/// origin-mode translation happens at the screen boundary. `pending_wrap` is
/// the one-column-over-margin latch: the cursor visually sits on the right
/// margin but the next printable starts a new line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub position: CellLocation,
    pub pending_wrap: bool,
    pub visible: bool,
    /// Rendition stamped on subsequently written cells.
    pub attrs: GraphicsAttributes,
    /// G0..G3 designations and shift state.
    pub charsets: CharsetState,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            position: CellLocation::default(),
            pending_wrap: false,
            visible: true,
            attrs: GraphicsAttributes::default(),
            charsets: CharsetState::default(),
        }
    }
}

impl Cursor {
    /// Clamp into the page and drop any pending wrap.
    pub fn clamp_to(&mut self, size: PageSize) {
        self.position = self.position.clamped_to(size);
        self.pending_wrap = false;
    }
}

/// Snapshot captured by DECSC (and by DECSET 1048/1049).
///
/// Autowrap and origin mode live in the mode set but travel with the cursor
/// snapshot, per DEC: DECRC re-applies both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SavedCursor {
    pub position: CellLocation,
    pub attrs: GraphicsAttributes,
    pub charsets: CharsetState,
    pub autowrap: bool,
    pub origin: bool,
}

impl SavedCursor {
    /// Capture the current cursor plus the mode bits DECRC restores.
    #[must_use]
    pub fn capture(cursor: &Cursor, autowrap: bool, origin: bool) -> Self {
        Self {
            position: cursor.position,
            attrs: cursor.attrs,
            charsets: cursor.charsets,
            autowrap,
            origin,
        }
    }

    /// Restore into `cursor`. DECRC always clears the wrap latch.
    pub fn restore_into(&self, cursor: &mut Cursor, size: PageSize) {
        cursor.position = self.position.clamped_to(size);
        cursor.attrs = self.attrs;
        cursor.charsets = self.charsets;
        cursor.pending_wrap = false;
    }
}
