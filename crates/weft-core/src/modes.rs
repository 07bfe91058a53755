//! ANSI and DEC private modes, with the XTSAVE/XTRESTORE stacks.
//!
//! Modes are pure state; the side effects of toggling one (resize on DECCOLM,
//! buffer switch on 1049, ...) live in the screen. Unknown mode numbers are
//! remembered so DECRQM can answer `NotRecognized` and diagnostics can name
//! them.

use std::collections::{HashMap, HashSet};

/// ANSI (non-private) modes, `CSI Pm h` / `CSI Pm l`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnsiMode {
    /// KAM: lock the keyboard (host stops accepting input).
    KeyboardAction,
    /// IRM: printable writes shift existing cells right instead of
    /// overwriting.
    Insert,
    /// LNM: linefeed implies carriage return.
    AutomaticNewLine,
}

impl AnsiMode {
    /// Decode a mode parameter.
    #[must_use]
    pub fn from_number(number: u16) -> Option<Self> {
        match number {
            2 => Some(AnsiMode::KeyboardAction),
            4 => Some(AnsiMode::Insert),
            20 => Some(AnsiMode::AutomaticNewLine),
            _ => None,
        }
    }

    /// The wire number of this mode.
    #[must_use]
    pub fn number(self) -> u16 {
        match self {
            AnsiMode::KeyboardAction => 2,
            AnsiMode::Insert => 4,
            AnsiMode::AutomaticNewLine => 20,
        }
    }
}

/// DEC private modes, `CSI ? Pm h` / `CSI ? Pm l`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecMode {
    /// DECCKM: application cursor keys.
    ApplicationCursorKeys,
    /// DECCOLM: 132-column mode.
    Columns132,
    /// DECOM: cursor addressing relative to the margins.
    Origin,
    /// DECAWM: wrap at the right margin.
    AutoWrap,
    /// X10 mouse reporting.
    MouseX10,
    /// Blinking cursor display.
    BlinkingCursor,
    /// DECTCEM: cursor visibility.
    VisibleCursor,
    /// Permit DECCOLM to switch between 80 and 132 columns.
    AllowColumns80to132,
    /// Legacy alternate screen (no cursor save).
    UseAlternateScreen,
    /// DECLRMM: enable DECSLRM horizontal margins.
    LeftRightMargin,
    /// Sixel output scrolls the page instead of overwriting.
    SixelScrolling,
    /// VT200 normal mouse tracking.
    MouseNormalTracking,
    /// VT200 highlight mouse tracking.
    MouseHighlightTracking,
    /// Button-event (drag) mouse tracking.
    MouseButtonTracking,
    /// Any-event mouse tracking.
    MouseAnyEventTracking,
    /// Focus-in/focus-out reporting.
    FocusTracking,
    /// UTF-8 extended mouse coordinates.
    MouseExtended,
    /// SGR mouse coordinates.
    MouseSgr,
    /// Alternate scroll: wheel sends cursor keys on the alternate screen.
    MouseAlternateScroll,
    /// urxvt mouse coordinates.
    MouseUrxvt,
    /// Alternate screen, cleared on activation (xterm 1047).
    AlternateScreenClear,
    /// Save/restore cursor as a mode (xterm 1048).
    SaveCursor,
    /// Save cursor + switch to a cleared alternate screen (xterm 1049).
    ExtendedAltScreen,
    /// Bracketed paste markers.
    BracketedPaste,
    /// Synchronized output batching.
    BatchedRendering,
    /// Reflow lines on resize.
    TextReflow,
    /// Private sixel color registers per image.
    PrivateColorRegisters,
    /// Keyboard application keypad (DECNKM).
    NumericKeypad,
}

impl DecMode {
    /// Decode a private mode parameter.
    #[must_use]
    pub fn from_number(number: u16) -> Option<Self> {
        match number {
            1 => Some(DecMode::ApplicationCursorKeys),
            3 => Some(DecMode::Columns132),
            6 => Some(DecMode::Origin),
            7 => Some(DecMode::AutoWrap),
            9 => Some(DecMode::MouseX10),
            12 => Some(DecMode::BlinkingCursor),
            25 => Some(DecMode::VisibleCursor),
            40 => Some(DecMode::AllowColumns80to132),
            47 => Some(DecMode::UseAlternateScreen),
            66 => Some(DecMode::NumericKeypad),
            69 => Some(DecMode::LeftRightMargin),
            80 => Some(DecMode::SixelScrolling),
            1000 => Some(DecMode::MouseNormalTracking),
            1001 => Some(DecMode::MouseHighlightTracking),
            1002 => Some(DecMode::MouseButtonTracking),
            1003 => Some(DecMode::MouseAnyEventTracking),
            1004 => Some(DecMode::FocusTracking),
            1005 => Some(DecMode::MouseExtended),
            1006 => Some(DecMode::MouseSgr),
            1007 => Some(DecMode::MouseAlternateScroll),
            1015 => Some(DecMode::MouseUrxvt),
            1047 => Some(DecMode::AlternateScreenClear),
            1048 => Some(DecMode::SaveCursor),
            1049 => Some(DecMode::ExtendedAltScreen),
            1070 => Some(DecMode::PrivateColorRegisters),
            2004 => Some(DecMode::BracketedPaste),
            2026 => Some(DecMode::BatchedRendering),
            2028 => Some(DecMode::TextReflow),
            _ => None,
        }
    }

    /// The wire number of this mode.
    #[must_use]
    pub fn number(self) -> u16 {
        match self {
            DecMode::ApplicationCursorKeys => 1,
            DecMode::Columns132 => 3,
            DecMode::Origin => 6,
            DecMode::AutoWrap => 7,
            DecMode::MouseX10 => 9,
            DecMode::BlinkingCursor => 12,
            DecMode::VisibleCursor => 25,
            DecMode::AllowColumns80to132 => 40,
            DecMode::UseAlternateScreen => 47,
            DecMode::NumericKeypad => 66,
            DecMode::LeftRightMargin => 69,
            DecMode::SixelScrolling => 80,
            DecMode::MouseNormalTracking => 1000,
            DecMode::MouseHighlightTracking => 1001,
            DecMode::MouseButtonTracking => 1002,
            DecMode::MouseAnyEventTracking => 1003,
            DecMode::FocusTracking => 1004,
            DecMode::MouseExtended => 1005,
            DecMode::MouseSgr => 1006,
            DecMode::MouseAlternateScroll => 1007,
            DecMode::MouseUrxvt => 1015,
            DecMode::AlternateScreenClear => 1047,
            DecMode::SaveCursor => 1048,
            DecMode::ExtendedAltScreen => 1049,
            DecMode::PrivateColorRegisters => 1070,
            DecMode::BracketedPaste => 2004,
            DecMode::BatchedRendering => 2026,
            DecMode::TextReflow => 2028,
        }
    }
}

/// DECRQM answer values (`CSI Pn ; Ps $ y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeStatus {
    NotRecognized = 0,
    Set = 1,
    Reset = 2,
    PermanentlySet = 3,
    PermanentlyReset = 4,
}

/// The engine's mode state.
#[derive(Debug, Clone, Default)]
pub struct Modes {
    ansi: HashSet<AnsiMode>,
    dec: HashSet<DecMode>,
    /// XTSAVE stacks, one per DEC mode.
    saved: HashMap<DecMode, Vec<bool>>,
    /// Unknown mode numbers a client tried to toggle or query.
    unrecognized: HashSet<u16>,
}

impl Modes {
    /// Default mode state (xterm startup defaults).
    #[must_use]
    pub fn new() -> Self {
        let mut modes = Self::default();
        modes.set_dec(DecMode::AutoWrap, true);
        modes.set_dec(DecMode::VisibleCursor, true);
        modes.set_dec(DecMode::SixelScrolling, true);
        modes.set_dec(DecMode::TextReflow, true);
        modes
    }

    /// Set or reset an ANSI mode.
    pub fn set_ansi(&mut self, mode: AnsiMode, enable: bool) {
        if enable {
            self.ansi.insert(mode);
        } else {
            self.ansi.remove(&mode);
        }
    }

    /// Whether an ANSI mode is set.
    #[must_use]
    pub fn ansi(&self, mode: AnsiMode) -> bool {
        self.ansi.contains(&mode)
    }

    /// Set or reset a DEC private mode.
    pub fn set_dec(&mut self, mode: DecMode, enable: bool) {
        if enable {
            self.dec.insert(mode);
        } else {
            self.dec.remove(&mode);
        }
    }

    /// Whether a DEC mode is set.
    #[must_use]
    pub fn dec(&self, mode: DecMode) -> bool {
        self.dec.contains(&mode)
    }

    /// XTSAVE: push the current value of a mode on its stack.
    pub fn save_dec(&mut self, mode: DecMode) {
        let value = self.dec(mode);
        self.saved.entry(mode).or_default().push(value);
    }

    /// XTRESTORE: pop the saved value. With an empty stack the current value
    /// is kept (xterm behavior).
    pub fn restore_dec(&mut self, mode: DecMode) -> Option<bool> {
        let value = self.saved.get_mut(&mode).and_then(Vec::pop);
        if let Some(v) = value {
            self.set_dec(mode, v);
        }
        value
    }

    /// Remember an unknown mode number for diagnostics.
    pub fn note_unrecognized(&mut self, number: u16) {
        self.unrecognized.insert(number);
    }

    /// Unknown mode numbers seen so far.
    #[must_use]
    pub fn unrecognized(&self) -> &HashSet<u16> {
        &self.unrecognized
    }

    /// DECRQM status for a DEC mode number.
    #[must_use]
    pub fn dec_status(&self, number: u16) -> ModeStatus {
        match DecMode::from_number(number) {
            Some(mode) if self.dec(mode) => ModeStatus::Set,
            Some(_) => ModeStatus::Reset,
            None => ModeStatus::NotRecognized,
        }
    }

    /// DECRQM status for an ANSI mode number.
    #[must_use]
    pub fn ansi_status(&self, number: u16) -> ModeStatus {
        match AnsiMode::from_number(number) {
            Some(mode) if self.ansi(mode) => ModeStatus::Set,
            Some(_) => ModeStatus::Reset,
            None => ModeStatus::NotRecognized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_xterm() {
        let m = Modes::new();
        assert!(m.dec(DecMode::AutoWrap));
        assert!(m.dec(DecMode::VisibleCursor));
        assert!(!m.dec(DecMode::Origin));
        assert!(!m.ansi(AnsiMode::Insert));
    }

    #[test]
    fn set_twice_is_idempotent() {
        let mut m = Modes::new();
        m.set_dec(DecMode::Origin, true);
        m.set_dec(DecMode::Origin, true);
        assert!(m.dec(DecMode::Origin));
        m.set_dec(DecMode::Origin, false);
        m.set_dec(DecMode::Origin, false);
        assert!(!m.dec(DecMode::Origin));
    }

    #[test]
    fn save_restore_stack_nests() {
        let mut m = Modes::new();
        m.set_dec(DecMode::Origin, true);
        m.save_dec(DecMode::Origin);
        m.set_dec(DecMode::Origin, false);
        m.save_dec(DecMode::Origin);
        m.set_dec(DecMode::Origin, true);

        assert_eq!(m.restore_dec(DecMode::Origin), Some(false));
        assert!(!m.dec(DecMode::Origin));
        assert_eq!(m.restore_dec(DecMode::Origin), Some(true));
        assert!(m.dec(DecMode::Origin));
        // Empty stack keeps the current value.
        assert_eq!(m.restore_dec(DecMode::Origin), None);
        assert!(m.dec(DecMode::Origin));
    }

    #[test]
    fn status_reporting() {
        let mut m = Modes::new();
        assert_eq!(m.dec_status(7), ModeStatus::Set);
        assert_eq!(m.dec_status(6), ModeStatus::Reset);
        assert_eq!(m.dec_status(31337), ModeStatus::NotRecognized);
        m.set_ansi(AnsiMode::Insert, true);
        assert_eq!(m.ansi_status(4), ModeStatus::Set);
        assert_eq!(m.ansi_status(20), ModeStatus::Reset);
        assert_eq!(m.ansi_status(99), ModeStatus::NotRecognized);
    }

    #[test]
    fn mode_numbers_round_trip() {
        for number in [1, 3, 6, 7, 25, 47, 69, 1000, 1006, 1049, 2004, 2026, 2028] {
            let mode = DecMode::from_number(number).unwrap();
            assert_eq!(mode.number(), number);
        }
    }
}
