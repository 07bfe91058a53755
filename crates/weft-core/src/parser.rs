//! VT/ANSI byte-stream parser.
//!
//! A deterministic state machine in the shape of the classic DEC ANSI
//! parser: fourteen states covering escape, CSI, OSC, DCS and SOS/PM/APC
//! recognition, plus UTF-8 assembly in ground. The parser knows nothing
//! about what sequences *mean*; it emits [`Event`]s that the sequencer
//! translates into screen operations.
//!
//! Guarantees:
//!
//! - never panics, for any byte stream;
//! - malformed sequences fall back to ground with the offending bytes
//!   discarded;
//! - malformed UTF-8 prints U+FFFD and resynchronizes on the next byte;
//! - OSC/DCS/SOS payloads are capped; overflow truncates, marks the event
//!   `partial`, and still dispatches.

use smallvec::SmallVec;

/// Default ceiling for OSC / DCS / SOS-PM-APC payloads.
pub const DEFAULT_MAX_STRING_LEN: usize = 16 * 1024;

/// Hard cap on CSI/DCS parameter groups; further parameters send the
/// sequence to the ignore state.
const MAX_PARAM_GROUPS: usize = 32;

/// Collected intermediate bytes (0x20..=0x2F). Two suffice for every real
/// sequence; extras overflow to the ignore state.
pub type Intermediates = SmallVec<[u8; 2]>;

/// One `;`-separated parameter: a list of `:`-separated subparameters.
pub type Subparams = SmallVec<[u16; 4]>;

/// CSI/DCS parameter list.
///
/// `CSI 38:2::10:20:30 ; 1 m` parses as two groups, the first holding six
/// subparameters. Missing values read as 0; callers apply per-opcode
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    groups: SmallVec<[Subparams; 8]>,
}

impl Params {
    /// Number of parameter groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no parameters were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// First subparameter of group `index`, or 0.
    #[must_use]
    pub fn get(&self, index: usize) -> u16 {
        self.groups
            .get(index)
            .and_then(|g| g.first())
            .copied()
            .unwrap_or(0)
    }

    /// Like [`Self::get`] but substituting `default` for missing/zero values.
    #[must_use]
    pub fn get_or(&self, index: usize, default: u16) -> u16 {
        match self.get(index) {
            0 => default,
            value => value,
        }
    }

    /// All subparameters of group `index`.
    #[must_use]
    pub fn subparams(&self, index: usize) -> &[u16] {
        self.groups.get(index).map_or(&[], |g| g.as_slice())
    }

    /// Iterate over the groups.
    pub fn iter(&self) -> impl Iterator<Item = &Subparams> {
        self.groups.iter()
    }

    fn clear(&mut self) {
        self.groups.clear();
    }

    /// Room for another group?
    fn saturated(&self) -> bool {
        self.groups.len() >= MAX_PARAM_GROUPS
    }

    fn ensure_group(&mut self) {
        if self.groups.is_empty() {
            self.groups.push(Subparams::new());
        }
    }

    fn push_digit(&mut self, digit: u8) {
        self.ensure_group();
        let group = self.groups.last_mut().expect("group ensured");
        if group.is_empty() {
            group.push(0);
        }
        let slot = group.last_mut().expect("subparam ensured");
        *slot = slot
            .saturating_mul(10)
            .saturating_add(u16::from(digit));
    }

    fn next_group(&mut self) {
        self.ensure_group();
        self.groups.push(Subparams::new());
    }

    fn next_subparam(&mut self) {
        self.ensure_group();
        let group = self.groups.last_mut().expect("group ensured");
        if group.is_empty() {
            group.push(0);
        }
        group.push(0);
    }
}

/// Which control-string introducer opened a SOS/PM/APC payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    Sos,
    Pm,
    Apc,
}

/// Parser output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A printable codepoint reached ground.
    Print(char),
    /// A C0 control to execute (BEL, BS, HT, LF, CR, SO, SI, ...).
    Execute(u8),
    /// A completed non-CSI escape sequence (`ESC intermediates* final`).
    Esc {
        intermediates: Intermediates,
        byte: u8,
    },
    /// A completed CSI sequence.
    Csi {
        params: Params,
        intermediates: Intermediates,
        /// Leading private marker in 0x3C..=0x3F (`?`, `>`, `<`, `=`).
        private_marker: Option<u8>,
        final_byte: u8,
    },
    /// A completed OSC string (terminator excluded).
    Osc {
        data: Vec<u8>,
        /// Payload hit the configured ceiling and was truncated.
        partial: bool,
    },
    /// A DCS sequence header was recognized; puts follow until unhook.
    DcsHook {
        params: Params,
        intermediates: Intermediates,
        private_marker: Option<u8>,
        final_byte: u8,
    },
    /// One DCS passthrough byte.
    DcsPut(u8),
    /// DCS terminated.
    DcsUnhook {
        /// Passthrough bytes past the ceiling were dropped.
        partial: bool,
    },
    /// A completed SOS/PM/APC string.
    SosPmApc {
        kind: StringKind,
        data: Vec<u8>,
        partial: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    DcsEntry,
    DcsParam,
    DcsIntermediate,
    DcsPassthrough,
    DcsIgnore,
    OscString,
    SosPmApcString,
    /// Assembling a multi-byte UTF-8 scalar; counts continuation bytes left.
    Utf8 { remaining: u8 },
}

/// The parser state machine.
#[derive(Debug, Clone)]
pub struct Parser {
    state: State,
    params: Params,
    intermediates: Intermediates,
    private_marker: Option<u8>,
    /// Too many intermediates/params: finish the sequence but drop it.
    ignoring: bool,
    string_data: Vec<u8>,
    string_kind: StringKind,
    string_truncated: bool,
    dcs_put_count: usize,
    dcs_hooked: bool,
    max_string_len: usize,
    utf8_buf: [u8; 4],
    utf8_len: u8,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// A parser in ground state with the default string-payload ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_string_len(DEFAULT_MAX_STRING_LEN)
    }

    /// A parser with an explicit OSC/DCS payload ceiling.
    #[must_use]
    pub fn with_max_string_len(max_string_len: usize) -> Self {
        Self {
            state: State::Ground,
            params: Params::default(),
            intermediates: Intermediates::new(),
            private_marker: None,
            ignoring: false,
            string_data: Vec::new(),
            string_kind: StringKind::Apc,
            string_truncated: false,
            dcs_put_count: 0,
            dcs_hooked: false,
            max_string_len,
            utf8_buf: [0; 4],
            utf8_len: 0,
        }
    }

    /// Feed a chunk of bytes, appending events to `out`.
    ///
    /// Callers on hot paths reuse `out` across chunks (clear, keep capacity).
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<Event>) {
        for &byte in bytes {
            self.advance(byte, out);
        }
    }

    /// Feed already-decoded codepoints (host-side UTF-8 decode).
    pub fn feed_chars(&mut self, text: &str, out: &mut Vec<Event>) {
        for ch in text.chars() {
            if ch.is_ascii() {
                self.advance(ch as u8, out);
            } else if self.state == State::Ground {
                out.push(Event::Print(ch));
            } else {
                let mut buf = [0u8; 4];
                for &b in ch.encode_utf8(&mut buf).as_bytes() {
                    self.advance(b, out);
                }
            }
        }
    }

    /// Advance by one byte.
    pub fn advance(&mut self, byte: u8, out: &mut Vec<Event>) {
        // CAN and SUB abort any sequence from any state.
        if byte == 0x18 || byte == 0x1A {
            self.abort_to_ground(out);
            out.push(Event::Execute(byte));
            return;
        }
        // ESC restarts sequence recognition from any state, first flushing a
        // string payload in flight (ESC is usually the start of ST).
        if byte == 0x1B && !matches!(self.state, State::Utf8 { .. }) {
            self.flush_string_on_exit(out);
            self.enter_escape();
            return;
        }

        match self.state {
            State::Ground => self.advance_ground(byte, out),
            State::Escape => self.advance_escape(byte, out),
            State::EscapeIntermediate => self.advance_escape_intermediate(byte, out),
            State::CsiEntry | State::CsiParam | State::CsiIntermediate => {
                self.advance_csi(byte, out);
            }
            State::CsiIgnore => self.advance_csi_ignore(byte, out),
            State::DcsEntry | State::DcsParam | State::DcsIntermediate => {
                self.advance_dcs_header(byte, out);
            }
            State::DcsPassthrough => self.advance_dcs_passthrough(byte, out),
            State::DcsIgnore => {
                if byte == 0x9C {
                    self.state = State::Ground;
                }
            }
            State::OscString => self.advance_osc(byte, out),
            State::SosPmApcString => self.advance_sos_pm_apc(byte, out),
            State::Utf8 { remaining } => self.advance_utf8(byte, remaining, out),
        }
    }

    // ── Ground ──────────────────────────────────────────────────────

    fn advance_ground(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => out.push(Event::Execute(byte)),
            0x20..=0x7E => out.push(Event::Print(byte as char)),
            0x7F => {} // DEL is ignored
            0xC2..=0xDF => self.start_utf8(byte, 1),
            0xE0..=0xEF => self.start_utf8(byte, 2),
            0xF0..=0xF4 => self.start_utf8(byte, 3),
            // Stray continuation bytes, overlong leads, and out-of-range
            // leads are each one replacement character.
            _ => out.push(Event::Print(char::REPLACEMENT_CHARACTER)),
        }
    }

    fn start_utf8(&mut self, byte: u8, continuations: u8) {
        self.utf8_buf[0] = byte;
        self.utf8_len = 1;
        self.state = State::Utf8 {
            remaining: continuations,
        };
    }

    fn advance_utf8(&mut self, byte: u8, remaining: u8, out: &mut Vec<Event>) {
        if !(0x80..=0xBF).contains(&byte) {
            // Broken sequence: substitute and reprocess this byte in ground.
            self.state = State::Ground;
            self.utf8_len = 0;
            out.push(Event::Print(char::REPLACEMENT_CHARACTER));
            self.advance(byte, out);
            return;
        }
        let idx = usize::from(self.utf8_len);
        if idx < 4 {
            self.utf8_buf[idx] = byte;
            self.utf8_len += 1;
        }
        if remaining > 1 {
            self.state = State::Utf8 {
                remaining: remaining - 1,
            };
            return;
        }
        self.state = State::Ground;
        let len = usize::from(self.utf8_len);
        self.utf8_len = 0;
        match core::str::from_utf8(&self.utf8_buf[..len]) {
            Ok(s) => {
                if let Some(ch) = s.chars().next() {
                    out.push(Event::Print(ch));
                }
            }
            // Surrogate/overlong encodings decode to the replacement char.
            Err(_) => out.push(Event::Print(char::REPLACEMENT_CHARACTER)),
        }
    }

    // ── Escape ──────────────────────────────────────────────────────

    fn enter_escape(&mut self) {
        self.state = State::Escape;
        self.intermediates.clear();
        self.params.clear();
        self.private_marker = None;
        self.ignoring = false;
    }

    fn advance_escape(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => out.push(Event::Execute(byte)),
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = State::EscapeIntermediate;
            }
            b'[' => self.enter_csi(),
            b']' => self.enter_string(StringKind::Apc, State::OscString),
            b'P' => self.enter_dcs(),
            b'X' => self.enter_string(StringKind::Sos, State::SosPmApcString),
            b'^' => self.enter_string(StringKind::Pm, State::SosPmApcString),
            b'_' => self.enter_string(StringKind::Apc, State::SosPmApcString),
            0x30..=0x7E => {
                self.state = State::Ground;
                out.push(Event::Esc {
                    intermediates: core::mem::take(&mut self.intermediates),
                    byte,
                });
            }
            _ => {
                // DEL and 8-bit garbage after ESC: drop the sequence.
                self.state = State::Ground;
            }
        }
    }

    fn advance_escape_intermediate(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => out.push(Event::Execute(byte)),
            0x20..=0x2F => {
                if self.intermediates.len() < 2 {
                    self.intermediates.push(byte);
                } else {
                    self.ignoring = true;
                }
            }
            0x30..=0x7E => {
                self.state = State::Ground;
                if !self.ignoring {
                    out.push(Event::Esc {
                        intermediates: core::mem::take(&mut self.intermediates),
                        byte,
                    });
                }
            }
            _ => self.state = State::Ground,
        }
    }

    // ── CSI ─────────────────────────────────────────────────────────

    fn enter_csi(&mut self) {
        self.state = State::CsiEntry;
        self.params.clear();
        self.intermediates.clear();
        self.private_marker = None;
        self.ignoring = false;
    }

    fn advance_csi(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => out.push(Event::Execute(byte)),
            0x30..=0x39 => {
                if self.state == State::CsiIntermediate {
                    // Parameters after intermediates are malformed.
                    self.state = State::CsiIgnore;
                    return;
                }
                self.params.push_digit(byte - b'0');
                self.state = State::CsiParam;
            }
            b';' => {
                if self.state == State::CsiIntermediate || self.params.saturated() {
                    self.state = State::CsiIgnore;
                    return;
                }
                self.params.next_group();
                self.state = State::CsiParam;
            }
            b':' => {
                if self.state == State::CsiIntermediate {
                    self.state = State::CsiIgnore;
                    return;
                }
                self.params.next_subparam();
                self.state = State::CsiParam;
            }
            0x3C..=0x3F => {
                // Private marker only as the very first parameter byte.
                if self.state == State::CsiEntry {
                    self.private_marker = Some(byte);
                    self.state = State::CsiParam;
                } else {
                    self.state = State::CsiIgnore;
                }
            }
            0x20..=0x2F => {
                if self.intermediates.len() < 2 {
                    self.intermediates.push(byte);
                } else {
                    self.ignoring = true;
                }
                self.state = State::CsiIntermediate;
            }
            0x40..=0x7E => {
                self.state = State::Ground;
                if !self.ignoring {
                    out.push(Event::Csi {
                        params: core::mem::take(&mut self.params),
                        intermediates: core::mem::take(&mut self.intermediates),
                        private_marker: self.private_marker.take(),
                        final_byte: byte,
                    });
                }
            }
            _ => {} // DEL ignored
        }
    }

    fn advance_csi_ignore(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => out.push(Event::Execute(byte)),
            0x40..=0x7E => self.state = State::Ground,
            _ => {}
        }
    }

    // ── DCS ─────────────────────────────────────────────────────────

    fn enter_dcs(&mut self) {
        self.state = State::DcsEntry;
        self.params.clear();
        self.intermediates.clear();
        self.private_marker = None;
        self.ignoring = false;
        self.dcs_put_count = 0;
        self.string_truncated = false;
        self.dcs_hooked = false;
    }

    fn advance_dcs_header(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => {} // ignored inside DCS header
            0x30..=0x39 => {
                if self.state == State::DcsIntermediate {
                    self.state = State::DcsIgnore;
                    return;
                }
                self.params.push_digit(byte - b'0');
                self.state = State::DcsParam;
            }
            b';' => {
                if self.state == State::DcsIntermediate || self.params.saturated() {
                    self.state = State::DcsIgnore;
                    return;
                }
                self.params.next_group();
                self.state = State::DcsParam;
            }
            b':' => {
                if self.state == State::DcsIntermediate {
                    self.state = State::DcsIgnore;
                    return;
                }
                self.params.next_subparam();
                self.state = State::DcsParam;
            }
            0x3C..=0x3F => {
                if self.state == State::DcsEntry {
                    self.private_marker = Some(byte);
                    self.state = State::DcsParam;
                } else {
                    self.state = State::DcsIgnore;
                }
            }
            0x20..=0x2F => {
                if self.intermediates.len() < 2 {
                    self.intermediates.push(byte);
                } else {
                    self.ignoring = true;
                }
                self.state = State::DcsIntermediate;
            }
            0x40..=0x7E => {
                if self.ignoring {
                    self.state = State::DcsIgnore;
                } else {
                    self.state = State::DcsPassthrough;
                    self.dcs_hooked = true;
                    out.push(Event::DcsHook {
                        params: core::mem::take(&mut self.params),
                        intermediates: core::mem::take(&mut self.intermediates),
                        private_marker: self.private_marker.take(),
                        final_byte: byte,
                    });
                }
            }
            _ => {}
        }
    }

    fn advance_dcs_passthrough(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            0x9C => {
                self.dcs_hooked = false;
                self.state = State::Ground;
                out.push(Event::DcsUnhook {
                    partial: self.string_truncated,
                });
            }
            0x7F => {}
            _ => {
                if self.dcs_put_count < self.max_string_len {
                    self.dcs_put_count += 1;
                    out.push(Event::DcsPut(byte));
                } else {
                    self.string_truncated = true;
                }
            }
        }
    }

    // ── OSC / SOS / PM / APC ────────────────────────────────────────

    fn enter_string(&mut self, kind: StringKind, state: State) {
        self.state = state;
        self.string_kind = kind;
        self.string_data.clear();
        self.string_truncated = false;
    }

    fn advance_osc(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            0x07 | 0x9C => self.dispatch_osc(out),
            0x00..=0x06 | 0x08..=0x17 | 0x19 | 0x1C..=0x1F => {} // controls ignored
            _ => self.push_string_byte(byte),
        }
    }

    fn advance_sos_pm_apc(&mut self, byte: u8, out: &mut Vec<Event>) {
        match byte {
            0x9C => self.dispatch_sos_pm_apc(out),
            _ => self.push_string_byte(byte),
        }
    }

    fn push_string_byte(&mut self, byte: u8) {
        if self.string_data.len() < self.max_string_len {
            self.string_data.push(byte);
        } else {
            self.string_truncated = true;
        }
    }

    fn dispatch_osc(&mut self, out: &mut Vec<Event>) {
        self.state = State::Ground;
        out.push(Event::Osc {
            data: core::mem::take(&mut self.string_data),
            partial: self.string_truncated,
        });
        self.string_truncated = false;
    }

    fn dispatch_sos_pm_apc(&mut self, out: &mut Vec<Event>) {
        self.state = State::Ground;
        out.push(Event::SosPmApc {
            kind: self.string_kind,
            data: core::mem::take(&mut self.string_data),
            partial: self.string_truncated,
        });
        self.string_truncated = false;
    }

    /// A string payload in flight must dispatch when ESC arrives (normally
    /// the first half of ST); other pending state is simply dropped.
    fn flush_string_on_exit(&mut self, out: &mut Vec<Event>) {
        match self.state {
            State::OscString => self.dispatch_osc(out),
            State::SosPmApcString => self.dispatch_sos_pm_apc(out),
            State::DcsPassthrough => {
                self.dcs_hooked = false;
                out.push(Event::DcsUnhook {
                    partial: self.string_truncated,
                });
            }
            _ => {}
        }
    }

    /// CAN/SUB: discard whatever is in flight without dispatching, except a
    /// hooked DCS which must still unhook so the consumer can reset.
    fn abort_to_ground(&mut self, out: &mut Vec<Event>) {
        if self.state == State::DcsPassthrough && self.dcs_hooked {
            self.dcs_hooked = false;
            out.push(Event::DcsUnhook { partial: true });
        }
        self.state = State::Ground;
        self.string_data.clear();
        self.string_truncated = false;
        self.utf8_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(bytes: &[u8]) -> Vec<Event> {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        parser.feed(bytes, &mut out);
        out
    }

    fn csi(bytes: &[u8]) -> (Params, Intermediates, Option<u8>, u8) {
        let evs = events(bytes);
        assert_eq!(evs.len(), 1, "expected one event, got {evs:?}");
        match evs.into_iter().next().unwrap() {
            Event::Csi {
                params,
                intermediates,
                private_marker,
                final_byte,
            } => (params, intermediates, private_marker, final_byte),
            other => panic!("expected CSI, got {other:?}"),
        }
    }

    // ── Ground ─────────────────────────────────────────────────────

    #[test]
    fn printable_ascii() {
        assert_eq!(
            events(b"hi"),
            vec![Event::Print('h'), Event::Print('i')]
        );
    }

    #[test]
    fn c0_controls_execute() {
        assert_eq!(
            events(b"\t\r\n\x07\x08"),
            vec![
                Event::Execute(0x09),
                Event::Execute(0x0D),
                Event::Execute(0x0A),
                Event::Execute(0x07),
                Event::Execute(0x08),
            ]
        );
    }

    #[test]
    fn del_is_ignored() {
        assert!(events(&[0x7F]).is_empty());
    }

    // ── UTF-8 ──────────────────────────────────────────────────────

    #[test]
    fn utf8_two_three_four_byte() {
        assert_eq!(events("é".as_bytes()), vec![Event::Print('é')]);
        assert_eq!(events("中".as_bytes()), vec![Event::Print('中')]);
        assert_eq!(events("🎉".as_bytes()), vec![Event::Print('🎉')]);
    }

    #[test]
    fn utf8_split_across_feeds() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        parser.feed(&[0xF0, 0x9F], &mut out);
        assert!(out.is_empty());
        parser.feed(&[0x8E, 0x89], &mut out);
        assert_eq!(out, vec![Event::Print('🎉')]);
    }

    #[test]
    fn invalid_continuation_substitutes_and_reprocesses() {
        assert_eq!(
            events(&[0xC3, b'a']),
            vec![
                Event::Print(char::REPLACEMENT_CHARACTER),
                Event::Print('a')
            ]
        );
    }

    #[test]
    fn stray_continuation_byte_substitutes() {
        assert_eq!(
            events(&[0x85]),
            vec![Event::Print(char::REPLACEMENT_CHARACTER)]
        );
    }

    #[test]
    fn escape_interrupts_utf8() {
        // 0xC3 starts a sequence; ESC aborts it (with a substitution) and
        // begins escape recognition.
        assert_eq!(
            events(&[0xC3, 0x1B, b'c']),
            vec![
                Event::Print(char::REPLACEMENT_CHARACTER),
                Event::Esc {
                    intermediates: Intermediates::new(),
                    byte: b'c'
                }
            ]
        );
    }

    // ── ESC ────────────────────────────────────────────────────────

    #[test]
    fn esc_final_dispatches() {
        assert_eq!(
            events(b"\x1b7"),
            vec![Event::Esc {
                intermediates: Intermediates::new(),
                byte: b'7'
            }]
        );
    }

    #[test]
    fn esc_with_intermediate() {
        let evs = events(b"\x1b#8");
        assert_eq!(evs.len(), 1);
        match &evs[0] {
            Event::Esc {
                intermediates,
                byte,
            } => {
                assert_eq!(intermediates.as_slice(), b"#");
                assert_eq!(*byte, b'8');
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn esc_charset_designation() {
        let evs = events(b"\x1b(0");
        match &evs[0] {
            Event::Esc {
                intermediates,
                byte,
            } => {
                assert_eq!(intermediates.as_slice(), b"(");
                assert_eq!(*byte, b'0');
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn esc_restarts_escape() {
        // ESC ESC 7 — the second ESC restarts recognition.
        assert_eq!(
            events(b"\x1b\x1b7"),
            vec![Event::Esc {
                intermediates: Intermediates::new(),
                byte: b'7'
            }]
        );
    }

    // ── CSI ────────────────────────────────────────────────────────

    #[test]
    fn csi_no_params() {
        let (params, intermediates, private, final_byte) = csi(b"\x1b[m");
        assert!(params.is_empty());
        assert!(intermediates.is_empty());
        assert_eq!(private, None);
        assert_eq!(final_byte, b'm');
    }

    #[test]
    fn csi_multiple_params() {
        let (params, _, _, final_byte) = csi(b"\x1b[5;10H");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get(0), 5);
        assert_eq!(params.get(1), 10);
        assert_eq!(final_byte, b'H');
    }

    #[test]
    fn csi_empty_params_are_zero() {
        let (params, _, _, _) = csi(b"\x1b[;5;m");
        assert_eq!(params.len(), 3);
        assert_eq!(params.get(0), 0);
        assert_eq!(params.get(1), 5);
        assert_eq!(params.get(2), 0);
    }

    #[test]
    fn csi_private_marker() {
        let (params, _, private, final_byte) = csi(b"\x1b[?1049h");
        assert_eq!(private, Some(b'?'));
        assert_eq!(params.get(0), 1049);
        assert_eq!(final_byte, b'h');
    }

    #[test]
    fn csi_gt_marker() {
        let (_, _, private, final_byte) = csi(b"\x1b[>c");
        assert_eq!(private, Some(b'>'));
        assert_eq!(final_byte, b'c');
    }

    #[test]
    fn csi_subparams() {
        let (params, _, _, _) = csi(b"\x1b[38:2::10:20:30m");
        assert_eq!(params.len(), 1);
        assert_eq!(params.subparams(0), &[38, 2, 0, 10, 20, 30]);
    }

    #[test]
    fn csi_mixed_params_and_subparams() {
        let (params, _, _, _) = csi(b"\x1b[4:3;58:2::1:2:3m");
        assert_eq!(params.len(), 2);
        assert_eq!(params.subparams(0), &[4, 3]);
        assert_eq!(params.subparams(1), &[58, 2, 0, 1, 2, 3]);
    }

    #[test]
    fn csi_intermediate_byte() {
        let (params, intermediates, _, final_byte) = csi(b"\x1b[2 q");
        assert_eq!(params.get(0), 2);
        assert_eq!(intermediates.as_slice(), b" ");
        assert_eq!(final_byte, b'q');
    }

    #[test]
    fn csi_param_saturates() {
        let (params, _, _, _) = csi(b"\x1b[99999999999A");
        assert_eq!(params.get(0), u16::MAX);
    }

    #[test]
    fn csi_param_after_intermediate_is_ignored() {
        // Malformed: digit after intermediate sends the sequence to ignore.
        assert!(events(b"\x1b[ 5m").is_empty());
    }

    #[test]
    fn csi_private_marker_mid_sequence_is_ignored() {
        assert!(events(b"\x1b[5?h").is_empty());
    }

    #[test]
    fn csi_executes_embedded_controls() {
        // C0 inside CSI executes without aborting the sequence.
        assert_eq!(
            events(b"\x1b[2\x07A"),
            vec![
                Event::Execute(0x07),
                Event::Csi {
                    params: {
                        let mut p = Params::default();
                        p.push_digit(2);
                        p
                    },
                    intermediates: Intermediates::new(),
                    private_marker: None,
                    final_byte: b'A'
                }
            ]
        );
    }

    #[test]
    fn can_aborts_csi() {
        let evs = events(b"\x1b[12\x18A");
        assert_eq!(evs[0], Event::Execute(0x18));
        assert_eq!(evs[1], Event::Print('A'));
    }

    #[test]
    fn too_many_params_ignored() {
        let mut seq = b"\x1b[".to_vec();
        for _ in 0..40 {
            seq.extend_from_slice(b"1;");
        }
        seq.push(b'm');
        assert!(events(&seq).is_empty());
    }

    // ── OSC ────────────────────────────────────────────────────────

    #[test]
    fn osc_bel_terminated() {
        assert_eq!(
            events(b"\x1b]0;title\x07"),
            vec![Event::Osc {
                data: b"0;title".to_vec(),
                partial: false
            }]
        );
    }

    #[test]
    fn osc_st_terminated() {
        let evs = events(b"\x1b]8;;https://a.test\x1b\\");
        assert_eq!(evs.len(), 2);
        assert_eq!(
            evs[0],
            Event::Osc {
                data: b"8;;https://a.test".to_vec(),
                partial: false
            }
        );
        // The trailing ESC \ dispatches as a (meaningless) escape; the
        // sequencer drops it.
        assert!(matches!(evs[1], Event::Esc { byte: b'\\', .. }));
    }

    #[test]
    fn osc_utf8_payload_passes_through() {
        let evs = events("\u{1b}]0;héllo\u{7}".as_bytes());
        assert_eq!(
            evs,
            vec![Event::Osc {
                data: "0;héllo".as_bytes().to_vec(),
                partial: false
            }]
        );
    }

    #[test]
    fn osc_truncates_at_ceiling() {
        let mut parser = Parser::with_max_string_len(8);
        let mut out = Vec::new();
        parser.feed(b"\x1b]0;abcdefghij\x07", &mut out);
        assert_eq!(
            out,
            vec![Event::Osc {
                data: b"0;abcdef".to_vec(),
                partial: true
            }]
        );
    }

    #[test]
    fn can_discards_osc() {
        assert_eq!(events(b"\x1b]0;oops\x18"), vec![Event::Execute(0x18)]);
    }

    // ── DCS ────────────────────────────────────────────────────────

    #[test]
    fn dcs_hook_put_unhook() {
        let evs = events(b"\x1bP+q544e\x1b\\");
        assert!(matches!(
            evs[0],
            Event::DcsHook {
                final_byte: b'q',
                ..
            }
        ));
        if let Event::DcsHook { intermediates, .. } = &evs[0] {
            assert_eq!(intermediates.as_slice(), b"+");
        }
        let puts: Vec<u8> = evs
            .iter()
            .filter_map(|e| match e {
                Event::DcsPut(b) => Some(*b),
                _ => None,
            })
            .collect();
        assert_eq!(puts, b"544e");
        assert!(evs
            .iter()
            .any(|e| matches!(e, Event::DcsUnhook { partial: false })));
    }

    #[test]
    fn dcs_with_params() {
        let evs = events(b"\x1bP1$r\x1b\\");
        match &evs[0] {
            Event::DcsHook {
                params,
                intermediates,
                final_byte,
                ..
            } => {
                assert_eq!(params.get(0), 1);
                assert_eq!(intermediates.as_slice(), b"$");
                assert_eq!(*final_byte, b'r');
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn dcs_payload_cap() {
        let mut parser = Parser::with_max_string_len(4);
        let mut out = Vec::new();
        parser.feed(b"\x1bPqabcdefgh\x1b\\", &mut out);
        let puts = out
            .iter()
            .filter(|e| matches!(e, Event::DcsPut(_)))
            .count();
        assert_eq!(puts, 4);
        assert!(out
            .iter()
            .any(|e| matches!(e, Event::DcsUnhook { partial: true })));
    }

    #[test]
    fn can_unhooks_dcs() {
        let evs = events(b"\x1bPqab\x18");
        assert!(evs
            .iter()
            .any(|e| matches!(e, Event::DcsUnhook { partial: true })));
    }

    // ── SOS / PM / APC ─────────────────────────────────────────────

    #[test]
    fn apc_string_dispatches() {
        let evs = events(b"\x1b_payload\x1b\\");
        assert_eq!(
            evs[0],
            Event::SosPmApc {
                kind: StringKind::Apc,
                data: b"payload".to_vec(),
                partial: false
            }
        );
    }

    #[test]
    fn pm_and_sos_kinds() {
        let evs = events(b"\x1b^p\x1b\\");
        assert!(matches!(
            evs[0],
            Event::SosPmApc {
                kind: StringKind::Pm,
                ..
            }
        ));
        let evs = events(b"\x1bXs\x1b\\");
        assert!(matches!(
            evs[0],
            Event::SosPmApc {
                kind: StringKind::Sos,
                ..
            }
        ));
    }

    // ── Robustness ─────────────────────────────────────────────────

    #[test]
    fn interleaved_text_and_sequences() {
        let evs = events(b"a\x1b[31mb");
        assert_eq!(evs.len(), 3);
        assert_eq!(evs[0], Event::Print('a'));
        assert!(matches!(evs[2], Event::Print('b')));
    }

    #[test]
    fn feed_chars_decoded_upstream() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        parser.feed_chars("a中\u{1b}[2J", &mut out);
        assert_eq!(out[0], Event::Print('a'));
        assert_eq!(out[1], Event::Print('中'));
        assert!(matches!(out[2], Event::Csi { final_byte: b'J', .. }));
    }

    #[test]
    fn garbage_never_panics() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        let junk: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        parser.feed(&junk, &mut out);
        // And a pile of half-open sequences.
        parser.feed(b"\x1b[\x1b]\x1bP\x1b", &mut out);
    }
}
