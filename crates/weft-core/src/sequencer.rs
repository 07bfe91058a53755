//! Sequencer: parser events in, screen operations out.
//!
//! All parameter decoding lives here — 1-based wire coordinates become
//! 0-based engine coordinates, SGR atoms (including the `38;5`, `38;2` and
//! colon-subparameter forms) become [`GraphicsAttributes`], OSC payloads are
//! split and validated. Unknown dispatches are logged and dropped; nothing
//! here can fail outward.

use tracing::debug;

use crate::cell::{CellFlags, Color, GraphicsAttributes};
use crate::events::EventHandler;
use crate::parser::{Event, Params, Parser};
use crate::screen::Screen;

/// What the active DCS payload is feeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DcsTarget {
    #[default]
    None,
    /// XTGETTCAP (`DCS + q`).
    Termcap,
    /// DECRQSS (`DCS $ q`).
    StatusString,
    /// Recognized but unsupported; swallow the payload.
    Discard,
}

/// Translates the byte stream into [`Screen`] calls.
#[derive(Debug, Default)]
pub struct Sequencer {
    parser: Parser,
    events: Vec<Event>,
    dcs: DcsTarget,
    dcs_data: Vec<u8>,
}

impl Sequencer {
    /// A sequencer with the given parser payload ceiling.
    #[must_use]
    pub fn new(max_string_len: usize) -> Self {
        Self {
            parser: Parser::with_max_string_len(max_string_len),
            ..Self::default()
        }
    }

    /// Feed raw PTY bytes.
    pub fn process_bytes<H: EventHandler>(&mut self, bytes: &[u8], screen: &mut Screen<H>) {
        let mut events = core::mem::take(&mut self.events);
        events.clear();
        self.parser.feed(bytes, &mut events);
        for event in events.drain(..) {
            self.apply(event, screen);
        }
        self.events = events;
    }

    /// Feed text that was UTF-8 decoded upstream.
    pub fn process_str<H: EventHandler>(&mut self, text: &str, screen: &mut Screen<H>) {
        let mut events = core::mem::take(&mut self.events);
        events.clear();
        self.parser.feed_chars(text, &mut events);
        for event in events.drain(..) {
            self.apply(event, screen);
        }
        self.events = events;
    }

    fn apply<H: EventHandler>(&mut self, event: Event, screen: &mut Screen<H>) {
        match event {
            Event::Print(ch) => screen.write_char(ch),
            Event::Execute(byte) => Self::execute(byte, screen),
            Event::Esc {
                intermediates,
                byte,
            } => Self::esc_dispatch(&intermediates, byte, screen),
            Event::Csi {
                params,
                intermediates,
                private_marker,
                final_byte,
            } => Self::csi_dispatch(&params, &intermediates, private_marker, final_byte, screen),
            Event::Osc { data, partial } => Self::osc_dispatch(&data, partial, screen),
            Event::DcsHook {
                params,
                intermediates,
                private_marker,
                final_byte,
            } => self.dcs_hook(&params, &intermediates, private_marker, final_byte),
            Event::DcsPut(byte) => {
                if self.dcs != DcsTarget::None && self.dcs != DcsTarget::Discard {
                    self.dcs_data.push(byte);
                }
            }
            Event::DcsUnhook { partial } => self.dcs_unhook(partial, screen),
            Event::SosPmApc { kind, data, .. } => {
                debug!(?kind, len = data.len(), "ignoring SOS/PM/APC string");
            }
        }
    }

    // ── C0 ──────────────────────────────────────────────────────────

    fn execute<H: EventHandler>(byte: u8, screen: &mut Screen<H>) {
        match byte {
            0x07 => screen.bell(),
            0x08 => screen.backspace(),
            0x09 => screen.horizontal_tab(),
            0x0A | 0x0B | 0x0C => screen.linefeed(),
            0x0D => screen.carriage_return(),
            0x0E => screen.locking_shift(1), // SO
            0x0F => screen.locking_shift(0), // SI
            _ => {}
        }
    }

    // ── ESC ─────────────────────────────────────────────────────────

    fn esc_dispatch<H: EventHandler>(intermediates: &[u8], byte: u8, screen: &mut Screen<H>) {
        match (intermediates, byte) {
            ([], b'7') => screen.save_cursor(),
            ([], b'8') => screen.restore_cursor(),
            ([], b'D') => screen.index(),
            ([], b'E') => screen.next_line(),
            ([], b'H') => screen.set_tab_stop(),
            ([], b'M') => screen.reverse_index(),
            ([], b'Z') => screen.report_primary_device_attributes(),
            ([], b'c') => screen.hard_reset(),
            ([], b'=') => screen.set_application_keypad_mode(true),
            ([], b'>') => screen.set_application_keypad_mode(false),
            ([], b'N') => screen.single_shift(2),
            ([], b'O') => screen.single_shift(3),
            ([], b'n') => screen.locking_shift(2),
            ([], b'o') => screen.locking_shift(3),
            ([], b'\\') => {} // ST tail of a string sequence
            ([b'#'], b'8') => screen.screen_alignment_pattern(),
            ([b'('], designator) => screen.designate_charset(0, designator),
            ([b')'], designator) => screen.designate_charset(1, designator),
            ([b'*'], designator) => screen.designate_charset(2, designator),
            ([b'+'], designator) => screen.designate_charset(3, designator),
            ([b'%'], _) => {} // character-set selection: always UTF-8
            _ => debug!(?intermediates, byte, "unhandled ESC dispatch"),
        }
    }

    // ── CSI ─────────────────────────────────────────────────────────

    fn csi_dispatch<H: EventHandler>(
        params: &Params,
        intermediates: &[u8],
        private_marker: Option<u8>,
        final_byte: u8,
        screen: &mut Screen<H>,
    ) {
        let count = params.get_or(0, 1);
        match (private_marker, intermediates, final_byte) {
            (None, [], b'@') => screen.insert_chars(count),
            (None, [], b'A') => screen.move_up(count),
            (None, [], b'B') => screen.move_down(count),
            (None, [], b'C') => screen.move_forward(count),
            (None, [], b'D') => screen.move_backward(count),
            (None, [], b'E') => screen.cursor_next_line(count),
            (None, [], b'F') => screen.cursor_prev_line(count),
            (None, [], b'G') => screen.move_to_column(params.get_or(0, 1) - 1),
            (None, [], b'H') | (None, [], b'f') => {
                screen.move_to(params.get_or(0, 1) - 1, params.get_or(1, 1) - 1);
            }
            (None, [], b'I') => screen.tab_forward(count),
            (None, [], b'J') => screen.erase_in_display(params.get(0)),
            (Some(b'?'), [], b'J') => screen.erase_in_display(params.get(0)),
            (None, [], b'K') => screen.erase_in_line(params.get(0)),
            (Some(b'?'), [], b'K') => screen.erase_in_line(params.get(0)),
            (None, [], b'L') => screen.insert_lines(count),
            (None, [], b'M') => screen.delete_lines(count),
            (None, [], b'P') => screen.delete_chars(count),
            (None, [], b'S') => screen.scroll_up(count),
            (None, [], b'T') => screen.scroll_down(count),
            (None, [], b'X') => screen.erase_chars(count),
            (None, [], b'Z') => screen.tab_backward(count),
            (None, [], b'`') => screen.move_to_column(params.get_or(0, 1) - 1),
            (None, [], b'a') => screen.move_column_relative(count),
            (None, [], b'b') => screen.repeat_last_graphic(count),
            (None, [], b'c') => {
                if params.get(0) == 0 {
                    screen.report_primary_device_attributes();
                }
            }
            (Some(b'>'), [], b'c') => {
                if params.get(0) == 0 {
                    screen.report_secondary_device_attributes();
                }
            }
            (None, [], b'd') => screen.move_to_line(params.get_or(0, 1) - 1),
            (None, [], b'e') => screen.move_line_relative(count),
            (None, [], b'g') => screen.clear_tab_stop(params.get(0)),
            (None, [], b'h') => Self::each_param(params, |n| screen.set_ansi_mode_number(n, true)),
            (None, [], b'l') => Self::each_param(params, |n| screen.set_ansi_mode_number(n, false)),
            (Some(b'?'), [], b'h') => {
                Self::each_param(params, |n| screen.set_dec_mode_number(n, true));
            }
            (Some(b'?'), [], b'l') => {
                Self::each_param(params, |n| screen.set_dec_mode_number(n, false));
            }
            (None, [], b'm') => {
                let attrs = apply_sgr(screen.graphics_rendition(), params);
                screen.set_graphics_rendition(attrs);
            }
            (None, [], b'n') => match params.get(0) {
                5 => screen.report_device_status(),
                6 => screen.report_cursor_position(false),
                other => debug!(other, "unhandled DSR"),
            },
            (Some(b'?'), [], b'n') => {
                if params.get(0) == 6 {
                    screen.report_cursor_position(true);
                }
            }
            (None, [], b'r') => {
                let top = params.get_or(0, 1) - 1;
                let bottom = match params.get(1) {
                    0 => None,
                    value => Some(value - 1),
                };
                screen.set_vertical_margins(top, bottom);
            }
            (Some(b'?'), [], b'r') => {
                Self::each_param(params, |n| screen.restore_dec_mode_number(n));
            }
            (None, [], b's') => {
                if screen.left_right_margin_mode() {
                    let left = params.get_or(0, 1) - 1;
                    let right = match params.get(1) {
                        0 => None,
                        value => Some(value - 1),
                    };
                    screen.set_horizontal_margins(left, right);
                } else if params.is_empty() {
                    screen.save_cursor();
                }
            }
            (Some(b'?'), [], b's') => {
                Self::each_param(params, |n| screen.save_dec_mode_number(n));
            }
            (None, [], b't') => Self::window_ops(params, screen),
            (None, [], b'u') => screen.restore_cursor(),
            (Some(b'?'), [], b'W') => {
                if params.get(0) == 5 {
                    screen.reset_tab_stops();
                }
            }
            (None, [b' '], b'q') => screen.set_cursor_style_param(params.get(0)),
            (None, [b'!'], b'p') => screen.soft_reset(),
            (None, [b'"'], b'p') => {} // DECSCL: conformance level pinned
            (None, [b'$'], b'p') => screen.report_ansi_mode(params.get(0)),
            (Some(b'?'), [b'$'], b'p') => screen.report_dec_mode(params.get(0)),
            (None, [b'$'], b'v') => {
                // DECCRA: Pts;Pls;Pbs;Prs;Pps ; Ptd;Pld;Ppd
                screen.copy_rectangular_area(
                    params.get_or(0, 1) - 1,
                    params.get_or(1, 1) - 1,
                    params.get_or(2, u16::MAX) - 1,
                    params.get_or(3, u16::MAX) - 1,
                    params.get_or(5, 1) - 1,
                    params.get_or(6, 1) - 1,
                );
            }
            (None, [b'$'], b'x') => {
                // DECFRA: Pc;Pt;Pl;Pb;Pr
                let fill = params.get(0);
                screen.fill_rectangular_area(
                    fill,
                    params.get_or(1, 1) - 1,
                    params.get_or(2, 1) - 1,
                    params.get_or(3, u16::MAX) - 1,
                    params.get_or(4, u16::MAX) - 1,
                );
            }
            (None, [b'$'], b'z') => {
                // DECERA: Pt;Pl;Pb;Pr
                screen.erase_rectangular_area(
                    params.get_or(0, 1) - 1,
                    params.get_or(1, 1) - 1,
                    params.get_or(2, u16::MAX) - 1,
                    params.get_or(3, u16::MAX) - 1,
                );
            }
            (None, [b'$'], b'w') => {
                if params.get(0) == 2 {
                    screen.report_tab_stops();
                }
            }
            (None, [b'\''], b'}') => screen.insert_columns(count),
            (None, [b'\''], b'~') => screen.delete_columns(count),
            _ => debug!(
                ?private_marker,
                ?intermediates,
                final_byte = ?(final_byte as char),
                "unhandled CSI dispatch"
            ),
        }
    }

    fn each_param(params: &Params, mut f: impl FnMut(u16)) {
        if params.is_empty() {
            f(0);
            return;
        }
        for group in params.iter() {
            f(group.first().copied().unwrap_or(0));
        }
    }

    fn window_ops<H: EventHandler>(params: &Params, screen: &mut Screen<H>) {
        match params.get(0) {
            4 => screen.request_resize(params.get(2), params.get(1), true),
            8 => screen.request_resize(params.get(2), params.get(1), false),
            18 => screen.report_text_area_size(),
            22 => screen.save_window_title(),
            23 => screen.restore_window_title(),
            other => debug!(other, "unhandled XTWINOPS"),
        }
    }

    // ── OSC ─────────────────────────────────────────────────────────

    fn osc_dispatch<H: EventHandler>(data: &[u8], partial: bool, screen: &mut Screen<H>) {
        if partial {
            debug!(len = data.len(), "OSC payload was truncated");
        }
        let text = String::from_utf8_lossy(data);
        let (opcode, rest) = match text.split_once(';') {
            Some((op, rest)) => (op, rest),
            None => (text.as_ref(), ""),
        };
        let Ok(opcode) = opcode.parse::<u16>() else {
            debug!(?text, "discarding OSC with non-numeric opcode");
            return;
        };
        match opcode {
            0 | 2 => screen.set_window_title(rest),
            1 => {} // icon name
            4 => Self::osc_palette(rest, screen),
            8 => {
                let (link_params, uri) = rest.split_once(';').unwrap_or(("", rest));
                let id = link_params
                    .split(':')
                    .find_map(|kv| kv.strip_prefix("id="))
                    .unwrap_or("");
                screen.set_hyperlink(uri, id);
            }
            10..=19 => {
                if rest == "?" {
                    screen.report_dynamic_color(opcode);
                } else if let Some(rgb) = parse_color_spec(rest) {
                    screen.set_dynamic_color(opcode, rgb);
                }
            }
            52 => {
                let (selection, payload) = rest.split_once(';').unwrap_or(("", rest));
                if payload == "?" {
                    screen.report_clipboard(selection);
                } else {
                    screen.write_clipboard(selection, payload);
                }
            }
            104 => {
                let entries: Vec<u16> = rest
                    .split(';')
                    .filter(|s| !s.is_empty())
                    .filter_map(|s| s.parse().ok())
                    .collect();
                screen.reset_palette(&entries);
            }
            110..=119 => screen.reset_dynamic_color(opcode - 100),
            777 => {
                let mut parts = rest.splitn(3, ';');
                if parts.next() == Some("notify") {
                    let title = parts.next().unwrap_or("");
                    let body = parts.next().unwrap_or("");
                    screen.notify(title, body);
                }
            }
            other => debug!(other, "unhandled OSC opcode"),
        }
    }

    fn osc_palette<H: EventHandler>(rest: &str, screen: &mut Screen<H>) {
        // OSC 4 carries `index;spec` pairs, repeating.
        let mut parts = rest.split(';');
        while let (Some(index), Some(spec)) = (parts.next(), parts.next()) {
            let Ok(index) = index.parse::<u16>() else {
                continue;
            };
            if spec == "?" {
                screen.report_palette_color(index);
            } else if let Some(rgb) = parse_color_spec(spec) {
                screen.set_palette_color(index, rgb);
            }
        }
    }

    // ── DCS ─────────────────────────────────────────────────────────

    fn dcs_hook(
        &mut self,
        params: &Params,
        intermediates: &[u8],
        private_marker: Option<u8>,
        final_byte: u8,
    ) {
        self.dcs_data.clear();
        self.dcs = match (private_marker, intermediates, final_byte) {
            (None, [b'+'], b'q') => DcsTarget::Termcap,
            (None, [b'$'], b'q') => DcsTarget::StatusString,
            _ => {
                debug!(
                    ?private_marker,
                    ?intermediates,
                    final_byte = ?(final_byte as char),
                    params = params.len(),
                    "unhandled DCS hook"
                );
                DcsTarget::Discard
            }
        };
    }

    fn dcs_unhook<H: EventHandler>(&mut self, partial: bool, screen: &mut Screen<H>) {
        if partial {
            debug!(len = self.dcs_data.len(), "DCS payload was truncated");
        }
        let data = core::mem::take(&mut self.dcs_data);
        match core::mem::take(&mut self.dcs) {
            DcsTarget::Termcap => {
                let text = String::from_utf8_lossy(&data);
                for name in text.split(';') {
                    screen.report_termcap(name);
                }
            }
            DcsTarget::StatusString => {
                screen.report_status_string(&String::from_utf8_lossy(&data));
            }
            DcsTarget::None | DcsTarget::Discard => {}
        }
    }
}

// ── SGR decoding ────────────────────────────────────────────────────

/// Apply SGR parameters on top of `current`, returning the new rendition.
#[must_use]
pub fn apply_sgr(current: GraphicsAttributes, params: &Params) -> GraphicsAttributes {
    let mut attrs = current;
    if params.is_empty() {
        attrs.reset();
        return attrs;
    }

    let mut index = 0;
    while index < params.len() {
        let group = params.subparams(index);
        let atom = group.first().copied().unwrap_or(0);
        match atom {
            0 => attrs.reset(),
            1 => attrs.flags |= CellFlags::BOLD,
            2 => attrs.flags |= CellFlags::FAINT,
            3 => attrs.flags |= CellFlags::ITALIC,
            4 => {
                attrs.flags.remove(CellFlags::ANY_UNDERLINE);
                // 4:x selects the underline style; bare 4 is single.
                match group.get(1).copied().unwrap_or(1) {
                    0 => {}
                    2 => attrs.flags |= CellFlags::DOUBLY_UNDERLINED,
                    3 => attrs.flags |= CellFlags::CURLY_UNDERLINED,
                    4 => attrs.flags |= CellFlags::DOTTED_UNDERLINE,
                    5 => attrs.flags |= CellFlags::DASHED_UNDERLINE,
                    _ => attrs.flags |= CellFlags::UNDERLINE,
                }
            }
            5 | 6 => attrs.flags |= CellFlags::BLINKING,
            7 => attrs.flags |= CellFlags::INVERSE,
            8 => attrs.flags |= CellFlags::HIDDEN,
            9 => attrs.flags |= CellFlags::CROSSED_OUT,
            21 => {
                attrs.flags.remove(CellFlags::ANY_UNDERLINE);
                attrs.flags |= CellFlags::DOUBLY_UNDERLINED;
            }
            22 => attrs.flags.remove(CellFlags::BOLD | CellFlags::FAINT),
            23 => attrs.flags.remove(CellFlags::ITALIC),
            24 => attrs.flags.remove(CellFlags::ANY_UNDERLINE),
            25 => attrs.flags.remove(CellFlags::BLINKING),
            27 => attrs.flags.remove(CellFlags::INVERSE),
            28 => attrs.flags.remove(CellFlags::HIDDEN),
            29 => attrs.flags.remove(CellFlags::CROSSED_OUT),
            30..=37 => attrs.foreground = Color::Indexed((atom - 30) as u8),
            38 => match extended_color(params, &mut index) {
                Some(color) => attrs.foreground = color,
                None => break,
            },
            39 => attrs.foreground = Color::Default,
            40..=47 => attrs.background = Color::Indexed((atom - 40) as u8),
            48 => match extended_color(params, &mut index) {
                Some(color) => attrs.background = color,
                None => break,
            },
            49 => attrs.background = Color::Default,
            51 => attrs.flags |= CellFlags::FRAMED,
            53 => attrs.flags |= CellFlags::OVERLINE,
            54 => attrs.flags.remove(CellFlags::FRAMED),
            55 => attrs.flags.remove(CellFlags::OVERLINE),
            58 => match extended_color(params, &mut index) {
                Some(color) => attrs.underline = color,
                None => break,
            },
            59 => attrs.underline = Color::Default,
            90..=97 => attrs.foreground = Color::Bright((atom - 90) as u8),
            100..=107 => attrs.background = Color::Bright((atom - 100) as u8),
            other => debug!(other, "ignoring unknown SGR atom"),
        }
        index += 1;
    }
    attrs
}

/// Decode the extended color forms behind SGR 38/48/58.
///
/// Colon form carries everything in one group (`38:2::r:g:b`, `38:5:n`);
/// semicolon form consumes following groups (`38;2;r;g;b`, `38;5;n`).
/// `index` is left on the last consumed group.
fn extended_color(params: &Params, index: &mut usize) -> Option<Color> {
    let group = params.subparams(*index);
    if group.len() > 1 {
        // Colon form.
        match group.get(1).copied().unwrap_or(0) {
            5 => group.get(2).map(|&n| palette_color(n)),
            2 => {
                // `38:2:colorspace:r:g:b` — the colorspace id may be empty
                // or omitted; take the last three subparameters.
                if group.len() >= 5 {
                    let r = *group.get(group.len() - 3)? as u8;
                    let g = *group.get(group.len() - 2)? as u8;
                    let b = *group.get(group.len() - 1)? as u8;
                    Some(Color::Rgb(r, g, b))
                } else {
                    None
                }
            }
            _ => None,
        }
    } else {
        // Semicolon form.
        match params.get(*index + 1) {
            5 => {
                let n = params.get(*index + 2);
                *index += 2;
                Some(palette_color(n))
            }
            2 => {
                let r = params.get(*index + 2) as u8;
                let g = params.get(*index + 3) as u8;
                let b = params.get(*index + 4) as u8;
                *index += 4;
                Some(Color::Rgb(r, g, b))
            }
            _ => None,
        }
    }
}

fn palette_color(n: u16) -> Color {
    if n < 16 {
        Color::Indexed(n as u8)
    } else {
        Color::Palette(n.min(255) as u8)
    }
}

/// Parse an XParseColor-style color: `#RGB`, `#RRGGBB`, `#RRRRGGGGBBBB`,
/// or `rgb:R/G/B` with 1–4 hex digits per channel.
#[must_use]
pub fn parse_color_spec(spec: &str) -> Option<(u8, u8, u8)> {
    fn channel(text: &str) -> Option<u8> {
        if text.is_empty() || text.len() > 4 {
            return None;
        }
        let value = u32::from_str_radix(text, 16).ok()?;
        // Scale to 8 bits from however many digits were given.
        let max = (1u32 << (4 * text.len() as u32)) - 1;
        Some(((value * 255 + max / 2) / max) as u8)
    }

    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() % 3 != 0 {
            return None;
        }
        let step = hex.len() / 3;
        let r = channel(hex.get(..step)?)?;
        let g = channel(hex.get(step..2 * step)?)?;
        let b = channel(hex.get(2 * step..)?)?;
        return Some((r, g, b));
    }
    if let Some(body) = spec.strip_prefix("rgb:") {
        let mut parts = body.split('/');
        let r = channel(parts.next()?)?;
        let g = channel(parts.next()?)?;
        let b = channel(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        return Some((r, g, b));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sgr_of(sequence: &[u16]) -> GraphicsAttributes {
        let mut params = Params::default();
        let mut parser = Parser::new();
        let mut out = Vec::new();
        let encoded = sequence
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(";");
        parser.feed(format!("\x1b[{encoded}m").as_bytes(), &mut out);
        if let Some(Event::Csi { params: p, .. }) = out.into_iter().next() {
            params = p;
        }
        apply_sgr(GraphicsAttributes::default(), &params)
    }

    #[test]
    fn sgr_basic_attributes() {
        let attrs = sgr_of(&[1, 3, 4]);
        assert!(attrs.flags.contains(CellFlags::BOLD));
        assert!(attrs.flags.contains(CellFlags::ITALIC));
        assert!(attrs.flags.contains(CellFlags::UNDERLINE));
    }

    #[test]
    fn sgr_reset_clears_everything() {
        let mut start = GraphicsAttributes::default();
        start.flags = CellFlags::BOLD | CellFlags::INVERSE;
        start.foreground = Color::Indexed(1);
        let params = Params::default();
        assert_eq!(apply_sgr(start, &params), GraphicsAttributes::default());
    }

    #[test]
    fn sgr_colors_basic_and_bright() {
        let attrs = sgr_of(&[31, 102]);
        assert_eq!(attrs.foreground, Color::Indexed(1));
        assert_eq!(attrs.background, Color::Bright(2));
    }

    #[test]
    fn sgr_256_color_semicolon_form() {
        let attrs = sgr_of(&[38, 5, 196]);
        assert_eq!(attrs.foreground, Color::Palette(196));
        // Low palette indexes collapse onto the base colors.
        let attrs = sgr_of(&[38, 5, 3]);
        assert_eq!(attrs.foreground, Color::Indexed(3));
    }

    #[test]
    fn sgr_truecolor_semicolon_form() {
        let attrs = sgr_of(&[48, 2, 10, 20, 30]);
        assert_eq!(attrs.background, Color::Rgb(10, 20, 30));
    }

    #[test]
    fn sgr_truecolor_colon_form() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        parser.feed(b"\x1b[38:2::10:20:30m", &mut out);
        let Some(Event::Csi { params, .. }) = out.into_iter().next() else {
            panic!("no CSI");
        };
        let attrs = apply_sgr(GraphicsAttributes::default(), &params);
        assert_eq!(attrs.foreground, Color::Rgb(10, 20, 30));
    }

    #[test]
    fn sgr_underline_color() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        parser.feed(b"\x1b[58:2::1:2:3m", &mut out);
        let Some(Event::Csi { params, .. }) = out.into_iter().next() else {
            panic!("no CSI");
        };
        let attrs = apply_sgr(GraphicsAttributes::default(), &params);
        assert_eq!(attrs.underline, Color::Rgb(1, 2, 3));
    }

    #[test]
    fn sgr_curly_underline_subparam() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        parser.feed(b"\x1b[4:3m", &mut out);
        let Some(Event::Csi { params, .. }) = out.into_iter().next() else {
            panic!("no CSI");
        };
        let attrs = apply_sgr(GraphicsAttributes::default(), &params);
        assert!(attrs.flags.contains(CellFlags::CURLY_UNDERLINED));
        assert!(!attrs.flags.contains(CellFlags::UNDERLINE));
    }

    #[test]
    fn sgr_attributes_accumulate_across_groups() {
        let attrs = sgr_of(&[1, 31, 48, 5, 17]);
        assert!(attrs.flags.contains(CellFlags::BOLD));
        assert_eq!(attrs.foreground, Color::Indexed(1));
        assert_eq!(attrs.background, Color::Palette(17));
    }

    #[test]
    fn sgr_clear_pairs() {
        let bolded = sgr_of(&[1, 4]);
        let params = {
            let mut parser = Parser::new();
            let mut out = Vec::new();
            parser.feed(b"\x1b[22;24m", &mut out);
            match out.into_iter().next() {
                Some(Event::Csi { params, .. }) => params,
                _ => panic!("no CSI"),
            }
        };
        let attrs = apply_sgr(bolded, &params);
        assert!(!attrs.flags.contains(CellFlags::BOLD));
        assert!(!attrs.flags.contains(CellFlags::UNDERLINE));
    }

    // ── Color spec parsing ─────────────────────────────────────────

    #[test]
    fn parse_hash_forms() {
        assert_eq!(parse_color_spec("#abcdef"), Some((0xAB, 0xCD, 0xEF)));
        assert_eq!(parse_color_spec("#fff"), Some((255, 255, 255)));
        assert_eq!(parse_color_spec("#000000"), Some((0, 0, 0)));
    }

    #[test]
    fn parse_rgb_forms() {
        assert_eq!(parse_color_spec("rgb:ab/cd/ef"), Some((0xAB, 0xCD, 0xEF)));
        assert_eq!(parse_color_spec("rgb:abab/cdcd/efef"), Some((0xAB, 0xCD, 0xEF)));
        assert_eq!(parse_color_spec("rgb:f/f/f"), Some((255, 255, 255)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_color_spec(""), None);
        assert_eq!(parse_color_spec("#abcd"), None);
        assert_eq!(parse_color_spec("rgb:1/2"), None);
        assert_eq!(parse_color_spec("red"), None);
    }
}
