//! Wire-exact reply strings for terminal queries.
//!
//! Pure builders: state in, bytes out. The screen routes the results through
//! [`EventHandler::reply`](crate::events::EventHandler::reply) in the order
//! the triggering sequences were processed.
//!
//! Row/column parameters on the wire are 1-based decimal; everything in the
//! engine is 0-based, so the conversion happens here and only here.

use crate::modes::ModeStatus;

/// DA1 capability codes advertised by this engine: 132 columns, sixel
/// passthrough, selective/rectangular editing, UDK, color, locator and
/// clipboard access, on a VT level-4 base.
const DA1_ATTRIBUTES: &[u16] = &[1, 4, 6, 21, 22, 28, 52];

/// DA2 identity: VT level 5 terminal, firmware version 1.
const DA2_PRIMARY: u16 = 65;
const DA2_VERSION: u16 = 1;

/// DSR 5 ("are you OK?"): always ready.
#[must_use]
pub fn device_status_ok() -> Vec<u8> {
    b"\x1b[0n".to_vec()
}

/// DSR 6 cursor position report (0-based input).
#[must_use]
pub fn cursor_position(line: u16, column: u16) -> Vec<u8> {
    format!("\x1b[{};{}R", line + 1, column + 1).into_bytes()
}

/// DECXCPR extended cursor position report with page number.
#[must_use]
pub fn extended_cursor_position(line: u16, column: u16) -> Vec<u8> {
    format!("\x1b[{};{};1R", line + 1, column + 1).into_bytes()
}

/// DA1 primary device attributes.
#[must_use]
pub fn primary_device_attributes() -> Vec<u8> {
    let attrs = DA1_ATTRIBUTES
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(";");
    format!("\x1b[?64;{attrs}c").into_bytes()
}

/// DA2 secondary device attributes.
#[must_use]
pub fn secondary_device_attributes() -> Vec<u8> {
    format!("\x1b[>{DA2_PRIMARY};{DA2_VERSION};0c").into_bytes()
}

/// DECRQM reply for a DEC private mode.
#[must_use]
pub fn dec_mode_report(number: u16, status: ModeStatus) -> Vec<u8> {
    format!("\x1b[?{};{}$y", number, status as u8).into_bytes()
}

/// DECRQM reply for an ANSI mode.
#[must_use]
pub fn ansi_mode_report(number: u16, status: ModeStatus) -> Vec<u8> {
    format!("\x1b[{};{}$y", number, status as u8).into_bytes()
}

/// DECRQSS reply carrying a valid setting payload.
#[must_use]
pub fn status_string(payload: &str) -> Vec<u8> {
    format!("\x1bP1$r{payload}\x1b\\").into_bytes()
}

/// DECRQSS reply for an unrecognized setting.
#[must_use]
pub fn status_string_unknown() -> Vec<u8> {
    b"\x1bP0$r\x1b\\".to_vec()
}

/// XTGETTCAP hit: both capability name and value are hex-encoded.
#[must_use]
pub fn termcap_hit(name: &str, value: &str) -> Vec<u8> {
    format!("\x1bP1+r{}={}\x1b\\", hex(name.as_bytes()), hex(value.as_bytes())).into_bytes()
}

/// XTGETTCAP miss.
#[must_use]
pub fn termcap_miss() -> Vec<u8> {
    b"\x1bP0+r\x1b\\".to_vec()
}

/// OSC 4 palette entry report. Components are doubled to 16 bits per the
/// XParseColor `rgb:` syntax.
#[must_use]
pub fn palette_color(index: u16, (r, g, b): (u8, u8, u8)) -> Vec<u8> {
    format!(
        "\x1b]4;{};rgb:{:02x}{:02x}/{:02x}{:02x}/{:02x}{:02x}\x1b\\",
        index, r, r, g, g, b, b
    )
    .into_bytes()
}

/// OSC 10..19 dynamic color report (same `rgb:` payload, different opcode).
#[must_use]
pub fn dynamic_color(opcode: u16, (r, g, b): (u8, u8, u8)) -> Vec<u8> {
    format!(
        "\x1b]{};rgb:{:02x}{:02x}/{:02x}{:02x}/{:02x}{:02x}\x1b\\",
        opcode, r, r, g, g, b, b
    )
    .into_bytes()
}

/// DECRQTABS / DECST8C tab-stop report: 1-based stops joined by `/`.
#[must_use]
pub fn tab_stop_report(stops: &[u16]) -> Vec<u8> {
    let list = stops
        .iter()
        .map(|s| (s + 1).to_string())
        .collect::<Vec<_>>()
        .join("/");
    format!("\x1bP2$u{list}\x1b\\").into_bytes()
}

/// Upper bound on capture-buffer chunk payloads.
pub const CAPTURE_CHUNK_SIZE: usize = 4096;

/// One OSC 314 capture-buffer chunk.
#[must_use]
pub fn capture_chunk(text: &str) -> Vec<u8> {
    let mut out = b"\x1b]314;".to_vec();
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(b"\x1b\\");
    out
}

/// The empty OSC 314 terminator chunk.
#[must_use]
pub fn capture_end() -> Vec<u8> {
    capture_chunk("")
}

/// OSC 52 clipboard readback: base64 payload for the queried selection.
#[must_use]
pub fn clipboard(selection: &str, base64_data: &str) -> Vec<u8> {
    format!("\x1b]52;{selection};{base64_data}\x1b\\").into_bytes()
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_reports_are_one_based() {
        assert_eq!(cursor_position(1, 2), b"\x1b[2;3R");
        assert_eq!(extended_cursor_position(0, 0), b"\x1b[1;1;1R");
    }

    #[test]
    fn da1_shape() {
        assert_eq!(primary_device_attributes(), b"\x1b[?64;1;4;6;21;22;28;52c");
    }

    #[test]
    fn da2_shape() {
        assert_eq!(secondary_device_attributes(), b"\x1b[>65;1;0c");
    }

    #[test]
    fn mode_reports() {
        assert_eq!(dec_mode_report(2026, ModeStatus::Reset), b"\x1b[?2026;2$y");
        assert_eq!(ansi_mode_report(4, ModeStatus::Set), b"\x1b[4;1$y");
        assert_eq!(
            dec_mode_report(31337, ModeStatus::NotRecognized),
            b"\x1b[?31337;0$y"
        );
    }

    #[test]
    fn status_strings() {
        assert_eq!(status_string("2;4r"), b"\x1bP1$r2;4r\x1b\\");
        assert_eq!(status_string_unknown(), b"\x1bP0$r\x1b\\");
    }

    #[test]
    fn termcap_replies_are_hex() {
        // "Co" = 436F, "256" = 323536.
        assert_eq!(termcap_hit("Co", "256"), b"\x1bP1+r436F=323536\x1b\\");
        assert_eq!(termcap_miss(), b"\x1bP0+r\x1b\\");
    }

    #[test]
    fn palette_color_doubles_components() {
        assert_eq!(
            palette_color(7, (0xAB, 0xCD, 0xEF)),
            b"\x1b]4;7;rgb:abab/cdcd/efef\x1b\\".to_vec()
        );
    }

    #[test]
    fn tab_stop_report_is_one_based() {
        assert_eq!(tab_stop_report(&[8, 16]), b"\x1bP2$u9/17\x1b\\");
        assert_eq!(tab_stop_report(&[]), b"\x1bP2$u\x1b\\");
    }

    #[test]
    fn capture_chunks() {
        assert_eq!(capture_chunk("ab\n"), b"\x1b]314;ab\n\x1b\\".to_vec());
        assert_eq!(capture_end(), b"\x1b]314;\x1b\\".to_vec());
    }
}
