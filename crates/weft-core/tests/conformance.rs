//! End-to-end conformance scenarios: bytes in, screen state and replies out.
//!
//! Each test drives a full engine (parser → sequencer → screen) through a
//! realistic escape-sequence dialogue and asserts on the text projection of
//! the grid, the cursor, and the exact reply bytes.

use weft_core::{
    CellLocation, DecMode, EventHandler, PageSize, Screen, ScreenConfig, ScreenBuffer,
};

/// Handler that records everything the engine emits.
#[derive(Debug, Default)]
struct Recorder {
    replies: Vec<u8>,
    titles: Vec<String>,
    buffers: Vec<ScreenBuffer>,
    bells: usize,
}

impl EventHandler for Recorder {
    fn reply(&mut self, data: &[u8]) {
        self.replies.extend_from_slice(data);
    }
    fn set_window_title(&mut self, title: &str) {
        self.titles.push(title.to_string());
    }
    fn buffer_changed(&mut self, buffer: ScreenBuffer) {
        self.buffers.push(buffer);
    }
    fn bell(&mut self) {
        self.bells += 1;
    }
}

fn screen(lines: u16, columns: u16, max_history: usize) -> Screen<Recorder> {
    Screen::new(
        ScreenConfig {
            size: PageSize::new(lines, columns),
            max_history: Some(max_history),
            ..ScreenConfig::default()
        },
        Recorder::default(),
    )
}

fn rows(s: &Screen<Recorder>) -> Vec<String> {
    (0..s.size().lines)
        .map(|row| s.grid().line(row).text())
        .collect()
}

fn replies(s: &mut Screen<Recorder>) -> Vec<u8> {
    std::mem::take(&mut s.handler_mut().replies)
}

// ── Autowrap off: text exceeding the line overwrites in place ──────

#[test]
fn autowrap_off_overwrites_at_right_margin() {
    let mut s = screen(3, 5, 0);
    s.process_bytes(b"ab");
    s.process_bytes(b"\x1b[?7l");
    assert_eq!(s.cursor_position(), CellLocation::new(0, 2));
    s.process_bytes(b"CDEF");
    assert_eq!(rows(&s)[0], "abCDF");
    assert_eq!(s.cursor_position(), CellLocation::new(0, 4));
}

// ── Autowrap on: wrap fires on the next printable ──────────────────

#[test]
fn autowrap_on_wraps_next_printable() {
    let mut s = screen(2, 3, 0);
    s.process_bytes(b"ABC");
    // The wrap is pending: cursor still shows on the last column.
    assert_eq!(s.cursor_position(), CellLocation::new(0, 2));
    s.process_bytes(b"D");
    assert_eq!(rows(&s), vec!["ABC", "D  "]);
    assert_eq!(s.cursor_position(), CellLocation::new(1, 1));
}

// ── Scrolling into history ──────────────────────────────────────────

#[test]
fn scrolloff_lines_land_in_history() {
    let mut s = screen(2, 5, 5);
    s.process_bytes(b"12345\r\n67890\r\nABCDE\r\nFGHIJ\r\nKLMNO");
    assert_eq!(rows(&s), vec!["FGHIJ", "KLMNO"]);
    assert_eq!(s.history_line_count(), 3);
    assert_eq!(s.grid().absolute_line(-1).unwrap().text(), "ABCDE");
    assert_eq!(s.grid().absolute_line(-2).unwrap().text(), "67890");
    assert_eq!(s.grid().absolute_line(-3).unwrap().text(), "12345");
}

// ── DECSTBM + IND at the region bottom ──────────────────────────────

#[test]
fn index_at_margin_bottom_scrolls_region_only() {
    let mut s = screen(5, 5, 10);
    s.process_bytes(b"12345\r\n67890\r\nABCDE\r\nFGHIJ\r\nKLMNO");
    s.process_bytes(b"\x1b[2;4r");
    s.process_bytes(b"\x1b[4;2H");
    assert_eq!(s.cursor_position(), CellLocation::new(3, 1));
    s.process_bytes(b"\x1bD");
    assert_eq!(s.cursor_position(), CellLocation::new(3, 1));
    assert_eq!(
        rows(&s),
        vec!["12345", "ABCDE", "FGHIJ", "     ", "KLMNO"]
    );
}

// ── DECCRA with an overlapping target ───────────────────────────────

#[test]
fn deccra_overlap_copies_without_self_clobber() {
    let mut s = screen(5, 6, 0);
    s.process_bytes(b"ABCDEF\r\nGHIJKL\r\nMNOPQR\r\nSTUVWX\r\nYZ0123");
    // Copy rows 2..3 cols 2..4 one column right (target row 2, col 3).
    s.process_bytes(b"\x1b[2;2;3;4;;2;3$v");
    assert_eq!(
        rows(&s),
        vec!["ABCDEF", "GHHIJL", "MNNOPR", "STUVWX", "YZ0123"]
    );
}

#[test]
fn deccra_degenerate_rectangle_is_noop() {
    let mut s = screen(3, 5, 0);
    s.process_bytes(b"aaaaa\r\nbbbbb\r\nccccc");
    // bottom < top: nothing happens.
    s.process_bytes(b"\x1b[3;1;2;5;;1;1$v");
    assert_eq!(rows(&s), vec!["aaaaa", "bbbbb", "ccccc"]);
}

// ── OSC 4 palette set + query ───────────────────────────────────────

#[test]
fn osc4_set_then_query_reports_doubled_components() {
    let mut s = screen(2, 5, 0);
    s.process_bytes(b"\x1b]4;7;#abcdef\x1b\\");
    s.process_bytes(b"\x1b]4;7;?\x1b\\");
    assert_eq!(replies(&mut s), b"\x1b]4;7;rgb:abab/cdcd/efef\x1b\\");
}

// ── DSR, plain and origin-relative ──────────────────────────────────

#[test]
fn dsr_reports_cursor_position() {
    let mut s = screen(5, 5, 0);
    s.process_bytes(b"\x1b[2;3H\x1b[6n");
    assert_eq!(replies(&mut s), b"\x1b[2;3R");
}

#[test]
fn dsr_reports_origin_relative_position() {
    let mut s = screen(5, 5, 0);
    s.process_bytes(b"\x1b[2;4r\x1b[?69h\x1b[2;4s\x1b[?6h");
    s.process_bytes(b"\x1b[3;2H\x1b[6n");
    assert_eq!(replies(&mut s), b"\x1b[3;2R");
}

// ── Capture buffer ──────────────────────────────────────────────────

#[test]
fn capture_buffer_emits_chunks_and_terminator() {
    let mut s = screen(2, 5, 5);
    s.process_bytes(b"12345\r\n67890\r\nABCDE\r\nFGHIJ\r\nKLMNO");
    s.capture_buffer(3, false);
    assert_eq!(
        replies(&mut s),
        b"\x1b]314;ABCDE\nFGHIJ\nKLMNO\n\x1b\\\x1b]314;\x1b\\"
    );
}

// ── Boundary behaviors ──────────────────────────────────────────────

#[test]
fn zero_parameter_forms_use_defaults() {
    let mut s = screen(5, 5, 0);
    s.process_bytes(b"\x1b[2;2H");
    s.process_bytes(b"\x1b[A");
    assert_eq!(s.cursor_position(), CellLocation::new(0, 1));
    s.process_bytes(b"\x1b[H");
    assert_eq!(s.cursor_position(), CellLocation::new(0, 0));
    s.process_bytes(b"\x1b[31mx\x1b[my");
    let line = s.grid().line(0);
    assert_ne!(
        line.cell(0).unwrap().attrs.foreground,
        line.cell(1).unwrap().attrs.foreground
    );
    assert_eq!(
        line.cell(1).unwrap().attrs,
        weft_core::GraphicsAttributes::default()
    );
}

#[test]
fn cup_clamps_to_page_corner() {
    let mut s = screen(5, 5, 0);
    s.process_bytes(b"\x1b[99;99H");
    assert_eq!(s.cursor_position(), CellLocation::new(4, 4));
}

#[test]
fn tab_at_right_margin_wraps_iff_autowrap() {
    let mut s = screen(2, 10, 0);
    s.process_bytes(b"\t");
    assert_eq!(s.cursor_position(), CellLocation::new(0, 8));
    // Past the last stop: parks on the right margin.
    s.process_bytes(b"\t");
    assert_eq!(s.cursor_position(), CellLocation::new(0, 9));
    // At the margin with autowrap on: wraps.
    s.process_bytes(b"\t");
    assert_eq!(s.cursor_position(), CellLocation::new(1, 0));
    // Same dance with autowrap off: stays parked.
    s.process_bytes(b"\x1b[?7l\x1b[1;10H\t");
    assert_eq!(s.cursor_position(), CellLocation::new(0, 9));
}

// ── Reports beyond the scenarios ────────────────────────────────────

#[test]
fn device_attributes_replies() {
    let mut s = screen(2, 5, 0);
    s.process_bytes(b"\x1b[c");
    assert_eq!(replies(&mut s), b"\x1b[?64;1;4;6;21;22;28;52c");
    s.process_bytes(b"\x1b[>c");
    assert_eq!(replies(&mut s), b"\x1b[>65;1;0c");
}

#[test]
fn decrqm_reports_mode_states() {
    let mut s = screen(2, 5, 0);
    s.process_bytes(b"\x1b[?7$p");
    assert_eq!(replies(&mut s), b"\x1b[?7;1$y");
    s.process_bytes(b"\x1b[?6$p");
    assert_eq!(replies(&mut s), b"\x1b[?6;2$y");
    s.process_bytes(b"\x1b[?31337$p");
    assert_eq!(replies(&mut s), b"\x1b[?31337;0$y");
    s.process_bytes(b"\x1b[4h\x1b[4$p");
    assert_eq!(replies(&mut s), b"\x1b[4;1$y");
}

#[test]
fn decrqm_reflects_latest_mode_write() {
    let mut s = screen(2, 5, 0);
    for _ in 0..3 {
        s.process_bytes(b"\x1b[?2004h");
        s.process_bytes(b"\x1b[?2004$p");
        assert_eq!(replies(&mut s), b"\x1b[?2004;1$y");
        s.process_bytes(b"\x1b[?2004l");
        s.process_bytes(b"\x1b[?2004$p");
        assert_eq!(replies(&mut s), b"\x1b[?2004;2$y");
    }
}

#[test]
fn decrqss_round_trips_margins_and_sgr() {
    let mut s = screen(24, 80, 0);
    s.process_bytes(b"\x1b[3;10r");
    s.process_bytes(b"\x1bP$qr\x1b\\");
    assert_eq!(replies(&mut s), b"\x1bP1$r3;10r\x1b\\");
    s.process_bytes(b"\x1b[1;31m");
    s.process_bytes(b"\x1bP$qm\x1b\\");
    assert_eq!(replies(&mut s), b"\x1bP1$r0;1;31m\x1b\\");
    s.process_bytes(b"\x1bP$qz\x1b\\");
    assert_eq!(replies(&mut s), b"\x1bP0$r\x1b\\");
}

#[test]
fn xtgettcap_hex_round_trip() {
    let mut s = screen(2, 5, 0);
    // "Co" hex-encoded is 436F.
    s.process_bytes(b"\x1bP+q436F\x1b\\");
    assert_eq!(replies(&mut s), b"\x1bP1+r436F=323536\x1b\\");
    // Unknown capability misses.
    s.process_bytes(b"\x1bP+q5858\x1b\\");
    assert_eq!(replies(&mut s), b"\x1bP0+r\x1b\\");
}

#[test]
fn tab_stop_report_lists_stops() {
    let mut s = screen(2, 20, 0);
    s.process_bytes(b"\x1b[2$w");
    assert_eq!(replies(&mut s), b"\x1bP2$u9/17\x1b\\");
    s.process_bytes(b"\x1b[3g\x1b[1;4H\x1bH\x1b[2$w");
    assert_eq!(replies(&mut s), b"\x1bP2$u4\x1b\\");
    // DECST8C restores the every-8 default.
    s.process_bytes(b"\x1b[?5W\x1b[2$w");
    assert_eq!(replies(&mut s), b"\x1bP2$u9/17\x1b\\");
}

#[test]
fn xtwinops_18_reports_text_area() {
    let mut s = screen(24, 80, 0);
    s.process_bytes(b"\x1b[18t");
    assert_eq!(replies(&mut s), b"\x1b[8;24;80t");
}

// ── Mode save/restore stacks ────────────────────────────────────────

#[test]
fn xtsave_xtrestore_nest_per_mode() {
    let mut s = screen(2, 5, 0);
    s.process_bytes(b"\x1b[?2004h\x1b[?2004s"); // save "on"
    s.process_bytes(b"\x1b[?2004l");
    assert!(!s.is_mode_enabled(DecMode::BracketedPaste));
    s.process_bytes(b"\x1b[?2004r"); // restore -> on
    assert!(s.is_mode_enabled(DecMode::BracketedPaste));
}

// ── Titles, bells, buffers ──────────────────────────────────────────

#[test]
fn titles_and_title_stack() {
    let mut s = screen(2, 5, 0);
    s.process_bytes(b"\x1b]0;first\x07\x1b[22t\x1b]2;second\x1b\\\x1b[23t");
    assert_eq!(s.window_title(), "first");
    assert_eq!(
        s.handler().titles,
        vec!["first".to_string(), "second".to_string(), "first".to_string()]
    );
}

#[test]
fn bell_and_buffer_switch_events_fire() {
    let mut s = screen(2, 5, 0);
    s.process_bytes(b"\x07\x1b[?1049h\x1b[?1049l");
    assert_eq!(s.handler().bells, 1);
    assert_eq!(
        s.handler().buffers,
        vec![ScreenBuffer::Alternate, ScreenBuffer::Primary]
    );
}

// ── Horizontal margins (DECSLRM / DECIC / DECDC) ────────────────────

#[test]
fn horizontal_margins_confine_scrolling() {
    let mut s = screen(3, 6, 10);
    s.process_bytes(b"aaaaaa\r\nbbbbbb\r\ncccccc");
    s.process_bytes(b"\x1b[?69h\x1b[2;5s");
    s.process_bytes(b"\x1b[2S");
    assert_eq!(rows(&s), vec!["acccca", "b    b", "c    c"]);
    // Nothing moved into history: the region is not full-width.
    assert_eq!(s.history_line_count(), 0);
}

#[test]
fn decic_decdc_shift_columns_in_region() {
    let mut s = screen(2, 6, 0);
    s.process_bytes(b"abcdef\r\nghijkl");
    s.process_bytes(b"\x1b[1;3H\x1b[2'}");
    assert_eq!(rows(&s), vec!["ab  cd", "gh  ij"]);
    s.process_bytes(b"\x1b[1;1H\x1b[2'~");
    assert_eq!(rows(&s), vec!["  cd  ", "  ij  "]);
}

// ── ED 2 scrolls into history, ED 3 wipes it ────────────────────────

#[test]
fn ed2_preserves_scrollback_ed3_clears_it() {
    let mut s = screen(2, 3, 10);
    s.process_bytes(b"aa\r\nbb");
    s.process_bytes(b"\x1b[2J");
    assert_eq!(s.history_line_count(), 2);
    assert_eq!(rows(&s), vec!["   ", "   "]);
    s.process_bytes(b"\x1b[3J");
    assert_eq!(s.history_line_count(), 0);
}
