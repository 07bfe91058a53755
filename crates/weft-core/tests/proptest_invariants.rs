//! Property-based invariant tests.
//!
//! These hold for **any** input:
//!
//! 1. The engine never panics on arbitrary byte streams.
//! 2. The main page always holds exactly `lines × columns` cells, and every
//!    wide cell is immediately followed by its continuation.
//! 3. The cursor stays inside the page.
//! 4. History never exceeds its bound.
//! 5. Identical input produces identical state (determinism).
//! 6. Basic round-trip laws: DECSC/DECRC, mode idempotence, repeated
//!    renders, same-size resize.

use proptest::prelude::*;
use weft_core::{Cell, NullHandler, PageSize, Screen, ScreenConfig};

fn engine(lines: u16, columns: u16, max_history: usize) -> Screen<NullHandler> {
    Screen::new(
        ScreenConfig {
            size: PageSize::new(lines, columns),
            max_history: Some(max_history),
            ..ScreenConfig::default()
        },
        NullHandler,
    )
}

fn dims() -> impl Strategy<Value = (u16, u16)> {
    (1u16..=40, 1u16..=100)
}

/// Mixed soup: raw bytes plus fragments that look like real sequences, so
/// the interesting code paths actually run.
fn input() -> impl Strategy<Value = Vec<u8>> {
    let fragment = prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..24),
        Just(b"\x1b[2J".to_vec()),
        Just(b"\x1b[1;1H".to_vec()),
        Just(b"\x1b[5;10r".to_vec()),
        Just(b"\x1b[?1049h".to_vec()),
        Just(b"\x1b[?1049l".to_vec()),
        Just(b"\x1b[38;5;42mhi".to_vec()),
        Just(b"wide \xe4\xb8\xad char".to_vec()),
        Just(b"\x1b[3L\x1b[2M\x1b[4@\x1b[1P".to_vec()),
        Just(b"\r\n\r\n\t\t".to_vec()),
        Just(b"\x1b]0;title\x07".to_vec()),
        Just(b"\x1b[10;20H\x1bD\x1bM".to_vec()),
    ];
    proptest::collection::vec(fragment, 0..12).prop_map(|chunks| chunks.concat())
}

fn assert_page_invariants(screen: &Screen<NullHandler>) {
    let size = screen.size();
    for row in 0..size.lines {
        let line = screen.grid().line(row);
        assert_eq!(line.len(), size.columns, "row {row} has wrong width");
        for col in 0..size.columns {
            let cell = line.cell(col).unwrap();
            if cell.is_wide() {
                assert!(
                    col + 1 < size.columns,
                    "wide lead in the last column at {row},{col}"
                );
                assert!(
                    line.cell(col + 1).unwrap().is_continuation(),
                    "wide lead without continuation at {row},{col}"
                );
            }
        }
    }
    let at = screen.cursor_position();
    assert!(at.line < size.lines, "cursor line {} out of page", at.line);
    assert!(
        at.column < size.columns,
        "cursor column {} out of page",
        at.column
    );
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic_and_keep_invariants(
        (lines, columns) in dims(),
        bytes in input(),
    ) {
        let mut screen = engine(lines, columns, 50);
        screen.process_bytes(&bytes);
        assert_page_invariants(&screen);
        prop_assert!(screen.history_line_count() <= 50);
    }

    #[test]
    fn identical_input_is_deterministic(
        (lines, columns) in dims(),
        bytes in input(),
    ) {
        let mut a = engine(lines, columns, 50);
        let mut b = engine(lines, columns, 50);
        a.process_bytes(&bytes);
        b.process_bytes(&bytes);
        prop_assert_eq!(a.render_main_page_text(), b.render_main_page_text());
        prop_assert_eq!(a.cursor_position(), b.cursor_position());
        prop_assert_eq!(a.history_line_count(), b.history_line_count());
    }

    #[test]
    fn chunking_does_not_change_the_result(
        (lines, columns) in dims(),
        bytes in input(),
        split in any::<prop::sample::Index>(),
    ) {
        let mut whole = engine(lines, columns, 50);
        whole.process_bytes(&bytes);

        let mut split_screen = engine(lines, columns, 50);
        let at = if bytes.is_empty() { 0 } else { split.index(bytes.len()) };
        split_screen.process_bytes(&bytes[..at]);
        split_screen.process_bytes(&bytes[at..]);

        prop_assert_eq!(whole.render_main_page_text(), split_screen.render_main_page_text());
        prop_assert_eq!(whole.cursor_position(), split_screen.cursor_position());
    }

    #[test]
    fn save_restore_cursor_is_identity(
        (lines, columns) in dims(),
        row in 0u16..40,
        col in 0u16..100,
    ) {
        let mut screen = engine(lines, columns, 0);
        let seq = format!("\x1b[{};{}H\x1b[1;4;31m", row + 1, col + 1);
        screen.process_bytes(seq.as_bytes());
        let before_pos = screen.cursor_position();
        let before_attrs = screen.graphics_rendition();
        screen.process_bytes(b"\x1b7\x1b8");
        prop_assert_eq!(screen.cursor_position(), before_pos);
        prop_assert_eq!(screen.graphics_rendition(), before_attrs);
    }

    #[test]
    fn setting_a_mode_twice_equals_once(mode in prop_oneof![Just(6u16), Just(7), Just(25), Just(2004), Just(69)]) {
        let mut once = engine(10, 20, 0);
        let mut twice = engine(10, 20, 0);
        let set = format!("\x1b[?{mode}h");
        once.process_bytes(set.as_bytes());
        twice.process_bytes(set.as_bytes());
        twice.process_bytes(set.as_bytes());
        prop_assert_eq!(once.cursor_position(), twice.cursor_position());
        prop_assert_eq!(
            once.is_mode_enabled(weft_core::DecMode::from_number(mode).unwrap()),
            twice.is_mode_enabled(weft_core::DecMode::from_number(mode).unwrap())
        );
    }

    #[test]
    fn rendering_twice_is_stable(
        (lines, columns) in dims(),
        bytes in input(),
    ) {
        let mut screen = engine(lines, columns, 50);
        screen.process_bytes(&bytes);
        let mut first = String::new();
        screen.render(|cell, _, _| first.extend(cell.to_text()), 0);
        let mut second = String::new();
        screen.render(|cell, _, _| second.extend(cell.to_text()), 0);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn resize_to_same_size_is_identity(
        (lines, columns) in dims(),
        bytes in input(),
    ) {
        let mut screen = engine(lines, columns, 50);
        screen.process_bytes(&bytes);
        let page_before = screen.render_main_page_text();
        let history_before = screen.history_line_count();
        screen.resize_screen(PageSize::new(lines.max(1), columns.max(1)));
        prop_assert_eq!(screen.render_main_page_text(), page_before);
        prop_assert_eq!(screen.history_line_count(), history_before);
    }

    #[test]
    fn non_autowrap_write_never_scrolls(
        columns in 2u16..40,
        start in 0u16..40,
        text in "[a-z]{1,60}",
    ) {
        let mut screen = engine(4, columns, 10);
        let start = start.min(columns - 1);
        let seq = format!("\x1b[?7l\x1b[2;{}H", start + 1);
        screen.process_bytes(seq.as_bytes());
        screen.process_bytes(text.as_bytes());
        // The cursor parks at min(columns-1, start+len-1) and line 1 keeps
        // the cursor; nothing scrolled.
        let expect = (start + text.len() as u16 - 1).min(columns - 1);
        prop_assert_eq!(screen.cursor_position().line, 1);
        prop_assert_eq!(screen.cursor_position().column, expect);
        prop_assert_eq!(screen.history_line_count(), 0);
    }

    #[test]
    fn bulk_scroll_equals_repeated_single_scrolls(
        lines in 2u16..12,
        k in 1u16..12,
    ) {
        let mut bulk = engine(lines, 8, 100);
        let mut single = engine(lines, 8, 100);
        for screen in [&mut bulk, &mut single] {
            for row in 0..lines {
                let seq = format!("\x1b[{};1Hrow{}", row + 1, row);
                screen.process_bytes(seq.as_bytes());
            }
        }
        bulk.process_bytes(format!("\x1b[{k}S").as_bytes());
        for _ in 0..k {
            single.process_bytes(b"\x1b[1S");
        }
        prop_assert_eq!(bulk.render_main_page_text(), single.render_main_page_text());
        prop_assert_eq!(bulk.history_line_count(), single.history_line_count());
    }
}

/// Deterministic smoke check that the wide-cell invariant really is
/// exercised by the strategy above.
#[test]
fn wide_cell_invariant_on_direct_input() {
    let mut screen = engine(3, 4, 0);
    screen.process_bytes("中中中".as_bytes());
    assert_page_invariants(&screen);
    let line = screen.grid().line(0);
    assert!(line.cell(0).unwrap().is_wide());
    assert!(line.cell(1).unwrap().is_continuation());
    assert_eq!(Cell::display_width('中'), 2);
}
