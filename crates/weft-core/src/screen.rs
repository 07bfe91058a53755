//! The screen: every operation's semantics, over grid + cursor + modes.
//!
//! Bytes go in through [`Screen::process_bytes`]; the embedded sequencer
//! turns them into the method calls below; mutations land on the active
//! grid. Everything host-facing leaves through the [`EventHandler`] the
//! screen was built with.
//!
//! Coordinates on this API are 0-based and real (margin-independent); the
//! sequencer has already undone the wire's 1-based forms, and origin-mode
//! translation happens at exactly two places: cursor addressing and
//! position reporting.

use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::cell::{Cell, Color, GraphicsAttributes, HyperlinkId, HyperlinkInfo, HyperlinkStore};
use crate::charsets::Charset;
use crate::coords::{CellLocation, LineOffset, PageSize};
use crate::cursor::{Cursor, SavedCursor};
use crate::events::{
    CursorDisplay, CursorShape, EventHandler, MouseProtocol, MouseTransport, MouseWheelMode,
    ScreenBuffer,
};
use crate::grid::Grid;
use crate::margins::Margins;
use crate::modes::{AnsiMode, DecMode, Modes};
use crate::reply;
use crate::selection::Selection;
use crate::sequencer::Sequencer;
use crate::tabs::TabStops;

/// Variation selectors controlling emoji presentation width.
const VS15_TEXT: char = '\u{FE0E}';
const VS16_EMOJI: char = '\u{FE0F}';

/// Construction-time configuration, supplied by the host and never mutated
/// by escape sequences except where noted.
#[derive(Debug, Clone)]
pub struct ScreenConfig {
    pub size: PageSize,
    /// History bound for the primary buffer; `None` is unbounded.
    pub max_history: Option<usize>,
    pub tab_width: u16,
    /// OSC/DCS payload ceiling fed to the parser.
    pub max_string_len: usize,
    /// Startup palette; OSC 4 edits a copy, OSC 104 restores from here.
    pub palette: [(u8, u8, u8); 256],
    /// Whether VS-16 widens a narrow cell to two columns.
    pub vs16_widens: bool,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            size: PageSize::new(24, 80),
            max_history: Some(10_000),
            tab_width: crate::tabs::DEFAULT_TAB_WIDTH,
            max_string_len: crate::parser::DEFAULT_MAX_STRING_LEN,
            palette: default_palette(),
            vs16_widens: true,
        }
    }
}

/// The xterm-compatible startup palette: 16 base colors, the 6×6×6 cube,
/// and the 24-step gray ramp.
#[must_use]
pub fn default_palette() -> [(u8, u8, u8); 256] {
    let mut palette = [(0, 0, 0); 256];
    const BASE: [(u8, u8, u8); 16] = [
        (0, 0, 0),
        (205, 0, 0),
        (0, 205, 0),
        (205, 205, 0),
        (0, 0, 238),
        (205, 0, 205),
        (0, 205, 205),
        (229, 229, 229),
        (127, 127, 127),
        (255, 0, 0),
        (0, 255, 0),
        (255, 255, 0),
        (92, 92, 255),
        (255, 0, 255),
        (0, 255, 255),
        (255, 255, 255),
    ];
    palette[..16].copy_from_slice(&BASE);
    const CUBE: [u8; 6] = [0, 95, 135, 175, 215, 255];
    for r in 0..6 {
        for g in 0..6 {
            for b in 0..6 {
                palette[16 + 36 * r + 6 * g + b] = (CUBE[r], CUBE[g], CUBE[b]);
            }
        }
    }
    for i in 0..24u16 {
        let v = (8 + i * 10) as u8;
        palette[232 + i as usize] = (v, v, v);
    }
    palette
}

/// The terminal screen engine.
pub struct Screen<H: EventHandler> {
    handler: H,
    sequencer: Sequencer,
    primary: Grid,
    alternate: Grid,
    on_alternate: bool,
    cursor: Cursor,
    /// DECSC/DECRC slot.
    saved_cursor: Option<SavedCursor>,
    /// DECSET 1048/1049 slot.
    alt_saved_cursor: Option<SavedCursor>,
    modes: Modes,
    margins: Margins,
    tabs: TabStops,
    tab_width: u16,
    links: HyperlinkStore,
    current_link: HyperlinkId,
    palette: [(u8, u8, u8); 256],
    default_palette: [(u8, u8, u8); 256],
    /// OSC 10..19 dynamic colors, indexed by opcode − 10.
    dynamic_colors: [Option<(u8, u8, u8)>; 10],
    window_title: String,
    title_stack: Vec<String>,
    /// Cell most recently written by a printable (grapheme continuation
    /// target); cleared by any explicit cursor motion.
    last_written: Option<CellLocation>,
    /// Last printed primary codepoint, for REP.
    last_graphic: Option<char>,
    /// Host-driven selection over the buffer, if any.
    selection: Option<Selection>,
    vs16_widens: bool,
    dirty: bool,
}

impl<H: EventHandler> Screen<H> {
    /// Build a screen over the given handler.
    pub fn new(config: ScreenConfig, handler: H) -> Self {
        let size = config.size;
        Self {
            handler,
            sequencer: Sequencer::new(config.max_string_len),
            primary: Grid::new(size, config.max_history, true),
            alternate: Grid::new(size, Some(0), false),
            on_alternate: false,
            cursor: Cursor::default(),
            saved_cursor: None,
            alt_saved_cursor: None,
            modes: Modes::new(),
            margins: Margins::fullscreen(size),
            tabs: TabStops::with_width(config.tab_width),
            tab_width: config.tab_width,
            links: HyperlinkStore::new(),
            current_link: 0,
            palette: config.palette,
            default_palette: config.palette,
            dynamic_colors: [None; 10],
            window_title: String::new(),
            title_stack: Vec::new(),
            last_written: None,
            last_graphic: None,
            selection: None,
            vs16_widens: config.vs16_widens,
            dirty: false,
        }
    }

    // ── Host surface ────────────────────────────────────────────────

    /// Feed PTY output bytes through the parser and sequencer.
    pub fn process_bytes(&mut self, bytes: &[u8]) {
        let mut sequencer = core::mem::take(&mut self.sequencer);
        sequencer.process_bytes(bytes, self);
        self.sequencer = sequencer;
        self.finish_chunk();
    }

    /// Feed text decoded upstream.
    pub fn process_str(&mut self, text: &str) {
        let mut sequencer = core::mem::take(&mut self.sequencer);
        sequencer.process_str(text, self);
        self.sequencer = sequencer;
        self.finish_chunk();
    }

    fn finish_chunk(&mut self) {
        let size = self.size();
        if self.cursor.position.line >= size.lines || self.cursor.position.column >= size.columns
        {
            debug_assert!(false, "cursor escaped the page: {:?}", self.cursor.position);
            warn!(position = ?self.cursor.position, ?size, "cursor out of bounds; clamping");
            self.handler.dump_state();
            self.cursor.clamp_to(size);
        }
        if self.dirty && !self.modes.dec(DecMode::BatchedRendering) {
            self.dirty = false;
            self.handler.screen_updated();
        }
    }

    /// Page dimensions.
    #[must_use]
    pub fn size(&self) -> PageSize {
        self.grid().size()
    }

    /// The handler, for hosts that need it back.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access to the handler.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// The active grid.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        if self.on_alternate {
            &self.alternate
        } else {
            &self.primary
        }
    }

    /// The primary grid regardless of which is active.
    #[must_use]
    pub fn primary_grid(&self) -> &Grid {
        &self.primary
    }

    /// Whether the alternate buffer is active.
    #[must_use]
    pub fn is_alternate_active(&self) -> bool {
        self.on_alternate
    }

    /// Cursor state.
    #[must_use]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Real cursor position.
    #[must_use]
    pub fn cursor_position(&self) -> CellLocation {
        self.cursor.position
    }

    /// Cursor position relative to the margin origin when DECOM is on.
    #[must_use]
    pub fn logical_cursor_position(&self) -> CellLocation {
        if self.modes.dec(DecMode::Origin) {
            let region = self.region();
            CellLocation::new(
                self.cursor
                    .position
                    .line
                    .saturating_sub(region.vertical.from),
                self.cursor
                    .position
                    .column
                    .saturating_sub(region.horizontal.from),
            )
        } else {
            self.cursor.position
        }
    }

    /// Mode state (read side).
    #[must_use]
    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    /// Host-level mode toggle (same side effects as DECSET/DECRST).
    pub fn set_mode(&mut self, mode: DecMode, enable: bool) {
        self.set_dec_mode_number(mode.number(), enable);
    }

    /// Whether a DEC mode is currently set.
    #[must_use]
    pub fn is_mode_enabled(&self, mode: DecMode) -> bool {
        self.modes.dec(mode)
    }

    /// Lines currently in the primary history ring.
    #[must_use]
    pub fn history_line_count(&self) -> usize {
        self.primary.history_len()
    }

    /// Rebound the history ring.
    pub fn set_max_history_line_count(&mut self, max_lines: Option<usize>) {
        self.primary.set_max_history(max_lines, &mut self.links);
    }

    /// Current window title.
    #[must_use]
    pub fn window_title(&self) -> &str {
        &self.window_title
    }

    /// Hyperlink record behind an id (hit-testing support for hosts).
    #[must_use]
    pub fn hyperlink(&self, id: HyperlinkId) -> Option<&HyperlinkInfo> {
        self.links.get(id)
    }

    /// Install a host-driven selection.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Some(selection);
    }

    /// The active selection, if any.
    #[must_use]
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Drop the active selection.
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Text covered by the active selection.
    #[must_use]
    pub fn selection_text(&self) -> Option<String> {
        self.selection
            .as_ref()
            .map(|selection| selection.extract_text(self.grid()))
    }

    /// Resize both buffers. The primary reflows when TextReflow is set;
    /// the alternate always pads/truncates. Margins reset to the full page.
    pub fn resize_screen(&mut self, new_size: PageSize) {
        if new_size.lines == 0 || new_size.columns == 0 {
            debug!(?new_size, "ignoring resize to zero dimensions");
            return;
        }
        let reflow = self.modes.dec(DecMode::TextReflow);
        let cursor = self.cursor.position;
        let primary_cursor = self.primary.resize(
            new_size,
            if self.on_alternate {
                CellLocation::default()
            } else {
                cursor
            },
            reflow,
            &mut self.links,
        );
        let alternate_cursor = self.alternate.resize(
            new_size,
            if self.on_alternate {
                cursor
            } else {
                CellLocation::default()
            },
            false,
            &mut self.links,
        );
        self.cursor.position = if self.on_alternate {
            alternate_cursor
        } else {
            primary_cursor
        };
        self.cursor.pending_wrap = false;
        self.margins = Margins::fullscreen(new_size);
        self.last_written = None;
        self.selection = None;
        self.dirty = true;
    }

    /// Iterate the viewport for rendering. `scroll_offset` is how many
    /// history lines are scrolled into view; visual row 0 then shows
    /// absolute offset `-scroll_offset`.
    pub fn render(
        &self,
        mut callback: impl FnMut(&Cell, u16, u16),
        scroll_offset: usize,
    ) {
        let size = self.size();
        let scroll_offset = scroll_offset.min(self.grid().history_len());
        for row in 0..size.lines {
            let offset = LineOffset::from(row) - scroll_offset as LineOffset;
            let Some(line) = self.grid().absolute_line(offset) else {
                continue;
            };
            for column in 0..size.columns {
                if let Some(cell) = line.cell(column) {
                    callback(cell, row, column);
                }
            }
        }
    }

    /// Plain-text projection of the main page (rows joined by newlines).
    #[must_use]
    pub fn render_main_page_text(&self) -> String {
        self.grid().page_text().join("\n")
    }

    /// Emit the bottom `line_count` buffer lines as OSC 314 chunks.
    ///
    /// With `logical_lines`, soft-wrapped chains count (and emit) as one
    /// line. Ends with the empty terminator chunk.
    pub fn capture_buffer(&mut self, line_count: u16, logical_lines: bool) {
        let size = self.size();
        let history = self.grid().history_len() as LineOffset;
        let mut text = String::new();
        let mut remaining = i64::from(line_count);
        let mut offset: LineOffset = size.lines as LineOffset - 1;
        let mut lines_rev: Vec<String> = Vec::new();
        while remaining > 0 && offset >= -history {
            let Some(line) = self.grid().absolute_line(offset) else {
                break;
            };
            let mut row_text = line.trimmed_text();
            if logical_lines {
                // Walk the wrap chain upward, prepending continuations.
                let mut head = offset;
                while self
                    .grid()
                    .absolute_line(head)
                    .is_some_and(|l| l.wrapped())
                    && head > -history
                {
                    head -= 1;
                    if let Some(prev) = self.grid().absolute_line(head) {
                        row_text = format!("{}{}", prev.text(), row_text);
                    }
                }
                offset = head;
            }
            lines_rev.push(row_text);
            offset -= 1;
            remaining -= 1;
        }
        for row_text in lines_rev.into_iter().rev() {
            text.push_str(&row_text);
            text.push('\n');
        }
        while text.ends_with("\n\n") {
            text.pop();
        }
        let bytes = text.into_bytes();
        for chunk in bytes.chunks(reply::CAPTURE_CHUNK_SIZE) {
            let chunk = String::from_utf8_lossy(chunk);
            self.reply(reply::capture_chunk(&chunk));
        }
        self.reply(reply::capture_end());
    }

    // ── Margin / origin helpers ─────────────────────────────────────

    /// The effective scroll region: horizontal margins collapse to the full
    /// width unless DECLRMM is enabled.
    fn region(&self) -> Margins {
        let mut region = self.margins;
        if !self.modes.dec(DecMode::LeftRightMargin) {
            region.reset_horizontal(self.size());
        }
        region
    }

    /// Whether DECSLRM is currently permitted.
    #[must_use]
    pub fn left_right_margin_mode(&self) -> bool {
        self.modes.dec(DecMode::LeftRightMargin)
    }

    fn autowrap(&self) -> bool {
        self.modes.dec(DecMode::AutoWrap)
    }

    fn reflow_enabled(&self) -> bool {
        !self.on_alternate && self.modes.dec(DecMode::TextReflow)
    }

    fn bg(&self) -> Color {
        self.cursor.attrs.background
    }

    /// Right margin applicable to the cursor's current position.
    fn right_margin(&self) -> u16 {
        let region = self.region();
        if self.cursor.position.column <= region.horizontal.to {
            region.horizontal.to
        } else {
            self.size().columns - 1
        }
    }

    /// Left margin applicable to the cursor's current position.
    fn left_margin(&self) -> u16 {
        let region = self.region();
        if self.cursor.position.column >= region.horizontal.from {
            region.horizontal.from
        } else {
            0
        }
    }

    /// Home position: margin origin under DECOM, page origin otherwise.
    fn home_position(&self) -> CellLocation {
        if self.modes.dec(DecMode::Origin) {
            let region = self.region();
            CellLocation::new(region.vertical.from, region.horizontal.from)
        } else {
            CellLocation::new(0, 0)
        }
    }

    fn move_cursor_to(&mut self, position: CellLocation) {
        self.cursor.position = position.clamped_to(self.size());
        self.cursor.pending_wrap = false;
        self.last_written = None;
    }

    // ── Printing ────────────────────────────────────────────────────

    /// Write one printable codepoint at the cursor.
    pub fn write_char(&mut self, ch: char) {
        let ch = if (ch as u32) < 0x80 {
            self.cursor.charsets.map(ch)
        } else {
            ch
        };
        self.dirty = true;

        let width = Cell::display_width(ch);
        if width == 0 {
            self.append_zero_width(ch);
            return;
        }
        if self.continues_previous_grapheme(ch) {
            self.append_to_grapheme(ch);
            return;
        }
        self.last_graphic = Some(ch);

        if self.cursor.pending_wrap && self.autowrap() {
            self.wrap_to_next_line();
        }

        let right = self.right_margin();
        let width = u16::from(width);
        let mut column = self.cursor.position.column;
        if width == 2 {
            if right == 0 {
                return;
            }
            if column + 1 > right {
                if self.autowrap() {
                    self.wrap_to_next_line();
                    column = self.cursor.position.column;
                } else {
                    column = right - 1;
                }
            }
        }
        let line_idx = self.cursor.position.line;

        if self.modes.ansi(AnsiMode::Insert) {
            self.shift_cells_right(line_idx, column, right, width);
        }

        let attrs = self.cursor.attrs;
        let link = self.current_link;
        let (grid, links) = self.grid_and_links();
        let bg = attrs.background;
        // Overwriting half of a wide pair clears the stranded half.
        grid.drop_orphan_pair(line_idx, column, bg, links);
        if width == 2 {
            grid.drop_orphan_pair(line_idx, column + 1, bg, links);
        }
        if let Some(cell) = grid.cell_mut(CellLocation::new(line_idx, column)) {
            links.release(cell.hyperlink);
            links.acquire(link);
            cell.write(ch, width as u8, attrs, link);
        }
        if width == 2 {
            if let Some(cell) = grid.cell_mut(CellLocation::new(line_idx, column + 1)) {
                links.release(cell.hyperlink);
                links.acquire(link);
                cell.make_continuation(attrs, link);
            }
        }

        if self.reflow_enabled() {
            self.grid_mut().line_mut(line_idx).set_wrappable(true);
        }
        self.last_written = Some(CellLocation::new(line_idx, column));

        let next = column + width;
        if next > right {
            if self.autowrap() {
                self.cursor.position.column = right.min(column);
                self.cursor.pending_wrap = true;
            } else {
                self.cursor.position.column = right;
                self.cursor.pending_wrap = false;
            }
        } else {
            self.cursor.position.column = next;
            self.cursor.pending_wrap = next > right;
        }
    }

    /// REP: repeat the last printed graphic character.
    pub fn repeat_last_graphic(&mut self, count: u16) {
        let Some(ch) = self.last_graphic else {
            return;
        };
        let cap = u32::from(self.size().columns) * u32::from(self.size().lines);
        for _ in 0..u32::from(count).min(cap) {
            self.write_char(ch);
        }
    }

    fn wrap_to_next_line(&mut self) {
        let reflow = self.reflow_enabled();
        let line = self.cursor.position.line;
        if reflow {
            self.grid_mut().line_mut(line).set_wrappable(true);
        }
        self.line_feed_with_column(Some(self.left_margin()));
        if reflow {
            let line = self.cursor.position.line;
            self.grid_mut().line_mut(line).set_wrapped(true);
        }
        self.cursor.pending_wrap = false;
    }

    /// Zero-width input (combining marks, ZWJ, variation selectors) joins
    /// the previously written grapheme.
    fn append_zero_width(&mut self, ch: char) {
        let Some(at) = self.last_written else {
            return;
        };
        let vs16 = self.vs16_widens;
        let (grid, _) = self.grid_and_links();
        let Some(cell) = grid.cell_mut(at) else {
            return;
        };
        if ch == VS15_TEXT {
            // VS-15 selects text presentation but an already-wide cell
            // keeps its width.
            if !cell.push_codepoint(ch) {
                debug!("dropping codepoint past per-cell cap");
            }
            return;
        }
        if !cell.push_codepoint(ch) {
            debug!("dropping codepoint past per-cell cap");
            return;
        }
        if ch == VS16_EMOJI && vs16 && cell.width() == 1 {
            self.widen_last_written(at);
        }
    }

    /// VS-16 upgraded a narrow cell to emoji presentation: claim the next
    /// column as its continuation and push the cursor along.
    fn widen_last_written(&mut self, at: CellLocation) {
        let size = self.size();
        if at.column + 1 >= size.columns {
            return;
        }
        let attrs;
        let link;
        {
            let (grid, links) = self.grid_and_links();
            let Some(cell) = grid.cell_mut(at) else {
                return;
            };
            cell.set_width(2);
            attrs = cell.attrs;
            link = cell.hyperlink;
            let bg = attrs.background;
            grid.drop_orphan_pair(at.line, at.column + 1, bg, links);
            if let Some(next) = grid.cell_mut(CellLocation::new(at.line, at.column + 1)) {
                links.release(next.hyperlink);
                links.acquire(link);
                next.make_continuation(attrs, link);
            }
        }
        if self.cursor.position.line == at.line && self.cursor.position.column == at.column + 1 {
            let right = self.right_margin();
            if at.column + 2 > right {
                self.cursor.position.column = right;
                self.cursor.pending_wrap = self.autowrap();
            } else {
                self.cursor.position.column = at.column + 2;
            }
        }
    }

    /// Does `ch` extend the grapheme in the last-written cell (ZWJ chains,
    /// regional-indicator pairs)?
    fn continues_previous_grapheme(&self, ch: char) -> bool {
        let Some(at) = self.last_written else {
            return false;
        };
        if self.cursor.pending_wrap {
            return false;
        }
        let Some(cell) = self.grid().cell(at) else {
            return false;
        };
        if cell.is_blank() {
            return false;
        }
        // Joined iff the whole cluster plus `ch` is still one grapheme; the
        // full prefix matters (GB11 needs the pictograph before a ZWJ).
        let mut probe: String = cell.codepoints().iter().collect();
        probe.push(ch);
        probe.graphemes(true).count() == 1
    }

    fn append_to_grapheme(&mut self, ch: char) {
        let Some(at) = self.last_written else {
            return;
        };
        let (grid, _) = self.grid_and_links();
        if let Some(cell) = grid.cell_mut(at) {
            if !cell.push_codepoint(ch) {
                debug!("dropping codepoint past per-cell cap");
            }
        }
    }

    /// IRM: slide cells right within the line before an insert write.
    fn shift_cells_right(&mut self, line: u16, at: u16, right: u16, count: u16) {
        let old: Vec<Cell> = self.grid().line(line).cells()[usize::from(at)..=usize::from(right)]
            .to_vec();
        let bg = self.bg();
        let mut fresh: Vec<Cell> = Vec::with_capacity(old.len());
        for _ in 0..count.min(right - at + 1) {
            let mut blank = Cell::default();
            blank.erase(bg);
            fresh.push(blank);
        }
        fresh.extend_from_slice(&old[..old.len() - fresh.len()]);
        self.replace_row_segment(line, at, &fresh);
    }

    /// Replace `[at .. at+len)` of a row, fixing hyperlink refcounts.
    fn replace_row_segment(&mut self, line: u16, at: u16, cells: &[Cell]) {
        let (grid, links) = self.grid_and_links();
        for (i, cell) in cells.iter().enumerate() {
            let column = at + i as u16;
            if let Some(dst) = grid.cell_mut(CellLocation::new(line, column)) {
                links.release(dst.hyperlink);
                links.acquire(cell.hyperlink);
                *dst = cell.clone();
            }
        }
    }

    fn grid_mut(&mut self) -> &mut Grid {
        if self.on_alternate {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    fn grid_and_links(&mut self) -> (&mut Grid, &mut HyperlinkStore) {
        let grid = if self.on_alternate {
            &mut self.alternate
        } else {
            &mut self.primary
        };
        (grid, &mut self.links)
    }

    // ── C0 ──────────────────────────────────────────────────────────

    /// BEL.
    pub fn bell(&mut self) {
        self.handler.bell();
    }

    /// BS: one column left, stopping at the left margin.
    pub fn backspace(&mut self) {
        let left = self.left_margin();
        if self.cursor.position.column > left {
            self.cursor.position.column -= 1;
        }
        self.cursor.pending_wrap = false;
        self.last_written = None;
    }

    /// HT: advance to the next tab stop, or the right margin, or wrap.
    pub fn horizontal_tab(&mut self) {
        self.tab_forward(1);
    }

    /// CHT.
    pub fn tab_forward(&mut self, count: u16) {
        for _ in 0..count.max(1) {
            let right = self.right_margin();
            let column = self.cursor.position.column;
            match self.tabs.next_stop(column, right + 1) {
                Some(stop) => self.cursor.position.column = stop.min(right),
                None if column < right => self.cursor.position.column = right,
                None => {
                    if self.autowrap() {
                        self.line_feed_with_column(Some(self.left_margin()));
                    }
                }
            }
        }
        self.cursor.pending_wrap = false;
        self.last_written = None;
    }

    /// CBT.
    pub fn tab_backward(&mut self, count: u16) {
        for _ in 0..count.max(1) {
            let column = self.cursor.position.column;
            self.cursor.position.column = self.tabs.previous_stop(column).max(self.left_margin());
        }
        self.cursor.pending_wrap = false;
        self.last_written = None;
    }

    /// LF/VT/FF. With AutomaticNewLine the column also returns to the left
    /// margin; otherwise it is preserved.
    pub fn linefeed(&mut self) {
        let column = if self.modes.ansi(AnsiMode::AutomaticNewLine) {
            Some(self.left_margin())
        } else {
            None
        };
        self.end_logical_line();
        self.line_feed_with_column(column);
    }

    /// An explicit line break ends the logical line: the row the cursor
    /// leaves must not merge with its successor on reflow. Soft wraps skip
    /// this.
    fn end_logical_line(&mut self) {
        if self.reflow_enabled() {
            let line = self.cursor.position.line;
            self.grid_mut().line_mut(line).set_wrappable(false);
        }
    }

    fn line_feed_with_column(&mut self, column: Option<u16>) {
        let region = self.region();
        let line = self.cursor.position.line;
        if line == region.vertical.to {
            self.scroll_region_up(1);
        } else if line < self.size().lines - 1 {
            self.cursor.position.line += 1;
        }
        if let Some(column) = column {
            self.cursor.position.column = column;
        }
        self.cursor.pending_wrap = false;
        self.last_written = None;
        self.dirty = true;
    }

    /// CR: to the left margin (or column 0 when left of it).
    pub fn carriage_return(&mut self) {
        self.cursor.position.column = self.left_margin();
        self.cursor.pending_wrap = false;
        self.last_written = None;
    }

    /// IND.
    pub fn index(&mut self) {
        self.end_logical_line();
        self.line_feed_with_column(None);
    }

    /// RI: one line up, scrolling down at the top margin.
    pub fn reverse_index(&mut self) {
        let region = self.region();
        let line = self.cursor.position.line;
        if line == region.vertical.from {
            self.scroll_region_down(1);
        } else if line > 0 {
            self.cursor.position.line -= 1;
        }
        self.cursor.pending_wrap = false;
        self.last_written = None;
        self.dirty = true;
    }

    /// NEL.
    pub fn next_line(&mut self) {
        self.end_logical_line();
        self.line_feed_with_column(Some(self.left_margin()));
    }

    // ── Cursor motion ───────────────────────────────────────────────

    /// CUU: up, stopping at the top margin (or page top from above it).
    pub fn move_up(&mut self, count: u16) {
        let region = self.region();
        let floor = if self.cursor.position.line >= region.vertical.from {
            region.vertical.from
        } else {
            0
        };
        self.cursor.position.line = self
            .cursor
            .position
            .line
            .saturating_sub(count.max(1))
            .max(floor);
        self.cursor.pending_wrap = false;
        self.last_written = None;
    }

    /// CUD.
    pub fn move_down(&mut self, count: u16) {
        let region = self.region();
        let ceil = if self.cursor.position.line <= region.vertical.to {
            region.vertical.to
        } else {
            self.size().lines - 1
        };
        self.cursor.position.line = self
            .cursor
            .position
            .line
            .saturating_add(count.max(1))
            .min(ceil);
        self.cursor.pending_wrap = false;
        self.last_written = None;
    }

    /// CUF.
    pub fn move_forward(&mut self, count: u16) {
        let right = self.right_margin();
        self.cursor.position.column = self
            .cursor
            .position
            .column
            .saturating_add(count.max(1))
            .min(right);
        self.cursor.pending_wrap = false;
        self.last_written = None;
    }

    /// CUB.
    pub fn move_backward(&mut self, count: u16) {
        let left = self.left_margin();
        self.cursor.position.column = self
            .cursor
            .position
            .column
            .saturating_sub(count.max(1))
            .max(left);
        self.cursor.pending_wrap = false;
        self.last_written = None;
    }

    /// CNL.
    pub fn cursor_next_line(&mut self, count: u16) {
        self.move_down(count);
        self.cursor.position.column = self.left_margin();
    }

    /// CPL.
    pub fn cursor_prev_line(&mut self, count: u16) {
        self.move_up(count);
        self.cursor.position.column = self.left_margin();
    }

    /// CUP/HVP, logical coordinates in, real position out.
    pub fn move_to(&mut self, line: u16, column: u16) {
        let target = if self.modes.dec(DecMode::Origin) {
            let region = self.region();
            CellLocation::new(
                (region.vertical.from + line).min(region.vertical.to),
                (region.horizontal.from + column).min(region.horizontal.to),
            )
        } else {
            CellLocation::new(line, column)
        };
        self.move_cursor_to(target);
    }

    /// CHA/HPA.
    pub fn move_to_column(&mut self, column: u16) {
        let line = self.logical_cursor_position().line;
        self.move_to(line, column);
    }

    /// VPA.
    pub fn move_to_line(&mut self, line: u16) {
        let column = self.logical_cursor_position().column;
        self.move_to(line, column);
    }

    /// HPR.
    pub fn move_column_relative(&mut self, count: u16) {
        self.move_forward(count);
    }

    /// VPR.
    pub fn move_line_relative(&mut self, count: u16) {
        self.move_down(count);
    }

    // ── Save / restore ──────────────────────────────────────────────

    /// DECSC.
    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some(SavedCursor::capture(
            &self.cursor,
            self.modes.dec(DecMode::AutoWrap),
            self.modes.dec(DecMode::Origin),
        ));
    }

    /// DECRC. Restoring with nothing saved resets to defaults.
    pub fn restore_cursor(&mut self) {
        let saved = self.saved_cursor.clone().unwrap_or_default();
        self.apply_saved_cursor(&saved);
    }

    fn apply_saved_cursor(&mut self, saved: &SavedCursor) {
        let size = self.size();
        saved.restore_into(&mut self.cursor, size);
        self.modes.set_dec(DecMode::AutoWrap, saved.autowrap);
        self.modes.set_dec(DecMode::Origin, saved.origin);
        self.last_written = None;
    }

    // ── Erase ───────────────────────────────────────────────────────

    /// ED. Mode 2 scrolls the page into history on the primary buffer;
    /// mode 3 wipes the history ring only.
    pub fn erase_in_display(&mut self, mode: u16) {
        let size = self.size();
        let at = self.cursor.position;
        let bg = self.bg();
        self.dirty = true;
        match mode {
            0 => {
                let (grid, links) = self.grid_and_links();
                grid.erase_row_range(at.line, at.column, size.columns - 1, bg, links);
                for line in at.line + 1..size.lines {
                    grid.erase_row_range(line, 0, size.columns - 1, bg, links);
                }
            }
            1 => {
                let (grid, links) = self.grid_and_links();
                for line in 0..at.line {
                    grid.erase_row_range(line, 0, size.columns - 1, bg, links);
                }
                grid.erase_row_range(at.line, 0, at.column, bg, links);
            }
            2 => {
                if self.on_alternate {
                    let (grid, links) = self.grid_and_links();
                    grid.reset_page(bg, links);
                } else {
                    let into_history = true;
                    let (grid, links) = self.grid_and_links();
                    grid.scroll_up(0, size.lines - 1, size.lines, bg, into_history, links);
                }
            }
            3 => {
                let (grid, links) = self.grid_and_links();
                grid.clear_history(links);
                self.handler.scrollback_cleared();
            }
            other => debug!(other, "unhandled ED mode"),
        }
        self.cursor.pending_wrap = false;
    }

    /// EL.
    pub fn erase_in_line(&mut self, mode: u16) {
        let size = self.size();
        let at = self.cursor.position;
        let bg = self.bg();
        self.dirty = true;
        let (grid, links) = self.grid_and_links();
        match mode {
            0 => grid.erase_row_range(at.line, at.column, size.columns - 1, bg, links),
            1 => grid.erase_row_range(at.line, 0, at.column, bg, links),
            2 => grid.erase_row_range(at.line, 0, size.columns - 1, bg, links),
            other => debug!(other, "unhandled EL mode"),
        }
        self.cursor.pending_wrap = false;
    }

    /// ECH: erase in place, no shifting.
    pub fn erase_chars(&mut self, count: u16) {
        let at = self.cursor.position;
        let end = at
            .column
            .saturating_add(count.max(1))
            .saturating_sub(1)
            .min(self.size().columns - 1);
        let bg = self.bg();
        self.dirty = true;
        let (grid, links) = self.grid_and_links();
        grid.erase_row_range(at.line, at.column, end, bg, links);
        self.cursor.pending_wrap = false;
    }

    // ── Insert / delete ─────────────────────────────────────────────

    /// IL: blank lines open at the cursor, within the vertical margins.
    pub fn insert_lines(&mut self, count: u16) {
        let region = self.region();
        if !region.vertical.contains(self.cursor.position.line) {
            return;
        }
        let top = self.cursor.position.line;
        let bg = self.bg();
        let full_width = region.is_full_width(self.size());
        let (grid, links) = self.grid_and_links();
        if full_width {
            grid.scroll_down(top, region.vertical.to, count.max(1), bg, links);
        } else {
            grid.scroll_rect_down(
                top,
                region.vertical.to,
                region.horizontal.from,
                region.horizontal.to,
                count.max(1),
                bg,
                links,
            );
        }
        self.cursor.pending_wrap = false;
        self.last_written = None;
        self.dirty = true;
    }

    /// DL.
    pub fn delete_lines(&mut self, count: u16) {
        let region = self.region();
        if !region.vertical.contains(self.cursor.position.line) {
            return;
        }
        let top = self.cursor.position.line;
        let bg = self.bg();
        let full_width = region.is_full_width(self.size());
        let (grid, links) = self.grid_and_links();
        if full_width {
            grid.scroll_up(top, region.vertical.to, count.max(1), bg, false, links);
        } else {
            grid.scroll_rect_up(
                top,
                region.vertical.to,
                region.horizontal.from,
                region.horizontal.to,
                count.max(1),
                bg,
                links,
            );
        }
        self.cursor.pending_wrap = false;
        self.last_written = None;
        self.dirty = true;
    }

    /// ICH: blanks open at the cursor, content slides toward the right
    /// margin and off it.
    pub fn insert_chars(&mut self, count: u16) {
        let at = self.cursor.position;
        let right = self.right_margin();
        if at.column > right {
            return;
        }
        let span = usize::from(right - at.column + 1);
        let n = usize::from(count.max(1)).min(span);
        let old: Vec<Cell> =
            self.grid().line(at.line).cells()[usize::from(at.column)..=usize::from(right)].to_vec();
        let bg = self.bg();
        let mut fresh = Vec::with_capacity(span);
        for _ in 0..n {
            let mut blank = Cell::default();
            blank.erase(bg);
            fresh.push(blank);
        }
        fresh.extend_from_slice(&old[..span - n]);
        self.replace_row_segment(at.line, at.column, &fresh);
        self.fix_segment_edges(at.line, at.column, right);
        self.cursor.pending_wrap = false;
        self.dirty = true;
    }

    /// DCH: cells at the cursor vanish, content slides in from the right
    /// margin, blanks fill the gap.
    pub fn delete_chars(&mut self, count: u16) {
        let at = self.cursor.position;
        let right = self.right_margin();
        if at.column > right {
            return;
        }
        let span = usize::from(right - at.column + 1);
        let n = usize::from(count.max(1)).min(span);
        let old: Vec<Cell> =
            self.grid().line(at.line).cells()[usize::from(at.column)..=usize::from(right)].to_vec();
        let bg = self.bg();
        let mut fresh: Vec<Cell> = old[n..].to_vec();
        for _ in 0..n {
            let mut blank = Cell::default();
            blank.erase(bg);
            fresh.push(blank);
        }
        self.replace_row_segment(at.line, at.column, &fresh);
        self.fix_segment_edges(at.line, at.column, right);
        self.cursor.pending_wrap = false;
        self.dirty = true;
    }

    /// After a segment shift, stranded wide halves at either edge are
    /// cleaned up.
    fn fix_segment_edges(&mut self, line: u16, left: u16, right: u16) {
        let bg = self.bg();
        let (grid, links) = self.grid_and_links();
        grid.repair_pair_seam(line, left, bg, links);
        if grid
            .cell(CellLocation::new(line, right))
            .is_some_and(Cell::is_wide)
        {
            if let Some(lead) = grid.cell_mut(CellLocation::new(line, right)) {
                links.release(lead.hyperlink);
                lead.erase(bg);
            }
        }
    }

    /// DECIC: blank columns open at the cursor within the scroll region.
    pub fn insert_columns(&mut self, count: u16) {
        let region = self.region();
        if !region.contains(self.cursor.position) {
            return;
        }
        let at = self.cursor.position.column;
        let right = region.horizontal.to;
        let span = usize::from(right - at + 1);
        let n = usize::from(count.max(1)).min(span);
        let bg = self.bg();
        for line in region.vertical.from..=region.vertical.to {
            let old: Vec<Cell> =
                self.grid().line(line).cells()[usize::from(at)..=usize::from(right)].to_vec();
            let mut fresh = Vec::with_capacity(span);
            for _ in 0..n {
                let mut blank = Cell::default();
                blank.erase(bg);
                fresh.push(blank);
            }
            fresh.extend_from_slice(&old[..span - n]);
            self.replace_row_segment(line, at, &fresh);
            self.fix_segment_edges(line, at, right);
        }
        self.dirty = true;
    }

    /// DECDC.
    pub fn delete_columns(&mut self, count: u16) {
        let region = self.region();
        if !region.contains(self.cursor.position) {
            return;
        }
        let at = self.cursor.position.column;
        let right = region.horizontal.to;
        let span = usize::from(right - at + 1);
        let n = usize::from(count.max(1)).min(span);
        let bg = self.bg();
        for line in region.vertical.from..=region.vertical.to {
            let old: Vec<Cell> =
                self.grid().line(line).cells()[usize::from(at)..=usize::from(right)].to_vec();
            let mut fresh: Vec<Cell> = old[n..].to_vec();
            for _ in 0..n {
                let mut blank = Cell::default();
                blank.erase(bg);
                fresh.push(blank);
            }
            self.replace_row_segment(line, at, &fresh);
            self.fix_segment_edges(line, at, right);
        }
        self.dirty = true;
    }

    // ── Scrolling ───────────────────────────────────────────────────

    /// SU.
    pub fn scroll_up(&mut self, count: u16) {
        self.scroll_region_up(count.max(1));
        self.cursor.pending_wrap = false;
    }

    /// SD.
    pub fn scroll_down(&mut self, count: u16) {
        self.scroll_region_down(count.max(1));
        self.cursor.pending_wrap = false;
    }

    fn scroll_region_up(&mut self, count: u16) {
        let region = self.region();
        let size = self.size();
        let bg = self.bg();
        let full_width = region.is_full_width(size);
        let into_history = full_width && !self.on_alternate;
        let (grid, links) = self.grid_and_links();
        if full_width {
            grid.scroll_up(
                region.vertical.from,
                region.vertical.to,
                count,
                bg,
                into_history,
                links,
            );
        } else {
            grid.scroll_rect_up(
                region.vertical.from,
                region.vertical.to,
                region.horizontal.from,
                region.horizontal.to,
                count,
                bg,
                links,
            );
        }
        self.dirty = true;
    }

    fn scroll_region_down(&mut self, count: u16) {
        let region = self.region();
        let size = self.size();
        let bg = self.bg();
        let (grid, links) = self.grid_and_links();
        if region.is_full_width(size) {
            grid.scroll_down(region.vertical.from, region.vertical.to, count, bg, links);
        } else {
            grid.scroll_rect_down(
                region.vertical.from,
                region.vertical.to,
                region.horizontal.from,
                region.horizontal.to,
                count,
                bg,
                links,
            );
        }
        self.dirty = true;
    }

    // ── Margins ─────────────────────────────────────────────────────

    /// DECSTBM. `bottom: None` means the page bottom. Cursor homes.
    pub fn set_vertical_margins(&mut self, top: u16, bottom: Option<u16>) {
        let size = self.size();
        let bottom = bottom.unwrap_or(size.lines - 1);
        if self.margins.set_vertical(top, bottom, size) {
            let home = self.home_position();
            self.move_cursor_to(home);
        }
    }

    /// DECSLRM (only reachable while DECLRMM is set). Cursor homes.
    pub fn set_horizontal_margins(&mut self, left: u16, right: Option<u16>) {
        let size = self.size();
        let right = right.unwrap_or(size.columns - 1);
        if self.margins.set_horizontal(left, right, size) {
            let home = self.home_position();
            self.move_cursor_to(home);
        }
    }

    // ── Rectangles ──────────────────────────────────────────────────

    fn clamp_rect(&self, top: u16, left: u16, bottom: u16, right: u16) -> Option<(u16, u16, u16, u16)> {
        let size = self.size();
        let (mut top, mut left, mut bottom, mut right) = (top, left, bottom, right);
        if self.modes.dec(DecMode::Origin) {
            let region = self.region();
            top = top.saturating_add(region.vertical.from);
            bottom = bottom.saturating_add(region.vertical.from);
            left = left.saturating_add(region.horizontal.from);
            right = right.saturating_add(region.horizontal.from);
        }
        let bottom = bottom.min(size.lines - 1);
        let right = right.min(size.columns - 1);
        // Degenerate rectangles are a no-op per the DEC manuals.
        if top > bottom || left > right {
            return None;
        }
        Some((top, left, bottom, right))
    }

    /// DECCRA: copy a rectangle; overlapping copies pick a direction that
    /// never reads an already-written cell.
    pub fn copy_rectangular_area(
        &mut self,
        top: u16,
        left: u16,
        bottom: u16,
        right: u16,
        target_top: u16,
        target_left: u16,
    ) {
        let Some((top, left, bottom, right)) = self.clamp_rect(top, left, bottom, right) else {
            return;
        };
        let (target_top, target_left) = if self.modes.dec(DecMode::Origin) {
            let region = self.region();
            (
                target_top.saturating_add(region.vertical.from),
                target_left.saturating_add(region.horizontal.from),
            )
        } else {
            (target_top, target_left)
        };
        let size = self.size();
        if target_top >= size.lines || target_left >= size.columns {
            return;
        }
        let height = (bottom - top + 1).min(size.lines - target_top);
        let width = (right - left + 1).min(size.columns - target_left);

        let rows: Vec<u16> = if target_top > top {
            (0..height).rev().collect()
        } else {
            (0..height).collect()
        };
        let cols: Vec<u16> = if target_left > left {
            (0..width).rev().collect()
        } else {
            (0..width).collect()
        };
        for &dr in &rows {
            for &dc in &cols {
                let src = CellLocation::new(top + dr, left + dc);
                let dst = CellLocation::new(target_top + dr, target_left + dc);
                let cell = self.grid().cell(src).cloned().unwrap_or_default();
                let (grid, links) = self.grid_and_links();
                if let Some(target) = grid.cell_mut(dst) {
                    links.release(target.hyperlink);
                    links.acquire(cell.hyperlink);
                    *target = cell;
                }
            }
        }
        // Wide pairs cut by the source or target edges cannot survive
        // half-copied.
        let bg = self.bg();
        for dr in 0..height {
            let row = target_top + dr;
            let (grid, links) = self.grid_and_links();
            grid.repair_pair_seam(row, target_left, bg, links);
            grid.repair_pair_seam(row, target_left + width, bg, links);
            let last = target_left + width - 1;
            if grid
                .cell(CellLocation::new(row, last))
                .is_some_and(Cell::is_wide)
            {
                if let Some(lead) = grid.cell_mut(CellLocation::new(row, last)) {
                    links.release(lead.hyperlink);
                    lead.erase(bg);
                }
            }
        }
        self.dirty = true;
    }

    /// DECFRA: fill a rectangle with a character in the current rendition.
    pub fn fill_rectangular_area(&mut self, ch: u16, top: u16, left: u16, bottom: u16, right: u16) {
        // Valid fill characters per DEC: printable ASCII and Latin-1.
        let valid = (32..=126).contains(&ch) || (160..=255).contains(&ch);
        if !valid {
            debug!(ch, "DECFRA fill character out of range");
            return;
        }
        let Some(ch) = char::from_u32(u32::from(ch)) else {
            return;
        };
        let Some((top, left, bottom, right)) = self.clamp_rect(top, left, bottom, right) else {
            return;
        };
        let attrs = self.cursor.attrs;
        let (grid, links) = self.grid_and_links();
        for line in top..=bottom {
            for column in left..=right {
                if let Some(cell) = grid.cell_mut(CellLocation::new(line, column)) {
                    links.release(cell.hyperlink);
                    cell.write(ch, 1, attrs, 0);
                }
            }
        }
        self.dirty = true;
    }

    /// DECERA: reset a rectangle to spaces with default rendition.
    pub fn erase_rectangular_area(&mut self, top: u16, left: u16, bottom: u16, right: u16) {
        let Some((top, left, bottom, right)) = self.clamp_rect(top, left, bottom, right) else {
            return;
        };
        let (grid, links) = self.grid_and_links();
        for line in top..=bottom {
            grid.erase_row_range(line, left, right, Color::Default, links);
        }
        self.dirty = true;
    }

    /// DECALN: fill the page with 'E', reset margins, home the cursor.
    pub fn screen_alignment_pattern(&mut self) {
        let size = self.size();
        {
            let (grid, links) = self.grid_and_links();
            for row in 0..size.lines {
                links.release_cells(grid.line(row).cells().to_vec().as_slice());
                grid.line_mut(row).fill('E', GraphicsAttributes::default());
            }
        }
        self.margins = Margins::fullscreen(size);
        self.move_cursor_to(CellLocation::new(0, 0));
        self.dirty = true;
    }

    // ── Charsets ────────────────────────────────────────────────────

    /// SCS: designate a charset into G0..G3.
    pub fn designate_charset(&mut self, slot: usize, designator: u8) {
        match Charset::from_designator(designator) {
            Some(charset) => self.cursor.charsets.designate(slot, charset),
            None => debug!(slot, designator, "unknown charset designator"),
        }
    }

    /// SI/SO/LS2/LS3.
    pub fn locking_shift(&mut self, slot: usize) {
        self.cursor.charsets.locking_shift(slot);
    }

    /// SS2/SS3.
    pub fn single_shift(&mut self, slot: usize) {
        self.cursor.charsets.single_shift(slot);
    }

    // ── Tabs ────────────────────────────────────────────────────────

    /// HTS.
    pub fn set_tab_stop(&mut self) {
        let columns = self.size().columns;
        self.tabs.set_stop(self.cursor.position.column, columns);
    }

    /// TBC.
    pub fn clear_tab_stop(&mut self, mode: u16) {
        let columns = self.size().columns;
        match mode {
            0 => self.tabs.clear_stop(self.cursor.position.column, columns),
            3 => self.tabs.clear_all(),
            other => debug!(other, "unhandled TBC mode"),
        }
    }

    /// DECST8C: back to a stop every eight columns.
    pub fn reset_tab_stops(&mut self) {
        self.tabs.reset(self.tab_width);
    }

    // ── Modes ───────────────────────────────────────────────────────

    /// SM/RM.
    pub fn set_ansi_mode_number(&mut self, number: u16, enable: bool) {
        match AnsiMode::from_number(number) {
            Some(mode) => self.modes.set_ansi(mode, enable),
            None => {
                self.modes.note_unrecognized(number);
                debug!(number, enable, "unknown ANSI mode");
            }
        }
    }

    /// DECSET/DECRST, with each mode's side effects.
    pub fn set_dec_mode_number(&mut self, number: u16, enable: bool) {
        let Some(mode) = DecMode::from_number(number) else {
            self.modes.note_unrecognized(number);
            debug!(number, enable, "unknown DEC mode");
            return;
        };
        self.modes.set_dec(mode, enable);
        match mode {
            DecMode::Origin => {
                let home = self.home_position();
                self.move_cursor_to(home);
            }
            DecMode::LeftRightMargin => {
                if !enable {
                    let size = self.size();
                    self.margins.reset_horizontal(size);
                }
            }
            DecMode::Columns132 => {
                if self.modes.dec(DecMode::AllowColumns80to132) {
                    let columns = if enable { 132 } else { 80 };
                    let lines = self.size().lines;
                    self.resize_screen(PageSize::new(lines, columns));
                    let bg = self.bg();
                    let (grid, links) = self.grid_and_links();
                    grid.reset_page(bg, links);
                    self.move_cursor_to(CellLocation::new(0, 0));
                }
            }
            DecMode::UseAlternateScreen => self.activate_alternate(enable),
            DecMode::AlternateScreenClear => {
                if enable {
                    self.activate_alternate(true);
                } else {
                    if self.on_alternate {
                        let (grid, links) = self.grid_and_links();
                        grid.reset_page(Color::Default, links);
                    }
                    self.activate_alternate(false);
                }
            }
            DecMode::SaveCursor => {
                if enable {
                    self.alt_saved_cursor = Some(SavedCursor::capture(
                        &self.cursor,
                        self.modes.dec(DecMode::AutoWrap),
                        self.modes.dec(DecMode::Origin),
                    ));
                } else {
                    if let Some(saved) = self.alt_saved_cursor.clone() {
                        self.apply_saved_cursor(&saved);
                    }
                }
            }
            DecMode::ExtendedAltScreen => {
                if enable {
                    self.alt_saved_cursor = Some(SavedCursor::capture(
                        &self.cursor,
                        self.modes.dec(DecMode::AutoWrap),
                        self.modes.dec(DecMode::Origin),
                    ));
                    self.activate_alternate(true);
                    let (grid, links) = self.grid_and_links();
                    grid.reset_page(Color::Default, links);
                } else {
                    self.activate_alternate(false);
                    if let Some(saved) = self.alt_saved_cursor.clone() {
                        self.apply_saved_cursor(&saved);
                    }
                }
            }
            DecMode::VisibleCursor => {
                self.cursor.visible = enable;
                self.handler.set_cursor_visibility(enable);
            }
            DecMode::ApplicationCursorKeys => self.handler.use_application_cursor_keys(enable),
            DecMode::BracketedPaste => self.handler.set_bracketed_paste(enable),
            DecMode::FocusTracking => self.handler.set_generate_focus_events(enable),
            DecMode::MouseX10 => self.handler.set_mouse_protocol(MouseProtocol::X10, enable),
            DecMode::MouseNormalTracking => self
                .handler
                .set_mouse_protocol(MouseProtocol::NormalTracking, enable),
            DecMode::MouseHighlightTracking => self
                .handler
                .set_mouse_protocol(MouseProtocol::HighlightTracking, enable),
            DecMode::MouseButtonTracking => self
                .handler
                .set_mouse_protocol(MouseProtocol::ButtonTracking, enable),
            DecMode::MouseAnyEventTracking => self
                .handler
                .set_mouse_protocol(MouseProtocol::AnyEventTracking, enable),
            DecMode::MouseExtended => self.handler.set_mouse_transport(if enable {
                MouseTransport::Extended
            } else {
                MouseTransport::Default
            }),
            DecMode::MouseSgr => self.handler.set_mouse_transport(if enable {
                MouseTransport::Sgr
            } else {
                MouseTransport::Default
            }),
            DecMode::MouseUrxvt => self.handler.set_mouse_transport(if enable {
                MouseTransport::Urxvt
            } else {
                MouseTransport::Default
            }),
            DecMode::MouseAlternateScroll => self.handler.set_mouse_wheel_mode(if enable {
                MouseWheelMode::ApplicationCursorKeys
            } else {
                MouseWheelMode::Default
            }),
            DecMode::AutoWrap
            | DecMode::BlinkingCursor
            | DecMode::AllowColumns80to132
            | DecMode::SixelScrolling
            | DecMode::NumericKeypad
            | DecMode::BatchedRendering
            | DecMode::TextReflow
            | DecMode::PrivateColorRegisters => {}
        }
    }

    fn activate_alternate(&mut self, on: bool) {
        if on == self.on_alternate {
            return;
        }
        self.on_alternate = on;
        self.cursor.pending_wrap = false;
        self.last_written = None;
        self.selection = None;
        self.cursor.position = self.cursor.position.clamped_to(self.size());
        self.handler.buffer_changed(if on {
            ScreenBuffer::Alternate
        } else {
            ScreenBuffer::Primary
        });
        self.dirty = true;
    }

    /// XTSAVE.
    pub fn save_dec_mode_number(&mut self, number: u16) {
        match DecMode::from_number(number) {
            Some(mode) => self.modes.save_dec(mode),
            None => debug!(number, "XTSAVE of unknown mode"),
        }
    }

    /// XTRESTORE: restored values re-run their set/reset side effects.
    pub fn restore_dec_mode_number(&mut self, number: u16) {
        let Some(mode) = DecMode::from_number(number) else {
            debug!(number, "XTRESTORE of unknown mode");
            return;
        };
        if let Some(value) = self.modes.restore_dec(mode) {
            self.set_dec_mode_number(number, value);
        }
    }

    // ── Rendition ───────────────────────────────────────────────────

    /// Current SGR state.
    #[must_use]
    pub fn graphics_rendition(&self) -> GraphicsAttributes {
        self.cursor.attrs
    }

    /// Replace the SGR state (the sequencer decodes the parameters).
    pub fn set_graphics_rendition(&mut self, attrs: GraphicsAttributes) {
        self.cursor.attrs = attrs;
    }

    // ── Reports ─────────────────────────────────────────────────────

    fn reply(&mut self, data: Vec<u8>) {
        self.handler.reply(&data);
    }

    /// DSR 5.
    pub fn report_device_status(&mut self) {
        self.reply(reply::device_status_ok());
    }

    /// DSR 6 / DECXCPR: position is margin-relative under DECOM.
    pub fn report_cursor_position(&mut self, extended: bool) {
        let at = self.logical_cursor_position();
        let data = if extended {
            reply::extended_cursor_position(at.line, at.column)
        } else {
            reply::cursor_position(at.line, at.column)
        };
        self.reply(data);
    }

    /// DA1.
    pub fn report_primary_device_attributes(&mut self) {
        self.reply(reply::primary_device_attributes());
    }

    /// DA2.
    pub fn report_secondary_device_attributes(&mut self) {
        self.reply(reply::secondary_device_attributes());
    }

    /// DECRQM (DEC).
    pub fn report_dec_mode(&mut self, number: u16) {
        let status = self.modes.dec_status(number);
        self.reply(reply::dec_mode_report(number, status));
    }

    /// DECRQM (ANSI).
    pub fn report_ansi_mode(&mut self, number: u16) {
        let status = self.modes.ansi_status(number);
        self.reply(reply::ansi_mode_report(number, status));
    }

    /// DECRQTABS.
    pub fn report_tab_stops(&mut self) {
        let stops = self.tabs.stops(self.size().columns);
        self.reply(reply::tab_stop_report(&stops));
    }

    /// XTWINOPS 18.
    pub fn report_text_area_size(&mut self) {
        let size = self.size();
        self.reply(format!("\x1b[8;{};{}t", size.lines, size.columns).into_bytes());
    }

    /// XTWINOPS 4/8: forwarded to the host.
    pub fn request_resize(&mut self, width: u16, height: u16, in_pixels: bool) {
        self.handler.resize_window(width, height, in_pixels);
    }

    /// DECRQSS.
    pub fn report_status_string(&mut self, payload: &str) {
        let size = self.size();
        let answer = match payload {
            "\"p" => Some("65;1\"p".to_string()),
            " q" => Some("1 q".to_string()),
            "t" if size.lines >= 24 => Some(format!("{}t", size.lines)),
            "r" => Some(format!(
                "{};{}r",
                self.margins.vertical.from + 1,
                self.margins.vertical.to + 1
            )),
            "s" => Some(format!(
                "{};{}s",
                self.margins.horizontal.from + 1,
                self.margins.horizontal.to + 1
            )),
            "$|" => Some(format!("{}$|", size.columns)),
            "*|" => Some(format!("{}*|", size.lines)),
            "m" => Some(format!("0{}m", sgr_parameter_string(&self.cursor.attrs))),
            _ => None,
        };
        match answer {
            Some(answer) => self.reply(reply::status_string(&answer)),
            None => {
                debug!(payload, "DECRQSS for unknown setting");
                self.reply(reply::status_string_unknown());
            }
        }
    }

    /// XTGETTCAP, one hex-encoded capability name per call.
    pub fn report_termcap(&mut self, hex_name: &str) {
        let Some(name) = decode_hex(hex_name) else {
            self.reply(reply::termcap_miss());
            return;
        };
        let value = match name.as_str() {
            "TN" | "name" => Some("xterm-256color"),
            "Co" | "colors" => Some("256"),
            "RGB" => Some("8/8/8"),
            _ => None,
        };
        match value {
            Some(value) => self.reply(reply::termcap_hit(&name, value)),
            None => self.reply(reply::termcap_miss()),
        }
    }

    /// DECSCUSR.
    pub fn set_cursor_style_param(&mut self, ps: u16) {
        let (display, shape) = match ps {
            0 | 1 => (CursorDisplay::Blink, CursorShape::Block),
            2 => (CursorDisplay::Steady, CursorShape::Block),
            3 => (CursorDisplay::Blink, CursorShape::Underscore),
            4 => (CursorDisplay::Steady, CursorShape::Underscore),
            5 => (CursorDisplay::Blink, CursorShape::Bar),
            6 => (CursorDisplay::Steady, CursorShape::Bar),
            other => {
                debug!(other, "unhandled cursor style");
                return;
            }
        };
        self.handler.set_cursor_style(display, shape);
    }

    /// DECKPAM/DECKPNM.
    pub fn set_application_keypad_mode(&mut self, enable: bool) {
        self.handler.set_application_keypad_mode(enable);
    }

    // ── OSC state ───────────────────────────────────────────────────

    /// OSC 0/2.
    pub fn set_window_title(&mut self, title: &str) {
        self.window_title = title.to_string();
        self.handler.set_window_title(title);
    }

    /// XTWINOPS 22.
    pub fn save_window_title(&mut self) {
        self.title_stack.push(self.window_title.clone());
        self.handler.save_window_title();
    }

    /// XTWINOPS 23.
    pub fn restore_window_title(&mut self) {
        if let Some(title) = self.title_stack.pop() {
            self.window_title = title.clone();
            self.handler.restore_window_title();
            self.handler.set_window_title(&title);
        }
    }

    /// OSC 8: an empty URI ends the active hyperlink.
    ///
    /// The screen holds its own reference on the active record so it cannot
    /// die between the open sequence and the first stamped cell.
    pub fn set_hyperlink(&mut self, uri: &str, id: &str) {
        let new = self.links.intern(uri, id);
        self.links.acquire(new);
        self.links.release(self.current_link);
        self.current_link = new;
    }

    /// OSC 4 write.
    pub fn set_palette_color(&mut self, index: u16, rgb: (u8, u8, u8)) {
        if let Some(slot) = self.palette.get_mut(usize::from(index)) {
            *slot = rgb;
        }
    }

    /// OSC 4 query.
    pub fn report_palette_color(&mut self, index: u16) {
        if let Some(&rgb) = self.palette.get(usize::from(index)) {
            self.reply(reply::palette_color(index, rgb));
        }
    }

    /// OSC 104: no list means "reset all".
    pub fn reset_palette(&mut self, entries: &[u16]) {
        if entries.is_empty() {
            self.palette = self.default_palette;
        } else {
            for &index in entries {
                if let Some(slot) = self.palette.get_mut(usize::from(index)) {
                    *slot = self.default_palette[usize::from(index)];
                }
            }
        }
    }

    /// Palette entry (host render support).
    #[must_use]
    pub fn palette_color(&self, index: u8) -> (u8, u8, u8) {
        self.palette[usize::from(index)]
    }

    /// OSC 10..19 write.
    pub fn set_dynamic_color(&mut self, opcode: u16, rgb: (u8, u8, u8)) {
        if let Some(slot) = self.dynamic_colors.get_mut(usize::from(opcode - 10)) {
            *slot = Some(rgb);
        }
    }

    /// OSC 10..19 query; unset colors answer black (host default unknown
    /// to the engine).
    pub fn report_dynamic_color(&mut self, opcode: u16) {
        let rgb = self
            .dynamic_colors
            .get(usize::from(opcode - 10))
            .copied()
            .flatten()
            .unwrap_or((0, 0, 0));
        self.reply(reply::dynamic_color(opcode, rgb));
    }

    /// OSC 110..119.
    pub fn reset_dynamic_color(&mut self, opcode: u16) {
        if let Some(slot) = self.dynamic_colors.get_mut(usize::from(opcode - 10)) {
            *slot = None;
        }
    }

    /// OSC 52 write: payload is base64; the decoded bytes go to the host.
    pub fn write_clipboard(&mut self, selection: &str, payload: &str) {
        use base64::Engine as _;
        match base64::engine::general_purpose::STANDARD.decode(payload) {
            Ok(data) => self.handler.set_clipboard(selection, &data),
            Err(_) => debug!(selection, "discarding undecodable clipboard payload"),
        }
    }

    /// OSC 52 query: the engine stores no clipboard, so the reply is empty.
    pub fn report_clipboard(&mut self, selection: &str) {
        let data = reply::clipboard(selection, "");
        self.reply(data);
    }

    /// OSC 777 notify.
    pub fn notify(&mut self, title: &str, body: &str) {
        self.handler.notify(title, body);
    }

    // ── Resets ──────────────────────────────────────────────────────

    /// DECSTR: modes, margins, rendition and saved cursor reset; the grid
    /// and scrollback stay.
    pub fn soft_reset(&mut self) {
        self.modes.set_dec(DecMode::Origin, false);
        self.modes.set_dec(DecMode::AutoWrap, true);
        self.modes.set_dec(DecMode::VisibleCursor, true);
        self.modes.set_dec(DecMode::LeftRightMargin, false);
        self.modes.set_ansi(AnsiMode::Insert, false);
        self.modes.set_ansi(AnsiMode::KeyboardAction, false);
        self.margins = Margins::fullscreen(self.size());
        self.cursor.attrs = GraphicsAttributes::default();
        self.cursor.charsets = Default::default();
        self.cursor.visible = true;
        self.cursor.pending_wrap = false;
        self.saved_cursor = None;
        self.links.release(self.current_link);
        self.current_link = 0;
        self.handler.set_cursor_visibility(true);
    }

    /// RIS: back to the constructed state (size and handler excepted).
    pub fn hard_reset(&mut self) {
        let size = self.size();
        let max_history = self.primary.history().max_lines();
        self.primary = Grid::new(size, max_history, true);
        self.alternate = Grid::new(size, Some(0), false);
        self.on_alternate = false;
        self.cursor = Cursor::default();
        self.saved_cursor = None;
        self.alt_saved_cursor = None;
        self.modes = Modes::new();
        self.margins = Margins::fullscreen(size);
        self.tabs = TabStops::with_width(self.tab_width);
        self.links.clear();
        self.current_link = 0;
        self.palette = self.default_palette;
        self.dynamic_colors = [None; 10];
        self.window_title.clear();
        self.title_stack.clear();
        self.last_written = None;
        self.last_graphic = None;
        self.selection = None;
        self.dirty = true;
        self.handler.hard_reset_happened();
    }
}

/// Build the SGR parameter tail (`;1;4;31`-style) describing `attrs`, for
/// the DECRQSS SGR report.
fn sgr_parameter_string(attrs: &GraphicsAttributes) -> String {
    use crate::cell::CellFlags;
    let mut out = String::new();
    let mut push = |text: &str| {
        out.push(';');
        out.push_str(text);
    };
    let flags = attrs.flags;
    if flags.contains(CellFlags::BOLD) {
        push("1");
    }
    if flags.contains(CellFlags::FAINT) {
        push("2");
    }
    if flags.contains(CellFlags::ITALIC) {
        push("3");
    }
    if flags.contains(CellFlags::UNDERLINE) {
        push("4");
    }
    if flags.contains(CellFlags::BLINKING) {
        push("5");
    }
    if flags.contains(CellFlags::INVERSE) {
        push("7");
    }
    if flags.contains(CellFlags::HIDDEN) {
        push("8");
    }
    if flags.contains(CellFlags::CROSSED_OUT) {
        push("9");
    }
    if flags.contains(CellFlags::DOUBLY_UNDERLINED) {
        push("21");
    }
    if flags.contains(CellFlags::OVERLINE) {
        push("53");
    }
    match attrs.foreground {
        Color::Default => {}
        Color::Indexed(n) if n < 8 => push(&format!("3{n}")),
        Color::Indexed(n) => push(&format!("38;5;{n}")),
        Color::Bright(n) => push(&format!("9{n}")),
        Color::Palette(n) => push(&format!("38;5;{n}")),
        Color::Rgb(r, g, b) => push(&format!("38;2;{r};{g};{b}")),
    }
    match attrs.background {
        Color::Default => {}
        Color::Indexed(n) if n < 8 => push(&format!("4{n}")),
        Color::Indexed(n) => push(&format!("48;5;{n}")),
        Color::Bright(n) => push(&format!("10{n}")),
        Color::Palette(n) => push(&format!("48;5;{n}")),
        Color::Rgb(r, g, b) => push(&format!("48;2;{r};{g};{b}")),
    }
    out
}

fn decode_hex(text: &str) -> Option<String> {
    if text.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(text.len() / 2);
    let bytes = text.as_bytes();
    for pair in bytes.chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push((hi * 16 + lo) as u8);
    }
    String::from_utf8(out).ok()
}
