//! The grid: main page plus history ring.
//!
//! The main page is a ring of [`Line`] slots with a `zero` offset, so a
//! full-page scroll is O(1): the top line moves to history, its slot is
//! reused as the new bottom line, and `zero` advances. History is a separate
//! bounded ring holding complete lines moved (not copied) off the top.
//!
//! Addressing is by visual row (0 = top of the main page) or by signed
//! [`LineOffset`] where negative offsets reach into history (−1 = the line
//! just above the page top).

use tracing::debug;

use crate::cell::{Cell, Color, HyperlinkStore};
use crate::coords::{CellLocation, LineOffset, PageSize};
use crate::history::History;
use crate::line::{Line, LineFlags};

/// Cell matrix for one buffer (primary or alternate).
#[derive(Debug, Clone)]
pub struct Grid {
    /// Main-page slots, ring-addressed through `zero`.
    lines: Vec<Line>,
    /// Storage index of visual row 0.
    zero: usize,
    size: PageSize,
    history: History,
    /// Whether resize re-segments soft-wrapped lines (primary buffer only).
    reflow: bool,
}

impl Grid {
    /// A blank grid. `max_history: Some(0)` (the alternate buffer) never
    /// retains scrolled-off lines.
    #[must_use]
    pub fn new(size: PageSize, max_history: Option<usize>, reflow: bool) -> Self {
        Self {
            lines: (0..size.lines).map(|_| Line::blank(size.columns)).collect(),
            zero: 0,
            size,
            history: History::new(max_history),
            reflow,
        }
    }

    /// Page dimensions.
    #[must_use]
    pub fn size(&self) -> PageSize {
        self.size
    }

    /// History ring (read side).
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Number of lines currently in history.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Whether this grid reflows on column resize.
    #[must_use]
    pub fn reflows(&self) -> bool {
        self.reflow
    }

    /// Rebound the history ring, releasing hyperlinks of evicted lines.
    pub fn set_max_history(&mut self, max_lines: Option<usize>, links: &mut HyperlinkStore) {
        for line in self.history.set_max_lines(max_lines) {
            links.release_cells(line.cells());
        }
    }

    /// Drop all history (ED 3).
    pub fn clear_history(&mut self, links: &mut HyperlinkStore) {
        for line in self.history.drain() {
            links.release_cells(line.cells());
        }
    }

    #[inline]
    fn slot(&self, row: u16) -> usize {
        (self.zero + usize::from(row)) % self.lines.len()
    }

    /// Visible line by row. Rows past the bottom clamp to the last line.
    #[must_use]
    pub fn line(&self, row: u16) -> &Line {
        let row = row.min(self.size.lines - 1);
        &self.lines[self.slot(row)]
    }

    /// Mutable visible line by row.
    pub fn line_mut(&mut self, row: u16) -> &mut Line {
        let row = row.min(self.size.lines - 1);
        let idx = self.slot(row);
        &mut self.lines[idx]
    }

    /// Line by signed offset: history for `offset < 0`, main page otherwise.
    #[must_use]
    pub fn absolute_line(&self, offset: LineOffset) -> Option<&Line> {
        if offset >= 0 {
            let row = u16::try_from(offset).ok()?;
            (row < self.size.lines).then(|| self.line(row))
        } else {
            let age = usize::try_from(-(offset as i64) - 1).ok()?;
            self.history.line_from_top(age)
        }
    }

    /// Mutable line by signed offset.
    pub fn absolute_line_mut(&mut self, offset: LineOffset) -> Option<&mut Line> {
        if offset >= 0 {
            let row = u16::try_from(offset).ok()?;
            (row < self.size.lines).then(|| self.line_mut(row))
        } else {
            let age = usize::try_from(-(offset as i64) - 1).ok()?;
            self.history.line_from_top_mut(age)
        }
    }

    /// Cell at a main-page location.
    #[must_use]
    pub fn cell(&self, at: CellLocation) -> Option<&Cell> {
        (at.line < self.size.lines).then(|| self.line(at.line).cell(at.column))?
    }

    /// Mutable cell at a main-page location.
    pub fn cell_mut(&mut self, at: CellLocation) -> Option<&mut Cell> {
        (at.line < self.size.lines)
            .then(|| self.line_mut(at.line).cell_mut(at.column))?
    }

    // ── Scrolling ───────────────────────────────────────────────────

    /// Scroll a full-width region up by `n`.
    ///
    /// Lines rotated off the region top move into history when
    /// `into_history` (the primary buffer with full-width margins);
    /// otherwise they are dropped. New bottom lines are blank with the
    /// given background.
    pub fn scroll_up(
        &mut self,
        top: u16,
        bottom: u16,
        n: u16,
        bg: Color,
        into_history: bool,
        links: &mut HyperlinkStore,
    ) {
        let bottom = bottom.min(self.size.lines - 1);
        if top > bottom || n == 0 {
            return;
        }
        let n = n.min(bottom - top + 1);

        let full_page = top == 0 && bottom == self.size.lines - 1;
        for _ in 0..n {
            if full_page {
                // Ring fast path: the top slot becomes the new bottom line.
                let blank = Line::filled(self.size.columns, bg);
                let taken = core::mem::replace(&mut self.lines[self.zero], blank);
                self.retire(taken, into_history, links);
                self.zero = (self.zero + 1) % self.lines.len();
            } else {
                let blank = Line::filled(self.size.columns, bg);
                let top_idx = self.slot(top);
                let taken = core::mem::replace(&mut self.lines[top_idx], blank);
                // Bubble the fresh blank down to the region bottom.
                for row in top..bottom {
                    let a = self.slot(row);
                    let b = self.slot(row + 1);
                    self.lines.swap(a, b);
                }
                self.retire(taken, into_history, links);
            }
        }
        // When the predecessor was dropped (not retired to history), the new
        // region top can no longer be a soft-wrap continuation.
        if !(full_page && into_history) {
            self.line_mut(top).set_wrapped(false);
        }
    }

    /// Scroll a full-width region down by `n`; lines off the bottom are
    /// discarded, blanks appear at the top.
    pub fn scroll_down(
        &mut self,
        top: u16,
        bottom: u16,
        n: u16,
        bg: Color,
        links: &mut HyperlinkStore,
    ) {
        let bottom = bottom.min(self.size.lines - 1);
        if top > bottom || n == 0 {
            return;
        }
        let n = n.min(bottom - top + 1);
        for _ in 0..n {
            let blank = Line::filled(self.size.columns, bg);
            let bottom_idx = self.slot(bottom);
            let taken = core::mem::replace(&mut self.lines[bottom_idx], blank);
            links.release_cells(taken.cells());
            for row in (top..bottom).rev() {
                let a = self.slot(row);
                let b = self.slot(row + 1);
                self.lines.swap(a, b);
            }
        }
    }

    /// Scroll a sub-width rectangle up: cell ranges move between lines, the
    /// vacated bottom rows of the rectangle are erased. Never touches
    /// history.
    pub fn scroll_rect_up(
        &mut self,
        top: u16,
        bottom: u16,
        left: u16,
        right: u16,
        n: u16,
        bg: Color,
        links: &mut HyperlinkStore,
    ) {
        let bottom = bottom.min(self.size.lines - 1);
        let right = right.min(self.size.columns - 1);
        if top > bottom || left > right || n == 0 {
            return;
        }
        let n = n.min(bottom - top + 1);
        if n <= bottom - top {
            for row in top..=bottom - n {
                for col in left..=right {
                    let src = self
                        .line(row + n)
                        .cell(col)
                        .cloned()
                        .unwrap_or_default();
                    if let Some(dst) = self.line_mut(row).cell_mut(col) {
                        links.release(dst.hyperlink);
                        links.acquire(src.hyperlink);
                        *dst = src;
                    }
                }
            }
        }
        for row in (bottom + 1).saturating_sub(n)..=bottom {
            self.erase_row_range(row, left, right, bg, links);
        }
    }

    /// Sub-width rectangle scroll down; symmetric to [`Self::scroll_rect_up`].
    pub fn scroll_rect_down(
        &mut self,
        top: u16,
        bottom: u16,
        left: u16,
        right: u16,
        n: u16,
        bg: Color,
        links: &mut HyperlinkStore,
    ) {
        let bottom = bottom.min(self.size.lines - 1);
        let right = right.min(self.size.columns - 1);
        if top > bottom || left > right || n == 0 {
            return;
        }
        let n = n.min(bottom - top + 1);
        for row in (top + n..=bottom).rev() {
            for col in left..=right {
                let src = self
                    .line(row - n)
                    .cell(col)
                    .cloned()
                    .unwrap_or_default();
                if let Some(dst) = self.line_mut(row).cell_mut(col) {
                    links.release(dst.hyperlink);
                    links.acquire(src.hyperlink);
                    *dst = src;
                }
            }
        }
        for row in top..(top + n).min(bottom + 1) {
            self.erase_row_range(row, left, right, bg, links);
        }
    }

    /// Erase `[left..=right]` of one row with the given background.
    pub fn erase_row_range(
        &mut self,
        row: u16,
        left: u16,
        right: u16,
        bg: Color,
        links: &mut HyperlinkStore,
    ) {
        if row >= self.size.lines {
            return;
        }
        let right = right.min(self.size.columns - 1);
        if left > right {
            return;
        }
        // Wide-pair fixups at the cut points: a lead whose continuation is
        // erased (or the reverse) must not survive half-erased.
        let line = self.line_mut(row);
        if left > 0 && line.cell(left).is_some_and(Cell::is_continuation) {
            if let Some(lead) = line.cell_mut(left - 1) {
                links.release(lead.hyperlink);
                lead.erase(bg);
            }
        }
        if line.cell(right).is_some_and(Cell::is_wide) {
            if let Some(cont) = line.cell_mut(right + 1) {
                links.release(cont.hyperlink);
                cont.erase(bg);
            }
        }
        for col in left..=right {
            if let Some(cell) = line.cell_mut(col) {
                links.release(cell.hyperlink);
                cell.erase(bg);
            }
        }
    }

    /// If `col` is the continuation half of a wide pair, erase the lead at
    /// `col − 1`; if it is a wide lead, erase the continuation at `col + 1`.
    /// Keeps the "wide lead is always followed by its continuation"
    /// invariant across partial overwrites.
    pub fn drop_orphan_pair(
        &mut self,
        row: u16,
        col: u16,
        bg: Color,
        links: &mut HyperlinkStore,
    ) {
        if row >= self.size.lines || col >= self.size.columns {
            return;
        }
        let line = self.line_mut(row);
        if line.cell(col).is_some_and(Cell::is_continuation) && col > 0 {
            if let Some(lead) = line.cell_mut(col - 1) {
                if lead.is_wide() {
                    links.release(lead.hyperlink);
                    lead.erase(bg);
                }
            }
        } else if line.cell(col).is_some_and(Cell::is_wide) {
            if let Some(cont) = line.cell_mut(col + 1) {
                links.release(cont.hyperlink);
                cont.erase(bg);
            }
        }
    }

    /// Repair the seam at `col` after content moved past it: a wide lead at
    /// `col − 1` without its continuation, or a continuation at `col`
    /// without its lead, is erased.
    pub fn repair_pair_seam(
        &mut self,
        row: u16,
        col: u16,
        bg: Color,
        links: &mut HyperlinkStore,
    ) {
        if row >= self.size.lines || col >= self.size.columns {
            return;
        }
        let line = self.line_mut(row);
        let lead_is_wide = col > 0 && line.cell(col - 1).is_some_and(Cell::is_wide);
        let cont_here = line.cell(col).is_some_and(Cell::is_continuation);
        if lead_is_wide && !cont_here {
            if let Some(lead) = line.cell_mut(col - 1) {
                links.release(lead.hyperlink);
                lead.erase(bg);
            }
        } else if !lead_is_wide && cont_here {
            if let Some(cont) = line.cell_mut(col) {
                links.release(cont.hyperlink);
                cont.erase(bg);
            }
        }
    }

    fn retire(&mut self, line: Line, into_history: bool, links: &mut HyperlinkStore) {
        if into_history {
            if let Some(evicted) = self.history.push(line) {
                links.release_cells(evicted.cells());
            }
        } else {
            links.release_cells(line.cells());
        }
    }

    // ── Resize ──────────────────────────────────────────────────────

    /// Resize the grid, returning the relocated cursor position.
    ///
    /// With reflow enabled (primary buffer, TextReflow mode), column changes
    /// re-segment soft-wrapped logical lines; otherwise lines pad/truncate.
    /// Height changes exchange lines with history so content above the
    /// cursor is preserved. Zero dimensions are rejected (logged, no-op).
    pub fn resize(
        &mut self,
        new_size: PageSize,
        cursor: CellLocation,
        reflow_now: bool,
        links: &mut HyperlinkStore,
    ) -> CellLocation {
        if new_size.lines == 0 || new_size.columns == 0 {
            debug!(?new_size, "rejecting resize to zero dimension");
            return cursor;
        }
        if new_size == self.size {
            return cursor;
        }

        let mut cursor = cursor;
        if new_size.columns != self.size.columns {
            if self.reflow && reflow_now {
                cursor = self.reflow_columns(new_size.columns, cursor, links);
            } else {
                for line in &mut self.lines {
                    line.resize(new_size.columns);
                }
                self.size.columns = new_size.columns;
                cursor.column = cursor.column.min(new_size.columns - 1);
            }
        }
        if new_size.lines != self.size.lines {
            cursor = self.resize_lines(new_size.lines, cursor, links);
        }
        cursor.clamped_to(self.size)
    }

    /// Grow/shrink the page height, exchanging lines with history.
    fn resize_lines(
        &mut self,
        new_lines: u16,
        mut cursor: CellLocation,
        links: &mut HyperlinkStore,
    ) -> CellLocation {
        let old_lines = self.size.lines;
        let columns = self.size.columns;

        // Unroll the ring into visual order once; ring addressing restarts
        // from zero afterwards.
        let mut page: Vec<Line> = Vec::with_capacity(usize::from(old_lines));
        for row in 0..old_lines {
            let idx = self.slot(row);
            page.push(core::mem::replace(&mut self.lines[idx], Line::default()));
        }

        if new_lines < old_lines {
            // Keep the cursor visible: push lines above it to history first,
            // then truncate blank space below.
            let mut excess = old_lines - new_lines;
            let push = excess.min(cursor.line);
            for line in page.drain(..usize::from(push)) {
                if let Some(evicted) = self.history.push(line) {
                    links.release_cells(evicted.cells());
                }
            }
            cursor.line -= push;
            excess -= push;
            for line in page.drain(page.len() - usize::from(excess)..) {
                links.release_cells(line.cells());
            }
        } else {
            // Pull lines back from history, then pad with blanks below.
            let mut grow = new_lines - old_lines;
            while grow > 0 {
                match self.history.pop_newest() {
                    Some(mut line) => {
                        line.resize(columns);
                        page.insert(0, line);
                        cursor.line += 1;
                        grow -= 1;
                    }
                    None => break,
                }
            }
            page.resize(usize::from(new_lines), Line::blank(columns));
        }

        self.lines = page;
        self.zero = 0;
        self.size.lines = new_lines;
        cursor
    }

    /// Re-segment every soft-wrapped logical line to a new column count.
    fn reflow_columns(
        &mut self,
        new_columns: u16,
        cursor: CellLocation,
        links: &mut HyperlinkStore,
    ) -> CellLocation {
        let old_history_len = self.history.len();
        let cursor_abs = old_history_len + usize::from(cursor.line);

        // Trailing blank page rows are not content; resplitting them would
        // push real lines into history for nothing. Keep the cursor's row.
        let mut used_rows = self.size.lines;
        while used_rows > 0 {
            let row = used_rows - 1;
            if row <= cursor.line || !self.line(row).is_blank() {
                break;
            }
            used_rows -= 1;
        }

        // Gather every line oldest → newest, history first. Whatever is
        // left in the old slots is replaced wholesale below.
        let mut all: Vec<Line> = self.history.drain().collect();
        for row in 0..used_rows {
            let idx = self.slot(row);
            all.push(core::mem::replace(&mut self.lines[idx], Line::default()));
        }

        // Merge soft-wrap chains into logical lines, tracking where the
        // cursor's cell lands in its chain.
        struct Logical {
            cells: Vec<Cell>,
            marked: bool,
            /// The final physical line was newline-terminated (not
            /// reflow-eligible), so the flag must be restored after split.
            tail_wrappable: bool,
        }
        let mut logicals: Vec<Logical> = Vec::new();
        let mut cursor_logical = 0usize;
        let mut cursor_flat = usize::from(cursor.column);

        for (index, line) in all.into_iter().enumerate() {
            let starts_new = !(line.wrapped() && !logicals.is_empty());
            if starts_new {
                logicals.push(Logical {
                    cells: Vec::new(),
                    marked: line.marked(),
                    tail_wrappable: line.wrappable(),
                });
            }
            let this_logical = logicals.len() - 1;
            let current = logicals.last_mut().expect("pushed above");
            if !starts_new {
                current.marked |= line.marked();
                current.tail_wrappable = line.wrappable();
            }
            if index == cursor_abs {
                cursor_logical = this_logical;
                cursor_flat = current.cells.len() + usize::from(cursor.column);
            }
            current.cells.extend(line.into_cells());
        }

        // Trim trailing blanks per logical line so widening does not keep
        // stale padding, but never trim away the cursor's cell.
        for (index, logical) in logicals.iter_mut().enumerate() {
            let mut keep = logical
                .cells
                .iter()
                .rposition(|c| !c.is_blank())
                .map_or(0, |i| i + 1);
            if index == cursor_logical {
                keep = keep.max(cursor_flat + 1).min(logical.cells.len());
            }
            // A continuation counts as blank; never cut one off its lead.
            if keep > 0
                && logical.cells.get(keep - 1).is_some_and(Cell::is_wide)
                && keep < logical.cells.len()
            {
                keep += 1;
            }
            for cell in &logical.cells[keep..] {
                links.release(cell.hyperlink);
            }
            logical.cells.truncate(keep);
        }

        // Split each logical line into physical lines of the new width.
        let cols = usize::from(new_columns);
        let mut rebuilt: Vec<Line> = Vec::new();
        let mut cursor_new_abs = 0usize;
        let mut cursor_new_col = cursor.column.min(new_columns - 1);

        for (index, logical) in logicals.into_iter().enumerate() {
            let track_cursor = index == cursor_logical;
            let first_of_chain = rebuilt.len();
            let mut cells = logical.cells;
            let mut consumed = 0usize;
            loop {
                // Take up to `cols` cells, backing off one if the cut would
                // split a wide pair.
                let mut take = cells.len().min(cols);
                if take < cells.len() && take > 0 && cells[take].is_continuation() {
                    take -= 1;
                }
                let rest = cells.split_off(take);
                let mut segment = cells;
                cells = rest;

                let span = segment.len().max(1);
                if track_cursor && cursor_flat >= consumed && cursor_flat < consumed + span {
                    cursor_new_abs = rebuilt.len();
                    cursor_new_col =
                        ((cursor_flat - consumed) as u16).min(new_columns - 1);
                }
                consumed += span;

                segment.resize(cols, Cell::default());
                let mut flags = LineFlags::empty();
                if rebuilt.len() > first_of_chain {
                    flags |= LineFlags::WRAPPED;
                }
                let done = cells.is_empty();
                if !done || logical.tail_wrappable {
                    flags |= LineFlags::WRAPPABLE;
                }
                if logical.marked && rebuilt.len() == first_of_chain {
                    flags |= LineFlags::MARKED;
                }
                rebuilt.push(Line::from_cells(segment, flags));
                if done {
                    break;
                }
            }
            if track_cursor && cursor_flat >= consumed {
                // Cursor sat past the chain's content; keep it on the last
                // segment at its old column, clamped.
                cursor_new_abs = rebuilt.len() - 1;
                cursor_new_col = cursor.column.min(new_columns - 1);
            }
        }

        // The last `lines` rebuilt lines become the page; everything above
        // returns to history under the original bound.
        let page_lines = usize::from(self.size.lines);
        let overflow = rebuilt.len().saturating_sub(page_lines);
        let mut rebuilt = rebuilt.into_iter();
        for line in rebuilt.by_ref().take(overflow) {
            if let Some(evicted) = self.history.push(line) {
                links.release_cells(evicted.cells());
            }
        }
        let mut page: Vec<Line> = rebuilt.collect();
        page.resize(page_lines, Line::blank(new_columns));

        self.lines = page;
        self.zero = 0;
        self.size.columns = new_columns;

        // Relocate the cursor; if its line reflowed into history, clamp to
        // the page top in the same column.
        let new_cursor = if cursor_new_abs >= overflow {
            CellLocation::new((cursor_new_abs - overflow) as u16, cursor_new_col)
        } else {
            CellLocation::new(0, cursor_new_col)
        };
        new_cursor.clamped_to(PageSize::new(self.size.lines, new_columns))
    }

    // ── Whole-page helpers ──────────────────────────────────────────

    /// Reset every page line (flags included) to blanks with `bg`.
    pub fn reset_page(&mut self, bg: Color, links: &mut HyperlinkStore) {
        for row in 0..self.size.lines {
            let idx = self.slot(row);
            links.release_cells(self.lines[idx].cells());
            self.lines[idx].reset(bg);
        }
    }

    /// Text projection of the main page, one string per visual row.
    #[must_use]
    pub fn page_text(&self) -> Vec<String> {
        (0..self.size.lines).map(|row| self.line(row).text()).collect()
    }
}
