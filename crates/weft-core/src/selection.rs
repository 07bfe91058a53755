//! Text selection over the combined history + main-page buffer.
//!
//! Selections address cells by [`BufferPosition`]: a signed line offset
//! (negative = history) plus a column. The engine only models the range and
//! its text extraction; hit-testing against pointer pixels is the host's
//! job.

use crate::coords::LineOffset;
use crate::grid::Grid;
use crate::line::Line;

/// A position in the scrollback-extended buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BufferPosition {
    pub line: LineOffset,
    pub column: u16,
}

impl BufferPosition {
    #[must_use]
    pub fn new(line: LineOffset, column: u16) -> Self {
        Self { line, column }
    }
}

/// Selection shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Reading order: full rows between the endpoints.
    #[default]
    Linear,
    /// A rectangle spanned by the endpoints' rows and columns.
    Rectangular,
}

/// An active selection: an anchor (where the gesture started) and a focus
/// (where it currently is).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: BufferPosition,
    pub focus: BufferPosition,
    pub mode: SelectionMode,
}

impl Selection {
    /// Start a selection at a point.
    #[must_use]
    pub fn new(at: BufferPosition, mode: SelectionMode) -> Self {
        Self {
            anchor: at,
            focus: at,
            mode,
        }
    }

    /// Move the focus endpoint.
    pub fn extend_to(&mut self, focus: BufferPosition) {
        self.focus = focus;
    }

    /// Endpoints in buffer order (start ≤ end).
    #[must_use]
    pub fn normalized(&self) -> (BufferPosition, BufferPosition) {
        if self.anchor <= self.focus {
            (self.anchor, self.focus)
        } else {
            (self.focus, self.anchor)
        }
    }

    /// Whether a buffer position falls inside the selection.
    #[must_use]
    pub fn contains(&self, at: BufferPosition) -> bool {
        let (start, end) = self.normalized();
        match self.mode {
            SelectionMode::Linear => at >= start && at <= end,
            SelectionMode::Rectangular => {
                let (left, right) = if self.anchor.column <= self.focus.column {
                    (self.anchor.column, self.focus.column)
                } else {
                    (self.focus.column, self.anchor.column)
                };
                at.line >= start.line
                    && at.line <= end.line
                    && at.column >= left
                    && at.column <= right
            }
        }
    }

    /// Extract the selected text from a grid.
    ///
    /// Linear selections join soft-wrapped rows without a newline and
    /// trim trailing blanks of each hard row, matching what a user expects
    /// to land on the clipboard.
    #[must_use]
    pub fn extract_text(&self, grid: &Grid) -> String {
        let (start, end) = self.normalized();
        let mut out = String::new();
        for offset in start.line..=end.line {
            let Some(line) = grid.absolute_line(offset) else {
                continue;
            };
            let (from, to) = self.row_span(line, offset, start, end);
            let mut row = String::new();
            for column in from..=to.min(line.len().saturating_sub(1)) {
                if let Some(cell) = line.cell(column) {
                    row.extend(cell.to_text());
                }
            }
            // Trailing blanks only matter mid-selection on wrapped rows.
            let next_wrapped = grid
                .absolute_line(offset + 1)
                .is_some_and(Line::wrapped);
            if !(next_wrapped && offset < end.line) {
                while row.ends_with(' ') {
                    row.pop();
                }
            }
            out.push_str(&row);
            if offset < end.line && !next_wrapped {
                out.push('\n');
            }
        }
        out
    }

    fn row_span(
        &self,
        line: &Line,
        offset: LineOffset,
        start: BufferPosition,
        end: BufferPosition,
    ) -> (u16, u16) {
        let last = line.len().saturating_sub(1);
        match self.mode {
            SelectionMode::Linear => {
                let from = if offset == start.line { start.column } else { 0 };
                let to = if offset == end.line { end.column } else { last };
                (from, to)
            }
            SelectionMode::Rectangular => {
                let (left, right) = if self.anchor.column <= self.focus.column {
                    (self.anchor.column, self.focus.column)
                } else {
                    (self.focus.column, self.anchor.column)
                };
                (left, right)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Color, GraphicsAttributes, HyperlinkStore};
    use crate::coords::PageSize;

    fn grid_with(rows: &[&str]) -> Grid {
        let columns = rows.iter().map(|r| r.len()).max().unwrap_or(1) as u16;
        let mut grid = Grid::new(PageSize::new(rows.len() as u16, columns), Some(10), true);
        for (row, text) in rows.iter().enumerate() {
            for (col, ch) in text.chars().enumerate() {
                grid.line_mut(row as u16)
                    .cell_mut(col as u16)
                    .unwrap()
                    .write(ch, 1, GraphicsAttributes::default(), 0);
            }
        }
        grid
    }

    #[test]
    fn linear_selection_single_line() {
        let grid = grid_with(&["hello world"]);
        let mut sel = Selection::new(BufferPosition::new(0, 6), SelectionMode::Linear);
        sel.extend_to(BufferPosition::new(0, 10));
        assert_eq!(sel.extract_text(&grid), "world");
    }

    #[test]
    fn linear_selection_spans_lines() {
        let grid = grid_with(&["abc", "def"]);
        let mut sel = Selection::new(BufferPosition::new(0, 1), SelectionMode::Linear);
        sel.extend_to(BufferPosition::new(1, 1));
        assert_eq!(sel.extract_text(&grid), "bc\nde");
    }

    #[test]
    fn reversed_endpoints_normalize() {
        let grid = grid_with(&["abc"]);
        let mut sel = Selection::new(BufferPosition::new(0, 2), SelectionMode::Linear);
        sel.extend_to(BufferPosition::new(0, 0));
        assert_eq!(sel.extract_text(&grid), "abc");
    }

    #[test]
    fn wrapped_rows_join_without_newline() {
        let mut grid = grid_with(&["abc", "def"]);
        grid.line_mut(1).set_wrapped(true);
        let mut sel = Selection::new(BufferPosition::new(0, 0), SelectionMode::Linear);
        sel.extend_to(BufferPosition::new(1, 2));
        assert_eq!(sel.extract_text(&grid), "abcdef");
    }

    #[test]
    fn rectangular_selection() {
        let grid = grid_with(&["abcd", "efgh", "ijkl"]);
        let mut sel = Selection::new(BufferPosition::new(0, 1), SelectionMode::Rectangular);
        sel.extend_to(BufferPosition::new(2, 2));
        assert_eq!(sel.extract_text(&grid), "bc\nfg\njk");
        assert!(sel.contains(BufferPosition::new(1, 1)));
        assert!(!sel.contains(BufferPosition::new(1, 3)));
    }

    #[test]
    fn selection_reaches_history() {
        let mut grid = grid_with(&["page"]);
        let mut links = HyperlinkStore::new();
        grid.scroll_up(0, 0, 1, Color::Default, true, &mut links);
        // "page" is now history line −1.
        let sel = Selection::new(BufferPosition::new(-1, 0), SelectionMode::Linear);
        let mut sel2 = sel;
        sel2.extend_to(BufferPosition::new(-1, 3));
        assert_eq!(sel2.extract_text(&grid), "page");
    }
}
