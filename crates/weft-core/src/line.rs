//! Terminal line: an ordered run of cells plus per-line flags.
//!
//! Lines are the unit of scrolling and of history storage. The flags carry
//! the soft-wrap bookkeeping that resize reflow depends on.

use bitflags::bitflags;

use crate::cell::{Cell, Color, GraphicsAttributes};

bitflags! {
    /// Per-line state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LineFlags: u8 {
        /// The previous line's content spilled into this one (soft wrap).
        const WRAPPED = 1 << 0;
        /// User/application jump mark (vim-style `:mark` navigation).
        const MARKED = 1 << 1;
        /// This line may merge with its successor during reflow; cleared when
        /// the line was terminated by an explicit newline.
        const WRAPPABLE = 1 << 2;
    }
}

/// One row of the grid or of history.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line {
    cells: Vec<Cell>,
    pub flags: LineFlags,
}

impl Line {
    /// A blank line of `columns` default cells.
    #[must_use]
    pub fn blank(columns: u16) -> Self {
        Self {
            cells: vec![Cell::default(); usize::from(columns)],
            flags: LineFlags::empty(),
        }
    }

    /// A blank line whose cells carry the given background (BCE fill).
    #[must_use]
    pub fn filled(columns: u16, background: Color) -> Self {
        let mut cell = Cell::default();
        cell.erase(background);
        Self {
            cells: vec![cell; usize::from(columns)],
            flags: LineFlags::empty(),
        }
    }

    /// Build a line from existing cells.
    #[must_use]
    pub fn from_cells(cells: Vec<Cell>, flags: LineFlags) -> Self {
        Self { cells, flags }
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> u16 {
        self.cells.len() as u16
    }

    /// Whether the line holds zero cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at `column`, if in bounds.
    #[must_use]
    pub fn cell(&self, column: u16) -> Option<&Cell> {
        self.cells.get(usize::from(column))
    }

    /// Mutable cell at `column`, if in bounds.
    pub fn cell_mut(&mut self, column: u16) -> Option<&mut Cell> {
        self.cells.get_mut(usize::from(column))
    }

    /// All cells.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// All cells, mutably.
    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// Consume the line, yielding its cells.
    #[must_use]
    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    /// Whether this line soft-wrapped out of its predecessor.
    #[must_use]
    pub fn wrapped(&self) -> bool {
        self.flags.contains(LineFlags::WRAPPED)
    }

    /// Whether this line carries a jump mark.
    #[must_use]
    pub fn marked(&self) -> bool {
        self.flags.contains(LineFlags::MARKED)
    }

    /// Whether reflow may merge this line with its successor.
    #[must_use]
    pub fn wrappable(&self) -> bool {
        self.flags.contains(LineFlags::WRAPPABLE)
    }

    /// Set or clear the soft-wrap continuation flag.
    pub fn set_wrapped(&mut self, wrapped: bool) {
        self.flags.set(LineFlags::WRAPPED, wrapped);
    }

    /// Set or clear the jump mark.
    pub fn set_marked(&mut self, marked: bool) {
        self.flags.set(LineFlags::MARKED, marked);
    }

    /// Set or clear reflow eligibility.
    pub fn set_wrappable(&mut self, wrappable: bool) {
        self.flags.set(LineFlags::WRAPPABLE, wrappable);
    }

    /// Erase every cell, keeping the given background; flags are cleared.
    pub fn reset(&mut self, background: Color) {
        for cell in &mut self.cells {
            cell.erase(background);
        }
        self.flags = LineFlags::empty();
    }

    /// Fill every cell with `ch` in the given rendition (DECALN fill).
    pub fn fill(&mut self, ch: char, attrs: GraphicsAttributes) {
        for cell in &mut self.cells {
            cell.write(ch, 1, attrs, 0);
        }
        self.flags = LineFlags::empty();
    }

    /// Pad or truncate to `columns` cells. Truncation drops an orphaned wide
    /// lead at the cut; padding appends blanks.
    pub fn resize(&mut self, columns: u16) {
        let target = usize::from(columns);
        if target < self.cells.len() {
            self.cells.truncate(target);
            if self.cells.last().is_some_and(Cell::is_wide) {
                if let Some(last) = self.cells.last_mut() {
                    last.erase(Color::Default);
                }
            }
        } else {
            self.cells.resize(target, Cell::default());
        }
    }

    /// Whether no cell holds written content.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_blank)
    }

    /// Column just past the last written cell (the line's used width).
    #[must_use]
    pub fn trimmed_len(&self) -> u16 {
        let used = self
            .cells
            .iter()
            .rposition(|c| !c.is_blank())
            .map_or(0, |i| i + 1 + usize::from(self.cells[i].is_wide()));
        used.min(self.cells.len()) as u16
    }

    /// Text projection of the whole line, blanks as spaces.
    #[must_use]
    pub fn text(&self) -> String {
        self.cells.iter().flat_map(Cell::to_text).collect()
    }

    /// Text projection with trailing blanks removed.
    #[must_use]
    pub fn trimmed_text(&self) -> String {
        let mut out = self.text();
        while out.ends_with(' ') {
            out.pop();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_is_spaces() {
        let line = Line::blank(5);
        assert_eq!(line.text(), "     ");
        assert_eq!(line.trimmed_text(), "");
        assert!(line.is_blank());
    }

    #[test]
    fn text_projects_content() {
        let mut line = Line::blank(5);
        line.cell_mut(1).unwrap().write('h', 1, GraphicsAttributes::default(), 0);
        line.cell_mut(2).unwrap().write('i', 1, GraphicsAttributes::default(), 0);
        assert_eq!(line.text(), " hi  ");
        assert_eq!(line.trimmed_text(), " hi");
        assert_eq!(line.trimmed_len(), 3);
    }

    #[test]
    fn wide_cell_projects_once() {
        let mut line = Line::blank(4);
        line.cell_mut(0).unwrap().write('中', 2, GraphicsAttributes::default(), 0);
        line.cell_mut(1)
            .unwrap()
            .make_continuation(GraphicsAttributes::default(), 0);
        assert_eq!(line.text(), "中  ");
        assert_eq!(line.trimmed_len(), 2);
    }

    #[test]
    fn reset_clears_flags_and_content() {
        let mut line = Line::blank(3);
        line.set_wrapped(true);
        line.set_marked(true);
        line.cell_mut(0).unwrap().write('x', 1, GraphicsAttributes::default(), 0);
        line.reset(Color::Palette(3));
        assert!(line.is_blank());
        assert_eq!(line.flags, LineFlags::empty());
        assert_eq!(line.cell(0).unwrap().attrs.background, Color::Palette(3));
    }

    #[test]
    fn resize_truncates_orphan_wide_lead() {
        let mut line = Line::blank(4);
        line.cell_mut(2).unwrap().write('中', 2, GraphicsAttributes::default(), 0);
        line.cell_mut(3)
            .unwrap()
            .make_continuation(GraphicsAttributes::default(), 0);
        line.resize(3);
        assert_eq!(line.len(), 3);
        assert!(line.cell(2).unwrap().is_blank());
        assert!(!line.cell(2).unwrap().is_wide());
    }

    #[test]
    fn resize_pads_with_blanks() {
        let mut line = Line::blank(2);
        line.resize(5);
        assert_eq!(line.len(), 5);
        assert!(line.is_blank());
    }
}
