//! History ring: lines scrolled off the top of the main page.
//!
//! Stores complete [`Line`]s so SGR attributes, hyperlinks, wide-char pairs
//! and wrap flags survive eviction from the visible page. Backed by a
//! `VecDeque` for O(1) push/pop at both ends; the oldest line is evicted
//! FIFO once the configured bound is reached.

use std::collections::VecDeque;

use crate::line::Line;

/// Bounded (or unbounded) ring of evicted lines, oldest first.
#[derive(Debug, Clone, Default)]
pub struct History {
    lines: VecDeque<Line>,
    max_lines: Option<usize>,
}

impl History {
    /// Create a history ring. `None` means unbounded; `Some(0)` disables
    /// history entirely (every push is dropped).
    #[must_use]
    pub fn new(max_lines: Option<usize>) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines,
        }
    }

    /// Configured bound.
    #[must_use]
    pub fn max_lines(&self) -> Option<usize> {
        self.max_lines
    }

    /// Change the bound, evicting oldest lines if the new bound is tighter.
    ///
    /// Returns the evicted lines (oldest first) so callers can drop the
    /// resources they reference.
    pub fn set_max_lines(&mut self, max_lines: Option<usize>) -> Vec<Line> {
        self.max_lines = max_lines;
        let mut evicted = Vec::new();
        if let Some(bound) = self.max_lines {
            while self.lines.len() > bound {
                if let Some(line) = self.lines.pop_front() {
                    evicted.push(line);
                }
            }
        }
        evicted
    }

    /// Current number of stored lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing has scrolled off yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Push a line evicted from the main page; returns the line this push
    /// evicted from history, if the bound was hit.
    pub fn push(&mut self, line: Line) -> Option<Line> {
        if self.max_lines == Some(0) {
            return Some(line);
        }
        let evicted = match self.max_lines {
            Some(bound) if self.lines.len() >= bound => self.lines.pop_front(),
            _ => None,
        };
        self.lines.push_back(line);
        evicted
    }

    /// Pop the newest line (the one closest to the main page).
    pub fn pop_newest(&mut self) -> Option<Line> {
        self.lines.pop_back()
    }

    /// Line by age: 0 is the newest (offset −1 from the page top), higher is
    /// older.
    #[must_use]
    pub fn line_from_top(&self, age: usize) -> Option<&Line> {
        let len = self.lines.len();
        if age < len {
            self.lines.get(len - 1 - age)
        } else {
            None
        }
    }

    /// Mutable variant of [`Self::line_from_top`].
    pub fn line_from_top_mut(&mut self, age: usize) -> Option<&mut Line> {
        let len = self.lines.len();
        if age < len {
            self.lines.get_mut(len - 1 - age)
        } else {
            None
        }
    }

    /// Iterate oldest → newest.
    pub fn iter(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter()
    }

    /// Drain every line, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Line> + '_ {
        self.lines.drain(..)
    }

    /// Drop all lines (ED 3).
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::GraphicsAttributes;

    fn text_line(text: &str) -> Line {
        let mut line = Line::blank(text.len() as u16);
        for (i, ch) in text.chars().enumerate() {
            line.cell_mut(i as u16)
                .unwrap()
                .write(ch, 1, GraphicsAttributes::default(), 0);
        }
        line
    }

    #[test]
    fn zero_bound_drops_pushes() {
        let mut h = History::new(Some(0));
        let back = h.push(text_line("x"));
        assert!(back.is_some());
        assert!(h.is_empty());
    }

    #[test]
    fn bounded_evicts_oldest() {
        let mut h = History::new(Some(2));
        assert!(h.push(text_line("a")).is_none());
        assert!(h.push(text_line("b")).is_none());
        let evicted = h.push(text_line("c")).unwrap();
        assert_eq!(evicted.text(), "a");
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn unbounded_grows() {
        let mut h = History::new(None);
        for i in 0..100 {
            assert!(h.push(text_line(&format!("{i}"))).is_none());
        }
        assert_eq!(h.len(), 100);
    }

    #[test]
    fn line_from_top_is_newest_first() {
        let mut h = History::new(None);
        let _ = h.push(text_line("old"));
        let _ = h.push(text_line("new"));
        assert_eq!(h.line_from_top(0).unwrap().text(), "new");
        assert_eq!(h.line_from_top(1).unwrap().text(), "old");
        assert!(h.line_from_top(2).is_none());
    }

    #[test]
    fn tightening_bound_returns_evicted() {
        let mut h = History::new(None);
        for name in ["a", "b", "c", "d"] {
            let _ = h.push(text_line(name));
        }
        let evicted = h.set_max_lines(Some(2));
        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[0].text(), "a");
        assert_eq!(h.line_from_top(1).unwrap().text(), "c");
    }

    #[test]
    fn pop_newest_reverses_push() {
        let mut h = History::new(None);
        let _ = h.push(text_line("one"));
        let _ = h.push(text_line("two"));
        assert_eq!(h.pop_newest().unwrap().text(), "two");
        assert_eq!(h.len(), 1);
    }
}
