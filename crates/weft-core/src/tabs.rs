//! Tab stops: implicit every-N columns until the application edits them.
//!
//! HTS/TBC materialize the implicit stops into an explicit sorted list; the
//! implicit form answers the common case without allocation.

/// Default distance between implicit tab stops.
pub const DEFAULT_TAB_WIDTH: u16 = 8;

/// Tab stop state for one screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabStops {
    /// A stop every `width` columns.
    Implicit { width: u16 },
    /// Explicit sorted list of stop columns (0-based).
    Explicit { stops: Vec<u16> },
}

impl Default for TabStops {
    fn default() -> Self {
        TabStops::Implicit {
            width: DEFAULT_TAB_WIDTH,
        }
    }
}

impl TabStops {
    /// Implicit stops with a custom width (config `tab_width`).
    #[must_use]
    pub fn with_width(width: u16) -> Self {
        TabStops::Implicit {
            width: width.max(1),
        }
    }

    /// Reset to implicit every-8 stops (DECST8C).
    pub fn reset(&mut self, width: u16) {
        *self = Self::with_width(width);
    }

    /// Next stop strictly right of `column`, if one exists before `columns`.
    #[must_use]
    pub fn next_stop(&self, column: u16, columns: u16) -> Option<u16> {
        match self {
            TabStops::Implicit { width } => {
                let next = (column / width + 1) * width;
                (next < columns).then_some(next)
            }
            TabStops::Explicit { stops } => {
                stops.iter().copied().find(|&s| s > column && s < columns)
            }
        }
    }

    /// Previous stop strictly left of `column`; column 0 when none.
    #[must_use]
    pub fn previous_stop(&self, column: u16) -> u16 {
        match self {
            TabStops::Implicit { width } => {
                if column == 0 {
                    0
                } else {
                    (column - 1) / width * width
                }
            }
            TabStops::Explicit { stops } => stops
                .iter()
                .copied()
                .rev()
                .find(|&s| s < column)
                .unwrap_or(0),
        }
    }

    /// HTS: set a stop at `column`, materializing implicit stops first.
    pub fn set_stop(&mut self, column: u16, columns: u16) {
        let stops = self.materialize(columns);
        if let Err(at) = stops.binary_search(&column) {
            stops.insert(at, column);
        }
    }

    /// TBC 0: clear the stop at `column`, if set.
    pub fn clear_stop(&mut self, column: u16, columns: u16) {
        let stops = self.materialize(columns);
        if let Ok(at) = stops.binary_search(&column) {
            stops.remove(at);
        }
    }

    /// TBC 3: clear every stop.
    pub fn clear_all(&mut self) {
        *self = TabStops::Explicit { stops: Vec::new() };
    }

    /// The stop columns currently in effect, for DECRQTABS reporting.
    #[must_use]
    pub fn stops(&self, columns: u16) -> Vec<u16> {
        match self {
            TabStops::Implicit { width } => (1..)
                .map(|i| i * width)
                .take_while(|&s| s < columns)
                .collect(),
            TabStops::Explicit { stops } => {
                stops.iter().copied().filter(|&s| s < columns).collect()
            }
        }
    }

    fn materialize(&mut self, columns: u16) -> &mut Vec<u16> {
        if let TabStops::Implicit { .. } = self {
            *self = TabStops::Explicit {
                stops: self.stops(columns),
            };
        }
        match self {
            TabStops::Explicit { stops } => stops,
            TabStops::Implicit { .. } => unreachable!("materialized above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_stops_every_eight() {
        let tabs = TabStops::default();
        assert_eq!(tabs.next_stop(0, 80), Some(8));
        assert_eq!(tabs.next_stop(7, 80), Some(8));
        assert_eq!(tabs.next_stop(8, 80), Some(16));
        assert_eq!(tabs.next_stop(72, 80), None);
    }

    #[test]
    fn implicit_previous() {
        let tabs = TabStops::default();
        assert_eq!(tabs.previous_stop(0), 0);
        assert_eq!(tabs.previous_stop(8), 0);
        assert_eq!(tabs.previous_stop(9), 8);
        assert_eq!(tabs.previous_stop(20), 16);
    }

    #[test]
    fn hts_materializes_and_inserts() {
        let mut tabs = TabStops::default();
        tabs.set_stop(4, 80);
        assert_eq!(tabs.next_stop(0, 80), Some(4));
        assert_eq!(tabs.next_stop(4, 80), Some(8));
        // Existing implicit stops survived.
        assert_eq!(tabs.next_stop(70, 80), Some(72));
    }

    #[test]
    fn tbc_clears_one_or_all() {
        let mut tabs = TabStops::default();
        tabs.clear_stop(8, 80);
        assert_eq!(tabs.next_stop(0, 80), Some(16));
        tabs.clear_all();
        assert_eq!(tabs.next_stop(0, 80), None);
        assert_eq!(tabs.previous_stop(50), 0);
    }

    #[test]
    fn stops_listing() {
        let tabs = TabStops::default();
        assert_eq!(tabs.stops(25), vec![8, 16, 24]);
        let mut tabs = TabStops::default();
        tabs.clear_all();
        tabs.set_stop(3, 80);
        tabs.set_stop(11, 80);
        assert_eq!(tabs.stops(80), vec![3, 11]);
    }

    #[test]
    fn reset_restores_implicit() {
        let mut tabs = TabStops::default();
        tabs.clear_all();
        tabs.reset(DEFAULT_TAB_WIDTH);
        assert_eq!(tabs.next_stop(0, 80), Some(8));
    }
}
