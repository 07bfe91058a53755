//! Terminal cell: one grid position holding a full grapheme cluster.
//!
//! A cell stores every codepoint of the grapheme rendered at that position
//! (base character plus combining marks, ZWJ pieces, variation selectors),
//! its display width, SGR attributes, and an optional hyperlink reference.
//! Wide characters occupy two cells: the leading cell carries the content
//! with `width == 2`, the trailing continuation cell is empty with
//! `width == 0`.

use bitflags::bitflags;
use smallvec::SmallVec;
use std::collections::HashMap;
use unicode_width::UnicodeWidthChar;

bitflags! {
    /// SGR rendition flags, one bit per ECMA-48 / DEC attribute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u16 {
        const BOLD              = 1 << 0;
        const FAINT             = 1 << 1;
        const ITALIC            = 1 << 2;
        const UNDERLINE         = 1 << 3;
        const BLINKING          = 1 << 4;
        const INVERSE           = 1 << 5;
        const HIDDEN            = 1 << 6;
        const CROSSED_OUT       = 1 << 7;
        const DOUBLY_UNDERLINED = 1 << 8;
        const CURLY_UNDERLINED  = 1 << 9;
        const DOTTED_UNDERLINE  = 1 << 10;
        const DASHED_UNDERLINE  = 1 << 11;
        const FRAMED            = 1 << 12;
        const OVERLINE          = 1 << 13;
    }
}

impl CellFlags {
    /// Every underline-style bit; the SGR 4 / 21 / 4:x forms are mutually
    /// exclusive, so setting one clears the rest.
    pub const ANY_UNDERLINE: CellFlags = CellFlags::UNDERLINE
        .union(CellFlags::DOUBLY_UNDERLINED)
        .union(CellFlags::CURLY_UNDERLINED)
        .union(CellFlags::DOTTED_UNDERLINE)
        .union(CellFlags::DASHED_UNDERLINE);
}

/// Color of a cell axis (foreground, background, underline).
///
/// The terminal color hierarchy: default → 16 base colors (split into the
/// normal and bright halves, matching SGR 30–37 / 90–97) → 256-entry palette
/// → 24-bit RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default (SGR 39 / 49 / 59).
    #[default]
    Default,
    /// Base color 0..=15 (SGR 30–37 plus the classic bold-bright aliases).
    Indexed(u8),
    /// Bright color 0..=7 (SGR 90–97).
    Bright(u8),
    /// 256-color palette entry (SGR 38;5;n).
    Palette(u8),
    /// 24-bit true color (SGR 38;2;r;g;b).
    Rgb(u8, u8, u8),
}

/// The full graphics rendition applied to written cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GraphicsAttributes {
    pub foreground: Color,
    pub background: Color,
    /// Underline color (SGR 58). `Default` means "use foreground".
    pub underline: Color,
    pub flags: CellFlags,
}

impl GraphicsAttributes {
    /// Reset to SGR 0.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Identifier of an interned OSC 8 hyperlink. Zero means "no link".
pub type HyperlinkId = u32;

/// An interned hyperlink record: target URI plus the (possibly empty)
/// application-supplied `id=` parameter used for cross-cell grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperlinkInfo {
    pub uri: String,
    pub id: String,
}

#[derive(Debug, Clone)]
struct HyperlinkSlot {
    info: HyperlinkInfo,
    ref_count: u32,
}

/// Interning store for OSC 8 hyperlinks.
///
/// Cells carry compact [`HyperlinkId`]s; the store owns the URI strings and
/// reference-counts them so records die with the last cell that points at
/// them (overwrite, erase, history eviction).
#[derive(Debug, Clone, Default)]
pub struct HyperlinkStore {
    slots: Vec<Option<HyperlinkSlot>>,
    lookup: HashMap<(String, String), HyperlinkId>,
    free: Vec<HyperlinkId>,
}

impl HyperlinkStore {
    /// Create an empty store. Id 0 is reserved for "no link".
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: vec![None],
            lookup: HashMap::new(),
            free: Vec::new(),
        }
    }

    /// Intern a `(uri, id)` pair, returning its id without touching refcounts.
    ///
    /// An empty URI returns 0.
    pub fn intern(&mut self, uri: &str, id: &str) -> HyperlinkId {
        if uri.is_empty() {
            return 0;
        }
        let key = (uri.to_string(), id.to_string());
        if let Some(&existing) = self.lookup.get(&key) {
            return existing;
        }
        let slot_id = match self.free.pop() {
            Some(reused) => reused,
            None => {
                let next = self.slots.len() as HyperlinkId;
                self.slots.push(None);
                next
            }
        };
        self.slots[slot_id as usize] = Some(HyperlinkSlot {
            info: HyperlinkInfo {
                uri: key.0.clone(),
                id: key.1.clone(),
            },
            ref_count: 0,
        });
        self.lookup.insert(key, slot_id);
        slot_id
    }

    /// Increment the refcount of an existing id; 0 and unknown ids are ignored.
    pub fn acquire(&mut self, id: HyperlinkId) {
        if id == 0 {
            return;
        }
        if let Some(Some(slot)) = self.slots.get_mut(id as usize) {
            slot.ref_count = slot.ref_count.saturating_add(1);
        }
    }

    /// Decrement the refcount of an id, dropping the record at zero.
    pub fn release(&mut self, id: HyperlinkId) {
        if id == 0 {
            return;
        }
        let Some(entry) = self.slots.get_mut(id as usize) else {
            return;
        };
        let drop_it = match entry.as_mut() {
            Some(slot) if slot.ref_count > 0 => {
                slot.ref_count -= 1;
                slot.ref_count == 0
            }
            _ => false,
        };
        if drop_it {
            if let Some(removed) = entry.take() {
                self.lookup.remove(&(removed.info.uri, removed.info.id));
                self.free.push(id);
            }
        }
    }

    /// Release the hyperlink references held by each cell in `cells`.
    pub fn release_cells(&mut self, cells: &[Cell]) {
        for cell in cells {
            self.release(cell.hyperlink);
        }
    }

    /// Look up the record behind an id.
    #[must_use]
    pub fn get(&self, id: HyperlinkId) -> Option<&HyperlinkInfo> {
        self.slots
            .get(id as usize)
            .and_then(|slot| slot.as_ref())
            .map(|slot| &slot.info)
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether no records are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.slots.push(None);
        self.lookup.clear();
        self.free.clear();
    }
}

/// Upper bound on codepoints stored per cell.
///
/// The longest realistic emoji ZWJ sequences run to seven scalars; anything
/// past the cap is dropped and logged rather than grown without bound.
pub const MAX_CODEPOINTS_PER_CELL: usize = 7;

/// One grid position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// The grapheme cluster at this position. Empty for blank cells and for
    /// wide-character continuations.
    codepoints: SmallVec<[char; 2]>,
    /// Display width: 1 (narrow), 2 (wide lead), 0 (continuation).
    width: u8,
    /// Rendition in effect when the cell was written.
    pub attrs: GraphicsAttributes,
    /// Hyperlink reference (0 = none).
    pub hyperlink: HyperlinkId,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            codepoints: SmallVec::new(),
            width: 1,
            attrs: GraphicsAttributes::default(),
            hyperlink: 0,
        }
    }
}

impl Cell {
    /// A narrow cell holding a single codepoint.
    #[must_use]
    pub fn new(ch: char) -> Self {
        let mut codepoints = SmallVec::new();
        codepoints.push(ch);
        Self {
            codepoints,
            width: 1,
            attrs: GraphicsAttributes::default(),
            hyperlink: 0,
        }
    }

    /// Terminal display width of a codepoint (0 for combining marks).
    #[must_use]
    pub fn display_width(ch: char) -> u8 {
        UnicodeWidthChar::width(ch).unwrap_or(0) as u8
    }

    /// Primary codepoint, if any content was written.
    #[must_use]
    pub fn primary(&self) -> Option<char> {
        self.codepoints.first().copied()
    }

    /// All codepoints of the grapheme at this cell.
    #[must_use]
    pub fn codepoints(&self) -> &[char] {
        &self.codepoints
    }

    /// Display width of this cell (0 for continuations).
    #[must_use]
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Whether this is the leading half of a wide character.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        self.width == 2
    }

    /// Whether this is the trailing continuation of a wide character.
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// Whether the cell has no written content (blank or continuation).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.codepoints.is_empty()
    }

    /// Replace the cell content with a fresh grapheme.
    pub fn write(&mut self, ch: char, width: u8, attrs: GraphicsAttributes, link: HyperlinkId) {
        self.codepoints.clear();
        self.codepoints.push(ch);
        self.width = width;
        self.attrs = attrs;
        self.hyperlink = link;
    }

    /// Append a combining codepoint to the grapheme already at this cell.
    ///
    /// Returns false when the per-cell cap would be exceeded (the codepoint
    /// is dropped).
    pub fn push_codepoint(&mut self, ch: char) -> bool {
        if self.codepoints.len() >= MAX_CODEPOINTS_PER_CELL {
            return false;
        }
        self.codepoints.push(ch);
        true
    }

    /// Last codepoint of the grapheme, if any.
    #[must_use]
    pub fn last_codepoint(&self) -> Option<char> {
        self.codepoints.last().copied()
    }

    /// Change the display width in place (VS-16 emoji presentation bump).
    pub fn set_width(&mut self, width: u8) {
        self.width = width;
    }

    /// Turn the cell into the trailing half of a wide character.
    pub fn make_continuation(&mut self, attrs: GraphicsAttributes, link: HyperlinkId) {
        self.codepoints.clear();
        self.width = 0;
        self.attrs = attrs;
        self.hyperlink = link;
    }

    /// Reset to a blank cell that keeps only the given background (BCE).
    pub fn erase(&mut self, background: Color) {
        self.codepoints.clear();
        self.width = 1;
        self.attrs = GraphicsAttributes {
            background,
            ..GraphicsAttributes::default()
        };
        self.hyperlink = 0;
    }

    /// Reset to the pristine blank state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Character projection for text extraction: blanks render as a space,
    /// continuations render as nothing.
    #[must_use]
    pub fn to_text(&self) -> SmallVec<[char; 2]> {
        if self.codepoints.is_empty() {
            if self.width == 0 {
                SmallVec::new()
            } else {
                let mut out = SmallVec::new();
                out.push(' ');
                out
            }
        } else {
            self.codepoints.clone()
        }
    }
}
