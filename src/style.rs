use std::fmt;

/// Horizontal indent added per quote nesting level, in mm.
pub const QUOTE_INDENT: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    Bold,
    Italic,
    Underline,
}

/// Active font style combination, always rendered in b, i, u order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FontStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl FontStyle {
    pub const REGULAR: FontStyle = FontStyle {
        bold: false,
        italic: false,
        underline: false,
    };
    pub const BOLD: FontStyle = FontStyle {
        bold: true,
        italic: false,
        underline: false,
    };
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bold {
            f.write_str("b")?;
        }
        if self.italic {
            f.write_str("i")?;
        }
        if self.underline {
            f.write_str("u")?;
        }
        Ok(())
    }
}

/// Nesting counters for the three toggle styles. A close without a matching
/// open leaves the counter at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StyleState {
    bold: u32,
    italic: u32,
    underline: u32,
}

impl StyleState {
    fn counter(&mut self, style: Style) -> &mut u32 {
        match style {
            Style::Bold => &mut self.bold,
            Style::Italic => &mut self.italic,
            Style::Underline => &mut self.underline,
        }
    }

    pub fn enable(&mut self, style: Style) {
        *self.counter(style) += 1;
    }

    pub fn disable(&mut self, style: Style) {
        let c = self.counter(style);
        *c = c.saturating_sub(1);
    }

    /// Drops every open level of `style` at once.
    pub fn clear(&mut self, style: Style) {
        *self.counter(style) = 0;
    }

    pub fn depth(&self, style: Style) -> u32 {
        match style {
            Style::Bold => self.bold,
            Style::Italic => self.italic,
            Style::Underline => self.underline,
        }
    }

    pub fn current(&self) -> FontStyle {
        FontStyle {
            bold: self.bold > 0,
            italic: self.italic > 0,
            underline: self.underline > 0,
        }
    }
}

/// Result of entering a quote level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuoteEntry {
    /// True when this entry opened the outermost quote (a new box starts).
    pub opened_box: bool,
    /// Amount the left margin moves right.
    pub margin_shift: f32,
}

/// Result of leaving a quote level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuoteExit {
    /// True when the outermost quote closed and its box must be drawn.
    pub closed_box: bool,
    /// Amount the left margin moves back left.
    pub margin_shift: f32,
}

/// Block-quote nesting. `depth == 0` means no quote box is active; while
/// `depth > 0`, `start_y` is the top of the box fragment on the current page.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QuoteContext {
    pub depth: u32,
    pub start_y: f32,
    pub base_left_margin: f32,
    /// Quote headers seen whose `<blockquote>` has not opened yet.
    pending_headers: u32,
}

impl QuoteContext {
    pub fn is_open(&self) -> bool {
        self.depth > 0
    }

    /// A quote header (`div.quoteheader`) opens a level; the blockquote that
    /// follows it belongs to the same level.
    pub fn enter_from_header(&mut self, y: f32, left_margin: f32) -> QuoteEntry {
        self.pending_headers += 1;
        self.enter(y, left_margin)
    }

    /// A `<blockquote>` opens a level unless a header already did.
    pub fn enter_from_blockquote(&mut self, y: f32, left_margin: f32) -> Option<QuoteEntry> {
        if self.pending_headers > 0 {
            self.pending_headers -= 1;
            return None;
        }
        Some(self.enter(y, left_margin))
    }

    fn enter(&mut self, y: f32, left_margin: f32) -> QuoteEntry {
        let opened_box = self.depth == 0;
        if opened_box {
            self.start_y = y;
            self.base_left_margin = left_margin;
        }
        let margin_shift = self.depth as f32 * QUOTE_INDENT;
        self.depth += 1;
        QuoteEntry {
            opened_box,
            margin_shift,
        }
    }

    /// Returns `None` when no quote is open.
    pub fn exit(&mut self) -> Option<QuoteExit> {
        if self.depth == 0 {
            return None;
        }
        self.depth -= 1;
        let closed_box = self.depth == 0;
        if closed_box {
            self.pending_headers = 0;
        }
        Some(QuoteExit {
            closed_box,
            margin_shift: self.depth as f32 * QUOTE_INDENT,
        })
    }
}
