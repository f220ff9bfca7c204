// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Font handles and the external measurement services.
//!
//! The engine never parses or shapes fonts itself. It holds opaque
//! [`FontHandle`]s and reaches the host's shaping/measurement machinery
//! through [`FontSource`], and its hyphenation dictionaries through
//! [`Hyphenator`].

use hashbrown::HashSet;

/// Identifier for a font face known to the host's font system.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Debug)]
pub struct FontId(pub u32);

/// A font face at a specific size.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct FontHandle {
    pub id: FontId,
    pub size: f32,
}

/// Vertical and advance metrics for a font at a given size.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct FontMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub line_gap: f32,
    /// Advance of U+0020; also the monospace advance for fixed-pitch faces.
    pub space_width: f32,
    pub is_fixed_pitch: bool,
    pub is_small_caps: bool,
}

impl FontMetrics {
    /// Tab advance to the next tab stop from `x`.
    pub fn tab_width(&self, tab_size: u32, x: f32) -> f32 {
        let stop = self.space_width * tab_size.max(1) as f32;
        stop - (x % stop)
    }
}

/// Ink bounds extending beyond the nominal font box.
///
/// Affects visual overflow and repaint, never layout width.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct GlyphOverflow {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl GlyphOverflow {
    pub fn is_empty(&self) -> bool {
        self.left == 0. && self.right == 0. && self.top == 0. && self.bottom == 0.
    }

    pub fn unite(&mut self, other: &Self) {
        self.left = self.left.max(other.left);
        self.right = self.right.max(other.right);
        self.top = self.top.max(other.top);
        self.bottom = self.bottom.max(other.bottom);
    }
}

/// Set of fonts other than the primary that a measurement touched.
///
/// Cached metrics derived from a measurement must be invalidated when a
/// fallback font's metrics change, so measurements report every face used.
#[derive(Clone, Default, Debug)]
pub struct FallbackFonts {
    fonts: HashSet<FontId>,
}

impl FallbackFonts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, font: FontId) {
        self.fonts.insert(font);
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = FontId> + '_ {
        self.fonts.iter().copied()
    }

    pub fn extend_from(&mut self, other: &Self) {
        for font in other.iter() {
            self.fonts.insert(font);
        }
    }
}

/// The host's shaping and measurement engine.
///
/// Implementations must be deterministic: measuring the same span twice
/// with no intervening font change yields identical results.
pub trait FontSource {
    /// Metrics for a font at its size.
    fn metrics(&self, font: FontHandle) -> FontMetrics;

    /// Measures `text` shaped with `font`.
    ///
    /// `x_pos` is the running inline position, consulted for tab stops when
    /// `expand_tabs` is set. Fallback faces used and ink overflow are
    /// reported through the optional sinks.
    fn shaped_width(
        &self,
        font: FontHandle,
        text: &str,
        x_pos: f32,
        tab_size: u32,
        expand_tabs: bool,
        fallback_fonts: Option<&mut FallbackFonts>,
        glyph_overflow: Option<&mut GlyphOverflow>,
    ) -> f32;

    /// Returns the byte offset within `text` whose glyph boundary is
    /// nearest to `x_target` from the left edge.
    fn offset_for_position(&self, font: FontHandle, text: &str, x_target: f32) -> usize;
}

/// The host's hyphenation dictionary service.
pub trait Hyphenator {
    fn can_hyphenate(&self, locale: &str) -> bool;

    /// Last legal hyphenation point in `word` strictly before byte index
    /// `before_index`, or `None`.
    fn last_hyphen_location(&self, word: &str, before_index: usize, locale: &str) -> Option<usize>;
}

/// A [`Hyphenator`] with no dictionaries; never offers an opportunity.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoHyphenation;

impl Hyphenator for NoHyphenation {
    fn can_hyphenate(&self, _locale: &str) -> bool {
        false
    }

    fn last_hyphen_location(
        &self,
        _word: &str,
        _before_index: usize,
        _locale: &str,
    ) -> Option<usize> {
        None
    }
}
