// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures: a deterministic fixed-pitch font source and a
//! table-driven hyphenation service.

use hashbrown::HashMap;

use crate::{
    BlockFlow, BlockStyle, FallbackFonts, FontHandle, FontId, FontMetrics, FontSource,
    GlyphOverflow, Hyphenator, InlineBoxNode, InlineStream, ObjectId, RootLineBox, Style,
};

pub(crate) const ADVANCE: f32 = 10.;
pub(crate) const ASCENT: f32 = 8.;
pub(crate) const DESCENT: f32 = 2.;

/// Every character advances by the same amount; soft hyphens are
/// zero-width; non-ASCII characters optionally report a fallback font.
pub(crate) struct TestFont {
    pub advance: f32,
    pub fixed_pitch: bool,
    pub fallback_for_non_ascii: Option<FontId>,
}

impl Default for TestFont {
    fn default() -> Self {
        Self {
            advance: ADVANCE,
            fixed_pitch: true,
            fallback_for_non_ascii: None,
        }
    }
}

impl FontSource for TestFont {
    fn metrics(&self, _font: FontHandle) -> FontMetrics {
        FontMetrics {
            ascent: ASCENT,
            descent: DESCENT,
            line_gap: 0.,
            space_width: self.advance,
            is_fixed_pitch: self.fixed_pitch,
            is_small_caps: false,
        }
    }

    fn shaped_width(
        &self,
        _font: FontHandle,
        text: &str,
        x_pos: f32,
        tab_size: u32,
        expand_tabs: bool,
        mut fallback_fonts: Option<&mut FallbackFonts>,
        _glyph_overflow: Option<&mut GlyphOverflow>,
    ) -> f32 {
        let mut width = 0.;
        for ch in text.chars() {
            width += match ch {
                '\u{00AD}' => 0.,
                '\t' if expand_tabs => {
                    let stop = self.advance * tab_size.max(1) as f32;
                    stop - ((x_pos + width) % stop)
                }
                _ => self.advance,
            };
            if !ch.is_ascii() {
                if let (Some(id), Some(fallback)) =
                    (self.fallback_for_non_ascii, fallback_fonts.as_deref_mut())
                {
                    fallback.add(id);
                }
            }
        }
        width
    }

    fn offset_for_position(&self, _font: FontHandle, text: &str, x_target: f32) -> usize {
        let mut width = 0.;
        for (index, _) in text.char_indices() {
            if width + self.advance > x_target {
                return index;
            }
            width += self.advance;
        }
        text.len()
    }
}

/// Hyphenation points looked up from a fixed table of byte offsets.
#[derive(Default)]
pub(crate) struct TableHyphenator {
    words: HashMap<String, Vec<usize>>,
}

impl TableHyphenator {
    pub fn with_word(mut self, word: &str, points: &[usize]) -> Self {
        self.words.insert(word.to_owned(), points.to_vec());
        self
    }
}

impl Hyphenator for TableHyphenator {
    fn can_hyphenate(&self, locale: &str) -> bool {
        locale == "en"
    }

    fn last_hyphen_location(&self, word: &str, before_index: usize, _locale: &str) -> Option<usize> {
        self.words
            .get(word)?
            .iter()
            .copied()
            .filter(|point| *point < before_index)
            .max()
    }
}

pub(crate) fn test_style() -> Style {
    Style {
        font: FontHandle {
            id: FontId(1),
            size: 10.,
        },
        ..Style::default()
    }
}

pub(crate) fn text_block(text: &str, width: f32) -> BlockFlow {
    text_block_with_style(text, width, test_style())
}

pub(crate) fn text_block_with_style(text: &str, width: f32, style: Style) -> BlockFlow {
    let mut builder = InlineStream::builder();
    builder.push_text(style.clone(), text);
    let block_style = BlockStyle::new(style);
    BlockFlow::new(block_style, width, builder.finish())
}

/// Text boxes of a line in visual order as `(object, start, end)`.
pub(crate) fn text_ranges(line: &RootLineBox) -> Vec<(ObjectId, usize, usize)> {
    let mut ranges = Vec::new();
    line.visit_leaves(|leaf| {
        if let InlineBoxNode::Text(text) = leaf {
            ranges.push((text.object, text.start, text.end()));
        }
    });
    ranges
}

/// Visible text of a line, concatenated in visual order.
pub(crate) fn line_string(block: &BlockFlow, line: &RootLineBox) -> String {
    let mut out = String::new();
    for (object, start, end) in text_ranges(line) {
        out.push_str(&block.stream().get(object).text().expect("text").text()[start..end]);
    }
    out
}
