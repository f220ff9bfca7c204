// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text measurement with a width memo.
//!
//! Widths come from two paths: a fast path for fixed-pitch, all-ASCII
//! content that multiplies out the monospace advance (expanding tabs
//! against the running inline position), and a general path that defers to
//! the host's shaping engine, propagating fallback-font usage and glyph
//! overflow. Plain measurements are memoized for the duration of one
//! layout pass.

use hashbrown::HashMap;

use crate::break_iter::{BreakOracle, TextBreakCache};
use crate::content::{ObjectId, TextContent};
use crate::font::{FallbackFonts, FontId, FontSource, GlyphOverflow};
use crate::style::Style;

/// The rendered suffix for hyphenated breaks.
pub(crate) const HYPHEN_STRING: &str = "\u{2010}";

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
struct WidthKey {
    font: FontId,
    size_bits: u32,
    object: ObjectId,
    start: u32,
    len: u32,
    /// Running x, relevant only when the span expands tabs; zero
    /// otherwise so unrelated positions share an entry.
    x_bits: u32,
}

/// Measures text spans against a [`FontSource`], memoizing plain widths.
pub struct TextMeasurer<'a> {
    fonts: &'a dyn FontSource,
    cache: HashMap<WidthKey, f32>,
}

impl<'a> TextMeasurer<'a> {
    pub fn new(fonts: &'a dyn FontSource) -> Self {
        Self {
            fonts,
            cache: HashMap::new(),
        }
    }

    pub fn fonts(&self) -> &'a dyn FontSource {
        self.fonts
    }

    /// Width of `text[start..start + len]` under `style`, starting at
    /// inline position `x_pos`.
    pub fn text_width(
        &mut self,
        object: ObjectId,
        text: &TextContent,
        style: &Style,
        start: usize,
        len: usize,
        x_pos: f32,
        fallback_fonts: Option<&mut FallbackFonts>,
        glyph_overflow: Option<&mut GlyphOverflow>,
    ) -> f32 {
        if len == 0 {
            return 0.;
        }
        let metrics = self.fonts.metrics(style.font);
        if metrics.is_fixed_pitch
            && !metrics.is_small_caps
            && text.is_all_ascii()
            && glyph_overflow.is_none()
        {
            return self.fixed_pitch_width(text, style, start, len, x_pos, metrics.space_width);
        }

        let slice = &text.text()[start..start + len];
        let expand_tabs = !style.collapse_white_space();
        let wants_sinks = fallback_fonts.is_some() || glyph_overflow.is_some();
        if wants_sinks {
            return self.fonts.shaped_width(
                style.font,
                slice,
                x_pos,
                style.tab_size,
                expand_tabs,
                fallback_fonts,
                glyph_overflow,
            );
        }

        let has_tab = expand_tabs && slice.contains('\t');
        let key = WidthKey {
            font: style.font.id,
            size_bits: style.font.size.to_bits(),
            object,
            start: start as u32,
            len: len as u32,
            x_bits: if has_tab { x_pos.to_bits() } else { 0 },
        };
        if let Some(width) = self.cache.get(&key) {
            return *width;
        }
        let width = self.fonts.shaped_width(
            style.font,
            slice,
            x_pos,
            style.tab_size,
            expand_tabs,
            None,
            None,
        );
        self.cache.insert(key, width);
        width
    }

    fn fixed_pitch_width(
        &self,
        text: &TextContent,
        style: &Style,
        start: usize,
        len: usize,
        x_pos: f32,
        monospace_advance: f32,
    ) -> f32 {
        let metrics = self.fonts.metrics(style.font);
        let mut width = 0.;
        for (index, byte) in text.text().as_bytes()[start..start + len].iter().enumerate() {
            let is_space;
            match byte {
                b' ' | b'\n' => {
                    width += monospace_advance;
                    is_space = true;
                }
                b'\t' => {
                    if style.collapse_white_space() {
                        width += monospace_advance;
                        is_space = true;
                    } else {
                        width += metrics.tab_width(style.tab_size, x_pos + width);
                        is_space = false;
                    }
                }
                b if *b < b' ' => {
                    is_space = false;
                }
                _ => {
                    width += monospace_advance;
                    is_space = false;
                }
            }
            // Word spacing applies once per space boundary; a space that
            // begins the span belongs to the previous boundary.
            if is_space && index > 0 {
                width += style.word_spacing;
            }
        }
        width
    }

    /// Width of the hyphen suffix rendered after a hyphenated break.
    pub fn hyphen_width(
        &mut self,
        style: &Style,
        fallback_fonts: Option<&mut FallbackFonts>,
    ) -> f32 {
        self.fonts.shaped_width(
            style.font,
            HYPHEN_STRING,
            0.,
            style.tab_size,
            false,
            fallback_fonts,
            None,
        )
    }

    /// Min/max preferred widths for a text object, recomputed only while
    /// the object's dirty flag is set.
    ///
    /// `min` is the widest span between soft-break opportunities; `max`
    /// is the widest segment between forced breaks.
    pub fn preferred_widths(
        &mut self,
        oracle: &BreakOracle,
        object: ObjectId,
        text: &mut TextContent,
        style: &Style,
    ) -> (f32, f32) {
        if !text.preferred_widths_dirty {
            return (text.min_width, text.max_width);
        }
        let owned = text.text().to_owned();
        let mut cache = TextBreakCache::default();
        let keep_all = style.word_break == crate::style::WordBreak::KeepAll;
        let break_nbsp = style.nbsp_mode == crate::style::NbspMode::Space;

        let mut max_width = 0_f32;
        let segments: Vec<(usize, &str)> = if style.preserve_newline() {
            let mut out = Vec::new();
            let mut seg_start = 0;
            for (i, ch) in owned.char_indices() {
                if ch == '\n' {
                    out.push((seg_start, &owned[seg_start..i]));
                    seg_start = i + 1;
                }
            }
            out.push((seg_start, &owned[seg_start..]));
            out
        } else {
            vec![(0, owned.as_str())]
        };
        for (seg_start, segment) in &segments {
            if segment.is_empty() {
                continue;
            }
            let width =
                self.text_width(object, text, style, *seg_start, segment.len(), 0., None, None);
            max_width = max_width.max(width);
        }

        let mut min_width = 0_f32;
        let mut chunk_start = 0;
        while chunk_start < owned.len() {
            let first_len = owned[chunk_start..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            let mut next = oracle.next_breakable_position(
                &owned,
                chunk_start + first_len,
                &mut cache,
                None,
                break_nbsp,
                keep_all,
            );
            next = next.min(owned.len());
            let chunk = owned[chunk_start..next]
                .trim_matches(|c: char| style.is_collapsible_white_space(c) || c == '\n');
            if !chunk.is_empty() {
                let offset = chunk.as_ptr() as usize - owned.as_ptr() as usize;
                let width =
                    self.text_width(object, text, style, offset, chunk.len(), 0., None, None);
                min_width = min_width.max(width);
            }
            // Step past any whitespace so every chunk begins on content.
            chunk_start = next;
            while let Some(ch) = owned[chunk_start..].chars().next() {
                if style.is_collapsible_white_space(ch) || ch == ' ' || ch == '\n' {
                    chunk_start += ch.len_utf8();
                } else {
                    break;
                }
            }
        }

        text.min_width = min_width;
        text.max_width = max_width;
        text.preferred_widths_dirty = false;
        (min_width, max_width)
    }
}

impl core::fmt::Debug for TextMeasurer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TextMeasurer")
            .field("cached_widths", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::{test_style, TestFont, ADVANCE};
    use crate::style::WhiteSpace;

    #[test]
    fn measurement_is_idempotent() {
        let fonts = TestFont::default();
        let mut measurer = TextMeasurer::new(&fonts);
        let text = TextContent::new("hello world");
        let style = test_style();
        let first = measurer.text_width(ObjectId(0), &text, &style, 0, 5, 0., None, None);
        let second = measurer.text_width(ObjectId(0), &text, &style, 0, 5, 0., None, None);
        assert_eq!(first, second);
        assert_eq!(first, 5. * ADVANCE);
    }

    #[test]
    fn fixed_pitch_fast_path_expands_tabs_against_running_x() {
        let fonts = TestFont::default();
        let mut measurer = TextMeasurer::new(&fonts);
        let style = crate::style::Style {
            white_space: WhiteSpace::Pre,
            ..test_style()
        };
        let text = TextContent::new("ab\tc");
        // Tab stops every 8 advances: "ab" ends at 20, the tab runs to 80.
        let width = measurer.text_width(ObjectId(0), &text, &style, 0, 4, 0., None, None);
        assert_eq!(width, 80. + ADVANCE);
        // A different running position lands on a different stop.
        let width = measurer.text_width(ObjectId(0), &text, &style, 0, 4, 70., None, None);
        assert_eq!(width, 90. + ADVANCE);
    }

    #[test]
    fn word_spacing_applies_once_per_space_boundary() {
        let fonts = TestFont::default();
        let mut measurer = TextMeasurer::new(&fonts);
        let style = crate::style::Style {
            word_spacing: 3.,
            ..test_style()
        };
        let text = TextContent::new("a b");
        let width = measurer.text_width(ObjectId(0), &text, &style, 0, 3, 0., None, None);
        assert_eq!(width, 3. * ADVANCE + 3.);
        // A span that begins on the space does not re-apply the spacing.
        let width = measurer.text_width(ObjectId(0), &text, &style, 1, 2, 0., None, None);
        assert_eq!(width, 2. * ADVANCE);
    }

    #[test]
    fn preferred_widths_recompute_only_when_dirty() {
        let fonts = TestFont::default();
        let mut measurer = TextMeasurer::new(&fonts);
        let oracle = BreakOracle::new();
        let style = test_style();
        let mut text = TextContent::new("aa bbb c");
        let (min, max) = measurer.preferred_widths(&oracle, ObjectId(0), &mut text, &style);
        assert_eq!(min, 3. * ADVANCE);
        assert_eq!(max, 8. * ADVANCE);

        assert!(!text.preferred_widths_dirty);
        text.set_text("dddd");
        assert!(text.preferred_widths_dirty);
        let (min, max) = measurer.preferred_widths(&oracle, ObjectId(0), &mut text, &style);
        assert_eq!(min, 4. * ADVANCE);
        assert_eq!(max, 4. * ADVANCE);
    }
}
