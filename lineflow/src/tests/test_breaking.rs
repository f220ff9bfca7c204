// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end line breaking scenarios.

use super::utils::{
    line_string, text_block, text_block_with_style, text_ranges, TableHyphenator, TestFont,
    ADVANCE,
};
use crate::{
    BlockFlow, BlockStyle, FloatContent, FloatSide, Hyphens, InlineStream, LayoutContext,
    NbspMode, NoHyphenation, ObjectId, WhiteSpace, WordBreak,
};

fn layout(block: &mut BlockFlow, fonts: &TestFont) {
    let lcx = LayoutContext::new(fonts, &NoHyphenation);
    block.layout(&lcx);
}

#[test]
fn break_after_word_with_trailing_space_on_first_line() {
    // Width of exactly "The quick brown " (16 monospace advances).
    let fonts = TestFont::default();
    let mut block = text_block("The quick brown fox jumps", 16. * ADVANCE);
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 2);
    let first = &block.lines()[0];
    assert_eq!(line_string(&block, first), "The quick brown ");
    assert_eq!(first.line_break.object, Some(ObjectId(0)));
    assert_eq!(first.line_break.offset, 16);
    // The next line starts at "fox".
    assert_eq!(line_string(&block, &block.lines()[1]), "fox jumps");
    assert_eq!(block.lines()[1].geometry.logical_width, 9. * ADVANCE);
}

#[test]
fn ascii_break_after_hyphen() {
    let fonts = TestFont::default();
    let mut block = text_block("a-b", 2. * ADVANCE);
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 2);
    assert_eq!(line_string(&block, &block.lines()[0]), "a-");
    assert_eq!(line_string(&block, &block.lines()[1]), "b");
}

#[test]
fn unbreakable_token_overflows_one_line() {
    let fonts = TestFont::default();
    let token: String = core::iter::repeat('x').take(50).collect();
    let mut block = text_block(&token, 100.);
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 1);
    let line = &block.lines()[0];
    assert_eq!(line.geometry.logical_width, 500.);
    // Overflow is recorded, not an error.
    assert_eq!(block.visual_overflow().inline_size, 500.);
}

#[test]
fn consecutive_spaces_collapse_to_one() {
    let fonts = TestFont::default();
    let mut block = text_block("a  b", 400.);
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 1);
    let line = &block.lines()[0];
    // Two runs, "a " and "b": exactly one space-equivalent gap.
    assert_eq!(
        text_ranges(line),
        vec![(ObjectId(0), 0, 2), (ObjectId(0), 3, 4)]
    );
    assert_eq!(line_string(&block, line), "a b");
    assert_eq!(line.geometry.logical_width, 3. * ADVANCE);
}

#[test]
fn forward_progress_at_zero_width() {
    let fonts = TestFont::default();
    let mut block = text_block("ab cd", 0.);
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 2);
    assert_eq!(line_string(&block, &block.lines()[0]), "ab");
    assert_eq!(line_string(&block, &block.lines()[1]), "cd");
}

#[test]
fn preserved_newline_forces_break() {
    let fonts = TestFont::default();
    let style = crate::Style {
        white_space: WhiteSpace::Pre,
        ..super::utils::test_style()
    };
    let mut block = text_block_with_style("ab\ncd", 400., style);
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 2);
    let first = &block.lines()[0];
    assert!(first.ends_with_break);
    // The newline sits in its own zero-width box at the line's end.
    let ranges = text_ranges(first);
    assert_eq!(ranges.first(), Some(&(ObjectId(0), 0, 2)));
    assert_eq!(line_string(&block, &block.lines()[1]), "cd");
    // The newline box contributes no width.
    assert_eq!(first.geometry.logical_width, 2. * ADVANCE);
}

#[test]
fn soft_hyphen_breaks_with_hyphen_glyph() {
    let fonts = TestFont::default();
    let mut block = text_block("super\u{00AD}cali", 6. * ADVANCE);
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 2);
    let first = &block.lines()[0];
    assert!(first.is_hyphenated);
    let mut has_hyphen = false;
    first.visit_leaves(|leaf| {
        if let crate::InlineBoxNode::Text(text) = leaf {
            has_hyphen |= text.has_hyphen;
        }
    });
    assert!(has_hyphen, "the breaking box renders the hyphen glyph");
    // "super" plus soft hyphen plus the reserved hyphen glyph.
    assert_eq!(first.geometry.logical_width, 6. * ADVANCE);
    assert_eq!(line_string(&block, &block.lines()[1]), "cali");
}

#[test]
fn soft_hyphen_width_refunded_when_line_fits() {
    let fonts = TestFont::default();
    let mut block = text_block("su\u{00AD}per", 400.);
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 1);
    let line = &block.lines()[0];
    assert!(!line.is_hyphenated);
    // Five visible characters; the soft hyphen is zero-width and the
    // reserved hyphen glyph was refunded when the line fit.
    assert_eq!(line.geometry.logical_width, 5. * ADVANCE);
}

#[test]
fn automatic_hyphenation_uses_dictionary() {
    let fonts = TestFont::default();
    let hyphenator = TableHyphenator::default().with_word("hyphenation", &[2, 6]);
    let style = crate::Style {
        hyphens: Hyphens::Auto,
        locale: Some("en".to_owned()),
        ..super::utils::test_style()
    };
    let mut block = text_block_with_style("hyphenation", 8. * ADVANCE, style);
    let lcx = LayoutContext::new(&fonts, &hyphenator);
    block.layout(&lcx);

    assert_eq!(block.lines().len(), 2);
    let first = &block.lines()[0];
    assert!(first.is_hyphenated);
    assert_eq!(line_string(&block, first), "hyphen");
    assert_eq!(line_string(&block, &block.lines()[1]), "ation");
}

#[test]
fn hyphenation_unavailable_is_not_fatal() {
    let fonts = TestFont::default();
    let style = crate::Style {
        hyphens: Hyphens::Auto,
        locale: Some("xx".to_owned()),
        ..super::utils::test_style()
    };
    let mut block = text_block_with_style("hyphenation", 8. * ADVANCE, style);
    layout(&mut block, &fonts);

    // Falls back to the non-hyphenated break decision: one overflowing
    // line, since the word is unbreakable.
    assert_eq!(block.lines().len(), 1);
    assert!(!block.lines()[0].is_hyphenated);
}

#[test]
fn break_all_splits_inside_words() {
    let fonts = TestFont::default();
    let style = crate::Style {
        word_break: WordBreak::BreakAll,
        ..super::utils::test_style()
    };
    let mut block = text_block_with_style("abcdefghi", 3. * ADVANCE, style);
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 3);
    assert_eq!(line_string(&block, &block.lines()[0]), "abc");
    assert_eq!(line_string(&block, &block.lines()[1]), "def");
    assert_eq!(line_string(&block, &block.lines()[2]), "ghi");
}

#[test]
fn nbsp_breaks_only_in_space_mode() {
    let fonts = TestFont::default();
    let mut block = text_block("aa\u{00A0}bb", 3. * ADVANCE);
    layout(&mut block, &fonts);
    assert_eq!(block.lines().len(), 1, "NBSP glues by default");

    let style = crate::Style {
        nbsp_mode: NbspMode::Space,
        ..super::utils::test_style()
    };
    let mut block = text_block_with_style("aa\u{00A0}bb", 3. * ADVANCE, style);
    layout(&mut block, &fonts);
    assert_eq!(block.lines().len(), 2);
    assert_eq!(line_string(&block, &block.lines()[1]), "bb");
}

#[test]
fn midpoint_parity_on_finalized_lines() {
    // Multiple collapsed regions within one line still leave runs that
    // cover the content modulo collapsed whitespace.
    let fonts = TestFont::default();
    let mut block = text_block("a  b  c", 400.);
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 1);
    let line = &block.lines()[0];
    assert_eq!(line_string(&block, line), "a b c");
    assert_eq!(
        text_ranges(line),
        vec![
            (ObjectId(0), 0, 2),
            (ObjectId(0), 3, 5),
            (ObjectId(0), 6, 7)
        ]
    );
}

#[test]
fn float_narrows_lines_it_straddles() {
    let fonts = TestFont::default();
    let style = super::utils::test_style();
    let mut builder = InlineStream::builder();
    builder.push_float(
        style.clone(),
        FloatContent {
            side: FloatSide::Left,
            inline_size: 40.,
            block_size: 25.,
        },
    );
    builder.push_text(style.clone(), "aaaa bbbb cccc");
    let mut block = BlockFlow::new(BlockStyle::new(style), 100., builder.finish());
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 3);
    assert_eq!(line_string(&block, &block.lines()[0]), "aaaa ");
    assert_eq!(line_string(&block, &block.lines()[1]), "bbbb ");
    assert_eq!(line_string(&block, &block.lines()[2]), "cccc");
    // Lines alongside the float start past its edge.
    assert_eq!(block.lines()[0].geometry.logical_left, 40.);
    assert_eq!(block.lines()[1].geometry.logical_left, 40.);
    assert_eq!(block.lines()[2].geometry.logical_left, 40.);
    // The float is attributed to the line that placed it.
    assert_eq!(block.lines()[0].floats.len(), 1);
}

#[test]
fn line_pushed_below_float_when_too_narrow() {
    let fonts = TestFont::default();
    let style = super::utils::test_style();
    let mut builder = InlineStream::builder();
    builder.push_float(
        style.clone(),
        FloatContent {
            side: FloatSide::Left,
            inline_size: 80.,
            block_size: 25.,
        },
    );
    builder.push_text(style.clone(), "cccccc");
    let mut block = BlockFlow::new(BlockStyle::new(style), 100., builder.finish());
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 1);
    let line = &block.lines()[0];
    // The word cannot fit beside the float, so the line dropped below it
    // and uses the full width; a positional retry, not an error.
    assert_eq!(line.geometry.line_top, 25.);
    assert_eq!(line.geometry.logical_left, 0.);
    assert_eq!(line.geometry.logical_width, 60.);
}
