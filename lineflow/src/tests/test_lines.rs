// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Line box geometry: alignment, vertical metrics, flow edges, overflow
//! truncation and writing modes.

use super::utils::{line_string, text_block, TestFont, ADVANCE, ASCENT, DESCENT};
use crate::{
    BlockFlow, BlockStyle, FontId, InlineBoxNode, InlineStream, LayoutContext, NoHyphenation,
    ReplacedContent, ReplacedKind, TextAlign, TextOverflow, WhiteSpace, WritingMode,
};

fn layout(block: &mut BlockFlow, fonts: &TestFont) {
    let lcx = LayoutContext::new(fonts, &NoHyphenation);
    block.layout(&lcx);
}

fn expansions(line: &crate::RootLineBox) -> Vec<f32> {
    let mut out = Vec::new();
    line.visit_leaves(|leaf| {
        if let InlineBoxNode::Text(text) = leaf {
            out.push(text.expansion);
        }
    });
    out
}

fn text_box_widths(line: &crate::RootLineBox) -> Vec<f32> {
    let mut out = Vec::new();
    line.visit_leaves(|leaf| {
        if let InlineBoxNode::Text(text) = leaf {
            out.push(text.geometry.logical_width);
        }
    });
    out
}

#[test]
fn right_alignment_shifts_line_start() {
    let fonts = TestFont::default();
    let mut style = BlockStyle::new(super::utils::test_style());
    style.text_align = TextAlign::Right;
    let mut builder = InlineStream::builder();
    builder.push_text(super::utils::test_style(), "abc");
    let mut block = BlockFlow::new(style, 100., builder.finish());
    layout(&mut block, &fonts);

    assert_eq!(block.lines()[0].geometry.logical_left, 70.);
}

#[test]
fn center_alignment_splits_slack() {
    let fonts = TestFont::default();
    let mut style = BlockStyle::new(super::utils::test_style());
    style.text_align = TextAlign::Center;
    let mut builder = InlineStream::builder();
    builder.push_text(super::utils::test_style(), "abc");
    let mut block = BlockFlow::new(style, 100., builder.finish());
    layout(&mut block, &fonts);

    assert_eq!(block.lines()[0].geometry.logical_left, 35.);
}

#[test]
fn alignment_conserves_content_width() {
    let fonts = TestFont::default();
    for align in [TextAlign::Left, TextAlign::Right, TextAlign::Center] {
        let mut style = BlockStyle::new(super::utils::test_style());
        style.text_align = align;
        let mut builder = InlineStream::builder();
        builder.push_text(super::utils::test_style(), "ab cd");
        let mut block = BlockFlow::new(style, 200., builder.finish());
        layout(&mut block, &fonts);

        let widths: f32 = text_box_widths(&block.lines()[0]).iter().sum();
        assert_eq!(widths, 5. * ADVANCE, "{align:?} must not alter widths");
    }
}

#[test]
fn justify_expansions_sum_to_slack() {
    let fonts = TestFont::default();
    let mut style = BlockStyle::new(super::utils::test_style());
    style.text_align = TextAlign::Justify;
    let mut builder = InlineStream::builder();
    builder.push_text(super::utils::test_style(), "aa bb cc dd ee xxxxx");
    let mut block = BlockFlow::new(style, 160., builder.finish());
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 2);
    let first = &block.lines()[0];
    // Natural width 150 against 160 available: 10px of slack.
    let total: f32 = expansions(first).iter().sum();
    assert_eq!(total, 10.);
    assert_eq!(first.geometry.logical_width, 160.);

    // The last line is never justified.
    let last_total: f32 = expansions(&block.lines()[1]).iter().sum();
    assert_eq!(last_total, 0.);
}

#[test]
fn baselines_stack_line_by_line() {
    let fonts = TestFont::default();
    let mut block = text_block("aa bb", 2. * ADVANCE);
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 2);
    let line_height = ASCENT + DESCENT;
    assert_eq!(block.lines()[0].geometry.baseline, ASCENT);
    assert_eq!(block.lines()[0].geometry.line_bottom, line_height);
    assert_eq!(block.lines()[1].geometry.line_top, line_height);
    assert_eq!(block.lines()[1].geometry.baseline, line_height + ASCENT);
    assert_eq!(block.height(), 2. * line_height);
}

#[test]
fn replaced_box_raises_line_ascent() {
    let fonts = TestFont::default();
    let style = super::utils::test_style();
    let mut builder = InlineStream::builder();
    builder.push_text(style.clone(), "ab ");
    builder.push_replaced(
        style.clone(),
        ReplacedContent {
            kind: ReplacedKind::Image,
            inline_size: 30.,
            block_size: 20.,
            margin_start: 0.,
            margin_end: 0.,
        },
    );
    let mut block = BlockFlow::new(BlockStyle::new(style), 200., builder.finish());
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 1);
    let line = &block.lines()[0];
    // The 20px-tall image sits on the baseline and dominates the ascent.
    assert_eq!(line.geometry.baseline, 20.);
    assert_eq!(line.geometry.line_bottom, 20. + DESCENT);
    let mut replaced_top = None;
    line.visit_leaves(|leaf| {
        if let InlineBoxNode::Replaced(replaced) = leaf {
            replaced_top = Some(replaced.geometry.logical_top);
        }
    });
    assert_eq!(replaced_top, Some(0.));
}

#[test]
fn empty_inline_edges_occupy_space_and_skip_following_space() {
    let fonts = TestFont::default();
    let style = super::utils::test_style();
    let mut builder = InlineStream::builder();
    builder.open_flow(5., 5.);
    builder.close_flow(style.clone());
    builder.push_text(style.clone(), " x");
    let mut block = BlockFlow::new(BlockStyle::new(style), 200., builder.finish());
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 1);
    let line = &block.lines()[0];
    // The space after the empty inline collapses away.
    assert_eq!(line_string(&block, line), "x");
    // Edges of the empty inline still occupy 10px before the text.
    assert_eq!(line.geometry.logical_width, 10. + ADVANCE);
    let mut has_flow_box = false;
    for child in &line.children {
        if matches!(child, InlineBoxNode::Flow(_)) {
            has_flow_box = true;
        }
    }
    assert!(has_flow_box, "the empty inline gets a box for its edges");
}

#[test]
fn inline_flow_edges_apply_at_element_boundaries() {
    let fonts = TestFont::default();
    let style = super::utils::test_style();
    let mut builder = InlineStream::builder();
    builder.push_text(style.clone(), "a ");
    let flow = builder.open_flow(3., 7.);
    builder.push_text(style.clone(), "bc");
    builder.close_flow(style.clone());
    let mut block = BlockFlow::new(BlockStyle::new(style), 200., builder.finish());
    layout(&mut block, &fonts);

    let line = &block.lines()[0];
    // "a " + start edge + "bc" + end edge.
    assert_eq!(line.geometry.logical_width, 2. * ADVANCE + 3. + 2. * ADVANCE + 7.);
    let mut flow_geometry = None;
    for child in &line.children {
        if let InlineBoxNode::Flow(flow_box) = child {
            assert_eq!(flow_box.flow, flow);
            assert!(flow_box.includes_start_edge);
            assert!(flow_box.includes_end_edge);
            flow_geometry = Some(flow_box.geometry);
        }
    }
    let geometry = flow_geometry.expect("flow box on line");
    assert_eq!(geometry.logical_left, 2. * ADVANCE);
    assert_eq!(geometry.logical_width, 3. + 2. * ADVANCE + 7.);
}

#[test]
fn fallback_fonts_recorded_per_leaf() {
    let fonts = TestFont {
        fallback_for_non_ascii: Some(FontId(7)),
        ..TestFont::default()
    };
    let mut block = text_block("caf\u{E9}", 200.);
    layout(&mut block, &fonts);

    let recorded = block
        .fallback_fonts_for(crate::ObjectId(0), 0)
        .expect("fallback font recorded");
    assert_eq!(recorded, &[FontId(7)]);
}

#[test]
fn ellipsis_truncates_spilling_line() {
    let fonts = TestFont::default();
    let style = crate::Style {
        white_space: WhiteSpace::Nowrap,
        ..super::utils::test_style()
    };
    let mut block_style = BlockStyle::new(style.clone());
    block_style.text_overflow = TextOverflow::Ellipsis;
    let mut builder = InlineStream::builder();
    builder.push_text(style, "abcdefghij");
    let mut block = BlockFlow::new(block_style, 60., builder.finish());
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 1);
    let line = &block.lines()[0];
    let ellipsis = line.ellipsis.expect("ellipsis placed");
    assert_eq!(ellipsis.logical_left, 50.);
    assert_eq!(ellipsis.logical_width, ADVANCE);
    let mut truncation = None;
    line.visit_leaves(|leaf| {
        if let InlineBoxNode::Text(text) = leaf {
            truncation = text.truncation;
        }
    });
    assert_eq!(truncation, Some(5));
}

#[test]
fn vertical_writing_mode_transposes_at_the_edge() {
    let fonts = TestFont::default();
    let style = super::utils::test_style();
    let mut block_style = BlockStyle::new(style.clone());
    block_style.writing_mode = WritingMode::VerticalRl;
    let mut builder = InlineStream::builder();
    builder.push_text(style, "aa bb");
    let mut block = BlockFlow::new(block_style, 2. * ADVANCE, builder.finish());
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 2);
    // Logical geometry is stored untransposed.
    assert_eq!(block.lines()[0].geometry.line_top, 0.);
    let line_height = ASCENT + DESCENT;
    // Physically, the first vertical-rl line is the rightmost column.
    let physical = block.physical_line_rect(0);
    assert_eq!(physical.x, block.height() - line_height);
    assert_eq!(physical.y, 0.);
    assert_eq!(physical.width, line_height);
    assert_eq!(physical.height, 2. * ADVANCE);
}
