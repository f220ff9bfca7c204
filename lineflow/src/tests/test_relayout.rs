// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental relayout: clean-line reuse and resynchronization.

use super::utils::{line_string, TestFont, ADVANCE};
use crate::{
    BlockFlow, BlockStyle, InlineStream, LayoutContext, LineGeometry, NoHyphenation, ObjectId,
};

fn layout(block: &mut BlockFlow, fonts: &TestFont) {
    let lcx = LayoutContext::new(fonts, &NoHyphenation);
    block.layout(&lcx);
}

fn geometries(block: &BlockFlow) -> Vec<LineGeometry> {
    block.lines().iter().map(|line| line.geometry).collect()
}

fn three_object_block() -> BlockFlow {
    let style = super::utils::test_style();
    let mut builder = InlineStream::builder();
    builder.push_text(style.clone(), "one two ");
    builder.push_text(style.clone(), "three four ");
    builder.push_text(style.clone(), "five");
    BlockFlow::new(BlockStyle::new(style), 8. * ADVANCE, builder.finish())
}

#[test]
fn relayout_without_changes_reuses_everything() {
    let fonts = TestFont::default();
    let mut block = three_object_block();
    layout(&mut block, &fonts);

    let before = geometries(&block);
    let breaks: Vec<_> = block.lines().iter().map(|l| l.line_break).collect();
    layout(&mut block, &fonts);

    assert_eq!(geometries(&block), before);
    assert_eq!(
        block.lines().iter().map(|l| l.line_break).collect::<Vec<_>>(),
        breaks
    );
    assert!(block.lines().iter().all(|line| !line.is_dirty));
}

#[test]
fn edit_to_last_object_keeps_leading_lines() {
    let fonts = TestFont::default();
    let mut block = three_object_block();
    layout(&mut block, &fonts);
    assert_eq!(block.lines().len(), 4);
    let before = geometries(&block);

    block.append_text(ObjectId(2), "x");
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 4);
    assert_eq!(line_string(&block, &block.lines()[3]), "fivex");
    // Lines before the dirty region are byte-identical.
    assert_eq!(geometries(&block)[0], before[0]);
    assert_eq!(geometries(&block)[1], before[1]);

    // The result matches a from-scratch layout of the same content.
    let style = super::utils::test_style();
    let mut builder = InlineStream::builder();
    builder.push_text(style.clone(), "one two ");
    builder.push_text(style.clone(), "three four ");
    builder.push_text(style.clone(), "fivex");
    let mut fresh = BlockFlow::new(BlockStyle::new(style), 8. * ADVANCE, builder.finish());
    layout(&mut fresh, &fonts);
    assert_eq!(geometries(&block), geometries(&fresh));
}

#[test]
fn edit_to_first_object_reattaches_clean_tail() {
    let fonts = TestFont::default();
    let mut block = three_object_block();
    layout(&mut block, &fonts);
    let before = geometries(&block);

    // Same-width replacement: the tail reattaches with zero delta.
    block.replace_text(ObjectId(0), "six one ");
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 4);
    assert_eq!(line_string(&block, &block.lines()[0]), "six one ");
    assert_eq!(geometries(&block)[1..], before[1..]);
}

#[test]
fn clean_tail_shifts_when_dirty_region_grows() {
    let fonts = TestFont::default();
    let mut block = three_object_block();
    layout(&mut block, &fonts);
    let line_height = block.lines()[0].geometry.height();
    let tail_strings: Vec<_> = block.lines()[1..]
        .iter()
        .map(|line| line_string(&block, line))
        .collect();

    // The first object now needs two lines instead of one.
    block.replace_text(ObjectId(0), "seven eight two ");
    layout(&mut block, &fonts);

    assert_eq!(block.lines().len(), 6);
    assert_eq!(line_string(&block, &block.lines()[0]), "seven ");
    assert_eq!(line_string(&block, &block.lines()[1]), "eight ");
    assert_eq!(line_string(&block, &block.lines()[2]), "two ");
    // The reused lines kept their content and moved down by the extra
    // lines' height.
    for (index, expected) in tail_strings.iter().enumerate() {
        let line = &block.lines()[3 + index];
        assert_eq!(&line_string(&block, line), expected);
        assert_eq!(line.geometry.line_top, (3 + index) as f32 * line_height);
    }
    assert_eq!(block.height(), 6. * line_height);
}

#[test]
fn content_replacement_forces_consistent_full_result() {
    let fonts = TestFont::default();
    let mut block = three_object_block();
    layout(&mut block, &fonts);

    block.replace_text(ObjectId(1), "3 4 ");
    block.append_text(ObjectId(2), " 6");
    layout(&mut block, &fonts);

    let style = super::utils::test_style();
    let mut builder = InlineStream::builder();
    builder.push_text(style.clone(), "one two ");
    builder.push_text(style.clone(), "3 4 ");
    builder.push_text(style.clone(), "five 6");
    let mut fresh = BlockFlow::new(BlockStyle::new(style), 8. * ADVANCE, builder.finish());
    layout(&mut fresh, &fonts);

    assert_eq!(block.lines().len(), fresh.lines().len());
    assert_eq!(geometries(&block), geometries(&fresh));
    for (line, fresh_line) in block.lines().iter().zip(fresh.lines()) {
        assert_eq!(line_string(&block, line), line_string(&fresh, fresh_line));
    }
}
