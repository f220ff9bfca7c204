// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Block-level driver for inline layout.
//!
//! [`BlockFlow`] owns a block's inline content stream, float list,
//! produced line boxes and measurement side tables. [`BlockFlow::layout`]
//! runs the full pipeline: clean/dirty synchronization, the greedy
//! breaker per line, bidi run production, box construction and alignment,
//! float attribution, and finally text-overflow truncation.

use hashbrown::HashMap;
use log::debug;

use crate::bidi::{
    bidi_runs_for_line, reorder_runs_visual, split_trailing_space_run, ParagraphBidi,
};
use crate::boxes::construct::{construct_line, LeafKey, LineConstructionInputs};
use crate::boxes::{LineBreakPosition, LineFloat, RootLineBox};
use crate::break_iter::BreakOracle;
use crate::breaker::{BreakerTextState, LineBreaker, LineInfo, WordMeasurement};
use crate::content::{InlineStream, ObjectId, ObjectKind};
use crate::font::{FontId, FontSource, GlyphOverflow, Hyphenator};
use crate::geometry::{LogicalRect, PhysicalRect};
use crate::line_width::{BlockGeometry, FloatList};
use crate::measure::TextMeasurer;
use crate::midpoint::MidpointState;
use crate::position::InlinePosition;
use crate::relayout::{
    attach_end_line, determine_end_position, determine_start_position, dirty_lines_for_object,
    matched_end_line, FloatWithRect, LineLayoutState,
};
use crate::style::{BlockStyle, Clear, TextOverflow};

const HORIZONTAL_ELLIPSIS: &str = "\u{2026}";

/// Lower and upper bounds on the block's width based on its contents.
#[derive(Copy, Clone, Debug)]
pub struct ContentWidths {
    /// Width if every soft-break opportunity is taken.
    pub min: f32,
    /// Width if no soft-break opportunity is taken.
    pub max: f32,
}

/// Shared services for layout passes: the host's font and hyphenation
/// machinery plus the breakability oracle.
pub struct LayoutContext<'a> {
    pub(crate) fonts: &'a dyn FontSource,
    pub(crate) hyphenator: &'a dyn Hyphenator,
    pub(crate) oracle: BreakOracle,
}

impl<'a> LayoutContext<'a> {
    pub fn new(fonts: &'a dyn FontSource, hyphenator: &'a dyn Hyphenator) -> Self {
        Self {
            fonts,
            hyphenator,
            oracle: BreakOracle::new(),
        }
    }
}

impl core::fmt::Debug for LayoutContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayoutContext").finish_non_exhaustive()
    }
}

/// A block-level container laying out inline content into lines.
#[derive(Debug)]
pub struct BlockFlow {
    style: BlockStyle,
    stream: InlineStream,
    geometry: BlockGeometry,
    floats: FloatList,
    lines: Vec<RootLineBox>,
    glyph_overflow_map: HashMap<LeafKey, GlyphOverflow>,
    fallback_fonts_map: HashMap<LeafKey, Vec<FontId>>,
    needs_full_layout: bool,
    preferred_widths_dirty: bool,
    preferred_widths: ContentWidths,
}

impl BlockFlow {
    pub fn new(style: BlockStyle, content_width: f32, stream: InlineStream) -> Self {
        Self {
            style,
            stream,
            geometry: BlockGeometry {
                content_width,
                logical_height: 0.,
            },
            floats: FloatList::default(),
            lines: Vec::new(),
            glyph_overflow_map: HashMap::new(),
            fallback_fonts_map: HashMap::new(),
            needs_full_layout: true,
            preferred_widths_dirty: true,
            preferred_widths: ContentWidths { min: 0., max: 0. },
        }
    }

    pub fn style(&self) -> &BlockStyle {
        &self.style
    }

    pub fn stream(&self) -> &InlineStream {
        &self.stream
    }

    pub fn lines(&self) -> &[RootLineBox] {
        &self.lines
    }

    pub fn floats(&self) -> &FloatList {
        &self.floats
    }

    pub fn content_width(&self) -> f32 {
        self.geometry.content_width
    }

    /// Block-axis extent of the laid-out content.
    pub fn height(&self) -> f32 {
        self.geometry.logical_height
    }

    pub fn set_content_width(&mut self, content_width: f32) {
        if self.geometry.content_width != content_width {
            self.geometry.content_width = content_width;
            self.needs_full_layout = true;
        }
    }

    /// Glyph ink overflow recorded for a leaf, if any.
    pub fn glyph_overflow_for(&self, object: ObjectId, start: usize) -> Option<&GlyphOverflow> {
        self.glyph_overflow_map.get(&(object, start as u32))
    }

    /// Fallback fonts recorded for a leaf during measurement.
    pub fn fallback_fonts_for(&self, object: ObjectId, start: usize) -> Option<&[FontId]> {
        self.fallback_fonts_map
            .get(&(object, start as u32))
            .map(Vec::as_slice)
    }

    /// Replaces a text object's content, dirtying the lines it touched.
    pub fn replace_text(&mut self, object: ObjectId, text: impl Into<String>) {
        if let Some(content) = self.stream.get_mut(object).text_mut() {
            content.set_text(text);
        }
        self.mark_object_dirty(object);
    }

    /// Appends to a text object's content, dirtying the lines it touched.
    pub fn append_text(&mut self, object: ObjectId, suffix: &str) {
        if let Some(content) = self.stream.get_mut(object).text_mut() {
            let mut text = content.text().to_owned();
            text.push_str(suffix);
            content.set_text(text);
        }
        self.mark_object_dirty(object);
    }

    pub fn mark_object_dirty(&mut self, object: ObjectId) {
        self.stream.mark_dirty(object);
        dirty_lines_for_object(&mut self.lines, object);
        self.preferred_widths_dirty = true;
    }

    /// Union of the lines' visual overflow, in logical coordinates.
    pub fn visual_overflow(&self) -> LogicalRect {
        let mut overflow = LogicalRect::default();
        for line in &self.lines {
            overflow.unite(&line.visual_overflow);
        }
        overflow
    }

    /// A line's content rect transposed into physical coordinates.
    pub fn physical_line_rect(&self, index: usize) -> PhysicalRect {
        let line = &self.lines[index];
        let rect = LogicalRect::new(
            line.geometry.logical_left,
            line.geometry.line_top,
            line.geometry.logical_width,
            line.geometry.height(),
        );
        self.style
            .writing_mode
            .to_physical(rect, self.geometry.logical_height)
    }

    /// Min/max preferred widths, recomputed only while dirty.
    pub fn preferred_widths(&mut self, lcx: &LayoutContext<'_>) -> ContentWidths {
        if !self.preferred_widths_dirty {
            return self.preferred_widths;
        }
        let mut measurer = TextMeasurer::new(lcx.fonts);
        let mut min = 0_f32;
        let mut max = 0_f32;
        for id in self.stream.iter_ids() {
            let object = self.stream.get_mut(id);
            let style = object.style.clone();
            match &mut object.kind {
                ObjectKind::Text(text) => {
                    let (text_min, text_max) =
                        measurer.preferred_widths(&lcx.oracle, id, text, &style);
                    min = min.max(text_min);
                    max += text_max;
                }
                ObjectKind::Replaced(replaced) => {
                    min = min.max(replaced.margin_box_inline_size());
                    max += replaced.margin_box_inline_size();
                }
                _ => {}
            }
        }
        self.preferred_widths = ContentWidths { min, max };
        self.preferred_widths_dirty = false;
        self.preferred_widths
    }

    /// Lays out the inline content into lines, reusing clean lines where
    /// the edit since the last pass allows it.
    pub fn layout(&mut self, lcx: &LayoutContext<'_>) {
        let up_to_date = !self.needs_full_layout
            && !self.lines.is_empty()
            && !self.stream.any_dirty()
            && !self.lines.iter().any(|line| line.is_dirty);
        if up_to_date {
            return;
        }

        let mut state = LineLayoutState {
            is_full_layout: self.needs_full_layout || self.lines.is_empty(),
            ..LineLayoutState::default()
        };

        // Propagate object dirtiness to the lines that rendered them.
        for id in self.stream.iter_ids() {
            if self.stream.get(id).needs_layout {
                dirty_lines_for_object(&mut self.lines, id);
            }
        }

        // Snapshot float geometry for clean-line matching, then rebuild
        // the float list from scratch.
        state.floats = self
            .floats
            .entries()
            .iter()
            .map(|entry| FloatWithRect {
                object: entry.object,
                side: entry.side,
                rect: entry.rect,
            })
            .collect();
        self.floats.clear();
        self.geometry.logical_height = 0.;

        let bidi = ParagraphBidi::new(&self.stream, self.style.style.direction);
        let mut measurer = TextMeasurer::new(lcx.fonts);

        let start = determine_start_position(
            &mut state,
            &mut self.lines,
            &self.stream,
            &mut self.floats,
            &mut self.geometry,
        );
        let kept = start.first_dirty_line.min(self.lines.len());
        if state.is_full_layout {
            self.glyph_overflow_map.clear();
            self.fallback_fonts_map.clear();
        } else if kept < self.lines.len() {
            determine_end_position(&mut state, &mut self.lines, &self.stream, kept);
        }
        self.lines.truncate(kept);

        let mut line_info = LineInfo::default();
        let mut resolver;
        if kept > 0 {
            let previous = &self.lines[kept - 1];
            resolver = InlinePosition::new(previous.line_break.object, previous.line_break.offset);
            line_info.is_first_line = false;
            line_info.previous_line_broke_cleanly = previous.ends_with_break;
        } else {
            resolver = InlinePosition::new(self.stream.first(), 0);
        }

        let consecutive_hyphenated = self.lines[..kept]
            .iter()
            .rev()
            .take_while(|line| line.is_hyphenated)
            .count() as u32;

        self.stream.clear_dirty_flags();

        self.layout_runs_and_floats(
            lcx,
            &mut state,
            &mut measurer,
            &bidi,
            &mut resolver,
            &mut line_info,
            consecutive_hyphenated,
        );

        if state.end_line_matched {
            attach_end_line(
                &mut state,
                &mut self.lines,
                &mut self.floats,
                &mut self.geometry,
            );
        } else if state.has_end_line() {
            // The clean tail never lined up; the rebuilt lines replace it.
            debug!(
                "line layout: discarding {} unmatched clean lines",
                state.end_line.len()
            );
            state.end_line.clear();
        }

        if self.style.text_overflow == TextOverflow::Ellipsis {
            self.check_lines_for_text_overflow(&mut measurer);
        }

        self.needs_full_layout = false;
    }

    #[allow(clippy::too_many_arguments)]
    fn layout_runs_and_floats(
        &mut self,
        lcx: &LayoutContext<'_>,
        state: &mut LineLayoutState,
        measurer: &mut TextMeasurer<'_>,
        bidi: &ParagraphBidi,
        resolver: &mut InlinePosition,
        line_info: &mut LineInfo,
        mut consecutive_hyphenated_lines: u32,
    ) {
        let Self {
            style,
            stream,
            geometry,
            floats,
            lines,
            glyph_overflow_map,
            fallback_fonts_map,
            ..
        } = self;

        let mut midpoints = MidpointState::default();
        let mut word_measurements: Vec<WordMeasurement> = Vec::new();
        let mut text_state = BreakerTextState::default();
        let mut check_for_end_line = state.has_end_line();
        let mut end = *resolver;

        while !end.at_end() {
            if check_for_end_line {
                let position = LineBreakPosition {
                    object: end.object,
                    offset: end.offset,
                    bidi: bidi.snapshot_at(&end),
                };
                if matched_end_line(state, &position, floats, geometry) {
                    state.end_line_matched = true;
                    break;
                }
            }

            midpoints.reset();
            line_info.is_empty = true;
            word_measurements.clear();
            let floats_before_line = floats.len();

            let mut line_start = end;
            let mut breaker = LineBreaker::new(
                stream,
                style,
                measurer,
                &lcx.oracle,
                lcx.hyphenator,
                &mut text_state,
            );
            let line_end = breaker.next_line_break(
                &mut line_start,
                line_info,
                &mut midpoints,
                geometry,
                floats,
                consecutive_hyphenated_lines,
                &mut word_measurements,
            );
            let hyphenated = breaker.hyphenated;
            let line_clear = breaker.clear;
            let positioned_objects = core::mem::take(&mut breaker.positioned_objects);
            drop(breaker);

            if line_start.at_end() {
                // Skipping leading content consumed the rest: no line.
                break;
            }
            debug_assert!(line_end != line_start, "line breaker made no progress");

            if line_info.is_empty {
                // Nothing renders; just remember where scanning resumed.
                if let Some(last) = lines.last_mut() {
                    last.line_break = LineBreakPosition {
                        object: line_end.object,
                        offset: line_end.offset,
                        bidi: bidi.snapshot_at(&line_end),
                    };
                }
            } else {
                let mut runs =
                    bidi_runs_for_line(stream, bidi, &mut midpoints, &line_start, &line_end);
                let trailing = if !line_info.previous_line_broke_cleanly {
                    split_trailing_space_run(stream, bidi, &mut runs)
                } else {
                    None
                };
                if !runs.is_empty() && hyphenated {
                    runs.last_mut().expect("non-empty").has_hyphen = true;
                    consecutive_hyphenated_lines += 1;
                } else {
                    consecutive_hyphenated_lines = 0;
                }
                if bidi.has_rtl() {
                    reorder_runs_visual(&mut runs);
                }
                let trailing_index = trailing.map(|run| {
                    if style.is_ltr() {
                        runs.push(run);
                        runs.len() - 1
                    } else {
                        runs.insert(0, run);
                        0
                    }
                });

                if !runs.is_empty() {
                    let line_top = geometry.logical_height;
                    let left_offset = floats.left_offset(line_top, 0.);
                    let right_offset =
                        floats.right_offset(line_top, 0., geometry.content_width);
                    let inputs = LineConstructionInputs {
                        line_break: LineBreakPosition {
                            object: line_end.object,
                            offset: line_end.offset,
                            bidi: bidi.snapshot_at(&line_end),
                        },
                        ends_with_break: line_info.previous_line_broke_cleanly,
                        is_hyphenated: hyphenated,
                        reached_end: line_end.at_end(),
                        line_top,
                        logical_left: left_offset,
                        available_width: (right_offset - left_offset).max(0.),
                    };
                    let line = construct_line(
                        stream,
                        style,
                        measurer,
                        &runs,
                        trailing_index,
                        &word_measurements,
                        &inputs,
                        glyph_overflow_map,
                        fallback_fonts_map,
                    );
                    geometry.logical_height = line.geometry.line_bottom;
                    lines.push(line);
                }
            }

            // Inline static positions for positioned boxes with inline
            // display were deferred until the line existed.
            for object in positioned_objects {
                let inline = if style.is_ltr() {
                    floats.left_offset(geometry.logical_height, 0.)
                } else {
                    floats.right_offset(geometry.logical_height, 0., geometry.content_width)
                };
                if let ObjectKind::Positioned(positioned) = &mut stream.get_mut(object).kind {
                    positioned.static_inline = Some(inline);
                }
            }

            if !line_info.is_empty {
                line_info.is_first_line = false;
                if line_clear != Clear::None {
                    if let Some(bottom) =
                        floats.clearance_below(line_clear, geometry.logical_height)
                    {
                        geometry.logical_height = bottom;
                    }
                }
            }

            // Floats that didn't fit on the line drop below it now.
            floats.place_unplaced(geometry);

            // Attribute this line's floats to it. Any float whose
            // geometry no longer matches the snapshot ends the clean-tail
            // optimism.
            if let Some(last) = lines.last_mut() {
                for index in floats_before_line..floats.len() {
                    let entry = floats.entry(index);
                    last.floats.push(LineFloat {
                        object: entry.object,
                        side: entry.side,
                        rect: entry.rect,
                    });
                    if check_for_end_line {
                        match state.floats.get(state.float_index) {
                            Some(snapshot)
                                if snapshot.object == entry.object
                                    && snapshot.rect == entry.rect => {}
                            _ => check_for_end_line = false,
                        }
                        state.float_index += 1;
                    }
                }
            }

            midpoints.reset();
            end = line_end;
        }
    }

    /// Truncates lines that spill past the block edge, placing an
    /// ellipsis box, when `text-overflow: ellipsis` applies.
    fn check_lines_for_text_overflow(&mut self, measurer: &mut TextMeasurer<'_>) {
        let ellipsis_width = measurer.fonts().shaped_width(
            self.style.style.font,
            HORIZONTAL_ELLIPSIS,
            0.,
            self.style.style.tab_size,
            false,
            None,
            None,
        );
        let is_ltr = self.style.is_ltr();
        for line in &mut self.lines {
            line.clear_truncation();
            let block_left_edge = self.floats.left_offset(line.geometry.line_top, 0.);
            let block_right_edge = self.floats.right_offset(
                line.geometry.line_top,
                0.,
                self.geometry.content_width,
            );
            let line_box_edge = if is_ltr {
                line.geometry.logical_left + line.geometry.logical_width
            } else {
                line.geometry.logical_left
            };
            let spills = if is_ltr {
                line_box_edge > block_right_edge
            } else {
                line_box_edge < block_left_edge
            };
            if !spills {
                continue;
            }
            // The line must be able to accommodate the ellipsis glyph.
            if block_right_edge - block_left_edge <= ellipsis_width {
                continue;
            }
            let ellipsis_left = if is_ltr {
                block_right_edge - ellipsis_width
            } else {
                block_left_edge
            };
            place_ellipsis(
                &self.stream,
                measurer,
                line,
                is_ltr,
                ellipsis_left,
                ellipsis_width,
            );
        }
    }
}

/// Truncates the leaf under the ellipsis position and records the
/// ellipsis box on the line.
fn place_ellipsis(
    stream: &InlineStream,
    measurer: &mut TextMeasurer<'_>,
    line: &mut RootLineBox,
    is_ltr: bool,
    ellipsis_left: f32,
    ellipsis_width: f32,
) {
    use crate::boxes::{EllipsisBox, InlineBoxNode};

    fn truncate(
        node: &mut InlineBoxNode,
        stream: &InlineStream,
        measurer: &mut TextMeasurer<'_>,
        is_ltr: bool,
        ellipsis_left: f32,
        ellipsis_width: f32,
    ) {
        match node {
            InlineBoxNode::Flow(flow) => {
                for child in &mut flow.children {
                    truncate(child, stream, measurer, is_ltr, ellipsis_left, ellipsis_width);
                }
            }
            InlineBoxNode::Text(text_box) => {
                let geometry = text_box.geometry;
                let visible_limit = if is_ltr {
                    ellipsis_left
                } else {
                    ellipsis_left + ellipsis_width
                };
                let fully_visible = if is_ltr {
                    geometry.logical_left + geometry.logical_width <= visible_limit
                } else {
                    geometry.logical_left >= visible_limit
                };
                if fully_visible {
                    return;
                }
                let fully_hidden = if is_ltr {
                    geometry.logical_left >= visible_limit
                } else {
                    geometry.logical_left + geometry.logical_width <= visible_limit
                };
                if fully_hidden {
                    text_box.truncation = Some(0);
                    return;
                }
                let object = stream.get(text_box.object);
                let text = object.text().expect("text box");
                let slice = &text.text()[text_box.start..text_box.end()];
                let x_target = if is_ltr {
                    visible_limit - geometry.logical_left
                } else {
                    geometry.logical_left + geometry.logical_width - visible_limit
                };
                let offset = measurer
                    .fonts()
                    .offset_for_position(object.style.font, slice, x_target);
                text_box.truncation = Some(offset.min(slice.len()));
            }
            InlineBoxNode::Replaced(_) => {}
        }
    }

    for child in &mut line.children {
        truncate(
            child,
            stream,
            measurer,
            is_ltr,
            ellipsis_left,
            ellipsis_width,
        );
    }
    line.ellipsis = Some(EllipsisBox {
        logical_left: ellipsis_left,
        logical_width: ellipsis_width,
    });
}
