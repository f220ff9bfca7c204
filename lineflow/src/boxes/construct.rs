// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Building the box tree for one finalized line.
//!
//! Takes the visually ordered run list, measures each run (reusing the
//! breaker's word measurements when they cover the run exactly), applies
//! horizontal alignment, assembles the flow-box tree with start/end edge
//! determination, computes baseline metrics from the participating fonts
//! (including recorded fallback fonts), and accumulates visual overflow.

use hashbrown::HashMap;

use super::alignment::{
    compute_expansion_for_justified_text, text_align_for_line, update_width_for_alignment, RunBox,
};
use super::{
    BoxGeometry, FlowBox, InlineBoxNode, LineBreakPosition, LineGeometry, ReplacedBox,
    RootLineBox, TextBox,
};
use crate::bidi::BidiRun;
use crate::breaker::WordMeasurement;
use crate::content::{FlowId, InlineStream, ObjectId, ObjectKind};
use crate::font::{FallbackFonts, FontId, GlyphOverflow};
use crate::geometry::LogicalRect;
use crate::measure::TextMeasurer;
use crate::style::{BlockStyle, TextAlign};

/// Key of a leaf box in the block's sparse side tables: the owning object
/// and the leaf's start offset.
pub(crate) type LeafKey = (ObjectId, u32);

pub(crate) struct LineConstructionInputs {
    pub line_break: LineBreakPosition,
    pub ends_with_break: bool,
    pub is_hyphenated: bool,
    /// Whether the breaker consumed the last content object.
    pub reached_end: bool,
    /// Block position the line starts at.
    pub line_top: f32,
    /// Inline offset of the line's start (float-narrowed).
    pub logical_left: f32,
    pub available_width: f32,
}

/// Per-run flow transitions computed from ancestor chains.
#[derive(Default, Clone, Debug)]
struct RunTransitions {
    /// Flows opened before this run, outermost first.
    opens: Vec<(FlowId, bool)>,
    /// Flows closed after this run, innermost first.
    closes: Vec<(FlowId, bool)>,
}

fn run_covers_flow_start(stream: &InlineStream, flow: FlowId, run: &BidiRun) -> bool {
    let Some(first) = stream.flow(flow).first_leaf else {
        return false;
    };
    first == run.object && (!stream.get(run.object).is_text() || run.start == 0)
}

fn run_covers_flow_end(stream: &InlineStream, flow: FlowId, run: &BidiRun) -> bool {
    let Some(last) = stream.flow(flow).last_leaf else {
        return false;
    };
    last == run.object
        && (!stream.get(run.object).is_text()
            || run.stop >= stream.get(run.object).content_len())
}

/// Walks the runs' ancestor chains, producing open/close transitions with
/// start/end edge ownership. An element split across lines carries its
/// start edge only where its first leaf starts and its end edge only
/// where its last leaf ends.
fn compute_transitions(stream: &InlineStream, runs: &[BidiRun]) -> Vec<RunTransitions> {
    let mut transitions = vec![RunTransitions::default(); runs.len()];
    let mut stack: Vec<FlowId> = Vec::new();
    for (index, run) in runs.iter().enumerate() {
        let chain = stream.ancestor_chain(run.object);
        let common = stack
            .iter()
            .zip(chain.iter())
            .take_while(|(a, b)| a == b)
            .count();
        while stack.len() > common {
            let flow = stack.pop().expect("stack non-empty");
            let includes_end = index > 0 && run_covers_flow_end(stream, flow, &runs[index - 1]);
            transitions[index - 1].closes.push((flow, includes_end));
        }
        for flow in &chain[common..] {
            let includes_start = run_covers_flow_start(stream, *flow, run);
            transitions[index].opens.push((*flow, includes_start));
            stack.push(*flow);
        }
    }
    if let Some(last) = runs.len().checked_sub(1) {
        while let Some(flow) = stack.pop() {
            let includes_end = run_covers_flow_end(stream, flow, &runs[last]);
            transitions[last].closes.push((flow, includes_end));
        }
    }
    transitions
}

/// Width of a text run, reusing the breaker's word measurements when they
/// tile the run exactly; otherwise re-measuring with full sinks.
fn text_run_width(
    stream: &InlineStream,
    measurer: &mut TextMeasurer<'_>,
    word_measurements: &[WordMeasurement],
    run: &BidiRun,
    x_pos: f32,
    fallback_fonts: &mut FallbackFonts,
    glyph_overflow: &mut GlyphOverflow,
) -> f32 {
    let object = stream.get(run.object);
    let text = object.text().expect("text run");
    if &text.text()[run.start..run.stop] == "\n" {
        // A preserved newline occupies its own box but renders nothing.
        return 0.;
    }

    let mut measured = 0.;
    let mut last_end = run.start;
    let mut reused_fallback = FallbackFonts::new();
    for measurement in word_measurements {
        if measurement.object != run.object
            || measurement.width <= 0.
            || measurement.start == measurement.end
        {
            continue;
        }
        if measurement.start != last_end || measurement.end > run.stop {
            continue;
        }
        last_end = measurement.end;
        measured += measurement.width;
        reused_fallback.extend_from(&measurement.fallback_fonts);
    }
    if measured != 0. && last_end == run.stop {
        fallback_fonts.extend_from(&reused_fallback);
        return measured;
    }

    measurer.text_width(
        run.object,
        text,
        &object.style,
        run.start,
        run.stop - run.start,
        x_pos,
        Some(fallback_fonts),
        Some(glyph_overflow),
    )
}

/// Expansion opportunities (space-class characters) per run, with the
/// trailing adjustment: a line whose justified content ends on an
/// opportunity gives that one up.
fn count_expansion_opportunities(
    stream: &InlineStream,
    runs: &[BidiRun],
    boxes: &mut [RunBox],
    trailing: Option<usize>,
) -> u32 {
    let mut total = 0_u32;
    let mut last_counted: Option<usize> = None;
    let mut is_after_expansion = true;
    for (index, run) in runs.iter().enumerate() {
        if Some(index) == trailing || !boxes[index].is_text {
            is_after_expansion = false;
            continue;
        }
        let object = stream.get(run.object);
        let text = object.text().expect("text run");
        let mut opportunities = 0_u32;
        let slice = &text.text()[run.start..run.stop];
        let chars: Box<dyn Iterator<Item = char>> = if run.is_rtl() {
            Box::new(slice.chars().rev())
        } else {
            Box::new(slice.chars())
        };
        for ch in chars {
            if matches!(ch, ' ' | '\t' | '\u{00A0}') {
                opportunities += 1;
                is_after_expansion = true;
            } else {
                is_after_expansion = false;
            }
        }
        boxes[index].expansion_opportunities = opportunities;
        total += opportunities;
        if opportunities > 0 {
            last_counted = Some(index);
        }
    }
    if is_after_expansion {
        if let Some(index) = last_counted {
            boxes[index].expansion_opportunities -= 1;
            total -= 1;
        }
    }
    total
}

struct VerticalMetrics {
    ascent: f32,
    descent: f32,
}

fn leaf_metrics(
    stream: &InlineStream,
    measurer: &TextMeasurer<'_>,
    fallback_map: &HashMap<LeafKey, Vec<FontId>>,
    run: &RunBox,
) -> VerticalMetrics {
    let object = stream.get(run.object);
    match &object.kind {
        ObjectKind::Replaced(replaced) => VerticalMetrics {
            // Replaced boxes sit on the baseline.
            ascent: replaced.block_size,
            descent: 0.,
        },
        _ => {
            let fonts = measurer.fonts();
            let mut metrics = fonts.metrics(object.style.font);
            let mut ascent = metrics.ascent;
            let mut descent = metrics.descent;
            if let Some(fallbacks) = fallback_map.get(&(run.object, run.start as u32)) {
                for font in fallbacks {
                    metrics = fonts.metrics(crate::font::FontHandle {
                        id: *font,
                        size: object.style.font.size,
                    });
                    ascent = ascent.max(metrics.ascent);
                    descent = descent.max(metrics.descent);
                }
            }
            VerticalMetrics { ascent, descent }
        }
    }
}

/// Builds the positioned box tree for one line.
#[allow(clippy::too_many_arguments)]
pub(crate) fn construct_line(
    stream: &mut InlineStream,
    block_style: &BlockStyle,
    measurer: &mut TextMeasurer<'_>,
    runs: &[BidiRun],
    trailing_space_run: Option<usize>,
    word_measurements: &[WordMeasurement],
    inputs: &LineConstructionInputs,
    glyph_overflow_map: &mut HashMap<LeafKey, GlyphOverflow>,
    fallback_fonts_map: &mut HashMap<LeafKey, Vec<FontId>>,
) -> RootLineBox {
    debug_assert!(!runs.is_empty(), "empty lines never construct boxes");
    let transitions = compute_transitions(stream, runs);

    // Measure every run and accumulate the flow-edge spacing that
    // participates in the line's total width.
    let mut boxes: Vec<RunBox> = Vec::with_capacity(runs.len());
    let mut total_logical_width = 0.;
    for (index, run) in runs.iter().enumerate() {
        for (flow, includes_start) in &transitions[index].opens {
            if *includes_start {
                total_logical_width += stream.flow(*flow).edge_start;
            }
        }

        let object = stream.get(run.object);
        let is_text = object.is_text();
        let mut width = 0.;
        let mut has_hyphen = run.has_hyphen;
        match &object.kind {
            ObjectKind::Text(_) => {
                let mut fallback = FallbackFonts::new();
                let mut overflow = GlyphOverflow::default();
                width = text_run_width(
                    stream,
                    measurer,
                    word_measurements,
                    run,
                    total_logical_width,
                    &mut fallback,
                    &mut overflow,
                );
                let style = stream.get(run.object).style.clone();
                if has_hyphen {
                    width += measurer.hyphen_width(&style, Some(&mut fallback));
                }
                let key = (run.object, run.start as u32);
                if !fallback.is_empty() {
                    fallback_fonts_map.insert(key, fallback.iter().collect());
                }
                if !overflow.is_empty() {
                    glyph_overflow_map.insert(key, overflow);
                }
            }
            ObjectKind::Replaced(replaced) => {
                width = replaced.inline_size;
                total_logical_width += replaced.margin_start + replaced.margin_end;
            }
            ObjectKind::InlineFlow(flow) => {
                let flow = stream.flow(*flow);
                width = flow.edge_start + flow.edge_end;
            }
            // Explicit breaks and inline positioned placeholders occupy
            // no width.
            _ => has_hyphen = false,
        }
        total_logical_width += width;

        boxes.push(RunBox {
            object: run.object,
            start: run.start,
            stop: run.stop,
            bidi_level: run.level,
            is_text,
            has_hyphen,
            collapses_white_space: stream.get(run.object).style.collapse_white_space(),
            width,
            expansion_opportunities: 0,
            expansion: 0.,
            logical_left: 0.,
        });

        for (flow, includes_end) in &transitions[index].closes {
            if *includes_end {
                total_logical_width += stream.flow(*flow).edge_end;
            }
        }
    }

    // Horizontal alignment.
    let ends_with_soft_break = !inputs.reached_end && !inputs.ends_with_break;
    let text_align = text_align_for_line(block_style, ends_with_soft_break);
    let mut expansion_opportunity_count = 0;
    if text_align == TextAlign::Justify {
        expansion_opportunity_count =
            count_expansion_opportunities(stream, runs, &mut boxes, trailing_space_run);
    }
    let mut logical_left = inputs.logical_left;
    update_width_for_alignment(
        block_style,
        text_align,
        &mut boxes,
        trailing_space_run,
        &mut logical_left,
        &mut total_logical_width,
        inputs.available_width,
        expansion_opportunity_count,
    );
    compute_expansion_for_justified_text(
        &mut boxes,
        trailing_space_run,
        expansion_opportunity_count,
        &mut total_logical_width,
        inputs.available_width,
    );

    // Inline placement.
    let mut cursor = logical_left;
    for (index, run_box) in boxes.iter_mut().enumerate() {
        for (flow, includes_start) in &transitions[index].opens {
            if *includes_start {
                cursor += stream.flow(*flow).edge_start;
            }
        }
        if let Some(replaced) = stream.get(run_box.object).replaced() {
            cursor += replaced.margin_start;
        }
        run_box.logical_left = cursor;
        cursor += run_box.width + run_box.expansion;
        if let Some(replaced) = stream.get(run_box.object).replaced() {
            cursor += replaced.margin_end;
        }
        for (flow, includes_end) in &transitions[index].closes {
            if *includes_end {
                cursor += stream.flow(*flow).edge_end;
            }
        }
    }

    // Vertical alignment: the line's extent is the union of every
    // participating leaf's font box (or replaced height).
    let mut max_ascent = 0_f32;
    let mut max_descent = 0_f32;
    let mut have_metrics = false;
    for (index, run_box) in boxes.iter().enumerate() {
        if Some(index) == trailing_space_run {
            continue;
        }
        let metrics = leaf_metrics(stream, measurer, fallback_fonts_map, run_box);
        max_ascent = max_ascent.max(metrics.ascent);
        max_descent = max_descent.max(metrics.descent);
        have_metrics = true;
    }
    if !have_metrics {
        let metrics = measurer.fonts().metrics(block_style.style.font);
        max_ascent = metrics.ascent;
        max_descent = metrics.descent;
    }
    let baseline = inputs.line_top + max_ascent;
    let line_bottom = baseline + max_descent;

    // Assemble the tree, writing back each object's block position.
    let mut root_children: Vec<InlineBoxNode> = Vec::new();
    let mut flow_stack: Vec<FlowBox> = Vec::new();
    let mut visual_overflow = LogicalRect::default();

    fn push_node(
        root_children: &mut Vec<InlineBoxNode>,
        flow_stack: &mut [FlowBox],
        node: InlineBoxNode,
    ) {
        match flow_stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => root_children.push(node),
        }
    }

    for (index, run_box) in boxes.iter().enumerate() {
        for (flow, includes_start) in &transitions[index].opens {
            flow_stack.push(FlowBox {
                flow: *flow,
                object: None,
                geometry: BoxGeometry::default(),
                includes_start_edge: *includes_start,
                includes_end_edge: false,
                children: Vec::new(),
            });
        }

        let metrics = leaf_metrics(stream, measurer, fallback_fonts_map, run_box);
        let logical_top = baseline - metrics.ascent;
        let logical_height = metrics.ascent + metrics.descent;
        let geometry = BoxGeometry {
            logical_left: run_box.logical_left,
            logical_width: run_box.width + run_box.expansion,
            logical_top,
            logical_height,
        };
        stream.get_mut(run_box.object).block_offset = logical_top;

        let mut leaf_rect = LogicalRect::new(
            geometry.logical_left,
            geometry.logical_top,
            geometry.logical_width,
            geometry.logical_height,
        );
        if let Some(overflow) = glyph_overflow_map.get(&(run_box.object, run_box.start as u32)) {
            leaf_rect.inline_start -= overflow.left;
            leaf_rect.inline_size += overflow.left + overflow.right;
            leaf_rect.block_start -= overflow.top;
            leaf_rect.block_size += overflow.top + overflow.bottom;
        }
        visual_overflow.unite(&leaf_rect);

        let node = match &stream.get(run_box.object).kind {
            ObjectKind::Text(_) => InlineBoxNode::Text(TextBox {
                object: run_box.object,
                start: run_box.start,
                len: run_box.stop - run_box.start,
                geometry,
                bidi_level: run_box.bidi_level,
                has_hyphen: run_box.has_hyphen,
                expansion: run_box.expansion,
                truncation: None,
            }),
            ObjectKind::InlineFlow(flow) => InlineBoxNode::Flow(FlowBox {
                flow: *flow,
                object: Some(run_box.object),
                geometry,
                includes_start_edge: true,
                includes_end_edge: true,
                children: Vec::new(),
            }),
            _ => InlineBoxNode::Replaced(ReplacedBox {
                object: run_box.object,
                geometry,
                bidi_level: run_box.bidi_level,
            }),
        };
        push_node(&mut root_children, &mut flow_stack, node);

        for (_, includes_end) in &transitions[index].closes {
            let mut flow_box = flow_stack.pop().expect("balanced transitions");
            flow_box.includes_end_edge = *includes_end;
            // A flow box spans its children plus whichever edges it owns
            // on this line.
            let (mut left, mut right, mut top, mut bottom) =
                (f32::MAX, f32::MIN, f32::MAX, f32::MIN);
            for child in &flow_box.children {
                let g = child.geometry();
                left = left.min(g.logical_left);
                right = right.max(g.logical_left + g.logical_width);
                top = top.min(g.logical_top);
                bottom = bottom.max(g.logical_top + g.logical_height);
            }
            if flow_box.children.is_empty() {
                left = cursor;
                right = cursor;
                top = baseline;
                bottom = baseline;
            }
            let edges = stream.flow(flow_box.flow);
            if flow_box.includes_start_edge {
                left -= edges.edge_start;
            }
            if flow_box.includes_end_edge {
                right += edges.edge_end;
            }
            flow_box.geometry = BoxGeometry {
                logical_left: left,
                logical_width: right - left,
                logical_top: top,
                logical_height: bottom - top,
            };
            push_node(&mut root_children, &mut flow_stack, InlineBoxNode::Flow(flow_box));
        }
    }
    debug_assert!(flow_stack.is_empty(), "unbalanced flow transitions");

    let geometry = LineGeometry {
        logical_left,
        logical_width: total_logical_width,
        line_top: inputs.line_top,
        baseline,
        line_bottom,
    };
    let line_rect = LogicalRect::new(
        logical_left,
        inputs.line_top,
        total_logical_width,
        line_bottom - inputs.line_top,
    );
    visual_overflow.unite(&line_rect);

    RootLineBox {
        children: root_children,
        geometry,
        line_break: inputs.line_break,
        ends_with_break: inputs.ends_with_break,
        is_dirty: false,
        is_hyphenated: inputs.is_hyphenated,
        extracted: false,
        floats: Vec::new(),
        ellipsis: None,
        visual_overflow,
    }
}
