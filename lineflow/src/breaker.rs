// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The greedy paragraph line breaker.
//!
//! [`LineBreaker::next_line_break`] walks the content stream object by
//! object and character by character from the current position, deciding
//! where the line ends. Along the way it maintains the whitespace-collapse
//! midpoint log, inserts and positions floats, resolves static positions
//! for out-of-flow boxes, reserves and refunds soft-hyphen width, and
//! attempts dictionary hyphenation when a word overflows.

use crate::break_iter::{BreakOracle, TextBreakCache, NO_BREAK_SPACE, SOFT_HYPHEN};
use crate::content::{InlineStream, ObjectId, ObjectKind, ReplacedKind, TextContent};
use crate::font::{FallbackFonts, FontSource, Hyphenator};
use crate::line_width::{BlockGeometry, FloatList, LineWidth};
use crate::measure::TextMeasurer;
use crate::midpoint::{Midpoint, MidpointState};
use crate::position::InlinePosition;
use crate::style::{BlockStyle, Clear, NbspMode, Style, WhiteSpace, WordBreak};
use smallvec::SmallVec;

/// Per-line flags threaded through the breaker and box construction.
#[derive(Clone, Debug)]
pub struct LineInfo {
    pub is_first_line: bool,
    pub is_last_line: bool,
    /// True until something that renders is seen on the line.
    pub is_empty: bool,
    /// Whether the previous line ended at an explicit break or preserved
    /// newline.
    pub previous_line_broke_cleanly: bool,
}

impl Default for LineInfo {
    fn default() -> Self {
        Self {
            is_first_line: true,
            is_last_line: false,
            is_empty: true,
            previous_line_broke_cleanly: true,
        }
    }
}

/// Width of one measured span, kept so box construction can reuse the
/// breaker's measurements (and their recorded fallback fonts).
#[derive(Clone, Debug)]
pub struct WordMeasurement {
    pub object: ObjectId,
    pub start: usize,
    pub end: usize,
    pub width: f32,
    pub fallback_fonts: FallbackFonts,
}

/// Trailing empty inlines and positioned boxes seen after the last
/// trailing whitespace, which need midpoint fixups once the break is
/// final so their spacing state resumes correctly on the next line.
#[derive(Default, Debug)]
struct TrailingObjects {
    whitespace: Option<ObjectId>,
    boxes: SmallVec<[ObjectId; 4]>,
}

impl TrailingObjects {
    fn set_trailing_whitespace(&mut self, object: ObjectId) {
        self.whitespace = Some(object);
    }

    fn clear(&mut self) {
        self.whitespace = None;
        self.boxes.clear();
    }

    fn append_box_if_needed(&mut self, object: ObjectId) {
        if self.whitespace.is_some() {
            self.boxes.push(object);
        }
    }

    fn update_midpoints_for_trailing_boxes(
        &self,
        midpoints: &mut MidpointState,
        stream: &InlineStream,
        line_break: &InlinePosition,
        collapse_first_space: bool,
    ) {
        let Some(whitespace) = self.whitespace else {
            return;
        };
        if midpoints.len() % 2 == 1 {
            // Find the trailing space object's midpoint.
            let mut index = midpoints.len() - 1;
            while index > 0 && midpoints.get(index).object != whitespace {
                index -= 1;
            }
            if collapse_first_space {
                midpoints.shave_midpoint_char(stream, index);
            }
            // Every trailing box after it must stop and restart the
            // ignored span so it still gets a line box.
            let mut current = index + 1;
            for object in &self.boxes {
                if current >= midpoints.len() {
                    midpoints.ensure_box_inside_ignored_spaces(*object);
                } else {
                    debug_assert!(
                        midpoints.get(current).object == *object,
                        "trailing box midpoints out of order"
                    );
                }
                current += 2;
            }
        } else if line_break.object.is_none() {
            debug_assert!(collapse_first_space, "end-of-content fixup collapses");
            // End the visible span right before the trailing space.
            let text = stream.get(whitespace).text().expect("trailing whitespace is text");
            let offset = text
                .char_before(text.len())
                .map(|last| text.len() - last.len_utf8())
                .and_then(|before_last| {
                    text.char_before(before_last)
                        .map(|prev| before_last - prev.len_utf8())
                })
                .unwrap_or(crate::midpoint::STOP_BEFORE_OBJECT);
            midpoints.start_ignoring(Midpoint::new(whitespace, offset));
            for object in &self.boxes {
                midpoints.ensure_box_inside_ignored_spaces(*object);
            }
        }
    }
}

fn should_collapse_white_space(style: &Style, line_info: &LineInfo, trailing: bool) -> bool {
    style.collapse_white_space()
        || (trailing
            && style.white_space == WhiteSpace::PreWrap
            && (!line_info.is_empty || !line_info.previous_line_broke_cleanly))
}

fn skip_non_breaking_space(style: &Style, ch: char, line_info: &LineInfo) -> bool {
    if style.nbsp_mode != NbspMode::Space || ch != NO_BREAK_SPACE {
        return false;
    }
    // Do not skip an NBSP that opens a line after a clean break.
    !(line_info.is_empty && line_info.previous_line_broke_cleanly)
}

/// Segmentation cache for the text object currently being scanned,
/// kept by the caller so it survives across lines.
#[derive(Default, Debug)]
pub struct BreakerTextState {
    current_text: Option<ObjectId>,
    cache: TextBreakCache,
    /// Last character of the preceding content, so breakability at an
    /// object's first character resolves across object boundaries.
    prior_context: Option<char>,
}

/// The paragraph breaker for one block.
pub struct LineBreaker<'a, 'f> {
    pub stream: &'a mut InlineStream,
    pub block_style: &'a BlockStyle,
    pub measurer: &'a mut TextMeasurer<'f>,
    pub oracle: &'a BreakOracle,
    pub hyphenator: &'a dyn Hyphenator,
    /// Positioned boxes whose inline static position waits for the line.
    pub positioned_objects: Vec<ObjectId>,
    pub hyphenated: bool,
    /// Clearance requested by an explicit break on this line.
    pub clear: Clear,
    text_state: &'a mut BreakerTextState,
}

impl<'a, 'f> LineBreaker<'a, 'f> {
    pub fn new(
        stream: &'a mut InlineStream,
        block_style: &'a BlockStyle,
        measurer: &'a mut TextMeasurer<'f>,
        oracle: &'a BreakOracle,
        hyphenator: &'a dyn Hyphenator,
        text_state: &'a mut BreakerTextState,
    ) -> Self {
        Self {
            stream,
            block_style,
            measurer,
            oracle,
            hyphenator,
            positioned_objects: Vec::new(),
            hyphenated: false,
            clear: Clear::None,
            text_state,
        }
    }

    fn reset(&mut self) {
        self.positioned_objects.clear();
        self.hyphenated = false;
        self.clear = Clear::None;
    }

    fn requires_line_box(
        &self,
        position: &InlinePosition,
        line_info: &LineInfo,
        trailing: bool,
    ) -> bool {
        let Some(object_id) = position.object else {
            return false;
        };
        let object = self.stream.get(object_id);
        if object.is_float_or_positioned() {
            return false;
        }
        if let ObjectKind::InlineFlow(flow) = &object.kind {
            return self.stream.flow(*flow).has_inline_direction_edges();
        }
        if !should_collapse_white_space(&object.style, line_info, trailing)
            || object.is_line_break()
        {
            return true;
        }
        match position.current_char(self.stream) {
            Some(c) => {
                c != ' '
                    && c != '\t'
                    && c != SOFT_HYPHEN
                    && (c != '\n' || object.style.preserve_newline())
                    && !skip_non_breaking_space(&object.style, c, line_info)
            }
            None => true,
        }
    }

    fn resolve_static_position(&mut self, object_id: ObjectId, geometry: &BlockGeometry) {
        let is_ltr = self.block_style.is_ltr();
        let content_width = geometry.content_width;
        let height = geometry.logical_height;
        if let ObjectKind::Positioned(positioned) = &mut self.stream.get_mut(object_id).kind {
            positioned.static_block = Some(height);
            if !positioned.is_originally_inline {
                positioned.static_inline = Some(if is_ltr { 0. } else { content_width });
            }
        }
    }

    fn position_float_on_line(
        &mut self,
        index: usize,
        width: &mut LineWidth,
        geometry: &BlockGeometry,
        floats: &mut FloatList,
    ) {
        floats.place_unplaced(geometry);
        width.shrink_for_new_float(floats.entry(index), geometry);
    }

    /// Skips positions that render nothing at the start of a line. Floats
    /// and positioned boxes encountered here still get their side effects.
    fn skip_leading_whitespace(
        &mut self,
        resolver: &mut InlinePosition,
        line_info: &LineInfo,
        width: &mut LineWidth,
        geometry: &mut BlockGeometry,
        floats: &mut FloatList,
    ) {
        while !resolver.at_end() && !self.requires_line_box(resolver, line_info, false) {
            let object_id = resolver.object.expect("not at end");
            let action = match &self.stream.get(object_id).kind {
                ObjectKind::Positioned(p) => Some((None, p.is_originally_inline)),
                ObjectKind::Float(f) => {
                    Some((Some((f.side, f.inline_size, f.block_size)), false))
                }
                _ => None,
            };
            match action {
                Some((Some((side, inline_size, block_size)), _)) => {
                    let index = floats.insert(object_id, side, inline_size, block_size);
                    self.position_float_on_line(index, width, geometry, floats);
                }
                Some((None, is_inline)) => {
                    self.resolve_static_position(object_id, geometry);
                    if is_inline {
                        self.positioned_objects.push(object_id);
                    }
                }
                None => {}
            }
            resolver.increment(self.stream);
        }
    }

    /// Skips trailing whitespace past a chosen break, inserting (but not
    /// positioning) any floats found there.
    fn skip_trailing_whitespace(
        &mut self,
        iterator: &mut InlinePosition,
        line_info: &LineInfo,
        geometry: &BlockGeometry,
        floats: &mut FloatList,
    ) {
        while !iterator.at_end() && !self.requires_line_box(iterator, line_info, true) {
            let object_id = iterator.object.expect("not at end");
            let float = match &self.stream.get(object_id).kind {
                ObjectKind::Positioned(_) => {
                    self.resolve_static_position(object_id, geometry);
                    None
                }
                ObjectKind::Float(f) => Some((f.side, f.inline_size, f.block_size)),
                _ => None,
            };
            if let Some((side, inline_size, block_size)) = float {
                floats.insert(object_id, side, inline_size, block_size);
            }
            iterator.increment(self.stream);
        }
    }

    /// Whether whitespace immediately following `object` should begin
    /// collapsed, as after list markers and empty inlines at line start.
    fn should_skip_whitespace_after_start_object(
        &self,
        object_id: ObjectId,
        midpoints: &mut MidpointState,
    ) -> bool {
        let mut next = self.stream.next(object_id);
        while let Some(candidate) = next {
            if self.stream.get(candidate).is_float_or_positioned() {
                next = self.stream.next(candidate);
            } else {
                break;
            }
        }
        let Some(next_id) = next else {
            return false;
        };
        let next_object = self.stream.get(next_id);
        if next_object.is_line_break() {
            return false;
        }
        let Some(text) = next_object.text() else {
            return false;
        };
        let Some(first) = text.char_at(0) else {
            return false;
        };
        if next_object.style.is_collapsible_white_space(first) || first == ' ' {
            midpoints.start_ignoring(Midpoint::new(object_id, 0));
            return true;
        }
        false
    }

    fn can_break_at_this_position(
        &mut self,
        auto_wrap: bool,
        width: &mut LineWidth,
        line_break: &mut InlinePosition,
        next_object: Option<ObjectId>,
        current: &InlinePosition,
        current_ws: WhiteSpace,
        current_character_is_space: bool,
        auto_wrap_was_ever_true_on_line: bool,
        geometry: &mut BlockGeometry,
        floats: &FloatList,
    ) -> bool {
        // A no-wrap run that overflows takes any opportunity found so far.
        if width.committed_width() != 0.
            && !width.fits_on_line_ignoring_trailing_space(current_character_is_space)
            && current_ws == WhiteSpace::Nowrap
        {
            return true;
        }

        // Avoid breaking before empty inlines.
        if let Some(next) = next_object {
            if self.stream.get(next).is_empty_inline() {
                return false;
            }
        }

        if auto_wrap && current_character_is_space {
            return true;
        }

        let current_id = current.object.expect("current object");
        let current_object = self.stream.get(current_id);
        let next_is_text = next_object.is_some_and(|next| {
            let next_object = self.stream.get(next);
            (current_object.is_text() || current_object.is_empty_inline())
                && next_object.is_text()
                && !next_object.is_line_break()
                && (auto_wrap || next_object.style.auto_wrap())
        });
        if !next_is_text {
            return auto_wrap;
        }

        let next = next_object.expect("checked above");
        let can_break_here = !current_character_is_space && {
            let text = self.stream.get(next).text().expect("text object");
            match text.char_at(0) {
                Some(c) => {
                    c == ' '
                        || c == '\t'
                        || (c == '\n' && !self.stream.get(next).style.preserve_newline())
                }
                None => false,
            }
        };

        // See if dropping below floats frees up room before deciding.
        if !width.fits_on_line() && width.committed_width() == 0. {
            width.fit_below_floats(geometry, floats);
        }

        let can_place_on_line = width.fits_on_line() || !auto_wrap_was_ever_true_on_line;
        if can_place_on_line && can_break_here {
            width.commit();
            line_break.move_to_start_of(Some(next));
        }
        can_break_here
    }

    /// Computes the end of the next line starting at `resolver`.
    ///
    /// On return `resolver` has advanced past skipped leading content; the
    /// returned position is where the line ends and the next begins.
    pub fn next_line_break(
        &mut self,
        resolver: &mut InlinePosition,
        line_info: &mut LineInfo,
        midpoints: &mut MidpointState,
        geometry: &mut BlockGeometry,
        floats: &mut FloatList,
        consecutive_hyphenated_lines: u32,
        word_measurements: &mut Vec<WordMeasurement>,
    ) -> InlinePosition {
        self.reset();

        let mut applied_start_width = resolver.offset > 0;
        let mut include_end_width = true;

        let mut width = LineWidth::new(geometry, floats);
        self.skip_leading_whitespace(resolver, line_info, &mut width, geometry, floats);
        if resolver.at_end() {
            return *resolver;
        }

        let mut ignoring_spaces = false;
        let mut ignore_start: Option<(ObjectId, usize)> = None;

        let mut current_character_is_space = false;
        let mut current_character_is_ws = false;
        let mut trailing_objects = TrailingObjects::default();

        let mut line_break = *resolver;
        let mut current = *resolver;
        let mut last_object = current.object;
        let mut at_start = true;

        let starting_new_paragraph = line_info.previous_line_broke_cleanly;
        line_info.previous_line_broke_cleanly = false;

        let mut auto_wrap_was_ever_true_on_line = false;
        let mut floats_fit_on_line = true;

        let allow_images_to_break = self.block_style.allow_images_to_break;
        let mut last_ws = self.block_style.style.white_space;

        let exhausted = 'scan: {
            while let Some(object_id) = current.object {
                let style = self.stream.get(object_id).style.clone();
                let next_object = self.stream.next(object_id);
                if let Some(next) = next_object {
                    // Re-include the end edge when the next object leaves
                    // the current ancestor chain.
                    if self.stream.get(next).parent != self.stream.get(object_id).parent {
                        include_end_width = true;
                    }
                }

                let current_ws = style.white_space;
                let auto_wrap = current_ws.auto_wrap();
                auto_wrap_was_ever_true_on_line |= auto_wrap;
                let preserve_newline = current_ws.preserves_newline();
                let collapse_white_space = current_ws.collapses();

                match self.stream.get(object_id).kind.clone() {
                    ObjectKind::LineBreak(break_clear) => {
                        if width.fits_on_line() {
                            line_break.move_to(object_id, 0, None);
                            line_break.increment(self.stream);

                            // An explicit break always breaks the line, so
                            // never let the line collapse away, and keep
                            // the space before it when the previous line
                            // broke cleanly.
                            if starting_new_paragraph {
                                line_info.is_empty = false;
                            }
                            trailing_objects.clear();
                            line_info.previous_line_broke_cleanly = true;

                            if ignoring_spaces && break_clear != Clear::None {
                                midpoints.ensure_box_inside_ignored_spaces(object_id);
                            }
                            if !line_info.is_empty {
                                self.clear = break_clear;
                            }
                        }
                        break 'scan false;
                    }
                    ObjectKind::Positioned(positioned) => {
                        self.resolve_static_position(object_id, geometry);
                        if positioned.is_originally_inline {
                            self.positioned_objects.push(object_id);
                            if ignoring_spaces {
                                midpoints.ensure_box_inside_ignored_spaces(object_id);
                            }
                            trailing_objects.append_box_if_needed(object_id);
                        }
                        width.add_uncommitted_width(self.stream.inline_logical_width(
                            object_id, true, true,
                        ));
                        // Positioned boxes interrupt the breakability
                        // context without contributing a character.
                        self.text_state.prior_context = None;
                    }
                    ObjectKind::Float(float) => {
                        let index = floats.insert(
                            object_id,
                            float.side,
                            float.inline_size,
                            float.block_size,
                        );
                        // Position on this line only if it fits; a float
                        // that missed is not retried on the same line.
                        if floats_fit_on_line
                            && width.fits_on_line_excluding_trailing_whitespace(float.inline_size)
                        {
                            self.position_float_on_line(index, &mut width, geometry, floats);
                            if line_break.object == Some(object_id) {
                                debug_assert!(line_break.offset == 0, "floats have no offsets");
                                line_break.increment(self.stream);
                            }
                        } else {
                            floats_fit_on_line = false;
                        }
                        self.text_state.prior_context = Some(crate::break_iter::OBJECT_REPLACEMENT);
                    }
                    ObjectKind::InlineFlow(flow_id) => {
                        let edges = {
                            let flow = self.stream.flow(flow_id);
                            (flow.edge_start, flow.edge_end)
                        };
                        let requires_line_box = self
                            .stream
                            .flow(flow_id)
                            .has_inline_direction_edges();
                        if requires_line_box {
                            line_info.is_empty = false;
                            if ignoring_spaces {
                                trailing_objects.clear();
                                midpoints.ensure_box_inside_ignored_spaces(object_id);
                            } else if self.block_style.style.collapse_white_space()
                                && resolver.object == Some(object_id)
                                && self
                                    .should_skip_whitespace_after_start_object(object_id, midpoints)
                            {
                                // Like a list marker: discard any spaces
                                // that follow the empty inline.
                                current_character_is_space = true;
                                current_character_is_ws = true;
                                ignoring_spaces = true;
                            } else {
                                trailing_objects.append_box_if_needed(object_id);
                            }
                        }
                        width.add_uncommitted_width(
                            self.stream.inline_logical_width(object_id, true, true)
                                + edges.0
                                + edges.1,
                        );
                    }
                    ObjectKind::Replaced(replaced) => {
                        if at_start {
                            width.update_available_width(geometry, floats, replaced.block_size);
                        }

                        // Break before replaced elements when either side
                        // auto-wraps (images only when allowed).
                        if (auto_wrap || last_ws.auto_wrap())
                            && (!replaced.is_image() || allow_images_to_break)
                        {
                            width.commit();
                            line_break.move_to(object_id, 0, None);
                        }

                        if ignoring_spaces {
                            midpoints.stop_ignoring(Midpoint::new(object_id, 0));
                        }
                        line_info.is_empty = false;
                        ignoring_spaces = false;
                        current_character_is_space = false;
                        current_character_is_ws = false;
                        trailing_objects.clear();

                        let replaced_width = replaced.margin_box_inline_size()
                            + self.stream.inline_logical_width(object_id, true, true);
                        match replaced.kind {
                            ReplacedKind::ListMarker { is_inside } => {
                                if self.block_style.style.collapse_white_space()
                                    && self.should_skip_whitespace_after_start_object(
                                        object_id, midpoints,
                                    )
                                {
                                    current_character_is_space = true;
                                    current_character_is_ws = true;
                                    ignoring_spaces = true;
                                }
                                if is_inside {
                                    width.add_uncommitted_width(replaced_width);
                                }
                            }
                            ReplacedKind::RubyRun {
                                start_overhang,
                                end_overhang,
                            } => {
                                width.add_uncommitted_width(replaced_width);
                                width.apply_overhang(start_overhang, end_overhang);
                            }
                            _ => width.add_uncommitted_width(replaced_width),
                        }
                        self.text_state.prior_context = Some(crate::break_iter::OBJECT_REPLACEMENT);
                    }
                    ObjectKind::Text(text) => {
                        if current.offset == 0 {
                            applied_start_width = false;
                        }

                        // Entering an auto-wrap run from a no-wrap run
                        // while ignoring spaces marks a break opportunity
                        // at the run's start.
                        if auto_wrap && !last_ws.auto_wrap() && ignoring_spaces {
                            width.commit();
                            line_break.move_to(object_id, 0, None);
                        }

                        let can_hyphenate = style.hyphens == crate::style::Hyphens::Auto
                            && style
                                .locale
                                .as_deref()
                                .is_some_and(|locale| self.hyphenator.can_hyphenate(locale));

                        let mut last_space = current.offset;
                        let word_spacing = style.word_spacing;
                        let mut last_space_word_spacing = 0.;
                        let mut word_spacing_for_word_measurement = 0.;

                        let mut wrap_width = width.uncommitted_width()
                            + self.stream.inline_logical_width(
                                object_id,
                                !applied_start_width,
                                true,
                            );
                        let mut char_width = 0.;
                        let break_nbsp = auto_wrap && style.nbsp_mode == NbspMode::Space;
                        let keep_all = style.word_break == WordBreak::KeepAll;
                        // Auto-wrapping text wraps mid-word only when the
                        // word could not start the line.
                        let mut break_words = style.break_words()
                            && ((auto_wrap && width.committed_width() == 0.)
                                || current_ws == WhiteSpace::Pre);
                        let mut mid_word_break = false;
                        let break_all = style.word_break == WordBreak::BreakAll && auto_wrap;
                        let mut hyphen_width = 0.;

                        if self.text_state.current_text != Some(object_id) {
                            self.text_state.current_text = Some(object_id);
                            self.text_state.cache.reset();
                        }

                        while current.offset < text.len() {
                            let previous_character_is_space = current_character_is_space;
                            let previous_character_is_ws = current_character_is_ws;
                            let c = text.char_at(current.offset).expect("on char boundary");
                            let c_len = c.len_utf8();
                            current_character_is_space =
                                c == ' ' || c == '\t' || (!preserve_newline && c == '\n');

                            if !collapse_white_space || !current_character_is_space {
                                line_info.is_empty = false;
                            }

                            // Provisionally reserve the hyphen glyph for a
                            // soft hyphen; refunded if no break lands here.
                            if c == SOFT_HYPHEN
                                && auto_wrap
                                && hyphen_width == 0.
                                && style.hyphens != crate::style::Hyphens::None
                            {
                                hyphen_width = self.measurer.hyphen_width(&style, None);
                                width.add_uncommitted_width(hyphen_width);
                            }

                            let mut apply_word_spacing = false;
                            current_character_is_ws = current_character_is_space
                                || (break_nbsp && c == NO_BREAK_SPACE);

                            if (break_all || break_words) && !mid_word_break {
                                wrap_width += char_width;
                                char_width = self.measurer.text_width(
                                    object_id,
                                    &text,
                                    &style,
                                    current.offset,
                                    c_len,
                                    width.committed_width() + wrap_width,
                                    None,
                                    None,
                                );
                                mid_word_break = width.committed_width()
                                    + wrap_width
                                    + char_width
                                    > width.available_width();
                            }

                            let between_words = c == '\n'
                                || (current_ws != WhiteSpace::Pre
                                    && !at_start
                                    && self.oracle.is_breakable(
                                        text.text(),
                                        current.offset,
                                        &mut self.text_state.cache,
                                        &mut current.next_breakable,
                                        self.text_state.prior_context,
                                        break_nbsp,
                                        keep_all,
                                    )
                                    && (style.hyphens != crate::style::Hyphens::None
                                        || text.char_before(current.offset)
                                            != Some(SOFT_HYPHEN)));

                            if between_words || mid_word_break {
                                let mut stopped_ignoring_spaces = false;
                                if ignoring_spaces {
                                    last_space_word_spacing = 0.;
                                    if !current_character_is_space {
                                        // Stop ignoring spaces and resume
                                        // measurement at this point.
                                        ignoring_spaces = false;
                                        word_spacing_for_word_measurement = 0.;
                                        last_space = current.offset;
                                        midpoints.stop_ignoring(Midpoint::new(
                                            object_id,
                                            current.offset,
                                        ));
                                        stopped_ignoring_spaces = true;
                                    } else {
                                        // Keep ignoring these spaces.
                                        current.offset += c_len;
                                        continue;
                                    }
                                }

                                let mut measured_fallback = FallbackFonts::new();
                                let word_width = self.measurer.text_width(
                                    object_id,
                                    &text,
                                    &style,
                                    last_space,
                                    current.offset - last_space,
                                    width.current_width(),
                                    Some(&mut measured_fallback),
                                    None,
                                );
                                word_measurements.push(WordMeasurement {
                                    object: object_id,
                                    start: last_space,
                                    end: current.offset,
                                    width: word_width + word_spacing_for_word_measurement,
                                    fallback_fonts: measured_fallback,
                                });
                                let additional_temp_width = word_width + last_space_word_spacing;
                                width.add_uncommitted_width(additional_temp_width);

                                if collapse_white_space
                                    && previous_character_is_space
                                    && current_character_is_space
                                    && additional_temp_width != 0.
                                {
                                    width.set_trailing_whitespace_width(additional_temp_width, 0.);
                                }

                                if !applied_start_width {
                                    width.add_uncommitted_width(
                                        self.stream.inline_logical_width(object_id, true, false),
                                    );
                                    applied_start_width = true;
                                }

                                apply_word_spacing =
                                    word_spacing != 0. && current_character_is_space;

                                if width.committed_width() == 0.
                                    && auto_wrap
                                    && !width.fits_on_line()
                                {
                                    width.fit_below_floats(geometry, floats);
                                }

                                if auto_wrap || break_words {
                                    // Under break-only-after-whitespace,
                                    // consider the breaking space itself a
                                    // candidate for this line's width.
                                    let mut line_was_too_wide = false;
                                    if width.fits_on_line()
                                        && current_character_is_ws
                                        && style.break_only_after_white_space()
                                        && !mid_word_break
                                    {
                                        let space_width = self.measurer.text_width(
                                            object_id,
                                            &text,
                                            &style,
                                            current.offset,
                                            c_len,
                                            width.current_width(),
                                            None,
                                            None,
                                        ) + if apply_word_spacing {
                                            word_spacing
                                        } else {
                                            0.
                                        };
                                        if !width.fits_on_line_including_extra_width(space_width) {
                                            line_was_too_wide = true;
                                            line_break.move_to(
                                                object_id,
                                                current.offset,
                                                current.next_breakable,
                                            );
                                            let mut skip = line_break;
                                            self.skip_trailing_whitespace(
                                                &mut skip, line_info, geometry, floats,
                                            );
                                            line_break = skip;
                                        }
                                    }
                                    if line_was_too_wide || !width.fits_on_line() {
                                        if can_hyphenate && !width.fits_on_line() {
                                            try_hyphenating(
                                                self.measurer,
                                                self.hyphenator,
                                                object_id,
                                                &text,
                                                &style,
                                                consecutive_hyphenated_lines,
                                                last_space,
                                                current.offset,
                                                width.current_width() - additional_temp_width,
                                                width.available_width(),
                                                last_space_word_spacing,
                                                &mut line_break,
                                                current.next_breakable,
                                                &mut self.hyphenated,
                                            );
                                            if self.hyphenated {
                                                break 'scan false;
                                            }
                                        }
                                        if line_break.at_text_paragraph_separator(self.stream) {
                                            if !stopped_ignoring_spaces && current.offset > 0 {
                                                midpoints.ensure_character_gets_box(
                                                    self.stream,
                                                    object_id,
                                                    current.offset,
                                                );
                                            }
                                            line_break.increment(self.stream);
                                            line_info.previous_line_broke_cleanly = true;
                                        }
                                        if let Some(break_object) = line_break.object {
                                            if line_break.offset > 0
                                                && style.hyphens != crate::style::Hyphens::None
                                                && self
                                                    .stream
                                                    .get(break_object)
                                                    .text()
                                                    .and_then(|t| {
                                                        t.char_before(line_break.offset)
                                                    })
                                                    == Some(SOFT_HYPHEN)
                                            {
                                                self.hyphenated = true;
                                            }
                                        }
                                        // Jump to the end unless a run of
                                        // collapsible spaces continues.
                                        if ignoring_spaces
                                            || !collapse_white_space
                                            || !current_character_is_space
                                            || !previous_character_is_space
                                        {
                                            break 'scan false;
                                        }
                                    } else {
                                        if !between_words || (mid_word_break && !auto_wrap) {
                                            width.add_uncommitted_width(-additional_temp_width);
                                        }
                                        if hyphen_width != 0. {
                                            // The line fits: refund the
                                            // reserved hyphen glyph.
                                            width.add_uncommitted_width(-hyphen_width);
                                            hyphen_width = 0.;
                                        }
                                    }
                                }

                                if c == '\n' && preserve_newline {
                                    if !stopped_ignoring_spaces && current.offset > 0 {
                                        midpoints.ensure_character_gets_box(
                                            self.stream,
                                            object_id,
                                            current.offset,
                                        );
                                    }
                                    line_break.move_to(
                                        object_id,
                                        current.offset,
                                        current.next_breakable,
                                    );
                                    line_break.increment(self.stream);
                                    line_info.previous_line_broke_cleanly = true;
                                    return line_break;
                                }

                                if auto_wrap && between_words {
                                    wrap_width = 0.;
                                    width.commit();
                                    line_break.move_to(
                                        object_id,
                                        current.offset,
                                        current.next_breakable,
                                    );
                                    // One word-boundary opportunity is
                                    // enough; stop arming mid-word breaks.
                                    break_words = false;
                                }

                                if mid_word_break {
                                    // Remember a mid-word position in case
                                    // the end width forces a break.
                                    line_break.move_to(
                                        object_id,
                                        current.offset,
                                        current.next_breakable,
                                    );
                                    mid_word_break &= break_words || break_all;
                                }

                                if between_words {
                                    last_space_word_spacing = if apply_word_spacing {
                                        word_spacing
                                    } else {
                                        0.
                                    };
                                    word_spacing_for_word_measurement = if apply_word_spacing
                                        && word_measurements
                                            .last()
                                            .is_some_and(|wm| wm.width != 0.)
                                    {
                                        word_spacing
                                    } else {
                                        0.
                                    };
                                    last_space = current.offset;
                                }

                                if !ignoring_spaces && style.collapse_white_space() {
                                    // A second consecutive space starts a
                                    // collapsed region at the first one.
                                    if current_character_is_space && previous_character_is_space {
                                        if let Some((ignore_object, ignore_offset)) = ignore_start
                                        {
                                            ignoring_spaces = true;
                                            midpoints.start_ignoring(Midpoint::new(
                                                ignore_object,
                                                ignore_offset,
                                            ));
                                            trailing_objects.update_midpoints_for_trailing_boxes(
                                                midpoints,
                                                self.stream,
                                                &InlinePosition::default(),
                                                false,
                                            );
                                        }
                                    }
                                }
                            } else if ignoring_spaces {
                                // Stop ignoring spaces and resume here.
                                ignoring_spaces = false;
                                last_space_word_spacing = if apply_word_spacing {
                                    word_spacing
                                } else {
                                    0.
                                };
                                word_spacing_for_word_measurement = if apply_word_spacing
                                    && word_measurements.last().is_some_and(|wm| wm.width != 0.)
                                {
                                    word_spacing
                                } else {
                                    0.
                                };
                                last_space = current.offset;
                                midpoints
                                    .stop_ignoring(Midpoint::new(object_id, current.offset));
                            }

                            if current_character_is_space && !previous_character_is_space {
                                ignore_start = Some((object_id, current.offset));
                            }

                            if !current_character_is_ws && previous_character_is_ws {
                                if auto_wrap && style.break_only_after_white_space() {
                                    line_break.move_to(
                                        object_id,
                                        current.offset,
                                        current.next_breakable,
                                    );
                                }
                            }

                            if collapse_white_space
                                && current_character_is_space
                                && !ignoring_spaces
                            {
                                trailing_objects.set_trailing_whitespace(object_id);
                            } else if !style.collapse_white_space() || !current_character_is_space
                            {
                                trailing_objects.clear();
                            }

                            at_start = false;
                            current.offset += c_len;
                        }

                        self.text_state.prior_context = text.char_before(text.len());

                        // Measure the remainder of the run.
                        let mut measured_fallback = FallbackFonts::new();
                        let remainder_width = if ignoring_spaces {
                            0.
                        } else {
                            self.measurer.text_width(
                                object_id,
                                &text,
                                &style,
                                last_space,
                                text.len() - last_space,
                                width.current_width(),
                                Some(&mut measured_fallback),
                                None,
                            )
                        };
                        word_measurements.push(WordMeasurement {
                            object: object_id,
                            start: last_space,
                            end: text.len(),
                            width: if ignoring_spaces {
                                0.
                            } else {
                                remainder_width + word_spacing_for_word_measurement
                            },
                            fallback_fonts: measured_fallback,
                        });
                        let additional_width = remainder_width + last_space_word_spacing;
                        let inline_logical_width = self.stream.inline_logical_width(
                            object_id,
                            !applied_start_width,
                            include_end_width,
                        );
                        width.add_uncommitted_width(additional_width + inline_logical_width);

                        if collapse_white_space
                            && current_character_is_space
                            && additional_width != 0.
                        {
                            width.set_trailing_whitespace_width(
                                additional_width,
                                inline_logical_width,
                            );
                        }

                        include_end_width = false;

                        if !width.fits_on_line() {
                            if can_hyphenate {
                                try_hyphenating(
                                    self.measurer,
                                    self.hyphenator,
                                    object_id,
                                    &text,
                                    &style,
                                    consecutive_hyphenated_lines,
                                    last_space,
                                    current.offset,
                                    width.current_width() - additional_width,
                                    width.available_width(),
                                    last_space_word_spacing,
                                    &mut line_break,
                                    current.next_breakable,
                                    &mut self.hyphenated,
                                );
                            }
                            if !self.hyphenated
                                && style.hyphens != crate::style::Hyphens::None
                                && line_break.previous_char_in_same_node(self.stream)
                                    == Some(SOFT_HYPHEN)
                            {
                                self.hyphenated = true;
                            }
                            if self.hyphenated {
                                break 'scan false;
                            }
                        }
                    }
                }

                let can_break_here = self.can_break_at_this_position(
                    auto_wrap,
                    &mut width,
                    &mut line_break,
                    next_object,
                    &current,
                    current_ws,
                    current_character_is_space,
                    auto_wrap_was_ever_true_on_line,
                    geometry,
                    floats,
                );
                if can_break_here
                    && !width.fits_on_line_ignoring_trailing_space(ignoring_spaces)
                {
                    if current_character_is_space
                        && !ignoring_spaces
                        && style.collapse_white_space()
                    {
                        trailing_objects.clear();
                    }
                    if width.committed_width() != 0. {
                        break 'scan false;
                    }
                    width.fit_below_floats(geometry, floats);
                    // The available width may have grown; retest before
                    // giving up on this position.
                    if !width.fits_on_line_ignoring_trailing_space(ignoring_spaces) {
                        break 'scan false;
                    }
                } else if self.block_style.style.auto_wrap()
                    && !width.fits_on_line()
                    && width.committed_width() == 0.
                {
                    // The container wraps even though this child doesn't.
                    width.fit_below_floats(geometry, floats);
                }

                if !self.stream.get(object_id).is_float_or_positioned() {
                    last_object = Some(object_id);
                    last_ws = current_ws;
                    let commit_after = match self.stream.get(object_id).replaced() {
                        Some(replaced) => {
                            auto_wrap
                                && (!replaced.is_image() || allow_images_to_break)
                                && match replaced.kind {
                                    ReplacedKind::ListMarker { is_inside } => is_inside,
                                    _ => true,
                                }
                        }
                        None => false,
                    };
                    if commit_after {
                        width.commit();
                        line_break.move_to_start_of(next_object);
                    }
                }

                // Inline pre runs don't collapse whitespace with adjacent
                // normal/nowrap runs.
                if !collapse_white_space {
                    current_character_is_space = false;
                }

                current.move_to_start_of(next_object);
                at_start = false;
            }
            true
        };

        if exhausted
            && (width.fits_on_line_ignoring_trailing_space(true)
                || last_ws == WhiteSpace::Nowrap)
        {
            line_break.clear();
        }

        // end:
        if line_break == *resolver {
            let break_is_explicit = line_break
                .object
                .is_some_and(|object| self.stream.get(object).is_line_break());
            if !break_is_explicit {
                // Add as much as possible: there is no room at all, so we
                // stay on this line even though it will spill out.
                if self.block_style.style.white_space == WhiteSpace::Pre && current.offset == 0 {
                    if let Some(last) = last_object {
                        let len = self.stream.get(last).content_len();
                        line_break.move_to(last, len, None);
                    }
                } else if line_break.object.is_some() {
                    match current.object {
                        Some(current_object) => {
                            line_break.move_to(current_object, current.offset, None);
                        }
                        None => line_break.clear(),
                    }
                }
            }
            // Always make forward progress: consume at least one
            // character or object per line.
            if line_break == *resolver {
                line_break.increment(self.stream);
            }
        } else if width.committed_width() == 0.
            && current.offset == 0
            && !current
                .object
                .is_some_and(|object| self.stream.get(object).is_line_break())
        {
            // The line has objects but committed nothing; ignore break
            // opportunities at its start and consume at least one object.
            line_break.increment(self.stream);
        }

        // Sanity-check the midpoint log against the chosen break, then
        // resolve trailing-object bookkeeping.
        midpoints.check_midpoints(self.stream, &line_break);
        trailing_objects.update_midpoints_for_trailing_boxes(
            midpoints,
            self.stream,
            &line_break,
            true,
        );

        // A break recorded past the end of an object is normalized to the
        // start of the next one.
        if line_break.offset > 0 {
            if let Some(object) = line_break.object {
                let step = self
                    .stream
                    .get(object)
                    .text()
                    .and_then(|t| t.char_before(line_break.offset))
                    .map_or(1, char::len_utf8);
                line_break.offset -= step;
                line_break.increment(self.stream);
            }
        }

        line_break
    }
}

/// Attempts to hyphenate the word `[last_space, pos)` so that its prefix
/// plus a hyphen glyph fits in the available width.
fn try_hyphenating(
    measurer: &mut TextMeasurer<'_>,
    hyphenator: &dyn Hyphenator,
    object: ObjectId,
    text: &TextContent,
    style: &Style,
    consecutive_hyphenated_lines: u32,
    last_space: usize,
    pos: usize,
    x_pos: f32,
    available_width: f32,
    last_space_word_spacing: f32,
    line_break: &mut InlinePosition,
    next_breakable: Option<usize>,
    hyphenated: &mut bool,
) {
    // `auto` limits mean 2.
    let limits = style.hyphenation_limits;
    let minimum_prefix_length = if limits.before < 0 { 2 } else { limits.before as usize };
    let minimum_suffix_length = if limits.after < 0 { 2 } else { limits.after as usize };

    let word = &text.text()[last_space..pos];
    let word_chars = word.chars().count();
    if word_chars <= minimum_suffix_length {
        return;
    }
    if limits.lines >= 0 && consecutive_hyphenated_lines >= limits.lines as u32 {
        return;
    }

    let hyphen_width = measurer.hyphen_width(style, None);
    let max_prefix_width = available_width - x_pos - hyphen_width - last_space_word_spacing;
    // With little room before the hyphen an opportunity is very unlikely;
    // don't bother looking.
    if max_prefix_width <= style.font.size * 5. / 4. {
        return;
    }

    let prefix_bytes = measurer
        .fonts()
        .offset_for_position(style.font, word, max_prefix_width);
    let prefix_chars = word[..prefix_bytes.min(word.len())].chars().count();
    if prefix_chars < minimum_prefix_length {
        return;
    }

    let limit_chars = prefix_chars.min(word_chars - minimum_suffix_length) + 1;
    let before_index = word
        .char_indices()
        .nth(limit_chars)
        .map_or(word.len(), |(i, _)| i);
    let locale = style.locale.as_deref().unwrap_or_default();
    let Some(hyphen_byte) = hyphenator.last_hyphen_location(word, before_index, locale) else {
        return;
    };
    let hyphen_chars = word[..hyphen_byte].chars().count();
    if hyphen_chars == 0 || hyphen_chars < minimum_prefix_length {
        return;
    }

    // When the character before the word is a space, it should not count
    // toward the prefix limit.
    if hyphen_chars == minimum_prefix_length {
        if matches!(
            text.char_at(last_space),
            Some(' ' | '\n' | '\t' | NO_BREAK_SPACE)
        ) {
            return;
        }
    }

    debug_assert!(
        word_chars - hyphen_chars >= minimum_suffix_length,
        "hyphenation point violates suffix limit"
    );

    // Reject the candidate unless the prefix plus the hyphen fits.
    let prefix_width = hyphen_width
        + measurer.text_width(object, text, style, last_space, hyphen_byte, x_pos, None, None)
        + last_space_word_spacing;
    if x_pos + prefix_width > available_width {
        return;
    }

    line_break.move_to(object, last_space + hyphen_byte, next_breakable);
    *hyphenated = true;
}
