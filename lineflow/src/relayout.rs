// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clean/dirty line synchronization for incremental relayout.
//!
//! When a block relays out after an edit, lines untouched by the change
//! are reused: a clean prefix is kept in place, and a maximal clean
//! suffix is extracted, matched against the breaker's progress, and
//! reattached with a vertical delta. Any mismatch, like float geometry
//! drift or a break position that no longer lines up, discards the
//! optimization and rebuilds; correctness always wins.

use log::debug;

use crate::boxes::{LineBreakPosition, RootLineBox};
use crate::content::{InlineStream, ObjectId};
use crate::geometry::LogicalRect;
use crate::line_width::{BlockGeometry, FloatList};
use crate::style::FloatSide;
use crate::util::nearly_zero;

/// A float's last-known placement, snapshotted before relayout.
#[derive(Clone, PartialEq, Debug)]
pub(crate) struct FloatWithRect {
    pub object: ObjectId,
    pub side: FloatSide,
    pub rect: LogicalRect,
}

/// Bookkeeping for one relayout pass.
#[derive(Default, Debug)]
pub(crate) struct LineLayoutState {
    pub is_full_layout: bool,
    /// Floats with their previous geometry, in placement order.
    pub floats: Vec<FloatWithRect>,
    /// Snapshot entries consumed by clean lines so far.
    pub float_index: usize,
    /// The extracted clean tail, in order.
    pub end_line: Vec<RootLineBox>,
    /// Break position (and bidi state) the clean tail resumes from.
    pub clean_line_start: LineBreakPosition,
    /// Block position the clean tail previously started at.
    pub end_line_logical_top: f32,
    pub end_line_matched: bool,
}

impl LineLayoutState {
    pub fn has_end_line(&self) -> bool {
        !self.end_line.is_empty()
    }
}

/// Marks every line touching `object` dirty, including a line that breaks
/// inside it.
pub(crate) fn dirty_lines_for_object(lines: &mut [RootLineBox], object: ObjectId) {
    for line in lines.iter_mut() {
        if line.touches(object) || line.line_break.object == Some(object) {
            line.mark_dirty();
        }
    }
}

/// Compares a clean line's floats against the snapshot. A float missing
/// from the snapshot (or out of order) forces a full layout; a float
/// whose box size changed dirties the line.
fn check_floats_in_clean_line(
    line: &RootLineBox,
    stream: &InlineStream,
    floats: &[FloatWithRect],
    float_index: &mut usize,
    encountered_new_float: &mut bool,
    dirtied_by_float: &mut bool,
) {
    for line_float in &line.floats {
        if *float_index >= floats.len() || floats[*float_index].object != line_float.object {
            *encountered_new_float = true;
            return;
        }
        let snapshot = &floats[*float_index];
        let current = stream.get(line_float.object);
        if let crate::content::ObjectKind::Float(float) = &current.kind {
            if float.inline_size != snapshot.rect.inline_size
                || float.block_size != snapshot.rect.block_size
            {
                *dirtied_by_float = true;
            }
        }
        *float_index += 1;
    }
}

/// Outcome of [`determine_start_position`].
pub(crate) struct StartPosition {
    /// Index of the first line to rebuild; lines before it are kept.
    pub first_dirty_line: usize,
}

/// Finds the first line that must be rebuilt, widening past an
/// ambiguously-ended predecessor, and restores the floats belonging to
/// the clean prefix.
pub(crate) fn determine_start_position(
    state: &mut LineLayoutState,
    lines: &mut Vec<RootLineBox>,
    stream: &InlineStream,
    floats: &mut FloatList,
    geometry: &mut BlockGeometry,
) -> StartPosition {
    let mut first_dirty: Option<usize> = None;
    let mut dirtied_by_float = false;

    if !state.is_full_layout {
        let mut float_index = 0;
        for index in 0..lines.len() {
            if lines[index].is_dirty {
                first_dirty = Some(index);
                break;
            }
            let mut encountered_new_float = false;
            check_floats_in_clean_line(
                &lines[index],
                stream,
                &state.floats,
                &mut float_index,
                &mut encountered_new_float,
                &mut dirtied_by_float,
            );
            if encountered_new_float {
                state.is_full_layout = true;
                break;
            }
            if dirtied_by_float {
                lines[index].mark_dirty();
                first_dirty = Some(index);
                break;
            }
        }
        // A float inserted after the last known one also invalidates.
        if first_dirty.is_none() && !state.is_full_layout && float_index < state.floats.len() {
            state.is_full_layout = true;
        }
    }

    if state.is_full_layout {
        lines.clear();
        debug!("line layout: full rebuild");
        return StartPosition { first_dirty_line: 0 };
    }

    match first_dirty {
        Some(index) => {
            if index > 0 && !dirtied_by_float {
                // The previous line's break is ambiguous when it was not
                // an explicit one, or when it pointed past the end of a
                // text object that has since shrunk.
                let previous = &lines[index - 1];
                let stale_break = match previous.line_break.object {
                    None => true,
                    Some(object) => stream
                        .get(object)
                        .text()
                        .is_some_and(|t| previous.line_break.offset >= t.len()),
                };
                if !previous.ends_with_break || stale_break {
                    first_dirty = Some(index - 1);
                }
            }
        }
        None => {
            // No dirty line found; if the last line did not end cleanly,
            // a prior speculative layout may not have fully resolved.
            if lines.last().is_some_and(|line| !line.ends_with_break) {
                first_dirty = Some(lines.len() - 1);
            }
        }
    }

    let first_dirty_line = first_dirty.unwrap_or(lines.len());

    // Restore floats from the clean prefix so the breaker sees the same
    // obstacles a full layout would have produced.
    let mut clean_floats = 0;
    for line in lines.iter().take(first_dirty_line) {
        for line_float in &line.floats {
            floats.insert_placed(line_float.object, line_float.side, line_float.rect);
            debug_assert!(
                state
                    .floats
                    .get(clean_floats)
                    .is_some_and(|f| f.object == line_float.object),
                "clean floats out of order"
            );
            clean_floats += 1;
        }
    }
    state.float_index = clean_floats;

    if first_dirty_line > 0 {
        geometry.logical_height = lines[first_dirty_line - 1].geometry.line_bottom;
    }
    debug!(
        "line layout: {} clean leading lines, {} clean floats",
        first_dirty_line, clean_floats
    );
    StartPosition { first_dirty_line }
}

/// Extracts the maximal clean suffix after the first dirty line, with
/// one-to-one float matching; lines stay alive for reattachment.
pub(crate) fn determine_end_position(
    state: &mut LineLayoutState,
    lines: &mut Vec<RootLineBox>,
    stream: &InlineStream,
    first_dirty_line: usize,
) {
    debug_assert!(!state.has_end_line(), "end line determined twice");
    let mut float_index = state.float_index;
    let mut last_clean_start: Option<usize> = None;
    for index in first_dirty_line + 1..lines.len() {
        if !lines[index].is_dirty {
            let mut encountered_new_float = false;
            let mut dirtied_by_float = false;
            check_floats_in_clean_line(
                &lines[index],
                stream,
                &state.floats,
                &mut float_index,
                &mut encountered_new_float,
                &mut dirtied_by_float,
            );
            if encountered_new_float {
                return;
            }
            if dirtied_by_float {
                lines[index].mark_dirty();
            }
        }
        if lines[index].is_dirty {
            last_clean_start = None;
        } else if last_clean_start.is_none() {
            last_clean_start = Some(index);
        }
    }
    let Some(tail_start) = last_clean_start else {
        return;
    };

    // The previous line's break is where the clean tail resumes.
    let previous = &lines[tail_start - 1];
    state.clean_line_start = previous.line_break;
    state.end_line_logical_top = previous.geometry.line_bottom;

    let mut tail = lines.split_off(tail_start);
    for line in &mut tail {
        line.extract();
    }
    debug!("line layout: extracted {} clean trailing lines", tail.len());
    state.end_line = tail;
}

/// Whether shifting the clean tail by the pending delta would cross any
/// float's bottom edge, which would change available widths.
fn floats_allow_shift(
    state: &LineLayoutState,
    floats: &FloatList,
    geometry: &BlockGeometry,
) -> bool {
    let line_delta = geometry.logical_height - state.end_line_logical_top;
    if nearly_zero(line_delta) || floats.is_empty() {
        return true;
    }
    let logical_top = geometry.logical_height.min(state.end_line_logical_top);
    let last_line_bottom = state
        .end_line
        .last()
        .map_or(logical_top, |line| line.geometry.line_bottom);
    let logical_bottom = last_line_bottom + line_delta.abs();
    for entry in floats.entries() {
        let bottom = entry.rect.block_end();
        if bottom >= logical_top && bottom < logical_bottom {
            return false;
        }
    }
    true
}

/// Tests whether the breaker has reached the clean tail's start. On a
/// match the stale front of the tail (up to a few lines of lookahead) is
/// discarded and `true` is returned.
pub(crate) fn matched_end_line(
    state: &mut LineLayoutState,
    position: &LineBreakPosition,
    floats: &FloatList,
    geometry: &BlockGeometry,
) -> bool {
    if position.object == state.clean_line_start.object
        && position.offset == state.clean_line_start.offset
    {
        if position.bidi != state.clean_line_start.bidi {
            return false;
        }
        return floats_allow_shift(state, floats, geometry);
    }

    // The first clean line no longer matches; try a handful of following
    // lines before giving up.
    const LOOKAHEAD_LINES: usize = 8;
    let limit = state.end_line.len().min(LOOKAHEAD_LINES);
    for index in 0..limit {
        let line = &state.end_line[index];
        if line.line_break.object == position.object && line.line_break.offset == position.offset {
            if line.line_break.bidi != position.bidi {
                return false;
            }
            state.end_line_logical_top = line.geometry.line_bottom;
            state.end_line.drain(..=index);
            if state.end_line.is_empty() {
                return false;
            }
            return floats_allow_shift(state, floats, geometry);
        }
    }
    false
}

/// Reattaches the matched clean tail below the rebuilt region, restoring
/// its floats and advancing the block's vertical cursor.
pub(crate) fn attach_end_line(
    state: &mut LineLayoutState,
    lines: &mut Vec<RootLineBox>,
    floats: &mut FloatList,
    geometry: &mut BlockGeometry,
) {
    let delta = geometry.logical_height - state.end_line_logical_top;
    debug!(
        "line layout: reattaching {} clean lines, delta {}",
        state.end_line.len(),
        delta
    );
    for mut line in state.end_line.drain(..) {
        line.attach(delta);
        for line_float in &line.floats {
            floats.insert_placed(line_float.object, line_float.side, line_float.rect);
        }
        geometry.logical_height = line.geometry.line_bottom;
        lines.push(line);
    }
}
