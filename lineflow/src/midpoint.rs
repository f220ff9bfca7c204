// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Whitespace-collapse midpoints.
//!
//! While scanning one line, the breaker records the positions where
//! whitespace collapsing toggles as an append-only log of midpoints:
//! `[stop0, start0, stop1, start1, ...]`. The span between an odd-indexed
//! entry and the following even-indexed one is omitted from the emitted
//! runs. The log must hold an even number of entries when a line is
//! finalized; [`MidpointState::check_midpoints`] is the normalization pass
//! that repairs a start point recorded beyond the chosen break.

use smallvec::SmallVec;

use crate::content::{InlineStream, ObjectId};
use crate::position::InlinePosition;

/// Offset marking "stop before the object, include none of it".
pub(crate) const STOP_BEFORE_OBJECT: usize = usize::MAX;

/// A position at which whitespace collapsing toggles.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Midpoint {
    pub object: ObjectId,
    pub offset: usize,
}

impl Midpoint {
    pub fn new(object: ObjectId, offset: usize) -> Self {
        Self { object, offset }
    }
}

/// The midpoint log for one line-breaking pass.
#[derive(Clone, Default, Debug)]
pub struct MidpointState {
    midpoints: SmallVec<[Midpoint; 8]>,
    /// Next midpoint to consume during run emission.
    pub current: usize,
    /// Whether run emission is currently inside an ignored span.
    pub between: bool,
}

impl MidpointState {
    pub fn reset(&mut self) {
        self.midpoints.clear();
        self.current = 0;
        self.between = false;
    }

    pub fn len(&self) -> usize {
        self.midpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.midpoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Midpoint {
        self.midpoints[index]
    }

    pub fn midpoints(&self) -> &[Midpoint] {
        &self.midpoints
    }

    /// Begins an ignored span.
    pub fn start_ignoring(&mut self, midpoint: Midpoint) {
        debug_assert!(self.midpoints.len() % 2 == 0, "unbalanced midpoint log");
        self.midpoints.push(midpoint);
    }

    /// Ends an ignored span.
    pub fn stop_ignoring(&mut self, midpoint: Midpoint) {
        debug_assert!(self.midpoints.len() % 2 == 1, "unbalanced midpoint log");
        self.midpoints.push(midpoint);
    }

    /// Splits the ignored span around an object that still needs a line
    /// box (an empty inline, a positioned box, a `<br>` with clearance).
    pub fn ensure_box_inside_ignored_spaces(&mut self, object: ObjectId) {
        self.stop_ignoring(Midpoint::new(object, 0));
        self.start_ignoring(Midpoint::new(object, 0));
    }

    /// Forces the character at `(object, offset)` into a box of its own by
    /// bracketing it with a midpoint pair.
    pub fn ensure_character_gets_box(
        &mut self,
        stream: &InlineStream,
        object: ObjectId,
        offset: usize,
    ) {
        let previous = stream
            .get(object)
            .text()
            .and_then(|t| t.char_before(offset))
            .map_or(offset.saturating_sub(1), |ch| offset - ch.len_utf8());
        self.start_ignoring(Midpoint::new(object, previous));
        self.stop_ignoring(Midpoint::new(object, offset));
    }

    /// Decrements the offset of midpoint `index` by one character.
    pub fn shave_midpoint_char(&mut self, stream: &InlineStream, index: usize) {
        let midpoint = &mut self.midpoints[index];
        if midpoint.offset == 0 || midpoint.offset == STOP_BEFORE_OBJECT {
            return;
        }
        let len = stream
            .get(midpoint.object)
            .text()
            .and_then(|t| t.char_before(midpoint.offset))
            .map_or(1, char::len_utf8);
        midpoint.offset -= len;
    }

    /// Finalize-time sanity pass: if the last recorded start point lies
    /// beyond the chosen break, shave it off, and drop the now-irrelevant
    /// trailing space from the preceding stop point when whitespace
    /// collapses there.
    pub fn check_midpoints(&mut self, stream: &InlineStream, line_break: &InlinePosition) {
        let count = self.midpoints.len();
        if line_break.object.is_none() || count < 2 || count % 2 != 0 {
            return;
        }
        let endpoint = self.midpoints[count - 2];
        let startpoint = self.midpoints[count - 1];
        let start_pos = InlinePosition::new(Some(startpoint.object), startpoint.offset);
        let mut current = InlinePosition::new(Some(endpoint.object), endpoint.offset);
        while !current.at_end() && current != start_pos && current != *line_break {
            current.increment(stream);
        }
        if current == *line_break {
            // The break precedes the start point: shave it off the log.
            self.midpoints.truncate(count - 1);
            if stream
                .get(endpoint.object)
                .style
                .collapse_white_space()
            {
                self.shave_midpoint_char(stream, count - 2);
            }
        }
    }
}
