// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bidirectional resolution and per-line run production.
//!
//! Embedding levels are resolved once per layout pass over the block's
//! concatenated paragraph text (non-text leaves contribute an object
//! replacement character). Each finalized line then yields a list of
//! [`BidiRun`]s: the midpoint-filtered content ranges, split at level
//! boundaries and reordered into visual order.

use unicode_bidi::{BidiInfo, Level};

use crate::break_iter::OBJECT_REPLACEMENT;
use crate::content::{InlineStream, ObjectId, ObjectKind};
use crate::midpoint::{MidpointState, STOP_BEFORE_OBJECT};
use crate::position::InlinePosition;
use crate::style::Direction;

/// Snapshot of the bidi state at a line boundary, compared during
/// incremental relayout to decide whether a clean line can be resumed.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct BidiSnapshot {
    pub paragraph_level: u8,
    pub level: u8,
}

/// Embedding levels for one block's paragraph text.
#[derive(Clone, Debug, Default)]
pub(crate) struct ParagraphBidi {
    /// Level per paragraph byte.
    levels: Vec<u8>,
    /// Start of each object's contribution to the paragraph text.
    object_offsets: Vec<usize>,
    base_level: u8,
    has_rtl: bool,
}

impl ParagraphBidi {
    pub fn new(stream: &InlineStream, direction: Direction) -> Self {
        let mut text = String::new();
        let mut object_offsets = Vec::with_capacity(stream.len());
        for id in stream.iter_ids() {
            object_offsets.push(text.len());
            match &stream.get(id).kind {
                ObjectKind::Text(content) => text.push_str(content.text()),
                ObjectKind::LineBreak(_) => text.push('\n'),
                _ => text.push(OBJECT_REPLACEMENT),
            }
        }
        let base = match direction {
            Direction::Ltr => Level::ltr(),
            Direction::Rtl => Level::rtl(),
        };
        let info = BidiInfo::new(&text, Some(base));
        let levels: Vec<u8> = info.levels.iter().map(|level| level.number()).collect();
        let has_rtl = levels.iter().any(|level| level & 1 != 0);
        Self {
            levels,
            object_offsets,
            base_level: base.number(),
            has_rtl,
        }
    }

    pub fn base_level(&self) -> u8 {
        self.base_level
    }

    pub fn has_rtl(&self) -> bool {
        self.has_rtl
    }

    pub fn level_at(&self, object: ObjectId, offset: usize) -> u8 {
        let Some(start) = self.object_offsets.get(object.index()).copied() else {
            return self.base_level;
        };
        self.levels
            .get(start + offset)
            .copied()
            .unwrap_or(self.base_level)
    }

    pub fn snapshot_at(&self, position: &InlinePosition) -> BidiSnapshot {
        let level = match position.object {
            Some(object) => self.level_at(object, position.offset),
            None => self.base_level,
        };
        BidiSnapshot {
            paragraph_level: self.base_level,
            level,
        }
    }
}

/// A maximal sub-range of one content object with a single embedding
/// level, scoped to one line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BidiRun {
    pub object: ObjectId,
    /// Byte range for text objects; `0..1` for other kinds.
    pub start: usize,
    pub stop: usize,
    pub level: u8,
    pub has_hyphen: bool,
}

impl BidiRun {
    fn new(object: ObjectId, start: usize, stop: usize, level: u8) -> Self {
        Self {
            object,
            start,
            stop,
            level,
            has_hyphen: false,
        }
    }

    pub fn is_rtl(&self) -> bool {
        self.level & 1 != 0
    }
}

fn should_skip_creating_runs(stream: &InlineStream, object: ObjectId) -> bool {
    match &stream.get(object).kind {
        ObjectKind::Float(_) => true,
        ObjectKind::Positioned(positioned) => !positioned.is_originally_inline,
        _ => false,
    }
}

/// Pushes runs for `[start, stop)` of `object`, splitting at level
/// boundaries.
fn push_run(
    runs: &mut Vec<BidiRun>,
    stream: &InlineStream,
    bidi: &ParagraphBidi,
    object: ObjectId,
    start: usize,
    stop: usize,
) {
    if stream.get(object).is_text() {
        let mut span_start = start;
        let mut span_level = bidi.level_at(object, start);
        let text = stream.get(object).text().expect("text object");
        let mut offset = start;
        while offset < stop {
            let ch = text.char_at(offset).expect("offset on char boundary");
            let level = bidi.level_at(object, offset);
            if level != span_level {
                runs.push(BidiRun::new(object, span_start, offset, span_level));
                span_start = offset;
                span_level = level;
            }
            offset += ch.len_utf8();
        }
        if span_start < stop {
            runs.push(BidiRun::new(object, span_start, stop, span_level));
        }
    } else {
        runs.push(BidiRun::new(
            object,
            0,
            1,
            bidi.level_at(object, 0),
        ));
    }
}

/// Emits the runs for `[start, end)` of one object, honoring the midpoint
/// log: spans between a start-ignoring midpoint and the following
/// stop-ignoring midpoint are omitted, keeping the single collapsed space
/// at the region's opening position.
fn append_runs_for_object(
    runs: &mut Vec<BidiRun>,
    stream: &InlineStream,
    bidi: &ParagraphBidi,
    midpoints: &mut MidpointState,
    object: ObjectId,
    start: usize,
    end: usize,
) {
    if start > end || should_skip_creating_runs(stream, object) {
        return;
    }
    let next_midpoint = (midpoints.current < midpoints.len()).then(|| midpoints.get(midpoints.current));
    if midpoints.between {
        let Some(next) = next_midpoint else {
            return;
        };
        if next.object != object {
            return;
        }
        // A new start point: stop ignoring and adjust our start.
        midpoints.between = false;
        midpoints.current += 1;
        if next.offset < end {
            append_runs_for_object(runs, stream, bidi, midpoints, object, next.offset, end);
        }
        return;
    }
    let Some(next) = next_midpoint else {
        push_run(runs, stream, bidi, object, start, end);
        return;
    };
    if next.object != object {
        push_run(runs, stream, bidi, object, start, end);
        return;
    }
    // An end midpoint inside this object: emit up to and including the
    // midpoint character, then continue past it in ignoring mode.
    let stop_end = if next.offset == STOP_BEFORE_OBJECT {
        0
    } else {
        let len = stream
            .get(object)
            .text()
            .and_then(|t| t.char_at(next.offset))
            .map_or(1, char::len_utf8);
        next.offset + len
    };
    if stop_end <= end {
        midpoints.between = true;
        midpoints.current += 1;
        if next.offset != STOP_BEFORE_OBJECT {
            if stop_end > start {
                push_run(runs, stream, bidi, object, start, stop_end);
            }
            append_runs_for_object(runs, stream, bidi, midpoints, object, stop_end, end);
        }
    } else {
        push_run(runs, stream, bidi, object, start, end);
    }
}

/// Produces the logical-order run list for one finalized line.
pub(crate) fn bidi_runs_for_line(
    stream: &InlineStream,
    bidi: &ParagraphBidi,
    midpoints: &mut MidpointState,
    start: &InlinePosition,
    end: &InlinePosition,
) -> Vec<BidiRun> {
    midpoints.current = 0;
    midpoints.between = false;
    let mut runs = Vec::new();
    let mut current = start.object;
    while let Some(object) = current {
        if Some(object) == end.object && end.offset == 0 {
            break;
        }
        let content_len = stream.get(object).content_len().max(
            if stream.get(object).is_text() { 0 } else { 1 },
        );
        let object_start = if Some(object) == start.object {
            start.offset
        } else {
            0
        };
        let object_end = if Some(object) == end.object {
            end.offset
        } else {
            content_len
        };
        append_runs_for_object(
            &mut runs,
            stream,
            bidi,
            midpoints,
            object,
            object_start,
            object_end,
        );
        if Some(object) == end.object {
            break;
        }
        current = stream.next(object);
    }
    runs
}

/// Splits a trailing collapsible-space range off the logically last run.
///
/// Only applies under break-only-after-whitespace wrapping, where trailing
/// spaces survive into the run list; the returned run is later pinned to
/// the visual end of the line at the paragraph's base level.
pub(crate) fn split_trailing_space_run(
    stream: &InlineStream,
    bidi: &ParagraphBidi,
    runs: &mut Vec<BidiRun>,
) -> Option<BidiRun> {
    let last = runs.last()?.clone();
    let object = stream.get(last.object);
    if !(object.style.break_only_after_white_space() && object.style.auto_wrap()) {
        return None;
    }
    let text = object.text()?;
    let mut first_space = last.stop;
    while first_space > last.start {
        let ch = text.char_before(first_space)?;
        if !object.style.is_collapsible_white_space(ch) {
            break;
        }
        first_space -= ch.len_utf8();
    }
    if first_space == last.stop {
        return None;
    }
    if first_space != last.start {
        let trailing = BidiRun::new(last.object, first_space, last.stop, bidi.base_level());
        runs.last_mut().expect("non-empty").stop = first_space;
        Some(trailing)
    } else {
        let mut trailing = runs.pop().expect("non-empty");
        trailing.level = bidi.base_level();
        Some(trailing)
    }
}

/// Reorders runs into visual order according to their embedding levels.
pub(crate) fn reorder_runs_visual(runs: &mut [BidiRun]) {
    let run_count = runs.len();
    if run_count < 2 {
        return;
    }

    // Find the max level and the min *odd* level.
    let mut max_level = 0;
    let mut lowest_odd_level = u8::MAX;
    for run in runs.iter() {
        let level = run.level;
        if level > max_level {
            max_level = level;
        }
        if level & 1 != 0 && level < lowest_odd_level {
            lowest_odd_level = level;
        }
    }
    if lowest_odd_level == u8::MAX {
        return;
    }

    let mut level = max_level;
    while level >= lowest_odd_level {
        let mut i = 0;
        while i < run_count {
            if runs[i].level >= level {
                let mut end = i + 1;
                while end < run_count && runs[end].level >= level {
                    end += 1;
                }
                runs[i..end].reverse();
                i = end;
            }
            i += 1;
        }
        if level == 0 {
            break;
        }
        level -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midpoint::Midpoint;
    use crate::style::Style;

    fn stream_of(text: &str) -> InlineStream {
        let mut builder = InlineStream::builder();
        builder.push_text(Style::default(), text);
        builder.finish()
    }

    #[test]
    fn midpoints_collapse_run_ranges() {
        // "a  b": ignore region starts at the first space (offset 1),
        // resumes at 'b' (offset 3). The emitted runs keep exactly one
        // space.
        let stream = stream_of("a  b");
        let bidi = ParagraphBidi::new(&stream, Direction::Ltr);
        let mut midpoints = MidpointState::default();
        midpoints.start_ignoring(Midpoint::new(ObjectId(0), 1));
        midpoints.stop_ignoring(Midpoint::new(ObjectId(0), 3));

        let start = InlinePosition::new(Some(ObjectId(0)), 0);
        let end = InlinePosition::new(None, 0);
        let runs = bidi_runs_for_line(&stream, &bidi, &mut midpoints, &start, &end);
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].start, runs[0].stop), (0, 2));
        assert_eq!((runs[1].start, runs[1].stop), (3, 4));
    }

    #[test]
    fn mixed_direction_runs_reorder() {
        let stream = stream_of("abc \u{05D0}\u{05D1} def");
        let bidi = ParagraphBidi::new(&stream, Direction::Ltr);
        assert!(bidi.has_rtl());
        let mut midpoints = MidpointState::default();
        let start = InlinePosition::new(Some(ObjectId(0)), 0);
        let end = InlinePosition::new(None, 0);
        let mut runs = bidi_runs_for_line(&stream, &bidi, &mut midpoints, &start, &end);
        assert!(runs.iter().any(|r| r.is_rtl()));
        let before = runs.clone();
        reorder_runs_visual(&mut runs);
        // LTR base: visual order preserves the LTR segments around the
        // reversed Hebrew segment, which stays contiguous.
        assert_eq!(runs.len(), before.len());
        assert_eq!(runs.first(), before.first());
    }

    #[test]
    fn trailing_space_split_requires_pre_wrap() {
        let stream = stream_of("word  ");
        let bidi = ParagraphBidi::new(&stream, Direction::Ltr);
        let mut runs = vec![BidiRun::new(ObjectId(0), 0, 6, 0)];
        assert!(split_trailing_space_run(&stream, &bidi, &mut runs).is_none());

        let mut builder = InlineStream::builder();
        let style = Style {
            white_space: crate::style::WhiteSpace::PreWrap,
            ..Style::default()
        };
        builder.push_text(style, "word  ");
        let stream = builder.finish();
        let mut runs = vec![BidiRun::new(ObjectId(0), 0, 6, 0)];
        let trailing = split_trailing_space_run(&stream, &bidi, &mut runs).expect("split");
        assert_eq!((trailing.start, trailing.stop), (4, 6));
        assert_eq!(runs[0].stop, 4);
    }
}
