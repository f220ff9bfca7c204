// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The line width tracker and the block's float list.
//!
//! [`LineWidth`] maintains the committed/uncommitted inline extent of the
//! line being built against the width available at the block's current
//! vertical position, which floats may narrow as they are placed.

use crate::content::ObjectId;
use crate::geometry::LogicalRect;
use crate::style::{Clear, FloatSide};

/// The block's inline content box and vertical layout cursor.
#[derive(Copy, Clone, Default, Debug)]
pub struct BlockGeometry {
    pub content_width: f32,
    /// Block-axis position the next line starts at.
    pub logical_height: f32,
}

/// One float shared between the line breaker and the block.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatEntry {
    pub object: ObjectId,
    pub side: FloatSide,
    /// Margin-box rect; meaningful once `is_placed` is set.
    pub rect: LogicalRect,
    pub is_placed: bool,
}

/// Floats belonging to one block, in insertion order.
#[derive(Clone, Default, Debug)]
pub struct FloatList {
    entries: Vec<FloatEntry>,
}

impl FloatList {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FloatEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> &FloatEntry {
        &self.entries[index]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops entries from `len` on; used when a line restarts at a new
    /// vertical position and must forget the floats it inserted.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn insert(
        &mut self,
        object: ObjectId,
        side: FloatSide,
        inline_size: f32,
        block_size: f32,
    ) -> usize {
        self.entries.push(FloatEntry {
            object,
            side,
            rect: LogicalRect::new(0., 0., inline_size, block_size),
            is_placed: false,
        });
        self.entries.len() - 1
    }

    /// Re-inserts a float with known geometry, as when clean lines are
    /// reused during incremental relayout.
    pub fn insert_placed(&mut self, object: ObjectId, side: FloatSide, rect: LogicalRect) -> usize {
        self.entries.push(FloatEntry {
            object,
            side,
            rect,
            is_placed: true,
        });
        self.entries.len() - 1
    }

    fn straddles(rect: &LogicalRect, position: f32, band: f32) -> bool {
        rect.block_start <= position + band && rect.block_end() > position
    }

    /// Inline-start offset for a line at `position` spanning `band`.
    pub fn left_offset(&self, position: f32, band: f32) -> f32 {
        let mut offset = 0_f32;
        for entry in &self.entries {
            if entry.is_placed
                && entry.side == FloatSide::Left
                && Self::straddles(&entry.rect, position, band)
            {
                offset = offset.max(entry.rect.inline_end());
            }
        }
        offset
    }

    /// Inline-end offset for a line at `position` spanning `band`.
    pub fn right_offset(&self, position: f32, band: f32, content_width: f32) -> f32 {
        let mut offset = content_width;
        for entry in &self.entries {
            if entry.is_placed
                && entry.side == FloatSide::Right
                && Self::straddles(&entry.rect, position, band)
            {
                offset = offset.min(entry.rect.inline_start);
            }
        }
        offset
    }

    /// Bottom edge of the next placed float ending below `position`.
    pub fn next_float_bottom_below(&self, position: f32) -> Option<f32> {
        let mut bottom: Option<f32> = None;
        for entry in &self.entries {
            if !entry.is_placed {
                continue;
            }
            let end = entry.rect.block_end();
            if end > position {
                bottom = Some(match bottom {
                    Some(current) => current.min(end),
                    None => end,
                });
            }
        }
        bottom
    }

    /// Lowest bottom edge among floats on the cleared side(s), if any
    /// extends below `position`.
    pub fn clearance_below(&self, clear: Clear, position: f32) -> Option<f32> {
        let mut lowest: Option<f32> = None;
        for entry in &self.entries {
            if !entry.is_placed {
                continue;
            }
            let applies = match clear {
                Clear::None => false,
                Clear::Left => entry.side == FloatSide::Left,
                Clear::Right => entry.side == FloatSide::Right,
                Clear::Both => true,
            };
            let end = entry.rect.block_end();
            if applies && end > position {
                lowest = Some(match lowest {
                    Some(current) => current.max(end),
                    None => end,
                });
            }
        }
        lowest
    }

    /// Positions every unplaced float at or below the block's current
    /// vertical position, moving down past earlier floats when the band
    /// is too narrow.
    pub fn place_unplaced(&mut self, geometry: &BlockGeometry) {
        for index in 0..self.entries.len() {
            if self.entries[index].is_placed {
                continue;
            }
            let side = self.entries[index].side;
            let inline_size = self.entries[index].rect.inline_size;
            let mut position = geometry.logical_height;
            loop {
                let left = self.left_offset(position, 0.);
                let right = self.right_offset(position, 0., geometry.content_width);
                if right - left >= inline_size {
                    break;
                }
                match self.next_float_bottom_below(position) {
                    Some(bottom) if bottom > position => position = bottom,
                    _ => break,
                }
            }
            let left = self.left_offset(position, 0.);
            let right = self.right_offset(position, 0., geometry.content_width);
            let entry = &mut self.entries[index];
            entry.rect.inline_start = match side {
                FloatSide::Left => left,
                FloatSide::Right => right - inline_size,
            };
            entry.rect.block_start = position;
            entry.is_placed = true;
        }
    }
}

/// Inline extent bookkeeping for the line currently being built.
#[derive(Clone, Debug)]
pub struct LineWidth {
    uncommitted: f32,
    committed: f32,
    /// Amount `available` has been inflated by ruby overhang.
    overhang: f32,
    trailing_whitespace: f32,
    trailing_collapsed_whitespace: f32,
    left: f32,
    right: f32,
    available: f32,
}

impl LineWidth {
    pub fn new(geometry: &BlockGeometry, floats: &FloatList) -> Self {
        let mut width = Self {
            uncommitted: 0.,
            committed: 0.,
            overhang: 0.,
            trailing_whitespace: 0.,
            trailing_collapsed_whitespace: 0.,
            left: 0.,
            right: 0.,
            available: 0.,
        };
        width.update_available_width(geometry, floats, 0.);
        width
    }

    pub fn update_available_width(
        &mut self,
        geometry: &BlockGeometry,
        floats: &FloatList,
        band: f32,
    ) {
        let position = geometry.logical_height;
        self.left = floats.left_offset(position, band);
        self.right = floats.right_offset(position, band, geometry.content_width);
        self.compute_available_from_left_and_right();
    }

    fn compute_available_from_left_and_right(&mut self) {
        self.available = (self.right - self.left).max(0.) + self.overhang;
    }

    /// Narrows the available width if a newly placed float straddles the
    /// current vertical position.
    pub fn shrink_for_new_float(&mut self, entry: &FloatEntry, geometry: &BlockGeometry) {
        debug_assert!(entry.is_placed, "float must be placed before shrinking");
        let position = geometry.logical_height;
        if position < entry.rect.block_start || position >= entry.rect.block_end() {
            return;
        }
        match entry.side {
            FloatSide::Left => self.left = self.left.max(entry.rect.inline_end()),
            FloatSide::Right => self.right = self.right.min(entry.rect.inline_start),
        }
        self.compute_available_from_left_and_right();
    }

    pub fn fits_on_line(&self) -> bool {
        self.current_width() <= self.available
    }

    pub fn fits_on_line_including_extra_width(&self, extra: f32) -> bool {
        self.current_width() + extra <= self.available
    }

    pub fn fits_on_line_excluding_trailing_whitespace(&self, extra: f32) -> bool {
        self.current_width() - self.trailing_whitespace + extra <= self.available
    }

    /// As [`fits_on_line`](Self::fits_on_line), optionally discounting
    /// trailing collapsed whitespace.
    pub fn fits_on_line_ignoring_trailing_space(&self, ignoring_trailing_space: bool) -> bool {
        if ignoring_trailing_space {
            self.current_width() - self.trailing_collapsed_whitespace <= self.available
        } else {
            self.fits_on_line()
        }
    }

    pub fn current_width(&self) -> f32 {
        self.committed + self.uncommitted
    }

    pub fn uncommitted_width(&self) -> f32 {
        self.uncommitted
    }

    pub fn committed_width(&self) -> f32 {
        self.committed
    }

    pub fn available_width(&self) -> f32 {
        self.available
    }

    pub fn add_uncommitted_width(&mut self, delta: f32) {
        self.uncommitted += delta;
    }

    pub fn commit(&mut self) {
        self.committed += self.uncommitted;
        self.uncommitted = 0.;
    }

    pub fn set_trailing_whitespace_width(&mut self, collapsed: f32, border_padding_margin: f32) {
        self.trailing_collapsed_whitespace = collapsed;
        self.trailing_whitespace = collapsed + border_padding_margin;
    }

    /// Lets a ruby run borrow width from its committed neighbors. The
    /// start side can reclaim at most the committed width; the end side at
    /// most the remaining space; neither goes negative.
    pub fn apply_overhang(&mut self, start_overhang: f32, end_overhang: f32) {
        let start = start_overhang.min(self.committed).max(0.);
        self.available += start;
        let end = end_overhang
            .min(self.available - self.current_width())
            .max(0.);
        self.available += end;
        self.overhang += start + end;
    }

    /// Probes float bottoms below the current position for a wider band.
    /// When one is found that fits the uncommitted content (or the floats
    /// run out), the block's vertical cursor advances to it.
    pub fn fit_below_floats(&mut self, geometry: &mut BlockGeometry, floats: &FloatList) {
        debug_assert!(self.committed == 0., "only an empty line can be pushed down");
        let mut last_float_bottom = geometry.logical_height;
        let mut new_width = self.available;
        let mut new_left = self.left;
        let mut new_right = self.right;
        loop {
            let Some(bottom) = floats.next_float_bottom_below(last_float_bottom) else {
                break;
            };
            if bottom <= last_float_bottom {
                break;
            }
            new_left = floats.left_offset(bottom, 0.);
            new_right = floats.right_offset(bottom, 0., geometry.content_width);
            new_width = (new_right - new_left).max(0.);
            last_float_bottom = bottom;
            if new_width >= self.uncommitted {
                break;
            }
        }
        if new_width > self.available {
            geometry.logical_height = last_float_bottom;
            self.available = new_width + self.overhang;
            self.left = new_left;
            self.right = new_right;
        }
    }
}
