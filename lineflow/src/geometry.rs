// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logical (writing-mode relative) geometry.
//!
//! All layout state is stored once, in logical coordinates: the inline axis
//! runs in the direction text flows, the block axis in the direction lines
//! stack. Physical coordinates are produced at the edges (painting,
//! hit-testing) via [`WritingMode::to_physical`].

/// Writing mode of the containing block.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum WritingMode {
    /// Horizontal lines, stacked top to bottom.
    #[default]
    HorizontalTb,
    /// Vertical lines, stacked right to left.
    VerticalRl,
    /// Vertical lines, stacked left to right.
    VerticalLr,
}

impl WritingMode {
    pub fn is_horizontal(self) -> bool {
        self == Self::HorizontalTb
    }

    /// Transposes a logical rect into physical coordinates.
    ///
    /// `block_extent` is the physical extent of the container along the
    /// block axis, needed to flip `VerticalRl`.
    pub fn to_physical(self, rect: LogicalRect, block_extent: f32) -> PhysicalRect {
        match self {
            Self::HorizontalTb => PhysicalRect {
                x: rect.inline_start,
                y: rect.block_start,
                width: rect.inline_size,
                height: rect.block_size,
            },
            Self::VerticalLr => PhysicalRect {
                x: rect.block_start,
                y: rect.inline_start,
                width: rect.block_size,
                height: rect.inline_size,
            },
            Self::VerticalRl => PhysicalRect {
                x: block_extent - rect.block_start - rect.block_size,
                y: rect.inline_start,
                width: rect.block_size,
                height: rect.inline_size,
            },
        }
    }
}

/// A rectangle in logical coordinates.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct LogicalRect {
    pub inline_start: f32,
    pub block_start: f32,
    pub inline_size: f32,
    pub block_size: f32,
}

impl LogicalRect {
    pub fn new(inline_start: f32, block_start: f32, inline_size: f32, block_size: f32) -> Self {
        Self {
            inline_start,
            block_start,
            inline_size,
            block_size,
        }
    }

    pub fn inline_end(&self) -> f32 {
        self.inline_start + self.inline_size
    }

    pub fn block_end(&self) -> f32 {
        self.block_start + self.block_size
    }

    /// Grows `self` to cover `other`.
    pub fn unite(&mut self, other: &Self) {
        if other.inline_size <= 0. && other.block_size <= 0. {
            return;
        }
        if self.inline_size <= 0. && self.block_size <= 0. {
            *self = *other;
            return;
        }
        let inline_start = self.inline_start.min(other.inline_start);
        let block_start = self.block_start.min(other.block_start);
        let inline_end = self.inline_end().max(other.inline_end());
        let block_end = self.block_end().max(other.block_end());
        *self = Self {
            inline_start,
            block_start,
            inline_size: inline_end - inline_start,
            block_size: block_end - block_start,
        };
    }
}

/// A rectangle in physical coordinates.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct PhysicalRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_vertical_rl() {
        let rect = LogicalRect::new(10., 5., 100., 20.);
        let phys = WritingMode::VerticalRl.to_physical(rect, 200.);
        assert_eq!(phys.x, 200. - 5. - 20.);
        assert_eq!(phys.y, 10.);
        assert_eq!(phys.width, 20.);
        assert_eq!(phys.height, 100.);
    }

    #[test]
    fn unite_ignores_empty() {
        let mut rect = LogicalRect::new(10., 10., 50., 10.);
        rect.unite(&LogicalRect::default());
        assert_eq!(rect, LogicalRect::new(10., 10., 50., 10.));
        rect.unite(&LogicalRect::new(0., 0., 5., 5.));
        assert_eq!(rect, LogicalRect::new(0., 0., 60., 20.));
    }
}
