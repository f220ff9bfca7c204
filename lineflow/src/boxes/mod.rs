// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The line box tree.
//!
//! Each visual line is a [`RootLineBox`] owning a tree of inline boxes:
//! [`FlowBox`]es for inline elements and leaf boxes for text runs and
//! replaced content. Boxes own their children by value; content objects
//! never hold box references back.

pub(crate) mod alignment;
pub(crate) mod construct;

use crate::bidi::BidiSnapshot;
use crate::content::{FlowId, ObjectId};
use crate::geometry::LogicalRect;
use crate::style::FloatSide;
use crate::util::nearly_zero;

/// Where a line ended, and the bidi state there; the next line resumes
/// here, and incremental relayout matches against it.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct LineBreakPosition {
    pub object: Option<ObjectId>,
    pub offset: usize,
    pub bidi: BidiSnapshot,
}

/// Geometry of one inline box, in logical coordinates relative to the
/// block's content box.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct BoxGeometry {
    pub logical_left: f32,
    pub logical_width: f32,
    pub logical_top: f32,
    pub logical_height: f32,
}

/// A box for an inline element's contribution to one line.
#[derive(Clone, Debug)]
pub struct FlowBox {
    pub flow: FlowId,
    /// The stream object this box was created for, when the element is
    /// empty and appears in the stream itself.
    pub object: Option<ObjectId>,
    pub geometry: BoxGeometry,
    /// Whether this line carries the element's start/end edge (border,
    /// padding, margin). A line in the middle of a split element carries
    /// neither.
    pub includes_start_edge: bool,
    pub includes_end_edge: bool,
    pub children: Vec<InlineBoxNode>,
}

/// A leaf box for a contiguous run of text.
#[derive(Clone, Debug)]
pub struct TextBox {
    pub object: ObjectId,
    /// Byte sub-range of the object's buffer.
    pub start: usize,
    pub len: usize,
    pub geometry: BoxGeometry,
    pub bidi_level: u8,
    /// Render a hyphen glyph as a suffix (soft or automatic hyphenation).
    pub has_hyphen: bool,
    /// Extra width distributed into this run by justification.
    pub expansion: f32,
    /// Byte offset within `start..start + len` past which text-overflow
    /// truncation hides the content.
    pub truncation: Option<usize>,
}

impl TextBox {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// A leaf box for a replaced element, an explicit break, or an inline
/// positioned placeholder.
#[derive(Clone, Debug)]
pub struct ReplacedBox {
    pub object: ObjectId,
    pub geometry: BoxGeometry,
    pub bidi_level: u8,
}

/// One node in a line's box tree.
#[derive(Clone, Debug)]
pub enum InlineBoxNode {
    Flow(FlowBox),
    Text(TextBox),
    Replaced(ReplacedBox),
}

impl InlineBoxNode {
    pub fn geometry(&self) -> &BoxGeometry {
        match self {
            Self::Flow(flow) => &flow.geometry,
            Self::Text(text) => &text.geometry,
            Self::Replaced(replaced) => &replaced.geometry,
        }
    }

    pub fn geometry_mut(&mut self) -> &mut BoxGeometry {
        match self {
            Self::Flow(flow) => &mut flow.geometry,
            Self::Text(text) => &mut text.geometry,
            Self::Replaced(replaced) => &mut replaced.geometry,
        }
    }

    /// The content object this node belongs to, if any.
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            Self::Flow(flow) => flow.object,
            Self::Text(text) => Some(text.object),
            Self::Replaced(replaced) => Some(replaced.object),
        }
    }

    fn visit_leaves<'a>(&'a self, visitor: &mut impl FnMut(&'a Self)) {
        match self {
            Self::Flow(flow) => {
                for child in &flow.children {
                    child.visit_leaves(visitor);
                }
            }
            _ => visitor(self),
        }
    }

    fn adjust_block_position(&mut self, delta: f32) {
        self.geometry_mut().logical_top += delta;
        if let Self::Flow(flow) = self {
            for child in &mut flow.children {
                child.adjust_block_position(delta);
            }
        }
    }

    fn touches(&self, object: ObjectId) -> bool {
        match self {
            Self::Flow(flow) => {
                flow.object == Some(object) || flow.children.iter().any(|c| c.touches(object))
            }
            Self::Text(text) => text.object == object,
            Self::Replaced(replaced) => replaced.object == object,
        }
    }
}

/// A float attributed to the line that positioned it, recorded with its
/// geometry so incremental relayout can match it later.
#[derive(Clone, PartialEq, Debug)]
pub struct LineFloat {
    pub object: ObjectId,
    pub side: FloatSide,
    pub rect: LogicalRect,
}

/// The truncation marker placed by text-overflow.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct EllipsisBox {
    pub logical_left: f32,
    pub logical_width: f32,
}

/// Block-axis geometry of one line.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct LineGeometry {
    /// Inline position of the line's content after alignment.
    pub logical_left: f32,
    /// Total inline extent of the content (before alignment shifts).
    pub logical_width: f32,
    pub line_top: f32,
    pub baseline: f32,
    pub line_bottom: f32,
}

impl LineGeometry {
    pub fn height(&self) -> f32 {
        self.line_bottom - self.line_top
    }
}

/// One visual line.
#[derive(Clone, Debug)]
pub struct RootLineBox {
    pub children: Vec<InlineBoxNode>,
    pub geometry: LineGeometry,
    /// Where this line broke; the next line resumes here.
    pub line_break: LineBreakPosition,
    /// Whether the break was an explicit one (or preserved newline).
    pub ends_with_break: bool,
    pub is_dirty: bool,
    pub is_hyphenated: bool,
    /// Detached from the block's list but kept alive for reattachment.
    pub extracted: bool,
    /// Floats this line positioned, in insertion order.
    pub floats: Vec<LineFloat>,
    pub ellipsis: Option<EllipsisBox>,
    /// Visual overflow including glyph ink beyond the layout extent.
    pub visual_overflow: LogicalRect,
}

impl RootLineBox {
    pub fn visit_leaves<'a>(&'a self, mut visitor: impl FnMut(&'a InlineBoxNode)) {
        for child in &self.children {
            child.visit_leaves(&mut visitor);
        }
    }

    /// Whether any box on this line belongs to `object`.
    pub fn touches(&self, object: ObjectId) -> bool {
        self.children.iter().any(|child| child.touches(object))
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Detaches the line for the clean-line migration path: the boxes
    /// survive, but consumers must not observe them until reattached.
    pub fn extract(&mut self) {
        self.extracted = true;
    }

    /// Reattaches an extracted line, shifting it by `delta` along the
    /// block axis.
    pub fn attach(&mut self, delta: f32) {
        debug_assert!(self.extracted, "only extracted lines can be attached");
        self.extracted = false;
        self.adjust_block_position(delta);
    }

    pub fn adjust_block_position(&mut self, delta: f32) {
        if nearly_zero(delta) {
            return;
        }
        self.geometry.line_top += delta;
        self.geometry.baseline += delta;
        self.geometry.line_bottom += delta;
        self.visual_overflow.block_start += delta;
        for float in &mut self.floats {
            float.rect.block_start += delta;
        }
        for child in &mut self.children {
            child.adjust_block_position(delta);
        }
    }

    pub fn adjust_inline_position(&mut self, delta: f32) {
        fn shift(node: &mut InlineBoxNode, delta: f32) {
            node.geometry_mut().logical_left += delta;
            if let InlineBoxNode::Flow(flow) = node {
                for child in &mut flow.children {
                    shift(child, delta);
                }
            }
        }
        if nearly_zero(delta) {
            return;
        }
        self.geometry.logical_left += delta;
        self.visual_overflow.inline_start += delta;
        for child in &mut self.children {
            shift(child, delta);
        }
    }

    /// Clears a previously placed ellipsis and any truncation marks.
    pub fn clear_truncation(&mut self) {
        fn clear(node: &mut InlineBoxNode) {
            match node {
                InlineBoxNode::Flow(flow) => flow.children.iter_mut().for_each(clear),
                InlineBoxNode::Text(text) => text.truncation = None,
                InlineBoxNode::Replaced(_) => {}
            }
        }
        self.ellipsis = None;
        self.children.iter_mut().for_each(clear);
    }
}
