// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The inline content stream.
//!
//! A block's inline-level children arrive as an ordered sequence of leaf
//! objects: text runs, replaced boxes, floats, out-of-flow positioned
//! boxes, explicit line breaks, and *empty* inline elements. Non-empty
//! inline elements do not appear in the stream themselves; their leaves
//! carry a parent link into a separate [`InlineFlow`] table so that edge
//! widths (border/padding/margin) and box ancestry can be recovered.
//!
//! The engine only reads the stream; it never creates or destroys content
//! objects.

use crate::style::{Clear, FloatSide, Style};

/// Index of an object in the content stream.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ObjectId(pub u32);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of an inline element in the flow table.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FlowId(pub u32);

impl FlowId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Closed set of inline content kinds.
#[derive(Clone, Debug)]
pub enum ObjectKind {
    Text(TextContent),
    Replaced(ReplacedContent),
    Float(FloatContent),
    Positioned(PositionedContent),
    /// An inline element with no in-flow children but inline-direction
    /// border, padding or margin.
    InlineFlow(FlowId),
    /// An explicit line break (`<br>`-equivalent).
    LineBreak(Clear),
}

/// One object in the content stream.
#[derive(Clone, Debug)]
pub struct InlineObject {
    pub kind: ObjectKind,
    pub style: Style,
    /// Innermost enclosing inline element, if any.
    pub parent: Option<FlowId>,
    /// Set when the object's content or style changed since the last
    /// layout pass; drives clean/dirty line classification.
    pub needs_layout: bool,
    /// Block-axis offset written back by vertical alignment. Consumed by
    /// hit-testing and painting, never read by layout itself.
    pub block_offset: f32,
}

impl InlineObject {
    pub fn is_text(&self) -> bool {
        matches!(self.kind, ObjectKind::Text(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self.kind, ObjectKind::Float(_))
    }

    pub fn is_positioned(&self) -> bool {
        matches!(self.kind, ObjectKind::Positioned(_))
    }

    pub fn is_line_break(&self) -> bool {
        matches!(self.kind, ObjectKind::LineBreak(_))
    }

    pub fn is_empty_inline(&self) -> bool {
        matches!(self.kind, ObjectKind::InlineFlow(_))
    }

    pub fn is_float_or_positioned(&self) -> bool {
        self.is_float() || self.is_positioned()
    }

    pub fn text(&self) -> Option<&TextContent> {
        match &self.kind {
            ObjectKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn text_mut(&mut self) -> Option<&mut TextContent> {
        match &mut self.kind {
            ObjectKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn replaced(&self) -> Option<&ReplacedContent> {
        match &self.kind {
            ObjectKind::Replaced(replaced) => Some(replaced),
            _ => None,
        }
    }

    /// Content length in bytes; zero for non-text objects.
    pub fn content_len(&self) -> usize {
        self.text().map_or(0, |t| t.text.len())
    }
}

/// An immutable character buffer plus its measurement caches.
#[derive(Clone, Debug)]
pub struct TextContent {
    text: String,
    is_all_ascii: bool,
    /// Widest unbreakable chunk / widest forced-break segment, valid only
    /// while `preferred_widths_dirty` is false.
    pub(crate) min_width: f32,
    pub(crate) max_width: f32,
    pub(crate) preferred_widths_dirty: bool,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let is_all_ascii = text.is_ascii();
        Self {
            text,
            is_all_ascii,
            min_width: 0.,
            max_width: 0.,
            preferred_widths_dirty: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_all_ascii(&self) -> bool {
        self.is_all_ascii
    }

    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.text[offset..].chars().next()
    }

    pub fn char_before(&self, offset: usize) -> Option<char> {
        self.text[..offset].chars().next_back()
    }

    /// Replaces the buffer, invalidating derived caches.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.is_all_ascii = self.text.is_ascii();
        self.preferred_widths_dirty = true;
    }
}

/// Kinds of replaced inline-level boxes with layout-relevant behavior.
#[derive(Clone, Debug)]
pub enum ReplacedKind {
    Image,
    /// Form controls and other generic atomic inlines.
    Control,
    /// A ruby run; may borrow width from committed neighbors.
    RubyRun {
        start_overhang: f32,
        end_overhang: f32,
    },
    /// A list marker. Inside markers contribute width; either kind begins
    /// an ignore-following-space region at the line start.
    ListMarker { is_inside: bool },
}

/// An atomic inline-level box with intrinsic dimensions.
#[derive(Clone, Debug)]
pub struct ReplacedContent {
    pub kind: ReplacedKind,
    /// Border-box extent along the inline axis.
    pub inline_size: f32,
    /// Border-box extent along the block axis.
    pub block_size: f32,
    pub margin_start: f32,
    pub margin_end: f32,
}

impl ReplacedContent {
    pub fn margin_box_inline_size(&self) -> f32 {
        self.inline_size + self.margin_start + self.margin_end
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, ReplacedKind::Image)
    }

    pub fn is_list_marker(&self) -> bool {
        matches!(self.kind, ReplacedKind::ListMarker { .. })
    }
}

/// A float participating in inline layout.
#[derive(Clone, Debug)]
pub struct FloatContent {
    pub side: FloatSide,
    /// Margin-box extents.
    pub inline_size: f32,
    pub block_size: f32,
}

/// An out-of-flow positioned box awaiting a static position.
#[derive(Clone, Debug)]
pub struct PositionedContent {
    /// Whether the original display type was inline-level. Inline-type
    /// boxes resolve only their block static position during line layout;
    /// the inline one depends on the finished line.
    pub is_originally_inline: bool,
    pub static_inline: Option<f32>,
    pub static_block: Option<f32>,
}

/// An inline element recorded in the flow table.
#[derive(Clone, Debug)]
pub struct InlineFlow {
    pub parent: Option<FlowId>,
    /// Inline-direction border + padding + margin at the start edge.
    pub edge_start: f32,
    /// Inline-direction border + padding + margin at the end edge.
    pub edge_end: f32,
    /// First and last in-flow leaves contained by this element, filled in
    /// when the stream is sealed.
    pub(crate) first_leaf: Option<ObjectId>,
    pub(crate) last_leaf: Option<ObjectId>,
}

impl InlineFlow {
    pub fn has_inline_direction_edges(&self) -> bool {
        self.edge_start != 0. || self.edge_end != 0.
    }
}

/// The sealed, ordered inline content of one block.
#[derive(Clone, Debug, Default)]
pub struct InlineStream {
    objects: Vec<InlineObject>,
    flows: Vec<InlineFlow>,
}

impl InlineStream {
    pub fn builder() -> InlineStreamBuilder {
        InlineStreamBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> &InlineObject {
        &self.objects[id.index()]
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut InlineObject {
        &mut self.objects[id.index()]
    }

    pub fn flow(&self, id: FlowId) -> &InlineFlow {
        &self.flows[id.index()]
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = ObjectId> {
        (0..self.objects.len() as u32).map(ObjectId)
    }

    pub fn first(&self) -> Option<ObjectId> {
        (!self.objects.is_empty()).then_some(ObjectId(0))
    }

    pub fn next(&self, id: ObjectId) -> Option<ObjectId> {
        let next = id.0 + 1;
        (next < self.objects.len() as u32).then_some(ObjectId(next))
    }

    /// Marks an object (and the block) as needing layout.
    pub fn mark_dirty(&mut self, id: ObjectId) {
        self.objects[id.index()].needs_layout = true;
    }

    pub fn clear_dirty_flags(&mut self) {
        for object in &mut self.objects {
            object.needs_layout = false;
        }
    }

    pub fn any_dirty(&self) -> bool {
        self.objects.iter().any(|o| o.needs_layout)
    }

    /// Extra inline width contributed by the edges of enclosing inline
    /// elements when `id` sits at their start and/or end.
    ///
    /// Adjacent collapsed-away content has already been excluded from the
    /// first/last leaf computation, so an edge applies exactly when `id`
    /// is the flow's first (respectively last) in-flow leaf.
    pub fn inline_logical_width(&self, id: ObjectId, check_start: bool, check_end: bool) -> f32 {
        let mut extra = 0.;
        let mut parent = self.objects[id.index()].parent;
        while let Some(flow_id) = parent {
            let flow = &self.flows[flow_id.index()];
            if check_start && flow.first_leaf == Some(id) {
                extra += flow.edge_start;
            }
            if check_end && flow.last_leaf == Some(id) {
                extra += flow.edge_end;
            }
            parent = flow.parent;
        }
        extra
    }

    /// Chain of enclosing inline elements, outermost first.
    pub fn ancestor_chain(&self, id: ObjectId) -> Vec<FlowId> {
        let mut chain = Vec::new();
        let mut parent = self.objects[id.index()].parent;
        while let Some(flow_id) = parent {
            chain.push(flow_id);
            parent = self.flows[flow_id.index()].parent;
        }
        chain.reverse();
        chain
    }
}

/// Builds an [`InlineStream`] in content order.
#[derive(Debug, Default)]
pub struct InlineStreamBuilder {
    objects: Vec<InlineObject>,
    flows: Vec<InlineFlow>,
    open_flows: Vec<FlowId>,
    /// Leaf count at the time each open flow was entered, to detect
    /// elements that close empty.
    open_marks: Vec<usize>,
}

impl InlineStreamBuilder {
    fn current_parent(&self) -> Option<FlowId> {
        self.open_flows.last().copied()
    }

    fn push_object(&mut self, kind: ObjectKind, style: Style) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(InlineObject {
            kind,
            style,
            parent: self.current_parent(),
            needs_layout: true,
            block_offset: 0.,
        });
        id
    }

    pub fn push_text(&mut self, style: Style, text: impl Into<String>) -> ObjectId {
        self.push_object(ObjectKind::Text(TextContent::new(text)), style)
    }

    pub fn push_replaced(&mut self, style: Style, replaced: ReplacedContent) -> ObjectId {
        self.push_object(ObjectKind::Replaced(replaced), style)
    }

    pub fn push_float(&mut self, style: Style, float: FloatContent) -> ObjectId {
        self.push_object(ObjectKind::Float(float), style)
    }

    pub fn push_positioned(&mut self, style: Style, positioned: PositionedContent) -> ObjectId {
        self.push_object(ObjectKind::Positioned(positioned), style)
    }

    pub fn push_line_break(&mut self, style: Style, clear: Clear) -> ObjectId {
        self.push_object(ObjectKind::LineBreak(clear), style)
    }

    /// Enters an inline element. Content pushed before the matching
    /// [`close_flow`](Self::close_flow) belongs to it.
    pub fn open_flow(&mut self, edge_start: f32, edge_end: f32) -> FlowId {
        let id = FlowId(self.flows.len() as u32);
        self.flows.push(InlineFlow {
            parent: self.current_parent(),
            edge_start,
            edge_end,
            first_leaf: None,
            last_leaf: None,
        });
        self.open_flows.push(id);
        self.open_marks.push(self.objects.len());
        id
    }

    /// Leaves the innermost inline element. An element that closed with no
    /// leaves becomes a stream object of its own so its edges still
    /// occupy space on a line.
    pub fn close_flow(&mut self, style: Style) {
        let flow_id = self.open_flows.pop().expect("unbalanced close_flow");
        let mark = self.open_marks.pop().expect("unbalanced close_flow");
        if self.objects.len() == mark {
            self.push_object(ObjectKind::InlineFlow(flow_id), style);
        }
    }

    /// Seals the stream, computing flow edge ownership.
    pub fn finish(mut self) -> InlineStream {
        debug_assert!(self.open_flows.is_empty(), "unbalanced open_flow");
        for index in 0..self.objects.len() {
            let object = &self.objects[index];
            // Out-of-flow content and zero-length text are invisible to
            // edge determination.
            let counts = match &object.kind {
                ObjectKind::Float(_) | ObjectKind::Positioned(_) => false,
                ObjectKind::Text(text) => !text.is_empty(),
                _ => true,
            };
            if !counts {
                continue;
            }
            let id = ObjectId(index as u32);
            let mut parent = object.parent;
            while let Some(flow_id) = parent {
                let flow = &mut self.flows[flow_id.index()];
                if flow.first_leaf.is_none() {
                    flow.first_leaf = Some(id);
                }
                flow.last_leaf = Some(id);
                parent = flow.parent;
            }
        }
        InlineStream {
            objects: self.objects,
            flows: self.flows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> Style {
        Style::default()
    }

    #[test]
    fn edges_apply_at_first_and_last_leaf() {
        let mut builder = InlineStream::builder();
        builder.push_text(style(), "before ");
        builder.open_flow(3., 5.);
        let first = builder.push_text(style(), "inner");
        let last = builder.push_text(style(), " tail");
        builder.close_flow(style());
        let stream = builder.finish();

        assert_eq!(stream.inline_logical_width(first, true, true), 3.);
        assert_eq!(stream.inline_logical_width(last, true, true), 5.);
        assert_eq!(stream.inline_logical_width(first, false, true), 0.);
    }

    #[test]
    fn empty_flow_becomes_stream_object() {
        let mut builder = InlineStream::builder();
        builder.open_flow(2., 2.);
        builder.close_flow(style());
        let stream = builder.finish();

        assert_eq!(stream.len(), 1);
        let object = stream.get(ObjectId(0));
        assert!(object.is_empty_inline());
        match object.kind {
            ObjectKind::InlineFlow(flow) => {
                assert!(stream.flow(flow).has_inline_direction_edges());
            }
            _ => unreachable!("expected an inline flow object"),
        }
    }

    #[test]
    fn nested_flows_share_single_leaf() {
        let mut builder = InlineStream::builder();
        builder.open_flow(1., 1.);
        builder.open_flow(10., 10.);
        let leaf = builder.push_text(style(), "x");
        builder.close_flow(style());
        builder.close_flow(style());
        let stream = builder.finish();

        assert_eq!(stream.inline_logical_width(leaf, true, true), 22.);
        assert_eq!(stream.ancestor_chain(leaf).len(), 2);
    }
}
