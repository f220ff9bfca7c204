// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Inline line breaking and line box construction.
//!
//! Lineflow takes a block's stream of styled inline content (text runs,
//! replaced boxes, floats, positioned boxes, inline elements) and
//! partitions it into visual lines with exact pixel geometry: greedy
//! line breaking with whitespace collapsing, bidirectional reordering,
//! hyphenation, float interaction, horizontal alignment and incremental
//! relayout of unchanged lines.
//!
//! Shaping/measurement and hyphenation dictionaries are host services,
//! reached through the [`FontSource`] and [`Hyphenator`] traits.

mod bidi;
mod block;
mod boxes;
mod break_iter;
mod breaker;
mod content;
mod font;
mod geometry;
mod line_width;
mod measure;
mod midpoint;
mod position;
mod relayout;
mod style;
mod util;

#[cfg(test)]
mod tests;

pub use bidi::{BidiRun, BidiSnapshot};
pub use block::{BlockFlow, ContentWidths, LayoutContext};
pub use boxes::{
    BoxGeometry, EllipsisBox, FlowBox, InlineBoxNode, LineBreakPosition, LineFloat, LineGeometry,
    ReplacedBox, RootLineBox, TextBox,
};
pub use break_iter::{BreakOracle, TextBreakCache};
pub use breaker::{BreakerTextState, LineBreaker, LineInfo, WordMeasurement};
pub use content::{
    FloatContent, FlowId, InlineFlow, InlineObject, InlineStream, InlineStreamBuilder, ObjectId,
    ObjectKind, PositionedContent, ReplacedContent, ReplacedKind, TextContent,
};
pub use font::{
    FallbackFonts, FontHandle, FontId, FontMetrics, FontSource, GlyphOverflow, Hyphenator,
    NoHyphenation,
};
pub use geometry::{LogicalRect, PhysicalRect, WritingMode};
pub use line_width::{BlockGeometry, FloatEntry, FloatList, LineWidth};
pub use measure::TextMeasurer;
pub use midpoint::{Midpoint, MidpointState};
pub use position::InlinePosition;
pub use style::{
    BlockStyle, Clear, Direction, FloatSide, HyphenationLimits, Hyphens, NbspMode, OverflowWrap,
    Style, TextAlign, TextOverflow, WhiteSpace, WordBreak,
};
