// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Computed style inputs.
//!
//! The engine consumes already-resolved style values; the cascade that
//! produces them belongs to the embedder. Only the properties the line
//! breaker and line box construction actually consult are modeled.

use crate::font::FontHandle;
use crate::geometry::WritingMode;

/// The CSS `white-space` property.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum WhiteSpace {
    #[default]
    Normal,
    Nowrap,
    Pre,
    PreWrap,
    PreLine,
}

impl WhiteSpace {
    /// Whether runs of collapsible whitespace collapse to a single space.
    pub fn collapses(self) -> bool {
        matches!(self, Self::Normal | Self::Nowrap | Self::PreLine)
    }

    /// Whether soft wrapping is allowed.
    pub fn auto_wrap(self) -> bool {
        matches!(self, Self::Normal | Self::PreWrap | Self::PreLine)
    }

    /// Whether `\n` forces a line break.
    pub fn preserves_newline(self) -> bool {
        matches!(self, Self::Pre | Self::PreWrap | Self::PreLine)
    }
}

/// The CSS `word-break` property.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum WordBreak {
    #[default]
    Normal,
    BreakAll,
    KeepAll,
}

/// The CSS `overflow-wrap` property.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum OverflowWrap {
    #[default]
    Normal,
    BreakWord,
}

/// Policy for treating U+00A0 NO-BREAK SPACE as a breakable space.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum NbspMode {
    /// NBSP neither breaks nor collapses.
    #[default]
    Normal,
    /// NBSP behaves like an ordinary space for wrapping and collapsing.
    Space,
}

/// The CSS `hyphens` property.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum Hyphens {
    None,
    /// Only soft hyphens (U+00AD) hyphenate.
    #[default]
    Manual,
    /// The hyphenation dictionary service may also be consulted.
    Auto,
}

/// Limits for automatic hyphenation. Negative values mean `auto`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct HyphenationLimits {
    /// Minimum characters before the hyphen.
    pub before: i32,
    /// Minimum characters after the hyphen.
    pub after: i32,
    /// Maximum consecutive hyphenated lines.
    pub lines: i32,
}

impl Default for HyphenationLimits {
    fn default() -> Self {
        Self {
            before: -1,
            after: -1,
            lines: -1,
        }
    }
}

/// The CSS `text-align` property.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum TextAlign {
    Left,
    Right,
    Center,
    Justify,
    #[default]
    Start,
    End,
}

/// Inline base direction.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl Direction {
    pub fn is_ltr(self) -> bool {
        self == Self::Ltr
    }
}

/// The CSS `clear` property, carried by explicit line breaks.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum Clear {
    #[default]
    None,
    Left,
    Right,
    Both,
}

/// Which side a float is pulled to.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FloatSide {
    Left,
    Right,
}

/// The CSS `text-overflow` property on the block.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum TextOverflow {
    #[default]
    Clip,
    Ellipsis,
}

/// Resolved style for one inline content object.
#[derive(Clone, PartialEq, Debug)]
pub struct Style {
    pub white_space: WhiteSpace,
    pub word_break: WordBreak,
    pub overflow_wrap: OverflowWrap,
    pub nbsp_mode: NbspMode,
    pub hyphens: Hyphens,
    pub hyphenation_limits: HyphenationLimits,
    /// BCP 47 language tag for the hyphenation dictionary.
    pub locale: Option<String>,
    pub direction: Direction,
    pub font: FontHandle,
    /// Extra advance added at each space boundary.
    pub word_spacing: f32,
    /// Tab stop interval in space-advance units.
    pub tab_size: u32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            white_space: WhiteSpace::default(),
            word_break: WordBreak::default(),
            overflow_wrap: OverflowWrap::default(),
            nbsp_mode: NbspMode::default(),
            hyphens: Hyphens::default(),
            hyphenation_limits: HyphenationLimits::default(),
            locale: None,
            direction: Direction::default(),
            font: FontHandle::default(),
            word_spacing: 0.,
            tab_size: 8,
        }
    }
}

impl Style {
    pub fn collapse_white_space(&self) -> bool {
        self.white_space.collapses()
    }

    pub fn auto_wrap(&self) -> bool {
        self.white_space.auto_wrap()
    }

    pub fn preserve_newline(&self) -> bool {
        self.white_space.preserves_newline()
    }

    /// Under `pre-wrap`, breaks may only occur after whitespace.
    pub fn break_only_after_white_space(&self) -> bool {
        self.white_space == WhiteSpace::PreWrap
    }

    /// Whether soft wrapping may split inside a word when a whole word
    /// cannot start a line.
    pub fn break_words(&self) -> bool {
        self.overflow_wrap == OverflowWrap::BreakWord
    }

    /// Whether `ch` collapses under this style's whitespace policy.
    pub fn is_collapsible_white_space(&self, ch: char) -> bool {
        match ch {
            ' ' | '\t' | '\u{00AD}' => true,
            '\n' => !self.preserve_newline(),
            '\u{00A0}' => self.nbsp_mode == NbspMode::Space,
            _ => false,
        }
    }
}

/// Resolved style for the block whose inline content is being laid out.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct BlockStyle {
    /// Style inherited by content that carries none of its own; also the
    /// source of the block-level whitespace mode consulted by replaced
    /// children.
    pub style: Style,
    pub text_align: TextAlign,
    pub text_overflow: TextOverflow,
    pub writing_mode: WritingMode,
    /// Whether images may be broken before/after. Off reproduces the
    /// legacy table-cell quirk.
    pub allow_images_to_break: bool,
}

impl BlockStyle {
    pub fn new(style: Style) -> Self {
        Self {
            style,
            text_align: TextAlign::default(),
            text_overflow: TextOverflow::default(),
            writing_mode: WritingMode::default(),
            allow_images_to_break: true,
        }
    }

    pub fn is_ltr(&self) -> bool {
        self.style.direction.is_ltr()
    }
}
