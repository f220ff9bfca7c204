// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Horizontal alignment of a finalized line.
//!
//! Once every run's width is known, the line's start position and the
//! trailing-space run's width are adjusted per `text-align`, and for
//! justified lines the slack is distributed across the expansion
//! opportunities inside collapsible text runs.

use crate::content::ObjectId;
use crate::style::{BlockStyle, TextAlign};

/// Flat, visual-order placement record for one run on a line; the box
/// tree is assembled from these after alignment.
#[derive(Clone, Debug)]
pub(crate) struct RunBox {
    pub object: ObjectId,
    /// Byte range for text runs.
    pub start: usize,
    pub stop: usize,
    pub bidi_level: u8,
    pub is_text: bool,
    pub has_hyphen: bool,
    /// Whether the run's style collapses whitespace (justification only
    /// expands collapsible runs).
    pub collapses_white_space: bool,
    pub width: f32,
    pub expansion_opportunities: u32,
    pub expansion: f32,
    /// Inline-start position, filled in by placement.
    pub logical_left: f32,
}

/// The alignment actually applied to a line: justify demotes to start
/// when the line ends in a hard break or is the last line.
pub(crate) fn text_align_for_line(style: &BlockStyle, ends_with_soft_break: bool) -> TextAlign {
    if !ends_with_soft_break && style.text_align == TextAlign::Justify {
        TextAlign::Start
    } else {
        style.text_align
    }
}

fn trailing_width(boxes: &[RunBox], trailing: Option<usize>) -> Option<f32> {
    trailing.map(|index| boxes[index].width)
}

fn set_trailing_width(boxes: &mut [RunBox], trailing: Option<usize>, width: f32) {
    if let Some(index) = trailing {
        boxes[index].width = width;
    }
}

fn update_for_left_aligned(
    is_ltr: bool,
    boxes: &mut [RunBox],
    trailing: Option<usize>,
    logical_left: &mut f32,
    total_logical_width: &mut f32,
    available_logical_width: f32,
) {
    if is_ltr {
        // Overflow is absorbed by the invisible trailing space, so the
        // spill is never visible content.
        if *total_logical_width > available_logical_width {
            if let Some(width) = trailing_width(boxes, trailing) {
                let shrunk = (width - *total_logical_width + available_logical_width).max(0.);
                set_trailing_width(boxes, trailing, shrunk);
            }
        }
        return;
    }
    // RTL blocks spill to the left instead.
    if trailing.is_some() {
        set_trailing_width(boxes, trailing, 0.);
    } else if *total_logical_width > available_logical_width {
        *logical_left -= *total_logical_width - available_logical_width;
    }
}

fn update_for_right_aligned(
    is_ltr: bool,
    boxes: &mut [RunBox],
    trailing: Option<usize>,
    logical_left: &mut f32,
    total_logical_width: &mut f32,
    available_logical_width: f32,
) {
    if is_ltr {
        if let Some(width) = trailing_width(boxes, trailing) {
            // Trailing space is not rendered at the right edge.
            *total_logical_width -= width;
            set_trailing_width(boxes, trailing, 0.);
        }
        if *total_logical_width < available_logical_width {
            *logical_left += available_logical_width - *total_logical_width;
        }
        return;
    }
    if *total_logical_width > available_logical_width && trailing.is_some() {
        let width = trailing_width(boxes, trailing).expect("checked");
        let shrunk = (width - *total_logical_width + available_logical_width).max(0.);
        set_trailing_width(boxes, trailing, shrunk);
        *total_logical_width -= shrunk;
    } else {
        *logical_left += available_logical_width - *total_logical_width;
    }
}

fn update_for_center_aligned(
    is_ltr: bool,
    boxes: &mut [RunBox],
    trailing: Option<usize>,
    logical_left: &mut f32,
    total_logical_width: &mut f32,
    available_logical_width: f32,
) {
    let mut trailing_space_width = 0.;
    if let Some(width) = trailing_width(boxes, trailing) {
        *total_logical_width -= width;
        // The trailing space keeps at most half the slack, never less
        // than nothing.
        trailing_space_width =
            width.min((available_logical_width - *total_logical_width + 1.) / 2.);
        set_trailing_width(boxes, trailing, trailing_space_width.max(0.));
    }
    if is_ltr {
        *logical_left += ((available_logical_width - *total_logical_width) / 2.).max(0.);
    } else {
        *logical_left += if *total_logical_width > available_logical_width {
            available_logical_width - *total_logical_width
        } else {
            (available_logical_width - *total_logical_width) / 2. - trailing_space_width
        };
    }
}

/// Applies `text-align` to the line's start position, trailing-space run
/// and total width. Justification itself happens afterwards in
/// [`compute_expansion_for_justified_text`].
pub(crate) fn update_width_for_alignment(
    style: &BlockStyle,
    text_align: TextAlign,
    boxes: &mut [RunBox],
    trailing: Option<usize>,
    logical_left: &mut f32,
    total_logical_width: &mut f32,
    available_logical_width: f32,
    expansion_opportunity_count: u32,
) {
    let is_ltr = style.is_ltr();
    match text_align {
        TextAlign::Left => update_for_left_aligned(
            is_ltr,
            boxes,
            trailing,
            logical_left,
            total_logical_width,
            available_logical_width,
        ),
        TextAlign::Right => update_for_right_aligned(
            is_ltr,
            boxes,
            trailing,
            logical_left,
            total_logical_width,
            available_logical_width,
        ),
        TextAlign::Center => update_for_center_aligned(
            is_ltr,
            boxes,
            trailing,
            logical_left,
            total_logical_width,
            available_logical_width,
        ),
        TextAlign::Justify if expansion_opportunity_count > 0 => {
            if let Some(width) = trailing_width(boxes, trailing) {
                *total_logical_width -= width;
                set_trailing_width(boxes, trailing, 0.);
            }
        }
        TextAlign::Justify | TextAlign::Start => {
            if is_ltr {
                update_for_left_aligned(
                    is_ltr,
                    boxes,
                    trailing,
                    logical_left,
                    total_logical_width,
                    available_logical_width,
                );
            } else {
                update_for_right_aligned(
                    is_ltr,
                    boxes,
                    trailing,
                    logical_left,
                    total_logical_width,
                    available_logical_width,
                );
            }
        }
        TextAlign::End => {
            if is_ltr {
                update_for_right_aligned(
                    is_ltr,
                    boxes,
                    trailing,
                    logical_left,
                    total_logical_width,
                    available_logical_width,
                );
            } else {
                update_for_left_aligned(
                    is_ltr,
                    boxes,
                    trailing,
                    logical_left,
                    total_logical_width,
                    available_logical_width,
                );
            }
        }
    }
}

/// Distributes justification slack across the expansion opportunities of
/// collapsible text runs, proportionally to each run's share. The
/// visually-last opportunity absorbs the arithmetic remainder so the
/// expansions always sum to the slack exactly.
pub(crate) fn compute_expansion_for_justified_text(
    boxes: &mut [RunBox],
    trailing: Option<usize>,
    expansion_opportunity_count: u32,
    total_logical_width: &mut f32,
    available_logical_width: f32,
) {
    if expansion_opportunity_count == 0 || available_logical_width <= *total_logical_width {
        return;
    }
    let slack = available_logical_width - *total_logical_width;
    let last_contributing = boxes.iter().enumerate().rev().find_map(|(index, run)| {
        (Some(index) != trailing
            && run.is_text
            && run.collapses_white_space
            && run.expansion_opportunities > 0)
            .then_some(index)
    });
    let mut distributed = 0.;
    for index in 0..boxes.len() {
        if Some(index) == trailing {
            continue;
        }
        let run = &mut boxes[index];
        if !run.is_text || run.expansion_opportunities == 0 || !run.collapses_white_space {
            continue;
        }
        let expansion = if Some(index) == last_contributing {
            slack - distributed
        } else {
            slack * run.expansion_opportunities as f32 / expansion_opportunity_count as f32
        };
        run.expansion = expansion;
        distributed += expansion;
        *total_logical_width += expansion;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{BlockStyle, Direction, Style};

    fn run(width: f32, opportunities: u32) -> RunBox {
        RunBox {
            object: ObjectId(0),
            start: 0,
            stop: 0,
            bidi_level: 0,
            is_text: true,
            has_hyphen: false,
            collapses_white_space: true,
            width,
            expansion_opportunities: opportunities,
            expansion: 0.,
            logical_left: 0.,
        }
    }

    fn ltr_style() -> BlockStyle {
        BlockStyle::new(Style::default())
    }

    fn rtl_style() -> BlockStyle {
        let mut style = BlockStyle::new(Style {
            direction: Direction::Rtl,
            ..Style::default()
        });
        style.text_align = TextAlign::Start;
        style
    }

    #[test]
    fn right_alignment_zeroes_trailing_space_and_shifts() {
        let style = ltr_style();
        let mut boxes = vec![run(140., 0), run(10., 0)];
        let mut left = 0.;
        let mut total = 150.;
        update_width_for_alignment(
            &style,
            TextAlign::Right,
            &mut boxes,
            Some(1),
            &mut left,
            &mut total,
            200.,
            0,
        );
        assert_eq!(boxes[1].width, 0.);
        assert_eq!(total, 140.);
        assert_eq!(left, 60.);
    }

    #[test]
    fn left_alignment_absorbs_overflow_into_trailing_space() {
        let style = ltr_style();
        let mut boxes = vec![run(195., 0), run(10., 0)];
        let mut left = 0.;
        let mut total = 205.;
        update_width_for_alignment(
            &style,
            TextAlign::Left,
            &mut boxes,
            Some(1),
            &mut left,
            &mut total,
            200.,
            0,
        );
        assert_eq!(boxes[1].width, 5.);
        assert_eq!(left, 0.);
    }

    #[test]
    fn rtl_start_spills_to_the_left() {
        let style = rtl_style();
        let mut boxes = vec![run(230., 0)];
        let mut left = 0.;
        let mut total = 230.;
        update_width_for_alignment(
            &style,
            TextAlign::Start,
            &mut boxes,
            None,
            &mut left,
            &mut total,
            200.,
            0,
        );
        assert_eq!(left, -30.);
    }

    #[test]
    fn justify_expansions_sum_to_slack_exactly() {
        let style = ltr_style();
        let mut boxes = vec![run(50., 2), run(60., 3), run(40., 5)];
        let mut total = 150.;
        let mut left = 0.;
        update_width_for_alignment(
            &style,
            TextAlign::Justify,
            &mut boxes,
            None,
            &mut left,
            &mut total,
            200.,
            10,
        );
        compute_expansion_for_justified_text(&mut boxes, None, 10, &mut total, 200.);
        assert_eq!(boxes[0].expansion, 10.);
        assert_eq!(boxes[1].expansion, 15.);
        // The visually-last opportunity absorbs the remainder.
        assert_eq!(boxes[2].expansion, 25.);
        let sum: f32 = boxes.iter().map(|b| b.expansion).sum();
        assert_eq!(sum, 50.);
        assert_eq!(total, 200.);
    }

    #[test]
    fn center_splits_slack_evenly() {
        let style = ltr_style();
        let mut boxes = vec![run(100., 0)];
        let mut left = 0.;
        let mut total = 100.;
        update_width_for_alignment(
            &style,
            TextAlign::Center,
            &mut boxes,
            None,
            &mut left,
            &mut total,
            200.,
            0,
        );
        assert_eq!(left, 50.);
    }
}
