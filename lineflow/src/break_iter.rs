// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The breakability oracle.
//!
//! Finds the next legal soft-break opportunity in a text buffer. Plain
//! breakable spaces short-circuit everything; pairs of printable ASCII
//! characters are answered from a bit-packed table of precomputed,
//! locale-independent results; everything else falls back to the full
//! Unicode line-breaking algorithm provided by `icu_segmenter`.
//!
//! Queries are amortized O(1) per character through a monotonically
//! advancing `next_breakable` cache carried by the caller's position.

use icu_segmenter::options::{LineBreakOptions, LineBreakWordOption};
use icu_segmenter::{LineSegmenter, LineSegmenterBorrowed};

pub(crate) const SOFT_HYPHEN: char = '\u{00AD}';
pub(crate) const NO_BREAK_SPACE: char = '\u{00A0}';
pub(crate) const OBJECT_REPLACEMENT: char = '\u{FFFC}';

const IDEOGRAPHIC_COMMA: char = '\u{3001}';
const IDEOGRAPHIC_FULL_STOP: char = '\u{3002}';

/// Whether `ch` is a space the line breaker may always break at.
pub(crate) fn is_breakable_space(ch: char, treat_nbsp_as_break: bool) -> bool {
    matches!(ch, ' ' | '\n' | '\t') || (treat_nbsp_as_break && ch == NO_BREAK_SPACE)
}

const TABLE_FIRST: u8 = b'!';
const TABLE_LAST: u8 = b'~';
const TABLE_SIZE: usize = (TABLE_LAST - TABLE_FIRST + 1) as usize;
const TABLE_ROW_BYTES: usize = TABLE_SIZE.div_ceil(8);

fn in_ascii_table(ch: char) -> bool {
    (TABLE_FIRST as u32..=TABLE_LAST as u32).contains(&(ch as u32))
}

/// Pair classes for the printable ASCII range, after UAX #14.
#[derive(PartialEq)]
enum PairClass {
    Open,
    Close,
    Quote,
    Exclamation,
    Infix,
    Symbol,
    Prefix,
    Postfix,
    Numeric,
    Hyphen,
    Alpha,
}

const fn class_of(c: u8) -> PairClass {
    use PairClass::*;
    match c {
        b'(' | b'[' | b'{' => Open,
        b')' | b']' | b'}' => Close,
        b'"' | b'\'' => Quote,
        b'!' | b'?' => Exclamation,
        b',' | b'.' | b';' | b':' => Infix,
        b'/' => Symbol,
        b'$' | b'+' | b'\\' => Prefix,
        b'%' => Postfix,
        b'0'..=b'9' => Numeric,
        b'-' => Hyphen,
        _ => Alpha,
    }
}

const fn pair_breakable(a: u8, b: u8) -> bool {
    use PairClass::*;
    let ca = class_of(a);
    let cb = class_of(b);
    // No break before trailing or closing marks.
    if matches!(cb, Close | Exclamation | Infix | Symbol | Hyphen | Postfix) {
        return false;
    }
    // No break after an opening mark; quotes glue to both neighbors.
    if matches!(ca, Open) || matches!(ca, Quote) || matches!(cb, Quote) {
        return false;
    }
    // Keep words and numbers together, including numeric affixes such as
    // "$5", "3.14" and "-2".
    if matches!(ca, Alpha | Numeric) && matches!(cb, Alpha | Numeric) {
        return false;
    }
    if matches!(ca, Infix | Symbol | Hyphen) && matches!(cb, Numeric) {
        return false;
    }
    if matches!(ca, Prefix) && matches!(cb, Numeric | Alpha) {
        return false;
    }
    true
}

const fn build_pair_table() -> [[u8; TABLE_ROW_BYTES]; TABLE_SIZE] {
    let mut table = [[0_u8; TABLE_ROW_BYTES]; TABLE_SIZE];
    let mut a = 0;
    while a < TABLE_SIZE {
        let mut b = 0;
        while b < TABLE_SIZE {
            if pair_breakable(TABLE_FIRST + a as u8, TABLE_FIRST + b as u8) {
                table[a][b / 8] |= 1 << (b % 8);
            }
            b += 1;
        }
        a += 1;
    }
    table
}

static ASCII_PAIR_TABLE: [[u8; TABLE_ROW_BYTES]; TABLE_SIZE] = build_pair_table();

fn ascii_pair_breakable(a: char, b: char) -> bool {
    let row = (a as u32 - TABLE_FIRST as u32) as usize;
    let col = (b as u32 - TABLE_FIRST as u32) as usize;
    ASCII_PAIR_TABLE[row][col / 8] & (1 << (col % 8)) != 0
}

/// Break opportunities computed by the full Unicode algorithm for one text
/// buffer. Reset whenever the breaker moves to a different text object or
/// word-break mode.
#[derive(Default, Debug)]
pub struct TextBreakCache {
    breaks: Option<Vec<usize>>,
    keep_all: bool,
}

impl TextBreakCache {
    pub fn reset(&mut self) {
        self.breaks = None;
    }
}

/// The breakability oracle for one layout context.
pub struct BreakOracle {
    normal: LineSegmenterBorrowed<'static>,
    keep_all: LineSegmenterBorrowed<'static>,
}

impl core::fmt::Debug for BreakOracle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BreakOracle").finish_non_exhaustive()
    }
}

impl BreakOracle {
    pub fn new() -> Self {
        let mut keep_all_options = LineBreakOptions::default();
        keep_all_options.word_option = Some(LineBreakWordOption::KeepAll);
        Self {
            normal: LineSegmenter::new_auto(LineBreakOptions::default()),
            keep_all: LineSegmenter::new_auto(keep_all_options),
        }
    }

    /// Whether a break is legal immediately before byte `pos` of `text`.
    ///
    /// `next_breakable` is the caller's monotonic cache: while it stays at
    /// or ahead of `pos` no scan happens at all. `prior_context` supplies
    /// the character logically preceding the buffer, so boundaries at an
    /// object's first character still resolve.
    pub fn is_breakable(
        &self,
        text: &str,
        pos: usize,
        cache: &mut TextBreakCache,
        next_breakable: &mut Option<usize>,
        prior_context: Option<char>,
        treat_nbsp_as_break: bool,
        keep_all: bool,
    ) -> bool {
        match *next_breakable {
            Some(next) if next >= pos => next == pos,
            _ => {
                let next = self.next_breakable_position(
                    text,
                    pos,
                    cache,
                    prior_context,
                    treat_nbsp_as_break,
                    keep_all,
                );
                *next_breakable = Some(next);
                next == pos
            }
        }
    }

    /// Smallest byte index `>= pos` a break is legal before, or
    /// `text.len()` when the remainder is unbreakable.
    pub fn next_breakable_position(
        &self,
        text: &str,
        pos: usize,
        cache: &mut TextBreakCache,
        prior_context: Option<char>,
        treat_nbsp_as_break: bool,
        keep_all: bool,
    ) -> usize {
        let mut last = text[..pos].chars().next_back().or(prior_context);
        for (rel, ch) in text[pos..].char_indices() {
            let abs = pos + rel;
            if is_breakable_space(ch, treat_nbsp_as_break) {
                return abs;
            }
            if let Some(last_ch) = last {
                if is_breakable_space(last_ch, treat_nbsp_as_break) {
                    return abs;
                }
                // Always breakable after an ideographic comma or full
                // stop, independent of the general algorithm; this
                // papers over a known Unicode-version gap and must stay
                // explicit.
                if last_ch == IDEOGRAPHIC_COMMA || last_ch == IDEOGRAPHIC_FULL_STOP {
                    return abs;
                }
                if ch == NO_BREAK_SPACE || last_ch == NO_BREAK_SPACE {
                    // Non-breakable NBSP glues to both neighbors; nothing
                    // further to consult.
                } else if in_ascii_table(last_ch) && in_ascii_table(ch) {
                    if ascii_pair_breakable(last_ch, ch) {
                        return abs;
                    }
                } else if self.unicode_allows_break(text, abs, cache, keep_all) {
                    return abs;
                }
            }
            last = Some(ch);
        }
        text.len()
    }

    fn unicode_allows_break(
        &self,
        text: &str,
        pos: usize,
        cache: &mut TextBreakCache,
        keep_all: bool,
    ) -> bool {
        if cache.breaks.is_none() || cache.keep_all != keep_all {
            let segmenter = if keep_all { &self.keep_all } else { &self.normal };
            cache.breaks = Some(segmenter.segment_str(text).collect());
            cache.keep_all = keep_all;
        }
        cache
            .breaks
            .as_ref()
            .expect("just populated")
            .binary_search(&pos)
            .is_ok()
    }
}

impl Default for BreakOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next(oracle: &BreakOracle, text: &str, pos: usize) -> usize {
        let mut cache = TextBreakCache::default();
        oracle.next_breakable_position(text, pos, &mut cache, None, false, false)
    }

    #[test]
    fn breakable_at_and_after_space() {
        let oracle = BreakOracle::new();
        assert_eq!(next(&oracle, "foo bar", 0), 3);
        // The position right after a space is itself a boundary.
        assert_eq!(next(&oracle, "foo bar", 4), 4);
        // No boundary inside the trailing word.
        assert_eq!(next(&oracle, "foo bar", 5), 7);
    }

    #[test]
    fn ascii_pairs() {
        let oracle = BreakOracle::new();
        // After a hyphen, before a letter.
        assert_eq!(next(&oracle, "a-b", 0), 2);
        // Not inside a word, not before the hyphen.
        assert_eq!(next(&oracle, "ab-cd", 0), 3);
        // Not inside numbers or numeric affixes.
        assert_eq!(next(&oracle, "3.14", 0), 4);
        assert_eq!(next(&oracle, "$100", 0), 4);
        // Before an opening parenthesis, never after one.
        assert_eq!(next(&oracle, "ab(cd", 0), 2);
        assert_eq!(next(&oracle, "(cd", 0), 3);
        // After sentence-final punctuation.
        assert_eq!(next(&oracle, "a?b", 0), 2);
    }

    #[test]
    fn nbsp_policy() {
        let oracle = BreakOracle::new();
        let text = "a\u{00A0}b";
        let mut cache = TextBreakCache::default();
        assert_eq!(
            oracle.next_breakable_position(text, 0, &mut cache, None, false, false),
            text.len()
        );
        cache.reset();
        assert_eq!(
            oracle.next_breakable_position(text, 0, &mut cache, None, true, false),
            1
        );
    }

    #[test]
    fn ideographic_stops_always_break_after() {
        let oracle = BreakOracle::new();
        let text = "日\u{3001}本";
        let after_comma = '日'.len_utf8() + '\u{3001}'.len_utf8();
        assert_eq!(next(&oracle, text, after_comma), after_comma);
    }

    #[test]
    fn monotonic_cache_answers_without_rescan() {
        let oracle = BreakOracle::new();
        let text = "one two";
        let mut cache = TextBreakCache::default();
        let mut next_breakable = None;
        assert!(!oracle.is_breakable(text, 1, &mut cache, &mut next_breakable, None, false, false));
        assert_eq!(next_breakable, Some(3));
        // Later positions up to the cached answer resolve from the cache.
        assert!(!oracle.is_breakable(text, 2, &mut cache, &mut next_breakable, None, false, false));
        assert!(oracle.is_breakable(text, 3, &mut cache, &mut next_breakable, None, false, false));

        // Prior context makes an object's first character a boundary
        // when the previous object ended in a space.
        let mut cache = TextBreakCache::default();
        let mut next_breakable = None;
        assert!(oracle.is_breakable(
            "word",
            0,
            &mut cache,
            &mut next_breakable,
            Some(' '),
            false,
            false
        ));
    }
}
