// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Positions within the inline content stream.

use crate::content::{InlineStream, ObjectId};

/// A cursor into the content stream: an object plus a byte offset within
/// it (always zero for non-text objects), carrying the breakability
/// oracle's monotonic cache.
///
/// Equality ignores the cache.
#[derive(Copy, Clone, Default, Debug)]
pub struct InlinePosition {
    pub object: Option<ObjectId>,
    pub offset: usize,
    pub next_breakable: Option<usize>,
}

impl PartialEq for InlinePosition {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object && self.offset == other.offset
    }
}

impl InlinePosition {
    pub fn new(object: Option<ObjectId>, offset: usize) -> Self {
        Self {
            object,
            offset,
            next_breakable: None,
        }
    }

    pub fn at_end(&self) -> bool {
        self.object.is_none()
    }

    pub fn move_to(&mut self, object: ObjectId, offset: usize, next_breakable: Option<usize>) {
        self.object = Some(object);
        self.offset = offset;
        self.next_breakable = next_breakable;
    }

    pub fn move_to_start_of(&mut self, object: Option<ObjectId>) {
        self.object = object;
        self.offset = 0;
        self.next_breakable = None;
    }

    pub fn clear(&mut self) {
        self.object = None;
        self.offset = 0;
        self.next_breakable = None;
    }

    /// Character at the cursor, for text objects.
    pub fn current_char(&self, stream: &InlineStream) -> Option<char> {
        let object = self.object?;
        stream.get(object).text().and_then(|t| {
            if self.offset < t.len() {
                t.char_at(self.offset)
            } else {
                None
            }
        })
    }

    /// Character immediately before the cursor within the same object.
    pub fn previous_char_in_same_node(&self, stream: &InlineStream) -> Option<char> {
        let object = self.object?;
        stream
            .get(object)
            .text()
            .and_then(|t| t.char_before(self.offset))
    }

    /// Advances by one character within a text object, or to the next
    /// stream object.
    pub fn increment(&mut self, stream: &InlineStream) {
        let Some(object) = self.object else {
            return;
        };
        if let Some(text) = stream.get(object).text() {
            if let Some(ch) = text.char_at(self.offset) {
                let next = self.offset + ch.len_utf8();
                if next < text.len() {
                    self.offset = next;
                    return;
                }
            }
        }
        self.move_to_start_of(stream.next(object));
    }

    /// Whether the cursor sits on a preserved newline.
    pub fn at_text_paragraph_separator(&self, stream: &InlineStream) -> bool {
        let Some(object) = self.object else {
            return false;
        };
        stream.get(object).style.preserve_newline() && self.current_char(stream) == Some('\n')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InlineStream;
    use crate::style::Style;

    #[test]
    fn increment_walks_characters_then_objects() {
        let mut builder = InlineStream::builder();
        let first = builder.push_text(Style::default(), "ab");
        let second = builder.push_text(Style::default(), "c");
        let stream = builder.finish();

        let mut pos = InlinePosition::new(Some(first), 0);
        assert_eq!(pos.current_char(&stream), Some('a'));
        pos.increment(&stream);
        assert_eq!(pos.current_char(&stream), Some('b'));
        pos.increment(&stream);
        assert_eq!(pos.object, Some(second));
        pos.increment(&stream);
        assert!(pos.at_end());
    }

    #[test]
    fn equality_ignores_breakable_cache() {
        let a = InlinePosition {
            object: Some(ObjectId(0)),
            offset: 3,
            next_breakable: Some(7),
        };
        let b = InlinePosition::new(Some(ObjectId(0)), 3);
        assert_eq!(a, b);
    }
}
