//! Trigger scanning (input pre-classification).
//!
//! Before segmentation the raw input is scanned once for coarse signals that
//! let the analyzer drop allomorph rules which cannot possibly match:
//!
//! - **Classes** (`ClassMask`): the union of the categories of every input
//!   character. A rule that must consume at least one character of a class
//!   nobody in the input belongs to is dead.
//! - **Characters**: the set of distinct input characters, used by the
//!   first-character index in `compiled_rules.rs`.
//! - **Literals**: a rule whose top-level literal does not occur anywhere in
//!   the input is dead too.
//!
//! The scan is a heuristic over-approximation: an active rule still has to
//! match its whole program at a concrete position.

use crate::rules::ClassMask;
use rustc_hash::FxHashSet;

/// Input characteristics detected from the raw input.
#[derive(Debug, Clone)]
pub(crate) struct TriggerInfo<'a> {
    text: &'a str,
    pub classes: ClassMask,
    pub chars: FxHashSet<char>,
}

impl<'a> TriggerInfo<'a> {
    pub fn scan(text: &'a str) -> Self {
        let mut classes = ClassMask::empty();
        let mut chars = FxHashSet::default();
        for c in text.chars() {
            if chars.insert(c) {
                classes |= ClassMask::of(c);
            }
        }
        TriggerInfo { text, classes, chars }
    }

    /// Whether `literal` occurs somewhere in the input.
    pub fn contains_literal(&self, literal: &str) -> bool {
        self.text.contains(literal)
    }

    /// Whether some input character belongs to a category of `mask`.
    pub fn has_class(&self, mask: ClassMask) -> bool {
        self.classes.intersects(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_collects_classes_and_chars() {
        let info = TriggerInfo::scan("Talo7");
        assert!(info.has_class(ClassMask::UPPERCASE));
        assert!(info.has_class(ClassMask::NUMERIC));
        assert!(!info.has_class(ClassMask::WHITESPACE));
        assert!(info.chars.contains(&'7'));
        assert_eq!(info.chars.len(), 5);
    }

    #[test]
    fn literals_are_matched_case_sensitively() {
        let info = TriggerInfo::scan("talossa");
        assert!(info.contains_literal("ssa"));
        assert!(!info.contains_literal("SSA"));
    }

    #[test]
    fn empty_input_has_no_signals() {
        let info = TriggerInfo::scan("");
        assert!(info.classes.is_empty());
        assert!(info.chars.is_empty());
        assert!(info.contains_literal(""));
    }
}
