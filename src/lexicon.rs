//! Stem lexicon.
//!
//! Maps the orthographic form of a stem to the structures it can carry.
//! Allomorph rules consult it through the `Lookup` instruction; an unknown
//! stem is a normal outcome that simply yields no morph.

use crate::avs::Avs;
use crate::symbols::Symbol;
use rustc_hash::FxHashMap;

/// One reading of a stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexEntry {
    pub avs: Avs,
    /// Morph class of the stem.
    pub tag: Symbol,
}

#[derive(Debug, Default, Clone)]
pub struct Lexicon {
    entries: FxHashMap<Box<str>, Vec<LexEntry>>,
    /// Length in chars of the longest stem.
    longest: usize,
    count: usize,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reading for `stem`. Identical readings are stored once.
    pub fn insert(&mut self, stem: &str, avs: Avs, tag: Symbol) {
        let entry = LexEntry { avs, tag };
        let readings = self.entries.entry(stem.into()).or_default();
        if readings.contains(&entry) {
            return;
        }
        readings.push(entry);
        self.count += 1;
        self.longest = self.longest.max(stem.chars().count());
    }

    /// All readings of `stem`; empty when the stem is unknown.
    pub fn lookup(&self, stem: &str) -> &[LexEntry] {
        self.entries.get(stem).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, stem: &str) -> bool {
        self.entries.contains_key(stem)
    }

    /// Length in chars of the longest stem; no lookup of a longer capture can
    /// succeed.
    pub fn longest_stem(&self) -> usize {
        self.longest
    }

    /// Number of readings (not stems).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LexEntry)> {
        self.entries.iter().flat_map(|(stem, readings)| readings.iter().map(move |r| (stem.as_ref(), r)))
    }
}
