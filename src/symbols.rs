//! Symbol interning.
//!
//! Attribute names, attribute values and morph-class tags are all interned
//! into one table so the engine compares them as integers. The table is
//! filled while a project is assembled and frozen afterwards.

use rustc_hash::FxHashMap;

/// Interned identifier for an attribute name, value or class tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Wrap a raw identifier, for loaders that read ids from a compiled blob.
    pub const fn new(id: u32) -> Self {
        Symbol(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bijective mapping between names and [`Symbol`]s.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    by_name: FxHashMap<Box<str>, Symbol>,
    names: Vec<Box<str>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the existing id if it is already known.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&sym) = self.by_name.get(name) {
            return sym;
        }

        let sym = Symbol(self.names.len() as u32);
        let boxed: Box<str> = name.into();
        self.by_name.insert(boxed.clone(), sym);
        self.names.push(boxed);
        sym
    }

    /// Look up a name without interning it.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.by_name.get(name).copied()
    }

    /// Name of `sym`, or `None` when the id is not part of this table.
    pub fn name(&self, sym: Symbol) -> Option<&str> {
        self.names.get(sym.index()).map(|s| s.as_ref())
    }

    pub fn contains(&self, sym: Symbol) -> bool {
        sym.index() < self.names.len()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Symbols in id order.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &str)> {
        self.names.iter().enumerate().map(|(i, name)| (Symbol(i as u32), name.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable_and_bijective() {
        let mut table = SymbolTable::new();
        let noun = table.intern("noun");
        let case = table.intern("case");

        assert_eq!(table.intern("noun"), noun);
        assert_ne!(noun, case);
        assert_eq!(table.name(noun), Some("noun"));
        assert_eq!(table.get("case"), Some(case));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn unknown_ids_are_not_contained() {
        let mut table = SymbolTable::new();
        table.intern("a");

        assert!(table.contains(Symbol::new(0)));
        assert!(!table.contains(Symbol::new(1)));
        assert_eq!(table.name(Symbol::new(7)), None);
        assert_eq!(table.get("b"), None);
    }

    #[test]
    fn iter_follows_insertion_order() {
        let mut table = SymbolTable::new();
        for name in ["x", "y", "z"] {
            table.intern(name);
        }
        let names: Vec<&str> = table.iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }
}
