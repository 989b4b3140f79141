//! Attribute-value structures and unification.
//!
//! An [`Avs`] maps attribute symbols to [`Value`]s. Structures are immutable
//! and reference counted: unification builds a new structure and leaves its
//! inputs untouched, so a structure can be shared by any number of chart
//! nodes without copying.
//!
//! Attributes are kept sorted by symbol id. Two structures with the same
//! content therefore compare and hash equal no matter in which order their
//! attributes were written, and unification is a linear merge of two sorted
//! slices.
//!
//! ```text
//! [class: noun, case: nom]  ⊔  [case: nom, number: sg]  =  [class: noun, case: nom, number: sg]
//! [case: nom]               ⊔  [case: ine]              =  ⊥ (None)
//! ```

use crate::symbols::{Symbol, SymbolTable};
use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Maximum nesting depth of a structure built while analysing.
///
/// Compiled grammars never need anything close to this; reaching it means a
/// rule keeps wrapping its own output.
pub const MAX_DEPTH: usize = 64;

static EMPTY: Lazy<Avs> = Lazy::new(|| Avs(Arc::from(Vec::new())));

/// The value of an attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// An atomic, interned value such as `noun` or `nominative`.
    Symbol(Symbol),
    /// Literal text, usually captured from the input (a stem, a surface form).
    Text(Arc<str>),
    /// An ordered list of values.
    List(Arc<[Value]>),
    /// A nested structure.
    Avs(Avs),
}

impl Value {
    pub fn text(s: &str) -> Self {
        Value::Text(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(items.into())
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Value::Symbol(sym) => Some(*sym),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(&**items),
            _ => None,
        }
    }

    pub fn as_avs(&self) -> Option<&Avs> {
        match self {
            Value::Avs(avs) => Some(avs),
            _ => None,
        }
    }

    /// Nesting depth; atoms have depth 0.
    pub fn depth(&self) -> usize {
        match self {
            Value::Symbol(_) | Value::Text(_) => 0,
            Value::List(items) => 1 + items.iter().map(Value::depth).max().unwrap_or(0),
            Value::Avs(avs) => avs.depth(),
        }
    }

    fn collect_symbols(&self, out: &mut Vec<Symbol>) {
        match self {
            Value::Symbol(sym) => out.push(*sym),
            Value::Text(_) => {}
            Value::List(items) => items.iter().for_each(|v| v.collect_symbols(out)),
            Value::Avs(avs) => avs.collect_symbols(out),
        }
    }

    /// Render the value with names from `symbols`.
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> ValueDisplay<'a> {
        ValueDisplay { value: self, symbols }
    }
}

/// Immutable attribute-value structure.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Avs(Arc<[(Symbol, Value)]>);

impl Avs {
    /// The structure without attributes; the identity of unification.
    pub fn empty() -> Self {
        EMPTY.clone()
    }

    /// Build a structure from attribute/value pairs.
    ///
    /// Repeated attributes are unified with each other; `None` is returned
    /// when they conflict.
    pub fn from_pairs<I>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (Symbol, Value)>,
    {
        let mut sorted: Vec<(Symbol, Value)> = pairs.into_iter().collect();
        sorted.sort_by_key(|(attr, _)| *attr);

        let mut merged: Vec<(Symbol, Value)> = Vec::with_capacity(sorted.len());
        for (attr, value) in sorted {
            match merged.last_mut() {
                Some((last, prev)) if *last == attr => {
                    *prev = unify_values(prev, &value)?;
                }
                _ => merged.push((attr, value)),
            }
        }
        Some(Avs(merged.into()))
    }

    pub fn singleton(attr: Symbol, value: Value) -> Self {
        Avs(Arc::from(vec![(attr, value)]))
    }

    pub fn get(&self, attr: Symbol) -> Option<&Value> {
        self.0.binary_search_by_key(&attr, |(a, _)| *a).ok().map(|idx| &self.0[idx].1)
    }

    /// Attributes in symbol-id order.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Value)> + '_ {
        self.0.iter().map(|(attr, value)| (*attr, value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unify a single attribute into this structure.
    pub fn with(&self, attr: Symbol, value: Value) -> Option<Avs> {
        unify(self, &Avs::singleton(attr, value))
    }

    /// Nesting depth; the empty structure has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.0.iter().map(|(_, v)| v.depth()).max().unwrap_or(0)
    }

    /// Every symbol mentioned, attribute names and values alike.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut Vec<Symbol>) {
        for (attr, value) in self.0.iter() {
            out.push(*attr);
            value.collect_symbols(out);
        }
    }

    /// Render the structure with names from `symbols`.
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> AvsDisplay<'a> {
        AvsDisplay { avs: self, symbols }
    }
}

impl Default for Avs {
    fn default() -> Self {
        Avs::empty()
    }
}

impl fmt::Debug for Avs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Unify two structures.
///
/// Shared attributes must hold unifiable values; everything else is copied.
/// Returns `None` on conflict. The operation is commutative and associative.
pub fn unify(a: &Avs, b: &Avs) -> Option<Avs> {
    if Arc::ptr_eq(&a.0, &b.0) || b.is_empty() {
        return Some(a.clone());
    }
    if a.is_empty() {
        return Some(b.clone());
    }

    let (left, right) = (&a.0, &b.0);
    let mut out = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        let (la, lv) = &left[i];
        let (ra, rv) = &right[j];
        match la.cmp(ra) {
            Ordering::Less => {
                out.push((*la, lv.clone()));
                i += 1;
            }
            Ordering::Greater => {
                out.push((*ra, rv.clone()));
                j += 1;
            }
            Ordering::Equal => {
                out.push((*la, unify_values(lv, rv)?));
                i += 1;
                j += 1;
            }
        }
    }
    out.extend(left[i..].iter().cloned());
    out.extend(right[j..].iter().cloned());
    Some(Avs(out.into()))
}

/// Unify two values: atoms and texts by identity, lists element-wise,
/// structures recursively.
pub fn unify_values(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Symbol(x), Value::Symbol(y)) => (x == y).then(|| a.clone()),
        (Value::Text(x), Value::Text(y)) => (x == y).then(|| a.clone()),
        (Value::List(xs), Value::List(ys)) => {
            if xs.len() != ys.len() {
                return None;
            }
            if Arc::ptr_eq(xs, ys) {
                return Some(a.clone());
            }
            let items = xs.iter().zip(ys.iter()).map(|(x, y)| unify_values(x, y)).collect::<Option<Vec<_>>>()?;
            Some(Value::List(items.into()))
        }
        (Value::Avs(x), Value::Avs(y)) => unify(x, y).map(Value::Avs),
        _ => None,
    }
}

// --- Display ------------------------------------------------------------------

fn write_symbol(f: &mut fmt::Formatter<'_>, symbols: &SymbolTable, sym: Symbol) -> fmt::Result {
    match symbols.name(sym) {
        Some(name) => f.write_str(name),
        None => write!(f, "#{}", sym.as_u32()),
    }
}

/// [`Display`](fmt::Display) adapter returned by [`Avs::display`].
pub struct AvsDisplay<'a> {
    avs: &'a Avs,
    symbols: &'a SymbolTable,
}

impl fmt::Display for AvsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, (attr, value)) in self.avs.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write_symbol(f, self.symbols, attr)?;
            write!(f, ": {}", value.display(self.symbols))?;
        }
        f.write_str("]")
    }
}

/// [`Display`](fmt::Display) adapter returned by [`Value::display`].
pub struct ValueDisplay<'a> {
    value: &'a Value,
    symbols: &'a SymbolTable,
}

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Symbol(sym) => write_symbol(f, self.symbols, *sym),
            Value::Text(s) => write!(f, "{:?}", s.as_ref()),
            Value::List(items) => {
                f.write_str("<")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item.display(self.symbols))?;
                }
                f.write_str(">")
            }
            Value::Avs(avs) => write!(f, "{}", avs.display(self.symbols)),
        }
    }
}
