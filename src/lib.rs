//! Rule-based morphological analysis.
//!
//! A [`Project`] bundles a symbol table, a stem [`Lexicon`] and a [`RuleSet`].
//! Analysing a word form runs two phases over it:
//!
//! ```text
//! "talossa" ── segmentation (allomorph rules + lexicon) ──▶ span lattice
//!                talo 0..4 [noun]    ssa 4..7 [suffix]
//!           ── saturation (combination rules + unification) ──▶ chart
//!                word 0..7 [class: noun, case: inessive]
//!           ── accepting nodes (whole input, accepted class) ──▶ Vec<ParseTree>
//! ```
//!
//! Finding no analysis is a normal outcome (an empty [`Analysis`]); only a
//! corrupt grammar, an unloaded project or an exhausted step budget produce an
//! [`AnalysisError`].

#[macro_use]
mod macros;
mod api;
mod avs;
mod engine;
mod error;
mod lexicon;
mod project;
mod rules;
mod symbols;


pub use api::{
    Analysis, ChartEntry, Options, ParseTree, RejectedAttempt, SearchChart, Session, analyze, analyze_with,
};
pub use avs::{Avs, AvsDisplay, MAX_DEPTH, Value, ValueDisplay, unify, unify_values};
pub use engine::{PassMetrics, RunMetrics, SaturationMetrics};
pub use error::{AnalysisError, IntegrityError, ProjectError, Result};
pub use lexicon::{LexEntry, Lexicon};
pub use project::{Project, ProjectBuilder};
pub use rules::{
    AllomorphOp, AllomorphRule, AnchoredRegex, CharClass, ClassMask, CombinationRule, CombineOp, RuleId, RuleSet,
    Segment, TagPattern, ValueSource,
};
pub use symbols::{Symbol, SymbolTable};

// --- Internal types ---------------------------------------------------------

/// A half-open range of character positions in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Start char index (inclusive).
    pub start: usize,
    /// End char index (exclusive).
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Index of a node in the [`Stash`].
pub(crate) type NodeId = usize;

/// How a chart node came to be.
#[derive(Debug, Clone)]
pub(crate) enum Origin {
    /// Leaf produced by an allomorph rule.
    Morph { rule: RuleId },
    /// Internal node produced by a combination rule over `children`.
    Combination { rule: RuleId, children: Vec<NodeId> },
}

/// A chart node: a span of the input with its class and structure.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub span: Span,
    pub tag: Symbol,
    pub avs: Avs,
    /// Morph boundaries strictly inside the derivation, sorted and unique.
    /// Two derivations with different boundaries are different analyses.
    pub cuts: Vec<usize>,
    pub origin: Origin,
}

// --- Stash: the chart of discovered nodes -----------------------------------

/// Discovered nodes, indexed by start position and memoised by [`NodeKey`].
///
/// Node ids are dense and assigned in discovery order, so iterating the stash
/// replays the search order.
///
/// [`NodeKey`]: engine::NodeKey
#[derive(Debug, Clone)]
pub(crate) struct Stash {
    nodes: Vec<Node>,
    by_start: Vec<Vec<NodeId>>,
    seen: rustc_hash::FxHashMap<engine::NodeKey, NodeId>,
}

impl Stash {
    /// Create an empty stash for an input of `len` chars.
    pub fn new(len: usize) -> Self {
        Stash { nodes: Vec::new(), by_start: vec![Vec::new(); len + 1], seen: Default::default() }
    }

    /// Insert `node` unless an equivalent node is already present.
    pub fn insert(&mut self, node: Node) -> Option<NodeId> {
        let key = engine::NodeKey::from_node(&node);
        if self.seen.contains_key(&key) {
            return None;
        }
        let id = self.nodes.len();
        self.by_start[node.span.start].push(id);
        self.seen.insert(key, id);
        self.nodes.push(node);
        Some(id)
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Nodes whose span starts at `position`, in discovery order.
    pub fn starting_at(&self, position: usize) -> &[NodeId] {
        self.by_start.get(position).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate()
    }
}
