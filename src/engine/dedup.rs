//! Deduplication keys for saturation.
//!
//! Saturation repeatedly applies combination rules and adds the produced
//! `Node`s to the stash. Without stable memo keys the engine could loop
//! forever on reflexive or mutually recursive rules and grow without bound.
//!
//! Two keys are used:
//!
//! - [`NodeKey`]: what counts as "the same node". Span, class tag, structure
//!   and the set of internal morph boundaries. The boundaries keep distinct
//!   segmentations of the same span apart (`talo` vs `ta+lo`) while identical
//!   sub-parses reached through different rules collapse into one node.
//! - [`AttemptKey`]: what counts as "the same rule application". A rule id
//!   plus the ordered ids of the child nodes. Node ids are canonical for their
//!   `NodeKey`, so this is the (span, rule, input-structure) tuple in compact
//!   form. An attempt is made at most once per analysis.
//!
//! ```text
//! noun 0..4 [class: noun]  ──(noun -> noun)──▶ noun 0..4 [class: noun]
//!                                               └─ same NodeKey, dropped
//! ```

use crate::avs::Avs;
use crate::rules::RuleId;
use crate::symbols::Symbol;
use crate::{Node, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct NodeKey {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) tag: Symbol,
    pub(crate) avs: Avs,
    pub(crate) cuts: Vec<usize>,
}

impl NodeKey {
    pub(crate) fn from_node(node: &Node) -> Self {
        NodeKey {
            start: node.span.start,
            end: node.span.end,
            tag: node.tag,
            avs: node.avs.clone(),
            cuts: node.cuts.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct AttemptKey {
    pub(crate) rule: RuleId,
    pub(crate) route: Vec<NodeId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Origin, Span};
    use rustc_hash::FxHashSet;

    fn node(start: usize, end: usize, cuts: Vec<usize>, rule: RuleId) -> Node {
        Node {
            span: Span { start, end },
            tag: Symbol::new(1),
            avs: Avs::singleton(Symbol::new(2), crate::Value::Symbol(Symbol::new(3))),
            cuts,
            origin: Origin::Morph { rule },
        }
    }

    #[test]
    fn origin_does_not_distinguish_nodes() {
        assert_eq!(NodeKey::from_node(&node(0, 4, vec![], 0)), NodeKey::from_node(&node(0, 4, vec![], 7)));
    }

    #[test]
    fn boundaries_distinguish_nodes() {
        assert_ne!(NodeKey::from_node(&node(0, 4, vec![], 0)), NodeKey::from_node(&node(0, 4, vec![2], 0)));
    }

    #[test]
    fn attempts_are_keyed_by_rule_and_route() {
        let mut seen = FxHashSet::default();
        assert!(seen.insert(AttemptKey { rule: 0, route: vec![1, 2] }));
        assert!(!seen.insert(AttemptKey { rule: 0, route: vec![1, 2] }));
        assert!(seen.insert(AttemptKey { rule: 0, route: vec![2, 1] }));
        assert!(seen.insert(AttemptKey { rule: 1, route: vec![1, 2] }));
    }
}
