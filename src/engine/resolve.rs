//! Result assembly.
//!
//! Saturation leaves a stash of `Node`s that refer to each other by id.
//! Resolution turns the interesting ones into owned, user-facing values:
//!
//! - [`accepting`]: nodes spanning the whole input whose class the grammar
//!   accepts, in discovery order.
//! - [`build_tree`]: a node and everything below it as a [`ParseTree`].
//! - [`build_chart`]: every node plus every rejected combination attempt as a
//!   [`SearchChart`], for inspection.
//!
//! ```text
//! stash: #0 talo[noun] 0..4   #1 word 0..4 (children: #0)
//!                                   │
//! accepting(len = 4) ──▶ [#1] ──▶ ParseTree word ── ParseTree noun "talo"
//! ```
//!
//! Results own their data; they stay valid after the project is dropped.

use super::parser::Rejection;
use super::vm::Input;
use crate::api::{ChartEntry, ParseTree, RejectedAttempt, SearchChart};
use crate::project::Project;
use crate::{Node, NodeId, Origin, Span, Stash};

/// Nodes covering `0..len` with an accepted class tag.
pub(crate) fn accepting(stash: &Stash, project: &Project, len: usize) -> Vec<NodeId> {
    stash
        .starting_at(0)
        .iter()
        .copied()
        .filter(|id| {
            let node = stash.get(*id);
            node.span.end == len && project.rules().accepts(node.tag)
        })
        .collect()
}

fn rule_name(project: &Project, node: &Node) -> String {
    match &node.origin {
        Origin::Morph { rule } => project.rules().allomorph[*rule].name.clone(),
        Origin::Combination { rule, .. } => project.rules().combination[*rule].name.clone(),
    }
}

fn children(node: &Node) -> &[NodeId] {
    match &node.origin {
        Origin::Morph { .. } => &[],
        Origin::Combination { children, .. } => children.as_slice(),
    }
}

/// Build the tree below `id`. Derivations are acyclic: a child is always
/// discovered before its parent.
pub(crate) fn build_tree(stash: &Stash, project: &Project, input: &Input<'_>, id: NodeId) -> ParseTree {
    let node = stash.get(id);
    ParseTree {
        node: id,
        span: node.span,
        tag: node.tag,
        avs: node.avs.clone(),
        rule: rule_name(project, node),
        surface: input.slice(node.span.start, node.span.end).to_string(),
        children: children(node).iter().map(|child| build_tree(stash, project, input, *child)).collect(),
    }
}

/// Every node of the stash plus every rejected attempt.
pub(crate) fn build_chart(
    stash: &Stash,
    project: &Project,
    input: &Input<'_>,
    accepting: &[NodeId],
    rejected: &[Rejection],
) -> SearchChart {
    let entries = stash
        .iter()
        .map(|(id, node)| ChartEntry {
            node: id,
            span: node.span,
            tag: node.tag,
            avs: node.avs.clone(),
            rule: rule_name(project, node),
            surface: input.slice(node.span.start, node.span.end).to_string(),
            children: children(node).to_vec(),
            accepting: accepting.contains(&id),
        })
        .collect();

    let rejected = rejected
        .iter()
        .map(|attempt| {
            let start = attempt.route.first().map_or(0, |id| stash.get(*id).span.start);
            let end = attempt.route.last().map_or(start, |id| stash.get(*id).span.end);
            RejectedAttempt {
                rule: project.rules().combination[attempt.rule].name.clone(),
                span: Span { start, end },
                children: attempt.route.clone(),
            }
        })
        .collect();

    SearchChart { entries, rejected }
}
