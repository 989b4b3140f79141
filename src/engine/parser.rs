//! Segmentation and saturation.
//!
//! This module is the operational core of the engine:
//!
//! - Select the allomorph rules that are plausible for the input (literal and
//!   class gating; see `compiled_rules.rs` and `trigger.rs`).
//! - Segment the input: run allomorph programs at every reachable position
//!   and put the morphs into a `Stash` as leaves.
//! - Saturate: repeatedly apply combination rules to sequences of adjacent
//!   nodes until a pass adds nothing (a fixpoint).
//! - Hand the accepting nodes to `resolve.rs`.
//!
//! ## Key concepts
//!
//! - **Node** (`crate::Node`): a span of the input with a class tag, a
//!   structure, its internal morph boundaries and how it was derived.
//! - **Stash** (`crate::Stash`): the growing chart of discovered nodes.
//!   Equivalent nodes are stored once (see `dedup.rs`).
//! - **Route**: the node ids matched by a combination pattern so far.
//!
//! ## Pass structure
//!
//! ```text
//! (0) trigger scan        -> active allomorph rules
//! (1) segmentation        -> leaves at every reachable position
//! (2) saturation passes   -> combination rules over the whole chart, repeated
//!                            until a pass produces no new node
//! (3) resolve             -> accepting nodes as ParseTrees (+ chart)
//! ```
//!
//! Nodes discovered during a pass are only added to the stash after the pass,
//! so each pass sees a fixed chart and the output is deterministic given the
//! same project and input.
//!
//! ## Termination
//!
//! A (rule, route) pair is attempted at most once; node ids are canonical for
//! their `NodeKey`, so re-deriving an existing node yields no new routes. Each
//! pass only enumerates routes through at least one node added by the previous
//! pass (semi-naive evaluation); older routes were all tried before. The
//! only way to grow the chart forever is to keep growing structures, which the
//! nesting limit turns into an integrity error. The step budget bounds
//! everything else.

use super::budget::Budget;
use super::dedup::AttemptKey;
use super::metrics::{PassMetrics, RunMetrics, RunResult, SaturationMetrics};
use super::resolve;
use super::trigger::TriggerInfo;
use super::vm::{self, Input};
use crate::api::Options;
use crate::avs::{Avs, MAX_DEPTH, Value, unify, unify_values};
use crate::error::{AnalysisError, IntegrityError};
use crate::project::Project;
use crate::rules::{CombinationRule, CombineOp, RuleId, TagPattern};
use crate::{Node, NodeId, Origin, Span, Stash};
use log::{debug, trace};
use rustc_hash::FxHashSet;
use std::time::Instant;

/// A combination rule partially matched against the chart.
///
/// ```text
/// pattern: [Tag(noun), Tag(case_suffix)]
///                      ^ next_idx once the noun is consumed
///
/// route:    [ #3 noun 0..4 ]
/// position: 4 (end of the last consumed node)
/// ```
struct PartialMatch<'a> {
    rule: RuleId,
    pattern: &'a [TagPattern],
    next_idx: usize,
    position: usize,
    route: Vec<NodeId>,
    /// Whether the route contains a node from the last pass.
    fresh: bool,
}

/// A combination attempt whose structures did not unify.
#[derive(Debug, Clone)]
pub(crate) struct Rejection {
    pub rule: RuleId,
    pub route: Vec<NodeId>,
}

/// Analyzes one input against a project.
///
/// ```text
/// new() -> segment() -> saturate() -> resolve
///            │             └─ repeatedly grow the stash with combination rules
///            └─ allomorph rules at reachable positions
/// ```
#[derive(Debug)]
pub(crate) struct Analyzer<'a> {
    project: &'a Project,
    input: Input<'a>,
    /// Chart of discovered nodes.
    stash: Stash,
    /// Combination attempts already made.
    attempted: FxHashSet<AttemptKey>,
    /// First node id added by the last pass; every node at or above it is new.
    frontier: NodeId,
    /// Allomorph rules that survived gating, by rule id.
    active: Vec<bool>,
    budget: Budget,
    /// Whether rejected attempts and the full chart are kept.
    retain: bool,
    rejected: Vec<Rejection>,
}

impl<'a> Analyzer<'a> {
    pub fn new(project: &'a Project, text: &'a str, options: &Options) -> Self {
        let trigger = TriggerInfo::scan(text);
        let active = project.compiled().activate(&trigger);
        debug!(
            "[trigger_scan] classes={:?} chars={} active={}/{} allomorph rules",
            trigger.classes,
            trigger.chars.len(),
            active.iter().filter(|a| **a).count(),
            active.len()
        );

        let input = Input::new(text);
        Analyzer {
            project,
            stash: Stash::new(input.len()),
            input,
            attempted: FxHashSet::default(),
            frontier: 0,
            active,
            budget: Budget::new(options.step_budget),
            retain: options.retain_search_tree,
            rejected: Vec::new(),
        }
    }

    /// Run the active allomorph rules at position 0 and at every position a
    /// morph ends at, including the end of the input.
    fn segment(&mut self) -> Result<PassMetrics, AnalysisError> {
        let start = Instant::now();
        let project = self.project;
        let mut pass = PassMetrics::default();
        let len = self.input.len();
        let mut reachable = vec![false; len + 1];
        reachable[0] = true;

        for position in 0..=len {
            if !reachable[position] {
                continue;
            }
            for id in project.compiled().allomorph_candidates(self.input.char_at(position), &self.active) {
                self.budget.tick()?;
                pass.attempts += 1;
                let rule = &project.rules().allomorph[id];
                let morphs = vm::run(rule, &self.input, position, project.lexicon(), &mut self.budget)?;
                for morph in morphs {
                    let span = Span { start: position, end: morph.end };
                    let node =
                        Node { span, tag: morph.tag, avs: morph.avs, cuts: Vec::new(), origin: Origin::Morph { rule: id } };
                    if let Some(node_id) = self.stash.insert(node) {
                        pass.produced += 1;
                        reachable[span.end] = true;
                        trace!(
                            "[segment] #{node_id} rule=\"{}\" span={}..{} text={:?}",
                            rule.name,
                            span.start,
                            span.end,
                            self.input.slice(span.start, span.end)
                        );
                    }
                }
            }
        }

        pass.duration = start.elapsed();
        debug!("[segment] {} morphs from {} rule runs in {:?}", pass.produced, pass.attempts, pass.duration);
        Ok(pass)
    }

    /// Nodes starting exactly at `position` whose tag `pat` accepts.
    fn lookup_item(&self, pat: &TagPattern, position: usize) -> Vec<NodeId> {
        self.stash.starting_at(position).iter().copied().filter(|id| pat.matches(self.stash.get(*id).tag)).collect()
    }

    /// Start a `PartialMatch` for every (node, rule) pair where the node
    /// satisfies the rule's first pattern element. A single-element pattern
    /// is only seeded from new nodes.
    fn seed_first_pattern(&self) -> Vec<PartialMatch<'a>> {
        let project = self.project;
        let mut seeds = Vec::new();
        for (node_id, node) in self.stash.iter() {
            let fresh = node_id >= self.frontier;
            for rule in project.compiled().combination_candidates(node.tag) {
                let pattern = project.rules().combination[rule].pattern.as_slice();
                if (fresh || pattern.len() > 1) && pattern.first().is_some_and(|first| first.matches(node.tag)) {
                    let route = vec![node_id];
                    seeds.push(PartialMatch { rule, pattern, next_idx: 1, position: node.span.end, route, fresh });
                }
            }
        }
        seeds
    }

    /// Depth-first expansion of partial matches until their whole pattern is
    /// matched, with an explicit stack instead of recursion.
    ///
    /// ```text
    /// [#3 noun] --case_suffix @4--> [#3, #5] complete
    ///     └─ no node @4 matches ──▶ dropped
    /// ```
    fn match_all(&self, seeds: Vec<PartialMatch<'a>>) -> Vec<PartialMatch<'a>> {
        let mut results = Vec::new();
        let mut stack = seeds;
        // Seeds are in discovery order; reverse so they are expanded in that order.
        stack.reverse();

        while let Some(m) = stack.pop() {
            if m.next_idx >= m.pattern.len() {
                results.push(m);
                continue;
            }

            let nodes = self.lookup_item(&m.pattern[m.next_idx], m.position);
            let last = m.next_idx + 1 == m.pattern.len();
            // Push in reverse order so they are explored in forward order.
            for node_id in nodes.into_iter().rev() {
                let fresh = m.fresh || node_id >= self.frontier;
                if last && !fresh {
                    continue;
                }
                let mut route = m.route.clone();
                route.push(node_id);
                stack.push(PartialMatch {
                    rule: m.rule,
                    pattern: m.pattern,
                    next_idx: m.next_idx + 1,
                    position: self.stash.get(node_id).span.end,
                    route,
                    fresh,
                });
            }
        }

        results
    }

    /// Build the parent node of a complete match, or `None` when the
    /// children's structures do not combine.
    fn combine(&self, id: RuleId, rule: &CombinationRule, route: &[NodeId]) -> Result<Option<Node>, AnalysisError> {
        let fail = |source: IntegrityError| AnalysisError::integrity(&rule.name, source);
        let children: Vec<&Node> = route.iter().map(|child| self.stash.get(*child)).collect();
        let (Some(first), Some(last)) = (children.first(), children.last()) else {
            return Err(fail(IntegrityError::EmptyPattern));
        };

        let Some(avs) = combine_structures(rule, &children).map_err(fail)? else {
            return Ok(None);
        };
        if avs.depth() > MAX_DEPTH {
            return Err(fail(IntegrityError::TooDeep { limit: MAX_DEPTH }));
        }

        let span = Span { start: first.span.start, end: last.span.end };
        let mut cuts: Vec<usize> = children
            .iter()
            .flat_map(|child| child.cuts.iter().copied().chain([child.span.end]))
            .filter(|cut| span.start < *cut && *cut < span.end)
            .collect();
        cuts.sort_unstable();
        cuts.dedup();

        Ok(Some(Node { span, tag: rule.result, avs, cuts, origin: Origin::Combination { rule: id, children: route.to_vec() } }))
    }

    /// Apply every combination rule once over the current chart and return
    /// the nodes produced.
    fn apply_rules_once(&mut self) -> Result<(Vec<Node>, PassMetrics), AnalysisError> {
        let project = self.project;
        let mut discovered = Vec::new();
        let mut pass = PassMetrics::default();

        let seeds = self.seed_first_pattern();
        for m in self.match_all(seeds) {
            let key = AttemptKey { rule: m.rule, route: m.route };
            if self.attempted.contains(&key) {
                pass.skipped += 1;
                continue;
            }
            self.budget.tick()?;
            pass.attempts += 1;

            let rule = &project.rules().combination[key.rule];
            match self.combine(key.rule, rule, &key.route)? {
                Some(node) => discovered.push(node),
                None => {
                    pass.rejected += 1;
                    trace!("[rule:rejected] name=\"{}\" route={:?}", rule.name, key.route);
                    if self.retain {
                        self.rejected.push(Rejection { rule: key.rule, route: key.route.clone() });
                    }
                }
            }
            self.attempted.insert(key);
        }

        Ok((discovered, pass))
    }

    /// Saturate the stash by repeatedly applying combination rules until a
    /// fixpoint.
    ///
    /// ```text
    /// leaves ──▶ pass 1 ──▶ stash grows ──▶ pass 2 ──▶ ... ──▶ pass n (nothing new)
    /// ```
    fn saturate(&mut self) -> Result<SaturationMetrics, AnalysisError> {
        let mut metrics = SaturationMetrics::default();
        let saturation_start = Instant::now();

        loop {
            let iteration_start = Instant::now();
            let (discovered, mut pass) = self.apply_rules_once()?;
            self.frontier = self.stash.len();
            for node in discovered {
                if let Some(node_id) = self.stash.insert(node) {
                    pass.produced += 1;
                    let node = self.stash.get(node_id);
                    trace!(
                        "[rule:production_ok] #{node_id} tag={:?} span={}..{} avs={:?}",
                        node.tag,
                        node.span.start,
                        node.span.end,
                        node.avs
                    );
                }
            }
            pass.duration = iteration_start.elapsed();
            debug!(
                "[saturate] pass {}: attempts={} rejected={} skipped={} produced={}",
                metrics.iterations.len() + 1,
                pass.attempts,
                pass.rejected,
                pass.skipped,
                pass.produced
            );

            let fixpoint = pass.produced == 0;
            metrics.iterations.push(pass);
            if fixpoint {
                break;
            }
        }

        metrics.total = saturation_start.elapsed();
        Ok(metrics)
    }

    /// Segment, saturate and resolve, returning timing details.
    pub fn run_with_metrics(mut self) -> Result<RunResult, AnalysisError> {
        let total_start = Instant::now();
        let segmentation = self.segment()?;
        let saturation = self.saturate()?;

        let resolve_start = Instant::now();
        let accepting = resolve::accepting(&self.stash, self.project, self.input.len());
        let trees = accepting.iter().map(|id| resolve::build_tree(&self.stash, self.project, &self.input, *id)).collect();
        let chart = self
            .retain
            .then(|| resolve::build_chart(&self.stash, self.project, &self.input, &accepting, &self.rejected));
        let resolve = resolve_start.elapsed();

        let metrics = RunMetrics {
            total: total_start.elapsed(),
            segmentation,
            saturation,
            resolve,
            steps: self.budget.used(),
        };
        debug!(
            "[run] {:?}: {} nodes, {} accepting, {} steps in {:?}",
            self.input.text(),
            self.stash.len(),
            accepting.len(),
            metrics.steps,
            metrics.total
        );
        Ok(RunResult { trees, chart, metrics })
    }
}

/// Combine the children's structures as `rule` prescribes. A rule without
/// operations unifies all children.
fn combine_structures(rule: &CombinationRule, children: &[&Node]) -> Result<Option<Avs>, IntegrityError> {
    let child = |index: usize| {
        children.get(index).copied().ok_or(IntegrityError::ChildOutOfRange { index, arity: children.len() })
    };

    let mut acc = Avs::empty();
    if rule.ops.is_empty() {
        for node in children {
            match unify(&acc, &node.avs) {
                Some(avs) => acc = avs,
                None => return Ok(None),
            }
        }
        return Ok(Some(acc));
    }

    for op in &rule.ops {
        let next = match op {
            CombineOp::Child(index) => unify(&acc, &child(*index)?.avs),
            CombineOp::Fixed(avs) => unify(&acc, avs),
            CombineOp::Attr { child: index, attr } => match child(*index)?.avs.get(*attr) {
                Some(value) => acc.with(*attr, value.clone()),
                None => Some(acc.clone()),
            },
            CombineOp::Check { child: index, avs } => unify(&child(*index)?.avs, avs).map(|_| acc.clone()),
            CombineOp::Agree { attr, left, right } => {
                match (child(*left)?.avs.get(*attr), child(*right)?.avs.get(*attr)) {
                    (Some(a), Some(b)) => unify_values(a, b).and_then(|value| acc.with(*attr, value)),
                    (Some(value), None) | (None, Some(value)) => acc.with(*attr, value.clone()),
                    (None, None) => Some(acc.clone()),
                }
            }
            CombineOp::Nest { attr, child: index } => acc.with(*attr, Value::Avs(child(*index)?.avs.clone())),
            CombineOp::List { attr, children: indices } => {
                let items = indices
                    .iter()
                    .map(|index| child(*index).map(|node| Value::Avs(node.avs.clone())))
                    .collect::<Result<Vec<_>, _>>()?;
                acc.with(*attr, Value::list(items))
            }
        };
        match next {
            Some(avs) => acc = avs,
            None => return Ok(None),
        }
    }
    Ok(Some(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Symbol;

    const CLASS: Symbol = Symbol::new(0);
    const CASE: Symbol = Symbol::new(1);
    const NOUN: Symbol = Symbol::new(2);
    const NOM: Symbol = Symbol::new(3);
    const GEN: Symbol = Symbol::new(4);
    const INNER: Symbol = Symbol::new(5);

    fn leaf(start: usize, end: usize, pairs: &[(Symbol, Symbol)]) -> Node {
        Node {
            span: Span { start, end },
            tag: NOUN,
            avs: Avs::from_pairs(pairs.iter().map(|(a, v)| (*a, Value::Symbol(*v)))).unwrap(),
            cuts: Vec::new(),
            origin: Origin::Morph { rule: 0 },
        }
    }

    fn rule(ops: Vec<CombineOp>) -> CombinationRule {
        CombinationRule { name: "r".into(), pattern: vec![TagPattern::Any, TagPattern::Any], result: NOUN, ops }
    }

    #[test]
    fn no_ops_unifies_every_child() {
        let (a, b) = (leaf(0, 2, &[(CLASS, NOUN)]), leaf(2, 4, &[(CASE, NOM)]));
        let avs = combine_structures(&rule(vec![]), &[&a, &b]).unwrap().unwrap();
        assert_eq!(avs.len(), 2);

        let c = leaf(2, 4, &[(CLASS, GEN)]);
        assert_eq!(combine_structures(&rule(vec![]), &[&a, &c]).unwrap(), None);
    }

    #[test]
    fn check_constrains_without_copying() {
        let (a, b) = (leaf(0, 2, &[(CLASS, NOUN)]), leaf(2, 4, &[(CASE, GEN)]));
        let nominative = Avs::singleton(CASE, Value::Symbol(NOM));
        let genitive = Avs::singleton(CASE, Value::Symbol(GEN));

        let ops = vec![CombineOp::Child(0), CombineOp::Check { child: 1, avs: genitive }];
        let avs = combine_structures(&rule(ops), &[&a, &b]).unwrap().unwrap();
        assert_eq!(avs.get(CASE), None);

        let ops = vec![CombineOp::Child(0), CombineOp::Check { child: 1, avs: nominative }];
        assert_eq!(combine_structures(&rule(ops), &[&a, &b]).unwrap(), None);
    }

    #[test]
    fn agree_keeps_the_shared_value() {
        let (a, b) = (leaf(0, 2, &[(CASE, GEN)]), leaf(2, 4, &[(CASE, GEN)]));
        let ops = vec![CombineOp::Agree { attr: CASE, left: 0, right: 1 }];
        let avs = combine_structures(&rule(ops.clone()), &[&a, &b]).unwrap().unwrap();
        assert_eq!(avs.get(CASE), Some(&Value::Symbol(GEN)));

        let c = leaf(2, 4, &[(CASE, NOM)]);
        assert_eq!(combine_structures(&rule(ops), &[&a, &c]).unwrap(), None);
    }

    #[test]
    fn attr_nest_and_list_build_structure() {
        let (a, b) = (leaf(0, 2, &[(CLASS, NOUN), (CASE, NOM)]), leaf(2, 4, &[(CASE, NOM)]));
        let ops = vec![
            CombineOp::Attr { child: 0, attr: CLASS },
            CombineOp::Attr { child: 1, attr: GEN },
            CombineOp::Nest { attr: INNER, child: 1 },
            CombineOp::List { attr: CASE, children: vec![0, 1] },
        ];
        let avs = combine_structures(&rule(ops), &[&a, &b]).unwrap().unwrap();
        assert_eq!(avs.get(CLASS), Some(&Value::Symbol(NOUN)));
        assert_eq!(avs.get(INNER).and_then(Value::as_avs), Some(&b.avs));
        assert_eq!(avs.get(CASE).and_then(Value::as_list).map(<[Value]>::len), Some(2));
        assert_eq!(avs.depth(), 3);
    }

    #[test]
    fn child_out_of_range_is_an_integrity_error() {
        let a = leaf(0, 2, &[]);
        let result = combine_structures(&rule(vec![CombineOp::Child(4)]), &[&a]);
        assert_eq!(result, Err(IntegrityError::ChildOutOfRange { index: 4, arity: 1 }));
    }
}
