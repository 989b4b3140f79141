//! Rule compilation and indexing.
//!
//! This module holds the *static* side of the engine: structures derived once
//! per project from its `RuleSet` that make each analysis cheaper.
//!
//! Analysis is split into two phases:
//!
//! 1. **Compile/index rules** (this module, from `Project::new`): gather the
//!    gating metadata of every allomorph rule and index both rule kinds.
//! 2. **Run** (see `parser.rs`): scan the input (`trigger.rs`), deactivate
//!    rules that cannot match, then segment and saturate.
//!
//! Indexes:
//!
//! - Allomorph rules starting with a literal are filed under its first
//!   character (`RuleIndex::by_first_char`); every other allomorph rule is
//!   `always_on` and tried at every reachable position.
//! - Combination rules are filed under the tag(s) their first pattern element
//!   accepts; rules starting with `TagPattern::Any` are tried for every node.
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `RuleSet::allomorph` / `RuleSet::combination`
//!   and into `CompiledRules::metas` (allomorph only). Those must stay aligned.
//! - Every candidate list handed out is sorted by rule id, so rule order in
//!   the grammar is the order in which rules are tried.

use super::trigger::TriggerInfo;
use crate::rules::{ClassMask, RuleId, RuleSet, TagPattern};
use crate::symbols::Symbol;
use log::debug;
use rustc_hash::FxHashMap;

/// Gating metadata of one allomorph rule.
#[derive(Clone, Debug)]
pub(crate) struct RuleMeta {
    pub required_literals: Vec<Box<str>>,
    pub required_classes: Vec<ClassMask>,
    pub first_char: Option<char>,
}

impl RuleMeta {
    /// Whether the rule can match anywhere in the scanned input.
    fn admits(&self, trigger: &TriggerInfo<'_>) -> bool {
        self.first_char.is_none_or(|c| trigger.chars.contains(&c))
            && self.required_literals.iter().all(|lit| trigger.contains_literal(lit))
            && self.required_classes.iter().all(|mask| trigger.has_class(*mask))
    }
}

#[derive(Default, Debug)]
pub(crate) struct RuleIndex {
    pub always_on: Vec<RuleId>,
    pub by_first_char: FxHashMap<char, Vec<RuleId>>,
}

#[derive(Default, Debug)]
pub(crate) struct CombinationIndex {
    pub by_first_tag: FxHashMap<Symbol, Vec<RuleId>>,
    pub any_first: Vec<RuleId>,
}

/// Pre-compiled rule metadata and indexes of a project.
#[derive(Debug)]
pub(crate) struct CompiledRules {
    pub metas: Vec<RuleMeta>,
    pub index: RuleIndex,
    pub combination: CombinationIndex,
}

impl CompiledRules {
    pub fn new(rules: &RuleSet) -> Self {
        let metas: Vec<RuleMeta> = rules
            .allomorph
            .iter()
            .map(|r| RuleMeta {
                required_literals: r.required_literals().map(Box::from).collect(),
                required_classes: r.required_classes().collect(),
                first_char: r.first_char(),
            })
            .collect();

        let mut index = RuleIndex::default();
        for (id, meta) in metas.iter().enumerate() {
            match meta.first_char {
                Some(c) => index.by_first_char.entry(c).or_default().push(id),
                None => index.always_on.push(id),
            }
        }

        let mut combination = CombinationIndex::default();
        for (id, rule) in rules.combination.iter().enumerate() {
            match rule.pattern.first() {
                Some(TagPattern::Tag(tag)) => combination.by_first_tag.entry(*tag).or_default().push(id),
                Some(TagPattern::OneOf(tags)) => {
                    for tag in tags {
                        let ids = combination.by_first_tag.entry(*tag).or_default();
                        if ids.last() != Some(&id) {
                            ids.push(id);
                        }
                    }
                }
                Some(TagPattern::Any) => combination.any_first.push(id),
                // Empty patterns never pass validation.
                None => {}
            }
        }

        debug!(
            "[compile] allomorph: {} always-on, {} first-char buckets; combination: {} tag buckets, {} open",
            index.always_on.len(),
            index.by_first_char.len(),
            combination.by_first_tag.len(),
            combination.any_first.len()
        );
        CompiledRules { metas, index, combination }
    }

    /// Activation flags of every allomorph rule for the scanned input.
    pub fn activate(&self, trigger: &TriggerInfo<'_>) -> Vec<bool> {
        self.metas.iter().map(|meta| meta.admits(trigger)).collect()
    }

    /// Active allomorph rules worth trying at a position whose next character
    /// is `next` (`None` at the end of the input), in rule order.
    pub fn allomorph_candidates(&self, next: Option<char>, active: &[bool]) -> Vec<RuleId> {
        let keyed = next.and_then(|c| self.index.by_first_char.get(&c)).map(Vec::as_slice).unwrap_or(&[]);
        let mut ids: Vec<RuleId> = self.index.always_on.iter().chain(keyed).copied().filter(|id| active[*id]).collect();
        ids.sort_unstable();
        ids
    }

    /// Combination rules whose first pattern element may accept `tag`, in
    /// rule order.
    pub fn combination_candidates(&self, tag: Symbol) -> Vec<RuleId> {
        let keyed = self.combination.by_first_tag.get(&tag).map(Vec::as_slice).unwrap_or(&[]);
        let mut ids: Vec<RuleId> = keyed.iter().chain(&self.combination.any_first).copied().collect();
        ids.sort_unstable();
        ids
    }
}
