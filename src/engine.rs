//! Analysis engine.
//!
//! The engine turns a project and one input word into the set of accepting
//! chart nodes. It is split into focused submodules under `src/engine/`.
//!
//! ## How the parts work together
//!
//! ```text
//! RuleSet ── CompiledRules::new (compiled_rules.rs, once per project)
//!                             │
//! input ── TriggerInfo::scan ─┤  deactivate allomorph rules (literals + classes)
//!          (trigger.rs)       │
//!                             v
//!                  Analyzer::segment (parser.rs)
//!                    - every reachable position
//!                    - run allomorph programs   (vm.rs)
//!                    - leaves into the stash, dedup via NodeKey (dedup.rs)
//!                             │
//!                             v
//!                  Analyzer::saturate (parser.rs)
//!                    - match combination patterns over adjacent nodes
//!                    - cycle guard via AttemptKey (dedup.rs)
//!                    - unify into parent nodes, repeat to fixpoint
//!                             │
//!                             v
//!                  resolve (resolve.rs)
//!                    - accepting nodes → ParseTree
//!                    - optional full SearchChart
//! ```
//!
//! Every rule application and every VM step is charged to a `Budget`
//! (budget.rs), which is how a host bounds pathological grammars.
//!
//! ## Responsibilities by module
//!
//! - `compiled_rules.rs`: per-project rule indexes and gating metadata.
//! - `trigger.rs`: scans the raw input for its characters and categories.
//! - `vm.rs`: interprets allomorph programs at one input position.
//! - `parser.rs`: segmentation and saturation over a `Stash`.
//! - `dedup.rs`: memo keys that keep saturation finite.
//! - `budget.rs`: step accounting.
//! - `resolve.rs`: turns accepting nodes into result trees.
//! - `metrics.rs`: timings and counters for runs and passes.
//!
//! ## Debugging
//!
//! The engine logs through the `log` facade: `debug` for gating and per-pass
//! summaries, `trace` for individual productions.

#[path = "engine/budget.rs"]
mod budget;
#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/dedup.rs"]
mod dedup;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/parser.rs"]
mod parser;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/trigger.rs"]
mod trigger;
#[path = "engine/vm.rs"]
mod vm;

pub(crate) use compiled_rules::CompiledRules;
pub(crate) use dedup::NodeKey;
pub use metrics::{PassMetrics, RunMetrics, RunResult, SaturationMetrics};
pub(crate) use parser::Analyzer;
