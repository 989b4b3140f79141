//! Allomorph program interpreter.
//!
//! An allomorph rule is a flat program of [`AllomorphOp`]s. Running it at one
//! input position yields every morph candidate the rule licenses there.
//!
//! The interpreter is a backtracking VM without recursion: a *thread* is a
//! program counter (a stack of frames, one per entered `Alternatives` branch),
//! an input position, the structure built so far, the current class tag and
//! the capture registers. Every ambiguous instruction (a segment with several
//! possible lengths, a lexicon lookup with several readings, alternatives)
//! forks the thread onto an explicit stack.
//!
//! ```text
//! [BeginCapture(0), Match(Any{1..=4}), EndCapture(0), Lookup{capture: 0}]   at 0 of "talossa"
//!
//!   thread pos=0 ──Any──┬─ pos=1 "t"    ── lookup: no reading   ── dies
//!                       ├─ pos=2 "ta"   ── lookup: 1 reading    ── morph 0..2
//!                       ├─ pos=3 "tal"  ── lookup: no reading   ── dies
//!                       └─ pos=4 "talo" ── lookup: 1 reading    ── morph 0..4
//! ```
//!
//! Forks are pushed in reverse so that they are explored in forward order,
//! which keeps the order of produced morphs deterministic. A failed match or
//! unification only kills its own thread. Structural defects (a capture used
//! before it exists, a morph without a class) are rejected when the project is
//! built; should one still be reached here it aborts the whole analysis.

use super::budget::Budget;
use crate::avs::{Avs, MAX_DEPTH, Value, unify};
use crate::error::{AnalysisError, IntegrityError};
use crate::lexicon::Lexicon;
use crate::rules::{AllomorphOp, AllomorphRule, Segment, ValueSource};
use crate::symbols::Symbol;

/// The input word, addressable by char position.
#[derive(Debug, Clone)]
pub(crate) struct Input<'t> {
    text: &'t str,
    chars: Vec<char>,
    /// Byte offset of every char position, plus the text length.
    offsets: Vec<usize>,
}

impl<'t> Input<'t> {
    pub fn new(text: &'t str) -> Self {
        let (mut offsets, chars): (Vec<usize>, Vec<char>) = text.char_indices().unzip();
        offsets.push(text.len());
        Input { text, chars, offsets }
    }

    pub fn text(&self) -> &'t str {
        self.text
    }

    /// Length in chars.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn char_at(&self, position: usize) -> Option<char> {
        self.chars.get(position).copied()
    }

    /// Text between two char positions.
    pub fn slice(&self, start: usize, end: usize) -> &'t str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    fn rest(&self, position: usize) -> &'t str {
        &self.text[self.offsets[position]..]
    }
}

/// A candidate produced by one allomorph rule at one position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Morph {
    pub end: usize,
    pub avs: Avs,
    pub tag: Symbol,
}

#[derive(Debug, Clone, Copy)]
struct Frame<'r> {
    ops: &'r [AllomorphOp],
    pc: usize,
}

#[derive(Debug, Clone, Copy)]
struct Capture {
    id: u8,
    start: usize,
    end: Option<usize>,
}

#[derive(Debug, Clone)]
struct Thread<'r> {
    frames: Vec<Frame<'r>>,
    position: usize,
    avs: Avs,
    tag: Option<Symbol>,
    captures: Vec<Capture>,
}

impl Thread<'_> {
    fn forked(&self, position: usize) -> Self {
        let mut thread = self.clone();
        thread.position = position;
        thread
    }

    /// Text of the closed capture `id`.
    fn captured<'t>(&self, input: &Input<'t>, id: u8) -> Result<&'t str, IntegrityError> {
        match self.captures.iter().find(|c| c.id == id) {
            Some(Capture { start, end: Some(end), .. }) => Ok(input.slice(*start, *end)),
            _ => Err(IntegrityError::UnknownCapture(id)),
        }
    }
}

/// Run `rule` at `start` and collect every morph it produces.
pub(crate) fn run(
    rule: &AllomorphRule,
    input: &Input<'_>,
    start: usize,
    lexicon: &Lexicon,
    budget: &mut Budget,
) -> Result<Vec<Morph>, AnalysisError> {
    let fail = |source: IntegrityError| AnalysisError::integrity(&rule.name, source);
    let mut morphs = Vec::new();
    let mut stack = vec![Thread {
        frames: vec![Frame { ops: &rule.program, pc: 0 }],
        position: start,
        avs: Avs::empty(),
        tag: rule.tag,
        captures: Vec::new(),
    }];

    while let Some(mut thread) = stack.pop() {
        budget.tick()?;

        while thread.frames.last().is_some_and(|f| f.pc >= f.ops.len()) {
            thread.frames.pop();
        }
        let Some(frame) = thread.frames.last_mut() else {
            let tag = thread.tag.ok_or_else(|| fail(IntegrityError::MissingTag))?;
            if thread.avs.depth() > MAX_DEPTH {
                return Err(fail(IntegrityError::TooDeep { limit: MAX_DEPTH }));
            }
            morphs.push(Morph { end: thread.position, avs: thread.avs, tag });
            continue;
        };
        let ops = frame.ops;
        let op = &ops[frame.pc];
        frame.pc += 1;

        match op {
            AllomorphOp::Match(segment) => {
                let ends = match_segment(segment, input, thread.position);
                stack.extend(ends.into_iter().rev().map(|end| thread.forked(end)));
            }
            AllomorphOp::BeginCapture(id) => {
                thread.captures.retain(|c| c.id != *id);
                thread.captures.push(Capture { id: *id, start: thread.position, end: None });
                stack.push(thread);
            }
            AllomorphOp::EndCapture(id) => {
                let position = thread.position;
                let capture = thread.captures.iter_mut().find(|c| c.id == *id);
                let capture = capture.ok_or_else(|| fail(IntegrityError::UnknownCapture(*id)))?;
                capture.end = Some(position);
                stack.push(thread);
            }
            AllomorphOp::Lookup { capture } => {
                let stem = thread.captured(input, *capture).map_err(fail)?;
                for entry in lexicon.lookup(stem).iter().rev() {
                    if let Some(avs) = unify(&thread.avs, &entry.avs) {
                        let mut reading = thread.clone();
                        reading.avs = avs;
                        reading.tag = Some(entry.tag);
                        stack.push(reading);
                    }
                }
            }
            AllomorphOp::Unify(fixed) => {
                if let Some(avs) = unify(&thread.avs, fixed) {
                    thread.avs = avs;
                    stack.push(thread);
                }
            }
            AllomorphOp::Assign { attr, source } => {
                let value = match source {
                    ValueSource::Const(value) => value.clone(),
                    ValueSource::Capture(id) => Value::text(thread.captured(input, *id).map_err(fail)?),
                    ValueSource::Surface => Value::text(input.slice(start, thread.position)),
                };
                if let Some(avs) = thread.avs.with(*attr, value) {
                    thread.avs = avs;
                    stack.push(thread);
                }
            }
            AllomorphOp::Tag(tag) => {
                thread.tag = Some(*tag);
                stack.push(thread);
            }
            AllomorphOp::Alternatives(alternatives) => {
                for alternative in alternatives.iter().rev() {
                    let mut branch = thread.clone();
                    branch.frames.push(Frame { ops: alternative, pc: 0 });
                    stack.push(branch);
                }
            }
        }
    }

    Ok(morphs)
}

/// Every position at which `segment` can end when started at `position`,
/// shortest first.
fn match_segment(segment: &Segment, input: &Input<'_>, position: usize) -> Vec<usize> {
    let available = input.len() - position;
    match segment {
        Segment::Literal(text) => {
            if input.rest(position).starts_with(&**text) {
                vec![position + text.chars().count()]
            } else {
                Vec::new()
            }
        }
        Segment::Class { class, min, max } => {
            let limit = max.map_or(available, |m| m.min(available));
            let run = (position..position + limit).take_while(|p| input.char_at(*p).is_some_and(|c| class.matches(c)));
            let longest = run.count();
            if longest < *min { Vec::new() } else { (position + min..=position + longest).collect() }
        }
        Segment::Any { min, max } => {
            let longest = max.map_or(available, |m| m.min(available));
            if longest < *min { Vec::new() } else { (position + min..=position + longest).collect() }
        }
        Segment::Regex(re) => {
            let rest = input.rest(position);
            re.prefix_lengths(rest).into_iter().map(|len| position + rest[..len].chars().count()).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{CharClass, ClassMask};

    const NOUN: Symbol = Symbol::new(0);
    const STEM: Symbol = Symbol::new(1);
    const CASE: Symbol = Symbol::new(2);
    const INESSIVE: Symbol = Symbol::new(3);

    fn lexicon() -> Lexicon {
        let mut lexicon = Lexicon::new();
        lexicon.insert("talo", Avs::singleton(CASE, Value::Symbol(Symbol::new(4))), NOUN);
        lexicon.insert("ta", Avs::empty(), NOUN);
        lexicon
    }

    fn rule(tag: Option<Symbol>, program: Vec<AllomorphOp>) -> AllomorphRule {
        AllomorphRule { name: "test".into(), tag, program }
    }

    fn run_at(rule: &AllomorphRule, text: &str, start: usize) -> Result<Vec<Morph>, AnalysisError> {
        run(rule, &Input::new(text), start, &lexicon(), &mut Budget::new(None))
    }

    #[test]
    fn input_slices_by_char_position() {
        let input = Input::new("käsi");
        assert_eq!(input.len(), 4);
        assert_eq!(input.char_at(1), Some('ä'));
        assert_eq!(input.slice(1, 3), "äs");
        assert_eq!(input.slice(4, 4), "");
    }

    #[test]
    fn lexicon_rule_yields_every_stem_prefix_in_order() {
        let morphs = run_at(&AllomorphRule::lexicon("stem", 4), "talossa", 0).unwrap();
        let ends: Vec<usize> = morphs.iter().map(|m| m.end).collect();
        assert_eq!(ends, vec![2, 4]);
        assert!(morphs.iter().all(|m| m.tag == NOUN));
        assert_eq!(morphs[1].avs.get(CASE), Some(&Value::Symbol(Symbol::new(4))));
    }

    #[test]
    fn assignments_read_captures_and_surface() {
        let program = vec![
            AllomorphOp::BeginCapture(0),
            AllomorphOp::literal("ss"),
            AllomorphOp::EndCapture(0),
            AllomorphOp::literal("a"),
            AllomorphOp::Assign { attr: STEM, source: ValueSource::Capture(0) },
            AllomorphOp::Assign { attr: CASE, source: ValueSource::Surface },
        ];
        let morphs = run_at(&rule(Some(NOUN), program), "talossa", 4).unwrap();
        assert_eq!(morphs.len(), 1);
        assert_eq!(morphs[0].end, 7);
        assert_eq!(morphs[0].avs.get(STEM), Some(&Value::text("ss")));
        assert_eq!(morphs[0].avs.get(CASE), Some(&Value::text("ssa")));
    }

    #[test]
    fn alternatives_continue_with_the_rest_of_the_program() {
        let program = vec![
            AllomorphOp::Alternatives(vec![vec![AllomorphOp::literal("s")], vec![AllomorphOp::literal("ss")]]),
            AllomorphOp::literal("a"),
            AllomorphOp::assign(CASE, Value::Symbol(INESSIVE)),
        ];
        let morphs = run_at(&rule(Some(NOUN), program), "ssa", 0).unwrap();
        assert_eq!(morphs.iter().map(|m| m.end).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn failed_unification_only_kills_the_thread() {
        let program = vec![
            AllomorphOp::assign(CASE, Value::Symbol(INESSIVE)),
            AllomorphOp::BeginCapture(0),
            AllomorphOp::any(1, None),
            AllomorphOp::EndCapture(0),
            AllomorphOp::Lookup { capture: 0 },
        ];
        // `ta` has no case and unifies; `talo` is nominative and conflicts.
        let morphs = run_at(&rule(None, program), "talo", 0).unwrap();
        assert_eq!(morphs.len(), 1);
        assert_eq!(morphs[0].end, 2);
    }

    #[test]
    fn class_segments_respect_bounds() {
        let program = vec![AllomorphOp::class(CharClass::chars("s"), 1, Some(2))];
        let morphs = run_at(&rule(Some(NOUN), program), "sssa", 0).unwrap();
        assert_eq!(morphs.iter().map(|m| m.end).collect::<Vec<_>>(), vec![1, 2]);

        let program = vec![AllomorphOp::class(CharClass::of(ClassMask::NUMERIC), 1, None)];
        assert!(run_at(&rule(Some(NOUN), program), "sssa", 0).unwrap().is_empty());
    }

    #[test]
    fn regex_segments_yield_every_matching_length() {
        let program = vec![AllomorphOp::Match(Segment::regex("s+").unwrap())];
        let morphs = run_at(&rule(Some(NOUN), program), "talossa", 4).unwrap();
        assert_eq!(morphs.iter().map(|m| m.end).collect::<Vec<_>>(), vec![5, 6]);
        let program = vec![AllomorphOp::Match(Segment::regex("s+").unwrap())];
        assert!(run_at(&rule(Some(NOUN), program), "talossa", 0).unwrap().is_empty());
    }

    #[test]
    fn later_segments_backtrack_into_shorter_regex_matches() {
        let program = vec![AllomorphOp::Match(Segment::regex("s+").unwrap()), AllomorphOp::literal("sa")];
        let morphs = run_at(&rule(Some(NOUN), program), "sssa", 0).unwrap();
        assert_eq!(morphs.iter().map(|m| m.end).collect::<Vec<_>>(), vec![4]);

        let program = vec![AllomorphOp::Match(Segment::regex("[äs]+").unwrap()), AllomorphOp::literal("a")];
        let morphs = run_at(&rule(Some(NOUN), program), "äsa", 0).unwrap();
        assert_eq!(morphs.iter().map(|m| m.end).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn empty_program_is_a_zero_width_morph() {
        let morphs = run_at(&rule(Some(NOUN), vec![]), "talo", 4).unwrap();
        assert_eq!(morphs, vec![Morph { end: 4, avs: Avs::empty(), tag: NOUN }]);
    }

    #[test]
    fn structural_defects_are_integrity_errors() {
        let missing_tag = run_at(&rule(None, vec![AllomorphOp::literal("ta")]), "talo", 0);
        assert!(matches!(
            missing_tag,
            Err(AnalysisError::GrammarIntegrity { source: IntegrityError::MissingTag, .. })
        ));

        let unknown_capture = run_at(&rule(Some(NOUN), vec![AllomorphOp::Lookup { capture: 3 }]), "talo", 0);
        assert!(matches!(
            unknown_capture,
            Err(AnalysisError::GrammarIntegrity { source: IntegrityError::UnknownCapture(3), .. })
        ));
    }

    #[test]
    fn every_thread_step_is_charged() {
        let rule = AllomorphRule::lexicon("stem", 4);
        let err = run(&rule, &Input::new("talossa"), 0, &lexicon(), &mut Budget::new(Some(3))).unwrap_err();
        assert_eq!(err, AnalysisError::BudgetExceeded { steps: 3 });
    }
}
