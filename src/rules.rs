//! Rule data.
//!
//! Rules are plain data: a rule is a name plus a sequence of tagged-variant
//! instructions that the engine interprets (see `engine/vm.rs` for allomorph
//! programs and `engine/parser.rs` for combination operations). Nothing in
//! here executes anything.
//!
//! There are two rule kinds:
//!
//! - [`AllomorphRule`]: matches characters of the input at a position and
//!   yields morph candidates.
//!
//!   ```text
//!   program: [BeginCapture(0), Match(Any{1..}), EndCapture(0), Lookup{capture: 0}]
//!   input:   "talossa" @0  ──▶  "talo" (lexicon hit)  ──▶  morph 0..4 tagged `noun`
//!   ```
//!
//! - [`CombinationRule`]: matches a sequence of adjacent chart nodes by class
//!   tag and combines their structures into a parent node.
//!
//!   ```text
//!   pattern: [noun, case_suffix] ──▶ word
//!   ops:     [Attr{child: 0, class}, Child(1)]
//!   ```

use crate::avs::{Avs, Value};
use crate::error::{IntegrityError, ProjectError};
use crate::symbols::{Symbol, SymbolTable};
use regex::Regex;
use rustc_hash::FxHashSet;

/// Rule identifier (index into the respective rule vector of a [`RuleSet`]).
pub type RuleId = usize;

// --- Character classes -------------------------------------------------------

bitflags::bitflags! {
    /// Coarse Unicode character categories.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassMask: u8 {
        const ALPHABETIC  = 1 << 0;
        const NUMERIC     = 1 << 1;
        const WHITESPACE  = 1 << 2;
        const UPPERCASE   = 1 << 3;
        const LOWERCASE   = 1 << 4;
        const PUNCTUATION = 1 << 5;
    }
}

impl ClassMask {
    /// Every category `c` belongs to.
    pub fn of(c: char) -> ClassMask {
        let mut mask = ClassMask::empty();
        if c.is_alphabetic() {
            mask |= ClassMask::ALPHABETIC;
        }
        if c.is_numeric() {
            mask |= ClassMask::NUMERIC;
        }
        if c.is_whitespace() {
            mask |= ClassMask::WHITESPACE;
        }
        if c.is_uppercase() {
            mask |= ClassMask::UPPERCASE;
        }
        if c.is_lowercase() {
            mask |= ClassMask::LOWERCASE;
        }
        if c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace() && !c.is_control()) {
            mask |= ClassMask::PUNCTUATION;
        }
        mask
    }
}

/// A set of characters: categories plus explicit members, optionally negated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharClass {
    pub mask: ClassMask,
    pub chars: Vec<char>,
    pub negated: bool,
}

impl CharClass {
    pub fn of(mask: ClassMask) -> Self {
        CharClass { mask, chars: Vec::new(), negated: false }
    }

    pub fn chars(chars: &str) -> Self {
        CharClass { mask: ClassMask::empty(), chars: chars.chars().collect(), negated: false }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn matches(&self, c: char) -> bool {
        let member = ClassMask::of(c).intersects(self.mask) || self.chars.contains(&c);
        member != self.negated
    }
}

// --- Allomorph rules ---------------------------------------------------------

/// A piece of a character pattern.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Exact text.
    Literal(Box<str>),
    /// `min..=max` characters of a class (`max: None` is unbounded).
    Class { class: CharClass, min: usize, max: Option<usize> },
    /// `min..=max` arbitrary characters.
    Any { min: usize, max: Option<usize> },
    /// A regular expression anchored at the current position. Every length
    /// at which the expression matches is a candidate, like `Class` and `Any`.
    Regex(AnchoredRegex),
}

impl Segment {
    /// Compile `pattern` so that it only matches at the start of the remaining input.
    pub fn regex(pattern: &str) -> Result<Segment, ProjectError> {
        Ok(Segment::Regex(AnchoredRegex::new(pattern)?))
    }
}

/// A pattern compiled twice: anchored at the start, and anchored at both ends.
#[derive(Debug, Clone)]
pub struct AnchoredRegex {
    prefix: Regex,
    whole: Regex,
}

impl AnchoredRegex {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let prefix = Regex::new(&format!("^(?:{pattern})"))?;
        let whole = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(AnchoredRegex { prefix, whole })
    }

    /// Byte lengths of every prefix of `text` the pattern matches, shortest first.
    pub fn prefix_lengths(&self, text: &str) -> Vec<usize> {
        if !self.prefix.is_match(text) {
            return Vec::new();
        }
        (0..=text.len()).filter(|end| text.is_char_boundary(*end) && self.whole.is_match(&text[..*end])).collect()
    }
}

/// Where an assigned value comes from.
#[derive(Debug, Clone)]
pub enum ValueSource {
    Const(Value),
    /// Text of a closed capture.
    Capture(u8),
    /// Text from the start of the match to the current position.
    Surface,
}

/// One instruction of an allomorph program.
#[derive(Debug, Clone)]
pub enum AllomorphOp {
    Match(Segment),
    BeginCapture(u8),
    EndCapture(u8),
    /// Look the captured text up in the lexicon; continues once per reading.
    Lookup { capture: u8 },
    /// Unify rule-local fixed values.
    Unify(Avs),
    Assign { attr: Symbol, source: ValueSource },
    /// Set the class tag of the morph.
    Tag(Symbol),
    /// Continue with every alternative program, then with the rest.
    Alternatives(Vec<Vec<AllomorphOp>>),
}

impl AllomorphOp {
    pub fn literal(text: &str) -> Self {
        AllomorphOp::Match(Segment::Literal(text.into()))
    }

    pub fn any(min: usize, max: Option<usize>) -> Self {
        AllomorphOp::Match(Segment::Any { min, max })
    }

    pub fn class(class: CharClass, min: usize, max: Option<usize>) -> Self {
        AllomorphOp::Match(Segment::Class { class, min, max })
    }

    pub fn assign(attr: Symbol, value: Value) -> Self {
        AllomorphOp::Assign { attr, source: ValueSource::Const(value) }
    }
}

/// Matches input characters and produces morph candidates.
#[derive(Debug, Clone)]
pub struct AllomorphRule {
    pub name: String,
    /// Class used when the program does not set one.
    pub tag: Option<Symbol>,
    pub program: Vec<AllomorphOp>,
}

impl AllomorphRule {
    /// A rule that matches any stem found in the lexicon.
    ///
    /// ```text
    /// [BeginCapture(0), Match(Any{1..=longest}), EndCapture(0), Lookup{capture: 0}]
    /// ```
    pub fn lexicon(name: &str, longest_stem: usize) -> Self {
        AllomorphRule {
            name: name.to_string(),
            tag: None,
            program: vec![
                AllomorphOp::BeginCapture(0),
                AllomorphOp::any(1, Some(longest_stem.max(1))),
                AllomorphOp::EndCapture(0),
                AllomorphOp::Lookup { capture: 0 },
            ],
        }
    }

    /// Literal segments that every match must consume.
    pub(crate) fn required_literals(&self) -> impl Iterator<Item = &str> {
        self.program.iter().filter_map(|op| match op {
            AllomorphOp::Match(Segment::Literal(text)) if !text.is_empty() => Some(text.as_ref()),
            _ => None,
        })
    }

    /// First character of the program when it starts with a literal.
    pub(crate) fn first_char(&self) -> Option<char> {
        match self.program.first() {
            Some(AllomorphOp::Match(Segment::Literal(text))) => text.chars().next(),
            _ => None,
        }
    }

    /// Category masks of top-level classes that must match at least once.
    pub(crate) fn required_classes(&self) -> impl Iterator<Item = ClassMask> + '_ {
        self.program.iter().filter_map(|op| match op {
            AllomorphOp::Match(Segment::Class { class, min, .. })
                if *min > 0 && !class.negated && class.chars.is_empty() && !class.mask.is_empty() =>
            {
                Some(class.mask)
            }
            _ => None,
        })
    }

    fn validate(&self, symbols: &SymbolTable) -> Result<(), IntegrityError> {
        if let Some(tag) = self.tag {
            check_symbol(symbols, tag)?;
        }
        validate_program(&self.program, symbols)?;

        let entry = FlowState { tagged: self.tag.is_some(), ..FlowState::default() };
        match check_flow(&self.program, entry)? {
            Some(exit) if !exit.tagged => Err(IntegrityError::MissingTag),
            _ => Ok(()),
        }
    }
}

/// What holds on every path that reaches a point of a program.
#[derive(Debug, Clone, Default)]
struct FlowState {
    opened: FxHashSet<u8>,
    closed: FxHashSet<u8>,
    tagged: bool,
}

impl FlowState {
    fn meet(mut self, other: &FlowState) -> Self {
        self.opened.retain(|id| other.opened.contains(id));
        self.closed.retain(|id| other.closed.contains(id));
        self.tagged &= other.tagged;
        self
    }

    fn require_closed(&self, id: u8) -> Result<(), IntegrityError> {
        if self.closed.contains(&id) { Ok(()) } else { Err(IntegrityError::UnknownCapture(id)) }
    }
}

/// Follow captures and the class tag through `program`. Returns the state at
/// the end, or `None` when no path gets there (`Alternatives(vec![])`).
fn check_flow(program: &[AllomorphOp], mut state: FlowState) -> Result<Option<FlowState>, IntegrityError> {
    for op in program {
        match op {
            AllomorphOp::BeginCapture(id) => {
                state.opened.insert(*id);
                state.closed.remove(id);
            }
            AllomorphOp::EndCapture(id) => {
                if !state.opened.contains(id) {
                    return Err(IntegrityError::UnknownCapture(*id));
                }
                state.closed.insert(*id);
            }
            AllomorphOp::Lookup { capture } => {
                state.require_closed(*capture)?;
                state.tagged = true;
            }
            AllomorphOp::Assign { source: ValueSource::Capture(id), .. } => state.require_closed(*id)?,
            AllomorphOp::Tag(_) => state.tagged = true,
            AllomorphOp::Alternatives(alternatives) => {
                let mut merged: Option<FlowState> = None;
                for alt in alternatives {
                    if let Some(exit) = check_flow(alt, state.clone())? {
                        merged = Some(match merged {
                            Some(acc) => acc.meet(&exit),
                            None => exit,
                        });
                    }
                }
                match merged {
                    Some(next) => state = next,
                    None => return Ok(None),
                }
            }
            AllomorphOp::Match(_) | AllomorphOp::Unify(_) | AllomorphOp::Assign { .. } => {}
        }
    }
    Ok(Some(state))
}

fn validate_program(program: &[AllomorphOp], symbols: &SymbolTable) -> Result<(), IntegrityError> {
    for op in program {
        match op {
            AllomorphOp::Unify(avs) => check_avs(symbols, avs)?,
            AllomorphOp::Assign { attr, source } => {
                check_symbol(symbols, *attr)?;
                if let ValueSource::Const(value) = source {
                    check_value(symbols, value)?;
                }
            }
            AllomorphOp::Tag(tag) => check_symbol(symbols, *tag)?,
            AllomorphOp::Alternatives(alternatives) => {
                for alt in alternatives {
                    validate_program(alt, symbols)?;
                }
            }
            AllomorphOp::Match(_)
            | AllomorphOp::BeginCapture(_)
            | AllomorphOp::EndCapture(_)
            | AllomorphOp::Lookup { .. } => {}
        }
    }
    Ok(())
}

// --- Combination rules -------------------------------------------------------

/// Matches the class tag of one chart node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPattern {
    Tag(Symbol),
    OneOf(Vec<Symbol>),
    Any,
}

impl TagPattern {
    pub fn matches(&self, tag: Symbol) -> bool {
        match self {
            TagPattern::Tag(t) => *t == tag,
            TagPattern::OneOf(tags) => tags.contains(&tag),
            TagPattern::Any => true,
        }
    }
}

/// One step in building a parent structure from its children.
#[derive(Debug, Clone)]
pub enum CombineOp {
    /// Unify the whole structure of a child.
    Child(usize),
    /// Unify rule-local fixed values.
    Fixed(Avs),
    /// Copy one attribute of a child, if present.
    Attr { child: usize, attr: Symbol },
    /// The child must be compatible with `avs`; nothing is copied.
    Check { child: usize, avs: Avs },
    /// The two children must agree on `attr`; the agreed value is kept.
    Agree { attr: Symbol, left: usize, right: usize },
    /// Store a child's structure as a nested value.
    Nest { attr: Symbol, child: usize },
    /// Store the structures of several children as a list.
    List { attr: Symbol, children: Vec<usize> },
}

/// Combines adjacent chart nodes into a parent node.
///
/// A rule without operations unifies all of its children.
#[derive(Debug, Clone)]
pub struct CombinationRule {
    pub name: String,
    pub pattern: Vec<TagPattern>,
    /// Class tag of the parent.
    pub result: Symbol,
    pub ops: Vec<CombineOp>,
}

impl CombinationRule {
    fn validate(&self, symbols: &SymbolTable) -> Result<(), IntegrityError> {
        if self.pattern.is_empty() {
            return Err(IntegrityError::EmptyPattern);
        }
        check_symbol(symbols, self.result)?;
        for pat in &self.pattern {
            match pat {
                TagPattern::Tag(tag) => check_symbol(symbols, *tag)?,
                TagPattern::OneOf(tags) => tags.iter().try_for_each(|t| check_symbol(symbols, *t))?,
                TagPattern::Any => {}
            }
        }

        let arity = self.pattern.len();
        let check_child = |index: usize| {
            if index < arity { Ok(()) } else { Err(IntegrityError::ChildOutOfRange { index, arity }) }
        };
        for op in &self.ops {
            match op {
                CombineOp::Child(child) => check_child(*child)?,
                CombineOp::Fixed(avs) => check_avs(symbols, avs)?,
                CombineOp::Attr { child, attr } | CombineOp::Nest { attr, child } => {
                    check_child(*child)?;
                    check_symbol(symbols, *attr)?;
                }
                CombineOp::Check { child, avs } => {
                    check_child(*child)?;
                    check_avs(symbols, avs)?;
                }
                CombineOp::Agree { attr, left, right } => {
                    check_child(*left)?;
                    check_child(*right)?;
                    check_symbol(symbols, *attr)?;
                }
                CombineOp::List { attr, children } => {
                    check_symbol(symbols, *attr)?;
                    children.iter().try_for_each(|c| check_child(*c))?;
                }
            }
        }
        Ok(())
    }
}

// --- Rule set ----------------------------------------------------------------

/// Every rule of a grammar plus the classes that may form a complete analysis.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub allomorph: Vec<AllomorphRule>,
    pub combination: Vec<CombinationRule>,
    /// Classes accepted for a node spanning the whole input. Empty accepts all.
    pub accept: Vec<Symbol>,
}

impl RuleSet {
    pub fn accepts(&self, tag: Symbol) -> bool {
        self.accept.is_empty() || self.accept.contains(&tag)
    }

    /// Check every symbol reference and child index against `symbols`.
    pub fn validate(&self, symbols: &SymbolTable) -> Result<(), ProjectError> {
        let mut names = FxHashSet::default();
        let allomorph = self.allomorph.iter().map(|r| (r.name.as_str(), r.validate(symbols)));
        let combination = self.combination.iter().map(|r| (r.name.as_str(), r.validate(symbols)));

        for (name, outcome) in allomorph.chain(combination) {
            if !names.insert(name) {
                return Err(ProjectError::DuplicateRule(name.to_string()));
            }
            outcome.map_err(|source| ProjectError::Integrity { rule: name.to_string(), source })?;
        }

        if let Some(tag) = self.accept.iter().find(|t| !symbols.contains(**t)) {
            return Err(ProjectError::UndefinedAcceptTag(*tag));
        }
        Ok(())
    }
}

fn check_symbol(symbols: &SymbolTable, sym: Symbol) -> Result<(), IntegrityError> {
    if symbols.contains(sym) { Ok(()) } else { Err(IntegrityError::UndefinedSymbol(sym)) }
}

fn check_avs(symbols: &SymbolTable, avs: &Avs) -> Result<(), IntegrityError> {
    avs.symbols().into_iter().try_for_each(|sym| check_symbol(symbols, sym))
}

fn check_value(symbols: &SymbolTable, value: &Value) -> Result<(), IntegrityError> {
    match value {
        Value::Symbol(sym) => check_symbol(symbols, *sym),
        Value::Text(_) => Ok(()),
        Value::List(items) => items.iter().try_for_each(|v| check_value(symbols, v)),
        Value::Avs(avs) => check_avs(symbols, avs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_class_matches_categories_and_members() {
        let vowels = CharClass::chars("aeiouyäö");
        assert!(vowels.matches('ä'));
        assert!(!vowels.matches('k'));

        let consonant = CharClass::of(ClassMask::ALPHABETIC).negate();
        assert!(consonant.matches('7'));
        assert!(!consonant.matches('k'));

        let digits = CharClass::of(ClassMask::NUMERIC);
        assert!(digits.matches('3'));
        assert!(!digits.matches('x'));
    }

    #[test]
    fn class_mask_covers_case_and_punctuation() {
        assert!(ClassMask::of('Ä').contains(ClassMask::ALPHABETIC | ClassMask::UPPERCASE));
        assert!(ClassMask::of('-').contains(ClassMask::PUNCTUATION));
        assert!(ClassMask::of(' ').contains(ClassMask::WHITESPACE));
    }

    #[test]
    fn regex_segments_are_anchored() {
        let Segment::Regex(re) = Segment::regex("s+a").unwrap() else { panic!("expected a regex segment") };
        assert_eq!(re.prefix_lengths("ssa"), vec![3]);
        assert!(re.prefix_lengths("tassa").is_empty());

        let Segment::Regex(re) = Segment::regex("s*").unwrap() else { panic!("expected a regex segment") };
        assert_eq!(re.prefix_lengths("sså"), vec![0, 1, 2]);
        assert!(Segment::regex("(").is_err());
    }

    #[test]
    fn lexicon_rule_gating_metadata() {
        let rule = AllomorphRule::lexicon("stem", 5);
        assert_eq!(rule.first_char(), None);
        assert_eq!(rule.required_literals().count(), 0);

        let suffix = AllomorphRule {
            name: "ssa".into(),
            tag: None,
            program: vec![AllomorphOp::literal("ssa"), AllomorphOp::class(CharClass::of(ClassMask::NUMERIC), 1, None)],
        };
        assert_eq!(suffix.first_char(), Some('s'));
        assert_eq!(suffix.required_literals().collect::<Vec<_>>(), vec!["ssa"]);
        assert_eq!(suffix.required_classes().collect::<Vec<_>>(), vec![ClassMask::NUMERIC]);
    }

    #[test]
    fn validation_reports_undefined_symbols_and_bad_children() {
        let mut symbols = SymbolTable::new();
        let noun = symbols.intern("noun");
        let ghost = Symbol::new(42);

        let mut rules = RuleSet {
            combination: vec![CombinationRule {
                name: "noun -> word".into(),
                pattern: vec![TagPattern::Tag(noun)],
                result: ghost,
                ops: vec![],
            }],
            ..RuleSet::default()
        };
        assert!(matches!(
            rules.validate(&symbols),
            Err(ProjectError::Integrity { source: IntegrityError::UndefinedSymbol(s), .. }) if s == ghost
        ));

        rules.combination[0].result = noun;
        rules.combination[0].ops = vec![CombineOp::Child(3)];
        assert!(matches!(
            rules.validate(&symbols),
            Err(ProjectError::Integrity { source: IntegrityError::ChildOutOfRange { index: 3, arity: 1 }, .. })
        ));

        rules.combination[0].ops.clear();
        rules.combination[0].pattern.clear();
        assert!(matches!(
            rules.validate(&symbols),
            Err(ProjectError::Integrity { source: IntegrityError::EmptyPattern, .. })
        ));
    }

    fn allomorph(tag: Option<Symbol>, program: Vec<AllomorphOp>) -> Result<(), IntegrityError> {
        let mut symbols = SymbolTable::new();
        symbols.intern("noun");
        AllomorphRule { name: "r".into(), tag, program }.validate(&symbols)
    }

    #[test]
    fn captures_must_be_closed_on_every_path() {
        let noun = Some(Symbol::new(0));
        let lookup = vec![AllomorphOp::literal("ta"), AllomorphOp::Lookup { capture: 3 }];
        assert_eq!(allomorph(noun, lookup), Err(IntegrityError::UnknownCapture(3)));
        assert_eq!(allomorph(noun, vec![AllomorphOp::EndCapture(1)]), Err(IntegrityError::UnknownCapture(1)));

        let open_only =
            vec![AllomorphOp::BeginCapture(0), AllomorphOp::any(1, None), AllomorphOp::Lookup { capture: 0 }];
        assert_eq!(allomorph(noun, open_only), Err(IntegrityError::UnknownCapture(0)));

        let one_branch = vec![
            AllomorphOp::Alternatives(vec![
                vec![AllomorphOp::BeginCapture(2), AllomorphOp::literal("s"), AllomorphOp::EndCapture(2)],
                vec![AllomorphOp::literal("ss")],
            ]),
            AllomorphOp::Assign { attr: Symbol::new(0), source: ValueSource::Capture(2) },
        ];
        assert_eq!(allomorph(noun, one_branch), Err(IntegrityError::UnknownCapture(2)));

        let both_branches = vec![
            AllomorphOp::Alternatives(vec![
                vec![AllomorphOp::BeginCapture(2), AllomorphOp::literal("s"), AllomorphOp::EndCapture(2)],
                vec![AllomorphOp::BeginCapture(2), AllomorphOp::literal("ss"), AllomorphOp::EndCapture(2)],
            ]),
            AllomorphOp::Assign { attr: Symbol::new(0), source: ValueSource::Capture(2) },
        ];
        assert_eq!(allomorph(noun, both_branches), Ok(()));
        assert_eq!(allomorph(None, AllomorphRule::lexicon("stem", 4).program), Ok(()));
    }

    #[test]
    fn untagged_rules_must_tag_every_path() {
        assert_eq!(allomorph(None, vec![AllomorphOp::literal("ta")]), Err(IntegrityError::MissingTag));

        let noun = Symbol::new(0);
        let partial =
            vec![AllomorphOp::Alternatives(vec![vec![AllomorphOp::Tag(noun)], vec![AllomorphOp::literal("a")]])];
        assert_eq!(allomorph(None, partial), Err(IntegrityError::MissingTag));

        let total = vec![AllomorphOp::Alternatives(vec![
            vec![AllomorphOp::Tag(noun)],
            vec![AllomorphOp::literal("a"), AllomorphOp::Tag(noun)],
        ])];
        assert_eq!(allomorph(None, total), Ok(()));
        assert_eq!(allomorph(None, vec![AllomorphOp::Alternatives(vec![])]), Ok(()));
    }

    #[test]
    fn validation_rejects_duplicate_names() {
        let mut symbols = SymbolTable::new();
        let noun = symbols.intern("noun");
        let rule = AllomorphRule { name: "dup".into(), tag: Some(noun), program: vec![] };
        let rules = RuleSet { allomorph: vec![rule.clone(), rule], ..RuleSet::default() };

        assert!(matches!(rules.validate(&symbols), Err(ProjectError::DuplicateRule(name)) if name == "dup"));
    }
}
