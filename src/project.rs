//! The loaded grammar.
//!
//! A [`Project`] is assembled once (by a loader reading a compiled grammar,
//! or in code through [`ProjectBuilder`]), validated, indexed, and then only
//! read. It is `Send + Sync`; concurrent analyses share it behind an `Arc`.

use crate::api::{self, Analysis, Options};
use crate::avs::{Avs, Value};
use crate::engine::CompiledRules;
use crate::error::{IntegrityError, ProjectError, Result};
use crate::lexicon::Lexicon;
use crate::rules::{AllomorphRule, CombinationRule, RuleSet};
use crate::symbols::{Symbol, SymbolTable};
use log::debug;

/// Symbol table, lexicon and rules of one grammar.
#[derive(Debug)]
pub struct Project {
    symbols: SymbolTable,
    lexicon: Lexicon,
    rules: RuleSet,
    info: Vec<String>,
    compiled: CompiledRules,
}

impl Project {
    /// Assemble a project from already-parsed parts.
    ///
    /// Every symbol referenced by a rule or lexicon entry must be defined in
    /// `symbols`, and every combination rule must have a non-empty pattern
    /// whose indices its operations stay within.
    pub fn new(symbols: SymbolTable, lexicon: Lexicon, rules: RuleSet) -> Result<Self, ProjectError> {
        rules.validate(&symbols)?;
        for (stem, entry) in lexicon.iter() {
            let undefined = std::iter::once(entry.tag).chain(entry.avs.symbols()).find(|s| !symbols.contains(*s));
            if let Some(sym) = undefined {
                return Err(ProjectError::Integrity {
                    rule: format!("lexicon entry `{stem}`"),
                    source: IntegrityError::UndefinedSymbol(sym),
                });
            }
        }

        let compiled = CompiledRules::new(&rules);
        debug!(
            "[project] {} symbols, {} lexicon readings, {} allomorph rules, {} combination rules",
            symbols.len(),
            lexicon.len(),
            rules.allomorph.len(),
            rules.combination.len()
        );
        Ok(Project { symbols, lexicon, rules, info: Vec::new(), compiled })
    }

    /// Attach free-form information about the grammar (author, version, ...).
    pub fn with_info(mut self, info: Vec<String>) -> Self {
        self.info = info;
        self
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn info(&self) -> &[String] {
        &self.info
    }

    pub(crate) fn compiled(&self) -> &CompiledRules {
        &self.compiled
    }

    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name)
    }

    /// Name of `sym`, falling back to `#id` for foreign ids.
    pub fn name_of(&self, sym: Symbol) -> String {
        self.symbols.name(sym).map(str::to_string).unwrap_or_else(|| format!("#{}", sym.as_u32()))
    }

    /// Analyse `text` with default [`Options`].
    pub fn analyze(&self, text: &str) -> Result<Analysis> {
        api::analyze_with(self, text, &Options::default())
    }
}

/// Assembles a [`Project`] in code, interning names on the way.
///
/// ```
/// use allomorph::{ProjectBuilder, TagPattern, combination_rule};
///
/// let mut b = ProjectBuilder::new();
/// b.lexeme("talo", "noun", &[("class", "noun"), ("case", "nominative")]);
/// b.with_lexicon_rule("stem");
/// let (noun, word) = (b.symbol("noun"), b.symbol("word"));
/// b.combination(combination_rule! { name: "noun -> word", pattern: [TagPattern::Tag(noun)], result: word });
/// b.accept("word");
///
/// let project = b.build().unwrap();
/// assert_eq!(project.analyze("talo").unwrap().trees.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ProjectBuilder {
    symbols: SymbolTable,
    lexicon: Lexicon,
    rules: RuleSet,
    info: Vec<String>,
    lexicon_rule: Option<String>,
    /// First attribute given two values that do not unify.
    conflict: Option<String>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`.
    pub fn symbol(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// Structure whose values are all symbols. Repeated attributes are
    /// unified; on a conflict the empty structure is returned and
    /// [`build`](Self::build) fails with [`ProjectError::ConflictingValues`].
    pub fn avs(&mut self, pairs: &[(&str, &str)]) -> Avs {
        let interned: Vec<(Symbol, Value)> = pairs
            .iter()
            .map(|(attr, value)| (self.symbols.intern(attr), Value::Symbol(self.symbols.intern(value))))
            .collect();
        match Avs::from_pairs(interned) {
            Some(avs) => avs,
            None => {
                if self.conflict.is_none() {
                    self.conflict = first_conflict(pairs).map(str::to_string);
                }
                Avs::empty()
            }
        }
    }

    /// Add a lexicon reading of `stem` with class `tag`.
    pub fn lexeme(&mut self, stem: &str, tag: &str, pairs: &[(&str, &str)]) -> &mut Self {
        let tag = self.symbols.intern(tag);
        let avs = self.avs(pairs);
        self.lexicon.insert(stem, avs, tag);
        self
    }

    /// Add a lexicon reading with a ready-made structure.
    pub fn lexeme_avs(&mut self, stem: &str, tag: Symbol, avs: Avs) -> &mut Self {
        self.lexicon.insert(stem, avs, tag);
        self
    }

    pub fn allomorph(&mut self, rule: AllomorphRule) -> &mut Self {
        self.rules.allomorph.push(rule);
        self
    }

    pub fn combination(&mut self, rule: CombinationRule) -> &mut Self {
        self.rules.combination.push(rule);
        self
    }

    /// Add an allomorph rule named `name` that matches every lexicon stem.
    /// Its length bound is taken from the lexicon when the project is built.
    pub fn with_lexicon_rule(&mut self, name: &str) -> &mut Self {
        self.lexicon_rule = Some(name.to_string());
        self
    }

    /// Accept nodes of class `tag` as complete analyses.
    pub fn accept(&mut self, tag: &str) -> &mut Self {
        let tag = self.symbols.intern(tag);
        if !self.rules.accept.contains(&tag) {
            self.rules.accept.push(tag);
        }
        self
    }

    pub fn info(&mut self, line: &str) -> &mut Self {
        self.info.push(line.to_string());
        self
    }

    pub fn build(mut self) -> Result<Project, ProjectError> {
        if let Some(attr) = self.conflict.take() {
            return Err(ProjectError::ConflictingValues { attr });
        }
        if let Some(name) = self.lexicon_rule.take() {
            self.rules.allomorph.insert(0, AllomorphRule::lexicon(&name, self.lexicon.longest_stem()));
        }
        Ok(Project::new(self.symbols, self.lexicon, self.rules)?.with_info(self.info))
    }
}

fn first_conflict<'a>(pairs: &[(&'a str, &str)]) -> Option<&'a str> {
    pairs.iter().enumerate().find_map(|(i, (attr, value))| {
        pairs[..i].iter().any(|(a, v)| a == attr && v != value).then_some(*attr)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{AllomorphOp, TagPattern};

    #[test]
    fn builder_interns_names_and_adds_lexicon_rule() {
        let mut b = ProjectBuilder::new();
        b.lexeme("talo", "noun", &[("class", "noun")]);
        b.with_lexicon_rule("stem");
        b.accept("noun");
        b.info("test grammar");
        let project = b.build().unwrap();

        assert_eq!(project.rules().allomorph[0].name, "stem");
        assert_eq!(project.lexicon().lookup("talo").len(), 1);
        assert_eq!(project.info(), ["test grammar".to_string()]);
        assert_eq!(project.name_of(project.symbol("noun").unwrap()), "noun");
        assert_eq!(project.name_of(Symbol::new(999)), "#999");
    }

    #[test]
    fn lexicon_with_foreign_symbols_is_rejected() {
        let symbols = SymbolTable::new();
        let mut lexicon = Lexicon::new();
        lexicon.insert("talo", Avs::empty(), Symbol::new(3));

        let err = Project::new(symbols, lexicon, RuleSet::default()).unwrap_err();
        assert!(matches!(err, ProjectError::Integrity { source: IntegrityError::UndefinedSymbol(_), .. }));
    }

    #[test]
    fn invalid_rules_fail_the_build() {
        let mut b = ProjectBuilder::new();
        let noun = b.symbol("noun");
        b.allomorph(allomorph_rule! { name: "a", tag: noun, program: [AllomorphOp::literal("a")] });
        b.combination(combination_rule! { name: "broken", pattern: [TagPattern::Tag(noun)], result: noun, ops: [crate::CombineOp::Child(1)] });

        assert!(matches!(b.build(), Err(ProjectError::Integrity { rule, .. }) if rule == "broken"));
    }

    #[test]
    fn repeated_attributes_are_unified() {
        let mut b = ProjectBuilder::new();
        let avs = b.avs(&[("case", "nominative"), ("class", "noun"), ("case", "nominative")]);
        assert_eq!(avs.len(), 2);
        assert!(b.build().is_ok());
    }

    #[test]
    fn conflicting_attributes_fail_the_build() {
        let mut b = ProjectBuilder::new();
        b.lexeme("talo", "noun", &[("case", "nominative"), ("case", "genitive")]);
        b.with_lexicon_rule("stem");

        assert!(matches!(b.build(), Err(ProjectError::ConflictingValues { attr }) if attr == "case"));
    }

    #[test]
    fn project_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Project>();
    }
}
