use crate::Span;
use crate::avs::{Avs, Value};
use crate::engine::{self, RunMetrics, RunResult};
use crate::error::{AnalysisError, Result};
use crate::project::Project;
use crate::symbols::Symbol;
use log::{debug, info};
use std::sync::Arc;

/// Per-call analysis options.
///
/// These replace process-wide switches: every call reads its own copy, so
/// concurrent analyses with different options do not interfere.
#[derive(Debug, Clone)]
pub struct Options {
    /// Also return the accepting structures merged into one list value
    /// ([`Analysis::list`]).
    pub combine_as_list: bool,
    /// Keep the whole chart, including rejected combination attempts
    /// ([`Analysis::chart`]).
    pub retain_search_tree: bool,
    /// Format string for an analysed word. Rendering is up to the host.
    pub result_format: String,
    /// Format string for a word without analysis.
    pub unknown_format: String,
    /// Format string for an aborted analysis.
    pub error_format: String,
    /// Maximum number of search steps; `None` is unlimited.
    pub step_budget: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            combine_as_list: false,
            retain_search_tree: false,
            result_format: "%l: %s".to_string(),
            unknown_format: "%l: unknown".to_string(),
            error_format: "%l: error: %e".to_string(),
            step_budget: Some(1_000_000),
        }
    }
}

impl Options {
    /// The format string that applies to the outcome of an analysis.
    pub fn format_for(&self, outcome: &Result<Analysis>) -> &str {
        match outcome {
            Ok(analysis) if analysis.is_unknown() => &self.unknown_format,
            Ok(_) => &self.result_format,
            Err(_) => &self.error_format,
        }
    }
}

/// One analysis: a node of the derivation and everything below it.
///
/// Leaves are morphs produced by allomorph rules; internal nodes are produced
/// by combination rules and their children cover their span left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseTree {
    /// Id of the node in the search chart.
    pub node: usize,
    pub span: Span,
    /// Morph class.
    pub tag: Symbol,
    pub avs: Avs,
    /// Name of the rule that produced the node.
    pub rule: String,
    /// Input text covered by the node.
    pub surface: String,
    pub children: Vec<ParseTree>,
}

impl ParseTree {
    pub fn is_morph(&self) -> bool {
        self.children.is_empty()
    }

    /// Morphs of the tree, left to right.
    pub fn leaves(&self) -> Vec<&ParseTree> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            if tree.is_morph() {
                leaves.push(tree);
            } else {
                stack.extend(tree.children.iter().rev());
            }
        }
        leaves
    }
}

/// A node of the search chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartEntry {
    pub node: usize,
    pub span: Span,
    pub tag: Symbol,
    pub avs: Avs,
    pub rule: String,
    pub surface: String,
    /// Chart ids of the children; empty for morphs.
    pub children: Vec<usize>,
    /// Whether the node is one of the analyses.
    pub accepting: bool,
}

/// A combination rule whose children matched by class but did not combine.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedAttempt {
    pub rule: String,
    pub span: Span,
    pub children: Vec<usize>,
}

/// The whole search chart in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchChart {
    pub entries: Vec<ChartEntry>,
    pub rejected: Vec<RejectedAttempt>,
}

/// Result of [`analyze`] and [`analyze_with`].
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The analysed input.
    pub text: String,
    /// Every analysis in discovery order. Empty for an unknown word.
    pub trees: Vec<ParseTree>,
    /// Structures of all analyses as one list, with
    /// [`Options::combine_as_list`].
    pub list: Option<Value>,
    /// Full chart, with [`Options::retain_search_tree`].
    pub chart: Option<SearchChart>,
    pub metrics: RunMetrics,
}

impl Analysis {
    /// Whether no analysis was found.
    pub fn is_unknown(&self) -> bool {
        self.trees.is_empty()
    }
}

/// Analyse `text` against `project` with default [`Options`].
pub fn analyze(project: &Project, text: &str) -> Result<Analysis> {
    analyze_with(project, text, &Options::default())
}

/// Analyse `text` against `project`.
///
/// Finding nothing is not an error; see [`Analysis::is_unknown`]. Errors
/// mean the grammar is corrupt or the step budget ran out.
pub fn analyze_with(project: &Project, text: &str, options: &Options) -> Result<Analysis> {
    let RunResult { trees, chart, metrics } = engine::Analyzer::new(project, text, options).run_with_metrics()?;
    let list = options
        .combine_as_list
        .then(|| Value::list(trees.iter().map(|tree| Value::Avs(tree.avs.clone())).collect()));

    debug!("[analyze] {:?}: {} analyses in {:?}", text, trees.len(), metrics.total);
    Ok(Analysis { text: text.to_string(), trees, list, chart, metrics })
}

/// Handle owning the loaded project of a host.
///
/// A session is initialised with a project and can be terminated any number
/// of times; analysing without a project fails with
/// [`AnalysisError::NotLoaded`]. Clones share the project.
///
/// ```
/// use std::sync::Arc;
/// use allomorph::{AnalysisError, ProjectBuilder, Session};
///
/// let mut b = ProjectBuilder::new();
/// b.lexeme("talo", "noun", &[("class", "noun")]);
/// b.with_lexicon_rule("stem");
/// let mut session = Session::new();
/// session.initialize(Arc::new(b.build().unwrap()));
/// assert_eq!(session.analyze("talo").unwrap().trees.len(), 1);
///
/// session.terminate();
/// session.terminate();
/// assert_eq!(session.analyze("talo").unwrap_err(), AnalysisError::NotLoaded);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Session {
    project: Option<Arc<Project>>,
    options: Options,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(project: Arc<Project>) -> Self {
        Session { project: Some(project), options: Options::default() }
    }

    /// Load `project`, replacing any previous one.
    pub fn initialize(&mut self, project: Arc<Project>) {
        info!("[session] project loaded ({} symbols)", project.symbols().len());
        self.project = Some(project);
    }

    /// Drop the project. Calling this again is a no-op.
    pub fn terminate(&mut self) {
        if self.project.take().is_some() {
            info!("[session] project unloaded");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.project.is_some()
    }

    pub fn project(&self) -> Result<&Arc<Project>> {
        self.project.as_ref().ok_or(AnalysisError::NotLoaded)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn set_options(&mut self, options: Options) {
        self.options = options;
    }

    /// Analyse `text` with the session's options.
    pub fn analyze(&self, text: &str) -> Result<Analysis> {
        self.analyze_with(text, &self.options)
    }

    pub fn analyze_with(&self, text: &str, options: &Options) -> Result<Analysis> {
        analyze_with(self.project()?, text, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectBuilder;

    fn project() -> Arc<Project> {
        let mut b = ProjectBuilder::new();
        b.lexeme("talo", "noun", &[("class", "noun")]);
        b.with_lexicon_rule("stem");
        Arc::new(b.build().unwrap())
    }

    fn tree(children: Vec<ParseTree>, start: usize, end: usize) -> ParseTree {
        ParseTree {
            node: 0,
            span: Span { start, end },
            tag: Symbol::new(0),
            avs: Avs::empty(),
            rule: "r".into(),
            surface: String::new(),
            children,
        }
    }

    #[test]
    fn default_options_match_the_classic_formats() {
        let options = Options::default();
        assert!(!options.combine_as_list);
        assert!(!options.retain_search_tree);
        assert_eq!(options.result_format, "%l: %s");
        assert_eq!(options.step_budget, Some(1_000_000));
    }

    #[test]
    fn leaves_are_in_input_order() {
        let t = tree(vec![tree(vec![tree(vec![], 0, 2), tree(vec![], 2, 4)], 0, 4), tree(vec![], 4, 7)], 0, 7);
        let spans: Vec<(usize, usize)> = t.leaves().iter().map(|l| (l.span.start, l.span.end)).collect();
        assert_eq!(spans, vec![(0, 2), (2, 4), (4, 7)]);
        assert!(!t.is_morph());
    }

    #[test]
    fn session_requires_a_project() {
        let mut session = Session::new();
        assert!(!session.is_loaded());
        assert_eq!(session.analyze("talo").unwrap_err(), AnalysisError::NotLoaded);

        session.initialize(project());
        assert!(session.is_loaded());
        assert_eq!(session.analyze("talo").unwrap().trees.len(), 1);

        session.terminate();
        session.terminate();
        assert!(!session.is_loaded());
        assert!(matches!(session.project(), Err(AnalysisError::NotLoaded)));
    }

    #[test]
    fn session_options_apply_to_every_call() {
        let mut session = Session::with_project(project());
        session.set_options(Options { combine_as_list: true, ..Options::default() });
        let analysis = session.analyze("talo").unwrap();
        assert_eq!(analysis.list.as_ref().and_then(Value::as_list).map(<[Value]>::len), Some(1));
        assert!(session.options().combine_as_list);
    }

    #[test]
    fn format_for_distinguishes_outcomes() {
        let project = project();
        let options = Options::default();
        assert_eq!(options.format_for(&analyze(&project, "talo")), "%l: %s");
        assert_eq!(options.format_for(&analyze(&project, "xyz")), "%l: unknown");
        assert_eq!(options.format_for(&Err(AnalysisError::NotLoaded)), "%l: error: %e");
    }
}
