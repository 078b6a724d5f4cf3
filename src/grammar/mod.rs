//! Dependency grammar over class names, and the parsers built on it.
//!
//! A grammar file lists which classes may head which others:
//!
//! ```text
//! # noteheads attach to stems and ledger lines
//! notehead-*      | stem ledger_line
//! beam            | stem   # trailing comments are allowed
//! ```
//!
//! Each line expands to every `(head, child)` pair of its left and right
//! token lists. A token may contain one `*`, which matches every alphabet
//! name with the same prefix and suffix.

mod parser;

pub use parser::{
    DictVectorizer, FeatureVectorizer, LinearClassifier, LinearPairModel, MarkParser, PairClassifier,
    PairFeatures, PairwiseClassifierParser, PermissiveParser,
};

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ScoremarkError;
use crate::model::{AnnotationModel, Catalog, EdgeKey, Mark};

/// A set of allowed `(head, child)` class-name pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyGrammar {
    alphabet: BTreeSet<String>,
    rules: BTreeSet<(String, String)>,
}

impl DependencyGrammar {
    /// Parses grammar text against an alphabet of class names.
    ///
    /// Every line naming a class outside the alphabet is reported, then the
    /// load fails with [`ScoremarkError::GrammarAlphabetMismatch`].
    pub fn parse<I, S>(source: &str, alphabet: I) -> Result<Self, ScoremarkError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let alphabet: BTreeSet<String> = alphabet.into_iter().map(Into::into).collect();
        let mut rules = BTreeSet::new();
        let mut missing: Vec<String> = Vec::new();
        let mut bad_lines: Vec<usize> = Vec::new();

        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let content = raw.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }

            let (lhs, rhs) = content.split_once('|').ok_or_else(|| syntax(line, "missing '|'"))?;
            if rhs.contains('|') {
                return Err(syntax(line, "more than one '|'"));
            }

            let mut line_missing = Vec::new();
            let heads = expand_side(lhs, &alphabet, line, &mut line_missing)?;
            let children = expand_side(rhs, &alphabet, line, &mut line_missing)?;
            if !line_missing.is_empty() {
                tracing::warn!(
                    line,
                    names = %line_missing.join(", "),
                    "grammar names classes missing from the alphabet"
                );
                for name in line_missing {
                    if !missing.contains(&name) {
                        missing.push(name);
                    }
                }
                bad_lines.push(line);
                continue;
            }

            for head in &heads {
                for child in &children {
                    rules.insert((head.clone(), child.clone()));
                }
            }
        }

        if !missing.is_empty() {
            return Err(ScoremarkError::GrammarAlphabetMismatch {
                missing,
                lines: bad_lines,
            });
        }
        tracing::debug!(rules = rules.len(), "grammar loaded");
        Ok(Self { alphabet, rules })
    }

    /// Reads and parses a grammar file.
    pub fn from_file<I, S>(path: &Path, alphabet: I) -> Result<Self, ScoremarkError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source, alphabet)
    }

    /// Parses grammar text using the catalog's class names as alphabet.
    pub fn for_catalog(source: &str, catalog: &Catalog) -> Result<Self, ScoremarkError> {
        Self::parse(source, catalog.names())
    }

    pub fn alphabet(&self) -> &BTreeSet<String> {
        &self.alphabet
    }

    /// Rules in lexicographic order.
    pub fn rules(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules
            .iter()
            .map(|(head, child)| (head.as_str(), child.as_str()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_head(&self, head: &str, child: &str) -> bool {
        self.rules.contains(&(head.to_string(), child.to_string()))
    }

    /// Classes that may head `child`.
    pub fn heads_of<'a>(&'a self, child: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rules
            .iter()
            .filter(move |(_, c)| c == child)
            .map(|(head, _)| head.as_str())
    }

    /// Classes `head` may govern.
    pub fn children_of<'a>(&'a self, head: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rules
            .iter()
            .filter(move |(h, _)| h == head)
            .map(|(_, child)| child.as_str())
    }

    /// Returns true if an edge `from -> to` is allowed by class.
    pub fn validate_edge(&self, from: &Mark, to: &Mark) -> bool {
        self.is_head(&from.class_name, &to.class_name)
    }

    /// Edges of the model whose class pair is not a rule, in edge order.
    pub fn violations(&self, model: &AnnotationModel) -> Vec<EdgeKey> {
        model
            .graph()
            .edges()
            .keys()
            .filter(|(from, to)| match (model.mark(*from), model.mark(*to)) {
                (Some(from), Some(to)) => !self.validate_edge(from, to),
                _ => true,
            })
            .copied()
            .collect()
    }
}

fn syntax(line: usize, message: &str) -> ScoremarkError {
    ScoremarkError::GrammarSyntax {
        line,
        message: message.to_string(),
    }
}

fn expand_side(
    side: &str,
    alphabet: &BTreeSet<String>,
    line: usize,
    missing: &mut Vec<String>,
) -> Result<Vec<String>, ScoremarkError> {
    let tokens: Vec<&str> = side.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(syntax(line, "empty side of a rule"));
    }

    let mut names = Vec::new();
    for token in tokens {
        match token.matches('*').count() {
            0 => {
                if alphabet.contains(token) {
                    names.push(token.to_string());
                } else {
                    missing.push(token.to_string());
                }
            }
            1 => {
                let (prefix, suffix) = token.split_once('*').unwrap_or((token, ""));
                let before = names.len();
                names.extend(
                    alphabet
                        .iter()
                        .filter(|name| {
                            name.len() >= prefix.len() + suffix.len()
                                && name.starts_with(prefix)
                                && name.ends_with(suffix)
                        })
                        .cloned(),
                );
                if names.len() == before {
                    tracing::warn!(line, token, "wildcard matches no class");
                }
            }
            _ => return Err(syntax(line, "token has more than one '*'")),
        }
    }
    Ok(names)
}
