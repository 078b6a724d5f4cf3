//! Edge proposers over a set of marks.
//!
//! Parsers are pure: they return index pairs into the slice they were
//! given and never touch the model. [`AnnotationModel::apply_parser`]
//! turns the proposals into edges.
//!
//! [`AnnotationModel::apply_parser`]: crate::model::AnnotationModel::apply_parser

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::DependencyGrammar;
use crate::error::ScoremarkError;
use crate::model::Mark;

/// Proposes `(head, child)` index pairs for a slice of marks.
pub trait MarkParser {
    fn parse(&self, marks: &[&Mark]) -> Vec<(usize, usize)>;
}

/// Proposes every pair the grammar allows.
#[derive(Clone, Copy, Debug)]
pub struct PermissiveParser<'g> {
    grammar: &'g DependencyGrammar,
}

impl<'g> PermissiveParser<'g> {
    pub fn new(grammar: &'g DependencyGrammar) -> Self {
        Self { grammar }
    }
}

impl MarkParser for PermissiveParser<'_> {
    fn parse(&self, marks: &[&Mark]) -> Vec<(usize, usize)> {
        ordered_pairs(marks.len())
            .filter(|(i, j)| self.grammar.validate_edge(marks[*i], marks[*j]))
            .collect()
    }
}

/// Geometry and classes of a candidate `(from, to)` pair.
///
/// The deltas are `to` minus `from` for each box edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairFeatures {
    pub dt: i64,
    pub dl: i64,
    pub db: i64,
    pub dr: i64,
    pub cls_from: String,
    pub cls_to: String,
}

impl PairFeatures {
    pub fn between(from: &Mark, to: &Mark) -> Self {
        Self {
            dt: to.top() - from.top(),
            dl: to.left() - from.left(),
            db: to.bottom() - from.bottom(),
            dr: to.right() - from.right(),
            cls_from: from.class_name.clone(),
            cls_to: to.class_name.clone(),
        }
    }

    fn numeric(&self) -> [(&'static str, f64); 4] {
        [
            ("dt", self.dt as f64),
            ("dl", self.dl as f64),
            ("db", self.db as f64),
            ("dr", self.dr as f64),
        ]
    }

    fn categorical(&self) -> [(&'static str, &str); 2] {
        [("cls_from", &self.cls_from), ("cls_to", &self.cls_to)]
    }
}

/// Turns pair features into a numeric vector.
pub trait FeatureVectorizer {
    fn vectorize(&self, features: &PairFeatures) -> Vec<f64>;
}

/// Decides whether a vectorized pair is an edge.
pub trait PairClassifier {
    fn predict(&self, vector: &[f64]) -> bool;
}

/// A name-indexed vectorizer: numeric features keep their value, string
/// features are one-hot encoded under `name=value`.
///
/// Unknown feature names and unseen string values contribute nothing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DictVectorizer {
    pub vocabulary: BTreeMap<String, usize>,
}

impl DictVectorizer {
    /// Builds a vocabulary from training samples; columns are sorted by
    /// feature name.
    pub fn fit(samples: &[PairFeatures]) -> Self {
        let mut names: Vec<String> = Vec::new();
        for sample in samples {
            names.extend(sample.numeric().iter().map(|(name, _)| name.to_string()));
            names.extend(
                sample
                    .categorical()
                    .iter()
                    .map(|(name, value)| format!("{name}={value}")),
            );
        }
        names.sort();
        names.dedup();
        Self {
            vocabulary: names
                .into_iter()
                .enumerate()
                .map(|(idx, name)| (name, idx))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }
}

impl FeatureVectorizer for DictVectorizer {
    fn vectorize(&self, features: &PairFeatures) -> Vec<f64> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        for (name, value) in features.numeric() {
            if let Some(idx) = self.vocabulary.get(name) {
                vector[*idx] = value;
            }
        }
        for (name, value) in features.categorical() {
            if let Some(idx) = self.vocabulary.get(&format!("{name}={value}")) {
                vector[*idx] = 1.0;
            }
        }
        vector
    }
}

/// `w · x + b > 0`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearClassifier {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl PairClassifier for LinearClassifier {
    fn predict(&self, vector: &[f64]) -> bool {
        let score: f64 = self
            .weights
            .iter()
            .zip(vector)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        score > 0.0
    }
}

/// A fitted vectorizer and linear classifier, stored together as JSON:
///
/// ```text
/// {"vectorizer": {"vocabulary": {"dt": 0, "cls_from=stem": 1}},
///  "classifier": {"weights": [0.5, 1.0], "bias": -0.2}}
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearPairModel {
    pub vectorizer: DictVectorizer,
    pub classifier: LinearClassifier,
}

impl LinearPairModel {
    pub fn from_json_file(path: &Path) -> Result<Self, ScoremarkError> {
        let file = File::open(path).map_err(ScoremarkError::Io)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ScoremarkError::JsonParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A parser over this model, optionally restricted to grammar pairs.
    pub fn parser<'g>(
        &self,
        prefilter: Option<&'g DependencyGrammar>,
    ) -> PairwiseClassifierParser<'g, DictVectorizer, LinearClassifier> {
        let parser = PairwiseClassifierParser::new(self.vectorizer.clone(), self.classifier.clone());
        match prefilter {
            Some(grammar) => parser.with_prefilter(grammar),
            None => parser,
        }
    }
}

/// Asks a binary classifier about every ordered pair.
///
/// With a grammar prefilter only pairs the grammar allows are classified.
#[derive(Clone, Debug)]
pub struct PairwiseClassifierParser<'g, V, C> {
    vectorizer: V,
    classifier: C,
    prefilter: Option<&'g DependencyGrammar>,
}

impl<'g, V: FeatureVectorizer, C: PairClassifier> PairwiseClassifierParser<'g, V, C> {
    pub fn new(vectorizer: V, classifier: C) -> Self {
        Self {
            vectorizer,
            classifier,
            prefilter: None,
        }
    }

    pub fn with_prefilter(mut self, grammar: &'g DependencyGrammar) -> Self {
        self.prefilter = Some(grammar);
        self
    }
}

impl<V: FeatureVectorizer, C: PairClassifier> MarkParser for PairwiseClassifierParser<'_, V, C> {
    fn parse(&self, marks: &[&Mark]) -> Vec<(usize, usize)> {
        ordered_pairs(marks.len())
            .filter(|(i, j)| {
                self.prefilter
                    .map_or(true, |grammar| grammar.validate_edge(marks[*i], marks[*j]))
            })
            .filter(|(i, j)| {
                let features = PairFeatures::between(marks[*i], marks[*j]);
                self.classifier
                    .predict(&self.vectorizer.vectorize(&features))
            })
            .collect()
    }
}

fn ordered_pairs(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(move |i| (0..n).filter(move |j| *j != i).map(move |j| (i, j)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::IntBBox;

    fn marks() -> Vec<Mark> {
        vec![
            Mark::new(0u64, 1u64, "notehead", IntBBox::new(10, 0, 14, 4)),
            Mark::new(1u64, 2u64, "stem", IntBBox::new(0, 4, 14, 5)),
            Mark::new(2u64, 1u64, "notehead", IntBBox::new(30, 20, 34, 24)),
        ]
    }

    fn grammar() -> DependencyGrammar {
        DependencyGrammar::parse("notehead | stem\n", ["notehead", "stem"]).expect("grammar")
    }

    #[test]
    fn permissive_parser_follows_the_grammar() {
        let owned = marks();
        let refs: Vec<&Mark> = owned.iter().collect();
        let grammar = grammar();
        let pairs = PermissiveParser::new(&grammar).parse(&refs);
        assert_eq!(pairs, vec![(0, 1), (2, 1)]);
    }

    #[test]
    fn pair_features_are_child_minus_head() {
        let owned = marks();
        let features = PairFeatures::between(&owned[0], &owned[1]);
        assert_eq!((features.dt, features.dl, features.db, features.dr), (-10, 4, 0, 1));
        assert_eq!(features.cls_from, "notehead");
        assert_eq!(features.cls_to, "stem");
    }

    #[test]
    fn dict_vectorizer_one_hot_encodes_classes() {
        let owned = marks();
        let sample = PairFeatures::between(&owned[0], &owned[1]);
        let vectorizer = DictVectorizer::fit(std::slice::from_ref(&sample));
        let names: Vec<&str> = vectorizer.vocabulary.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["cls_from=notehead", "cls_to=stem", "db", "dl", "dr", "dt"]
        );
        assert_eq!(
            vectorizer.vectorize(&sample),
            vec![1.0, 1.0, 0.0, 4.0, 1.0, -10.0]
        );

        let unseen = PairFeatures::between(&owned[1], &owned[0]);
        assert_eq!(vectorizer.vectorize(&unseen)[..2], [0.0, 0.0]);
    }

    #[test]
    fn classifier_parser_uses_distance_and_prefilter() {
        let owned = marks();
        let refs: Vec<&Mark> = owned.iter().collect();
        let vectorizer: DictVectorizer = serde_json::from_str(
            r#"{"vocabulary": {"dl": 0, "cls_to=stem": 1}}"#,
        )
        .expect("vectorizer");
        // Favors stems to the right of the head.
        let classifier = LinearClassifier {
            weights: vec![1.0, 20.0],
            bias: -20.5,
        };

        let parser = PairwiseClassifierParser::new(vectorizer.clone(), classifier.clone());
        assert_eq!(parser.parse(&refs), vec![(0, 1)]);

        let grammar = DependencyGrammar::parse("stem | notehead\n", ["notehead", "stem"])
            .expect("grammar");
        let filtered = PairwiseClassifierParser::new(vectorizer, classifier).with_prefilter(&grammar);
        assert!(filtered.parse(&refs).is_empty());
    }

    #[test]
    fn linear_pair_model_loads_from_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"vectorizer": {"vocabulary": {"dl": 0, "cls_to=stem": 1}},
                "classifier": {"weights": [1.0, 20.0], "bias": -20.5}}"#,
        )
        .expect("write");
        let model = LinearPairModel::from_json_file(&path).expect("model");
        let owned = marks();
        let refs: Vec<&Mark> = owned.iter().collect();
        assert_eq!(model.parser(None).parse(&refs), vec![(0, 1)]);

        std::fs::write(&path, "{\"vectorizer\": 3}").expect("write");
        assert!(matches!(
            LinearPairModel::from_json_file(&path),
            Err(ScoremarkError::JsonParse { .. })
        ));
    }
}
