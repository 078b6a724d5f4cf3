//! Annotation validation.
//!
//! This module checks an [`AnnotationModel`] for:
//! - Class integrity (known class ids, catalog-consistent names)
//! - Geometric validity (boxes inside the image, non-empty coverage)
//! - Graph consistency (link mirrors agree with the edge set)
//! - Grammar conformance, when a grammar is supplied

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use crate::grammar::DependencyGrammar;
use crate::model::{AnnotationModel, Mark};

/// Options for validation behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValidateOptions<'a> {
    /// Edges are checked against this grammar when set.
    pub grammar: Option<&'a DependencyGrammar>,
}

/// Validates a model and returns a report of all issues found.
///
/// Class checks run only when a catalog is loaded and bounds checks only
/// when an image is loaded, so a bare model with marks validates cleanly.
pub fn validate_model(model: &AnnotationModel, opts: &ValidateOptions<'_>) -> ValidationReport {
    let mut report = ValidationReport::new();

    for mark in model.marks() {
        validate_class(model, mark, &mut report);
        validate_geometry(model, mark, &mut report);
        validate_links(model, mark, &mut report);
    }

    if let Some(grammar) = opts.grammar {
        for (from, to) in grammar.violations(model) {
            let class_of = |id| {
                model
                    .mark(id)
                    .map_or_else(|| "?".to_string(), |m: &Mark| m.class_name.clone())
            };
            report.add(ValidationIssue::warning(
                IssueCode::GrammarViolation,
                format!(
                    "No grammar rule allows '{}' -> '{}'",
                    class_of(from),
                    class_of(to)
                ),
                IssueContext::Edge {
                    from: from.as_u64(),
                    to: to.as_u64(),
                },
            ));
        }
    }

    report
}

fn validate_class(model: &AnnotationModel, mark: &Mark, report: &mut ValidationReport) {
    let catalog = model.catalog();
    if catalog.is_empty() {
        return;
    }
    let id = mark.id.as_u64();
    match catalog.by_id(mark.class_id) {
        None => report.add(ValidationIssue::error(
            IssueCode::UnknownClass,
            format!("References unknown class {}", mark.class_id),
            IssueContext::Mark { id },
        )),
        Some(def) if def.name != mark.class_name => report.add(ValidationIssue::warning(
            IssueCode::ClassNameMismatch,
            format!(
                "Class name '{}' differs from catalog name '{}' for class {}",
                mark.class_name, def.name, mark.class_id
            ),
            IssueContext::Mark { id },
        )),
        Some(_) => {}
    }
}

fn validate_geometry(model: &AnnotationModel, mark: &Mark, report: &mut ValidationReport) {
    let id = mark.id.as_u64();
    let bbox = mark.bbox();

    if bbox.is_empty() {
        report.add(ValidationIssue::warning(
            IssueCode::EmptyMark,
            format!("Zero-area box {}", bbox),
            IssueContext::Mark { id },
        ));
    } else if mark.pixel_count() == 0 {
        report.add(ValidationIssue::warning(
            IssueCode::EmptyMark,
            "Mask has no set pixels",
            IssueContext::Mark { id },
        ));
    }

    if let Some(image) = model.image() {
        if !bbox.is_within(image.height(), image.width()) {
            report.add(ValidationIssue::error(
                IssueCode::OutOfBounds,
                format!(
                    "Box {} extends outside the {}x{} image",
                    bbox,
                    image.height(),
                    image.width()
                ),
                IssueContext::Mark { id },
            ));
        }
    }
}

fn validate_links(model: &AnnotationModel, mark: &Mark, report: &mut ValidationReport) {
    let graph = model.graph();
    let outgoing = mark.outlinks().iter().map(|to| (mark.id, *to));
    let incoming = mark.inlinks().iter().map(|from| (*from, mark.id));
    for (from, to) in outgoing.chain(incoming) {
        let other = if from == mark.id { to } else { from };
        if model.mark(other).is_none() || !graph.contains(from, to) {
            report.add(ValidationIssue::error(
                IssueCode::DanglingLink,
                format!("Link {} -> {} has no matching edge", from, to),
                IssueContext::Mark {
                    id: mark.id.as_u64(),
                },
            ));
        }
    }
}
