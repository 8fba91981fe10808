//! Alignment and scoring of timex layers.
//!
//! Two documents over the same text, one carrying hand-annotated gold
//! timexes and one a tagger's output, are compared in two passes: strict
//! alignment by exact span equality ([`diff`]), then relaxed resolution of
//! overlapping leftovers by greedy best-score assignment ([`align`]).
//! Integer-count accumulators ([`stats`]) roll up across documents and
//! subcorpora; [`report`] derives precision/recall/F1 and renders logs.

pub mod align;
pub mod diff;
pub mod reduce;
pub mod report;
pub mod stats;

pub use align::{match_score, relax_conflicts, MatchedPair, RelaxedAlignment};
pub use diff::{diff_layers, DiffEntry, LayerDiff, SpanStatus};
pub use reduce::{reduce_timex_layer, BASIC_ATTRIBUTES, COMPARED_ATTRIBUTES, POINT_ATTRIBUTES};
pub use report::{document_log, EvalReport, MetricRow};
pub use stats::{AttrCounts, DiffStats};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::tagger::TimexTagger;

/// Everything computed while evaluating one document.
#[derive(Debug, Clone)]
pub struct DocumentEvaluation {
    /// Strict alignment of the reduced layers.
    pub diff: LayerDiff,
    /// Greedily resolved conflicts.
    pub relaxed: RelaxedAlignment,
    /// This document's counts (a one-document accumulator).
    pub stats: DiffStats,
}

/// Evaluate a system layer against a gold layer.
///
/// Both layers may live on the same document or on two documents with
/// identical text; differing text is an error, since span offsets would not
/// be comparable.
pub fn evaluate_document(
    gold_document: &Document,
    system_document: &Document,
    gold_layer: &str,
    system_layer: &str,
) -> Result<DocumentEvaluation> {
    if gold_document.text() != system_document.text() {
        return Err(Error::evaluation(
            "gold and system documents carry different text".to_string(),
        ));
    }
    let gold = gold_document.layer(gold_layer).ok_or_else(|| {
        Error::evaluation(format!("gold document has no layer named {gold_layer:?}"))
    })?;
    let system = system_document.layer(system_layer).ok_or_else(|| {
        Error::evaluation(format!(
            "system document has no layer named {system_layer:?}"
        ))
    })?;
    let gold_reduced = reduce_timex_layer(gold, "gold_reduced")?;
    let system_reduced = reduce_timex_layer(system, "system_reduced")?;
    let diff = diff_layers(&gold_reduced, &system_reduced)?;
    let relaxed = relax_conflicts(&diff)?;
    let mut stats = DiffStats::new();
    stats.accumulate(&diff, &relaxed)?;
    Ok(DocumentEvaluation {
        diff,
        relaxed,
        stats,
    })
}

/// Run a tagger on a document and evaluate its output layer against the
/// document's gold layer.
pub fn tag_and_evaluate(
    tagger: &dyn TimexTagger,
    document: &mut Document,
    gold_layer: &str,
    system_layer: &str,
) -> Result<DocumentEvaluation> {
    tagger.tag(document)?;
    evaluate_document(document, document, gold_layer, system_layer)
}
