//! Metric derivation and report rendering.
//!
//! Recall is the share of gold spans the system reproduced, precision the
//! share of system spans present in gold; both count `unchanged + modified`
//! spans as hits and default to 0 on empty denominators. Reports are plain
//! text blocks, one line per metric row, matching the evaluation logs the
//! corpus tooling around this crate expects.

use serde::{Deserialize, Serialize};

use crate::document::{AttrValue, Document};
use crate::eval::align::RelaxedAlignment;
use crate::eval::diff::{LayerDiff, SpanStatus};
use crate::eval::reduce::{BASIC_ATTRIBUTES, COMPARED_ATTRIBUTES};
use crate::eval::stats::DiffStats;

/// One precision/recall/F1 row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    /// Recall.
    pub recall: f64,
    /// Precision.
    pub precision: f64,
    /// F1 (harmonic mean of precision and recall).
    pub f1: f64,
}

impl MetricRow {
    /// Build a row from hit/relevant/retrieved counts; empty denominators
    /// yield 0.
    #[must_use]
    pub fn from_counts(hits: u64, relevant: u64, retrieved: u64) -> Self {
        let recall = ratio(hits, relevant);
        let precision = ratio(hits, retrieved);
        let f1 = if recall + precision > 0.0 {
            2.0 * recall * precision / (recall + precision)
        } else {
            0.0
        };
        Self {
            recall,
            precision,
            f1,
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Derived evaluation results for one accumulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalReport {
    /// Documents folded into the accumulator.
    pub documents: u64,
    /// Total gold annotations.
    pub gold_annotations: u64,
    /// Total system annotations.
    pub auto_annotations: u64,
    /// Span extent metrics under relaxed alignment.
    pub extent_relaxed: MetricRow,
    /// Span extent metrics under strict alignment.
    pub extent_strict: MetricRow,
    /// Per-attribute rows `(attribute, metrics, accuracy)` in reporting
    /// order.
    pub attributes: Vec<(String, MetricRow, f64)>,
}

impl EvalReport {
    /// Derive a report from an accumulator.
    #[must_use]
    pub fn from_stats(stats: &DiffStats) -> Self {
        let hits = stats.unchanged_spans + stats.modified_spans;
        let mut attributes = Vec::new();
        for &attr in BASIC_ATTRIBUTES {
            let counts = stats.attributes.get(attr).copied().unwrap_or_default();
            let row = MetricRow::from_counts(counts.correct, counts.relevant, counts.retrieved);
            let accuracy = ratio(counts.matching, counts.total);
            attributes.push((attr.to_string(), row, accuracy));
        }
        Self {
            documents: stats.documents,
            gold_annotations: stats.total_gold_annotations,
            auto_annotations: stats.total_auto_annotations,
            extent_relaxed: MetricRow::from_counts(
                hits,
                stats.gold_spans_lenient,
                stats.auto_spans_lenient,
            ),
            extent_strict: MetricRow::from_counts(hits, stats.gold_spans, stats.auto_spans),
            attributes,
        }
    }

    /// Render the report as log lines. The first line holds the title (or
    /// stays empty for the caller to fill in).
    #[must_use]
    pub fn render(&self, title: Option<&str>, report_attr_accuracy: bool) -> Vec<String> {
        let mut lines = vec![title.unwrap_or_default().to_string()];
        if self.documents > 1 {
            lines.push(format!(" Documents evaluated: {}", self.documents));
        }
        lines.push(format!(" Auto annotations:  {}", self.auto_annotations));
        lines.push(format!(" Gold annotations:  {}", self.gold_annotations));
        lines.push(String::new());
        lines.push(format!(
            "     Timex extent (relaxed)  rec: {:.3}     prec: {:.3}     f1: {:.3}",
            self.extent_relaxed.recall, self.extent_relaxed.precision, self.extent_relaxed.f1
        ));
        lines.push(format!(
            "     Timex extent (strict)   rec: {:.3}     prec: {:.3}     f1: {:.3}",
            self.extent_strict.recall, self.extent_strict.precision, self.extent_strict.f1
        ));
        lines.push(String::new());
        for (attr, row, accuracy) in &self.attributes {
            if report_attr_accuracy {
                lines.push(format!(
                    "     Timex {attr:<8}          rec: {:.3}     prec: {:.3}     f1: {:.3}     acc: {accuracy:.3}",
                    row.recall, row.precision, row.f1
                ));
            } else {
                lines.push(format!(
                    "     Timex {attr:<8}          rec: {:.3}     prec: {:.3}     f1: {:.3}",
                    row.recall, row.precision, row.f1
                ));
            }
        }
        lines.push(String::new());
        lines
    }
}

/// Render a per-document log: common annotations (full and partial matches,
/// with their mismatching attributes), then truly missing and redundant
/// ones, each with the annotation verbatim.
#[must_use]
pub fn document_log(
    document: &Document,
    diff: &LayerDiff,
    relaxed: &RelaxedAlignment,
) -> Vec<String> {
    let mut lines = vec!["COMMON:".to_string()];
    for entry in diff.matched() {
        let gold = entry.gold.as_ref().expect("matched entry has gold");
        let system = entry.system.as_ref().expect("matched entry has system");
        let span = (entry.start, entry.end);
        let mismatching = mismatching_attributes(gold, system);
        if mismatching.is_empty() {
            lines.push(format!(" (+) {}", annotation_line(document, span, gold)));
        } else {
            lines.push(format!(
                " (-) {}  mismatching {mismatching:?}",
                annotation_line(document, span, gold)
            ));
        }
        lines.push(format!("     {}", annotation_line(document, span, system)));
    }
    for pair in &relaxed.pairs {
        let mismatching = mismatching_attributes(&pair.gold, &pair.system);
        if mismatching.is_empty() {
            lines.push(format!(
                " (±) {}  mismatching extent",
                annotation_line(document, pair.gold_span, &pair.gold)
            ));
        } else {
            lines.push(format!(
                " (-) {}  mismatching {mismatching:?}",
                annotation_line(document, pair.gold_span, &pair.gold)
            ));
        }
        lines.push(format!(
            "     {}",
            annotation_line(document, pair.system_span, &pair.system)
        ));
    }
    let mut missing_header = false;
    for entry in diff.with_status(SpanStatus::Missing) {
        if relaxed.matches_gold((entry.start, entry.end)) {
            continue;
        }
        if !missing_header {
            lines.push("MISSING:".to_string());
            missing_header = true;
        }
        let gold = entry.gold.as_ref().expect("missing entry has gold");
        lines.push(format!(
            "(--) {}",
            annotation_line(document, (entry.start, entry.end), gold)
        ));
    }
    let mut extra_header = false;
    for entry in diff.with_status(SpanStatus::Extra) {
        if relaxed.matches_system((entry.start, entry.end)) {
            continue;
        }
        if !extra_header {
            lines.push("REDUNDANT:".to_string());
            extra_header = true;
        }
        let system = entry.system.as_ref().expect("extra entry has system");
        lines.push(format!(
            "(--) {}",
            annotation_line(document, (entry.start, entry.end), system)
        ));
    }
    lines
}

fn mismatching_attributes(
    gold: &crate::document::Annotation,
    system: &crate::document::Annotation,
) -> Vec<&'static str> {
    COMPARED_ATTRIBUTES
        .iter()
        .filter(|&&attr| gold.get(attr) != system.get(attr))
        .copied()
        .collect()
}

fn annotation_line(
    document: &Document,
    span: (usize, usize),
    annotation: &crate::document::Annotation,
) -> String {
    format!(
        "<{}:{}> ({}:{}) : {:?}",
        span.0,
        span.1,
        value_display(annotation.get("type")),
        value_display(annotation.get("value")),
        document.slice(span.0, span.1)
    )
}

fn value_display(value: &AttrValue) -> String {
    match value {
        AttrValue::Null => "None".to_string(),
        AttrValue::Str(s) => s.clone(),
        AttrValue::Bool(true) => "True".to_string(),
        AttrValue::Bool(false) => "False".to_string(),
        AttrValue::Record(_) => "{...}".to_string(),
    }
}
