//! Strict span alignment between a gold layer and a system layer.
//!
//! Spans are matched by exact `(start, end)` equality. A gold span with no
//! exact counterpart is `missing`, a system span with none is `extra`; spans
//! present in both are `unchanged` when their annotations agree and
//! `modified` otherwise. Annotation-level counts follow the same scheme.

use std::collections::HashMap;

use crate::document::{Annotation, Layer};
use crate::error::{Error, Result};

/// Strict-alignment classification of one span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStatus {
    /// Present in both layers with identical annotations.
    Unchanged,
    /// Present in both layers with differing annotations.
    Modified,
    /// Present only in the gold layer.
    Missing,
    /// Present only in the system layer.
    Extra,
}

/// One span of the diff, with the annotations from each side where present.
#[derive(Debug, Clone)]
pub struct DiffEntry {
    /// Span start offset.
    pub start: usize,
    /// Span end offset (exclusive).
    pub end: usize,
    /// Strict-alignment status.
    pub status: SpanStatus,
    /// Gold annotation (absent for `Extra`).
    pub gold: Option<Annotation>,
    /// System annotation (absent for `Missing`).
    pub system: Option<Annotation>,
}

/// The structural diff of two flat layers.
#[derive(Debug, Clone, Default)]
pub struct LayerDiff {
    /// All diff entries, ordered by span position.
    pub entries: Vec<DiffEntry>,
    /// Spans present in both layers with identical annotations.
    pub unchanged_spans: u64,
    /// Spans present in both layers with differing annotations.
    pub modified_spans: u64,
    /// Gold-only spans.
    pub missing_spans: u64,
    /// System-only spans.
    pub extra_spans: u64,
    /// Annotations present identically in both layers.
    pub unchanged_annotations: u64,
    /// Gold annotations not reproduced by the system.
    pub missing_annotations: u64,
    /// System annotations absent from gold.
    pub extra_annotations: u64,
}

impl LayerDiff {
    /// Entries with the given status, in span order.
    pub fn with_status(&self, status: SpanStatus) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter().filter(move |e| e.status == status)
    }

    /// Gold-only entries, in span order.
    pub fn missing(&self) -> impl Iterator<Item = &DiffEntry> {
        self.with_status(SpanStatus::Missing)
    }

    /// System-only entries, in span order.
    pub fn extra(&self) -> impl Iterator<Item = &DiffEntry> {
        self.with_status(SpanStatus::Extra)
    }

    /// Entries present in both layers (full span matches), in span order.
    pub fn matched(&self) -> impl Iterator<Item = &DiffEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, SpanStatus::Unchanged | SpanStatus::Modified))
    }
}

/// Compute the strict diff of two flat, unambiguous layers.
pub fn diff_layers(gold: &Layer, system: &Layer) -> Result<LayerDiff> {
    let mut diff = LayerDiff::default();
    let mut system_by_span: HashMap<(usize, usize), &Annotation> = HashMap::new();
    for span in system.iter() {
        require_flat(system, span)?;
        system_by_span.insert(
            (span.span.start(), span.span.end()),
            &span.annotations[0],
        );
    }
    let mut used: Vec<(usize, usize)> = Vec::new();
    for span in gold.iter() {
        require_flat(gold, span)?;
        let key = (span.span.start(), span.span.end());
        let gold_annotation = span.annotations[0].clone();
        match system_by_span.get(&key) {
            Some(&system_annotation) => {
                used.push(key);
                let status = if *system_annotation == gold_annotation {
                    diff.unchanged_spans += 1;
                    diff.unchanged_annotations += 1;
                    SpanStatus::Unchanged
                } else {
                    diff.modified_spans += 1;
                    diff.missing_annotations += 1;
                    diff.extra_annotations += 1;
                    SpanStatus::Modified
                };
                diff.entries.push(DiffEntry {
                    start: key.0,
                    end: key.1,
                    status,
                    gold: Some(gold_annotation),
                    system: Some(system_annotation.clone()),
                });
            }
            None => {
                diff.missing_spans += 1;
                diff.missing_annotations += 1;
                diff.entries.push(DiffEntry {
                    start: key.0,
                    end: key.1,
                    status: SpanStatus::Missing,
                    gold: Some(gold_annotation),
                    system: None,
                });
            }
        }
    }
    for span in system.iter() {
        let key = (span.span.start(), span.span.end());
        if used.contains(&key) {
            continue;
        }
        diff.extra_spans += 1;
        diff.extra_annotations += 1;
        diff.entries.push(DiffEntry {
            start: key.0,
            end: key.1,
            status: SpanStatus::Extra,
            gold: None,
            system: Some(span.annotations[0].clone()),
        });
    }
    diff.entries.sort_by_key(|e| (e.start, e.end));
    Ok(diff)
}

fn require_flat(layer: &Layer, span: &crate::document::SpanAnnotations) -> Result<()> {
    if span.annotations.len() != 1 || span.span.ranges().len() != 1 {
        return Err(Error::evaluation(format!(
            "layer {:?} is not a flat unambiguous layer at span ({}, {})",
            layer.name(),
            span.span.start(),
            span.span.end()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Span;
    use crate::eval::reduce::COMPARED_ATTRIBUTES;

    fn layer(name: &str, spans: &[(usize, usize, &str, &str)]) -> Layer {
        let mut layer = Layer::new(name, COMPARED_ATTRIBUTES);
        for &(start, end, kind, value) in spans {
            layer
                .add_annotation(
                    Span::new(start, end),
                    Annotation::new().with("type", kind).with("value", value),
                )
                .unwrap();
        }
        layer
    }

    #[test]
    fn test_identical_spans_unchanged() {
        let gold = layer("gold", &[(0, 10, "DATE", "1999-01-01")]);
        let system = layer("system", &[(0, 10, "DATE", "1999-01-01")]);
        let diff = diff_layers(&gold, &system).unwrap();
        assert_eq!(diff.unchanged_spans, 1);
        assert_eq!(diff.unchanged_annotations, 1);
        assert_eq!(diff.entries[0].status, SpanStatus::Unchanged);
    }

    #[test]
    fn test_same_span_different_attributes_modified() {
        let gold = layer("gold", &[(0, 10, "DATE", "1999-01-01")]);
        let system = layer("system", &[(0, 10, "TIME", "1999-01-01")]);
        let diff = diff_layers(&gold, &system).unwrap();
        assert_eq!(diff.modified_spans, 1);
        assert_eq!(diff.missing_annotations, 1);
        assert_eq!(diff.extra_annotations, 1);
    }

    #[test]
    fn test_missing_and_extra() {
        let gold = layer("gold", &[(0, 10, "DATE", "1999")]);
        let system = layer("system", &[(2, 10, "DATE", "1999")]);
        let diff = diff_layers(&gold, &system).unwrap();
        assert_eq!(diff.missing_spans, 1);
        assert_eq!(diff.extra_spans, 1);
        assert_eq!(diff.missing().count(), 1);
        assert_eq!(diff.extra().count(), 1);
        assert_eq!(diff.matched().count(), 0);
    }

    #[test]
    fn test_entries_sorted_by_position() {
        let gold = layer("gold", &[(20, 25, "DATE", "a"), (0, 5, "DATE", "b")]);
        let system = layer("system", &[(10, 15, "DATE", "c")]);
        let diff = diff_layers(&gold, &system).unwrap();
        let starts: Vec<usize> = diff.entries.iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![0, 10, 20]);
    }
}
