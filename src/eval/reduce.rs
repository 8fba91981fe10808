//! Layer reduction for comparison.
//!
//! Before diffing, timex layers are projected onto the attributes whose
//! agreement is actually evaluated. Identifier-valued attributes (`tid`,
//! `anchor_time_id`) vary freely between taggers and are dropped; point
//! references that are plain identifier strings carry no comparable content
//! and read as no value; embedded point records keep only their comparable
//! attributes.

use crate::document::{AttrValue, Annotation, Layer};
use crate::error::{Error, Result};

/// Attributes compared during alignment, in scoring order.
pub const COMPARED_ATTRIBUTES: &[&str] = &[
    "type",
    "value",
    "mod",
    "quant",
    "freq",
    "begin_point",
    "end_point",
    "part_of_interval",
];

/// Primary attributes: matching one scores double during conflict
/// resolution, and per-attribute precision/recall is reported for these.
pub const BASIC_ATTRIBUTES: &[&str] = &["type", "value", "mod", "quant", "freq"];

/// Nested point-reference attributes.
pub const POINT_ATTRIBUTES: &[&str] = &["begin_point", "end_point", "part_of_interval"];

/// Project a timex layer onto the compared attributes.
///
/// The input layer must be flat and unambiguous (one annotation per
/// single-range span); anything else is an internal error of the caller.
pub fn reduce_timex_layer(layer: &Layer, new_name: &str) -> Result<Layer> {
    let mut reduced = Layer::new(new_name, COMPARED_ATTRIBUTES);
    for span in layer.iter() {
        if span.annotations.len() != 1 {
            return Err(Error::evaluation(format!(
                "layer {:?} has {} annotations on span ({}, {}); expected exactly one",
                layer.name(),
                span.annotations.len(),
                span.span.start(),
                span.span.end()
            )));
        }
        if span.span.ranges().len() != 1 {
            return Err(Error::evaluation(format!(
                "layer {:?} has a multi-range span at ({}, {}); expected a flat layer",
                layer.name(),
                span.span.start(),
                span.span.end()
            )));
        }
        let annotation = &span.annotations[0];
        let mut out = Annotation::new();
        for &attr in COMPARED_ATTRIBUTES {
            let value = annotation.get(attr);
            if POINT_ATTRIBUTES.contains(&attr) {
                out.set(attr, reduce_point(value));
            } else {
                out.set(attr, value.clone());
            }
        }
        reduced.add_annotation(span.span.clone(), out)?;
    }
    Ok(reduced)
}

fn reduce_point(value: &AttrValue) -> AttrValue {
    match value {
        // a bare identifier reference has no comparable content
        AttrValue::Str(_) => AttrValue::Null,
        AttrValue::Record(record) => AttrValue::Record(record.reduced()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TIMEX_LAYER_ATTRIBUTES;
    use crate::document::Span;
    use crate::record::EmbeddedTimex;

    #[test]
    fn test_reduction_drops_identifiers_and_keeps_values() {
        let mut layer = Layer::new("gold_timexes", TIMEX_LAYER_ATTRIBUTES);
        layer
            .add_annotation(
                Span::new(0, 5),
                Annotation::new()
                    .with("tid", "t1")
                    .with("type", "DATE")
                    .with("value", "1998-06-13")
                    .with("begin_point", "t2"),
            )
            .unwrap();
        let reduced = reduce_timex_layer(&layer, "gold").unwrap();
        let ann = &reduced.spans()[0].annotations[0];
        assert_eq!(ann.get("type").as_str(), Some("DATE"));
        assert!(ann.get("begin_point").is_null());
        assert!(!reduced.attributes().iter().any(|a| a == "tid"));
    }

    #[test]
    fn test_embedded_points_reduced() {
        let mut layer = Layer::new("gold_timexes", TIMEX_LAYER_ATTRIBUTES);
        let record = EmbeddedTimex {
            tid: Some("t9".into()),
            kind: Some("DURATION".into()),
            value: Some("P2D".into()),
            temporal_function: Some(true),
            ..EmbeddedTimex::default()
        };
        layer
            .add_annotation(
                Span::new(0, 5),
                Annotation::new()
                    .with("tid", "t1")
                    .with("type", "DATE")
                    .with("part_of_interval", record),
            )
            .unwrap();
        let reduced = reduce_timex_layer(&layer, "gold").unwrap();
        let ann = &reduced.spans()[0].annotations[0];
        let poi = ann.get("part_of_interval").as_record().unwrap();
        assert_eq!(poi.kind.as_deref(), Some("DURATION"));
        assert!(poi.tid.is_none());
        assert!(poi.temporal_function.is_none());
    }
}
