//! Raw and resolved annotation records.
//!
//! Importers collect [`RawTimex`] records: an open attribute map straight
//! from the source markup plus optional offsets into the reconstructed text.
//! The linker resolves identifier references and turns each span-bearing raw
//! record into a fixed-field [`TimexRecord`]; the raw/resolved split keeps
//! the "attributes merged incrementally" phase clearly separated from the
//! frozen form handed to the layer builder.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute key under which importers store a record's annotated phrase.
pub const TEXT_ATTR: &str = "text";

/// A raw annotation record as collected during file parsing.
///
/// Attribute names are still in source-format spelling (`beginPoint`,
/// `temporalFunction`, ...). Offsets are character positions in the
/// reconstructed text, present only for records that open/close a phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTimex {
    /// Attributes exactly as parsed from the markup.
    pub attrs: HashMap<String, String>,
    /// Phrase start offset, when the record annotates text.
    pub start: Option<usize>,
    /// Phrase end offset (exclusive).
    pub end: Option<usize>,
}

impl RawTimex {
    /// Create a record from parsed tag attributes.
    #[must_use]
    pub fn from_attrs(attrs: HashMap<String, String>) -> Self {
        Self {
            attrs,
            start: None,
            end: None,
        }
    }

    /// The record identifier (`tid`).
    #[must_use]
    pub fn tid(&self) -> Option<&str> {
        self.attrs.get("tid").map(String::as_str)
    }

    /// The temporal expression type (`type` attribute).
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.attrs.get("type").map(String::as_str)
    }

    /// The annotated phrase recorded in the source, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.attrs.get(TEXT_ATTR).map(String::as_str)
    }

    /// True when the record carries offsets into the text.
    #[must_use]
    pub fn has_span(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// True when the record is anchored in text, either by offsets or by a
    /// recorded phrase. Records failing this are implicit (reference-only).
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        self.start.is_some() || self.text().is_some()
    }

    /// Attribute lookup in source-format spelling.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Render the record for error messages, attributes sorted by name.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .attrs
            .iter()
            .map(|(k, v)| format!("{k}={v:?}"))
            .collect();
        parts.sort();
        if let (Some(s), Some(e)) = (self.start, self.end) {
            parts.push(format!("@{s}..{e}"));
        }
        format!("{{{}}}", parts.join(" "))
    }
}

/// A normalized record embedded inside another annotation.
///
/// This is the reduced copy of a referenced record: an interval's begin/end
/// point, or the enclosing interval of an implicit time point. Point
/// references at this depth stay plain identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedTimex {
    /// Record identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,
    /// Temporal expression type (DATE, TIME, DURATION, SET).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Calendar value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Whether the value was produced by a temporal function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal_function: Option<bool>,
    /// Modifier (e.g. APPROX, START).
    #[serde(rename = "mod", skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    /// Anchor time identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_time_id: Option<String>,
    /// Quantifier (for SET expressions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quant: Option<String>,
    /// Frequency (for SET expressions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq: Option<String>,
    /// Begin point identifier (for intervals).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin_point: Option<String>,
    /// End point identifier (for intervals).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_point: Option<String>,
    /// Annotator comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl EmbeddedTimex {
    /// Build an embedded copy of a raw record, renaming source-format
    /// attributes onto the canonical schema. Offsets and the literal phrase
    /// are dropped: an embedded record never addresses text directly.
    #[must_use]
    pub fn from_raw(raw: &RawTimex) -> Self {
        EmbeddedTimex {
            tid: raw.attr("tid").map(str::to_string),
            kind: raw.attr("type").map(str::to_string),
            value: raw.attr("value").map(str::to_string),
            temporal_function: raw
                .attr("temporalFunction")
                .or_else(|| raw.attr("temporal_function"))
                .and_then(parse_bool_attr),
            modifier: raw.attr("mod").map(str::to_string),
            anchor_time_id: raw
                .attr("anchorTimeID")
                .or_else(|| raw.attr("anchor_time_id"))
                .map(str::to_string),
            quant: raw.attr("quant").map(str::to_string),
            freq: raw.attr("freq").map(str::to_string),
            begin_point: raw
                .attr("beginPoint")
                .or_else(|| raw.attr("begin_point"))
                .map(str::to_string),
            end_point: raw
                .attr("endPoint")
                .or_else(|| raw.attr("end_point"))
                .map(str::to_string),
            comment: raw.attr("comment").map(str::to_string),
        }
    }

    /// Keep only the attributes whose exact match matters during evaluation
    /// (type, value, mod, quant, freq).
    #[must_use]
    pub fn reduced(&self) -> EmbeddedTimex {
        EmbeddedTimex {
            kind: self.kind.clone(),
            value: self.value.clone(),
            modifier: self.modifier.clone(),
            quant: self.quant.clone(),
            freq: self.freq.clone(),
            ..EmbeddedTimex::default()
        }
    }
}

/// Parse a boolean attribute value, case-insensitively.
///
/// Anything other than `true`/`false` is reported and read as no value.
#[must_use]
pub fn parse_bool_attr(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        other => {
            log::warn!("cannot interpret {other:?} as a boolean attribute value");
            None
        }
    }
}

/// A begin/end point of an interval record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointRef {
    /// Reference by identifier: the point is an explicit record visible at
    /// its own text position (or the reference could not be resolved).
    Id(String),
    /// Implicit point inlined as an embedded record.
    Embedded(EmbeddedTimex),
}

/// A fully resolved temporal annotation record, ready for layer building.
///
/// Constructed by the linker once all identifier references are resolved;
/// every field is in canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimexRecord {
    /// Record identifier.
    pub tid: String,
    /// Temporal expression type (DATE, TIME, DURATION, SET).
    pub kind: String,
    /// Calendar value.
    pub value: Option<String>,
    /// Whether the value was produced by a temporal function.
    pub temporal_function: Option<bool>,
    /// Anchor time identifier.
    pub anchor_time_id: Option<String>,
    /// Modifier.
    pub modifier: Option<String>,
    /// Quantifier.
    pub quant: Option<String>,
    /// Frequency.
    pub freq: Option<String>,
    /// Begin point of an explicit interval.
    pub begin_point: Option<PointRef>,
    /// End point of an explicit interval.
    pub end_point: Option<PointRef>,
    /// The enclosing interval, when this record is one of its points.
    pub part_of_interval: Option<EmbeddedTimex>,
    /// Annotator comment.
    pub comment: Option<String>,
    /// Phrase start offset in the reconstructed text.
    pub start: usize,
    /// Phrase end offset (exclusive).
    pub end: usize,
    /// The annotated phrase as recorded in the source, when the source kept
    /// one. May disagree with the reconstructed text slice; the layer builder
    /// reconciles the two.
    pub text: Option<String>,
}

/// A raw relation record: two arguments referenced by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRelation {
    /// Relation identifier.
    pub id: String,
    /// Relation type (e.g. `BEFORE`, `SIMULTANEOUS`, `has_Argument`).
    pub kind: String,
    /// First argument's entity identifier.
    pub arg1: String,
    /// Second argument's entity identifier.
    pub arg2: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawTimex {
        RawTimex::from_attrs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_embedded_renames_source_attributes() {
        let r = raw(&[
            ("tid", "t3"),
            ("type", "DATE"),
            ("value", "1999-01-01"),
            ("temporalFunction", "TRUE"),
            ("anchorTimeID", "t0"),
            ("beginPoint", "t1"),
            ("endPoint", "t2"),
        ]);
        let e = EmbeddedTimex::from_raw(&r);
        assert_eq!(e.tid.as_deref(), Some("t3"));
        assert_eq!(e.kind.as_deref(), Some("DATE"));
        assert_eq!(e.temporal_function, Some(true));
        assert_eq!(e.anchor_time_id.as_deref(), Some("t0"));
        assert_eq!(e.begin_point.as_deref(), Some("t1"));
        assert_eq!(e.end_point.as_deref(), Some("t2"));
    }

    #[test]
    fn test_bool_attr_is_case_insensitive() {
        assert_eq!(parse_bool_attr("True"), Some(true));
        assert_eq!(parse_bool_attr("FALSE"), Some(false));
        assert_eq!(parse_bool_attr("maybe"), None);
    }

    #[test]
    fn test_reduced_keeps_comparable_attributes_only() {
        let e = EmbeddedTimex {
            tid: Some("t9".into()),
            kind: Some("DURATION".into()),
            value: Some("P50Y".into()),
            temporal_function: Some(true),
            begin_point: Some("t1".into()),
            ..EmbeddedTimex::default()
        };
        let r = e.reduced();
        assert_eq!(r.kind.as_deref(), Some("DURATION"));
        assert_eq!(r.value.as_deref(), Some("P50Y"));
        assert!(r.tid.is_none());
        assert!(r.temporal_function.is_none());
        assert!(r.begin_point.is_none());
    }

    #[test]
    fn test_explicitness() {
        let mut r = raw(&[("tid", "t1")]);
        assert!(!r.is_explicit());
        r.attrs.insert("text".into(), "homme".into());
        assert!(r.is_explicit());
        let mut r2 = raw(&[("tid", "t2")]);
        r2.start = Some(4);
        assert!(r2.is_explicit());
        assert!(!r2.has_span());
        r2.end = Some(9);
        assert!(r2.has_span());
    }
}
