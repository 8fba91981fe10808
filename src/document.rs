//! The span-annotation document model.
//!
//! A [`Document`] is an immutable text buffer plus named [`Layer`]s. Every
//! layer holds ordered [`Span`]s carrying one or more [`Annotation`]s under a
//! fixed attribute schema. Layers may be *enveloping*: their spans are unions
//! of spans from a base layer, which is how multi-span (discontinuous)
//! entities are represented.
//!
//! All offsets are Unicode character offsets, half-open `[start, end)`. The
//! annotation formats this crate consumes count characters, not bytes, so the
//! model never exposes byte offsets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::record::EmbeddedTimex;

/// An attribute value attached to an annotation.
///
/// `Record` holds a nested normalized record: another annotation inlined by
/// reference, such as an interval's begin/end point or the enclosing interval
/// of an implicit time point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttrValue {
    /// Attribute not present / no value.
    #[default]
    Null,
    /// Plain string value.
    Str(String),
    /// Boolean value.
    Bool(bool),
    /// Embedded normalized record.
    Record(EmbeddedTimex),
}

impl AttrValue {
    /// True when the value is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// String payload, if this is a `Str` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Embedded record payload, if this is a `Record` value.
    #[must_use]
    pub fn as_record(&self) -> Option<&EmbeddedTimex> {
        match self {
            AttrValue::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<EmbeddedTimex> for AttrValue {
    fn from(r: EmbeddedTimex) -> Self {
        AttrValue::Record(r)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => AttrValue::Null,
        }
    }
}

const NULL: AttrValue = AttrValue::Null;

/// A single annotation: attribute name to value, scoped to one span.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Annotation {
    values: BTreeMap<String, AttrValue>,
}

impl Annotation {
    /// Create an empty annotation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Get an attribute value; absent attributes read as `Null`.
    #[must_use]
    pub fn get(&self, name: &str) -> &AttrValue {
        self.values.get(name).unwrap_or(&NULL)
    }

    /// Iterate over attribute names set on this annotation.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// One or more half-open character ranges treated as a single annotation
/// target. Single-range for flat layers; multi-range for enveloping layers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    ranges: Vec<(usize, usize)>,
}

impl Span {
    /// Create a single-range span.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start must not exceed end");
        Self {
            ranges: vec![(start, end)],
        }
    }

    /// Create a multi-range span. Every range must be non-empty.
    pub fn multi(ranges: Vec<(usize, usize)>) -> Result<Self> {
        if ranges.is_empty() {
            return Err(Error::parse("span must have at least one range"));
        }
        for &(s, e) in &ranges {
            if s >= e {
                return Err(Error::parse(format!("empty span range ({s}, {e})")));
            }
        }
        Ok(Self { ranges })
    }

    /// First range start.
    #[must_use]
    pub fn start(&self) -> usize {
        self.ranges[0].0
    }

    /// Last range end.
    #[must_use]
    pub fn end(&self) -> usize {
        self.ranges[self.ranges.len() - 1].1
    }

    /// The underlying ranges, in order.
    #[must_use]
    pub fn ranges(&self) -> &[(usize, usize)] {
        &self.ranges
    }

    /// True when the hulls `[start, end)` of the two spans share a position.
    #[must_use]
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }
}

/// A span together with the annotations attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanAnnotations {
    /// The annotated location.
    pub span: Span,
    /// One annotation for plain layers; possibly several for ambiguous ones.
    pub annotations: Vec<Annotation>,
}

/// An ordered collection of annotated spans with a fixed attribute schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    name: String,
    attributes: Vec<String>,
    enveloping: Option<String>,
    ambiguous: bool,
    spans: Vec<SpanAnnotations>,
}

impl Layer {
    /// Create a flat, unambiguous layer with the given attribute schema.
    #[must_use]
    pub fn new(name: impl Into<String>, attributes: &[&str]) -> Self {
        Self {
            name: name.into(),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            enveloping: None,
            ambiguous: false,
            spans: Vec::new(),
        }
    }

    /// Mark this layer as enveloping spans of `base` layer.
    #[must_use]
    pub fn enveloping(mut self, base: impl Into<String>) -> Self {
        self.enveloping = Some(base.into());
        self
    }

    /// Allow more than one annotation per span.
    #[must_use]
    pub fn ambiguous(mut self) -> Self {
        self.ambiguous = true;
        self
    }

    /// Layer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared attribute schema, in order.
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Base layer name when this layer is enveloping.
    #[must_use]
    pub fn enveloping_layer(&self) -> Option<&str> {
        self.enveloping.as_deref()
    }

    /// True when more than one annotation per span is allowed.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    /// Add an annotation on the given span.
    ///
    /// Attributes outside the declared schema are a schema violation.
    /// Attributes missing from `annotation` are filled in as `Null`, so every
    /// annotation in the layer carries the full schema.
    pub fn add_annotation(&mut self, span: Span, annotation: Annotation) -> Result<()> {
        for name in annotation.names() {
            if !self.attributes.iter().any(|a| a == name) {
                return Err(Error::schema_violation(format!(
                    "attribute {name:?} is not in the schema of layer {:?}",
                    self.name
                )));
            }
        }
        let mut filled = annotation;
        for attr in &self.attributes {
            if filled.get(attr).is_null() {
                filled.set(attr.clone(), AttrValue::Null);
            }
        }
        if let Some(existing) = self.spans.iter_mut().find(|s| s.span == span) {
            if !self.ambiguous {
                return Err(Error::schema_violation(format!(
                    "layer {:?} is not ambiguous but span ({}, {}) was annotated twice",
                    self.name,
                    span.start(),
                    span.end()
                )));
            }
            existing.annotations.push(filled);
            return Ok(());
        }
        let key = (span.start(), span.end());
        let pos = self
            .spans
            .iter()
            .position(|s| (s.span.start(), s.span.end()) > key)
            .unwrap_or(self.spans.len());
        self.spans.insert(
            pos,
            SpanAnnotations {
                span,
                annotations: vec![filled],
            },
        );
        Ok(())
    }

    /// The annotated spans, ordered by position.
    #[must_use]
    pub fn spans(&self) -> &[SpanAnnotations] {
        &self.spans
    }

    /// Iterate over annotated spans.
    pub fn iter(&self) -> impl Iterator<Item = &SpanAnnotations> {
        self.spans.iter()
    }

    /// Number of annotated spans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// True when the layer holds no spans.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// An immutable text buffer with metadata and named annotation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    text: String,
    /// Free-form document metadata (source file, creation time, subcorpus).
    pub meta: BTreeMap<String, String>,
    layers: BTreeMap<String, Layer>,
}

impl Document {
    /// Create a document over the given text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            meta: BTreeMap::new(),
            layers: BTreeMap::new(),
        }
    }

    /// The full text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text length in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Extract the character range `[start, end)` as an owned string.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.text
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect()
    }

    /// Text covered by a span; multi-range spans join their pieces with a
    /// single space, in range order.
    #[must_use]
    pub fn span_text(&self, span: &Span) -> String {
        span.ranges()
            .iter()
            .map(|&(s, e)| self.slice(s, e))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Add a layer. The name must be unused and an enveloping layer's base
    /// must already be present.
    pub fn add_layer(&mut self, layer: Layer) -> Result<()> {
        if self.layers.contains_key(layer.name()) {
            return Err(Error::schema_violation(format!(
                "document already has a layer named {:?}",
                layer.name()
            )));
        }
        if let Some(base) = layer.enveloping_layer() {
            if !self.layers.contains_key(base) {
                return Err(Error::schema_violation(format!(
                    "enveloping layer {:?} requires missing base layer {base:?}",
                    layer.name()
                )));
            }
        }
        self.layers.insert(layer.name().to_string(), layer);
        Ok(())
    }

    /// Look up a layer by name.
    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// True when a layer with this name exists.
    #[must_use]
    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// Names of all layers.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    /// Serialize to a JSON file. The on-disk format is opaque to the rest of
    /// the crate: documents only flow through `save`/`load`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::parse(format!("cannot serialize document: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Deserialize from a JSON file written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::parse(format!("cannot read document {}: {e}", path.display())))
    }
}
