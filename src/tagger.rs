//! The tagger interface.
//!
//! Temporal-expression tagging itself is a black box: a tagger receives a
//! document and fills in a timex layer. The trait exists so the evaluation
//! driver can run any tagger, and so tests can plug in a mock.

use crate::builder::TIMEX_LAYER_ATTRIBUTES;
use crate::document::{Annotation, Document, Layer, Span};
use crate::error::Result;

/// Default name of the layer produced by automatic taggers.
pub const AUTO_TIMEX_LAYER: &str = "auto_timexes";

/// An automatic temporal-expression tagger.
pub trait TimexTagger {
    /// Annotate the document in place by adding/filling a timex layer.
    fn tag(&self, document: &mut Document) -> Result<()>;

    /// Release any external resources held by the tagger.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Human-readable tagger name.
    fn name(&self) -> &str {
        "tagger"
    }
}

/// A mock tagger producing a fixed set of annotations.
///
/// # Example
///
/// ```
/// use timex_eval::{Annotation, Document, MockTagger, TimexTagger};
///
/// let mut doc = Document::new("homme tuleb koosolek");
/// let tagger = MockTagger::new("auto_timexes").with_timex(
///     0,
///     5,
///     Annotation::new().with("type", "DATE").with("value", "1998-06-13"),
/// );
/// tagger.tag(&mut doc).unwrap();
/// assert_eq!(doc.layer("auto_timexes").unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTagger {
    layer_name: String,
    annotations: Vec<(usize, usize, Annotation)>,
}

impl MockTagger {
    /// Create a mock tagger writing to the given layer.
    #[must_use]
    pub fn new(layer_name: impl Into<String>) -> Self {
        Self {
            layer_name: layer_name.into(),
            annotations: Vec::new(),
        }
    }

    /// Add a timex annotation to produce on every tagged document.
    #[must_use]
    pub fn with_timex(mut self, start: usize, end: usize, annotation: Annotation) -> Self {
        self.annotations.push((start, end, annotation));
        self
    }
}

impl TimexTagger for MockTagger {
    fn tag(&self, document: &mut Document) -> Result<()> {
        let mut layer = Layer::new(self.layer_name.as_str(), TIMEX_LAYER_ATTRIBUTES);
        for (start, end, annotation) in &self.annotations {
            layer.add_annotation(Span::new(*start, *end), annotation.clone())?;
        }
        document.add_layer(layer)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
