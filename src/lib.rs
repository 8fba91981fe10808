//! # timex-eval
//!
//! Temporal annotation corpus conversion and tagger evaluation.
//!
//! - **Importers**: tag-embedded token files, TimeML-style XML, Brat
//!   stand-off `.txt`/`.ann` pairs, each reconstructed into a normalized
//!   span-annotation [`Document`]
//! - **Linking**: interval begin/end point references resolved into embedded
//!   records, implicit duplicates suppressed
//! - **Evaluation**: strict and relaxed span alignment with per-attribute
//!   precision/recall/F1, aggregated per document, subcorpus and corpus
//! - **Export**: Brat folders (with `annotation.conf` and
//!   `entity_mapping.conf`) that round-trip through the Brat importer
//!
//! ## Quick start
//!
//! ```
//! use timex_eval::{evaluate_document, Annotation, Document, Layer, Span};
//! use timex_eval::builder::TIMEX_LAYER_ATTRIBUTES;
//!
//! let mut doc = Document::new("homme tuleb koosolek");
//! let mut gold = Layer::new("gold_timexes", TIMEX_LAYER_ATTRIBUTES);
//! gold.add_annotation(
//!     Span::new(0, 5),
//!     Annotation::new().with("type", "DATE").with("value", "1998-06-13"),
//! )
//! .unwrap();
//! doc.add_layer(gold).unwrap();
//! let mut system = Layer::new("auto_timexes", TIMEX_LAYER_ATTRIBUTES);
//! system
//!     .add_annotation(
//!         Span::new(0, 5),
//!         Annotation::new().with("type", "DATE").with("value", "1998-06-13"),
//!     )
//!     .unwrap();
//! doc.add_layer(system).unwrap();
//!
//! let eval = evaluate_document(&doc, &doc, "gold_timexes", "auto_timexes").unwrap();
//! assert_eq!(eval.stats.unchanged_spans, 1);
//! ```
//!
//! ## Design
//!
//! - Offsets are Unicode character offsets throughout; the consumed formats
//!   count characters, not bytes
//! - Identifier cross-references go through explicit lookup tables, so
//!   cyclic and dangling references fail as key lookups
//! - Evaluation accumulators are plain integer counts with an associative
//!   `merge`, letting one streaming pass report per-document, per-subcorpus
//!   and whole-corpus results
//! - Relaxed alignment is a greedy best-score assignment, deliberately not a
//!   globally optimal matching; metric comparability across runs depends on
//!   reproducing the greedy behavior

#![warn(missing_docs)]

pub mod builder;
pub mod cli;
pub mod document;
pub mod error;
pub mod eval;
pub mod export;
pub mod import;
pub mod link;
pub mod record;
pub mod tag;
pub mod tagger;

pub use document::{Annotation, AttrValue, Document, Layer, Span, SpanAnnotations};
pub use error::{Error, Result};
pub use eval::{evaluate_document, tag_and_evaluate, DiffStats, DocumentEvaluation, EvalReport};
pub use record::{EmbeddedTimex, PointRef, RawRelation, RawTimex, TimexRecord};
pub use tagger::{MockTagger, TimexTagger, AUTO_TIMEX_LAYER};

pub mod prelude {
    //! Commonly used items, re-exported for convenience.
    pub use crate::builder::{build_timex_layer, TIMEX_LAYER_ATTRIBUTES};
    pub use crate::document::{Annotation, AttrValue, Document, Layer, Span};
    pub use crate::error::{Error, Result};
    pub use crate::eval::{
        diff_layers, evaluate_document, reduce_timex_layer, relax_conflicts, DiffStats, EvalReport,
    };
    pub use crate::import::{
        import_brat_document, import_brat_folder, import_timeml_str, import_tokenized_str,
        TokenizedImportOptions, GOLD_TIMEX_LAYER,
    };
    pub use crate::tagger::{MockTagger, TimexTagger, AUTO_TIMEX_LAYER};
}
