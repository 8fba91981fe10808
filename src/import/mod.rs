//! Corpus format importers.
//!
//! Each importer reconstructs the plain text of one document together with
//! its raw annotation records, then hands both to the linker and the layer
//! builder to produce a normalized [`crate::Document`].

pub mod brat;
pub mod timeml;
pub mod tokenized;

pub use brat::{import_brat_document, import_brat_folder};
pub use timeml::{import_timeml_file, import_timeml_str};
pub use tokenized::{import_tokenized_file, import_tokenized_str, TokenizedImportOptions};

/// Default name of the hand-annotated timex layer produced by importers.
pub const GOLD_TIMEX_LAYER: &str = "gold_timexes";
