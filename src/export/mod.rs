//! Corpus format exporters.

pub mod brat;

pub use brat::{annotation_conf, export_brat_document, write_brat_folder, BratExport};
