//! Export/import round-trip through the Brat stand-off format.

use timex_eval::builder::TIMEX_LAYER_ATTRIBUTES;
use timex_eval::export::export_brat_document;
use timex_eval::import::import_brat_document;
use timex_eval::{Annotation, Document, Layer, Span};

fn gold_document() -> Document {
    // two timexes, the second one on a later line so the newline offset
    // convention actually shifts something
    let mut doc = Document::new("Üleeilne päev oli soe.\nHomme kingitakse raamatuid.\nLõpp.");
    let mut layer = Layer::new("gold_timexes", TIMEX_LAYER_ATTRIBUTES);
    layer
        .add_annotation(
            Span::new(0, 13),
            Annotation::new()
                .with("tid", "t1")
                .with("type", "DATE")
                .with("value", "1998-06-10")
                .with("temporal_function", true),
        )
        .unwrap();
    layer
        .add_annotation(
            Span::new(23, 28),
            Annotation::new()
                .with("tid", "t2")
                .with("type", "DATE")
                .with("value", "1998-06-13"),
        )
        .unwrap();
    doc.add_layer(layer).unwrap();
    doc
}

#[test]
fn test_roundtrip_reconstructs_identical_spans() {
    let doc = gold_document();
    let export = export_brat_document(&doc, "gold_timexes", true).unwrap();

    let reimported = import_brat_document(&export.text, &export.ann, "doc1").unwrap();
    assert_eq!(reimported.text(), doc.text());
    let timexes = reimported.layer("timexes").unwrap();
    assert_eq!(timexes.len(), 2);

    let gold_spans: Vec<(usize, usize)> = doc
        .layer("gold_timexes")
        .unwrap()
        .iter()
        .map(|s| (s.span.start(), s.span.end()))
        .collect();
    let brat_spans: Vec<(usize, usize)> = timexes
        .iter()
        .map(|s| (s.span.start(), s.span.end()))
        .collect();
    assert_eq!(gold_spans, brat_spans);
    assert_eq!(reimported.span_text(&timexes.spans()[0].span), "Üleeilne päev");
    assert_eq!(reimported.span_text(&timexes.spans()[1].span), "Homme");
}

#[test]
fn test_roundtrip_preserves_note_attributes() {
    let doc = gold_document();
    let export = export_brat_document(&doc, "gold_timexes", true).unwrap();
    let reimported = import_brat_document(&export.text, &export.ann, "doc1").unwrap();
    let timexes = reimported.layer("timexes").unwrap();
    let first = &timexes.spans()[0].annotations[0];
    assert_eq!(first.get("tid").as_str(), Some("t1"));
    assert_eq!(first.get("type").as_str(), Some("DATE"));
    assert_eq!(first.get("value").as_str(), Some("1998-06-10"));
}

#[test]
fn test_mapping_links_brat_ids_to_timex_ids() {
    let doc = gold_document();
    let export = export_brat_document(&doc, "gold_timexes", true).unwrap();
    assert_eq!(
        export.mapping,
        vec![
            ("T1".to_string(), "t1".to_string()),
            ("T2".to_string(), "t2".to_string()),
        ]
    );
}
