//! CLI driver behavior over temporary corpus directories.

use clap::Parser;
use std::path::Path;

use timex_eval::cli::{run, Cli};

const TOKENIZED_SAMPLE: &str = "<ignoreeri>\n\
    allikas: aja_EPL_1998 | kuup: 12.06.1998\n\
    </ignoreeri>\n\
    <s>\n\
    <TIMEX tid=\"t1\" type=\"DATE\" value=\"1998-06-10\">\n\
    Üleeilne    üleeilne+0\n\
    päev    päev+0\n\
    </TIMEX>\n\
    oli    olema+0\n\
    soe    soe+0\n\
    </s>\n\
    <TIMEX tid=\"t0\" type=\"DATE\" value=\"1998-06-12\" functionInDocument=\"CREATION_TIME\"/>\n";

fn run_args(args: &[&str]) -> timex_eval::Result<()> {
    run(Cli::parse_from(args.iter().copied()))
}

fn write_corpus(dir: &Path) {
    std::fs::write(dir.join("aja_epl_1.t3-olp-ajav"), TOKENIZED_SAMPLE).unwrap();
}

#[test]
fn test_convert_writes_json_documents() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("in");
    let output = tmp.path().join("out");
    std::fs::create_dir_all(&input).unwrap();
    write_corpus(&input);

    run_args(&[
        "timex-eval",
        "convert",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ])
    .unwrap();

    let json_path = output.join("aja_epl_1.json");
    assert!(json_path.is_file());
    let doc = timex_eval::Document::load(&json_path).unwrap();
    assert_eq!(doc.text(), "Üleeilne päev oli soe\n");
    assert_eq!(doc.layer("gold_timexes").unwrap().len(), 1);
}

#[test]
fn test_convert_dry_run_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("in");
    let output = tmp.path().join("out");
    std::fs::create_dir_all(&input).unwrap();
    write_corpus(&input);

    run_args(&[
        "timex-eval",
        "convert",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--dry-run",
    ])
    .unwrap();
    assert!(!output.exists());
}

#[test]
fn test_export_brat_writes_config_files() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("in");
    let json_dir = tmp.path().join("json");
    let brat_dir = tmp.path().join("brat");
    std::fs::create_dir_all(&input).unwrap();
    write_corpus(&input);

    run_args(&[
        "timex-eval",
        "convert",
        "-i",
        input.to_str().unwrap(),
        "-o",
        json_dir.to_str().unwrap(),
    ])
    .unwrap();
    run_args(&[
        "timex-eval",
        "export-brat",
        "-i",
        json_dir.to_str().unwrap(),
        "-o",
        brat_dir.to_str().unwrap(),
    ])
    .unwrap();

    assert!(brat_dir.join("aja_epl_1.txt").is_file());
    assert!(brat_dir.join("aja_epl_1.ann").is_file());
    assert!(brat_dir.join("annotation.conf").is_file());
    let mapping = std::fs::read_to_string(brat_dir.join("entity_mapping.conf")).unwrap();
    assert_eq!(mapping.trim_end(), "aja_epl_1\tT1 t1");
}

#[test]
fn test_eval_compares_gold_and_system_folders() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("in");
    let gold_dir = tmp.path().join("gold");
    let system_dir = tmp.path().join("system");
    std::fs::create_dir_all(&input).unwrap();
    write_corpus(&input);

    run_args(&[
        "timex-eval",
        "convert",
        "-i",
        input.to_str().unwrap(),
        "-o",
        gold_dir.to_str().unwrap(),
    ])
    .unwrap();

    // build the system side by tagging the gold documents with a mock
    std::fs::create_dir_all(&system_dir).unwrap();
    let mut doc = timex_eval::Document::load(gold_dir.join("aja_epl_1.json")).unwrap();
    let tagger = timex_eval::MockTagger::new("auto_timexes").with_timex(
        0,
        13,
        timex_eval::Annotation::new()
            .with("type", "DATE")
            .with("value", "1998-06-10"),
    );
    use timex_eval::TimexTagger;
    tagger.tag(&mut doc).unwrap();
    doc.save(system_dir.join("aja_epl_1.json")).unwrap();

    let log_file = tmp.path().join("run.log");
    run_args(&[
        "timex-eval",
        "eval",
        "--gold",
        gold_dir.to_str().unwrap(),
        "--system",
        system_dir.to_str().unwrap(),
        "--log-file",
        log_file.to_str().unwrap(),
    ])
    .unwrap();

    let log = std::fs::read_to_string(&log_file).unwrap();
    assert!(log.contains("COMMON:"));
    assert!(log.contains("Timex extent (strict)"));
    assert!(log.contains("rec: 1.000"));
}
