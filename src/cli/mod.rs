//! Command line interface: batch conversion, Brat export, and evaluation.

use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::eval::{document_log, evaluate_document, DiffStats, EvalReport};
use crate::export::write_brat_folder;
use crate::import::{
    import_brat_folder, import_timeml_file, import_tokenized_file, TokenizedImportOptions,
    GOLD_TIMEX_LAYER,
};
use crate::tagger::AUTO_TIMEX_LAYER;

/// Temporal annotation corpus conversion and tagger evaluation.
#[derive(Parser)]
#[command(name = "timex-eval")]
#[command(
    author,
    version,
    about = "Temporal annotation corpus conversion and timex tagger evaluation",
    long_about = r#"
timex-eval - temporal annotation corpus tooling

CAPABILITIES:
  • Convert corpora (tag-embedded token files, TimeML XML, Brat stand-off)
    into normalized span-annotation documents
  • Export normalized documents back to Brat for manual annotation
  • Evaluate a tagger's output against gold annotations (strict and relaxed
    span alignment, per-attribute precision/recall/F1)

EXAMPLES:
  timex-eval convert -i corpus/ -o corpus_json/
  timex-eval export-brat -i corpus_json/ -o corpus_brat/
  timex-eval eval --gold corpus_json/ --system tagged_json/ --log-file run.log
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Convert corpus files into normalized JSON documents
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),

    /// Export JSON documents as Brat .txt/.ann pairs plus config files
    #[command(visible_alias = "x")]
    ExportBrat(ExportBratArgs),

    /// Evaluate system annotations against gold annotations
    #[command(visible_alias = "e")]
    Eval(EvalArgs),
}

/// Source corpus format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CorpusFormat {
    /// Tag-embedded token files (one token or tag per line)
    Tokenized,
    /// TimeML-style XML files
    Timeml,
    /// Brat stand-off .txt/.ann pairs
    Brat,
}

/// Arguments of the `convert` subcommand.
#[derive(Debug, clap::Args)]
pub struct ConvertArgs {
    /// Input directory with corpus files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory for JSON documents
    #[arg(short, long)]
    pub output: PathBuf,

    /// Source format; inferred from file extensions when omitted
    #[arg(short, long, value_enum)]
    pub format: Option<CorpusFormat>,

    /// Process files without writing anything out
    #[arg(short, long)]
    pub dry_run: bool,
}

/// Arguments of the `export-brat` subcommand.
#[derive(Debug, clap::Args)]
pub struct ExportBratArgs {
    /// Input directory with JSON documents
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory for the Brat folder
    #[arg(short, long)]
    pub output: PathBuf,

    /// Name of the timex layer to export
    #[arg(long, default_value = GOLD_TIMEX_LAYER)]
    pub layer: String,

    /// Process files without writing anything out
    #[arg(short, long)]
    pub dry_run: bool,
}

/// Arguments of the `eval` subcommand.
#[derive(Debug, clap::Args)]
pub struct EvalArgs {
    /// Directory with gold JSON documents
    #[arg(short, long)]
    pub gold: PathBuf,

    /// Directory with system JSON documents (same file names)
    #[arg(short, long)]
    pub system: PathBuf,

    /// Gold timex layer name
    #[arg(long, default_value = GOLD_TIMEX_LAYER)]
    pub gold_layer: String,

    /// System timex layer name
    #[arg(long, default_value = AUTO_TIMEX_LAYER)]
    pub system_layer: String,

    /// Write per-document logs and results to this file
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Also report per-attribute accuracy over matched spans
    #[arg(long)]
    pub attr_accuracy: bool,
}

/// Run a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Convert(args) => run_convert(&args),
        Command::ExportBrat(args) => run_export_brat(&args),
        Command::Eval(args) => run_eval(&args),
    }
}

fn sorted_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(extension))
        .collect();
    files.sort();
    Ok(files)
}

fn run_convert(args: &ConvertArgs) -> Result<()> {
    if !args.input.is_dir() {
        return Err(Error::parse(format!(
            "unexpected input directory: {:?}",
            args.input
        )));
    }
    if !args.dry_run {
        std::fs::create_dir_all(&args.output)?;
    }
    let format = args.format.unwrap_or_else(|| infer_format(&args.input));
    let mut converted = 0usize;
    let mut timex_count = 0usize;

    let documents: Vec<(String, Document)> = match format {
        CorpusFormat::Brat => {
            let docs = import_brat_folder(&args.input)?;
            docs.into_iter()
                .map(|d| {
                    let name = d.meta.get("file").cloned().unwrap_or_default();
                    (name, d)
                })
                .collect()
        }
        CorpusFormat::Tokenized | CorpusFormat::Timeml => {
            let extension = match format {
                CorpusFormat::Tokenized => "t3-olp-ajav",
                _ => "tml",
            };
            let options = TokenizedImportOptions::default();
            let mut docs = Vec::new();
            for path in sorted_files_with_extension(&args.input, extension)? {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                println!("  Converting {name} ...");
                let imported = match format {
                    CorpusFormat::Tokenized => import_tokenized_file(&path, &options)?,
                    _ => import_timeml_file(&path, GOLD_TIMEX_LAYER)?,
                };
                if let Some(document) = imported {
                    docs.push((name, document));
                }
            }
            docs
        }
    };

    for (name, document) in &documents {
        if let Some(layer) = document.layer(GOLD_TIMEX_LAYER) {
            timex_count += layer.len();
        } else if let Some(layer) = document.layer("timexes") {
            timex_count += layer.len();
        }
        if !args.dry_run {
            document.save(args.output.join(format!("{name}.json")))?;
        }
        converted += 1;
    }

    println!();
    println!(" Docs converted:        {converted}");
    println!("    Explicit timexes:   {timex_count}");
    Ok(())
}

fn infer_format(dir: &Path) -> CorpusFormat {
    let has = |ext: &str| {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .any(|e| e.path().extension().and_then(|x| x.to_str()) == Some(ext))
            })
            .unwrap_or(false)
    };
    if has("t3-olp-ajav") {
        CorpusFormat::Tokenized
    } else if has("tml") {
        CorpusFormat::Timeml
    } else {
        CorpusFormat::Brat
    }
}

fn run_export_brat(args: &ExportBratArgs) -> Result<()> {
    let mut documents: Vec<(String, Document)> = Vec::new();
    for path in sorted_files_with_extension(&args.input, "json")? {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("  Converting {name} ...");
        documents.push((name, Document::load(&path)?));
    }
    let exported = write_brat_folder(&documents, &args.output, &args.layer, args.dry_run)?;
    println!();
    println!(" Docs converted:        {}", documents.len());
    println!("    Explicit timexes:   {exported}");
    Ok(())
}

fn run_eval(args: &EvalArgs) -> Result<()> {
    let mut corpus_stats = DiffStats::new();
    let mut subcorpus_stats = DiffStats::new();
    let mut last_subcorpus: Option<String> = None;
    let mut evaluated = 0usize;
    let mut failed = 0usize;

    for gold_path in sorted_files_with_extension(&args.gold, "json")? {
        let file_name = gold_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let system_path = args.system.join(&file_name);
        if !system_path.is_file() {
            log::warn!("no system document for {file_name:?}; skipped");
            continue;
        }
        println!("  Evaluating {file_name} ...");
        let outcome = evaluate_pair(args, &gold_path, &system_path);
        let (gold_document, evaluation) = match outcome {
            Ok(result) => result,
            Err(e) => {
                // a fatal error aborts this document only, not the batch
                log::error!("cannot evaluate {file_name:?}: {e}");
                failed += 1;
                continue;
            }
        };
        evaluated += 1;

        let subcorpus = gold_document.meta.get("_subcorpus").cloned();
        corpus_stats.merge(&evaluation.stats);
        if let Some(subcorpus) = &subcorpus {
            if last_subcorpus.as_deref().is_some_and(|s| s != subcorpus) {
                flush_subcorpus(args, &mut subcorpus_stats, last_subcorpus.as_deref())?;
            }
            subcorpus_stats.merge(&evaluation.stats);
        }
        last_subcorpus = subcorpus;

        if let Some(log_path) = &args.log_file {
            let lines = document_log(&gold_document, &evaluation.diff, &evaluation.relaxed);
            write_log(log_path, Some(&file_name), &lines)?;
            let report = EvalReport::from_stats(&evaluation.stats);
            write_log(log_path, None, &report.render(None, args.attr_accuracy))?;
        }
    }
    flush_subcorpus(args, &mut subcorpus_stats, last_subcorpus.as_deref())?;

    let report = EvalReport::from_stats(&corpus_stats);
    let title = format!(" Corpus {:?} results", args.gold.display().to_string());
    let lines = report.render(Some(&title), args.attr_accuracy);
    for line in &lines {
        println!("{line}");
    }
    if let Some(log_path) = &args.log_file {
        write_log(log_path, None, &lines)?;
    }
    println!(" Documents evaluated: {evaluated} ({failed} failed)");
    Ok(())
}

type PairOutcome = (Document, crate::eval::DocumentEvaluation);

fn evaluate_pair(args: &EvalArgs, gold_path: &Path, system_path: &Path) -> Result<PairOutcome> {
    let gold_document = Document::load(gold_path)?;
    let system_document = Document::load(system_path)?;
    let evaluation = evaluate_document(
        &gold_document,
        &system_document,
        &args.gold_layer,
        &args.system_layer,
    )?;
    Ok((gold_document, evaluation))
}

fn flush_subcorpus(
    args: &EvalArgs,
    stats: &mut DiffStats,
    subcorpus: Option<&str>,
) -> Result<()> {
    let Some(subcorpus) = subcorpus else {
        return Ok(());
    };
    if stats.documents == 0 {
        return Ok(());
    }
    let report = EvalReport::from_stats(stats);
    let title = format!(" Subcorpus {subcorpus:?} results");
    let lines = report.render(Some(&title), args.attr_accuracy);
    if let Some(log_path) = &args.log_file {
        write_log(log_path, None, &lines)?;
    }
    *stats = DiffStats::new();
    Ok(())
}

fn write_log(path: &Path, title: Option<&str>, lines: &[String]) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    if let Some(title) = title {
        writeln!(file, "{}", "=".repeat(50))?;
        writeln!(file, "{}{title}", " ".repeat(10))?;
        writeln!(file, "{}", "=".repeat(50))?;
    }
    for line in lines {
        writeln!(file, "{line}")?;
    }
    writeln!(file)?;
    Ok(())
}
