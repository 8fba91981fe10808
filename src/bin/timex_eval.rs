//! Batch CLI for temporal annotation corpus conversion and evaluation.

use clap::Parser;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = timex_eval::cli::Cli::parse();
    if let Err(e) = timex_eval::cli::run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
