//! winocr: recognize text in images with the Windows OCR engine.

mod cli;
mod output;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use winocr_session::WinOcrError;

use cli::commands::recognize::BatchFailed;
use cli::{Cli, Commands};
use output::Output;

fn main() {
    // Logs go to stderr, stdout carries results
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new(cli.json);

    if let Err(e) = run(cli, &output) {
        if let Some(err) = e.downcast_ref::<WinOcrError>() {
            output.print_error(None, err);
        } else if e.downcast_ref::<BatchFailed>().is_none() {
            error!("{:#}", e);
        }
        std::process::exit(exit_code(&e));
    }
}

fn run(cli: Cli, output: &Output) -> anyhow::Result<()> {
    let options = cli.session_options();

    match cli.command {
        Commands::Recognize(args) => cli::commands::recognize::run(options, args, output),
        Commands::Languages => cli::commands::languages::run(options, output),
        Commands::Info => cli::commands::info::run(options, output),
    }
}

/// Exit status for a failed run. Usage errors exit with 2 from clap.
fn exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<WinOcrError>() {
        Some(err) => err.category().exit_code(),
        None => 1,
    }
}
