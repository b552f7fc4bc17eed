//! pqsim binary.
//!
//! Reads single-letter scheduler commands from stdin (or a script file) and
//! reports each scheduling decision on stdout. Logs go to stderr.

use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use pqsim_shell::{config, OutputFormat, Overrides, Session};
use tracing::info;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "pqsim")]
#[command(about = "Interactive multilevel feedback queue scheduler simulator")]
struct Args {
    /// TOML file with scheduler policies
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read commands from a file instead of stdin
    #[arg(short, long, value_name = "PATH")]
    script: Option<PathBuf>,

    /// Print one JSON object per command instead of text
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    setup_tracing(args.verbose);

    let config = config::load(args.config.as_deref())?;
    let config = args.overrides.apply(config);
    info!(?config, "starting pqsim");

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let stdout = io::stdout().lock();

    match &args.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open script {}", path.display()))?;
            let mut session = Session::new(config, format, stdout);
            session.run(BufReader::new(file))?;
        }
        None => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            let mut session = Session::new(config, format, stdout).with_prompt(interactive);
            session.run(stdin.lock())?;
        }
    }

    info!("pqsim finished");
    Ok(())
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("pqsim_core=debug,pqsim_shell=debug,pqsim=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}
