mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tlcm_core::AppError;

use commands::Command;

#[derive(Parser, Debug)]
#[command(name = "tlcm", version, about = "ThinLinc Connection Manager")]
struct Args {
    /// Data directory (defaults to $TLCM_HOME, then ~/.tlcm)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match commands::run(args.home, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::from(exit_status(&err))
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "tlcm=debug,tlcm_core=debug"
        } else {
            "warn"
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(err: &anyhow::Error) {
    eprintln!("error: {:#}", err);
    if let Some(hint) = err.downcast_ref::<AppError>().and_then(AppError::remediation) {
        eprintln!("{}", hint);
    }
}

fn exit_status(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<AppError>()
        .and_then(|e| u8::try_from(e.code().code()).ok())
        .unwrap_or(1)
}
