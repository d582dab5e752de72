use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jshost::{config::DEFAULT_MAX_CALL_DEPTH, HostConfig, HostError, Repl, State};

#[derive(Parser)]
#[command(author, version, about = "Embeddable script host")]
struct Args {
    /// Nested script calls allowed before a RangeError (at most 128)
    #[arg(long, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_call_depth: usize,
    /// Log filter, e.g. `debug` or `jshost=trace`; defaults to RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run script files in order, sharing one global scope
    Run {
        #[arg(required = true)]
        scripts: Vec<PathBuf>,
    },
    /// Run a snippet of source text
    Eval { source: String },
    /// Start an interactive session
    Repl,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());
    let config = HostConfig::default().with_max_call_depth(args.max_call_depth);
    match execute(args.command.unwrap_or(Command::Repl), config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(HostError::Failed(script)) => {
            tracing::debug!(%script, "script failed");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command, config: HostConfig) -> Result<(), HostError> {
    match command {
        Command::Run { scripts } => {
            let mut state = State::with_config(config);
            for script in scripts {
                if state.run_from_file(&script).is_failure() {
                    return Err(HostError::Failed(script.display().to_string()));
                }
            }
            state.destroy();
            Ok(())
        }
        Command::Eval { source } => {
            let mut state = State::with_config(config);
            if state.run_from_string(&source).is_failure() {
                return Err(HostError::Failed("(string)".into()));
            }
            Ok(())
        }
        Command::Repl => Repl::new(config).run(),
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
