//! monke — the scripting language's command-line entry point
//! (spec.md §6). With no arguments, starts an interactive prompt. With
//! one argument, runs it as a script file. More than one argument is a
//! usage error (clap rejects the extra positional with its own exit
//! code 2, matching spec.md §6 exactly).

use std::path::PathBuf;

use clap::Parser;

use monke_drv::{Config, Session};

#[derive(Parser, Debug)]
#[command(name = "monke")]
#[command(author = "Monke contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a monke script, or start the interactive prompt with no arguments")]
struct Cli {
    /// Script to execute. Omit to start the interactive prompt.
    script: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true, env = "MONKE_VERBOSE")]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = Config { script: cli.script };
    let mut session = Session::new(config);
    std::process::exit(session.run());
}
