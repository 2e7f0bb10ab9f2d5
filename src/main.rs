//! chatmirror CLI entry point.

use clap::Parser;
use cm::cli::commands;
use cm::cli::{Cli, Commands};
use cm::config::Config;
use cm::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    // Run the command and handle errors
    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,hyper_util=info,reqwest=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Credentials and paths for commands that talk to the API.
fn sync_config(cli: &Cli) -> Result<Config, Error> {
    Config::resolve(
        cli.identifier.as_deref(),
        cli.key.as_deref(),
        cli.site.as_deref(),
        &cli.base_url,
        cli.data_dir.as_deref(),
    )
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    match &cli.command {
        Commands::Conversations(args) => {
            commands::conversations::execute(args, &sync_config(cli)?, json)
        }
        Commands::Messages(args) => commands::messages::execute(args, &sync_config(cli)?, json),
        Commands::People(args) => commands::people::execute(args, &sync_config(cli)?, json),

        // Local-only, no credentials needed
        Commands::Status => commands::status::execute(cli.data_dir.as_deref(), json),
        Commands::Version => commands::version::execute(json),
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
