//! draftflow CLI - editorial workflow over a Git content host.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    output::set_quiet(cli.quiet);
    init_tracing(cli.verbose);

    let config = cli.config.as_path();
    let result = match cli.command {
        Commands::Init {
            owner,
            repo,
            base_branch,
            api_url,
            force,
        } => commands::init::run(config, owner, repo, base_branch, api_url, force),
        Commands::Save(args) => commands::save::run(config, &args),
        Commands::Status { key, json } => commands::status::run(config, &key, json),
        Commands::SetStatus { key, status } => commands::status::run_set(config, &key, status),
        Commands::Publish { key } => commands::publish::run(config, &key),
        Commands::Discard { key } => commands::discard::run(config, &key),
        Commands::Delete {
            path,
            branch,
            message,
        } => commands::delete::run(config, &path, branch.as_deref(), message.as_deref()),
        Commands::List { json } => commands::list::run(config, json),
    };

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

/// Log to stderr; `RUST_LOG` overrides the level picked by `--verbose`.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
