//! apiscout — entry point.

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use apiscout_cli::commands::{self, check::CheckOptions, discover::DiscoverOptions};
use apiscout_cli::report::Verdict;
use apiscout_cli::{config, output};

#[derive(Parser)]
#[command(
    name = "apiscout",
    about = "apiscout — find out which credentials and endpoints an HTTP API really accepts",
    version,
    after_help = "Run 'apiscout <command> --help' for details on each command."
)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find a client-credentials variant the token endpoint accepts.
    Negotiate,

    /// Negotiate a token, then probe every base URL / path combination.
    Discover {
        /// Also probe GET paths listed by Swagger/OpenAPI documents found.
        #[arg(long)]
        follow_docs: bool,

        /// Minimum percentage of reachable probes for a zero exit status.
        #[arg(long)]
        acceptable: Option<f64>,
    },

    /// Validate the client bundle layout and manifest.
    Bundle {
        /// Bundle directory (overrides `bundle.root`).
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Run bundle, authentication and endpoint checks and grade the result.
    Check {
        #[arg(long)]
        follow_docs: bool,

        /// Skip the bundle section even when configured.
        #[arg(long)]
        skip_bundle: bool,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   apiscout completions bash > ~/.local/share/bash-completion/completions/apiscout
    ///   apiscout completions zsh > ~/.zfunc/_apiscout
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var(output::ENV_JSON, "1");
    }
    if cli.quiet {
        std::env::set_var(output::ENV_QUIET, "1");
    }
    if cli.no_color {
        std::env::set_var(output::ENV_NO_COLOR, "1");
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    let logs = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json {
        logs.json().init();
    } else {
        logs.init();
    }

    let result = match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "apiscout", &mut std::io::stdout());
            Ok(Verdict::Pass)
        }
        command => dispatch(command, cli.config).await,
    };

    // Consistent exit codes: 0=success, 1=error or below threshold
    match result {
        Ok(verdict) => std::process::exit(verdict.exit_code()),
        Err(e) => {
            if !output::is_quiet() && !output::is_json() {
                eprintln!("  Error: {e:#}");
            }
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "error": true,
                    "message": format!("{e:#}"),
                }));
            }
            std::process::exit(1);
        }
    }
}

async fn dispatch(command: Commands, config_path: Option<PathBuf>) -> Result<Verdict> {
    let config = config::load(config_path.as_deref())?;

    match command {
        Commands::Negotiate => commands::negotiate::run(&config).await,
        Commands::Discover {
            follow_docs,
            acceptable,
        } => {
            commands::discover::run(
                &config,
                DiscoverOptions {
                    follow_docs,
                    acceptable,
                },
            )
            .await
        }
        Commands::Bundle { root } => commands::bundle_cmd::run(&config, root.as_deref()),
        Commands::Check {
            follow_docs,
            skip_bundle,
        } => {
            commands::check::run(
                &config,
                CheckOptions {
                    follow_docs,
                    skip_bundle,
                },
            )
            .await
        }
        Commands::Completions { .. } => Ok(Verdict::Pass),
    }
}
