mod cli;
mod core;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "geobill", about = "Billing and SLA collator for distributed DNS infrastructure", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the network config file
    #[arg(short, long, global = true, default_value = "geobill.toml")]
    config: PathBuf,

    /// Output as JSON instead of text
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the collator service: hourly refresh, daily and monthly reports
    Serve,
    /// Compute and print the current cost cross-index once
    Refresh,
    /// Evaluate SLAs for a billing month
    Sla {
        /// Billing month as YYYY-MM (default: previous month)
        #[arg(short, long)]
        month: Option<String>,
    },
    /// Generate report artifacts for a billing month on demand
    Generate {
        /// Billing month as YYYY-MM (default: previous month)
        #[arg(short, long)]
        month: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate a starter config file
    Init,
    /// Validate the config file
    Check,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output_opts = cli::output::OutputOptions {
        format: if cli.json {
            cli::output::OutputFormat::Json
        } else {
            cli::output::OutputFormat::Text
        },
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color),
    };

    match cli.command {
        Commands::Serve => cli::serve_cmd::run(&cli.config, &output_opts).await?,
        Commands::Refresh => cli::billing_cmd::refresh(&cli.config, &output_opts)?,
        Commands::Sla { month } => {
            cli::billing_cmd::sla_report(&cli.config, month.as_deref(), &output_opts)?
        }
        Commands::Generate { month } => {
            cli::billing_cmd::generate(&cli.config, month.as_deref(), &output_opts)?
        }
        Commands::Config { action } => match action {
            ConfigAction::Init => cli::config_cmd::init(&cli.config, &output_opts)?,
            ConfigAction::Check => cli::config_cmd::check(&cli.config, &output_opts)?,
        },
    }

    Ok(())
}
