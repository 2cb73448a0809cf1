//! catsim CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "catsim",
    version,
    about = "Computerized adaptive testing simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate adaptive test sessions
    Run {
        /// Config file path (flags override its values)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Item difficulties, comma-separated (e.g. "-1.0, 0.0, 1.0")
        #[arg(long, allow_hyphen_values = true)]
        items: Option<String>,

        /// True abilities of the simulated examinees, comma-separated
        #[arg(long, allow_hyphen_values = true)]
        abilities: Option<String>,

        /// Stopping rule: fixed-length or target-sem
        #[arg(long)]
        rule: Option<String>,

        /// Test length for the fixed-length rule
        #[arg(long)]
        length: Option<usize>,

        /// Target standard error for the target-sem rule
        #[arg(long)]
        target_sem: Option<f64>,

        /// Estimation method: mle or wle
        #[arg(long)]
        method: Option<String>,

        /// Base random seed (random when omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Sessions per examinee
        #[arg(long)]
        replications: Option<u32>,

        /// Max concurrent sessions
        #[arg(long)]
        parallelism: Option<usize>,

        /// Abort if the whole batch takes longer than this
        #[arg(long)]
        time_budget_secs: Option<u64>,

        /// Output directory
        #[arg(long, default_value = "./catsim-results")]
        output: PathBuf,

        /// Output format: json, csv, html, all (comma-separated)
        #[arg(long, default_value = "json,csv")]
        format: String,

        /// Print the item-by-item table of every session
        #[arg(long)]
        detail: bool,
    },

    /// Validate a config file
    Validate {
        /// Config file path
        #[arg(long)]
        config: PathBuf,
    },

    /// Regenerate CSV/HTML output from a saved JSON report
    Export {
        /// Report JSON written by `catsim run`
        #[arg(long)]
        report: PathBuf,

        /// Output directory
        #[arg(long, default_value = "./catsim-results")]
        output: PathBuf,

        /// Output format: csv, html, all (comma-separated)
        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// Create a starter config
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("catsim=info".parse().expect("static directive parses")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            items,
            abilities,
            rule,
            length,
            target_sem,
            method,
            seed,
            replications,
            parallelism,
            time_budget_secs,
            output,
            format,
            detail,
        } => {
            let args = commands::run::RunArgs {
                config,
                items,
                abilities,
                rule,
                length,
                target_sem,
                method,
                seed,
                replications,
                parallelism,
                time_budget_secs,
                output,
                format,
                detail,
            };
            commands::run::execute(args).await
        }
        Commands::Validate { config } => commands::validate::execute(config),
        Commands::Export {
            report,
            output,
            format,
        } => commands::export::execute(report, output, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
