use anyhow::Result;
use clap::{Parser, Subcommand};
use parcelscan_cli::commands;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "parcelscan")]
#[command(about = "Parcelscan - Tracking code classification and scan session simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify tracking codes by carrier
    Classify {
        /// Tracking codes to classify
        codes: Vec<String>,

        /// File with one tracking code per line ("-" for stdin)
        #[arg(short, long)]
        input: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one scan session over a simulated platform
    Simulate {
        /// JSON scenario file
        #[arg(short, long)]
        script: String,

        /// TOML scanner configuration
        #[arg(short, long)]
        config: Option<String>,

        /// Output JSON file for the session report
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Print the effective scanner configuration
    Config {
        /// TOML configuration to validate
        #[arg(short, long)]
        input: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Execute command
    match cli.command {
        Commands::Classify { codes, input, json } => {
            commands::classify::execute(&codes, input.as_deref(), json)
        }

        Commands::Simulate {
            script,
            config,
            output,
        } => commands::simulate::execute(&script, config.as_deref(), output.as_deref()),

        Commands::Config { input } => commands::config::execute(input.as_deref()),
    }
}
