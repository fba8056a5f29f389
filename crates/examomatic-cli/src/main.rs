//! examomatic CLI — take practice exams against a question-bank service.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examomatic", version, about = "Practice exam runner for certification question banks")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List test banks with their latest scores
    Banks,

    /// Take an exam
    Take {
        /// Test bank id
        #[arg(long)]
        bank: u64,

        /// Show correctness and explanation after each answer
        #[arg(long)]
        practice: bool,

        /// Keep the stored question and option order
        #[arg(long)]
        no_shuffle: bool,

        /// Confirm answers with the service instead of locally
        #[arg(long)]
        server_check: bool,
    },

    /// Show past results for a test bank
    History {
        /// Test bank id
        #[arg(long)]
        bank: u64,
    },

    /// Delete a test bank and its questions
    Delete {
        /// Test bank id
        #[arg(long)]
        bank: u64,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Upload a JSON question file
    Import {
        /// Path to the import file
        #[arg(long)]
        file: PathBuf,
    },

    /// Check a JSON question file without uploading it
    Validate {
        /// Path to the import file
        #[arg(long)]
        file: PathBuf,
    },

    /// Create a starter config and example question file
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examomatic=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Banks => commands::banks::execute(config).await,
        Commands::Take {
            bank,
            practice,
            no_shuffle,
            server_check,
        } => commands::take::execute(bank, practice, no_shuffle, server_check, config).await,
        Commands::History { bank } => commands::history::execute(bank, config).await,
        Commands::Delete { bank, yes } => commands::delete::execute(bank, yes, config).await,
        Commands::Import { file } => commands::import::execute(file, config).await,
        Commands::Validate { file } => commands::validate::execute(file),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
