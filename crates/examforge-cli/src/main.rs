//! examforge CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examforge", version, about = "Timed practice-assessment engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a question set for an event
    Compose {
        /// Event name (defaults to the configured default)
        #[arg(long)]
        event: Option<String>,

        /// Number of questions
        #[arg(long)]
        count: Option<usize>,

        /// Question type filter: mcq, frq, any
        #[arg(long, default_value = "any")]
        types: String,

        /// Difficulty bands, comma-separated (very-easy..very-hard)
        #[arg(long)]
        difficulty: Option<String>,

        /// Subtopic filters, comma-separated
        #[arg(long)]
        subtopics: Option<String>,

        /// Supplemental identification percentage
        #[arg(long)]
        id_percentage: Option<u8>,

        /// Time limit in seconds (part of the session signature)
        #[arg(long)]
        time_limit: Option<u64>,

        /// Local JSON question bank instead of the question service
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Output path for the composed set JSON
        #[arg(long, default_value = "set.json")]
        output: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Grade an answers file against a composed set
    Grade {
        /// Composed set JSON (from `examforge compose`)
        #[arg(long)]
        set: PathBuf,

        /// Answers JSON: question index -> response
        #[arg(long)]
        answers: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example question bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examforge=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compose {
            event,
            count,
            types,
            difficulty,
            subtopics,
            id_percentage,
            time_limit,
            bank,
            output,
            config,
        } => {
            commands::compose::execute(
                event,
                count,
                types,
                difficulty,
                subtopics,
                id_percentage,
                time_limit,
                bank,
                output,
                config,
            )
            .await
        }
        Commands::Grade {
            set,
            answers,
            config,
        } => commands::grade::execute(set, answers, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
