use clap::{Parser, Subcommand};

mod demo;

use leadflow_core::Settings;
use leadflow_knowledge::MarketingKnowledgeBase;
use leadflow_memory::{HashEmbedder, MemoryManager};

use demo::{run_insights_demo, run_sequence_demo, run_strategy_demo, run_subject_lines_demo};

#[derive(Parser, Debug)]
#[command(name = "leadflow", version)]
#[command(about = "Leadflow CLI - marketing automation agents, knowledge, and memory tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show which API integrations are configured
    Check,
    /// Run a marketing agent demo operation (requires an LLM API key)
    Agent {
        /// Operation: strategy, subject-lines, sequence, insights
        #[arg(long)]
        name: String,
    },
    /// Inspect and seed the marketing knowledge base
    Knowledge {
        #[command(subcommand)]
        knowledge_command: KnowledgeCommands,
    },
    /// Memory maintenance
    Memory {
        #[command(subcommand)]
        memory_command: MemoryCommands,
    },
}

#[derive(Subcommand, Debug)]
enum KnowledgeCommands {
    /// Load the default marketing documents if the base is empty
    Seed,
    /// Search the knowledge base
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
enum MemoryCommands {
    /// Delete conversations older than the given number of days
    Cleanup {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

type CliError = Box<dyn std::error::Error>;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize JSON logging once.
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter, // fallback to default if parsing fails
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .try_init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    let result = match cli.command {
        Commands::Check => {
            run_check(&settings);
            Ok(())
        }
        Commands::Agent { name } => match name.as_str() {
            "strategy" => run_strategy_demo(&settings).await,
            "subject-lines" => run_subject_lines_demo(&settings).await,
            "sequence" => run_sequence_demo(&settings).await,
            "insights" => run_insights_demo(&settings).await,
            _ => {
                tracing::error!(operation = %name, "Unknown agent operation requested");
                std::process::exit(1);
            }
        },
        Commands::Knowledge { knowledge_command } => run_knowledge(&settings, knowledge_command),
        Commands::Memory { memory_command } => run_memory(&settings, memory_command).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}

fn run_check(settings: &Settings) {
    println!("API integrations:");
    let mut integrations: Vec<_> = settings.validate_required_apis().into_iter().collect();
    integrations.sort_unstable_by_key(|(name, _)| *name);
    for (name, configured) in integrations {
        let status = if configured { "configured" } else { "missing" };
        println!("  {name}: {status}");
    }

    let missing = settings.missing_apis();
    if missing.is_empty() {
        println!("All integrations configured.");
    } else {
        println!("Missing keys for: {}", missing.join(", "));
    }
}

fn run_knowledge(settings: &Settings, command: KnowledgeCommands) -> Result<(), CliError> {
    let embedder = std::sync::Arc::new(HashEmbedder::new(settings.memory.embedding_dimensions));
    let base = MarketingKnowledgeBase::open(&settings.database.knowledge_db_path, embedder)?;

    match command {
        KnowledgeCommands::Seed => {
            let seeded = base.seed_defaults()?;
            if seeded > 0 {
                println!("Seeded {seeded} documents.");
            } else {
                println!(
                    "Knowledge base already has {} documents.",
                    base.count()?
                );
            }
        }
        KnowledgeCommands::Search { query, limit } => {
            let hits = base.search(&query, None, None, limit)?;
            if hits.is_empty() {
                println!("No documents match \"{query}\".");
                return Ok(());
            }
            for hit in hits {
                println!(
                    "{:.3}  {} ({}, {})",
                    hit.relevance_score,
                    hit.document.title,
                    hit.document.document_type,
                    hit.document.category,
                );
            }
        }
    }
    Ok(())
}

async fn run_memory(settings: &Settings, command: MemoryCommands) -> Result<(), CliError> {
    let memory = MemoryManager::from_settings(settings).await?;

    match command {
        MemoryCommands::Cleanup { days } => {
            let deleted = memory.cleanup_old_conversations(days).await?;
            println!("Deleted {deleted} conversations older than {days} days.");
        }
    }
    Ok(())
}
