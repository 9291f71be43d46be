//! Sample agent runs for the `agent` subcommand.

use std::sync::Arc;

use leadflow_agents::{CampaignBrief, MarketingExpert, OpenAiChat};
use leadflow_core::Settings;
use leadflow_knowledge::{MarketingKnowledgeBase, RagRetriever};
use leadflow_memory::{HashEmbedder, MemoryManager};

type CliError = Box<dyn std::error::Error>;

async fn build_expert(settings: &Settings) -> Result<MarketingExpert, CliError> {
    let model = Arc::new(OpenAiChat::from_settings(settings));
    let memory = MemoryManager::from_settings(settings).await?;

    let embedder = Arc::new(HashEmbedder::new(settings.memory.embedding_dimensions));
    let base = MarketingKnowledgeBase::open(&settings.database.knowledge_db_path, embedder)?;
    base.seed_defaults()?;
    let retriever = RagRetriever::new(Arc::new(base));

    Ok(MarketingExpert::new(model, memory, retriever))
}

pub async fn run_strategy_demo(settings: &Settings) -> Result<(), CliError> {
    println!("Running campaign strategy demo...");
    let expert = build_expert(settings).await?;

    let mut brief = CampaignBrief::new(
        "Generate qualified B2B leads",
        "VP Sales at mid-market SaaS companies",
    );
    brief.industry = Some("software".to_string());
    brief.timeline = Some("6 weeks".to_string());

    let strategy = expert.create_campaign_strategy(&brief).await?;
    println!("\n=== Campaign Strategy ===\n{}", strategy.strategy);
    println!(
        "\n--- Best practices used ---\n{}",
        strategy.best_practices_used
    );
    Ok(())
}

pub async fn run_subject_lines_demo(settings: &Settings) -> Result<(), CliError> {
    println!("Running subject line optimization demo...");
    let expert = build_expert(settings).await?;

    let result = expert
        .optimize_subject_lines(
            "Quick question about your sales process",
            "marketing directors",
            "cold outreach",
        )
        .await?;
    println!("\n=== Subject Line Optimization ===\n{}", result.optimization);
    Ok(())
}

pub async fn run_sequence_demo(settings: &Settings) -> Result<(), CliError> {
    println!("Running multi-touch sequence demo...");
    let expert = build_expert(settings).await?;

    let sequence = expert
        .create_multi_touch_sequence("Book product demos", "Heads of Revenue Operations", 5, None)
        .await?;
    println!(
        "\n=== {}-touch sequence via {} ===\n{}",
        sequence.sequence_length,
        sequence.channels.join(", "),
        sequence.sequence
    );
    Ok(())
}

pub async fn run_insights_demo(settings: &Settings) -> Result<(), CliError> {
    println!("Running marketing insights demo...");
    let expert = build_expert(settings).await?;

    let insights = expert.marketing_insights("personalization").await?;
    println!("\n=== Marketing Insights ===\n{}", insights.insights);
    if !insights.knowledge_base_used {
        println!("\n(no knowledge base guidance matched this topic)");
    }
    Ok(())
}
