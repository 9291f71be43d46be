//! Senior marketing strategist agent.
//!
//! Every operation builds a prompt, pulls in knowledge-base guidance where it
//! helps, runs the chat model, and records the exchange in memory.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use leadflow_core::AgentError;
use leadflow_knowledge::RagRetriever;
use leadflow_memory::MemoryManager;

use crate::llm::{ChatMessage, ChatModel};
use crate::memory_enhanced::MemoryEnhanced;

const AGENT_NAME: &str = "MarketingExpert";

/// Knowledge context budget when enhancing a prompt.
const KNOWLEDGE_CHARS: usize = 1000;

/// Campaigns above this success rate are worth learning from.
const LEARNING_THRESHOLD: f64 = 0.1;

const DESCRIPTION: &str = "\
I am a senior marketing strategist with deep expertise in B2B marketing \
automation, personalization, and campaign optimization. I help create \
data-driven marketing strategies that generate qualified leads and drive \
revenue growth.

My specialties include:
- Campaign strategy and planning
- Personalization and targeting
- Message optimization and A/B testing
- Marketing automation workflows
- Lead nurturing sequences
- Performance analysis and optimization";

const INSTRUCTIONS: &str = "\
You are a senior marketing expert with 10+ years of experience in B2B marketing.

Always:
- Provide data-driven recommendations based on best practices
- Consider the target audience and personalization opportunities
- Suggest A/B testing strategies for optimization
- Reference specific metrics and KPIs for success measurement
- Incorporate current marketing trends and technologies
- Use the knowledge base to enhance your recommendations

When asked about campaigns:
1. First understand the goal and target audience
2. Research relevant best practices from the knowledge base
3. Provide specific, actionable recommendations
4. Include measurement and optimization strategies
5. Consider multi-channel approaches when appropriate

Always maintain a strategic perspective while being practical and actionable.";

/// Requirements for a campaign strategy.
#[derive(Debug, Clone)]
pub struct CampaignBrief {
    pub goal: String,
    pub target_audience: String,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    pub industry: Option<String>,
}

impl CampaignBrief {
    pub fn new(goal: impl Into<String>, target_audience: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            target_audience: target_audience.into(),
            budget: None,
            timeline: None,
            industry: None,
        }
    }
}

/// The prospect a personalization strategy targets.
#[derive(Debug, Clone, Default)]
pub struct ContactProfile {
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
}

/// Research gathered about a prospect's company.
#[derive(Debug, Clone, Default)]
pub struct ResearchData {
    pub company_info: Option<String>,
    pub technologies: Option<String>,
    pub news: Option<String>,
    pub funding: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CampaignStrategy {
    pub strategy: String,
    pub campaign_goal: String,
    pub target_audience: String,
    /// Best-practice guidance that fed the prompt, capped at 500 chars.
    pub best_practices_used: String,
}

#[derive(Debug, Clone)]
pub struct SubjectLineOptimization {
    pub optimization: String,
    pub original_subject: String,
    pub guidance_used: String,
}

#[derive(Debug, Clone)]
pub struct PersonalizationPlan {
    pub strategy: String,
    pub target_company: String,
    pub research_used: bool,
}

#[derive(Debug, Clone)]
pub struct PerformanceAnalysis {
    pub analysis: String,
    pub campaign_type: String,
    pub historical_context: String,
}

#[derive(Debug, Clone)]
pub struct TouchSequence {
    pub sequence: String,
    pub campaign_goal: String,
    pub target_persona: String,
    pub channels: Vec<String>,
    pub sequence_length: usize,
}

#[derive(Debug, Clone)]
pub struct MarketingInsights {
    pub insights: String,
    pub topic: String,
    pub knowledge_base_used: bool,
}

/// Expert marketing agent for campaign strategy, personalization, and
/// performance optimization.
pub struct MarketingExpert {
    model: Arc<dyn ChatModel>,
    memory: MemoryManager,
    retriever: RagRetriever,
    session_id: String,
}

impl MemoryEnhanced for MarketingExpert {
    fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    fn agent_name(&self) -> &str {
        AGENT_NAME
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl MarketingExpert {
    pub fn new(model: Arc<dyn ChatModel>, memory: MemoryManager, retriever: RagRetriever) -> Self {
        Self {
            model,
            memory,
            retriever,
            session_id: format!("{AGENT_NAME}_session"),
        }
    }

    async fn ask(&self, prompt: &str) -> Result<String, AgentError> {
        let messages = [
            ChatMessage::system(format!("{DESCRIPTION}\n\n{INSTRUCTIONS}")),
            ChatMessage::user(prompt),
        ];
        let completion = self.model.complete(&messages).await?;
        Ok(completion.content)
    }

    /// Create a comprehensive campaign strategy for the brief.
    pub async fn create_campaign_strategy(
        &self,
        brief: &CampaignBrief,
    ) -> Result<CampaignStrategy, AgentError> {
        info!(goal = %brief.goal, "creating campaign strategy");

        let knowledge_context = format!(
            "campaign strategy {} {}",
            brief.goal,
            brief.industry.as_deref().unwrap_or("")
        );
        let best_practices = self
            .retriever
            .best_practice_guidance(&format!("{} campaign", brief.goal))?;

        let base_prompt = format!(
            "Create a comprehensive campaign strategy with the following requirements:\n\
             \n\
             Campaign Goal: {}\n\
             Target Audience: {}\n\
             Budget: {}\n\
             Timeline: {}\n\
             Industry: {}\n\
             \n\
             Please provide:\n\
             1. Campaign overview and key objectives\n\
             2. Target audience analysis and segmentation\n\
             3. Channel strategy and mix\n\
             4. Content and messaging approach\n\
             5. Timeline and milestones\n\
             6. Budget allocation recommendations\n\
             7. KPIs and success metrics\n\
             8. Risk assessment and mitigation strategies",
            brief.goal,
            brief.target_audience,
            brief.budget.as_deref().unwrap_or("Not specified"),
            brief.timeline.as_deref().unwrap_or("Not specified"),
            brief.industry.as_deref().unwrap_or("Not specified"),
        );
        let prompt =
            self.retriever
                .enhance_prompt(&base_prompt, &knowledge_context, KNOWLEDGE_CHARS)?;

        let strategy = self.ask(&prompt).await?;

        let mut context = HashMap::new();
        context.insert("campaign_goal".to_string(), brief.goal.clone());
        context.insert(
            "target_audience".to_string(),
            brief.target_audience.clone(),
        );
        if let Some(industry) = &brief.industry {
            context.insert("industry".to_string(), industry.clone());
        }
        self.remember_interaction(
            &format!("Campaign strategy request: {}", brief.goal),
            &strategy,
            context,
        )
        .await?;

        Ok(CampaignStrategy {
            strategy,
            campaign_goal: brief.goal.clone(),
            target_audience: brief.target_audience.clone(),
            best_practices_used: truncated(&best_practices, 500),
        })
    }

    /// Optimize an email subject line for better open rates.
    pub async fn optimize_subject_lines(
        &self,
        current_subject: &str,
        target_audience: &str,
        email_type: &str,
    ) -> Result<SubjectLineOptimization, AgentError> {
        info!("optimizing email subject lines");

        let guidance = self.retriever.best_practice_guidance("email subject lines")?;

        let prompt = format!(
            "Optimize this email subject line for better open rates:\n\
             \n\
             Current Subject: \"{current_subject}\"\n\
             Target Audience: {target_audience}\n\
             Email Type: {email_type}\n\
             \n\
             Best Practices Context:\n\
             {guidance}\n\
             \n\
             Please provide:\n\
             1. Analysis of the current subject line (strengths/weaknesses)\n\
             2. 5 improved subject line variations\n\
             3. A/B testing recommendations\n\
             4. Personalization opportunities\n\
             5. Expected impact on open rates\n\
             \n\
             Focus on mobile optimization, personalization, and avoiding spam triggers."
        );

        let optimization = self.ask(&prompt).await?;

        let mut context = HashMap::new();
        context.insert("original_subject".to_string(), current_subject.to_string());
        context.insert("content_type".to_string(), email_type.to_string());
        self.remember_interaction(
            &format!("Subject line optimization: {current_subject}"),
            &optimization,
            context,
        )
        .await?;

        Ok(SubjectLineOptimization {
            optimization,
            original_subject: current_subject.to_string(),
            guidance_used: truncated(&guidance, 300),
        })
    }

    /// Build a personalization strategy for a specific prospect.
    pub async fn personalization_strategy(
        &self,
        target_company: &str,
        contact: &ContactProfile,
        research: Option<&ResearchData>,
    ) -> Result<PersonalizationPlan, AgentError> {
        info!(company = %target_company, "creating personalization strategy");

        let guide = self.retriever.best_practice_guidance("personalization")?;

        let research_context = match research {
            Some(data) => format!(
                "Available Research Data:\n\
                 - Company: {}\n\
                 - Technology Stack: {}\n\
                 - Recent News: {}\n\
                 - Funding: {}\n",
                data.company_info.as_deref().unwrap_or("N/A"),
                data.technologies.as_deref().unwrap_or("N/A"),
                data.news.as_deref().unwrap_or("N/A"),
                data.funding.as_deref().unwrap_or("N/A"),
            ),
            None => String::new(),
        };

        let prompt = format!(
            "Create a personalization strategy for this prospect:\n\
             \n\
             Company: {target_company}\n\
             Contact: {} - {}\n\
             Email: {}\n\
             \n\
             {research_context}\n\
             Personalization Best Practices:\n\
             {guide}\n\
             \n\
             Please provide:\n\
             1. Key personalization angles based on available data\n\
             2. Specific message customization recommendations\n\
             3. Research gaps that should be filled\n\
             4. Channel-specific personalization strategies\n\
             5. Follow-up personalization ideas\n\
             6. Recommended timing and triggers\n\
             \n\
             Focus on genuine value and relevance, not just name insertion.",
            contact.name.as_deref().unwrap_or("N/A"),
            contact.title.as_deref().unwrap_or("N/A"),
            contact.email.as_deref().unwrap_or("N/A"),
        );

        let strategy = self.ask(&prompt).await?;

        let mut context = HashMap::new();
        context.insert("target_company".to_string(), target_company.to_string());
        context.insert(
            "research_available".to_string(),
            research.is_some().to_string(),
        );
        self.remember_interaction(
            &format!("Personalization strategy for {target_company}"),
            &strategy,
            context,
        )
        .await?;

        Ok(PersonalizationPlan {
            strategy,
            target_company: target_company.to_string(),
            research_used: research.is_some(),
        })
    }

    /// Analyze campaign performance against best practices and history.
    ///
    /// Campaigns with a `success_rate` metric above 10% are stored as
    /// campaign learnings for future wisdom queries.
    pub async fn analyze_campaign_performance(
        &self,
        campaign_type: &str,
        metrics: &HashMap<String, serde_json::Value>,
        target_metrics: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<PerformanceAnalysis, AgentError> {
        info!(campaign_type, "analyzing campaign performance");

        let guidance = self
            .retriever
            .best_practice_guidance(&format!("{campaign_type} campaign"))?;
        let wisdom = self.campaign_wisdom(Some(campaign_type)).await?;

        let prompt = format!(
            "Analyze this campaign performance and provide optimization recommendations:\n\
             \n\
             Campaign Type: {campaign_type}\n\
             \n\
             Current Metrics:\n\
             {}\n\
             \n\
             Target Metrics: {}\n\
             \n\
             Best Practices Context:\n\
             {guidance}\n\
             \n\
             Historical Insights:\n\
             {wisdom}\n\
             \n\
             Please provide:\n\
             1. Performance analysis (what's working/not working)\n\
             2. Comparison to industry benchmarks\n\
             3. Specific optimization recommendations\n\
             4. Priority areas for improvement\n\
             5. A/B testing suggestions\n\
             6. Resource allocation recommendations\n\
             7. Timeline for implementing changes\n\
             \n\
             Focus on actionable insights that can drive immediate improvements.",
            render_metrics(metrics),
            target_metrics
                .map(render_metrics_inline)
                .unwrap_or_else(|| "Not specified".to_string()),
        );

        let analysis = self.ask(&prompt).await?;

        let success_rate = metrics
            .get("success_rate")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0);
        if success_rate > LEARNING_THRESHOLD {
            let lessons = vec![
                format!(
                    "Campaign type {campaign_type} achieved {:.1}% success rate",
                    success_rate * 100.0
                ),
                "Performance analysis completed with actionable recommendations".to_string(),
            ];
            self.learn_from_campaign(
                &format!("analysis_{campaign_type}_{}", Uuid::new_v4()),
                campaign_type,
                metrics,
                &lessons,
            )
            .await?;
        }

        let mut context = HashMap::new();
        context.insert("campaign_type".to_string(), campaign_type.to_string());
        self.remember_interaction(
            &format!("Campaign performance analysis: {campaign_type}"),
            &analysis,
            context,
        )
        .await?;

        Ok(PerformanceAnalysis {
            analysis,
            campaign_type: campaign_type.to_string(),
            historical_context: truncated(&wisdom, 200),
        })
    }

    /// Create a multi-touch campaign sequence.
    pub async fn create_multi_touch_sequence(
        &self,
        campaign_goal: &str,
        target_persona: &str,
        sequence_length: usize,
        channels: Option<Vec<String>>,
    ) -> Result<TouchSequence, AgentError> {
        info!(
            sequence_length,
            goal = %campaign_goal,
            "creating multi-touch sequence"
        );

        let channels = channels
            .unwrap_or_else(|| vec!["email".to_string(), "linkedin".to_string()]);
        let guidance = self
            .retriever
            .best_practice_guidance("multi-touch sequences")?;

        let prompt = format!(
            "Create a multi-touch campaign sequence with these specifications:\n\
             \n\
             Campaign Goal: {campaign_goal}\n\
             Target Persona: {target_persona}\n\
             Number of Touches: {sequence_length}\n\
             Channels: {}\n\
             \n\
             Sequence Best Practices:\n\
             {guidance}\n\
             \n\
             Please provide:\n\
             1. Complete sequence overview and strategy\n\
             2. Touch-by-touch breakdown with:\n\
                - Touch number and timing\n\
                - Channel selection rationale\n\
                - Message theme and key points\n\
                - Call-to-action strategy\n\
                - Personalization opportunities\n\
             3. Sequence flow logic and decision points\n\
             4. Success metrics for each touch\n\
             5. Optimization and testing recommendations\n\
             6. Breakup email strategy\n\
             \n\
             Ensure progressive value delivery and avoid being pushy or repetitive.",
            channels.join(", "),
        );

        let sequence = self.ask(&prompt).await?;

        let mut context = HashMap::new();
        context.insert("campaign_goal".to_string(), campaign_goal.to_string());
        context.insert("sequence_length".to_string(), sequence_length.to_string());
        context.insert("channels".to_string(), channels.join(","));
        self.remember_interaction(
            &format!("Multi-touch sequence: {campaign_goal}"),
            &sequence,
            context,
        )
        .await?;

        Ok(TouchSequence {
            sequence,
            campaign_goal: campaign_goal.to_string(),
            target_persona: target_persona.to_string(),
            channels,
            sequence_length,
        })
    }

    /// Marketing insights and recommendations for a topic, informed by the
    /// knowledge base and the session so far.
    pub async fn marketing_insights(&self, topic: &str) -> Result<MarketingInsights, AgentError> {
        info!(topic, "providing marketing insights");

        let knowledge = self.retriever.best_practice_guidance(topic)?;
        let knowledge_base_used = !knowledge.starts_with("No specific best practices");
        let context = self.conversation_context(10).await?;

        let prompt = format!(
            "Provide comprehensive marketing insights and actionable recommendations for: {topic}\n\
             \n\
             Context from our conversation:\n\
             {context}\n\
             \n\
             Relevant Knowledge:\n\
             {knowledge}\n\
             \n\
             Please provide:\n\
             1. Current best practices and trends\n\
             2. Actionable recommendations\n\
             3. Common pitfalls to avoid\n\
             4. Success metrics to track\n\
             5. Tools and technologies to consider\n\
             6. Implementation timeline suggestions\n\
             \n\
             Be specific and practical in your recommendations."
        );

        let insights = self.ask(&prompt).await?;

        let mut interaction_context = HashMap::new();
        interaction_context.insert("topic".to_string(), topic.to_string());
        self.remember_interaction(
            &format!("Marketing insights request: {topic}"),
            &insights,
            interaction_context,
        )
        .await?;

        Ok(MarketingInsights {
            insights,
            topic: topic.to_string(),
            knowledge_base_used,
        })
    }
}

fn render_metrics(metrics: &HashMap<String, serde_json::Value>) -> String {
    let mut pairs: Vec<_> = metrics.iter().collect();
    pairs.sort_by_key(|(k, _)| k.as_str());
    pairs
        .iter()
        .map(|(k, v)| format!("- {k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_metrics_inline(metrics: &HashMap<String, serde_json::Value>) -> String {
    let mut pairs: Vec<_> = metrics.iter().collect();
    pairs.sort_by_key(|(k, _)| k.as_str());
    pairs
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cap text at `max` characters, on a char boundary, with a trailing marker.
fn truncated(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{cut}...")
}
