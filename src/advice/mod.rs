//! AI assisted helpers. Every call degrades to a fixed fallback, so callers never see an error:
//! without an api key no request is made at all, and a failed or unusable response is logged
//! and replaced.

pub mod gemini;
pub mod prompts;

use std::fmt::Display;

use anyhow::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    config::AdviceConfig,
    finance::total_spent,
    state::entities::{AppData, ExpenseCategory, Transaction},
    tasks::pending_count,
};

use self::gemini::GeminiGenerator;

pub const NO_KEY_INSIGHTS: &str = "Please configure your API Key to get insights.";
pub const EMPTY_INSIGHTS: &str = "No insights available.";
pub const FAILED_INSIGHTS: &str = "Unable to generate insights at this moment.";

pub const NO_KEY_ADVICE: &str = "Stay focused and productive!";
pub const EMPTY_ADVICE: &str = "Have a great day!";
pub const FAILED_ADVICE: &str = "Keep moving forward!";

/// Backend producing text for a prompt. With a `schema` the answer must be json matching it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, schema: Option<Value>) -> Result<String>;
}

/// Part of the application the advice is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum View {
    #[default]
    Dashboard,
    Tasks,
    Expenses,
    Stats,
    Profile,
}

impl Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            View::Dashboard => write!(f, "dashboard"),
            View::Tasks => write!(f, "tasks"),
            View::Expenses => write!(f, "expenses"),
            View::Stats => write!(f, "stats"),
            View::Profile => write!(f, "profile"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdviceContext {
    pub view: View,
    pub pending_tasks: usize,
    pub total_spent: f64,
}

impl AdviceContext {
    pub fn new(view: View, data: &AppData) -> Self {
        Self {
            view,
            pending_tasks: pending_count(&data.tasks),
            total_spent: total_spent(&data.transactions),
        }
    }

    fn prompt(&self) -> String {
        match self.view {
            View::Dashboard | View::Tasks => prompts::pending_tasks_tip(self.pending_tasks),
            View::Expenses | View::Stats => prompts::spending_tip(self.total_spent),
            View::Profile => prompts::COMPLIMENT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CategoryResponse {
    category: ExpenseCategory,
}

pub struct AdviceClient {
    generator: Option<Box<dyn TextGenerator>>,
}

impl AdviceClient {
    pub fn new(generator: Option<Box<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    pub fn offline() -> Self {
        Self::new(None)
    }

    pub fn from_config(config: &AdviceConfig) -> Result<Self> {
        let generator = match &config.api_key {
            Some(api_key) => {
                Some(Box::new(GeminiGenerator::new(config, api_key.clone())?) as Box<dyn TextGenerator>)
            }
            None => {
                debug!("No api key configured, advice stays offline");
                None
            }
        };
        Ok(Self::new(generator))
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// `None` when offline, otherwise the outcome of the request with failures already logged.
    async fn generate(&self, prompt: String, schema: Option<Value>) -> Option<Result<String>> {
        let generator = self.generator.as_ref()?;
        Some(
            generator
                .generate(&prompt, schema)
                .await
                .inspect_err(|e| warn!("Text generation failed: {e:?}")),
        )
    }

    pub async fn predict_category(&self, description: &str) -> ExpenseCategory {
        let response = self
            .generate(
                prompts::predict_category(description),
                Some(prompts::category_schema()),
            )
            .await;
        match response {
            Some(Ok(text)) => match serde_json::from_str::<CategoryResponse>(&text) {
                Ok(response) => response.category,
                Err(e) => {
                    warn!("Unusable category response {text:?}: {e}");
                    ExpenseCategory::Other
                }
            },
            Some(Err(_)) | None => ExpenseCategory::Other,
        }
    }

    /// Shorter, actionable rewording of a task title.
    pub async fn polish_task(&self, text: &str) -> String {
        self.rewrite(prompts::polish_task(text), text).await
    }

    pub async fn summarize_task(&self, text: &str) -> String {
        self.rewrite(prompts::summarize_task(text), text).await
    }

    async fn rewrite(&self, prompt: String, original: &str) -> String {
        match self.generate(prompt, None).await {
            Some(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            _ => original.to_string(),
        }
    }

    /// Tips about the newest transactions in relation to the monthly budget.
    pub async fn analyze_spending(&self, transactions: &[Transaction], budget: f64) -> String {
        match self
            .generate(prompts::analyze_spending(transactions, budget), None)
            .await
        {
            None => NO_KEY_INSIGHTS.to_string(),
            Some(Ok(text)) if text.trim().is_empty() => EMPTY_INSIGHTS.to_string(),
            Some(Ok(text)) => text,
            Some(Err(_)) => FAILED_INSIGHTS.to_string(),
        }
    }

    pub async fn generate_contextual_advice(&self, context: &AdviceContext) -> String {
        match self.generate(context.prompt(), None).await {
            None => NO_KEY_ADVICE.to_string(),
            Some(Ok(text)) if text.trim().is_empty() => EMPTY_ADVICE.to_string(),
            Some(Ok(text)) => text.trim().to_string(),
            Some(Err(_)) => FAILED_ADVICE.to_string(),
        }
    }
}
