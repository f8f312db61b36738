use serde_json::{json, Value};

use crate::state::entities::{ExpenseCategory, Transaction};

/// Number of newest transactions shown to the model when asking for spending tips.
pub const SPENDING_SAMPLE: usize = 20;

pub fn predict_category(description: &str) -> String {
    let categories = ExpenseCategory::ALL.map(ExpenseCategory::name).join(", ");
    format!(
        "Categorize this transaction description into one of these exact categories: \
         {categories}. Description: \"{description}\""
    )
}

/// Response schema forcing `{"category": <one of the categories>}`.
pub fn category_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "category": {
                "type": "STRING",
                "enum": ExpenseCategory::ALL.map(ExpenseCategory::name),
            }
        }
    })
}

pub fn polish_task(text: &str) -> String {
    format!("Rewrite this task to be concise, actionable, and clear (max 10 words): \"{text}\"")
}

pub fn summarize_task(text: &str) -> String {
    format!(
        "Summarize this task title into a very concise version (max 5 words) retaining key \
         meaning: \"{text}\""
    )
}

pub fn analyze_spending(transactions: &[Transaction], budget: f64) -> String {
    let recent = transactions
        .iter()
        .take(SPENDING_SAMPLE)
        .map(|t| {
            format!(
                "{}: ₹{} on {} ({})",
                t.kind, t.amount, t.category, t.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Analyze these recent transactions against a monthly budget of ₹{budget}. Provide 3 \
         short, bulleted actionable tips to improve financial health. Keep it friendly.\n\
         Data:\n{recent}"
    )
}

pub fn pending_tasks_tip(pending: usize) -> String {
    format!(
        "The user has {pending} pending tasks. Give a one-sentence motivating quote or \
         productivity tip suitable for right now."
    )
}

pub fn spending_tip(spent: f64) -> String {
    format!("The user has spent ₹{spent} so far. Give a one-sentence financial wisdom tip.")
}

pub const COMPLIMENT: &str = "Give a short, friendly compliment to the user.";
