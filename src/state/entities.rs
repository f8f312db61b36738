use std::fmt::Display;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Medium => write!(f, "Medium"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
pub enum ExpenseCategory {
    Food,
    Transport,
    Housing,
    Entertainment,
    Utilities,
    Shopping,
    Health,
    Income,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 9] = [
        ExpenseCategory::Food,
        ExpenseCategory::Transport,
        ExpenseCategory::Housing,
        ExpenseCategory::Entertainment,
        ExpenseCategory::Utilities,
        ExpenseCategory::Shopping,
        ExpenseCategory::Health,
        ExpenseCategory::Income,
        ExpenseCategory::Other,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExpenseCategory::Food => "Food",
            ExpenseCategory::Transport => "Transport",
            ExpenseCategory::Housing => "Housing",
            ExpenseCategory::Entertainment => "Entertainment",
            ExpenseCategory::Utilities => "Utilities",
            ExpenseCategory::Shopping => "Shopping",
            ExpenseCategory::Health => "Health",
            ExpenseCategory::Income => "Income",
            ExpenseCategory::Other => "Other",
        }
    }
}

impl Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum TransactionType {
    Income,
    Expense,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Income => write!(f, "Income"),
            TransactionType::Expense => write!(f, "Expense"),
        }
    }
}

/// A to-do item. `notified` tracks whether the current arm of the reminder has fired; whoever
/// changes `reminder_time` must reset it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notified: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Armed and due. This is the only condition under which a reminder fires.
    pub fn reminder_due(&self, now: DateTime<Utc>) -> bool {
        !self.completed && !self.notified && self.reminder_time.is_some_and(|at| now >= at)
    }

    /// Fired but neither completed nor re-armed yet. Such reminders can be snoozed.
    pub fn reminder_active(&self) -> bool {
        self.notified && !self.completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub category: ExpenseCategory,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub monthly_budget: f64,
    /// `data:` URI of the avatar image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "User".into(),
            email: String::new(),
            monthly_budget: 2000.,
            avatar_url: None,
        }
    }
}

pub const DEFAULT_SNOOZE_MINUTES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub sound_enabled: bool,
    pub snooze_duration_minutes: u32,
}

impl UserSettings {
    /// Snooze length to use when the user didn't pick one. A stored zero falls back to the
    /// default instead of re-firing immediately.
    pub fn snooze_minutes(&self) -> u32 {
        if self.snooze_duration_minutes == 0 {
            DEFAULT_SNOOZE_MINUTES
        } else {
            self.snooze_duration_minutes
        }
    }
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            snooze_duration_minutes: DEFAULT_SNOOZE_MINUTES,
        }
    }
}

/// Everything the application knows about. This is also the shape of a backup document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppData {
    pub tasks: Vec<Task>,
    pub transactions: Vec<Transaction>,
    pub profile: UserProfile,
    pub settings: UserSettings,
}
