use chrono::{DateTime, TimeZone, Timelike, Utc};
use now::DateTimeNow;

use crate::{
    state::entities::{AppData, Task, Transaction, TransactionType},
    tasks::pending_count,
    utils::time::next_day_start,
};

pub const RECENT_ACTIVITY_LIMIT: usize = 5;

pub fn greeting(hour: u32) -> &'static str {
    if hour < 12 {
        "Good Morning"
    } else if hour < 18 {
        "Good Afternoon"
    } else {
        "Good Evening"
    }
}

pub fn first_name(name: &str) -> &str {
    name.split(' ').next().unwrap_or(name)
}

/// Expenses dated inside `[start, end)`.
pub fn spent_between(transactions: &[Transaction], start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    transactions
        .iter()
        .filter(|t| t.kind == TransactionType::Expense && t.date >= start && t.date < end)
        .map(|t| t.amount)
        .sum()
}

/// Expenses dated on the same calendar day as `now`, in `now`'s timezone.
pub fn spent_today<Tz: TimeZone>(transactions: &[Transaction], now: DateTime<Tz>) -> f64 {
    let start = now.beginning_of_day();
    let end = next_day_start(start.clone());
    spent_between(transactions, start.with_timezone(&Utc), end.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activity<'a> {
    Task(&'a Task),
    Transaction(&'a Transaction),
}

impl Activity<'_> {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Activity::Task(task) => task.created_at,
            Activity::Transaction(transaction) => transaction.created_at,
        }
    }
}

/// Newest tasks and transactions mixed together by creation time.
pub fn recent_activity<'a>(
    tasks: &'a [Task],
    transactions: &'a [Transaction],
    limit: usize,
) -> Vec<Activity<'a>> {
    let mut items = tasks
        .iter()
        .map(Activity::Task)
        .chain(transactions.iter().map(Activity::Transaction))
        .collect::<Vec<_>>();
    items.sort_by_key(|item| std::cmp::Reverse(item.created_at()));
    items.truncate(limit);
    items
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary<'a> {
    pub greeting: &'static str,
    pub first_name: &'a str,
    pub pending_tasks: usize,
    pub spent_today: f64,
    pub recent: Vec<Activity<'a>>,
}

pub fn summarize<Tz: TimeZone>(data: &AppData, now: DateTime<Tz>) -> DashboardSummary<'_> {
    DashboardSummary {
        greeting: greeting(now.hour()),
        first_name: first_name(&data.profile.name),
        pending_tasks: pending_count(&data.tasks),
        spent_today: spent_today(&data.transactions, now),
        recent: recent_activity(&data.tasks, &data.transactions, RECENT_ACTIVITY_LIMIT),
    }
}
