use std::io::Write;

use anyhow::Result;
use chrono::{Local, Utc};
use clap::Subcommand;

use crate::{
    advice::AdviceClient,
    finance::{
        add_transaction,
        analytics::{category_breakdown, monthly_spending},
        dashboard::summarize,
        group_by_date, totals, NewTransaction,
    },
    state::{
        entities::{ExpenseCategory, TransactionType},
        store::AppState,
    },
    utils::percentage::Percentage,
};

use super::{
    dates::parse_optional_moment,
    output::{activity_line, bar, format_amount, short_id, transaction_line},
    Invocation,
};

/// Descriptions shorter than this are too vague to categorize.
const PREDICT_MIN_LENGTH: usize = 4;

#[derive(Debug, Subcommand)]
pub enum ExpenseCommand {
    #[command(about = "Record a transaction")]
    Add {
        description: String,
        amount: f64,
        #[arg(long, help = "Record income instead of an expense")]
        income: bool,
        #[arg(
            short,
            long,
            value_enum,
            help = "Expense category. Predicted from the description when omitted"
        )]
        category: Option<ExpenseCategory>,
        #[arg(short, long, help = "When it happened. Defaults to now")]
        date: Option<String>,
    },
    #[command(about = "List transactions grouped by day")]
    List {
        #[arg(short, long, help = "Show only the newest days")]
        days: Option<usize>,
    },
    #[command(about = "AI tips about recent spending")]
    Tips {},
    #[command(about = "Predict the category of a description")]
    Predict { description: String },
}

#[derive(Debug, clap::Args)]
pub struct StatsCommand {
    #[arg(short, long, help = "Only count this year. By default every year is counted")]
    year: Option<i32>,
    #[arg(short = 'p', long = "percentage", help = "Hide categories below this share of spending", default_value_t = Percentage::ZERO)]
    min_percentage: Percentage,
}

fn needs_prediction(kind: TransactionType, description: &str) -> bool {
    kind == TransactionType::Expense && description.trim().chars().count() >= PREDICT_MIN_LENGTH
}

/// Predicts a missing category up front, so the returned command needs no further AI requests.
pub async fn resolve_expense_advice(command: ExpenseCommand, advice: &AdviceClient) -> ExpenseCommand {
    match command {
        ExpenseCommand::Add {
            description,
            amount,
            income,
            category: None,
            date,
        } => {
            let kind = if income {
                TransactionType::Income
            } else {
                TransactionType::Expense
            };
            let category = if needs_prediction(kind, &description) {
                Some(advice.predict_category(&description).await)
            } else {
                None
            };
            ExpenseCommand::Add {
                description,
                amount,
                income,
                category,
                date,
            }
        }
        command => command,
    }
}

pub async fn process_expense_command(
    command: ExpenseCommand,
    state: &mut AppState,
    advice: &AdviceClient,
    invocation: Invocation,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        ExpenseCommand::Add {
            description,
            amount,
            income,
            category,
            date,
        } => {
            let date = parse_optional_moment(date.as_deref(), invocation.now, invocation.date_style)?;
            let kind = if income {
                TransactionType::Income
            } else {
                TransactionType::Expense
            };
            let category = match category {
                Some(category) => category,
                None if needs_prediction(kind, &description) => {
                    advice.predict_category(&description).await
                }
                None => ExpenseCategory::Other,
            };

            let transaction = add_transaction(
                state,
                NewTransaction {
                    description,
                    amount,
                    kind,
                    category,
                    date,
                },
                invocation.now.with_timezone(&Utc),
            )?;
            writeln!(
                out,
                "Recorded {}\t{}",
                short_id(&transaction.id),
                transaction_line(&transaction)
            )?;
        }
        ExpenseCommand::List { days } => {
            let totals = totals(state.transactions());
            writeln!(
                out,
                "Income {}\tExpenses {}\tBalance {}",
                format_amount(totals.income),
                format_amount(totals.expense),
                format_amount(totals.net_balance())
            )?;

            let groups = group_by_date(state.transactions(), &Local);
            if groups.is_empty() {
                writeln!(out, "No transactions yet")?;
            }
            for (date, transactions) in groups.into_iter().take(days.unwrap_or(usize::MAX)) {
                writeln!(out)?;
                writeln!(out, "{}", date.format("%x"))?;
                for transaction in transactions {
                    writeln!(out, "{}", transaction_line(transaction))?;
                }
            }
        }
        ExpenseCommand::Tips {} => {
            let tips = advice
                .analyze_spending(state.transactions(), state.profile().monthly_budget)
                .await;
            writeln!(out, "{tips}")?;
        }
        ExpenseCommand::Predict { description } => {
            writeln!(out, "{}", advice.predict_category(&description).await)?;
        }
    }
    Ok(())
}

pub fn process_stats_command(
    StatsCommand {
        year,
        min_percentage,
    }: StatsCommand,
    state: &AppState,
    out: &mut impl Write,
) -> Result<()> {
    let months = monthly_spending(state.transactions(), &Local, year);
    let highest = months.iter().map(|m| m.amount).fold(0., f64::max);

    writeln!(out, "Monthly spending")?;
    for month in &months {
        writeln!(
            out,
            "{}\t{:>12}\t{}",
            month.name,
            format_amount(month.amount),
            bar(month.amount, highest)
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Spending by category")?;
    let breakdown = category_breakdown(state.transactions());
    if breakdown.is_empty() {
        writeln!(out, "No expenses yet")?;
    }
    for share in breakdown.into_iter().filter(|s| s.share >= min_percentage) {
        writeln!(
            out,
            "{}\t{}\t{}",
            share.share,
            format_amount(share.amount),
            share.category
        )?;
    }
    Ok(())
}

pub fn process_dashboard_command(
    state: &AppState,
    invocation: Invocation,
    out: &mut impl Write,
) -> Result<()> {
    let summary = summarize(state.data(), invocation.now);
    writeln!(out, "{}, {}", summary.greeting, summary.first_name)?;
    writeln!(out, "{}", invocation.now.format("%A, %B %-d"))?;
    writeln!(out)?;
    writeln!(out, "Pending tasks\t{}", summary.pending_tasks)?;
    writeln!(
        out,
        "Spent today\t{} of {} monthly budget",
        format_amount(summary.spent_today),
        format_amount(state.profile().monthly_budget)
    )?;

    writeln!(out)?;
    writeln!(out, "Recent activity")?;
    if summary.recent.is_empty() {
        writeln!(out, "Nothing here yet")?;
    }
    for activity in &summary.recent {
        writeln!(out, "{}", activity_line(activity))?;
    }
    Ok(())
}
