use std::collections::HashMap;

use chrono::{Datelike, TimeZone};

use crate::{
    state::entities::{ExpenseCategory, Transaction, TransactionType},
    utils::percentage::Percentage,
};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySpending {
    pub name: &'static str,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryShare {
    pub category: ExpenseCategory,
    pub amount: f64,
    pub share: Percentage,
}

fn expenses(transactions: &[Transaction]) -> impl Iterator<Item = &Transaction> {
    transactions
        .iter()
        .filter(|transaction| transaction.kind == TransactionType::Expense)
}

/// Expense totals for each calendar month, January first. Without a `year` months of every year
/// are added together.
pub fn monthly_spending<Tz: TimeZone>(
    transactions: &[Transaction],
    tz: &Tz,
    year: Option<i32>,
) -> Vec<MonthlySpending> {
    let mut months = MONTH_NAMES.map(|name| MonthlySpending { name, amount: 0. });
    for transaction in expenses(transactions) {
        let date = transaction.date.with_timezone(tz);
        if year.is_some_and(|year| year != date.year()) {
            continue;
        }
        months[date.month0() as usize].amount += transaction.amount;
    }
    months.into()
}

/// Expense totals per category, biggest first, with each category's share of all spending.
pub fn category_breakdown(transactions: &[Transaction]) -> Vec<CategoryShare> {
    let mut amounts = HashMap::<ExpenseCategory, f64>::new();
    for transaction in expenses(transactions) {
        *amounts.entry(transaction.category).or_default() += transaction.amount;
    }
    let total = amounts.values().sum::<f64>();

    let mut breakdown = amounts
        .into_iter()
        .map(|(category, amount)| CategoryShare {
            category,
            amount,
            share: Percentage::of(amount, total),
        })
        .collect::<Vec<_>>();
    breakdown.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.category.cmp(&b.category))
    });
    breakdown
}
