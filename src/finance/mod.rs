//! Income and expense ledger. Transactions are immutable once recorded.

pub mod analytics;
pub mod dashboard;

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::info;
use uuid::Uuid;

use crate::{
    state::{
        entities::{ExpenseCategory, Transaction, TransactionType},
        store::AppState,
    },
    utils::time::truncate_to_millis,
};

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub description: String,
    pub amount: f64,
    pub kind: TransactionType,
    /// Ignored for income, which is always filed under [ExpenseCategory::Income].
    pub category: ExpenseCategory,
    /// Defaults to the creation time.
    pub date: Option<DateTime<Utc>>,
}

/// Records a transaction in front of the ledger.
pub fn add_transaction(
    state: &mut AppState,
    new_transaction: NewTransaction,
    now: DateTime<Utc>,
) -> Result<Transaction> {
    let description = new_transaction.description.trim();
    if description.is_empty() {
        bail!("Transaction description can't be empty");
    }
    if !new_transaction.amount.is_finite() || new_transaction.amount <= 0. {
        bail!("Amount must be a positive number, got {}", new_transaction.amount);
    }

    let category = match new_transaction.kind {
        TransactionType::Income => ExpenseCategory::Income,
        TransactionType::Expense => new_transaction.category,
    };

    let transaction = Transaction {
        id: Uuid::new_v4().to_string(),
        description: description.to_string(),
        amount: new_transaction.amount,
        category,
        kind: new_transaction.kind,
        date: new_transaction.date.unwrap_or(now),
        created_at: truncate_to_millis(now),
    };

    state.update_transactions(|transactions| {
        let mut updated = Vec::with_capacity(transactions.len() + 1);
        updated.push(transaction.clone());
        updated.extend_from_slice(transactions);
        Some(updated)
    });
    info!("Recorded {} {}", transaction.kind, transaction.id);
    Ok(transaction)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub income: f64,
    pub expense: f64,
}

impl Totals {
    pub fn net_balance(&self) -> f64 {
        self.income - self.expense
    }
}

pub fn totals(transactions: &[Transaction]) -> Totals {
    transactions
        .iter()
        .fold(Totals::default(), |mut totals, transaction| {
            match transaction.kind {
                TransactionType::Income => totals.income += transaction.amount,
                TransactionType::Expense => totals.expense += transaction.amount,
            }
            totals
        })
}

pub fn total_spent(transactions: &[Transaction]) -> f64 {
    totals(transactions).expense
}

/// Groups transactions by the calendar day they happened on in `tz`, newest day first. Order
/// inside a day follows the ledger.
pub fn group_by_date<'a, Tz: TimeZone>(
    transactions: &'a [Transaction],
    tz: &Tz,
) -> Vec<(NaiveDate, Vec<&'a Transaction>)> {
    let mut groups = BTreeMap::<NaiveDate, Vec<&Transaction>>::new();
    for transaction in transactions {
        groups
            .entry(transaction.date.with_timezone(tz).date_naive())
            .or_default()
            .push(transaction);
    }
    groups.into_iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use crate::state::{
        entities::{AppData, ExpenseCategory, TransactionType},
        store::AppState,
    };

    use super::{add_transaction, group_by_date, totals, NewTransaction};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 18, 30, 0).unwrap()
    }

    fn expense(description: &str, amount: f64) -> NewTransaction {
        NewTransaction {
            description: description.into(),
            amount,
            kind: TransactionType::Expense,
            category: ExpenseCategory::Food,
            date: None,
        }
    }

    #[test]
    fn test_income_is_always_income_category() -> Result<()> {
        let mut state = AppState::new(AppData::default());
        let income = add_transaction(
            &mut state,
            NewTransaction {
                kind: TransactionType::Income,
                category: ExpenseCategory::Shopping,
                ..expense("Salary", 3000.)
            },
            now(),
        )?;
        assert_eq!(income.category, ExpenseCategory::Income);
        assert_eq!(income.date, now());
        Ok(())
    }

    #[test]
    fn test_invalid_transactions_are_rejected() {
        let mut state = AppState::new(AppData::default());
        assert!(add_transaction(&mut state, expense("", 5.), now()).is_err());
        assert!(add_transaction(&mut state, expense("Lunch", 0.), now()).is_err());
        assert!(add_transaction(&mut state, expense("Lunch", -3.), now()).is_err());
        assert!(add_transaction(&mut state, expense("Lunch", f64::NAN), now()).is_err());
        assert!(state.transactions().is_empty());
    }

    #[test]
    fn test_totals() -> Result<()> {
        let mut state = AppState::new(AppData::default());
        add_transaction(&mut state, expense("Lunch", 12.5), now())?;
        add_transaction(&mut state, expense("Taxi", 7.5), now())?;
        add_transaction(
            &mut state,
            NewTransaction {
                kind: TransactionType::Income,
                ..expense("Refund", 50.)
            },
            now(),
        )?;

        let totals = totals(state.transactions());
        assert_eq!(totals.income, 50.);
        assert_eq!(totals.expense, 20.);
        assert_eq!(totals.net_balance(), 30.);
        assert_eq!(state.transactions()[0].description, "Refund");
        Ok(())
    }

    #[test]
    fn test_group_by_date() -> Result<()> {
        let mut state = AppState::new(AppData::default());
        add_transaction(
            &mut state,
            NewTransaction {
                date: Some(Utc.with_ymd_and_hms(2024, 6, 9, 10, 0, 0).unwrap()),
                ..expense("Older", 1.)
            },
            now(),
        )?;
        add_transaction(&mut state, expense("Newer", 2.), now())?;
        add_transaction(&mut state, expense("Newest", 3.), now())?;

        let groups = group_by_date(state.transactions(), &Utc);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
        assert_eq!(
            groups[0]
                .1
                .iter()
                .map(|t| t.description.as_str())
                .collect::<Vec<_>>(),
            vec!["Newest", "Newer"]
        );
        assert_eq!(groups[1].1[0].description, "Older");
        Ok(())
    }
}
