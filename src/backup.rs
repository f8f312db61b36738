//! Whole-state backups as a single json document.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    state::{
        entities::{AppData, Task, Transaction, UserProfile, UserSettings},
        store::AppState,
    },
    utils::time::date_to_backup_name,
};

#[derive(Debug)]
pub enum ImportError {
    /// Not json at all.
    Malformed(serde_json::Error),
    /// Json, but not a backup document.
    InvalidFormat(String),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Malformed(_) => write!(f, "Error parsing JSON"),
            ImportError::InvalidFormat(_) => write!(f, "Invalid file format"),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Malformed(e) => Some(e),
            ImportError::InvalidFormat(_) => None,
        }
    }
}

const REQUIRED_FIELDS: [&str; 3] = ["tasks", "transactions", "profile"];

#[derive(Debug, Deserialize)]
struct BackupDocument {
    tasks: Vec<Task>,
    transactions: Vec<Transaction>,
    profile: UserProfile,
    #[serde(default)]
    settings: Option<UserSettings>,
}

pub fn export(data: &AppData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

pub fn backup_file_name(date: NaiveDate) -> String {
    date_to_backup_name(date)
}

/// Parses a backup document. Nothing is applied here, so a rejected document can't leave
/// partial state behind.
pub fn import(contents: &str) -> Result<AppData, ImportError> {
    let value = serde_json::from_str::<Value>(contents).map_err(ImportError::Malformed)?;

    if let Some(missing) = REQUIRED_FIELDS
        .iter()
        .find(|field| value.get(**field).map_or(true, Value::is_null))
    {
        return Err(ImportError::InvalidFormat(format!("missing {missing}")));
    }

    let document = serde_json::from_value::<BackupDocument>(value)
        .map_err(|e| ImportError::InvalidFormat(e.to_string()))?;
    if let Some(transaction) = document
        .transactions
        .iter()
        .find(|transaction| !(transaction.amount.is_finite() && transaction.amount > 0.))
    {
        return Err(ImportError::InvalidFormat(format!(
            "transaction {} has amount {}",
            transaction.id, transaction.amount
        )));
    }
    Ok(AppData {
        tasks: document.tasks,
        transactions: document.transactions,
        profile: document.profile,
        settings: document.settings.unwrap_or_default(),
    })
}

/// Replaces the whole state with the backup, or leaves it untouched on rejection.
pub fn apply_import(state: &mut AppState, contents: &str) -> Result<(), ImportError> {
    let data = import(contents).inspect_err(|e| match e {
        ImportError::Malformed(cause) => warn!("Rejected backup: {e} ({cause})"),
        ImportError::InvalidFormat(cause) => warn!("Rejected backup: {e} ({cause})"),
    })?;
    info!(
        "Importing {} tasks and {} transactions",
        data.tasks.len(),
        data.transactions.len()
    );
    state.replace_all(data);
    Ok(())
}

/// Writes the export into `dir` under the dated backup name.
pub async fn write_backup(data: &AppData, dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    let path = dir.join(backup_file_name(date));
    tokio::fs::write(&path, export(data)?).await?;
    info!("Exported backup to {path:?}");
    Ok(path)
}
