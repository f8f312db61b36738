use std::{io::Write, path::Path};

use anyhow::Result;
use tracing::info;

use crate::{
    backup::{apply_import, write_backup},
    state::{persistence::PersistenceGateway, store::AppState},
};

use super::Invocation;

pub async fn process_export_command(
    state: &AppState,
    dir: &Path,
    invocation: Invocation,
    out: &mut impl Write,
) -> Result<()> {
    let path = write_backup(state.data(), dir, invocation.now.date_naive()).await?;
    writeln!(out, "Exported to {}", path.display())?;
    Ok(())
}

pub async fn process_import_command(
    state: &mut AppState,
    file: &Path,
    out: &mut impl Write,
) -> Result<()> {
    let contents = tokio::fs::read_to_string(file).await?;
    apply_import(state, &contents)?;
    writeln!(out, "Data imported successfully!")?;
    Ok(())
}

/// Wipes the store and the in-memory state. Refuses to do anything without confirmation.
pub async fn process_reset_command(
    state: &mut AppState,
    gateway: &impl PersistenceGateway,
    confirmed: bool,
    out: &mut impl Write,
) -> Result<()> {
    if !confirmed {
        writeln!(
            out,
            "This deletes every task, transaction and setting. Run again with --yes to confirm"
        )?;
        return Ok(());
    }
    gateway.clear().await?;
    state.reset();
    info!("All data was reset");
    writeln!(out, "All data deleted")?;
    Ok(())
}
