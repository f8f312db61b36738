use std::path::{Path, PathBuf};

use anyhow::Result;
use reminders::{
    alerts::{AudioSurface, DesktopNotifier, SoundPlayer, TerminalBell},
    scheduler::{ReminderLoop, ReminderScheduler, POLL_INTERVAL},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{state::persistence::FilePersistence, utils::clock::DefaultClock};

pub mod args;
pub mod reminders;
pub mod shutdown;

pub const DATA_DIR: &str = "data";

/// Directory holding the persisted buckets inside the application directory.
pub fn data_dir(app_dir: &Path) -> PathBuf {
    app_dir.join(DATA_DIR)
}

/// Represents the starting point for the daemon. Runs until ctrl-c.
pub async fn start_daemon(dir: PathBuf, attached: bool) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let audio: Box<dyn AudioSurface> = if attached {
        Box::new(TerminalBell)
    } else {
        Box::new(SoundPlayer::default())
    };

    let reminder_loop = create_reminder_loop(data_dir(&dir), audio, &shutdown_token)?;
    info!("Watching reminders in {dir:?}");

    let (_, loop_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        reminder_loop.run(),
    );

    if let Err(e) = loop_result {
        error!("Reminder loop got an error {e:?}");
    }

    Ok(())
}

fn create_reminder_loop(
    data_dir: PathBuf,
    audio: Box<dyn AudioSurface>,
    shutdown_token: &CancellationToken,
) -> Result<ReminderLoop<FilePersistence>> {
    let gateway = FilePersistence::new(data_dir)?;
    let scheduler = ReminderScheduler::new(Box::new(DesktopNotifier::new()), audio);
    Ok(ReminderLoop::new(
        scheduler,
        gateway,
        Box::new(DefaultClock),
        POLL_INTERVAL,
        shutdown_token.clone(),
    ))
}
