//! Host surfaces used to get the user's attention. Both are fire-and-forget: spawning the
//! helper program is the only work done inside a tick.

use std::{env, path::PathBuf};

use anyhow::{anyhow, Result};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// The host was not asked yet.
    Default,
    Unsupported,
}

/// Permission gated visual notifications.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSurface: Send {
    fn permission(&self) -> Permission;

    fn request_permission(&mut self) -> Permission;

    fn notify(&mut self, title: &str, body: &str) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait AudioSurface: Send {
    fn play_alert(&mut self) -> Result<()>;
}

const NOTIFY_PROGRAM: &str = "notify-send";

/// Desktop notifications through `notify-send`. Permission is settled on the first request by
/// checking whether the program is installed.
pub struct DesktopNotifier {
    permission: Permission,
    program: Option<PathBuf>,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            permission: Permission::Default,
            program: None,
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSurface for DesktopNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Permission {
        self.program = find_program(NOTIFY_PROGRAM);
        self.permission = if self.program.is_some() {
            Permission::Granted
        } else {
            Permission::Unsupported
        };
        info!("Notification permission settled as {:?}", self.permission);
        self.permission
    }

    fn notify(&mut self, title: &str, body: &str) -> Result<()> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| anyhow!("{NOTIFY_PROGRAM} is not available"))?;
        tokio::process::Command::new(program)
            .args(["--app-name", "dailyfocus", title, body])
            .spawn()?;
        debug!("Dispatched notification {title:?} {body:?}");
        Ok(())
    }
}

/// Plays the alert sound through an external player. Defaults to the freedesktop "message new
/// instant" event sound.
pub struct SoundPlayer {
    program: String,
    args: Vec<String>,
}

impl SoundPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for SoundPlayer {
    fn default() -> Self {
        Self::new(
            "canberra-gtk-play",
            vec!["--id".into(), "message-new-instant".into()],
        )
    }
}

impl AudioSurface for SoundPlayer {
    fn play_alert(&mut self) -> Result<()> {
        tokio::process::Command::new(&self.program)
            .args(&self.args)
            .spawn()
            .map_err(|e| anyhow!("Failed to start {}: {e}", self.program))?;
        Ok(())
    }
}

/// Rings the terminal bell. Used when the daemon runs attached to a console.
pub struct TerminalBell;

impl AudioSurface for TerminalBell {
    fn play_alert(&mut self) -> Result<()> {
        use std::io::Write;

        let mut stdout = std::io::stdout();
        stdout.write_all(b"\x07")?;
        stdout.flush()?;
        Ok(())
    }
}

fn find_program(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
