use std::{io::Write, path::Path};

use anyhow::{anyhow, bail, Result};
use base64::{engine::general_purpose, Engine as _};
use clap::{Subcommand, ValueEnum};

use crate::state::{
    entities::{UserProfile, UserSettings},
    store::AppState,
};

use super::output::format_amount;

/// Avatars are stored inline, keep them small.
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    #[command(about = "Show the profile")]
    Show {},
    #[command(about = "Change profile fields. Omitted fields stay as they are")]
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, help = "Monthly budget used for spending tips")]
        budget: Option<f64>,
        #[arg(long, help = "Image file used as the avatar")]
        avatar: Option<std::path::PathBuf>,
        #[arg(long, conflicts_with = "avatar")]
        clear_avatar: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    #[command(about = "Show the settings")]
    Show {},
    #[command(about = "Play a sound when a reminder fires")]
    Sound { state: Toggle },
    #[command(about = "Default snooze duration")]
    Snooze {
        #[arg(value_parser = clap::value_parser!(u32).range(1..=1440))]
        minutes: u32,
    },
}

fn mime_type(path: &Path) -> Result<&'static str> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => Ok("image/png"),
        Some("jpg" | "jpeg") => Ok("image/jpeg"),
        Some("gif") => Ok("image/gif"),
        Some("webp") => Ok("image/webp"),
        Some("svg") => Ok("image/svg+xml"),
        _ => Err(anyhow!("{path:?} is not a supported image")),
    }
}

pub fn avatar_data_uri(path: &Path, contents: &[u8]) -> Result<String> {
    if contents.len() > MAX_AVATAR_BYTES {
        bail!(
            "Avatar is {} bytes, at most {MAX_AVATAR_BYTES} are allowed",
            contents.len()
        );
    }
    Ok(format!(
        "data:{};base64,{}",
        mime_type(path)?,
        general_purpose::STANDARD.encode(contents)
    ))
}

fn write_profile(profile: &UserProfile, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Name\t{}", profile.name)?;
    writeln!(out, "Email\t{}", profile.email)?;
    writeln!(out, "Budget\t{}", format_amount(profile.monthly_budget))?;
    writeln!(
        out,
        "Avatar\t{}",
        if profile.avatar_url.is_some() { "set" } else { "none" }
    )?;
    Ok(())
}

fn write_settings(settings: &UserSettings, out: &mut impl Write) -> Result<()> {
    writeln!(
        out,
        "Sound\t{}",
        if settings.sound_enabled { "on" } else { "off" }
    )?;
    writeln!(out, "Snooze\t{} minutes", settings.snooze_minutes())?;
    Ok(())
}

pub async fn process_profile_command(
    command: ProfileCommand,
    state: &mut AppState,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        ProfileCommand::Show {} => write_profile(state.profile(), out),
        ProfileCommand::Set {
            name,
            email,
            budget,
            avatar,
            clear_avatar,
        } => {
            let mut profile = state.profile().clone();
            if let Some(name) = name {
                let name = name.trim();
                if name.is_empty() {
                    bail!("Name can't be empty");
                }
                profile.name = name.to_string();
            }
            if let Some(email) = email {
                profile.email = email.trim().to_string();
            }
            if let Some(budget) = budget {
                if !budget.is_finite() || budget < 0. {
                    bail!("Budget must be a non negative number, got {budget}");
                }
                profile.monthly_budget = budget;
            }
            if let Some(path) = avatar {
                let contents = tokio::fs::read(&path).await?;
                profile.avatar_url = Some(avatar_data_uri(&path, &contents)?);
            }
            if clear_avatar {
                profile.avatar_url = None;
            }

            if !state.set_profile(profile) {
                writeln!(out, "Nothing changed")?;
            }
            write_profile(state.profile(), out)
        }
    }
}

pub fn process_settings_command(
    command: SettingsCommand,
    state: &mut AppState,
    out: &mut impl Write,
) -> Result<()> {
    let mut settings = state.settings().clone();
    match command {
        SettingsCommand::Show {} => return write_settings(&settings, out),
        SettingsCommand::Sound { state: toggle } => settings.sound_enabled = toggle == Toggle::On,
        SettingsCommand::Snooze { minutes } => settings.snooze_duration_minutes = minutes,
    }
    state.set_settings(settings);
    write_settings(state.settings(), out)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::Result;
    use tempfile::tempdir;

    use crate::state::{entities::AppData, store::AppState};

    use super::{
        avatar_data_uri, process_profile_command, process_settings_command, ProfileCommand,
        SettingsCommand, Toggle, MAX_AVATAR_BYTES,
    };

    fn set(name: Option<&str>, budget: Option<f64>) -> ProfileCommand {
        ProfileCommand::Set {
            name: name.map(String::from),
            email: None,
            budget,
            avatar: None,
            clear_avatar: false,
        }
    }

    #[test]
    fn test_avatar_data_uri() -> Result<()> {
        assert_eq!(
            avatar_data_uri(Path::new("me.PNG"), b"hi")?,
            "data:image/png;base64,aGk="
        );
        assert!(avatar_data_uri(Path::new("me.txt"), b"hi").is_err());
        assert!(avatar_data_uri(Path::new("me.png"), &vec![0; MAX_AVATAR_BYTES + 1]).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_set_profile() -> Result<()> {
        let mut state = AppState::new(AppData::default());
        let mut out = Vec::new();

        process_profile_command(set(Some(" Jo "), Some(750.)), &mut state, &mut out).await?;

        assert_eq!(state.profile().name, "Jo");
        assert_eq!(state.profile().monthly_budget, 750.);
        assert!(String::from_utf8(out)?.contains("Budget\t₹750.00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_profile_changes_nothing() {
        let mut state = AppState::new(AppData::default());
        let mut out = Vec::new();

        assert!(process_profile_command(set(Some("  "), None), &mut state, &mut out)
            .await
            .is_err());
        assert!(process_profile_command(set(None, Some(-5.)), &mut state, &mut out)
            .await
            .is_err());
        assert!(!state.is_dirty());
    }

    #[tokio::test]
    async fn test_avatar_from_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("avatar.jpg");
        std::fs::write(&path, [0xff, 0xd8, 0xff])?;
        let mut state = AppState::new(AppData::default());
        let mut out = Vec::new();

        process_profile_command(
            ProfileCommand::Set {
                name: None,
                email: None,
                budget: None,
                avatar: Some(path),
                clear_avatar: false,
            },
            &mut state,
            &mut out,
        )
        .await?;

        assert_eq!(
            state.profile().avatar_url.as_deref(),
            Some("data:image/jpeg;base64,/9j/")
        );
        Ok(())
    }

    #[test]
    fn test_settings() -> Result<()> {
        let mut state = AppState::new(AppData::default());
        let mut out = Vec::new();

        process_settings_command(SettingsCommand::Sound { state: Toggle::Off }, &mut state, &mut out)?;
        process_settings_command(SettingsCommand::Snooze { minutes: 15 }, &mut state, &mut out)?;

        assert!(!state.settings().sound_enabled);
        assert_eq!(state.settings().snooze_duration_minutes, 15);
        assert!(String::from_utf8(out)?.ends_with("Sound\toff\nSnooze\t15 minutes\n"));
        Ok(())
    }
}
