use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

pub const DATE_EXAMPLES: &str = "Examples are \"tomorrow\", \"8pm\", \"15/03/2025\", \"16/03/2025 12:00\", \"16/03/2025 9am\"";

/// Parses human input like "tomorrow 9am" relative to `now`.
///
/// chrono-english only reads a time that follows the date and reads "12am" as noon. A leading
/// time ("12:00 16/03/2025") is moved behind the date and am/pm times are rewritten to 24 hour
/// clock before parsing.
pub fn parse_moment(input: &str, now: DateTime<Local>, style: DateStyle) -> Result<DateTime<Utc>> {
    let normalized = date_first(input);
    let moment = match parse_date_string(&normalized, now, style.into()) {
        Ok(moment) => moment,
        Err(e) => return Err(date_error(input, e)),
    };

    // Anything after the time is silently dropped by the parser
    for token in input.split_whitespace().filter(|token| token.contains('/')) {
        let consumed = parse_date_string(token, now, style.into())
            .map_or(true, |date| date.date_naive() == moment.date_naive());
        if !consumed {
            return Err(date_error(input, format!("date {token} was not understood")));
        }
    }
    Ok(moment.with_timezone(&Utc))
}

fn date_error(input: &str, e: impl Display) -> anyhow::Error {
    Args::command()
        .error(
            clap::error::ErrorKind::ValueValidation,
            format!("Failed to validate date {input:?}: {e}"),
        )
        .into()
}

fn date_first(input: &str) -> String {
    let tokens = input.split_whitespace().collect::<Vec<_>>();
    if let Some((time, consumed)) = leading_time(&tokens) {
        return with_time(&tokens[consumed..], time);
    }
    if let Some((time, consumed)) = trailing_meridiem_time(&tokens) {
        return with_time(&tokens[..tokens.len() - consumed], time);
    }
    input.to_string()
}

fn with_time(date: &[&str], (hour, minute): (u32, u32)) -> String {
    let time = format!("{hour:02}:{minute:02}");
    if date.is_empty() {
        time
    } else {
        format!("{} {time}", date.join(" "))
    }
}

/// Time of day at the start of the input and how many tokens it spans.
fn leading_time(tokens: &[&str]) -> Option<((u32, u32), usize)> {
    let first = tokens.first()?.to_ascii_lowercase();
    for meridiem in ["am", "pm"] {
        if let Some(clock) = first.strip_suffix(meridiem).filter(|clock| !clock.is_empty()) {
            return time_of_day(clock, Some(meridiem)).map(|time| (time, 1));
        }
    }
    if let Some(next) = tokens.get(1).map(|next| next.to_ascii_lowercase()) {
        if next == "am" || next == "pm" {
            return time_of_day(&first, Some(next.as_str())).map(|time| (time, 2));
        }
    }
    time_of_day(&first, None).map(|time| (time, 1))
}

/// An am/pm time at the end of the input and how many tokens it spans.
fn trailing_meridiem_time(tokens: &[&str]) -> Option<((u32, u32), usize)> {
    let last = tokens.last()?.to_ascii_lowercase();
    for meridiem in ["am", "pm"] {
        if last == meridiem {
            let clock = tokens.len().checked_sub(2).map(|i| tokens[i])?;
            return time_of_day(clock, Some(meridiem)).map(|time| (time, 2));
        }
        if let Some(clock) = last.strip_suffix(meridiem).filter(|clock| !clock.is_empty()) {
            return time_of_day(clock, Some(meridiem)).map(|time| (time, 1));
        }
    }
    None
}

fn time_of_day(clock: &str, meridiem: Option<&str>) -> Option<(u32, u32)> {
    let (hour, minute) = match clock.split_once(':') {
        Some((hour, minute)) => (hour.parse::<u32>().ok()?, minute.parse::<u32>().ok()?),
        None => (clock.parse::<u32>().ok()?, 0),
    };
    if minute > 59 {
        return None;
    }
    match meridiem {
        None if hour < 24 && clock.contains(':') => Some((hour, minute)),
        Some("am") if (1..=12).contains(&hour) => Some((hour % 12, minute)),
        Some("pm") if (1..=12).contains(&hour) => Some((hour % 12 + 12, minute)),
        _ => None,
    }
}

pub fn parse_optional_moment(
    input: Option<&str>,
    now: DateTime<Local>,
    style: DateStyle,
) -> Result<Option<DateTime<Utc>>> {
    input.map(|input| parse_moment(input, now, style)).transpose()
}
