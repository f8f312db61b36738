use std::io::Write;

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;

use crate::{
    advice::AdviceClient,
    state::{entities::Priority, store::AppState},
    tasks::{
        add_task, delete_task, filter_tasks, resolve_task_id, set_reminder, snooze,
        toggle_complete, NewTask, TaskFilter, SUMMARIZE_MIN_LENGTH,
    },
};

use super::{
    dates::{parse_moment, parse_optional_moment, DATE_EXAMPLES},
    output::{format_moment, short_id, task_line},
    Invocation,
};

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    #[command(about = "Add a new task")]
    Add {
        title: String,
        #[arg(short, long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        #[arg(short, long, help = "When to be reminded. Same formats as --due")]
        remind: Option<String>,
        #[arg(short, long, help = format!("Due date. {DATE_EXAMPLES}"))]
        due: Option<String>,
        #[arg(long, help = "Let the AI reword the title before saving")]
        polish: bool,
        #[arg(long, help = "Let the AI shorten the title before saving")]
        summarize: bool,
    },
    #[command(about = "List tasks")]
    List {
        #[arg(short, long, value_enum, default_value_t = TaskFilter::Pending)]
        filter: TaskFilter,
    },
    #[command(about = "Toggle completion of a task")]
    Done { id: String },
    #[command(about = "Delete a task")]
    Delete { id: String },
    #[command(about = "Set or clear the reminder of a task")]
    Remind {
        id: String,
        #[arg(required_unless_present = "clear")]
        when: Option<String>,
        #[arg(long, conflicts_with = "when")]
        clear: bool,
    },
    #[command(about = "Push a reminder back by the snooze duration")]
    Snooze {
        id: String,
        #[arg(short, long, help = "Overrides the snooze duration from settings")]
        minutes: Option<u32>,
    },
    #[command(about = "Suggest a concise, actionable wording for a task")]
    Polish { text: String },
    #[command(about = "Suggest a very short version of a task title")]
    Summarize { text: String },
}

impl TaskFilter {
    fn empty_message(self) -> &'static str {
        match self {
            TaskFilter::All => "No tasks yet",
            TaskFilter::Pending => "Nothing pending",
            TaskFilter::Completed => "Nothing completed yet",
        }
    }
}

async fn summarize_if_long(advice: &AdviceClient, text: &str) -> String {
    if text.chars().count() < SUMMARIZE_MIN_LENGTH {
        return text.to_string();
    }
    advice.summarize_task(text).await
}

/// Applies the requested AI rewording up front, so the returned command needs no further AI
/// requests.
pub async fn resolve_task_advice(command: TaskCommand, advice: &AdviceClient) -> TaskCommand {
    match command {
        TaskCommand::Add {
            title,
            priority,
            remind,
            due,
            polish,
            summarize,
        } if polish || summarize => {
            let mut title = title;
            if polish {
                title = advice.polish_task(&title).await;
            }
            if summarize {
                title = summarize_if_long(advice, &title).await;
            }
            TaskCommand::Add {
                title,
                priority,
                remind,
                due,
                polish: false,
                summarize: false,
            }
        }
        command => command,
    }
}

pub async fn process_task_command(
    command: TaskCommand,
    state: &mut AppState,
    advice: &AdviceClient,
    invocation: Invocation,
    out: &mut impl Write,
) -> Result<()> {
    let now = invocation.now.with_timezone(&Utc);
    match command {
        TaskCommand::Add {
            title,
            priority,
            remind,
            due,
            polish,
            summarize,
        } => {
            let reminder_time =
                parse_optional_moment(remind.as_deref(), invocation.now, invocation.date_style)?;
            let due_date =
                parse_optional_moment(due.as_deref(), invocation.now, invocation.date_style)?;

            let mut title = title;
            if polish {
                title = advice.polish_task(&title).await;
            }
            if summarize {
                title = summarize_if_long(advice, &title).await;
            }

            let task = add_task(
                state,
                NewTask {
                    title,
                    priority,
                    reminder_time,
                    due_date,
                },
                now,
            )?;
            writeln!(out, "Added {}\t{}", short_id(&task.id), task.title)?;
            if let Some(reminder) = task.reminder_time {
                writeln!(out, "Reminder at {}", format_moment(reminder))?;
            }
        }
        TaskCommand::List { filter } => {
            let mut empty = true;
            for task in filter_tasks(state.tasks(), filter) {
                empty = false;
                writeln!(out, "{}", task_line(task))?;
            }
            if empty {
                writeln!(out, "{}", filter.empty_message())?;
            }
        }
        TaskCommand::Done { id } => {
            let id = resolve_task_id(state.tasks(), &id)?;
            let completed = toggle_complete(state, &id)?;
            let verb = if completed { "Completed" } else { "Reopened" };
            writeln!(out, "{verb} {}", short_id(&id))?;
        }
        TaskCommand::Delete { id } => {
            let id = resolve_task_id(state.tasks(), &id)?;
            let task = delete_task(state, &id)?;
            writeln!(out, "Deleted {}\t{}", short_id(&task.id), task.title)?;
        }
        TaskCommand::Remind { id, when, clear } => {
            let id = resolve_task_id(state.tasks(), &id)?;
            let reminder_time = match (when, clear) {
                (_, true) | (None, _) => None,
                (Some(when), false) => {
                    Some(parse_moment(&when, invocation.now, invocation.date_style)?)
                }
            };
            set_reminder(state, &id, reminder_time)?;
            match reminder_time {
                Some(at) => writeln!(out, "Reminder of {} set to {}", short_id(&id), format_moment(at))?,
                None => writeln!(out, "Reminder of {} cleared", short_id(&id))?,
            }
        }
        TaskCommand::Snooze { id, minutes } => {
            let id = resolve_task_id(state.tasks(), &id)?;
            let until = snooze(state, &id, minutes, now)?;
            writeln!(out, "Snoozed {} until {}", short_id(&id), format_moment(until))?;
        }
        TaskCommand::Polish { text } => {
            writeln!(out, "{}", advice.polish_task(&text).await)?;
        }
        TaskCommand::Summarize { text } => {
            writeln!(out, "{}", summarize_if_long(advice, &text).await)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, Local, TimeZone, Utc};

    use crate::{
        advice::{AdviceClient, MockTextGenerator},
        cli::{dates::DateStyle, Invocation},
        state::{
            entities::{AppData, Priority},
            store::AppState,
        },
        tasks::TaskFilter,
    };

    use super::{process_task_command, resolve_task_advice, TaskCommand};

    fn invocation() -> Invocation {
        Invocation {
            now: Local.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            date_style: DateStyle::Uk,
        }
    }

    fn add(title: &str) -> TaskCommand {
        add_with(title, None, false)
    }

    fn add_with(title: &str, remind: Option<&str>, polish: bool) -> TaskCommand {
        TaskCommand::Add {
            title: title.into(),
            priority: Priority::High,
            remind: remind.map(String::from),
            due: None,
            polish,
            summarize: false,
        }
    }

    async fn run(state: &mut AppState, advice: &AdviceClient, command: TaskCommand) -> Result<String> {
        let mut out = Vec::new();
        process_task_command(command, state, advice, invocation(), &mut out).await?;
        Ok(String::from_utf8(out)?)
    }

    #[tokio::test]
    async fn test_add_with_reminder_then_list() -> Result<()> {
        let mut state = AppState::new(AppData::default());
        let advice = AdviceClient::offline();

        let output = run(
            &mut state,
            &advice,
            add_with("Renew passport", Some("16/03/2025 12:00"), false),
        )
        .await?;
        assert!(output.contains("Renew passport"));
        assert!(output.contains("Reminder at"));

        let task = &state.tasks()[0];
        assert_eq!(task.priority, Priority::High);
        assert_eq!(
            task.reminder_time,
            Some(
                Local
                    .with_ymd_and_hms(2025, 3, 16, 12, 0, 0)
                    .unwrap()
                    .with_timezone(&Utc)
            )
        );

        let listed = run(&mut state, &advice, TaskCommand::List { filter: TaskFilter::Pending }).await?;
        assert!(listed.contains("Renew passport"));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_reminder_adds_nothing() {
        let mut state = AppState::new(AppData::default());
        let result = run(
            &mut state,
            &AdviceClient::offline(),
            add_with("Anything", Some("not a date at all"), false),
        )
        .await;
        assert!(result.is_err());
        assert!(state.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_done_by_prefix_and_empty_list() -> Result<()> {
        let mut state = AppState::new(AppData::default());
        let advice = AdviceClient::offline();
        run(&mut state, &advice, add("Water plants")).await?;
        let prefix = state.tasks()[0].id[..6].to_string();

        let output = run(&mut state, &advice, TaskCommand::Done { id: prefix }).await?;
        assert!(output.starts_with("Completed"));
        assert!(state.tasks()[0].completed);

        let listed = run(&mut state, &advice, TaskCommand::List { filter: TaskFilter::Pending }).await?;
        assert_eq!(listed, "Nothing pending\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_snooze_uses_settings() -> Result<()> {
        let mut state = AppState::new(AppData::default());
        let advice = AdviceClient::offline();
        run(&mut state, &advice, add("Stand up")).await?;
        let id = state.tasks()[0].id.clone();

        run(&mut state, &advice, TaskCommand::Snooze { id, minutes: None }).await?;

        let expected = invocation().now.with_timezone(&Utc) + Duration::minutes(5);
        assert_eq!(state.tasks()[0].reminder_time, Some(expected));
        assert!(!state.tasks()[0].notified);
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_reminder() -> Result<()> {
        let mut state = AppState::new(AppData::default());
        let advice = AdviceClient::offline();
        run(
            &mut state,
            &advice,
            add_with("Dentist", Some("16/03/2025"), false),
        )
        .await?;
        let id = state.tasks()[0].id.clone();

        let output = run(
            &mut state,
            &advice,
            TaskCommand::Remind {
                id,
                when: None,
                clear: true,
            },
        )
        .await?;
        assert!(output.ends_with("cleared\n"));
        assert_eq!(state.tasks()[0].reminder_time, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_polished_title_is_saved() -> Result<()> {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_, _| Ok("Email landlord about heater".to_string()));
        let advice = AdviceClient::new(Some(Box::new(generator)));
        let mut state = AppState::new(AppData::default());

        run(
            &mut state,
            &advice,
            add_with(
                "i should probably write to the landlord because the heater is broken",
                None,
                true,
            ),
        )
        .await?;
        assert_eq!(state.tasks()[0].title, "Email landlord about heater");
        Ok(())
    }

    #[tokio::test]
    async fn test_short_titles_are_not_summarized() -> Result<()> {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();
        let advice = AdviceClient::new(Some(Box::new(generator)));
        let mut state = AppState::new(AppData::default());

        let output = run(&mut state, &advice, TaskCommand::Summarize { text: "Gym".into() }).await?;
        assert_eq!(output, "Gym\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_resolved_add_needs_no_more_advice() -> Result<()> {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_, _| Ok("Email landlord".to_string()));
        let advice = AdviceClient::new(Some(Box::new(generator)));

        let resolved = resolve_task_advice(add_with("write to the landlord", None, true), &advice).await;
        let TaskCommand::Add { title, polish, .. } = &resolved else {
            panic!("Expected an add command, got {resolved:?}");
        };
        assert_eq!(title, "Email landlord");
        assert!(!polish);

        let mut state = AppState::new(AppData::default());
        run(&mut state, &AdviceClient::offline(), resolved).await?;
        assert_eq!(state.tasks()[0].title, "Email landlord");
        Ok(())
    }
}
