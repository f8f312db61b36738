//! User driven task operations. The reminder side effects live in
//! [crate::daemon::reminders]; everything here only ever runs in response to a command.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use tracing::info;
use uuid::Uuid;

use crate::{
    state::{
        entities::{Priority, Task},
        store::AppState,
    },
    utils::time::truncate_to_millis,
};

pub use crate::daemon::reminders::scheduler::snooze;

/// Titles shorter than this are not worth summarizing.
pub const SUMMARIZE_MIN_LENGTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TaskFilter {
    All,
    #[default]
    Pending,
    Completed,
}

impl TaskFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Pending => !task.completed,
            TaskFilter::Completed => task.completed,
        }
    }
}

pub fn filter_tasks(tasks: &[Task], filter: TaskFilter) -> impl Iterator<Item = &Task> {
    tasks.iter().filter(move |task| filter.matches(task))
}

pub fn pending_count(tasks: &[Task]) -> usize {
    filter_tasks(tasks, TaskFilter::Pending).count()
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub priority: Priority,
    pub reminder_time: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Creates a task and puts it in front of the list. A set reminder starts out armed.
pub fn add_task(state: &mut AppState, new_task: NewTask, now: DateTime<Utc>) -> Result<Task> {
    let title = new_task.title.trim();
    if title.is_empty() {
        bail!("Task title can't be empty");
    }

    let task = Task {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        priority: new_task.priority,
        completed: false,
        due_date: new_task.due_date,
        reminder_time: new_task.reminder_time,
        notified: false,
        created_at: truncate_to_millis(now),
    };

    state.update_tasks(|tasks| {
        let mut updated = Vec::with_capacity(tasks.len() + 1);
        updated.push(task.clone());
        updated.extend_from_slice(tasks);
        Some(updated)
    });
    info!("Added task {}", task.id);
    Ok(task)
}

/// Flips completion and returns the new value.
pub fn toggle_complete(state: &mut AppState, task_id: &str) -> Result<bool> {
    let mut completed = None;
    modify_task(state, task_id, |task| {
        task.completed = !task.completed;
        completed = Some(task.completed);
    })?;
    completed.ok_or_else(|| anyhow!("No task with id {task_id}"))
}

pub fn delete_task(state: &mut AppState, task_id: &str) -> Result<Task> {
    let mut removed = None;
    state.update_tasks(|tasks| {
        let position = tasks.iter().position(|task| task.id == task_id)?;
        removed = Some(tasks[position].clone());
        let mut updated = tasks.to_vec();
        updated.remove(position);
        Some(updated)
    });
    let removed = removed.ok_or_else(|| anyhow!("No task with id {task_id}"))?;
    info!("Deleted task {task_id}");
    Ok(removed)
}

/// Sets or clears the reminder. Any change of the reminder time re-arms it.
pub fn set_reminder(
    state: &mut AppState,
    task_id: &str,
    reminder_time: Option<DateTime<Utc>>,
) -> Result<()> {
    modify_task(state, task_id, |task| {
        task.reminder_time = reminder_time;
        task.notified = false;
    })
}

/// Finds the single task whose id starts with `prefix`. Full ids always match exactly.
pub fn resolve_task_id(tasks: &[Task], prefix: &str) -> Result<String> {
    if let Some(task) = tasks.iter().find(|task| task.id == prefix) {
        return Ok(task.id.clone());
    }
    let mut matching = tasks.iter().filter(|task| task.id.starts_with(prefix));
    match (matching.next(), matching.next()) {
        (Some(task), None) if !prefix.is_empty() => Ok(task.id.clone()),
        (Some(_), Some(_)) => Err(anyhow!("Id prefix {prefix} matches more than one task")),
        _ => Err(anyhow!("No task with id {prefix}")),
    }
}

fn modify_task(state: &mut AppState, task_id: &str, modify: impl FnOnce(&mut Task)) -> Result<()> {
    let found = state.update_tasks(|tasks| {
        let position = tasks.iter().position(|task| task.id == task_id)?;
        let mut updated = tasks.to_vec();
        modify(&mut updated[position]);
        Some(updated)
    });
    if found {
        Ok(())
    } else {
        Err(anyhow!("No task with id {task_id}"))
    }
}
