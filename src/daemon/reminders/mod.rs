//! Reminder firing. [scheduler::ReminderLoop] drives [scheduler::ReminderScheduler] on a timer,
//! the scheduler turns due reminders into alerts on the [alerts] surfaces.

pub mod alerts;
pub mod scheduler;
