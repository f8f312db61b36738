//! Terminal companion for the day: tasks with reminders, a small income and expense ledger, and
//! optional AI suggestions on top of both.
//!
//! The `dailyfocus` cli edits the data, while the `dailyfocus-daemon` runs in the background and
//! fires reminders when they come due. Both share a directory of json buckets.

pub mod advice;
pub mod backup;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod finance;
pub mod state;
pub mod tasks;
pub mod utils;
