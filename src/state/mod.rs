//! Application state and its persistence.
//!  - [entities] holds the domain types, which double as the on-disk format.
//!  - [persistence] stores each bucket (tasks, transactions, profile, settings) separately.
//!  - [store::AppState] owns the in-memory copy and publishes changes to subscribers.

pub mod entities;
pub mod persistence;
pub mod store;
