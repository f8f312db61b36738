use std::collections::BTreeSet;

use anyhow::Result;
use tokio::sync::watch;
use tracing::debug;

use super::{
    entities::{AppData, Task, Transaction, UserProfile, UserSettings},
    persistence::{self, Bucket, PersistenceGateway},
};

/// Published to subscribers after every effective mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateChange {
    pub revision: u64,
    pub buckets: BTreeSet<Bucket>,
}

/// Owner of the canonical in-memory state.
///
/// Collections are replaced as a whole, never patched in place, so a reader holding a borrow
/// always sees a consistent snapshot. Mutations that change nothing are not published.
pub struct AppState {
    data: AppData,
    dirty: BTreeSet<Bucket>,
    revision: u64,
    changes: watch::Sender<StateChange>,
}

impl AppState {
    pub fn new(data: AppData) -> Self {
        let (changes, _) = watch::channel(StateChange::default());
        Self {
            data,
            dirty: BTreeSet::new(),
            revision: 0,
            changes,
        }
    }

    pub async fn load(gateway: &impl PersistenceGateway) -> Self {
        Self::new(persistence::load_app_data(gateway).await)
    }

    pub fn subscribe(&self) -> watch::Receiver<StateChange> {
        self.changes.subscribe()
    }

    pub fn data(&self) -> &AppData {
        &self.data
    }

    pub fn tasks(&self) -> &[Task] {
        &self.data.tasks
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.data.transactions
    }

    pub fn profile(&self) -> &UserProfile {
        &self.data.profile
    }

    pub fn settings(&self) -> &UserSettings {
        &self.data.settings
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// `update` receives the current tasks and returns a replacement, or `None` when nothing
    /// changed. Returns whether the collection was replaced.
    pub fn update_tasks(&mut self, update: impl FnOnce(&[Task]) -> Option<Vec<Task>>) -> bool {
        match update(&self.data.tasks) {
            Some(tasks) => {
                self.data.tasks = tasks;
                self.publish([Bucket::Tasks]);
                true
            }
            None => false,
        }
    }

    pub fn update_transactions(
        &mut self,
        update: impl FnOnce(&[Transaction]) -> Option<Vec<Transaction>>,
    ) -> bool {
        match update(&self.data.transactions) {
            Some(transactions) => {
                self.data.transactions = transactions;
                self.publish([Bucket::Transactions]);
                true
            }
            None => false,
        }
    }

    pub fn set_profile(&mut self, profile: UserProfile) -> bool {
        if self.data.profile == profile {
            return false;
        }
        self.data.profile = profile;
        self.publish([Bucket::Profile]);
        true
    }

    pub fn set_settings(&mut self, settings: UserSettings) -> bool {
        if self.data.settings == settings {
            return false;
        }
        self.data.settings = settings;
        self.publish([Bucket::Settings]);
        true
    }

    /// Swaps in a complete data set at once, as done by import.
    pub fn replace_all(&mut self, data: AppData) {
        self.data = data;
        self.publish(Bucket::ALL);
    }

    /// Drops everything back to defaults. The caller is expected to wipe the store itself, so
    /// nothing is left to save afterwards.
    pub fn reset(&mut self) {
        self.data = AppData::default();
        self.publish(Bucket::ALL);
        self.dirty.clear();
    }

    /// Saves buckets changed since the last call.
    pub async fn persist_changes(&mut self, gateway: &impl PersistenceGateway) -> Result<()> {
        while let Some(bucket) = self.dirty.first().copied() {
            match bucket {
                Bucket::Tasks => persistence::save(gateway, bucket, &self.data.tasks).await?,
                Bucket::Transactions => {
                    persistence::save(gateway, bucket, &self.data.transactions).await?
                }
                Bucket::Profile => persistence::save(gateway, bucket, &self.data.profile).await?,
                Bucket::Settings => {
                    persistence::save(gateway, bucket, &self.data.settings).await?
                }
            }
            self.dirty.remove(&bucket);
        }
        Ok(())
    }

    fn publish(&mut self, buckets: impl IntoIterator<Item = Bucket>) {
        let buckets = buckets.into_iter().collect::<BTreeSet<_>>();
        self.revision += 1;
        self.dirty.extend(buckets.iter().copied());
        debug!("State revision {} changed {:?}", self.revision, buckets);
        self.changes.send_replace(StateChange {
            revision: self.revision,
            buckets,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use anyhow::Result;
    use chrono::{TimeZone, Utc};

    use crate::state::{
        entities::{AppData, Priority, Task, UserSettings},
        persistence::{load_app_data, Bucket, MemoryPersistence},
    };

    use super::AppState;

    fn task(id: &str) -> Task {
        Task {
            id: id.into(),
            title: format!("task {id}"),
            priority: Priority::Medium,
            completed: false,
            due_date: None,
            reminder_time: None,
            notified: false,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_unchanged_update_is_not_published() {
        let mut state = AppState::new(AppData::default());
        let receiver = state.subscribe();

        assert!(!state.update_tasks(|_| None));
        assert!(!state.set_settings(UserSettings::default()));

        assert!(!receiver.has_changed().unwrap());
        assert_eq!(state.revision(), 0);
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_update_publishes_change() {
        let mut state = AppState::new(AppData::default());
        let mut receiver = state.subscribe();

        assert!(state.update_tasks(|tasks| {
            let mut tasks = tasks.to_vec();
            tasks.push(task("a"));
            Some(tasks)
        }));

        assert!(receiver.has_changed().unwrap());
        let change = receiver.borrow_and_update().clone();
        assert_eq!(change.revision, 1);
        assert_eq!(change.buckets, BTreeSet::from([Bucket::Tasks]));
        assert_eq!(state.tasks().len(), 1);
    }

    #[test]
    fn test_replace_all_marks_every_bucket() {
        let mut state = AppState::new(AppData::default());
        let receiver = state.subscribe();

        state.replace_all(AppData {
            tasks: vec![task("x")],
            ..AppData::default()
        });

        assert_eq!(receiver.borrow().buckets.len(), 4);
        assert!(state.is_dirty());
    }

    #[tokio::test]
    async fn test_persist_changes_saves_only_dirty_buckets() -> Result<()> {
        let store = MemoryPersistence::new();
        let mut state = AppState::new(AppData::default());

        state.update_tasks(|_| Some(vec![task("a")]));
        state.persist_changes(&store).await?;

        assert!(store.contains(Bucket::Tasks));
        assert!(!store.contains(Bucket::Profile));
        assert!(!state.is_dirty());
        assert_eq!(load_app_data(&store).await.tasks, vec![task("a")]);
        Ok(())
    }

    #[test]
    fn test_reset_leaves_nothing_to_save() {
        let mut state = AppState::new(AppData {
            tasks: vec![task("a")],
            ..AppData::default()
        });
        state.reset();
        assert!(state.tasks().is_empty());
        assert!(!state.is_dirty());
        assert_eq!(state.revision(), 1);
    }
}
