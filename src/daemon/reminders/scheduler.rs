use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    state::{entities::Task, persistence::PersistenceGateway, store::AppState},
    utils::clock::Clock,
};

use super::alerts::{AudioSurface, NotificationSurface, Permission};

pub const NOTIFICATION_TITLE: &str = "DailyFocus Task Reminder";

/// Worst case delay between a reminder becoming due and its alert.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Fires due reminders. Each armed reminder fires exactly once: firing sets `notified`, and only
/// re-arming through [snooze] or a reminder edit clears it again.
pub struct ReminderScheduler {
    notifier: Box<dyn NotificationSurface>,
    audio: Box<dyn AudioSurface>,
    activated: bool,
}

impl ReminderScheduler {
    pub fn new(notifier: Box<dyn NotificationSurface>, audio: Box<dyn AudioSurface>) -> Self {
        Self {
            notifier,
            audio,
            activated: false,
        }
    }

    /// Asks the host for notification permission the first time around, when it has not been
    /// decided yet. The outcome only gates visual notifications.
    pub fn activate(&mut self) -> Permission {
        let permission = self.notifier.permission();
        if self.activated {
            return permission;
        }
        self.activated = true;
        match permission {
            Permission::Default => self.notifier.request_permission(),
            permission => permission,
        }
    }

    /// Fires every due reminder and returns ids of the fired tasks. Bookkeeping happens before
    /// and regardless of alert dispatch. When nothing is due the state is left untouched.
    pub fn tick(&mut self, state: &mut AppState, now: DateTime<Utc>) -> Vec<String> {
        let sound_enabled = state.settings().sound_enabled;
        let mut fired = Vec::new();

        state.update_tasks(|tasks| {
            if !tasks.iter().any(|task| task.reminder_due(now)) {
                return None;
            }
            let updated = tasks
                .iter()
                .map(|task| {
                    if task.reminder_due(now) {
                        fired.push((task.id.clone(), task.title.clone()));
                        Task {
                            notified: true,
                            ..task.clone()
                        }
                    } else {
                        task.clone()
                    }
                })
                .collect();
            Some(updated)
        });

        for (id, title) in &fired {
            info!("Reminder for task {id} is due");
            self.dispatch_alert(title, sound_enabled);
        }

        fired.into_iter().map(|(id, _)| id).collect()
    }

    fn dispatch_alert(&mut self, task_title: &str, sound_enabled: bool) {
        match self.notifier.permission() {
            Permission::Granted => {
                if let Err(e) = self.notifier.notify(NOTIFICATION_TITLE, task_title) {
                    error!("Notification dispatch failed {e:?}");
                }
            }
            permission => debug!("Skipping notification, permission is {permission:?}"),
        }

        if sound_enabled {
            if let Err(e) = self.audio.play_alert() {
                error!("Audio play failed {e:?}");
            }
        }
    }
}

/// Re-arms the reminder of `task_id` to fire `minutes` after `now`. Without `minutes` the user's
/// configured snooze duration is used. Returns the new reminder time.
pub fn snooze(
    state: &mut AppState,
    task_id: &str,
    minutes: Option<u32>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let minutes = minutes.unwrap_or_else(|| state.settings().snooze_minutes());
    let reminder_time = now + chrono::Duration::minutes(minutes.into());

    let found = state.update_tasks(|tasks| {
        if !tasks.iter().any(|task| task.id == task_id) {
            return None;
        }
        Some(
            tasks
                .iter()
                .map(|task| {
                    if task.id == task_id {
                        Task {
                            reminder_time: Some(reminder_time),
                            notified: false,
                            ..task.clone()
                        }
                    } else {
                        task.clone()
                    }
                })
                .collect(),
        )
    });

    if !found {
        return Err(anyhow!("No task with id {task_id}"));
    }
    info!("Snoozed task {task_id} until {reminder_time}");
    Ok(reminder_time)
}

/// Runs [ReminderScheduler::tick] at a fixed interval until `shutdown` is cancelled.
///
/// Every tick starts from freshly loaded state, so edits made by other processes are seen and a
/// restarted loop resumes exactly where the stored state says it is.
pub struct ReminderLoop<G: PersistenceGateway> {
    scheduler: ReminderScheduler,
    gateway: G,
    clock: Box<dyn Clock>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl<G: PersistenceGateway> ReminderLoop<G> {
    pub fn new(
        scheduler: ReminderScheduler,
        gateway: G,
        clock: Box<dyn Clock>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            scheduler,
            gateway,
            clock,
            interval,
            shutdown,
        }
    }

    async fn tick_once(&mut self) -> Result<Vec<String>> {
        let lock = self.gateway.lock().await?;
        let mut state = AppState::load(&self.gateway).await;
        let fired = self.scheduler.tick(&mut state, self.clock.time());
        state.persist_changes(&self.gateway).await?;
        drop(lock);
        Ok(fired)
    }

    /// Executes the reminder event loop.
    pub async fn run(mut self) -> Result<()> {
        let permission = self.scheduler.activate();
        info!("Reminder loop started, notifications {permission:?}");

        let shutdown = self.shutdown.clone();
        let mut tick_point = self.clock.instant();
        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }
            tick_point += self.interval;

            let span = info_span!("Reminder tick");
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Reminder loop stopped while waiting for the store");
                    return Ok(())
                }
                result = self.tick_once().instrument(span) => match result {
                    Ok(fired) if fired.is_empty() => {}
                    Ok(fired) => info!("Fired {} reminders", fired.len()),
                    // Storage hiccups are retried on the next tick
                    Err(e) => warn!("Reminder tick failed {e:?}"),
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Reminder loop stopped");
                    return Ok(())
                }
                _ = self.clock.sleep_until(tick_point) => ()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use mockall::predicate::eq;
    use tempfile::tempdir;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::reminders::alerts::{MockAudioSurface, MockNotificationSurface, Permission},
        state::{
            entities::{AppData, Priority, Task, UserSettings},
            persistence::{
                load, load_app_data, save_app_data, Bucket, FilePersistence, MemoryPersistence, PersistenceGateway,
            },
            store::AppState,
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
    };

    use super::{snooze, ReminderLoop, ReminderScheduler, NOTIFICATION_TITLE};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    fn task(id: &str, reminder: Option<DateTime<Utc>>) -> Task {
        Task {
            id: id.into(),
            title: format!("Task {id}"),
            priority: Priority::Medium,
            completed: false,
            due_date: None,
            reminder_time: reminder,
            notified: false,
            created_at: at(9, 0, 0),
        }
    }

    fn granted_notifier() -> MockNotificationSurface {
        let mut notifier = MockNotificationSurface::new();
        notifier
            .expect_permission()
            .returning(|| Permission::Granted);
        notifier
    }

    fn state_with(tasks: Vec<Task>, sound_enabled: bool) -> AppState {
        AppState::new(AppData {
            tasks,
            settings: UserSettings {
                sound_enabled,
                snooze_duration_minutes: 5,
            },
            ..AppData::default()
        })
    }

    #[test]
    fn test_due_reminder_fires_once() {
        let mut notifier = granted_notifier();
        notifier
            .expect_notify()
            .with(eq(NOTIFICATION_TITLE), eq("Task a"))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut audio = MockAudioSurface::new();
        audio.expect_play_alert().times(1).returning(|| Ok(()));

        let mut scheduler = ReminderScheduler::new(Box::new(notifier), Box::new(audio));
        let mut state = state_with(vec![task("a", Some(at(10, 0, 0)))], true);

        let fired = scheduler.tick(&mut state, at(10, 0, 5));
        assert_eq!(fired, vec!["a".to_string()]);
        assert!(state.tasks()[0].notified);

        let snapshot = state.tasks().to_vec();
        let revision = state.revision();
        let fired = scheduler.tick(&mut state, at(10, 5, 0));
        assert!(fired.is_empty());
        assert_eq!(state.tasks(), snapshot.as_slice());
        assert_eq!(state.revision(), revision);
    }

    #[test]
    fn test_only_notified_flag_changes() {
        let mut notifier = granted_notifier();
        notifier.expect_notify().returning(|_, _| Ok(()));
        let mut audio = MockAudioSurface::new();
        audio.expect_play_alert().never();

        let mut scheduler = ReminderScheduler::new(Box::new(notifier), Box::new(audio));
        let due = task("due", Some(at(10, 0, 0)));
        let mut state = state_with(vec![due.clone()], false);

        scheduler.tick(&mut state, at(10, 0, 0));

        assert_eq!(
            state.tasks()[0],
            Task {
                notified: true,
                ..due
            }
        );
    }

    #[test]
    fn test_non_matching_tasks_are_untouched() {
        let mut notifier = granted_notifier();
        notifier.expect_notify().never();
        let mut audio = MockAudioSurface::new();
        audio.expect_play_alert().never();

        let mut completed = task("completed", Some(at(9, 0, 0)));
        completed.completed = true;
        let mut notified = task("notified", Some(at(9, 0, 0)));
        notified.notified = true;
        let tasks = vec![
            completed,
            notified,
            task("no reminder", None),
            task("future", Some(at(11, 0, 0))),
        ];

        let mut scheduler = ReminderScheduler::new(Box::new(notifier), Box::new(audio));
        let mut state = state_with(tasks.clone(), true);
        let receiver = state.subscribe();

        let fired = scheduler.tick(&mut state, at(10, 0, 0));

        assert!(fired.is_empty());
        assert_eq!(state.tasks(), tasks.as_slice());
        assert!(!receiver.has_changed().unwrap());
    }

    #[test]
    fn test_tick_is_idempotent() {
        let mut notifier = granted_notifier();
        notifier.expect_notify().times(2).returning(|_, _| Ok(()));
        let mut audio = MockAudioSurface::new();
        audio.expect_play_alert().returning(|| Ok(()));

        let mut scheduler = ReminderScheduler::new(Box::new(notifier), Box::new(audio));
        let mut state = state_with(
            vec![
                task("a", Some(at(9, 30, 0))),
                task("b", Some(at(9, 45, 0))),
                task("c", Some(at(12, 0, 0))),
            ],
            true,
        );

        scheduler.tick(&mut state, at(10, 0, 0));
        let once = state.tasks().to_vec();
        scheduler.tick(&mut state, at(10, 0, 0));
        assert_eq!(state.tasks(), once.as_slice());
    }

    #[test]
    fn test_dispatch_failures_do_not_block_bookkeeping() {
        let mut notifier = granted_notifier();
        notifier
            .expect_notify()
            .times(2)
            .returning(|_, _| Err(anyhow::anyhow!("notification daemon is gone")));
        let mut audio = MockAudioSurface::new();
        audio
            .expect_play_alert()
            .times(2)
            .returning(|| Err(anyhow::anyhow!("no audio device")));

        let mut scheduler = ReminderScheduler::new(Box::new(notifier), Box::new(audio));
        let mut state = state_with(
            vec![task("a", Some(at(9, 0, 0))), task("b", Some(at(9, 0, 0)))],
            true,
        );

        let fired = scheduler.tick(&mut state, at(10, 0, 0));

        assert_eq!(fired.len(), 2);
        assert!(state.tasks().iter().all(|task| task.notified));
    }

    #[test]
    fn test_denied_permission_still_plays_sound() {
        let mut notifier = MockNotificationSurface::new();
        notifier
            .expect_permission()
            .returning(|| Permission::Denied);
        notifier.expect_request_permission().never();
        notifier.expect_notify().never();
        let mut audio = MockAudioSurface::new();
        audio.expect_play_alert().times(1).returning(|| Ok(()));

        let mut scheduler = ReminderScheduler::new(Box::new(notifier), Box::new(audio));
        assert_eq!(scheduler.activate(), Permission::Denied);

        let mut state = state_with(vec![task("a", Some(at(9, 0, 0)))], true);
        scheduler.tick(&mut state, at(10, 0, 0));
        assert!(state.tasks()[0].notified);
    }

    #[test]
    fn test_activation_requests_undecided_permission_once() {
        let mut notifier = MockNotificationSurface::new();
        notifier
            .expect_permission()
            .returning(|| Permission::Default);
        notifier
            .expect_request_permission()
            .times(1)
            .returning(|| Permission::Granted);
        let audio = MockAudioSurface::new();

        let mut scheduler = ReminderScheduler::new(Box::new(notifier), Box::new(audio));
        assert_eq!(scheduler.activate(), Permission::Granted);
        scheduler.activate();
    }

    #[test]
    fn test_snooze_rearms_reminder() -> Result<()> {
        let mut fired = task("a", Some(at(9, 0, 0)));
        fired.notified = true;
        let mut state = state_with(vec![fired, task("b", None)], true);

        let reminder = snooze(&mut state, "a", Some(15), at(10, 0, 0))?;

        assert_eq!(reminder, at(10, 15, 0));
        assert_eq!(state.tasks()[0].reminder_time, Some(at(10, 15, 0)));
        assert!(!state.tasks()[0].notified);
        assert_eq!(state.tasks()[1], task("b", None));
        Ok(())
    }

    #[test]
    fn test_snooze_uses_configured_duration() -> Result<()> {
        let mut state = state_with(vec![task("a", Some(at(9, 0, 0)))], true);

        let reminder = snooze(&mut state, "a", None, at(10, 0, 0))?;

        assert_eq!(reminder, at(10, 5, 0));
        assert!(!state.tasks()[0].notified);
        Ok(())
    }

    #[test]
    fn test_snooze_unknown_task() {
        let mut state = state_with(vec![], true);
        assert!(snooze(&mut state, "missing", Some(1), at(10, 0, 0)).is_err());
        assert!(!state.is_dirty());
    }

    #[derive(Clone)]
    struct TestClock {
        start_time: DateTime<Utc>,
        reference: Instant,
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_fires_and_stops() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryPersistence::new();
        save_app_data(
            &store,
            &AppData {
                tasks: vec![
                    task("soon", Some(at(10, 0, 15))),
                    task("later", Some(at(11, 0, 0))),
                ],
                ..AppData::default()
            },
        )
        .await?;

        let mut notifier = MockNotificationSurface::new();
        notifier
            .expect_permission()
            .returning(|| Permission::Granted);
        notifier
            .expect_notify()
            .with(eq(NOTIFICATION_TITLE), eq("Task soon"))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut audio = MockAudioSurface::new();
        audio.expect_play_alert().times(1).returning(|| Ok(()));

        let shutdown = CancellationToken::new();
        let reminder_loop = ReminderLoop::new(
            ReminderScheduler::new(Box::new(notifier), Box::new(audio)),
            &store,
            Box::new(TestClock {
                start_time: at(10, 0, 0),
                reference: Instant::now(),
            }),
            Duration::from_secs(10),
            shutdown.clone(),
        );

        let (result, _) = tokio::join!(reminder_loop.run(), async {
            tokio::time::sleep(Duration::from_secs(35)).await;
            shutdown.cancel();
        });
        result?;

        let data = load_app_data(&store).await;
        assert!(data.tasks[0].notified);
        assert!(!data.tasks[1].notified);
        Ok(())
    }

    #[tokio::test]
    async fn test_loop_stops_while_store_is_locked() -> Result<()> {
        let dir = tempdir()?;
        let holder = FilePersistence::new(dir.path().to_path_buf())?;
        let store = FilePersistence::new(dir.path().to_path_buf())?;
        save_app_data(
            &store,
            &AppData {
                tasks: vec![task("due", Some(at(9, 0, 0)))],
                ..AppData::default()
            },
        )
        .await?;
        let held = holder.lock().await?;

        let mut notifier = MockNotificationSurface::new();
        notifier
            .expect_permission()
            .returning(|| Permission::Granted);
        notifier.expect_notify().never();

        let shutdown = CancellationToken::new();
        let reminder_loop = ReminderLoop::new(
            ReminderScheduler::new(Box::new(notifier), Box::new(MockAudioSurface::new())),
            &store,
            Box::new(TestClock {
                start_time: at(10, 0, 0),
                reference: Instant::now(),
            }),
            Duration::from_secs(10),
            shutdown.clone(),
        );

        let started = Instant::now();
        let (result, _) = tokio::time::timeout(Duration::from_secs(2), async {
            tokio::join!(reminder_loop.run(), async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                shutdown.cancel();
            })
        })
        .await?;
        result?;
        assert!(started.elapsed() < Duration::from_secs(1));

        held.release().await?;
        let data = load_app_data(&store).await;
        assert!(!data.tasks[0].notified);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_loop_does_not_tick() -> Result<()> {
        let store = MemoryPersistence::new();
        let mut notifier = MockNotificationSurface::new();
        notifier
            .expect_permission()
            .returning(|| Permission::Granted);
        notifier.expect_notify().never();

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        ReminderLoop::new(
            ReminderScheduler::new(Box::new(notifier), Box::new(MockAudioSurface::new())),
            &store,
            Box::new(TestClock {
                start_time: at(10, 0, 0),
                reference: Instant::now(),
            }),
            Duration::from_secs(10),
            shutdown,
        )
        .run()
        .await?;

        let tasks: Vec<Task> = load(&store, Bucket::Tasks).await;
        assert!(tasks.is_empty());
        assert!(!store.contains(Bucket::Tasks));
        Ok(())
    }
}
