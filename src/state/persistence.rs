use std::{
    collections::HashMap,
    fmt::Display,
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, warn};

use super::entities::AppData;

/// Logical partition of persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Tasks,
    Transactions,
    Profile,
    Settings,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Tasks,
        Bucket::Transactions,
        Bucket::Profile,
        Bucket::Settings,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Bucket::Tasks => "df_tasks",
            Bucket::Transactions => "df_transactions",
            Bucket::Profile => "df_profile",
            Bucket::Settings => "df_settings",
        }
    }

    fn file_name(self) -> String {
        format!("{}.json", self.key())
    }
}

impl Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bucket::Tasks => write!(f, "tasks"),
            Bucket::Transactions => write!(f, "transactions"),
            Bucket::Profile => write!(f, "profile"),
            Bucket::Settings => write!(f, "settings"),
        }
    }
}

/// Key-value store for serialized buckets. Values survive process restarts.
pub trait PersistenceGateway {
    /// Guard serializing read-modify-write cycles between processes sharing the store.
    type Lock;

    /// Raw stored value, `None` if nothing was saved yet.
    fn read(&self, bucket: Bucket) -> impl Future<Output = Result<Option<String>>>;

    fn write(&self, bucket: Bucket, contents: String) -> impl Future<Output = Result<()>>;

    /// Wipes every bucket.
    fn clear(&self) -> impl Future<Output = Result<()>>;

    /// Held for the duration of a load, mutate, save cycle. Dropping the guard releases it.
    /// Waiting for a contended lock never blocks the executor, so the future can be dropped to
    /// give up.
    fn lock(&self) -> impl Future<Output = Result<Self::Lock>>;
}

impl<T: Deref> PersistenceGateway for T
where
    T::Target: PersistenceGateway,
{
    type Lock = <T::Target as PersistenceGateway>::Lock;

    fn read(&self, bucket: Bucket) -> impl Future<Output = Result<Option<String>>> {
        self.deref().read(bucket)
    }

    fn write(&self, bucket: Bucket, contents: String) -> impl Future<Output = Result<()>> {
        self.deref().write(bucket, contents)
    }

    fn clear(&self) -> impl Future<Output = Result<()>> {
        self.deref().clear()
    }

    fn lock(&self) -> impl Future<Output = Result<Self::Lock>> {
        self.deref().lock()
    }
}

/// Previously stored value for the bucket. Absent, unreadable or corrupt values fall back to the
/// default, so a damaged file never prevents the application from starting.
pub async fn load<T, G>(gateway: &G, bucket: Bucket) -> T
where
    T: DeserializeOwned + Default,
    G: PersistenceGateway,
{
    match gateway.read(bucket).await {
        Ok(Some(contents)) => match serde_json::from_str::<T>(&contents) {
            Ok(value) => value,
            Err(e) => {
                warn!("Bucket {bucket} holds invalid data, using defaults: {e}");
                T::default()
            }
        },
        Ok(None) => {
            debug!("Bucket {bucket} is empty");
            T::default()
        }
        Err(e) => {
            warn!("Failed to read bucket {bucket}, using defaults: {e:?}");
            T::default()
        }
    }
}

pub async fn save<T, G>(gateway: &G, bucket: Bucket, value: &T) -> Result<()>
where
    T: Serialize,
    G: PersistenceGateway,
{
    let contents = serde_json::to_string(value)?;
    gateway.write(bucket, contents).await
}

pub async fn load_app_data(gateway: &impl PersistenceGateway) -> AppData {
    AppData {
        tasks: load(gateway, Bucket::Tasks).await,
        transactions: load(gateway, Bucket::Transactions).await,
        profile: load(gateway, Bucket::Profile).await,
        settings: load(gateway, Bucket::Settings).await,
    }
}

pub async fn save_app_data(gateway: &impl PersistenceGateway, data: &AppData) -> Result<()> {
    save(gateway, Bucket::Tasks, &data.tasks).await?;
    save(gateway, Bucket::Transactions, &data.transactions).await?;
    save(gateway, Bucket::Profile, &data.profile).await?;
    save(gateway, Bucket::Settings, &data.settings).await?;
    Ok(())
}

const LOCK_FILE: &str = ".lock";

/// Pause between attempts to take a contended store lock.
const LOCK_RETRY: Duration = Duration::from_millis(50);

/// Stores every bucket as a json file inside a directory.
///
/// Writes go to a temporary file that is renamed over the previous value, so a reader never
/// observes a half written bucket.
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn bucket_path(&self, bucket: Bucket) -> PathBuf {
        self.dir.join(bucket.file_name())
    }
}

/// Exclusive lock over the data directory. The lock lives as long as the file handle.
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    pub async fn release(self) -> Result<()> {
        self.file.unlock_async().await?;
        Ok(())
    }
}

impl PersistenceGateway for FilePersistence {
    type Lock = StoreLock;

    async fn read(&self, bucket: Bucket) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.bucket_path(bucket)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, bucket: Bucket, contents: String) -> Result<()> {
        let path = self.bucket_path(bucket);
        let temp_path = self.dir.join(format!(".{}.tmp", bucket.file_name()));

        let mut file = File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &path).await?;
        debug!("Saved bucket {bucket} into {path:?}");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        for bucket in Bucket::ALL {
            match tokio::fs::remove_file(self.bucket_path(bucket)).await {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn lock(&self) -> Result<StoreLock> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))
            .await?;
        let contended = fs4::lock_contended_error().raw_os_error();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(StoreLock { file }),
                Err(e) if e.raw_os_error() == contended => {
                    debug!("Store is locked by another process, waiting");
                    tokio::time::sleep(LOCK_RETRY).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Process local store, used by tests and as a scratch store.
#[derive(Default)]
pub struct MemoryPersistence {
    values: Mutex<HashMap<Bucket, String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, bucket: Bucket) -> bool {
        self.values
            .lock()
            .map(|values| values.contains_key(&bucket))
            .unwrap_or(false)
    }
}

impl PersistenceGateway for MemoryPersistence {
    type Lock = ();

    async fn read(&self, bucket: Bucket) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store is poisoned"))?;
        Ok(values.get(&bucket).cloned())
    }

    async fn write(&self, bucket: Bucket, contents: String) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store is poisoned"))?;
        values.insert(bucket, contents);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store is poisoned"))?;
        values.clear();
        Ok(())
    }

    async fn lock(&self) -> Result<()> {
        Ok(())
    }
}
