use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    /// The backend could not complete a call.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend has nothing newer than what the caller already holds.
    #[error("backend reported no new data")]
    NotModified,

    #[error("failed to cache tag pair {random}: {source}")]
    CacheWriteFailed {
        random: String,
        #[source]
        source: Box<Error>,
    },

    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("cache directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}
