//! Error taxonomy shared by every layer of the queue.
//!
//! Low-level KVS failures bubble up through `Error::Store` and abort the
//! enclosing transaction automatically (heed drops an uncommitted `RwTxn` on
//! unwind). Higher layers never swallow an error; `front`/`receive` return a
//! typed `None` for "no message" rather than an error, unless the caller
//! opted into strict mode (see `pubsub::Subscriber::strict`).

/// Unified error type for every public operation in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration file was missing a required field, or a queue
    /// directory's `queue_db` lacks a parameter record it needs.
    #[error("configuration error: {0}")]
    Config(String),

    /// The KVS reported a failure: map-full, or a transaction conflict.
    #[error("store error: {0}")]
    Store(#[from] heed::Error),

    /// A filesystem operation outside the KVS itself failed (creating the
    /// queue directory before `heed` ever opens it).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `queue_db` exists but is missing one or more of the five required
    /// parameter records.
    #[error("queue at {0} is not initialized")]
    NotInitialized(String),

    /// `queue_db.strategy` is neither `prune_first` nor `prune_last`.
    #[error("unknown pruning strategy: {0:?}")]
    UnknownStrategy(String),

    /// A second `Environment` was requested for a queue directory that
    /// already has a live handle in this process.
    #[error("an Environment for {0} is already open in this process")]
    EnvironmentConflict(String),

    /// A strict-mode subscriber called `front`/`receive` on an empty
    /// per-subscriber sub-database.
    #[error("no message available for subscriber {0:?}")]
    Empty(String),
}

impl Error {
    /// True if this error is the KVS reporting that its map is full.
    ///
    /// Callers can use this to distinguish a capacity problem (respond by
    /// enlarging `max_db_size_bytes`) from any other store failure.
    pub fn is_map_full(&self) -> bool {
        matches!(
            self,
            Error::Store(heed::Error::Mdb(heed::MdbError::MapFull))
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
