use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid cron expression '{expression}': {message}")]
    Cron { expression: String, message: String },

    #[error("trigger not found: {id}")]
    TriggerNotFound { id: String },

    #[error("job not found: {id}")]
    JobNotFound { id: String },

    #[error("invalid record {id}: {message}")]
    InvalidRecord { id: String, message: String },

    #[error("checkout of {url} failed: {message}")]
    Checkout { url: String, message: String },

    #[error("no entry point named {name} found in {folder:?}")]
    EntryPointNotFound { name: String, folder: PathBuf },

    #[error("invalid process path {path:?}: {message}")]
    InvalidProcessPath { path: PathBuf, message: String },

    #[error("command channel is closed: {command}")]
    ChannelClosed { command: String },

    #[error("unable to start {runtime} for {path:?}: {source}")]
    Spawn {
        runtime: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
