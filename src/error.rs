use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("game not found: {0}")]
    NotFound(String),

    #[error("{0} is managed by the storefront and cannot be moved manually")]
    NotLocal(String),

    #[error("{0} has no install location on record")]
    NotInstalled(String),

    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("failed to move {} to {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("library database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt library row: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("{0} is already running")]
    AlreadyRunning(String),

    #[error("another game is still launching: {0}")]
    Busy(String),

    #[error("failed to launch {title}: {source:#}")]
    Runtime {
        title: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
