use thiserror::Error;

/// Error kinds surfaced across the reconciliation engine (§7).
///
/// Each variant maps onto one of the error kinds in the specification.
/// Parsing failures from lower layers (YAML, regex, I/O) are carried
/// through with `#[from]` so callers can keep using `?`.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("configuration invalid at {path}: {message}")]
    ConfigInvalid { path: String, message: String },

    #[error("{0} is not a btrfs subvolume")]
    NotASubvolume(String),

    #[error("snapshot directory for {0} is not initialised")]
    NotInitialised(String),

    #[error("snapshot directory for {0} is already initialised")]
    AlreadyInitialised(String),

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("command `{command}` failed with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("command `{command}` was terminated by a signal")]
    CommandSignaled { command: String },

    #[error("backup target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("bootloader reference entry invalid: {0}")]
    TemplateInvalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, ManagerError>;
