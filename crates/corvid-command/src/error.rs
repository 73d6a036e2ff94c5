use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command id must not be empty")]
    EmptyId,

    #[error("duplicate command id: {0}")]
    Duplicate(String),

    #[error("command not found: {0}")]
    NotFound(String),

    #[error("built-in command cannot be replaced or removed: {0}")]
    BuiltIn(String),

    #[error("no command source is configured")]
    NoSource,

    #[error("failed to load commands from source {source_name}: {reason}")]
    Load { source_name: String, reason: String },

    #[error("failed to compile command {id}: {reason}")]
    Compile { id: String, reason: String },
}

pub type CommandResult<T> = Result<T, CommandError>;
