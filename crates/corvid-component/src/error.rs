use corvid_acl::AclError;
use corvid_command::CommandError;
use corvid_core::JidError;
use thiserror::Error;

pub type ComponentResult<T> = Result<T, ComponentError>;

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("component name must not be empty")]
    EmptyName,

    #[error("component identity cannot change from {from} to {to}")]
    IdentityChange { from: String, to: String },

    #[error("invalid address: {0}")]
    Jid(#[from] JidError),

    #[error("invalid access policy: {0}")]
    Acl(#[from] AclError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("statistics: {0}")]
    StatsLevel(String),

    #[error("failed to read stored command definitions: {0}")]
    Definitions(String),
}
