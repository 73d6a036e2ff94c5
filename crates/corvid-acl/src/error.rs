//! Error types for ACL and policy configuration.

use corvid_core::JidError;
use thiserror::Error;

/// Result type alias for ACL configuration.
pub type AclResult<T> = Result<T, AclError>;

/// Configuration faults, reported when a policy is loaded.
#[derive(Debug, Error)]
pub enum AclError {
    #[error("empty ACL entry for `{key}`")]
    EmptyEntry { key: String },

    #[error("ACL entry `{entry}` for `{key}` lists no values")]
    EmptyValues { key: String, entry: String },

    #[error("invalid JID in ACL entry `{entry}` for `{key}`: {source}")]
    InvalidJid {
        key: String,
        entry: String,
        #[source]
        source: JidError,
    },

    #[error("invalid domain `{domain}` in ACL entry for `{key}`")]
    InvalidDomain { key: String, domain: String },

    #[error("invalid admin JID `{entry}`: {source}")]
    InvalidAdmin {
        entry: String,
        #[source]
        source: JidError,
    },

    #[error("empty command id in ACL")]
    EmptyCommandId,
}
