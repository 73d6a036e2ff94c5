//! corvid-acl: who may call a component's ad-hoc commands.
//!
//! # Components
//!
//! - **`rule`**: `AclRule`, ordered `AclRuleSet`, and `CommandsAcl` keyed by command id
//! - **`policy`**: `AccessPolicy`: admins plus command ACL, published as one snapshot
//! - **`evaluator`**: `AclEvaluator`, the pure authorization algorithm
//! - **`access`**: `AccessControl`, live policy + trust + vhost resolver
//! - **`vhost`**: `VHostResolver` collaborator for `LOCAL` rules

pub mod access;
pub mod error;
pub mod evaluator;
pub mod policy;
pub mod rule;
pub mod vhost;

pub use access::AccessControl;
pub use error::{AclError, AclResult};
pub use evaluator::{AclEvaluator, RuleOutcome};
pub use policy::AccessPolicy;
pub use rule::{ALL_COMMANDS_KEY, AclRule, AclRuleSet, CommandsAcl};
pub use vhost::{StaticVHosts, VHostResolver};
