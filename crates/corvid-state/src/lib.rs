//! corvid-state: persistent configuration for Corvid components.
//!
//! Backed by [redb](https://docs.rs/redb). Component configurations and
//! command definitions installed at runtime are JSON-serialized into
//! `&[u8]` value columns. Definition keys are `{component}/{command_id}`,
//! so one component's definitions are found by prefix scan.
//!
//! `ConfigStore` is `Clone + Send + Sync` (an `Arc<Database>`) and
//! implements `corvid_core::DefinitionStore`.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::ConfigStore;
