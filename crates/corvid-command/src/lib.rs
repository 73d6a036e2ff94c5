//! corvid-command: ad-hoc commands exposed by a component.
//!
//! ```text
//!  CommandPacket ──▶ Dispatcher ──▶ AccessControl (admins, trust, ACL)
//!                        │
//!                        ▼
//!                  CommandRegistry ──▶ Arc<dyn Command>::execute(ctx)
//!                        ▲
//!        CommandSource ──┘ (load at startup, compile at runtime)
//! ```
//!
//! - **`command`**: the `Command` trait and its `CommandContext`
//! - **`registry`**: id → command map, insertion ordered
//! - **`dispatch`**: per-packet state machine producing responses
//! - **`builtin`**: `add-script` and `del-script`
//! - **`source`**: external suppliers of commands
//! - **`stats`**: statistics records and providers

pub mod builtin;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod source;
pub mod stats;

pub use builtin::{ADD_SCRIPT_CMD, AddScriptCommand, DEL_SCRIPT_CMD, DelScriptCommand, is_builtin};
pub use command::{Bindings, BoxFuture, Command, CommandContext};
pub use dispatch::{CANCEL_NOTE, Dispatch, Dispatcher, FORBIDDEN_REASON};
pub use error::{CommandError, CommandResult};
pub use registry::CommandRegistry;
pub use source::{CommandSource, StaticCommandSource, TextCommandSource};
pub use stats::{StatLevel, StatRecord, StatValue, StatisticsList, StatisticsProvider};
