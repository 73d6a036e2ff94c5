//! redb table definitions. `&str` keys, JSON `&[u8]` values.

use redb::TableDefinition;

/// Component configurations keyed by component name.
pub const COMPONENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("components");

/// Installed command definitions keyed by `{component}/{command_id}`.
pub const DEFINITIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("definitions");
