//! Built-in lifecycle commands: install and remove commands at runtime.

use std::sync::Arc;

use corvid_core::{
    CommandDefinition, CommandPacket, CommandStatus, DefinitionStore, Field, OutboundPacket,
};
use tracing::info;

use crate::command::{BoxFuture, Command, CommandContext};
use crate::source::CommandSource;

pub const ADD_SCRIPT_CMD: &str = "add-script";
pub const DEL_SCRIPT_CMD: &str = "del-script";

const SCRIPTS_GROUP: &str = "Scripts";

const FIELD_ID: &str = "command-id";
const FIELD_DESCRIPTION: &str = "description";
const FIELD_GROUP: &str = "group";
const FIELD_LANGUAGE: &str = "language";
const FIELD_SCRIPT: &str = "script";
const FIELD_NOTE: &str = "note";

pub fn is_builtin(id: &str) -> bool {
    id == ADD_SCRIPT_CMD || id == DEL_SCRIPT_CMD
}

/// Echo submitted values back into a form so the requester can complete it.
fn form_field(request: &CommandPacket, var: &str, label: &str) -> Field {
    Field {
        var: var.to_string(),
        label: Some(label.to_string()),
        values: request.field_values(var).to_vec(),
    }
}

fn note(request: &CommandPacket, text: String) -> Vec<OutboundPacket> {
    vec![request.result(CommandStatus::Completed, vec![Field::text(FIELD_NOTE, text)])]
}

/// `add-script`: compile a definition, persist it, then install it.
pub struct AddScriptCommand {
    compiler: Option<Arc<dyn CommandSource>>,
    store: Option<Arc<dyn DefinitionStore>>,
}

impl AddScriptCommand {
    pub fn new(
        compiler: Option<Arc<dyn CommandSource>>,
        store: Option<Arc<dyn DefinitionStore>>,
    ) -> Self {
        Self { compiler, store }
    }

    fn form(request: &CommandPacket) -> Vec<OutboundPacket> {
        vec![request.result(
            CommandStatus::Executing,
            vec![
                form_field(request, FIELD_ID, "Script command ID"),
                form_field(request, FIELD_DESCRIPTION, "Description"),
                form_field(request, FIELD_GROUP, "Group"),
                form_field(request, FIELD_LANGUAGE, "Script language"),
                form_field(request, FIELD_SCRIPT, "Script text"),
            ],
        )]
    }
}

impl Command for AddScriptCommand {
    fn id(&self) -> &str {
        ADD_SCRIPT_CMD
    }

    fn description(&self) -> &str {
        "New command script"
    }

    fn group(&self) -> Option<&str> {
        Some(SCRIPTS_GROUP)
    }

    fn execute<'a>(
        &'a self,
        request: &'a CommandPacket,
        ctx: &'a CommandContext,
    ) -> BoxFuture<'a, anyhow::Result<Vec<OutboundPacket>>> {
        Box::pin(async move {
            let (Some(id), Some(script)) = (request.field(FIELD_ID), request.field(FIELD_SCRIPT))
            else {
                return Ok(Self::form(request));
            };

            if is_builtin(id) {
                return Ok(note(request, format!("Command {id} is built in and cannot be replaced.")));
            }
            let Some(compiler) = &self.compiler else {
                return Ok(note(request, "No command source can compile scripts.".to_string()));
            };

            let definition = CommandDefinition {
                id: id.to_string(),
                description: request.field(FIELD_DESCRIPTION).unwrap_or(id).to_string(),
                group: request.field(FIELD_GROUP).map(str::to_string),
                language: request.field(FIELD_LANGUAGE).unwrap_or_default().to_string(),
                body: script.to_string(),
            };
            let command = match compiler.compile(&definition) {
                Ok(command) => command,
                Err(err) => {
                    return Ok(note(request, format!("Script compilation failed: {err:#}")));
                }
            };

            let _updates = ctx.registry().lock_updates();
            if let Some(store) = &self.store {
                store.save(ctx.component(), &definition)?;
            }
            if let Err(err) = ctx.registry().install(command) {
                if let Some(store) = &self.store {
                    store.remove(ctx.component(), id)?;
                }
                return Err(err.into());
            }
            info!(component = ctx.component(), command = id, from = %request.from, "command installed");
            Ok(note(request, format!("Command {id} installed.")))
        })
    }
}

/// `del-script`: remove an installed command.
pub struct DelScriptCommand {
    store: Option<Arc<dyn DefinitionStore>>,
}

impl DelScriptCommand {
    pub fn new(store: Option<Arc<dyn DefinitionStore>>) -> Self {
        Self { store }
    }
}

impl Command for DelScriptCommand {
    fn id(&self) -> &str {
        DEL_SCRIPT_CMD
    }

    fn description(&self) -> &str {
        "Remove command script"
    }

    fn group(&self) -> Option<&str> {
        Some(SCRIPTS_GROUP)
    }

    fn execute<'a>(
        &'a self,
        request: &'a CommandPacket,
        ctx: &'a CommandContext,
    ) -> BoxFuture<'a, anyhow::Result<Vec<OutboundPacket>>> {
        Box::pin(async move {
            let Some(id) = request.field(FIELD_ID) else {
                return Ok(vec![request.result(
                    CommandStatus::Executing,
                    vec![form_field(request, FIELD_ID, "Script command ID")],
                )]);
            };

            if is_builtin(id) {
                return Ok(note(request, format!("Command {id} is built in and cannot be removed.")));
            }

            let _updates = ctx.registry().lock_updates();
            let stored = match &self.store {
                Some(store) => store.remove(ctx.component(), id)?,
                None => false,
            };
            let removed = ctx.registry().remove(id).is_some();
            if !removed && !stored {
                return Ok(note(request, format!("Command {id} not found.")));
            }
            info!(component = ctx.component(), command = id, from = %request.from, "command removed");
            Ok(note(request, format!("Command {id} removed.")))
        })
    }
}
