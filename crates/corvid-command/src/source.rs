//! Command sources: where commands beyond the built-ins come from.

use std::sync::Arc;

use corvid_core::{CommandDefinition, CommandPacket, CommandStatus, Field, OutboundPacket};

use crate::command::{BoxFuture, Command, CommandContext};

/// Supplies ready-made commands to a component.
pub trait CommandSource: Send + Sync {
    fn name(&self) -> &str;

    /// Commands available at startup for `component`.
    fn load(&self, component: &str) -> anyhow::Result<Vec<Arc<dyn Command>>>;

    /// Build a command from a definition installed at runtime.
    fn compile(&self, definition: &CommandDefinition) -> anyhow::Result<Arc<dyn Command>> {
        anyhow::bail!(
            "command source {} cannot compile {} definitions (command {})",
            self.name(),
            definition.language,
            definition.id
        )
    }
}

/// A fixed list of commands built in code.
pub struct StaticCommandSource {
    name: String,
    commands: Vec<Arc<dyn Command>>,
}

impl StaticCommandSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
        }
    }

    pub fn with_command(mut self, command: Arc<dyn Command>) -> Self {
        self.commands.push(command);
        self
    }
}

impl CommandSource for StaticCommandSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, _component: &str) -> anyhow::Result<Vec<Arc<dyn Command>>> {
        Ok(self.commands.clone())
    }
}

/// Compiles `text` definitions into commands that answer with their body.
///
/// Useful for canned responses (MOTD, help texts) installed through
/// `add-script` without any script engine.
#[derive(Debug, Default)]
pub struct TextCommandSource;

impl TextCommandSource {
    pub const LANGUAGE: &'static str = "text";
}

impl CommandSource for TextCommandSource {
    fn name(&self) -> &str {
        "text"
    }

    fn load(&self, _component: &str) -> anyhow::Result<Vec<Arc<dyn Command>>> {
        Ok(Vec::new())
    }

    fn compile(&self, definition: &CommandDefinition) -> anyhow::Result<Arc<dyn Command>> {
        let language = definition.language.trim();
        if !language.is_empty() && !language.eq_ignore_ascii_case(Self::LANGUAGE) {
            anyhow::bail!(
                "unsupported language {language} for command {}",
                definition.id
            );
        }
        Ok(Arc::new(TextCommand {
            definition: definition.clone(),
        }))
    }
}

struct TextCommand {
    definition: CommandDefinition,
}

impl Command for TextCommand {
    fn id(&self) -> &str {
        &self.definition.id
    }

    fn description(&self) -> &str {
        &self.definition.description
    }

    fn group(&self) -> Option<&str> {
        self.definition.group.as_deref()
    }

    fn admin_only(&self) -> bool {
        false
    }

    fn execute<'a>(
        &'a self,
        request: &'a CommandPacket,
        _ctx: &'a CommandContext,
    ) -> BoxFuture<'a, anyhow::Result<Vec<OutboundPacket>>> {
        Box::pin(async move {
            Ok(vec![request.result(
                CommandStatus::Completed,
                vec![Field::text("text", self.definition.body.clone())],
            )])
        })
    }
}
