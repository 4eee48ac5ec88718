use crate::template::TemplateRegistry;

pub const MANUAL_COMMAND_ID: &str = "create-manual";
const DYNAMIC_PREFIX: &str = "create-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub id: String,
    pub label: String,
}

/// What running a command id amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTarget {
    Manual,
    Template(String),
}

/// One generated command per listable template, then the static manual one.
pub fn command_table(registry: &mut TemplateRegistry) -> Vec<CommandEntry> {
    let mut commands: Vec<CommandEntry> = registry
        .list()
        .map(|(key, _)| CommandEntry {
            id: format!("{DYNAMIC_PREFIX}{key}"),
            label: format!("Create {key} File (Dynamic)"),
        })
        .collect();

    commands.push(CommandEntry {
        id: MANUAL_COMMAND_ID.to_string(),
        label: "Create File (Manual)".to_string(),
    });
    commands
}

pub fn parse_command_id(id: &str) -> Option<CommandTarget> {
    if id == MANUAL_COMMAND_ID {
        return Some(CommandTarget::Manual);
    }

    id.strip_prefix(DYNAMIC_PREFIX)
        .filter(|key| !key.is_empty())
        .map(|key| CommandTarget::Template(key.to_string()))
}
