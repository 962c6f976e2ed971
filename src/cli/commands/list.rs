//! List command implementation.
//!
//! The `preflight list` command shows declared prerequisites without
//! running anything.

use async_trait::async_trait;
use serde::Serialize;

use crate::cli::args::ListArgs;
use crate::config::{ConfigSource, PreflightConfig, PrerequisiteDefinition};
use crate::error::Result;
use crate::ui::{Table, UserInterface};

use super::dispatcher::{Command, CommandResult};

/// The list command implementation.
pub struct ListCommand {
    config: PreflightConfig,
    source: ConfigSource,
    args: ListArgs,
}

#[derive(Debug, Serialize)]
struct ListEntry<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    per_version: bool,
    optional: bool,
    installable: bool,
    plugins: Vec<&'a str>,
}

impl<'a> From<&'a PrerequisiteDefinition> for ListEntry<'a> {
    fn from(def: &'a PrerequisiteDefinition) -> Self {
        Self {
            id: &def.id,
            name: &def.name,
            description: def.description.as_deref(),
            per_version: def.per_version,
            optional: def.optional,
            installable: def.can_install(),
            plugins: def.plugins.iter().map(|p| p.id.as_str()).collect(),
        }
    }
}

impl ListCommand {
    pub fn new(config: PreflightConfig, source: ConfigSource, args: ListArgs) -> Self {
        Self {
            config,
            source,
            args,
        }
    }

    fn flags(def: &PrerequisiteDefinition) -> String {
        let mut flags = Vec::new();
        if def.per_version {
            flags.push("per-version");
        }
        if def.optional {
            flags.push("optional");
        }
        if def.can_install() {
            flags.push("installable");
        }
        flags.join(", ")
    }
}

#[async_trait(?Send)]
impl Command for ListCommand {
    async fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let prerequisites = &self.config.prerequisites;

        if self.args.json {
            let entries: Vec<ListEntry> = prerequisites.iter().map(ListEntry::from).collect();
            let json = serde_json::to_string_pretty(&entries).map_err(anyhow::Error::from)?;
            ui.message(&json);
            return Ok(CommandResult::success());
        }

        ui.show_header(&format!("Prerequisites ({})", self.source));

        if prerequisites.is_empty() {
            ui.message("No prerequisites declared");
            return Ok(CommandResult::success());
        }

        let mut table = Table::new(&["ID", "Name", "Flags", "Plugins"]);
        for def in prerequisites {
            let plugins: Vec<&str> = def.plugins.iter().map(|p| p.id.as_str()).collect();
            table.add_row(&[
                def.id.clone(),
                def.name.clone(),
                Self::flags(def),
                plugins.join(", "),
            ]);
        }
        ui.message(&table.render());

        let required = &self.config.runtime.required_versions;
        if !required.is_empty() {
            ui.message("");
            ui.message(&format!(
                "Per-version checks target {} {}",
                self.config.runtime.manager,
                required.join(", ")
            ));
        }

        Ok(CommandResult::success())
    }
}
