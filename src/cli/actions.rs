//! Action catalog listing.

use crate::cli::common::{print_json, CliError, CliResult};
use crate::dispatch::catalog::ActionEntry;
use crate::dispatch::{ActionCatalog, CustomCommand};
use crate::models::ActionCategory;
use clap::Args;
use serde::Serialize;

/// List known actions
#[derive(Args, Debug)]
pub struct ActionsArgs {
    /// Only show this category
    #[arg(long, short)]
    category: Option<String>,

    /// Case-insensitive filter on name, alias or description
    #[arg(long, short)]
    search: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize, Debug)]
struct ActionOutput<'a> {
    id: &'a str,
    category: ActionCategory,
    description: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    aliases: &'a [String],
}

impl ActionsArgs {
    /// Execute actions command
    pub fn execute(&self) -> CliResult<()> {
        let category = self
            .category
            .as_deref()
            .map(|name| {
                ActionCategory::parse(name)
                    .ok_or_else(|| CliError::validation(format!("Unknown category '{name}'")))
            })
            .transpose()?;

        let entries: Vec<&ActionEntry> = ActionCatalog::builtin()
            .entries()
            .iter()
            .filter(|entry| category.map_or(true, |c| entry.category == c))
            .filter(|entry| self.matches(entry))
            .collect();

        if self.json {
            let output: Vec<ActionOutput<'_>> = entries
                .iter()
                .map(|entry| ActionOutput {
                    id: &entry.id,
                    category: entry.category,
                    description: &entry.description,
                    aliases: &entry.aliases,
                })
                .collect();
            return print_json(&output);
        }

        for group in ActionCategory::EXECUTABLE {
            let in_group: Vec<_> = entries.iter().filter(|e| e.category == group).collect();
            let show_custom = group == ActionCategory::CustomCommand
                && category.map_or(self.search.is_none(), |c| c == group);
            if in_group.is_empty() && !show_custom {
                continue;
            }
            println!("{} ({}):", group.display_name(), group.id());
            for entry in in_group {
                if entry.description.is_empty() {
                    println!("  {}", entry.id);
                } else {
                    println!("  {:<32} {}", entry.id, entry.description);
                }
            }
            if show_custom {
                println!("  Prefixes: {}", CustomCommand::PREFIXES.join(" "));
            }
            println!();
        }
        Ok(())
    }

    fn matches(&self, entry: &ActionEntry) -> bool {
        let Some(search) = &self.search else {
            return true;
        };
        let needle = search.to_lowercase();
        entry.id.to_lowercase().contains(&needle)
            || entry.description.to_lowercase().contains(&needle)
            || entry
                .aliases
                .iter()
                .any(|alias| alias.to_lowercase().contains(&needle))
    }
}
