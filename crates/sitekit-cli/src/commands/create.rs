//! `sitekit create <name>` — scaffold a plugin directory with its entry point.

use std::path::Path;

use clap::Args;

use sitekit_core::config::AppConfig;
use sitekit_core::error::AppError;
use sitekit_plugin::loader::{PluginLoader, PluginManifest};

use crate::output;

/// Arguments for the create command
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Plugin name, used as the directory name
    pub name: String,

    /// Catalog factory the plugin is built with (defaults to the name)
    #[arg(long)]
    pub factory: Option<String>,

    /// Short description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Author
    #[arg(short, long)]
    pub author: Option<String>,

    /// Skip prompts and confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute the create command
pub async fn execute(args: &CreateArgs, config: &AppConfig) -> Result<(), AppError> {
    let factory = resolve(args.factory.as_deref(), &args.name, "Factory", args.yes)?;
    let description = resolve(
        args.description.as_deref(),
        &format!("The {} plugin", args.name),
        "Description",
        args.yes,
    )?;
    let author = resolve(args.author.as_deref(), "", "Author", args.yes)?;

    let directory = Path::new(&config.plugins.directory);
    if !args.yes {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Create plugin '{}' in {}?",
                args.name,
                directory.display()
            ))
            .default(true)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let manifest = PluginManifest::template(&factory, &description, &author);
    let loader = PluginLoader::new(&config.plugins.entry_point);
    let path = loader.scaffold(directory, &args.name, &manifest).await?;

    output::print_success(&format!("Plugin '{}' created at {}", args.name, path.display()));
    if !sitekit_plugins::catalog().contains(&factory) {
        output::print_warning(&format!(
            "No built-in factory named '{factory}'; register one before loading this plugin"
        ));
    }
    Ok(())
}

/// Uses `given`, else prompts with `default` unless prompts are skipped.
fn resolve(given: Option<&str>, default: &str, prompt: &str, yes: bool) -> Result<String, AppError> {
    if let Some(value) = given {
        return Ok(value.to_string());
    }
    if yes {
        return Ok(default.to_string());
    }
    dialoguer::Input::new()
        .with_prompt(prompt)
        .default(default.to_string())
        .allow_empty(true)
        .interact_text()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))
}
