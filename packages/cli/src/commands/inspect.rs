use super::render::mount_file;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use xprops_props::PropsPlugin;
use xprops_runtime::{NodeId, Runtime};

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Markup file to mount
    pub file: PathBuf,

    /// Click the first element matching this selector before inspecting
    #[arg(short, long = "click")]
    pub clicks: Vec<String>,

    /// Directory containing xprops.config.json (defaults to current directory)
    #[arg(long)]
    pub config: Option<String>,
}

/// Print the props every component received
pub fn inspect(args: InspectArgs, cwd: &str) -> Result<()> {
    let config_dir = args.config.as_deref().unwrap_or(cwd);
    let (runtime, plugin) = mount_file(&args.file, config_dir, &args.clicks)?;

    let components = component_props(&runtime, &plugin);
    for (node, props) in &components {
        match props {
            Some(props) => println!(
                "{} {}",
                node.to_string().bright_white(),
                serde_json::to_string(props)?
            ),
            None => println!("{} {}", node.to_string().bright_white(), "(no props)".dimmed()),
        }
    }

    if components.is_empty() {
        println!("{}", "⚠️  No components found".yellow());
    }
    Ok(())
}

/// Every component in document order with the props snapshot it holds
fn component_props(
    runtime: &Runtime,
    plugin: &PropsPlugin,
) -> Vec<(NodeId, Option<serde_json::Value>)> {
    runtime
        .query_selector_all("*")
        .into_iter()
        .filter(|node| runtime.component_context(*node).is_some())
        .map(|node| (node, plugin.snapshot_for(node).map(|snapshot| snapshot.to_json())))
        .collect()
}
