use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;
use xprops_props::{props_runtime, PropsPlugin};
use xprops_runtime::{Runtime, RuntimeConfig};

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Markup file to mount
    pub file: PathBuf,

    /// Click the first element matching this selector (`#id` or tag), in order
    #[arg(short, long = "click")]
    pub clicks: Vec<String>,

    /// Directory containing xprops.config.json (defaults to current directory)
    #[arg(long)]
    pub config: Option<String>,
}

/// Mount a markup file and replay clicks against it
pub(crate) fn mount_file(
    file: &Path,
    config_dir: &str,
    clicks: &[String],
) -> Result<(Runtime, Rc<PropsPlugin>)> {
    let config = RuntimeConfig::load(config_dir)
        .with_context(|| format!("Failed to load config from {}", config_dir))?;
    let markup = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let (runtime, plugin) = props_runtime(config);
    runtime
        .mount(&markup)
        .with_context(|| format!("Failed to mount {}", file.display()))?;

    for selector in clicks {
        debug!(selector = %selector, "Replaying click");
        runtime
            .click(selector)
            .with_context(|| format!("Click on '{}' failed", selector))?;
    }

    Ok((runtime, plugin))
}

pub fn render(args: RenderArgs, cwd: &str) -> Result<()> {
    let config_dir = args.config.as_deref().unwrap_or(cwd);
    let (runtime, _) = mount_file(&args.file, config_dir, &args.clicks)?;

    eprintln!(
        "{} {} ({} clicks)",
        "✓".green(),
        args.file.display(),
        args.clicks.len()
    );
    println!("{}", runtime.render());

    Ok(())
}
