use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use xprops_runtime::{RuntimeConfig, DEFAULT_CONFIG_NAME};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Attribute holding prop declarations
    #[arg(long, default_value = "x-props")]
    pub props_attribute: String,

    /// Identifier exposing received props
    #[arg(long, default_value = "$props")]
    pub props_namespace: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = RuntimeConfig {
        props_attribute: args.props_attribute,
        props_namespace: args.props_namespace,
        ..RuntimeConfig::default()
    };

    let config_json = serde_json::to_string_pretty(&config)?;
    fs::write(&config_path, config_json)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    Ok(())
}
