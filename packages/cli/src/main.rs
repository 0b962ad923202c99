mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{init, inspect, render, InitArgs, InspectArgs, RenderArgs};

/// xprops CLI - mount directive markup with isolated component props
#[derive(Parser, Debug)]
#[command(name = "xprops")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an xprops.config.json with default settings
    Init(InitArgs),

    /// Mount a markup file, replay clicks and print the resulting markup
    Render(RenderArgs),

    /// Mount a markup file and print the props each component received
    Inspect(InspectArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir.display().to_string(),
        Err(err) => {
            eprintln!("{} Cannot get current directory: {}", "Error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Render(args) => render(args, &cwd),
        Command::Inspect(args) => inspect(args, &cwd),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
