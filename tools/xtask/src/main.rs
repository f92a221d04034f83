//! Workspace automation tasks.
//!
//! Run with: `cargo xtask <command>`

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

/// Crate-level attributes every library crate must carry.
const REQUIRED_LIB_ATTRIBUTES: [&str; 3] = [
    "#![forbid(unsafe_code)]",
    "#![deny(missing_docs)]",
    "#![deny(rust_2018_idioms)]",
];

#[derive(Parser)]
#[command(name = "xtask", about = "Imprint workspace automation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks locally
    Ci,
    /// Validate workspace conventions
    Lint,
    /// Run the end-to-end publishing scenarios only
    Scenarios,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci => run_ci(),
        Commands::Lint => run_lint(),
        Commands::Scenarios => run_scenarios(),
    }
}

fn run_ci() -> Result<()> {
    println!("Running CI checks...\n");

    run_lint()?;
    run_cmd("cargo", &["fmt", "--check"])?;
    run_cmd("cargo", &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
    run_cmd("cargo", &["test", "--workspace"])?;
    run_cmd("cargo", &["doc", "--workspace", "--no-deps"])?;

    println!("\nAll CI checks passed!");
    Ok(())
}

fn run_lint() -> Result<()> {
    println!("Validating workspace conventions...\n");

    for entry in fs::read_dir("crates").context("reading crates/")? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("imprint-") {
            anyhow::bail!("Crate '{name}' does not follow imprint-* naming");
        }

        let lib = entry.path().join("src").join("lib.rs");
        check_lib_attributes(&name, &lib)?;
    }

    println!("All conventions validated!");
    Ok(())
}

fn check_lib_attributes(name: &str, lib: &Path) -> Result<()> {
    let source = fs::read_to_string(lib).with_context(|| format!("reading {}", lib.display()))?;
    let missing: Vec<&str> = REQUIRED_LIB_ATTRIBUTES
        .into_iter()
        .filter(|attribute| !source.contains(attribute))
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("Crate '{name}' is missing {}", missing.join(", "));
    }
    Ok(())
}

fn run_scenarios() -> Result<()> {
    run_cmd(
        "cargo",
        &["test", "-p", "imprint-publish", "--test", "publishing_scenarios"],
    )?;
    run_cmd(
        "cargo",
        &["test", "-p", "imprint-dataworld", "--test", "dataworld_publish"],
    )
}

fn run_cmd(cmd: &str, args: &[&str]) -> Result<()> {
    println!("$ {} {}", cmd, args.join(" "));
    let status = Command::new(cmd)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run: {} {}", cmd, args.join(" ")))?;

    if !status.success() {
        anyhow::bail!("Command failed: {} {}", cmd, args.join(" "));
    }
    Ok(())
}
