//! ism-collect CLI - list or copy the files an InstallShield project references

use anyhow::{Context, Result};
use clap::Parser;
use ism_collect::{
    process_project, reset_output_root, Config, CopyOptions, CopyOutcome, CopyReport, Inventory,
    Project, ProjectOptions,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ism-collect")]
#[command(about = "List or copy the files referenced by InstallShield XML projects")]
#[command(version)]
struct Cli {
    /// Project files (.ism saved in XML format)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Copy referenced files into this folder (emptied first)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Copy each project into a subfolder named after it
    #[arg(short, long)]
    separate: bool,

    /// Configuration file (default: ism-collect.yaml/.yml/.json in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a JSON report per project
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ProjectReport<'a> {
    project: &'a Project,
    inventory: &'a Inventory,
    #[serde(skip_serializing_if = "Option::is_none")]
    copy: Option<&'a CopyReport>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::discover(&std::env::current_dir()?)?,
    };
    let options = ProjectOptions::from_config(&config);

    let copy = match &cli.output {
        Some(output) => {
            let output = std::path::absolute(output)?;
            reset_output_root(&output)
                .with_context(|| format!("Failed to prepare {}", output.display()))?;
            Some(CopyOptions::new(output).separate(cli.separate))
        }
        None => None,
    };

    for file in &cli.files {
        let path = std::path::absolute(file)?;
        process(&path, &options, copy.as_ref(), cli.json)
            .with_context(|| format!("Failed to process {}", path.display()))?;
    }

    Ok(())
}

fn process(
    path: &Path,
    options: &ProjectOptions,
    copy: Option<&CopyOptions>,
    json: bool,
) -> Result<()> {
    let (project, inventory, report) = process_project(path, options, copy)?;

    if json {
        let output = ProjectReport {
            project: &project,
            inventory: &inventory,
            copy: report.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("Project: {}", path.display());
    print_variables(&project);
    print_missing(&inventory);

    match &report {
        Some(report) => print_copy(report),
        None => print_listing(&inventory),
    }

    Ok(())
}

fn print_variables(project: &Project) {
    println!();
    println!("Path variables");
    for variable in project.variables().iter() {
        println!("{}={}", variable.name, variable.value);
    }
}

fn print_missing(inventory: &Inventory) {
    println!();
    println!("Missing files or folders ({})", inventory.missing.len());
    for path in inventory.missing_paths() {
        println!("{}", path.display());
    }
}

fn print_listing(inventory: &Inventory) {
    println!();
    println!("Referenced files ({})", inventory.existing.len());
    for path in inventory.listing() {
        println!("{}", path.display());
    }
}

fn print_copy(report: &CopyReport) {
    println!();
    println!("Copied files to {}", report.output_folder.display());
    for entry in &report.entries {
        match &entry.destination {
            Some(destination) => {
                println!("{} -> {}", entry.source.display(), destination.display())
            }
            None => println!("{}", entry.source.display()),
        }
    }
    println!();
    println!(
        "Copied: {}  Already present: {}  Not copied: {}",
        report.count(CopyOutcome::Copied),
        report.count(CopyOutcome::AlreadyPresent),
        report.count(CopyOutcome::Skipped)
    );
}
