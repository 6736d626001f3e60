mod cfg;
mod installer;
mod manifest;
mod project;
mod ui;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use cfg::Layout;
use installer::{ConflictPolicy, EntryOutcome, InstallEntry, InstallReport, Placeholders, Resolution};

/// Claude Code project toolkit - global config install and project scaffolding
#[derive(Parser)]
#[command(name = "claude-init")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the global Claude directory (defaults to ~/.claude)
    #[arg(long, global = true, value_name = "DIR")]
    claude_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install global agents, templates, and rules into ~/.claude/
    InitGlobals {
        /// Path to the toolkit directory (auto-detected if running from it)
        #[arg(long, value_name = "DIR")]
        from: Option<PathBuf>,

        /// Overwrite existing files without prompting (originals backed up)
        #[arg(short, long)]
        force: bool,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scaffold Claude Code files in the current directory
    InitProject {
        /// Project name (default: current directory name)
        #[arg(long, value_name = "NAME")]
        name: Option<String>,

        /// Qdrant collection name (auto-configures .mcp.json)
        #[arg(long, value_name = "NAME")]
        collection: Option<String>,

        /// Skip .mcp.json creation
        #[arg(long)]
        no_mcp: bool,

        /// Overwrite existing files without prompting (originals backed up)
        #[arg(short, long)]
        force: bool,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    ui::init();

    let layout = match cli.claude_dir {
        Some(dir) => Layout::new(dir),
        None => Layout::default_root()?,
    };

    let result = match cli.command {
        Commands::InitGlobals { from, force, json } => cmd_init_globals(&layout, from, force, json),
        Commands::InitProject {
            name,
            collection,
            no_mcp,
            force,
            json,
        } => cmd_init_project(&layout, name, collection, no_mcp, force, json),
    };

    if let Err(e) = result {
        ui::error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_init_globals(layout: &Layout, from: Option<PathBuf>, force: bool, json: bool) -> Result<()> {
    let source_dir = match from {
        Some(dir) => {
            let dir = dir
                .canonicalize()
                .with_context(|| format!("Toolkit directory {} not found", dir.display()))?;
            if !manifest::is_toolkit_dir(&dir) {
                bail!(
                    "{} does not contain agents/ and templates/ directories",
                    dir.display()
                );
            }
            dir
        }
        None => manifest::detect_source_dir()?,
    };

    ui::section("Claude Code - Global Setup");
    println!("  Source:  {}", source_dir.display());
    println!("  Target:  {}", layout.claude_dir.display());

    let built = manifest::global_entries(&source_dir, layout);
    for name in &built.missing {
        ui::warn(&format!("{name} not found in toolkit, skipping"));
    }

    print_prescan(&built.entries);

    let policy = choose_policy(&built.entries, force);
    let report = installer::install(&built.entries, resolver(policy), &Placeholders::new());
    print_outcomes(&report);

    // Self-install: always updated, no conflict prompt, no backup.
    let bin_path = project::self_install(layout)?;
    println!(
        "  {} {}  {}",
        "✓".green(),
        layout.label(&bin_path),
        "(updated)".dimmed()
    );

    print_summary(&report);

    if project::bin_on_path(&layout.bin_dir()) {
        ui::success(&format!("{} is already in PATH", layout.bin_dir().display()));
    } else {
        ui::hint("Add to your shell profile (~/.bashrc or ~/.zshrc):");
        println!("    export PATH=\"$HOME/.claude/bin:$PATH\"");
    }
    ui::hint("Run 'claude-init init-project' inside any project directory.");

    finish(&report, json)
}

fn cmd_init_project(
    layout: &Layout,
    name: Option<String>,
    collection: Option<String>,
    no_mcp: bool,
    force: bool,
    json: bool,
) -> Result<()> {
    if !layout.templates_dir().is_dir() {
        bail!(
            "Templates not found at {}; run 'claude-init init-globals' first",
            layout.templates_dir().display()
        );
    }

    let project_dir = std::env::current_dir().context("Failed to determine the current directory")?;
    let project_name = name.unwrap_or_else(|| {
        project_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    });

    ui::section("Claude Code - Project Init");
    println!("  Project:    {project_name}");
    println!("  Directory:  {}", project_dir.display());

    let built = manifest::project_entries(
        layout,
        &project_dir,
        &project_name,
        collection.as_deref(),
        no_mcp,
    );
    for name in &built.missing {
        ui::warn(&format!("{name} not found, skipping"));
    }

    print_prescan(&built.entries);

    let gitignore_present = project::gitignore_has_entry(&project_dir);
    if gitignore_present {
        println!("    {} .gitignore  {}", "-".dimmed(), "(entry present)".dimmed());
    } else {
        println!(
            "    {} .gitignore  {}",
            "·".green(),
            "(entry will be added)".dimmed()
        );
    }
    println!();

    let policy = choose_policy(&built.entries, force);
    let mut report = installer::install(&built.entries, resolver(policy), &built.placeholders);
    print_outcomes(&report);

    if !gitignore_present {
        project::ensure_gitignore_entry(&project_dir)?;
        println!("  {} .gitignore  {}", "✓".green(), "(entry added)".dimmed());
        // The appended entry counts as an installed file in the summary.
        report.installed += 1;
    }

    let mcp_path = project_dir.join(".mcp.json");
    if !no_mcp && mcp_path.exists() && !project::mcp_json_is_valid(&mcp_path) {
        ui::warn(".mcp.json is not valid JSON; review the rendered file");
    }

    print_summary(&report);

    println!();
    println!("  Next steps:");
    println!(
        "    1. Edit {} - fill in project description, module map, rules",
        "CLAUDE.md".bold()
    );
    println!(
        "    2. Edit {} - adjust commit scopes to match your modules",
        "CONVENTIONS.md".bold()
    );
    if !no_mcp && collection.is_none() {
        println!(
            "    3. Edit {} - set your collection name (or delete if not using Qdrant)",
            ".mcp.json".bold()
        );
    }

    finish(&report, json)
}

/// How this run treats pre-existing destinations.
#[derive(Debug, Clone, Copy)]
enum RunPolicy {
    OverwriteAll,
    SkipAll,
    PerFile,
}

/// Pick the run policy up front: forced runs overwrite everything, runs with
/// no conflicts never consult the policy, and interactive runs ask.
fn choose_policy(entries: &[InstallEntry], force: bool) -> RunPolicy {
    let conflicts: Vec<&InstallEntry> = entries.iter().filter(|e| e.conflicts()).collect();
    if conflicts.is_empty() {
        return RunPolicy::SkipAll;
    }

    if force {
        println!(
            "  {}",
            format!("--force: overwriting {} existing file(s)", conflicts.len()).dimmed()
        );
        return RunPolicy::OverwriteAll;
    }

    println!();
    ui::warn(&format!("{} file(s) already exist:", conflicts.len()));
    for entry in &conflicts {
        println!("      {}", entry.label);
    }
    println!();

    let items = [
        "Overwrite all (originals backed up)",
        "Skip all existing",
        "Decide per file",
        "Quit",
    ];
    match ui::prompt_select("What would you like to do?", &items, 1) {
        0 => RunPolicy::OverwriteAll,
        1 => RunPolicy::SkipAll,
        2 => RunPolicy::PerFile,
        _ => {
            println!("\n  {}\n", "Aborted.".dimmed());
            std::process::exit(0);
        }
    }
}

/// Turn the run policy into the installer's per-entry decision callback.
/// Only called for entries whose destination already exists.
fn resolver(policy: RunPolicy) -> impl FnMut(&InstallEntry) -> Resolution {
    move |entry| match policy {
        RunPolicy::OverwriteAll => ConflictPolicy::ForceWithBackup.resolve(entry),
        RunPolicy::SkipAll => ConflictPolicy::Skip.resolve(entry),
        RunPolicy::PerFile => {
            let overwrite = ui::prompt_confirm(
                &format!(
                    "{} already exists. Overwrite? (backup will be saved)",
                    entry.label
                ),
                false,
            );
            if overwrite {
                Resolution::Overwrite
            } else {
                Resolution::Skip
            }
        }
    }
}

fn print_prescan(entries: &[InstallEntry]) {
    println!();
    ui::info("Checking files...");
    println!();
    for entry in entries {
        if entry.conflicts() {
            println!(
                "    {} {}  {}",
                "⚠".yellow(),
                entry.label,
                "(exists)".yellow()
            );
        } else {
            println!("    {} {}  {}", "·".green(), entry.label, "(new)".dimmed());
        }
    }
}

fn print_outcomes(report: &InstallReport) {
    println!();
    for result in &report.outcomes {
        match &result.outcome {
            EntryOutcome::Installed { backup: Some(_) } => {
                println!(
                    "  {} {}  {}",
                    "✓".green(),
                    result.label,
                    "(backup saved)".blue()
                );
            }
            EntryOutcome::Installed { backup: None } => {
                println!("  {} {}", "✓".green(), result.label);
            }
            EntryOutcome::Skipped => {
                println!("  {} {}  {}", "⊘".yellow(), result.label, "(skipped)".dimmed());
            }
            EntryOutcome::Failed(err) => {
                println!("  {} {}  {}", "✗".red(), result.label, format!("({err})").red());
            }
        }
    }
}

fn print_summary(report: &InstallReport) {
    println!();
    println!("  {}", "-".repeat(44).dimmed());
    let mut parts = vec![
        format!("{} installed", report.installed).green().to_string(),
        format!("{} backed up", report.backed_up).blue().to_string(),
        format!("{} skipped", report.skipped).dimmed().to_string(),
    ];
    if report.failed > 0 {
        parts.push(format!("{} failed", report.failed).red().to_string());
    }
    println!("  Done.  {}", parts.join(" · "));
}

/// Emit the optional JSON report and map failed entries to a non-zero exit.
fn finish(report: &InstallReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    if !report.is_clean() {
        bail!("{} file(s) failed to install", report.failed);
    }
    Ok(())
}
