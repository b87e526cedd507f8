//! Product Scan CLI
//!
//! Loads the production configuration, scans all (or one) of its groups
//! against the file system and writes the scan cache.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use catharsys_products::{Products, Project, ScanProgress, Settings};

#[derive(Parser)]
#[command(name = "prod-scan")]
#[command(about = "Scan production output against the declarative path structures")]
struct Cli {
    /// Path to a settings file (catharsys.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Path to the production configuration (overrides settings)
    #[arg(short, long)]
    production: Option<PathBuf>,

    /// Scan only this group
    #[arg(short, long)]
    group: Option<String>,

    /// Where to write the scan cache (overrides settings)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Scan and report, but do not write the cache
    #[arg(long)]
    dry_run: bool,
}

/// Console progress: status lines plus a counter
struct ConsoleProgress;

impl ScanProgress for ConsoleProgress {
    fn status(&self, text: &str) {
        println!("   {}", text);
    }

    fn iter_init(&self, label: &str, total: usize) {
        println!("   {} ({} steps)", label, total);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load_from(cli.config.as_deref())?;
    let prod_file = cli
        .production
        .unwrap_or_else(|| settings.scan.production_file.clone());
    let cache_file = cli
        .cache
        .unwrap_or_else(|| settings.scan.cache_file.clone());

    let project = Project::from_settings(&settings.project);
    let registry = project.default_registry();

    println!("🔍 Product scan");
    println!("  Project: {}", project.id);
    println!("  Production file: {}", prod_file.display());
    println!();

    let mut products = Products::load(project, &prod_file, &registry)
        .with_context(|| format!("loading {}", prod_file.display()))?;

    products.scan_artefacts(cli.group.as_deref(), &ConsoleProgress)?;
    println!();

    for group in products.groups() {
        if !group.is_scanned() {
            continue;
        }
        let tree = group.tree()?;
        println!("📦 Group '{}' - {} nodes", group.id, tree.reachable_count());
        for (var_id, values) in group.group_var_value_lists()? {
            println!("    {}: {} values", var_id, values.len());
        }
        for (type_id, lists) in group.artefact_var_values(true)? {
            println!("    artefact '{}':", type_id);
            for (var_id, values) in lists {
                println!("      {}: {} values", var_id, values.len());
            }
        }
    }

    if cli.dry_run {
        println!();
        println!("🔍 Dry run - cache not written");
        return Ok(());
    }

    products
        .save_scan(&cache_file)
        .with_context(|| format!("writing {}", cache_file.display()))?;
    println!();
    println!("✅ Scan cache written to {}", cache_file.display());
    Ok(())
}
