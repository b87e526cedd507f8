//! Product Availability CLI
//!
//! Compares a scanned group against requested variable values and prints
//! which values are missing where. Unnamed variables default to the full
//! observed value list, so the tool answers "is the cross product complete"
//! out of the box.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use catharsys_products::availability::{cluster_numeric_ranges, ProductAvailability};
use catharsys_products::pathvar::PathVarKind;
use catharsys_products::{Group, NullProgress, Products, Project, Settings};

#[derive(Parser)]
#[command(name = "prod-availability")]
#[command(about = "Report missing artefacts against requested variable values")]
struct Cli {
    /// Path to a settings file (catharsys.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Path to the production configuration (overrides settings)
    #[arg(short, long)]
    production: Option<PathBuf>,

    /// Group to analyze
    #[arg(short, long)]
    group: String,

    /// Requested group values, repeatable: --want camera=cam_front,cam_left
    #[arg(long = "want", value_name = "VAR=V1,V2")]
    want: Vec<String>,

    /// Artefact type to check below resolved group paths
    #[arg(long)]
    artefact_type: Option<String>,

    /// Requested artefact values, repeatable: --want-art frame=1,2,3
    #[arg(long = "want-art", value_name = "VAR=V1,V2")]
    want_art: Vec<String>,

    /// Ignore the scan cache and rescan
    #[arg(long)]
    rescan: bool,
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
        .clone()
        .unwrap_or_else(|| settings.scan.production_file.clone());

    let project = Project::from_settings(&settings.project);
    let registry = project.default_registry();
    let mut products = Products::load(project, &prod_file, &registry)
        .with_context(|| format!("loading {}", prod_file.display()))?;

    let cache_file = settings.scan.cache_file.clone();
    let mut fresh = false;
    if !cli.rescan && cache_file.exists() {
        fresh = products.load_scan(&cache_file)?;
        if !fresh {
            println!("⚠️  Scan cache is stale, rescanning");
        }
    }
    if !fresh {
        products.scan_artefacts(Some(&cli.group), &NullProgress)?;
    }

    let group = products.group(&cli.group)?;
    let wanted = parse_wants(&cli.want)?;
    let requested_group = requested_levels(group, &wanted, None)?;

    let mut requested_artefacts = BTreeMap::new();
    if let Some(type_id) = &cli.artefact_type {
        let wanted_art = parse_wants(&cli.want_art)?;
        let levels = requested_levels(group, &wanted_art, Some(type_id))?;
        requested_artefacts.insert(type_id.clone(), levels);
    }

    let report = ProductAvailability::new(group).analyze(&requested_group, &requested_artefacts)?;

    if report.is_complete() {
        println!("✅ All requested artefacts are present");
        return Ok(());
    }

    for (key, records) in &report.missing {
        if records.is_empty() {
            continue;
        }
        println!("❌ Missing under '{}':", key);
        for record in records {
            println!(
                "    {} [level {}]: {}",
                if record.parent_path.is_empty() {
                    "<root>".to_string()
                } else {
                    record.parent_path.join("/")
                },
                record.level,
                cluster_numeric_ranges(&record.missing)
            );
        }
    }
    std::process::exit(2);
}

/// Parse repeated `var=v1,v2` arguments
fn parse_wants(args: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
    let mut wants = BTreeMap::new();
    for arg in args {
        let Some((var, values)) = arg.split_once('=') else {
            bail!("expected VAR=V1,V2, got '{}'", arg);
        };
        wants.insert(
            var.to_string(),
            values.split(',').map(str::to_string).collect(),
        );
    }
    Ok(wants)
}

/// One requested value list per structure level: fixed segments request their
/// literal name, named variables the values from the command line, everything
/// else the full observed list
fn requested_levels(
    group: &Group,
    wanted: &BTreeMap<String, Vec<String>>,
    artefact_type: Option<&str>,
) -> Result<Vec<Vec<String>>> {
    let (structure, observed) = match artefact_type {
        Some(type_id) => {
            let artefact_type = group.artefact_type(type_id)?;
            let observed = group
                .artefact_var_values(true)?
                .remove(type_id)
                .unwrap_or_default();
            (&artefact_type.structure, observed)
        }
        None => (&group.structure, group.group_var_value_lists()?),
    };

    for var_id in wanted.keys() {
        structure.find_var(var_id)?;
    }

    let mut levels = Vec::new();
    for var in structure.vars() {
        if var.kind == PathVarKind::Fixed {
            levels.push(vec![var.name.clone()]);
            continue;
        }
        let values = match wanted.get(&var.id) {
            Some(values) => values.clone(),
            None => observed
                .iter()
                .find(|(id, _)| id == &var.id)
                .map(|(_, values)| values.clone())
                .unwrap_or_default(),
        };
        levels.push(values);
    }
    Ok(levels)
}
