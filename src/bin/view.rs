//! Product View CLI
//!
//! Builds a product view from value selections and walks its dimension cross
//! product, printing the resolved tree node per combination. Mostly a debug
//! and export-dry-run tool: it shows how selections classify into group,
//! common and per-type dimensions.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use catharsys_products::{NullProgress, ProductView, Products, Project, Settings, ViewDimKind};

#[derive(Parser)]
#[command(name = "prod-view")]
#[command(about = "Iterate the view dimensions of a scanned group")]
struct Cli {
    /// Path to a settings file (catharsys.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Path to the production configuration (overrides settings)
    #[arg(short, long)]
    production: Option<PathBuf>,

    /// Group to view
    #[arg(short, long)]
    group: String,

    /// Group-variable selection, repeatable: --select camera=cam_front,cam_left
    #[arg(long = "select", value_name = "VAR=V1,V2")]
    select: Vec<String>,

    /// Artefact-variable selection, repeatable: --select-art image:frame=1,2
    #[arg(long = "select-art", value_name = "TYPE:VAR=V1,V2")]
    select_art: Vec<String>,

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
    }
    if !fresh {
        products.scan_artefacts(Some(&cli.group), &NullProgress)?;
    }

    let group = products.group(&cli.group)?;
    let mut view = ProductView::new(group);

    // Unselected group variables default to everything observed.
    let mut group_selection: BTreeMap<String, Vec<String>> =
        group.group_var_value_lists()?.into_iter().collect();
    for arg in &cli.select {
        let (var, values) = parse_selection(arg)?;
        group_selection.insert(var, values);
    }
    view.set_selected_group_var_value_lists(&group_selection)?;

    let observed_art = group.artefact_var_values(true)?;
    for arg in &cli.select_art {
        let Some((type_id, rest)) = arg.split_once(':') else {
            bail!("expected TYPE:VAR=V1,V2, got '{}'", arg);
        };
        let mut selection: BTreeMap<String, Vec<String>> = observed_art
            .get(type_id)
            .map(|lists| lists.iter().cloned().collect())
            .unwrap_or_default();
        let (var, values) = parse_selection(rest)?;
        selection.insert(var, values);
        view.set_selected_artefact_var_value_lists_for_type(type_id, &selection)?;
    }

    println!("🧭 View over group '{}'", group.id);
    for dim in view.active_dims() {
        println!(
            "  dim {:12} [{}] - {} values",
            dim.var_id,
            dim_kind_tag(&dim.kind),
            dim.len()
        );
    }
    println!();

    let tree = group.tree()?;
    view.reset();
    let mut present = 0;
    let mut absent = 0;
    loop {
        let path = view.dim_node_path()?;
        match view.view_dim_node_iteration_value()? {
            Some(node) => {
                present += 1;
                println!("  {} -> {}", path, tree.node(node).fs_name());
            }
            None => {
                absent += 1;
                println!("  {} -> (not scanned)", path);
            }
        }
        if !view.advance() {
            break;
        }
    }

    println!();
    println!("✅ {} combinations resolved, {} not on disk", present, absent);
    Ok(())
}

fn dim_kind_tag(kind: &ViewDimKind) -> &str {
    match kind {
        ViewDimKind::Group => "group",
        ViewDimKind::ArtCommon => "common",
        ViewDimKind::ArtType => "type",
        ViewDimKind::Art(_) => "artefact",
    }
}

/// Parse one `var=v1,v2` selection argument
fn parse_selection(arg: &str) -> Result<(String, Vec<String>)> {
    let Some((var, values)) = arg.split_once('=') else {
        bail!("expected VAR=V1,V2, got '{}'", arg);
    };
    Ok((
        var.to_string(),
        values.split(',').map(str::to_string).collect(),
    ))
}
