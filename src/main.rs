use anyhow::{bail, Context, Result};
use regional_sales::{
    insert_run, load_sources, setup_database, Pipeline, PipelineConfig, PipelineOutput, ReportOutcome, Severity,
};
use rusqlite::Connection;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const USAGE: &str = "Usage: regional-sales <data_dir> [--config <file.json>] [--db <results.db>] [--json <out.json>]";

struct Args {
    data_dir: PathBuf,
    config: Option<PathBuf>,
    db: Option<PathBuf>,
    json: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let mut data_dir = None;
    let mut config = None;
    let mut db = None;
    let mut json = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(args.next().context("--config needs a path")?)),
            "--db" => db = Some(PathBuf::from(args.next().context("--db needs a path")?)),
            "--json" => json = Some(PathBuf::from(args.next().context("--json needs a path")?)),
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("Unknown option {}\n{}", other, USAGE),
            other => data_dir = Some(PathBuf::from(other)),
        }
    }

    Ok(Args {
        data_dir: data_dir.context(USAGE)?,
        config,
        db,
        json,
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = parse_args()?;

    println!("📊 Regional Sales Analytics v{}", regional_sales::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Configuration
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if args.db.is_some() {
        config.database_path = args.db.clone();
    }
    if args.json.is_some() {
        config.json_output_path = args.json.clone();
    }

    // 2. Load source tables
    println!("\n📂 Loading tables from {}...", args.data_dir.display());
    let sources = load_sources(&args.data_dir, &config.inputs)?;
    println!(
        "✓ {} transactions, {} regions, {} state regions, {} products",
        sources.transactions.len(),
        sources.regions.len(),
        sources.state_regions.len(),
        sources.products.len()
    );

    // 3. Run the pipeline
    println!("\n⚙️  Running reports...");
    let pipeline = Pipeline::new(config);
    let output = pipeline.run(&sources);
    print_summary(&output);

    // 4. Persist
    if let Some(path) = &pipeline.config().database_path {
        println!("\n💾 Storing results in {}...", path.display());
        store_output(path, &output)?;
        println!("✓ Run {} stored", output.run_id);
    }

    if let Some(path) = &pipeline.config().json_output_path {
        fs::write(path, output.to_json()?).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✓ JSON written to {}", path.display());
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let failures = output.reports.failures();
    if failures.is_empty() {
        println!("🎉 All {} reports computed", output.reports.len());
    } else {
        println!("⚠️  {} of {} reports failed", failures.len(), output.reports.len());
        for (name, error) in failures {
            println!("   ✗ {}: {}", name, error);
        }
    }

    Ok(())
}

fn store_output(path: &Path, output: &PipelineOutput) -> Result<()> {
    let mut conn = Connection::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    setup_database(&conn)?;
    insert_run(&mut conn, output)?;
    Ok(())
}

fn print_summary(output: &PipelineOutput) {
    println!("✓ Joins: {}", output.join_report.summary());
    println!("✓ Quality: {}", output.quality.summary());
    for issue in output.quality.issues.iter().filter(|i| i.severity != Severity::Info) {
        println!("   {:?} {}.{}: {}", issue.severity, issue.table, issue.field, issue.issue);
    }

    println!();
    for (name, outcome) in output.reports.iter() {
        match outcome {
            ReportOutcome::Ready { table } => println!("   ✓ {:<40} {:>6} cells", name, table.cells().len()),
            ReportOutcome::Failed { .. } => println!("   ✗ {:<40} failed", name),
        }
    }
}
