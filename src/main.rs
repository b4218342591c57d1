use anyhow::{bail, Context, Result};
use stat_ingest::{
    init_tracing, Config, CycleLog, CycleReport, Pipeline, QueryService, RecordStore, SqliteStore,
};
use std::env;
use std::sync::Arc;

const USAGE: &str = "usage: stat-ingest <ingest | lookup <name> | history <name> | runs [limit] | count>";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let config = Config::from_env()?;

    match args.get(1).map(String::as_str) {
        Some("ingest") => run_ingest(&config).await?,
        Some("lookup") => run_lookup(&config, &name_arg(&args)?)?,
        Some("history") => run_history(&config, &name_arg(&args)?)?,
        Some("runs") => {
            let limit = match args.get(2) {
                Some(raw) => raw.parse().context("runs limit must be a number")?,
                None => 10,
            };
            run_runs(&config, limit)?
        }
        Some("count") => run_count(&config)?,
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Remaining arguments joined, so `lookup LeBron James` works unquoted
fn name_arg(args: &[String]) -> Result<String> {
    let name = args.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();
    if name.trim().is_empty() {
        bail!("{}", USAGE);
    }
    Ok(name)
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    Ok(Arc::new(store))
}

async fn run_ingest(config: &Config) -> Result<()> {
    println!("🏀 Ingestion cycle - Provider → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = open_store(config)?;
    let provider = config.build_provider()?;

    let pipeline = Pipeline::new(provider, store.clone())
        .with_cycle_log(store.clone())
        .with_fetch_timeout(config.fetch_timeout);

    let report = pipeline.run_cycle().await;
    print_report(&report);

    println!("✓ Database contains {} records", store.count()?);

    if report.provider_failed() {
        bail!("ingestion cycle aborted: provider failed");
    }

    Ok(())
}

fn print_report(report: &CycleReport) {
    println!("\n📊 Run {}", report.run_id);
    println!("✓ Fetched:   {}", report.fetched);
    println!("✓ Persisted: {}", report.persisted);

    if report.errors.is_empty() {
        println!("✓ Errors:    0");
        return;
    }

    println!("⚠️  Errors:    {}", report.errors.len());
    for err in &report.errors {
        match err.entry {
            Some(entry) => println!(
                "   #{} {} [{:?}] {}",
                entry,
                err.player.as_deref().unwrap_or("?"),
                err.kind,
                err.reason
            ),
            None => println!("   [{:?}] {}", err.kind, err.reason),
        }
    }
}

fn run_lookup(config: &Config, name: &str) -> Result<()> {
    let query = QueryService::new(open_store(config)?);

    match query.lookup(name)? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => {
            eprintln!("❌ No player named {:?}", name);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn run_history(config: &Config, name: &str) -> Result<()> {
    let query = QueryService::new(open_store(config)?);
    let history = query.history(name)?;

    if history.is_empty() {
        eprintln!("❌ No player named {:?}", name);
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&history)?);
    Ok(())
}

fn run_runs(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;

    for report in store.recent_cycles(limit)? {
        println!(
            "{}  {}  fetched={} persisted={} errors={}",
            report.started_at.to_rfc3339(),
            report.run_id,
            report.fetched,
            report.persisted,
            report.errors.len()
        );
    }

    Ok(())
}

fn run_count(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    println!("{}", store.count()?);
    Ok(())
}
