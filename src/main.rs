use anyhow::{bail, Context, Result};
use clap::Parser;
use enrolstats::{config::Config, view, AggregationResult};
use indexmap::IndexMap;
use std::{io::Write, path::PathBuf, time::Instant};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Aggregate international-student tables into chart-ready JSON"
)]
struct Args {
    /// YAML file describing the dataset and the views to compute.
    #[arg(short, long)]
    config: PathBuf,
    /// Use this dataset file instead of the one named in the config.
    #[arg(long)]
    data: Option<PathBuf>,
    /// Only compute the named view(s).
    #[arg(long = "view")]
    views: Vec<String>,
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // ─── 2) config + dataset ─────────────────────────────────────────
    let mut config = Config::from_path(&args.config)?;
    if let Some(data) = args.data {
        config.dataset.path = data;
    }
    let start = Instant::now();
    let dataset = config.dataset.load()?;
    info!(
        rows = dataset.len(),
        columns = dataset.columns().len(),
        elapsed = ?start.elapsed(),
        "dataset ready"
    );

    for name in &args.views {
        if config.view(name).is_none() {
            bail!("no view named `{}` in {:?}", name, args.config);
        }
    }

    // ─── 3) run views ────────────────────────────────────────────────
    let mut results: IndexMap<String, AggregationResult> = IndexMap::new();
    for named in &config.views {
        if !args.views.is_empty() && !args.views.contains(&named.name) {
            continue;
        }
        let result = view::run(&dataset, &named.view)
            .with_context(|| format!("view `{}` failed", named.name))?;
        if result.is_blank() {
            warn!(view = %named.name, "data not available");
        } else {
            info!(view = %named.name, total = result.total(), "computed");
        }
        results.insert(named.name.clone(), result);
    }

    // ─── 4) emit JSON ────────────────────────────────────────────────
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.pretty {
        serde_json::to_writer_pretty(&mut out, &results)?;
    } else {
        serde_json::to_writer(&mut out, &results)?;
    }
    writeln!(out)?;

    info!("all done");
    Ok(())
}
