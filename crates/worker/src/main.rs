use anyhow::Context;
use clap::Parser;
use procure_core::engine::calculator::{self, PurchaseTiming};
use procure_core::engine::{summary, ProcurementEngine};
use procure_core::ingest::provider::{self, ForecastProvider, JsonFileForecastProvider};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod export;

#[derive(Debug, Parser)]
#[command(name = "procure_worker")]
struct Args {
    /// Forecast table JSON. Defaults to the configured provider.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Write one CSV row per material to this path.
    #[arg(long)]
    export_csv: Option<PathBuf>,

    /// Print the cross-material correlation matrix.
    #[arg(long)]
    correlations: bool,

    /// Material to price a purchase plan for.
    #[arg(long, requires = "quantity")]
    plan_material: Option<String>,

    #[arg(long)]
    quantity: Option<i64>,

    /// `optimal` or a month (YYYY-MM).
    #[arg(long, default_value = "optimal")]
    timing: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = procure_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&settings, args).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "procurement run failed");
        return Err(err);
    }
    Ok(())
}

async fn run(settings: &procure_core::config::Settings, args: Args) -> anyhow::Result<()> {
    let provider: Box<dyn ForecastProvider> = match &args.source {
        Some(path) => Box::new(JsonFileForecastProvider::new(path)),
        None => provider::provider_from_settings(settings)?,
    };

    let inputs = provider.load_inputs().await?;
    let engine = ProcurementEngine::new(settings.action_policy()?);
    let set = engine.evaluate(inputs.series, inputs.volatility)?;

    tracing::info!(
        provider = provider.provider_name(),
        evaluation_id = %set.evaluation_id,
        materials_len = set.snapshots.len(),
        "evaluated forecast table"
    );

    let report = serde_json::json!({
        "snapshots": set.as_ref(),
        "summary": summary::summarize(&set),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.correlations {
        let matrix = engine
            .correlations()
            .context("no evaluated series to correlate")?;
        println!("{}", serde_json::to_string_pretty(&matrix)?);
    }

    if let Some(material) = args.plan_material.as_deref() {
        let quantity = args.quantity.context("--quantity is required with --plan-material")?;
        let timing: PurchaseTiming = args.timing.parse()?;
        let snapshot = engine.snapshot_for(material)?;
        let plan = calculator::plan(&snapshot, quantity, timing, &settings.calculator_config()?)?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
    }

    if let Some(path) = &args.export_csv {
        let rows = export::export_snapshots_csv(&set, path)?;
        tracing::info!(path = %path.display(), rows, "exported snapshot CSV");
    }

    Ok(())
}

fn init_sentry(settings: &procure_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
