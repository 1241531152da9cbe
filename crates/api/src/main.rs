use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use procure_core::domain::recommendation::{ClassifiedSeries, RecommendationSnapshot, SnapshotSet};
use procure_core::engine::calculator::{self, CalculatorConfig, PurchasePlan, PurchaseTiming};
use procure_core::engine::correlation::CorrelationMatrix;
use procure_core::engine::error::EngineError;
use procure_core::engine::summary::{self, PortfolioSummary};
use procure_core::engine::ProcurementEngine;
use procure_core::ingest::provider::{self, ForecastProvider};

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

    let engine = Arc::new(ProcurementEngine::new(settings.action_policy()?));
    let provider: Arc<dyn ForecastProvider> =
        Arc::from(provider::provider_from_settings(&settings)?);

    match refresh(&engine, provider.as_ref()).await {
        Ok(set) => {
            tracing::info!(
                evaluation_id = %set.evaluation_id,
                materials_len = set.snapshots.len(),
                "initial evaluation complete"
            );
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "initial evaluation failed; starting API in degraded mode");
        }
    }

    let state = AppState {
        engine,
        provider,
        calculator: settings.calculator_config()?,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/snapshots/latest", get(get_latest_snapshots))
        .route("/snapshots/refresh", post(refresh_snapshots))
        .route("/materials/:material/snapshot", get(get_material_snapshot))
        .route("/materials/:material/forecast", get(get_material_forecast))
        .route("/materials/:material/plan", get(get_purchase_plan))
        .route("/correlations", get(get_correlations))
        .route("/summary", get(get_summary))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    engine: Arc<ProcurementEngine>,
    provider: Arc<dyn ForecastProvider>,
    calculator: CalculatorConfig,
}

async fn refresh(
    engine: &ProcurementEngine,
    provider: &dyn ForecastProvider,
) -> anyhow::Result<Arc<SnapshotSet>> {
    let inputs = provider.load_inputs().await?;
    Ok(engine.evaluate(inputs.series, inputs.volatility)?)
}

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::UnknownMaterial(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidInput(_)
        | EngineError::EmptySeries(_)
        | EngineError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
    }
}

fn engine_error(err: EngineError) -> (StatusCode, String) {
    (status_for(&err), err.to_string())
}

async fn get_latest_snapshots(
    State(state): State<AppState>,
) -> Result<Json<SnapshotSet>, StatusCode> {
    let set = state.engine.latest().ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(Json(set.as_ref().clone()))
}

async fn refresh_snapshots(
    State(state): State<AppState>,
) -> Result<Json<SnapshotSet>, (StatusCode, String)> {
    let set = refresh(&state.engine, state.provider.as_ref())
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(
                error = %e,
                provider = state.provider.provider_name(),
                "refresh failed"
            );
            (StatusCode::BAD_GATEWAY, format!("{e:#}"))
        })?;

    tracing::info!(evaluation_id = %set.evaluation_id, "snapshots refreshed");
    Ok(Json(set.as_ref().clone()))
}

async fn get_material_snapshot(
    State(state): State<AppState>,
    Path(material): Path<String>,
) -> Result<Json<RecommendationSnapshot>, (StatusCode, String)> {
    state
        .engine
        .snapshot_for(&material)
        .map(Json)
        .map_err(engine_error)
}

async fn get_material_forecast(
    State(state): State<AppState>,
    Path(material): Path<String>,
) -> Result<Json<ClassifiedSeries>, (StatusCode, String)> {
    state
        .engine
        .forecast_for(&material)
        .map(Json)
        .map_err(engine_error)
}

#[derive(Debug, Deserialize)]
struct PlanQuery {
    quantity: i64,
    #[serde(default)]
    timing: Option<String>,
}

async fn get_purchase_plan(
    State(state): State<AppState>,
    Path(material): Path<String>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<PurchasePlan>, (StatusCode, String)> {
    let timing = match query.timing.as_deref() {
        Some(t) => t.parse::<PurchaseTiming>().map_err(engine_error)?,
        None => PurchaseTiming::Optimal,
    };
    let snapshot = state.engine.snapshot_for(&material).map_err(engine_error)?;

    calculator::plan(&snapshot, query.quantity, timing, &state.calculator)
        .map(Json)
        .map_err(engine_error)
}

async fn get_correlations(
    State(state): State<AppState>,
) -> Result<Json<CorrelationMatrix>, StatusCode> {
    state
        .engine
        .correlations()
        .map(Json)
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

async fn get_summary(State(state): State<AppState>) -> Result<Json<PortfolioSummary>, StatusCode> {
    let set = state.engine.latest().ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(Json(summary::summarize(&set)))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
