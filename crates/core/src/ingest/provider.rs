use crate::config::Settings;
use crate::domain::contract::{EngineInputs, ForecastTable};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/material_forecasts";
const DEFAULT_RETRIES: u32 = 3;
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Source of the forecast table the engine evaluates.
#[async_trait::async_trait]
pub trait ForecastProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Returns the parsed table plus the raw JSON it came from.
    async fn fetch_forecast_table(&self) -> Result<(ForecastTable, Value)>;

    async fn load_inputs(&self) -> Result<EngineInputs> {
        let (table, _) = self.fetch_forecast_table().await?;
        table
            .validate_and_into_inputs()
            .with_context(|| format!("{} returned an invalid forecast table", self.provider_name()))
    }
}

pub fn provider_from_settings(settings: &Settings) -> Result<Box<dyn ForecastProvider>> {
    if settings.forecast_provider_base_url.is_some() {
        return Ok(Box::new(HttpJsonForecastProvider::from_settings(settings)?));
    }
    Ok(Box::new(JsonFileForecastProvider::new(
        settings.forecast_table_path.clone(),
    )))
}

#[derive(Debug, Clone)]
pub struct JsonFileForecastProvider {
    path: PathBuf,
}

impl JsonFileForecastProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl ForecastProvider for JsonFileForecastProvider {
    fn provider_name(&self) -> &'static str {
        "json_file"
    }

    async fn fetch_forecast_table(&self) -> Result<(ForecastTable, Value)> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read forecast table {}", self.path.display()))?;
        parse_table(&text).with_context(|| format!("in {}", self.path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct HttpJsonForecastProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonForecastProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_forecast_provider_base_url()?.to_string();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                settings
                    .forecast_provider_timeout_secs
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .context("failed to build forecast provider http client")?;

        Ok(Self {
            http,
            base_url,
            api_key: settings.forecast_provider_api_key.clone(),
            path: settings
                .forecast_provider_path
                .clone()
                .unwrap_or_else(|| DEFAULT_PATH.to_string()),
            retries: settings.forecast_provider_retries.unwrap_or(DEFAULT_RETRIES),
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self) -> Result<(ForecastTable, Value)> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .send()
            .await
            .context("forecast provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read forecast provider response")?;

        if !status.is_success() {
            anyhow::bail!("forecast provider HTTP {status}: {text}");
        }
        parse_table(&text)
    }
}

#[async_trait::async_trait]
impl ForecastProvider for HttpJsonForecastProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_forecast_table(&self) -> Result<(ForecastTable, Value)> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok(out) => return Ok(out),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = retry_backoff(attempt);
                    tracing::warn!(
                        attempt,
                        ?backoff,
                        error = %err,
                        "forecast provider fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Delay after the `attempt`-th failure: 1s, 2s, 4s, ... capped at 64s.
fn retry_backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    Duration::from_secs(1 << exponent)
}

fn parse_table(text: &str) -> Result<(ForecastTable, Value)> {
    let raw_json = serde_json::from_str::<Value>(text).context("forecast table is not valid JSON")?;
    let parsed = serde_json::from_value::<ForecastTable>(raw_json.clone())
        .context("failed to parse forecast table")?;
    Ok((parsed, raw_json))
}
