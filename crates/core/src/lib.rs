pub mod domain;
pub mod engine;
pub mod ingest;

pub mod config {
    use crate::engine::action::{ActionPolicy, DEFAULT_EPSILON};
    use crate::engine::calculator::{CalculatorConfig, DEFAULT_NON_OPTIMAL_PREMIUM};
    use anyhow::Context;
    use std::path::PathBuf;
    use std::str::FromStr;

    pub const DEFAULT_FORECAST_TABLE_PATH: &str = "data/forecasts.json";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub forecast_table_path: PathBuf,
        pub forecast_provider_base_url: Option<String>,
        pub forecast_provider_api_key: Option<String>,
        pub forecast_provider_path: Option<String>,
        pub forecast_provider_timeout_secs: Option<u64>,
        pub forecast_provider_retries: Option<u32>,
        pub non_optimal_premium: f64,
        pub action_epsilon: f64,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                forecast_table_path: PathBuf::from(DEFAULT_FORECAST_TABLE_PATH),
                forecast_provider_base_url: None,
                forecast_provider_api_key: None,
                forecast_provider_path: None,
                forecast_provider_timeout_secs: None,
                forecast_provider_retries: None,
                non_optimal_premium: DEFAULT_NON_OPTIMAL_PREMIUM,
                action_epsilon: DEFAULT_EPSILON,
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();
            Ok(Self {
                forecast_table_path: non_empty_var("FORECAST_TABLE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.forecast_table_path),
                forecast_provider_base_url: non_empty_var("FORECAST_PROVIDER_BASE_URL"),
                forecast_provider_api_key: non_empty_var("FORECAST_PROVIDER_API_KEY"),
                forecast_provider_path: non_empty_var("FORECAST_PROVIDER_PATH"),
                forecast_provider_timeout_secs: parsed_var("FORECAST_PROVIDER_TIMEOUT_SECS")?,
                forecast_provider_retries: parsed_var("FORECAST_PROVIDER_RETRIES")?,
                non_optimal_premium: parsed_var("NON_OPTIMAL_PREMIUM")?
                    .unwrap_or(defaults.non_optimal_premium),
                action_epsilon: parsed_var("ACTION_EPSILON")?.unwrap_or(defaults.action_epsilon),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_forecast_provider_base_url(&self) -> anyhow::Result<&str> {
            self.forecast_provider_base_url
                .as_deref()
                .context("FORECAST_PROVIDER_BASE_URL is required")
        }

        pub fn action_policy(&self) -> anyhow::Result<ActionPolicy> {
            ActionPolicy::new(self.action_epsilon).context("ACTION_EPSILON is invalid")
        }

        pub fn calculator_config(&self) -> anyhow::Result<CalculatorConfig> {
            anyhow::ensure!(
                self.non_optimal_premium.is_finite() && self.non_optimal_premium >= 0.0,
                "NON_OPTIMAL_PREMIUM must be a non-negative number (got {})",
                self.non_optimal_premium
            );
            Ok(CalculatorConfig {
                non_optimal_premium: self.non_optimal_premium,
            })
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn parsed_var<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        non_empty_var(key)
            .map(|s| s.trim().parse::<T>())
            .transpose()
            .with_context(|| format!("{key} is not a valid value"))
    }

}
