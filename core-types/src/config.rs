use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub use config::ConfigError;

/// Pipeline knobs, loaded from an optional `tickflow.toml` plus the
/// `TICKFLOW_*` environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Character-separated trade records to ingest.
    pub input_path: String,
    /// PostgreSQL connection string.
    pub connection_string: String,
    /// Parallel COPY streams for the bulk load.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Directory receiving the columnar artifact.
    #[serde(default = "default_parquet_dir")]
    pub parquet_dir: String,
    /// Indicator window length.
    #[serde(default = "default_indicator_period")]
    pub indicator_period: usize,
}

fn default_worker_count() -> usize {
    4
}

fn default_parquet_dir() -> String {
    ".".to_string()
}

fn default_indicator_period() -> usize {
    5
}

impl PipelineConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("tickflow.toml").required(false))
            .add_source(Environment::with_prefix("TICKFLOW"))
            .build()?;
        settings.try_deserialize()
    }
}
