// ⚙️ Configuration - built once at process start, shared by both binaries
//
// Every field is a flag and an environment variable. Logging is configured
// separately through ERP_OBS_LOG / ERP_OBS_LOG_FORMAT (see init_tracing).

use clap::Args;
use std::env;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{ObservationError, Result};
use crate::reconciliation::{ReconciliationEngine, DEFAULT_DETAIL_LIMIT};

pub const DEFAULT_DB_PATH: &str = "erp_observations.db";
pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
pub const DEFAULT_REPORT_TITLE: &str = "ERP OBSERVATION BRIEF";

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite database file
    #[arg(long = "db", env = "ERP_OBS_DB", default_value = DEFAULT_DB_PATH, global = true)]
    pub db_path: PathBuf,

    /// Shared code required for every mutation. Without one, mutations are refused.
    #[arg(long, env = "ERP_OBS_ACCESS_CODE", hide_env_values = true, global = true)]
    pub access_code: Option<String>,

    /// Address the HTTP server listens on
    #[arg(long, env = "ERP_OBS_BIND", default_value = DEFAULT_BIND, global = true)]
    pub bind: String,

    /// Heading printed at the top of rendered reports
    #[arg(long, env = "ERP_OBS_REPORT_TITLE", default_value = DEFAULT_REPORT_TITLE, global = true)]
    pub report_title: String,

    /// Maximum entries in each identified / resolved list
    #[arg(long, env = "ERP_OBS_DETAIL_LIMIT", default_value_t = DEFAULT_DETAIL_LIMIT, global = true)]
    pub detail_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            access_code: None,
            bind: DEFAULT_BIND.to_string(),
            report_title: DEFAULT_REPORT_TITLE.to_string(),
            detail_limit: DEFAULT_DETAIL_LIMIT,
        }
    }
}

impl AppConfig {
    /// Check a caller-supplied code before any mutation
    pub fn authorize(&self, supplied: Option<&str>) -> Result<()> {
        match (self.access_code.as_deref(), supplied) {
            (Some(expected), Some(given)) if !expected.is_empty() && expected == given => Ok(()),
            (None, _) => {
                warn!("mutation refused: no access code configured");
                Err(ObservationError::Unauthorized)
            }
            _ => {
                warn!("mutation refused: access code mismatch");
                Err(ObservationError::Unauthorized)
            }
        }
    }

    pub fn engine(&self) -> ReconciliationEngine {
        ReconciliationEngine::with_detail_limit(self.detail_limit)
    }
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("ERP_OBS_LOG")
        .unwrap_or_else(|_| EnvFilter::new("erp_observations=info,warn"));

    let format = env::var("ERP_OBS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}
