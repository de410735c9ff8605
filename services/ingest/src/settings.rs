use std::time::Duration;

use chrono::{DateTime, Utc};

use scf_common::error::{ScfError, ScfResult};
use scf_config::{get_var_opt, get_var_or, parse_var_or};
use scf_db::issues::pg_repository::{validate_table_name, DEFAULT_TABLE};

use crate::connector::RunMode;
use crate::schedule::Schedule;
use crate::seeclickfix::query::parse_watermark;
use crate::seeclickfix::watermark::BOOTSTRAP_WATERMARK;

/// How and where the ingest binary runs.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub table: String,
    pub bootstrap_watermark: DateTime<Utc>,
    pub first_run: bool,
    /// `None` runs once and exits.
    pub run_interval: Option<Duration>,
}

impl IngestSettings {
    pub fn from_env() -> ScfResult<Self> {
        let table = get_var_or("SCF_TABLE", DEFAULT_TABLE);
        validate_table_name(&table).map_err(|e| ScfError::Config(e.to_string()))?;

        let raw_bootstrap = get_var_or("SCF_BOOTSTRAP_WATERMARK", BOOTSTRAP_WATERMARK);
        let bootstrap_watermark = parse_watermark(&raw_bootstrap).map_err(|e| {
            ScfError::Config(format!("invalid SCF_BOOTSTRAP_WATERMARK {raw_bootstrap:?}: {e}"))
        })?;

        let run_interval = match get_var_opt("SCF_RUN_INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| {
                    ScfError::Config(format!("invalid SCF_RUN_INTERVAL_SECS: {e}"))
                })?;
                if secs == 0 {
                    return Err(ScfError::Config(
                        "SCF_RUN_INTERVAL_SECS must be greater than 0".into(),
                    ));
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            table,
            bootstrap_watermark,
            first_run: parse_var_or("SCF_FIRST_RUN", false)?,
            run_interval,
        })
    }

    pub fn run_mode(&self) -> RunMode {
        if self.first_run {
            RunMode::FirstRun
        } else {
            RunMode::Incremental
        }
    }

    pub fn schedule(&self) -> Schedule {
        match self.run_interval {
            Some(period) => Schedule::Every(period),
            None => Schedule::Once,
        }
    }
}
