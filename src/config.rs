use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::{grading::MarkingWeights, payments::PortalContext};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    pub database: DatabaseConfig,
    pub grading: GradingConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GradingConfig {
    pub mid_term_weight: f64,
    pub end_term_weight: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Recorded as `processed_by` / `imported_by`
    pub operator: String,
    pub currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "school_ledger.db".to_string(),
            },
            grading: GradingConfig {
                mid_term_weight: 0.2,
                end_term_weight: 0.8,
            },
            reconcile: ReconcileConfig {
                operator: "bursar".to_string(),
                currency: "UGX".to_string(),
            },
        }
    }
}

impl Config {
    /// Defaults, then the config file (if present), then `LEDGER_*` environment variables
    pub fn load(path: &str) -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let config = config::Config::builder()
            .set_default("database.path", defaults.database.path)?
            .set_default("grading.mid_term_weight", defaults.grading.mid_term_weight)?
            .set_default("grading.end_term_weight", defaults.grading.end_term_weight)?
            .set_default("reconcile.operator", defaults.reconcile.operator)?
            .set_default("reconcile.currency", defaults.reconcile.currency)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("LEDGER").separator("__"))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.marking_weights()?;
        Ok(config)
    }

    pub fn marking_weights(&self) -> anyhow::Result<MarkingWeights> {
        Ok(MarkingWeights::new(
            self.grading.mid_term_weight,
            self.grading.end_term_weight,
        )?)
    }

    pub fn portal_context(&self) -> PortalContext {
        PortalContext {
            operator: self.reconcile.operator.clone(),
            currency: self.reconcile.currency.clone(),
        }
    }

    /// Write this configuration as TOML, leaving an existing file untouched
    pub fn write_if_missing(&self, path: &Path) -> anyhow::Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(true)
    }
}
