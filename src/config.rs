// ⚙️ Pipeline configuration
//
// JSON file, every field optional. Missing fields take the defaults below.

use crate::error::PipelineResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File names of the four ingestion tables inside the data directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFiles {
    pub transactions: String,
    pub regions: String,
    pub state_regions: String,
    pub products: String,
}

impl Default for InputFiles {
    fn default() -> Self {
        InputFiles {
            transactions: "sales_orders.csv".to_string(),
            regions: "regions.csv".to_string(),
            state_regions: "state_regions.csv".to_string(),
            products: "products.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Size of the top-N product rankings
    pub top_n: usize,

    /// Number of best-selling products tracked by the seasonality reports
    pub focus_products: usize,

    pub inputs: InputFiles,

    /// SQLite result store; skipped when unset
    pub database_path: Option<PathBuf>,

    /// Pretty JSON dump of the whole run; skipped when unset
    pub json_output_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            top_n: 10,
            focus_products: 5,
            inputs: InputFiles::default(),
            database_path: None,
            json_output_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        log::debug!("loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }
}
