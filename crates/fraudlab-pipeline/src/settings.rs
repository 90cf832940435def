//! Pipeline configuration.
//!
//! Every field has a default, so an empty file (or no file at all) gives
//! the reference workflow: dedupe, PCA + robust scaling of `Time` and
//! `Amount`, SMOTE with 5 neighbours, a 70/30 split, 5-fold CV and the
//! six-model roster.

use config::{Config, Environment, File, FileFormat};
use fraudlab_data::{AMOUNT_COLUMN, TIME_COLUMN};
use fraudlab_preprocessing::TransformOrder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::models::ModelSpec;

/// Prefix of environment overrides, e.g. `FRAUDLAB__SPLIT__SEED=7`.
pub const ENV_PREFIX: &str = "FRAUDLAB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV with the `Time, V1..V28, Amount, Class` header
    pub path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            path: PathBuf::from("creditcard.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub enabled: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        CleaningConfig { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub enabled: bool,
    pub columns: Vec<String>,
    pub order: TransformOrder,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            enabled: true,
            columns: vec![TIME_COLUMN.to_string(), AMOUNT_COLUMN.to_string()],
            order: TransformOrder::ProjectThenScale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        BalanceConfig {
            k_neighbors: 5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig {
            test_fraction: 0.3,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub cv_folds: usize,
    /// Draw CV folds from the pre-balance data and oversample only the
    /// training folds.
    pub rebalance_per_fold: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            cv_folds: 5,
            rebalance_per_fold: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub roster: Vec<ModelSpec>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        ModelsConfig {
            roster: ModelSpec::default_roster(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write the full run report as JSON here.
    pub report: Option<PathBuf>,
}

/// Main pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub cleaning: CleaningConfig,
    pub transform: TransformConfig,
    pub balance: BalanceConfig,
    pub split: SplitConfig,
    pub evaluation: EvaluationConfig,
    pub models: ModelsConfig,
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load from an optional TOML file, then apply `FRAUDLAB__*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(PipelineError::Config(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            builder = builder.add_source(File::new(&path.to_string_lossy(), FileFormat::Toml));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let parsed: PipelineConfig = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Parse a TOML document (no environment overrides).
    pub fn from_toml_str(toml: &str) -> PipelineResult<Self> {
        let parsed: PipelineConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject settings no stage could run with.
    pub fn validate(&self) -> PipelineResult<()> {
        let f = self.split.test_fraction;
        if !(f > 0.0 && f < 1.0) {
            return Err(PipelineError::Config(format!(
                "split.test_fraction must be in (0, 1), got {}",
                f
            )));
        }
        if self.balance.k_neighbors == 0 {
            return Err(PipelineError::Config(
                "balance.k_neighbors must be at least 1".into(),
            ));
        }
        if self.evaluation.cv_folds < 2 {
            return Err(PipelineError::Config(format!(
                "evaluation.cv_folds must be at least 2, got {}",
                self.evaluation.cv_folds
            )));
        }
        if self.models.roster.is_empty() {
            return Err(PipelineError::Config("models.roster is empty".into()));
        }
        if self.transform.enabled && self.transform.columns.is_empty() {
            return Err(PipelineError::Config(
                "transform.columns is empty while transform is enabled".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KnnParams, ModelSpec};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.split.test_fraction, 0.3);
        assert_eq!(config.split.seed, 42);
        assert_eq!(config.balance.k_neighbors, 5);
        assert_eq!(config.evaluation.cv_folds, 5);
        assert!(!config.evaluation.rebalance_per_fold);
        assert_eq!(config.transform.order, TransformOrder::ProjectThenScale);
        assert_eq!(config.models.roster.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(PipelineConfig::from_toml_str("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [data]
            path = "data/cc.csv"

            [transform]
            order = "scale_then_project"

            [evaluation]
            rebalance_per_fold = true

            [[models.roster]]
            kind = "knn"
            k = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.data.path, PathBuf::from("data/cc.csv"));
        assert_eq!(config.transform.order, TransformOrder::ScaleThenProject);
        assert_eq!(config.transform.columns, vec!["Time", "Amount"]);
        assert!(config.evaluation.rebalance_per_fold);
        assert_eq!(config.evaluation.cv_folds, 5);
        assert_eq!(
            config.models.roster,
            vec![ModelSpec::Knn(KnnParams { k: 3, ..KnnParams::default() })]
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml_str("[split]\ntest_fraction = 1.5\n"),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[evaluation]\ncv_folds = 1\n"),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[split]\ntest_fraction = \"lots\"\n"),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[balance]\nk_neighbors = 3\nseed = 9").unwrap();
        file.flush().unwrap();
        let config = PipelineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.balance, BalanceConfig { k_neighbors: 3, seed: 9 });

        let missing = PipelineConfig::load(Some(Path::new("/no/such/fraudlab.toml")));
        assert!(matches!(missing, Err(PipelineError::Config(_))));
    }
}
