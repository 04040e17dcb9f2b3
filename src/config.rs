//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to built-in
//! defaults. See `config/dtc.example.toml` for a full example.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use datatake_completeness_core::cascade::DEFAULT_MAX_DEPTH;
use datatake_completeness_core::mission::s1::{
    default_excluded_product_types, DEFAULT_AREA_THRESHOLD, OCEAN_MASK, SLC_MASK,
};
use datatake_completeness_core::models::ExpectedValue;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cascade: CascadeConfig,
    #[serde(default)]
    pub masks: MasksConfig,
    #[serde(default)]
    pub tiles: TilesConfig,
    #[serde(default)]
    pub inbox: Option<InboxConfig>,
    #[serde(default)]
    pub missions: MissionsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "warn".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CascadeConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

#[derive(Debug, Deserialize, Clone)]
pub struct MasksConfig {
    /// Mask name → GeoJSON file.
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,
    /// Mask name → minimum coverage percentage.
    #[serde(default = "default_thresholds")]
    pub thresholds: BTreeMap<String, f64>,
}

impl Default for MasksConfig {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            thresholds: default_thresholds(),
        }
    }
}

fn default_thresholds() -> BTreeMap<String, f64> {
    [OCEAN_MASK, SLC_MASK]
        .into_iter()
        .map(|name| (name.to_string(), DEFAULT_AREA_THRESHOLD))
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TilesConfig {
    #[serde(default = "default_tiles_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            provider: default_tiles_provider(),
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TilesConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_tiles_provider() -> String {
    "disabled".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct InboxConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.json".to_string(), "**/*.jsonl".to_string()]
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MissionsConfig {
    #[serde(default)]
    pub s1: S1Config,
    #[serde(default)]
    pub s2: TableMissionConfig,
    #[serde(default)]
    pub s3: TableMissionConfig,
    #[serde(default)]
    pub s5: TableMissionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S1Config {
    /// Only products from this service type count as siblings.
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default = "default_excluded_product_types")]
    pub excluded_product_types: Vec<String>,
}

impl Default for S1Config {
    fn default() -> Self {
        Self {
            service_type: None,
            excluded_product_types: default_excluded_product_types(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TableMissionConfig {
    #[serde(default)]
    pub service_type: Option<String>,
    /// Product type → expected value, merged over the built-in table.
    #[serde(default)]
    pub expected: BTreeMap<String, ExpectedValue>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.cascade.max_depth == 0 {
        bail!("cascade.max_depth must be >= 1");
    }

    for (mask, threshold) in &config.masks.thresholds {
        if !(0.0..=100.0).contains(threshold) {
            bail!("masks.thresholds.{} must be in [0, 100]", mask);
        }
    }

    match config.tiles.provider.as_str() {
        "disabled" => {}
        "http" => {
            if config.tiles.url.as_deref().map_or(true, str::is_empty) {
                bail!("tiles.url must be specified when provider is 'http'");
            }
        }
        other => bail!(
            "Unknown tiles provider: '{}'. Must be disabled or http.",
            other
        ),
    }

    let tables = [
        ("s2", &config.missions.s2),
        ("s3", &config.missions.s3),
        ("s5", &config.missions.s5),
    ];
    for (mission, table) in tables {
        for (product_type, expected) in &table.expected {
            if expected.value < 0 {
                bail!(
                    "missions.{}.expected.{} must be >= 0",
                    mission,
                    product_type
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datatake_completeness_core::models::ExpectedKind;

    fn parse(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse("[db]\npath = \"./data/dtc.sqlite\"\n").unwrap();
        assert_eq!(config.logging.filter, "warn");
        assert_eq!(config.cascade.max_depth, 8);
        assert_eq!(config.masks.thresholds.get("OCN"), Some(&50.0));
        assert!(!config.tiles.is_enabled());
        assert!(config.inbox.is_none());
        assert_eq!(config.missions.s1.excluded_product_types.len(), 3);
        assert_eq!(config.missions.s1.service_type, None);
    }

    #[test]
    fn expected_overrides_parse() {
        let config = parse(
            r#"
[db]
path = "x.sqlite"

[missions.s3.expected]
OL_1_EFR___ = { kind = "sensing", value = 6060000000 }
"#,
        )
        .unwrap();
        let value = config.missions.s3.expected["OL_1_EFR___"];
        assert_eq!(value.kind, ExpectedKind::Sensing);
        assert_eq!(value.value, 6_060_000_000);
    }

    #[test]
    fn http_tiles_require_url() {
        let err = parse("[db]\npath = \"x\"\n[tiles]\nprovider = \"http\"\n").unwrap_err();
        assert!(err.to_string().contains("tiles.url"));

        let err = parse("[db]\npath = \"x\"\n[tiles]\nprovider = \"grpc\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown tiles provider"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse("[db]\npath = \"x\"\n[cascade]\nmax_depth = 0\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[masks.thresholds]\nOCN = 120.0\n").is_err());
        assert!(parse(
            "[db]\npath = \"x\"\n[missions.s5.expected]\nL2__O3____ = { kind = \"count\", value = -1 }\n"
        )
        .is_err());
    }
}
