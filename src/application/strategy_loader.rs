use crate::application::strategies::TradingStrategy;
use crate::application::strategy_registry::StrategyRegistry;
use crate::domain::ThresholdStore;
use crate::errors::{CoreError, CoreResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// One entry of the per-strategy YAML listing (SPEC_FULL.md §3 "per-strategy
/// configuration").
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyEntry {
    pub enabled: bool,
    pub class_name: String,
    pub strategy_type: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub description: String,
}

fn default_priority() -> i64 {
    99
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct StrategiesFile {
    strategies: HashMap<String, StrategyEntry>,
}

/// A strategy ready for the Strategy Manager: the live instance plus the
/// bookkeeping the loader resolved for it.
pub struct LoadedStrategy {
    pub strategy_id: String,
    pub instance: Arc<dyn TradingStrategy>,
    pub weight: f64,
    pub priority: i64,
}

/// Reads the strategies YAML and instantiates every enabled entry via the
/// registry, sorted by priority ascending (SPEC_FULL.md §4.4, grounded in
/// `strategy_loader.py`). The loader is the only path that constructs
/// strategies for the live manager.
pub struct StrategyLoader {
    config_path: std::path::PathBuf,
}

impl StrategyLoader {
    pub fn new(config_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn load(&self, registry: &StrategyRegistry, store: &ThresholdStore) -> CoreResult<Vec<LoadedStrategy>> {
        let file = self.read_config()?;
        let mut loaded = Vec::new();

        for (strategy_id, entry) in file.strategies {
            if !entry.enabled {
                tracing::info!(strategy_id, "strategy disabled, skipping");
                continue;
            }

            let registration = registry.get(&entry.class_name)?;
            let instance = (registration.factory)(store);

            loaded.push(LoadedStrategy {
                strategy_id,
                instance,
                weight: entry.weight,
                priority: entry.priority,
            });
        }

        loaded.sort_by_key(|s| s.priority);
        Ok(loaded)
    }

    fn read_config(&self) -> CoreResult<StrategiesFile> {
        let path: &Path = self.config_path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| CoreError::Strategy {
                strategy_name: "StrategyLoader".to_string(),
                message: format!("strategies.yaml not found at {}: {e}", path.display()),
            })?;

        serde_yaml::from_str(&contents).map_err(|e| CoreError::Strategy {
            strategy_name: "StrategyLoader".to_string(),
            message: format!("strategies.yaml parse error: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct TempYaml {
        path: std::path::PathBuf,
    }

    impl TempYaml {
        fn new(name: &str, contents: &str) -> Self {
            let mut path = std::env::temp_dir();
            path.push(format!("regime_core_loader_test_{name}_{}.yaml", std::process::id()));
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(contents.as_bytes()).unwrap();
            Self { path }
        }
    }

    impl Drop for TempYaml {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn threshold_store() -> ThresholdStore {
        ThresholdStore::new("/nonexistent/base.yaml", "/nonexistent/overlay.yaml")
    }

    #[test]
    fn loads_enabled_entries_sorted_by_priority() {
        let yaml = TempYaml::new(
            "strategies",
            r#"
strategies:
  atr_main:
    enabled: true
    class_name: ATRExhaustion
    strategy_type: atr_based
    priority: 2
    weight: 0.5
  adx_main:
    enabled: true
    class_name: ADXTrendStrength
    strategy_type: adx_trend_strength
    priority: 1
    weight: 0.5
  disabled_one:
    enabled: false
    class_name: BBReversal
    strategy_type: bb_reversal
    priority: 0
    weight: 1.0
"#,
        );

        let registry = StrategyRegistry::builtin();
        let store = threshold_store();
        let loader = StrategyLoader::new(&yaml.path);

        let loaded = loader.load(&registry, &store).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].strategy_id, "adx_main");
        assert_eq!(loaded[1].strategy_id, "atr_main");
    }

    #[test]
    fn missing_registration_is_an_error() {
        let yaml = TempYaml::new(
            "strategies_missing",
            r#"
strategies:
  ghost:
    enabled: true
    class_name: DoesNotExist
    strategy_type: nope
    priority: 1
    weight: 1.0
"#,
        );

        let registry = StrategyRegistry::builtin();
        let store = threshold_store();
        let loader = StrategyLoader::new(&yaml.path);

        assert!(loader.load(&registry, &store).is_err());
    }
}
