use common::{Asset, Price};
use detector::cost::DEFAULT_VOLATILITY_FACTOR;
use detector::{Algorithm, BuilderConfig, SearchConfig, VolatilityMode};
use price_source::{SourceRegistry, StaticPriceSource, DEFAULT_TRANSFER_TIME_SECS};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    pub exchanges: Vec<ExchangeConfig>,
    #[serde(default)]
    pub search: SearchSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeConfig {
    pub name: String,
    /// Falls back to `search.default_fee_rate`.
    pub fee_rate: Option<Decimal>,
    /// Falls back to `search.default_transfer_time_secs`.
    pub transfer_time_secs: Option<Decimal>,
    /// Stablecoin symbol to fiat price.
    pub prices: BTreeMap<String, Decimal>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchSettings {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_algorithm")]
    pub algorithm: AlgorithmSetting,
    /// A non-negative number, or the string `"adaptive"`.
    #[serde(default = "default_volatility_factor")]
    pub volatility_factor: VolatilityFactorSetting,
    #[serde(default = "default_weight")]
    pub weight: Decimal,
    #[serde(default)]
    pub max_edges_per_node: Option<usize>,
    #[serde(default)]
    pub node_budget: Option<usize>,
    #[serde(default = "default_fee_rate")]
    pub default_fee_rate: Decimal,
    #[serde(default = "default_transfer_time")]
    pub default_transfer_time_secs: Decimal,
}

fn default_max_depth() -> usize {
    6
}

fn default_algorithm() -> AlgorithmSetting {
    AlgorithmSetting::CostOptimal
}

fn default_volatility_factor() -> VolatilityFactorSetting {
    VolatilityFactorSetting::Fixed(DEFAULT_VOLATILITY_FACTOR)
}

fn default_weight() -> Decimal {
    Decimal::ONE
}

fn default_fee_rate() -> Decimal {
    dec!(0.001)
}

fn default_transfer_time() -> Decimal {
    DEFAULT_TRANSFER_TIME_SECS
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            max_depth: default_max_depth(),
            algorithm: default_algorithm(),
            volatility_factor: default_volatility_factor(),
            weight: default_weight(),
            max_edges_per_node: None,
            node_budget: None,
            default_fee_rate: default_fee_rate(),
            default_transfer_time_secs: default_transfer_time(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmSetting {
    CostOptimal,
    Heuristic,
    Weighted,
}

impl From<AlgorithmSetting> for Algorithm {
    fn from(setting: AlgorithmSetting) -> Self {
        match setting {
            AlgorithmSetting::CostOptimal => Algorithm::CostOptimal,
            AlgorithmSetting::Heuristic => Algorithm::Heuristic,
            AlgorithmSetting::Weighted => Algorithm::Weighted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum VolatilityFactorSetting {
    Fixed(Decimal),
    Named(String),
}

impl SearchSettings {
    fn volatility_mode(&self) -> VolatilityMode {
        match &self.volatility_factor {
            VolatilityFactorSetting::Fixed(factor) => VolatilityMode::Fixed(*factor),
            VolatilityFactorSetting::Named(_) => VolatilityMode::Adaptive {
                base: DEFAULT_VOLATILITY_FACTOR,
            },
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            max_depth: self.max_depth,
            algorithm: self.algorithm.into(),
            volatility: self.volatility_mode(),
            weight: self.weight,
            node_budget: self.node_budget,
            ..SearchConfig::default()
        }
    }

    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            volatility: self.volatility_mode(),
            max_edges_per_node: self.max_edges_per_node,
        }
    }
}

impl ScanConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::IoError)?;
        let config: ScanConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path.as_ref(), content).map_err(ConfigError::IoError)?;
        Ok(())
    }

    /// Get exchange configuration by name
    pub fn get_exchange_config(&self, name: &str) -> Option<&ExchangeConfig> {
        self.exchanges.iter().find(|exchange| exchange.name == name)
    }

    /// Validate configuration. Called before any graph is built so a bad
    /// value fails fast instead of mid-batch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchanges.is_empty() {
            return Err(ConfigError::ValidationError(
                "No exchanges configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for exchange in &self.exchanges {
            if exchange.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "Exchange name cannot be empty".to_string(),
                ));
            }
            if !names.insert(exchange.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Exchange '{}' configured twice",
                    exchange.name
                )));
            }
            if exchange.prices.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "No prices configured for exchange '{}'",
                    exchange.name
                )));
            }
            for (symbol, price) in &exchange.prices {
                if *price <= Decimal::ZERO {
                    return Err(ConfigError::ValidationError(format!(
                        "Price for {symbol} on '{}' must be positive, got {price}",
                        exchange.name
                    )));
                }
            }
            if exchange.fee_rate.is_some_and(|rate| rate < Decimal::ZERO) {
                return Err(ConfigError::ValidationError(format!(
                    "Fee rate for exchange '{}' cannot be negative",
                    exchange.name
                )));
            }
            if exchange
                .transfer_time_secs
                .is_some_and(|secs| secs <= Decimal::ZERO)
            {
                return Err(ConfigError::ValidationError(format!(
                    "Transfer time for exchange '{}' must be positive",
                    exchange.name
                )));
            }
        }

        if self.search.max_depth < 2 {
            return Err(ConfigError::ValidationError(
                "max_depth must be at least 2".to_string(),
            ));
        }
        if self.search.weight < Decimal::ONE {
            return Err(ConfigError::ValidationError(
                "Heuristic weight must be at least 1".to_string(),
            ));
        }
        match &self.search.volatility_factor {
            VolatilityFactorSetting::Fixed(factor) if *factor < Decimal::ZERO => {
                return Err(ConfigError::ValidationError(
                    "volatility_factor cannot be negative".to_string(),
                ));
            }
            VolatilityFactorSetting::Named(name) if name != "adaptive" => {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown volatility_factor setting '{name}', expected a number or \"adaptive\""
                )));
            }
            _ => {}
        }
        if self.search.max_edges_per_node.is_some_and(|k| k < 1) {
            return Err(ConfigError::ValidationError(
                "max_edges_per_node must be at least 1".to_string(),
            ));
        }
        if self.search.default_fee_rate < Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "default_fee_rate cannot be negative".to_string(),
            ));
        }
        if self.search.default_transfer_time_secs <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "default_transfer_time_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Builds the source registry the configuration describes.
    pub fn registry(&self) -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        for exchange in &self.exchanges {
            let prices = exchange
                .prices
                .iter()
                .map(|(symbol, price)| (Asset::from(symbol.as_str()), Price(*price)));
            let source = StaticPriceSource::new(
                exchange.name.as_str(),
                prices,
                exchange.fee_rate.unwrap_or(self.search.default_fee_rate),
            )
            .with_transfer_time(
                exchange
                    .transfer_time_secs
                    .unwrap_or(self.search.default_transfer_time_secs),
            );
            registry.register(Arc::new(source));
        }
        registry
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
