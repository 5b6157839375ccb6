//! # Scanner Crate
//!
//! Configuration loading and batch orchestration for the arbitrage detector:
//! a YAML [`config::ScanConfig`] describes exchanges and search settings, and
//! a [`scan::Scanner`] turns them into ranked opportunities.

pub mod config;
pub mod scan;

pub use config::{
    AlgorithmSetting, ConfigError, ExchangeConfig, ScanConfig, SearchSettings,
    VolatilityFactorSetting,
};
pub use scan::{ScanError, Scanner};
