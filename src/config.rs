use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::batch::BatchOptions;
use crate::core::drop_order::{DropOrder, DropOrderError, FilterField};
use crate::core::resolver::ResolverOptions;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub resolver: ResolverSettings,
    #[serde(default)]
    pub batch: BatchSettings,
    #[serde(default)]
    pub taxonomy: TaxonomySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String { "https://npiregistry.cms.hhs.gov/api".to_string() }
fn default_api_version() -> String { "2.1".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverSettings {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_stop_after")]
    pub stop_after: u32,
    #[serde(default = "default_start_index")]
    pub start_index: usize,
    /// Relaxation ladder override; not normally changed.
    #[serde(default)]
    pub drop_order: Option<Vec<Vec<FilterField>>>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            stop_after: default_stop_after(),
            start_index: default_start_index(),
            drop_order: None,
        }
    }
}

fn default_page_size() -> u32 { 100 }
fn default_stop_after() -> u32 { 1200 }
fn default_start_index() -> usize { 3 }

#[derive(Debug, Clone, Deserialize)]
pub struct BatchSettings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_max_upstream_failures")]
    pub max_upstream_failures: u32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            overwrite: false,
            max_upstream_failures: default_max_upstream_failures(),
        }
    }
}

fn default_concurrency() -> usize { 4 }
fn default_max_upstream_failures() -> u32 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomySettings {
    /// Path to the specialty-code crosswalk CSV; fuzzy specialty mapping is
    /// skipped when unset.
    #[serde(default)]
    pub crosswalk: Option<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for TaxonomySettings {
    fn default() -> Self {
        Self {
            crosswalk: None,
            threshold: default_threshold(),
        }
    }
}

fn default_threshold() -> f64 { 0.95 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the structs
    /// 2. Configuration file (config/default.toml, config/local.toml)
    /// 3. Environment variables (prefixed with NPI__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            // Local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // e.g., NPI__RESOLVER__PAGE_SIZE -> resolver.page_size
            .add_source(
                Environment::with_prefix("NPI")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("NPI")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Resolver options from the `[resolver]` section, building the ladder
    /// from the override when one is configured.
    pub fn resolver_options(&self) -> Result<ResolverOptions, DropOrderError> {
        let drop_order = match &self.resolver.drop_order {
            Some(groups) => DropOrder::from_groups(groups.clone())?,
            None => DropOrder::default(),
        };
        Ok(ResolverOptions {
            page_size: self.resolver.page_size,
            stop_after: self.resolver.stop_after,
            start_index: self.resolver.start_index,
            drop_order,
        })
    }

    /// Batch options from the `[batch]` section.
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            concurrency: self.batch.concurrency,
            overwrite: self.batch.overwrite,
            max_upstream_failures: self.batch.max_upstream_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.registry.base_url, "https://npiregistry.cms.hhs.gov/api");
        assert_eq!(settings.registry.version, "2.1");
        assert_eq!(settings.resolver.page_size, 100);
        assert_eq!(settings.resolver.stop_after, 1200);
        assert_eq!(settings.resolver.start_index, 3);
        assert_eq!(settings.batch.concurrency, 4);
        assert!(!settings.batch.overwrite);
    }

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
    }

    #[test]
    fn test_resolver_options_from_defaults() {
        let settings = Settings::default();
        let options = settings.resolver_options().unwrap();
        assert_eq!(options.drop_order.len(), 5);
        assert_eq!(options.start_index, 3);
    }

    #[test]
    fn test_drop_order_override_parses() {
        let toml = r#"
            [resolver]
            drop_order = [["city"], ["state"], ["first_name", "last_name"]]
        "#;
        let settings: Settings = toml::from_str(toml).unwrap();
        let options = settings.resolver_options().unwrap();
        assert_eq!(options.drop_order.len(), 3);
    }

    #[test]
    fn test_bad_drop_order_override_rejected() {
        let toml = r#"
            [resolver]
            drop_order = [["city"], ["state"]]
        "#;
        let settings: Settings = toml::from_str(toml).unwrap();
        assert!(settings.resolver_options().is_err());
    }
}
