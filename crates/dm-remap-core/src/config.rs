//! Configuration for building a segment table outside the kernel.
//!
//! Configuration is loaded from YAML files and validated before use. It
//! declares the block devices that device paths resolve to and the table
//! definition lines to build.
//!
//! ```yaml
//! devices:
//!   - path: /dev/sda
//!     major: 8
//!     minor: 0
//! table:
//!   - "0 1024 linear /dev/sda 2048"
//!   - "1024 512 io-err"
//! ```

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::device::{DeviceId, MemoryDeviceTable};
use crate::error::{ConfigError, ConfigResult};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemapConfig {
    /// Devices that table lines may refer to.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    /// Table definition lines, `<start> <length> <target-type> <args...>`.
    pub table: Vec<String>,

    /// Prometheus metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A block device resolvable by path.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Device path as written in table lines.
    /// Supports environment variable expansion: "${DATA_DISK}"
    pub path: String,

    /// Major device number.
    pub major: u32,

    /// Minor device number.
    pub minor: u32,
}

impl DeviceConfig {
    /// Get the path with environment variables expanded.
    #[must_use]
    pub fn path(&self) -> String {
        expand_env_vars(&self.path)
    }

    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        DeviceId::new(self.major, self.minor)
    }
}

/// Expand environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable `VAR_NAME`.
/// If the variable is not set, replaces with an empty string.
fn expand_env_vars(s: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex");
    re.replace_all(s, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .to_string()
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Whether to collect construct and mapping metrics.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

// Default value functions

fn default_metrics_enabled() -> bool {
    false
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Configuration loading and validation

impl RemapConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Load configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - a device path is empty after expansion
    /// - two devices share a path
    /// - the table has no non-comment lines
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            let path = device.path();
            if path.is_empty() {
                return Err(ConfigError::EmptyDevicePath(device.device_id()));
            }
            if !seen.insert(path.clone()) {
                return Err(ConfigError::DuplicateDevice(path));
            }
        }

        let has_segment = self.table.iter().any(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        });
        if !has_segment {
            return Err(ConfigError::EmptyTable);
        }

        Ok(())
    }

    /// Build an in-memory device table holding the configured devices.
    #[must_use]
    pub fn device_table(&self) -> MemoryDeviceTable {
        let table = MemoryDeviceTable::new();
        for device in &self.devices {
            table.insert_device(device.path(), device.device_id());
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceTable;

    const YAML: &str = r#"
devices:
  - path: /dev/sda
    major: 8
    minor: 0
  - path: /dev/sdb
    major: 8
    minor: 16
table:
  - "0 1024 linear /dev/sda 2048"
  - "1024 512 io-err"
"#;

    #[test]
    fn test_from_yaml_string() {
        let config = RemapConfig::from_str(YAML).unwrap();
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.table.len(), 2);
        assert_eq!(config.devices[1].device_id(), DeviceId::new(8, 16));
    }

    #[test]
    fn test_default_values_applied() {
        let config = RemapConfig::from_str(YAML).unwrap();
        assert!(!config.metrics.enabled);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_device_table_resolves_paths() {
        let config = RemapConfig::from_str(YAML).unwrap();
        let table = config.device_table();
        assert_eq!(table.lookup_device("/dev/sda"), Ok(DeviceId::new(8, 0)));
        assert_eq!(table.lookup_device("/dev/sdb"), Ok(DeviceId::new(8, 16)));
    }

    #[test]
    fn test_duplicate_device_path() {
        let yaml = r#"
devices:
  - { path: /dev/sda, major: 8, minor: 0 }
  - { path: /dev/sda, major: 8, minor: 1 }
table: ["0 8 io-err"]
"#;
        assert!(matches!(
            RemapConfig::from_str(yaml),
            Err(ConfigError::DuplicateDevice(path)) if path == "/dev/sda"
        ));
    }

    #[test]
    fn test_empty_table() {
        let yaml = r##"
table:
  - "# nothing here"
  - ""
"##;
        assert!(matches!(
            RemapConfig::from_str(yaml),
            Err(ConfigError::EmptyTable)
        ));
    }

    #[test]
    fn test_missing_table_is_parse_error() {
        assert!(matches!(
            RemapConfig::from_str("devices: []"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("DM_REMAP_TEST_DISK", "/dev/nvme0n1");

        let device = DeviceConfig {
            path: "${DM_REMAP_TEST_DISK}".to_string(),
            major: 259,
            minor: 0,
        };
        assert_eq!(device.path(), "/dev/nvme0n1");

        std::env::remove_var("DM_REMAP_TEST_DISK");
    }

    #[test]
    fn test_unset_env_var_gives_empty_path() {
        let yaml = r#"
devices:
  - { path: "${DM_REMAP_UNSET_VARIABLE}", major: 8, minor: 0 }
table: ["0 8 io-err"]
"#;
        assert!(matches!(
            RemapConfig::from_str(yaml),
            Err(ConfigError::EmptyDevicePath(_))
        ));
    }
}
