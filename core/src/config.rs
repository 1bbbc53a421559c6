use crate::errors::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What the dispatcher does with a message that failed to execute.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Surface the failure on the host's error channel.
    #[default]
    Report,
    /// Send the failure to the peer as a background-error command.
    Forward,
}

/// Configuration for one bridge instance
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Peer namespace holding the `wrap`, `coro` and `bgerror` commands.
    pub namespace: String,
    /// Persistent coroutine that coroutine-form commands execute in.
    pub coroutine_context: String,
    /// Evaluation scope targeted by the bootstrap bundle.
    pub bootstrap_context: String,
    /// `type` attribute identifying peer-script blocks in a host document.
    pub script_type: String,
    /// Base URL relative source addresses are resolved against.
    pub source_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub error_policy: ErrorPolicy,
    /// Command line that launches the module process.
    pub module_command: Vec<String>,
    pub log_level: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            namespace: "bridge".to_string(),
            coroutine_context: "::main_coro".to_string(),
            bootstrap_context: "::".to_string(),
            script_type: "text/tcl".to_string(),
            source_base_url: None,
            request_timeout_secs: 30,
            error_policy: ErrorPolicy::Report,
            module_command: Vec::new(),
            log_level: None,
        }
    }
}

impl BridgeConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> BridgeResult<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                BridgeError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                BridgeError::ConfigError(format!("Failed to parse config file: {}", e))
            })?;

            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> BridgeResult<()> {
        let content = toml::to_string(self).map_err(|e| {
            BridgeError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        // Ensure the directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BridgeError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content).map_err(|e| {
            BridgeError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Merges this config with another config, preferring values from the other
    /// config wherever they differ from the defaults
    pub fn merge(&self, other: &Self) -> Self {
        let defaults = Self::default();
        let pick = |theirs: &String, ours: &String, default: &String| {
            if theirs != default {
                theirs.clone()
            } else {
                ours.clone()
            }
        };

        Self {
            namespace: pick(&other.namespace, &self.namespace, &defaults.namespace),
            coroutine_context: pick(
                &other.coroutine_context,
                &self.coroutine_context,
                &defaults.coroutine_context,
            ),
            bootstrap_context: pick(
                &other.bootstrap_context,
                &self.bootstrap_context,
                &defaults.bootstrap_context,
            ),
            script_type: pick(&other.script_type, &self.script_type, &defaults.script_type),
            source_base_url: other
                .source_base_url
                .clone()
                .or_else(|| self.source_base_url.clone()),
            request_timeout_secs: if other.request_timeout_secs != defaults.request_timeout_secs
            {
                other.request_timeout_secs
            } else {
                self.request_timeout_secs
            },
            error_policy: if other.error_policy != defaults.error_policy {
                other.error_policy
            } else {
                self.error_policy
            },
            module_command: if other.module_command.is_empty() {
                self.module_command.clone()
            } else {
                other.module_command.clone()
            },
            log_level: other.log_level.clone().or_else(|| self.log_level.clone()),
        }
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> BridgeResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        BridgeError::ConfigError("Could not determine home directory".to_string())
    })?;

    let config_dir = home_dir.join(".config").join(app_name);

    Ok(config_dir)
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> BridgeResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = BridgeConfig::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.bootstrap_context, "::");
        assert_eq!(config.coroutine_context, "::main_coro");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
namespace = "nacl"
error_policy = "forward"
module_command = ["tclsh", "peer.tcl"]
"#,
        )
        .unwrap();

        let config = BridgeConfig::load_from_file(&path).unwrap();
        assert_eq!(config.namespace, "nacl");
        assert_eq!(config.error_policy, ErrorPolicy::Forward);
        assert_eq!(config.module_command, vec!["tclsh", "peer.tcl"]);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "namespace = [").unwrap();
        assert!(matches!(
            BridgeConfig::load_from_file(&path),
            Err(BridgeError::ConfigError(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = BridgeConfig {
            source_base_url: Some("http://localhost:8000/".to_string()),
            request_timeout_secs: 5,
            ..BridgeConfig::default()
        };
        config.save_to_file(&path).unwrap();
        assert_eq!(BridgeConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_merge_prefers_explicit_values() {
        let file = BridgeConfig {
            namespace: "nacl".to_string(),
            module_command: vec!["peer".to_string()],
            ..BridgeConfig::default()
        };
        let flags = BridgeConfig {
            request_timeout_secs: 2,
            log_level: Some("debug".to_string()),
            ..BridgeConfig::default()
        };
        let merged = file.merge(&flags);
        assert_eq!(merged.namespace, "nacl");
        assert_eq!(merged.module_command, vec!["peer"]);
        assert_eq!(merged.request_timeout_secs, 2);
        assert_eq!(merged.log_level.as_deref(), Some("debug"));
    }
}
