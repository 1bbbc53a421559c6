use crate::cli::Args;
use crate::output;
use anyhow::{anyhow, bail, Context, Result};
use peerlink_core::config::get_default_config_file;
use peerlink_core::{BridgeConfig, ErrorPolicy};
use peerlink_host::{Bridge, HostDocument};
use reqwest::Url;
use std::path::Path;
use tracing::{debug, info, warn};

const APP_NAME: &str = "peerlink";

/// Loads the config file and lays the command-line flags over it.
pub fn resolve_config(args: &Args) -> Result<BridgeConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => get_default_config_file(APP_NAME)?,
    };
    let file_config = BridgeConfig::load_from_file(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    debug!("Loaded config from {}", path.display());

    let defaults = BridgeConfig::default();
    let overrides = BridgeConfig {
        namespace: args.namespace.clone().unwrap_or(defaults.namespace),
        bootstrap_context: args.scope.clone().unwrap_or(defaults.bootstrap_context),
        source_base_url: args.base_url.clone(),
        request_timeout_secs: args.timeout.unwrap_or(defaults.request_timeout_secs),
        error_policy: if args.forward_errors {
            ErrorPolicy::Forward
        } else {
            defaults.error_policy
        },
        module_command: args.module.clone(),
        log_level: args.log_level.clone(),
        ..BridgeConfig::default()
    };
    let mut config = file_config.merge(&overrides);

    if config.source_base_url.is_none() {
        if let Some(document) = &args.document {
            config.source_base_url = Some(document_base_url(document)?);
        }
    }
    Ok(config)
}

/// URL of the directory holding `document`, so its relative sources resolve beside it.
pub fn document_base_url(document: &Path) -> Result<String> {
    let absolute = std::path::absolute(document)
        .with_context(|| format!("Failed to resolve {}", document.display()))?;
    let directory = absolute
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent directory", absolute.display()))?;
    let url = Url::from_directory_path(directory)
        .map_err(|_| anyhow!("Cannot express {} as a URL", directory.display()))?;
    Ok(url.to_string())
}

pub async fn run(args: Args, config: BridgeConfig) -> Result<()> {
    if config.module_command.is_empty() {
        bail!("No module command given; pass it after `--` or set module_command in the config");
    }

    let document = match &args.document {
        Some(path) => {
            let html = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read document {}", path.display()))?;
            Some(HostDocument::from_html(&html, &config.script_type))
        }
        None => None,
    };

    let bridge = Bridge::new(config).context("Failed to set up the bridge")?;
    bridge
        .open_process(&[])
        .await
        .context("Failed to launch the module")?;
    if let Some(pid) = bridge.transport().process_id().await {
        info!(pid, "Module process running");
    }

    if let Some(document) = &document {
        info!(blocks = document.blocks().len(), "Bootstrapping host document");
        bridge.bootstrap(document).await?;
    }
    for command in &args.sends {
        bridge.formatter().immediate(command).await?;
    }

    tokio::select! {
        _ = bridge.closed() => output::print_module_exit(),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Interrupted, shutting down");
        }
    }

    bridge.close().await;
    output::print_surfaced(&bridge.reporter().drain());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "namespace = \"nacl\"\nrequest_timeout_secs = 5\nmodule_command = [\"old\"]\n",
        )
        .unwrap();

        let args = Args::try_parse_from([
            "peerlink",
            "--config",
            path.to_str().unwrap(),
            "--timeout",
            "9",
            "--forward-errors",
            "--",
            "new-module",
        ])
        .unwrap();
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.namespace, "nacl");
        assert_eq!(config.request_timeout_secs, 9);
        assert_eq!(config.error_policy, ErrorPolicy::Forward);
        assert_eq!(config.module_command, vec!["new-module".to_string()]);
    }

    #[test]
    fn test_base_url_defaults_to_document_directory() {
        let dir = tempdir().unwrap();
        let document = dir.path().join("index.html");
        let args = Args::try_parse_from([
            "peerlink",
            "--config",
            dir.path().join("none.toml").to_str().unwrap(),
            "--document",
            document.to_str().unwrap(),
        ])
        .unwrap();
        let config = resolve_config(&args).unwrap();

        let base = config.source_base_url.unwrap();
        assert!(base.starts_with("file://"));
        assert!(base.ends_with('/'));
    }

    #[tokio::test]
    async fn test_run_without_module_fails() {
        let args = Args::try_parse_from(["peerlink"]).unwrap();
        assert!(run(args, BridgeConfig::default()).await.is_err());
    }
}
