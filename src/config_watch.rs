use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;

use log::{debug, warn};
use notify::{recommended_watcher, RecursiveMode, Watcher};

use crate::config;
use crate::gate::SharedTrustedHosts;
use crate::trusted_hosts::TrustedHosts;

/// Watches the config files and swaps refreshed trust snapshots into the
/// running gates, keyed by bind address. Trust decisions are
/// security-sensitive, so edits take effect without a restart; a reload
/// that fails to parse is logged and the previous configuration stays in
/// effect.
///
/// Editors and deploy tools commonly replace a config file by renaming a
/// temp file over it, which would orphan a watch held on the file itself.
/// The watch therefore goes on each parent directory, with events filtered
/// down to the config file names.
pub fn spawn(config_paths: Vec<String>, gates: HashMap<SocketAddr, SharedTrustedHosts>) {
    std::thread::spawn(move || {
        if let Err(e) = watch_loop(&config_paths, &gates) {
            warn!("Config watcher stopped: {}", e);
        }
    });
}

fn watch_loop(
    config_paths: &[String],
    gates: &HashMap<SocketAddr, SharedTrustedHosts>,
) -> notify::Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = recommended_watcher(tx)?;
    let mut watched_dirs = HashSet::new();
    for config_path in config_paths {
        let dir = watch_dir(config_path);
        if watched_dirs.insert(dir.clone()) {
            watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        }
    }
    let config_file_names = config_file_names(config_paths);

    for result in rx {
        match result {
            Ok(event) => {
                let relevant_kind =
                    event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove();
                if relevant_kind && touches_config_file(&event.paths, &config_file_names) {
                    reload(config_paths, gates);
                }
            }
            Err(e) => warn!("Config watch error: {}", e),
        }
    }
    Ok(())
}

/// The directory whose entries are watched on behalf of `config_path`.
fn watch_dir(config_path: &str) -> PathBuf {
    match Path::new(config_path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn config_file_names(config_paths: &[String]) -> Vec<OsString> {
    config_paths
        .iter()
        .filter_map(|config_path| {
            Path::new(config_path)
                .file_name()
                .map(|name| name.to_os_string())
        })
        .collect()
}

fn touches_config_file(event_paths: &[PathBuf], config_file_names: &[OsString]) -> bool {
    event_paths.iter().any(|path| {
        path.file_name()
            .map(|name| config_file_names.iter().any(|config_name| config_name == name))
            .unwrap_or(false)
    })
}

fn reload(config_paths: &[String], gates: &HashMap<SocketAddr, SharedTrustedHosts>) {
    let gate_configs = match config::load_gate_configs_sync(config_paths) {
        Ok(gate_configs) => gate_configs,
        Err(e) => {
            warn!("Keeping previous config, reload failed: {}", e);
            return;
        }
    };

    for gate_config in gate_configs {
        if let Some(shared) = gates.get(&gate_config.bind_address) {
            *shared.write() = Arc::new(TrustedHosts::from_config(&gate_config));
            debug!("Reloaded trusted domains for {}", gate_config.bind_address);
        }
    }
}
