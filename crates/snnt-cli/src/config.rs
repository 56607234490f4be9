//! Configuration file handling for the snnt CLI

use std::path::{Path, PathBuf};

use snnt_compiler::SimulationConfig;

use crate::error::{CliError, CliResult};

/// Default configuration file path
pub fn default_config_path() -> CliResult<PathBuf> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| CliError::config("Could not determine config directory"))?;
    Ok(config_dir.join("snnt").join("config.toml"))
}

/// Parse a configuration file and validate it
pub fn load_from_file(path: &Path) -> CliResult<SimulationConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: SimulationConfig = toml::from_str(&content)?;
    config
        .validate()
        .map_err(|e| CliError::config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Resolve the configuration for a command.
///
/// An explicit path must exist. Otherwise the default path is used when
/// present, and built-in defaults when not.
pub fn resolve(explicit: Option<&Path>) -> CliResult<SimulationConfig> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(CliError::missing_resource(format!(
                "configuration file {}",
                path.display()
            )));
        }
        tracing::debug!("Loading configuration from {}", path.display());
        return load_from_file(path);
    }

    match default_config_path() {
        Ok(path) if path.is_file() => {
            tracing::debug!("Loading configuration from {}", path.display());
            load_from_file(&path)
        }
        _ => Ok(SimulationConfig::default()),
    }
}

/// Write `config` as TOML, creating parent directories
pub fn save_to_file(config: &SimulationConfig, path: &Path) -> CliResult<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| CliError::config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = SimulationConfig::default();
        config.output.plot_vars.insert("spikecounts".to_string());
        save_to_file(&config, &path).unwrap();

        let loaded = load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[cell]\nv_thresh = 2.0\ntau_syn_E = 0.5\n\n[simulation]\nduration = 50.0\npoisson_input = true\n",
        )
        .unwrap();

        let config = resolve(Some(&path)).unwrap();
        assert_eq!(config.cell.params.v_thresh, 2.0);
        assert_eq!(config.cell.params.tau_syn_e, 0.5);
        assert_eq!(config.cell.delay, 1.0);
        assert_eq!(config.simulation.duration, 50.0);
        assert!(config.simulation.poisson_input);
    }

    #[test]
    fn test_invalid_and_missing_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[simulation]\ndt = -1.0\n").unwrap();
        assert!(matches!(resolve(Some(&path)), Err(CliError::Config(_))));

        let missing = dir.path().join("absent.toml");
        assert!(matches!(resolve(Some(&missing)), Err(CliError::MissingResource(_))));
    }
}
