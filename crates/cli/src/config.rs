use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use framebal::RegistryConfig;

/// Load the registry config from `path`, or the presets when no path is given.
/// Environment overrides apply in both cases.
pub fn load(path: Option<&Path>) -> Result<RegistryConfig> {
    match path {
        Some(path) => {
            debug!(config_path = %path.display(), "Loading balancer config");
            RegistryConfig::from_file(path)
                .with_context(|| format!("failed to load config: {}", path.display()))
        }
        None => {
            debug!("No config file given, using presets");
            let mut config = RegistryConfig::presets();
            config.apply_env_overrides();
            config
                .validate()
                .context("preset config is invalid after env overrides")?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_uses_presets() {
        let config = load(None).unwrap();
        assert!(config.balancers.contains_key("default"));
        assert!(config.balancers.contains_key("ai"));
    }

    #[test]
    fn loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[balancers.scan]\nbase_budget = 3\nwindow_seconds = 0.5\nqueue_capacity = 10\ngrowth_increment = 1"
        )
        .unwrap();
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.balancers["scan"].base_budget, 3);
    }

    #[test]
    fn bad_file_reports_path() {
        let err = load(Some(Path::new("/nonexistent/framebal.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/framebal.toml"));
    }
}
