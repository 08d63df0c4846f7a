use tracing::debug;

use mortgage_core::config::SimulatorConfig;
use mortgage_core::profiles::{ProfileOverride, ProfileStore};

use crate::input;

/// Configuration and profile snapshot shared by every subcommand.
pub struct Context {
    pub config: SimulatorConfig,
    pub store: ProfileStore,
}

impl Context {
    pub fn load(
        config_path: Option<&str>,
        overrides_path: Option<&str>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let config = match config_path {
            Some(path) => load_config(path)?,
            None => SimulatorConfig::default(),
        };
        config.validate()?;

        let store = match overrides_path {
            Some(path) => {
                let overrides: Vec<ProfileOverride> = input::file::read_json(path)?;
                debug!(count = overrides.len(), path, "applying profile overrides");
                ProfileStore::new().with_overrides(&overrides)?
            }
            None => ProfileStore::new(),
        };

        Ok(Context { config, store })
    }
}

/// Read a YAML simulator configuration. Missing keys keep their defaults.
pub fn load_config(path: &str) -> Result<SimulatorConfig, Box<dyn std::error::Error>> {
    let (canonical, contents) = input::file::read_text(path)?;
    let config: SimulatorConfig = serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse config file '{}': {e}", canonical.display()))?;
    debug!(path, "loaded simulator config");
    Ok(config)
}
