use super::Config;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::Path;

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Self::load_or_init_in(&home.join(".hearth"))
    }

    /// Load `config.toml` from `hearth_dir`, writing defaults on first run.
    pub fn load_or_init_in(hearth_dir: &Path) -> Result<Self> {
        let config_path = hearth_dir.join("config.toml");

        if !hearth_dir.exists() {
            fs::create_dir_all(hearth_dir).context("Failed to create .hearth directory")?;
            fs::create_dir_all(hearth_dir.join("workspace"))
                .context("Failed to create workspace directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config.workspace_dir = hearth_dir.join("workspace");
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                workspace_dir: hearth_dir.join("workspace"),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
