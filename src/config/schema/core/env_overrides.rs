use super::Config;
use std::path::PathBuf;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) =
            std::env::var("HEARTH_API_KEY").or_else(|_| std::env::var("OPENROUTER_API_KEY"))
            && !key.is_empty()
        {
            self.api_key = Some(key);
        }

        if let Ok(workspace) = std::env::var("HEARTH_WORKSPACE")
            && !workspace.is_empty()
        {
            self.workspace_dir = PathBuf::from(shellexpand::tilde(&workspace).as_ref());
        }

        if let Ok(model) = std::env::var("HEARTH_VISION_MODEL")
            && !model.is_empty()
        {
            self.vision_model = model;
        }

        if let Ok(model) = std::env::var("HEARTH_TEXT_MODEL")
            && !model.is_empty()
        {
            self.text_model = model;
        }

        if let Ok(level) = std::env::var("HEARTH_LOG")
            && !level.is_empty()
        {
            self.observability.log_level = level;
        }
    }
}
