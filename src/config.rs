use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APP_NAME: &str = "rusty-odf";
const CONFIG_NAME: &str = "settings";

/// Settings that are saved to the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorSettings {
    pub last_odf_file: Option<PathBuf>,
    pub last_cmb_file: Option<PathBuf>,
    pub log_file_name: String,
}

/// Default settings for a new installation.
impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            last_odf_file: None,
            last_cmb_file: None,
            log_file_name: "rusty-odf.log".to_string(),
        }
    }
}

impl EditorSettings {
    /// The ODF given on the command line, or the one used last time.
    pub fn resolve_odf_file(&self, given: Option<PathBuf>) -> Option<PathBuf> {
        given.or_else(|| self.last_odf_file.clone())
    }
}

/// Loads settings from disk.
pub fn load_settings() -> Result<EditorSettings> {
    let settings: EditorSettings = confy::load(APP_NAME, CONFIG_NAME)?;
    Ok(settings)
}

/// Saves settings to disk.
pub fn save_settings(settings: &EditorSettings) -> Result<()> {
    confy::store(APP_NAME, CONFIG_NAME, settings)?;
    Ok(())
}
