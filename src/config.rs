//! Settings file of the `refocus` binary

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{AutofocusConfig, RefocusConfig};

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("failed to open the settings file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse the settings file")]
    Json(#[from] serde_json::Error),
}

/// Session, autofocus and worker settings
///
/// ```
/// let settings: refocus::Settings = serde_json::from_str(
///     r#"{
///         "refocus": {"wavelength": 500e-9, "pixel_size": 1e-7, "kernel": "fresnel"},
///         "autofocus": {"interval": [-5e-6, 5e-6], "metric": "rms contrast", "roi": [[10, 90], [10, 90]]},
///         "workers": 4
///     }"#,
/// )
/// .unwrap();
/// assert_eq!(settings.workers, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub refocus: RefocusConfig,
    #[serde(default)]
    pub autofocus: Option<AutofocusConfig>,
    /// Number of worker threads for stacks, 0 for every logical CPU
    #[serde(default)]
    pub workers: usize,
}
impl Settings {
    pub fn new(refocus: RefocusConfig) -> Self {
        Self {
            refocus,
            autofocus: None,
            workers: 0,
        }
    }
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        log::info!("loading settings from {path:?}");
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
    pub fn to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
