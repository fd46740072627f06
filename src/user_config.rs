use serde::{Deserialize, Serialize};

const APP_NAME: &str = "hostgeo";
const FILE_NAME: Option<&str> = None;

/// Persisted defaults. Anything given on the command line wins.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct UserConfig {
  pub workers: Option<usize>,
  pub service_url: Option<String>,
  pub vincenty: Option<bool>,
}

/// Read ~/.config/hostgeo/default-config.toml (or OS equivalent).
pub fn load() -> UserConfig {
  confy::load(APP_NAME, FILE_NAME).unwrap_or_default()
}

pub fn store(cfg: &UserConfig) -> anyhow::Result<()> {
  confy::store(APP_NAME, FILE_NAME, cfg).map_err(Into::into)
}

pub fn path() -> anyhow::Result<std::path::PathBuf> {
  confy::get_configuration_file_path(APP_NAME, FILE_NAME).map_err(Into::into)
}
