// src/config/loader.rs

//! # Configuration Loader
//!
//! Reads the agent TOML file into a [`Config`]. A missing file is not an
//! error: the agent then runs with the built-in defaults (in-memory counter,
//! console logging at INFO).

use std::{fs, io, path::Path};

use crate::config::model::{Config, ConfigError};

/// Load and parse the agent configuration from `path`.
///
/// Runs before logging is set up, so it does not log; the caller reports
/// [`Config::source`] once its logger is in place.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let txt = match fs::read_to_string(path) {
        Ok(txt) => txt,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => return Err(e.into()),
    };
    let mut cfg = parse(&txt)?;
    cfg.source = Some(path.to_path_buf());
    Ok(cfg)
}

/// Parse configuration text.
pub fn parse(txt: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(txt)?)
}
