//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Load configuration from a TOML file.
///
/// Address and option validation happens later, when the options are
/// applied to a server.
pub fn load_config(path: &Path) -> Result<AppConfig, LoadError> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    parse_config(&content).map_err(|source| LoadError::Parse {
        path: display,
        source,
    })
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(content)
}
