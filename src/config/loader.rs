use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult, ConfigError};

use super::types::SuiteFile;

/// Suite file names checked when no path is given.
pub const DEFAULT_SUITE_FILES: [&str; 2] = ["suite.toml", "suite.json"];

/// Loads a suite file from the provided path or the default locations.
/// Returns `None` when no path is given and no default file exists.
///
/// # Errors
///
/// Returns an error when the suite file cannot be read or parsed.
pub fn load_suite(path: Option<&str>) -> AppResult<Option<SuiteFile>> {
    if let Some(path) = path {
        let path = PathBuf::from(path);
        return Ok(Some(load_suite_file(&path)?));
    }

    for candidate in DEFAULT_SUITE_FILES {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Ok(Some(load_suite_file(&path)?));
        }
    }

    Ok(None)
}

/// Reads and parses one suite file; the extension picks the format.
///
/// # Errors
///
/// Returns an error when the file cannot be read, has no or an unsupported
/// extension, or does not parse.
pub fn load_suite_file(path: &Path) -> AppResult<SuiteFile> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::ReadSuite {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some("json") => serde_json::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseJson {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some(ext) => Err(AppError::config(ConfigError::UnsupportedExtension {
            ext: ext.to_owned(),
        })),
        None => Err(AppError::config(ConfigError::MissingExtension)),
    }
}
