use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read suite '{path}': {source}")]
    ReadSuite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML suite '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to parse JSON suite '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported suite extension '{ext}'. Use .toml or .json.")]
    UnsupportedExtension { ext: String },
    #[error("Suite file must have .toml or .json extension.")]
    MissingExtension,
    #[error("No suite file given and none of {candidates} exists.")]
    SuiteNotFound { candidates: String },
    #[error("Suite must define at least one test.")]
    NoTests,
    #[error("Test at position {index} has an empty id.")]
    EmptyTestId { index: usize },
    #[error("Test id '{id}' is defined more than once.")]
    DuplicateTestId { id: String },
    #[error("Invalid {field} duration: {message}")]
    InvalidDuration { field: &'static str, message: String },
    #[error("Unknown test phase '{value}'.")]
    UnknownPhase { value: String },
    #[error("Config '{field}' must be >= 1.")]
    FieldMustBePositive { field: &'static str },
    #[error("Invalid boolean value '{value}'.")]
    InvalidBoolean { value: String },
}
