//! Suite file loading and resolution against command line overrides.
mod apply;
mod loader;
mod parse;
pub mod types;

#[cfg(test)]
mod tests;

pub use apply::{RunSettings, build_suite, resolve_run, resolve_suite};
pub use loader::{DEFAULT_SUITE_FILES, load_suite, load_suite_file};

pub(crate) use parse::parse_duration_value;
