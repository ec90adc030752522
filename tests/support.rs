use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

/// Runs the `loadcoord` binary with `args` and errors-only logging.
///
/// # Errors
///
/// Returns an error if the binary path is unknown or the process cannot be
/// started.
pub fn run_loadcoord<I, S>(args: I, workdir: &Path) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = loadcoord_bin()?;
    Command::new(bin)
        .args(args)
        .current_dir(workdir)
        .env("LOADCOORD_LOG", "error")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .map_err(|err| format!("run loadcoord failed: {}", err))
}

/// Formats both output streams for an error message.
#[must_use]
pub fn describe(output: &Output) -> String {
    format!(
        "status: {}\nstdout: {}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn loadcoord_bin() -> Result<String, String> {
    option_env!("CARGO_BIN_EXE_loadcoord").map_or_else(
        || Err("CARGO_BIN_EXE_loadcoord missing at compile time.".to_owned()),
        |path| Ok(path.to_owned()),
    )
}
