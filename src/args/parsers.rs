use std::time::Duration;

use crate::config::parse_duration_value;
use crate::error::ConfigError;
use crate::protocol::TestPhase;

pub(crate) fn parse_bool_env(s: &str) -> Result<bool, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBoolean {
            value: s.to_owned(),
        }),
    }
}

pub(crate) fn parse_duration_arg(s: &str) -> Result<Duration, ConfigError> {
    parse_duration_value(s).map_err(|message| ConfigError::InvalidDuration {
        field: "argument",
        message,
    })
}

pub(crate) fn parse_phase(s: &str) -> Result<TestPhase, ConfigError> {
    s.parse::<TestPhase>()
}
