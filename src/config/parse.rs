use std::time::Duration;

/// Parses `250ms`, `5s`, `2m`, `1h` or bare seconds. Zero is accepted; fields
/// that need a positive value check that themselves.
pub(crate) fn parse_duration_value(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("Duration must not be empty.".to_owned());
    }

    let mut digits_len = 0usize;
    for ch in value.chars() {
        if ch.is_ascii_digit() {
            digits_len = digits_len.saturating_add(1);
        } else {
            break;
        }
    }
    if digits_len == 0 {
        return Err(format!("Invalid duration '{}'.", value));
    }
    let (num_part, unit_part) = value.split_at(digits_len);
    let number: u64 = num_part
        .parse()
        .map_err(|err| format!("Invalid duration '{}': {}", value, err))?;

    let unit = if unit_part.is_empty() { "s" } else { unit_part.trim() };
    match unit {
        "ms" => Ok(Duration::from_millis(number)),
        "s" => Ok(Duration::from_secs(number)),
        "m" => number
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| "Duration overflow.".to_owned()),
        "h" => number
            .checked_mul(60)
            .and_then(|minutes| minutes.checked_mul(60))
            .map(Duration::from_secs)
            .ok_or_else(|| "Duration overflow.".to_owned()),
        _ => Err(format!("Invalid duration unit '{}'.", unit)),
    }
}
