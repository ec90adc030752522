use std::time::Duration;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;

/// Left-aligns `text` in a field of `width` characters.
pub(crate) fn pad_right(text: &str, width: usize) -> String {
    format!("{:<width$}", text, width = width)
}

/// Renders a duration as `00d 00h 00m 05s`, whole seconds only.
pub(crate) fn seconds_to_human(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total.checked_div(SECS_PER_DAY).unwrap_or(0);
    let hours = total
        .checked_rem(SECS_PER_DAY)
        .and_then(|rest| rest.checked_div(SECS_PER_HOUR))
        .unwrap_or(0);
    let minutes = total
        .checked_rem(SECS_PER_HOUR)
        .and_then(|rest| rest.checked_div(SECS_PER_MINUTE))
        .unwrap_or(0);
    let seconds = total.checked_rem(SECS_PER_MINUTE).unwrap_or(0);
    format!("{days:02}d {hours:02}h {minutes:02}m {seconds:02}s")
}

/// `part` as a percentage of `total` with two decimals; `0.00` for a zero
/// total.
pub(crate) fn format_percentage(part: Duration, total: Duration) -> String {
    let total_ms = total.as_millis();
    if total_ms == 0 {
        return "0.00".to_owned();
    }
    let basis_points = part
        .as_millis()
        .saturating_mul(10_000)
        .checked_div(total_ms)
        .unwrap_or(0);
    format!(
        "{}.{:02}",
        basis_points.checked_div(100).unwrap_or(0),
        basis_points.checked_rem(100).unwrap_or(0)
    )
}

/// Integer with `,` thousands separators.
pub(crate) fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len().saturating_add(digits.len() / 3));
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && digits.len().saturating_sub(idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Float with two decimals and `,` thousands separators in the whole part.
pub(crate) fn format_rate(value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return "0.00".to_owned();
    }
    let hundredths = (value * 100.0).round() as u64;
    format!(
        "{}.{:02}",
        format_count(hundredths.checked_div(100).unwrap_or(0)),
        hundredths.checked_rem(100).unwrap_or(0)
    )
}
