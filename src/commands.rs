//! Maps discrete user actions to device commands.
//!
//! Input fields arrive as raw text. Anything unparseable is coerced to the
//! documented default instead of being rejected.

use crate::ws::protocol::Command;

/// Limit applied when the hours field is empty or not a number
pub const DEFAULT_LIMIT_HOURS: f64 = 12.0;

/// Price used when the price field is empty or not a number
pub const DEFAULT_UNIT_PRICE: f64 = 8.0;

/// A single user action that produces exactly one command
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    ToggleRelay { load_id: u8, on: bool },
    /// `selected_load` 0 leaves the choice of load to the device
    ApplyTimer { selected_load: u8, minutes_input: String },
    SaveLimit { load_id: u8, hours_input: String },
    SavePrice { price_input: String },
    ClearNotifications,
}

pub fn encode(intent: &Intent) -> Command {
    match intent {
        Intent::ToggleRelay { load_id, on } => Command::Relay {
            id: *load_id,
            state: *on,
        },
        Intent::ApplyTimer {
            selected_load,
            minutes_input,
        } => Command::SetTimer {
            id: *selected_load,
            minutes: parse_minutes(minutes_input),
        },
        Intent::SaveLimit {
            load_id,
            hours_input,
        } => Command::SetLimit {
            id: *load_id,
            seconds: limit_seconds(parse_hours(hours_input)),
        },
        Intent::SavePrice { price_input } => Command::SetPrice {
            price: parse_price(price_input),
        },
        Intent::ClearNotifications => Command::ClearNotifications,
    }
}

/// One `SaveLimit` per load, in id order, for the "save all limits" action
pub fn save_all_limits(hours_inputs: [&str; 4]) -> Vec<Intent> {
    hours_inputs
        .iter()
        .zip(1u8..)
        .map(|(hours, load_id)| Intent::SaveLimit {
            load_id,
            hours_input: (*hours).to_owned(),
        })
        .collect()
}

/// Leading-integer parse ("15min" is 15). Empty, non-numeric and negative
/// input all mean 0, which the device reads as "cancel timer".
pub fn parse_minutes(input: &str) -> u32 {
    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];

    if negative || digits.is_empty() {
        return 0;
    }
    digits.parse::<u32>().unwrap_or(u32::MAX)
}

pub fn parse_hours(input: &str) -> f64 {
    parse_finite(input).unwrap_or(DEFAULT_LIMIT_HOURS)
}

/// `max(1, round(hours * 3600))`
pub fn limit_seconds(hours: f64) -> u64 {
    let seconds = (hours * 3600.0).round();
    if seconds.is_nan() || seconds < 1.0 {
        1
    } else if seconds >= u64::MAX as f64 {
        u64::MAX
    } else {
        seconds as u64
    }
}

/// Negative prices are treated like unparseable ones
pub fn parse_price(input: &str) -> f64 {
    parse_finite(input)
        .filter(|p| *p >= 0.0)
        .unwrap_or(DEFAULT_UNIT_PRICE)
}

/// Leading-decimal parse ("1.5h" is 1.5), the float counterpart of
/// [`parse_minutes`]. `None` when no digits lead the input.
fn parse_finite(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |start: usize| {
        start
            + bytes[start.min(bytes.len())..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count()
    };

    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut end = digits_from(sign);
    let mut digits = end - sign;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        digits += frac_end - (end + 1);
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let exp_sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_end = digits_from(end + 1 + exp_sign);
        if exp_end > end + 1 + exp_sign {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}
