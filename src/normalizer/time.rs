//! Duration parsing for recipe times. All results are whole minutes.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Longest accepted duration, one year
pub const MAX_MINUTES: i64 = 525_600;

fn iso_duration_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^P(?:(\d+)D)?(?:T(?:(\d+(?:\.\d+)?)H)?(?:(\d+(?:\.\d+)?)M)?(?:(\d+(?:\.\d+)?)S)?)?$")
            .ok()
    })
    .as_ref()
}

fn human_duration_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(days?|hours?|hrs?|hr|h|minutes?|mins?|min|m)").ok()
    })
    .as_ref()
}

/// Parse a duration such as `45`, `"45 min"`, `"1 hour 30 minutes"`,
/// `"1h30m"` or `"PT1H30M"`
pub fn parse_duration(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(minutes) = input.parse::<f64>() {
        return whole_minutes(minutes);
    }

    if input.starts_with(['P', 'p']) {
        if let Some(minutes) = parse_iso_duration(input) {
            return Some(minutes);
        }
    }

    parse_human_duration(input)
}

/// Parse an ISO-8601 duration (`P1DT2H30M`, `PT45M`, `PT90S`)
pub fn parse_iso_duration(input: &str) -> Option<i64> {
    let caps = iso_duration_re()?.captures(input.trim())?;

    let part = |i: usize| -> Option<f64> { caps.get(i).and_then(|m| m.as_str().parse().ok()) };
    let (days, hours, minutes, seconds) = (part(1), part(2), part(3), part(4));

    if days.is_none() && hours.is_none() && minutes.is_none() && seconds.is_none() {
        return None;
    }

    let total = days.unwrap_or(0.0) * 1440.0
        + hours.unwrap_or(0.0) * 60.0
        + minutes.unwrap_or(0.0)
        + seconds.unwrap_or(0.0) / 60.0;
    whole_minutes(total)
}

fn parse_human_duration(input: &str) -> Option<i64> {
    let re = human_duration_re()?;

    let mut total = 0.0;
    let mut matched = false;
    for caps in re.captures_iter(input) {
        let amount: f64 = match caps.get(1).and_then(|m| m.as_str().parse().ok()) {
            Some(amount) => amount,
            None => continue,
        };
        let unit = caps
            .get(2)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_default();

        total += if unit.starts_with('d') {
            amount * 1440.0
        } else if unit.starts_with('h') {
            amount * 60.0
        } else {
            amount
        };
        matched = true;
    }

    if matched {
        return whole_minutes(total);
    }

    // Assume minutes if no unit specified ("about 20")
    let digits: String = input
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|m| *m <= MAX_MINUTES)
}

/// Interpret a JSON value (number or string) as minutes
pub fn minutes_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .filter(|m| (0..=MAX_MINUTES).contains(m))
            .or_else(|| n.as_f64().and_then(whole_minutes)),
        Value::String(s) => parse_duration(s),
        _ => None,
    }
}

fn whole_minutes(minutes: f64) -> Option<i64> {
    if !minutes.is_finite() || minutes < 0.0 {
        return None;
    }
    let minutes = minutes.round();
    (minutes <= MAX_MINUTES as f64).then_some(minutes as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_numbers() {
        assert_eq!(parse_duration("30"), Some(30));
        assert_eq!(parse_duration(" 12.6 "), Some(13));
        assert_eq!(parse_duration("-5"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_parse_human_durations() {
        assert_eq!(parse_duration("45 minutes"), Some(45));
        assert_eq!(parse_duration("45 min"), Some(45));
        assert_eq!(parse_duration("1 hour"), Some(60));
        assert_eq!(parse_duration("2 hours"), Some(120));
        assert_eq!(parse_duration("1 hour 30 minutes"), Some(90));
        assert_eq!(parse_duration("1h30m"), Some(90));
        assert_eq!(parse_duration("1.5 hrs"), Some(90));
        assert_eq!(parse_duration("about 20"), Some(20));
        assert_eq!(parse_duration("overnight"), None);
    }

    #[test]
    fn test_parse_iso_durations() {
        assert_eq!(parse_duration("PT1H30M"), Some(90));
        assert_eq!(parse_duration("PT45M"), Some(45));
        assert_eq!(parse_duration("PT90S"), Some(2));
        assert_eq!(parse_duration("P1DT2H"), Some(1560));
        assert_eq!(parse_duration("PT"), None);
        assert_eq!(parse_iso_duration("P"), None);
    }

    #[test]
    fn test_minutes_from_value() {
        assert_eq!(minutes_from_value(&json!(25)), Some(25));
        assert_eq!(minutes_from_value(&json!(7.4)), Some(7));
        assert_eq!(minutes_from_value(&json!("PT20M")), Some(20));
        assert_eq!(minutes_from_value(&json!(-3)), None);
        assert_eq!(minutes_from_value(&json!(null)), None);
        assert_eq!(minutes_from_value(&json!(["10"])), None);
    }

    #[test]
    fn test_absurd_durations_rejected() {
        assert_eq!(parse_duration("1e30"), None);
        assert_eq!(parse_duration("PT99999999999H"), None);
        assert_eq!(parse_duration("about 9999999"), None);
        assert_eq!(minutes_from_value(&json!(i64::MAX)), None);
        assert_eq!(minutes_from_value(&json!(1e300)), None);
        assert_eq!(parse_duration("525600"), Some(MAX_MINUTES));
    }
}
