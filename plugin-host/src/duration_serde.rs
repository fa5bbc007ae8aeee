//! `serde` helper for human-readable durations in TOML config (`"30s"`,
//! `"500ms"`, `"5m"`, `"1h"`).

use serde::{Deserializer, Serializer};
use std::time::Duration;

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{}s", duration.as_secs()))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => parse_duration(&s).map_err(Error::custom),
        Value::Number(n) => {
            let secs = n.as_f64().ok_or_else(|| Error::custom("invalid duration number"))?;
            Ok(Duration::from_secs_f64(secs))
        }
        _ => Err(Error::custom("invalid duration format")),
    }
}

pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }
    if let Some(stripped) = s.strip_suffix("ms") {
        let num: u64 = stripped.parse().map_err(|_| format!("invalid number: {}", stripped))?;
        return Ok(Duration::from_millis(num));
    }
    if let Some(stripped) = s.strip_suffix('s') {
        let num: f64 = stripped.parse().map_err(|_| format!("invalid number: {}", stripped))?;
        return Ok(Duration::from_secs_f64(num));
    }
    if let Some(stripped) = s.strip_suffix('m') {
        let num: u64 = stripped.parse().map_err(|_| format!("invalid number: {}", stripped))?;
        return Ok(Duration::from_secs(num * 60));
    }
    if let Some(stripped) = s.strip_suffix('h') {
        let num: u64 = stripped.parse().map_err(|_| format!("invalid number: {}", stripped))?;
        return Ok(Duration::from_secs(num * 3600));
    }
    Err(format!("unknown duration unit in: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_supported_unit() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn rejects_empty_or_unitless_strings() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("180").is_err());
        assert!(parse_duration("fast").is_err());
    }

    #[test]
    fn toml_config_deserializes_through_the_with_attribute() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "super")]
            timeout: Duration,
        }
        let parsed: Wrapper = toml::from_str("timeout = \"180s\"").unwrap();
        assert_eq!(parsed.timeout, Duration::from_secs(180));
    }
}
