//! Duration and byte-size literals used by clause values.
//!
//! Durations are sequences of `<number><unit>` with units `ns`, `us`, `ms`,
//! `s`, `m`, `h` (`1m30s`, `1.5s`, `200ms`). Sizes are `<number><unit>`
//! with `B`, `KB`, `MB`, `GB`, `TB` in powers of 1024, case-insensitive.

use std::time::Duration;

pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let number: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        nanos += number * nanos_per_unit;
        rest = &rest[unit_len..];
    }
    Some(Duration::from_nanos(nanos.round() as u64))
}

pub fn parse_size(input: &str) -> Option<u64> {
    let s = input.trim();
    let num_len = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    if num_len == 0 {
        return None;
    }
    let number: f64 = s[..num_len].parse().ok()?;
    let multiplier: u64 = match s[num_len..].trim().to_ascii_uppercase().as_str() {
        "B" => 1,
        "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        "TB" => 1 << 40,
        _ => return None,
    };
    Some((number * multiplier as f64) as u64)
}

/// `<min>..<max>` with `min <= max`.
pub fn parse_duration_range(input: &str) -> Option<(Duration, Duration)> {
    let (min, max) = input.split_once("..")?;
    let min = parse_duration(min)?;
    let max = parse_duration(max)?;
    (min <= max).then_some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("200ms"), Some(Duration::from_millis(200)));
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
    }

    #[test]
    fn rejects_bare_numbers_and_sizes_as_durations() {
        assert_eq!(parse_duration("30"), None);
        assert_eq!(parse_duration("10MB"), None);
        assert_eq!(parse_duration("s"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn sizes() {
        assert_eq!(parse_size("512B"), Some(512));
        assert_eq!(parse_size("10MB"), Some(10 * 1024 * 1024));
        assert_eq!(parse_size("1kb"), Some(1024));
        assert_eq!(parse_size("1.5KB"), Some(1536));
        assert_eq!(parse_size("10"), None);
        assert_eq!(parse_size("10PB"), None);
    }

    #[test]
    fn ranges() {
        assert_eq!(
            parse_duration_range("200ms..5s"),
            Some((Duration::from_millis(200), Duration::from_secs(5)))
        );
        assert_eq!(parse_duration_range("5s..200ms"), None);
        assert_eq!(parse_duration_range("5s"), None);
    }
}
