//! Human-readable size parsing
//!
//! Used for both `dl-size-gt` thresholds and the size column of directory
//! listings, so the two sides of a comparison always agree on units.

/// Parses a size such as `1024`, `1.5K`, `2G`, `3 MiB` or `700KB`
///
/// Suffixes are binary multiples (`1K` = 1024 bytes). Returns `None` for
/// anything that is not a size, including the `-` listings use for
/// directories.
///
/// # Examples
///
/// ```
/// use httpeat::skip::parse_size;
///
/// assert_eq!(parse_size("2G"), Some(2 * 1024 * 1024 * 1024));
/// assert_eq!(parse_size("1.5K"), Some(1536));
/// assert_eq!(parse_size("-"), None);
/// ```
pub fn parse_size(input: &str) -> Option<u64> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    if number.is_empty() {
        return None;
    }

    let multiplier = unit_multiplier(unit.trim())?;
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    Some((value * multiplier as f64).round() as u64)
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    let upper = unit.to_ascii_uppercase();
    let prefix = upper
        .strip_suffix("IB")
        .or_else(|| upper.strip_suffix('B'))
        .unwrap_or(&upper);

    let exponent = match prefix {
        "" => 0,
        "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        "P" => 5,
        _ => return None,
    };
    Some(1024u64.pow(exponent))
}
