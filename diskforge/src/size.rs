//! Human-readable size strings ("100MB", "1GB", "2GiB").
//!
//! Every suffix scales by powers of 1000: `kB`, `MB`, `GB`, ... and also the
//! `KiB`, `MiB`, `GiB` spellings, whose `i` is accepted but carries no
//! meaning, the way `docker/go-units` `FromHumanSize` reads them. Suffixes
//! are case-insensitive and a bare number is a byte count.

use diskforge_shared::{ImageError, ImageResult};

const KB: u64 = 1000;

/// Unit prefixes in ascending order, index = power.
const PREFIXES: [char; 6] = ['\0', 'k', 'm', 'g', 't', 'p'];

/// Parse a human-readable size into a byte count.
///
/// Fractional values are truncated toward zero after scaling, so
/// `"1.5kB"` is 1500 bytes and `"0.5B"` is 0.
pub fn parse_human_size(input: &str) -> ImageResult<u64> {
    let err = || ImageError::SizeParse {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    if number.is_empty() || number.starts_with('.') || number.ends_with('.') {
        return Err(err());
    }

    // A single space is allowed between number and unit ("100 MB").
    let unit = unit.strip_prefix(' ').unwrap_or(unit);
    let multiplier = unit_multiplier(unit).ok_or_else(err)?;

    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(multiplier).ok_or_else(err);
    }

    let value: f64 = number.parse().map_err(|_| err())?;
    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(err());
    }
    Ok(bytes as u64)
}

/// Map a unit suffix to its multiplier, `None` if unrecognized.
fn unit_multiplier(unit: &str) -> Option<u64> {
    let lower = unit.to_ascii_lowercase();
    let mut chars = lower.chars();

    let Some(first) = chars.next() else {
        return Some(1);
    };
    if first == 'b' {
        return chars.next().is_none().then_some(1);
    }

    let power = PREFIXES.iter().position(|p| *p == first)? as u32;
    match chars.as_str() {
        "" | "b" | "i" | "ib" => Some(KB.pow(power)),
        _ => None,
    }
}

/// Render a byte count for log output (binary units, two decimals).
pub fn format_human_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decimal_units() {
        assert_eq!(parse_human_size("1GB").unwrap(), 1_000_000_000);
        assert_eq!(parse_human_size("100MB").unwrap(), 100_000_000);
        assert_eq!(parse_human_size("4kB").unwrap(), 4_000);
        assert_eq!(parse_human_size("2T").unwrap(), 2_000_000_000_000);
        assert_eq!(parse_human_size("1pb").unwrap(), 1_000_000_000_000_000);
    }

    #[test]
    fn test_binary_spelling_is_decimal() {
        assert_eq!(parse_human_size("1GiB").unwrap(), 1_000_000_000);
        assert_eq!(parse_human_size("512MiB").unwrap(), 512_000_000);
        assert_eq!(parse_human_size("1kib").unwrap(), 1_000);
        assert_eq!(parse_human_size("3Gi").unwrap(), 3_000_000_000);
    }

    #[test]
    fn test_plain_bytes_and_spacing() {
        assert_eq!(parse_human_size("4096").unwrap(), 4096);
        assert_eq!(parse_human_size("10B").unwrap(), 10);
        assert_eq!(parse_human_size(" 100 MB ").unwrap(), 100_000_000);
    }

    #[test]
    fn test_fractions_truncate() {
        assert_eq!(parse_human_size("1.5GB").unwrap(), 1_500_000_000);
        assert_eq!(parse_human_size("0.5B").unwrap(), 0);
        assert_eq!(parse_human_size("2.5KiB").unwrap(), 2500);
    }

    #[test]
    fn test_malformed_rejected() {
        for bad in [
            "", "GB", "-1GB", "1XB", "1 GB B", "1.2.3MB", ".5GB", "1.GB", "1  GB", "1iB",
            "1Bb", "abc",
        ] {
            let err = parse_human_size(bad).unwrap_err();
            assert!(
                matches!(err, ImageError::SizeParse { .. }),
                "{bad:?} should fail"
            );
        }
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(parse_human_size("100000PB").is_err());
        assert!(parse_human_size("18446744073709551616").is_err());
    }

    #[test]
    fn test_format_human_size() {
        assert_eq!(format_human_size(512), "512 B");
        assert_eq!(format_human_size(1_073_741_824), "1.00 GiB");
    }

    proptest! {
        #[test]
        fn prop_decimal_megabytes_exact(n in 0u64..1_000_000) {
            prop_assert_eq!(parse_human_size(&format!("{n}MB")).unwrap(), n * 1_000_000);
        }

        #[test]
        fn prop_gib_matches_gb(n in 0u64..100_000) {
            prop_assert_eq!(
                parse_human_size(&format!("{n}GiB")).unwrap(),
                parse_human_size(&format!("{n}GB")).unwrap()
            );
        }

        #[test]
        fn prop_unit_case_insensitive(n in 0u64..1_000_000) {
            prop_assert_eq!(
                parse_human_size(&format!("{n}gb")).unwrap(),
                parse_human_size(&format!("{n}GB")).unwrap()
            );
        }
    }
}
