//! Parses index-range strings such as `"0-9,15,20-22"` into a deduplicated
//! set of integers — used to expand mnemonic derivation-index lists and
//! multi-HSM key-id lists from configuration.

use std::collections::BTreeSet;

use crate::error::CoreError;

/// Parses `"0-9,15,20-22"` into `{0,1,...,9,15,20,21,22}`.
///
/// Each comma-separated component is either a single integer or an
/// inclusive `start-end` range. Whitespace around a component is trimmed.
/// An empty component, a non-integer token, or a range with `start > end`
/// is rejected.
pub fn parse_range(s: &str) -> Result<BTreeSet<u64>, CoreError> {
    let mut out = BTreeSet::new();
    for raw in s.split(',') {
        let part = raw.trim();
        if part.is_empty() {
            return Err(CoreError::InvalidRange(format!(
                "empty component in {s:?}"
            )));
        }
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: u64 = lo.trim().parse().map_err(|_| {
                    CoreError::InvalidRange(format!("not an integer: {lo:?} in {s:?}"))
                })?;
                let hi: u64 = hi.trim().parse().map_err(|_| {
                    CoreError::InvalidRange(format!("not an integer: {hi:?} in {s:?}"))
                })?;
                if lo > hi {
                    return Err(CoreError::InvalidRange(format!(
                        "start {lo} > end {hi} in {s:?}"
                    )));
                }
                out.extend(lo..=hi);
            }
            None => {
                let n: u64 = part
                    .parse()
                    .map_err(|_| CoreError::InvalidRange(format!("not an integer: {part:?}")))?;
                out.insert(n);
            }
        }
    }
    Ok(out)
}

/// Formats a set of integers back into the compact range notation, merging
/// consecutive runs. Used by tests to check the parser round-trips.
pub fn format_range(set: &BTreeSet<u64>) -> String {
    let mut parts = Vec::new();
    let mut iter = set.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end = iter.next().unwrap();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_ranges() {
        let got = parse_range("0-9,15,20-22").unwrap();
        let want: BTreeSet<u64> = (0..=9).chain([15]).chain(20..=22).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn dedups() {
        let got = parse_range("1,1,1-2").unwrap();
        assert_eq!(got, BTreeSet::from([1, 2]));
    }

    #[test]
    fn rejects_empty_component() {
        assert!(parse_range("1,,2").is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(parse_range("9-0").is_err());
    }

    #[test]
    fn rejects_non_integer() {
        assert!(parse_range("abc").is_err());
    }

    #[test]
    fn strips_whitespace() {
        let got = parse_range(" 1 , 2 - 3 ").unwrap();
        assert_eq!(got, BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn round_trips_through_format() {
        let original: BTreeSet<u64> = (0..=9).chain([15]).chain(20..=22).collect();
        let formatted = format_range(&original);
        let parsed = parse_range(&formatted).unwrap();
        assert_eq!(parsed, original);
    }
}
