use std::num::ParseFloatError;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A retention time interval in minutes. Only hits whose apex falls inside are processed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeRangeParseError {
    #[error("Failed to parse time range start {0}")]
    MalformedStart(ParseFloatError),
    #[error("Failed to parse time range end {0}")]
    MalformedEnd(ParseFloatError),
    #[error("Time range {0:?} ends before it starts")]
    Inverted(String),
}

fn parse_bound(token: &str, default: f64) -> Result<f64, ParseFloatError> {
    let token = token.trim();
    if token.is_empty() {
        Ok(default)
    } else {
        token.parse()
    }
}

/// Split on `:` or a space when present. Otherwise split on the first `-` that is not
/// an exponent sign.
fn split_bounds(s: &str) -> (&str, &str) {
    for sep in [':', ' '] {
        if let Some(parts) = s.split_once(sep) {
            return parts;
        }
    }
    let dash = s
        .char_indices()
        .find(|&(i, c)| c == '-' && !s[..i].ends_with(['e', 'E']));
    match dash {
        Some((i, _)) => (&s[..i], &s[i + 1..]),
        None => (s, ""),
    }
}

impl FromStr for TimeRange {
    type Err = TimeRangeParseError;

    /// Either bound may be omitted, as in `10-` or `-12.5`. The bounds may be separated by
    /// `-`, `:` or a space.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (start_s, end_s) = split_bounds(s);
        let start = parse_bound(start_s, 0.0).map_err(TimeRangeParseError::MalformedStart)?;
        let end = parse_bound(end_s, f64::INFINITY).map_err(TimeRangeParseError::MalformedEnd)?;
        if end < start {
            return Err(TimeRangeParseError::Inverted(s.to_string()));
        }
        Ok(TimeRange { start, end })
    }
}

impl From<Range<f64>> for TimeRange {
    fn from(value: Range<f64>) -> Self {
        Self::new(value.start, value.end)
    }
}

impl From<(f64, f64)> for TimeRange {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_time_fromstr() -> Result<(), TimeRangeParseError> {
        let t: TimeRange = "9.5-".parse()?;
        assert_eq!(t, TimeRange::new(9.5, f64::INFINITY));

        let t: TimeRange = "-12".parse()?;
        assert_eq!(t, TimeRange::new(0.0, 12.0));

        let t: TimeRange = "9:12.5".parse()?;
        assert_eq!(t, TimeRange::new(9.0, 12.5));
        assert!(t.contains(10.0));
        assert!(!t.contains(14.5));

        let t: TimeRange = "-".parse()?;
        assert_eq!(t, TimeRange::default());
        Ok(())
    }

    #[test]
    fn test_time_fromstr_exponents() -> Result<(), TimeRangeParseError> {
        let t: TimeRange = "1e-3:5".parse()?;
        assert_eq!(t, TimeRange::new(0.001, 5.0));

        let t: TimeRange = "1e-3-5".parse()?;
        assert_eq!(t, TimeRange::new(0.001, 5.0));

        let t: TimeRange = "2.5E-1 1e1".parse()?;
        assert_eq!(t, TimeRange::new(0.25, 10.0));

        let t: TimeRange = "-1e-2".parse()?;
        assert_eq!(t, TimeRange::new(0.0, 0.01));
        Ok(())
    }

    #[test]
    fn test_time_fromstr_malformed() {
        assert!(matches!("a-".parse::<TimeRange>(), Err(TimeRangeParseError::MalformedStart(_))));
        assert!(matches!("-b".parse::<TimeRange>(), Err(TimeRangeParseError::MalformedEnd(_))));
        assert!(matches!("a-b".parse::<TimeRange>(), Err(TimeRangeParseError::MalformedStart(_))));
        assert!(matches!("12-3".parse::<TimeRange>(), Err(TimeRangeParseError::Inverted(_))));
    }
}
