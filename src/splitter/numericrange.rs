//! Numeric range parsing and matching for the splitter's discontinuity-segment
//! output templates.
//!
//! Grounded on `HumanReadable::NumericRange`/`NumericRangeList`: a range has
//! an optional lower and/or upper bound (inclusive); `"N"` pins both bounds to
//! N; `"A-B"` sets either side, leaving it open if empty; an empty list of
//! ranges matches everything (no filter configured).

use crate::error::{Result, TsError};

/// An inclusive range with optionally open lower/upper bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericRange {
    /// Inclusive lower bound, or `None` for unbounded below.
    pub lower: Option<i64>,
    /// Inclusive upper bound, or `None` for unbounded above.
    pub upper: Option<i64>,
}

impl NumericRange {
    /// Compares `value` against this range: -1 below, 0 inside, 1 above.
    pub fn compare(&self, value: i64) -> i32 {
        if let Some(lower) = self.lower {
            if value < lower {
                return -1;
            }
        }
        if let Some(upper) = self.upper {
            if value > upper {
                return 1;
            }
        }
        0
    }

    /// True if `value` falls within this range.
    pub fn matches(&self, value: i64) -> bool {
        self.compare(value) == 0
    }

    /// Parses `"N"` (exact) or `"A-B"` (either side optionally empty = open).
    pub fn from_str_spec(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TsError::SplitterValidation("empty numeric range".to_string()));
        }
        match s.split_once('-') {
            None => {
                let n: i64 = s
                    .parse()
                    .map_err(|_| TsError::SplitterValidation(format!("bad numeric range: {s}")))?;
                Ok(Self {
                    lower: Some(n),
                    upper: Some(n),
                })
            }
            Some((lo, hi)) => {
                let lower = if lo.trim().is_empty() {
                    None
                } else {
                    Some(
                        lo.trim()
                            .parse()
                            .map_err(|_| TsError::SplitterValidation(format!("bad range lower bound: {lo}")))?,
                    )
                };
                let upper = if hi.trim().is_empty() {
                    None
                } else {
                    Some(
                        hi.trim()
                            .parse()
                            .map_err(|_| TsError::SplitterValidation(format!("bad range upper bound: {hi}")))?,
                    )
                };
                if let (Some(l), Some(u)) = (lower, upper) {
                    if l > u {
                        return Err(TsError::SplitterValidation(format!(
                            "range lower bound {l} exceeds upper bound {u}"
                        )));
                    }
                }
                Ok(Self { lower, upper })
            }
        }
    }
}

/// A set of [`NumericRange`]s, matching if any member matches. An empty set
/// matches every value (no filter configured).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumericRangeSet {
    ranges: Vec<NumericRange>,
}

impl NumericRangeSet {
    /// An empty set, matching everything.
    pub fn any() -> Self {
        Self::default()
    }

    /// Parses a comma-separated list of range specs, e.g. `"1-2,5,9-"`.
    pub fn from_str_spec(s: &str) -> Result<Self> {
        let ranges = s
            .split(',')
            .map(NumericRange::from_str_spec)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { ranges })
    }

    /// True if `value` matches any contained range, or the set is empty.
    pub fn matches(&self, value: i64) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(|r| r.matches(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_value_matches_only_itself() {
        let r = NumericRange::from_str_spec("5").unwrap();
        assert!(r.matches(5));
        assert!(!r.matches(4));
        assert!(!r.matches(6));
    }

    #[test]
    fn open_ended_range_matches_everything_above_lower() {
        let r = NumericRange::from_str_spec("10-").unwrap();
        assert!(r.matches(10));
        assert!(r.matches(1_000_000));
        assert!(!r.matches(9));
    }

    #[test]
    fn empty_set_matches_everything() {
        let set = NumericRangeSet::any();
        assert!(set.matches(42));
    }

    #[test]
    fn set_matches_any_member_range() {
        let set = NumericRangeSet::from_str_spec("1-2,5").unwrap();
        assert!(set.matches(1));
        assert!(set.matches(2));
        assert!(set.matches(5));
        assert!(!set.matches(3));
        assert!(!set.matches(6));
    }
}
