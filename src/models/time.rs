//! Numeric value types for Slurm JSON responses.
//!
//! Depending on the Slurm release, numeric fields such as `submit_time` or
//! `array_task_id` are emitted either as a bare number or wrapped in a
//! `{set, infinite, number}` object. [`TimeValue`] accepts both.

use serde::{Deserialize, Deserializer};

/// Slurm numeric value - represents optional/infinite numeric values from Slurm JSON.
///
/// This enum ensures that only valid states are representable:
/// - `NotSet`: The value was not set in Slurm (set=false, or `null`)
/// - `Infinite`: The value represents infinity (set=true, infinite=true)
/// - `Value(u64)`: A concrete numeric value (bare number, or set=true with number=N)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeValue {
    /// Value not set (Slurm JSON: set=false or null)
    #[default]
    NotSet,
    /// Infinite/unlimited value (Slurm JSON: set=true, infinite=true)
    Infinite,
    /// Concrete numeric value
    Value(u64),
}

impl TimeValue {
    /// Returns the numeric value if set and not infinite.
    ///
    /// Note that `Some(0)` is a real value: array ids use 0 for "not an array".
    #[must_use]
    pub fn value(&self) -> Option<u64> {
        match self {
            TimeValue::Value(n) => Some(*n),
            _ => None,
        }
    }

    /// Interpret the value as an epoch timestamp. Zero means "not reached".
    #[must_use]
    pub fn as_epoch(&self) -> Option<i64> {
        match self {
            TimeValue::Value(n) if *n > 0 => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    #[must_use]
    fn from_fields(set: bool, infinite: bool, number: u64) -> Self {
        if !set {
            TimeValue::NotSet
        } else if infinite {
            TimeValue::Infinite
        } else {
            TimeValue::Value(number)
        }
    }
}

impl From<u64> for TimeValue {
    fn from(n: u64) -> Self {
        TimeValue::Value(n)
    }
}

#[derive(Deserialize)]
struct TimeValueFields {
    #[serde(default)]
    set: bool,
    #[serde(default)]
    infinite: bool,
    #[serde(default)]
    number: u64,
}

/// Internal representation covering both JSON encodings
#[derive(Deserialize)]
#[serde(untagged)]
enum TimeValueRaw {
    Bare(u64),
    Wrapped(TimeValueFields),
}

impl<'de> Deserialize<'de> for TimeValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<TimeValueRaw>::deserialize(deserializer)?;
        Ok(match raw {
            None => TimeValue::NotSet,
            Some(TimeValueRaw::Bare(n)) => TimeValue::Value(n),
            Some(TimeValueRaw::Wrapped(f)) => TimeValue::from_fields(f.set, f.infinite, f.number),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_value_enum_methods() {
        let val = TimeValue::Value(42);
        assert_eq!(val.value(), Some(42));
        assert_eq!(val.as_epoch(), Some(42));

        let inf = TimeValue::Infinite;
        assert_eq!(inf.value(), None);
        assert_eq!(inf.as_epoch(), None);

        let unset = TimeValue::NotSet;
        assert_eq!(unset.value(), None);

        assert_eq!(TimeValue::default(), TimeValue::NotSet);
    }

    #[test]
    fn test_zero_is_a_value_but_not_an_epoch() {
        let zero = TimeValue::Value(0);
        assert_eq!(zero.value(), Some(0));
        assert_eq!(zero.as_epoch(), None);
    }

    #[test]
    fn test_time_value_accepts_both_encodings() {
        let bare: TimeValue = serde_json::from_str("1701982989").unwrap();
        assert_eq!(bare, TimeValue::Value(1701982989));

        let wrapped: TimeValue =
            serde_json::from_str(r#"{"set": true, "infinite": false, "number": 7}"#).unwrap();
        assert_eq!(wrapped, TimeValue::Value(7));

        let unset: TimeValue = serde_json::from_str(r#"{"set": false}"#).unwrap();
        assert_eq!(unset, TimeValue::NotSet);

        let inf: TimeValue =
            serde_json::from_str(r#"{"set": true, "infinite": true, "number": 0}"#).unwrap();
        assert_eq!(inf, TimeValue::Infinite);

        let null: TimeValue = serde_json::from_str("null").unwrap();
        assert_eq!(null, TimeValue::NotSet);
    }
}
