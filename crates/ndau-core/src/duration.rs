// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DURATIONS
//
// Whole seconds of block time. Calendar units are fixed-length:
// MONTH = 30 days, YEAR = 365 days. Text form is `1y2m3dt4h5m6s`; the part
// after `t` is time of day, so `3m` is three months and `t3m` three minutes.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Seconds of consensus block time since the Unix epoch.
pub type Timestamp = u64;

pub const MINUTE: u64 = 60;
pub const HOUR: u64 = 60 * MINUTE;
pub const DAY: u64 = 24 * HOUR;
pub const MONTH: u64 = 30 * DAY;
pub const YEAR: u64 = 365 * DAY;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(pub u64);

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub const fn seconds(s: u64) -> Self {
        Duration(s)
    }
    pub const fn days(d: u64) -> Self {
        Duration(d * DAY)
    }
    pub const fn months(m: u64) -> Self {
        Duration(m * MONTH)
    }
    pub const fn years(y: u64) -> Self {
        Duration(y * YEAR)
    }

    pub fn as_secs(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Timestamp `self` after `t`, saturating.
    pub fn after(self, t: Timestamp) -> Timestamp {
        t.saturating_add(self.0)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rem = self.0;
        let mut date = String::new();
        for (unit, suffix) in [(YEAR, 'y'), (MONTH, 'm'), (DAY, 'd')] {
            let n = rem / unit;
            rem %= unit;
            if n > 0 {
                date.push_str(&format!("{}{}", n, suffix));
            }
        }
        let mut time = String::new();
        for (unit, suffix) in [(HOUR, 'h'), (MINUTE, 'm'), (1, 's')] {
            let n = rem / unit;
            rem %= unit;
            if n > 0 {
                time.push_str(&format!("{}{}", n, suffix));
            }
        }
        if date.is_empty() && time.is_empty() {
            return write!(f, "t0s");
        }
        if time.is_empty() {
            write!(f, "{}", date)
        } else {
            write!(f, "{}t{}", date, time)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration {0:?}")]
pub struct ParseDurationError(pub String);

fn parse_part(part: &str, units: &[(char, u64)], whole: &str) -> Result<u64, ParseDurationError> {
    let err = || ParseDurationError(whole.to_string());
    let mut total = 0u64;
    let mut digits = String::new();
    let mut next_unit = 0usize;
    for c in part.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        // units must appear in order, each at most once
        let pos = units[next_unit..]
            .iter()
            .position(|(u, _)| *u == c)
            .ok_or_else(err)?;
        let (_, scale) = units[next_unit + pos];
        next_unit += pos + 1;
        let n: u64 = digits.parse().map_err(|_| err())?;
        digits.clear();
        total = n
            .checked_mul(scale)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(err)?;
    }
    if !digits.is_empty() {
        return Err(err());
    }
    Ok(total)
}

impl FromStr for Duration {
    type Err = ParseDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseDurationError(s.to_string()));
        }
        let (date, time) = match s.split_once('t') {
            Some((d, t)) => {
                if t.is_empty() {
                    return Err(ParseDurationError(s.to_string()));
                }
                (d, t)
            }
            None => (s, ""),
        };
        let d = parse_part(date, &[('y', YEAR), ('m', MONTH), ('d', DAY)], s)?;
        let t = parse_part(time, &[('h', HOUR), ('m', MINUTE), ('s', 1)], s)?;
        d.checked_add(t)
            .map(Duration)
            .ok_or_else(|| ParseDurationError(s.to_string()))
    }
}

// Text in JSON/TOML, raw seconds in bincode.
impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_u64(self.0)
        }
    }
}

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a duration such as \"3m\" or seconds as an integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
        Ok(Duration(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
        u64::try_from(v)
            .map(Duration)
            .map_err(|_| E::custom("negative duration"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(DurationVisitor)
        } else {
            deserializer.deserialize_u64(DurationVisitor)
        }
    }
}

/// `Timestamp` as RFC 3339 text in JSON ("2019-04-03T13:13:22Z"); integer
/// seconds are accepted too. Use with `#[serde(with = "rfc3339")]`.
pub mod rfc3339 {
    use super::Timestamp;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn format(t: Timestamp) -> String {
        i64::try_from(t)
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|d| d.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_default()
    }

    pub fn parse(text: &str) -> Result<Timestamp, String> {
        let d = chrono::DateTime::parse_from_rfc3339(text.trim())
            .map_err(|e| format!("invalid timestamp {:?}: {}", text, e))?;
        u64::try_from(d.timestamp()).map_err(|_| format!("timestamp {:?} is before 1970", text))
    }

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = Timestamp;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an RFC 3339 timestamp or seconds since the epoch")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Timestamp, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Timestamp, E> {
            u64::try_from(v).map_err(|_| E::custom("negative timestamp"))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
            parse(v).map_err(E::custom)
        }
    }

    pub fn serialize<S: Serializer>(t: &Timestamp, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.serialize_str(&format(*t))
        } else {
            s.serialize_u64(*t)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Timestamp, D::Error> {
        if d.is_human_readable() {
            d.deserialize_any(TimestampVisitor)
        } else {
            d.deserialize_u64(TimestampVisitor)
        }
    }
}

/// `Option<Timestamp>` counterpart of [`rfc3339`]; `null` is `None`.
pub mod opt_rfc3339 {
    use super::rfc3339;
    use super::Timestamp;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    struct Wrapped(Timestamp);

    impl<'de> Deserialize<'de> for Wrapped {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            rfc3339::deserialize(d).map(Wrapped)
        }
    }

    pub fn serialize<S: Serializer>(t: &Option<Timestamp>, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            t.map(rfc3339::format).serialize(s)
        } else {
            t.serialize(s)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Timestamp>, D::Error> {
        Ok(Option::<Wrapped>::deserialize(d)?.map(|w| w.0))
    }
}
