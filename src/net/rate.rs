use crate::time::Duration;
use serde::{de::Visitor, Deserialize, Serialize};
use std::{
    error::Error,
    fmt::{Debug, Display},
    str::FromStr,
};

const UNITS: [(&str, u64); 4] = [
    ("Gbps", 1_000_000_000),
    ("Mbps", 1_000_000),
    ("Kbps", 1_000),
    ("bps", 1),
];

///
/// A data rate in bits per second.
///
/// Data rates can be parsed from their usual textual representation
/// (`"2Mbps"`, `"500Kbps"`, `"1.5Gbps"`, `"8000bps"`). Units are
/// decimal, `k` and `K` are treated alike, as are `bps` and `b/s`.
///
/// ```
/// # use pacesim::net::DataRate;
/// let rate: DataRate = "2Mbps".parse().unwrap();
/// assert_eq!(rate.bps(), 2_000_000);
/// assert_eq!(rate.to_string(), "2Mbps");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DataRate(u64);

impl DataRate {
    /// A data rate of zero, which is not a valid pacing target.
    pub const ZERO: DataRate = DataRate(0);

    ///
    /// Creates a data rate from bits per second.
    ///
    #[must_use]
    pub const fn from_bps(bps: u64) -> Self {
        Self(bps)
    }

    ///
    /// Creates a data rate from kilobits per second.
    ///
    #[must_use]
    pub const fn from_kbps(kbps: u64) -> Self {
        Self(kbps * 1_000)
    }

    ///
    /// Creates a data rate from megabits per second.
    ///
    #[must_use]
    pub const fn from_mbps(mbps: u64) -> Self {
        Self(mbps * 1_000_000)
    }

    ///
    /// The rate in bits per second.
    ///
    #[must_use]
    pub const fn bps(&self) -> u64 {
        self.0
    }

    ///
    /// Indicates a rate of zero.
    ///
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    ///
    /// The time it takes to put `bytes` bytes onto a medium with this rate,
    /// truncated to whole nanoseconds. A zero rate transmits instantly.
    ///
    /// ```
    /// # use pacesim::net::DataRate;
    /// # use std::time::Duration;
    /// let rate = DataRate::from_bps(8000);
    /// assert_eq!(rate.transmission_time(1000), Duration::from_secs(1));
    /// ```
    #[must_use]
    pub fn transmission_time(&self, bytes: usize) -> Duration {
        if self.0 == 0 {
            return Duration::ZERO;
        }

        let bits = bytes as u128 * 8;
        let nanos = bits * 1_000_000_000 / u128::from(self.0);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    ///
    /// The number of whole bytes that can be transmitted in the given duration.
    ///
    #[must_use]
    pub fn bytes_in(&self, duration: Duration) -> u64 {
        let bits = duration.as_nanos() * u128::from(self.0) / 1_000_000_000;
        u64::try_from(bits / 8).unwrap_or(u64::MAX)
    }
}

impl From<u64> for DataRate {
    fn from(bps: u64) -> Self {
        Self(bps)
    }
}

impl Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (unit, factor) in UNITS {
            if self.0 >= factor && self.0 % factor == 0 {
                return write!(f, "{}{unit}", self.0 / factor);
            }
        }
        write!(f, "{}bps", self.0)
    }
}

impl Debug for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DataRate({self})")
    }
}

/// An error that occured while parsing a [`DataRate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDataRateError {
    input: String,
}

impl Display for ParseDataRateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid data rate '{}', expected a number followed by bps, Kbps, Mbps or Gbps",
            self.input
        )
    }
}

impl Error for ParseDataRateError {}

impl FromStr for DataRate {
    type Err = ParseDataRateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDataRateError {
            input: s.to_string(),
        };

        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(err)?;
        let (value, unit) = s.split_at(split);

        let factor: u64 = match unit.trim() {
            "bps" | "b/s" => 1,
            "kbps" | "Kbps" | "kb/s" | "Kb/s" => 1_000,
            "Mbps" | "Mb/s" => 1_000_000,
            "Gbps" | "Gb/s" => 1_000_000_000,
            _ => return Err(err()),
        };

        if let Ok(value) = value.parse::<u64>() {
            return value.checked_mul(factor).map(DataRate).ok_or_else(err);
        }

        let value = value.parse::<f64>().map_err(|_| err())?;
        let bps = (value * factor as f64).round();
        if !bps.is_finite() || bps < 0.0 || bps > u64::MAX as f64 {
            return Err(err());
        }
        Ok(DataRate(bps as u64))
    }
}

impl Serialize for DataRate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for DataRate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DataRateVisitor;
        impl Visitor<'_> for DataRateVisitor {
            type Value = DataRate;
            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a data rate like '2Mbps' or a number of bits per second")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(DataRate(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(DataRate)
                    .map_err(|_| E::custom(format!("negative data rate {v}")))
            }
        }

        deserializer.deserialize_any(DataRateVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_units() {
        assert_eq!("2Mbps".parse(), Ok(DataRate::from_mbps(2)));
        assert_eq!("500Kbps".parse(), Ok(DataRate::from_kbps(500)));
        assert_eq!("500kbps".parse(), Ok(DataRate::from_kbps(500)));
        assert_eq!("8000bps".parse(), Ok(DataRate::from_bps(8000)));
        assert_eq!("1Gbps".parse(), Ok(DataRate::from_bps(1_000_000_000)));
        assert_eq!("1.5Mbps".parse(), Ok(DataRate::from_kbps(1500)));
        assert_eq!(" 5 Mb/s ".parse(), Ok(DataRate::from_mbps(5)));

        assert!("Mbps".parse::<DataRate>().is_err());
        assert!("12".parse::<DataRate>().is_err());
        assert!("2Tbps".parse::<DataRate>().is_err());
        assert!("1.2.3Mbps".parse::<DataRate>().is_err());
    }

    #[test]
    fn display_picks_largest_exact_unit() {
        assert_eq!(DataRate::from_mbps(2).to_string(), "2Mbps");
        assert_eq!(DataRate::from_kbps(1500).to_string(), "1500Kbps");
        assert_eq!(DataRate::from_bps(1234).to_string(), "1234bps");
        assert_eq!(DataRate::ZERO.to_string(), "0bps");
    }

    #[test]
    fn transmission_time() {
        assert_eq!(
            DataRate::from_mbps(2).transmission_time(1000),
            Duration::from_millis(4)
        );
        assert_eq!(
            DataRate::from_mbps(5).transmission_time(1040),
            Duration::from_nanos(1_664_000)
        );
        assert_eq!(DataRate::ZERO.transmission_time(1000), Duration::ZERO);
        assert_eq!(
            DataRate::from_mbps(2).bytes_in(Duration::from_millis(4)),
            1000
        );
    }

    #[test]
    fn serde_as_string() {
        let rate: DataRate = serde_yml::from_str("\"5Mbps\"").unwrap();
        assert_eq!(rate, DataRate::from_mbps(5));
        let rate: DataRate = serde_yml::from_str("1Mbps").unwrap();
        assert_eq!(rate, DataRate::from_mbps(1));
        let rate: DataRate = serde_yml::from_str("64000").unwrap();
        assert_eq!(rate, DataRate::from_kbps(64));

        let s = serde_yml::to_string(&DataRate::from_kbps(1500)).unwrap();
        assert_eq!(s.trim(), "1500Kbps");
    }
}
