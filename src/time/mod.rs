//!
//! Temporal quantification in a simulation context.
//!
//! A [`SimTime`] is a point on the simulated timeline, measured as the
//! [`Duration`] since [`SimTime::ZERO`]. The current time is owned by the
//! [`Scheduler`](crate::runtime::Scheduler) of a runtime, not by a global
//! clock, so several independent simulations may coexist in one process.
//!
//! # Examples
//!
//! ```rust
//! # use pacesim::time::*;
//! let start = SimTime::from(1.5);
//! let later = start + Duration::from_millis(500);
//! assert_eq!(later, SimTime::from(2.0));
//! assert_eq!(later - start, Duration::from_millis(500));
//! ```

mod duration;
pub use duration::*;

use serde::de::Visitor;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};

use std::fmt::{Debug, Display};
use std::ops::{Deref, Div, Sub, SubAssign};

///
/// A specific point of time in the simulation.
///
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(Duration);

impl SimTime {
    ///
    /// Constructs an instance of `SimTime` from a give duration since `SimTime::ZERO`.
    ///
    #[must_use]
    pub const fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    ///
    /// Makes an equallity check with an error margin.
    ///
    #[must_use]
    pub fn eq_approx(&self, other: SimTime, error: Duration) -> bool {
        let dur = self.duration_diff(other);
        dur < error
    }

    /// Returns the amount of time elapsed from the earlier of the two values
    /// to the higher.
    #[must_use]
    pub fn duration_diff(&self, other: SimTime) -> Duration {
        if *self > other {
            self.duration_since(other)
        } else {
            other.duration_since(*self)
        }
    }

    /// Returns the amount of time elapsed from another instant to this one.
    ///
    /// # Panics
    ///
    /// This function panics if `earlier` is later than `self`.
    #[must_use]
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        self.checked_duration_since(earlier)
            .expect("duration subtraction invalid")
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or None if that instant is later than this one.
    #[must_use]
    pub fn checked_duration_since(&self, earlier: SimTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or zero duration if that instant is later than this one.
    #[must_use]
    pub fn saturating_duration_since(&self, earlier: SimTime) -> Duration {
        self.checked_duration_since(earlier).unwrap_or_default()
    }

    /// Converts a number of seconds since `SimTime::ZERO` into a `SimTime`.
    /// Returns `None` if the value is negative, not finite or too large
    /// to be represented.
    #[must_use]
    pub fn try_from_secs_f64(secs: f64) -> Option<SimTime> {
        Duration::try_from_secs_f64(secs).ok().map(SimTime)
    }

    /// Returns `Some(t)` where `t` is the time `self + duration` if `t` can be represented,
    /// `None` otherwise.
    #[must_use]
    pub fn checked_add(&self, duration: Duration) -> Option<SimTime> {
        self.0.checked_add(duration).map(SimTime)
    }

    /// Returns `Some(t)` where `t` is the time `self - duration` if `t` can be represented,
    /// `None` otherwise.
    #[must_use]
    pub fn checked_sub(&self, duration: Duration) -> Option<SimTime> {
        self.0.checked_sub(duration).map(SimTime)
    }
}

impl SimTime {
    /// The smallest instance of a [`SimTime`].
    pub const ZERO: SimTime = SimTime(Duration::ZERO);
    /// The smallest valid instance of a [`SimTime`].
    pub const MIN: SimTime = SimTime(Duration::ZERO);
    /// The greatest instance of a [`SimTime`].
    pub const MAX: SimTime = SimTime(Duration::MAX);
}

// Serialize

impl Serialize for SimTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_f64(self.as_secs_f64())
        } else {
            let mut map = serializer.serialize_map(Some(2))?;
            map.serialize_entry("secs", &self.as_secs())?;
            map.serialize_entry("nanos", &self.subsec_nanos())?;
            map.end()
        }
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SimTimeVisitor;
        impl<'de> Visitor<'de> for SimTimeVisitor {
            type Value = SimTime;
            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("an positive number of seconds or an encoded Duration")
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                SimTime::try_from_secs_f64(v)
                    .ok_or_else(|| E::custom(format!("invalid simulation time {v}")))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(SimTime::from_duration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|v| SimTime::from_duration(Duration::from_secs(v)))
                    .map_err(|_| E::custom(format!("invalid simulation time {v}")))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut secs: u64 = 0;
                let mut nanos: u32 = 0;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "secs" => secs = map.next_value()?,
                        "nanos" => nanos = map.next_value()?,
                        _ => {
                            return Err(serde::de::Error::unknown_field(&key, &["secs", "nanos"]))
                        }
                    }
                }
                Duration::from_secs(secs)
                    .checked_add(Duration::from_nanos(u64::from(nanos)))
                    .map(SimTime)
                    .ok_or_else(|| {
                        serde::de::Error::custom(format!(
                            "simulation time overflow ({secs}s + {nanos}ns)"
                        ))
                    })
            }
        }

        deserializer.deserialize_any(SimTimeVisitor)
    }
}

// CMP

impl PartialEq<f64> for SimTime {
    fn eq(&self, other: &f64) -> bool {
        let diff = (self.0.as_secs_f64() - *other).abs();
        diff < f64::EPSILON
    }
}

// OPS

impl Sub<Duration> for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Duration) -> Self::Output {
        self.checked_sub(rhs)
            .expect("Overflow when substracting Duration from SimTime")
    }
}

impl SubAssign<Duration> for SimTime {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl Div<f64> for SimTime {
    type Output = SimTime;

    fn div(self, rhs: f64) -> Self::Output {
        Self::from(self.0.as_secs_f64() / rhs)
    }
}

// DEREF

impl Deref for SimTime {
    type Target = Duration;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// FMT

impl Debug for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

// FROM

impl From<SimTime> for f64 {
    fn from(this: SimTime) -> Self {
        this.0.as_secs_f64()
    }
}

impl From<f64> for SimTime {
    fn from(value: f64) -> Self {
        SimTime(Duration::from_secs_f64(value))
    }
}
