use serde::Serialize;
use std::fmt;
use std::ops::{Add, Sub};

/// Capture timestamp (or delay between timestamps)
///
/// Panic-free replacement for std::time::Duration, with microsecond precision
/// and exposed fields. Arithmetic saturates instead of wrapping, so a frame
/// with a timestamp in the past of its stream never produces a huge delay.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug, Serialize)]
pub struct Duration {
    pub secs: u32,
    pub micros: u32,
}

pub const MICROS_PER_SEC: u32 = 1_000_000;

impl Duration {
    /// Build Duration from secs and micros
    pub fn new(secs: u32, micros: u32) -> Duration {
        let secs = secs.saturating_add(micros / MICROS_PER_SEC);
        Duration {
            secs,
            micros: micros % MICROS_PER_SEC,
        }
    }

    pub const fn from_secs(secs: u32) -> Duration {
        Duration { secs, micros: 0 }
    }

    /// Test if Duration object is null
    #[inline]
    pub fn is_null(self) -> bool {
        self.secs == 0 && self.micros == 0
    }
}

impl Add for Duration {
    type Output = Duration;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn add(self, other: Duration) -> Self::Output {
        let secs = self.secs.saturating_add(other.secs);
        let micros = self.micros + other.micros;
        if micros >= MICROS_PER_SEC {
            Duration {
                secs: secs.saturating_add(1),
                micros: micros - MICROS_PER_SEC,
            }
        } else {
            Duration { secs, micros }
        }
    }
}

impl Sub for Duration {
    type Output = Duration;

    /// Saturating subtraction: returns a null Duration if `other > self`
    #[allow(clippy::suspicious_arithmetic_impl)]
    fn sub(self, other: Duration) -> Self::Output {
        if other >= self {
            return Duration::default();
        }
        if self.micros >= other.micros {
            Duration {
                secs: self.secs - other.secs,
                micros: self.micros - other.micros,
            }
        } else {
            Duration {
                secs: self.secs - other.secs - 1,
                micros: MICROS_PER_SEC + self.micros - other.micros,
            }
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.micros)
    }
}

#[cfg(test)]
mod tests {
    use super::Duration;
    #[test]
    fn duration_sub() {
        let d1 = Duration::new(1234, 5678);
        let d2 = Duration::new(1234, 6789);
        let d = d2 - d1;
        assert_eq!(d.secs, 0);
        assert_eq!(d.micros, 1111);
        let d = Duration::new(10, 100) - Duration::new(8, 900_000);
        assert_eq!(d, Duration::new(1, 100_100));
    }

    #[test]
    fn duration_sub_saturates() {
        let d = Duration::new(5, 0) - Duration::new(6, 0);
        assert!(d.is_null());
    }

    #[test]
    fn duration_add_carry() {
        let d = Duration::new(1, 600_000) + Duration::new(2, 400_000);
        assert_eq!(d, Duration::from_secs(4));
        assert_eq!(Duration::new(0, 2_500_000), Duration::new(2, 500_000));
        assert_eq!(format!("{}", Duration::new(3, 42)), "3.000042");
    }
}
