//! Bounded stat value
//!
//! `auto_regulate` ditentukan saat konstruksi: `true` meng-clamp assignment
//! ke [min, max], `false` menolak dengan `OutOfRangeError`.

use std::fmt::{Debug, Display};

use crate::error::{Bound, OutOfRangeError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stat<T> {
    minimum: T,
    current: T,
    maximum: T,
    auto_regulate: bool,
}

impl<T> Stat<T>
where
    T: PartialOrd + Copy + Debug + Display,
{
    /// Membuat stat baru; `current` awal ikut aturan `set_current`
    pub fn new(minimum: T, current: T, maximum: T, auto_regulate: bool) -> Result<Self, OutOfRangeError<T>> {
        let mut stat = Self {
            minimum,
            current: minimum,
            maximum,
            auto_regulate,
        };
        stat.set_current(current)?;
        Ok(stat)
    }

    #[inline(always)]
    pub fn current(&self) -> T {
        self.current
    }

    #[inline(always)]
    pub fn minimum(&self) -> T {
        self.minimum
    }

    #[inline(always)]
    pub fn maximum(&self) -> T {
        self.maximum
    }

    pub fn auto_regulate(&self) -> bool {
        self.auto_regulate
    }

    /// Set current value: clamp atau reject
    ///
    /// Jika reject, `current` tidak berubah.
    pub fn set_current(&mut self, value: T) -> Result<(), OutOfRangeError<T>> {
        self.current = self.check(value)?;
        Ok(())
    }

    /// Ganti bounds lalu terapkan lagi ke `current`
    pub fn set_bounds(&mut self, minimum: T, maximum: T) -> Result<(), OutOfRangeError<T>> {
        let previous = (self.minimum, self.maximum);
        self.minimum = minimum;
        self.maximum = maximum;
        match self.check(self.current) {
            Ok(current) => {
                self.current = current;
                Ok(())
            }
            Err(e) => {
                (self.minimum, self.maximum) = previous;
                Err(e)
            }
        }
    }

    fn check(&self, value: T) -> Result<T, OutOfRangeError<T>> {
        let (bound, side) = if value < self.minimum {
            (self.minimum, Bound::Minimum)
        } else if value > self.maximum {
            (self.maximum, Bound::Maximum)
        } else {
            return Ok(value);
        };

        if self.auto_regulate {
            Ok(bound)
        } else {
            Err(OutOfRangeError {
                attempted: value,
                bound,
                side,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_when_regulating() {
        let mut hp = Stat::new(0, 50, 100, true).unwrap();

        hp.set_current(-5).unwrap();
        assert_eq!(hp.current(), 0);

        hp.set_current(250).unwrap();
        assert_eq!(hp.current(), 100);

        hp.set_current(42).unwrap();
        assert_eq!(hp.current(), 42);
    }

    #[test]
    fn test_rejects_without_regulation() {
        let mut hp = Stat::new(0, 50, 100, false).unwrap();

        let err = hp.set_current(-5).unwrap_err();
        assert_eq!(err.attempted, -5);
        assert_eq!(err.bound, 0);
        assert_eq!(err.side, Bound::Minimum);
        assert_eq!(
            err.to_string(),
            "current was set to -5 which is less than the minimum value of 0"
        );
        // tidak berubah
        assert_eq!(hp.current(), 50);

        let err = hp.set_current(101).unwrap_err();
        assert_eq!(err.side, Bound::Maximum);
    }

    #[test]
    fn test_initial_value_checked() {
        assert!(Stat::new(1.0, 5.0, 2.0, false).is_err());
        assert_eq!(Stat::new(1.0, 5.0, 2.0, true).unwrap().current(), 2.0);
    }

    #[test]
    fn test_set_bounds_reapplies() {
        let mut stat = Stat::new(0u32, 80, 100, true).unwrap();
        stat.set_bounds(0, 60).unwrap();
        assert_eq!(stat.current(), 60);

        let mut strict = Stat::new(0u32, 80, 100, false).unwrap();
        assert!(strict.set_bounds(0, 60).is_err());
        assert_eq!(strict.maximum(), 100);
        assert_eq!(strict.current(), 80);
    }

    #[test]
    fn test_clamp_stays_in_range() {
        let mut stat = Stat::new(-10i64, 0, 10, true).unwrap();
        for v in -50..=50 {
            stat.set_current(v).unwrap();
            assert!(stat.current() >= stat.minimum() && stat.current() <= stat.maximum());
        }
    }
}
