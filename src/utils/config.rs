//! Bounds for configuration values.

use core::cmp;

//------------ DefMinMax -----------------------------------------------------

/// The default, minimum, and maximum values for a tunable.
///
/// Setters of the various `Config` types run user supplied values through
/// [`DefMinMax::limit`] so that a config can never hold a value that would
/// make a requester or resolver misbehave, e.g. a zero ack threshold.
#[derive(Clone, Copy, Debug)]
pub struct DefMinMax<T> {
    /// The default value.
    def: T,

    /// The smallest accepted value.
    min: T,

    /// The largest accepted value.
    max: T,
}

impl<T> DefMinMax<T> {
    /// Creates a new set of bounds.
    pub const fn new(def: T, min: T, max: T) -> Self {
        Self { def, min, max }
    }

    /// Returns the default value.
    pub fn default(self) -> T {
        self.def
    }

    /// Clamps the given value into the minimum/maximum range.
    pub fn limit(self, value: T) -> T
    where
        T: Ord,
    {
        cmp::max(self.min, cmp::min(self.max, value))
    }

    /// Clamps an optional value, keeping `None` as is.
    pub fn limit_opt(self, value: Option<T>) -> Option<T>
    where
        T: Ord,
    {
        value.map(|value| self.limit(value))
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use core::time::Duration;

    #[test]
    fn limit() {
        const BOUNDS: DefMinMax<usize> = DefMinMax::new(4, 1, 1000);
        assert_eq!(BOUNDS.default(), 4);
        assert_eq!(BOUNDS.limit(0), 1);
        assert_eq!(BOUNDS.limit(7), 7);
        assert_eq!(BOUNDS.limit(5000), 1000);
    }

    #[test]
    fn limit_opt() {
        const BOUNDS: DefMinMax<Duration> = DefMinMax::new(
            Duration::from_secs(5),
            Duration::from_millis(1),
            Duration::from_secs(60),
        );
        assert_eq!(BOUNDS.limit_opt(None), None);
        assert_eq!(
            BOUNDS.limit_opt(Some(Duration::ZERO)),
            Some(Duration::from_millis(1))
        );
    }
}
