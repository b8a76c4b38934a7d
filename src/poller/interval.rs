use std::time::Duration;

use serde::Deserialize;

/// Which event refreshes the idle clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityMode {
    /// Polling start and every cycle that stored new messages.
    #[default]
    NewData,
    /// Every completed cycle, whatever it found. Failed cycles don't count.
    EveryCycle,
}

/// Backoff and recovery rules for the delay between cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalPolicy {
    pub initial: Duration,
    pub min: Duration,
    pub max: Duration,
    pub speed_up: f64,
    pub slow_down: f64,
    pub idle_threshold: Duration,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            min: Duration::from_secs(1),
            max: Duration::from_secs(60),
            speed_up: 0.75,
            slow_down: 1.5,
            idle_threshold: Duration::from_secs(300),
        }
    }
}

impl IntervalPolicy {
    /// Delay before the next cycle.
    ///
    /// `since_activity` is the time elapsed since the idle clock was last
    /// refreshed, `None` if it never was.
    pub fn next(
        &self,
        current: Duration,
        had_new_data: bool,
        since_activity: Option<Duration>,
    ) -> Duration {
        let next = if had_new_data {
            self.scale(current, self.speed_up)
        } else if since_activity.is_some_and(|idle| idle > self.idle_threshold) {
            self.scale(current, self.slow_down)
        } else {
            current
        };
        next.max(self.min).min(self.max)
    }

    /// `current * factor`; a result a `Duration` cannot hold saturates at
    /// `max`.
    fn scale(&self, current: Duration, factor: f64) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * factor).unwrap_or(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_new_data_speeds_up() {
        let policy = IntervalPolicy::default();
        assert_eq!(policy.next(secs(5.0), true, None), secs(3.75));
        assert_eq!(policy.next(secs(5.0), true, Some(secs(900.0))), secs(3.75));
    }

    #[test]
    fn test_speed_up_floors_at_min() {
        let policy = IntervalPolicy::default();
        assert_eq!(policy.next(secs(1.2), true, None), secs(1.0));
        assert_eq!(policy.next(secs(1.0), true, None), secs(1.0));
    }

    #[test]
    fn test_silence_slows_down() {
        let policy = IntervalPolicy::default();
        assert_eq!(policy.next(secs(5.0), false, Some(secs(301.0))), secs(7.5));
    }

    #[test]
    fn test_slow_down_caps_at_max() {
        let policy = IntervalPolicy::default();
        assert_eq!(policy.next(secs(50.0), false, Some(secs(400.0))), secs(60.0));
        assert_eq!(policy.next(secs(60.0), false, Some(secs(400.0))), secs(60.0));
    }

    #[test]
    fn test_unrepresentable_factor_saturates_at_max() {
        let policy = IntervalPolicy {
            slow_down: 1e300,
            ..IntervalPolicy::default()
        };
        assert_eq!(policy.next(secs(5.0), false, Some(secs(301.0))), secs(60.0));

        let policy = IntervalPolicy {
            slow_down: f64::NAN,
            speed_up: f64::NAN,
            ..IntervalPolicy::default()
        };
        assert_eq!(policy.next(secs(5.0), false, Some(secs(301.0))), secs(60.0));
        assert_eq!(policy.next(secs(5.0), true, None), secs(60.0));
    }

    #[test]
    fn test_recent_activity_holds_interval() {
        let policy = IntervalPolicy::default();
        assert_eq!(policy.next(secs(5.0), false, Some(secs(300.0))), secs(5.0));
        assert_eq!(policy.next(secs(5.0), false, Some(secs(12.0))), secs(5.0));
        assert_eq!(policy.next(secs(5.0), false, None), secs(5.0));
    }

    #[test]
    fn test_interval_stays_in_bounds() {
        let policy = IntervalPolicy::default();
        let mut interval = policy.initial;
        let pattern = [true, false, true, true, false, false, false, true];

        for step in 0..400 {
            let had_new = pattern[step % pattern.len()];
            let idle = if step % 3 == 0 { Some(secs(301.0)) } else { Some(secs(1.0)) };
            let next = policy.next(interval, had_new, idle);
            if had_new {
                assert!(next < interval || next == policy.min);
            }
            interval = next;
            assert!(interval >= policy.min && interval <= policy.max);
        }
    }

    #[test]
    fn test_activity_mode_deserializes_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            activity: ActivityMode,
        }
        let w: Wrapper = toml::from_str("activity = \"every-cycle\"").unwrap();
        assert_eq!(w.activity, ActivityMode::EveryCycle);
    }
}
