//! Wall-clock timing for `--count-time`.

use chrono::{DateTime, Local, TimeDelta};

#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started_at: DateTime<Local>,
}

impl Stopwatch {
    #[must_use]
    pub fn start() -> Self {
        Self {
            started_at: Local::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn elapsed(&self) -> TimeDelta {
        Local::now() - self.started_at
    }
}

/// Render a duration as `H:MM:SS.ffffff`. Negative values clamp to zero.
pub fn format_elapsed(delta: TimeDelta) -> String {
    let delta = delta.max(TimeDelta::zero());
    let hours = delta.num_hours();
    let minutes = delta.num_minutes() % 60;
    let seconds = delta.num_seconds() % 60;
    let micros = delta.subsec_nanos() / 1_000;
    format!("{}:{:02}:{:02}.{:06}", hours, minutes, seconds, micros)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_sub_second() {
        let delta = TimeDelta::microseconds(12_345);
        assert_eq!(format_elapsed(delta), "0:00:00.012345");
    }

    #[test]
    fn test_format_elapsed_hours_minutes_seconds() {
        let delta = TimeDelta::hours(2)
            + TimeDelta::minutes(3)
            + TimeDelta::seconds(4)
            + TimeDelta::milliseconds(500);
        assert_eq!(format_elapsed(delta), "2:03:04.500000");
    }

    #[test]
    fn test_format_elapsed_more_than_a_day() {
        let delta = TimeDelta::hours(26);
        assert_eq!(format_elapsed(delta), "26:00:00.000000");
    }

    #[test]
    fn test_format_elapsed_negative_clamps_to_zero() {
        assert_eq!(format_elapsed(TimeDelta::seconds(-5)), "0:00:00.000000");
    }

    #[test]
    fn test_stopwatch_elapsed_is_not_negative() {
        let watch = Stopwatch::start();
        assert!(watch.elapsed() >= TimeDelta::zero());
        assert!(watch.started_at() <= Local::now());
    }
}
