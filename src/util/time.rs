use std::{fmt::Display, time::Instant};

use chrono::NaiveDateTime;

pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Prints how long its scope took when dropped.
pub struct Benchmark {
    time: Instant,
    label: &'static str,
}

impl Benchmark {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            time: Instant::now(),
        }
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.time.elapsed().as_secs_f64() / 60.0
    }
}

impl Drop for Benchmark {
    fn drop(&mut self) {
        println!("{} took {} ({:.3} minutes)", self.label, self, self.elapsed_minutes());
    }
}

impl Display for Benchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let duration = self.time.elapsed();

        if duration.as_secs() >= 60 {
            write!(
                f,
                "{:0>2}:{:0>2}min",
                duration.as_secs() / 60,
                duration.as_secs() % 60
            )
        } else {
            write!(f, "{}ms", duration.as_millis())
        }
    }
}

pub struct DateTimeUtils;

impl DateTimeUtils {
    pub fn parse(value: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT).ok()
    }

    /// `HH:MM:SS`, hours unbounded.
    pub fn format_duration_secs(secs: i64) -> String {
        let sign = if secs < 0 { "-" } else { "" };
        let secs = secs.abs();

        format!(
            "{}{:0>2}:{:0>2}:{:0>2}",
            sign,
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )
    }
}
