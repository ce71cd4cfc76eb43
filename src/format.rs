//! Display formatting for run statistics.

use crate::track::RunSummary;
use time::macros::format_description;
use time::OffsetDateTime;

/// Pace split into whole minutes and truncated seconds per kilometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pace {
    pub minutes: u64,
    pub seconds: u64,
}

impl Pace {
    /// Seconds are truncated, not rounded: 0.899 min/km is 0'53".
    pub fn from_min_per_km(pace: f64) -> Self {
        if !pace.is_finite() || pace <= 0.0 {
            return Pace {
                minutes: 0,
                seconds: 0,
            };
        }
        let minutes = pace.trunc();
        let seconds = ((pace - minutes) * 60.0).trunc();
        Pace {
            minutes: minutes as u64,
            seconds: (seconds as u64).min(59),
        }
    }
}

impl std::fmt::Display for Pace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}'{:02}\"/km", self.minutes, self.seconds)
    }
}

/// `MM:SS`; minutes keep growing past 59.
pub fn format_clock(elapsed_seconds: u64) -> String {
    format!("{:02}:{:02}", elapsed_seconds / 60, elapsed_seconds % 60)
}

pub fn format_distance_km(distance_km: f64) -> String {
    format!("{:.2} km", distance_km)
}

pub fn format_speed(speed_mps: f64) -> String {
    format!("{:.2} m/s", speed_mps)
}

pub fn format_pace(summary: &RunSummary) -> String {
    Pace::from_min_per_km(summary.pace_min_per_km).to_string()
}

/// Wall-clock start of a run, `HH:MM:SS UTC`.
pub fn format_start_time(started_at: OffsetDateTime) -> String {
    let fmt = format_description!("[hour]:[minute]:[second]");
    match started_at.to_offset(time::UtcOffset::UTC).format(&fmt) {
        Ok(s) => format!("{s} UTC"),
        Err(_) => started_at.to_string(),
    }
}

/// The block shown once a run is stopped.
pub fn final_summary_lines(summary: &RunSummary) -> Vec<String> {
    vec![
        "Run finished".to_string(),
        format!("Distance: {}", format_distance_km(summary.distance_km)),
        format!("Time:     {}", format_clock(summary.elapsed_seconds)),
        format!("Avg pace: {}", format_pace(summary)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pace_truncates_seconds() {
        let pace = Pace::from_min_per_km(1.0 / 1.113);
        assert_eq!(pace, Pace { minutes: 0, seconds: 53 });
        assert_eq!(pace.to_string(), "0'53\"/km");
    }

    #[test]
    fn pace_of_typical_jog() {
        // 5.5 min/km
        assert_eq!(Pace::from_min_per_km(5.5).to_string(), "5'30\"/km");
        // 5.999 min/km truncates to 5'59"
        assert_eq!(Pace::from_min_per_km(5.999).to_string(), "5'59\"/km");
    }

    #[test]
    fn zero_or_invalid_pace_is_zero() {
        assert_eq!(Pace::from_min_per_km(0.0).to_string(), "0'00\"/km");
        assert_eq!(Pace::from_min_per_km(f64::NAN).to_string(), "0'00\"/km");
        assert_eq!(Pace::from_min_per_km(f64::INFINITY).to_string(), "0'00\"/km");
    }

    #[test]
    fn start_time_is_shown_in_utc() {
        let at = time::macros::datetime!(2024-03-23 14:05:09 +02:00);
        assert_eq!(format_start_time(at), "12:05:09 UTC");
    }

    #[test]
    fn clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(60), "01:00");
        assert_eq!(format_clock(3599), "59:59");
        assert_eq!(format_clock(3725), "62:05");
    }

    #[test]
    fn final_block() {
        let summary = RunSummary {
            elapsed_seconds: 60,
            distance_km: 1.11319,
            pace_min_per_km: 1.0 / 1.11319,
        };
        let lines = final_summary_lines(&summary);
        assert_eq!(lines[1], "Distance: 1.11 km");
        assert_eq!(lines[2], "Time:     01:00");
        assert_eq!(lines[3], "Avg pace: 0'53\"/km");
    }
}
