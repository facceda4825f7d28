use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};

use crate::error::WindowError;

/// Rolling report windows ending today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    Weekly,
    Monthly,
}

impl WindowMode {
    pub const fn days(self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::Monthly => 30,
        }
    }
}

impl FromStr for WindowMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(format!("unknown window '{other}', expected weekly or monthly")),
        }
    }
}

/// Inclusive date range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl ReportWindow {
    pub fn explicit(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// The last `mode.days()` days, today included.
    pub fn rolling(mode: WindowMode, today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(mode.days() - 1),
            end: today,
        }
    }

    /// Submission timestamps are local wall-clock times, so "today" is too.
    pub fn rolling_from_now(mode: WindowMode) -> Self {
        Self::rolling(mode, Local::now().date_naive())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let day = at.date();
        day >= self.start && day <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// File-name friendly form, e.g. `2026-03-01_to_2026-03-07`.
    pub fn label(&self) -> String {
        format!("{}_to_{}", self.start, self.end)
    }
}

impl fmt::Display for ReportWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date")
    }

    #[test]
    fn rolling_windows_cover_exact_day_counts() {
        let weekly = ReportWindow::rolling(WindowMode::Weekly, date(31));
        assert_eq!(weekly.start(), date(25));
        assert_eq!(weekly.days(), 7);

        let monthly = ReportWindow::rolling(WindowMode::Monthly, date(31));
        assert_eq!(monthly.start(), date(2));
        assert_eq!(monthly.days(), 30);
    }

    #[test]
    fn rolling_from_now_ends_on_the_local_date() {
        let today = Local::now().date_naive();
        let window = ReportWindow::rolling_from_now(WindowMode::Weekly);
        // Tolerates the clock crossing midnight between the two reads.
        assert!(window.end() == today || window.end() == today.succ_opt().expect("next day"));
        assert_eq!(window.days(), 7);
    }

    #[test]
    fn explicit_window_rejects_inverted_range() {
        assert_eq!(
            ReportWindow::explicit(date(5), date(4)),
            Err(WindowError::Inverted {
                start: date(5),
                end: date(4)
            })
        );
        let single = ReportWindow::explicit(date(4), date(4)).expect("same-day window");
        assert_eq!(single.days(), 1);
    }

    #[test]
    fn contains_is_inclusive_on_both_ends() {
        let window = ReportWindow::explicit(date(1), date(7)).expect("ordered");
        let late = date(7).and_hms_opt(23, 59, 59).expect("valid time");
        let early = date(1).and_hms_opt(0, 0, 0).expect("valid time");
        let after = date(8).and_hms_opt(0, 0, 0).expect("valid time");
        assert!(window.contains(late));
        assert!(window.contains(early));
        assert!(!window.contains(after));
        assert_eq!(window.label(), "2026-03-01_to_2026-03-07");
    }

    #[test]
    fn window_mode_parses_case_insensitively() {
        assert_eq!("Weekly".parse::<WindowMode>(), Ok(WindowMode::Weekly));
        assert_eq!("monthly".parse::<WindowMode>(), Ok(WindowMode::Monthly));
        assert!("daily".parse::<WindowMode>().is_err());
    }
}
