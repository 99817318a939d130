//! ISO week periods in the `YYYYWW` form Unit4 uses for its weekly view.

use chrono::{Datelike, Duration, IsoWeek, NaiveDate, Weekday};
use std::fmt;
use std::str::FromStr;

use crate::errors::AutomationError;
use crate::patterns::PERIOD_FORMAT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    week: u32,
}

impl Period {
    pub fn new(year: i32, week: u32) -> Result<Self, AutomationError> {
        // from_isoywd_opt rejects week 53 in years that only have 52
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(|| {
            AutomationError::InvalidArgument(format!("{year} has no ISO week {week}"))
        })?;
        Ok(Self { year, week })
    }

    pub fn from_iso_week(week: IsoWeek) -> Self {
        Self {
            year: week.year(),
            week: week.week(),
        }
    }

    /// The period containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self::from_iso_week(date.iso_week())
    }

    /// The period containing today's local date.
    pub fn current() -> Self {
        Self::containing(chrono::Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    /// Monday of this ISO week.
    pub fn start(&self) -> NaiveDate {
        // Construction guarantees the week exists
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon).unwrap_or_default()
    }

    /// Sunday of this ISO week.
    pub fn end(&self) -> NaiveDate {
        self.start() + Duration::days(6)
    }

    /// Monday-to-Sunday date range, both ends inclusive.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        (self.start(), self.end())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let (from, to) = self.date_range();
        from <= date && date <= to
    }

    pub fn next(&self) -> Self {
        Self::containing(self.start() + Duration::days(7))
    }

    /// The literal digits typed into the Unit4 period control.
    pub fn code(&self) -> String {
        format!("{:04}{:02}", self.year, self.week)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for Period {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !PERIOD_FORMAT.is_match(s) {
            return Err(AutomationError::InvalidArgument(format!(
                "Invalid period format '{s}'. Expected YYYYWW (e.g., 202605)"
            )));
        }
        let year: i32 = s[..4]
            .parse()
            .map_err(|e| AutomationError::InvalidArgument(format!("period year: {e}")))?;
        let week: u32 = s[4..]
            .parse()
            .map_err(|e| AutomationError::InvalidArgument(format!("period week: {e}")))?;
        Period::new(year, week)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_is_monday_to_sunday() {
        let period: Period = "202605".parse().unwrap();
        let (from, to) = period.date_range();
        assert_eq!(from, date(2026, 1, 26));
        assert_eq!(to, date(2026, 2, 1));
        assert_eq!(from.weekday(), Weekday::Mon);
        assert_eq!(to.weekday(), Weekday::Sun);
    }

    #[test]
    fn test_week_one_starting_in_previous_december() {
        let period: Period = "202601".parse().unwrap();
        assert_eq!(period.date_range(), (date(2025, 12, 29), date(2026, 1, 4)));

        let period: Period = "202501".parse().unwrap();
        assert_eq!(period.date_range(), (date(2024, 12, 30), date(2025, 1, 5)));
    }

    #[test]
    fn test_week_53_only_in_long_years() {
        let period: Period = "202053".parse().unwrap();
        assert_eq!(period.date_range(), (date(2020, 12, 28), date(2021, 1, 3)));
        assert!("202553".parse::<Period>().is_err());
        assert!("202600".parse::<Period>().is_err());
    }

    #[test]
    fn test_rejects_malformed_codes() {
        assert!("2026-05".parse::<Period>().is_err());
        assert!("20265".parse::<Period>().is_err());
        assert!("abcdef".parse::<Period>().is_err());
    }

    #[test]
    fn test_every_week_of_a_year_round_trips() {
        for year in [2020, 2021, 2025, 2026] {
            let mut period: Period = format!("{year}01").parse().unwrap();
            while period.year() == year {
                let (from, to) = period.date_range();
                assert_eq!((to - from).num_days(), 6);
                assert_eq!(Period::containing(from), period);
                assert_eq!(Period::containing(to), period);
                assert_eq!(period.code().parse::<Period>().unwrap(), period);
                period = period.next();
            }
        }
    }
}
