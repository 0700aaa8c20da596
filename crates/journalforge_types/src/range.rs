//! Range-id canonicalization for the four aggregation tiers.
//!
//! Range ids are the deterministic keys identifying one artifact within a
//! tier: a week-start date, a `YYYY-MM` month string, a `YYYY-QN` quarter
//! string, or the literal `main` for the synthesis singleton.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The Monday-aligned start of a 7-day week window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekStart(pub NaiveDate);

impl WeekStart {
    /// Align `date` forward to the Monday preceding or equal to it.
    ///
    /// Per the spec, the week-start weekday is fixed for the life of one
    /// run; callers resolve it once (from the first manifest date) and
    /// persist it on Pipeline State so a crash-restart does not shift the
    /// week grid underneath an in-flight run.
    pub fn containing(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday();
        Self(date - Duration::days(offset as i64))
    }

    pub fn end(&self) -> NaiveDate {
        self.0 + Duration::days(6)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.0 && date <= self.end()
    }

    /// The calendar month this week is assigned to for monthly rollup:
    /// the month containing `week_start` (not the month the week's tail
    /// end might spill into).
    pub fn month(&self) -> MonthKey {
        MonthKey::from_date(self.0)
    }

    pub fn as_key(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

impl FromStr for WeekStart {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(NaiveDate::parse_from_str(s, "%Y-%m-%d")?))
    }
}

/// A calendar month, keyed `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("valid y/m")
    }

    /// Exclusive upper bound: the first day of the following month.
    pub fn next_month_first_day(&self) -> NaiveDate {
        if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1).expect("valid y/m")
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1).expect("valid y/m")
        }
    }

    pub fn quarter(&self) -> QuarterKey {
        let q = (self.month - 1) / 3 + 1;
        QuarterKey {
            year: self.year,
            quarter: q,
        }
    }

    pub fn as_key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    pub fn next(&self) -> Self {
        Self::from_date(self.next_month_first_day())
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid month key: {s}"))?;
        let year = y.parse().map_err(|_| format!("invalid year in {s}"))?;
        let month: u32 = m.parse().map_err(|_| format!("invalid month in {s}"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in {s}"));
        }
        Ok(Self { year, month })
    }
}

/// A calendar quarter, keyed `YYYY-QN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuarterKey {
    pub year: i32,
    pub quarter: u32,
}

impl QuarterKey {
    pub fn months(&self) -> [MonthKey; 3] {
        let first_month = (self.quarter - 1) * 3 + 1;
        [
            MonthKey {
                year: self.year,
                month: first_month,
            },
            MonthKey {
                year: self.year,
                month: first_month + 1,
            },
            MonthKey {
                year: self.year,
                month: first_month + 2,
            },
        ]
    }

    pub fn as_key(&self) -> String {
        format!("{:04}-Q{}", self.year, self.quarter)
    }

    pub fn next(&self) -> Self {
        if self.quarter == 4 {
            Self {
                year: self.year + 1,
                quarter: 1,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter + 1,
            }
        }
    }
}

impl fmt::Display for QuarterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

impl FromStr for QuarterKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, q) = s
            .split_once("-Q")
            .ok_or_else(|| format!("invalid quarter key: {s}"))?;
        let year = y.parse().map_err(|_| format!("invalid year in {s}"))?;
        let quarter: u32 = q.parse().map_err(|_| format!("invalid quarter in {s}"))?;
        if !(1..=4).contains(&quarter) {
            return Err(format!("quarter out of range in {s}"));
        }
        Ok(Self { year, quarter })
    }
}

/// Enumerate every week window whose `[week_start, week_start+6]` range
/// intersects `[first, last]`, anchored so the first window starts on the
/// Monday containing `first`.
pub fn enumerate_weeks(first: NaiveDate, last: NaiveDate) -> Vec<WeekStart> {
    let mut weeks = Vec::new();
    let mut cursor = WeekStart::containing(first);
    while cursor.0 <= last {
        weeks.push(cursor);
        cursor = WeekStart(cursor.0 + Duration::days(7));
    }
    weeks
}

/// Enumerate every calendar month whose `week_start` falls within
/// `[first, last]` date range covered by the weekly tier's outputs.
pub fn enumerate_months(weeks: &[WeekStart]) -> Vec<MonthKey> {
    let mut months: Vec<MonthKey> = weeks.iter().map(|w| w.month()).collect();
    months.sort();
    months.dedup();
    months
}

/// Enumerate every quarter covering a set of months.
pub fn enumerate_quarters(months: &[MonthKey]) -> Vec<QuarterKey> {
    let mut quarters: Vec<QuarterKey> = months.iter().map(|m| m.quarter()).collect();
    quarters.sort();
    quarters.dedup();
    quarters
}

/// The fixed eight-quarter span a synthesis covers (used to determine
/// readiness: synthesis needs all eight present).
pub fn two_year_span(first_quarter: QuarterKey) -> [QuarterKey; 8] {
    let mut quarters = Vec::with_capacity(8);
    let mut cursor = first_quarter;
    for _ in 0..8 {
        quarters.push(cursor);
        cursor = cursor.next();
    }
    quarters.try_into().expect("exactly 8 quarters")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn week_start_aligns_to_monday() {
        // 2025-03-03 is a Monday.
        assert_eq!(WeekStart::containing(d("2025-03-03")).0, d("2025-03-03"));
        // 2025-03-05 is a Wednesday in the same week.
        assert_eq!(WeekStart::containing(d("2025-03-05")).0, d("2025-03-03"));
        // 2025-03-09 is a Sunday, still in the same week.
        assert_eq!(WeekStart::containing(d("2025-03-09")).0, d("2025-03-03"));
    }

    #[test]
    fn week_straddling_month_boundary_assigns_to_week_start_month() {
        // Week starting 2025-02-24 runs through 2025-03-02: spans Feb/Mar.
        let week = WeekStart(d("2025-02-24"));
        assert_eq!(week.month(), MonthKey { year: 2025, month: 2 });
    }

    #[test]
    fn enumerate_weeks_covers_exact_range() {
        let weeks = enumerate_weeks(d("2025-03-03"), d("2025-03-05"));
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].0, d("2025-03-03"));
    }

    #[test]
    fn month_key_round_trips() {
        let m = MonthKey { year: 2025, month: 3 };
        assert_eq!(m.as_key(), "2025-03");
        assert_eq!(m.as_key().parse::<MonthKey>().unwrap(), m);
    }

    #[test]
    fn quarter_key_round_trips() {
        let q = QuarterKey { year: 2025, quarter: 1 };
        assert_eq!(q.as_key(), "2025-Q1");
        assert_eq!(q.as_key().parse::<QuarterKey>().unwrap(), q);
    }

    #[test]
    fn quarter_months_are_contiguous() {
        let q = QuarterKey { year: 2025, quarter: 1 };
        let months = q.months();
        assert_eq!(months[0], MonthKey { year: 2025, month: 1 });
        assert_eq!(months[2], MonthKey { year: 2025, month: 3 });
    }

    #[test]
    fn two_year_span_has_eight_quarters() {
        let span = two_year_span(QuarterKey { year: 2024, quarter: 1 });
        assert_eq!(span.len(), 8);
        assert_eq!(span[7], QuarterKey { year: 2025, quarter: 4 });
    }
}
