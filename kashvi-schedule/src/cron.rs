use chrono::{DateTime, Datelike, Local, Timelike};
use thiserror::Error;

/// Parse failure for a 5-field cron expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CronParseError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid field {0:?}")]
    Field(String),
}

/// A parsed 5-field cron expression: minute, hour, day of month, month,
/// day of week (0 = Sunday).
///
/// Each field is `*`, an exact value, an inclusive range `a-b`, or a step
/// `*/s` matching values divisible by `s`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronParseError::FieldCount(fields.len()));
        }
        Ok(Self {
            minute: CronField::parse(fields[0])?,
            hour: CronField::parse(fields[1])?,
            day_of_month: CronField::parse(fields[2])?,
            month: CronField::parse(fields[3])?,
            day_of_week: CronField::parse(fields[4])?,
        })
    }

    /// Whether `t`'s calendar minute matches the expression.
    pub fn matches(&self, t: DateTime<Local>) -> bool {
        self.minute.matches(t.minute())
            && self.hour.matches(t.hour())
            && self.day_of_month.matches(t.day())
            && self.month.matches(t.month())
            && self.day_of_week.matches(t.weekday().num_days_from_sunday())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CronField {
    Any,
    Exact(u32),
    Range(u32, u32),
    Step(u32),
}

impl CronField {
    fn parse(field: &str) -> Result<Self, CronParseError> {
        let invalid = || CronParseError::Field(field.to_string());

        if field == "*" {
            return Ok(Self::Any);
        }
        if let Some(step) = field.strip_prefix("*/") {
            let step: u32 = step.parse().map_err(|_| invalid())?;
            if step == 0 {
                return Err(invalid());
            }
            return Ok(Self::Step(step));
        }
        if let Some((lo, hi)) = field.split_once('-') {
            let lo: u32 = lo.parse().map_err(|_| invalid())?;
            let hi: u32 = hi.parse().map_err(|_| invalid())?;
            if lo > hi {
                return Err(invalid());
            }
            return Ok(Self::Range(lo, hi));
        }
        let n: u32 = field.parse().map_err(|_| invalid())?;
        Ok(Self::Exact(n))
    }

    fn matches(&self, value: u32) -> bool {
        match *self {
            Self::Any => true,
            Self::Exact(n) => value == n,
            Self::Range(lo, hi) => (lo..=hi).contains(&value),
            Self::Step(step) => value % step == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 4, hour, minute, 0).unwrap()
    }

    #[test]
    fn wildcard_matches_every_minute() {
        let expr = CronExpr::parse("* * * * *").unwrap();
        assert!(expr.matches(at(0, 0)));
        assert!(expr.matches(at(13, 37)));
        assert!(expr.matches(at(23, 59)));
    }

    #[test]
    fn step_matches_divisible_minutes() {
        let expr = CronExpr::parse("*/5 * * * *").unwrap();
        assert!(expr.matches(at(9, 0)));
        assert!(expr.matches(at(9, 5)));
        assert!(expr.matches(at(9, 55)));
        assert!(!expr.matches(at(9, 3)));
    }

    #[test]
    fn exact_time_matches_only_that_minute() {
        let expr = CronExpr::parse("0 3 * * *").unwrap();
        assert!(expr.matches(at(3, 0)));
        assert!(!expr.matches(at(3, 1)));
        assert!(!expr.matches(at(4, 0)));
    }

    #[test]
    fn range_is_inclusive() {
        let expr = CronExpr::parse("10-20 * * * *").unwrap();
        assert!(expr.matches(at(7, 10)));
        assert!(expr.matches(at(7, 15)));
        assert!(expr.matches(at(7, 20)));
        assert!(!expr.matches(at(7, 9)));
        assert!(!expr.matches(at(7, 21)));
    }

    #[test]
    fn weekday_zero_is_sunday() {
        let sunday = Local.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap();
        assert_eq!(sunday.weekday(), Weekday::Sun);

        let expr = CronExpr::parse("0 12 * * 0").unwrap();
        assert!(expr.matches(sunday));

        let monday = Local.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        assert!(!expr.matches(monday));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(matches!(
            CronExpr::parse("* * * *"),
            Err(CronParseError::FieldCount(4))
        ));
        assert!(CronExpr::parse("*/0 * * * *").is_err());
        assert!(CronExpr::parse("5-1 * * * *").is_err());
        assert!(CronExpr::parse("x * * * *").is_err());
    }
}
