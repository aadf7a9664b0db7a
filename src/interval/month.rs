use std::error::Error;
use std::fmt;

use jiff::{civil::Date, ToSpan};

#[derive(PartialEq, Debug, Clone, Copy, Hash, Eq, PartialOrd, Ord)]
pub struct Month(Date);

impl Month {
    /// Fails for a month outside 1..=12 or a year jiff can't represent.
    pub fn new(year: i16, month: i8) -> Result<Month, jiff::Error> {
        Ok(Month(Date::new(year, month, 1)?))
    }

    /// Return the month that contains this date.
    pub fn containing(dt: Date) -> Month {
        Month(dt.first_of_month())
    }

    pub fn year(&self) -> i16 {
        self.0.year()
    }

    pub fn month(&self) -> i8 {
        self.0.month()
    }

    pub fn start_date(&self) -> Date {
        self.0
    }

    pub fn end_date(&self) -> Date {
        self.0.last_of_month()
    }

    pub fn next(&self) -> Month {
        Month(self.0.saturating_add(1.month()))
    }

    pub fn previous(&self) -> Month {
        Month(self.0.saturating_sub(1.month()))
    }

    pub fn contains(&self, dt: Date) -> bool {
        dt >= self.start_date() && dt <= self.end_date()
    }

    /// Inclusive of the end month.
    pub fn up_to(&self, end: Month) -> Result<Vec<Month>, Box<dyn Error>> {
        if *self > end {
            return Err(format!("month {} is after {}", self, end).into());
        }
        let mut res: Vec<Month> = Vec::new();
        let mut current = *self;
        while current <= end {
            res.push(current);
            current = current.next();
        }
        Ok(res)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year(), self.month())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use jiff::civil::date;

    use super::*;

    fn month(year: i16, month: i8) -> Month {
        Month::new(year, month).unwrap()
    }

    #[test]
    fn invalid_month() {
        assert!(Month::new(2024, 13).is_err());
        assert!(Month::new(2024, 0).is_err());
        assert_eq!(Month::new(2024, 12).map(|e| e.end_date()).ok(), Some(date(2024, 12, 31)));
    }

    #[test]
    fn test_month() {
        let m = Month::containing(date(2024, 2, 17));
        assert_eq!(m, month(2024, 2));
        assert_eq!(m.start_date(), date(2024, 2, 1));
        assert_eq!(m.end_date(), date(2024, 2, 29));
        assert_eq!(m.next(), month(2024, 3));
        assert_eq!(month(2024, 1).previous(), month(2023, 12));
        assert_eq!(month(2023, 12).next(), month(2024, 1));
        assert!(m.contains(date(2024, 2, 29)));
        assert!(!m.contains(date(2024, 3, 1)));
        assert_eq!(m.to_string(), "2024-02");
    }

    #[test]
    fn test_up_to() -> Result<(), Box<dyn Error>> {
        let months = month(2013, 11).up_to(month(2014, 2))?;
        assert_eq!(
            months,
            vec![month(2013, 11), month(2013, 12), month(2014, 1), month(2014, 2)]
        );
        assert!(month(2014, 2).up_to(month(2013, 11)).is_err());
        Ok(())
    }
}
