//! Half-hourly trading periods of the NZ wholesale market.
//!
//! A normal day has 48 periods; daylight saving days have 46 or 50.  A trading
//! period id (TPID) is written `YYYYMMDDPP`, e.g. `2014051733`.

use std::fmt;
use std::str::FromStr;

use jiff::{
    civil::{Date, DateTime},
    ToSpan,
};
use thiserror::Error;

pub const MAX_PERIOD: u8 = 50;

#[derive(Error, Debug, PartialEq)]
pub enum TradingPeriodError {
    #[error("trading period {0} is outside 1..=50")]
    OutOfRange(u8),
    #[error("failed parsing {0} as a trading period id")]
    Tpid(String),
}

/// Where inside the half hour a timestamp should point to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodOffset {
    Beginning,
    Middle,
    End,
}

impl PeriodOffset {
    fn minutes(&self) -> i64 {
        match self {
            PeriodOffset::Beginning => 30,
            PeriodOffset::Middle => 15,
            PeriodOffset::End => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradingPeriod {
    pub date: Date,
    pub period: u8,
}

impl TradingPeriod {
    pub fn new(date: Date, period: u8) -> Result<TradingPeriod, TradingPeriodError> {
        if period == 0 || period > MAX_PERIOD {
            return Err(TradingPeriodError::OutOfRange(period));
        }
        Ok(TradingPeriod { date, period })
    }

    /// The trading period a (local, wall clock) datetime falls in.
    pub fn containing(dt: DateTime) -> TradingPeriod {
        let period = 1 + 2 * dt.hour() as u8 + (dt.minute() / 30) as u8;
        TradingPeriod {
            date: dt.date(),
            period,
        }
    }

    pub fn tpid(&self) -> String {
        format!("{}{:02}", self.date.strftime("%Y%m%d"), self.period)
    }

    pub fn from_tpid(tpid: &str) -> Result<TradingPeriod, TradingPeriodError> {
        let err = || TradingPeriodError::Tpid(tpid.to_string());
        let tpid = tpid.trim();
        if tpid.len() != 10 || !tpid.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let date = Date::strptime("%Y%m%d", &tpid[0..8]).map_err(|_| err())?;
        let period: u8 = tpid[8..10].parse().map_err(|_| err())?;
        TradingPeriod::new(date, period)
    }

    /// Wall clock timestamp of this period.  Periods 49 and 50 only exist on the
    /// day clocks go back and land after midnight on the naive clock.
    pub fn timestamp(&self, offset: PeriodOffset) -> DateTime {
        let minutes = self.period as i64 * 30 - offset.minutes();
        self.date.to_datetime(jiff::civil::Time::midnight()) + minutes.minutes()
    }
}

impl fmt::Display for TradingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tpid())
    }
}

impl FromStr for TradingPeriod {
    type Err = TradingPeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TradingPeriod::from_tpid(s)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use jiff::civil::date;

    use super::*;

    #[test]
    fn tpid_round_trip() -> Result<(), Box<dyn Error>> {
        let tp: TradingPeriod = "2014051733".parse()?;
        assert_eq!(tp, TradingPeriod::new(date(2014, 5, 17), 33)?);
        assert_eq!(tp.tpid(), "2014051733");
        assert_eq!(TradingPeriod::new(date(2014, 5, 17), 4)?.tpid(), "2014051704");
        Ok(())
    }

    #[test]
    fn bad_tpid() {
        assert!(TradingPeriod::from_tpid("201405173").is_err());
        assert!(TradingPeriod::from_tpid("2014051700").is_err());
        assert_eq!(
            TradingPeriod::from_tpid("2014051751"),
            Err(TradingPeriodError::OutOfRange(51))
        );
        assert!(TradingPeriod::from_tpid("2014133133").is_err());
    }

    #[test]
    fn timestamps() -> Result<(), Box<dyn Error>> {
        let tp = TradingPeriod::new(date(2014, 5, 17), 44)?;
        assert_eq!(
            tp.timestamp(PeriodOffset::Beginning),
            date(2014, 5, 17).at(21, 30, 0, 0)
        );
        assert_eq!(
            tp.timestamp(PeriodOffset::Middle),
            date(2014, 5, 17).at(21, 45, 0, 0)
        );
        assert_eq!(tp.timestamp(PeriodOffset::End), date(2014, 5, 17).at(22, 0, 0, 0));
        Ok(())
    }

    #[test]
    fn containing_datetime() {
        let tp = TradingPeriod::containing(date(2014, 5, 17).at(0, 0, 0, 0));
        assert_eq!(tp.period, 1);
        let tp = TradingPeriod::containing(date(2014, 5, 17).at(23, 59, 0, 0));
        assert_eq!(tp.period, 48);
        let tp = TradingPeriod::containing(date(2014, 5, 17).at(10, 45, 0, 0));
        assert_eq!(tp.period, 22);
    }
}
