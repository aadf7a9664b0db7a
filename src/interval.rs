pub mod date;
pub mod month;
pub mod trading_period;
