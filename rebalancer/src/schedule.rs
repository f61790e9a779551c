//! When the next rebalance fires.
//!
//! Times are exchange-local wall-clock times as reported by the venue clock.
//! Three cadences are supported:
//!
//! - `interval`: every N minutes while the market is open, re-anchored to the
//!   next session open once a step would land after the close.
//! - `daily`: a fixed time on every trading day.
//! - `weekly`: a fixed weekday and time, pushed to the following trading day
//!   if that date is closed.

use std::fmt;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use log::warn;
use trendbook_broker::{MarketCalendar, MarketClock};

use crate::config::{CadenceKind, ScheduleConfig};
use crate::error::{Error, Result};

/// Candidate dates examined before giving up on finding a trading day.
const MAX_SEARCH_DAYS: u64 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Interval(TimeDelta),
    Daily(NaiveTime),
    Weekly(Weekday, NaiveTime),
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Interval(step) => write!(f, "every {} minutes", step.num_minutes()),
            Cadence::Daily(t) => write!(f, "daily at {}", t.format("%H:%M")),
            Cadence::Weekly(day, t) => write!(f, "weekly on {day} at {}", t.format("%H:%M")),
        }
    }
}

/// Immutable cadence policy plus regular session bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub cadence: Cadence,
    pub session_open: NaiveTime,
    pub session_close: NaiveTime,
}

impl Schedule {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        let session_open = parse_time(&config.session_open, "session_open")?;
        let session_close = parse_time(&config.session_close, "session_close")?;
        if session_open >= session_close {
            return Err(Error::Config(
                "session_open must be before session_close".into(),
            ));
        }

        let cadence = match config.cadence {
            CadenceKind::Interval => {
                if config.interval_minutes == 0 {
                    return Err(Error::Config("interval_minutes must be > 0".into()));
                }
                Cadence::Interval(TimeDelta::minutes(i64::from(config.interval_minutes)))
            }
            CadenceKind::Daily => Cadence::Daily(parse_time(&config.fire_time, "fire_time")?),
            CadenceKind::Weekly => {
                let day = config.weekday.trim().parse::<Weekday>().map_err(|_| {
                    Error::Config(format!("invalid weekday '{}'", config.weekday))
                })?;
                Cadence::Weekly(day, parse_time(&config.fire_time, "fire_time")?)
            }
        };

        Ok(Self {
            cadence,
            session_open,
            session_close,
        })
    }

    pub fn is_interval(&self) -> bool {
        matches!(self.cadence, Cadence::Interval(_))
    }

    /// Next time a cycle should run, strictly after `clock.now` for the
    /// fixed-time cadences.
    pub fn next_fire_time(
        &self,
        clock: &MarketClock,
        calendar: &dyn MarketCalendar,
    ) -> Result<NaiveDateTime> {
        let now = clock.now;
        match self.cadence {
            Cadence::Interval(step) => {
                if clock.is_open {
                    let candidate = now + step;
                    let close = now.date().and_time(self.session_close);
                    if candidate <= close {
                        return Ok(candidate);
                    }
                    let day = next_trading_day(now.date() + Days::new(1), calendar)?;
                    Ok(day.and_time(self.session_open))
                } else if clock.next_open > now {
                    Ok(clock.next_open)
                } else {
                    // stale clock: find the next session open ourselves
                    let first = if now.time() < self.session_open {
                        now.date()
                    } else {
                        now.date() + Days::new(1)
                    };
                    Ok(next_trading_day(first, calendar)?.and_time(self.session_open))
                }
            }
            Cadence::Daily(at) => {
                let first = if now.time() < at {
                    now.date()
                } else {
                    now.date() + Days::new(1)
                };
                Ok(next_trading_day(first, calendar)?.and_time(at))
            }
            Cadence::Weekly(day, at) => {
                let today = now.weekday().num_days_from_monday();
                let target = day.num_days_from_monday();
                let mut ahead = (7 + target - today) % 7;
                if ahead == 0 && now.time() >= at {
                    ahead = 7;
                }
                let first = now.date() + Days::new(u64::from(ahead));
                Ok(next_trading_day(first, calendar)?.and_time(at))
            }
        }
    }
}

/// First trading day on or after `from`. A calendar error counts as closed.
fn next_trading_day(from: NaiveDate, calendar: &dyn MarketCalendar) -> Result<NaiveDate> {
    let mut date = from;
    for _ in 0..MAX_SEARCH_DAYS {
        match calendar.is_trading_day(date) {
            Ok(true) => return Ok(date),
            Ok(false) => {}
            Err(e) => warn!("Calendar lookup for {date} failed, treating as closed: {e}"),
        }
        date = date + Days::new(1);
    }
    Err(Error::Schedule(format!(
        "no trading day found within {MAX_SEARCH_DAYS} days of {from}"
    )))
}

fn parse_time(s: &str, field: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| Error::Config(format!("{field} must be HH:MM, got '{s}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendbook_broker::mock::{MockBroker, clock_at};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn closed_at(now: NaiveDateTime) -> MarketClock {
        clock_at(now, false, now)
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn schedule(cadence: Cadence) -> Schedule {
        Schedule {
            cadence,
            session_open: hm(9, 30),
            session_close: hm(16, 0),
        }
    }

    #[test]
    fn daily_after_fire_time_moves_to_next_trading_day() {
        let cal = MockBroker::builder().build();
        let s = schedule(Cadence::Daily(hm(15, 45)));
        // Thursday 20:00
        let next = s.next_fire_time(&closed_at(at(2024, 3, 14, 20, 0)), &cal).unwrap();
        assert_eq!(next, at(2024, 3, 15, 15, 45));
        // Friday 20:00 skips the weekend
        let next = s.next_fire_time(&closed_at(at(2024, 3, 15, 20, 0)), &cal).unwrap();
        assert_eq!(next, at(2024, 3, 18, 15, 45));
    }

    #[test]
    fn daily_before_fire_time_is_today() {
        let cal = MockBroker::builder().build();
        let s = schedule(Cadence::Daily(hm(15, 45)));
        let next = s.next_fire_time(&closed_at(at(2024, 3, 14, 8, 0)), &cal).unwrap();
        assert_eq!(next, at(2024, 3, 14, 15, 45));
        // exactly at the fire time counts as passed
        let next = s.next_fire_time(&closed_at(at(2024, 3, 14, 15, 45)), &cal).unwrap();
        assert_eq!(next, at(2024, 3, 15, 15, 45));
    }

    #[test]
    fn weekly_after_fire_time_is_next_week() {
        let cal = MockBroker::builder().build();
        let s = schedule(Cadence::Weekly(Weekday::Fri, hm(15, 45)));
        let next = s.next_fire_time(&closed_at(at(2024, 3, 15, 16, 0)), &cal).unwrap();
        assert_eq!(next, at(2024, 3, 22, 15, 45));
        // Tuesday -> this Friday
        let next = s.next_fire_time(&closed_at(at(2024, 3, 19, 9, 0)), &cal).unwrap();
        assert_eq!(next, at(2024, 3, 22, 15, 45));
    }

    #[test]
    fn weekly_holiday_slides_to_next_trading_day() {
        let good_friday = NaiveDate::from_ymd_opt(2024, 3, 29).unwrap();
        let cal = MockBroker::builder().with_holiday(good_friday).build();
        let s = schedule(Cadence::Weekly(Weekday::Fri, hm(15, 45)));
        let next = s.next_fire_time(&closed_at(at(2024, 3, 22, 20, 0)), &cal).unwrap();
        assert_eq!(next, at(2024, 4, 1, 15, 45));
    }

    #[test]
    fn interval_steps_while_open() {
        let cal = MockBroker::builder().build();
        let s = schedule(Cadence::Interval(TimeDelta::minutes(10)));
        let now = at(2024, 3, 14, 10, 0);
        let next = s.next_fire_time(&clock_at(now, true, now), &cal).unwrap();
        assert_eq!(next, at(2024, 3, 14, 10, 10));
    }

    #[test]
    fn interval_past_close_reanchors_to_next_open() {
        let cal = MockBroker::builder().build();
        let s = schedule(Cadence::Interval(TimeDelta::minutes(10)));
        let now = at(2024, 3, 15, 15, 55);
        let next = s.next_fire_time(&clock_at(now, true, now), &cal).unwrap();
        assert_eq!(next, at(2024, 3, 18, 9, 30));
    }

    #[test]
    fn interval_closed_waits_for_venue_next_open() {
        let cal = MockBroker::builder().build();
        let s = schedule(Cadence::Interval(TimeDelta::minutes(10)));
        let now = at(2024, 3, 16, 12, 0);
        let open = at(2024, 3, 18, 9, 30);
        let next = s.next_fire_time(&clock_at(now, false, open), &cal).unwrap();
        assert_eq!(next, open);
    }

    #[test]
    fn calendar_errors_exhaust_search() {
        let cal = MockBroker::builder().fail_calendar().build();
        let s = schedule(Cadence::Daily(hm(15, 45)));
        let err = s
            .next_fire_time(&closed_at(at(2024, 3, 14, 20, 0)), &cal)
            .unwrap_err();
        assert!(matches!(err, Error::Schedule(_)));
    }

    #[test]
    fn calendar_error_on_one_day_moves_to_the_next() {
        // Friday 3/15 cannot be looked up; the weekend is closed
        let cal = MockBroker::builder()
            .fail_calendar_on(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
            .build();
        let s = schedule(Cadence::Daily(hm(15, 45)));
        let fire = s
            .next_fire_time(&closed_at(at(2024, 3, 14, 20, 0)), &cal)
            .unwrap();
        assert_eq!(fire, at(2024, 3, 18, 15, 45));
    }

    #[test]
    fn from_config_parses_weekly() {
        let config = ScheduleConfig {
            cadence: CadenceKind::Weekly,
            weekday: "Friday".into(),
            ..ScheduleConfig::default()
        };
        let s = Schedule::from_config(&config).unwrap();
        assert_eq!(s.cadence, Cadence::Weekly(Weekday::Fri, hm(15, 45)));
        assert_eq!(s.cadence.to_string(), "weekly on Fri at 15:45");
    }

    #[test]
    fn from_config_rejects_inverted_session() {
        let config = ScheduleConfig {
            session_open: "16:00".into(),
            session_close: "09:30".into(),
            ..ScheduleConfig::default()
        };
        assert!(Schedule::from_config(&config).is_err());
    }
}
