//! Schedule time model: `Once` / `Continuous` with civil-calendar arithmetic
//! in the service's local time zone.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};

/// Wall-clock "HH:MM:SS" in the service's local time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    pub fn parse(s: &str) -> FleetResult<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(FleetError::BadRequest(format!(
                "timeOfDay '{s}' must be in HH:MM:SS form"
            )));
        }
        let parse_component = |label: &str, raw: &str, max: u8| -> FleetResult<u8> {
            let value: u8 = raw.parse().map_err(|_| {
                FleetError::BadRequest(format!("timeOfDay {label} '{raw}' is not a number"))
            })?;
            if value > max {
                return Err(FleetError::BadRequest(format!(
                    "timeOfDay {label} '{raw}' out of range 0-{max}"
                )));
            }
            Ok(value)
        };
        let hour = parse_component("hour", parts[0], 23)?;
        let minute = parse_component("minute", parts[1], 59)?;
        let second = parse_component("second", parts[2], 59)?;
        Ok(TimeOfDay {
            hour,
            minute,
            second,
        })
    }

    pub fn to_naive(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)
            .expect("components were range-checked in parse")
    }
}

/// Optional calendar window plus weekday/day-of-month selectors for a
/// `Continuous` schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Period {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub days_of_week: BTreeSet<Weekday>,
    /// 1-31, comma-separated selector at the API boundary; stored parsed.
    #[serde(default)]
    pub days_of_month: BTreeSet<u8>,
}

impl Period {
    pub fn validate(&self) -> FleetResult<()> {
        if self.days_of_week.is_empty() && self.days_of_month.is_empty() {
            return Err(FleetError::BadRequest(
                "Continuous schedule requires at least one of daysOfWeek or daysOfMonth".into(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(FleetError::BadRequest(
                    "period startDate must not be after endDate".into(),
                ));
            }
        }
        for day in &self.days_of_month {
            if *day == 0 || *day > 31 {
                return Err(FleetError::BadRequest(format!(
                    "daysOfMonth entry {day} out of range 1-31"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum Schedule {
    /// `period` must be absent - `deny_unknown_fields` rejects a body that
    /// carries one instead of silently dropping it (spec §3/§8: "`Once`
    /// schedule with a `period` → reject").
    Once {
        #[serde(rename = "timeOfDay")]
        time_of_day: TimeOfDay,
    },
    Continuous {
        #[serde(rename = "timeOfDay")]
        time_of_day: TimeOfDay,
        period: Period,
    },
}

impl Schedule {
    pub fn validate(&self) -> FleetResult<()> {
        match self {
            Schedule::Once { .. } => Ok(()),
            Schedule::Continuous { period, .. } => period.validate(),
        }
    }

    /// Earliest matching instant relative to `after`. When `strict` is
    /// false the search is inclusive of `after` itself (used for the
    /// initial `nextRunAt` at job creation); when true it is exclusive
    /// (used to re-arm a `Continuous` job after it just fired at `after`).
    pub fn next_occurrence(&self, after: DateTime<Local>, strict: bool) -> Option<DateTime<Local>> {
        match self {
            Schedule::Once { time_of_day } => {
                let today = after.date_naive();
                let today_dt = single_local(today, *time_of_day)?;
                let matches = if strict {
                    today_dt > after
                } else {
                    today_dt >= after
                };
                if matches {
                    Some(today_dt)
                } else {
                    let tomorrow = today.succ_opt()?;
                    single_local(tomorrow, *time_of_day)
                }
            }
            Schedule::Continuous { time_of_day, period } => {
                let mut day = after.date_naive();
                if let Some(start) = period.start_date {
                    if day < start {
                        day = start;
                    }
                }
                for _ in 0..3660 {
                    if let Some(end) = period.end_date {
                        if day > end {
                            return None;
                        }
                    }
                    let matches_dow =
                        period.days_of_week.is_empty() || period.days_of_week.contains(&day.weekday());
                    let matches_dom = period.days_of_month.is_empty()
                        || period.days_of_month.contains(&(day.day() as u8));
                    if matches_dow && matches_dom {
                        if let Some(dt) = single_local(day, *time_of_day) {
                            let matches = if strict { dt > after } else { dt >= after };
                            if matches {
                                return Some(dt);
                            }
                        }
                    }
                    day = day.succ_opt()?;
                }
                None
            }
        }
    }
}

fn single_local(date: NaiveDate, time: TimeOfDay) -> Option<DateTime<Local>> {
    let naive = date.and_time(time.to_naive());
    Local.from_local_datetime(&naive).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_with_a_period_is_rejected_at_deserialize() {
        let body = serde_json::json!({
            "type": "Once",
            "timeOfDay": "08:00:00",
            "period": { "daysOfWeek": ["Monday"] },
        });
        let err = serde_json::from_value::<Schedule>(body).unwrap_err();
        assert!(err.to_string().contains("period"));
    }

    #[test]
    fn rejects_bad_hour() {
        assert!(TimeOfDay::parse("25:00:00").is_err());
    }

    #[test]
    fn continuous_requires_a_selector() {
        let period = Period::default();
        assert!(period.validate().is_err());
    }

    #[test]
    fn continuous_rejects_inverted_range() {
        let period = Period {
            start_date: NaiveDate::from_ymd_opt(2026, 6, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            days_of_week: [Weekday::Mon].into_iter().collect(),
            ..Default::default()
        };
        assert!(period.validate().is_err());
    }

    #[test]
    fn weekly_reschedule_skips_to_next_matching_weekday() {
        let schedule = Schedule::Continuous {
            time_of_day: TimeOfDay {
                hour: 0,
                minute: 0,
                second: 0,
            },
            period: Period {
                days_of_week: [Weekday::Mon, Weekday::Wed].into_iter().collect(),
                ..Default::default()
            },
        };
        let monday_midnight = Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2026, 8, 3)
                    .unwrap()
                    .and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap()),
            )
            .single()
            .unwrap();
        assert_eq!(monday_midnight.weekday(), Weekday::Mon);
        let next = schedule.next_occurrence(monday_midnight, true).unwrap();
        assert_eq!(next.weekday(), Weekday::Wed);
        assert!(next > monday_midnight);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn weekday_strategy() -> impl Strategy<Value = Weekday> {
        prop_oneof![
            Just(Weekday::Mon),
            Just(Weekday::Tue),
            Just(Weekday::Wed),
            Just(Weekday::Thu),
            Just(Weekday::Fri),
            Just(Weekday::Sat),
            Just(Weekday::Sun),
        ]
    }

    proptest! {
        /// For any `Continuous` schedule with a non-empty `daysOfWeek` set,
        /// the strictly-next occurrence after any instant is both strictly
        /// later and on a matching weekday (spec §8's reschedule invariant).
        #[test]
        fn continuous_next_occurrence_is_strictly_later_and_matches_weekday(
            hour in 0u8..24, minute in 0u8..60, second in 0u8..60,
            days in prop::collection::btree_set(weekday_strategy(), 1..7),
            base_day in 0i64..3650,
        ) {
            let schedule = Schedule::Continuous {
                time_of_day: TimeOfDay { hour, minute, second },
                period: Period {
                    days_of_week: days.clone(),
                    ..Default::default()
                },
            };
            let base_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(base_day);
            let after = Local
                .from_local_datetime(&base_date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap()))
                .single()
                .unwrap();
            if let Some(next) = schedule.next_occurrence(after, true) {
                prop_assert!(next > after);
                prop_assert!(days.contains(&next.weekday()));
            }
        }

        /// `TimeOfDay::parse` accepts every in-range HH:MM:SS and rejects
        /// nothing it shouldn't; the round-tripped components always match.
        #[test]
        fn time_of_day_parse_round_trips_in_range_components(
            hour in 0u8..24, minute in 0u8..60, second in 0u8..60,
        ) {
            let s = format!("{hour:02}:{minute:02}:{second:02}");
            let parsed = TimeOfDay::parse(&s).unwrap();
            prop_assert_eq!(parsed.hour, hour);
            prop_assert_eq!(parsed.minute, minute);
            prop_assert_eq!(parsed.second, second);
        }
    }
}
